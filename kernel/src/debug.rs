// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Support for in-firmware debugging.
//!
//! The board registers one [`IoWrite`] implementation, usually its console,
//! with [`set_debug_writer`]. The [`debug!`] macro then formats into that
//! writer synchronously: there is no buffering and no deferred output, since
//! the BIOS never runs long enough for that to matter.
//!
//! ```ignore
//! debug!("blkdev holds {} blocks", count);
//! ```
//!
//! [`ConsoleFmt`] is the same adapter for code that holds a console directly,
//! such as the boot sequence and the bad-opcode diagnostic.

use core::fmt::{self, Write};

use crate::hil::uart::Console;

/// Synchronous byte sink for debug output.
pub trait IoWrite {
    /// Writes as much of `buf` as possible and returns the number of bytes
    /// written.
    fn write(&self, buf: &[u8]) -> usize;

    fn write_all(&self, mut buf: &[u8]) {
        while !buf.is_empty() {
            let n = self.write(buf);
            buf = &buf[n..];
        }
    }
}

static mut DEBUG_WRITER: Option<&'static dyn IoWrite> = None;

/// Registers the debug writer used by [`debug!`].
///
/// # Safety
///
/// Must be called before any other core can print, typically once from the
/// board's `main`.
pub unsafe fn set_debug_writer(writer: &'static dyn IoWrite) {
    *core::ptr::addr_of_mut!(DEBUG_WRITER) = Some(writer);
}

fn debug_writer() -> Option<&'static dyn IoWrite> {
    // SAFETY: only written once by `set_debug_writer` during early boot.
    unsafe { *core::ptr::addr_of!(DEBUG_WRITER) }
}

struct WriterAdapter(&'static dyn IoWrite);

impl Write for WriterAdapter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_all(s.as_bytes());
        Ok(())
    }
}

pub fn debug_println(args: fmt::Arguments) {
    if let Some(writer) = debug_writer() {
        let mut adapter = WriterAdapter(writer);
        let _ = adapter.write_fmt(args);
        let _ = adapter.write_str("\n");
    }
}

/// In-firmware `println()` debugging.
#[macro_export]
macro_rules! debug {
    () => ({
        // An empty debug!() prints a blank line.
        debug!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::debug_println(format_args!($msg));
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::debug_println(format_args!($fmt, $($arg)+));
    });
}

/// `core::fmt::Write` over a [`Console`], spinning until every byte has been
/// accepted by the device.
pub struct ConsoleFmt<'a, C: Console + ?Sized>(pub &'a C);

impl<C: Console + ?Sized> Write for ConsoleFmt<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            let n = self.0.transmit(bytes);
            bytes = &bytes[n..];
        }
        Ok(())
    }
}
