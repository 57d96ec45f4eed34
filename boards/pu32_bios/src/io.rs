// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

use core::fmt::Write;
use core::panic::PanicInfo;

use kernel::debug::{ConsoleFmt, IoWrite};
use kernel::hil::uart::Console;
use kernel::platform::Machine;
use kernel::utilities::mutex::Mutex;
use pu32::Pu32;
use pu32_soc::uart::Uart;
use pu32_soc::UART_ADDR;

/// Debug output over the shared console.
pub struct Writer {
    console: &'static Mutex<Uart<'static, Pu32>>,
}

impl Writer {
    pub fn new(console: &'static Mutex<Uart<'static, Pu32>>) -> Writer {
        Writer { console }
    }
}

impl IoWrite for Writer {
    fn write(&self, buf: &[u8]) -> usize {
        self.console.lock().transmit(buf)
    }
}

/// Panic handler.
#[cfg(not(test))]
#[panic_handler]
pub fn panic_fmt(pi: &PanicInfo) -> ! {
    if kernel::config::debug_panics() {
        // The shared console may be locked by the code that panicked, so
        // print through a second driver instance.
        let uart = Uart::new(&Pu32, UART_ADDR);
        let _ = write!(ConsoleFmt(&uart), "\r\n{}\r\n", pi);
    }
    Pu32.park()
}
