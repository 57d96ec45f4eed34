// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Data structure for storing compile-time configuration options in the BIOS.
//!
//! Configuration is a typed `const` object rather than scattered
//! `#[cfg(feature = ...)]` blocks, so that every code path is type-checked
//! even when disabled, while the compiler still folds the disabled branches
//! away.

/// Data structure holding compile-time configuration options.
///
/// To change the configuration, enable the matching cargo feature of the
/// kernel crate from the board crate.
pub(crate) struct Config {
    /// Whether every dispatched system call is printed to the debug output,
    /// with its number, arguments and result.
    pub(crate) trace_syscalls: bool,

    /// Whether the board panic handler prints the panic message before
    /// parking the core.
    // Disabling this drops the formatting machinery from small images.
    pub(crate) debug_panics: bool,

    /// Whether `TicketLock::lock()` waits for a free ticket before drawing one.
    ///
    /// Only needed if more than `usize::MAX - 1` lockers could ever wait on
    /// the same lock at once.
    pub(crate) guard_ticket_wrap: bool,

    /// Whether the boot sequence hexdumps the loaded kernel image to the
    /// console before jumping into it.
    pub(crate) kernel_hexdump: bool,
}

/// The unique instance of `Config`. This is the only place in the kernel
/// crate where cargo features are consulted.
pub(crate) const CONFIG: Config = Config {
    trace_syscalls: cfg!(feature = "trace_syscalls"),
    debug_panics: !cfg!(feature = "no_debug_panics"),
    guard_ticket_wrap: cfg!(feature = "guard_ticket_wrap"),
    kernel_hexdump: cfg!(feature = "kernel_hexdump"),
};

/// Whether panics should be printed. Boards read this from their panic
/// handler.
pub const fn debug_panics() -> bool {
    CONFIG.debug_panics
}
