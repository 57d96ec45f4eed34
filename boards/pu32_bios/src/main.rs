// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Board file for the PU32 BIOS.
//!
//! On the PU32 target this is the BIOS image: it sets up the console and the
//! boot device, serves the kernel's syscalls and emulated instructions from
//! the sysop fault vector, loads the kernel and jumps to it. Built for the
//! host, the same boot sequence runs on the emulated SoC against a disk
//! image file.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod io;

#[cfg(not(target_os = "none"))]
mod hosted;

/// Load address of the kernel; the kernel is linked for it.
pub const KERNEL_ADDR: usize = 0x4000;
/// MBR partition holding the kernel image.
pub const KERNEL_PARTITION: usize = 2;
/// Locks serializing emulated `cldst` instructions.
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
pub const CLDST_MUTEX_COUNT: usize = 8;
/// Cores served by the BIOS.
pub const MAX_CORE_COUNT: usize = 1;
pub const UART_BAUD: u32 = 115200;

/// Banner printed after the SoC version.
pub const VERSION: &str = concat!("pu32 bios ", env!("CARGO_PKG_VERSION"), "\n");

/// Default kernel command line, NUL-terminated.
pub const KERNEL_ARG: &[u8] = b"root=/dev/hda4 earlyprintk=keep\0";

#[cfg(target_os = "none")]
mod bare {
    use core::ptr::{addr_of, addr_of_mut};

    use kernel::boot::{Bios, BootConfig, ISHW_ENTRY_SIZE};
    use kernel::platform::Machine;
    use kernel::static_init;
    use kernel::syscall::SyscallHandler;
    use kernel::trap::context::RegisterContext;
    use kernel::trap::TrapHandler;
    use kernel::utilities::mutex::Mutex;
    use pu32::Pu32;
    use pu32_soc::blkdev::BlkDev;
    use pu32_soc::devtbl::{DeviceTable, RAM_DEVICE_ID};
    use pu32_soc::uart::Uart;
    use pu32_soc::{BLKDEV_ADDR, DEVTBL_ADDR, EXIT_PORT_ADDR, UART_ADDR};

    use crate::io;

    type Storage = BlkDev<'static, Pu32>;
    type Console = Uart<'static, Pu32>;
    type BiosTrapHandler = TrapHandler<
        'static,
        Pu32,
        Storage,
        Console,
        { crate::MAX_CORE_COUNT },
        { crate::CLDST_MUTEX_COUNT },
    >;

    /// Size of the BIOS stack; covers the deepest handler plus a saved
    /// register context.
    const STACK_SIZE: usize = 0x400;

    #[no_mangle]
    #[link_section = ".stack_buffer"]
    pub static mut STACK_MEMORY: [u8; STACK_SIZE] = [0; STACK_SIZE];

    #[link_section = ".kernelarg"]
    static KERNEL_ARG: [u8; crate::KERNEL_ARG.len()] = {
        let mut arg = [0u8; crate::KERNEL_ARG.len()];
        let mut n = 0;
        while n < arg.len() {
            arg[n] = crate::KERNEL_ARG[n];
            n += 1;
        }
        arg
    };

    static ARGV0: [u8; 1] = [0];

    /// The `___ISHW=` environment string handed to the kernel.
    static mut ISHW_ENTRY: [u8; ISHW_ENTRY_SIZE] = [0; ISHW_ENTRY_SIZE];

    static mut TRAP_HANDLER: Option<&'static BiosTrapHandler> = None;

    /// Called by the sysop fault vector with the saved context of a
    /// kernel-mode fault, or null for a user-mode fault. Returns `ctx` so the
    /// vector knows whether to restore it.
    #[no_mangle]
    pub unsafe extern "C" fn pu32_sysop_fault(
        ctx: *mut RegisterContext,
        opcode: usize,
    ) -> *mut RegisterContext {
        match *addr_of!(TRAP_HANDLER) {
            Some(handler) => pu32::trap::service(ctx, opcode, |regs, opcode| {
                handler.dispatch(regs, opcode)
            }),
            None => Pu32.park(),
        }
    }

    /// Entry point from `_start`.
    #[no_mangle]
    pub unsafe fn main() -> ! {
        let machine: &'static Pu32 = static_init!(Pu32, Pu32);

        let console: &'static Mutex<Console> =
            static_init!(Mutex<Console>, Mutex::new(Uart::new(machine, UART_ADDR)));
        console.lock().init(crate::UART_BAUD);
        let writer = static_init!(io::Writer, io::Writer::new(console));
        kernel::debug::set_debug_writer(writer);

        let storage: &'static Mutex<Storage> =
            static_init!(Mutex<Storage>, Mutex::new(BlkDev::new(machine, BLKDEV_ADDR)));

        let syscalls = SyscallHandler::new(machine, storage, console, EXIT_PORT_ADDR);
        let handler = static_init!(BiosTrapHandler, TrapHandler::new(machine, syscalls));
        *addr_of_mut!(TRAP_HANDLER) = Some(handler);

        let devices = DeviceTable::new(machine, DEVTBL_ADDR);
        let ram_check = |range: core::ops::Range<usize>| devices.covers(RAM_DEVICE_ID, range);

        let bios = Bios::new(
            machine,
            storage,
            console,
            BootConfig {
                soc_version_addr: DEVTBL_ADDR,
                version: crate::VERSION,
                kernel_addr: crate::KERNEL_ADDR,
                kernel_partition: crate::KERNEL_PARTITION,
                argv0_addr: ARGV0.as_ptr() as usize,
                cmdline_addr: KERNEL_ARG.as_ptr() as usize,
                ishw_addr: addr_of!(ISHW_ENTRY) as usize,
                ram_check: Some(&ram_check),
            },
        );
        let handoff = bios.boot(pu32::trap::vector());
        pu32::support::enter_kernel(&handoff)
    }
}

#[cfg(not(target_os = "none"))]
fn main() -> std::process::ExitCode {
    hosted::run()
}
