// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Runs the boot sequence on the emulated SoC.
//!
//! ```text
//! pu32_bios <disk image>
//! ```
//!
//! Prints everything the BIOS wrote to the console followed by the kernel
//! entry point and initial stack frame. A fatal boot error exits with a
//! failure status.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process::ExitCode;
use std::sync::Arc;

use kernel::boot::{Bios, BootConfig, KernelHandoff, ISHW_ENTRY_SIZE};
use kernel::utilities::mutex::Mutex;
use pu32_emu::{EmulatedSoc, SocConfig};
use pu32_soc::blkdev::BlkDev;
use pu32_soc::devtbl::{DeviceTable, RAM_DEVICE_ID};
use pu32_soc::uart::Uart;
use pu32_soc::{BLKDEV_ADDR, DEVTBL_ADDR, UART_ADDR};

/// Address space of the emulated SoC.
const RAM_SIZE: usize = 64 << 20;

/// Where the emulated BIOS image keeps its data, between its park routine
/// and the park routine slot below the kernel.
const PARK_ROUTINE_ADDR: usize = 0x1800;
const ARGV0_ADDR: usize = 0x2000;
const CMDLINE_ADDR: usize = ARGV0_ADDR + 0x10;
const ISHW_ADDR: usize = ARGV0_ADDR + 0x100;
const IMAGE_END: usize = ISHW_ADDR + 0x100;

/// Stand-in for the fault vector address, which only exists on target.
const VECTOR_ADDR: usize = 0x1000;

fn boot(soc: &EmulatedSoc) -> KernelHandoff {
    let console = Mutex::new(Uart::new(soc, UART_ADDR));
    console.lock().init(crate::UART_BAUD);
    let storage = Mutex::new(BlkDev::new(soc, BLKDEV_ADDR));

    let devices = DeviceTable::new(soc, DEVTBL_ADDR);
    let ram_check = |range| devices.covers(RAM_DEVICE_ID, range);

    let bios = Bios::new(
        soc,
        &storage,
        &console,
        BootConfig {
            soc_version_addr: DEVTBL_ADDR,
            version: crate::VERSION,
            kernel_addr: crate::KERNEL_ADDR,
            kernel_partition: crate::KERNEL_PARTITION,
            argv0_addr: ARGV0_ADDR,
            cmdline_addr: CMDLINE_ADDR,
            ishw_addr: ISHW_ADDR,
            ram_check: Some(&ram_check),
        },
    );
    bios.boot(VECTOR_ADDR)
}

pub fn run() -> ExitCode {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: pu32_bios <disk image>");
        return ExitCode::FAILURE;
    };
    let image = match std::fs::read(&path) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("{}: {}", path, err);
            return ExitCode::FAILURE;
        }
    };

    let config = SocConfig {
        cores: crate::MAX_CORE_COUNT,
        ram_size: RAM_SIZE,
        park_routine: PARK_ROUTINE_ADDR..PARK_ROUTINE_ADDR + kernel::boot::PARK_ROUTINE_SIZE,
        image_end: IMAGE_END,
        ..SocConfig::default()
    };
    let soc = Arc::new(EmulatedSoc::new(
        config,
        EmulatedSoc::disk_from_image(&image),
    ));
    soc.write_memory(ARGV0_ADDR, &[0]);
    soc.write_memory(CMDLINE_ADDR, crate::KERNEL_ARG);
    soc.write_memory(ISHW_ADDR, &[0; ISHW_ENTRY_SIZE]);

    // A fatal error parks the core, which panics on the emulated SoC. Show
    // what the BIOS printed up to there, whether or not panics unwind.
    let hook_soc = Arc::clone(&soc);
    std::panic::set_hook(Box::new(move |info| {
        if let Some(output) = hook_soc.try_console_output_string() {
            print!("{}", output);
        }
        eprintln!("{}", info);
    }));

    match catch_unwind(AssertUnwindSafe(|| boot(&soc))) {
        Ok(handoff) => {
            print!("{}", soc.console_output_string());
            println!("entry {:#x}", handoff.entry);
            println!("frame {:#x?}", handoff.frame);
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}
