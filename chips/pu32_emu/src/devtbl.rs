// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Device table of the emulated SoC.
//!
//! The block device comes first since it is mapped at address 0; the id word
//! of its entry, the first word of the table, doubles as the SoC version.

use kernel::hil::block_storage::BLOCK_SIZE;
use kernel::platform::WORD_SIZE;
use pu32_soc::devtbl::RAM_DEVICE_ID;
use pu32_soc::{DEVTBL_ADDR, RAMDEV_ADDR, UART_ADDR};

/// Ids the emulated devices report.
pub const DEVTBL_DEVICE_ID: usize = 0;
pub const UART_DEVICE_ID: usize = 2;

const USEINTR: usize = 1;

fn flags(map_bytes: usize, useintr: bool) -> usize {
    ((map_bytes / WORD_SIZE) << 2) | if useintr { USEINTR } else { 0 }
}

/// Words of the table for a SoC with `ram_size` bytes of address space.
pub(crate) fn build(soc_version: usize, ram_size: usize) -> Vec<usize> {
    vec![
        soc_version,
        flags(BLOCK_SIZE, true),
        DEVTBL_DEVICE_ID,
        flags(UART_ADDR - DEVTBL_ADDR, false),
        UART_DEVICE_ID,
        flags(RAMDEV_ADDR - UART_ADDR, true),
        RAM_DEVICE_ID,
        flags(ram_size - RAMDEV_ADDR, false),
        0,
        0,
    ]
}
