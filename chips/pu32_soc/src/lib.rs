// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Peripheral drivers and address map of PU32 systems.
//!
//! Devices are reached with the core's `ldst` bus operation through the
//! [`kernel::platform::Machine`] trait, so the drivers run unchanged on the
//! hardware and on the emulated SoC.

#![no_std]

pub mod blkdev;
pub mod devtbl;
pub mod uart;

/// The first block device; its data window is mapped at the same address.
pub const BLKDEV_ADDR: usize = 0x0;
/// The device table.
pub const DEVTBL_ADDR: usize = 0x200;
/// The first UART.
pub const UART_ADDR: usize = 0x0ff8;
/// The first RAM device.
pub const RAMDEV_ADDR: usize = 0x1000;

/// Device table word that records the exit status of the kernel.
pub const EXIT_PORT_ADDR: usize = DEVTBL_ADDR + kernel::platform::WORD_SIZE;
