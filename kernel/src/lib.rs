// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Core of the PU32 BIOS.
//!
//! This crate holds everything that does not depend on how the processor is
//! reached: the sysop fault dispatcher and its emulations, the syscalls the
//! BIOS serves to the kernel, the boot sequence, and the interfaces (HILs
//! and the [`platform::Machine`] trait) that chips implement. It never
//! touches hardware directly, which lets the whole BIOS run against a
//! simulated machine in tests.

#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
pub mod debug;
pub mod boot;
pub mod config;
pub mod hil;
pub mod mbr;
pub mod platform;
pub mod syscall;
pub mod trap;
#[macro_use]
pub mod utilities;

mod errorcode;

pub use crate::errorcode::ErrorCode;
