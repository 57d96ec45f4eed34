// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Shared implementations for PU32 cores.

#![no_std]

pub mod machine;
pub mod support;
pub mod trap;

pub use crate::machine::Pu32;
