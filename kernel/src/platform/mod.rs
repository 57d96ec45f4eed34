// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface for the processor the BIOS runs on.

pub mod machine;

pub use machine::{Gpr, Machine, Width, WORD_SIZE};
