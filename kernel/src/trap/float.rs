// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Emulation of single precision float arithmetic.
//!
//! `fadd`, `fsub`, `fmul` and `fdiv` take two registers holding `f32` bit
//! patterns and leave the result in the first one. The arithmetic is done by
//! the compiler's soft-float routines on cores without an FPU.

use crate::platform::{Gpr, Machine};
use crate::trap::context::RegisterAccess;
use crate::ErrorCode;

pub fn execute<M: Machine + ?Sized>(
    regs: &mut RegisterAccess<'_, M>,
    opcode: usize,
) -> Result<(), ErrorCode> {
    let dst = Gpr::from_nibble(opcode >> 12);
    let src = Gpr::from_nibble(opcode >> 8);
    let a = f32::from_bits(regs.read(dst) as u32);
    let b = f32::from_bits(regs.read(src) as u32);

    let result = match opcode & 0xff {
        0xd8 => a + b,
        0xd9 => a - b,
        0xda => a * b,
        0xdb => a / b,
        _ => return Err(ErrorCode::NOSUPPORT),
    };
    regs.write(dst, result.to_bits() as usize);
    Ok(())
}
