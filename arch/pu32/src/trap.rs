// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Sysop fault vector.
//!
//! `pu32_sysop_fault_vector` is what the BIOS installs as the fault handler.
//! The core enters it at [`TrapOrigin::USER_ENTRY`] for faults raised in user
//! mode and at [`TrapOrigin::KERNEL_ENTRY`] for faults raised in kernel mode,
//! so the first entry must be exactly two 16-bit instructions.
//!
//! The handler always runs on the kernel register bank. A user-mode fault
//! leaves its operands in the user bank, where `setkgpr`/`setugpr` reach
//! them, so the user entry saves nothing. A kernel-mode fault shares the bank
//! with the handler, so the kernel entry pushes `%1` to `%15` and the
//! pre-trap stack pointer as a [`RegisterContext`] first. Both then call the
//! board's
//!
//! ```ignore
//! #[no_mangle]
//! pub unsafe extern "C" fn pu32_sysop_fault(
//!     ctx: *mut RegisterContext,
//!     opcode: usize,
//! ) -> *mut RegisterContext
//! ```
//!
//! with a null `ctx` for user-mode faults. The returned pointer, `ctx`
//! itself, tells the vector whether there is a context to restore before
//! returning with `ksysret`. [`service`] implements that contract on top of
//! the trap handler.
//!
//! [`TrapOrigin::USER_ENTRY`]: kernel::trap::TrapOrigin::USER_ENTRY
//! [`TrapOrigin::KERNEL_ENTRY`]: kernel::trap::TrapOrigin::KERNEL_ENTRY

use kernel::trap::context::{RegisterAccess, RegisterContext};

use crate::machine::Pu32;

#[cfg(all(target_arch = "pu32", target_os = "none"))]
core::arch::global_asm!(
    "
    .section .text
    .global pu32_sysop_fault_vector
    .type pu32_sysop_fault_vector, @function
    .p2align 1
pu32_sysop_fault_vector:
    rli8 %sr, 0f; j %sr

    // Kernel entry: save the context on the stack.
    inc8 %sp, -{w2}; st %1, %sp
    inc8 %sp, -{w}; st %2, %sp
    inc8 %sp, -{w}; st %3, %sp
    inc8 %sp, -{w}; st %4, %sp
    inc8 %sp, -{w}; st %5, %sp
    inc8 %sp, -{w}; st %6, %sp
    inc8 %sp, -{w}; st %7, %sp
    inc8 %sp, -{w}; st %8, %sp
    inc8 %sp, -{w}; st %9, %sp
    inc8 %sp, -{w}; st %10, %sp
    inc8 %sp, -{w}; st %11, %sp
    inc8 %sp, -{w}; st %12, %sp
    inc8 %sp, -{w}; st %13, %sp
    inc8 %sp, -{w}; st %14, %sp
    inc8 %sp, -{w}; st %15, %sp
    // The slot above %15 receives the pre-trap stack pointer.
    cpy %2, %sp; inc8 %2, {w15}
    cpy %1, %2; inc8 %1, {w}
    st %1, %2
    cpy %1, %sp; rli %sr, 1f; j %sr

    // User entry: operands stay in the user bank.
0:  li %1, 0

1:  getsysopcode %2
    rli %sr, pu32_sysop_fault; jl %rp, %sr

    // %1 is the context returned by the handler, null if none was saved.
    rli %sr, 2f; jz %1, %sr
    ld %15, %sp; inc8 %sp, {w}
    ld %14, %sp; inc8 %sp, {w}
    ld %13, %sp; inc8 %sp, {w}
    ld %12, %sp; inc8 %sp, {w}
    ld %11, %sp; inc8 %sp, {w}
    ld %10, %sp; inc8 %sp, {w}
    ld %9, %sp; inc8 %sp, {w}
    ld %8, %sp; inc8 %sp, {w}
    ld %7, %sp; inc8 %sp, {w}
    ld %6, %sp; inc8 %sp, {w}
    ld %5, %sp; inc8 %sp, {w}
    ld %4, %sp; inc8 %sp, {w}
    ld %3, %sp; inc8 %sp, {w}
    ld %2, %sp; inc8 %sp, {w}
    ld %1, %sp; inc8 %sp, {w}
    // Last, since the handler may have moved the stack.
    ld %sp, %sp
2:  ksysret
    .size pu32_sysop_fault_vector, (. - pu32_sysop_fault_vector)
    ",
    w = const core::mem::size_of::<usize>(),
    w2 = const 2 * core::mem::size_of::<usize>(),
    w15 = const 15 * core::mem::size_of::<usize>(),
);

#[cfg(all(target_arch = "pu32", target_os = "none"))]
extern "C" {
    fn pu32_sysop_fault_vector();
}

/// Address to install as the sysop fault handler.
#[cfg(all(target_arch = "pu32", target_os = "none"))]
pub fn vector() -> usize {
    pu32_sysop_fault_vector as usize
}

// Mock implementation for tests on the host.
#[cfg(not(all(target_arch = "pu32", target_os = "none")))]
pub fn vector() -> usize {
    unimplemented!()
}

/// Operand view for the context pointer the vector passes to the board.
///
/// # Safety
///
/// `ctx` must be null or the context saved by the vector for the fault being
/// handled.
pub unsafe fn register_access<'a>(ctx: *mut RegisterContext) -> RegisterAccess<'a, Pu32> {
    match ctx.as_mut() {
        Some(ctx) => RegisterAccess::Captured(ctx),
        None => RegisterAccess::Live(&Pu32),
    }
}

/// Runs `handle` on the operands of the fault and returns `ctx`, which the
/// vector expects back in `%1` to decide whether to restore a context.
///
/// # Safety
///
/// Same as [`register_access`].
pub unsafe fn service(
    ctx: *mut RegisterContext,
    opcode: usize,
    handle: impl FnOnce(&mut RegisterAccess<'_, Pu32>, usize),
) -> *mut RegisterContext {
    handle(&mut register_access(ctx), opcode);
    ctx
}
