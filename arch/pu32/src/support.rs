// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Park routine, kernel entry and linker symbols.

use core::ops::Range;

use kernel::boot::KernelHandoff;

// Reset entry: set up the stack the linker script reserves and call the
// board's `main`, which never returns.
#[cfg(all(target_arch = "pu32", target_os = "none"))]
core::arch::global_asm!(
    "
    .section .text._start
    .global _start
    .type _start, @function
    .p2align 1
_start:
    rli %sp, _estack
    rli %sr, main
    jl %rp, %sr
    .size _start, (. - _start)
    "
);

// The park routine is copied right below the kernel, where other cores and
// the kernel expect it: the kernel releases a parked core by patching the
// 16-bit immediate of `rli16` at offset 14 with its entry point. Both ends
// are aligned so that it copies as whole words.
#[cfg(all(target_arch = "pu32", target_os = "none"))]
core::arch::global_asm!(
    "
    .section .text
    .global pu32_park
    .type pu32_park, @function
    .p2align 3
pu32_park:
    li16 %sr, 0x2000
    setflags %sr
0:  halt
    sysret
    icacherst
    rli16 %sr, 0b
    j %sr
    .p2align 3
    .global pu32_park_end
pu32_park_end:
    .size pu32_park, (. - pu32_park)
    "
);

#[cfg(all(target_arch = "pu32", target_os = "none"))]
extern "C" {
    fn pu32_park() -> !;
    static pu32_park_end: u8;
    static _end: u8;
}

#[cfg(all(target_arch = "pu32", target_os = "none"))]
pub fn park_routine() -> Range<usize> {
    // SAFETY: only the addresses of the symbols are taken.
    unsafe { (pu32_park as usize)..(core::ptr::addr_of!(pu32_park_end) as usize) }
}

#[cfg(all(target_arch = "pu32", target_os = "none"))]
pub fn image_end() -> usize {
    // SAFETY: only the address of the symbol is taken.
    unsafe { core::ptr::addr_of!(_end) as usize }
}

#[cfg(all(target_arch = "pu32", target_os = "none"))]
pub fn park() -> ! {
    // SAFETY: the park routine needs no stack and never returns.
    unsafe { pu32_park() }
}

/// Jumps to the kernel with its initial stack frame, after flushing the
/// caches so that the kernel sees its own image. Parks the core if the
/// kernel ever returns.
#[cfg(all(target_arch = "pu32", target_os = "none"))]
pub unsafe fn enter_kernel(handoff: &KernelHandoff) -> ! {
    use core::arch::asm;
    asm!(
        "cpy %sp, {frame}",
        "dcacherst",
        "icacherst",
        "jl %rp, {entry}",
        frame = in(reg) handoff.frame.as_ptr(),
        entry = in(reg) handoff.entry,
    );
    park()
}

// Mock implementations for tests on the host.
#[cfg(not(all(target_arch = "pu32", target_os = "none")))]
pub fn park_routine() -> Range<usize> {
    unimplemented!()
}

#[cfg(not(all(target_arch = "pu32", target_os = "none")))]
pub fn image_end() -> usize {
    unimplemented!()
}

#[cfg(not(all(target_arch = "pu32", target_os = "none")))]
pub fn park() -> ! {
    unimplemented!()
}

#[cfg(not(all(target_arch = "pu32", target_os = "none")))]
pub unsafe fn enter_kernel(_handoff: &KernelHandoff) -> ! {
    unimplemented!()
}
