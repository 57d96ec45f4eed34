// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! [`Machine`] for the PU32 core.
//!
//! Memory accesses are plain volatile pointer accesses; everything else is a
//! PU32 instruction. Off target the instruction wrappers are mocks so that
//! the crate still builds for host tests.

use core::ops::Range;
use core::ptr;

use kernel::platform::{Gpr, Machine, Width};

/// The executing PU32 core.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pu32;

#[cfg(any(doc, all(target_arch = "pu32", target_os = "none")))]
mod insn {
    use core::arch::asm;

    /// Generates a match over the sixteen registers, since the register
    /// number of `setkgpr`/`setugpr` is part of the instruction.
    macro_rules! gpr_match {
        ($index:expr, $op:ident, $($n:literal)+) => {
            match $index & 0xf {
                $($n => $op!($n),)+
                _ => unreachable!(),
            }
        };
    }

    /// Reads user register `%index` into a kernel register.
    #[inline(always)]
    pub fn setkgpr(index: usize) -> usize {
        let value: usize;
        macro_rules! get {
            ($n:literal) => {
                unsafe {
                    asm!(concat!("setkgpr {}, %", stringify!($n)), out(reg) value,
                        options(nomem, nostack))
                }
            };
        }
        gpr_match!(index, get, 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15);
        value
    }

    /// Writes user register `%index` from a kernel register.
    #[inline(always)]
    pub fn setugpr(index: usize, value: usize) {
        macro_rules! set {
            ($n:literal) => {
                unsafe {
                    asm!(concat!("setugpr %", stringify!($n), ", {}"), in(reg) value,
                        options(nomem, nostack))
                }
            };
        }
        gpr_match!(index, set, 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15);
    }

    #[inline(always)]
    pub fn getcoreid() -> usize {
        let id: usize;
        unsafe { asm!("getcoreid {}", out(reg) id, options(nomem, nostack)) };
        id
    }

    #[inline(always)]
    pub fn getsysopcode() -> usize {
        let opcode: usize;
        unsafe { asm!("getsysopcode {}", out(reg) opcode, options(nomem, nostack)) };
        opcode
    }

    #[inline(always)]
    pub fn getfaultaddr() -> usize {
        let addr: usize;
        unsafe { asm!("getfaultaddr {}", out(reg) addr, options(nomem, nostack)) };
        addr
    }

    #[inline(always)]
    pub unsafe fn ldst(addr: usize, value: usize) -> usize {
        let mut value = value;
        asm!("ldst {v}, {a}", v = inout(reg) value, a = in(reg) addr, options(nostack));
        value
    }

    #[inline(always)]
    pub fn setksysopfaulthdlr(handler: usize) {
        unsafe { asm!("setksysopfaulthdlr {}", in(reg) handler, options(nomem, nostack)) };
    }

    #[inline(always)]
    pub fn setksl(limit: usize) {
        unsafe { asm!("setksl {}", in(reg) limit, options(nomem, nostack)) };
    }
}

// Mock implementations for tests on the host.
#[cfg(not(any(doc, all(target_arch = "pu32", target_os = "none"))))]
mod insn {
    pub fn setkgpr(_index: usize) -> usize {
        unimplemented!()
    }

    pub fn setugpr(_index: usize, _value: usize) {
        unimplemented!()
    }

    pub fn getcoreid() -> usize {
        unimplemented!()
    }

    pub fn getsysopcode() -> usize {
        unimplemented!()
    }

    pub fn getfaultaddr() -> usize {
        unimplemented!()
    }

    pub unsafe fn ldst(_addr: usize, _value: usize) -> usize {
        unimplemented!()
    }

    pub fn setksysopfaulthdlr(_handler: usize) {
        unimplemented!()
    }

    pub fn setksl(_limit: usize) {
        unimplemented!()
    }
}

impl Machine for Pu32 {
    fn core_id(&self) -> usize {
        insn::getcoreid()
    }

    fn sysopcode(&self) -> usize {
        insn::getsysopcode()
    }

    fn fault_addr(&self) -> usize {
        insn::getfaultaddr()
    }

    fn gpr(&self, reg: Gpr) -> usize {
        insn::setkgpr(reg.index())
    }

    fn set_gpr(&self, reg: Gpr, value: usize) {
        insn::setugpr(reg.index(), value)
    }

    unsafe fn ldst(&self, addr: usize, value: usize) -> usize {
        insn::ldst(addr, value)
    }

    unsafe fn load(&self, addr: usize, width: Width) -> u64 {
        match width {
            Width::W8 => ptr::read_volatile(addr as *const u8) as u64,
            Width::W16 => ptr::read_volatile(addr as *const u16) as u64,
            Width::W32 => ptr::read_volatile(addr as *const u32) as u64,
            Width::W64 => ptr::read_volatile(addr as *const u64),
        }
    }

    unsafe fn store(&self, addr: usize, width: Width, value: u64) {
        match width {
            Width::W8 => ptr::write_volatile(addr as *mut u8, value as u8),
            Width::W16 => ptr::write_volatile(addr as *mut u16, value as u16),
            Width::W32 => ptr::write_volatile(addr as *mut u32, value as u32),
            Width::W64 => ptr::write_volatile(addr as *mut u64, value),
        }
    }

    unsafe fn copy(&self, dst: usize, src: usize, len: usize) {
        ptr::copy_nonoverlapping(src as *const u8, dst as *mut u8, len);
    }

    unsafe fn read_bytes(&self, addr: usize, buf: &mut [u8]) {
        ptr::copy_nonoverlapping(addr as *const u8, buf.as_mut_ptr(), buf.len());
    }

    unsafe fn write_bytes(&self, addr: usize, buf: &[u8]) {
        ptr::copy_nonoverlapping(buf.as_ptr(), addr as *mut u8, buf.len());
    }

    fn set_trap_vector(&self, handler: usize) {
        insn::setksysopfaulthdlr(handler)
    }

    fn set_kernel_space_limit(&self, limit: usize) {
        insn::setksl(limit)
    }

    fn park_routine(&self) -> Range<usize> {
        crate::support::park_routine()
    }

    fn image_end(&self) -> usize {
        crate::support::image_end()
    }

    fn park(&self) -> ! {
        crate::support::park()
    }
}
