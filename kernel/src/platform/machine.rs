// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Hardware abstraction for the PU32 core.
//!
//! Everything the BIOS needs from the processor goes through [`Machine`]:
//! control registers, the atomic `ldst` bus operation used by every
//! memory-mapped device, and raw memory accesses at physical addresses.
//! The real core implements it with inline assembly; the emulation chip
//! implements it over a simulated memory so the rest of the BIOS can be
//! tested on a host.

use core::ops::Range;

/// Size in bytes of a machine word.
pub const WORD_SIZE: usize = core::mem::size_of::<usize>();

/// Index of a general purpose register, `%0` to `%15`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gpr(u8);

impl Gpr {
    /// Stack pointer.
    pub const SP: Gpr = Gpr(0);
    /// First argument and result register.
    pub const R1: Gpr = Gpr(1);
    pub const R2: Gpr = Gpr(2);
    pub const R3: Gpr = Gpr(3);
    /// Scratch register; holds the syscall number and the CAS expected value.
    pub const SR: Gpr = Gpr(13);
    /// Return pointer.
    pub const RP: Gpr = Gpr(15);

    pub const COUNT: usize = 16;

    /// Register named by the low nibble of `n`.
    pub const fn from_nibble(n: usize) -> Gpr {
        Gpr((n & 0xf) as u8)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Width of a memory access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    /// Width of a machine word.
    pub const fn word() -> Width {
        match WORD_SIZE {
            8 => Width::W64,
            4 => Width::W32,
            2 => Width::W16,
            _ => Width::W8,
        }
    }

    pub const fn bytes(self) -> usize {
        match self {
            Width::W8 => 1,
            Width::W16 => 2,
            Width::W32 => 4,
            Width::W64 => 8,
        }
    }

    /// Truncates `value` to this width.
    pub const fn mask(self, value: u64) -> u64 {
        match self {
            Width::W64 => value,
            _ => value & ((1u64 << (self.bytes() * 8)) - 1),
        }
    }
}

pub trait Machine {
    /// Id of the core executing the caller.
    fn core_id(&self) -> usize;

    /// Opcode of the instruction that raised the current sysop fault.
    fn sysopcode(&self) -> usize;

    /// Data address of the current fault.
    fn fault_addr(&self) -> usize;

    /// Reads a register of the trapped user context, which stays live in
    /// the user register bank while the handler runs.
    fn gpr(&self, reg: Gpr) -> usize;

    /// Writes a register of the trapped user context.
    fn set_gpr(&self, reg: Gpr, value: usize);

    /// Atomically swaps `value` with the word at `addr` and returns the
    /// previous word. Memory-mapped devices interpret this as a command.
    ///
    /// # Safety
    ///
    /// `addr` must be word aligned and refer to memory or a device the
    /// caller owns.
    unsafe fn ldst(&self, addr: usize, value: usize) -> usize;

    /// # Safety
    ///
    /// `addr` must be valid for a read of `width` and aligned to it.
    unsafe fn load(&self, addr: usize, width: Width) -> u64;

    /// # Safety
    ///
    /// `addr` must be valid for a write of `width` and aligned to it.
    unsafe fn store(&self, addr: usize, width: Width, value: u64);

    /// Copies `len` bytes from `src` to `dst`. The ranges must not overlap.
    ///
    /// # Safety
    ///
    /// Both ranges must be valid for `len` bytes.
    unsafe fn copy(&self, dst: usize, src: usize, len: usize);

    /// # Safety
    ///
    /// `addr..addr + buf.len()` must be valid for reads.
    unsafe fn read_bytes(&self, addr: usize, buf: &mut [u8]);

    /// # Safety
    ///
    /// `addr..addr + buf.len()` must be valid for writes.
    unsafe fn write_bytes(&self, addr: usize, buf: &[u8]);

    /// Points the sysop fault vector at `handler`.
    fn set_trap_vector(&self, handler: usize);

    /// Sets the kernel space limit: caching is enabled below `limit`.
    fn set_kernel_space_limit(&self, limit: usize);

    /// Location of the park routine in the BIOS image.
    fn park_routine(&self) -> Range<usize>;

    /// End of the BIOS image in memory.
    fn image_end(&self) -> usize;

    /// Halts the calling core for good.
    fn park(&self) -> !;
}
