// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Emulation of the `cldst` compare-and-swap instructions.
//!
//! `cldstN %a, %b` compares the N-bit value at the address in `%b` with
//! `%sr`, stores `%a` there if they are equal, and always returns the value
//! previously in memory in `%a`. The core has no atomic read-modify-write for
//! these widths, so the BIOS serializes every emulated access to a given
//! address with a ticket lock picked by hashing the word address.

use crate::platform::{Gpr, Machine, Width, WORD_SIZE};
use crate::trap::context::RegisterAccess;
use crate::utilities::mutex::TicketLock;
use crate::ErrorCode;

/// Access width encoded by the low opcode byte, limited to the widths the
/// native word can hold.
pub fn width(opcode: usize) -> Option<Width> {
    match opcode & 0xff {
        0xfc => Some(Width::W8),
        0xfd => Some(Width::W16),
        #[cfg(any(target_pointer_width = "32", target_pointer_width = "64"))]
        0xfe => Some(Width::W32),
        #[cfg(target_pointer_width = "64")]
        0xff => Some(Width::W64),
        _ => None,
    }
}

/// Locks serializing emulated compare-and-swaps. Distinct addresses may share
/// a lock; that only costs contention.
pub struct CompareAndSwap<const SHARDS: usize> {
    shards: [TicketLock; SHARDS],
}

impl<const SHARDS: usize> CompareAndSwap<SHARDS> {
    pub const fn new() -> CompareAndSwap<SHARDS> {
        CompareAndSwap {
            shards: [const { TicketLock::new() }; SHARDS],
        }
    }

    fn shard(&self, addr: usize) -> &TicketLock {
        &self.shards[(addr / WORD_SIZE) % SHARDS]
    }

    /// Performs the compare-and-swap described by `opcode` on `regs`.
    ///
    /// Widths the native word cannot hold are reported as `NOSUPPORT` without
    /// touching memory or registers.
    pub fn execute<M: Machine + ?Sized>(
        &self,
        machine: &M,
        regs: &mut RegisterAccess<'_, M>,
        opcode: usize,
    ) -> Result<(), ErrorCode> {
        let width = width(opcode).ok_or(ErrorCode::NOSUPPORT)?;
        let value_reg = Gpr::from_nibble(opcode >> 12);
        let addr = regs.address(Gpr::from_nibble(opcode >> 8));
        let expected = regs.read(Gpr::SR) as u64;
        let new = regs.read(value_reg) as u64;

        let lock = self.shard(addr);
        lock.lock();
        // SAFETY: the faulting instruction named this address; the core
        // would have performed the same access.
        let old = unsafe { machine.load(addr, width) };
        // The expected value is compared untruncated, so a %sr wider than the
        // access never matches.
        if old == expected {
            unsafe { machine.store(addr, width, width.mask(new)) };
        }
        lock.unlock();

        regs.write(value_reg, old as usize);
        Ok(())
    }
}
