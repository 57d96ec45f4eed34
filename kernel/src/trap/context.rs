// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Operand access for trap handlers.

use crate::platform::{Gpr, Machine};

/// Register file of a trapped context, as pushed by the trap shim.
///
/// The shim pushes `%1` to `%15` in ascending order onto a descending stack
/// and then the pre-trap stack pointer, so slot `15 - n` holds `%n`. The
/// layout is shared with the assembly shim and must not change.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegisterContext {
    slots: [usize; Gpr::COUNT],
}

impl RegisterContext {
    pub const fn new() -> RegisterContext {
        RegisterContext {
            slots: [0; Gpr::COUNT],
        }
    }

    /// Builds a context from register values indexed by register number.
    pub fn from_registers(regs: [usize; Gpr::COUNT]) -> RegisterContext {
        let mut ctx = RegisterContext::new();
        for (n, value) in regs.into_iter().enumerate() {
            ctx.set(Gpr::from_nibble(n), value);
        }
        ctx
    }

    pub fn get(&self, reg: Gpr) -> usize {
        self.slots[Gpr::COUNT - 1 - reg.index()]
    }

    pub fn set(&mut self, reg: Gpr, value: usize) {
        self.slots[Gpr::COUNT - 1 - reg.index()] = value;
    }

    /// Copies the live registers of the trapped context.
    pub fn capture<M: Machine + ?Sized>(machine: &M) -> RegisterContext {
        let mut ctx = RegisterContext::new();
        for n in 0..Gpr::COUNT {
            let reg = Gpr::from_nibble(n);
            ctx.set(reg, machine.gpr(reg));
        }
        ctx
    }

    /// Writes the context back to the live registers. The stack pointer goes
    /// last since a handler may have moved it.
    pub fn restore<M: Machine + ?Sized>(&self, machine: &M) {
        for n in (1..Gpr::COUNT).rev() {
            let reg = Gpr::from_nibble(n);
            machine.set_gpr(reg, self.get(reg));
        }
        machine.set_gpr(Gpr::SP, self.get(Gpr::SP));
    }
}

/// Where a trap handler finds the operands of the faulting instruction.
pub enum RegisterAccess<'a, M: Machine + ?Sized> {
    /// User trap: operands are still in the user register bank.
    Live(&'a M),
    /// Kernel trap: operands were saved by the shim and are restored from the
    /// context on return.
    Captured(&'a mut RegisterContext),
}

impl<M: Machine + ?Sized> RegisterAccess<'_, M> {
    pub fn read(&self, reg: Gpr) -> usize {
        match self {
            RegisterAccess::Live(machine) => machine.gpr(reg),
            RegisterAccess::Captured(ctx) => ctx.get(reg),
        }
    }

    pub fn write(&mut self, reg: Gpr, value: usize) {
        match self {
            RegisterAccess::Live(machine) => machine.set_gpr(reg, value),
            RegisterAccess::Captured(ctx) => ctx.set(reg, value),
        }
    }

    /// Memory operand of the faulting instruction. A captured context holds
    /// the address register; for a user fault the core latched the address
    /// in its fault address register.
    pub fn address(&self, reg: Gpr) -> usize {
        match self {
            RegisterAccess::Live(machine) => machine.fault_addr(),
            RegisterAccess::Captured(ctx) => ctx.get(reg),
        }
    }

    pub fn is_captured(&self) -> bool {
        matches!(self, RegisterAccess::Captured(_))
    }
}
