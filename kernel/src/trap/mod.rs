// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Sysop fault handling.
//!
//! The core raises a sysop fault for the `syscall` instruction and for every
//! instruction it leaves to software: the `cldst` compare-and-swap family and
//! single precision float arithmetic. All of them land on one vector. The
//! handler always runs on the kernel register bank. A fault raised in kernel
//! mode therefore has its register file saved by the architecture's shim
//! before the handler clobbers it, while the operands of a fault raised in
//! user mode stay in the user bank and are reached through [`Machine::gpr`].
//! [`TrapHandler::dispatch`] decodes the opcode class and runs the matching
//! emulation against the captured or live registers.
//!
//! [`TrapHandler::enter`] performs the whole shim sequence through the
//! [`Machine`] interface, for machines where the shim is not written in
//! assembly and [`Machine::gpr`] reaches the faulting context of either
//! mode, such as a simulated core with one register bank.

pub mod cldst;
pub mod context;
pub mod float;

use core::fmt::Write;

use crate::debug::ConsoleFmt;
use crate::hil::block_storage::BlockDevice;
use crate::hil::uart::Console;
use crate::platform::Machine;
use crate::syscall::SyscallHandler;
use crate::trap::cldst::CompareAndSwap;
use crate::trap::context::{RegisterAccess, RegisterContext};

/// Mode the core was in when it faulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapOrigin {
    User,
    Kernel,
}

impl TrapOrigin {
    /// Offset from the vector base at which user-mode faults enter.
    pub const USER_ENTRY: usize = 0;
    /// Offset from the vector base at which kernel-mode faults enter.
    pub const KERNEL_ENTRY: usize = 4;

    pub fn from_entry_offset(offset: usize) -> Option<TrapOrigin> {
        match offset {
            TrapOrigin::USER_ENTRY => Some(TrapOrigin::User),
            TrapOrigin::KERNEL_ENTRY => Some(TrapOrigin::Kernel),
            _ => None,
        }
    }

    /// Whether the shim saves the register file for this origin. Only the
    /// kernel bank is shared with the handler.
    pub fn captures_context(self) -> bool {
        self == TrapOrigin::Kernel
    }
}

/// Instruction class of a sysop fault, from the low opcode byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpcodeClass {
    Syscall,
    CompareAndSwap,
    Float,
    Unknown,
}

impl OpcodeClass {
    pub fn decode(opcode: usize) -> OpcodeClass {
        // The order matters: the cldst opcodes also match the float mask.
        if opcode == 0x01 {
            OpcodeClass::Syscall
        } else if opcode & 0xfc == 0xfc {
            OpcodeClass::CompareAndSwap
        } else if opcode & 0xd8 == 0xd8 {
            OpcodeClass::Float
        } else {
            OpcodeClass::Unknown
        }
    }
}

pub struct TrapHandler<
    'a,
    M: Machine,
    B: BlockDevice,
    C: Console,
    const CORES: usize,
    const SHARDS: usize,
> {
    machine: &'a M,
    syscalls: SyscallHandler<'a, M, B, C, CORES>,
    cldst: CompareAndSwap<SHARDS>,
}

impl<'a, M: Machine, B: BlockDevice, C: Console, const CORES: usize, const SHARDS: usize>
    TrapHandler<'a, M, B, C, CORES, SHARDS>
{
    pub fn new(
        machine: &'a M,
        syscalls: SyscallHandler<'a, M, B, C, CORES>,
    ) -> TrapHandler<'a, M, B, C, CORES, SHARDS> {
        TrapHandler {
            machine,
            syscalls,
            cldst: CompareAndSwap::new(),
        }
    }

    pub fn syscalls(&self) -> &SyscallHandler<'a, M, B, C, CORES> {
        &self.syscalls
    }

    /// Runs the handler for `opcode` against the faulting context.
    ///
    /// Returns once the emulated instruction has completed; unknown opcodes
    /// never return.
    pub fn dispatch(&self, regs: &mut RegisterAccess<'_, M>, opcode: usize) {
        let handled = match OpcodeClass::decode(opcode) {
            OpcodeClass::Syscall => {
                self.syscalls.handle(regs);
                Ok(())
            }
            OpcodeClass::CompareAndSwap => self.cldst.execute(self.machine, regs, opcode),
            OpcodeClass::Float => float::execute(regs, opcode),
            OpcodeClass::Unknown => Err(crate::ErrorCode::NOSUPPORT),
        };
        if handled.is_err() {
            self.bad_opcode(opcode);
        }
    }

    /// Entry and exit sequence of the shim for a fault that entered at
    /// `origin`.
    pub fn enter(&self, origin: TrapOrigin) {
        let opcode = self.machine.sysopcode();
        if origin.captures_context() {
            let mut ctx = RegisterContext::capture(self.machine);
            self.dispatch(&mut RegisterAccess::Captured(&mut ctx), opcode);
            ctx.restore(self.machine);
        } else {
            self.dispatch(&mut RegisterAccess::Live(self.machine), opcode);
        }
    }

    fn bad_opcode(&self, opcode: usize) -> ! {
        {
            let console = self.syscalls.console().lock();
            let _ = write!(
                ConsoleFmt(&*console),
                "badopcode: {:02x} {:02x}\n",
                opcode & 0xff,
                (opcode >> 8) & 0xff
            );
        }
        self.machine.park()
    }
}
