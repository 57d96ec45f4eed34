// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Block device controller.
//!
//! The controller decodes four command words at its base address; each
//! command is an `ldst` of its argument to the command word:
//!
//! | Offset | Command | Argument           | Returns        |
//! |--------|---------|--------------------|----------------|
//! | 0      | RESET   | 1 resets, 0 polls  | status         |
//! | W      | SWAP    | -                  | -              |
//! | 2W     | READ    | block index        | capacity       |
//! | 3W     | WRITE   | block index        | -              |
//!
//! The controller owns one block buffer and presents another one, the data
//! window, at its base address. READ fills the internal buffer from the
//! disk, WRITE stores the internal buffer to the disk, and SWAP exchanges
//! the internal buffer with the window. READ and WRITE leave the controller
//! busy until the disk access is done.
//!
//! This is what the two-call transfers of [`BlockDevice`] build on: the first
//! call of a read issues READ and returns, the second swaps the loaded block
//! into the window and copies it out, optionally issuing the READ of the
//! next block before copying so that the disk works while the CPU copies.

use core::cell::Cell;

use kernel::hil::block_storage::{BlockDevice, Status, BLOCK_SIZE};
use kernel::platform::{Machine, WORD_SIZE};
use kernel::utilities::registers::{register_bitfields, LocalRegisterCopy};
use kernel::ErrorCode;

register_bitfields![u32,
    STATUS [
        STATE OFFSET(0) NUMBITS(2) [
            PowerOff = 0,
            Ready = 1,
            Busy = 2,
            Error = 3
        ]
    ]
];

type StatusVal = LocalRegisterCopy<u32, STATUS::Register>;

#[derive(Clone, Copy)]
#[repr(usize)]
enum Command {
    Reset = 0,
    Swap = 1,
    Read = 2,
    Write = 3,
}

/// Buffer and block of a transfer started by a previous call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct InFlight {
    buf: usize,
    idx: usize,
}

pub struct BlkDev<'a, M: Machine> {
    machine: &'a M,
    base: usize,
    block_count: Cell<usize>,
    pending_read: Cell<Option<InFlight>>,
    pending_write: Cell<Option<InFlight>>,
    busy_hook: Cell<Option<fn()>>,
}

impl<'a, M: Machine> BlkDev<'a, M> {
    pub const fn new(machine: &'a M, base: usize) -> BlkDev<'a, M> {
        BlkDev {
            machine,
            base,
            block_count: Cell::new(0),
            pending_read: Cell::new(None),
            pending_write: Cell::new(None),
            busy_hook: Cell::new(None),
        }
    }

    /// Sets a function called every time a poll finds the controller busy,
    /// for instance to service an interrupt controller while waiting.
    pub fn set_busy_hook(&self, hook: Option<fn()>) {
        self.busy_hook.set(hook);
    }

    fn command(&self, command: Command, arg: usize) -> usize {
        // SAFETY: `base` is the controller's command block.
        unsafe {
            self.machine
                .ldst(self.base + command as usize * WORD_SIZE, arg)
        }
    }

    fn wait_ready(&self) -> Result<(), ErrorCode> {
        while self.is_ready()? == Status::Busy {}
        Ok(())
    }

    fn forget_transfers(&self) {
        self.pending_read.set(None);
        self.pending_write.set(None);
    }

    fn reset_and_load(&self, idx: usize) -> Result<(), ErrorCode> {
        self.command(Command::Reset, 1);
        self.wait_ready()?;
        // READ answers with the capacity.
        self.block_count.set(self.command(Command::Read, idx));
        self.wait_ready()?;
        self.command(Command::Swap, 0);
        self.forget_transfers();
        Ok(())
    }
}

impl<M: Machine> BlockDevice for BlkDev<'_, M> {
    fn init(&self, idx: usize) -> Result<(), ErrorCode> {
        self.reset_and_load(idx).inspect_err(|_| self.block_count.set(0))
    }

    fn block_count(&self) -> usize {
        self.block_count.get()
    }

    fn is_ready(&self) -> Result<Status, ErrorCode> {
        use STATUS::STATE::Value;

        let raw = self.command(Command::Reset, 0);
        // Only the four status codes are meaningful; anything else is taken
        // as the controller still working.
        let state = u32::try_from(raw)
            .ok()
            .filter(|&raw| raw <= 3)
            .and_then(|raw| StatusVal::new(raw).read_as_enum(STATUS::STATE));
        match state {
            Some(Value::Ready) => Ok(Status::Ready),
            Some(Value::PowerOff) => Err(ErrorCode::OFF),
            Some(Value::Error) => Err(ErrorCode::FAIL),
            Some(Value::Busy) | None => {
                if let Some(hook) = self.busy_hook.get() {
                    hook();
                }
                Ok(Status::Busy)
            }
        }
    }

    fn window(&self) -> usize {
        self.base
    }

    unsafe fn read(&self, buf: usize, idx: usize, prefetch: bool) -> usize {
        if self.pending_read.get() != Some(InFlight { buf, idx }) {
            self.pending_write.set(None);
            self.command(Command::Read, idx);
            self.pending_read.set(Some(InFlight { buf, idx }));
            return 0;
        }

        self.command(Command::Swap, 0);
        if prefetch {
            self.command(Command::Read, idx + 1);
            self.pending_read.set(Some(InFlight {
                buf: buf + BLOCK_SIZE,
                idx: idx + 1,
            }));
        } else {
            self.pending_read.set(None);
        }
        self.machine.copy(buf, self.base, BLOCK_SIZE);
        1
    }

    unsafe fn write(&self, buf: usize, idx: usize, prefetch: bool) {
        // A continued write already has its data staged in the window.
        if self.pending_write.get() != Some(InFlight { buf, idx }) {
            self.pending_read.set(None);
            self.machine.copy(self.base, buf, BLOCK_SIZE);
        }

        self.command(Command::Swap, 0);
        self.command(Command::Write, idx);
        if prefetch {
            let next = buf + BLOCK_SIZE;
            self.machine.copy(self.base, next, BLOCK_SIZE);
            self.pending_write.set(Some(InFlight {
                buf: next,
                idx: idx + 1,
            }));
        } else {
            self.pending_write.set(None);
        }
    }

    fn copy(&self, dst: usize, src: usize, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        self.forget_transfers();

        // Walk from the top when moving up so that overlapping source blocks
        // are read before being overwritten.
        let descending = dst > src;
        for n in 0..count {
            let step = if descending { count - 1 - n } else { n };
            self.command(Command::Read, src + step);
            if self.wait_ready().is_err() {
                return 0;
            }
            self.command(Command::Write, dst + step);
            if self.wait_ready().is_err() {
                return 0;
            }
        }
        count
    }
}
