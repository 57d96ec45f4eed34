// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! System calls served by the BIOS.
//!
//! The BIOS answers the four calls a kernel needs before it has drivers of its
//! own: console I/O, and block I/O on the boot device seen as one file with
//! a per-core cursor. The syscall number is in `%sr`, arguments in `%1` to
//! `%3`, and the result goes back in `%1`, with `-1` for any failure.
//!
//! Storage transfers count in blocks, not bytes: a `read()` or `write()` on
//! the storage descriptor moves at most one 512-byte block per call and
//! returns 0 while the controller is still busy, in which case the caller
//! retries with the same arguments.
//!
//! Syscall numbers and file descriptors must match what loaded kernels use.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::config::CONFIG;
use crate::hil::block_storage::{BlockDevice, Status};
use crate::hil::uart::Console;
use crate::platform::{Gpr, Machine};
use crate::trap::context::RegisterAccess;
use crate::utilities::mutex::Mutex;
use crate::ErrorCode;

/// Syscall numbers, following the generic Linux table.
pub mod number {
    /// Size of the generic Linux syscall table.
    const LINUX_SYSCALL_COUNT: usize = 441;
    /// First PU32 specific number; the two before it are settls and gettls.
    const PU32_SYSCALL_START: usize = LINUX_SYSCALL_COUNT + 2;

    pub const LSEEK: usize = PU32_SYSCALL_START;
    pub const READ: usize = 63;
    pub const WRITE: usize = 64;
    pub const EXIT: usize = 93;
}

/// File descriptors known to the BIOS.
pub mod fd {
    pub const STDOUT: usize = 1;
    pub const STDERR: usize = 2;
    pub const STDIN: usize = 4;
    pub const STORAGE: usize = 5;
    pub const NETWORK: usize = 6;
    pub const INTCTRL: usize = 7;
}

/// Reference point of an `lseek()` offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

impl TryFrom<usize> for Whence {
    type Error = ErrorCode;

    fn try_from(whence: usize) -> Result<Whence, ErrorCode> {
        match whence {
            0 => Ok(Whence::Set),
            1 => Ok(Whence::Cur),
            2 => Ok(Whence::End),
            _ => Err(ErrorCode::INVAL),
        }
    }
}

/// Value returned in `%1` for a failed call.
pub const SYSCALL_ERROR: usize = usize::MAX;

#[derive(Clone, Copy)]
enum Direction {
    Read,
    Write,
}

/// Bytes moved per console access.
const CONSOLE_CHUNK: usize = 64;

pub struct SyscallHandler<'a, M: Machine, B: BlockDevice, C: Console, const CORES: usize> {
    machine: &'a M,
    storage: &'a Mutex<B>,
    console: &'a Mutex<C>,
    /// Storage cursor of each core, in blocks.
    cursors: [AtomicUsize; CORES],
    /// Device table word that reports the exit status.
    exit_port: usize,
}

impl<'a, M: Machine, B: BlockDevice, C: Console, const CORES: usize>
    SyscallHandler<'a, M, B, C, CORES>
{
    pub fn new(
        machine: &'a M,
        storage: &'a Mutex<B>,
        console: &'a Mutex<C>,
        exit_port: usize,
    ) -> SyscallHandler<'a, M, B, C, CORES> {
        SyscallHandler {
            machine,
            storage,
            console,
            cursors: [const { AtomicUsize::new(0) }; CORES],
            exit_port,
        }
    }

    pub fn storage(&self) -> &'a Mutex<B> {
        self.storage
    }

    pub fn console(&self) -> &'a Mutex<C> {
        self.console
    }

    /// Current storage cursor of `core`.
    pub fn cursor(&self, core: usize) -> Option<usize> {
        self.cursors.get(core).map(|c| c.load(Ordering::Relaxed))
    }

    /// Serves the syscall held in `regs` and stores its result in `%1`.
    pub fn handle(&self, regs: &mut RegisterAccess<'_, M>) {
        let number = regs.read(Gpr::SR);
        let r1 = regs.read(Gpr::R1);
        let r2 = regs.read(Gpr::R2);
        let r3 = regs.read(Gpr::R3);

        let result = match number {
            number::LSEEK => self.lseek(r1, r2, r3),
            number::READ => self.read(r1, r2, r3),
            number::WRITE => self.write(r1, r2, r3),
            number::EXIT => Ok(self.exit(r1)),
            _ => Err(ErrorCode::NOSUPPORT),
        };

        if CONFIG.trace_syscalls {
            debug!(
                "[{}] syscall {}({:#x}, {:#x}, {:#x}) = {:?}",
                self.machine.core_id(),
                number,
                r1,
                r2,
                r3,
                result
            );
        }

        regs.write(Gpr::R1, result.unwrap_or(SYSCALL_ERROR));
    }

    fn core_cursor(&self) -> Result<&AtomicUsize, ErrorCode> {
        self.cursors
            .get(self.machine.core_id())
            .ok_or(ErrorCode::INVAL)
    }

    fn lseek(&self, fd: usize, offset: usize, whence: usize) -> Result<usize, ErrorCode> {
        let cursor = self.core_cursor()?;
        if fd != fd::STORAGE {
            return Err(ErrorCode::BADFD);
        }
        let blocks = self.storage.lock().block_count();

        // Offsets are unsigned words: a negative offset wraps around, and any
        // position outside of the device is rejected.
        let position = match Whence::try_from(whence)? {
            Whence::Set => offset,
            Whence::Cur => cursor.load(Ordering::Relaxed).wrapping_add(offset),
            Whence::End => blocks.wrapping_add(offset),
        };
        if position >= blocks {
            return Err(ErrorCode::RANGE);
        }
        cursor.store(position, Ordering::Relaxed);
        Ok(position)
    }

    fn read(&self, fd: usize, buf: usize, count: usize) -> Result<usize, ErrorCode> {
        match fd {
            fd::STDIN => Ok(self.console_read(buf, count)),
            fd::STORAGE => self.storage_transfer(Direction::Read, buf, count),
            _ => Err(ErrorCode::BADFD),
        }
    }

    fn write(&self, fd: usize, buf: usize, count: usize) -> Result<usize, ErrorCode> {
        match fd {
            fd::STDOUT | fd::STDERR => Ok(self.console_write(buf, count)),
            fd::STORAGE => self.storage_transfer(Direction::Write, buf, count),
            _ => Err(ErrorCode::BADFD),
        }
    }

    fn exit(&self, status: usize) -> usize {
        // SAFETY: the exit port is a device table word owned by the BIOS.
        unsafe { self.machine.ldst(self.exit_port, status) }
    }

    fn console_read(&self, buf: usize, count: usize) -> usize {
        let console = self.console.lock();
        let mut chunk = [0u8; CONSOLE_CHUNK];
        let mut done = 0;
        while done < count {
            let want = (count - done).min(CONSOLE_CHUNK);
            let n = console.receive(&mut chunk[..want]);
            // SAFETY: the caller handed `buf..buf + count` to the BIOS.
            unsafe { self.machine.write_bytes(buf + done, &chunk[..n]) };
            done += n;
            if n < want {
                break;
            }
        }
        done
    }

    fn console_write(&self, buf: usize, count: usize) -> usize {
        let console = self.console.lock();
        let mut chunk = [0u8; CONSOLE_CHUNK];
        let mut done = 0;
        while done < count {
            let want = (count - done).min(CONSOLE_CHUNK);
            // SAFETY: the caller handed `buf..buf + count` to the BIOS.
            unsafe { self.machine.read_bytes(buf + done, &mut chunk[..want]) };
            let n = console.transmit(&chunk[..want]);
            done += n;
            if n < want {
                break;
            }
        }
        done
    }

    /// One step of a block transfer at the calling core's cursor. Returns the
    /// number of blocks completed, 0 while the controller is busy.
    fn storage_transfer(
        &self,
        direction: Direction,
        buf: usize,
        count: usize,
    ) -> Result<usize, ErrorCode> {
        if count == 0 {
            return Ok(0);
        }
        let cursor = self.core_cursor()?;
        let dev = self.storage.lock();

        let idx = cursor.load(Ordering::Relaxed);
        if idx >= dev.block_count() {
            return Err(ErrorCode::RANGE);
        }
        match dev.is_ready() {
            Ok(Status::Ready) => {}
            Ok(Status::Busy) => return Ok(0),
            // A faulted controller gets one reset before giving up.
            Err(_) => dev.init(0)?,
        }

        let prefetch = count > 1;
        // SAFETY: the caller handed the buffer to the BIOS; with `prefetch`
        // it spans at least two blocks.
        let done = match direction {
            Direction::Read => unsafe { dev.read(buf, idx, prefetch) },
            Direction::Write => {
                unsafe { dev.write(buf, idx, prefetch) };
                1
            }
        };
        cursor.store(idx + done, Ordering::Relaxed);
        Ok(done)
    }
}
