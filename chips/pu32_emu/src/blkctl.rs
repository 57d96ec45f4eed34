// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Model of the block device controller.
//!
//! READ and WRITE are queued and take effect when the controller leaves the
//! busy state, which happens on the `latency`-th status poll after the
//! command. Commands that touch the internal buffer while a transfer is in
//! flight are counted as protocol violations.

use kernel::hil::block_storage::BLOCK_SIZE;

pub(crate) const COMMAND_COUNT: usize = 4;

/// Status codes reported by the RESET command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum ControllerState {
    PowerOff = 0,
    Ready = 1,
    Busy = 2,
    Error = 3,
}

/// A disk access performed by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transfer {
    Read(usize),
    Write(usize),
}

pub(crate) struct BlockController {
    pub(crate) disk: Vec<[u8; BLOCK_SIZE]>,
    pub(crate) window: [u8; BLOCK_SIZE],
    buffer: [u8; BLOCK_SIZE],
    pub(crate) state: ControllerState,
    pub(crate) powered: bool,
    pub(crate) latency: usize,
    countdown: usize,
    pending: Option<Transfer>,
    pub(crate) log: Vec<Transfer>,
    pub(crate) violations: usize,
}

impl BlockController {
    pub(crate) fn new(disk: Vec<[u8; BLOCK_SIZE]>, latency: usize) -> BlockController {
        BlockController {
            disk,
            window: [0; BLOCK_SIZE],
            buffer: [0; BLOCK_SIZE],
            state: ControllerState::PowerOff,
            powered: true,
            latency,
            countdown: 0,
            pending: None,
            log: Vec::new(),
            violations: 0,
        }
    }

    pub(crate) fn command(&mut self, command: usize, arg: usize) -> usize {
        match command {
            0 => self.reset(arg),
            1 => {
                self.check_idle();
                core::mem::swap(&mut self.window, &mut self.buffer);
                0
            }
            2 => {
                self.start(Transfer::Read(arg));
                self.disk.len()
            }
            3 => {
                self.start(Transfer::Write(arg));
                0
            }
            _ => 0,
        }
    }

    fn reset(&mut self, arg: usize) -> usize {
        if !self.powered {
            self.state = ControllerState::PowerOff;
        } else if arg == 1 {
            self.pending = None;
            self.state = ControllerState::Ready;
        } else if self.state == ControllerState::Busy {
            self.countdown = self.countdown.saturating_sub(1);
            if self.countdown == 0 {
                self.complete();
            }
        }
        self.state as usize
    }

    fn check_idle(&mut self) {
        if self.state == ControllerState::Busy {
            self.violations += 1;
        }
    }

    fn start(&mut self, transfer: Transfer) {
        self.check_idle();
        if self.state == ControllerState::PowerOff {
            return;
        }
        let (Transfer::Read(idx) | Transfer::Write(idx)) = transfer;
        if idx >= self.disk.len() {
            self.state = ControllerState::Error;
            return;
        }
        self.pending = Some(transfer);
        self.state = ControllerState::Busy;
        self.countdown = self.latency;
        if self.countdown == 0 {
            self.complete();
        }
    }

    fn complete(&mut self) {
        if let Some(transfer) = self.pending.take() {
            match transfer {
                Transfer::Read(idx) => self.buffer = self.disk[idx],
                Transfer::Write(idx) => self.disk[idx] = self.buffer,
            }
            self.log.push(transfer);
        }
        self.state = ControllerState::Ready;
    }
}
