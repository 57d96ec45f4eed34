// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Model of the UART: an unbounded transmit log and a receive queue.

use std::collections::VecDeque;

#[derive(Default)]
pub(crate) struct UartModel {
    pub(crate) tx: Vec<u8>,
    pub(crate) rx: VecDeque<u8>,
    /// Number of upcoming transmit usage queries that report a full buffer.
    pub(crate) tx_stalls: usize,
    pub(crate) baud_rate: Option<usize>,
}

impl UartModel {
    pub(crate) fn command(&mut self, word: usize) -> usize {
        let arg = word & 0x3fff_ffff;
        match (word >> 30) & 0x3 {
            0 if arg == 1 => {
                if self.tx_stalls > 0 {
                    self.tx_stalls -= 1;
                    1
                } else {
                    0
                }
            }
            0 => self.rx.len(),
            2 => {
                self.baud_rate = Some(arg);
                0
            }
            _ => 0,
        }
    }
}
