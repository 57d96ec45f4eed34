// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Polled UART.
//!
//! Commands are an `ldst` of a command word to the UART address: the two top
//! bits select the command and the low 30 bits carry its argument. A plain
//! word store to the same address transmits a character and a plain load
//! receives one.

use kernel::hil::uart::Console;
use kernel::platform::{Machine, Width};
use kernel::utilities::registers::{register_bitfields, FieldValue};

register_bitfields![u32,
    COMMAND [
        ARG OFFSET(0) NUMBITS(30) [],
        CMD OFFSET(30) NUMBITS(2) [
            GetBufferUsage = 0,
            SetInterrupt = 1,
            SetSpeed = 2
        ]
    ]
];

/// Argument of `GetBufferUsage` selecting the transmit buffer; 0 selects
/// the receive buffer.
const TX_BUFFER: u32 = 1;
const RX_BUFFER: u32 = 0;

pub struct Uart<'a, M: Machine> {
    machine: &'a M,
    base: usize,
}

impl<'a, M: Machine> Uart<'a, M> {
    pub const fn new(machine: &'a M, base: usize) -> Uart<'a, M> {
        Uart { machine, base }
    }

    fn command(&self, command: FieldValue<u32, COMMAND::Register>) -> usize {
        // SAFETY: `base` is the UART command word.
        unsafe { self.machine.ldst(self.base, command.value as usize) }
    }

    pub fn init(&self, baud_rate: u32) {
        self.command(COMMAND::CMD::SetSpeed + COMMAND::ARG.val(baud_rate));
    }

    fn buffer_usage(&self, buffer: u32) -> usize {
        self.command(COMMAND::CMD::GetBufferUsage + COMMAND::ARG.val(buffer))
    }
}

impl<M: Machine> Console for Uart<'_, M> {
    fn transmit(&self, bytes: &[u8]) -> usize {
        for (n, &byte) in bytes.iter().enumerate() {
            if self.buffer_usage(TX_BUFFER) != 0 {
                return n;
            }
            // SAFETY: a store to the UART address queues one character.
            unsafe { self.machine.store(self.base, Width::word(), byte as u64) };
        }
        bytes.len()
    }

    fn receive(&self, buf: &mut [u8]) -> usize {
        for (n, slot) in buf.iter_mut().enumerate() {
            if self.buffer_usage(RX_BUFFER) == 0 {
                return n;
            }
            // SAFETY: a load from the UART address dequeues one character.
            *slot = unsafe { self.machine.load(self.base, Width::word()) } as u8;
        }
        buf.len()
    }
}
