// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Device table.
//!
//! The table lists the devices mapped in the low address space, in address
//! order starting at 0. Each entry is two words: the device id and a flags
//! word giving whether the device raises interrupts and how many words it
//! maps. The entry with a zero map size ends the table.

use core::ops::Range;

use kernel::platform::{Machine, Width, WORD_SIZE};
use kernel::utilities::registers::{register_bitfields, LocalRegisterCopy};

#[cfg(target_pointer_width = "64")]
register_bitfields![usize,
    FLAGS [
        USEINTR OFFSET(0) NUMBITS(1) [],
        MAPSZ OFFSET(2) NUMBITS(61) []
    ]
];

#[cfg(not(target_pointer_width = "64"))]
register_bitfields![usize,
    FLAGS [
        USEINTR OFFSET(0) NUMBITS(1) [],
        MAPSZ OFFSET(2) NUMBITS(30) []
    ]
];

/// Device id of RAM devices.
pub const RAM_DEVICE_ID: usize = 1;

const ENTRY_SIZE: usize = 2 * WORD_SIZE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Device {
    /// Address of the table entry.
    pub entry: usize,
    pub id: usize,
    /// Address the device is mapped at.
    pub addr: usize,
    /// Mapping size in words.
    pub map_words: usize,
    /// Index at the interrupt controller, for devices raising interrupts.
    pub interrupt: Option<usize>,
}

impl Device {
    pub fn map_bytes(&self) -> usize {
        self.map_words * WORD_SIZE
    }
}

pub struct DeviceTable<'a, M: Machine> {
    machine: &'a M,
    base: usize,
}

impl<'a, M: Machine> DeviceTable<'a, M> {
    pub const fn new(machine: &'a M, base: usize) -> DeviceTable<'a, M> {
        DeviceTable { machine, base }
    }

    fn word(&self, addr: usize) -> usize {
        // SAFETY: the table is read-only memory owned by the SoC.
        unsafe { self.machine.load(addr, Width::word()) as usize }
    }

    pub fn iter(&self) -> Devices<'_, 'a, M> {
        Devices {
            table: self,
            entry: self.base,
            addr: 0,
            interrupts: 0,
        }
    }

    /// Finds the first device with `id` whose table entry is at or after
    /// `from`; `None` starts at the first entry.
    pub fn find(&self, id: usize, from: Option<usize>) -> Option<Device> {
        self.iter()
            .find(|dev| dev.id == id && from.map_or(true, |from| dev.entry >= from))
    }

    /// Whether a single device with `id` maps all of `range`.
    pub fn covers(&self, id: usize, range: Range<usize>) -> bool {
        self.iter().any(|dev| {
            dev.id == id && dev.addr <= range.start && range.end <= dev.addr + dev.map_bytes()
        })
    }
}

pub struct Devices<'t, 'a, M: Machine> {
    table: &'t DeviceTable<'a, M>,
    entry: usize,
    addr: usize,
    interrupts: usize,
}

impl<M: Machine> Iterator for Devices<'_, '_, M> {
    type Item = Device;

    fn next(&mut self) -> Option<Device> {
        let flags = LocalRegisterCopy::<usize, FLAGS::Register>::new(
            self.table.word(self.entry + WORD_SIZE),
        );
        let map_words = flags.read(FLAGS::MAPSZ);
        if map_words == 0 {
            return None;
        }
        let interrupt = if flags.is_set(FLAGS::USEINTR) {
            self.interrupts += 1;
            Some(self.interrupts - 1)
        } else {
            None
        };
        let dev = Device {
            entry: self.entry,
            id: self.table.word(self.entry),
            addr: self.addr,
            map_words,
            interrupt,
        };
        self.addr += dev.map_bytes();
        self.entry += ENTRY_SIZE;
        Some(dev)
    }
}
