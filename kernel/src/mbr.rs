// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Master boot record of the boot device.
//!
//! Block 0 holds 446 bytes of boot code followed by four 16-byte partition
//! entries. Each entry starts with two little-endian words packing a 24-bit
//! CHS address with an 8-bit field, then the first LBA and the sector count.

use core::ops::Range;

use crate::hil::block_storage::BLOCK_SIZE;
use crate::utilities::registers::{register_bitfields, LocalRegisterCopy};

pub const BOOT_CODE_SIZE: usize = 446;
pub const PARTITION_ENTRY_SIZE: usize = 16;
pub const PARTITION_COUNT: usize = 4;

register_bitfields![u32,
    CHS_BEGIN [
        ADDRESS OFFSET(0) NUMBITS(24) [],
        ATTR OFFSET(24) NUMBITS(8) []
    ],
    CHS_END [
        ADDRESS OFFSET(0) NUMBITS(24) [],
        TYPE OFFSET(24) NUMBITS(8) []
    ]
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartitionEntry {
    pub chs_begin: u32,
    pub attr: u8,
    pub chs_end: u32,
    pub kind: u8,
    pub lba_begin: u32,
    pub sector_count: u32,
}

fn le_word(raw: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]])
}

impl PartitionEntry {
    pub fn parse(raw: &[u8; PARTITION_ENTRY_SIZE]) -> PartitionEntry {
        let begin = LocalRegisterCopy::<u32, CHS_BEGIN::Register>::new(le_word(raw, 0));
        let end = LocalRegisterCopy::<u32, CHS_END::Register>::new(le_word(raw, 4));
        PartitionEntry {
            chs_begin: begin.read(CHS_BEGIN::ADDRESS),
            attr: begin.read(CHS_BEGIN::ATTR) as u8,
            chs_end: end.read(CHS_END::ADDRESS),
            kind: end.read(CHS_END::TYPE) as u8,
            lba_begin: le_word(raw, 8),
            sector_count: le_word(raw, 12),
        }
    }

    /// Encodes the entry as it is laid out on disk.
    pub fn to_bytes(&self) -> [u8; PARTITION_ENTRY_SIZE] {
        let begin =
            (CHS_BEGIN::ADDRESS.val(self.chs_begin) + CHS_BEGIN::ATTR.val(self.attr as u32)).value;
        let end = (CHS_END::ADDRESS.val(self.chs_end) + CHS_END::TYPE.val(self.kind as u32)).value;

        let mut raw = [0u8; PARTITION_ENTRY_SIZE];
        raw[0..4].copy_from_slice(&begin.to_le_bytes());
        raw[4..8].copy_from_slice(&end.to_le_bytes());
        raw[8..12].copy_from_slice(&self.lba_begin.to_le_bytes());
        raw[12..16].copy_from_slice(&self.sector_count.to_le_bytes());
        raw
    }

    /// Blocks spanned by the partition.
    pub fn blocks(&self) -> Range<usize> {
        let start = self.lba_begin as usize;
        start..start + self.sector_count as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MasterBootRecord {
    pub partitions: [PartitionEntry; PARTITION_COUNT],
}

impl MasterBootRecord {
    pub fn parse(block: &[u8; BLOCK_SIZE]) -> MasterBootRecord {
        let mut partitions = [PartitionEntry::default(); PARTITION_COUNT];
        for (n, entry) in partitions.iter_mut().enumerate() {
            let offset = BOOT_CODE_SIZE + n * PARTITION_ENTRY_SIZE;
            let mut raw = [0u8; PARTITION_ENTRY_SIZE];
            raw.copy_from_slice(&block[offset..offset + PARTITION_ENTRY_SIZE]);
            *entry = PartitionEntry::parse(&raw);
        }
        MasterBootRecord { partitions }
    }

    /// Writes the partition table into `block`, leaving the boot code alone.
    pub fn write_table(&self, block: &mut [u8; BLOCK_SIZE]) {
        for (n, entry) in self.partitions.iter().enumerate() {
            let offset = BOOT_CODE_SIZE + n * PARTITION_ENTRY_SIZE;
            block[offset..offset + PARTITION_ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
        }
    }

    pub fn partition(&self, idx: usize) -> Option<&PartitionEntry> {
        self.partitions.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::{MasterBootRecord, PartitionEntry, BOOT_CODE_SIZE};
    use crate::hil::block_storage::BLOCK_SIZE;

    #[test]
    fn parses_packed_fields() {
        let mut block = [0u8; BLOCK_SIZE];
        let third = BOOT_CODE_SIZE + 2 * 16;
        block[third..third + 16].copy_from_slice(&[
            0x01, 0x02, 0x03, 0x80, // chs_begin 0x030201, attr 0x80
            0x04, 0x05, 0x06, 0x83, // chs_end 0x060504, type 0x83
            100, 0, 0, 0, // lba_begin
            50, 0, 0, 0, // sect_cnt
        ]);

        let mbr = MasterBootRecord::parse(&block);
        let entry = mbr.partition(2).unwrap();
        assert_eq!(entry.chs_begin, 0x030201);
        assert_eq!(entry.attr, 0x80);
        assert_eq!(entry.chs_end, 0x060504);
        assert_eq!(entry.kind, 0x83);
        assert_eq!(entry.blocks(), 100..150);
        assert_eq!(mbr.partitions[0], PartitionEntry::default());
        assert!(mbr.partition(4).is_none());
    }

    #[test]
    fn table_encoding_matches_disk_layout() {
        let mut mbr = MasterBootRecord::default();
        mbr.partitions[1] = PartitionEntry {
            chs_begin: 0xabcdef,
            attr: 0x12,
            chs_end: 0x010203,
            kind: 0x0c,
            lba_begin: 0x11223344,
            sector_count: 7,
        };
        let mut block = [0xeeu8; BLOCK_SIZE];
        mbr.write_table(&mut block);

        assert_eq!(block[0], 0xee);
        let second = BOOT_CODE_SIZE + 16;
        assert_eq!(
            &block[second..second + 12],
            &[0xef, 0xcd, 0xab, 0x12, 0x03, 0x02, 0x01, 0x0c, 0x44, 0x33, 0x22, 0x11]
        );
        assert_eq!(MasterBootRecord::parse(&block), mbr);
    }
}
