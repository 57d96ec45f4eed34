// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

#![allow(dead_code)]

use kernel::hil::block_storage::BLOCK_SIZE;
use kernel::mbr::{MasterBootRecord, PartitionEntry};
use kernel::platform::Gpr;
use kernel::syscall::SyscallHandler;
use kernel::trap::{TrapHandler, TrapOrigin};
use kernel::utilities::mutex::Mutex;
use pu32_emu::EmulatedSoc;
use pu32_soc::blkdev::BlkDev;
use pu32_soc::uart::Uart;
use pu32_soc::{BLKDEV_ADDR, EXIT_PORT_ADDR, UART_ADDR};

pub const CORES: usize = 4;
pub const SHARDS: usize = 8;

pub type Storage<'a> = Mutex<BlkDev<'a, EmulatedSoc>>;
pub type Console<'a> = Mutex<Uart<'a, EmulatedSoc>>;
pub type Syscalls<'a> =
    SyscallHandler<'a, EmulatedSoc, BlkDev<'a, EmulatedSoc>, Uart<'a, EmulatedSoc>, CORES>;
pub type Handler<'a> =
    TrapHandler<'a, EmulatedSoc, BlkDev<'a, EmulatedSoc>, Uart<'a, EmulatedSoc>, CORES, SHARDS>;

/// Recognisable contents for block `idx`: its index in the first word, then
/// a pattern depending on the index.
pub fn block(idx: usize) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    for (n, byte) in block.iter_mut().enumerate() {
        *byte = (idx.wrapping_mul(31) + n) as u8;
    }
    block[..4].copy_from_slice(&(idx as u32).to_le_bytes());
    block
}

pub fn disk(blocks: usize) -> Vec<[u8; BLOCK_SIZE]> {
    (0..blocks).map(block).collect()
}

/// A disk whose MBR maps `partition` to `lba..lba + count`.
pub fn disk_with_partition(
    blocks: usize,
    partition: usize,
    lba: u32,
    count: u32,
) -> Vec<[u8; BLOCK_SIZE]> {
    let mut disk = disk(blocks);
    let mut mbr = MasterBootRecord::default();
    mbr.partitions[partition] = PartitionEntry {
        kind: 0x83,
        lba_begin: lba,
        sector_count: count,
        ..PartitionEntry::default()
    };
    mbr.write_table(&mut disk[0]);
    disk
}

pub fn storage(soc: &EmulatedSoc) -> Storage<'_> {
    Mutex::new(BlkDev::new(soc, BLKDEV_ADDR))
}

pub fn console(soc: &EmulatedSoc) -> Console<'_> {
    Mutex::new(Uart::new(soc, UART_ADDR))
}

pub fn syscalls<'a>(
    soc: &'a EmulatedSoc,
    storage: &'a Storage<'a>,
    console: &'a Console<'a>,
) -> Syscalls<'a> {
    SyscallHandler::new(soc, storage, console, EXIT_PORT_ADDR)
}

/// Issues a syscall from kernel mode on the calling core and returns `%1`.
pub fn syscall(soc: &EmulatedSoc, handler: &Handler<'_>, number: usize, args: [usize; 3]) -> usize {
    let mut regs = soc.registers();
    regs[Gpr::SR.index()] = number;
    regs[1..4].copy_from_slice(&args);
    soc.set_registers(regs);
    soc.raise_sysop(0x01, 0);
    handler.enter(TrapOrigin::Kernel);
    soc.registers()[Gpr::R1.index()]
}

/// Repeats a storage syscall while it reports a busy controller.
pub fn syscall_until_done(
    soc: &EmulatedSoc,
    handler: &Handler<'_>,
    number: usize,
    args: [usize; 3],
) -> usize {
    loop {
        let result = syscall(soc, handler, number, args);
        if result != 0 {
            return result;
        }
    }
}
