// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use kernel::hil::block_storage::{BlockDevice, Status, BLOCK_SIZE};
use kernel::ErrorCode;
use pu32_emu::{EmulatedSoc, SocConfig, Transfer};
use pu32_soc::blkdev::BlkDev;
use pu32_soc::BLKDEV_ADDR;

const BUF: usize = 0x8000;

fn soc(blocks: usize, latency: usize) -> EmulatedSoc {
    let config = SocConfig {
        block_latency: latency,
        ..SocConfig::default()
    };
    EmulatedSoc::new(config, common::disk(blocks))
}

fn wait(dev: &BlkDev<'_, EmulatedSoc>) {
    while dev.is_ready() == Ok(Status::Busy) {}
}

fn read_block(dev: &BlkDev<'_, EmulatedSoc>, buf: usize, idx: usize, prefetch: bool) {
    loop {
        wait(dev);
        if unsafe { dev.read(buf, idx, prefetch) } == 1 {
            return;
        }
    }
}

#[test]
fn init_reports_capacity_and_presents_block() {
    let soc = soc(32, 2);
    let dev = BlkDev::new(&soc, BLKDEV_ADDR);
    assert_eq!(dev.block_count(), 0);

    dev.init(3).unwrap();
    assert_eq!(dev.block_count(), 32);
    assert_eq!(soc.read_memory(dev.window(), BLOCK_SIZE), common::block(3));
    assert_eq!(soc.protocol_violations(), 0);
}

#[test]
fn read_takes_two_calls() {
    let soc = soc(32, 3);
    let dev = BlkDev::new(&soc, BLKDEV_ADDR);
    dev.init(0).unwrap();
    soc.clear_transfers();

    assert_eq!(unsafe { dev.read(BUF, 9, false) }, 0);
    assert_eq!(dev.is_ready(), Ok(Status::Busy));
    wait(&dev);
    assert_eq!(unsafe { dev.read(BUF, 9, false) }, 1);

    assert_eq!(soc.read_memory(BUF, BLOCK_SIZE), common::block(9));
    assert_eq!(soc.transfers(), vec![Transfer::Read(9)]);
    assert_eq!(soc.protocol_violations(), 0);
}

#[test]
fn prefetched_block_needs_no_new_command() {
    let soc = soc(32, 2);
    let dev = BlkDev::new(&soc, BLKDEV_ADDR);
    dev.init(0).unwrap();
    soc.clear_transfers();

    read_block(&dev, BUF, 5, true);
    wait(&dev);
    // The read of block 6 was started by the previous call.
    assert_eq!(unsafe { dev.read(BUF + BLOCK_SIZE, 6, false) }, 1);

    assert_eq!(soc.read_memory(BUF, BLOCK_SIZE), common::block(5));
    assert_eq!(soc.read_memory(BUF + BLOCK_SIZE, BLOCK_SIZE), common::block(6));
    assert_eq!(soc.transfers(), vec![Transfer::Read(5), Transfer::Read(6)]);
    assert_eq!(soc.protocol_violations(), 0);
}

#[test]
fn different_pair_restarts_read() {
    let soc = soc(32, 0);
    let dev = BlkDev::new(&soc, BLKDEV_ADDR);
    dev.init(0).unwrap();
    soc.clear_transfers();

    assert_eq!(unsafe { dev.read(BUF, 5, false) }, 0);
    assert_eq!(unsafe { dev.read(BUF, 7, false) }, 0);
    assert_eq!(unsafe { dev.read(BUF, 7, false) }, 1);
    assert_eq!(soc.read_memory(BUF, BLOCK_SIZE), common::block(7));
    assert_eq!(soc.transfers(), vec![Transfer::Read(5), Transfer::Read(7)]);
}

#[test]
fn write_stages_next_block() {
    let soc = soc(32, 2);
    let dev = BlkDev::new(&soc, BLKDEV_ADDR);
    dev.init(0).unwrap();
    soc.clear_transfers();

    soc.write_memory(BUF, &[0xa5; BLOCK_SIZE]);
    soc.write_memory(BUF + BLOCK_SIZE, &[0x5a; BLOCK_SIZE]);

    wait(&dev);
    unsafe { dev.write(BUF, 12, true) };
    // The second block must be staged before the buffer is overwritten.
    soc.write_memory(BUF + BLOCK_SIZE, &[0; BLOCK_SIZE]);
    wait(&dev);
    unsafe { dev.write(BUF + BLOCK_SIZE, 13, false) };
    wait(&dev);

    assert_eq!(soc.disk_block(12), [0xa5; BLOCK_SIZE]);
    assert_eq!(soc.disk_block(13), [0x5a; BLOCK_SIZE]);
    assert_eq!(soc.transfers(), vec![Transfer::Write(12), Transfer::Write(13)]);
    assert_eq!(soc.protocol_violations(), 0);
}

#[test]
fn copy_handles_overlap_both_ways() {
    let soc = soc(16, 1);
    let dev = BlkDev::new(&soc, BLKDEV_ADDR);
    dev.init(0).unwrap();

    assert_eq!(dev.copy(3, 1, 4), 4);
    for n in 0..4 {
        assert_eq!(soc.disk_block(3 + n), common::block(1 + n));
    }
    assert_eq!(soc.disk_block(1), common::block(1));

    for n in 0..16 {
        soc.set_disk_block(n, &common::block(n));
    }
    assert_eq!(dev.copy(1, 3, 4), 4);
    for n in 0..4 {
        assert_eq!(soc.disk_block(1 + n), common::block(3 + n));
    }
    assert_eq!(soc.disk_block(6), common::block(6));

    assert_eq!(dev.copy(0, 1, 0), 0);
    assert_eq!(soc.protocol_violations(), 0);
}

#[test]
fn copy_stops_on_controller_error() {
    let soc = soc(8, 0);
    let dev = BlkDev::new(&soc, BLKDEV_ADDR);
    dev.init(0).unwrap();

    // Block 8 is past the end of the disk.
    assert_eq!(dev.copy(0, 6, 3), 0);
}

#[test]
fn faults_are_errors() {
    let soc = soc(8, 0);
    let dev = BlkDev::new(&soc, BLKDEV_ADDR);
    dev.init(0).unwrap();

    soc.inject_block_error();
    assert_eq!(dev.is_ready(), Err(ErrorCode::FAIL));
    dev.init(0).unwrap();
    assert_eq!(dev.is_ready(), Ok(Status::Ready));

    soc.set_block_powered(false);
    assert_eq!(dev.is_ready(), Err(ErrorCode::OFF));
    assert_eq!(dev.init(0), Err(ErrorCode::OFF));
    assert_eq!(dev.block_count(), 0);
}

static BUSY_POLLS: AtomicUsize = AtomicUsize::new(0);

fn count_busy_poll() {
    BUSY_POLLS.fetch_add(1, Ordering::Relaxed);
}

#[test]
fn busy_hook_runs_while_waiting() {
    let soc = soc(8, 4);
    let dev = BlkDev::new(&soc, BLKDEV_ADDR);
    dev.set_busy_hook(Some(count_busy_poll));
    dev.init(0).unwrap();
    assert!(BUSY_POLLS.load(Ordering::Relaxed) >= 3);
}
