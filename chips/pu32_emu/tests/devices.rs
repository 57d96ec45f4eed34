// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

mod common;

use kernel::hil::uart::Console;
use kernel::platform::WORD_SIZE;
use pu32_emu::{EmulatedSoc, SocConfig, UART_DEVICE_ID};
use pu32_soc::devtbl::{Device, DeviceTable, RAM_DEVICE_ID};
use pu32_soc::uart::Uart;
use pu32_soc::{DEVTBL_ADDR, RAMDEV_ADDR, UART_ADDR};

fn soc() -> EmulatedSoc {
    EmulatedSoc::new(SocConfig::default(), common::disk(4))
}

#[test]
fn device_table_maps_devices_in_order() {
    let soc = soc();
    let table = DeviceTable::new(&soc, DEVTBL_ADDR);
    let devices: Vec<Device> = table.iter().collect();
    assert_eq!(devices.len(), 4);

    // The first entry carries the SoC version as its id.
    assert_eq!(devices[0].id, 0x0001_0003);
    assert_eq!(devices[0].addr, 0);
    assert_eq!(devices[0].interrupt, Some(0));
    assert_eq!(devices[1].addr, DEVTBL_ADDR);
    assert_eq!(devices[1].interrupt, None);

    let uart = table.find(UART_DEVICE_ID, None).unwrap();
    assert_eq!(uart.addr, UART_ADDR);
    assert_eq!(uart.entry, DEVTBL_ADDR + 4 * WORD_SIZE);
    assert_eq!(uart.interrupt, Some(1));

    let ram = table.find(RAM_DEVICE_ID, None).unwrap();
    assert_eq!(ram.addr, RAMDEV_ADDR);
    assert_eq!(ram.map_bytes(), 0x10_0000 - RAMDEV_ADDR);
    assert_eq!(ram.interrupt, None);
}

#[test]
fn find_starts_at_given_entry() {
    let soc = soc();
    let table = DeviceTable::new(&soc, DEVTBL_ADDR);
    let uart = table.find(UART_DEVICE_ID, None).unwrap();
    assert_eq!(table.find(UART_DEVICE_ID, Some(uart.entry)), Some(uart));
    assert_eq!(
        table.find(UART_DEVICE_ID, Some(uart.entry + 2 * WORD_SIZE)),
        None
    );
    assert_eq!(table.find(0x77, None), None);
}

#[test]
fn covers_needs_one_device_for_whole_range() {
    let soc = soc();
    let table = DeviceTable::new(&soc, DEVTBL_ADDR);
    assert!(table.covers(RAM_DEVICE_ID, 0x4000..0x8000));
    assert!(table.covers(RAM_DEVICE_ID, RAMDEV_ADDR..0x10_0000));
    assert!(!table.covers(RAM_DEVICE_ID, 0x800..0x2000));
    assert!(!table.covers(RAM_DEVICE_ID, 0xf_f000..0x10_1000));
}

#[test]
fn uart_moves_bytes() {
    let soc = soc();
    let uart = Uart::new(&soc, UART_ADDR);
    uart.init(115200);
    assert_eq!(soc.console_baud_rate(), Some(115200));

    assert_eq!(uart.transmit(b"ok\n"), 3);
    soc.stall_console(1);
    assert_eq!(uart.transmit(b"late"), 0);
    assert_eq!(soc.console_output(), b"ok\n");

    soc.push_console_input(b"xyz");
    let mut buf = [0u8; 2];
    assert_eq!(uart.receive(&mut buf), 2);
    assert_eq!(&buf, b"xy");
    assert_eq!(uart.receive(&mut buf), 1);
    assert_eq!(buf[0], b'z');
    assert_eq!(uart.receive(&mut buf), 0);
}
