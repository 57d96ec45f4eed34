// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! A PU32 SoC simulated on the host.
//!
//! [`EmulatedSoc`] implements [`Machine`] over a flat memory with the SoC's
//! device map laid on top of it: the block device controller and its data
//! window at 0, the device table at 0x200, the UART at 0xff8 and RAM from
//! 0x1000 up. Each host thread plays one core, chosen with
//! [`set_current_core`], and owns one register bank: the registers of the
//! code that faults, whichever mode it runs in. The handler's own registers
//! are the host thread's.
//!
//! Parking a core panics with a message containing `parked`, so fatal paths
//! can be checked with `#[should_panic]`.

mod blkctl;
mod devtbl;
mod uart;

use std::cell::Cell;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use kernel::hil::block_storage::BLOCK_SIZE;
use kernel::platform::{Gpr, Machine, Width, WORD_SIZE};
use pu32_soc::{DEVTBL_ADDR, EXIT_PORT_ADDR, RAMDEV_ADDR, UART_ADDR};

pub use crate::blkctl::{ControllerState, Transfer};
pub use crate::devtbl::{DEVTBL_DEVICE_ID, UART_DEVICE_ID};

use crate::blkctl::{BlockController, COMMAND_COUNT};
use crate::uart::UartModel;

thread_local! {
    static CURRENT_CORE: Cell<usize> = const { Cell::new(0) };
}

/// Makes the calling thread run as core `id`.
pub fn set_current_core(id: usize) {
    CURRENT_CORE.with(|core| core.set(id));
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Bus errors panic with the bus locked; the machine stays usable after.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Debug)]
pub struct SocConfig {
    pub cores: usize,
    /// End of the address space; RAM spans `RAMDEV_ADDR..ram_size`.
    pub ram_size: usize,
    pub soc_version: usize,
    /// Status polls a disk access keeps the controller busy for.
    pub block_latency: usize,
    /// Where the BIOS image keeps its park routine.
    pub park_routine: Range<usize>,
    pub image_end: usize,
}

impl Default for SocConfig {
    fn default() -> SocConfig {
        SocConfig {
            cores: 4,
            ram_size: 0x10_0000,
            soc_version: 0x0001_0003,
            block_latency: 0,
            park_routine: 0x1800..0x1818,
            image_end: 0x2000,
        }
    }
}

#[derive(Clone, Copy, Default)]
struct CoreState {
    gprs: [usize; Gpr::COUNT],
    sysopcode: usize,
    fault_addr: usize,
}

struct Bus {
    ram: Vec<u8>,
    blkdev: BlockController,
    uart: UartModel,
    devtbl: Vec<usize>,
    exits: Vec<usize>,
}

impl Bus {
    fn devtbl_word(&self, addr: usize) -> usize {
        self.devtbl
            .get((addr - DEVTBL_ADDR) / WORD_SIZE)
            .copied()
            .unwrap_or(0)
    }

    fn read_byte(&self, addr: usize) -> u8 {
        if addr < DEVTBL_ADDR {
            self.blkdev.window[addr % BLOCK_SIZE]
        } else if addr < UART_ADDR {
            let word = self.devtbl_word(addr - addr % WORD_SIZE);
            word.to_ne_bytes()[addr % WORD_SIZE]
        } else if addr < RAMDEV_ADDR {
            0
        } else {
            match self.ram.get(addr) {
                Some(byte) => *byte,
                None => panic!("bus error reading {:#x}", addr),
            }
        }
    }

    fn write_byte(&mut self, addr: usize, value: u8) {
        if addr < DEVTBL_ADDR {
            self.blkdev.window[addr % BLOCK_SIZE] = value;
        } else if addr >= RAMDEV_ADDR {
            match self.ram.get_mut(addr) {
                Some(byte) => *byte = value,
                None => panic!("bus error writing {:#x}", addr),
            }
        }
        // The device table and the UART ignore byte writes.
    }

    fn load(&mut self, addr: usize, width: Width) -> u64 {
        if addr == UART_ADDR {
            return self.uart.rx.pop_front().unwrap_or(0) as u64;
        }
        let mut bytes = [0u8; 8];
        for (n, byte) in bytes[..width.bytes()].iter_mut().enumerate() {
            *byte = self.read_byte(addr + n);
        }
        from_ne_prefix(&bytes, width)
    }

    fn store(&mut self, addr: usize, width: Width, value: u64) {
        if addr == UART_ADDR {
            self.uart.tx.push(value as u8);
            return;
        }
        let bytes = to_ne_prefix(value, width);
        for (n, byte) in bytes[..width.bytes()].iter().enumerate() {
            self.write_byte(addr + n, *byte);
        }
    }

    fn ldst(&mut self, addr: usize, value: usize) -> usize {
        if addr < COMMAND_COUNT * WORD_SIZE && addr % WORD_SIZE == 0 {
            self.blkdev.command(addr / WORD_SIZE, value)
        } else if addr == EXIT_PORT_ADDR {
            self.exits.push(value);
            self.devtbl_word(addr)
        } else if (DEVTBL_ADDR..UART_ADDR).contains(&addr) {
            self.devtbl_word(addr)
        } else if addr == UART_ADDR {
            self.uart.command(value)
        } else {
            let old = self.load(addr, Width::word()) as usize;
            self.store(addr, Width::word(), value as u64);
            old
        }
    }
}

/// Reads the first `width` bytes of `bytes` as a native-endian integer.
fn from_ne_prefix(bytes: &[u8; 8], width: Width) -> u64 {
    match width {
        Width::W8 => bytes[0] as u64,
        Width::W16 => u16::from_ne_bytes([bytes[0], bytes[1]]) as u64,
        Width::W32 => u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
        Width::W64 => u64::from_ne_bytes(*bytes),
    }
}

fn to_ne_prefix(value: u64, width: Width) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    let n = width.bytes();
    match width {
        Width::W8 => bytes[0] = value as u8,
        Width::W16 => bytes[..n].copy_from_slice(&(value as u16).to_ne_bytes()),
        Width::W32 => bytes[..n].copy_from_slice(&(value as u32).to_ne_bytes()),
        Width::W64 => bytes = value.to_ne_bytes(),
    }
    bytes
}

pub struct EmulatedSoc {
    bus: Mutex<Bus>,
    cores: Vec<Mutex<CoreState>>,
    trap_vector: AtomicUsize,
    kernel_space_limit: AtomicUsize,
    park_routine: Range<usize>,
    image_end: usize,
}

impl EmulatedSoc {
    pub fn new(config: SocConfig, disk: Vec<[u8; BLOCK_SIZE]>) -> EmulatedSoc {
        EmulatedSoc {
            bus: Mutex::new(Bus {
                ram: vec![0; config.ram_size],
                blkdev: BlockController::new(disk, config.block_latency),
                uart: UartModel::default(),
                devtbl: devtbl::build(config.soc_version, config.ram_size),
                exits: Vec::new(),
            }),
            cores: (0..config.cores)
                .map(|_| Mutex::new(CoreState::default()))
                .collect(),
            trap_vector: AtomicUsize::new(0),
            kernel_space_limit: AtomicUsize::new(0),
            park_routine: config.park_routine,
            image_end: config.image_end,
        }
    }

    /// Splits a raw disk image into blocks, zero padding the last one.
    pub fn disk_from_image(image: &[u8]) -> Vec<[u8; BLOCK_SIZE]> {
        image
            .chunks(BLOCK_SIZE)
            .map(|chunk| {
                let mut block = [0u8; BLOCK_SIZE];
                block[..chunk.len()].copy_from_slice(chunk);
                block
            })
            .collect()
    }

    fn core(&self) -> MutexGuard<'_, CoreState> {
        let id = CURRENT_CORE.with(Cell::get);
        match self.cores.get(id) {
            Some(core) => lock(core),
            None => panic!("core {} does not exist", id),
        }
    }

    /// Loads the live registers of the calling core, indexed by register
    /// number.
    pub fn set_registers(&self, gprs: [usize; Gpr::COUNT]) {
        self.core().gprs = gprs;
    }

    pub fn registers(&self) -> [usize; Gpr::COUNT] {
        self.core().gprs
    }

    /// Latches the fault the calling core is about to take.
    pub fn raise_sysop(&self, opcode: usize, fault_addr: usize) {
        let mut core = self.core();
        core.sysopcode = opcode;
        core.fault_addr = fault_addr;
    }

    pub fn read_memory(&self, addr: usize, len: usize) -> Vec<u8> {
        let bus = lock(&self.bus);
        (addr..addr + len).map(|a| bus.read_byte(a)).collect()
    }

    pub fn write_memory(&self, addr: usize, bytes: &[u8]) {
        let mut bus = lock(&self.bus);
        for (n, byte) in bytes.iter().enumerate() {
            bus.write_byte(addr + n, *byte);
        }
    }

    pub fn disk_block(&self, idx: usize) -> [u8; BLOCK_SIZE] {
        lock(&self.bus).blkdev.disk[idx]
    }

    pub fn set_disk_block(&self, idx: usize, block: &[u8; BLOCK_SIZE]) {
        lock(&self.bus).blkdev.disk[idx] = *block;
    }

    /// Disk accesses the controller performed, in completion order.
    pub fn transfers(&self) -> Vec<Transfer> {
        lock(&self.bus).blkdev.log.clone()
    }

    pub fn clear_transfers(&self) {
        lock(&self.bus).blkdev.log.clear();
    }

    /// Number of commands that hit the controller while it was busy.
    pub fn protocol_violations(&self) -> usize {
        lock(&self.bus).blkdev.violations
    }

    pub fn controller_state(&self) -> ControllerState {
        lock(&self.bus).blkdev.state
    }

    pub fn set_block_latency(&self, polls: usize) {
        lock(&self.bus).blkdev.latency = polls;
    }

    /// Puts the controller in its error state until the next reset.
    pub fn inject_block_error(&self) {
        lock(&self.bus).blkdev.state = ControllerState::Error;
    }

    pub fn set_block_powered(&self, powered: bool) {
        let mut bus = lock(&self.bus);
        bus.blkdev.powered = powered;
        if !powered {
            bus.blkdev.state = ControllerState::PowerOff;
        }
    }

    /// Everything the UART transmitted so far.
    pub fn console_output(&self) -> Vec<u8> {
        lock(&self.bus).uart.tx.clone()
    }

    pub fn console_output_string(&self) -> String {
        String::from_utf8_lossy(&self.console_output()).into_owned()
    }

    /// Like [`EmulatedSoc::console_output_string`], but gives up instead of
    /// waiting if the machine is in use, as it is when a device access
    /// panics.
    pub fn try_console_output_string(&self) -> Option<String> {
        let bus = match self.bus.try_lock() {
            Ok(bus) => bus,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(String::from_utf8_lossy(&bus.uart.tx).into_owned())
    }

    pub fn push_console_input(&self, bytes: &[u8]) {
        lock(&self.bus).uart.rx.extend(bytes);
    }

    /// Makes the next `count` transmit buffer queries report a full buffer.
    pub fn stall_console(&self, count: usize) {
        lock(&self.bus).uart.tx_stalls = count;
    }

    pub fn console_baud_rate(&self) -> Option<usize> {
        lock(&self.bus).uart.baud_rate
    }

    /// Statuses written to the exit port.
    pub fn exit_statuses(&self) -> Vec<usize> {
        lock(&self.bus).exits.clone()
    }

    pub fn trap_vector(&self) -> usize {
        self.trap_vector.load(Ordering::Relaxed)
    }

    pub fn kernel_space_limit(&self) -> usize {
        self.kernel_space_limit.load(Ordering::Relaxed)
    }
}

impl Machine for EmulatedSoc {
    fn core_id(&self) -> usize {
        CURRENT_CORE.with(Cell::get)
    }

    fn sysopcode(&self) -> usize {
        self.core().sysopcode
    }

    fn fault_addr(&self) -> usize {
        self.core().fault_addr
    }

    fn gpr(&self, reg: Gpr) -> usize {
        self.core().gprs[reg.index()]
    }

    fn set_gpr(&self, reg: Gpr, value: usize) {
        self.core().gprs[reg.index()] = value;
    }

    unsafe fn ldst(&self, addr: usize, value: usize) -> usize {
        lock(&self.bus).ldst(addr, value)
    }

    unsafe fn load(&self, addr: usize, width: Width) -> u64 {
        lock(&self.bus).load(addr, width)
    }

    unsafe fn store(&self, addr: usize, width: Width, value: u64) {
        lock(&self.bus).store(addr, width, value)
    }

    unsafe fn copy(&self, dst: usize, src: usize, len: usize) {
        let mut bus = lock(&self.bus);
        for n in 0..len {
            let byte = bus.read_byte(src + n);
            bus.write_byte(dst + n, byte);
        }
    }

    unsafe fn read_bytes(&self, addr: usize, buf: &mut [u8]) {
        let bus = lock(&self.bus);
        for (n, byte) in buf.iter_mut().enumerate() {
            *byte = bus.read_byte(addr + n);
        }
    }

    unsafe fn write_bytes(&self, addr: usize, buf: &[u8]) {
        self.write_memory(addr, buf);
    }

    fn set_trap_vector(&self, handler: usize) {
        self.trap_vector.store(handler, Ordering::Relaxed);
    }

    fn set_kernel_space_limit(&self, limit: usize) {
        self.kernel_space_limit.store(limit, Ordering::Relaxed);
    }

    fn park_routine(&self) -> Range<usize> {
        self.park_routine.clone()
    }

    fn image_end(&self) -> usize {
        self.image_end
    }

    fn park(&self) -> ! {
        panic!("core {} parked", self.core_id())
    }
}

#[cfg(test)]
mod tests {
    use super::{EmulatedSoc, SocConfig};
    use kernel::platform::{Machine, Width};
    use pu32_soc::{DEVTBL_ADDR, EXIT_PORT_ADDR, RAMDEV_ADDR};

    #[test]
    fn ldst_swaps_ram_words() {
        let soc = EmulatedSoc::new(SocConfig::default(), Vec::new());
        unsafe {
            soc.store(RAMDEV_ADDR, Width::word(), 7);
            assert_eq!(soc.ldst(RAMDEV_ADDR, 9), 7);
            assert_eq!(soc.load(RAMDEV_ADDR, Width::word()), 9);
        }
    }

    #[test]
    fn device_table_is_read_only() {
        let soc = EmulatedSoc::new(SocConfig::default(), Vec::new());
        unsafe {
            assert_eq!(soc.ldst(DEVTBL_ADDR, 0), 0x0001_0003);
            assert_eq!(soc.ldst(DEVTBL_ADDR, 0), 0x0001_0003);
            let flags = soc.ldst(EXIT_PORT_ADDR, 42);
            assert_eq!(soc.ldst(EXIT_PORT_ADDR, 43), flags);
        }
        assert_eq!(soc.exit_statuses(), vec![42, 43]);
    }

    #[test]
    #[should_panic(expected = "parked")]
    fn park_panics() {
        let soc = EmulatedSoc::new(SocConfig::default(), Vec::new());
        soc.park();
    }
}
