// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Boot sequence: from reset to the kernel entry point.
//!
//! [`Bios::boot`] reports the SoC and BIOS versions, installs the sysop fault
//! handler and the park routine, brings up the boot device, loads the kernel
//! partition named by the MBR to the kernel load address and returns the
//! [`KernelHandoff`] the architecture jumps through.
//!
//! The kernel finds the fault handler through its environment: the only
//! environment string is `___ISHW=` directly followed by the handler address
//! as a raw native-endian word.

use core::fmt::{self, Write};
use core::ops::Range;

use crate::config::CONFIG;
use crate::debug::ConsoleFmt;
use crate::hil::block_storage::{BlockDevice, Status, BLOCK_SIZE};
use crate::hil::uart::Console;
use crate::mbr::MasterBootRecord;
use crate::platform::{Machine, WORD_SIZE};
use crate::utilities::hexdump::HexDump;
use crate::utilities::mutex::Mutex;
use crate::ErrorCode;

/// Bytes reserved below the kernel load address for the park routine.
pub const PARK_ROUTINE_SIZE: usize = 24;

pub const ISHW_PREFIX: &[u8; 8] = b"___ISHW=";

/// Size of the `___ISHW=` environment string, terminator included.
pub const ISHW_ENTRY_SIZE: usize = ISHW_PREFIX.len() + WORD_SIZE + 1;

/// Encodes the `___ISHW=` environment string for `handler`.
pub fn ishw_entry(handler: usize) -> [u8; ISHW_ENTRY_SIZE] {
    let mut entry = [0u8; ISHW_ENTRY_SIZE];
    entry[..ISHW_PREFIX.len()].copy_from_slice(ISHW_PREFIX);
    entry[ISHW_PREFIX.len()..ISHW_PREFIX.len() + WORD_SIZE].copy_from_slice(&handler.to_ne_bytes());
    entry
}

/// Decodes a `___ISHW=` environment string.
pub fn parse_ishw_entry(entry: &[u8]) -> Option<usize> {
    let value = entry.strip_prefix(ISHW_PREFIX.as_slice())?;
    let word = value.get(..WORD_SIZE)?;
    let mut bytes = [0u8; WORD_SIZE];
    bytes.copy_from_slice(word);
    Some(usize::from_ne_bytes(bytes))
}

/// Board-specific parameters of the boot sequence. Addresses are physical.
pub struct BootConfig<'a> {
    /// Device table word holding the SoC version.
    pub soc_version_addr: usize,
    /// Banner printed after the SoC version.
    pub version: &'a str,
    pub kernel_addr: usize,
    /// MBR partition holding the kernel image.
    pub kernel_partition: usize,
    /// NUL-terminated empty string used as `argv[0]`.
    pub argv0_addr: usize,
    /// NUL-terminated kernel command line used as `argv[1]`.
    pub cmdline_addr: usize,
    /// Writable buffer of `ISHW_ENTRY_SIZE` bytes for the environment string.
    pub ishw_addr: usize,
    /// Tells whether RAM backs the given range; `None` skips the check.
    pub ram_check: Option<&'a dyn Fn(Range<usize>) -> bool>,
}

/// Initial kernel stack and entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelHandoff {
    pub entry: usize,
    /// `argc`, `argv[0]`, `argv[1]`, NULL, `envp[0]`, NULL.
    pub frame: [usize; 6],
}

pub struct Bios<'a, M: Machine, B: BlockDevice, C: Console> {
    machine: &'a M,
    storage: &'a Mutex<B>,
    console: &'a Mutex<C>,
    config: BootConfig<'a>,
}

impl<'a, M: Machine, B: BlockDevice, C: Console> Bios<'a, M, B, C> {
    pub fn new(
        machine: &'a M,
        storage: &'a Mutex<B>,
        console: &'a Mutex<C>,
        config: BootConfig<'a>,
    ) -> Bios<'a, M, B, C> {
        Bios {
            machine,
            storage,
            console,
            config,
        }
    }

    fn print(&self, args: fmt::Arguments) {
        let console = self.console.lock();
        let _ = ConsoleFmt(&*console).write_fmt(args);
    }

    fn fatal(&self, msg: &str) -> ! {
        self.print(format_args!("{}\n", msg));
        self.machine.park()
    }

    /// Runs the boot sequence with `handler` as the sysop fault handler.
    /// Every failure is fatal.
    pub fn boot(&self, handler: usize) -> KernelHandoff {
        // SAFETY: the device table is read-only through ldst.
        let soc = unsafe { self.machine.ldst(self.config.soc_version_addr, 0) };
        self.print(format_args!("\nsoc  {:x}\n", soc));
        self.print(format_args!("{}", self.config.version));

        self.install_handler(handler);
        match self.install_park_routine() {
            Ok(()) => {}
            Err(ErrorCode::SIZE) => self.fatal("park routine has invalid size"),
            Err(_) => self.fatal("park routine cannot be installed"),
        }

        let blocks = match self.load_kernel() {
            Ok(blocks) => blocks,
            Err(LoadError::Init) => self.fatal("blkdev initialization failed"),
            Err(LoadError::NoRam) => self.fatal("no ram device large enough for kernel"),
            Err(LoadError::Read) => self.fatal("blkdev read error"),
        };
        self.print(format_args!("kernel loaded\n"));

        if CONFIG.kernel_hexdump {
            self.dump(blocks);
        }

        KernelHandoff {
            entry: self.config.kernel_addr,
            frame: [
                2,
                self.config.argv0_addr,
                self.config.cmdline_addr,
                0,
                self.config.ishw_addr,
                0,
            ],
        }
    }

    fn install_handler(&self, handler: usize) {
        self.machine.set_trap_vector(handler);
        // SAFETY: the board reserved `ISHW_ENTRY_SIZE` bytes at `ishw_addr`.
        unsafe {
            self.machine
                .write_bytes(self.config.ishw_addr, &ishw_entry(handler))
        };
    }

    /// Copies the park routine right below the kernel, where other cores
    /// and the kernel expect it.
    fn install_park_routine(&self) -> Result<(), ErrorCode> {
        let routine = self.machine.park_routine();
        let size = routine.end - routine.start;
        if size % WORD_SIZE != 0 || size > PARK_ROUTINE_SIZE {
            return Err(ErrorCode::SIZE);
        }
        let addr = self.config.kernel_addr - PARK_ROUTINE_SIZE;
        if self.machine.image_end() > addr {
            return Err(ErrorCode::FAIL);
        }
        // SAFETY: the slot lies between the BIOS image and the kernel.
        unsafe { self.machine.copy(addr, routine.start, size) };
        Ok(())
    }

    /// Loads the kernel partition and returns its size in blocks.
    fn load_kernel(&self) -> Result<usize, LoadError> {
        let dev = self.storage.lock();
        dev.init(0).map_err(|_| LoadError::Init)?;

        // Initialization left block 0 in the window.
        let mut block = [0u8; BLOCK_SIZE];
        // SAFETY: the window is a block-sized device mapping.
        unsafe { self.machine.read_bytes(dev.window(), &mut block) };
        let mbr = MasterBootRecord::parse(&block);
        let blocks = mbr
            .partition(self.config.kernel_partition)
            .map(|p| p.blocks())
            .unwrap_or(0..0);
        let size = blocks.len() * BLOCK_SIZE;
        let kernel = self.config.kernel_addr..self.config.kernel_addr + size;

        if let Some(ram_check) = self.config.ram_check {
            if !ram_check(kernel.clone()) {
                return Err(LoadError::NoRam);
            }
        }
        self.machine.set_kernel_space_limit(kernel.end);

        let mut dst = kernel.start;
        let mut idx = blocks.start;
        while idx < blocks.end {
            match dev.is_ready() {
                Ok(Status::Ready) => {}
                Ok(Status::Busy) => continue,
                Err(_) => return Err(LoadError::Read),
            }
            // SAFETY: `dst` stays inside the kernel range checked above.
            let n = unsafe { dev.read(dst, idx, idx + 1 < blocks.end) };
            dst += n * BLOCK_SIZE;
            idx += n;
        }
        Ok(blocks.len())
    }

    fn dump(&self, blocks: usize) {
        let console = self.console.lock();
        let mut out = ConsoleFmt(&*console);
        let mut dump = HexDump::new(&mut out, self.config.kernel_addr);
        let mut block = [0u8; BLOCK_SIZE];
        for n in 0..blocks {
            // SAFETY: the kernel was just loaded there.
            unsafe {
                self.machine
                    .read_bytes(self.config.kernel_addr + n * BLOCK_SIZE, &mut block)
            };
            if dump.feed(&block).is_err() {
                return;
            }
        }
        let _ = dump.finish();
    }
}

enum LoadError {
    Init,
    NoRam,
    Read,
}

#[cfg(test)]
mod tests {
    use super::{ishw_entry, parse_ishw_entry, ISHW_ENTRY_SIZE};
    use crate::platform::WORD_SIZE;

    #[test]
    fn ishw_entry_holds_raw_handler_word() {
        let entry = ishw_entry(0x1234);
        assert_eq!(entry.len(), ISHW_ENTRY_SIZE);
        assert_eq!(&entry[..8], b"___ISHW=");
        assert_eq!(&entry[8..8 + WORD_SIZE], &0x1234usize.to_ne_bytes());
        assert_eq!(entry[ISHW_ENTRY_SIZE - 1], 0);
        assert_eq!(parse_ishw_entry(&entry), Some(0x1234));
        assert_eq!(parse_ishw_entry(b"PATH=/"), None);
    }
}
