// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

mod common;

use std::panic::{catch_unwind, AssertUnwindSafe};

use kernel::platform::{Gpr, Machine, Width};
use kernel::syscall::{fd, number};
use kernel::trap::{TrapHandler, TrapOrigin};
use pu32_emu::{set_current_core, EmulatedSoc, SocConfig};

use common::Handler;

const DATA: usize = 0x9000;
const BUF: usize = 0x8000;

/// `cldst32 %3, %2`.
const CLDST32: usize = 0x32fe;
/// `cldst8 %3, %2`.
const CLDST8: usize = 0x32fc;
/// `fadd %4, %5`.
const FADD: usize = 0x45d8;
const FDIV: usize = 0x45db;

fn with_handler(test: impl FnOnce(&EmulatedSoc, &Handler<'_>)) {
    set_current_core(0);
    let soc = EmulatedSoc::new(SocConfig::default(), common::disk(8));
    let storage = common::storage(&soc);
    let console = common::console(&soc);
    let handler: Handler<'_> = TrapHandler::new(&soc, common::syscalls(&soc, &storage, &console));
    test(&soc, &handler);
}

fn registers(values: &[(Gpr, usize)]) -> [usize; Gpr::COUNT] {
    let mut regs = [0usize; Gpr::COUNT];
    for (n, r) in regs.iter_mut().enumerate() {
        *r = 0x100 + n;
    }
    for &(reg, value) in values {
        regs[reg.index()] = value;
    }
    regs
}

fn trap(soc: &EmulatedSoc, handler: &Handler<'_>, origin: TrapOrigin, opcode: usize, addr: usize) {
    soc.raise_sysop(opcode, addr);
    handler.enter(origin);
}

#[test]
fn syscall_returns_only_in_r1() {
    for origin in [TrapOrigin::Kernel, TrapOrigin::User] {
        with_handler(|soc, handler| {
            soc.write_memory(BUF, b"hi\n");
            let before = registers(&[
                (Gpr::SR, number::WRITE),
                (Gpr::R1, fd::STDOUT),
                (Gpr::R2, BUF),
                (Gpr::R3, 3),
            ]);
            soc.set_registers(before);
            trap(soc, handler, origin, 0x01, 0);

            let after = soc.registers();
            assert_eq!(after[Gpr::R1.index()], 3, "{:?}", origin);
            for n in (0..Gpr::COUNT).filter(|&n| n != 1) {
                assert_eq!(after[n], before[n], "{:?} %{}", origin, n);
            }
            assert_eq!(soc.console_output(), b"hi\n");
        });
    }
}

#[test]
fn user_cldst_uses_fault_address() {
    with_handler(|soc, handler| {
        unsafe { soc.store(DATA, Width::W32, 5) };
        // %2 does not hold the address for a user-mode fault.
        soc.set_registers(registers(&[(Gpr::SR, 5), (Gpr::R3, 9), (Gpr::R2, 0)]));
        trap(soc, handler, TrapOrigin::User, CLDST32, DATA);

        assert_eq!(unsafe { soc.load(DATA, Width::W32) }, 9);
        assert_eq!(soc.registers()[3], 5);
    });
}

#[test]
fn kernel_cldst_uses_saved_address_register() {
    with_handler(|soc, handler| {
        unsafe { soc.store(DATA, Width::W32, 5) };
        soc.set_registers(registers(&[(Gpr::SR, 4), (Gpr::R3, 9), (Gpr::R2, DATA)]));
        // The fault address is ignored once the context was saved.
        trap(soc, handler, TrapOrigin::Kernel, CLDST32, BUF);

        // No match: memory keeps its value and %3 receives it.
        assert_eq!(unsafe { soc.load(DATA, Width::W32) }, 5);
        assert_eq!(soc.registers()[3], 5);
        assert_eq!(soc.registers()[2], DATA);
    });
}

#[test]
fn narrow_cldst_truncates_store_but_not_comparison() {
    with_handler(|soc, handler| {
        soc.write_memory(DATA, &[0x40, 0xee]);
        soc.set_registers(registers(&[(Gpr::SR, 0x140), (Gpr::R3, 0x41)]));
        trap(soc, handler, TrapOrigin::User, CLDST8, DATA);
        assert_eq!(soc.read_memory(DATA, 2), [0x40, 0xee]);

        soc.set_registers(registers(&[(Gpr::SR, 0x40), (Gpr::R3, 0x1ff)]));
        trap(soc, handler, TrapOrigin::User, CLDST8, DATA);
        assert_eq!(soc.read_memory(DATA, 2), [0xff, 0xee]);
        assert_eq!(soc.registers()[3], 0x40);
    });
}

#[test]
fn float_arithmetic() {
    with_handler(|soc, handler| {
        let regs = registers(&[
            (Gpr::from_nibble(4), 1.5f32.to_bits() as usize),
            (Gpr::from_nibble(5), 2.25f32.to_bits() as usize),
        ]);
        soc.set_registers(regs);
        trap(soc, handler, TrapOrigin::User, FADD, 0);
        assert_eq!(soc.registers()[4], 3.75f32.to_bits() as usize);

        soc.set_registers(regs);
        trap(soc, handler, TrapOrigin::Kernel, FDIV, 0);
        assert_eq!(soc.registers()[4], (1.5f32 / 2.25f32).to_bits() as usize);
        assert_eq!(soc.registers()[5], 2.25f32.to_bits() as usize);
    });
}

fn assert_parks_with(opcode: usize, message: &str) {
    with_handler(|soc, handler| {
        soc.set_registers(registers(&[]));
        let result = catch_unwind(AssertUnwindSafe(|| {
            trap(soc, handler, TrapOrigin::User, opcode, 0)
        }));
        let panic = result.unwrap_err();
        let panic = panic.downcast_ref::<String>().unwrap();
        assert!(panic.contains("parked"), "{}", panic);
        assert_eq!(soc.console_output_string(), message);
    });
}

#[test]
fn unknown_opcode_parks() {
    assert_parks_with(0x3402, "badopcode: 02 34\n");
}

#[test]
fn unknown_float_opcode_parks() {
    assert_parks_with(0x12dc, "badopcode: dc 12\n");
}

#[test]
fn concurrent_cldst_increments_are_atomic() {
    const INCREMENTS: usize = 200;

    with_handler(|soc, handler| {
        std::thread::scope(|s| {
            for core in 0..common::CORES {
                s.spawn(move || {
                    set_current_core(core);
                    for _ in 0..INCREMENTS {
                        loop {
                            let old = unsafe { soc.load(DATA, Width::W32) } as usize;
                            soc.set_registers(registers(&[(Gpr::SR, old), (Gpr::R3, old + 1)]));
                            trap(soc, handler, TrapOrigin::User, CLDST32, DATA);
                            if soc.registers()[3] == old {
                                break;
                            }
                        }
                    }
                });
            }
        });
        assert_eq!(
            unsafe { soc.load(DATA, Width::W32) } as usize,
            common::CORES * INCREMENTS
        );
    });
}
