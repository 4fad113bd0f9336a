//! Klaus Dormann's 6502 functional and decimal tests.
//!
//! The functional test binary is assembled with load address $0000 and
//! entry at $0400. It finishes by branching to itself: $3469 means every
//! test passed, any other trap address marks the failing test.
//!
//! Binaries are not shipped; drop them into `tests/data/` and run with
//! `--ignored`.

use emu_6502::{Mos6502, RunOutcome};
use emu_core::{Bus, SimpleBus};

const FUNCTIONAL_SUCCESS: u16 = 0x3469;

/// Run until the PC stops moving. Returns the trap address.
fn run_to_trap(cpu: &mut Mos6502, bus: &mut SimpleBus, max_instructions: u64) -> Option<u16> {
    let mut prev_pc = 0xFFFF_u16;
    let mut same_pc_count = 0;

    for instructions in 0..max_instructions {
        let pc = cpu.pc();
        if pc == prev_pc {
            same_pc_count += 1;
            if same_pc_count > 2 {
                eprintln!(
                    "Trapped at ${pc:04X} after {instructions} instructions ({} cycles)",
                    cpu.cycles()
                );
                return Some(pc);
            }
        } else {
            same_pc_count = 0;
            prev_pc = pc;
        }

        if let Err(e) = cpu.step(bus) {
            eprintln!("{e}");
            return None;
        }
    }
    eprintln!("exceeded {max_instructions} instructions");
    None
}

#[test]
#[ignore = "requires tests/data/6502_functional_test.bin"]
fn dormann_functional() {
    let binary = std::fs::read("tests/data/6502_functional_test.bin")
        .expect("tests/data/6502_functional_test.bin not found");
    let mut bus = SimpleBus::new();
    bus.load(0x0000, &binary);
    let mut cpu = Mos6502::new();
    cpu.set_pc(0x0400);

    assert_eq!(
        run_to_trap(&mut cpu, &mut bus, 100_000_000),
        Some(FUNCTIONAL_SUCCESS),
        "functional test trapped at the wrong address"
    );
}

#[test]
#[ignore = "requires tests/data/6502_functional_test.bin"]
fn dormann_functional_with_run_until() {
    let binary = std::fs::read("tests/data/6502_functional_test.bin")
        .expect("tests/data/6502_functional_test.bin not found");
    let mut bus = SimpleBus::new();
    bus.load(0x0000, &binary);
    let mut cpu = Mos6502::new();
    cpu.set_pc(0x0400);

    let report = cpu
        .run_until(&mut bus, 200_000_000, |cpu| cpu.pc() == FUNCTIONAL_SUCCESS)
        .expect("no undecodable opcodes in the functional test");
    assert_eq!(report.outcome, RunOutcome::Stopped);
}

#[test]
#[ignore = "requires tests/data/6502_decimal_test.bin"]
fn dormann_decimal() {
    let binary = std::fs::read("tests/data/6502_decimal_test.bin")
        .expect("tests/data/6502_decimal_test.bin not found");
    let mut bus = SimpleBus::new();
    bus.load(0x0000, &binary);
    let mut cpu = Mos6502::new();
    cpu.set_pc(0x0200);

    assert!(run_to_trap(&mut cpu, &mut bus, 50_000_000).is_some());
    // $000B is the test's error flag
    let error = bus.peek(0x000B);
    assert_eq!(
        error,
        0,
        "decimal test failed: N1=${:02X} N2=${:02X} DA=${:02X} AR=${:02X}",
        bus.peek(0x00),
        bus.peek(0x01),
        bus.peek(0x04),
        bus.peek(0x06)
    );
}
