//! Whole-machine behaviour: CPU programs running against the C64 bus,
//! interrupt wiring and the debugger run loop.

use emu_c64::{
    C64, C64Config, C64Model, Cartridge, CartridgeMode, CartridgeType, Debugger, Flow,
    Snapshot, Stop,
};
use emu_core::Bus;

/// Kernal handler for IRQ and NMI.
const HANDLER: u16 = 0xE100;

/// A machine with a synthetic Kernal: NOP fill, reset to $C000, IRQ and
/// NMI to `HANDLER`, where `handler` is placed.
fn machine(program: &[u8], handler: &[u8]) -> C64 {
    let mut kernal = vec![0xEA; 8192];
    kernal[0x1FFC..0x1FFE].copy_from_slice(&[0x00, 0xC0]);
    kernal[0x1FFA..0x1FFC].copy_from_slice(&HANDLER.to_le_bytes());
    kernal[0x1FFE..0x2000].copy_from_slice(&HANDLER.to_le_bytes());
    let offset = usize::from(HANDLER - 0xE000);
    kernal[offset..offset + handler.len()].copy_from_slice(handler);

    let mut c64 = C64::new(&C64Config {
        model: C64Model::C64Pal,
        kernal_rom: kernal,
        basic_rom: vec![0xBB; 8192],
        char_rom: vec![0xCC; 4096],
    })
    .expect("valid config");

    let mut prg = vec![0x00, 0xC0];
    prg.extend_from_slice(program);
    c64.load_prg(&prg).expect("valid PRG");
    c64
}

#[test]
fn store_loop_fills_page_with_exact_timing() {
    // LDX #0; loop: TXA; STA $0400,X; INX; BNE loop; done: JMP done
    let program = [
        0xA2, 0x00, 0x8A, 0x9D, 0x00, 0x04, 0xE8, 0xD0, 0xF9, 0x4C, 0x09, 0xC0,
    ];
    let mut c64 = machine(&program, &[0x40]);
    let mut dbg = Debugger::default();
    dbg.add_breakpoint(0xC009);

    assert_eq!(dbg.run(&mut c64, 100_000), Stop::Breakpoint(0xC009));
    for i in 0..=255u8 {
        assert_eq!(c64.bus().memory.ram_read(0x0400 + u16::from(i)), i);
    }
    // Reset 7, LDX 2, 255 taken iterations of 12, one final of 11
    assert_eq!(c64.cycles(), 7 + 2 + 255 * 12 + 11);
}

#[test]
fn ram_under_kernal_survives_bank_round_trip() {
    let program = [
        0xA9, 0x35, 0x85, 0x01, // LDA #$35; STA $01   (Kernal out)
        0xA9, 0x99, 0x8D, 0x00, 0xE0, // LDA #$99; STA $E000
        0xAD, 0x00, 0xE0, 0x85, 0x10, // LDA $E000; STA $10
        0xA9, 0x37, 0x85, 0x01, // LDA #$37; STA $01   (Kernal in)
        0xAD, 0x00, 0xE0, 0x85, 0x11, // LDA $E000; STA $11
        0xA9, 0x35, 0x85, 0x01, // LDA #$35; STA $01
        0xAD, 0x00, 0xE0, 0x85, 0x12, // LDA $E000; STA $12
        0x4C, 0x20, 0xC0, // JMP *
    ];
    let mut c64 = machine(&program, &[0x40]);
    let mut dbg = Debugger::default();
    dbg.add_breakpoint(0xC020);
    assert_eq!(dbg.run(&mut c64, 10_000), Stop::Breakpoint(0xC020));

    let ram = c64.bus().memory.ram();
    assert_eq!(ram[0x10], 0x99, "RAM visible with HIRAM clear");
    assert_eq!(ram[0x11], 0xEA, "Kernal visible again");
    assert_eq!(ram[0x12], 0x99, "RAM untouched by the latch change");
    assert_eq!(ram[0x01], 0x35, "port write also lands in RAM");
}

#[test]
fn cartridge_romh_precedes_basic() {
    // LDA $A000; STA $10; JMP *
    let program = [0xAD, 0x00, 0xA0, 0x85, 0x10, 0x4C, 0x05, 0xC0];
    let mut c64 = machine(&program, &[0x40]);
    let mut image = vec![0x11; 8192];
    image.extend(vec![0x22; 8192]);
    c64.insert_cartridge(
        Cartridge::from_raw(CartridgeType::Normal, CartridgeMode::SixteenK, &image)
            .expect("16K image"),
    );
    c64.run_for(20).expect("no faults");
    assert_eq!(c64.bus().memory.ram_read(0x0010), 0x22);
    assert_eq!(c64.bus().peek(0x8000), 0x11);

    c64.remove_cartridge();
    assert_eq!(c64.bus().peek(0xA000), 0xBB);
}

/// CLI, then write a CIA1 timer setup and spin.
fn timer_program(cra: u8) -> Vec<u8> {
    vec![
        0xA9, 0x20, 0x8D, 0x04, 0xDC, // LDA #$20; STA $DC04
        0xA9, 0x00, 0x8D, 0x05, 0xDC, // LDA #$00; STA $DC05
        0xA9, 0x81, 0x8D, 0x0D, 0xDC, // LDA #$81; STA $DC0D
        0xA9, cra, 0x8D, 0x0E, 0xDC, // LDA #cra; STA $DC0E
        0x58, // CLI
        0x4C, 0x15, 0xC0, // JMP *
    ]
}

fn count_services(c64: &mut C64, steps: usize) -> usize {
    let mut count = 0;
    for _ in 0..steps {
        c64.step().expect("no faults");
        if c64.cpu().pc() == HANDLER {
            count += 1;
        }
    }
    count
}

#[test]
fn unacknowledged_irq_refires_after_rti() {
    // Handler returns without reading the ICR, so the line stays high
    let mut c64 = machine(&timer_program(0x09), &[0x40]);
    let services = count_services(&mut c64, 200);
    assert!(services > 10, "IRQ serviced {services} times");
    assert!(c64.bus().irq_active());
}

#[test]
fn acknowledged_one_shot_irq_fires_once() {
    // LDA $DC0D; RTI
    let mut c64 = machine(&timer_program(0x09), &[0xAD, 0x0D, 0xDC, 0x40]);
    let services = count_services(&mut c64, 500);
    assert_eq!(services, 1);
    assert!(!c64.bus().irq_active());
}

#[test]
fn irq_held_off_by_interrupt_disable() {
    let mut program = timer_program(0x09);
    program[20] = 0xEA; // NOP instead of CLI
    let mut c64 = machine(&program, &[0x40]);
    assert_eq!(count_services(&mut c64, 200), 0);
    assert!(c64.bus().irq_active(), "line asserted, just masked");
}

#[test]
fn debugger_snapshot_file_round_trip() {
    let path = std::env::temp_dir().join(format!("emu-c64-snap-{}.json", std::process::id()));
    let program = [0xE8, 0x4C, 0x00, 0xC0]; // INX; JMP $C000
    let mut c64 = machine(&program, &[0x40]);
    let mut dbg = Debugger::default();
    let mut out = Vec::new();

    dbg.execute(&mut c64, "set 3000 AB", &mut out).expect("set");
    let save = format!("save {}", path.display());
    dbg.execute(&mut c64, &save, &mut out).expect("save");
    let before = Snapshot::capture(&c64);

    c64.run_for(500).expect("no faults");
    dbg.execute(&mut c64, "set 3000 00", &mut out).expect("set");
    assert_ne!(Snapshot::capture(&c64), before);

    let load = format!("load {}", path.display());
    assert_eq!(
        dbg.execute(&mut c64, &load, &mut out).expect("load"),
        Flow::Continue
    );
    assert_eq!(Snapshot::capture(&c64), before);
    assert_eq!(c64.bus().peek(0x3000), 0xAB);

    std::fs::remove_file(&path).ok();
}

#[test]
fn loading_a_missing_snapshot_is_reported() {
    let mut c64 = machine(&[0xEA], &[0x40]);
    let mut dbg = Debugger::default();
    let mut out = Vec::new();
    let err = dbg
        .execute(&mut c64, "load /nonexistent/emustate.json", &mut out)
        .unwrap_err();
    assert!(err.to_string().contains("/nonexistent/emustate.json"), "{err}");
    assert_eq!(c64.cpu().pc(), 0xC000);
}
