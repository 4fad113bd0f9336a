//! Top-level C64 system.
//!
//! The machine owns the CPU and the bus and is the single execution
//! context handed `&mut` to the run loop and the debugger.
//!
//! # Step
//!
//! Each step:
//! 1. OR every peripheral IRQ output onto the CPU IRQ line
//! 2. Edge-detect the OR of the NMI outputs and latch a CPU NMI
//! 3. Step the CPU (one instruction or one interrupt service)
//! 4. Tick every peripheral by the cycles consumed

use std::ops::RangeInclusive;

use emu_6502::{CpuError, Mos6502};
use emu_core::{Bus, Observable, Peripheral, Value};

use crate::bus::C64Bus;
use crate::cartridge::Cartridge;
use crate::config::{C64Config, C64Model};
use crate::devices::{InterruptLine, IntervalTimer, RegisterBank};
use crate::error::{BusError, ConfigError, PrgError};
use crate::memory::C64Memory;
use crate::prg;

/// C64 system.
pub struct C64 {
    cpu: Mos6502,
    bus: C64Bus,
    model: C64Model,
    /// Previous combined NMI output (for edge detection).
    nmi_prev: bool,
    /// Completed frame counter.
    frame_count: u64,
}

impl C64 {
    /// Create a C64 with the stock peripherals and reset it.
    pub fn new(config: &C64Config) -> Result<Self, ConfigError> {
        let memory = C64Memory::new(&config.kernal_rom, &config.basic_rom, &config.char_rom)?;
        let mut bus = C64Bus::new(memory);

        bus.register("vic", 0xD000..=0xD3FF, Box::new(RegisterBank::vic()))?;
        bus.register("sid", 0xD400..=0xD7FF, Box::new(RegisterBank::sid()))?;
        bus.register(
            "cia1",
            0xDC00..=0xDCFF,
            Box::new(IntervalTimer::new(InterruptLine::Irq)),
        )?;
        bus.register(
            "cia2",
            0xDD00..=0xDDFF,
            Box::new(IntervalTimer::new(InterruptLine::Nmi)),
        )?;

        let mut c64 = Self::with_bus(bus, config.model);
        c64.cpu.reset_counter(&mut c64.bus);
        log::info!(
            "C64 ({:?}) ready, reset vector ${:04X}",
            config.model,
            c64.cpu.pc()
        );
        Ok(c64)
    }

    /// A PAL machine with no peripherals, reset from whatever the vector
    /// holds.
    #[must_use]
    pub fn bare(memory: C64Memory) -> Self {
        let mut c64 = Self::with_bus(C64Bus::new(memory), C64Model::C64Pal);
        c64.cpu.reset_counter(&mut c64.bus);
        c64
    }

    fn with_bus(bus: C64Bus, model: C64Model) -> Self {
        Self {
            cpu: Mos6502::new(),
            bus,
            model,
            nmi_prev: false,
            frame_count: 0,
        }
    }

    /// Drive the CPU's IRQ line from the peripherals and latch a rising
    /// NMI edge. Idempotent until the peripherals change.
    pub fn wire_interrupts(&mut self) {
        self.cpu.set_irq(self.bus.irq_active());
        let nmi = self.bus.nmi_active();
        if nmi && !self.nmi_prev {
            self.cpu.nmi();
        }
        self.nmi_prev = nmi;
    }

    /// Run one instruction-boundary event. Returns the cycles consumed.
    ///
    /// On error nothing has advanced: the PC still addresses the bad
    /// opcode and the peripherals have not ticked.
    pub fn step(&mut self) -> Result<u32, CpuError> {
        self.wire_interrupts();
        let cycles = self.cpu.step(&mut self.bus)?;
        self.bus.tick(cycles);
        Ok(cycles)
    }

    /// Step until at least `budget` cycles have run. Returns the cycles
    /// actually consumed (the last instruction may overshoot).
    pub fn run_for(&mut self, budget: u64) -> Result<u64, CpuError> {
        let mut used = 0u64;
        while used < budget {
            used += u64::from(self.step()?);
        }
        Ok(used)
    }

    /// Run one video frame's worth of cycles.
    pub fn run_frame(&mut self) -> Result<u64, CpuError> {
        let cycles = self.run_for(self.model.cycles_per_frame())?;
        self.frame_count += 1;
        Ok(cycles)
    }

    /// Reset the CPU from the vector. RAM and the cycle counter survive.
    pub fn reset(&mut self) {
        self.nmi_prev = false;
        self.cpu.reset(&mut self.bus);
    }

    /// Take the current NMI output as the edge reference, so state loaded
    /// behind the machine's back does not fire a spurious NMI.
    pub(crate) fn resync_nmi_edge(&mut self) {
        self.nmi_prev = self.bus.nmi_active();
    }

    /// Load a PRG image into RAM. Returns the load address.
    pub fn load_prg(&mut self, data: &[u8]) -> Result<u16, PrgError> {
        prg::load_prg(&mut self.bus.memory, data)
    }

    pub fn insert_cartridge(&mut self, cartridge: Cartridge) {
        log::info!(
            "cartridge inserted ({:?}, EXROM={} GAME={})",
            cartridge.cart_type,
            u8::from(cartridge.exrom),
            u8::from(cartridge.game)
        );
        self.bus.cartridge = Some(cartridge);
    }

    pub fn remove_cartridge(&mut self) -> Option<Cartridge> {
        self.bus.cartridge.take()
    }

    /// Attach an extra device to the bus.
    pub fn register_peripheral(
        &mut self,
        name: impl Into<String>,
        range: RangeInclusive<u16>,
        device: Box<dyn Peripheral>,
    ) -> Result<(), BusError> {
        self.bus.register(name, range, device)
    }

    /// Reference to the CPU.
    #[must_use]
    pub fn cpu(&self) -> &Mos6502 {
        &self.cpu
    }

    /// Mutable reference to the CPU.
    pub fn cpu_mut(&mut self) -> &mut Mos6502 {
        &mut self.cpu
    }

    /// Reference to the bus.
    #[must_use]
    pub fn bus(&self) -> &C64Bus {
        &self.bus
    }

    /// Mutable reference to the bus.
    pub fn bus_mut(&mut self) -> &mut C64Bus {
        &mut self.bus
    }

    /// CPU and bus together, for callers that step the CPU directly.
    pub fn split_mut(&mut self) -> (&mut Mos6502, &mut C64Bus) {
        (&mut self.cpu, &mut self.bus)
    }

    #[must_use]
    pub fn model(&self) -> C64Model {
        self.model
    }

    /// Total CPU cycles.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles()
    }

    /// Completed frame count.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Parse a `memory.<addr>` suffix: `0x` or `$` prefixed hex, else decimal.
fn parse_query_addr(s: &str) -> Option<u16> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix('$')) {
        u16::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

impl Observable for C64 {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_query_addr(rest).map(|addr| self.bus.peek(addr).into())
        } else {
            match path {
                "bank.latch" => Some(self.bus.memory.get_latch().into()),
                "bank.ddr" => Some(self.bus.memory.ddr().into()),
                "cycles" => Some(self.cpu.cycles().into()),
                "frame_count" => Some(self.frame_count.into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<6502_paths>",
            "memory.<address>",
            "bank.latch",
            "bank.ddr",
            "cycles",
            "frame_count",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_c64() -> C64 {
        let mut kernal = vec![0xEA; 8192];
        // Reset vector -> $E000, IRQ/NMI -> $E100
        kernal[0x1FFC] = 0x00;
        kernal[0x1FFD] = 0xE0;
        kernal[0x1FFA] = 0x00;
        kernal[0x1FFB] = 0xE1;
        kernal[0x1FFE] = 0x00;
        kernal[0x1FFF] = 0xE1;
        let config = C64Config {
            model: C64Model::C64Pal,
            kernal_rom: kernal,
            basic_rom: vec![0; 8192],
            char_rom: vec![0; 4096],
        };
        C64::new(&config).expect("valid config")
    }

    #[test]
    fn new_resets_from_vector() {
        let c64 = make_c64();
        assert_eq!(c64.cpu().pc(), 0xE000);
        assert_eq!(c64.cycles(), 7);
        let names: Vec<&str> = c64.bus().peripheral_names().collect();
        assert_eq!(names, ["vic", "sid", "cia1", "cia2"]);
    }

    #[test]
    fn run_frame_returns_cycle_count() {
        let mut c64 = make_c64();
        let cycles = c64.run_frame().expect("NOPs never fault");
        assert!(cycles >= 19_656 && cycles < 19_656 + 7);
        assert_eq!(c64.frame_count(), 1);
    }

    #[test]
    fn observable_cpu_pc() {
        let c64 = make_c64();
        assert_eq!(c64.query("cpu.pc"), Some(Value::U16(0xE000)));
    }

    #[test]
    fn observable_memory_accepts_hex_and_decimal() {
        let mut c64 = make_c64();
        c64.bus_mut().memory.ram_write(0x0400, 0x42);
        assert_eq!(c64.query("memory.0x0400"), Some(Value::U8(0x42)));
        assert_eq!(c64.query("memory.$0400"), Some(Value::U8(0x42)));
        assert_eq!(c64.query("memory.1024"), Some(Value::U8(0x42)));
        assert_eq!(c64.query("memory.zzz"), None);
        assert_eq!(c64.query("bank.latch"), Some(Value::U8(0x37)));
    }

    #[test]
    fn cia2_underflow_is_one_nmi_edge() {
        let mut c64 = make_c64();
        let bus = c64.bus_mut();
        bus.write(0xDD0D, 0x81);
        bus.write(0xDD04, 0x00);
        bus.write(0xDD05, 0x00);
        bus.write(0xDD0E, 0x01);
        // First step: NOP, timer underflows during tick
        c64.step().expect("NOP");
        assert!(c64.bus().nmi_active());
        // Second step: NMI service
        assert_eq!(c64.step().expect("service"), 7);
        assert_eq!(c64.cpu().pc(), 0xE100);
        // The line stays high (ICR unread) but no new edge is seen
        c64.step().expect("NOP");
        assert_ne!(c64.cpu().pc(), 0xE100);
        assert!(!c64.cpu().nmi_pending());
    }

    #[test]
    fn load_prg_writes_ram() {
        let mut c64 = make_c64();
        let addr = c64.load_prg(&[0x00, 0xC0, 0xA9, 0x01]).expect("valid PRG");
        assert_eq!(addr, 0xC000);
        assert_eq!(c64.bus().memory.ram_read(0xC000), 0xA9);
        assert_eq!(c64.load_prg(&[0x00]), Err(PrgError::TooShort(1)));
    }
}
