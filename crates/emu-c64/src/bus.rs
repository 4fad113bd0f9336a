//! C64 bus: memory, cartridge and peripheral routing.
//!
//! Implements `emu_core::Bus` for the C64. Each access resolves in a
//! fixed order:
//!
//! 1. Cartridge, when one is inserted and its lines claim the address.
//! 2. The $00/$01 port, then the bank windows: ROM, or I/O dispatched to
//!    colour RAM or the peripheral owning the address (unclaimed I/O
//!    reads $FF).
//! 3. Peripherals registered outside $D000-$DFFF.
//! 4. RAM.
//!
//! Devices always receive the full 16-bit address.

use std::ops::RangeInclusive;

use emu_core::{Bus, Peripheral};

use crate::cartridge::Cartridge;
use crate::error::BusError;
use crate::memory::{C64Memory, Mapping, RomKind};

const IO_WINDOW: RangeInclusive<u16> = 0xD000..=0xDFFF;
const COLOUR_RAM: RangeInclusive<u16> = 0xD800..=0xDBFF;
const EXPANSION_IO: RangeInclusive<u16> = 0xDE00..=0xDFFF;

/// A registered device and the addresses it owns.
struct Slot {
    name: String,
    start: u16,
    end: u16,
    device: Box<dyn Peripheral>,
}

impl Slot {
    fn contains(&self, addr: u16) -> bool {
        (self.start..=self.end).contains(&addr)
    }
}

/// Where an access lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Cartridge(u8),
    Ddr,
    Latch,
    Rom(RomKind),
    ColourRam(u16),
    Device(usize),
    Unmapped,
    Ram,
}

/// The C64 bus, implementing `emu_core::Bus`.
pub struct C64Bus {
    pub memory: C64Memory,
    pub cartridge: Option<Cartridge>,
    slots: Vec<Slot>,
}

impl C64Bus {
    #[must_use]
    pub fn new(memory: C64Memory) -> Self {
        Self {
            memory,
            cartridge: None,
            slots: Vec::new(),
        }
    }

    /// Attach a device to `range`. Ranges may not overlap each other, the
    /// CPU port or colour RAM, and names must be unique (they key the
    /// snapshot).
    pub fn register(
        &mut self,
        name: impl Into<String>,
        range: RangeInclusive<u16>,
        device: Box<dyn Peripheral>,
    ) -> Result<(), BusError> {
        let name = name.into();
        let (start, end) = (*range.start(), *range.end());
        if start > end {
            return Err(BusError::EmptyRange { name, start, end });
        }
        if self.slots.iter().any(|s| s.name == name) {
            return Err(BusError::DuplicateName(name));
        }

        let overlap = |s: u16, e: u16| start <= e && s <= end;
        let existing = if overlap(0x0000, 0x0001) {
            Some("cpu_port".to_string())
        } else if overlap(*COLOUR_RAM.start(), *COLOUR_RAM.end()) {
            Some("colour_ram".to_string())
        } else {
            self.slots
                .iter()
                .find(|s| overlap(s.start, s.end))
                .map(|s| s.name.clone())
        };
        if let Some(existing) = existing {
            return Err(BusError::Overlap {
                name,
                start,
                end,
                existing,
            });
        }

        log::debug!("registered `{name}` at ${start:04X}-${end:04X}");
        self.slots.push(Slot {
            name,
            start,
            end,
            device,
        });
        Ok(())
    }

    /// Registered peripheral names, in registration order.
    pub fn peripheral_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    #[must_use]
    pub fn peripheral(&self, name: &str) -> Option<&dyn Peripheral> {
        self.slots
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.device.as_ref())
    }

    pub fn peripheral_mut(&mut self, name: &str) -> Option<&mut (dyn Peripheral + 'static)> {
        self.slots
            .iter_mut()
            .find(|s| s.name == name)
            .map(|s| s.device.as_mut())
    }

    /// OR of every device's IRQ output.
    #[must_use]
    pub fn irq_active(&self) -> bool {
        self.slots.iter().any(|s| s.device.irq_active())
    }

    /// OR of every device's NMI output.
    #[must_use]
    pub fn nmi_active(&self) -> bool {
        self.slots.iter().any(|s| s.device.nmi_active())
    }

    /// Advance every device by `cycles`.
    pub fn tick(&mut self, cycles: u32) {
        for slot in &mut self.slots {
            slot.device.tick(cycles);
        }
    }

    fn slot_for(&self, addr: u16) -> Option<usize> {
        self.slots.iter().position(|s| s.contains(addr))
    }

    fn resolve(&self, addr: u16) -> Target {
        if let Some(value) = self.cartridge.as_ref().and_then(|c| {
            c.read(addr, self.memory.loram(), self.memory.hiram())
        }) {
            return Target::Cartridge(value);
        }
        match addr {
            0x0000 => return Target::Ddr,
            0x0001 => return Target::Latch,
            _ => {}
        }
        match self.memory.current_mapping_for(addr) {
            Mapping::Rom(kind) => Target::Rom(kind),
            Mapping::Io if COLOUR_RAM.contains(&addr) => Target::ColourRam(addr - 0xD800),
            Mapping::Io => self.slot_for(addr).map_or(Target::Unmapped, Target::Device),
            // I/O devices are invisible while their window is banked out
            Mapping::Ram if IO_WINDOW.contains(&addr) => Target::Ram,
            Mapping::Ram => self.slot_for(addr).map_or(Target::Ram, Target::Device),
        }
    }
}

impl Bus for C64Bus {
    fn read(&mut self, addr: u16) -> u8 {
        match self.resolve(addr) {
            Target::Device(i) => self.slots[i].device.read(addr),
            _ => self.peek(addr),
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        if EXPANSION_IO.contains(&addr) && self.memory.current_mapping_for(addr) == Mapping::Io {
            if let Some(cart) = self.cartridge.as_mut() {
                cart.write_io(addr, value);
            }
        }

        match self.resolve(addr) {
            Target::Ddr | Target::Latch => self.memory.port_write(addr, value),
            Target::ColourRam(offset) => self.memory.colour_ram_write(offset, value),
            Target::Device(i) => self.slots[i].device.write(addr, value),
            Target::Unmapped => {}
            // Writes under ROM (system or cartridge) land in RAM
            Target::Cartridge(_) | Target::Rom(_) | Target::Ram => {
                self.memory.ram_write(addr, value);
            }
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        match self.resolve(addr) {
            Target::Cartridge(value) => value,
            Target::Ddr => self.memory.ddr(),
            Target::Latch => self.memory.get_latch(),
            Target::Rom(kind) => self.memory.rom_read(kind, addr),
            Target::ColourRam(offset) => self.memory.colour_ram_read(offset),
            Target::Device(i) => self.slots[i].device.peek(addr),
            Target::Unmapped => 0xFF,
            Target::Ram => self.memory.ram_read(addr),
        }
    }
}
