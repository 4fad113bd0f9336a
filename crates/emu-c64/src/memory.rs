//! C64 memory subsystem and bank controller.
//!
//! The C64 has 64K RAM with overlaid ROMs and I/O controlled by the 6510's
//! internal I/O port at $00 (DDR) and $01 (data register).
//!
//! # Banking
//!
//! The effective port value bits 0-2 decide what the CPU sees:
//!
//! | CHAREN(2) | HIRAM(1) | LORAM(0) | $A000-$BFFF | $D000-$DFFF | $E000-$FFFF |
//! |-----------|----------|----------|-------------|-------------|-------------|
//! | 1         | 1        | 1        | BASIC       | I/O         | Kernal      |
//! | 1         | 1        | 0        | RAM         | I/O         | Kernal      |
//! | 1         | 0        | 1        | RAM         | I/O         | RAM         |
//! | 0         | 1        | 1        | BASIC       | Char ROM    | Kernal      |
//! | 0         | 1        | 0        | RAM         | Char ROM    | Kernal      |
//! | 0         | 0        | 1        | RAM         | Char ROM    | RAM         |
//! | x         | 0        | 0        | RAM         | RAM         | RAM         |
//!
//! Changing the latch never touches RAM. Writes under a ROM window land in
//! RAM and show up again once the window is switched out.

use crate::config::{ROM_4K, ROM_8K, check_rom_size};
use crate::error::ConfigError;

/// Power-on DDR: bits 0-3 and 5 are outputs.
pub const DEFAULT_DDR: u8 = 0x2F;
/// Power-on data register: all ROMs and I/O visible.
pub const DEFAULT_LATCH: u8 = 0x37;

/// Pull-ups on the port lines the DDR leaves as inputs.
const PORT_PULLUPS: u8 = 0x37;

const LORAM: u8 = 0x01;
const HIRAM: u8 = 0x02;
const CHAREN: u8 = 0x04;

/// Which ROM image backs an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomKind {
    Basic,
    Kernal,
    Char,
}

/// What the CPU reaches at an address under the current latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    Ram,
    Rom(RomKind),
    Io,
}

/// C64 memory subsystem: 64K RAM + ROMs + colour RAM + 6510 port.
pub struct C64Memory {
    /// 64K RAM, including the bytes under $00/$01.
    ram: Box<[u8; 0x10000]>,
    /// Kernal ROM (8K, mapped at $E000-$FFFF).
    kernal_rom: Vec<u8>,
    /// BASIC ROM (8K, mapped at $A000-$BFFF).
    basic_rom: Vec<u8>,
    /// Character ROM (4K, mapped at $D000-$DFFF).
    char_rom: Vec<u8>,
    /// Colour RAM (1K, 4 bits per cell, at $D800-$DBFF).
    colour_ram: [u8; 1024],
    /// 6510 port: data direction register ($00).
    port_ddr: u8,
    /// 6510 port: data register ($01).
    port_data: u8,
}

impl C64Memory {
    /// Create a new C64 memory subsystem with the given ROMs.
    pub fn new(kernal_rom: &[u8], basic_rom: &[u8], char_rom: &[u8]) -> Result<Self, ConfigError> {
        check_rom_size("Kernal", kernal_rom, ROM_8K)?;
        check_rom_size("BASIC", basic_rom, ROM_8K)?;
        check_rom_size("Character", char_rom, ROM_4K)?;

        Ok(Self {
            ram: Box::new([0; 0x10000]),
            kernal_rom: kernal_rom.to_vec(),
            basic_rom: basic_rom.to_vec(),
            char_rom: char_rom.to_vec(),
            colour_ram: [0; 1024],
            port_ddr: DEFAULT_DDR,
            port_data: DEFAULT_LATCH,
        })
    }

    /// Effective port value: (data & ddr) | (pullups & !ddr).
    fn effective_port(&self) -> u8 {
        (self.port_data & self.port_ddr) | (PORT_PULLUPS & !self.port_ddr)
    }

    /// HIRAM line: Kernal ROM visible when set.
    #[must_use]
    pub fn hiram(&self) -> bool {
        self.effective_port() & HIRAM != 0
    }

    /// LORAM line: BASIC ROM visible (together with HIRAM) when set.
    #[must_use]
    pub fn loram(&self) -> bool {
        self.effective_port() & LORAM != 0
    }

    /// CHAREN line: I/O visible when set, character ROM when clear.
    #[must_use]
    pub fn charen(&self) -> bool {
        self.effective_port() & CHAREN != 0
    }

    /// Decode `addr` against the current latch.
    #[must_use]
    pub fn current_mapping_for(&self, addr: u16) -> Mapping {
        match addr {
            0xA000..=0xBFFF if self.hiram() && self.loram() => Mapping::Rom(RomKind::Basic),
            0xD000..=0xDFFF if self.hiram() || self.loram() => {
                if self.charen() {
                    Mapping::Io
                } else {
                    Mapping::Rom(RomKind::Char)
                }
            }
            0xE000..=0xFFFF if self.hiram() => Mapping::Rom(RomKind::Kernal),
            _ => Mapping::Ram,
        }
    }

    /// Read a ROM byte for an address inside that ROM's window.
    #[must_use]
    pub fn rom_read(&self, kind: RomKind, addr: u16) -> u8 {
        let (rom, base) = match kind {
            RomKind::Basic => (&self.basic_rom, 0xA000),
            RomKind::Kernal => (&self.kernal_rom, 0xE000),
            RomKind::Char => (&self.char_rom, 0xD000),
        };
        rom.get(usize::from(addr.wrapping_sub(base)))
            .copied()
            .unwrap_or(0xFF)
    }

    /// Data register at $01 as read by the CPU.
    #[must_use]
    pub fn get_latch(&self) -> u8 {
        self.effective_port()
    }

    /// Raw data register, before the DDR and pull-ups are applied.
    #[must_use]
    pub fn latch_data(&self) -> u8 {
        self.port_data
    }

    /// Set the $01 data register. RAM is not touched.
    pub fn set_latch(&mut self, value: u8) {
        if value != self.port_data {
            log::debug!("bank latch ${:02X} -> ${value:02X}", self.port_data);
        }
        self.port_data = value;
    }

    #[must_use]
    pub fn ddr(&self) -> u8 {
        self.port_ddr
    }

    /// Set the $00 data direction register. RAM is not touched.
    pub fn set_ddr(&mut self, value: u8) {
        self.port_ddr = value;
    }

    /// CPU write to the port addresses: update the register and the RAM
    /// byte underneath.
    pub fn port_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000 => self.set_ddr(value),
            0x0001 => self.set_latch(value),
            _ => return,
        }
        self.ram[usize::from(addr)] = value;
    }

    /// Direct RAM write (bypasses banking and I/O).
    pub fn ram_write(&mut self, addr: u16, value: u8) {
        self.ram[usize::from(addr)] = value;
    }

    /// Direct RAM read.
    #[must_use]
    pub fn ram_read(&self, addr: u16) -> u8 {
        self.ram[usize::from(addr)]
    }

    /// The whole 64K RAM.
    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram[..]
    }

    /// Replace RAM. `data` must be exactly 64K; callers validate first.
    pub fn load_ram(&mut self, data: &[u8]) {
        let len = data.len().min(self.ram.len());
        self.ram[..len].copy_from_slice(&data[..len]);
    }

    /// Read colour RAM at the given offset (0-1023). High nibble reads 0.
    #[must_use]
    pub fn colour_ram_read(&self, offset: u16) -> u8 {
        self.colour_ram
            .get(usize::from(offset))
            .map_or(0, |v| v & 0x0F)
    }

    /// Write colour RAM at the given offset (0-1023). Only low 4 bits stored.
    pub fn colour_ram_write(&mut self, offset: u16, value: u8) {
        if let Some(cell) = self.colour_ram.get_mut(usize::from(offset)) {
            *cell = value & 0x0F;
        }
    }

    #[must_use]
    pub fn colour_ram(&self) -> &[u8] {
        &self.colour_ram
    }

    /// Replace colour RAM; values are masked to 4 bits.
    pub fn load_colour_ram(&mut self, data: &[u8]) {
        for (cell, &v) in self.colour_ram.iter_mut().zip(data) {
            *cell = v & 0x0F;
        }
    }
}
