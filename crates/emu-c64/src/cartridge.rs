//! Expansion-port cartridge: raw ROM banks plus EXROM/GAME mapping.
//!
//! Images are raw 8K chunks; container formats are not parsed here.
//! The EXROM and GAME lines are active low (false = asserted):
//!
//! | EXROM | GAME | Mode    | ROML $8000           | ROMH                    |
//! |-------|------|---------|----------------------|-------------------------|
//! | 0     | 1    | 8K      | when LORAM and HIRAM | -                       |
//! | 0     | 0    | 16K     | when LORAM and HIRAM | $A000 when HIRAM        |
//! | 1     | 0    | Ultimax | always               | $E000 always            |
//! | 1     | 1    | off     | -                    | -                       |
//!
//! Supported types:
//! - Normal: 8K, 16K or Ultimax, no bankswitching.
//! - Ocean: up to 64 x 8K banks at ROML, selected via $DE00.
//! - Magic Desk: up to 128 x 8K banks at ROML, selected via $DE00.
//!   Bit 7 of the bank register disables the cartridge (EXROM=1).

use std::fmt;

use crate::error::ConfigError;

const BANK_SIZE: usize = 0x2000;

/// Cartridge hardware type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeType {
    /// 8K, 16K or Ultimax, no bankswitching.
    Normal,
    /// Up to 64 x 8K banks at $8000, selected via $DE00.
    Ocean,
    /// Up to 128 x 8K banks at $8000, selected via $DE00.
    MagicDesk,
}

/// Initial EXROM/GAME configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeMode {
    EightK,
    SixteenK,
    Ultimax,
}

impl CartridgeMode {
    /// `(exrom, game)` line levels for this mode.
    #[must_use]
    pub const fn lines(self) -> (bool, bool) {
        match self {
            Self::EightK => (false, true),
            Self::SixteenK => (false, false),
            Self::Ultimax => (true, false),
        }
    }
}

impl fmt::Display for CartridgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EightK => "8K",
            Self::SixteenK => "16K",
            Self::Ultimax => "Ultimax",
        })
    }
}

/// An inserted cartridge.
#[derive(Debug, Clone)]
pub struct Cartridge {
    /// Hardware type.
    pub cart_type: CartridgeType,
    /// EXROM line state (active low: false = asserted).
    pub exrom: bool,
    /// GAME line state (active low: false = asserted).
    pub game: bool,
    /// ROML banks (8K each, mapped at $8000-$9FFF).
    roml: Vec<Vec<u8>>,
    /// ROMH banks (8K each, mapped at $A000-$BFFF or $E000-$FFFF).
    romh: Vec<Vec<u8>>,
    /// Current bank index (for bankswitched types).
    pub bank: u8,
}

impl Cartridge {
    /// Build a cartridge from a raw image cut into 8K banks.
    ///
    /// A Normal cartridge needs one bank for 8K, two for 16K and one or
    /// two for Ultimax (a single bank goes to ROMH). Banked types put
    /// every bank on ROML.
    pub fn from_raw(
        cart_type: CartridgeType,
        mode: CartridgeMode,
        data: &[u8],
    ) -> Result<Self, ConfigError> {
        let size_error = || ConfigError::CartridgeSize {
            len: data.len(),
            mode,
        };
        if data.is_empty() || data.len() % BANK_SIZE != 0 {
            return Err(size_error());
        }
        let mut banks: Vec<Vec<u8>> = data.chunks(BANK_SIZE).map(<[u8]>::to_vec).collect();

        let (roml, romh) = match (cart_type, mode, banks.len()) {
            (CartridgeType::Normal, CartridgeMode::EightK, 1) => (banks, Vec::new()),
            (CartridgeType::Normal, CartridgeMode::SixteenK | CartridgeMode::Ultimax, 2) => {
                let hi = banks.split_off(1);
                (banks, hi)
            }
            (CartridgeType::Normal, CartridgeMode::Ultimax, 1) => (Vec::new(), banks),
            (CartridgeType::Normal, _, _) => return Err(size_error()),
            (CartridgeType::Ocean, _, 1..=64) | (CartridgeType::MagicDesk, _, 1..=128) => {
                (banks, Vec::new())
            }
            _ => return Err(size_error()),
        };

        let (exrom, game) = mode.lines();
        Ok(Self {
            cart_type,
            exrom,
            game,
            roml,
            romh,
            bank: 0,
        })
    }

    /// Read from the current ROML bank at the given offset (0-8191).
    fn read_roml(&self, offset: u16) -> Option<u8> {
        self.roml
            .get(usize::from(self.bank))
            .and_then(|bank| bank.get(usize::from(offset)))
            .copied()
    }

    /// Read from the current ROMH bank at the given offset (0-8191).
    fn read_romh(&self, offset: u16) -> Option<u8> {
        let bank = match self.cart_type {
            CartridgeType::Normal => 0,
            CartridgeType::Ocean | CartridgeType::MagicDesk => usize::from(self.bank),
        };
        self.romh
            .get(bank)
            .and_then(|b| b.get(usize::from(offset)))
            .copied()
    }

    /// The byte the cartridge drives at `addr`, if it claims the address
    /// under the current lines and CPU port state.
    #[must_use]
    pub fn read(&self, addr: u16, loram: bool, hiram: bool) -> Option<u8> {
        match (self.exrom, self.game, addr) {
            // 8K and 16K: ROML
            (false, _, 0x8000..=0x9FFF) if loram && hiram => self.read_roml(addr - 0x8000),
            // 16K: ROMH replaces BASIC
            (false, false, 0xA000..=0xBFFF) if hiram => self.read_romh(addr - 0xA000),
            // Ultimax
            (true, false, 0x8000..=0x9FFF) => self.read_roml(addr - 0x8000),
            (true, false, 0xE000..=0xFFFF) => self.read_romh(addr - 0xE000),
            _ => None,
        }
    }

    /// Handle a write to the I/O expansion area ($DE00-$DFFF).
    pub fn write_io(&mut self, addr: u16, value: u8) {
        match self.cart_type {
            CartridgeType::Normal => {
                log::warn!("write ${value:02X} to ${addr:04X} ignored by a Normal cartridge");
            }
            CartridgeType::Ocean => {
                if addr == 0xDE00 {
                    self.bank = value & 0x3F;
                }
            }
            CartridgeType::MagicDesk => {
                if addr == 0xDE00 {
                    self.bank = value & 0x7F;
                    // Bit 7: 1 = disable cartridge (EXROM=1)
                    self.exrom = value & 0x80 != 0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn banks(count: usize) -> Vec<u8> {
        (0..count)
            .flat_map(|i| std::iter::repeat_n(i as u8 + 1, BANK_SIZE))
            .collect()
    }

    #[test]
    fn eight_k_needs_both_rom_lines() {
        let cart = Cartridge::from_raw(CartridgeType::Normal, CartridgeMode::EightK, &banks(1))
            .expect("8K image");
        assert_eq!(cart.read(0x8000, true, true), Some(1));
        assert_eq!(cart.read(0x8000, false, true), None);
        assert_eq!(cart.read(0xA000, true, true), None);
    }

    #[test]
    fn sixteen_k_maps_romh_at_a000() {
        let cart = Cartridge::from_raw(CartridgeType::Normal, CartridgeMode::SixteenK, &banks(2))
            .expect("16K image");
        assert_eq!(cart.read(0x9FFF, true, true), Some(1));
        assert_eq!(cart.read(0xA000, false, true), Some(2));
        assert_eq!(cart.read(0xA000, true, false), None);
    }

    #[test]
    fn ultimax_ignores_port() {
        let cart = Cartridge::from_raw(CartridgeType::Normal, CartridgeMode::Ultimax, &banks(2))
            .expect("Ultimax image");
        assert_eq!(cart.read(0x8000, false, false), Some(1));
        assert_eq!(cart.read(0xFFFC, false, false), Some(2));
    }

    #[test]
    fn wrong_size_is_rejected() {
        let err = Cartridge::from_raw(CartridgeType::Normal, CartridgeMode::EightK, &banks(2))
            .unwrap_err();
        assert!(matches!(err, ConfigError::CartridgeSize { len: 16384, .. }));
        assert!(
            Cartridge::from_raw(CartridgeType::Ocean, CartridgeMode::EightK, &[0; 100]).is_err()
        );
    }

    #[test]
    fn ocean_bank_switch() {
        let mut cart = Cartridge::from_raw(CartridgeType::Ocean, CartridgeMode::EightK, &banks(4))
            .expect("Ocean image");
        cart.write_io(0xDE00, 3);
        assert_eq!(cart.read(0x8000, true, true), Some(4));
        // Bank past the image reads as unclaimed
        cart.write_io(0xDE00, 10);
        assert_eq!(cart.read(0x8000, true, true), None);
    }

    #[test]
    fn magic_desk_bit7_disables() {
        let mut cart =
            Cartridge::from_raw(CartridgeType::MagicDesk, CartridgeMode::EightK, &banks(2))
                .expect("Magic Desk image");
        cart.write_io(0xDE00, 0x80);
        assert!(cart.exrom);
        assert_eq!(cart.read(0x8000, true, true), None);
    }
}
