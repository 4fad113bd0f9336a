//! Disassembler.
//!
//! Reads through `Bus::peek`, so disassembling I/O space never
//! acknowledges an interrupt or bumps a counter.

use std::fmt;

use emu_core::Bus;

use crate::opcodes::{self, Mode};

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disassembly {
    pub addr: u16,
    /// Raw instruction bytes (1-3).
    pub bytes: Vec<u8>,
    /// Mnemonic and operand, e.g. `LDA #$01`.
    pub text: String,
}

impl Disassembly {
    /// Instruction length in bytes.
    #[must_use]
    pub fn len(&self) -> u16 {
        self.bytes.len() as u16
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Display for Disassembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:04X}: ", self.addr)?;
        for i in 0..3 {
            match self.bytes.get(i) {
                Some(b) => write!(f, "{b:02X} ")?,
                None => write!(f, "   ")?,
            }
        }
        write!(f, " {}", self.text)
    }
}

/// Decode the instruction at `addr`. Undecodable bytes come back as a
/// one-byte `???`.
#[must_use]
pub fn disassemble<B: Bus>(bus: &B, addr: u16) -> Disassembly {
    let opcode = bus.peek(addr);
    let Some(entry) = opcodes::decode(opcode) else {
        return Disassembly {
            addr,
            bytes: vec![opcode],
            text: "???".to_string(),
        };
    };

    let len = entry.mode.len();
    let bytes: Vec<u8> = (0..len).map(|i| bus.peek(addr.wrapping_add(i))).collect();
    let b1 = bytes.get(1).copied().unwrap_or(0);
    let b2 = bytes.get(2).copied().unwrap_or(0);
    let word = u16::from_le_bytes([b1, b2]);

    let operand = match entry.mode {
        Mode::Implied => String::new(),
        Mode::Accumulator => "A".to_string(),
        Mode::Immediate => format!("#${b1:02X}"),
        Mode::ZeroPage => format!("${b1:02X}"),
        Mode::ZeroPageX => format!("${b1:02X},X"),
        Mode::ZeroPageY => format!("${b1:02X},Y"),
        Mode::Absolute => format!("${word:04X}"),
        Mode::AbsoluteX => format!("${word:04X},X"),
        Mode::AbsoluteY => format!("${word:04X},Y"),
        Mode::Indirect => format!("(${word:04X})"),
        Mode::IndexedIndirect => format!("(${b1:02X},X)"),
        Mode::IndirectIndexed => format!("(${b1:02X}),Y"),
        Mode::Relative => {
            let target = addr.wrapping_add(2).wrapping_add(b1 as i8 as u16);
            format!("${target:04X}")
        }
    };

    let name = entry.mnemonic.name();
    let text = if operand.is_empty() {
        name.to_string()
    } else {
        format!("{name} {operand}")
    };
    Disassembly { addr, bytes, text }
}

/// Decode `count` consecutive instructions starting at `addr`.
#[must_use]
pub fn disassemble_range<B: Bus>(bus: &B, addr: u16, count: usize) -> Vec<Disassembly> {
    let mut out = Vec::new();
    let mut pc = addr;
    for _ in 0..count {
        let line = disassemble(bus, pc);
        pc = pc.wrapping_add(line.len());
        out.push(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::SimpleBus;

    fn bus_with(addr: u16, bytes: &[u8]) -> SimpleBus {
        let mut bus = SimpleBus::new();
        bus.load(addr, bytes);
        bus
    }

    #[test]
    fn immediate_and_absolute() {
        let bus = bus_with(0xC000, &[0xA9, 0x01, 0x8D, 0x20, 0xD0]);
        let lines = disassemble_range(&bus, 0xC000, 2);
        assert_eq!(lines[0].text, "LDA #$01");
        assert_eq!(lines[1].text, "STA $D020");
        assert_eq!(lines[1].addr, 0xC002);
        assert_eq!(lines[0].to_string(), "$C000: A9 01     LDA #$01");
    }

    #[test]
    fn relative_target_is_absolute() {
        let bus = bus_with(0x1000, &[0xD0, 0xFE]);
        assert_eq!(disassemble(&bus, 0x1000).text, "BNE $1000");
    }

    #[test]
    fn unknown_byte_is_single_byte() {
        let bus = bus_with(0x2000, &[0x02, 0xEA]);
        let lines = disassemble_range(&bus, 0x2000, 2);
        assert_eq!(lines[0].text, "???");
        assert_eq!(lines[0].len(), 1);
        assert_eq!(lines[1].text, "NOP");
    }

    #[test]
    fn indirect_modes() {
        let bus = bus_with(0x0000, &[0x6C, 0xFC, 0xFF, 0xB1, 0x10, 0xA1, 0x20]);
        let lines = disassemble_range(&bus, 0x0000, 3);
        assert_eq!(lines[0].text, "JMP ($FFFC)");
        assert_eq!(lines[1].text, "LDA ($10),Y");
        assert_eq!(lines[2].text, "LDA ($20,X)");
    }
}
