//! 6502 CPU emulator.
//!
//! Instruction-stepped: each `step()` runs one instruction (or services
//! one interrupt) and returns the cycles it took, page-cross and branch
//! penalties included. Decimal mode follows NMOS behaviour.

mod cpu;
mod disasm;
mod error;
pub mod flags;
pub mod opcodes;
mod registers;

pub use cpu::{IRQ_VECTOR, Interrupt, Mos6502, NMI_VECTOR, RESET_VECTOR, RunOutcome, RunReport};
pub use disasm::{Disassembly, disassemble, disassemble_range};
pub use error::CpuError;
pub use flags::Status;
pub use opcodes::{Mnemonic, Mode, OPCODES, Opcode, decode};
pub use registers::Registers;
