//! CPU execution errors.

use thiserror::Error;

/// Fatal execution error. The CPU cannot make progress until the host
/// changes PC or memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    /// Opcode byte has no entry in the decode table.
    #[error("unknown opcode ${opcode:02X} at ${pc:04X}")]
    UnknownOpcode { opcode: u8, pc: u16 },
}
