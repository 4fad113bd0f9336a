//! Memory-mapped peripheral contract.
//!
//! A peripheral owns an address range on the bus. The bus hands it the
//! full 16-bit address of every access it claims; the device masks the
//! address down to its own register index.

use thiserror::Error;

use crate::Value;

/// Malformed or incompatible peripheral state blob.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("state is not a map")]
    NotAMap,
    #[error("missing field `{0}`")]
    MissingField(String),
    #[error("field `{field}` should be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
    #[error("field `{field}` has length {actual}, expected {expected}")]
    Length {
        field: String,
        expected: usize,
        actual: usize,
    },
}

impl StateError {
    #[must_use]
    pub fn wrong_type(field: &str, expected: &'static str) -> Self {
        StateError::WrongType {
            field: field.to_string(),
            expected,
        }
    }
}

/// A memory-mapped device registered with the bus.
///
/// Devices advance in step with the CPU: the machine calls `tick` with the
/// cycles each instruction consumed, then samples the interrupt outputs at
/// the next instruction boundary.
pub trait Peripheral {
    /// CPU read. May have side effects (acknowledging interrupts, etc.).
    fn read(&mut self, address: u16) -> u8;

    /// CPU write.
    fn write(&mut self, address: u16, value: u8);

    /// Side-effect-free read for debuggers.
    fn peek(&self, address: u16) -> u8;

    /// Serialise internal state into an opaque blob.
    fn save_state(&self) -> Value;

    /// Replace internal state from a blob produced by `save_state`.
    ///
    /// On error the device must be left unchanged.
    fn restore_state(&mut self, state: &Value) -> Result<(), StateError>;

    /// Advance by `cycles` CPU cycles.
    fn tick(&mut self, _cycles: u32) {}

    /// Maskable interrupt output (level).
    fn irq_active(&self) -> bool {
        false
    }

    /// Non-maskable interrupt output. The machine edge-detects it.
    fn nmi_active(&self) -> bool {
        false
    }
}
