//! Construction and loading errors.

use std::io;
use std::path::PathBuf;

use emu_core::StateError;
use thiserror::Error;

use crate::cartridge::CartridgeMode;

/// Machine configuration failure: missing files and wrongly sized images.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("{name} ROM is {actual} bytes, expected {expected}")]
    RomSize {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("cartridge image of {len} bytes does not fit {mode} mode")]
    CartridgeSize { len: usize, mode: CartridgeMode },

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Peripheral registration failure. Always a wiring bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("`{name}` at ${start:04X}-${end:04X} overlaps `{existing}`")]
    Overlap {
        name: String,
        start: u16,
        end: u16,
        existing: String,
    },

    #[error("a peripheral named `{0}` is already registered")]
    DuplicateName(String),

    #[error("`{name}` has an empty range ${start:04X}-${end:04X}")]
    EmptyRange { name: String, start: u16, end: u16 },
}

/// PRG loading failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrgError {
    #[error("PRG file too short ({0} bytes, need at least 3)")]
    TooShort(usize),
}

/// Snapshot save, load or restore failure. A failed restore leaves the
/// machine as it was.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cannot access {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("`{field}` is not valid base64: {source}")]
    Base64 {
        field: &'static str,
        source: base64::DecodeError,
    },

    #[error("snapshot version {found} is not supported (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("`{field}` holds {actual} bytes, expected {expected}")]
    RamSize {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("snapshot has no state for peripheral `{0}`")]
    MissingPeripheral(String),

    #[error("snapshot names unknown peripheral `{0}`")]
    UnknownPeripheral(String),

    #[error("peripheral `{name}` rejected its state: {source}")]
    Peripheral { name: String, source: StateError },
}

/// Debugger command failure. Reported to the user; the machine is
/// untouched.
#[derive(Debug, Error)]
pub enum DebugError {
    #[error("unknown command `{0}` (try `help`)")]
    UnknownCommand(String),

    #[error("`{command}` needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },

    #[error("`{0}` is not a number")]
    InvalidNumber(String),

    #[error("{value:#X} is out of range for {what}")]
    OutOfRange { value: u32, what: &'static str },

    #[error("unknown register `{0}` (a, x, y, sp, pc, p)")]
    UnknownRegister(String),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
