//! Commodore 64 machine around the 6510 core.
//!
//! The bus routes every CPU access through the cartridge, the $00/$01
//! bank latch, the ROM and I/O windows and the registered peripherals.
//! The machine wires peripheral interrupt outputs onto the CPU lines at
//! each instruction boundary. A debugger and JSON snapshots sit on top.

mod bus;
mod c64;
pub mod cartridge;
pub mod config;
pub mod debugger;
pub mod devices;
mod error;
mod memory;
pub mod prg;
pub mod snapshot;

pub use bus::C64Bus;
pub use c64::C64;
pub use cartridge::{Cartridge, CartridgeMode, CartridgeType};
pub use config::{C64Config, C64Model, DebuggerConfig};
pub use debugger::{Debugger, Flow, Stop};
pub use error::{BusError, ConfigError, DebugError, PrgError, SnapshotError};
pub use memory::{C64Memory, DEFAULT_DDR, DEFAULT_LATCH, Mapping, RomKind};
pub use snapshot::Snapshot;
