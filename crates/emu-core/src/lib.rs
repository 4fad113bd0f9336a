//! Core traits and types for cycle-accurate emulation.
//!
//! The CPU is the only bus master. Every other component answers the
//! accesses it issues and advances in step with the cycles it reports.

mod bus;
mod cpu;
mod observable;
mod peripheral;

pub use bus::{Bus, SimpleBus};
pub use cpu::Cpu;
pub use observable::{Observable, Value};
pub use peripheral::{Peripheral, StateError};
