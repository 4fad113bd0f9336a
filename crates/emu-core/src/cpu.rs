//! CPU core trait.

use crate::Bus;

/// A CPU core.
///
/// CPUs execute instructions and access memory through a bus. The bus is
/// passed in, not owned, so the machine can reach peripherals between
/// instructions.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Fatal execution error (undecodable opcode and the like).
    type Error;

    /// Execute one instruction-boundary event: an interrupt service or a
    /// single instruction. Returns the cycles consumed.
    fn step<B: Bus>(&mut self, bus: &mut B) -> Result<u32, Self::Error>;

    /// Returns the current program counter.
    fn pc(&self) -> u16;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Total cycles executed since construction.
    fn cycles(&self) -> u64;

    /// Drive the maskable interrupt line (level).
    fn set_irq(&mut self, active: bool);

    /// Latch a non-maskable interrupt edge.
    fn nmi(&mut self);

    /// Reset the CPU, loading the program counter from the reset vector.
    fn reset<B: Bus>(&mut self, bus: &mut B);
}
