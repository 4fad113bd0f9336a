//! Stock peripherals for the I/O window.
//!
//! `RegisterBank` is a latched register file standing in for the VIC-II
//! and SID. `IntervalTimer` models CIA timer A with its interrupt control
//! register:
//!
//! | Reg | Read               | Write                |
//! |-----|--------------------|----------------------|
//! | $x0 | Port A ($FF)       | ignored              |
//! | $x1 | Port B ($FF)       | ignored              |
//! | $x4 | Timer A low (cnt)  | Timer A low (latch)  |
//! | $x5 | Timer A high (cnt) | Timer A high (latch) |
//! | $xD | ICR (read/clear)   | ICR (set/clear mask) |
//! | $xE | Control reg A      | Control reg A        |
//!
//! Everything else reads 0 and ignores writes. Registers mirror every 16
//! bytes.

#![allow(clippy::cast_possible_truncation)]

use emu_core::{Peripheral, StateError, Value};

// ============================================================================
// Register bank
// ============================================================================

/// Latched registers behind an address mirror mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterBank {
    regs: Vec<u8>,
    mask: u16,
}

impl RegisterBank {
    /// `mask + 1` registers, mirrored across the device's range.
    #[must_use]
    pub fn new(mask: u16) -> Self {
        Self {
            regs: vec![0; usize::from(mask) + 1],
            mask,
        }
    }

    /// VIC-II stand-in: 64 registers mirrored through $D000-$D3FF.
    #[must_use]
    pub fn vic() -> Self {
        Self::new(0x3F)
    }

    /// SID stand-in: 32 registers mirrored through $D400-$D7FF.
    #[must_use]
    pub fn sid() -> Self {
        Self::new(0x1F)
    }

    fn index(&self, address: u16) -> usize {
        usize::from(address & self.mask)
    }
}

impl Peripheral for RegisterBank {
    fn read(&mut self, address: u16) -> u8 {
        self.peek(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        let i = self.index(address);
        self.regs[i] = value;
    }

    fn peek(&self, address: u16) -> u8 {
        self.regs[self.index(address)]
    }

    fn save_state(&self) -> Value {
        Value::map([("regs", Value::Bytes(self.regs.clone()))])
    }

    fn restore_state(&mut self, state: &Value) -> Result<(), StateError> {
        let regs = state.field("regs")?.as_bytes("regs")?;
        if regs.len() != self.regs.len() {
            return Err(StateError::Length {
                field: "regs".to_string(),
                expected: self.regs.len(),
                actual: regs.len(),
            });
        }
        self.regs.copy_from_slice(regs);
        Ok(())
    }
}

// ============================================================================
// Interval timer
// ============================================================================

/// Which CPU input the timer's interrupt output drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptLine {
    Irq,
    Nmi,
}

const ICR_TIMER_A: u8 = 0x01;
const CRA_START: u8 = 0x01;
const CRA_ONESHOT: u8 = 0x08;
const CRA_FORCE_LOAD: u8 = 0x10;

/// CIA-style timer A with interrupt control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTimer {
    line: InterruptLine,
    /// Timer A counter.
    counter: u16,
    /// Timer A latch.
    latch: u16,
    /// Timer A running.
    running: bool,
    /// One-shot mode (true) or continuous (false).
    oneshot: bool,
    /// Force-load strobe pending.
    force_load: bool,
    /// Interrupt control: status flags (bits 0-4).
    icr_status: u8,
    /// Interrupt control: enable mask (bits 0-4).
    icr_mask: u8,
    /// Control register A.
    cra: u8,
}

impl IntervalTimer {
    #[must_use]
    pub fn new(line: InterruptLine) -> Self {
        Self {
            line,
            counter: 0xFFFF,
            latch: 0xFFFF,
            running: false,
            oneshot: false,
            force_load: false,
            icr_status: 0,
            icr_mask: 0,
            cra: 0,
        }
    }

    /// Advance one CPU cycle.
    fn tick_once(&mut self) {
        if self.force_load {
            self.counter = self.latch;
            self.force_load = false;
        }

        if self.running {
            if self.counter == 0 {
                // Underflow
                self.icr_status |= ICR_TIMER_A;
                self.counter = self.latch;
                if self.oneshot {
                    self.running = false;
                    self.cra &= !CRA_START;
                }
            } else {
                self.counter -= 1;
            }
        }
    }

    fn interrupt_asserted(&self) -> bool {
        self.icr_status & self.icr_mask & 0x1F != 0
    }

    fn icr_value(&self) -> u8 {
        let any = if self.interrupt_asserted() { 0x80 } else { 0x00 };
        self.icr_status | any
    }

    #[must_use]
    pub fn counter(&self) -> u16 {
        self.counter
    }

    #[must_use]
    pub fn icr_status(&self) -> u8 {
        self.icr_status
    }

    #[must_use]
    pub fn icr_mask(&self) -> u8 {
        self.icr_mask
    }

    #[must_use]
    pub fn cra(&self) -> u8 {
        self.cra
    }
}

impl Peripheral for IntervalTimer {
    fn read(&mut self, address: u16) -> u8 {
        if address & 0x0F == 0x0D {
            // ICR read acknowledges
            let value = self.icr_value();
            self.icr_status = 0;
            return value;
        }
        self.peek(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        match address & 0x0F {
            0x04 => {
                self.latch = (self.latch & 0xFF00) | u16::from(value);
            }
            0x05 => {
                self.latch = (self.latch & 0x00FF) | (u16::from(value) << 8);
                // If timer is stopped, writing high byte loads the counter
                if !self.running {
                    self.counter = self.latch;
                }
            }
            0x0D => {
                // Bit 7 selects set (1) or clear (0) of the mask bits
                if value & 0x80 != 0 {
                    self.icr_mask |= value & 0x1F;
                } else {
                    self.icr_mask &= !(value & 0x1F);
                }
            }
            0x0E => {
                self.cra = value & !CRA_FORCE_LOAD;
                self.running = value & CRA_START != 0;
                self.oneshot = value & CRA_ONESHOT != 0;
                if value & CRA_FORCE_LOAD != 0 {
                    self.force_load = true;
                }
            }
            _ => {}
        }
    }

    fn peek(&self, address: u16) -> u8 {
        match address & 0x0F {
            0x00 | 0x01 => 0xFF,
            0x04 => self.counter as u8,
            0x05 => (self.counter >> 8) as u8,
            0x0D => self.icr_value(),
            0x0E => self.cra,
            _ => 0,
        }
    }

    fn save_state(&self) -> Value {
        Value::map([
            ("counter", Value::U16(self.counter)),
            ("latch", Value::U16(self.latch)),
            ("running", Value::Bool(self.running)),
            ("oneshot", Value::Bool(self.oneshot)),
            ("force_load", Value::Bool(self.force_load)),
            ("icr_status", Value::U8(self.icr_status)),
            ("icr_mask", Value::U8(self.icr_mask)),
            ("cra", Value::U8(self.cra)),
        ])
    }

    fn restore_state(&mut self, state: &Value) -> Result<(), StateError> {
        let counter = state.field("counter")?.as_u16("counter")?;
        let latch = state.field("latch")?.as_u16("latch")?;
        let running = state.field("running")?.as_bool("running")?;
        let oneshot = state.field("oneshot")?.as_bool("oneshot")?;
        let force_load = state.field("force_load")?.as_bool("force_load")?;
        let icr_status = state.field("icr_status")?.as_u8("icr_status")?;
        let icr_mask = state.field("icr_mask")?.as_u8("icr_mask")?;
        let cra = state.field("cra")?.as_u8("cra")?;

        self.counter = counter;
        self.latch = latch;
        self.running = running;
        self.oneshot = oneshot;
        self.force_load = force_load;
        self.icr_status = icr_status;
        self.icr_mask = icr_mask;
        self.cra = cra;
        Ok(())
    }

    fn tick(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.tick_once();
        }
    }

    fn irq_active(&self) -> bool {
        self.line == InterruptLine::Irq && self.interrupt_asserted()
    }

    fn nmi_active(&self) -> bool {
        self.line == InterruptLine::Nmi && self.interrupt_asserted()
    }
}
