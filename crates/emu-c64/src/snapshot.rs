//! Machine snapshots as JSON.
//!
//! A snapshot holds the CPU registers and cycle counter, RAM and colour
//! RAM (base64), the $00/$01 latch, the cartridge bank registers and one
//! opaque `Value` blob per registered peripheral.
//!
//! Restoring is all-or-nothing: everything that can be checked is checked
//! before the machine is touched, and peripheral blobs that fail midway
//! are rolled back.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use emu_6502::Status;
use emu_6502::flags::{B, C, D, I, N, U, V, Z};
use emu_core::Value;
use serde::{Deserialize, Serialize};

use crate::c64::C64;
use crate::error::SnapshotError;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

const RAM_SIZE: usize = 0x10000;
const COLOUR_RAM_SIZE: usize = 0x400;

/// CPU registers with the status byte split into flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuState {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub pc: u16,
    pub sp: u8,
    pub n: bool,
    pub v: bool,
    /// Informational only: B does not exist in the live status register.
    pub b: bool,
    pub d: bool,
    pub i: bool,
    pub z: bool,
    pub c: bool,
    pub total_cycles: u64,
    /// NMI edge latched but not yet serviced.
    #[serde(default)]
    pub nmi_pending: bool,
    /// IRQ input level as last wired.
    #[serde(default)]
    pub irq_line: bool,
}

impl CpuState {
    fn status(&self) -> Status {
        let mut p = Status(U);
        for (flag, set) in [
            (N, self.n),
            (V, self.v),
            (D, self.d),
            (I, self.i),
            (Z, self.z),
            (C, self.c),
        ] {
            p.set_if(flag, set);
        }
        p
    }
}

/// The 6510 port registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankLatch {
    pub ddr: u8,
    pub data: u8,
}

/// Cartridge bank registers (the ROM image itself is not saved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartridgeState {
    pub bank: u8,
    pub exrom: bool,
    pub game: bool,
}

/// A complete machine snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub cpu: CpuState,
    /// Base64 of the 64K RAM.
    pub ram: String,
    /// Base64 of the 1K colour RAM.
    pub colour_ram: String,
    pub bank_latch: BankLatch,
    pub cartridge: Option<CartridgeState>,
    pub peripherals: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Capture the machine. Pure: nothing observable changes.
    #[must_use]
    pub fn capture(c64: &C64) -> Self {
        let cpu = c64.cpu();
        let regs = &cpu.regs;
        let bus = c64.bus();

        let peripherals = bus
            .peripheral_names()
            .filter_map(|name| {
                bus.peripheral(name)
                    .map(|device| (name.to_string(), device.save_state()))
            })
            .collect();

        Self {
            version: SNAPSHOT_VERSION,
            cpu: CpuState {
                a: regs.a,
                x: regs.x,
                y: regs.y,
                pc: regs.pc,
                sp: regs.s,
                n: regs.p.is_set(N),
                v: regs.p.is_set(V),
                b: regs.p.is_set(B),
                d: regs.p.is_set(D),
                i: regs.p.is_set(I),
                z: regs.p.is_set(Z),
                c: regs.p.is_set(C),
                total_cycles: cpu.cycles(),
                nmi_pending: cpu.nmi_pending(),
                irq_line: cpu.irq_line(),
            },
            ram: STANDARD.encode(bus.memory.ram()),
            colour_ram: STANDARD.encode(bus.memory.colour_ram()),
            bank_latch: BankLatch {
                ddr: bus.memory.ddr(),
                data: bus.memory.latch_data(),
            },
            cartridge: bus.cartridge.as_ref().map(|cart| CartridgeState {
                bank: cart.bank,
                exrom: cart.exrom,
                game: cart.game,
            }),
            peripherals,
        }
    }

    /// Apply the snapshot to `c64`. On error the machine is unchanged.
    pub fn restore(self, c64: &mut C64) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        let ram = decode_block("ram", &self.ram, RAM_SIZE)?;
        let colour_ram = decode_block("colour_ram", &self.colour_ram, COLOUR_RAM_SIZE)?;

        let live: Vec<String> = c64
            .bus()
            .peripheral_names()
            .map(str::to_string)
            .collect();
        if let Some(missing) = live.iter().find(|name| !self.peripherals.contains_key(*name)) {
            return Err(SnapshotError::MissingPeripheral(missing.clone()));
        }
        let known: BTreeSet<&str> = live.iter().map(String::as_str).collect();
        if let Some(unknown) = self.peripherals.keys().find(|name| !known.contains(name.as_str())) {
            return Err(SnapshotError::UnknownPeripheral(unknown.clone()));
        }

        restore_peripherals(c64, &live, &self.peripherals)?;

        let cpu = c64.cpu_mut();
        cpu.regs.a = self.cpu.a;
        cpu.regs.x = self.cpu.x;
        cpu.regs.y = self.cpu.y;
        cpu.regs.s = self.cpu.sp;
        cpu.regs.pc = self.cpu.pc;
        cpu.regs.p = self.cpu.status();
        cpu.set_cycles(self.cpu.total_cycles);
        cpu.set_nmi_pending(self.cpu.nmi_pending);
        cpu.set_irq(self.cpu.irq_line);

        let bus = c64.bus_mut();
        bus.memory.load_ram(&ram);
        bus.memory.load_colour_ram(&colour_ram);
        bus.memory.set_ddr(self.bank_latch.ddr);
        bus.memory.set_latch(self.bank_latch.data);
        match (self.cartridge, bus.cartridge.as_mut()) {
            (Some(state), Some(cart)) => {
                cart.bank = state.bank;
                cart.exrom = state.exrom;
                cart.game = state.game;
            }
            (Some(_), None) => {
                log::warn!("snapshot carries cartridge state but no cartridge is inserted");
            }
            (None, _) => {}
        }

        c64.resync_nmi_edge();
        Ok(())
    }

    /// Write the snapshot as pretty-printed JSON.
    pub fn save_to_path(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("snapshot saved to {}", path.display());
        Ok(())
    }

    /// Read a snapshot file. Nothing is validated against a machine yet.
    pub fn load_from_path(path: &Path) -> Result<Self, SnapshotError> {
        let json = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot = serde_json::from_str(&json)?;
        log::info!("snapshot loaded from {}", path.display());
        Ok(snapshot)
    }
}

fn decode_block(
    field: &'static str,
    encoded: &str,
    expected: usize,
) -> Result<Vec<u8>, SnapshotError> {
    let data = STANDARD
        .decode(encoded)
        .map_err(|source| SnapshotError::Base64 { field, source })?;
    if data.len() != expected {
        return Err(SnapshotError::RamSize {
            field,
            expected,
            actual: data.len(),
        });
    }
    Ok(data)
}

/// Apply every blob in registration order. If one is rejected, put back
/// the saved state of each device touched so far, the failing one
/// included.
fn restore_peripherals(
    c64: &mut C64,
    names: &[String],
    blobs: &BTreeMap<String, Value>,
) -> Result<(), SnapshotError> {
    let bus = c64.bus_mut();
    let backup: Vec<Value> = names
        .iter()
        .filter_map(|name| bus.peripheral(name).map(|device| device.save_state()))
        .collect();

    for (index, name) in names.iter().enumerate() {
        let (Some(device), Some(blob)) = (bus.peripheral_mut(name), blobs.get(name)) else {
            continue;
        };
        if let Err(source) = device.restore_state(blob) {
            for (prior, saved) in names.iter().zip(&backup).take(index + 1) {
                if let Some(device) = bus.peripheral_mut(prior)
                    && let Err(err) = device.restore_state(saved)
                {
                    log::error!("cannot roll back `{prior}`: {err}");
                }
            }
            return Err(SnapshotError::Peripheral {
                name: name.clone(),
                source,
            });
        }
    }
    Ok(())
}
