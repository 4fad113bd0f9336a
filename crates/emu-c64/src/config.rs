//! C64 configuration: model selection, ROM images and debugger settings.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Kernal and BASIC ROM size.
pub const ROM_8K: usize = 8192;
/// Character ROM size.
pub const ROM_4K: usize = 4096;

/// C64 model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum C64Model {
    /// PAL C64 (6569 VIC-II, 985,248 Hz CPU).
    #[default]
    C64Pal,
    /// NTSC C64 (6567 VIC-II, 1,022,727 Hz CPU).
    C64Ntsc,
}

impl C64Model {
    /// CPU clock in Hz.
    #[must_use]
    pub const fn cpu_frequency(self) -> u32 {
        match self {
            Self::C64Pal => 985_248,
            Self::C64Ntsc => 1_022_727,
        }
    }

    /// CPU cycles per video frame: 312 x 63 on PAL, 263 x 65 on NTSC.
    #[must_use]
    pub const fn cycles_per_frame(self) -> u64 {
        match self {
            Self::C64Pal => 312 * 63,
            Self::C64Ntsc => 263 * 65,
        }
    }
}

/// Configuration for constructing a C64 instance.
#[derive(Debug, Clone)]
pub struct C64Config {
    /// Model variant.
    pub model: C64Model,
    /// Kernal ROM (8,192 bytes).
    pub kernal_rom: Vec<u8>,
    /// BASIC ROM (8,192 bytes).
    pub basic_rom: Vec<u8>,
    /// Character ROM (4,096 bytes).
    pub char_rom: Vec<u8>,
}

impl C64Config {
    /// Read `kernal.rom`, `basic.rom` and `chargen.rom` from `dir`.
    pub fn from_rom_dir(dir: &Path, model: C64Model) -> Result<Self, ConfigError> {
        Self::from_files(
            &dir.join("kernal.rom"),
            &dir.join("basic.rom"),
            &dir.join("chargen.rom"),
            model,
        )
    }

    /// Read the three ROM images from explicit paths. Sizes are checked
    /// here so a bad file is reported by name.
    pub fn from_files(
        kernal: &Path,
        basic: &Path,
        chargen: &Path,
        model: C64Model,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            model,
            kernal_rom: load_rom_file(kernal, "Kernal", ROM_8K)?,
            basic_rom: load_rom_file(basic, "BASIC", ROM_8K)?,
            char_rom: load_rom_file(chargen, "Character", ROM_4K)?,
        })
    }
}

fn load_rom_file(path: &Path, name: &'static str, expected: usize) -> Result<Vec<u8>, ConfigError> {
    let data = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    check_rom_size(name, &data, expected)?;
    Ok(data)
}

pub(crate) fn check_rom_size(
    name: &'static str,
    data: &[u8],
    expected: usize,
) -> Result<(), ConfigError> {
    if data.len() == expected {
        Ok(())
    } else {
        Err(ConfigError::RomSize {
            name,
            expected,
            actual: data.len(),
        })
    }
}

/// Debugger file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerConfig {
    /// Target of `save`/`load` without an argument.
    pub state_path: PathBuf,
    /// Directory holding `emustate_<n>.json` quick-save slots.
    pub slot_dir: PathBuf,
    /// Trace output file.
    pub trace_path: PathBuf,
    /// Cycle limit for a single `continue`. The cancel flag ends it sooner.
    pub continue_budget: u64,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("emustate.json"),
            slot_dir: PathBuf::from("."),
            trace_path: PathBuf::from("trace.log"),
            continue_budget: u64::MAX,
        }
    }
}
