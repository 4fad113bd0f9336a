//! PRG file loader.
//!
//! A PRG file is the simplest C64 binary format: a 2-byte little-endian
//! load address followed by the data bytes. The data is loaded into RAM
//! starting at the given address, ignoring the bank configuration.

use crate::error::PrgError;
use crate::memory::C64Memory;

/// Load a PRG file into C64 RAM.
///
/// Returns the load address on success. Data running past $FFFF wraps
/// to $0000.
pub fn load_prg(memory: &mut C64Memory, data: &[u8]) -> Result<u16, PrgError> {
    let [lo, hi, body @ ..] = data else {
        return Err(PrgError::TooShort(data.len()));
    };
    if body.is_empty() {
        return Err(PrgError::TooShort(data.len()));
    }

    let load_addr = u16::from_le_bytes([*lo, *hi]);
    for (i, &byte) in body.iter().enumerate() {
        memory.ram_write(load_addr.wrapping_add(i as u16), byte);
    }

    log::debug!("PRG: {} bytes at ${load_addr:04X}", body.len());
    Ok(load_addr)
}
