//! Debugger command parsing.
//!
//! One command per line, words separated by whitespace. Addresses and
//! byte values are hex with an optional `$` or `0x` prefix. Counts
//! (`m` length, `dasm` count) are decimal unless prefixed.

use std::path::PathBuf;

use crate::error::DebugError;

/// Default `m` length.
const DEFAULT_DUMP_LEN: u32 = 32;
/// Default `dasm` count.
const DEFAULT_DASM_COUNT: u32 = 10;
/// Largest `m` length or `dasm` count: the whole address space.
pub const MAX_COUNT: u32 = 0x1_0000;
/// Quick-save slots run 1 to this.
pub const MAX_SLOT: u8 = 6;

/// A writable CPU register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    A,
    X,
    Y,
    Sp,
    Pc,
    P,
}

impl Register {
    fn parse(name: &str) -> Result<Self, DebugError> {
        match name.to_ascii_lowercase().as_str() {
            "a" => Ok(Self::A),
            "x" => Ok(Self::X),
            "y" => Ok(Self::Y),
            "sp" | "s" => Ok(Self::Sp),
            "pc" => Ok(Self::Pc),
            "p" => Ok(Self::P),
            _ => Err(DebugError::UnknownRegister(name.to_string())),
        }
    }

    /// Largest value the register holds.
    #[must_use]
    pub const fn max(self) -> u32 {
        match self {
            Self::Pc => 0xFFFF,
            _ => 0xFF,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::X => "X",
            Self::Y => "Y",
            Self::Sp => "SP",
            Self::Pc => "PC",
            Self::P => "P",
        }
    }
}

/// A parsed debugger command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Step,
    Continue,
    Break(u16),
    ClearBreak(u16),
    ClearAllBreaks,
    ListBreaks,
    Flags,
    Stack,
    Backtrace,
    Cycles,
    Memory { addr: u16, len: u32 },
    Disassemble { addr: u16, count: u32 },
    Find(Vec<u8>),
    Set { addr: u16, value: u8 },
    SetRegister { reg: Register, value: u16 },
    Registers,
    Save(Option<PathBuf>),
    Load(Option<PathBuf>),
    SlotSave(u8),
    SlotLoad(u8),
    Trace,
    AutoDasm,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, DebugError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&head, args)) = words.split_first() else {
            return Ok(Self::Step);
        };

        match head {
            "s" | "step" => Ok(Self::Step),
            "c" | "continue" => Ok(Self::Continue),
            "b" | "break" => parse_break(args),
            "blist" | "breakpoints" => Ok(Self::ListBreaks),
            "flags" => Ok(Self::Flags),
            "stack" => Ok(Self::Stack),
            "bt" | "callstack" => Ok(Self::Backtrace),
            "cycles" => Ok(Self::Cycles),
            "m" | "mem" => {
                let addr = parse_addr(required(args, 0, "m", "an address")?)?;
                let len = args
                    .get(1)
                    .map_or(Ok(DEFAULT_DUMP_LEN), |s| parse_count(s, "a length"))?;
                Ok(Self::Memory { addr, len })
            }
            "dasm" | "d" => {
                let addr = parse_addr(required(args, 0, "dasm", "an address")?)?;
                let count = args
                    .get(1)
                    .map_or(Ok(DEFAULT_DASM_COUNT), |s| parse_count(s, "a count"))?;
                Ok(Self::Disassemble { addr, count })
            }
            "find" | "search" => {
                if args.is_empty() {
                    return Err(DebugError::MissingArgument {
                        command: "find",
                        what: "at least one byte",
                    });
                }
                args.iter()
                    .map(|s| parse_byte(s))
                    .collect::<Result<Vec<u8>, _>>()
                    .map(Self::Find)
            }
            "set" => {
                let addr = parse_addr(required(args, 0, "set", "an address")?)?;
                let value = parse_byte(required(args, 1, "set", "a value")?)?;
                Ok(Self::Set { addr, value })
            }
            "reg" | "r" => {
                let Some(name) = args.first() else {
                    return Ok(Self::Registers);
                };
                let reg = Register::parse(name)?;
                let raw = parse_hex(required(args, 1, "reg", "a value")?)?;
                if raw > reg.max() {
                    return Err(DebugError::OutOfRange {
                        value: raw,
                        what: reg.name(),
                    });
                }
                Ok(Self::SetRegister {
                    reg,
                    value: raw as u16,
                })
            }
            "save" => Ok(Self::Save(args.first().map(PathBuf::from))),
            "load" | "restore" => Ok(Self::Load(args.first().map(PathBuf::from))),
            "slot" => {
                let action = required(args, 0, "slot", "`save` or `load`")?;
                let n = parse_slot(required(args, 1, "slot", "a slot number")?)?;
                match action {
                    "save" => Ok(Self::SlotSave(n)),
                    "load" => Ok(Self::SlotLoad(n)),
                    other => Err(DebugError::UnknownCommand(format!("slot {other}"))),
                }
            }
            "trace" => Ok(Self::Trace),
            "autodasm" => Ok(Self::AutoDasm),
            "h" | "help" | "?" => Ok(Self::Help),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            _ => Err(DebugError::UnknownCommand(head.to_string())),
        }
    }
}

fn parse_break(args: &[&str]) -> Result<Command, DebugError> {
    match args {
        [] => Err(DebugError::MissingArgument {
            command: "b",
            what: "an address",
        }),
        ["clear", "all"] => Ok(Command::ClearAllBreaks),
        ["clear", addr] => parse_addr(addr).map(Command::ClearBreak),
        ["clear"] => Err(DebugError::MissingArgument {
            command: "b clear",
            what: "an address or `all`",
        }),
        [addr, ..] => parse_addr(addr).map(Command::Break),
    }
}

fn required<'a>(
    args: &[&'a str],
    index: usize,
    command: &'static str,
    what: &'static str,
) -> Result<&'a str, DebugError> {
    args.get(index)
        .copied()
        .ok_or(DebugError::MissingArgument { command, what })
}

fn strip_radix(s: &str) -> Option<&str> {
    s.strip_prefix('$')
        .or_else(|| s.strip_prefix("0x"))
        .or_else(|| s.strip_prefix("0X"))
}

/// Hex number with an optional `$` or `0x` prefix.
pub fn parse_hex(s: &str) -> Result<u32, DebugError> {
    let digits = strip_radix(s).unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|_| DebugError::InvalidNumber(s.to_string()))
}

/// Decimal count, or hex when prefixed. At most `MAX_COUNT`.
fn parse_count(s: &str, what: &'static str) -> Result<u32, DebugError> {
    let value = match strip_radix(s) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|_| DebugError::InvalidNumber(s.to_string()))?;
    if value > MAX_COUNT {
        return Err(DebugError::OutOfRange { value, what });
    }
    Ok(value)
}

pub fn parse_addr(s: &str) -> Result<u16, DebugError> {
    let value = parse_hex(s)?;
    u16::try_from(value).map_err(|_| DebugError::OutOfRange {
        value,
        what: "an address",
    })
}

pub fn parse_byte(s: &str) -> Result<u8, DebugError> {
    let value = parse_hex(s)?;
    u8::try_from(value).map_err(|_| DebugError::OutOfRange {
        value,
        what: "a byte",
    })
}

fn parse_slot(s: &str) -> Result<u8, DebugError> {
    let value: u32 = s
        .parse()
        .map_err(|_| DebugError::InvalidNumber(s.to_string()))?;
    match u8::try_from(value) {
        Ok(n @ 1..=MAX_SLOT) => Ok(n),
        _ => Err(DebugError::OutOfRange {
            value,
            what: "a slot (1-6)",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(line: &str) -> Command {
        Command::parse(line).expect("valid command")
    }

    #[test]
    fn empty_line_steps() {
        assert_eq!(ok(""), Command::Step);
        assert_eq!(ok("   "), Command::Step);
    }

    #[test]
    fn breakpoint_forms() {
        assert_eq!(ok("b C000"), Command::Break(0xC000));
        assert_eq!(ok("b $c000"), Command::Break(0xC000));
        assert_eq!(ok("b 0xC000"), Command::Break(0xC000));
        assert_eq!(ok("b clear C000"), Command::ClearBreak(0xC000));
        assert_eq!(ok("b clear all"), Command::ClearAllBreaks);
        assert!(matches!(
            Command::parse("b 10000"),
            Err(DebugError::OutOfRange { value: 0x10000, .. })
        ));
        assert!(matches!(
            Command::parse("b"),
            Err(DebugError::MissingArgument { .. })
        ));
    }

    #[test]
    fn memory_and_dasm_defaults() {
        assert_eq!(ok("m 0200"), Command::Memory { addr: 0x0200, len: 32 });
        assert_eq!(ok("m 0200 64"), Command::Memory { addr: 0x0200, len: 64 });
        assert_eq!(ok("m 0200 $40"), Command::Memory { addr: 0x0200, len: 64 });
        assert_eq!(ok("dasm 8000"), Command::Disassemble { addr: 0x8000, count: 10 });
    }

    #[test]
    fn counts_are_bounded_by_the_address_space() {
        assert_eq!(ok("m 0 $10000"), Command::Memory { addr: 0, len: 0x1_0000 });
        assert!(matches!(
            Command::parse("dasm 0 4000000000"),
            Err(DebugError::OutOfRange { value: 4_000_000_000, what: "a count" })
        ));
        assert!(matches!(
            Command::parse("m 0010 $FFFFFFFF"),
            Err(DebugError::OutOfRange { value: 0xFFFF_FFFF, what: "a length" })
        ));
        assert!(matches!(
            Command::parse("dasm 0 99999999999"),
            Err(DebugError::InvalidNumber(_))
        ));
    }

    #[test]
    fn find_bytes() {
        assert_eq!(ok("search A9 20 85"), Command::Find(vec![0xA9, 0x20, 0x85]));
        assert!(matches!(
            Command::parse("find 1FF"),
            Err(DebugError::OutOfRange { value: 0x1FF, .. })
        ));
        assert!(matches!(
            Command::parse("find zz"),
            Err(DebugError::InvalidNumber(ref s)) if s == "zz"
        ));
    }

    #[test]
    fn register_writes() {
        assert_eq!(ok("reg pc C000"), Command::SetRegister { reg: Register::Pc, value: 0xC000 });
        assert_eq!(ok("reg A 0a"), Command::SetRegister { reg: Register::A, value: 0x0A });
        assert!(matches!(
            Command::parse("reg a 100"),
            Err(DebugError::OutOfRange { value: 0x100, what: "A" })
        ));
        assert!(matches!(
            Command::parse("reg q 1"),
            Err(DebugError::UnknownRegister(_))
        ));
        assert_eq!(ok("r"), Command::Registers);
    }

    #[test]
    fn snapshot_commands() {
        assert_eq!(ok("save"), Command::Save(None));
        assert_eq!(ok("restore x.json"), Command::Load(Some(PathBuf::from("x.json"))));
        assert_eq!(ok("slot save 3"), Command::SlotSave(3));
        assert!(matches!(
            Command::parse("slot load 7"),
            Err(DebugError::OutOfRange { value: 7, .. })
        ));
    }

    #[test]
    fn unknown_command() {
        assert!(matches!(
            Command::parse("frobnicate"),
            Err(DebugError::UnknownCommand(ref s)) if s == "frobnicate"
        ));
    }
}
