//! Interactive debugger over a `C64`.
//!
//! The debugger sits on the instruction boundary: `run` checks the
//! breakpoint set against the about-to-execute PC before every step and
//! writes a trace line when tracing is on. Commands come in as text lines
//! through `execute`, which writes its output to any `io::Write`.
//!
//! A running `continue` is cancelled through the flag returned by
//! `cancel_handle`; the binary sets it from a Ctrl-C handler.

mod command;

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use emu_6502::{CpuError, Status, disassemble, disassemble_range};
use emu_6502::flags::{B, C, D, I, N, V, Z};
use emu_core::Bus;

use crate::c64::C64;
use crate::config::DebuggerConfig;
use crate::error::DebugError;
use crate::snapshot::Snapshot;

pub use command::{Command, MAX_SLOT, Register, parse_addr, parse_byte, parse_hex};

/// Instructions listed after a stop when `autodasm` is on.
const AUTODASM_COUNT: usize = 5;

/// What the REPL should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Why a `run` returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stop {
    /// About to execute the instruction at this address.
    Breakpoint(u16),
    /// The cycle budget ran out.
    Budget,
    /// The CPU could not decode an instruction.
    Fault(CpuError),
    /// The cancel flag was raised.
    Interrupted,
}

/// Debugger state: breakpoints, tracing and display settings.
pub struct Debugger {
    breakpoints: BTreeSet<u16>,
    trace: Option<Box<dyn Write>>,
    autodasm: bool,
    cancel: Arc<AtomicBool>,
    config: DebuggerConfig,
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new(DebuggerConfig::default())
    }
}

impl Debugger {
    #[must_use]
    pub fn new(config: DebuggerConfig) -> Self {
        Self {
            breakpoints: BTreeSet::new(),
            trace: None,
            autodasm: true,
            cancel: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Flag that stops `run` at the next instruction boundary. Safe to set
    /// from another thread or a signal handler.
    #[must_use]
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn add_breakpoint(&mut self, addr: u16) {
        self.breakpoints.insert(addr);
    }

    pub fn remove_breakpoint(&mut self, addr: u16) -> bool {
        self.breakpoints.remove(&addr)
    }

    /// Breakpoints in ascending address order.
    #[must_use]
    pub fn breakpoints(&self) -> &BTreeSet<u16> {
        &self.breakpoints
    }

    #[must_use]
    pub fn autodasm(&self) -> bool {
        self.autodasm
    }

    #[must_use]
    pub fn is_tracing(&self) -> bool {
        self.trace.is_some()
    }

    /// Send trace lines to `sink` instead of the trace file.
    pub fn trace_to(&mut self, sink: Box<dyn Write>) {
        self.trace = Some(sink);
    }

    pub fn stop_trace(&mut self) {
        if let Some(mut sink) = self.trace.take()
            && let Err(e) = sink.flush()
        {
            log::warn!("trace flush failed: {e}");
        }
    }

    #[must_use]
    pub fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    // ========================================================================
    // Run loop
    // ========================================================================

    /// Run until a breakpoint, a fault, a cancel or the cycle budget.
    ///
    /// The breakpoint check comes first, so a breakpoint on the current PC
    /// stops immediately without executing anything. A cancel is consumed
    /// when it stops the run.
    pub fn run(&mut self, c64: &mut C64, budget: u64) -> Stop {
        let mut used = 0u64;
        loop {
            let pc = c64.cpu().pc();
            if self.breakpoints.contains(&pc) {
                log::debug!("breakpoint hit at ${pc:04X}");
                return Stop::Breakpoint(pc);
            }
            if self.cancel.swap(false, Ordering::SeqCst) {
                log::debug!("run cancelled at ${pc:04X}");
                return Stop::Interrupted;
            }
            if used >= budget {
                return Stop::Budget;
            }
            match self.step(c64) {
                Ok(cycles) => used += u64::from(cycles),
                Err(e) => return Stop::Fault(e),
            }
        }
    }

    /// Execute one instruction with no breakpoint check, then run on.
    /// Continuing from a breakpoint therefore makes progress.
    pub fn resume(&mut self, c64: &mut C64, budget: u64) -> Stop {
        match self.step(c64) {
            Ok(cycles) => self.run(c64, budget.saturating_sub(u64::from(cycles))),
            Err(e) => Stop::Fault(e),
        }
    }

    /// One machine step, traced if tracing is on.
    pub fn step(&mut self, c64: &mut C64) -> Result<u32, CpuError> {
        if self.trace.is_some() {
            // Wire first so the line can tell a service from a fetch
            c64.wire_interrupts();
            let line = trace_line(c64);
            if let Some(sink) = self.trace.as_mut()
                && let Err(e) = writeln!(sink, "{line}")
            {
                log::warn!("trace write failed, tracing stopped: {e}");
                self.trace = None;
            }
        }
        c64.step()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Parse and run one command line.
    pub fn execute<W: Write>(
        &mut self,
        c64: &mut C64,
        line: &str,
        out: &mut W,
    ) -> Result<Flow, DebugError> {
        match Command::parse(line)? {
            Command::Step => {
                let stop = match self.step(c64) {
                    Ok(_) => None,
                    Err(e) => Some(Stop::Fault(e)),
                };
                self.show_stop(c64, stop.as_ref(), out)?;
            }
            Command::Continue => {
                self.cancel.store(false, Ordering::SeqCst);
                let stop = self.resume(c64, self.config.continue_budget);
                self.show_stop(c64, Some(&stop), out)?;
            }
            Command::Break(addr) => {
                self.breakpoints.insert(addr);
                writeln!(out, "Breakpoint set at ${addr:04X}")?;
            }
            Command::ClearBreak(addr) => {
                if self.breakpoints.remove(&addr) {
                    writeln!(out, "Breakpoint at ${addr:04X} cleared.")?;
                } else {
                    writeln!(out, "No breakpoint found at ${addr:04X}.")?;
                }
            }
            Command::ClearAllBreaks => {
                self.breakpoints.clear();
                writeln!(out, "All breakpoints cleared.")?;
            }
            Command::ListBreaks => {
                if self.breakpoints.is_empty() {
                    writeln!(out, "No active breakpoints.")?;
                } else {
                    writeln!(out, "Active breakpoints:")?;
                    writeln!(out, "{}", address_list(self.breakpoints.iter().copied()))?;
                }
            }
            Command::Flags => write_flags(c64.cpu().status(), out)?,
            Command::Stack => {
                let sp = c64.cpu().regs.s;
                writeln!(out, "--- Stack (SP is at ${:04X}) ---", 0x0100 + u16::from(sp))?;
                let len = u32::from(0xFF - sp);
                if len > 0 {
                    write_memory(c64.bus(), 0x0100 + u16::from(sp) + 1, len, out)?;
                }
            }
            Command::Backtrace => write_backtrace(c64, out)?,
            Command::Cycles => writeln!(out, "Total cycles: {}", c64.cycles())?,
            Command::Memory { addr, len } => write_memory(c64.bus(), addr, len, out)?,
            Command::Disassemble { addr, count } => {
                writeln!(out, "--- Disassembly from ${addr:04X} ---")?;
                for line in disassemble_range(c64.bus(), addr, count as usize) {
                    writeln!(out, "{line}")?;
                }
            }
            Command::Find(pattern) => {
                let hits = find(c64.bus(), &pattern);
                if hits.is_empty() {
                    writeln!(out, "Sequence not found.")?;
                } else {
                    writeln!(out, "Found {} match(es) at:", hits.len())?;
                    writeln!(out, "{}", address_list(hits))?;
                }
            }
            Command::Set { addr, value } => {
                c64.bus_mut().write(addr, value);
                writeln!(out, "Set memory at ${addr:04X} to ${value:02X}")?;
            }
            Command::SetRegister { reg, value } => {
                let regs = &mut c64.cpu_mut().regs;
                match reg {
                    Register::A => regs.a = value as u8,
                    Register::X => regs.x = value as u8,
                    Register::Y => regs.y = value as u8,
                    Register::Sp => regs.s = value as u8,
                    Register::Pc => regs.pc = value,
                    Register::P => regs.p = Status::from_stack(value as u8),
                }
                writeln!(out, "Set {} to ${value:02X}", reg.name())?;
            }
            Command::Registers => write_registers(c64, out)?,
            Command::Save(path) => {
                let path = path.unwrap_or_else(|| self.config.state_path.clone());
                Snapshot::capture(c64).save_to_path(&path)?;
                writeln!(out, "Emulator state saved to '{}'.", path.display())?;
            }
            Command::Load(path) => {
                let path = path.unwrap_or_else(|| self.config.state_path.clone());
                self.load(c64, &path, out)?;
            }
            Command::SlotSave(n) => {
                let path = self.slot_path(n);
                Snapshot::capture(c64).save_to_path(&path)?;
                writeln!(out, "Saved to slot {n} ({}).", path.display())?;
            }
            Command::SlotLoad(n) => {
                let path = self.slot_path(n);
                self.load(c64, &path, out)?;
            }
            Command::Trace => {
                if self.trace.is_some() {
                    self.stop_trace();
                    writeln!(out, "Tracing stopped.")?;
                } else {
                    let file = File::create(&self.config.trace_path)?;
                    self.trace = Some(Box::new(BufWriter::new(file)));
                    writeln!(
                        out,
                        "Tracing started. Output will be written to {}. Use 'c' to run.",
                        self.config.trace_path.display()
                    )?;
                }
            }
            Command::AutoDasm => {
                self.autodasm = !self.autodasm;
                let state = if self.autodasm { "ON" } else { "OFF" };
                writeln!(out, "Auto-disassembly on break is now {state}.")?;
            }
            Command::Help => out.write_all(HELP.as_bytes())?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Read commands from `input` until `quit` or end of input. Command
    /// errors are reported and the loop carries on.
    pub fn repl<R: BufRead, W: Write>(
        &mut self,
        c64: &mut C64,
        input: R,
        out: &mut W,
    ) -> io::Result<()> {
        writeln!(out, "--- DEBUGGER ---")?;
        self.show_stop(c64, None, out).map_err(into_io)?;

        let mut lines = input.lines();
        loop {
            write!(out, "> ")?;
            out.flush()?;
            let Some(line) = lines.next().transpose()? else {
                break;
            };
            match self.execute(c64, line.trim(), out) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(DebugError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                    return Err(e);
                }
                Err(e) => writeln!(out, "Error: {e}")?,
            }
        }
        self.stop_trace();
        Ok(())
    }

    fn slot_path(&self, n: u8) -> PathBuf {
        self.config.slot_dir.join(format!("emustate_{n}.json"))
    }

    fn load<W: Write>(
        &mut self,
        c64: &mut C64,
        path: &Path,
        out: &mut W,
    ) -> Result<(), DebugError> {
        Snapshot::load_from_path(path)?.restore(c64)?;
        writeln!(out, "Emulator state restored from '{}'.", path.display())?;
        self.show_stop(c64, None, out)
    }

    /// Report why execution stopped, then the register line and either the
    /// next few instructions or just the next one.
    fn show_stop<W: Write>(
        &self,
        c64: &C64,
        stop: Option<&Stop>,
        out: &mut W,
    ) -> Result<(), DebugError> {
        match stop {
            Some(Stop::Breakpoint(pc)) => writeln!(out, "Breakpoint hit at ${pc:04X}")?,
            Some(Stop::Budget) => writeln!(out, "Stopped after cycle budget.")?,
            Some(Stop::Interrupted) => writeln!(out, "Interrupted.")?,
            Some(Stop::Fault(e)) => {
                log::error!("{e}");
                writeln!(out, "CPU fault: {e}")?;
            }
            None => {}
        }
        write_registers(c64, out)?;
        let pc = c64.cpu().pc();
        if self.autodasm {
            for line in disassemble_range(c64.bus(), pc, AUTODASM_COUNT) {
                writeln!(out, "{line}")?;
            }
        } else {
            writeln!(out, "Next -> {}", disassemble(c64.bus(), pc))?;
        }
        Ok(())
    }
}

fn into_io(e: DebugError) -> io::Error {
    match e {
        DebugError::Io(e) => e,
        other => io::Error::other(other.to_string()),
    }
}

/// All start addresses where `pattern` occurs, read without side effects.
pub fn find<B: Bus>(bus: &B, pattern: &[u8]) -> Vec<u16> {
    if pattern.is_empty() || pattern.len() > 0x10000 {
        return Vec::new();
    }
    let last = 0x10000 - pattern.len() as u32;
    (0..=last)
        .filter(|&start| {
            pattern
                .iter()
                .zip(start..)
                .all(|(&byte, addr)| bus.peek(addr as u16) == byte)
        })
        .map(|start| start as u16)
        .collect()
}

fn address_list(addrs: impl IntoIterator<Item = u16>) -> String {
    addrs
        .into_iter()
        .map(|a| format!("${a:04X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flag letters separated by spaces: `N V - B D I Z C`.
fn spaced_flags(p: Status) -> String {
    let letters: Vec<String> = p.letters().chars().map(String::from).collect();
    letters.join(" ")
}

/// `A:.. X:.. Y:.. PC:.... SP:..  Flags: N V - B D I Z C | <disassembly>`,
/// or `| IRQ service` / `| NMI service` when the step takes an interrupt.
fn trace_line(c64: &C64) -> String {
    let cpu = c64.cpu();
    let next = match cpu.pending_interrupt() {
        Some(interrupt) => format!("{} service", interrupt.name()),
        None => disassemble(c64.bus(), cpu.pc()).to_string(),
    };
    format!("{}  Flags: {} | {next}", cpu.regs, spaced_flags(cpu.status()))
}

fn write_registers<W: Write>(c64: &C64, out: &mut W) -> io::Result<()> {
    let cpu = c64.cpu();
    writeln!(out, "{}  Flags: {}", cpu.regs, spaced_flags(cpu.status()))
}

fn write_flags<W: Write>(p: Status, out: &mut W) -> io::Result<()> {
    writeln!(out, "--- CPU Flags ---")?;
    for (label, flag) in [
        ("N (Negative) ", Some(N)),
        ("V (Overflow) ", Some(V)),
        ("- (Unused)   ", None),
        ("B (Break)    ", Some(B)),
        ("D (Decimal)  ", Some(D)),
        ("I (Interrupt)", Some(I)),
        ("Z (Zero)     ", Some(Z)),
        ("C (Carry)    ", Some(C)),
    ] {
        let set = flag.is_none_or(|f| p.is_set(f));
        writeln!(out, "  {label}: {}", u8::from(set))?;
    }
    Ok(())
}

/// Hex and ASCII dump, 16 bytes per line, stopping at $FFFF.
fn write_memory<B: Bus, W: Write>(bus: &B, start: u16, len: u32, out: &mut W) -> io::Result<()> {
    writeln!(out, "--- Memory View from ${start:04X} ---")?;
    let end = u32::from(start).saturating_add(len).min(0x10000);
    for row in (u32::from(start)..end).step_by(16) {
        let bytes: Vec<u8> = (row..(row + 16).min(end)).map(|a| bus.peek(a as u16)).collect();
        let hex = bytes
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        let ascii: String = bytes
            .iter()
            .map(|&b| if (0x20..=0x7E).contains(&b) { b as char } else { '.' })
            .collect();
        writeln!(out, "${row:04X}: {hex:<48} | {ascii}")?;
    }
    Ok(())
}

/// Frame #0 is the current instruction; each later frame is a stacked
/// return address as JSR leaves it (pointing at the JSR's last byte).
fn write_backtrace<W: Write>(c64: &C64, out: &mut W) -> io::Result<()> {
    let bus = c64.bus();
    writeln!(out, "--- Call Stack (Backtrace) ---")?;
    writeln!(out, "  #0: {}", disassemble(bus, c64.cpu().pc()))?;
    let mut sp = c64.cpu().regs.s;
    let mut frame = 1;
    while sp < 0xFF {
        let base = 0x0100 + u16::from(sp);
        let ret = u16::from_le_bytes([bus.peek(base + 1), bus.peek(base + 2)]);
        writeln!(
            out,
            "  #{frame}: (JSR from ${:04X}) -> returns to ${:04X}",
            ret.wrapping_sub(2),
            ret.wrapping_add(1)
        )?;
        sp = sp.saturating_add(2);
        frame += 1;
    }
    Ok(())
}

const HELP: &str = "\
Debugger commands:
  s (step)            - Execute one instruction (an empty line does the same).
  c (continue)        - Run until the next breakpoint (Ctrl-C stops it).
  b <addr>            - Set a breakpoint (e.g., b 8000).
  b clear <addr>      - Clear a specific breakpoint.
  b clear all         - Clear all breakpoints.
  blist               - List all active breakpoints.
  m <addr> [len]      - Display memory from hex address (e.g., m 0200 32).
  dasm <addr> [n]     - Disassemble n instructions from address (e.g., dasm 8000 5).
  find <b1> [b2]..    - Search for a byte sequence in memory (e.g., find A9 20 85 30).
  set <addr> <value>  - Write a byte through the bus (e.g., set 8000 0A).
  reg <reg> <value>   - Set a register: a, x, y, sp, pc, p (e.g., reg a 0A).
  reg                 - Show the registers.
  flags               - Show a detailed view of the status flags.
  stack               - Display the current contents of the stack.
  bt                  - Show a backtrace of the call stack.
  cycles              - Show the total cycle count.
  save [file]         - Save emulator state (default: emustate.json).
  load [file]         - Restore emulator state (default: emustate.json).
  slot save|load <n>  - Quick-save slots 1-6.
  trace               - Toggle instruction tracing to trace.log.
  autodasm            - Toggle the listing shown after each stop.
  h (help)            - Show this help message.
  q (quit)            - Leave the debugger.
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::C64Memory;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Bare machine with `program` at $C000 and the reset vector on it.
    fn machine(program: &[u8]) -> C64 {
        let mut kernal = vec![0xEA; 8192];
        kernal[0x1FFC] = 0x00;
        kernal[0x1FFD] = 0xC0;
        let memory = C64Memory::new(&kernal, &[0; 8192], &[0; 4096]).expect("valid ROMs");
        let mut c64 = C64::bare(memory);
        for (i, &b) in program.iter().enumerate() {
            c64.bus_mut().memory.ram_write(0xC000 + i as u16, b);
        }
        c64
    }

    fn run_line(dbg: &mut Debugger, c64: &mut C64, line: &str) -> String {
        let mut out = Vec::new();
        dbg.execute(c64, line, &mut out).expect("command succeeds");
        String::from_utf8(out).expect("utf-8 output")
    }

    /// A `Write` handle that can be inspected after the debugger owns it.
    #[derive(Clone, Default)]
    struct SharedSink(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn breakpoint_halts_before_execution() {
        // LDA #$01; LDA #$02; LDA #$03
        let mut c64 = machine(&[0xA9, 0x01, 0xA9, 0x02, 0xA9, 0x03]);
        let mut dbg = Debugger::default();
        dbg.add_breakpoint(0xC002);
        assert_eq!(dbg.run(&mut c64, 1000), Stop::Breakpoint(0xC002));
        assert_eq!(c64.cpu().regs.a, 0x01, "LDA #$02 not yet executed");
    }

    #[test]
    fn continue_steps_off_the_breakpoint() {
        // Loop: INX; JMP $C000
        let mut c64 = machine(&[0xE8, 0x4C, 0x00, 0xC0]);
        let mut dbg = Debugger::default();
        dbg.add_breakpoint(0xC000);
        assert_eq!(dbg.run(&mut c64, 1000), Stop::Breakpoint(0xC000));
        assert_eq!(dbg.resume(&mut c64, 1000), Stop::Breakpoint(0xC000));
        assert_eq!(c64.cpu().regs.x, 1);
        assert!(dbg.breakpoints().contains(&0xC000), "breakpoint kept");
    }

    #[test]
    fn budget_stop() {
        let mut c64 = machine(&[0x4C, 0x00, 0xC0]);
        let mut dbg = Debugger::default();
        assert_eq!(dbg.run(&mut c64, 30), Stop::Budget);
        assert!(c64.cycles() >= 30);
    }

    #[test]
    fn fault_leaves_pc_on_bad_opcode() {
        let mut c64 = machine(&[0xEA, 0x02]);
        let mut dbg = Debugger::default();
        let stop = dbg.run(&mut c64, 100);
        assert_eq!(
            stop,
            Stop::Fault(CpuError::UnknownOpcode { opcode: 0x02, pc: 0xC001 })
        );
        assert_eq!(c64.cpu().pc(), 0xC001);
    }

    #[test]
    fn step_command_runs_exactly_one_instruction() {
        let mut c64 = machine(&[0xA9, 0x07, 0xA9, 0x08]);
        let mut dbg = Debugger::default();
        dbg.add_breakpoint(0xC000);
        let out = run_line(&mut dbg, &mut c64, "");
        assert_eq!(c64.cpu().pc(), 0xC002);
        assert!(out.contains("A:07"), "{out}");
    }

    #[test]
    fn breakpoint_listing_is_sorted() {
        let mut c64 = machine(&[]);
        let mut dbg = Debugger::default();
        run_line(&mut dbg, &mut c64, "b C100");
        run_line(&mut dbg, &mut c64, "b 0800");
        let out = run_line(&mut dbg, &mut c64, "blist");
        assert!(out.contains("$0800 $C100"), "{out}");
        run_line(&mut dbg, &mut c64, "b clear all");
        let out = run_line(&mut dbg, &mut c64, "blist");
        assert!(out.contains("No active breakpoints."));
    }

    #[test]
    fn memory_dump_format() {
        let mut c64 = machine(b"HELLO");
        let mut dbg = Debugger::default();
        let out = run_line(&mut dbg, &mut c64, "m C000 16");
        let line = out.lines().nth(1).expect("one data line");
        assert!(line.starts_with("$C000: 48 45 4C 4C 4F 00"), "{line}");
        assert!(line.ends_with("| HELLO..........."), "{line}");
    }

    #[test]
    fn find_reports_all_matches() {
        let mut c64 = machine(&[0xA9, 0x20, 0x85, 0xA9, 0x20]);
        let hits = find(c64.bus(), &[0xA9, 0x20]);
        assert!(hits.contains(&0xC000) && hits.contains(&0xC003));
        let out = run_line(&mut Debugger::default(), &mut c64, "find A9 20 85");
        assert!(out.contains("Found 1 match(es) at:\n$C000"), "{out}");
    }

    #[test]
    fn set_and_reg_write_state() {
        let mut c64 = machine(&[]);
        let mut dbg = Debugger::default();
        run_line(&mut dbg, &mut c64, "set 2000 5A");
        assert_eq!(c64.bus().memory.ram_read(0x2000), 0x5A);
        run_line(&mut dbg, &mut c64, "reg pc 2000");
        run_line(&mut dbg, &mut c64, "reg x ff");
        assert_eq!(c64.cpu().pc(), 0x2000);
        assert_eq!(c64.cpu().regs.x, 0xFF);
    }

    #[test]
    fn input_errors_leave_machine_untouched() {
        let mut c64 = machine(&[0xA9, 0x01]);
        let mut dbg = Debugger::default();
        let mut out = Vec::new();
        assert!(matches!(
            dbg.execute(&mut c64, "set zz 01", &mut out),
            Err(DebugError::InvalidNumber(_))
        ));
        assert!(matches!(
            dbg.execute(&mut c64, "bogus", &mut out),
            Err(DebugError::UnknownCommand(_))
        ));
        assert_eq!(c64.cpu().pc(), 0xC000);
    }

    #[test]
    fn backtrace_unwinds_jsr_frames() {
        // JSR $C010 ... at $C010: JSR $C020 ... at $C020: NOP
        let mut program = vec![0xEA; 0x30];
        program[0x00..0x03].copy_from_slice(&[0x20, 0x10, 0xC0]);
        program[0x10..0x13].copy_from_slice(&[0x20, 0x20, 0xC0]);
        let mut c64 = machine(&program);
        c64.step().expect("JSR");
        c64.step().expect("JSR");
        let out = run_line(&mut Debugger::default(), &mut c64, "bt");
        assert!(out.contains("#0: $C020"), "{out}");
        assert!(
            out.contains("#1: (JSR from $C010) -> returns to $C013"),
            "{out}"
        );
        assert!(
            out.contains("#2: (JSR from $C000) -> returns to $C003"),
            "{out}"
        );
    }

    #[test]
    fn trace_lines_precede_each_instruction() {
        let mut c64 = machine(&[0xA9, 0x01, 0xEA]);
        let mut dbg = Debugger::default();
        let sink = SharedSink::default();
        dbg.trace_to(Box::new(sink.clone()));
        dbg.add_breakpoint(0xC003);
        assert_eq!(dbg.run(&mut c64, 100), Stop::Breakpoint(0xC003));
        let text = String::from_utf8(sink.0.borrow().clone()).expect("utf-8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("A:00 X:00 Y:00 PC:C000 SP:FD  Flags: "));
        assert!(lines[0].ends_with("LDA #$01"), "{}", lines[0]);
        assert!(lines[1].contains("PC:C002"));
    }

    #[test]
    fn repl_reports_errors_and_continues() {
        let mut c64 = machine(&[0xA9, 0x01]);
        let mut dbg = Debugger::default();
        let input = io::Cursor::new("bogus\ns\nquit\ns\n");
        let mut out = Vec::new();
        dbg.repl(&mut c64, input, &mut out).expect("repl runs");
        let text = String::from_utf8(out).expect("utf-8");
        assert!(text.contains("Error: unknown command `bogus`"), "{text}");
        assert_eq!(c64.cpu().pc(), 0xC002, "only the first step ran");
    }

    #[test]
    fn autodasm_toggle() {
        let mut c64 = machine(&[0xEA]);
        let mut dbg = Debugger::default();
        assert!(dbg.autodasm());
        let out = run_line(&mut dbg, &mut c64, "autodasm");
        assert!(out.contains("OFF"));
        let out = run_line(&mut dbg, &mut c64, "s");
        assert!(out.contains("Next -> $C001"), "{out}");
    }

    #[test]
    fn oversized_counts_are_reported_not_run() {
        let mut c64 = machine(&[0xEA]);
        let mut dbg = Debugger::default();
        let mut out = Vec::new();
        assert!(matches!(
            dbg.execute(&mut c64, "dasm 0 4000000000", &mut out),
            Err(DebugError::OutOfRange { value: 4_000_000_000, .. })
        ));
        assert!(matches!(
            dbg.execute(&mut c64, "m 0010 $FFFFFFFF", &mut out),
            Err(DebugError::OutOfRange { value: 0xFFFF_FFFF, .. })
        ));
        assert!(out.is_empty());

        let input = io::Cursor::new("dasm 0 4000000000\ns\n");
        dbg.repl(&mut c64, input, &mut out).expect("repl runs");
        assert_eq!(c64.cpu().pc(), 0xC001, "the step after the error ran");
    }

    #[test]
    fn memory_view_stops_at_top_of_memory() {
        let c64 = machine(&[]);
        let mut out = Vec::new();
        write_memory(c64.bus(), 0x0010, u32::MAX, &mut out).expect("write");
        let text = String::from_utf8(out).expect("utf-8");
        assert_eq!(text.lines().count(), 1 + 0xFFF);
        assert!(text.lines().last().is_some_and(|l| l.starts_with("$FFF0: ")));

        let out = run_line(&mut Debugger::default(), &mut machine(&[]), "m FFF8 $10000");
        let rows: Vec<&str> = out.lines().skip(1).collect();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].starts_with("$FFF8: ") && rows[0].contains(" | "), "{out}");
    }

    #[test]
    fn reg_p_keeps_break_out_of_the_live_status() {
        let mut c64 = machine(&[]);
        let mut dbg = Debugger::default();
        run_line(&mut dbg, &mut c64, "reg p FF");
        assert_eq!(c64.cpu().status().0, 0xEF);
        let flags = run_line(&mut dbg, &mut c64, "flags");
        assert!(flags.contains("B (Break)    : 0"), "{flags}");

        let snap = Snapshot::capture(&c64);
        assert!(!snap.cpu.b);
        snap.clone().restore(&mut c64).expect("restore");
        assert_eq!(Snapshot::capture(&c64), snap);
    }

    #[test]
    fn raised_cancel_stops_run_at_the_boundary() {
        let mut c64 = machine(&[0x4C, 0x00, 0xC0]);
        let mut dbg = Debugger::default();
        dbg.cancel_handle().store(true, Ordering::SeqCst);
        assert_eq!(dbg.run(&mut c64, u64::MAX), Stop::Interrupted);
        assert_eq!(c64.cycles(), 7, "nothing executed");
        assert_eq!(dbg.run(&mut c64, 30), Stop::Budget, "cancel consumed");
    }

    #[test]
    fn continue_without_breakpoints_can_be_cancelled() {
        let mut c64 = machine(&[0x4C, 0x00, 0xC0]);
        let mut dbg = Debugger::default();
        let cancel = dbg.cancel_handle();
        // A cancel raised while idle at the prompt does not carry over
        cancel.store(true, Ordering::SeqCst);

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            cancel.store(true, Ordering::SeqCst);
        });
        let out = run_line(&mut dbg, &mut c64, "c");
        canceller.join().expect("canceller thread");

        assert!(out.starts_with("Interrupted."), "{out}");
        assert!(c64.cycles() > 1000, "ran until cancelled: {}", c64.cycles());
        assert_eq!(c64.cpu().pc(), 0xC000, "stopped on an instruction boundary");
    }

    #[test]
    fn trace_labels_interrupt_service() {
        let mut c64 = machine(&[0xEA]);
        let mut dbg = Debugger::default();
        let sink = SharedSink::default();
        dbg.trace_to(Box::new(sink.clone()));
        c64.cpu_mut().nmi();
        assert_eq!(dbg.step(&mut c64), Ok(7));
        assert_eq!(dbg.step(&mut c64), Ok(2));

        let text = String::from_utf8(sink.0.borrow().clone()).expect("utf-8");
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("A:00 X:00 Y:00 PC:C000"), "{}", lines[0]);
        assert!(lines[0].ends_with("| NMI service"), "{}", lines[0]);
        assert!(lines[1].contains("PC:EAEA") && lines[1].ends_with("NOP"), "{}", lines[1]);
    }
}
