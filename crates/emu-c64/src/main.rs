//! Commodore 64 emulator binary.
//!
//! Runs the interactive debugger on stdin/stdout, or a headless run for
//! a fixed cycle budget, or the Klaus Dormann functional test on a flat
//! 64K bus.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::{Parser, ValueEnum};
use emu_6502::{CpuError, Mos6502};
use emu_c64::debugger::parse_addr;
use emu_c64::{
    C64, C64Config, C64Model, Cartridge, CartridgeMode, CartridgeType, ConfigError, Debugger,
    DebuggerConfig, PrgError, Snapshot, SnapshotError, Stop,
};
use emu_core::{Bus, SimpleBus};
use thiserror::Error;

/// Trap address of a passing functional test.
const FUNCTIONAL_SUCCESS: u16 = 0x3469;
/// Entry point of the functional test binary.
const FUNCTIONAL_ENTRY: u16 = 0x0400;
/// Give up on the functional test after this many cycles.
const FUNCTIONAL_CYCLE_LIMIT: u64 = 200_000_000;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ModelArg {
    Pal,
    Ntsc,
}

impl From<ModelArg> for C64Model {
    fn from(model: ModelArg) -> Self {
        match model {
            ModelArg::Pal => C64Model::C64Pal,
            ModelArg::Ntsc => C64Model::C64Ntsc,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum CartModeArg {
    #[value(name = "8k")]
    EightK,
    #[value(name = "16k")]
    SixteenK,
    Ultimax,
}

impl From<CartModeArg> for CartridgeMode {
    fn from(mode: CartModeArg) -> Self {
        match mode {
            CartModeArg::EightK => CartridgeMode::EightK,
            CartModeArg::SixteenK => CartridgeMode::SixteenK,
            CartModeArg::Ultimax => CartridgeMode::Ultimax,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum CartTypeArg {
    Normal,
    Ocean,
    MagicDesk,
}

impl From<CartTypeArg> for CartridgeType {
    fn from(kind: CartTypeArg) -> Self {
        match kind {
            CartTypeArg::Normal => CartridgeType::Normal,
            CartTypeArg::Ocean => CartridgeType::Ocean,
            CartTypeArg::MagicDesk => CartridgeType::MagicDesk,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "emu-c64", about = "Commodore 64 emulator with a 6510 debugger")]
struct Args {
    /// Directory holding kernal.rom, basic.rom and chargen.rom.
    #[arg(long, value_name = "DIR", default_value = "roms")]
    roms: PathBuf,

    /// Kernal ROM (overrides the ROM directory).
    #[arg(long, value_name = "FILE")]
    kernal: Option<PathBuf>,

    /// BASIC ROM (overrides the ROM directory).
    #[arg(long, value_name = "FILE")]
    basic: Option<PathBuf>,

    /// Character ROM (overrides the ROM directory).
    #[arg(long, value_name = "FILE")]
    chargen: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ModelArg::Pal)]
    model: ModelArg,

    /// PRG file to load into RAM after reset.
    #[arg(long, value_name = "FILE")]
    prg: Option<PathBuf>,

    /// Headerless binary to load at `--at`.
    #[arg(long, value_name = "FILE", requires = "at")]
    raw: Option<PathBuf>,

    /// Load address for `--raw` (hex).
    #[arg(long, value_name = "ADDR", value_parser = addr_arg)]
    at: Option<u16>,

    /// Start execution here (hex). Defaults to `--at` when loading raw.
    #[arg(long, value_name = "ADDR", value_parser = addr_arg)]
    entry: Option<u16>,

    /// Raw cartridge image (8K banks).
    #[arg(long, value_name = "FILE")]
    cartridge: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = CartModeArg::EightK)]
    cart_mode: CartModeArg,

    #[arg(long, value_enum, default_value_t = CartTypeArg::Normal)]
    cart_type: CartTypeArg,

    /// Breakpoint address (hex). May be repeated.
    #[arg(short = 'b', long = "break", value_name = "ADDR", value_parser = addr_arg)]
    breakpoints: Vec<u16>,

    /// Snapshot to restore at start; also the default `save`/`load` file.
    #[arg(long, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Directory for quick-save slots.
    #[arg(long, value_name = "DIR", default_value = ".")]
    slot_dir: PathBuf,

    /// Run without the debugger prompt and print the registers at the end.
    #[arg(long)]
    headless: bool,

    /// Cycle budget for `--headless`.
    #[arg(long, default_value_t = 1_000_000)]
    cycles: u64,

    /// Run a Klaus Dormann functional test binary on a flat 64K bus.
    #[arg(long, value_name = "FILE", conflicts_with = "headless")]
    functional_test: Option<PathBuf>,
}

fn addr_arg(s: &str) -> Result<u16, String> {
    parse_addr(s).map_err(|e| e.to_string())
}

/// Startup failure.
#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("{}: {source}", path.display())]
    Prg { path: PathBuf, source: PrgError },

    #[error("cannot read {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Cpu(#[from] CpuError),

    #[error("debugger I/O failed: {0}")]
    Repl(io::Error),
}

fn read_file(path: &Path) -> Result<Vec<u8>, AppError> {
    fs::read(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn make_c64(args: &Args) -> Result<C64, AppError> {
    let rom = |over: &Option<PathBuf>, name: &str| {
        over.clone().unwrap_or_else(|| args.roms.join(name))
    };
    let config = C64Config::from_files(
        &rom(&args.kernal, "kernal.rom"),
        &rom(&args.basic, "basic.rom"),
        &rom(&args.chargen, "chargen.rom"),
        args.model.into(),
    )?;
    let mut c64 = C64::new(&config)?;

    if let Some(path) = &args.cartridge {
        let image = read_file(path)?;
        let cart = Cartridge::from_raw(args.cart_type.into(), args.cart_mode.into(), &image)?;
        c64.insert_cartridge(cart);
        c64.reset();
    }

    if let Some(path) = &args.state {
        if path.exists() {
            Snapshot::load_from_path(path)?.restore(&mut c64)?;
        } else {
            log::info!("{} does not exist yet, starting fresh", path.display());
        }
    }

    if let Some(path) = &args.prg {
        let data = read_file(path)?;
        let addr = c64.load_prg(&data).map_err(|source| AppError::Prg {
            path: path.clone(),
            source,
        })?;
        log::info!("loaded {} at ${addr:04X}", path.display());
    }

    let mut entry = args.entry;
    if let (Some(path), Some(at)) = (&args.raw, args.at) {
        let data = read_file(path)?;
        for (i, &byte) in data.iter().enumerate() {
            c64.bus_mut().memory.ram_write(at.wrapping_add(i as u16), byte);
        }
        log::info!("loaded {} bytes at ${at:04X}", data.len());
        entry = entry.or(Some(at));
    }
    if let Some(pc) = entry {
        c64.cpu_mut().set_pc(pc);
    }

    Ok(c64)
}

fn debugger_config(args: &Args) -> DebuggerConfig {
    let mut config = DebuggerConfig {
        slot_dir: args.slot_dir.clone(),
        ..DebuggerConfig::default()
    };
    if let Some(path) = &args.state {
        config.state_path.clone_from(path);
    }
    config
}

fn run_headless(c64: &mut C64, debugger: &mut Debugger, cycles: u64) -> ExitCode {
    let stop = debugger.run(c64, cycles);
    let code = match &stop {
        Stop::Breakpoint(pc) => {
            println!("Breakpoint hit at ${pc:04X}");
            ExitCode::SUCCESS
        }
        Stop::Budget => ExitCode::SUCCESS,
        Stop::Interrupted => {
            println!("Interrupted");
            ExitCode::SUCCESS
        }
        Stop::Fault(e) => {
            log::error!("{e}");
            eprintln!("CPU fault: {e}");
            ExitCode::FAILURE
        }
    };
    let cpu = c64.cpu();
    println!("{}  Flags: {}", cpu.regs, cpu.status().letters());
    println!("Total cycles: {}", cpu.cycles());
    code
}

/// Step until the PC stops moving. Returns the trap address and the
/// test number the binary keeps at $0200.
fn run_functional_test(path: &Path) -> Result<(u16, u8), AppError> {
    let binary = read_file(path)?;
    let mut bus = SimpleBus::new();
    bus.load(0x0000, &binary);
    let mut cpu = Mos6502::new();
    cpu.set_pc(FUNCTIONAL_ENTRY);

    while cpu.cycles() < FUNCTIONAL_CYCLE_LIMIT {
        let pc = cpu.pc();
        cpu.step(&mut bus)?;
        if cpu.pc() == pc {
            return Ok((pc, bus.peek(0x0200)));
        }
    }
    Ok((cpu.pc(), bus.peek(0x0200)))
}

fn run(args: &Args) -> Result<ExitCode, AppError> {
    if let Some(path) = &args.functional_test {
        let (trap, test) = run_functional_test(path)?;
        if trap == FUNCTIONAL_SUCCESS {
            println!("Functional test passed (trap at ${trap:04X})");
            return Ok(ExitCode::SUCCESS);
        }
        println!("Functional test FAILED at ${trap:04X} (test #{test:02X})");
        return Ok(ExitCode::FAILURE);
    }

    let mut c64 = make_c64(args)?;
    let mut debugger = Debugger::new(debugger_config(args));
    for &addr in &args.breakpoints {
        debugger.add_breakpoint(addr);
    }
    let cancel = debugger.cancel_handle();
    if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst)) {
        log::warn!("cannot install the Ctrl-C handler, runs cannot be interrupted: {e}");
    }

    if args.headless {
        return Ok(run_headless(&mut c64, &mut debugger, args.cycles));
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    debugger
        .repl(&mut c64, stdin.lock(), &mut stdout.lock())
        .map_err(AppError::Repl)?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
