//! 6502 CPU implementation.
//!
//! Instruction-stepped execution driven by the decode table. Each
//! `step()` handles exactly one instruction-boundary event (an interrupt
//! service or one instruction) and reports the cycles it consumed,
//! including page-cross and branch adjustments.

use emu_core::{Bus, Cpu, Observable, Value};

use crate::flags::{C, D, I, N, V, Z};
use crate::opcodes::{self, Mnemonic, Mode, Opcode};
use crate::{CpuError, Registers, Status};

/// NMI vector.
pub const NMI_VECTOR: u16 = 0xFFFA;
/// Reset vector.
pub const RESET_VECTOR: u16 = 0xFFFC;
/// IRQ/BRK vector.
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Cycles taken by reset and by interrupt service.
const INTERRUPT_CYCLES: u32 = 7;

/// Why a `run_until` loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The stop predicate matched at an instruction boundary.
    Stopped,
    /// The cycle budget ran out.
    BudgetExhausted,
}

/// An interrupt the next `step` will service instead of fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Nmi,
    Irq,
}

impl Interrupt {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nmi => "NMI",
            Self::Irq => "IRQ",
        }
    }

    #[must_use]
    pub const fn vector(self) -> u16 {
        match self {
            Self::Nmi => NMI_VECTOR,
            Self::Irq => IRQ_VECTOR,
        }
    }
}

/// Result of a bounded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Cycles consumed by this run.
    pub cycles: u64,
}

/// Effective address of the current instruction.
#[derive(Debug, Clone, Copy)]
struct Operand {
    addr: u16,
    /// Indexed resolution crossed a page (or, for branches, the target
    /// lies in another page).
    crossed: bool,
}

/// The MOS 6502 CPU.
#[derive(Debug, Clone)]
pub struct Mos6502 {
    /// CPU registers.
    pub regs: Registers,

    /// NMI edge latch: set by `nmi()`, cleared when serviced.
    nmi_pending: bool,

    /// IRQ level, driven by the machine before every step.
    irq_line: bool,

    /// Total cycles executed. Monotonic across resets.
    total_cycles: u64,
}

impl Default for Mos6502 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mos6502 {
    /// Create a new 6502 with power-on registers. PC is zero until `reset`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            nmi_pending: false,
            irq_line: false,
            total_cycles: 0,
        }
    }

    #[must_use]
    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.regs.pc = pc;
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.regs.p
    }

    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Overwrite the cycle counter (snapshot restore, debugger edits).
    pub fn set_cycles(&mut self, cycles: u64) {
        self.total_cycles = cycles;
    }

    #[must_use]
    pub fn nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    #[must_use]
    pub fn irq_line(&self) -> bool {
        self.irq_line
    }

    pub fn set_irq(&mut self, active: bool) {
        self.irq_line = active;
    }

    /// Overwrite the NMI latch (snapshot restore).
    pub fn set_nmi_pending(&mut self, pending: bool) {
        self.nmi_pending = pending;
    }

    /// What the next `step` services, given the current latch and line.
    #[must_use]
    pub fn pending_interrupt(&self) -> Option<Interrupt> {
        if self.nmi_pending {
            Some(Interrupt::Nmi)
        } else if self.irq_line && !self.regs.p.is_set(I) {
            Some(Interrupt::Irq)
        } else {
            None
        }
    }

    /// Latch an NMI edge. Serviced at the next boundary regardless of I.
    pub fn nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Reset: reload PC from $FFFC, reinitialise S and P, drop pending
    /// interrupts. The cycle counter keeps counting.
    pub fn reset<B: Bus>(&mut self, bus: &mut B) {
        self.regs = Registers::new();
        self.regs.pc = read_word(bus, RESET_VECTOR);
        self.nmi_pending = false;
        self.irq_line = false;
        self.total_cycles += u64::from(INTERRUPT_CYCLES);
        log::debug!("reset: PC=${:04X}", self.regs.pc);
    }

    /// Reset and zero the cycle counter. Used when building a fresh machine.
    pub fn reset_counter<B: Bus>(&mut self, bus: &mut B) {
        self.total_cycles = 0;
        self.reset(bus);
    }

    /// Execute one instruction-boundary event.
    ///
    /// Priority: latched NMI, then IRQ if the line is high and I is clear,
    /// then a normal fetch. An interrupt service is its own event, so the
    /// handler's first instruction runs on the following call.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> Result<u32, CpuError> {
        if let Some(interrupt) = self.pending_interrupt() {
            if interrupt == Interrupt::Nmi {
                self.nmi_pending = false;
            }
            log::debug!("{} at ${:04X}", interrupt.name(), self.regs.pc);
            return Ok(self.service_interrupt(bus, interrupt.vector()));
        }

        let pc = self.regs.pc;
        let opcode = bus.read(pc);
        let Some(entry) = opcodes::decode(opcode) else {
            log::warn!("unknown opcode ${opcode:02X} at ${pc:04X}");
            return Err(CpuError::UnknownOpcode { opcode, pc });
        };
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("{pc:04X}  {opcode:02X}  {} {}", entry.mnemonic.name(), self.regs);
        }
        self.regs.pc = pc.wrapping_add(1);

        let operand = self.resolve(bus, entry.mode);
        let mut cycles = u32::from(entry.cycles);
        if entry.page_penalty && operand.crossed {
            cycles += 1;
        }
        cycles += self.execute(bus, entry, operand);

        self.total_cycles += u64::from(cycles);
        Ok(cycles)
    }

    /// Step until `stop` returns true at an instruction boundary or the
    /// cycle budget is used up.
    ///
    /// The predicate is checked before every step, including the first.
    pub fn run_until<B, F>(
        &mut self,
        bus: &mut B,
        budget: u64,
        mut stop: F,
    ) -> Result<RunReport, CpuError>
    where
        B: Bus,
        F: FnMut(&Self) -> bool,
    {
        let mut used = 0u64;
        loop {
            if stop(self) {
                return Ok(RunReport {
                    outcome: RunOutcome::Stopped,
                    cycles: used,
                });
            }
            if used >= budget {
                return Ok(RunReport {
                    outcome: RunOutcome::BudgetExhausted,
                    cycles: used,
                });
            }
            used += u64::from(self.step(bus)?);
        }
    }

    /// Push PC and P (B clear), set I, load PC from `vector`.
    fn service_interrupt<B: Bus>(&mut self, bus: &mut B, vector: u16) -> u32 {
        self.push_word(bus, self.regs.pc);
        let p = self.regs.p.to_byte_irq();
        self.push(bus, p);
        self.regs.p.set(I);
        self.regs.pc = read_word(bus, vector);
        self.total_cycles += u64::from(INTERRUPT_CYCLES);
        INTERRUPT_CYCLES
    }

    // ========================================================================
    // Addressing modes
    // ========================================================================

    fn fetch<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn fetch_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn resolve<B: Bus>(&mut self, bus: &mut B, mode: Mode) -> Operand {
        let (addr, crossed) = match mode {
            Mode::Implied | Mode::Accumulator => (0, false),
            Mode::Immediate => {
                let addr = self.regs.pc;
                self.regs.pc = addr.wrapping_add(1);
                (addr, false)
            }
            Mode::ZeroPage => (u16::from(self.fetch(bus)), false),
            Mode::ZeroPageX => (u16::from(self.fetch(bus).wrapping_add(self.regs.x)), false),
            Mode::ZeroPageY => (u16::from(self.fetch(bus).wrapping_add(self.regs.y)), false),
            Mode::Absolute => (self.fetch_word(bus), false),
            Mode::AbsoluteX => {
                let base = self.fetch_word(bus);
                index(base, self.regs.x)
            }
            Mode::AbsoluteY => {
                let base = self.fetch_word(bus);
                index(base, self.regs.y)
            }
            Mode::Indirect => {
                // NMOS bug: the high byte is fetched from the same page
                let ptr = self.fetch_word(bus);
                let lo = bus.read(ptr);
                let hi = bus.read((ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF));
                (u16::from_le_bytes([lo, hi]), false)
            }
            Mode::IndexedIndirect => {
                let zp = self.fetch(bus).wrapping_add(self.regs.x);
                (read_zp_word(bus, zp), false)
            }
            Mode::IndirectIndexed => {
                let zp = self.fetch(bus);
                let base = read_zp_word(bus, zp);
                index(base, self.regs.y)
            }
            Mode::Relative => {
                let offset = self.fetch(bus) as i8;
                let next = self.regs.pc;
                let target = next.wrapping_add(offset as u16);
                (target, target & 0xFF00 != next & 0xFF00)
            }
        };
        Operand { addr, crossed }
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Perform the operation. Returns extra cycles (branches only).
    fn execute<B: Bus>(&mut self, bus: &mut B, entry: Opcode, operand: Operand) -> u32 {
        let addr = operand.addr;
        let accumulator = entry.mode == Mode::Accumulator;

        match entry.mnemonic {
            // Loads and stores
            Mnemonic::Lda => {
                let v = bus.read(addr);
                self.do_lda(v);
            }
            Mnemonic::Ldx => {
                let v = bus.read(addr);
                self.do_ldx(v);
            }
            Mnemonic::Ldy => {
                let v = bus.read(addr);
                self.do_ldy(v);
            }
            Mnemonic::Sta => bus.write(addr, self.regs.a),
            Mnemonic::Stx => bus.write(addr, self.regs.x),
            Mnemonic::Sty => bus.write(addr, self.regs.y),

            // Transfers
            Mnemonic::Tax => self.do_ldx(self.regs.a),
            Mnemonic::Tay => self.do_ldy(self.regs.a),
            Mnemonic::Txa => self.do_lda(self.regs.x),
            Mnemonic::Tya => self.do_lda(self.regs.y),
            Mnemonic::Tsx => self.do_ldx(self.regs.s),
            // TXS does not touch flags
            Mnemonic::Txs => self.regs.s = self.regs.x,

            // Stack
            Mnemonic::Pha => self.push(bus, self.regs.a),
            Mnemonic::Php => {
                let p = self.regs.p.to_byte_brk();
                self.push(bus, p);
            }
            Mnemonic::Pla => {
                let v = self.pull(bus);
                self.do_lda(v);
            }
            Mnemonic::Plp => {
                let v = self.pull(bus);
                self.regs.p = Status::from_stack(v);
            }

            // ALU
            Mnemonic::And => {
                let v = bus.read(addr);
                self.do_and(v);
            }
            Mnemonic::Ora => {
                let v = bus.read(addr);
                self.do_ora(v);
            }
            Mnemonic::Eor => {
                let v = bus.read(addr);
                self.do_eor(v);
            }
            Mnemonic::Bit => {
                let v = bus.read(addr);
                self.do_bit(v);
            }
            Mnemonic::Adc => {
                let v = bus.read(addr);
                self.do_adc(v);
            }
            Mnemonic::Sbc => {
                let v = bus.read(addr);
                self.do_sbc(v);
            }
            Mnemonic::Cmp => {
                let v = bus.read(addr);
                self.do_compare(self.regs.a, v);
            }
            Mnemonic::Cpx => {
                let v = bus.read(addr);
                self.do_compare(self.regs.x, v);
            }
            Mnemonic::Cpy => {
                let v = bus.read(addr);
                self.do_compare(self.regs.y, v);
            }

            // Read-modify-write
            Mnemonic::Asl if accumulator => self.regs.a = self.do_asl(self.regs.a),
            Mnemonic::Lsr if accumulator => self.regs.a = self.do_lsr(self.regs.a),
            Mnemonic::Rol if accumulator => self.regs.a = self.do_rol(self.regs.a),
            Mnemonic::Ror if accumulator => self.regs.a = self.do_ror(self.regs.a),
            Mnemonic::Asl => {
                self.rmw(bus, addr, Self::do_asl);
            }
            Mnemonic::Lsr => {
                self.rmw(bus, addr, Self::do_lsr);
            }
            Mnemonic::Rol => {
                self.rmw(bus, addr, Self::do_rol);
            }
            Mnemonic::Ror => {
                self.rmw(bus, addr, Self::do_ror);
            }
            Mnemonic::Inc => {
                self.rmw(bus, addr, Self::do_inc);
            }
            Mnemonic::Dec => {
                self.rmw(bus, addr, Self::do_dec);
            }
            Mnemonic::Inx => self.do_ldx(self.regs.x.wrapping_add(1)),
            Mnemonic::Iny => self.do_ldy(self.regs.y.wrapping_add(1)),
            Mnemonic::Dex => self.do_ldx(self.regs.x.wrapping_sub(1)),
            Mnemonic::Dey => self.do_ldy(self.regs.y.wrapping_sub(1)),

            // Control flow
            Mnemonic::Jmp => self.regs.pc = addr,
            Mnemonic::Jsr => {
                // Pushes the address of the last byte of the JSR
                self.push_word(bus, self.regs.pc.wrapping_sub(1));
                self.regs.pc = addr;
            }
            Mnemonic::Rts => {
                self.regs.pc = self.pull_word(bus).wrapping_add(1);
            }
            Mnemonic::Rti => {
                let p = self.pull(bus);
                self.regs.p = Status::from_stack(p);
                self.regs.pc = self.pull_word(bus);
            }
            Mnemonic::Brk => {
                // Skip the padding byte; the handler returns past it
                let ret = self.regs.pc.wrapping_add(1);
                self.push_word(bus, ret);
                let p = self.regs.p.to_byte_brk();
                self.push(bus, p);
                self.regs.p.set(I);
                self.regs.pc = read_word(bus, IRQ_VECTOR);
            }

            Mnemonic::Bcc => return self.branch(!self.regs.p.is_set(C), operand),
            Mnemonic::Bcs => return self.branch(self.regs.p.is_set(C), operand),
            Mnemonic::Bne => return self.branch(!self.regs.p.is_set(Z), operand),
            Mnemonic::Beq => return self.branch(self.regs.p.is_set(Z), operand),
            Mnemonic::Bpl => return self.branch(!self.regs.p.is_set(N), operand),
            Mnemonic::Bmi => return self.branch(self.regs.p.is_set(N), operand),
            Mnemonic::Bvc => return self.branch(!self.regs.p.is_set(V), operand),
            Mnemonic::Bvs => return self.branch(self.regs.p.is_set(V), operand),

            // Flags
            Mnemonic::Clc => self.regs.p.clear(C),
            Mnemonic::Sec => self.regs.p.set(C),
            Mnemonic::Cli => self.regs.p.clear(I),
            Mnemonic::Sei => self.regs.p.set(I),
            Mnemonic::Cld => self.regs.p.clear(D),
            Mnemonic::Sed => self.regs.p.set(D),
            Mnemonic::Clv => self.regs.p.clear(V),

            Mnemonic::Nop => {
                // Multi-byte NOPs still perform their operand read
                if entry.mode != Mode::Implied {
                    let _ = bus.read(addr);
                }
            }

            // Undocumented composites
            Mnemonic::Slo => {
                let v = self.rmw(bus, addr, Self::do_asl);
                self.do_ora(v);
            }
            Mnemonic::Rla => {
                let v = self.rmw(bus, addr, Self::do_rol);
                self.do_and(v);
            }
            Mnemonic::Dcp => {
                let v = self.rmw(bus, addr, Self::do_dec);
                self.do_compare(self.regs.a, v);
            }
            Mnemonic::Sax => bus.write(addr, self.regs.a & self.regs.x),
            Mnemonic::Lax => {
                let v = bus.read(addr);
                self.do_lda(v);
                self.regs.x = v;
            }
        }
        0
    }

    /// Branch: +1 cycle when taken, +1 more when the target is in a
    /// different page from the next instruction.
    fn branch(&mut self, taken: bool, operand: Operand) -> u32 {
        if !taken {
            return 0;
        }
        self.regs.pc = operand.addr;
        if operand.crossed { 2 } else { 1 }
    }

    /// Read, dummy-write the old value, write the new one. Returns the
    /// new value.
    fn rmw<B: Bus>(&mut self, bus: &mut B, addr: u16, op: fn(&mut Self, u8) -> u8) -> u8 {
        let old = bus.read(addr);
        bus.write(addr, old);
        let new = op(self, old);
        bus.write(addr, new);
        new
    }

    // ========================================================================
    // Stack
    // ========================================================================

    fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        let addr = self.regs.push();
        bus.write(addr, value);
    }

    fn pull<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let addr = self.regs.pop();
        bus.read(addr)
    }

    fn push_word<B: Bus>(&mut self, bus: &mut B, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push(bus, hi);
        self.push(bus, lo);
    }

    fn pull_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.pull(bus);
        let hi = self.pull(bus);
        u16::from_le_bytes([lo, hi])
    }

    // ========================================================================
    // ALU operations
    // ========================================================================

    fn do_lda(&mut self, val: u8) {
        self.regs.a = val;
        self.regs.p.update_nz(val);
    }

    fn do_ldx(&mut self, val: u8) {
        self.regs.x = val;
        self.regs.p.update_nz(val);
    }

    fn do_ldy(&mut self, val: u8) {
        self.regs.y = val;
        self.regs.p.update_nz(val);
    }

    fn do_ora(&mut self, val: u8) {
        self.regs.a |= val;
        self.regs.p.update_nz(self.regs.a);
    }

    fn do_and(&mut self, val: u8) {
        self.regs.a &= val;
        self.regs.p.update_nz(self.regs.a);
    }

    fn do_eor(&mut self, val: u8) {
        self.regs.a ^= val;
        self.regs.p.update_nz(self.regs.a);
    }

    fn do_adc(&mut self, val: u8) {
        if self.regs.p.is_set(D) {
            self.do_adc_decimal(val);
        } else {
            self.do_adc_binary(val);
        }
    }

    fn do_adc_binary(&mut self, val: u8) {
        let a = self.regs.a;
        let carry = u16::from(self.regs.p.is_set(C));
        let sum = u16::from(a) + u16::from(val) + carry;
        let result = sum as u8;

        self.regs.p.set_if(C, sum > 0xFF);
        self.regs.p.set_if(V, (a ^ result) & (val ^ result) & 0x80 != 0);
        self.regs.a = result;
        self.regs.p.update_nz(result);
    }

    /// NMOS decimal add. Z comes from the binary sum; N and V from the
    /// sum after low-digit correction but before high-digit correction.
    fn do_adc_decimal(&mut self, val: u8) {
        let a = self.regs.a;
        let carry = u16::from(self.regs.p.is_set(C));

        let mut lo = u16::from(a & 0x0F) + u16::from(val & 0x0F) + carry;
        if lo >= 0x0A {
            lo = ((lo + 0x06) & 0x0F) + 0x10;
        }
        let mut sum = u16::from(a & 0xF0) + u16::from(val & 0xF0) + lo;

        let binary = (u16::from(a) + u16::from(val) + carry) as u8;
        self.regs.p.set_if(Z, binary == 0);
        self.regs.p.set_if(N, sum & 0x80 != 0);
        self.regs.p.set_if(V, !(a ^ val) & (a ^ sum as u8) & 0x80 != 0);

        if sum >= 0xA0 {
            sum += 0x60;
        }
        self.regs.p.set_if(C, sum >= 0x100);
        self.regs.a = sum as u8;
    }

    fn do_sbc(&mut self, val: u8) {
        if self.regs.p.is_set(D) {
            self.do_sbc_decimal(val);
        } else {
            // SBC is ADC with inverted operand
            self.do_adc_binary(!val);
        }
    }

    /// NMOS decimal subtract. All flags come from the binary result.
    fn do_sbc_decimal(&mut self, val: u8) {
        let a = self.regs.a;
        let borrow = i16::from(!self.regs.p.is_set(C));

        let binary = i16::from(a) - i16::from(val) - borrow;
        let bin_result = binary as u8;
        self.regs.p.set_if(C, binary >= 0);
        self.regs.p.update_nz(bin_result);
        self.regs.p.set_if(V, (a ^ val) & (a ^ bin_result) & 0x80 != 0);

        let mut lo = i16::from(a & 0x0F) - i16::from(val & 0x0F) - borrow;
        if lo < 0 {
            lo = ((lo - 0x06) & 0x0F) - 0x10;
        }
        let mut result = i16::from(a & 0xF0) - i16::from(val & 0xF0) + lo;
        if result < 0 {
            result -= 0x60;
        }
        self.regs.a = result as u8;
    }

    fn do_compare(&mut self, reg: u8, val: u8) {
        self.regs.p.set_if(C, reg >= val);
        self.regs.p.update_nz(reg.wrapping_sub(val));
    }

    fn do_bit(&mut self, val: u8) {
        self.regs.p.set_if(Z, self.regs.a & val == 0);
        self.regs.p.set_if(N, val & 0x80 != 0);
        self.regs.p.set_if(V, val & 0x40 != 0);
    }

    fn do_asl(&mut self, val: u8) -> u8 {
        self.regs.p.set_if(C, val & 0x80 != 0);
        let result = val << 1;
        self.regs.p.update_nz(result);
        result
    }

    fn do_lsr(&mut self, val: u8) -> u8 {
        self.regs.p.set_if(C, val & 0x01 != 0);
        let result = val >> 1;
        self.regs.p.update_nz(result);
        result
    }

    fn do_rol(&mut self, val: u8) -> u8 {
        let carry = u8::from(self.regs.p.is_set(C));
        self.regs.p.set_if(C, val & 0x80 != 0);
        let result = (val << 1) | carry;
        self.regs.p.update_nz(result);
        result
    }

    fn do_ror(&mut self, val: u8) -> u8 {
        let carry = if self.regs.p.is_set(C) { 0x80 } else { 0 };
        self.regs.p.set_if(C, val & 0x01 != 0);
        let result = (val >> 1) | carry;
        self.regs.p.update_nz(result);
        result
    }

    fn do_inc(&mut self, val: u8) -> u8 {
        let result = val.wrapping_add(1);
        self.regs.p.update_nz(result);
        result
    }

    fn do_dec(&mut self, val: u8) -> u8 {
        let result = val.wrapping_sub(1);
        self.regs.p.update_nz(result);
        result
    }
}

/// Add an index register to a base address, reporting page crossings.
fn index(base: u16, reg: u8) -> (u16, bool) {
    let addr = base.wrapping_add(u16::from(reg));
    (addr, addr & 0xFF00 != base & 0xFF00)
}

fn read_word<B: Bus>(bus: &mut B, addr: u16) -> u16 {
    let lo = bus.read(addr);
    let hi = bus.read(addr.wrapping_add(1));
    u16::from_le_bytes([lo, hi])
}

/// Pointer fetch from zero page; the high byte wraps within page 0.
fn read_zp_word<B: Bus>(bus: &mut B, zp: u8) -> u16 {
    let lo = bus.read(u16::from(zp));
    let hi = bus.read(u16::from(zp.wrapping_add(1)));
    u16::from_le_bytes([lo, hi])
}

// ============================================================================
// Trait implementations
// ============================================================================

impl Cpu for Mos6502 {
    type Registers = Registers;
    type Error = CpuError;

    fn step<B: Bus>(&mut self, bus: &mut B) -> Result<u32, CpuError> {
        Mos6502::step(self, bus)
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }

    fn registers(&self) -> Self::Registers {
        self.regs
    }

    fn cycles(&self) -> u64 {
        self.total_cycles
    }

    fn set_irq(&mut self, active: bool) {
        self.irq_line = active;
    }

    fn nmi(&mut self) {
        self.nmi_pending = true;
    }

    fn reset<B: Bus>(&mut self, bus: &mut B) {
        Mos6502::reset(self, bus);
    }
}

impl Observable for Mos6502 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.regs.pc.into()),
            "a" => Some(self.regs.a.into()),
            "x" => Some(self.regs.x.into()),
            "y" => Some(self.regs.y.into()),
            "s" | "sp" => Some(self.regs.s.into()),
            "p" | "status" => Some(self.regs.p.0.into()),
            "flags.c" | "c" => Some(self.regs.p.is_set(C).into()),
            "flags.z" | "z" => Some(self.regs.p.is_set(Z).into()),
            "flags.i" | "i" => Some(self.regs.p.is_set(I).into()),
            "flags.d" | "d" => Some(self.regs.p.is_set(D).into()),
            "flags.v" | "v" => Some(self.regs.p.is_set(V).into()),
            "flags.n" | "n" => Some(self.regs.p.is_set(N).into()),
            "cycles" => Some(Value::U64(self.total_cycles)),
            "nmi_pending" => Some(self.nmi_pending.into()),
            "irq_line" => Some(self.irq_line.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc",
            "a",
            "x",
            "y",
            "s",
            "p",
            "flags.c",
            "flags.z",
            "flags.i",
            "flags.d",
            "flags.v",
            "flags.n",
            "cycles",
            "nmi_pending",
            "irq_line",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::SimpleBus;

    fn setup(program: &[u8]) -> (Mos6502, SimpleBus) {
        let mut bus = SimpleBus::new();
        bus.load(0x0200, program);
        let mut cpu = Mos6502::new();
        cpu.regs.pc = 0x0200;
        (cpu, bus)
    }

    #[test]
    fn test_lda_immediate() {
        let (mut cpu, mut bus) = setup(&[0xA9, 0x42]);
        assert_eq!(cpu.step(&mut bus), Ok(2));
        assert_eq!(cpu.regs.a, 0x42);
        assert_eq!(cpu.regs.pc, 0x0202);
    }

    #[test]
    fn test_sta_zeropage() {
        let (mut cpu, mut bus) = setup(&[0x85, 0x10]);
        cpu.regs.a = 0x55;
        assert_eq!(cpu.step(&mut bus), Ok(3));
        assert_eq!(bus.peek(0x0010), 0x55);
    }

    #[test]
    fn test_jmp_indirect_page_wrap() {
        let (mut cpu, mut bus) = setup(&[0x6C, 0xFF, 0x30]);
        bus.write(0x30FF, 0x80);
        bus.write(0x3000, 0x40);
        bus.write(0x3100, 0x50);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.regs.pc, 0x4080);
    }

    #[test]
    fn test_indexed_read_page_penalty() {
        // LDA $20F0,X with X=$20 crosses into $21xx
        let (mut cpu, mut bus) = setup(&[0xBD, 0xF0, 0x20]);
        cpu.regs.x = 0x20;
        assert_eq!(cpu.step(&mut bus), Ok(5));
    }

    #[test]
    fn test_indexed_store_has_no_penalty() {
        let (mut cpu, mut bus) = setup(&[0x9D, 0xF0, 0x20]);
        cpu.regs.x = 0x20;
        assert_eq!(cpu.step(&mut bus), Ok(5));
        let (mut cpu, mut bus) = setup(&[0x9D, 0x00, 0x20]);
        cpu.regs.x = 0x01;
        assert_eq!(cpu.step(&mut bus), Ok(5));
    }

    #[test]
    fn test_zero_page_x_wraps() {
        let (mut cpu, mut bus) = setup(&[0xB5, 0xF0]);
        cpu.regs.x = 0x20;
        bus.write(0x0010, 0x99);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.regs.a, 0x99);
    }

    #[test]
    fn test_unknown_opcode_is_fatal() {
        let (mut cpu, mut bus) = setup(&[0x02]);
        let before = cpu.cycles();
        let err = cpu.step(&mut bus).unwrap_err();
        assert_eq!(
            err,
            CpuError::UnknownOpcode {
                opcode: 0x02,
                pc: 0x0200
            }
        );
        assert_eq!(cpu.regs.pc, 0x0200);
        assert_eq!(cpu.cycles(), before);
        // Still stuck on the next attempt
        assert!(cpu.step(&mut bus).is_err());
    }

    #[test]
    fn test_reset_loads_vector() {
        let mut bus = SimpleBus::new();
        bus.write(RESET_VECTOR, 0x34);
        bus.write(RESET_VECTOR + 1, 0x12);
        let mut cpu = Mos6502::new();
        cpu.regs.p.set(D);
        cpu.reset(&mut bus);
        assert_eq!(cpu.regs.pc, 0x1234);
        assert_eq!(cpu.regs.s, 0xFD);
        assert!(cpu.regs.p.is_set(I));
        assert!(!cpu.regs.p.is_set(D));
        assert_eq!(cpu.cycles(), 7);
    }

    #[test]
    fn test_run_until_stops_at_boundary() {
        // INX; INX; INX; JMP $0200
        let (mut cpu, mut bus) = setup(&[0xE8, 0xE8, 0xE8, 0x4C, 0x00, 0x02]);
        let report = cpu
            .run_until(&mut bus, 1_000, |cpu| cpu.regs.pc == 0x0203)
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::Stopped);
        assert_eq!(report.cycles, 6);
        assert_eq!(cpu.regs.x, 3);
    }

    #[test]
    fn test_run_until_budget() {
        let (mut cpu, mut bus) = setup(&[0x4C, 0x00, 0x02]);
        let report = cpu.run_until(&mut bus, 10, |_| false).unwrap();
        assert_eq!(report.outcome, RunOutcome::BudgetExhausted);
        // Overshoot is at most one instruction
        assert_eq!(report.cycles, 12);
    }

    #[test]
    fn test_observable_paths() {
        let (cpu, _) = setup(&[]);
        assert_eq!(cpu.query("pc"), Some(Value::U16(0x0200)));
        assert_eq!(cpu.query("flags.i"), Some(Value::Bool(true)));
        assert_eq!(cpu.query("nope"), None);
    }
}
