//! 6502 interpreter core.
//!
//! The CPU executes one instruction per [`Cpu::step`] call and reports the
//! exact cycle cost, including page-cross and branch penalties. Interrupts
//! are delivered at instruction boundaries only, in RESET > NMI > IRQ
//! priority order: NMI is an edge that stays latched until serviced, IRQ is
//! a level sampled when the I flag allows it.

use crate::addressing::AddrMode;
use crate::bus::Bus;
use crate::error::CpuError;
use crate::opcodes::{Op, OPCODE_TABLE};
use crate::status::Status;

/// NMI vector address.
const NMI_VECTOR: u16 = 0xFFFA;
/// Reset vector address.
const RESET_VECTOR: u16 = 0xFFFC;
/// IRQ/BRK vector address.
const IRQ_VECTOR: u16 = 0xFFFE;

/// Resolved operand location for the current instruction.
#[derive(Debug, Clone, Copy)]
enum Operand {
    /// No operand (implied).
    None,
    /// The accumulator.
    Accum,
    /// A memory address.
    Addr(u16),
}

/// MOS 6502 CPU (2A03 variant: decimal mode is latched but ignored).
#[derive(Debug, Clone)]
pub struct Cpu {
    /// Accumulator.
    pub a: u8,
    /// X index register.
    pub x: u8,
    /// Y index register.
    pub y: u8,
    /// Program counter.
    pub pc: u16,
    /// Stack pointer (offset into $0100-$01FF).
    pub sp: u8,
    /// Status flags.
    pub status: Status,
    /// Total cycles executed since reset.
    pub cycles: u64,
    /// Latched NMI edge, consumed when serviced.
    nmi_pending: bool,
    /// Level-triggered IRQ line (APU frame counter, DMC, mapper).
    irq_line: bool,
    /// I flag as sampled at the previous instruction boundary. IRQ polling
    /// uses this value, giving CLI/SEI/PLP their one-instruction latency.
    prev_irq_inhibit: bool,
    /// Fault from a JAM opcode; sticky until reset.
    fault: Option<CpuError>,
}

impl Cpu {
    /// Create a CPU in its power-on state. `reset` must run before the
    /// first `step` so the PC is loaded from the reset vector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            sp: 0xFD,
            status: Status::new(),
            cycles: 0,
            nmi_pending: false,
            irq_line: false,
            prev_irq_inhibit: true,
            fault: None,
        }
    }

    /// Run the reset sequence: SP drops by 3 with no writes, I is set, PC
    /// loads from $FFFC-$FFFD, and the cycle counter starts from zero.
    pub fn reset(&mut self, bus: &mut impl Bus) {
        self.sp = self.sp.wrapping_sub(3);
        self.status.insert(Status::I);
        self.pc = bus.read_u16(RESET_VECTOR);
        self.cycles = 0;
        self.nmi_pending = false;
        self.irq_line = false;
        self.prev_irq_inhibit = true;
        self.fault = None;
    }

    /// Latch an NMI edge. The edge is remembered until serviced.
    pub fn request_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Drive the level-triggered IRQ line.
    pub fn set_irq_line(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    /// Whether the IRQ line is currently asserted.
    #[must_use]
    pub fn irq_line(&self) -> bool {
        self.irq_line
    }

    /// Whether an NMI edge is latched and waiting.
    #[must_use]
    pub fn nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    /// Account externally imposed stall cycles (OAM DMA, DMC fetches).
    pub fn add_cycles(&mut self, n: u64) {
        self.cycles += n;
    }

    /// Execute one instruction (or service one interrupt) and return the
    /// cycle cost.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::UnknownOpcode`] when the fetched opcode is a JAM
    /// slot. The PC is left pointing at the offending opcode and the error
    /// repeats on subsequent calls, leaving the machine halted but
    /// inspectable.
    pub fn step(&mut self, bus: &mut impl Bus) -> Result<u8, CpuError> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }

        // Sample I now; the IRQ poll below uses the value from the previous
        // boundary so flag changes take effect one instruction late.
        let irq_inhibit = self.status.contains(Status::I);

        if self.nmi_pending {
            self.nmi_pending = false;
            self.prev_irq_inhibit = true;
            return Ok(self.service_interrupt(bus, NMI_VECTOR));
        }

        if self.irq_line && !self.prev_irq_inhibit {
            self.prev_irq_inhibit = true;
            return Ok(self.service_interrupt(bus, IRQ_VECTOR));
        }

        self.prev_irq_inhibit = irq_inhibit;

        let opcode_addr = self.pc;
        let opcode = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);

        let info = &OPCODE_TABLE[opcode as usize];
        if info.op == Op::Jam {
            log::warn!("jam opcode {opcode:#04x} at {opcode_addr:#06x}");
            self.pc = opcode_addr;
            let err = CpuError::UnknownOpcode {
                pc: opcode_addr,
                opcode,
            };
            self.fault = Some(err);
            return Err(err);
        }

        let extra = self.execute(bus, info.op, info.mode, info.page_penalty);
        let total = info.cycles + extra;
        self.cycles += u64::from(total);
        Ok(total)
    }

    /// Push PC and status, set I, and jump through `vector`. 7 cycles.
    fn service_interrupt(&mut self, bus: &mut impl Bus, vector: u16) -> u8 {
        self.push_u16(bus, self.pc);
        self.push(bus, self.status.to_pushed(false));
        self.status.insert(Status::I);
        self.pc = bus.read_u16(vector);
        self.cycles += 7;
        7
    }

    // ---- stack helpers ----

    fn push(&mut self, bus: &mut impl Bus, value: u8) {
        bus.write(0x0100 | u16::from(self.sp), value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x0100 | u16::from(self.sp))
    }

    fn push_u16(&mut self, bus: &mut impl Bus, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, value as u8);
    }

    fn pull_u16(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = u16::from(self.pull(bus));
        let hi = u16::from(self.pull(bus));
        (hi << 8) | lo
    }

    // ---- operand resolution ----

    /// Compute the operand location. Returns the location and whether an
    /// indexed address crossed a page boundary.
    fn resolve(&mut self, bus: &mut impl Bus, mode: AddrMode) -> (Operand, bool) {
        match mode {
            AddrMode::Imp => (Operand::None, false),
            AddrMode::Acc => (Operand::Accum, false),
            AddrMode::Imm => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                (Operand::Addr(addr), false)
            }
            AddrMode::Zp0 => {
                let addr = u16::from(self.fetch(bus));
                (Operand::Addr(addr), false)
            }
            AddrMode::Zpx => {
                let base = self.fetch(bus);
                (Operand::Addr(u16::from(base.wrapping_add(self.x))), false)
            }
            AddrMode::Zpy => {
                let base = self.fetch(bus);
                (Operand::Addr(u16::from(base.wrapping_add(self.y))), false)
            }
            AddrMode::Abs => {
                let addr = self.fetch_u16(bus);
                (Operand::Addr(addr), false)
            }
            AddrMode::Abx => {
                let base = self.fetch_u16(bus);
                let addr = base.wrapping_add(u16::from(self.x));
                (Operand::Addr(addr), page_crossed(base, addr))
            }
            AddrMode::Aby => {
                let base = self.fetch_u16(bus);
                let addr = base.wrapping_add(u16::from(self.y));
                (Operand::Addr(addr), page_crossed(base, addr))
            }
            AddrMode::Ind => {
                let ptr = self.fetch_u16(bus);
                (Operand::Addr(bus.read_u16_wrapped(ptr)), false)
            }
            AddrMode::Idx => {
                let base = self.fetch(bus).wrapping_add(self.x);
                let addr = bus.read_u16_wrapped(u16::from(base));
                (Operand::Addr(addr), false)
            }
            AddrMode::Idy => {
                let ptr = self.fetch(bus);
                let base = bus.read_u16_wrapped(u16::from(ptr));
                let addr = base.wrapping_add(u16::from(self.y));
                (Operand::Addr(addr), page_crossed(base, addr))
            }
            AddrMode::Rel => {
                // Branch opcodes consume the offset themselves.
                unreachable!("relative mode resolved in branch handler")
            }
        }
    }

    fn fetch(&mut self, bus: &mut impl Bus) -> u8 {
        let value = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn fetch_u16(&mut self, bus: &mut impl Bus) -> u16 {
        let value = bus.read_u16(self.pc);
        self.pc = self.pc.wrapping_add(2);
        value
    }

    fn load(bus: &mut impl Bus, operand: Operand) -> u8 {
        match operand {
            Operand::Addr(addr) => bus.read(addr),
            Operand::Accum | Operand::None => unreachable!("load needs a memory operand"),
        }
    }

    // ---- instruction execution ----

    /// Execute `op` and return extra cycles beyond the table base.
    #[allow(clippy::too_many_lines)] // One arm per mnemonic keeps the decode flat.
    fn execute(&mut self, bus: &mut impl Bus, op: Op, mode: AddrMode, page_penalty: bool) -> u8 {
        // Branches handle their own operand and penalties.
        if mode == AddrMode::Rel {
            return self.branch(bus, op);
        }

        let (operand, crossed) = self.resolve(bus, mode);
        let penalty = u8::from(page_penalty && crossed);

        match op {
            // Loads and stores
            Op::Lda => {
                self.a = Self::load(bus, operand);
                self.status.set_zn(self.a);
                penalty
            }
            Op::Ldx => {
                self.x = Self::load(bus, operand);
                self.status.set_zn(self.x);
                penalty
            }
            Op::Ldy => {
                self.y = Self::load(bus, operand);
                self.status.set_zn(self.y);
                penalty
            }
            Op::Sta => {
                self.store(bus, operand, self.a);
                0
            }
            Op::Stx => {
                self.store(bus, operand, self.x);
                0
            }
            Op::Sty => {
                self.store(bus, operand, self.y);
                0
            }

            // Transfers
            Op::Tax => {
                self.x = self.a;
                self.status.set_zn(self.x);
                0
            }
            Op::Tay => {
                self.y = self.a;
                self.status.set_zn(self.y);
                0
            }
            Op::Tsx => {
                self.x = self.sp;
                self.status.set_zn(self.x);
                0
            }
            Op::Txa => {
                self.a = self.x;
                self.status.set_zn(self.a);
                0
            }
            Op::Txs => {
                self.sp = self.x;
                0
            }
            Op::Tya => {
                self.a = self.y;
                self.status.set_zn(self.a);
                0
            }

            // Arithmetic
            Op::Adc => {
                let value = Self::load(bus, operand);
                self.adc(value);
                penalty
            }
            Op::Sbc => {
                let value = Self::load(bus, operand);
                self.adc(!value);
                penalty
            }
            Op::Cmp => {
                let value = Self::load(bus, operand);
                self.compare(self.a, value);
                penalty
            }
            Op::Cpx => {
                let value = Self::load(bus, operand);
                self.compare(self.x, value);
                0
            }
            Op::Cpy => {
                let value = Self::load(bus, operand);
                self.compare(self.y, value);
                0
            }

            // Logic
            Op::And => {
                self.a &= Self::load(bus, operand);
                self.status.set_zn(self.a);
                penalty
            }
            Op::Ora => {
                self.a |= Self::load(bus, operand);
                self.status.set_zn(self.a);
                penalty
            }
            Op::Eor => {
                self.a ^= Self::load(bus, operand);
                self.status.set_zn(self.a);
                penalty
            }
            Op::Bit => {
                let value = Self::load(bus, operand);
                self.status.set(Status::Z, self.a & value == 0);
                self.status.set(Status::N, value & 0x80 != 0);
                self.status.set(Status::V, value & 0x40 != 0);
                0
            }

            // Shifts and rotates
            Op::Asl => {
                self.read_modify_write(bus, operand, Self::asl);
                0
            }
            Op::Lsr => {
                self.read_modify_write(bus, operand, Self::lsr);
                0
            }
            Op::Rol => {
                self.read_modify_write(bus, operand, Self::rol);
                0
            }
            Op::Ror => {
                self.read_modify_write(bus, operand, Self::ror);
                0
            }

            // Increments and decrements
            Op::Inc => {
                self.read_modify_write(bus, operand, |cpu, v| {
                    let r = v.wrapping_add(1);
                    cpu.status.set_zn(r);
                    r
                });
                0
            }
            Op::Dec => {
                self.read_modify_write(bus, operand, |cpu, v| {
                    let r = v.wrapping_sub(1);
                    cpu.status.set_zn(r);
                    r
                });
                0
            }
            Op::Inx => {
                self.x = self.x.wrapping_add(1);
                self.status.set_zn(self.x);
                0
            }
            Op::Iny => {
                self.y = self.y.wrapping_add(1);
                self.status.set_zn(self.y);
                0
            }
            Op::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.status.set_zn(self.x);
                0
            }
            Op::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.status.set_zn(self.y);
                0
            }

            // Jumps and subroutines
            Op::Jmp => {
                if let Operand::Addr(addr) = operand {
                    self.pc = addr;
                }
                0
            }
            Op::Jsr => {
                if let Operand::Addr(addr) = operand {
                    self.push_u16(bus, self.pc.wrapping_sub(1));
                    self.pc = addr;
                }
                0
            }
            Op::Rts => {
                self.pc = self.pull_u16(bus).wrapping_add(1);
                0
            }

            // Interrupt instructions
            Op::Brk => {
                // BRK is two bytes; the padding byte is skipped by the push.
                self.push_u16(bus, self.pc.wrapping_add(1));
                self.push(bus, self.status.to_pushed(true));
                self.status.insert(Status::I);
                self.pc = bus.read_u16(IRQ_VECTOR);
                0
            }
            Op::Rti => {
                let pulled = self.pull(bus);
                self.status = Status::from_pulled(pulled);
                self.pc = self.pull_u16(bus);
                0
            }

            // Stack
            Op::Pha => {
                self.push(bus, self.a);
                0
            }
            Op::Php => {
                self.push(bus, self.status.to_pushed(true));
                0
            }
            Op::Pla => {
                self.a = self.pull(bus);
                self.status.set_zn(self.a);
                0
            }
            Op::Plp => {
                let pulled = self.pull(bus);
                self.status = Status::from_pulled(pulled);
                0
            }

            // Flag operations
            Op::Clc => {
                self.status.remove(Status::C);
                0
            }
            Op::Cld => {
                self.status.remove(Status::D);
                0
            }
            Op::Cli => {
                self.status.remove(Status::I);
                0
            }
            Op::Clv => {
                self.status.remove(Status::V);
                0
            }
            Op::Sec => {
                self.status.insert(Status::C);
                0
            }
            Op::Sed => {
                self.status.insert(Status::D);
                0
            }
            Op::Sei => {
                self.status.insert(Status::I);
                0
            }

            Op::Nop => {
                // Unofficial NOPs with a memory operand still perform the read.
                if let Operand::Addr(addr) = operand {
                    let _ = bus.read(addr);
                }
                penalty
            }

            // Unofficial instructions
            Op::Lax => {
                let value = Self::load(bus, operand);
                self.a = value;
                self.x = value;
                self.status.set_zn(value);
                penalty
            }
            Op::Sax => {
                self.store(bus, operand, self.a & self.x);
                0
            }
            Op::Dcp => {
                let value = self.read_modify_write(bus, operand, |_, v| v.wrapping_sub(1));
                self.compare(self.a, value);
                0
            }
            Op::Isc => {
                let value = self.read_modify_write(bus, operand, |_, v| v.wrapping_add(1));
                self.adc(!value);
                0
            }
            Op::Slo => {
                let value = self.read_modify_write(bus, operand, Self::asl);
                self.a |= value;
                self.status.set_zn(self.a);
                0
            }
            Op::Rla => {
                let value = self.read_modify_write(bus, operand, Self::rol);
                self.a &= value;
                self.status.set_zn(self.a);
                0
            }
            Op::Sre => {
                let value = self.read_modify_write(bus, operand, Self::lsr);
                self.a ^= value;
                self.status.set_zn(self.a);
                0
            }
            Op::Rra => {
                let value = self.read_modify_write(bus, operand, Self::ror);
                self.adc(value);
                0
            }
            Op::Anc => {
                self.a &= Self::load(bus, operand);
                self.status.set_zn(self.a);
                self.status.set(Status::C, self.a & 0x80 != 0);
                0
            }
            Op::Alr => {
                self.a &= Self::load(bus, operand);
                self.a = self.lsr(self.a);
                0
            }
            Op::Arr => {
                self.a &= Self::load(bus, operand);
                let carry_in = u8::from(self.status.contains(Status::C)) << 7;
                self.a = (self.a >> 1) | carry_in;
                self.status.set_zn(self.a);
                self.status.set(Status::C, self.a & 0x40 != 0);
                let bit6 = (self.a >> 6) & 1;
                let bit5 = (self.a >> 5) & 1;
                self.status.set(Status::V, bit6 ^ bit5 != 0);
                0
            }
            Op::Sbx => {
                let value = Self::load(bus, operand);
                let operand_ax = self.a & self.x;
                self.status.set(Status::C, operand_ax >= value);
                self.x = operand_ax.wrapping_sub(value);
                self.status.set_zn(self.x);
                0
            }
            Op::Las => {
                let value = Self::load(bus, operand) & self.sp;
                self.a = value;
                self.x = value;
                self.sp = value;
                self.status.set_zn(value);
                penalty
            }
            Op::Ane => {
                // Unstable on hardware; A & X & operand is the common model.
                let value = Self::load(bus, operand);
                self.a = self.a & self.x & value;
                self.status.set_zn(self.a);
                0
            }
            Op::Sha => {
                self.store_high_and(bus, operand, self.a & self.x);
                0
            }
            Op::Shx => {
                self.store_high_and(bus, operand, self.x);
                0
            }
            Op::Shy => {
                self.store_high_and(bus, operand, self.y);
                0
            }
            Op::Tas => {
                self.sp = self.a & self.x;
                self.store_high_and(bus, operand, self.sp);
                0
            }

            // Branches are dispatched earlier; JAM never reaches execute.
            Op::Bcc | Op::Bcs | Op::Beq | Op::Bmi | Op::Bne | Op::Bpl | Op::Bvc | Op::Bvs
            | Op::Jam => unreachable!(),
        }
    }

    /// Execute a branch instruction: +1 cycle when taken, +1 more when the
    /// target sits on a different page than the instruction that follows.
    fn branch(&mut self, bus: &mut impl Bus, op: Op) -> u8 {
        let offset = self.fetch(bus) as i8;
        let taken = match op {
            Op::Bcc => !self.status.contains(Status::C),
            Op::Bcs => self.status.contains(Status::C),
            Op::Bne => !self.status.contains(Status::Z),
            Op::Beq => self.status.contains(Status::Z),
            Op::Bpl => !self.status.contains(Status::N),
            Op::Bmi => self.status.contains(Status::N),
            Op::Bvc => !self.status.contains(Status::V),
            Op::Bvs => self.status.contains(Status::V),
            _ => unreachable!("non-branch op with relative mode"),
        };
        if !taken {
            return 0;
        }
        let target = self.pc.wrapping_add(offset as u16);
        let extra = 1 + u8::from(page_crossed(self.pc, target));
        self.pc = target;
        extra
    }

    fn store(&mut self, bus: &mut impl Bus, operand: Operand, value: u8) {
        if let Operand::Addr(addr) = operand {
            bus.write(addr, value);
        }
    }

    /// The SHA/SHX/SHY/TAS family stores `value & (addr_high + 1)`.
    fn store_high_and(&mut self, bus: &mut impl Bus, operand: Operand, value: u8) {
        if let Operand::Addr(addr) = operand {
            let high = (addr >> 8) as u8;
            bus.write(addr, value & high.wrapping_add(1));
        }
    }

    /// Apply `f` to the operand in place and return the new value.
    fn read_modify_write(
        &mut self,
        bus: &mut impl Bus,
        operand: Operand,
        f: impl Fn(&mut Self, u8) -> u8,
    ) -> u8 {
        match operand {
            Operand::Accum => {
                let result = f(self, self.a);
                self.a = result;
                result
            }
            Operand::Addr(addr) => {
                let value = bus.read(addr);
                let result = f(self, value);
                bus.write(addr, result);
                result
            }
            Operand::None => unreachable!("RMW needs an operand"),
        }
    }

    /// Binary-mode add with carry; D is ignored on the 2A03.
    fn adc(&mut self, value: u8) {
        let carry = u16::from(self.status.contains(Status::C));
        let sum = u16::from(self.a) + u16::from(value) + carry;
        let result = sum as u8;
        self.status.set(Status::C, sum > 0xFF);
        self.status
            .set(Status::V, (!(self.a ^ value) & (self.a ^ result)) & 0x80 != 0);
        self.a = result;
        self.status.set_zn(result);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.status.set(Status::C, register >= value);
        self.status.set_zn(register.wrapping_sub(value));
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.status.set(Status::C, value & 0x80 != 0);
        let result = value << 1;
        self.status.set_zn(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.status.set(Status::C, value & 0x01 != 0);
        let result = value >> 1;
        self.status.set_zn(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.status.contains(Status::C));
        self.status.set(Status::C, value & 0x80 != 0);
        let result = (value << 1) | carry_in;
        self.status.set_zn(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.status.contains(Status::C)) << 7;
        self.status.set(Status::C, value & 0x01 != 0);
        let result = (value >> 1) | carry_in;
        self.status.set_zn(result);
        result
    }

}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn page_crossed(a: u16, b: u16) -> bool {
    a & 0xFF00 != b & 0xFF00
}
