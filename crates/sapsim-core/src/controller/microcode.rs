//! Per-instruction stage machines. Every handler runs at stage 3 and above
//! and sets `stage_rst` on its final stage.

use super::{Condition, Controller, SystemCall, ACCUMULATOR, PAIR_SP, SYSTEM_CALL_VECTOR};
use crate::alu::AluOp;
use crate::clocked::Wires;
use crate::control::{RegExt, Signal};
use crate::fault::{HaltReason, SimError};
use crate::registers::RegisterSelect;

/// High byte select of an instruction's pair field.
const fn pair_high(pair: u8) -> RegisterSelect {
    RegisterSelect::byte(pair << 1)
}

/// Low byte select of an instruction's pair field.
const fn pair_low(pair: u8) -> RegisterSelect {
    RegisterSelect::from_bits((pair << 1) + 1)
}

// Control word building blocks.
impl Controller {
    pub(super) fn set(&mut self, signal: Signal) {
        self.word = self.word.with(signal);
    }

    fn finish(&mut self) {
        self.stage_rst = true;
    }

    fn extend(&mut self, select: RegisterSelect, ext: RegExt) {
        self.word = self.word.with_write_select(select).with_ext(ext);
    }

    pub(super) fn pc_inc(&mut self) {
        self.extend(RegisterSelect::PC, RegExt::Inc);
    }

    fn pc_skip_operand(&mut self) {
        self.extend(RegisterSelect::PC, RegExt::Inc2);
    }

    fn sp_inc(&mut self) {
        self.extend(RegisterSelect::SP, RegExt::Inc);
    }

    fn sp_dec(&mut self) {
        self.extend(RegisterSelect::SP, RegExt::Dec);
    }

    fn bus_from_reg(&mut self, select: RegisterSelect) {
        self.word = self.word.with_read_select(select);
        self.set(Signal::RegOe);
    }

    fn reg_from_bus(&mut self, select: RegisterSelect) {
        self.word = self.word.with_write_select(select);
        self.set(Signal::RegWe);
    }

    pub(super) fn mar_from(&mut self, select: RegisterSelect) {
        self.bus_from_reg(select);
        self.set(Signal::MemMarWe);
    }

    fn reg_from_mem(&mut self, select: RegisterSelect) {
        self.set(Signal::MemOe);
        self.reg_from_bus(select);
    }

    fn mem_from_reg(&mut self, select: RegisterSelect) {
        self.bus_from_reg(select);
        self.set(Signal::MemWe);
    }

    /// Drives a three-bit register field onto the bus; 7 is the accumulator.
    fn bus_from_reg3(&mut self, code: u8) {
        if code == ACCUMULATOR {
            self.set(Signal::AluOe);
        } else {
            self.bus_from_reg(RegisterSelect::byte(code));
        }
    }

    /// Writes the bus into a three-bit register field; 7 is the accumulator.
    fn reg3_from_bus(&mut self, code: u8) {
        if code == ACCUMULATOR {
            self.set(Signal::AluAWe);
        } else {
            self.reg_from_bus(RegisterSelect::byte(code));
        }
    }

    fn alu(&mut self, op: AluOp) {
        self.word = self.word.with_alu_op(op);
        self.set(Signal::AluCs);
    }

    /// Skips a call's address operand without pushing a frame.
    fn skip_call_operand(&mut self) {
        self.pc_skip_operand();
        self.finish();
        self.stage_max = 3;
        self.skip_call = true;
    }
}

// Instruction handlers.
impl Controller {
    pub(super) fn halt(&mut self, reason: HaltReason) -> Result<(), SimError> {
        self.set(Signal::Hlt);
        self.stage_max = 3;
        self.halt_reason = Some(reason);
        self.finish();
        Ok(())
    }

    pub(super) fn move_from_memory(&mut self, wires: &Wires, dst: u8) -> Result<(), SimError> {
        match self.stage {
            3 => self.mar_from(RegisterSelect::HL),
            4 => {
                self.set(Signal::MemOe);
                self.reg3_from_bus(dst);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn move_to_memory(&mut self, wires: &Wires, src: u8) -> Result<(), SimError> {
        match self.stage {
            3 => self.mar_from(RegisterSelect::HL),
            4 => {
                self.bus_from_reg3(src);
                self.set(Signal::MemWe);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn move_register(
        &mut self,
        wires: &Wires,
        dst: u8,
        src: u8,
    ) -> Result<(), SimError> {
        match self.stage {
            3 => {
                self.bus_from_reg3(src);
                self.reg3_from_bus(dst);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn move_immediate_to_memory(&mut self, wires: &Wires) -> Result<(), SimError> {
        match self.stage {
            3 => self.mar_from(RegisterSelect::PC),
            4 => self.reg_from_mem(RegisterSelect::W),
            5 => self.mar_from(RegisterSelect::HL),
            6 => self.mem_from_reg(RegisterSelect::W),
            7 => {
                self.pc_inc();
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn move_immediate(&mut self, wires: &Wires, dst: u8) -> Result<(), SimError> {
        match self.stage {
            3 => self.mar_from(RegisterSelect::PC),
            4 => {
                self.set(Signal::MemOe);
                self.reg3_from_bus(dst);
            }
            5 => {
                self.pc_inc();
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn step_memory(&mut self, wires: &Wires, decrement: bool) -> Result<(), SimError> {
        match self.stage {
            3 => self.mar_from(RegisterSelect::HL),
            4 => {
                self.set(Signal::MemOe);
                self.set(Signal::AluAStore);
                self.set(Signal::AluAWe);
            }
            5 => self.alu(step_op(decrement)),
            6 => {
                self.set(Signal::AluOe);
                self.set(Signal::AluARestore);
                self.set(Signal::MemWe);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn step_register(
        &mut self,
        wires: &Wires,
        reg: u8,
        decrement: bool,
    ) -> Result<(), SimError> {
        match self.stage {
            3 if reg == ACCUMULATOR => {
                self.alu(step_op(decrement));
                self.finish();
            }
            3 => {
                self.bus_from_reg(RegisterSelect::byte(reg));
                self.set(Signal::AluAStore);
                self.set(Signal::AluAWe);
            }
            4 if reg != ACCUMULATOR => self.alu(step_op(decrement)),
            5 if reg != ACCUMULATOR => {
                self.set(Signal::AluOe);
                self.set(Signal::AluARestore);
                self.reg_from_bus(RegisterSelect::byte(reg));
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn step_pair(
        &mut self,
        wires: &Wires,
        pair: u8,
        decrement: bool,
    ) -> Result<(), SimError> {
        match self.stage {
            3 => {
                let ext = if decrement { RegExt::Dec } else { RegExt::Inc };
                self.extend(RegisterSelect::pair_or_sp(pair), ext);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn load_pair_immediate(&mut self, wires: &Wires, pair: u8) -> Result<(), SimError> {
        match self.stage {
            3 | 6 => self.mar_from(RegisterSelect::PC),
            4 => self.reg_from_mem(RegisterSelect::Z),
            5 => self.pc_inc(),
            7 => self.reg_from_mem(RegisterSelect::W),
            8 => {
                self.bus_from_reg(RegisterSelect::WZ);
                self.reg_from_bus(RegisterSelect::pair_or_sp(pair));
            }
            9 => {
                self.pc_inc();
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn alu_memory(&mut self, wires: &Wires, op: AluOp) -> Result<(), SimError> {
        match self.stage {
            3 => self.mar_from(RegisterSelect::HL),
            4 => {
                self.set(Signal::MemOe);
                self.set(Signal::AluTmpWe);
            }
            5 => {
                self.alu(op);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn alu_accumulator(&mut self, wires: &Wires, op: AluOp) -> Result<(), SimError> {
        match self.stage {
            3 => {
                self.set(Signal::AluOe);
                self.set(Signal::AluTmpWe);
            }
            4 => {
                self.alu(op);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn alu_register(
        &mut self,
        wires: &Wires,
        op: AluOp,
        src: u8,
    ) -> Result<(), SimError> {
        match self.stage {
            3 => {
                self.bus_from_reg(RegisterSelect::byte(src));
                self.set(Signal::AluTmpWe);
            }
            4 => {
                self.alu(op);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn accumulator_op(&mut self, wires: &Wires, op: AluOp) -> Result<(), SimError> {
        match self.stage {
            3 => {
                self.alu(op);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn alu_immediate(&mut self, wires: &Wires, op: AluOp) -> Result<(), SimError> {
        match self.stage {
            3 => self.mar_from(RegisterSelect::PC),
            4 => {
                self.set(Signal::MemOe);
                self.set(Signal::AluTmpWe);
            }
            5 => {
                self.alu(op);
                self.pc_inc();
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn jump(
        &mut self,
        wires: &Wires,
        condition: Option<Condition>,
    ) -> Result<(), SimError> {
        match self.stage {
            3 if condition.is_some_and(|c| !c.holds(wires.alu_flags)) => {
                self.pc_skip_operand();
                self.finish();
            }
            3 | 6 => self.mar_from(RegisterSelect::PC),
            4 => self.reg_from_mem(RegisterSelect::Z),
            5 => self.pc_inc(),
            7 => self.reg_from_mem(RegisterSelect::W),
            8 => {
                self.bus_from_reg(RegisterSelect::WZ);
                self.reg_from_bus(RegisterSelect::PC);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn call(
        &mut self,
        wires: &Wires,
        condition: Option<Condition>,
    ) -> Result<(), SimError> {
        match self.stage {
            3 if wires.operand == SYSTEM_CALL_VECTOR => {
                self.system_call = Some(SystemCall {
                    c: wires.c,
                    de: wires.de,
                });
                self.skip_call_operand();
            }
            3 if condition.is_some_and(|c| !c.holds(wires.alu_flags)) => {
                self.skip_call_operand();
            }
            3 | 6 => self.mar_from(RegisterSelect::PC),
            4 => self.reg_from_mem(RegisterSelect::Z),
            5 | 8 => self.pc_inc(),
            7 => self.reg_from_mem(RegisterSelect::W),
            9 | 12 => self.sp_dec(),
            10 | 13 => self.mar_from(RegisterSelect::SP),
            11 => self.mem_from_reg(RegisterSelect::PCC),
            14 => self.mem_from_reg(RegisterSelect::PCP),
            15 => {
                self.bus_from_reg(RegisterSelect::WZ);
                self.reg_from_bus(RegisterSelect::PC);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn ret(
        &mut self,
        wires: &Wires,
        condition: Option<Condition>,
    ) -> Result<(), SimError> {
        match self.stage {
            3 if condition.is_some_and(|c| !c.holds(wires.alu_flags)) => self.finish(),
            3 | 6 => self.mar_from(RegisterSelect::SP),
            4 => self.reg_from_mem(RegisterSelect::W),
            5 | 8 => self.sp_inc(),
            7 => self.reg_from_mem(RegisterSelect::Z),
            9 => {
                self.bus_from_reg(RegisterSelect::WZ);
                self.reg_from_bus(RegisterSelect::PC);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn output(&mut self, wires: &Wires) -> Result<(), SimError> {
        match self.stage {
            3 => {
                self.pc_inc();
                self.set(Signal::Hlt);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn exchange(&mut self, wires: &Wires) -> Result<(), SimError> {
        let (from, to) = match self.stage {
            3 => (RegisterSelect::DE, RegisterSelect::WZ),
            4 => (RegisterSelect::HL, RegisterSelect::DE),
            5 => {
                self.finish();
                (RegisterSelect::WZ, RegisterSelect::HL)
            }
            _ => return Err(self.invalid_stage(wires)),
        };
        self.bus_from_reg(from);
        self.reg_from_bus(to);
        Ok(())
    }

    pub(super) fn exchange_stack_top(&mut self, wires: &Wires) -> Result<(), SimError> {
        match self.stage {
            3 => {
                self.bus_from_reg(RegisterSelect::HL);
                self.reg_from_bus(RegisterSelect::WZ);
            }
            4 | 8 => self.mar_from(RegisterSelect::SP),
            5 => self.reg_from_mem(RegisterSelect::L),
            6 => self.mem_from_reg(RegisterSelect::Z),
            7 => self.sp_inc(),
            9 => self.reg_from_mem(RegisterSelect::H),
            10 => self.mem_from_reg(RegisterSelect::W),
            11 => {
                self.sp_dec();
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn jump_hl(&mut self, wires: &Wires) -> Result<(), SimError> {
        match self.stage {
            3 => {
                self.bus_from_reg(RegisterSelect::HL);
                self.reg_from_bus(RegisterSelect::PC);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn direct(&mut self, wires: &Wires, load: bool) -> Result<(), SimError> {
        match self.stage {
            3 | 6 => self.mar_from(RegisterSelect::PC),
            4 => self.reg_from_mem(RegisterSelect::Z),
            5 | 8 => self.pc_inc(),
            7 => self.reg_from_mem(RegisterSelect::W),
            9 => self.mar_from(RegisterSelect::WZ),
            10 => {
                if load {
                    self.set(Signal::AluAWe);
                    self.set(Signal::MemOe);
                } else {
                    self.set(Signal::AluOe);
                    self.set(Signal::MemWe);
                }
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn push(&mut self, wires: &Wires, pair: u8) -> Result<(), SimError> {
        match self.stage {
            3 | 6 => self.sp_dec(),
            4 | 7 => self.mar_from(RegisterSelect::SP),
            5 => {
                if pair == PAIR_SP {
                    self.set(Signal::AluOe);
                } else {
                    self.bus_from_reg(pair_high(pair));
                }
                self.set(Signal::MemWe);
            }
            8 => {
                if pair == PAIR_SP {
                    self.set(Signal::AluFlagsOe);
                } else {
                    self.bus_from_reg(pair_low(pair));
                }
                self.set(Signal::MemWe);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn pop(&mut self, wires: &Wires, pair: u8) -> Result<(), SimError> {
        match self.stage {
            3 | 6 => self.mar_from(RegisterSelect::SP),
            4 => {
                if pair == PAIR_SP {
                    self.set(Signal::AluFlagsWe);
                } else {
                    self.reg_from_bus(pair_low(pair));
                }
                self.set(Signal::MemOe);
            }
            5 => self.sp_inc(),
            7 => {
                if pair == PAIR_SP {
                    self.set(Signal::AluAWe);
                } else {
                    self.reg_from_bus(pair_high(pair));
                }
                self.set(Signal::MemOe);
            }
            8 => {
                self.sp_inc();
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn add_pair(&mut self, wires: &Wires, pair: u8) -> Result<(), SimError> {
        match self.stage {
            3 => {
                self.bus_from_reg(RegisterSelect::L);
                self.set(Signal::AluAStore);
                self.set(Signal::AluAWe);
            }
            4 => {
                let low = if pair == PAIR_SP {
                    RegisterSelect::SPP
                } else {
                    pair_low(pair)
                };
                self.bus_from_reg(low);
                self.set(Signal::AluTmpWe);
            }
            5 => self.alu(AluOp::Add),
            6 => {
                self.reg_from_bus(RegisterSelect::Z);
                self.set(Signal::AluOe);
            }
            7 => {
                self.bus_from_reg(RegisterSelect::H);
                self.set(Signal::AluAWe);
            }
            8 => {
                let high = if pair == PAIR_SP {
                    RegisterSelect::SPS
                } else {
                    pair_high(pair)
                };
                self.bus_from_reg(high);
                self.set(Signal::AluTmpWe);
            }
            9 => self.alu(AluOp::Adc),
            10 => {
                self.reg_from_bus(RegisterSelect::W);
                self.set(Signal::AluOe);
                self.set(Signal::AluARestore);
            }
            11 => {
                self.bus_from_reg(RegisterSelect::WZ);
                self.reg_from_bus(RegisterSelect::HL);
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }

    pub(super) fn indirect(&mut self, wires: &Wires, pair: u8, load: bool) -> Result<(), SimError> {
        match self.stage {
            3 => {
                self.bus_from_reg(pair_high(pair));
                self.reg_from_bus(RegisterSelect::W);
            }
            4 => {
                self.bus_from_reg(pair_low(pair));
                self.reg_from_bus(RegisterSelect::Z);
            }
            5 => self.mar_from(RegisterSelect::WZ),
            6 => {}
            7 => {
                if load {
                    self.set(Signal::AluAWe);
                    self.set(Signal::MemOe);
                } else {
                    self.set(Signal::AluOe);
                    self.set(Signal::MemWe);
                }
                self.finish();
            }
            _ => return Err(self.invalid_stage(wires)),
        }
        Ok(())
    }
}

const fn step_op(decrement: bool) -> AluOp {
    if decrement {
        AluOp::Dcr
    } else {
        AluOp::Inr
    }
}
