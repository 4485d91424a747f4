//! Microcode controller: stage counter, fetch sequence and instruction decode.

mod decode;
mod microcode;

pub use decode::{disassemble, Condition, DisassemblyRow, Instruction, ACCUMULATOR, PAIR_SP};

use crate::clocked::{Clocked, Wires};
use crate::control::{ControlWord, Signal};
use crate::fault::{HaltReason, SimError};
use crate::registers::RegisterSelect;

/// Operand of a `CALL` that is routed to the host instead of executed.
pub const SYSTEM_CALL_VECTOR: u16 = 0x0005;

/// Stage at which every instruction's own microcode starts.
pub const FIRST_EXECUTE_STAGE: u8 = 3;

/// System call raised by `CALL 0x0005`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SystemCall {
    /// Function number from register C.
    pub c: u8,
    /// Argument from register pair DE.
    pub de: u16,
}

/// Controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controller {
    word: ControlWord,
    stage: u8,
    stage_max: u8,
    stage_rst: bool,
    skip_call: bool,
    halt_reason: Option<HaltReason>,
    system_call: Option<SystemCall>,
}

impl Default for Controller {
    fn default() -> Self {
        Self {
            word: ControlWord::EMPTY,
            stage: 0,
            stage_max: 2,
            stage_rst: true,
            skip_call: false,
            halt_reason: None,
            system_call: None,
        }
    }
}

impl Controller {
    /// Control word decided at the last tock.
    #[must_use]
    pub const fn control_word(&self) -> ControlWord {
        self.word
    }

    /// Current execution stage; 0-2 are fetch.
    #[must_use]
    pub const fn stage(&self) -> u8 {
        self.stage
    }

    /// Last stage of the instruction being executed.
    #[must_use]
    pub const fn stage_max(&self) -> u8 {
        self.stage_max
    }

    /// Set on the last stage of an instruction; the next tock starts a fetch.
    #[must_use]
    pub const fn stage_rst(&self) -> bool {
        self.stage_rst
    }

    /// Set when a call was skipped (condition failed or system call).
    #[must_use]
    pub const fn skip_call(&self) -> bool {
        self.skip_call
    }

    /// Clears the skipped-call marker before a new step.
    pub const fn clear_skip_call(&mut self) {
        self.skip_call = false;
    }

    /// Why `HLT` was last asserted, if it has been.
    #[must_use]
    pub const fn halt_reason(&self) -> Option<HaltReason> {
        self.halt_reason
    }

    /// Takes the system call raised during the last tock, if any.
    pub const fn take_system_call(&mut self) -> Option<SystemCall> {
        self.system_call.take()
    }

    #[cfg(test)]
    pub(crate) fn force_control_word(&mut self, word: ControlWord) {
        self.word = word;
    }

    fn execute(&mut self, wires: &Wires) -> Result<(), SimError> {
        let instruction = Instruction::decode(wires.ir);
        self.stage_max = instruction.stage_max();
        match instruction {
            Instruction::Halt => self.halt(HaltReason::Instruction),
            Instruction::MoveFromMemory { dst } => self.move_from_memory(wires, dst),
            Instruction::MoveToMemory { src } => self.move_to_memory(wires, src),
            Instruction::Move { dst, src } => self.move_register(wires, dst, src),
            Instruction::MoveImmediateToMemory => self.move_immediate_to_memory(wires),
            Instruction::MoveImmediate { dst } => self.move_immediate(wires, dst),
            Instruction::StepMemory { decrement } => self.step_memory(wires, decrement),
            Instruction::StepRegister { reg, decrement } => {
                self.step_register(wires, reg, decrement)
            }
            Instruction::StepPair { pair, decrement } => self.step_pair(wires, pair, decrement),
            Instruction::LoadPairImmediate { pair } => self.load_pair_immediate(wires, pair),
            Instruction::AluMemory { op } => self.alu_memory(wires, op),
            Instruction::AluAccumulator { op } => self.alu_accumulator(wires, op),
            Instruction::AluRegister { op, src } => self.alu_register(wires, op, src),
            Instruction::AccumulatorOp { op } => self.accumulator_op(wires, op),
            Instruction::AluImmediate { op } => self.alu_immediate(wires, op),
            Instruction::Jump { condition } => self.jump(wires, condition),
            Instruction::Call { condition } => self.call(wires, condition),
            Instruction::Return { condition } => self.ret(wires, condition),
            Instruction::Output => self.output(wires),
            Instruction::Exchange => self.exchange(wires),
            Instruction::ExchangeStackTop => self.exchange_stack_top(wires),
            Instruction::JumpHl => self.jump_hl(wires),
            Instruction::Direct { load } => self.direct(wires, load),
            Instruction::Push { pair } => self.push(wires, pair),
            Instruction::Pop { pair } => self.pop(wires, pair),
            Instruction::AddPair { pair } => self.add_pair(wires, pair),
            Instruction::Indirect { pair, load } => self.indirect(wires, pair, load),
            Instruction::Unimplemented(opcode) => {
                let address = wires.pc.wrapping_sub(1);
                log::warn!(
                    "opcode {opcode:#05o} ({opcode:#04x}) at {address:#06x} is not implemented; halting"
                );
                self.halt(HaltReason::UnimplementedOpcode { opcode, address })
            }
        }
    }

    const fn invalid_stage(&self, wires: &Wires) -> SimError {
        SimError::InvalidStage {
            opcode: wires.ir,
            stage: self.stage,
            stage_max: self.stage_max,
        }
    }
}

impl Clocked for Controller {
    fn negedge(&mut self, _wires: &Wires) -> Result<(), SimError> {
        self.stage = if self.stage_rst {
            0
        } else {
            self.stage.saturating_add(1)
        };
        Ok(())
    }

    fn always(&mut self, wires: &Wires) -> Result<(), SimError> {
        self.word = ControlWord::EMPTY;
        self.stage_rst = false;
        match self.stage {
            0 => {
                self.mar_from(RegisterSelect::PC);
                Ok(())
            }
            1 => {
                self.set(Signal::MemOe);
                self.set(Signal::IrWe);
                Ok(())
            }
            2 => {
                self.pc_inc();
                Ok(())
            }
            _ => self.execute(wires),
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
