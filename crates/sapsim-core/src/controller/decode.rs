//! Opcode decoding by octal bit fields.
//!
//! An opcode splits into `class` (bits 7-6), `dst` (bits 5-3) and `src`
//! (bits 2-0). Patterns below are written in that order; the first match wins.

use core::fmt;

use crate::alu::AluOp;
use crate::memory::Memory;

const REGISTER_NAMES: [&str; 8] = ["B", "C", "D", "E", "H", "L", "M", "A"];
const PAIR_NAMES: [&str; 4] = ["B", "D", "H", "SP"];
const STACK_PAIR_NAMES: [&str; 4] = ["B", "D", "H", "PSW"];
const CONDITION_NAMES: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];

/// Register field value naming the accumulator.
pub const ACCUMULATOR: u8 = 0b111;
/// Two-bit pair field value naming SP (or PSW for push/pop).
pub const PAIR_SP: u8 = 0b11;

/// Branch condition from an opcode's `dst` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Condition {
    /// Flag bit index tested (0 zero, 1 carry, 2 parity, 3 sign).
    pub flag: u8,
    /// Required flag value.
    pub expected: bool,
}

impl Condition {
    /// Decodes the three-bit condition field.
    #[must_use]
    pub const fn from_field(field: u8) -> Self {
        Self {
            flag: (field >> 1) & 0b11,
            expected: field & 1 == 1,
        }
    }

    /// Returns `true` when `flags` satisfies the condition.
    #[must_use]
    pub const fn holds(self, flags: u8) -> bool {
        ((flags >> self.flag) & 1 == 1) == self.expected
    }

    #[allow(clippy::cast_lossless)]
    const fn name(self) -> &'static str {
        CONDITION_NAMES[((self.flag << 1) | self.expected as u8) as usize]
    }
}

/// Decoded instruction form with its operand fields.
///
/// Register fields use the opcode encoding (0-5 B..L, 6 M, 7 A); pair fields
/// use 0 BC, 1 DE, 2 HL, 3 SP or PSW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// `HLT`.
    Halt,
    /// `MOV r,M`.
    MoveFromMemory {
        /// Destination register field.
        dst: u8,
    },
    /// `MOV M,r`.
    MoveToMemory {
        /// Source register field.
        src: u8,
    },
    /// `MOV r,r`.
    Move {
        /// Destination register field.
        dst: u8,
        /// Source register field.
        src: u8,
    },
    /// `MVI M,d8`.
    MoveImmediateToMemory,
    /// `MVI r,d8`.
    MoveImmediate {
        /// Destination register field.
        dst: u8,
    },
    /// `INR M` / `DCR M`.
    StepMemory {
        /// `DCR` when set.
        decrement: bool,
    },
    /// `INR r` / `DCR r`.
    StepRegister {
        /// Register field.
        reg: u8,
        /// `DCR` when set.
        decrement: bool,
    },
    /// `INX rp` / `DCX rp`.
    StepPair {
        /// Pair field.
        pair: u8,
        /// `DCX` when set.
        decrement: bool,
    },
    /// `LXI rp,d16`.
    LoadPairImmediate {
        /// Pair field.
        pair: u8,
    },
    /// Two-operand ALU op with memory at HL.
    AluMemory {
        /// Operation.
        op: AluOp,
    },
    /// Two-operand ALU op with the accumulator as operand.
    AluAccumulator {
        /// Operation.
        op: AluOp,
    },
    /// Two-operand ALU op with a register operand.
    AluRegister {
        /// Operation.
        op: AluOp,
        /// Source register field.
        src: u8,
    },
    /// Rotates, `DAA`, `CMA`, `STC`, `CMC`.
    AccumulatorOp {
        /// Operation.
        op: AluOp,
    },
    /// Two-operand ALU op with an immediate byte.
    AluImmediate {
        /// Operation.
        op: AluOp,
    },
    /// `JMP a16` or `Jcc a16`.
    Jump {
        /// Condition, or `None` for unconditional.
        condition: Option<Condition>,
    },
    /// `CALL a16` or `Ccc a16`.
    Call {
        /// Condition, or `None` for unconditional.
        condition: Option<Condition>,
    },
    /// `RET` or `Rcc`.
    Return {
        /// Condition, or `None` for unconditional.
        condition: Option<Condition>,
    },
    /// `OUT d8`.
    Output,
    /// `XCHG`.
    Exchange,
    /// `XTHL`.
    ExchangeStackTop,
    /// `PCHL`.
    JumpHl,
    /// `STA a16` / `LDA a16`.
    Direct {
        /// `LDA` when set.
        load: bool,
    },
    /// `PUSH rp`.
    Push {
        /// Pair field (3 is PSW).
        pair: u8,
    },
    /// `POP rp`.
    Pop {
        /// Pair field (3 is PSW).
        pair: u8,
    },
    /// `DAD rp`.
    AddPair {
        /// Pair field.
        pair: u8,
    },
    /// `STAX rp` / `LDAX rp`.
    Indirect {
        /// Pair field (BC or DE).
        pair: u8,
        /// `LDAX` when set.
        load: bool,
    },
    /// Opcode without microcode.
    Unimplemented(u8),
}

impl Instruction {
    /// Decodes one opcode.
    #[must_use]
    pub const fn decode(opcode: u8) -> Self {
        let class = opcode >> 6;
        let dst = (opcode >> 3) & 0b111;
        let src = opcode & 0b111;
        let pair = dst >> 1;
        let bit3 = dst & 1 == 1;

        match (class, dst, src) {
            (1, 6, 6) => Self::Halt,
            (1, _, 6) => Self::MoveFromMemory { dst },
            (1, 6, _) => Self::MoveToMemory { src },
            (1, _, _) => Self::Move { dst, src },
            (0, 6, 6) => Self::MoveImmediateToMemory,
            (0, _, 6) => Self::MoveImmediate { dst },
            (0, 6, 4 | 5) => Self::StepMemory {
                decrement: src == 5,
            },
            (0, _, 4 | 5) => Self::StepRegister {
                reg: dst,
                decrement: src == 5,
            },
            (0, _, 3) => Self::StepPair {
                pair,
                decrement: bit3,
            },
            (0, 0 | 2 | 4 | 6, 1) => Self::LoadPairImmediate { pair },
            (2, _, 6) => Self::AluMemory {
                op: AluOp::arithmetic(dst),
            },
            (2, _, 7) => Self::AluAccumulator {
                op: AluOp::arithmetic(dst),
            },
            (2, _, _) => Self::AluRegister {
                op: AluOp::arithmetic(dst),
                src,
            },
            (0, _, 7) => Self::AccumulatorOp {
                op: AluOp::accumulator(dst),
            },
            (3, _, 6) => Self::AluImmediate {
                op: AluOp::arithmetic(dst),
            },
            (3, _, 2) => Self::Jump {
                condition: Some(Condition::from_field(dst)),
            },
            (3, 0, 3) => Self::Jump { condition: None },
            (3, _, 4) => Self::Call {
                condition: Some(Condition::from_field(dst)),
            },
            (3, 1, 5) => Self::Call { condition: None },
            (3, _, 0) => Self::Return {
                condition: Some(Condition::from_field(dst)),
            },
            (3, 1, 1) => Self::Return { condition: None },
            (3, 2, 3) => Self::Output,
            (3, 5, 3) => Self::Exchange,
            (3, 4, 3) => Self::ExchangeStackTop,
            (3, 5, 1) => Self::JumpHl,
            (0, 6 | 7, 2) => Self::Direct { load: bit3 },
            (3, _, 5) => Self::Push { pair },
            (3, 0 | 2 | 4 | 6, 1) => Self::Pop { pair },
            (0, 1 | 3 | 5 | 7, 1) => Self::AddPair { pair },
            (0, 0..=3, 2) => Self::Indirect { pair, load: bit3 },
            _ => Self::Unimplemented(opcode),
        }
    }

    /// Last execution stage, counting the three fetch stages.
    ///
    /// Conditional calls that are not taken finish early at stage 3.
    #[must_use]
    pub const fn stage_max(self) -> u8 {
        match self {
            Self::Halt
            | Self::Move { .. }
            | Self::StepPair { .. }
            | Self::AccumulatorOp { .. }
            | Self::Output
            | Self::JumpHl
            | Self::Unimplemented(_) => 3,
            Self::StepRegister { reg, .. } => {
                if reg == ACCUMULATOR {
                    3
                } else {
                    5
                }
            }
            Self::MoveFromMemory { .. }
            | Self::MoveToMemory { .. }
            | Self::AluAccumulator { .. }
            | Self::AluRegister { .. } => 4,
            Self::MoveImmediate { .. }
            | Self::AluMemory { .. }
            | Self::AluImmediate { .. }
            | Self::Exchange => 5,
            Self::StepMemory { .. } => 6,
            Self::MoveImmediateToMemory | Self::Indirect { .. } => 7,
            Self::Jump { .. } | Self::Push { .. } | Self::Pop { .. } => 8,
            Self::LoadPairImmediate { .. } | Self::Return { .. } => 9,
            Self::Direct { .. } => 10,
            Self::ExchangeStackTop | Self::AddPair { .. } => 11,
            Self::Call { .. } => 15,
        }
    }

    /// Encoded length in bytes, opcode included.
    #[must_use]
    pub const fn byte_len(self) -> u16 {
        match self {
            Self::MoveImmediateToMemory
            | Self::MoveImmediate { .. }
            | Self::AluImmediate { .. }
            | Self::Output => 2,
            Self::LoadPairImmediate { .. }
            | Self::Jump { .. }
            | Self::Call { .. }
            | Self::Direct { .. } => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reg = |code: u8| REGISTER_NAMES[usize::from(code & 0b111)];
        match *self {
            Self::Halt => f.write_str("HLT"),
            Self::MoveFromMemory { dst } => write!(f, "MOV {},M", reg(dst)),
            Self::MoveToMemory { src } => write!(f, "MOV M,{}", reg(src)),
            Self::Move { dst, src } => write!(f, "MOV {},{}", reg(dst), reg(src)),
            Self::MoveImmediateToMemory => f.write_str("MVI M"),
            Self::MoveImmediate { dst } => write!(f, "MVI {}", reg(dst)),
            Self::StepMemory { decrement } => {
                f.write_str(if decrement { "DCR M" } else { "INR M" })
            }
            Self::StepRegister { reg: code, decrement } => {
                let name = if decrement { "DCR" } else { "INR" };
                write!(f, "{name} {}", reg(code))
            }
            Self::StepPair { pair, decrement } => {
                let name = if decrement { "DCX" } else { "INX" };
                write!(f, "{name} {}", PAIR_NAMES[usize::from(pair & 3)])
            }
            Self::LoadPairImmediate { pair } => {
                write!(f, "LXI {}", PAIR_NAMES[usize::from(pair & 3)])
            }
            Self::AluMemory { op } => write!(f, "{} M", op.mnemonic()),
            Self::AluAccumulator { op } => write!(f, "{} A", op.mnemonic()),
            Self::AluRegister { op, src } => write!(f, "{} {}", op.mnemonic(), reg(src)),
            Self::AccumulatorOp { op } => f.write_str(op.mnemonic()),
            Self::AluImmediate { op } => f.write_str(immediate_mnemonic(op)),
            Self::Jump { condition } => branch(f, "JMP", "J", condition),
            Self::Call { condition } => branch(f, "CALL", "C", condition),
            Self::Return { condition } => branch(f, "RET", "R", condition),
            Self::Output => f.write_str("OUT"),
            Self::Exchange => f.write_str("XCHG"),
            Self::ExchangeStackTop => f.write_str("XTHL"),
            Self::JumpHl => f.write_str("PCHL"),
            Self::Direct { load } => f.write_str(if load { "LDA" } else { "STA" }),
            Self::Push { pair } => write!(f, "PUSH {}", STACK_PAIR_NAMES[usize::from(pair & 3)]),
            Self::Pop { pair } => write!(f, "POP {}", STACK_PAIR_NAMES[usize::from(pair & 3)]),
            Self::AddPair { pair } => write!(f, "DAD {}", PAIR_NAMES[usize::from(pair & 3)]),
            Self::Indirect { pair, load } => {
                let name = if load { "LDAX" } else { "STAX" };
                write!(f, "{name} {}", PAIR_NAMES[usize::from(pair & 3)])
            }
            Self::Unimplemented(opcode) => write!(f, "DB {opcode:#04x}"),
        }
    }
}

fn branch(
    f: &mut fmt::Formatter<'_>,
    unconditional: &str,
    prefix: &str,
    condition: Option<Condition>,
) -> fmt::Result {
    match condition {
        Some(condition) => write!(f, "{prefix}{}", condition.name()),
        None => f.write_str(unconditional),
    }
}

const fn immediate_mnemonic(op: AluOp) -> &'static str {
    match op {
        AluOp::Add => "ADI",
        AluOp::Adc => "ACI",
        AluOp::Sub => "SUI",
        AluOp::Sbb => "SBI",
        AluOp::Ana => "ANI",
        AluOp::Xra => "XRI",
        AluOp::Ora => "ORI",
        _ => "CPI",
    }
}

/// One disassembled instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DisassemblyRow {
    /// Address of the opcode.
    pub address: u16,
    /// Length in bytes.
    pub len: u16,
    /// Assembly text with immediates rendered in hex.
    pub text: String,
}

/// Disassembles the instruction at `address`.
#[must_use]
pub fn disassemble(memory: &Memory, address: u16) -> DisassemblyRow {
    let instruction = Instruction::decode(memory.read(address));
    let operand = address.wrapping_add(1);
    let text = match instruction {
        Instruction::MoveImmediate { .. } | Instruction::MoveImmediateToMemory => {
            format!("{instruction},{:#04x}", memory.read(operand))
        }
        Instruction::LoadPairImmediate { .. } => {
            format!("{instruction},{:#06x}", memory.read_word(operand))
        }
        _ => match instruction.byte_len() {
            2 => format!("{instruction} {:#04x}", memory.read(operand)),
            3 => format!("{instruction} {:#06x}", memory.read_word(operand)),
            _ => instruction.to_string(),
        },
    };
    DisassemblyRow {
        address,
        len: instruction.byte_len(),
        text,
    }
}
