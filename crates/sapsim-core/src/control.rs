//! The 32-bit control word the controller rebuilds on every tock.
//!
//! Bit layout, msb first:
//!
//! | bits | field |
//! |------|-------|
//! | 31 | `HLT` |
//! | 30 | `ALU_CS` |
//! | 29 | `ALU_FLAGS_WE` |
//! | 28 | `ALU_A_WE` |
//! | 27 | `ALU_A_STORE` |
//! | 26 | `ALU_A_RESTORE` |
//! | 25 | `ALU_TMP_WE` |
//! | 24..20 | `ALU_OP` |
//! | 19 | `ALU_OE` |
//! | 18 | `ALU_FLAGS_OE` |
//! | 17..13 | `REG_RD_SEL` |
//! | 12..8 | `REG_WR_SEL` |
//! | 7..6 | `REG_EXT` |
//! | 5 | `REG_OE` |
//! | 4 | `REG_WE` |
//! | 3 | `MEM_WE` |
//! | 2 | `MEM_MAR_WE` |
//! | 1 | `MEM_OE` |
//! | 0 | `IR_WE` |

use core::fmt;

use crate::alu::AluOp;
use crate::registers::RegisterSelect;

const ALU_OP_SHIFT: u32 = 20;
const REG_RD_SEL_SHIFT: u32 = 13;
const REG_WR_SEL_SHIFT: u32 = 8;
const REG_EXT_SHIFT: u32 = 6;
const FIVE_BITS: u32 = 0b1_1111;
const TWO_BITS: u32 = 0b11;

/// Single-bit control signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Signal {
    /// Halt, or output when `REG_EXT` bit 0 is also set.
    Hlt = 31,
    /// Execute `ALU_OP` on the accumulator.
    AluCs = 30,
    /// Load the flag register from the bus.
    AluFlagsWe = 29,
    /// Load the accumulator from the bus.
    AluAWe = 28,
    /// Copy the accumulator into the shadow register.
    AluAStore = 27,
    /// Copy the shadow register back into the accumulator.
    AluARestore = 26,
    /// Load the operand latch from the bus.
    AluTmpWe = 25,
    /// Drive the accumulator onto the bus.
    AluOe = 19,
    /// Drive the flag register onto the bus.
    AluFlagsOe = 18,
    /// Drive the selected register onto the bus.
    RegOe = 5,
    /// Write the bus into the selected register.
    RegWe = 4,
    /// Write the bus low byte into memory at MAR.
    MemWe = 3,
    /// Load MAR from the bus.
    MemMarWe = 2,
    /// Drive `ram[MAR]` onto the bus.
    MemOe = 1,
    /// Latch the bus into the instruction register.
    IrWe = 0,
}

impl Signal {
    /// Bit mask of this signal within the control word.
    #[must_use]
    pub const fn mask(self) -> u32 {
        1 << self as u32
    }
}

/// Register increment/decrement request carried in `REG_EXT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RegExt {
    /// No extend operation; `REG_WE` decides whether to write.
    #[default]
    None,
    /// Add one to the selected pair.
    Inc,
    /// Subtract one from the selected pair.
    Dec,
    /// Add two to the selected pair.
    Inc2,
}

impl RegExt {
    /// Decodes the two-bit `REG_EXT` field.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b01 => Self::Inc,
            0b10 => Self::Dec,
            0b11 => Self::Inc2,
            _ => Self::None,
        }
    }

    /// Encodes this mode as the two-bit `REG_EXT` field.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::None => 0b00,
            Self::Inc => 0b01,
            Self::Dec => 0b10,
            Self::Inc2 => 0b11,
        }
    }

    /// Amount added to a pair, modulo 65536.
    #[must_use]
    pub const fn delta(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Inc => 1,
            Self::Dec => u16::MAX,
            Self::Inc2 => 2,
        }
    }
}

/// Control word with typed field accessors.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ControlWord(u32);

impl ControlWord {
    /// All signals deasserted.
    pub const EMPTY: Self = Self(0);

    /// Wraps a raw 32-bit control word.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw 32-bit value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` when `signal` is asserted.
    #[must_use]
    pub const fn contains(self, signal: Signal) -> bool {
        self.0 & signal.mask() != 0
    }

    /// Returns a copy with `signal` asserted.
    #[must_use]
    pub const fn with(self, signal: Signal) -> Self {
        Self(self.0 | signal.mask())
    }

    /// Raw five-bit `ALU_OP` field.
    #[must_use]
    pub const fn alu_op_code(self) -> u8 {
        field(self.0, ALU_OP_SHIFT, FIVE_BITS)
    }

    /// Returns a copy with `ALU_OP` replaced.
    #[must_use]
    pub const fn with_alu_op(self, op: AluOp) -> Self {
        Self(replace(self.0, ALU_OP_SHIFT, FIVE_BITS, op.code()))
    }

    /// `REG_RD_SEL` field.
    #[must_use]
    pub const fn read_select(self) -> RegisterSelect {
        RegisterSelect::from_bits(field(self.0, REG_RD_SEL_SHIFT, FIVE_BITS))
    }

    /// Returns a copy with `REG_RD_SEL` replaced.
    #[must_use]
    pub const fn with_read_select(self, select: RegisterSelect) -> Self {
        Self(replace(self.0, REG_RD_SEL_SHIFT, FIVE_BITS, select.bits()))
    }

    /// `REG_WR_SEL` field.
    #[must_use]
    pub const fn write_select(self) -> RegisterSelect {
        RegisterSelect::from_bits(field(self.0, REG_WR_SEL_SHIFT, FIVE_BITS))
    }

    /// Returns a copy with `REG_WR_SEL` replaced.
    #[must_use]
    pub const fn with_write_select(self, select: RegisterSelect) -> Self {
        Self(replace(self.0, REG_WR_SEL_SHIFT, FIVE_BITS, select.bits()))
    }

    /// `REG_EXT` field.
    #[must_use]
    pub const fn ext(self) -> RegExt {
        RegExt::from_bits(field(self.0, REG_EXT_SHIFT, TWO_BITS))
    }

    /// Returns a copy with `REG_EXT` replaced.
    #[must_use]
    pub const fn with_ext(self, ext: RegExt) -> Self {
        Self(replace(self.0, REG_EXT_SHIFT, TWO_BITS, ext.bits()))
    }

    /// `HLT` asserted with `REG_EXT` bit 0 clear: the machine is halted.
    #[must_use]
    pub const fn is_halted(self) -> bool {
        self.contains(Signal::Hlt) && self.ext().bits() & 1 == 0
    }

    /// `HLT` asserted with `REG_EXT` bit 0 set: the OUT pseudo-instruction.
    #[must_use]
    pub const fn is_output(self) -> bool {
        self.contains(Signal::Hlt) && self.ext().bits() & 1 == 1
    }

    /// Number of bus drivers enabled by this word.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn output_enables(self) -> u8 {
        self.contains(Signal::AluOe) as u8
            + self.contains(Signal::MemOe) as u8
            + self.contains(Signal::RegOe) as u8
            + self.contains(Signal::AluFlagsOe) as u8
    }
}

impl fmt::Debug for ControlWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ControlWord({:#034b})", self.0)
    }
}

impl From<ControlWord> for u32 {
    fn from(word: ControlWord) -> Self {
        word.bits()
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn field(word: u32, shift: u32, mask: u32) -> u8 {
    ((word >> shift) & mask) as u8
}

#[allow(clippy::cast_lossless)]
const fn replace(word: u32, shift: u32, mask: u32, value: u8) -> u32 {
    (word & !(mask << shift)) | ((value as u32 & mask) << shift)
}

#[cfg(test)]
mod tests {
    use super::{ControlWord, RegExt, Signal};
    use crate::alu::AluOp;
    use crate::registers::RegisterSelect;

    #[test]
    fn signals_land_on_documented_bits() {
        assert_eq!(ControlWord::EMPTY.with(Signal::Hlt).bits(), 1 << 31);
        assert_eq!(ControlWord::EMPTY.with(Signal::AluTmpWe).bits(), 1 << 25);
        assert_eq!(ControlWord::EMPTY.with(Signal::AluFlagsOe).bits(), 1 << 18);
        assert_eq!(ControlWord::EMPTY.with(Signal::IrWe).bits(), 1);
    }

    #[test]
    fn fields_replace_rather_than_accumulate() {
        let word = ControlWord::EMPTY
            .with_read_select(RegisterSelect::SP)
            .with_read_select(RegisterSelect::HL)
            .with_alu_op(AluOp::Dcr)
            .with_alu_op(AluOp::Sub);
        assert_eq!(word.read_select(), RegisterSelect::HL);
        assert_eq!(word.alu_op_code(), AluOp::Sub.code());
        assert_eq!(word.bits(), u32::from(RegisterSelect::HL.bits()) << 13 | 2 << 20);
    }

    #[test]
    fn halted_and_output_are_distinguished_by_ext_bit_zero() {
        let halt = ControlWord::EMPTY.with(Signal::Hlt);
        let out = halt.with_ext(RegExt::Inc).with_write_select(RegisterSelect::PC);
        assert!(halt.is_halted());
        assert!(!halt.is_output());
        assert!(out.is_output());
        assert!(!out.is_halted());
        assert!(!ControlWord::EMPTY.is_halted());
    }

    #[test]
    fn output_enables_counts_every_bus_driver() {
        let word = ControlWord::EMPTY
            .with(Signal::AluOe)
            .with(Signal::MemOe)
            .with(Signal::RegOe)
            .with(Signal::AluFlagsOe)
            .with(Signal::RegWe);
        assert_eq!(word.output_enables(), 4);
    }

    #[test]
    fn ext_modes_round_trip_through_two_bits() {
        for ext in [RegExt::None, RegExt::Inc, RegExt::Dec, RegExt::Inc2] {
            assert_eq!(RegExt::from_bits(ext.bits()), ext);
        }
        assert_eq!(RegExt::Dec.delta(), 0xFFFF);
    }
}
