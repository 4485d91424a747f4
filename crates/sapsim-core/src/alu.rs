//! Arithmetic-logic unit: accumulator, shadow register, operand latch and flags.

use crate::clocked::{Clocked, Wires};
use crate::control::Signal;
use crate::fault::SimError;

/// Zero flag bit.
pub const FLAG_ZERO: u8 = 1 << 0;
/// Carry flag bit.
pub const FLAG_CARRY: u8 = 1 << 1;
/// Parity flag bit (set when the accumulator has an even number of ones).
pub const FLAG_PARITY: u8 = 1 << 2;
/// Sign flag bit.
pub const FLAG_SIGN: u8 = 1 << 3;
/// Bits of the flag register that exist in hardware.
pub const FLAG_MASK: u8 = FLAG_ZERO | FLAG_CARRY | FLAG_PARITY | FLAG_SIGN;

/// Five-bit ALU operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AluOp {
    /// `acc + tmp`.
    Add = 0,
    /// `acc + tmp + carry flag`.
    Adc = 1,
    /// `acc - tmp`.
    Sub = 2,
    /// `acc - tmp - carry flag`.
    Sbb = 3,
    /// `acc & tmp`.
    Ana = 4,
    /// `acc ^ tmp`.
    Xra = 5,
    /// `acc | tmp`.
    Ora = 6,
    /// Compare; the difference goes to the shadow register.
    Cmp = 7,
    /// Rotate left.
    Rlc = 8,
    /// Rotate right.
    Rrc = 9,
    /// Rotate left through carry.
    Ral = 10,
    /// Rotate right through carry.
    Rar = 11,
    /// Decimal adjust (not implemented by the hardware).
    Daa = 12,
    /// Complement accumulator.
    Cma = 13,
    /// Set carry.
    Stc = 14,
    /// Complement carry.
    Cmc = 15,
    /// Increment accumulator.
    Inr = 16,
    /// Decrement accumulator.
    Dcr = 17,
}

/// Which flags an operation writes on the following falling edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagsUpdate {
    /// Sign, parity, carry and zero.
    All,
    /// Carry and zero, zero taken from the shadow register (compare).
    Compare,
    /// Sign, parity and zero; carry is preserved.
    PreserveCarry,
    /// Carry only.
    CarryOnly,
    /// Nothing.
    None,
}

impl AluOp {
    /// Raw five-bit operation code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decodes a five-bit operation code.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidAluOp`] for codes 18-31.
    pub const fn from_code(code: u8) -> Result<Self, SimError> {
        Ok(match code {
            0 => Self::Add,
            1 => Self::Adc,
            2 => Self::Sub,
            3 => Self::Sbb,
            4 => Self::Ana,
            5 => Self::Xra,
            6 => Self::Ora,
            7 => Self::Cmp,
            8 => Self::Rlc,
            9 => Self::Rrc,
            10 => Self::Ral,
            11 => Self::Rar,
            12 => Self::Daa,
            13 => Self::Cma,
            14 => Self::Stc,
            15 => Self::Cmc,
            16 => Self::Inr,
            17 => Self::Dcr,
            _ => return Err(SimError::InvalidAluOp(code)),
        })
    }

    /// Two-operand operation selected by an opcode's three-bit op field.
    #[must_use]
    pub const fn arithmetic(field: u8) -> Self {
        match field & 0b111 {
            0 => Self::Add,
            1 => Self::Adc,
            2 => Self::Sub,
            3 => Self::Sbb,
            4 => Self::Ana,
            5 => Self::Xra,
            6 => Self::Ora,
            _ => Self::Cmp,
        }
    }

    /// Accumulator-only operation selected by an opcode's three-bit op field.
    #[must_use]
    pub const fn accumulator(field: u8) -> Self {
        match field & 0b111 {
            0 => Self::Rlc,
            1 => Self::Rrc,
            2 => Self::Ral,
            3 => Self::Rar,
            4 => Self::Daa,
            5 => Self::Cma,
            6 => Self::Stc,
            _ => Self::Cmc,
        }
    }

    /// Flags written on the falling edge after this operation executes.
    #[must_use]
    pub const fn flags_update(self) -> FlagsUpdate {
        match self {
            Self::Add | Self::Adc | Self::Sub | Self::Sbb | Self::Ana | Self::Xra | Self::Ora => {
                FlagsUpdate::All
            }
            Self::Cmp => FlagsUpdate::Compare,
            Self::Inr | Self::Dcr => FlagsUpdate::PreserveCarry,
            Self::Rlc | Self::Rrc | Self::Ral | Self::Rar | Self::Stc | Self::Cmc => {
                FlagsUpdate::CarryOnly
            }
            Self::Daa | Self::Cma => FlagsUpdate::None,
        }
    }

    /// Assembly mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Adc => "ADC",
            Self::Sub => "SUB",
            Self::Sbb => "SBB",
            Self::Ana => "ANA",
            Self::Xra => "XRA",
            Self::Ora => "ORA",
            Self::Cmp => "CMP",
            Self::Rlc => "RLC",
            Self::Rrc => "RRC",
            Self::Ral => "RAL",
            Self::Rar => "RAR",
            Self::Daa => "DAA",
            Self::Cma => "CMA",
            Self::Stc => "STC",
            Self::Cmc => "CMC",
            Self::Inr => "INR",
            Self::Dcr => "DCR",
        }
    }
}

/// ALU state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Alu {
    acc: u8,
    stored: u8,
    tmp: u8,
    carry: bool,
    flags: u8,
    out: u8,
    flags_out: u8,
}

impl Alu {
    /// Accumulator.
    #[must_use]
    pub const fn acc(&self) -> u8 {
        self.acc
    }

    /// Shadow accumulator used by save/restore sequences and compare.
    #[must_use]
    pub const fn stored(&self) -> u8 {
        self.stored
    }

    /// Operand latch.
    #[must_use]
    pub const fn tmp(&self) -> u8 {
        self.tmp
    }

    /// Carry produced by the last operation, not yet committed to the flags.
    #[must_use]
    pub const fn carry(&self) -> bool {
        self.carry
    }

    /// Flag register.
    #[must_use]
    pub const fn flags(&self) -> u8 {
        self.flags
    }

    /// Accumulator output latch.
    #[must_use]
    pub const fn out(&self) -> u8 {
        self.out
    }

    /// Flag output latch.
    #[must_use]
    pub const fn flags_out(&self) -> u8 {
        self.flags_out
    }

    const fn carry_flag(&self) -> bool {
        self.flags & FLAG_CARRY != 0
    }

    fn execute(&mut self, op: AluOp) -> Result<(), SimError> {
        let carry_in = self.carry_flag();
        match op {
            AluOp::Add | AluOp::Adc => {
                let (sum, first) = self.acc.overflowing_add(self.tmp);
                let (sum, second) = sum.overflowing_add(u8::from(op == AluOp::Adc && carry_in));
                self.acc = sum;
                self.carry = first || second;
            }
            AluOp::Sub | AluOp::Sbb => {
                let (diff, first) = self.acc.overflowing_sub(self.tmp);
                let (diff, second) = diff.overflowing_sub(u8::from(op == AluOp::Sbb && carry_in));
                self.acc = diff;
                self.carry = first || second;
            }
            AluOp::Ana => self.logic(self.acc & self.tmp),
            AluOp::Xra => self.logic(self.acc ^ self.tmp),
            AluOp::Ora => self.logic(self.acc | self.tmp),
            AluOp::Cmp => {
                self.stored = self.acc.wrapping_sub(self.tmp);
                self.carry = self.stored & 0x80 != 0;
            }
            AluOp::Rlc => {
                self.carry = self.acc & 0x80 != 0;
                self.acc = self.acc.rotate_left(1);
            }
            AluOp::Rrc => {
                self.carry = self.acc & 0x01 != 0;
                self.acc = self.acc.rotate_right(1);
            }
            AluOp::Ral => {
                self.carry = self.acc & 0x80 != 0;
                self.acc = (self.acc << 1) | u8::from(carry_in);
            }
            AluOp::Rar => {
                self.carry = self.acc & 0x01 != 0;
                self.acc = (self.acc >> 1) | (u8::from(carry_in) << 7);
            }
            AluOp::Daa => return Err(SimError::UnsupportedAluOp(op)),
            AluOp::Cma => self.acc = !self.acc,
            AluOp::Stc => self.carry = true,
            AluOp::Cmc => self.carry = !carry_in,
            AluOp::Inr => self.acc = self.acc.wrapping_add(1),
            AluOp::Dcr => self.acc = self.acc.wrapping_sub(1),
        }
        Ok(())
    }

    fn logic(&mut self, value: u8) {
        self.acc = value;
        self.carry = false;
    }

    fn update_flags(&mut self, update: FlagsUpdate) {
        let mut flags = self.flags;
        let mut put = |bit: u8, on: bool| {
            if on {
                flags |= bit;
            } else {
                flags &= !bit;
            }
        };
        match update {
            FlagsUpdate::All => {
                put(FLAG_SIGN, self.acc & 0x80 != 0);
                put(FLAG_PARITY, self.acc.count_ones() % 2 == 0);
                put(FLAG_CARRY, self.carry);
                put(FLAG_ZERO, self.acc == 0);
            }
            FlagsUpdate::Compare => {
                put(FLAG_CARRY, self.carry);
                put(FLAG_ZERO, self.stored == 0);
            }
            FlagsUpdate::PreserveCarry => {
                put(FLAG_SIGN, self.acc & 0x80 != 0);
                put(FLAG_PARITY, self.acc.count_ones() % 2 == 0);
                put(FLAG_ZERO, self.acc == 0);
            }
            FlagsUpdate::CarryOnly => put(FLAG_CARRY, self.carry),
            FlagsUpdate::None => {}
        }
        self.flags = flags;
    }
}

impl Clocked for Alu {
    fn posedge(&mut self, wires: &Wires) -> Result<(), SimError> {
        let ctrl = wires.ctrl;
        let writers = u8::from(ctrl.contains(Signal::AluAWe))
            + u8::from(ctrl.contains(Signal::AluARestore))
            + u8::from(ctrl.contains(Signal::AluCs));
        if writers > 1 {
            return Err(SimError::AccumulatorConflict);
        }

        if ctrl.contains(Signal::AluAStore) {
            self.stored = self.acc;
        }
        if ctrl.contains(Signal::AluTmpWe) {
            self.tmp = wires.bus_byte();
        }

        if ctrl.contains(Signal::AluAWe) {
            self.acc = wires.bus_byte();
        } else if ctrl.contains(Signal::AluARestore) {
            self.acc = self.stored;
        } else if ctrl.contains(Signal::AluCs) {
            self.execute(AluOp::from_code(ctrl.alu_op_code())?)?;
        }
        Ok(())
    }

    fn negedge(&mut self, wires: &Wires) -> Result<(), SimError> {
        let ctrl = wires.ctrl;
        if ctrl.contains(Signal::AluFlagsWe) {
            self.flags = wires.bus_byte() & FLAG_MASK;
        } else if ctrl.contains(Signal::AluCs) {
            self.update_flags(AluOp::from_code(ctrl.alu_op_code())?.flags_update());
        }
        Ok(())
    }

    fn always(&mut self, _wires: &Wires) -> Result<(), SimError> {
        self.out = self.acc;
        self.flags_out = self.flags;
        Ok(())
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{Alu, AluOp, FLAG_CARRY, FLAG_PARITY, FLAG_SIGN, FLAG_ZERO};
    use crate::clocked::{Clocked, Wires};
    use crate::control::{ControlWord, Signal};
    use crate::fault::SimError;

    fn load(alu: &mut Alu, signal: Signal, value: u8) {
        alu.posedge(&Wires {
            ctrl: ControlWord::EMPTY.with(signal),
            bus: u16::from(value),
            ..Wires::default()
        })
        .unwrap();
    }

    fn run(alu: &mut Alu, op: AluOp) -> Result<(), SimError> {
        let ctrl = ControlWord::EMPTY.with(Signal::AluCs).with_alu_op(op);
        let wires = Wires {
            ctrl,
            ..Wires::default()
        };
        alu.posedge(&wires)?;
        alu.negedge(&wires)
    }

    fn alu_with(acc: u8, tmp: u8) -> Alu {
        let mut alu = Alu::default();
        load(&mut alu, Signal::AluAWe, acc);
        load(&mut alu, Signal::AluTmpWe, tmp);
        alu
    }

    #[rstest]
    #[case::add(AluOp::Add, 3, 5, 8, false)]
    #[case::add_overflow(AluOp::Add, 0xF0, 0x20, 0x10, true)]
    #[case::sub(AluOp::Sub, 5, 3, 2, false)]
    #[case::sub_borrow(AluOp::Sub, 3, 5, 0xFE, true)]
    #[case::and(AluOp::Ana, 0b1100, 0b1010, 0b1000, false)]
    #[case::xor(AluOp::Xra, 0b1100, 0b1010, 0b0110, false)]
    #[case::or(AluOp::Ora, 0b1100, 0b1010, 0b1110, false)]
    fn two_operand_ops(
        #[case] op: AluOp,
        #[case] acc: u8,
        #[case] tmp: u8,
        #[case] expected: u8,
        #[case] carry: bool,
    ) {
        let mut alu = alu_with(acc, tmp);
        run(&mut alu, op).unwrap();
        assert_eq!(alu.acc(), expected);
        assert_eq!(alu.carry(), carry);
        assert_eq!(alu.flags() & FLAG_CARRY != 0, carry);
    }

    #[test]
    fn add_with_carry_uses_the_committed_flag() {
        let mut alu = alu_with(0xFF, 0x01);
        run(&mut alu, AluOp::Add).unwrap();
        assert_eq!(alu.flags() & FLAG_CARRY, FLAG_CARRY);
        load(&mut alu, Signal::AluAWe, 1);
        run(&mut alu, AluOp::Adc).unwrap();
        assert_eq!(alu.acc(), 3);
    }

    #[test]
    fn subtract_with_borrow_uses_the_committed_flag() {
        let mut alu = alu_with(0x00, 0x01);
        run(&mut alu, AluOp::Sub).unwrap();
        load(&mut alu, Signal::AluAWe, 10);
        run(&mut alu, AluOp::Sbb).unwrap();
        assert_eq!(alu.acc(), 8);
    }

    #[test]
    fn compare_leaves_accumulator_and_uses_bit_seven_as_carry() {
        let mut alu = alu_with(200, 10);
        run(&mut alu, AluOp::Cmp).unwrap();
        assert_eq!(alu.acc(), 200);
        assert_eq!(alu.stored(), 190);
        assert!(alu.carry());
        assert_eq!(alu.flags(), FLAG_CARRY);

        let mut alu = alu_with(7, 7);
        run(&mut alu, AluOp::Cmp).unwrap();
        assert_eq!(alu.flags(), FLAG_ZERO);
    }

    #[test]
    fn rotates_move_the_outgoing_bit_into_carry() {
        let mut alu = alu_with(0b1000_0001, 0);
        run(&mut alu, AluOp::Rlc).unwrap();
        assert_eq!(alu.acc(), 0b0000_0011);
        assert!(alu.carry());
        run(&mut alu, AluOp::Rrc).unwrap();
        assert_eq!(alu.acc(), 0b1000_0001);
        assert!(alu.carry());
    }

    #[test]
    fn rotates_through_carry_shift_the_old_flag_in() {
        let mut alu = alu_with(0b0100_0000, 0);
        run(&mut alu, AluOp::Stc).unwrap();
        run(&mut alu, AluOp::Ral).unwrap();
        assert_eq!(alu.acc(), 0b1000_0001);
        assert!(!alu.carry());
        run(&mut alu, AluOp::Rar).unwrap();
        assert_eq!(alu.acc(), 0b0100_0000);
        assert!(alu.carry());
    }

    #[test]
    fn complement_and_carry_ops() {
        let mut alu = alu_with(0b1010_0101, 0);
        run(&mut alu, AluOp::Cma).unwrap();
        assert_eq!(alu.acc(), 0b0101_1010);
        assert_eq!(alu.flags(), 0);
        run(&mut alu, AluOp::Stc).unwrap();
        assert_eq!(alu.flags(), FLAG_CARRY);
        run(&mut alu, AluOp::Cmc).unwrap();
        assert_eq!(alu.flags(), 0);
    }

    #[test]
    fn increment_and_decrement_wrap_without_touching_carry() {
        let mut alu = alu_with(0xFF, 0);
        run(&mut alu, AluOp::Stc).unwrap();
        run(&mut alu, AluOp::Inr).unwrap();
        assert_eq!(alu.acc(), 0);
        assert_eq!(alu.flags(), FLAG_ZERO | FLAG_PARITY | FLAG_CARRY);
        run(&mut alu, AluOp::Dcr).unwrap();
        assert_eq!(alu.acc(), 0xFF);
        assert_eq!(alu.flags(), FLAG_SIGN | FLAG_PARITY | FLAG_CARRY);
    }

    #[test]
    fn parity_is_set_for_an_even_number_of_ones() {
        let mut alu = alu_with(0b0000_0011, 0);
        run(&mut alu, AluOp::Ora).unwrap();
        assert_eq!(alu.flags() & FLAG_PARITY, FLAG_PARITY);
        load(&mut alu, Signal::AluAWe, 0b0000_0111);
        run(&mut alu, AluOp::Ora).unwrap();
        assert_eq!(alu.flags() & FLAG_PARITY, 0);
    }

    #[test]
    fn daa_fails_loudly() {
        let mut alu = Alu::default();
        assert_eq!(
            run(&mut alu, AluOp::Daa),
            Err(SimError::UnsupportedAluOp(AluOp::Daa))
        );
    }

    #[test]
    fn unknown_op_codes_are_rejected() {
        assert_eq!(AluOp::from_code(18), Err(SimError::InvalidAluOp(18)));
        assert_eq!(AluOp::from_code(17), Ok(AluOp::Dcr));
    }

    #[test]
    fn conflicting_accumulator_writes_are_rejected() {
        let mut alu = Alu::default();
        let ctrl = ControlWord::EMPTY
            .with(Signal::AluAWe)
            .with(Signal::AluCs);
        assert_eq!(
            alu.posedge(&Wires {
                ctrl,
                ..Wires::default()
            }),
            Err(SimError::AccumulatorConflict)
        );
    }

    #[test]
    fn store_and_restore_round_trip_the_accumulator() {
        let mut alu = Alu::default();
        load(&mut alu, Signal::AluAWe, 42);
        let ctrl = ControlWord::EMPTY
            .with(Signal::AluAStore)
            .with(Signal::AluAWe);
        alu.posedge(&Wires {
            ctrl,
            bus: 7,
            ..Wires::default()
        })
        .unwrap();
        assert_eq!((alu.acc(), alu.stored()), (7, 42));
        load(&mut alu, Signal::AluARestore, 0);
        assert_eq!(alu.acc(), 42);
    }

    #[test]
    fn flags_load_from_the_bus_masked_to_four_bits() {
        let mut alu = Alu::default();
        alu.negedge(&Wires {
            ctrl: ControlWord::EMPTY.with(Signal::AluFlagsWe),
            bus: 0xFF,
            ..Wires::default()
        })
        .unwrap();
        assert_eq!(alu.flags(), 0x0F);
        alu.always(&Wires::default()).unwrap();
        assert_eq!(alu.flags_out(), 0x0F);
    }
}
