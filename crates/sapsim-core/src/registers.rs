//! Register file: twelve byte cells addressed singly or as big-endian pairs.

use crate::clocked::{high_byte, low_byte, Clocked, Wires};
use crate::control::{RegExt, Signal};
use crate::fault::SimError;

/// Number of byte cells in the register file.
pub const REGISTER_CELLS: usize = 12;

const PAIR_FLAG: u8 = 0b1_0000;
const CELL_MASK: u8 = 0b0_1111;

/// Five-bit register selector: a four-bit cell index plus the pair flag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RegisterSelect(u8);

impl RegisterSelect {
    /// Register B.
    pub const B: Self = Self(0);
    /// Register C.
    pub const C: Self = Self(1);
    /// Register D.
    pub const D: Self = Self(2);
    /// Register E.
    pub const E: Self = Self(3);
    /// Register H.
    pub const H: Self = Self(4);
    /// Register L.
    pub const L: Self = Self(5);
    /// Scratch register W.
    pub const W: Self = Self(6);
    /// Scratch register Z.
    pub const Z: Self = Self(7);
    /// Program counter high byte.
    pub const PCP: Self = Self(8);
    /// Program counter low byte.
    pub const PCC: Self = Self(9);
    /// Stack pointer high byte.
    pub const SPS: Self = Self(10);
    /// Stack pointer low byte.
    pub const SPP: Self = Self(11);
    /// Pair BC.
    pub const BC: Self = Self(PAIR_FLAG);
    /// Pair DE.
    pub const DE: Self = Self(PAIR_FLAG | 2);
    /// Pair HL.
    pub const HL: Self = Self(PAIR_FLAG | 4);
    /// Scratch pair WZ.
    pub const WZ: Self = Self(PAIR_FLAG | 6);
    /// Program counter.
    pub const PC: Self = Self(PAIR_FLAG | 8);
    /// Stack pointer.
    pub const SP: Self = Self(PAIR_FLAG | 10);

    /// Wraps the low five bits of `bits`.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & (PAIR_FLAG | CELL_MASK))
    }

    /// Byte select for an instruction's three-bit register field.
    ///
    /// Codes 0-5 name B, C, D, E, H, L; code 7 (the accumulator) lives in the
    /// ALU and is handled by the microcode before a select is built.
    #[must_use]
    pub const fn byte(code: u8) -> Self {
        Self(code & 0b111)
    }

    /// Pair select for an instruction's two-bit pair field where `11` is SP.
    #[must_use]
    pub const fn pair_or_sp(code: u8) -> Self {
        match code & 0b11 {
            0 => Self::BC,
            1 => Self::DE,
            2 => Self::HL,
            _ => Self::SP,
        }
    }

    /// Raw five-bit value.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` for 16-bit pair selectors.
    #[must_use]
    pub const fn is_pair(self) -> bool {
        self.0 & PAIR_FLAG != 0
    }

    /// Cell index (the high cell for pairs).
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn cell(self) -> usize {
        (self.0 & CELL_MASK) as usize
    }

    /// Conventional register name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self.0 {
            0 => "B",
            1 => "C",
            2 => "D",
            3 => "E",
            4 => "H",
            5 => "L",
            6 => "W",
            7 => "Z",
            8 => "PCP",
            9 => "PCC",
            10 => "SPS",
            11 => "SPP",
            0b1_0000 => "BC",
            0b1_0010 => "DE",
            0b1_0100 => "HL",
            0b1_0110 => "WZ",
            0b1_1000 => "PC",
            0b1_1010 => "SP",
            _ => "?",
        }
    }
}

impl core::fmt::Debug for RegisterSelect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}({:#07b})", self.name(), self.0)
    }
}

/// Register file state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Registers {
    cells: [u8; REGISTER_CELLS],
    out: u16,
    stack_base: Option<u16>,
}

impl Registers {
    /// Reads a byte register, or a pair with the high byte in the lower cell.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidRegisterSelect`] when the selector addresses
    /// cells beyond the file.
    pub fn read(&self, select: RegisterSelect) -> Result<u16, SimError> {
        let index = Self::checked_index(select)?;
        if select.is_pair() {
            Ok(u16::from_be_bytes([self.cells[index], self.cells[index + 1]]))
        } else {
            Ok(u16::from(self.cells[index]))
        }
    }

    /// Writes a byte register (low byte of `value`) or a pair.
    ///
    /// The first pair write to SP since power-on is recorded as the stack base.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidRegisterSelect`] when the selector addresses
    /// cells beyond the file.
    pub fn write(&mut self, select: RegisterSelect, value: u16) -> Result<(), SimError> {
        let index = Self::checked_index(select)?;
        if select.is_pair() {
            self.store_pair(index, value);
            if select == RegisterSelect::SP && self.stack_base.is_none() {
                self.stack_base = Some(value);
            }
        } else {
            self.cells[index] = low_byte(value);
        }
        Ok(())
    }

    /// Adds the extend delta to a pair, wrapping modulo 65536.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ExtendOnByteRegister`] for byte selectors and
    /// [`SimError::InvalidRegisterSelect`] for pairs beyond the file.
    pub fn ext(&mut self, select: RegisterSelect, mode: RegExt) -> Result<(), SimError> {
        if !select.is_pair() {
            return Err(SimError::ExtendOnByteRegister(select.bits()));
        }
        let value = self.read(select)?.wrapping_add(mode.delta());
        self.store_pair(select.cell(), value);
        Ok(())
    }

    fn checked_index(select: RegisterSelect) -> Result<usize, SimError> {
        let index = select.cell();
        let last = if select.is_pair() { index + 1 } else { index };
        if last < REGISTER_CELLS {
            Ok(index)
        } else {
            Err(SimError::InvalidRegisterSelect(select.bits()))
        }
    }

    fn store_pair(&mut self, index: usize, value: u16) {
        self.cells[index] = high_byte(value);
        self.cells[index + 1] = low_byte(value);
    }

    fn pair(&self, index: usize) -> u16 {
        u16::from_be_bytes([self.cells[index], self.cells[index + 1]])
    }

    /// Raw cells in select order: B C D E H L W Z PCP PCC SPS SPP.
    #[must_use]
    pub const fn cells(&self) -> &[u8; REGISTER_CELLS] {
        &self.cells
    }

    /// Output latch, refreshed every tock from `REG_RD_SEL`.
    #[must_use]
    pub const fn out(&self) -> u16 {
        self.out
    }

    /// First value written to SP as a pair since power-on.
    #[must_use]
    pub const fn stack_base(&self) -> Option<u16> {
        self.stack_base
    }

    /// Register B.
    #[must_use]
    pub const fn b(&self) -> u8 {
        self.cells[0]
    }

    /// Register C.
    #[must_use]
    pub const fn c(&self) -> u8 {
        self.cells[1]
    }

    /// Register D.
    #[must_use]
    pub const fn d(&self) -> u8 {
        self.cells[2]
    }

    /// Register E.
    #[must_use]
    pub const fn e(&self) -> u8 {
        self.cells[3]
    }

    /// Register H.
    #[must_use]
    pub const fn h(&self) -> u8 {
        self.cells[4]
    }

    /// Register L.
    #[must_use]
    pub const fn l(&self) -> u8 {
        self.cells[5]
    }

    /// Pair BC.
    #[must_use]
    pub fn bc(&self) -> u16 {
        self.pair(0)
    }

    /// Pair DE.
    #[must_use]
    pub fn de(&self) -> u16 {
        self.pair(2)
    }

    /// Pair HL.
    #[must_use]
    pub fn hl(&self) -> u16 {
        self.pair(4)
    }

    /// Scratch pair WZ.
    #[must_use]
    pub fn wz(&self) -> u16 {
        self.pair(6)
    }

    /// Program counter.
    #[must_use]
    pub fn pc(&self) -> u16 {
        self.pair(8)
    }

    /// Stack pointer.
    #[must_use]
    pub fn sp(&self) -> u16 {
        self.pair(10)
    }
}

impl Clocked for Registers {
    fn posedge(&mut self, wires: &Wires) -> Result<(), SimError> {
        let ext = wires.ctrl.ext();
        if ext != RegExt::None {
            self.ext(wires.ctrl.write_select(), ext)
        } else if wires.ctrl.contains(Signal::RegWe) {
            self.write(wires.ctrl.write_select(), wires.bus)
        } else {
            Ok(())
        }
    }

    fn always(&mut self, wires: &Wires) -> Result<(), SimError> {
        self.out = self.read(wires.ctrl.read_select())?;
        Ok(())
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::{RegisterSelect, Registers};
    use crate::clocked::{Clocked, Wires};
    use crate::control::{ControlWord, RegExt, Signal};
    use crate::fault::SimError;

    #[test]
    fn pairs_are_big_endian_over_adjacent_cells() {
        let mut regs = Registers::default();
        regs.write(RegisterSelect::HL, 0x1234).unwrap();
        assert_eq!(regs.h(), 0x12);
        assert_eq!(regs.l(), 0x34);
        assert_eq!(regs.read(RegisterSelect::L).unwrap(), 0x34);
        assert_eq!(regs.hl(), 0x1234);
    }

    #[test]
    fn byte_write_keeps_only_the_low_byte() {
        let mut regs = Registers::default();
        regs.write(RegisterSelect::E, 0xABCD).unwrap();
        assert_eq!(regs.e(), 0xCD);
        assert_eq!(regs.de(), 0x00CD);
    }

    #[test]
    fn extend_wraps_modulo_65536() {
        let mut regs = Registers::default();
        regs.ext(RegisterSelect::SP, RegExt::Dec).unwrap();
        assert_eq!(regs.sp(), 0xFFFF);
        regs.ext(RegisterSelect::SP, RegExt::Inc2).unwrap();
        assert_eq!(regs.sp(), 0x0001);
        regs.ext(RegisterSelect::PC, RegExt::Inc).unwrap();
        assert_eq!(regs.pc(), 1);
    }

    #[test]
    fn extend_on_byte_register_is_rejected() {
        let mut regs = Registers::default();
        assert_eq!(
            regs.ext(RegisterSelect::B, RegExt::Inc),
            Err(SimError::ExtendOnByteRegister(0))
        );
    }

    #[test]
    fn selectors_beyond_the_file_are_rejected() {
        let regs = Registers::default();
        assert_eq!(
            regs.read(RegisterSelect::from_bits(12)),
            Err(SimError::InvalidRegisterSelect(12))
        );
        assert_eq!(
            regs.read(RegisterSelect::from_bits(0b1_1011)),
            Err(SimError::InvalidRegisterSelect(0b1_1011))
        );
    }

    #[test]
    fn stack_base_records_only_the_first_pair_write_to_sp() {
        let mut regs = Registers::default();
        regs.write(RegisterSelect::SPP, 0x10).unwrap();
        assert_eq!(regs.stack_base(), None);
        regs.write(RegisterSelect::SP, 0x0400).unwrap();
        regs.ext(RegisterSelect::SP, RegExt::Dec).unwrap();
        regs.write(RegisterSelect::SP, 0x0200).unwrap();
        assert_eq!(regs.stack_base(), Some(0x0400));
        regs.reset();
        assert_eq!(regs.stack_base(), None);
    }

    #[test]
    fn posedge_prefers_extend_over_write_enable() {
        let mut regs = Registers::default();
        let ctrl = ControlWord::EMPTY
            .with(Signal::RegWe)
            .with_write_select(RegisterSelect::PC)
            .with_ext(RegExt::Inc);
        regs.posedge(&Wires {
            ctrl,
            bus: 0x0700,
            ..Wires::default()
        })
        .unwrap();
        assert_eq!(regs.pc(), 1);
    }

    #[test]
    fn always_latches_the_read_select() {
        let mut regs = Registers::default();
        regs.write(RegisterSelect::BC, 0xBEEF).unwrap();
        let ctrl = ControlWord::EMPTY.with_read_select(RegisterSelect::BC);
        regs.always(&Wires {
            ctrl,
            ..Wires::default()
        })
        .unwrap();
        assert_eq!(regs.out(), 0xBEEF);
    }
}
