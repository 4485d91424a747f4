//! The four-operation capability every clocked component implements.

use crate::control::ControlWord;
use crate::fault::SimError;

/// Copy of every signal a component may sample during one phase.
///
/// The computer rebuilds this value immediately before each component call so
/// that each component sees the outputs computed by the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Wires {
    /// Control word currently latched in the controller.
    pub ctrl: ControlWord,
    /// Bus value (16 bits; byte consumers take the low byte).
    pub bus: u16,
    /// Instruction register contents.
    pub ir: u8,
    /// Register file output latch.
    pub reg_out: u16,
    /// ALU accumulator output latch.
    pub alu_out: u8,
    /// ALU flag output latch.
    pub alu_flags: u8,
    /// Memory read latch.
    pub mem_out: u8,
    /// Program counter.
    pub pc: u16,
    /// Register C, the system-call function number.
    pub c: u8,
    /// Register pair DE, the system-call argument.
    pub de: u16,
    /// Little-endian word stored at PC.
    pub operand: u16,
}

impl Wires {
    /// Low byte of the bus.
    #[must_use]
    pub const fn bus_byte(&self) -> u8 {
        low_byte(self.bus)
    }
}

/// Clock-driven hardware component.
pub trait Clocked {
    /// Rising edge: latch inputs gated by the control word.
    ///
    /// # Errors
    ///
    /// Returns an error when the control word asks for a forbidden combination.
    fn posedge(&mut self, wires: &Wires) -> Result<(), SimError> {
        let _ = wires;
        Ok(())
    }

    /// Falling edge.
    ///
    /// # Errors
    ///
    /// Returns an error when the control word asks for a forbidden combination.
    fn negedge(&mut self, wires: &Wires) -> Result<(), SimError> {
        let _ = wires;
        Ok(())
    }

    /// Combinational update of the component's outputs.
    ///
    /// # Errors
    ///
    /// Returns an error when the control word asks for a forbidden combination.
    fn always(&mut self, wires: &Wires) -> Result<(), SimError> {
        let _ = wires;
        Ok(())
    }

    /// Returns the component to its power-on state.
    fn reset(&mut self);
}

/// Low byte of a 16-bit value.
#[must_use]
pub const fn low_byte(value: u16) -> u8 {
    value.to_le_bytes()[0]
}

/// High byte of a 16-bit value.
#[must_use]
pub const fn high_byte(value: u16) -> u8 {
    value.to_le_bytes()[1]
}
