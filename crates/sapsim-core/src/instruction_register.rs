use crate::clocked::{Clocked, Wires};
use crate::control::Signal;
use crate::fault::SimError;

/// Latches the fetched opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstructionRegister {
    value: u8,
}

impl InstructionRegister {
    /// Latched opcode.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.value
    }
}

impl Clocked for InstructionRegister {
    fn posedge(&mut self, wires: &Wires) -> Result<(), SimError> {
        if wires.ctrl.contains(Signal::IrWe) {
            self.value = wires.bus_byte();
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.value = 0;
    }
}
