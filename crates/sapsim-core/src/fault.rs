use thiserror::Error;

use crate::alu::AluOp;

/// Error classes used for diagnostics and host policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorClass {
    /// A component observed a signal combination the hardware forbids.
    Protocol,
    /// The microcode table asked for something it cannot deliver.
    Microcode,
    /// The program image could not be loaded.
    Load,
}

/// Fatal simulator conditions.
///
/// Protocol and microcode errors are latched by [`crate::Computer`]: once one
/// is raised every further half-tick returns it again until the next reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SimError {
    /// More than one unit asserted its output enable during the same tock.
    #[error("bus contention: {drivers} drivers enabled")]
    BusContention {
        /// Number of output enables asserted.
        drivers: u8,
    },
    /// More than one of `ALU_A_WE`, `ALU_A_RESTORE`, `ALU_CS` was asserted.
    #[error("conflicting accumulator write signals")]
    AccumulatorConflict,
    /// `MEM_MAR_WE` and `MEM_WE` were asserted together.
    #[error("memory address and data written in the same tick")]
    MemoryWriteConflict,
    /// An instruction handler was entered at a stage it does not define.
    #[error("opcode {opcode:#04x} has no stage {stage} (stage_max {stage_max})")]
    InvalidStage {
        /// Opcode held in the instruction register.
        opcode: u8,
        /// Offending stage.
        stage: u8,
        /// Last stage of the instruction.
        stage_max: u8,
    },
    /// The ALU operation exists but is not implemented.
    #[error("alu operation {0:?} is not supported")]
    UnsupportedAluOp(AluOp),
    /// The 5-bit ALU operation code does not name an operation.
    #[error("invalid alu operation code {0}")]
    InvalidAluOp(u8),
    /// The register selector addresses no cell.
    #[error("invalid register select {0:#07b}")]
    InvalidRegisterSelect(u8),
    /// Increment/decrement was requested on a single byte register.
    #[error("register extend on byte select {0:#07b}")]
    ExtendOnByteRegister(u8),
    /// The program image does not fit in memory.
    #[error("program of {len} bytes exceeds memory capacity of {capacity}")]
    ProgramTooLarge {
        /// Image length in bytes.
        len: usize,
        /// Memory capacity in bytes.
        capacity: usize,
    },
}

impl SimError {
    /// Returns the diagnostics class for this error.
    #[must_use]
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::BusContention { .. }
            | Self::AccumulatorConflict
            | Self::MemoryWriteConflict
            | Self::ExtendOnByteRegister(_) => ErrorClass::Protocol,
            Self::InvalidStage { .. }
            | Self::UnsupportedAluOp(_)
            | Self::InvalidAluOp(_)
            | Self::InvalidRegisterSelect(_) => ErrorClass::Microcode,
            Self::ProgramTooLarge { .. } => ErrorClass::Load,
        }
    }

    /// Errors that leave the computer unable to continue until reset.
    #[must_use]
    pub const fn is_latching(self) -> bool {
        !matches!(self.class(), ErrorClass::Load)
    }
}

/// Why the controller asserted `HLT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum HaltReason {
    /// The program executed `HLT`.
    Instruction,
    /// The opcode has no microcode; the controller halted instead.
    UnimplementedOpcode {
        /// Opcode held in the instruction register.
        opcode: u8,
        /// Address the opcode was fetched from.
        address: u16,
    },
}
