//! Cycle-accurate simulator for a microcoded 8080-class CPU.
//!
//! Every component implements [`Clocked`]; the [`Computer`] drives them
//! through alternating tock/tick half-cycles and records a
//! [`ComputerState`] after each one.

/// Typed control word and its signal bits.
pub mod control;
pub use control::{ControlWord, RegExt, Signal};

/// Shared wire bundle and the four-operation clocked trait.
pub mod clocked;
pub use clocked::{high_byte, low_byte, Clocked, Wires};

/// Error taxonomy and halt diagnostics.
pub mod fault;
pub use fault::{ErrorClass, HaltReason, SimError};

/// Half-tick clock.
pub mod clock;
pub use clock::{Clock, Phase};

/// Single-driver data bus.
pub mod bus;
pub use bus::Bus;

/// Byte-cell register file and pair addressing.
pub mod registers;
pub use registers::{RegisterSelect, Registers, REGISTER_CELLS};

/// Arithmetic-logic unit.
pub mod alu;
pub use alu::{
    Alu, AluOp, FlagsUpdate, FLAG_CARRY, FLAG_MASK, FLAG_PARITY, FLAG_SIGN, FLAG_ZERO,
};

/// RAM with address register and read latch.
pub mod memory;
pub use memory::{Memory, MEMORY_BYTES};

/// Opcode latch.
pub mod instruction_register;
pub use instruction_register::InstructionRegister;

/// Instruction decode and per-stage microcode.
pub mod controller;
pub use controller::{
    disassemble, Condition, Controller, DisassemblyRow, Instruction, SystemCall,
    FIRST_EXECUTE_STAGE, SYSTEM_CALL_VECTOR,
};

/// Host-facing configuration, snapshot and system-call contract.
pub mod api;
pub use api::{
    ComputerConfig, ComputerState, RunOutcome, SystemCallHandler, DEFAULT_RUN_BUDGET,
    DEFAULT_SNAPSHOT_MEMORY_WINDOW,
};

/// Half-tick orchestration of every component.
pub mod computer;
pub use computer::Computer;

/// Program image and label map.
pub mod program;
pub use program::Program;

/// Breakpoints, call frames and stepping modes.
pub mod session;
pub use session::{Frame, Session, StepMode, Stop, StopEvent};

/// System-call handlers.
pub mod peripherals;
pub use peripherals::console::BdosConsole;

#[cfg(test)]
use proptest as _;
