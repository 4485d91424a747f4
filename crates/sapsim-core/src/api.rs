//! Host-facing types: configuration, run outcomes, snapshots and the
//! system-call hook.

use crate::clock::Phase;
use crate::control::ControlWord;
use crate::memory::Memory;
use crate::registers::REGISTER_CELLS;

/// Default number of RAM bytes copied into each snapshot.
pub const DEFAULT_SNAPSHOT_MEMORY_WINDOW: usize = 256;

/// Default half-tick budget for [`crate::Computer::run_default`].
pub const DEFAULT_RUN_BUDGET: u64 = 2000;

/// Configuration that survives resets.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ComputerConfig {
    /// Bytes of RAM, from address zero, copied into each snapshot.
    pub snapshot_memory_window: usize,
    /// Half-tick budget used by [`crate::Computer::run_default`].
    pub default_run_budget: u64,
    /// Record a snapshot after every half-tick.
    pub record_history: bool,
}

impl Default for ComputerConfig {
    fn default() -> Self {
        Self {
            snapshot_memory_window: DEFAULT_SNAPSHOT_MEMORY_WINDOW,
            default_run_budget: DEFAULT_RUN_BUDGET,
            record_history: true,
        }
    }
}

/// Result of a bounded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RunOutcome {
    /// Half-ticks executed by this call.
    pub half_ticks: u64,
    /// `true` when the run stopped on `HLT` rather than on the budget.
    pub halted: bool,
}

/// Immutable copy of every component taken after a half-tick.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ComputerState {
    /// Half-ticks elapsed when the snapshot was taken.
    pub half_ticks: u64,
    /// Phase of the half-tick that produced the snapshot.
    pub phase: Phase,
    /// Control word.
    pub control_word: ControlWord,
    /// Register cells: B C D E H L W Z PCP PCC SPS SPP.
    pub registers: [u8; REGISTER_CELLS],
    /// Instruction register.
    pub ir: u8,
    /// Accumulator.
    pub alu_acc: u8,
    /// Shadow accumulator.
    pub alu_stored: u8,
    /// Operand latch.
    pub alu_tmp: u8,
    /// Uncommitted carry.
    pub alu_carry: bool,
    /// Flag register.
    pub alu_flags: u8,
    /// Bus value.
    pub bus: u16,
    /// RAM window from address zero.
    pub memory: Vec<u8>,
    /// Memory-address register.
    pub mar: u16,
    /// Controller stage.
    pub stage: u8,
    /// Last stage of the current instruction.
    pub stage_max: u8,
    /// Stage reset flag.
    pub stage_rst: bool,
    /// Output latch.
    pub out: u8,
}

impl ComputerState {
    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        u16::from_be_bytes([self.registers[8], self.registers[9]])
    }

    /// Stack pointer.
    #[must_use]
    pub const fn sp(&self) -> u16 {
        u16::from_be_bytes([self.registers[10], self.registers[11]])
    }
}

/// Host hook for `CALL 0x0005`.
///
/// Invoked synchronously during the tock that decodes the call, after the
/// controller has produced its control word and before any latch commits.
pub trait SystemCallHandler {
    /// Handles one call with function number `c` and argument `de`.
    fn on_system_call(&mut self, c: u8, de: u16, memory: &Memory);
}

impl SystemCallHandler for () {
    fn on_system_call(&mut self, _c: u8, _de: u16, _memory: &Memory) {}
}

impl<F> SystemCallHandler for F
where
    F: FnMut(u8, u16, &Memory),
{
    fn on_system_call(&mut self, c: u8, de: u16, memory: &Memory) {
        self(c, de, memory);
    }
}
