//! The computer: owns every component and drives the half-tick protocol.
//!
//! Per half-tick:
//!
//! | phase | order |
//! |-------|-------|
//! | tock | controller negedge, ALU negedge, controller always, system call, registers always, ALU always, memory always, bus always |
//! | tick | registers posedge, IR posedge, memory posedge, ALU posedge, OUT latch |
//!
//! A snapshot is appended after each half-tick, then the clock advances.

use crate::alu::Alu;
use crate::api::{ComputerConfig, ComputerState, RunOutcome, SystemCallHandler};
use crate::bus::Bus;
use crate::clock::{Clock, Phase};
use crate::clocked::{Clocked, Wires};
use crate::control::Signal;
use crate::controller::{disassemble, Controller};
use crate::fault::{HaltReason, SimError};
use crate::instruction_register::InstructionRegister;
use crate::memory::Memory;
use crate::registers::Registers;

/// A complete simulated machine.
pub struct Computer {
    clock: Clock,
    controller: Controller,
    registers: Registers,
    ir: InstructionRegister,
    alu: Alu,
    bus: Bus,
    memory: Memory,
    reset_pending: bool,
    out: u8,
    config: ComputerConfig,
    handler: Box<dyn SystemCallHandler>,
    fault: Option<SimError>,
    history: Vec<ComputerState>,
}

impl core::fmt::Debug for Computer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Computer")
            .field("half_ticks", &self.clock.half_ticks())
            .field("stage", &self.controller.stage())
            .field("pc", &self.registers.pc())
            .field("fault", &self.fault)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl Default for Computer {
    fn default() -> Self {
        Self::new(ComputerConfig::default())
    }
}

impl Computer {
    /// Creates a powered-on computer with empty memory.
    #[must_use]
    pub fn new(config: ComputerConfig) -> Self {
        let mut computer = Self {
            clock: Clock::default(),
            controller: Controller::default(),
            registers: Registers::default(),
            ir: InstructionRegister::default(),
            alu: Alu::default(),
            bus: Bus::default(),
            memory: Memory::default(),
            reset_pending: false,
            out: 0,
            config,
            handler: Box::new(()),
            fault: None,
            history: Vec::new(),
        };
        computer.record_power_on();
        computer
    }

    /// Creates a computer with default configuration and `image` loaded.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ProgramTooLarge`] when the image does not fit.
    pub fn with_program(image: &[u8]) -> Result<Self, SimError> {
        let mut computer = Self::default();
        computer.reset(Some(image))?;
        Ok(computer)
    }

    /// Replaces the system-call handler. The handler survives resets.
    pub fn set_system_call_handler<H>(&mut self, handler: H)
    where
        H: SystemCallHandler + 'static,
    {
        self.handler = Box::new(handler);
    }

    /// Recreates every component, optionally loading `image`, and restarts
    /// the history with one power-on snapshot. Clears any latched fault.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ProgramTooLarge`] when the image does not fit; the
    /// computer is still reset, with empty memory.
    pub fn reset(&mut self, image: Option<&[u8]>) -> Result<(), SimError> {
        self.reset_components();
        self.reset_pending = false;
        self.out = 0;
        self.fault = None;
        let loaded = image.map_or(Ok(()), |bytes| self.memory.load(bytes));
        self.record_power_on();
        loaded
    }

    /// Raises the reset line: the next half-tick resets every component,
    /// zeroes RAM, and records no snapshot.
    pub const fn pulse_reset(&mut self) {
        self.reset_pending = true;
    }

    /// Runs one half-tick.
    ///
    /// # Errors
    ///
    /// Returns the error raised by a component. The error is latched and
    /// every later half-tick returns it again until [`Self::reset`].
    pub fn half_tick(&mut self) -> Result<(), SimError> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }
        if self.reset_pending {
            log::debug!("reset pulse");
            self.reset_components();
            self.reset_pending = false;
            return Ok(());
        }

        let phase = self.clock.phase();
        let result = match phase {
            Phase::Tock => self.tock(),
            Phase::Tick => self.tick(),
        };
        if let Err(err) = result {
            log::error!(
                "{err} at half-tick {} (pc {:#06x}, ir {:#04x}, stage {})",
                self.clock.half_ticks(),
                self.registers.pc(),
                self.ir.value(),
                self.controller.stage()
            );
            if err.is_latching() {
                self.fault = Some(err);
            }
            return Err(err);
        }

        log::trace!(
            "{phase:?} {} stage {} ctrl {:#010x} bus {:#06x}",
            self.clock.half_ticks(),
            self.controller.stage(),
            self.controller.control_word().bits(),
            self.bus.value()
        );
        if self.config.record_history {
            let snapshot = self.snapshot();
            self.history.push(snapshot);
        }
        self.clock.advance();
        Ok(())
    }

    /// Executes one instruction: tock/tick pairs until the controller marks
    /// its last stage. Returns the snapshots recorded for this instruction
    /// (empty when history recording is disabled).
    ///
    /// # Errors
    ///
    /// Returns the first error raised during the instruction.
    pub fn step(&mut self) -> Result<&[ComputerState], SimError> {
        self.history.clear();
        self.controller.clear_skip_call();
        loop {
            self.half_tick()?;
            self.half_tick()?;
            if self.controller.stage_rst() {
                break;
            }
        }
        Ok(&self.history)
    }

    /// Runs until `max_half_ticks` half-ticks elapse or the machine halts.
    ///
    /// # Errors
    ///
    /// Returns the first error raised during the run.
    pub fn run(&mut self, max_half_ticks: u64) -> Result<RunOutcome, SimError> {
        let mut half_ticks = 0;
        while half_ticks < max_half_ticks && !self.is_halted() {
            self.half_tick()?;
            half_ticks += 1;
        }
        let halted = self.is_halted();
        if halted {
            log::info!(
                "halted after {half_ticks} half-ticks: {:?}",
                self.controller.halt_reason()
            );
        }
        Ok(RunOutcome { half_ticks, halted })
    }

    /// [`Self::run`] with the configured default budget.
    ///
    /// # Errors
    ///
    /// Returns the first error raised during the run.
    pub fn run_default(&mut self) -> Result<RunOutcome, SimError> {
        self.run(self.config.default_run_budget)
    }

    /// `true` while the control word asserts `HLT` without the output bit.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.controller.control_word().is_halted()
    }

    /// Why the machine last halted.
    #[must_use]
    pub const fn halt_reason(&self) -> Option<HaltReason> {
        self.controller.halt_reason()
    }

    /// Latched fault, if any.
    #[must_use]
    pub const fn fault(&self) -> Option<SimError> {
        self.fault
    }

    /// Last value latched by `OUT`.
    #[must_use]
    pub const fn out(&self) -> u8 {
        self.out
    }

    /// Snapshots recorded since the last reset or step.
    #[must_use]
    pub fn history(&self) -> &[ComputerState] {
        &self.history
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &ComputerConfig {
        &self.config
    }

    /// Clock.
    #[must_use]
    pub const fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Controller.
    #[must_use]
    pub const fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Instruction register.
    #[must_use]
    pub const fn ir(&self) -> &InstructionRegister {
        &self.ir
    }

    /// ALU.
    #[must_use]
    pub const fn alu(&self) -> &Alu {
        &self.alu
    }

    /// Bus.
    #[must_use]
    pub const fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Memory.
    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ComputerState {
        let window = self.config.snapshot_memory_window.min(self.memory.bytes().len());
        ComputerState {
            half_ticks: self.clock.half_ticks(),
            phase: self.clock.phase(),
            control_word: self.controller.control_word(),
            registers: *self.registers.cells(),
            ir: self.ir.value(),
            alu_acc: self.alu.acc(),
            alu_stored: self.alu.stored(),
            alu_tmp: self.alu.tmp(),
            alu_carry: self.alu.carry(),
            alu_flags: self.alu.flags(),
            bus: self.bus.value(),
            memory: self.memory.bytes()[..window].to_vec(),
            mar: self.memory.mar(),
            stage: self.controller.stage(),
            stage_max: self.controller.stage_max(),
            stage_rst: self.controller.stage_rst(),
            out: self.out,
        }
    }

    fn wires(&self) -> Wires {
        let pc = self.registers.pc();
        Wires {
            ctrl: self.controller.control_word(),
            bus: self.bus.value(),
            ir: self.ir.value(),
            reg_out: self.registers.out(),
            alu_out: self.alu.out(),
            alu_flags: self.alu.flags_out(),
            mem_out: self.memory.out(),
            pc,
            c: self.registers.c(),
            de: self.registers.de(),
            operand: self.memory.read_word(pc),
        }
    }

    fn tock(&mut self) -> Result<(), SimError> {
        self.controller.negedge(&self.wires())?;
        self.alu.negedge(&self.wires())?;
        self.controller.always(&self.wires())?;
        if let Some(call) = self.controller.take_system_call() {
            log::info!("system call C={} DE={:#06x}", call.c, call.de);
            self.handler.on_system_call(call.c, call.de, &self.memory);
        }
        self.registers.always(&self.wires())?;
        self.alu.always(&self.wires())?;
        self.memory.always(&self.wires())?;
        self.bus.always(&self.wires())
    }

    fn tick(&mut self) -> Result<(), SimError> {
        let fetch_address = self.registers.pc();
        self.registers.posedge(&self.wires())?;
        self.ir.posedge(&self.wires())?;
        self.memory.posedge(&self.wires())?;
        self.alu.posedge(&self.wires())?;

        let ctrl = self.controller.control_word();
        if ctrl.contains(Signal::IrWe) && log::log_enabled!(log::Level::Debug) {
            let row = disassemble(&self.memory, fetch_address);
            log::debug!("fetch {:#06x}: {}", row.address, row.text);
        }
        if ctrl.is_output() {
            self.out = self.alu.out();
            log::info!("OUT {:#04x} ({})", self.out, self.out);
        }
        Ok(())
    }

    fn reset_components(&mut self) {
        self.clock.reset();
        self.controller.reset();
        self.registers.reset();
        self.ir.reset();
        self.alu.reset();
        self.bus.reset();
        self.memory.reset();
    }

    fn record_power_on(&mut self) {
        self.history.clear();
        if self.config.record_history {
            let mut snapshot = self.snapshot();
            snapshot.stage_max = 0;
            self.history.push(snapshot);
        }
    }

    #[cfg(test)]
    pub(crate) fn force_control_word(&mut self, word: crate::control::ControlWord) {
        self.controller.force_control_word(word);
    }
}

#[cfg(test)]
mod tests {
    use super::Computer;
    use crate::api::ComputerConfig;
    use crate::clock::Phase;
    use crate::control::{ControlWord, Signal};
    use crate::fault::SimError;

    #[test]
    fn power_on_history_holds_one_snapshot_with_zero_stage_max() {
        let computer = Computer::default();
        assert_eq!(computer.history().len(), 1);
        assert_eq!(computer.history()[0].stage_max, 0);
        assert_eq!(computer.history()[0].phase, Phase::Tock);
    }

    #[test]
    fn component_error_on_tick_is_latched() {
        let mut computer = Computer::default();
        computer.half_tick().unwrap();
        computer.force_control_word(
            ControlWord::EMPTY
                .with(Signal::AluAWe)
                .with(Signal::AluARestore),
        );
        assert_eq!(computer.half_tick(), Err(SimError::AccumulatorConflict));
        assert_eq!(computer.half_tick(), Err(SimError::AccumulatorConflict));
        assert_eq!(computer.fault(), Some(SimError::AccumulatorConflict));
        computer.reset(None).unwrap();
        assert_eq!(computer.fault(), None);
        computer.half_tick().unwrap();
    }

    #[test]
    fn memory_conflict_on_tick_is_latched() {
        let mut computer = Computer::default();
        computer.half_tick().unwrap();
        computer.force_control_word(
            ControlWord::EMPTY
                .with(Signal::MemWe)
                .with(Signal::MemMarWe),
        );
        assert_eq!(computer.half_tick(), Err(SimError::MemoryWriteConflict));
        assert_eq!(computer.run(10), Err(SimError::MemoryWriteConflict));
    }

    #[test]
    fn disabling_history_records_nothing() {
        let mut computer = Computer::new(ComputerConfig {
            record_history: false,
            ..ComputerConfig::default()
        });
        computer.reset(Some(&[0x76])).unwrap();
        assert!(computer.history().is_empty());
        assert!(computer.step().unwrap().is_empty());
    }

    #[test]
    fn snapshot_window_follows_config() {
        let computer = Computer::new(ComputerConfig {
            snapshot_memory_window: 16,
            ..ComputerConfig::default()
        });
        assert_eq!(computer.history()[0].memory.len(), 16);
    }
}
