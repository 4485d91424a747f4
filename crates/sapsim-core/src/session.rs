//! Debug session: breakpoints, call frames and stepping modes on top of a
//! [`Computer`] running a labelled [`Program`].

use std::collections::BTreeSet;

use crate::api::ComputerConfig;
use crate::computer::Computer;
use crate::controller::{Instruction, FIRST_EXECUTE_STAGE};
use crate::fault::{HaltReason, SimError};
use crate::program::Program;

/// Name of the outermost frame.
pub const ROOT_FRAME: &str = "__main__";

/// Name given to frames whose entry address has no label.
pub const UNKNOWN_FRAME: &str = "unknown";

/// How far a [`Session::run`] call proceeds before stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StepMode {
    /// One instruction, entering calls.
    Into,
    /// One instruction; a call runs until it returns.
    Over,
    /// Until the current frame returns.
    Out,
    /// Until a breakpoint or halt.
    Continue,
}

/// Call frame opened by a taken `CALL`/`Ccc`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Frame {
    /// Label of the entry address, [`ROOT_FRAME`] or [`UNKNOWN_FRAME`].
    pub name: String,
    /// Address the frame was entered at.
    pub entry: u16,
}

/// Why a [`Session::run`] call stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StopEvent {
    /// A single step completed.
    Step {
        /// Program counter after the step.
        pc: u16,
    },
    /// The program counter reached a breakpoint.
    Breakpoint {
        /// Breakpoint address.
        pc: u16,
    },
    /// The frame being stepped over or out of returned.
    SteppedOut {
        /// Frame that returned.
        frame: String,
        /// Program counter after the return.
        pc: u16,
    },
    /// The machine halted.
    Halted {
        /// Halt diagnostic.
        reason: Option<HaltReason>,
        /// Program counter after the halting instruction.
        pc: u16,
    },
    /// The step budget ran out first.
    BudgetExhausted,
}

/// Result of a [`Session::run`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Stop {
    /// Instructions executed.
    pub steps: u64,
    /// Reason for stopping.
    pub event: StopEvent,
}

/// Computer plus program, breakpoints and call frames.
#[derive(Debug)]
pub struct Session {
    computer: Computer,
    program: Program,
    breakpoints: BTreeSet<u16>,
    frames: Vec<Frame>,
}

impl Session {
    /// Loads `program` into a fresh computer.
    ///
    /// # Errors
    ///
    /// Cannot fail for a validated [`Program`]; propagates the load error
    /// otherwise.
    pub fn new(program: Program, config: ComputerConfig) -> Result<Self, SimError> {
        let mut computer = Computer::new(config);
        computer.reset(Some(program.bytes()))?;
        Ok(Self {
            computer,
            program,
            breakpoints: BTreeSet::new(),
            frames: vec![root_frame()],
        })
    }

    /// Reloads the program and drops every frame. Breakpoints and the
    /// system-call handler are kept.
    ///
    /// # Errors
    ///
    /// Propagates the load error.
    pub fn restart(&mut self) -> Result<(), SimError> {
        self.computer.reset(Some(self.program.bytes()))?;
        self.frames = vec![root_frame()];
        Ok(())
    }

    /// The machine.
    #[must_use]
    pub const fn computer(&self) -> &Computer {
        &self.computer
    }

    /// The machine, for installing handlers or poking state.
    pub const fn computer_mut(&mut self) -> &mut Computer {
        &mut self.computer
    }

    /// The loaded program.
    #[must_use]
    pub const fn program(&self) -> &Program {
        &self.program
    }

    /// Call frames, outermost first.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Breakpoint addresses.
    #[must_use]
    pub const fn breakpoints(&self) -> &BTreeSet<u16> {
        &self.breakpoints
    }

    /// Adds a breakpoint; returns `false` if it was already set.
    pub fn set_breakpoint(&mut self, address: u16) -> bool {
        self.breakpoints.insert(address)
    }

    /// Adds a breakpoint at a label's address.
    pub fn set_breakpoint_at_label(&mut self, label: &str) -> Option<u16> {
        let address = self.program.address_of(label)?;
        self.breakpoints.insert(address);
        Some(address)
    }

    /// Removes a breakpoint; returns `false` if it was not set.
    pub fn clear_breakpoint(&mut self, address: u16) -> bool {
        self.breakpoints.remove(&address)
    }

    /// Removes every breakpoint.
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// Executes instructions in `mode` until a stop event or until
    /// `max_steps` instructions have run. A step over or out that runs out
    /// of budget is abandoned; the next call starts afresh.
    ///
    /// # Errors
    ///
    /// Returns the first simulator error.
    pub fn run(&mut self, mode: StepMode, max_steps: u64) -> Result<Stop, SimError> {
        let mut return_depth =
            (mode == StepMode::Out && self.frames.len() > 1).then(|| self.frames.len() - 1);
        let mut steps = 0;
        while steps < max_steps {
            steps += 1;
            if let Some(event) = self.step_instruction(mode, &mut return_depth)? {
                log::debug!("stopped after {steps} steps: {event:?}");
                return Ok(Stop { steps, event });
            }
        }
        Ok(Stop {
            steps,
            event: StopEvent::BudgetExhausted,
        })
    }

    fn step_instruction(
        &mut self,
        mode: StepMode,
        return_depth: &mut Option<usize>,
    ) -> Result<Option<StopEvent>, SimError> {
        self.computer.step()?;
        let pc = self.computer.registers().pc();

        match Instruction::decode(self.computer.ir().value()) {
            Instruction::Call { .. } if !self.computer.controller().skip_call() => {
                let name = self.program.label_at(pc).unwrap_or(UNKNOWN_FRAME);
                self.frames.push(Frame {
                    name: name.to_owned(),
                    entry: pc,
                });
                if mode == StepMode::Over && return_depth.is_none() {
                    *return_depth = Some(self.frames.len() - 1);
                }
                if mode != StepMode::Into {
                    return Ok(self.breakpoint(pc));
                }
            }
            Instruction::Return { .. }
                if self.computer.controller().stage() > FIRST_EXECUTE_STAGE
                    && self.frames.len() > 1 =>
            {
                let frame = self.frames.pop();
                if mode != StepMode::Into && *return_depth == Some(self.frames.len()) {
                    if let Some(frame) = frame {
                        return Ok(Some(StopEvent::SteppedOut {
                            frame: frame.name,
                            pc,
                        }));
                    }
                }
            }
            _ => {}
        }

        if self.computer.is_halted() {
            return Ok(Some(StopEvent::Halted {
                reason: self.computer.halt_reason(),
                pc,
            }));
        }
        if let Some(event) = self.breakpoint(pc) {
            return Ok(Some(event));
        }
        let keep_going = mode == StepMode::Continue
            || (mode != StepMode::Into && return_depth.is_some());
        Ok((!keep_going).then_some(StopEvent::Step { pc }))
    }

    fn breakpoint(&self, pc: u16) -> Option<StopEvent> {
        self.breakpoints
            .contains(&pc)
            .then_some(StopEvent::Breakpoint { pc })
    }
}

fn root_frame() -> Frame {
    Frame {
        name: ROOT_FRAME.to_owned(),
        entry: 0,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{Session, StepMode, StopEvent, ROOT_FRAME};
    use crate::api::ComputerConfig;
    use crate::fault::HaltReason;
    use crate::program::Program;

    // 0x00 LXI SP,0x0100
    // 0x03 CALL sub
    // 0x06 MVI B,0x02
    // 0x08 HLT
    // 0x09 sub: MVI A,0x07
    // 0x0B RET
    const CALLER: [u8; 12] = [
        0x31, 0x00, 0x01, 0xCD, 0x09, 0x00, 0x06, 0x02, 0x76, 0x3E, 0x07, 0xC9,
    ];

    fn session() -> Session {
        let labels = BTreeMap::from([("start".to_owned(), 0), ("sub".to_owned(), 9)]);
        let program = Program::new(CALLER.to_vec())
            .unwrap()
            .with_labels(labels);
        Session::new(program, ComputerConfig::default()).unwrap()
    }

    #[test]
    fn step_into_pushes_a_labelled_frame_and_pops_on_return() {
        let mut session = session();
        let first = session.run(StepMode::Into, 1).unwrap();
        assert_eq!(first.event, StopEvent::Step { pc: 3 });

        let call = session.run(StepMode::Into, 1).unwrap();
        assert_eq!(call.event, StopEvent::Step { pc: 9 });
        assert_eq!(session.frames().len(), 2);
        assert_eq!(session.frames()[1].name, "sub");

        session.run(StepMode::Into, 1).unwrap();
        let ret = session.run(StepMode::Into, 1).unwrap();
        assert_eq!(ret.event, StopEvent::Step { pc: 6 });
        assert_eq!(session.frames().len(), 1);
        assert_eq!(session.frames()[0].name, ROOT_FRAME);
    }

    #[test]
    fn step_over_runs_the_callee_to_completion() {
        let mut session = session();
        session.run(StepMode::Into, 1).unwrap();
        let stop = session.run(StepMode::Over, 100).unwrap();
        assert_eq!(
            stop.event,
            StopEvent::SteppedOut {
                frame: "sub".to_owned(),
                pc: 6,
            }
        );
        assert_eq!(stop.steps, 3);
        assert_eq!(session.computer().alu().acc(), 7);
    }

    #[test]
    fn step_out_leaves_the_current_frame() {
        let mut session = session();
        session.run(StepMode::Into, 1).unwrap();
        session.run(StepMode::Into, 1).unwrap();
        assert_eq!(session.frames().len(), 2);
        let stop = session.run(StepMode::Out, 100).unwrap();
        assert!(matches!(stop.event, StopEvent::SteppedOut { pc: 6, .. }));
    }

    #[test]
    fn continue_stops_at_breakpoints_then_halts() {
        let mut session = session();
        assert_eq!(session.set_breakpoint_at_label("sub"), Some(9));
        let stop = session.run(StepMode::Continue, 100).unwrap();
        assert_eq!(stop.event, StopEvent::Breakpoint { pc: 9 });

        let stop = session.run(StepMode::Continue, 100).unwrap();
        assert_eq!(
            stop.event,
            StopEvent::Halted {
                reason: Some(HaltReason::Instruction),
                pc: 9,
            }
        );
        assert_eq!(session.computer().registers().b(), 2);
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let mut session = session();
        let stop = session.run(StepMode::Continue, 2).unwrap();
        assert_eq!(stop.event, StopEvent::BudgetExhausted);
        assert_eq!(stop.steps, 2);
    }

    #[test]
    fn unfinished_step_over_does_not_leak_into_the_next_run() {
        let mut session = session();
        session.run(StepMode::Into, 1).unwrap();
        let stop = session.run(StepMode::Over, 1).unwrap();
        assert_eq!(stop.event, StopEvent::BudgetExhausted);
        assert_eq!(session.frames().len(), 2);

        let stop = session.run(StepMode::Continue, 100).unwrap();
        assert_eq!(
            stop.event,
            StopEvent::Halted {
                reason: Some(HaltReason::Instruction),
                pc: 9,
            }
        );
        assert_eq!(stop.steps, 4);
        assert_eq!(session.frames().len(), 1);
    }

    #[test]
    fn step_over_after_an_abandoned_call_single_steps() {
        let mut session = session();
        session.run(StepMode::Into, 1).unwrap();
        session.run(StepMode::Over, 1).unwrap();
        let stop = session.run(StepMode::Over, 1).unwrap();
        assert_eq!(stop.event, StopEvent::Step { pc: 0x0B });
        assert_eq!(stop.steps, 1);
    }

    #[test]
    fn restart_reloads_and_keeps_breakpoints() {
        let mut session = session();
        session.set_breakpoint(6);
        session.run(StepMode::Continue, 100).unwrap();
        session.restart().unwrap();
        assert_eq!(session.computer().registers().pc(), 0);
        assert_eq!(session.frames().len(), 1);
        assert!(session.breakpoints().contains(&6));
        assert!(session.clear_breakpoint(6));
        assert!(!session.clear_breakpoint(6));
    }
}
