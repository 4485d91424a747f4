use crate::clocked::{Clocked, Wires};
use crate::control::Signal;
use crate::fault::SimError;

/// Shared data path sampled from exactly one driver each tock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bus {
    value: u16,
}

impl Bus {
    /// Current bus value.
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.value
    }
}

impl Clocked for Bus {
    fn always(&mut self, wires: &Wires) -> Result<(), SimError> {
        let ctrl = wires.ctrl;
        let drivers = ctrl.output_enables();
        if drivers > 1 {
            return Err(SimError::BusContention { drivers });
        }
        self.value = if ctrl.contains(Signal::AluOe) {
            u16::from(wires.alu_out)
        } else if ctrl.contains(Signal::MemOe) {
            u16::from(wires.mem_out)
        } else if ctrl.contains(Signal::RegOe) {
            wires.reg_out
        } else if ctrl.contains(Signal::AluFlagsOe) {
            u16::from(wires.alu_flags)
        } else {
            0
        };
        Ok(())
    }

    fn reset(&mut self) {
        self.value = 0;
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::Bus;
    use crate::clocked::{Clocked, Wires};
    use crate::control::{ControlWord, Signal};
    use crate::fault::SimError;

    fn sources() -> Wires {
        Wires {
            reg_out: 0x1234,
            alu_out: 0x56,
            alu_flags: 0x0A,
            mem_out: 0x78,
            ..Wires::default()
        }
    }

    #[rstest]
    #[case::alu(Signal::AluOe, 0x56)]
    #[case::memory(Signal::MemOe, 0x78)]
    #[case::registers(Signal::RegOe, 0x1234)]
    #[case::flags(Signal::AluFlagsOe, 0x0A)]
    fn samples_the_single_enabled_driver(#[case] signal: Signal, #[case] expected: u16) {
        let mut bus = Bus::default();
        bus.always(&Wires {
            ctrl: ControlWord::EMPTY.with(signal),
            ..sources()
        })
        .unwrap();
        assert_eq!(bus.value(), expected);
    }

    #[test]
    fn idle_bus_reads_zero() {
        let mut bus = Bus::default();
        bus.always(&Wires {
            ctrl: ControlWord::EMPTY.with(Signal::RegOe),
            ..sources()
        })
        .unwrap();
        bus.always(&sources()).unwrap();
        assert_eq!(bus.value(), 0);
    }

    #[test]
    fn two_drivers_is_contention() {
        let mut bus = Bus::default();
        let ctrl = ControlWord::EMPTY
            .with(Signal::MemOe)
            .with(Signal::RegOe);
        assert_eq!(
            bus.always(&Wires {
                ctrl,
                ..sources()
            }),
            Err(SimError::BusContention { drivers: 2 })
        );
    }
}
