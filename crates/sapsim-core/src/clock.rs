/// Phase of the half-tick about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Phase {
    /// Falling edge: the controller advances and decides the control word.
    Tock,
    /// Rising edge: gated components latch the bus.
    Tick,
}

/// Half-tick counter. Whole counts are tocks and half counts are ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Clock {
    half_ticks: u64,
}

impl Clock {
    /// Number of half-ticks elapsed since reset.
    #[must_use]
    pub const fn half_ticks(&self) -> u64 {
        self.half_ticks
    }

    /// Full clock cycles elapsed since reset.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.half_ticks / 2
    }

    /// Phase of the next half-tick.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        if self.half_ticks % 2 == 0 {
            Phase::Tock
        } else {
            Phase::Tick
        }
    }

    /// Returns `true` when the next half-tick is a falling edge.
    #[must_use]
    pub const fn is_tock(&self) -> bool {
        matches!(self.phase(), Phase::Tock)
    }

    /// Advances by one half-tick.
    pub const fn advance(&mut self) {
        self.half_ticks += 1;
    }

    /// Returns to zero, so the next half-tick is a tock.
    pub const fn reset(&mut self) {
        self.half_ticks = 0;
    }
}
