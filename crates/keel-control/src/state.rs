//! Session state machine.
//!
//! RUNNING implies the rider is engaged and no fault is active. Every stop
//! goes through `stop()`, which records why; the only way back to RUNNING
//! is `engage()` from READY, so a stop can never silently un-happen.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunState {
    /// Package switched off, no output at all.
    Disabled,
    /// Waiting for the attitude filter to converge.
    Startup,
    /// Idle, waiting for a valid engagement.
    Ready,
    /// Actively balancing.
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    #[default]
    Normal,
    /// Bench testing in hand; output current is capped low.
    Handtest,
    /// No footpads, board spun as a flywheel.
    Flywheel,
}

/// Why the setpoint is currently being pushed away from level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetpointAdjustment {
    #[default]
    None,
    /// Ramping from the engage pitch down to level.
    Centering,
    ReverseStop,
    Duty,
    HighVoltage,
    LowVoltage,
    Temperature,
    Surge,
    Traction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopCondition {
    #[default]
    None,
    /// Injected at STARTUP -> READY so the rider must actively engage.
    Startup,
    Pitch,
    Roll,
    SwitchHalf,
    SwitchFull,
    Quickstop,
    ReverseStop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct State {
    pub run: RunState,
    pub mode: Mode,
    pub sat: SetpointAdjustment,
    pub stop_condition: StopCondition,
    pub wheelslip: bool,
    pub darkride: bool,
}

impl State {
    pub fn new(mode: Mode) -> Self {
        Self {
            run: RunState::Startup,
            mode,
            sat: SetpointAdjustment::None,
            stop_condition: StopCondition::None,
            wheelslip: false,
            darkride: false,
        }
    }

    /// STARTUP -> READY once attitude fusion converges. Deliberately lands
    /// with a stop condition set, so the start conditions must be satisfied
    /// actively rather than the board auto-engaging.
    pub fn startup_done(&mut self) {
        if self.run == RunState::Startup {
            self.run = RunState::Ready;
            self.stop_condition = StopCondition::Startup;
            info!("attitude converged, ready");
        }
    }

    /// READY -> RUNNING. Returns false from any other state.
    pub fn engage(&mut self) -> bool {
        if self.run != RunState::Ready {
            return false;
        }
        self.run = RunState::Running;
        self.sat = SetpointAdjustment::Centering;
        self.stop_condition = StopCondition::None;
        self.wheelslip = false;
        info!("engaged");
        true
    }

    /// RUNNING -> READY with the reason recorded. Idempotent: calling it
    /// again while already stopped keeps the original stop condition.
    pub fn stop(&mut self, why: StopCondition) -> bool {
        if self.run != RunState::Running {
            return false;
        }
        self.run = RunState::Ready;
        self.stop_condition = why;
        self.sat = SetpointAdjustment::None;
        self.wheelslip = false;
        warn!("stopped: {}", why);
        true
    }

    pub fn disable(&mut self) {
        self.run = RunState::Disabled;
        self.sat = SetpointAdjustment::None;
        self.wheelslip = false;
        self.darkride = false;
    }

    /// DISABLED -> STARTUP; attitude must converge again before READY.
    pub fn enable(&mut self) {
        if self.run == RunState::Disabled {
            self.run = RunState::Startup;
            self.stop_condition = StopCondition::None;
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new(Mode::Normal)
    }
}
