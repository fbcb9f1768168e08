//! Footpad sensor decoding and the engagement predicate.

use keel_config::{ms_to_ticks, BalanceConfig, FaultConfig};

use crate::state::Mode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FootpadState {
    #[default]
    None,
    Left,
    Right,
    Both,
}

impl FootpadState {
    /// Threshold-is-zero conventions: both thresholds zero means no sensors
    /// fitted (always engaged); one zero threshold means a single-sensor
    /// build on the other channel.
    pub fn read(adc1: f32, adc2: f32, faults: &FaultConfig) -> Self {
        if faults.adc1 == 0.0 && faults.adc2 == 0.0 {
            return FootpadState::Both;
        }
        if faults.adc2 == 0.0 {
            return if adc1 > faults.adc1 {
                FootpadState::Both
            } else {
                FootpadState::None
            };
        }
        if faults.adc1 == 0.0 {
            return if adc2 > faults.adc2 {
                FootpadState::Both
            } else {
                FootpadState::None
            };
        }
        match (adc1 > faults.adc1, adc2 > faults.adc2) {
            (true, true) => FootpadState::Both,
            (true, false) => FootpadState::Left,
            (false, true) => FootpadState::Right,
            (false, false) => FootpadState::None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Footpad {
    pub state: FootpadState,
    pub adc1: f32,
    pub adc2: f32,
}

impl Footpad {
    pub fn update(&mut self, adc1: f32, adc2: f32, faults: &FaultConfig) {
        self.adc1 = adc1;
        self.adc2 = adc2;
        self.state = FootpadState::read(adc1, adc2, faults);
    }

    /// Engagement predicate. A single pad counts only for dual-switch
    /// hardware or once the simple-start grace window since the last
    /// disengage has elapsed; that blocks accidental one-foot starts while
    /// still allowing quick jump-starts. Flywheel mode has no pads at all.
    pub fn is_engaged(&self, mode: Mode, ticks_since_disengage: u32, cfg: &BalanceConfig) -> bool {
        if mode == Mode::Flywheel {
            return true;
        }
        match self.state {
            FootpadState::Both => true,
            FootpadState::Left | FootpadState::Right => {
                if cfg.faults.is_dualswitch {
                    return true;
                }
                cfg.startup.simplestart_enabled
                    && ticks_since_disengage
                        > ms_to_ticks(cfg.startup.simplestart_grace_ms, cfg.loop_rate.frequency_hz)
            }
            FootpadState::None => false,
        }
    }
}
