//! Per-tick fault detection and the engagement gate.
//!
//! Checks run in a fixed order: switch faults before angle faults, because
//! "rider stepped off" should be reported before "board tipped over" even
//! when both became true in the same tick; quickstop and reverse-stop come
//! last. Every fault stops through `State::stop`, so re-running the check
//! in the same condition cannot toggle the state back.

use keel_config::{
    ms_to_ticks, BalanceConfig, StartupConfig, DIRTYLANDING_ERPM, DIRTYLANDING_PITCH_LIMIT,
    PUSHSTART_ANGLE_LIMIT, PUSHSTART_ERPM, QUICKSTOP_DELAY_MS, REVERSE_STOP_TOLERANCE,
    STANDSTILL_ERPM, SWITCH_FULL_LOWSPEED_MS,
};
use libm::fabsf;

use crate::footpad::{Footpad, FootpadState};
use crate::motor::MotorData;
use crate::state::{Mode, State, StopCondition};

pub struct FaultMonitor {
    hz: u16,
    switch_full_ticks: u32,
    switch_half_ticks: u32,
    roll_ticks: u32,
    pitch_ticks: u32,
    quickstop_ticks: u32,
    reverse_total_erpm: f32,
    reverse_active: bool,
}

impl FaultMonitor {
    pub fn new(hz: u16) -> Self {
        Self {
            hz,
            switch_full_ticks: 0,
            switch_half_ticks: 0,
            roll_ticks: 0,
            pitch_ticks: 0,
            quickstop_ticks: 0,
            reverse_total_erpm: 0.0,
            reverse_active: false,
        }
    }

    pub fn set_rate(&mut self, hz: u16) {
        self.hz = hz;
    }

    /// Clear all delay timers and the reverse accumulator; called on engage.
    pub fn reset(&mut self) {
        self.switch_full_ticks = 0;
        self.switch_half_ticks = 0;
        self.roll_ticks = 0;
        self.pitch_ticks = 0;
        self.quickstop_ticks = 0;
        self.reverse_total_erpm = 0.0;
        self.reverse_active = false;
    }

    /// True while reverse-stop is tilting the nose down toward a halt.
    pub fn reverse_active(&self) -> bool {
        self.reverse_active
    }

    /// Evaluate all fault conditions for one tick. `pitch` and `roll` are
    /// the darkride-adjusted angles. Returns the stop condition if this
    /// tick tripped one.
    pub fn check(
        &mut self,
        state: &mut State,
        footpad: &Footpad,
        pitch: f32,
        roll: f32,
        motor: &MotorData,
        cfg: &BalanceConfig,
    ) -> Option<StopCondition> {
        // 1. full switch release
        if state.mode != Mode::Flywheel && footpad.state == FootpadState::None {
            self.switch_full_ticks += 1;
            let mut limit = ms_to_ticks(cfg.faults.delay_switch_full_ms, self.hz);
            if motor.abs_erpm < STANDSTILL_ERPM {
                // barely moving, no reason to ride out a long delay
                limit = limit.min(ms_to_ticks(SWITCH_FULL_LOWSPEED_MS, self.hz));
            }
            if self.switch_full_ticks > limit && state.stop(StopCondition::SwitchFull) {
                return Some(StopCondition::SwitchFull);
            }
        } else {
            self.switch_full_ticks = 0;
        }

        // 2. half switch at low speed
        let half = footpad.state == FootpadState::Left || footpad.state == FootpadState::Right;
        if half && !cfg.faults.is_dualswitch && motor.abs_erpm < cfg.faults.adc_half_erpm {
            self.switch_half_ticks += 1;
            if self.switch_half_ticks > ms_to_ticks(cfg.faults.delay_switch_half_ms, self.hz)
                && state.stop(StopCondition::SwitchHalf)
            {
                return Some(StopCondition::SwitchHalf);
            }
        } else {
            self.switch_half_ticks = 0;
        }

        // 3. roll angle
        if fabsf(roll) > cfg.faults.roll {
            self.roll_ticks += 1;
            if self.roll_ticks > ms_to_ticks(cfg.faults.delay_roll_ms, self.hz)
                && state.stop(StopCondition::Roll)
            {
                return Some(StopCondition::Roll);
            }
        } else {
            self.roll_ticks = 0;
        }

        // 4. pitch angle
        if fabsf(pitch) > cfg.faults.pitch {
            self.pitch_ticks += 1;
            if self.pitch_ticks > ms_to_ticks(cfg.faults.delay_pitch_ms, self.hz)
                && state.stop(StopCondition::Pitch)
            {
                return Some(StopCondition::Pitch);
            }
        } else {
            self.pitch_ticks = 0;
        }

        // 5. quickstop: near-zero speed, large pitch in the direction of
        // travel; catches a stalled wheel before it can fling the rider
        if cfg.faults.quickstop_enabled
            && motor.abs_erpm < cfg.faults.quickstop_erpm
            && fabsf(pitch) > cfg.faults.quickstop_angle
            && pitch * motor.erpm_sign > 0.0
        {
            self.quickstop_ticks += 1;
            if self.quickstop_ticks > ms_to_ticks(QUICKSTOP_DELAY_MS, self.hz)
                && state.stop(StopCondition::Quickstop)
            {
                return Some(StopCondition::Quickstop);
            }
        } else {
            self.quickstop_ticks = 0;
        }

        // 6. reverse-stop escalation; darkride redefines forward, so it is
        // skipped upside-down
        if cfg.faults.reversestop_enabled && !state.darkride {
            if motor.erpm < -STANDSTILL_ERPM {
                self.reverse_active = true;
                self.reverse_total_erpm += motor.erpm;
                if -self.reverse_total_erpm > REVERSE_STOP_TOLERANCE
                    && state.stop(StopCondition::ReverseStop)
                {
                    return Some(StopCondition::ReverseStop);
                }
            } else if motor.erpm > STANDSTILL_ERPM {
                self.reverse_active = false;
                self.reverse_total_erpm = 0.0;
            }
        } else {
            self.reverse_active = false;
        }

        None
    }
}

/// READY -> RUNNING gate. Push-start and dirty-landings are deliberate
/// alternate paths with relaxed angle limits while already rolling.
pub fn can_engage(
    engaged: bool,
    pitch: f32,
    roll: f32,
    motor: &MotorData,
    startup: &StartupConfig,
) -> bool {
    if !engaged {
        return false;
    }
    let abs_pitch = fabsf(pitch);
    let abs_roll = fabsf(roll);
    if abs_pitch < startup.pitch_tolerance && abs_roll < startup.roll_tolerance {
        return true;
    }
    if startup.pushstart_enabled
        && motor.abs_erpm > PUSHSTART_ERPM
        && abs_pitch < PUSHSTART_ANGLE_LIMIT
        && abs_roll < PUSHSTART_ANGLE_LIMIT
    {
        return true;
    }
    if startup.dirtylandings_enabled
        && motor.abs_erpm > DIRTYLANDING_ERPM
        && abs_pitch < DIRTYLANDING_PITCH_LIMIT
        && abs_roll < startup.roll_tolerance
    {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_hardware::MotorTelemetry;

    fn motor_at(erpm: f32) -> MotorData {
        let mut m = MotorData::new(800, 4.0);
        m.update(&MotorTelemetry {
            erpm,
            ..MotorTelemetry::default()
        });
        m
    }

    fn running_state() -> State {
        let mut s = State::default();
        s.startup_done();
        assert!(s.engage());
        s
    }

    fn engaged_pad(cfg: &BalanceConfig) -> Footpad {
        let mut pad = Footpad::default();
        pad.update(3.0, 3.0, &cfg.faults);
        pad
    }

    #[test]
    fn pitch_fault_needs_the_full_delay() {
        let cfg = BalanceConfig::default();
        let mut mon = FaultMonitor::new(800);
        let mut state = running_state();
        let pad = engaged_pad(&cfg);
        let motor = motor_at(3_000.0);

        let delay = ms_to_ticks(cfg.faults.delay_pitch_ms, 800);
        for _ in 0..delay {
            assert_eq!(mon.check(&mut state, &pad, 20.0, 0.0, &motor, &cfg), None);
        }
        assert_eq!(
            mon.check(&mut state, &pad, 20.0, 0.0, &motor, &cfg),
            Some(StopCondition::Pitch)
        );
        assert_eq!(state.run, crate::state::RunState::Ready);
    }

    #[test]
    fn fault_is_idempotent_once_stopped() {
        let cfg = BalanceConfig::default();
        let mut mon = FaultMonitor::new(800);
        let mut state = running_state();
        let pad = engaged_pad(&cfg);
        let motor = motor_at(3_000.0);

        let delay = ms_to_ticks(cfg.faults.delay_pitch_ms, 800) + 1;
        let mut tripped = None;
        for _ in 0..delay {
            tripped = mon.check(&mut state, &pad, 20.0, 0.0, &motor, &cfg);
        }
        assert_eq!(tripped, Some(StopCondition::Pitch));

        // same condition, already stopped: no further transitions
        for _ in 0..delay {
            assert_eq!(mon.check(&mut state, &pad, 20.0, 0.0, &motor, &cfg), None);
        }
        assert_eq!(state.stop_condition, StopCondition::Pitch);
    }

    #[test]
    fn pitch_recovery_resets_the_timer() {
        let cfg = BalanceConfig::default();
        let mut mon = FaultMonitor::new(800);
        let mut state = running_state();
        let pad = engaged_pad(&cfg);
        let motor = motor_at(3_000.0);

        let delay = ms_to_ticks(cfg.faults.delay_pitch_ms, 800);
        for _ in 0..delay {
            mon.check(&mut state, &pad, 20.0, 0.0, &motor, &cfg);
        }
        // one good tick clears the timer
        mon.check(&mut state, &pad, 0.0, 0.0, &motor, &cfg);
        for _ in 0..delay {
            assert_eq!(mon.check(&mut state, &pad, 20.0, 0.0, &motor, &cfg), None);
        }
        assert_eq!(state.run, crate::state::RunState::Running);
    }

    #[test]
    fn switch_fault_is_reported_before_a_simultaneous_pitch_fault() {
        let mut cfg = BalanceConfig::default();
        cfg.faults.delay_switch_full_ms = cfg.faults.delay_pitch_ms;
        let mut mon = FaultMonitor::new(800);
        let mut state = running_state();
        let mut pad = Footpad::default();
        pad.update(0.0, 0.0, &cfg.faults); // rider off
        let motor = motor_at(3_000.0);

        let delay = ms_to_ticks(cfg.faults.delay_pitch_ms, 800) + 1;
        let mut tripped = None;
        for _ in 0..delay {
            if tripped.is_none() {
                tripped = mon.check(&mut state, &pad, 20.0, 0.0, &motor, &cfg);
            }
        }
        assert_eq!(tripped, Some(StopCondition::SwitchFull));
    }

    #[test]
    fn full_switch_faults_faster_at_standstill() {
        let cfg = BalanceConfig::default();
        let mut mon = FaultMonitor::new(800);
        let mut state = running_state();
        let mut pad = Footpad::default();
        pad.update(0.0, 0.0, &cfg.faults);
        let motor = motor_at(100.0);

        let lowspeed = ms_to_ticks(SWITCH_FULL_LOWSPEED_MS, 800) + 1;
        let mut tripped = None;
        for _ in 0..lowspeed {
            tripped = mon.check(&mut state, &pad, 0.0, 0.0, &motor, &cfg);
        }
        assert_eq!(tripped, Some(StopCondition::SwitchFull));
    }

    #[test]
    fn quickstop_requires_sign_match_with_travel() {
        let cfg = BalanceConfig::default();
        let mut mon = FaultMonitor::new(800);
        let mut state = running_state();
        let pad = engaged_pad(&cfg);
        let motor = motor_at(100.0); // below quickstop_erpm, forward

        let delay = ms_to_ticks(QUICKSTOP_DELAY_MS, 800) + 1;
        // nose pitched against travel: no quickstop
        for _ in 0..delay {
            assert_eq!(mon.check(&mut state, &pad, -16.0, 0.0, &motor, &cfg), None);
        }
        // nose pitched with travel: quickstop
        let mut tripped = None;
        for _ in 0..delay {
            tripped = mon.check(&mut state, &pad, 16.0, 0.0, &motor, &cfg);
        }
        assert_eq!(tripped, Some(StopCondition::Quickstop));
    }

    #[test]
    fn reverse_stop_accumulates_then_trips() {
        let mut cfg = BalanceConfig::default();
        cfg.faults.reversestop_enabled = true;
        let mut mon = FaultMonitor::new(800);
        let mut state = running_state();
        let pad = engaged_pad(&cfg);
        let motor = motor_at(-2_000.0);

        let mut tripped = None;
        let mut ticks = 0u32;
        while tripped.is_none() && ticks < 100_000 {
            tripped = mon.check(&mut state, &pad, 0.0, 0.0, &motor, &cfg);
            assert!(mon.reverse_active());
            ticks += 1;
        }
        assert_eq!(tripped, Some(StopCondition::ReverseStop));
        // 2000 ERPM in reverse crosses 50k ERPM-ticks after 25 ticks
        assert_eq!(ticks, 26);
    }

    #[test]
    fn engagement_gate_and_pushstart_path() {
        let startup = StartupConfig::default();
        let slow = motor_at(0.0);
        let rolling = motor_at(1_500.0);

        assert!(can_engage(true, 0.0, 0.0, &slow, &startup));
        assert!(!can_engage(false, 0.0, 0.0, &slow, &startup));
        assert!(!can_engage(true, 9.0, 0.0, &slow, &startup));
        assert!(!can_engage(true, 0.0, 9.0, &slow, &startup));

        // push-start: rolling above 1000 ERPM relaxes the gate to 45 deg
        let mut startup = startup;
        startup.pushstart_enabled = true;
        assert!(can_engage(true, 30.0, 20.0, &rolling, &startup));
        assert!(!can_engage(true, 46.0, 20.0, &rolling, &startup));
        assert!(!can_engage(true, 30.0, 20.0, &slow, &startup));
    }
}
