//! Traction control: wheelslip detection and freewheel dwell.
//!
//! Slip is abnormal ring-averaged acceleration whose sign agrees with the
//! commanded current (the wheel runs away in the driven direction). While
//! slipping the PID output is zeroed and every shaper winds down
//! multiplicatively; the episode ends only after a minimum dwell once the
//! acceleration normalizes, so grip-regrip chatter cannot pump the board.

use keel_config::{TractionConfig, TRACTION_ERPM_SCALE, TRACTION_MIN_ERPM};
use libm::fabsf;

use crate::motor::MotorData;

#[derive(Clone, Copy, Debug, Default)]
pub struct Traction {
    pub active: bool,
    dwell_ticks: u32,
}

impl Traction {
    /// `commanded_current` is the PID output from the previous tick.
    pub fn update(&mut self, motor: &MotorData, commanded_current: f32, cfg: &TractionConfig) -> bool {
        if !cfg.enabled {
            self.active = false;
            return false;
        }

        // the faster the wheel, the larger a delta honest terrain produces
        let trigger = cfg.accel_trigger
            + cfg.erpm_scaled_trigger * (motor.abs_erpm / TRACTION_ERPM_SCALE).min(1.0);

        if !self.active {
            let runaway = motor.acceleration * commanded_current > 0.0;
            if motor.abs_erpm > TRACTION_MIN_ERPM
                && fabsf(motor.acceleration) > trigger
                && runaway
            {
                self.active = true;
                self.dwell_ticks = 0;
                warn!("wheelslip detected, accel {}", motor.acceleration);
            }
        } else {
            self.dwell_ticks += 1;
            if self.dwell_ticks >= cfg.min_dwell_ticks
                && fabsf(motor.acceleration) < cfg.end_accel_margin
            {
                self.active = false;
            }
        }
        self.active
    }

    pub fn reset(&mut self) {
        self.active = false;
        self.dwell_ticks = 0;
    }
}
