//! Adaptive torque response.
//!
//! Compares the acceleration the current *should* produce on flat ground
//! against the acceleration actually measured; the smoothed gap is terrain.
//! Resistance (uphill, soft ground) leans the nose up the hill, free
//! acceleration (downhill) leans it back. The step-size decision tree below
//! is the primary ride-feel tuning surface.

use keel_config::{
    step_per_tick, AtrConfig, ATR_BOOST_ERPM, ATR_RESPONSE_MARGIN, ATR_TRANSITION_MARGIN,
};
use libm::fabsf;

use crate::motor::MotorData;
use crate::tilt::step_toward;

#[derive(Clone, Copy, Debug, Default)]
pub struct Atr {
    /// Smoothed expected-minus-measured acceleration gap. Positive while
    /// the board pushes harder than it accelerates (resistance). Also read
    /// by brake tilt for its downhill scaling.
    pub accel_diff: f32,
    pub target: f32,
    pub offset: f32,
    pub speed_boost: f32,
}

impl Atr {
    pub fn update(&mut self, motor: &MotorData, cfg: &AtrConfig, hz: u16) {
        if !cfg.enabled {
            self.accel_diff = 0.0;
            self.target = 0.0;
            self.offset = step_toward(self.offset, 0.0, step_per_tick(cfg.off_speed, hz));
            return;
        }

        // expected acceleration from drive torque, minus drivetrain slack
        let drive = motor.filtered_current - cfg.torque_offset * motor.erpm_sign;
        let ratio = if drive * motor.erpm_sign >= 0.0 {
            cfg.amps_accel_ratio
        } else {
            cfg.amps_decel_ratio
        };
        let expected = drive / ratio;
        let gap = expected - motor.acceleration;

        // the gap estimate firms up with speed; near standstill the ring
        // average is mostly noise, so smooth much harder there
        let alpha = cfg.filter * (0.2 + (motor.abs_erpm / 5_000.0).min(0.8));
        self.accel_diff += alpha * (gap - self.accel_diff);

        // resistance against travel uses the uphill strength
        let uphill = self.accel_diff * motor.erpm_sign > 0.0;
        let strength = if uphill {
            cfg.strength_up
        } else {
            cfg.strength_down
        };

        self.speed_boost = if motor.abs_erpm > ATR_BOOST_ERPM {
            1.0 + cfg.speed_boost * ((motor.abs_erpm - ATR_BOOST_ERPM) / ATR_BOOST_ERPM).min(1.0)
        } else {
            1.0
        };

        self.target = (self.accel_diff * strength * self.speed_boost)
            .clamp(-cfg.angle_limit, cfg.angle_limit);

        // step-size decision tree: engaging beats releasing, a reversal
        // with real margin gets the transition boost, a large
        // same-direction gap gets the response boost
        let gap_to_target = self.target - self.offset;
        let engaging =
            fabsf(self.target) > fabsf(self.offset) && self.target * self.offset >= 0.0;
        let mut speed = if engaging { cfg.on_speed } else { cfg.off_speed };
        if self.target * self.offset < 0.0 && fabsf(gap_to_target) > ATR_TRANSITION_MARGIN {
            speed *= cfg.transition_boost;
        } else if engaging && fabsf(gap_to_target) > ATR_RESPONSE_MARGIN {
            speed *= cfg.response_boost;
        }

        self.offset = step_toward(self.offset, self.target, step_per_tick(speed, hz));
    }

    pub fn reset(&mut self) {
        self.accel_diff = 0.0;
        self.target = 0.0;
        self.offset = 0.0;
        self.speed_boost = 0.0;
    }

    pub fn winddown(&mut self, factor: f32) {
        self.offset *= factor;
        self.target *= factor;
        self.accel_diff *= factor;
    }
}
