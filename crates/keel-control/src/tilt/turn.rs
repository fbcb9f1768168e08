//! Turn tilt: lean into sustained carves.
//!
//! Yaw rate is integrated into an aggregate that resets when the carve
//! direction flips, so a wiggle never builds lean. The aggregate above a
//! start angle maps to a speed-scaled lean, suppressed while ATR is busy
//! fighting terrain.

use keel_config::{step_per_tick, TurnTiltConfig, TURN_TILT_ATR_SUPPRESS};
use libm::fabsf;

use crate::motor::MotorData;
use crate::tilt::atr::Atr;
use crate::tilt::step_toward;

#[derive(Clone, Copy, Debug, Default)]
pub struct TurnTilt {
    pub yaw_aggregate: f32,
    pub target: f32,
    pub offset: f32,
}

impl TurnTilt {
    /// `yaw_rate` in deg/s, integrated over the real tick period.
    pub fn update(
        &mut self,
        yaw_rate: f32,
        motor: &MotorData,
        atr: &Atr,
        cfg: &TurnTiltConfig,
        hz: u16,
    ) {
        let yaw_change = yaw_rate / hz as f32;
        if yaw_change * self.yaw_aggregate < 0.0 {
            self.yaw_aggregate = 0.0;
        }
        self.yaw_aggregate += yaw_change;

        let abs_agg = fabsf(self.yaw_aggregate);
        if motor.abs_erpm < cfg.start_erpm || abs_agg < cfg.start_angle {
            self.target = 0.0;
        } else {
            let mut magnitude = ((abs_agg - cfg.start_angle) / cfg.yaw_aggregate_target)
                .min(1.0)
                * cfg.strength
                * 0.5;

            // more lean the faster the carve
            let boost_span = (cfg.erpm_boost_end - cfg.start_erpm).max(1.0);
            let boost = 1.0
                + cfg.erpm_boost / 100.0
                    * ((motor.abs_erpm - cfg.start_erpm) / boost_span).clamp(0.0, 1.0);
            magnitude *= boost;

            // heavy torque response wins over carve lean
            let atr_mag = fabsf(atr.offset);
            if atr_mag > TURN_TILT_ATR_SUPPRESS {
                magnitude /= atr_mag;
            }

            let sign = if self.yaw_aggregate < 0.0 { -1.0 } else { 1.0 };
            self.target = (magnitude.min(cfg.angle_limit)) * sign;
        }

        self.offset = step_toward(self.offset, self.target, step_per_tick(cfg.speed, hz));
    }

    pub fn reset(&mut self) {
        self.yaw_aggregate = 0.0;
        self.target = 0.0;
        self.offset = 0.0;
    }

    pub fn winddown(&mut self, factor: f32) {
        self.offset *= factor;
        self.target *= factor;
    }
}
