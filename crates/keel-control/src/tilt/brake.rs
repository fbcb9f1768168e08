//! Brake tilt: lift the nose while actively braking at speed, so the rider
//! has somewhere to lean into the deceleration.

use keel_config::{step_per_tick, BrakeTiltConfig};
use libm::fabsf;

use crate::motor::MotorData;
use crate::tilt::atr::Atr;
use crate::tilt::step_toward;

// How much proportional error contributes, and the cap on it.
const PROP_GAIN: f32 = 0.5;
const PROP_LIMIT: f32 = 6.0; // deg

#[derive(Clone, Copy, Debug, Default)]
pub struct BrakeTilt {
    pub target: f32,
    pub offset: f32,
}

impl BrakeTilt {
    /// `proportional` is the PID's angle error from the previous tick; its
    /// sign disagreeing with travel is what distinguishes deliberate
    /// braking from torque noise.
    pub fn update(
        &mut self,
        motor: &MotorData,
        atr: &Atr,
        proportional: f32,
        cfg: &BrakeTiltConfig,
        hz: u16,
    ) {
        let braking = cfg.strength > 0.0
            && motor.braking
            && motor.abs_erpm > cfg.min_erpm
            && proportional * motor.erpm_sign < 0.0;

        if braking {
            let magnitude = cfg.strength * (fabsf(proportional) * PROP_GAIN).min(PROP_LIMIT);
            let mut target = motor.erpm_sign * magnitude;

            // on a steep downhill ATR already has the nose back; lifting it
            // further invites a faceplant, so scale against the gap
            if atr.accel_diff * motor.erpm_sign < 0.0 {
                target /= 1.0 + fabsf(atr.accel_diff).min(4.0);
            }
            self.target = target;
        } else {
            self.target = 0.0;
        }

        let releasing =
            fabsf(self.target) < fabsf(self.offset) || self.target * self.offset < 0.0;
        let speed = if releasing {
            cfg.release_speed
        } else {
            cfg.lift_speed
        };
        self.offset = step_toward(self.offset, self.target, step_per_tick(speed, hz));
    }

    pub fn reset(&mut self) {
        self.target = 0.0;
        self.offset = 0.0;
    }

    pub fn winddown(&mut self, factor: f32) {
        self.offset *= factor;
        self.target *= factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_hardware::MotorTelemetry;

    fn braking_motor(erpm: f32) -> MotorData {
        let mut m = MotorData::new(800, 4.0);
        for _ in 0..4_000 {
            m.update(&MotorTelemetry {
                erpm,
                current: -30.0 * if erpm < 0.0 { -1.0 } else { 1.0 },
                ..MotorTelemetry::default()
            });
        }
        m
    }

    #[test]
    fn lifts_the_nose_while_braking_forward() {
        let cfg = BrakeTiltConfig::default();
        let motor = braking_motor(5_000.0);
        let atr = Atr::default();
        let mut bt = BrakeTilt::default();
        // rider leaning back, error opposing travel
        for _ in 0..2_000 {
            bt.update(&motor, &atr, -4.0, &cfg, 800);
        }
        assert!(bt.target > 0.0);
        assert!(bt.offset > 0.0);
    }

    #[test]
    fn no_lift_below_the_speed_floor() {
        let cfg = BrakeTiltConfig::default();
        let motor = braking_motor(1_000.0); // below min_erpm
        let atr = Atr::default();
        let mut bt = BrakeTilt::default();
        bt.update(&motor, &atr, -4.0, &cfg, 800);
        assert_eq!(bt.target, 0.0);
    }

    #[test]
    fn no_lift_when_error_agrees_with_travel() {
        let cfg = BrakeTiltConfig::default();
        let motor = braking_motor(5_000.0);
        let atr = Atr::default();
        let mut bt = BrakeTilt::default();
        bt.update(&motor, &atr, 4.0, &cfg, 800);
        assert_eq!(bt.target, 0.0);
    }

    #[test]
    fn downhill_gap_scales_the_lift_down() {
        let cfg = BrakeTiltConfig::default();
        let motor = braking_motor(5_000.0);

        let flat = Atr::default();
        let mut downhill = Atr::default();
        downhill.accel_diff = -3.0; // free acceleration, nose already back

        let mut bt_flat = BrakeTilt::default();
        let mut bt_down = BrakeTilt::default();
        bt_flat.update(&motor, &flat, -4.0, &cfg, 800);
        bt_down.update(&motor, &downhill, -4.0, &cfg, 800);
        assert!(bt_down.target < bt_flat.target);
        assert!(bt_down.target > 0.0);
    }

    #[test]
    fn mirrors_for_reverse_travel() {
        let cfg = BrakeTiltConfig::default();
        let motor = braking_motor(-5_000.0);
        let atr = Atr::default();
        let mut bt = BrakeTilt::default();
        bt.update(&motor, &atr, 4.0, &cfg, 800);
        assert!(bt.target < 0.0);
    }
}
