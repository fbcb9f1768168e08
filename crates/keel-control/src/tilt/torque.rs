//! Torque tilt: lean the nose in proportion to motor torque so the rider
//! feels load.

use keel_config::{step_per_tick, TorqueTiltConfig};
use libm::{fabsf, fminf};

use crate::motor::MotorData;
use crate::tilt::step_toward;

#[derive(Clone, Copy, Debug, Default)]
pub struct TorqueTilt {
    pub target: f32,
    pub offset: f32,
}

impl TorqueTilt {
    pub fn update(&mut self, motor: &MotorData, cfg: &TorqueTiltConfig, hz: u16) {
        let current = motor.filtered_current;
        let strength = if motor.braking {
            cfg.strength_regen
        } else {
            cfg.strength
        };

        let excess = fabsf(current) - cfg.start_current;
        let magnitude = fminf((excess).max(0.0) * strength, cfg.angle_limit);
        self.target = if current < 0.0 { -magnitude } else { magnitude };

        // tilting into the lean is faster than releasing it
        let releasing =
            fabsf(self.target) < fabsf(self.offset) || self.target * self.offset < 0.0;
        let speed = if releasing { cfg.off_speed } else { cfg.on_speed };
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
    use crate::test_utils::value_close;
    use keel_hardware::MotorTelemetry;

    fn motor_with_current(current: f32, erpm: f32) -> MotorData {
        let mut m = MotorData::new(800, 4.0);
        // drive the filter to steady state so filtered == raw
        for _ in 0..4_000 {
            m.update(&MotorTelemetry {
                erpm,
                current,
                ..MotorTelemetry::default()
            });
        }
        m
    }

    #[test]
    fn target_formula_matches_the_tuning_example() {
        // 40 A at 10 A start, 0.1 strength, 5 deg limit -> 3 deg
        let cfg = TorqueTiltConfig {
            start_current: 10.0,
            strength: 0.1,
            strength_regen: 0.1,
            angle_limit: 5.0,
            ..TorqueTiltConfig::default()
        };
        let motor = motor_with_current(40.0, 5_000.0);
        let mut tt = TorqueTilt::default();
        tt.update(&motor, &cfg, 800);
        assert!(value_close(tt.target, 3.0, 1e-3));
    }

    #[test]
    fn offset_converges_to_target_and_holds_without_overshoot() {
        let cfg = TorqueTiltConfig {
            start_current: 10.0,
            strength: 0.1,
            strength_regen: 0.1,
            angle_limit: 5.0,
            ..TorqueTiltConfig::default()
        };
        let motor = motor_with_current(40.0, 5_000.0);
        let mut tt = TorqueTilt::default();
        for _ in 0..2_000 {
            tt.update(&motor, &cfg, 800);
            assert!(tt.offset <= 3.0 + 1e-3);
        }
        assert!(value_close(tt.offset, 3.0, 1e-3));
        let held = tt.offset;
        tt.update(&motor, &cfg, 800);
        assert_eq!(tt.offset, held);
    }

    #[test]
    fn offset_rate_is_limited_even_on_a_current_spike() {
        let cfg = TorqueTiltConfig::default();
        let motor = motor_with_current(90.0, 5_000.0);
        let mut tt = TorqueTilt::default();
        let step = step_per_tick(cfg.on_speed, 800);
        let mut last = tt.offset;
        for _ in 0..500 {
            tt.update(&motor, &cfg, 800);
            assert!(fabsf(tt.offset - last) <= step + 1e-6);
            last = tt.offset;
        }
    }

    #[test]
    fn sign_follows_current_and_below_threshold_is_flat() {
        let cfg = TorqueTiltConfig::default();
        let mut tt = TorqueTilt::default();

        let motor = motor_with_current(-40.0, 5_000.0);
        tt.update(&motor, &cfg, 800);
        assert!(tt.target < 0.0);

        let motor = motor_with_current(5.0, 5_000.0);
        tt.update(&motor, &cfg, 800);
        assert_eq!(tt.target, 0.0);
    }

    #[test]
    fn regen_strength_applies_while_braking() {
        let cfg = TorqueTiltConfig {
            start_current: 10.0,
            strength: 0.1,
            strength_regen: 0.2,
            angle_limit: 8.0,
            ..TorqueTiltConfig::default()
        };
        // negative current while rolling forward = braking
        let motor = motor_with_current(-40.0, 5_000.0);
        assert!(motor.braking);
        let mut tt = TorqueTilt::default();
        tt.update(&motor, &cfg, 800);
        assert!(value_close(tt.target, -6.0, 1e-2));
    }
}
