//! Surge: escalating nose-lift as duty cycle approaches saturation.
//!
//! Three stages trip at the start threshold and +5% / +10% above it. Entry
//! is instant (the whole point is to pre-empt the duty wall), release is a
//! slow ramp. Each new stage beeps.

use keel_config::{step_per_tick, SurgeConfig};
use keel_hardware::BeepReason;
use libm::fabsf;

use crate::motor::MotorData;
use crate::tilt::step_toward;

const STAGE2_DUTY_MARGIN: f32 = 0.05;
const STAGE3_DUTY_MARGIN: f32 = 0.10;

#[derive(Clone, Copy, Debug, Default)]
pub struct Surge {
    pub stage: u8,
    pub offset: f32,
}

impl Surge {
    pub fn update(&mut self, motor: &MotorData, cfg: &SurgeConfig, hz: u16) -> Option<BeepReason> {
        let duty = motor.duty_smooth;
        let stage = if duty > cfg.duty_start + STAGE3_DUTY_MARGIN {
            3
        } else if duty > cfg.duty_start + STAGE2_DUTY_MARGIN {
            2
        } else if duty > cfg.duty_start {
            1
        } else {
            0
        };

        let beep = if stage > self.stage {
            Some(BeepReason::Surge(stage))
        } else {
            None
        };
        self.stage = stage;

        let angle = match stage {
            0 => 0.0,
            1 => cfg.angle1,
            2 => cfg.angle2,
            _ => cfg.angle3,
        };
        let target = motor.erpm_sign * angle;

        if stage > 0 && fabsf(target) > fabsf(self.offset) {
            // instant engagement
            self.offset = target;
        } else {
            self.offset = step_toward(self.offset, target, step_per_tick(cfg.off_speed, hz));
        }
        beep
    }

    pub fn reset(&mut self) {
        self.stage = 0;
        self.offset = 0.0;
    }

    pub fn winddown(&mut self, factor: f32) {
        self.offset *= factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_hardware::MotorTelemetry;

    fn motor_at_duty(duty: f32) -> MotorData {
        let mut m = MotorData::new(800, 4.0);
        for _ in 0..200 {
            m.update(&MotorTelemetry {
                erpm: 5_000.0,
                duty_cycle: duty,
                ..MotorTelemetry::default()
            });
        }
        m
    }

    #[test]
    fn stages_escalate_with_duty_and_beep_on_entry() {
        let cfg = SurgeConfig::default();
        let mut s = Surge::default();

        assert_eq!(s.update(&motor_at_duty(0.80), &cfg, 800), None);
        assert_eq!(s.stage, 0);

        assert_eq!(
            s.update(&motor_at_duty(0.87), &cfg, 800),
            Some(BeepReason::Surge(1))
        );
        assert_eq!(s.offset, cfg.angle1);

        assert_eq!(
            s.update(&motor_at_duty(0.92), &cfg, 800),
            Some(BeepReason::Surge(2))
        );
        assert_eq!(s.offset, cfg.angle2);

        assert_eq!(
            s.update(&motor_at_duty(0.97), &cfg, 800),
            Some(BeepReason::Surge(3))
        );
        assert_eq!(s.offset, cfg.angle3);

        // holding a stage does not re-beep
        assert_eq!(s.update(&motor_at_duty(0.97), &cfg, 800), None);
    }

    #[test]
    fn engagement_is_instant_and_release_is_ramped() {
        let cfg = SurgeConfig::default();
        let mut s = Surge::default();
        s.update(&motor_at_duty(0.92), &cfg, 800);
        assert_eq!(s.offset, cfg.angle2); // one tick, full angle

        let calm = motor_at_duty(0.5);
        let step = step_per_tick(cfg.off_speed, 800);
        let mut last = s.offset;
        while s.offset != 0.0 {
            s.update(&calm, &cfg, 800);
            assert!(last - s.offset <= step + 1e-6);
            assert!(s.offset >= 0.0);
            last = s.offset;
        }
        assert_eq!(s.stage, 0);
    }

    #[test]
    fn offset_follows_travel_direction() {
        let cfg = SurgeConfig::default();
        let mut m = MotorData::new(800, 4.0);
        for _ in 0..200 {
            m.update(&MotorTelemetry {
                erpm: -5_000.0,
                duty_cycle: 0.9,
                ..MotorTelemetry::default()
            });
        }
        let mut s = Surge::default();
        s.update(&m, &cfg, 800);
        assert!(s.offset < 0.0);
    }
}
