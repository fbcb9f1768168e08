//! Nose-angle shaping: post-engage centering, constant ride angle, and the
//! pushback family (duty, voltage, temperature, reverse-stop).
//!
//! Pushback leans the nose against the direction of travel to slow the
//! rider down before the condition becomes dangerous. Highest urgency wins;
//! the decision order below is deliberate.

use keel_config::{step_per_tick, BalanceConfig, REVERSE_STOP_ANGLE};
use keel_hardware::BeepReason;

use crate::motor::MotorData;
use crate::state::SetpointAdjustment;
use crate::tilt::step_toward;

// Bench supplies read near zero; do not treat that as a dead battery.
const LV_MIN_VALID_VOLTAGE: f32 = 10.0;

#[derive(Clone, Copy, Debug)]
pub struct Tiltback {
    pub offset: f32,
    centering: bool,
    prev_sat: SetpointAdjustment,
}

impl Default for Tiltback {
    fn default() -> Self {
        Self {
            offset: 0.0,
            centering: false,
            prev_sat: SetpointAdjustment::None,
        }
    }
}

impl Tiltback {
    /// Start a ride with the setpoint at the engage pitch; `update` then
    /// walks it level at the startup centering speed.
    pub fn begin(&mut self, engage_pitch: f32) {
        self.offset = engage_pitch;
        self.centering = true;
        self.prev_sat = SetpointAdjustment::Centering;
    }

    pub fn update(
        &mut self,
        motor: &MotorData,
        reverse_active: bool,
        cfg: &BalanceConfig,
        hz: u16,
    ) -> (SetpointAdjustment, Option<BeepReason>) {
        let tb = &cfg.tiltback;
        let sign = motor.erpm_sign;

        let (sat, target, speed, beep) = if reverse_active {
            (
                SetpointAdjustment::ReverseStop,
                -REVERSE_STOP_ANGLE,
                tb.return_speed,
                Some(BeepReason::ReverseStop),
            )
        } else if motor.duty_smooth > tb.duty {
            (
                SetpointAdjustment::Duty,
                tb.duty_angle * sign,
                tb.duty_speed,
                Some(BeepReason::TiltbackDuty),
            )
        } else if motor.input_voltage > tb.hv {
            (
                SetpointAdjustment::HighVoltage,
                tb.hv_angle * sign,
                tb.hv_speed,
                Some(BeepReason::TiltbackHighVoltage),
            )
        } else if motor.temp_fet > tb.temp_fet || motor.temp_motor > tb.temp_motor {
            (
                SetpointAdjustment::Temperature,
                tb.temp_angle * sign,
                tb.temp_speed,
                Some(BeepReason::TiltbackTemperature),
            )
        } else if motor.input_voltage > LV_MIN_VALID_VOLTAGE && motor.input_voltage < tb.lv {
            (
                SetpointAdjustment::LowVoltage,
                tb.lv_angle * sign,
                tb.lv_speed,
                Some(BeepReason::TiltbackLowVoltage),
            )
        } else {
            let target = if motor.abs_erpm > tb.constant_erpm {
                tb.constant_angle * sign
            } else {
                0.0
            };
            let speed = if self.centering {
                cfg.startup.centering_speed
            } else {
                tb.return_speed
            };
            let sat = if self.offset != target {
                SetpointAdjustment::Centering
            } else {
                SetpointAdjustment::None
            };
            (sat, target, speed, None)
        };

        self.offset = step_toward(self.offset, target, step_per_tick(speed, hz));
        if self.offset == target {
            self.centering = false;
        }

        // beep only on entering a pushback, not every tick inside it
        let beep = if sat != self.prev_sat { beep } else { None };
        self.prev_sat = sat;
        (sat, beep)
    }

    pub fn reset(&mut self) {
        self.offset = 0.0;
        self.centering = false;
        self.prev_sat = SetpointAdjustment::None;
    }

    pub fn winddown(&mut self, factor: f32) {
        self.offset *= factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::value_close;
    use keel_hardware::MotorTelemetry;
    use libm::fabsf;

    fn motor(erpm: f32, duty: f32, voltage: f32, temp: f32) -> MotorData {
        let mut m = MotorData::new(800, 4.0);
        for _ in 0..100 {
            m.update(&MotorTelemetry {
                erpm,
                duty_cycle: duty,
                input_voltage: voltage,
                temp_fet: temp,
                temp_motor: temp,
                ..MotorTelemetry::default()
            });
        }
        m
    }

    #[test]
    fn centering_ramps_from_engage_pitch_to_level() {
        let cfg = BalanceConfig::default();
        let m = motor(0.0, 0.0, 72.0, 40.0);
        let mut tb = Tiltback::default();
        tb.begin(4.0);
        assert_eq!(tb.offset, 4.0);

        let step = step_per_tick(cfg.startup.centering_speed, 800);
        let (sat, _) = tb.update(&m, false, &cfg, 800);
        assert_eq!(sat, SetpointAdjustment::Centering);
        assert!(value_close(tb.offset, 4.0 - step, 1e-6));

        for _ in 0..800 {
            tb.update(&m, false, &cfg, 800);
        }
        assert_eq!(tb.offset, 0.0);
        let (sat, _) = tb.update(&m, false, &cfg, 800);
        assert_eq!(sat, SetpointAdjustment::None);
    }

    #[test]
    fn duty_pushback_leans_against_travel_and_beeps_once() {
        let cfg = BalanceConfig::default();
        let m = motor(5_000.0, 0.9, 72.0, 40.0);
        let mut tb = Tiltback::default();

        let (sat, beep) = tb.update(&m, false, &cfg, 800);
        assert_eq!(sat, SetpointAdjustment::Duty);
        assert_eq!(beep, Some(BeepReason::TiltbackDuty));

        let (_, beep) = tb.update(&m, false, &cfg, 800);
        assert_eq!(beep, None);

        for _ in 0..4_000 {
            tb.update(&m, false, &cfg, 800);
        }
        assert!(value_close(tb.offset, cfg.tiltback.duty_angle, 1e-3));
    }

    #[test]
    fn pushback_rate_is_limited() {
        let cfg = BalanceConfig::default();
        let m = motor(5_000.0, 0.9, 72.0, 40.0);
        let mut tb = Tiltback::default();
        let step = step_per_tick(cfg.tiltback.duty_speed, 800);
        let mut last = 0.0;
        for _ in 0..2_000 {
            tb.update(&m, false, &cfg, 800);
            assert!(fabsf(tb.offset - last) <= step + 1e-6);
            last = tb.offset;
        }
    }

    #[test]
    fn reverse_stop_outranks_everything() {
        let cfg = BalanceConfig::default();
        let m = motor(-2_000.0, 0.9, 90.0, 100.0);
        let mut tb = Tiltback::default();
        let (sat, beep) = tb.update(&m, true, &cfg, 800);
        assert_eq!(sat, SetpointAdjustment::ReverseStop);
        assert_eq!(beep, Some(BeepReason::ReverseStop));
        for _ in 0..8_000 {
            tb.update(&m, true, &cfg, 800);
        }
        assert!(value_close(tb.offset, -REVERSE_STOP_ANGLE, 1e-3));
    }

    #[test]
    fn low_voltage_pushes_back_but_a_bench_supply_does_not() {
        let cfg = BalanceConfig::default();
        let mut tb = Tiltback::default();

        let dead = motor(3_000.0, 0.3, 55.0, 40.0);
        let (sat, _) = tb.update(&dead, false, &cfg, 800);
        assert_eq!(sat, SetpointAdjustment::LowVoltage);

        let bench = motor(3_000.0, 0.3, 0.0, 40.0);
        let mut tb = Tiltback::default();
        let (sat, _) = tb.update(&bench, false, &cfg, 800);
        assert_ne!(sat, SetpointAdjustment::LowVoltage);
    }

    #[test]
    fn pushback_releases_at_the_return_speed() {
        let cfg = BalanceConfig::default();
        let mut tb = Tiltback::default();
        let loaded = motor(5_000.0, 0.9, 72.0, 40.0);
        for _ in 0..4_000 {
            tb.update(&loaded, false, &cfg, 800);
        }
        assert!(tb.offset > 0.0);

        let relaxed = motor(5_000.0, 0.3, 72.0, 40.0);
        // duty EMA needs a few ticks to fall below the threshold
        let mut sat = SetpointAdjustment::Duty;
        for _ in 0..200 {
            sat = tb.update(&relaxed, false, &cfg, 800).0;
        }
        assert_eq!(sat, SetpointAdjustment::Centering);
        for _ in 0..4_000 {
            tb.update(&relaxed, false, &cfg, 800);
        }
        assert_eq!(tb.offset, 0.0);
    }
}
