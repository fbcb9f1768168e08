//! Balance PID: angle error to motor current.
//!
//! Pure per-tick computation; nothing in here recovers from anything. A bad
//! setpoint produces a bad current and the fault machine is what catches
//! genuinely dangerous conditions.

use keel_config::{
    PidConfig, BOOSTER_ALPHA, BOOSTER_HIGH_SPEED_ERPM, CONTINUOUS_CURRENT_BASE_RATIO,
    KP_SCALE_ALPHA, REVERSE_STOP_INTEGRAL_DECAY, STANDSTILL_ERPM,
};
use keel_hardware::BeepReason;
use libm::fabsf;

use crate::motor::MotorData;

#[derive(Clone, Copy, Debug)]
pub struct BalancePid {
    pub proportional: f32,
    pub integral: f32,
    pub rate_p: f32,
    pub booster_current: f32,
    pub output: f32,

    // Direction-aware gain scales, each blended at 1%/tick so flipping ride
    // direction never steps the gains.
    kp_brake_scale: f32,
    kp_accel_scale: f32,
    kp2_brake_scale: f32,
    kp2_accel_scale: f32,

    // Current-magnitude ceiling that ramps up over the soft-start window.
    softstart_limit: f32,
    softstart_step: f32,
}

impl BalancePid {
    pub fn new() -> Self {
        Self {
            proportional: 0.0,
            integral: 0.0,
            rate_p: 0.0,
            booster_current: 0.0,
            output: 0.0,
            kp_brake_scale: 1.0,
            kp_accel_scale: 1.0,
            kp2_brake_scale: 1.0,
            kp2_accel_scale: 1.0,
            softstart_limit: 0.0,
            softstart_step: 0.0,
        }
    }

    /// Arm the soft-start ramp for a fresh engagement.
    pub fn reset(&mut self, cfg: &PidConfig, ramp_s: f32, hz: u16) {
        *self = Self::new();
        self.softstart_step = cfg.current_limit / (ramp_s * hz as f32).max(1.0);
    }

    /// One tick. `pitch` is the (darkride-adjusted) balance angle, `true_pitch`
    /// the unfiltered one feeding the booster. Returns the commanded current
    /// and at most one warning beep.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        setpoint: f32,
        pitch: f32,
        true_pitch: f32,
        gyro_pitch_rate: f32,
        motor: &MotorData,
        reverse_stop: bool,
        cfg: &PidConfig,
    ) -> (f32, Option<BeepReason>) {
        // 1. proportional with optional deadzone
        let mut prop = setpoint - pitch;
        if cfg.deadzone > 0.0 {
            prop = if fabsf(prop) < cfg.deadzone {
                0.0
            } else if prop > 0.0 {
                prop - cfg.deadzone
            } else {
                prop + cfg.deadzone
            };
        }
        self.proportional = prop;

        // 2. integral, clamped; decayed during reverse-stop braking so no
        // wind-up survives the direction reversal
        self.integral += prop * cfg.ki;
        if cfg.ki_limit > 0.0 {
            self.integral = self.integral.clamp(-cfg.ki_limit, cfg.ki_limit);
        }
        if reverse_stop {
            self.integral *= REVERSE_STOP_INTEGRAL_DECAY;
        }

        // 3. direction-aware gain scales
        let rolling = motor.abs_erpm > STANDSTILL_ERPM;
        let forward = motor.erpm_sign > 0.0;
        let (kp_brake_t, kp_accel_t, kp2_brake_t, kp2_accel_t) = if !rolling {
            (1.0, 1.0, 1.0, 1.0)
        } else if forward {
            (cfg.kp_brake, 1.0, cfg.kp2_brake, 1.0)
        } else {
            // riding switch: what feels like braking is the accel side
            (1.0, cfg.kp_brake, 1.0, cfg.kp2_brake)
        };
        self.kp_brake_scale += KP_SCALE_ALPHA * (kp_brake_t - self.kp_brake_scale);
        self.kp_accel_scale += KP_SCALE_ALPHA * (kp_accel_t - self.kp_accel_scale);
        self.kp2_brake_scale += KP_SCALE_ALPHA * (kp2_brake_t - self.kp2_brake_scale);
        self.kp2_accel_scale += KP_SCALE_ALPHA * (kp2_accel_t - self.kp2_accel_scale);

        let braking = prop * motor.erpm_sign < 0.0 && rolling;
        let kp_scale = if braking {
            self.kp_brake_scale
        } else {
            self.kp_accel_scale
        };
        let kp2_scale = if braking {
            self.kp2_brake_scale
        } else {
            self.kp2_accel_scale
        };

        // 4. rate term on the raw gyro
        self.rate_p = -gyro_pitch_rate * cfg.kp2 * kp2_scale;

        // 5. booster on true pitch error, low-passed, doubled at speed
        let true_err = setpoint - true_pitch;
        let abs_err = fabsf(true_err);
        let booster_target = if cfg.booster_current > 0.0 && abs_err > cfg.booster_angle {
            let ramp = ((abs_err - cfg.booster_angle) / cfg.booster_ramp).min(1.0);
            let sign = if true_err < 0.0 { -1.0 } else { 1.0 };
            let speed_scale = 1.0 + (motor.abs_erpm / BOOSTER_HIGH_SPEED_ERPM).min(1.0);
            sign * ramp * cfg.booster_current * speed_scale
        } else {
            0.0
        };
        self.booster_current += BOOSTER_ALPHA * (booster_target - self.booster_current);

        let mut current = prop * cfg.kp * kp_scale + self.integral + self.rate_p + self.booster_current;

        // 6. soft start
        if self.softstart_limit < cfg.current_limit {
            self.softstart_limit = (self.softstart_limit + self.softstart_step).min(cfg.current_limit);
            current = current.clamp(-self.softstart_limit, self.softstart_limit);
        }

        // 7. hard clamps, braking side lower
        let output_brakes = current * motor.erpm_sign < 0.0 && rolling;
        let limit = if output_brakes {
            cfg.brake_current_limit
        } else {
            cfg.current_limit
        };
        current = current.clamp(-limit, limit);

        // continuous-current warning line rises with speed; warn, never cut
        let warn_at = limit
            * (CONTINUOUS_CURRENT_BASE_RATIO
                + (1.0 - CONTINUOUS_CURRENT_BASE_RATIO)
                    * (motor.abs_erpm / BOOSTER_HIGH_SPEED_ERPM).min(1.0));
        let beep = if fabsf(current) > warn_at {
            Some(BeepReason::Overcurrent)
        } else {
            None
        };

        self.output = current;
        (current, beep)
    }
}

impl Default for BalancePid {
    fn default() -> Self {
        Self::new()
    }
}
