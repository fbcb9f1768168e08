#![cfg_attr(not(test), no_std)]

use serde::{Deserialize, Serialize};

// Persisted-blob versioning. Bump CONFIG_VERSION whenever a field is added,
// removed or reordered; a mismatch on load falls back to defaults.
pub const CONFIG_VERSION: u16 = 2;
pub const CONFIG_SIGNATURE: u32 = 0x4B4C_0000 | CONFIG_VERSION as u32; // "KL" + version

// Control loop bounds
pub const LOOP_HZ_MIN: u16 = 200;
pub const LOOP_HZ_MAX: u16 = 1600;
pub const LOOP_HZ_DEFAULT: u16 = 800;

// Motor telemetry smoothing
pub const ACCEL_RING_SIZE: usize = 40; // ticks of ERPM deltas in the rolling average
pub const DUTY_SMOOTH_ALPHA: f32 = 0.1; // per-tick EMA weight for duty cycle

// Direction / standstill conventions
pub const STANDSTILL_ERPM: f32 = 250.0; // below this the board counts as stopped
pub const PUSHSTART_ERPM: f32 = 1000.0; // minimum speed for a rolling start
pub const PUSHSTART_ANGLE_LIMIT: f32 = 45.0; // deg, relaxed gate for rolling starts
pub const DIRTYLANDING_ERPM: f32 = 500.0;
pub const DIRTYLANDING_PITCH_LIMIT: f32 = 20.0; // deg

// Gain-scale and booster blending
pub const KP_SCALE_ALPHA: f32 = 0.01; // 1%/tick toward the active brake/accel ratio
pub const BOOSTER_ALPHA: f32 = 0.01;
pub const BOOSTER_HIGH_SPEED_ERPM: f32 = 10_000.0; // booster doubles by this speed
pub const REVERSE_STOP_INTEGRAL_DECAY: f32 = 0.9; // per tick while reverse-stop braking
pub const CONTINUOUS_CURRENT_BASE_RATIO: f32 = 0.7; // of the hard limit, at standstill

// ATR shaping knees
pub const ATR_BOOST_ERPM: f32 = 3000.0;
pub const ATR_TRANSITION_MARGIN: f32 = 1.5; // deg, reversal gap that earns the boosted step
pub const ATR_RESPONSE_MARGIN: f32 = 3.0; // deg, same-direction gap that earns it

// Turn tilt
pub const TURN_TILT_ATR_SUPPRESS: f32 = 1.0; // deg of ATR offset before suppression kicks in

// Traction control
pub const TRACTION_MIN_ERPM: f32 = 1500.0; // no slip detection below this
pub const TRACTION_ERPM_SCALE: f32 = 10_000.0; // trigger relaxes linearly up to here

// Fault timing
pub const QUICKSTOP_DELAY_MS: u16 = 100;
pub const SWITCH_FULL_LOWSPEED_MS: u16 = 180; // faster full-switch fault when barely moving
pub const REVERSE_STOP_ANGLE: f32 = 4.0; // deg of forced nose-down during reverse-stop
pub const REVERSE_STOP_TOLERANCE: f32 = 50_000.0; // accumulated reverse ERPM-ticks before stop

// Darkride roll band (board upside-down)
pub const DARKRIDE_ROLL_MIN: f32 = 100.0;
pub const DARKRIDE_ROLL_MAX: f32 = 135.0;

// Handtest mode current cap
pub const HANDTEST_CURRENT_LIMIT: f32 = 7.0; // amps

// Remote link
pub const REMOTE_TIMEOUT_MS: u16 = 500;

/// Degrees-per-second speed to a per-tick step at the given loop rate.
#[inline]
pub fn step_per_tick(speed_deg_s: f32, hz: u16) -> f32 {
    speed_deg_s / hz as f32
}

/// Millisecond delay to a tick count at the given loop rate.
#[inline]
pub fn ms_to_ticks(ms: u16, hz: u16) -> u32 {
    (ms as u32 * hz as u32) / 1000
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RemoteProtocol {
    #[default]
    None,
    Uart,
    Ppm,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoopConfig {
    pub frequency_hz: u16,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frequency_hz: LOOP_HZ_DEFAULT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StartupConfig {
    pub pitch_tolerance: f32,  // deg
    pub roll_tolerance: f32,   // deg
    pub centering_speed: f32,  // deg/s, setpoint ramp from pitch to level after engage
    pub simplestart_enabled: bool,
    pub simplestart_grace_ms: u16, // single-pad starts allowed after this long off the board
    pub pushstart_enabled: bool,
    pub dirtylandings_enabled: bool,
    pub softstart_ramp_s: f32, // seconds for the current limit to reach full
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            pitch_tolerance: 8.0,
            roll_tolerance: 8.0,
            centering_speed: 30.0,
            simplestart_enabled: false,
            simplestart_grace_ms: 5_000,
            pushstart_enabled: false,
            dirtylandings_enabled: false,
            softstart_ramp_s: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultConfig {
    pub pitch: f32, // deg
    pub roll: f32,  // deg
    pub adc1: f32,  // volts, 0 = channel absent
    pub adc2: f32,  // volts, 0 = channel absent
    pub delay_pitch_ms: u16,
    pub delay_roll_ms: u16,
    pub delay_switch_half_ms: u16,
    pub delay_switch_full_ms: u16,
    pub adc_half_erpm: f32, // below this, half-switch faults apply
    pub is_dualswitch: bool, // treat a single pad as full engagement
    pub darkride_enabled: bool,
    pub reversestop_enabled: bool,
    pub quickstop_enabled: bool,
    pub quickstop_erpm: f32,
    pub quickstop_angle: f32, // deg
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            pitch: 15.0,
            roll: 40.0,
            adc1: 2.0,
            adc2: 2.0,
            delay_pitch_ms: 250,
            delay_roll_ms: 250,
            delay_switch_half_ms: 1_500,
            delay_switch_full_ms: 250,
            adc_half_erpm: 300.0,
            is_dualswitch: false,
            darkride_enabled: false,
            reversestop_enabled: false,
            quickstop_enabled: true,
            quickstop_erpm: 200.0,
            quickstop_angle: 14.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidConfig {
    pub kp: f32,
    pub ki: f32,       // applied per tick
    pub ki_limit: f32, // amps, 0 disables the clamp
    pub kp2: f32,      // gyro rate term
    pub kp_brake: f32, // brake/accel ratio for the angle term
    pub kp2_brake: f32,
    pub deadzone: f32, // deg
    pub booster_angle: f32,   // deg of true pitch error before boost starts
    pub booster_ramp: f32,    // deg over which the boost ramps to full
    pub booster_current: f32, // amps at full boost
    pub current_limit: f32,       // amps, accelerating
    pub brake_current_limit: f32, // amps, braking
    pub brake_current: f32,       // amps commanded while idle in READY
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 30.0,
            ki: 0.005,
            ki_limit: 30.0,
            kp2: 0.7,
            kp_brake: 1.0,
            kp2_brake: 1.0,
            deadzone: 0.0,
            booster_angle: 8.0,
            booster_ramp: 4.0,
            booster_current: 25.0,
            current_limit: 90.0,
            brake_current_limit: 60.0,
            brake_current: 20.0,
        }
    }
}

/// Nose-angle pushback thresholds. Each source pushes the nose against the
/// direction of travel at its own ramp speed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TiltbackConfig {
    pub duty: f32, // duty cycle fraction
    pub duty_angle: f32,
    pub duty_speed: f32,
    pub hv: f32, // volts
    pub hv_angle: f32,
    pub hv_speed: f32,
    pub lv: f32, // volts
    pub lv_angle: f32,
    pub lv_speed: f32,
    pub temp_fet: f32, // celsius
    pub temp_motor: f32,
    pub temp_angle: f32,
    pub temp_speed: f32,
    pub return_speed: f32, // deg/s back to level once the cause clears
    pub constant_angle: f32, // permanent nose lift once rolling
    pub constant_erpm: f32,
}

impl Default for TiltbackConfig {
    fn default() -> Self {
        Self {
            duty: 0.85,
            duty_angle: 3.0,
            duty_speed: 2.0,
            hv: 86.0,
            hv_angle: 3.0,
            hv_speed: 1.5,
            lv: 60.0,
            lv_angle: 3.0,
            lv_speed: 1.5,
            temp_fet: 85.0,
            temp_motor: 95.0,
            temp_angle: 3.0,
            temp_speed: 1.5,
            return_speed: 2.5,
            constant_angle: 0.0,
            constant_erpm: 500.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TorqueTiltConfig {
    pub start_current: f32, // amps before any lean builds
    pub angle_limit: f32,
    pub on_speed: f32,  // deg/s into the lean
    pub off_speed: f32, // deg/s releasing it
    pub strength: f32,  // deg per amp, accelerating
    pub strength_regen: f32, // deg per amp, braking
    pub filter_hz: f32, // current low-pass cutoff
}

impl Default for TorqueTiltConfig {
    fn default() -> Self {
        Self {
            start_current: 15.0,
            angle_limit: 8.0,
            on_speed: 5.0,
            off_speed: 3.0,
            strength: 0.12,
            strength_regen: 0.18,
            filter_hz: 4.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AtrConfig {
    pub enabled: bool,
    pub strength_up: f32,   // gap indicates resistance (uphill)
    pub strength_down: f32, // gap indicates free acceleration (downhill)
    pub torque_offset: f32, // amps of drivetrain slack ignored
    pub amps_accel_ratio: f32, // amps per unit of expected acceleration
    pub amps_decel_ratio: f32,
    pub speed_boost: f32, // extra strength per ERPM past the knee
    pub angle_limit: f32,
    pub on_speed: f32,
    pub off_speed: f32,
    pub response_boost: f32,   // step multiplier on a large same-direction gap
    pub transition_boost: f32, // step multiplier when the correction reverses
    pub filter: f32, // base EMA weight for the accel gap
}

impl Default for AtrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strength_up: 1.5,
            strength_down: 1.0,
            torque_offset: 8.0,
            amps_accel_ratio: 9.0,
            amps_decel_ratio: 6.0,
            speed_boost: 0.3,
            angle_limit: 9.0,
            on_speed: 4.0,
            off_speed: 3.0,
            response_boost: 2.5,
            transition_boost: 2.0,
            filter: 0.08,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BrakeTiltConfig {
    pub strength: f32, // 0 disables
    pub lift_speed: f32,    // deg/s into the lift
    pub release_speed: f32, // deg/s out of it
    pub min_erpm: f32, // no lift below this speed
}

impl Default for BrakeTiltConfig {
    fn default() -> Self {
        Self {
            strength: 0.4,
            lift_speed: 5.0,
            release_speed: 3.0,
            min_erpm: 2_000.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TurnTiltConfig {
    pub strength: f32,
    pub angle_limit: f32,
    pub start_angle: f32, // deg of yaw aggregate before any lean
    pub start_erpm: f32,
    pub speed: f32, // deg/s, symmetric
    pub erpm_boost: f32, // percent extra at erpm_boost_end
    pub erpm_boost_end: f32,
    pub yaw_aggregate_target: f32, // deg of aggregate for full strength
}

impl Default for TurnTiltConfig {
    fn default() -> Self {
        Self {
            strength: 6.0,
            angle_limit: 3.0,
            start_angle: 1.5,
            start_erpm: 1_000.0,
            speed: 5.0,
            erpm_boost: 100.0,
            erpm_boost_end: 10_000.0,
            yaw_aggregate_target: 90.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputTiltConfig {
    pub remote_type: RemoteProtocol,
    pub angle_limit: f32,
    pub speed: f32, // deg/s
    pub deadband: f32, // fraction of full throw
    pub invert_throttle: bool,
    pub smoothing_factor: u8, // 0..3, ramps the step down near the target
}

impl Default for InputTiltConfig {
    fn default() -> Self {
        Self {
            remote_type: RemoteProtocol::None,
            angle_limit: 8.0,
            speed: 40.0,
            deadband: 0.05,
            invert_throttle: false,
            smoothing_factor: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SurgeConfig {
    pub duty_start: f32, // first stage trips here; stages 2 and 3 at +5% and +10%
    pub angle1: f32,
    pub angle2: f32,
    pub angle3: f32,
    pub off_speed: f32, // deg/s decay once duty recovers
}

impl Default for SurgeConfig {
    fn default() -> Self {
        Self {
            duty_start: 0.85,
            angle1: 0.6,
            angle2: 1.2,
            angle3: 1.8,
            off_speed: 1.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TractionConfig {
    pub enabled: bool,
    pub accel_trigger: f32, // ERPM/tick of ring-averaged acceleration
    pub erpm_scaled_trigger: f32, // added on top, scaled by speed
    pub min_dwell_ticks: u32,
    pub decay_factor: f32, // multiplied into every shaper offset per slip tick
    pub end_accel_margin: f32,
}

impl Default for TractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            accel_trigger: 6.0,
            erpm_scaled_trigger: 3.0,
            min_dwell_ticks: 160,
            decay_factor: 0.995,
            end_accel_margin: 2.0,
        }
    }
}

/// The full rider-tunable record. Immutable during a control tick; swapped
/// wholesale between ticks when a new blob arrives.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BalanceConfig {
    pub loop_rate: LoopConfig,
    pub startup: StartupConfig,
    pub faults: FaultConfig,
    pub pid: PidConfig,
    pub tiltback: TiltbackConfig,
    pub torque_tilt: TorqueTiltConfig,
    pub atr: AtrConfig,
    pub brake_tilt: BrakeTiltConfig,
    pub turn_tilt: TurnTiltConfig,
    pub input_tilt: InputTiltConfig,
    pub surge: SurgeConfig,
    pub traction: TractionConfig,
}

impl BalanceConfig {
    /// Clamp fields a bad blob or an over-eager tuner could push somewhere
    /// the control loop cannot tolerate.
    pub fn validate(&mut self) {
        self.loop_rate.frequency_hz = self.loop_rate.frequency_hz.clamp(LOOP_HZ_MIN, LOOP_HZ_MAX);
        self.pid.current_limit = self.pid.current_limit.max(0.0);
        self.pid.brake_current_limit = self.pid.brake_current_limit.max(0.0);
        self.pid.ki_limit = self.pid.ki_limit.max(0.0);
        self.pid.booster_ramp = self.pid.booster_ramp.max(0.1);
        self.startup.softstart_ramp_s = self.startup.softstart_ramp_s.max(0.05);
        self.torque_tilt.angle_limit = self.torque_tilt.angle_limit.max(0.0);
        self.atr.amps_accel_ratio = self.atr.amps_accel_ratio.max(0.1);
        self.atr.amps_decel_ratio = self.atr.amps_decel_ratio.max(0.1);
        self.atr.angle_limit = self.atr.angle_limit.max(0.0);
        self.turn_tilt.yaw_aggregate_target = self.turn_tilt.yaw_aggregate_target.max(1.0);
        self.input_tilt.deadband = self.input_tilt.deadband.clamp(0.0, 0.9);
        self.input_tilt.smoothing_factor = self.input_tilt.smoothing_factor.min(3);
        self.surge.duty_start = self.surge.duty_start.clamp(0.1, 1.0);
        self.traction.decay_factor = self.traction.decay_factor.clamp(0.5, 1.0);
    }

    pub fn tick_dt(&self) -> f32 {
        1.0 / self.loop_rate.frequency_hz as f32
    }
}
