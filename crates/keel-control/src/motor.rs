//! Per-tick motor telemetry derivation.

use keel_config::{ACCEL_RING_SIZE, DUTY_SMOOTH_ALPHA, STANDSTILL_ERPM};
use keel_hardware::MotorTelemetry;
use libm::fabsf;

use crate::filter::{Biquad, BiquadKind};

/// Rolling view of the motor. Raw ERPM deltas are far too noisy at low
/// speed to act on directly; the fixed-window ring average trades a little
/// latency for noise rejection, and the consumers (ATR, traction control)
/// add their own thresholds on top.
pub struct MotorData {
    pub erpm: f32,
    pub abs_erpm: f32,
    /// +1 or -1; zero ERPM counts as +1 by convention.
    pub erpm_sign: f32,
    pub current: f32,
    /// Biquad-filtered current for torque-response consumers.
    pub filtered_current: f32,
    /// Current opposing the direction of travel while rolling.
    pub braking: bool,
    pub duty_cycle: f32,
    pub duty_smooth: f32,
    /// Ring-averaged ERPM delta per tick.
    pub acceleration: f32,
    pub input_voltage: f32,
    pub temp_fet: f32,
    pub temp_motor: f32,

    last_erpm: f32,
    ring: [f32; ACCEL_RING_SIZE],
    ring_idx: usize,
    current_filter: Biquad,
}

impl MotorData {
    pub fn new(loop_hz: u16, current_filter_hz: f32) -> Self {
        Self {
            erpm: 0.0,
            abs_erpm: 0.0,
            erpm_sign: 1.0,
            current: 0.0,
            filtered_current: 0.0,
            braking: false,
            duty_cycle: 0.0,
            duty_smooth: 0.0,
            acceleration: 0.0,
            input_voltage: 0.0,
            temp_fet: 0.0,
            temp_motor: 0.0,
            last_erpm: 0.0,
            ring: [0.0; ACCEL_RING_SIZE],
            ring_idx: 0,
            current_filter: Biquad::new(BiquadKind::LowPass, current_filter_hz / loop_hz as f32),
        }
    }

    /// Swap the current filter when the cutoff or loop rate changes.
    pub fn reconfigure(&mut self, loop_hz: u16, current_filter_hz: f32) {
        self.current_filter = Biquad::new(BiquadKind::LowPass, current_filter_hz / loop_hz as f32);
    }

    pub fn update(&mut self, t: &MotorTelemetry) {
        self.erpm = t.erpm;
        self.abs_erpm = fabsf(t.erpm);
        self.erpm_sign = if t.erpm < 0.0 { -1.0 } else { 1.0 };

        let delta = t.erpm - self.last_erpm;
        self.last_erpm = t.erpm;
        self.ring[self.ring_idx] = delta;
        self.ring_idx = (self.ring_idx + 1) % ACCEL_RING_SIZE;
        let sum: f32 = self.ring.iter().sum();
        self.acceleration = sum / ACCEL_RING_SIZE as f32;

        self.current = t.current;
        self.filtered_current = self.current_filter.process(t.current);
        self.braking = self.abs_erpm > STANDSTILL_ERPM && t.current * self.erpm_sign < 0.0;

        self.duty_cycle = fabsf(t.duty_cycle);
        self.duty_smooth += DUTY_SMOOTH_ALPHA * (self.duty_cycle - self.duty_smooth);

        self.input_voltage = t.input_voltage;
        self.temp_fet = t.temp_fet;
        self.temp_motor = t.temp_motor;
    }

    /// Zero the rolling state. Called on engage, not on fault, so the
    /// history survives a stop for diagnostics.
    pub fn reset(&mut self) {
        self.ring = [0.0; ACCEL_RING_SIZE];
        self.ring_idx = 0;
        self.acceleration = 0.0;
        self.duty_smooth = 0.0;
        self.filtered_current = 0.0;
        self.current_filter.reset();
        // avoid a phantom acceleration spike on the first tick after reset
        self.last_erpm = self.erpm;
    }
}
