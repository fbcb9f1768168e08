//! Motor-driver boundary. The balance core never touches FOC/PWM itself;
//! it reads one telemetry snapshot per tick and commands a current.

/// One per-tick read of the motor driver's filtered telemetry.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorTelemetry {
    pub erpm: f32,
    pub current: f32, // amps, filtered by the driver
    pub duty_cycle: f32,
    pub input_voltage: f32,
    pub temp_fet: f32,
    pub temp_motor: f32,
}

/// All calls must be non-blocking or bounded-time; they run inside the
/// control tick.
pub trait MotorDriver {
    fn telemetry(&mut self) -> MotorTelemetry;
    fn set_current(&mut self, amps: f32);
    fn set_brake_current(&mut self, amps: f32);
    /// How long the driver keeps the last current command alive without
    /// a refresh, in seconds.
    fn set_current_off_delay(&mut self, seconds: f32);
    /// Keep the driver's communication watchdog fed.
    fn timeout_reset(&mut self);
}

/// Footpad ADC boundary. Channels that are physically absent read 0.
pub trait FootpadAdc {
    fn read(&mut self) -> (f32, f32);
}
