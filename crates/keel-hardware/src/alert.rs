//! Rider-facing alert reasons. Tone/pattern synthesis is the host's job;
//! the core only names why it is beeping. Each variant has exactly one
//! meaning.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeepReason {
    /// Duty-cycle pushback engaged.
    TiltbackDuty,
    /// Battery voltage above the high-voltage threshold.
    TiltbackHighVoltage,
    /// Battery voltage below the low-voltage threshold.
    TiltbackLowVoltage,
    /// FET or motor temperature pushback engaged.
    TiltbackTemperature,
    /// Surge stage entered (1..=3).
    Surge(u8),
    /// Commanded current crossed the continuous-current warning line.
    Overcurrent,
    /// Reverse-stop is braking the board to a halt.
    ReverseStop,
    /// Remote input went stale while input tilt was active.
    RemoteStale,
}
