#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

pub mod faults;
pub mod filter;
pub mod footpad;
pub mod motor;
pub mod pid;
pub mod state;
pub mod surge;
pub mod tilt;
pub mod traction;

// Re-export commonly used types
pub use faults::{can_engage, FaultMonitor};
pub use filter::{Biquad, BiquadKind};
pub use footpad::{Footpad, FootpadState};
pub use motor::MotorData;
pub use pid::BalancePid;
pub use state::{Mode, RunState, SetpointAdjustment, State, StopCondition};
pub use surge::Surge;
pub use traction::Traction;
