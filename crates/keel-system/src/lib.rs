#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

pub mod controller;
pub mod mailbox;
pub mod pacing;
pub mod run;
pub mod status;

pub use controller::{Controller, MotorAction, TickInput, TickOutput};
pub use mailbox::ConfigMailbox;
pub use pacing::{LoopPacer, LoopStats};
pub use run::{run_control_loop, LoopIo};
pub use status::{AlertSignal, StatusSignal, StatusSnapshot, STATUS_DIVIDER};
