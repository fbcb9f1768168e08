#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

pub mod alert;
pub mod attitude;
pub mod error;
pub mod motor;
pub mod remote;
pub mod store;

// Re-export commonly used types
pub use alert::BeepReason;
pub use attitude::{AttitudeSample, AttitudeShare};
pub use error::{ConfigError, KeelError, KeelResult, StoreError};
pub use motor::{FootpadAdc, MotorDriver, MotorTelemetry};
pub use remote::{RemoteInput, RemoteProtocol, RemoteSource};
pub use store::{load_config, save_config, ConfigStore};
