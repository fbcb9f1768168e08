//! Read-mostly status surface for low-rate consumers (lighting, telemetry).
//!
//! Published every `STATUS_DIVIDER` ticks; a consumer seeing a snapshot up
//! to one publish period stale is an accepted tradeoff. Every field has one
//! stable meaning.

use embassy_sync::signal::Signal;
use keel_control::{FootpadState, RunState, SetpointAdjustment, StopCondition};
use keel_hardware::BeepReason;

/// Publish status at roughly 30 Hz out of an 800 Hz loop.
pub const STATUS_DIVIDER: u32 = 27;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusSnapshot {
    pub run: RunState,
    pub sat: SetpointAdjustment,
    pub stop_condition: StopCondition,
    pub footpad: FootpadState,
    pub wheelslip: bool,
    pub darkride: bool,
    pub setpoint: f32,
    pub pitch: f32,
    pub current_request: f32,
    pub duty_smooth: f32,
}

pub type StatusSignal<M> = Signal<M, StatusSnapshot>;
pub type AlertSignal<M> = Signal<M, BeepReason>;
