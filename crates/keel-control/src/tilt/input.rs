//! Input tilt: remote throttle mapped to a lean angle.

use keel_config::{step_per_tick, InputTiltConfig, RemoteProtocol};
use keel_hardware::{BeepReason, RemoteInput};
use libm::fabsf;

use crate::tilt::step_toward;

#[derive(Clone, Copy, Debug, Default)]
pub struct InputTilt {
    pub target: f32,
    pub offset: f32,
    stale_beeped: bool,
}

impl InputTilt {
    /// Returns a beep the first tick the remote goes stale mid-use.
    pub fn update(
        &mut self,
        remote: &RemoteInput,
        connected: bool,
        cfg: &InputTiltConfig,
        hz: u16,
    ) -> Option<BeepReason> {
        let mut beep = None;

        if cfg.remote_type == RemoteProtocol::None {
            self.target = 0.0;
        } else if !connected {
            // release at the normal rate rather than snapping level
            self.target = 0.0;
            if !self.stale_beeped && self.offset != 0.0 {
                self.stale_beeped = true;
                beep = Some(BeepReason::RemoteStale);
            }
        } else {
            self.stale_beeped = false;
            let mut value = remote.value;
            if cfg.invert_throttle {
                value = -value;
            }
            // deadband, re-expanded so full throw still reaches full tilt
            value = if fabsf(value) < cfg.deadband {
                0.0
            } else {
                let sign = if value < 0.0 { -1.0 } else { 1.0 };
                sign * (fabsf(value) - cfg.deadband) / (1.0 - cfg.deadband)
            };
            self.target = value * cfg.angle_limit;
        }

        let mut step = step_per_tick(cfg.speed, hz);
        if cfg.smoothing_factor > 0 {
            // sticky-tilt centering: shrink the step near the target so the
            // lean settles without hunting
            let ramp = cfg.angle_limit * cfg.smoothing_factor as f32 * 0.2;
            let diff = fabsf(self.target - self.offset);
            if diff < ramp {
                step *= (diff / ramp).max(0.02);
            }
        }

        self.offset = step_toward(self.offset, self.target, step);
        beep
    }

    pub fn reset(&mut self) {
        self.target = 0.0;
        self.offset = 0.0;
        self.stale_beeped = false;
    }

    pub fn winddown(&mut self, factor: f32) {
        self.offset *= factor;
        self.target *= factor;
    }
}
