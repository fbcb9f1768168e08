//! Setpoint shapers.
//!
//! Every shaper owns an instantaneous `target` and a rate-limited `offset`
//! that walks toward it via `step_toward`; the offset never moves more than
//! one step per tick no matter how abruptly the target jumps. The pipeline
//! order (tiltback, torque tilt, ATR, brake tilt, turn tilt, input tilt,
//! surge) is part of the tuning surface and is owned by the controller.

pub mod atr;
pub mod brake;
pub mod input;
pub mod tiltback;
pub mod torque;
pub mod turn;

/// Move `value` toward `target` by at most `step`.
#[inline]
pub fn step_toward(value: f32, target: f32, step: f32) -> f32 {
    if target > value {
        if target - value > step {
            value + step
        } else {
            target
        }
    } else if value - target > step {
        value - step
    } else {
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_toward_is_bounded_and_exact() {
        assert_eq!(step_toward(0.0, 10.0, 0.5), 0.5);
        assert_eq!(step_toward(0.0, -10.0, 0.5), -0.5);
        assert_eq!(step_toward(0.0, 0.3, 0.5), 0.3);
        assert_eq!(step_toward(1.0, 1.0, 0.5), 1.0);
    }

    #[test]
    fn step_toward_never_overshoots() {
        let mut v = 0.0;
        for _ in 0..100 {
            v = step_toward(v, 3.0, 0.04);
            assert!(v <= 3.0);
        }
        assert_eq!(v, 3.0);
    }
}
