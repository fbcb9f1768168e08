//! Remote/throttle input boundary.

pub use keel_config::RemoteProtocol;

/// Latest remote throttle value plus its age in control ticks. The value is
/// normalized to [-1, 1]; `age_ticks` is bumped once per tick and zeroed
/// whenever a fresh value arrives.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RemoteInput {
    pub value: f32,
    pub age_ticks: u32,
}

impl RemoteInput {
    pub fn feed(&mut self, value: f32) {
        self.value = value.clamp(-1.0, 1.0);
        self.age_ticks = 0;
    }

    pub fn tick(&mut self) {
        self.age_ticks = self.age_ticks.saturating_add(1);
    }

    pub fn connected(&self, timeout_ticks: u32) -> bool {
        self.age_ticks < timeout_ticks
    }
}

/// Polled once per control tick by the loop runner.
pub trait RemoteSource {
    fn poll(&mut self) -> RemoteInput;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_clamps_and_resets_age() {
        let mut r = RemoteInput::default();
        for _ in 0..10 {
            r.tick();
        }
        r.feed(1.7);
        assert_eq!(r.value, 1.0);
        assert_eq!(r.age_ticks, 0);
        assert!(r.connected(1));
    }

    #[test]
    fn goes_stale_after_the_timeout() {
        let mut r = RemoteInput::default();
        r.feed(0.3);
        for _ in 0..400 {
            r.tick();
        }
        assert!(!r.connected(400));
        assert!(r.connected(401));
    }
}
