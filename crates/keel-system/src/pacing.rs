//! Fixed-period loop pacing with overshoot compensation.
//!
//! Every rate-limit and step-size constant in the configuration assumes a
//! constant sample period, so the pacer keeps the *average* rate accurate:
//! the measured start-to-start period overshoot is low-pass filtered and
//! subtracted from the next sleep.

const OVERSHOOT_ALPHA: f32 = 0.01;

pub struct LoopPacer {
    period_us: u32,
    filtered_overshoot_us: f32,
}

impl LoopPacer {
    pub fn new(hz: u16) -> Self {
        Self {
            period_us: 1_000_000 / hz.max(1) as u32,
            filtered_overshoot_us: 0.0,
        }
    }

    pub fn set_rate(&mut self, hz: u16) {
        self.period_us = 1_000_000 / hz.max(1) as u32;
        self.filtered_overshoot_us = 0.0;
    }

    pub fn period_us(&self) -> u32 {
        self.period_us
    }

    /// Sleep to request after a tick that spent `busy_us` computing, given
    /// the measured start-to-start period of the loop.
    pub fn sleep_us(&mut self, busy_us: u32, measured_period_us: u32) -> u32 {
        let overshoot = measured_period_us.saturating_sub(self.period_us) as f32;
        self.filtered_overshoot_us += OVERSHOOT_ALPHA * (overshoot - self.filtered_overshoot_us);
        self.period_us
            .saturating_sub(busy_us)
            .saturating_sub(self.filtered_overshoot_us as u32)
    }
}

/// Rolling loop-health counters for the status surface.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoopStats {
    pub ticks: u32,
    pub overruns: u32,
    pub max_busy_us: u32,
}

impl LoopStats {
    pub fn record(&mut self, busy_us: u32, period_us: u32) {
        self.ticks = self.ticks.wrapping_add(1);
        if busy_us > period_us {
            self.overruns = self.overruns.wrapping_add(1);
        }
        if busy_us > self.max_busy_us {
            self.max_busy_us = busy_us;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_loop_sleeps_the_full_remainder() {
        let mut p = LoopPacer::new(800); // 1250 us period
        assert_eq!(p.sleep_us(250, 1_250), 1_000);
    }

    #[test]
    fn sustained_overshoot_shortens_the_sleep() {
        let mut p = LoopPacer::new(800);
        // scheduler consistently waking 100 us late
        let mut sleep = 0;
        for _ in 0..2_000 {
            sleep = p.sleep_us(250, 1_350);
        }
        // compensation converges to the 100 us of overshoot
        assert!(sleep <= 1_000 - 95);
        assert!(sleep >= 1_000 - 100);
    }

    #[test]
    fn compensation_is_gradual_not_a_step() {
        let mut p = LoopPacer::new(800);
        let first = p.sleep_us(250, 1_350);
        // a single late wake barely moves the sleep
        assert!(first >= 998);
    }

    #[test]
    fn overrunning_tick_never_underflows() {
        let mut p = LoopPacer::new(800);
        assert_eq!(p.sleep_us(5_000, 5_000), 0);
    }

    #[test]
    fn stats_count_overruns_and_peak() {
        let mut s = LoopStats::default();
        s.record(300, 1_250);
        s.record(1_400, 1_250);
        s.record(900, 1_250);
        assert_eq!(s.ticks, 3);
        assert_eq!(s.overruns, 1);
        assert_eq!(s.max_busy_us, 1_400);
    }
}
