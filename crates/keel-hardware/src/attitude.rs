//! Attitude crossing between the fusion context and the control loop.
//!
//! The attitude filter runs at the IMU's native rate in a different
//! execution context than the balance loop. The share below is a seqlock
//! over plain word-sized atomics: one writer (the fusion task), one reader
//! (the control loop), no locks. Only atomic loads and stores are used, so
//! it works on cores without compare-and-swap.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// One fused attitude sample. Angles in degrees, gyro in deg/s,
/// axes ordered roll/pitch/yaw.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttitudeSample {
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    pub gyro: [f32; 3],
    /// True once the fusion filter has converged from cold start.
    pub startup_done: bool,
}

pub struct AttitudeShare {
    seq: AtomicU32,
    pitch: AtomicU32,
    roll: AtomicU32,
    yaw: AtomicU32,
    gyro: [AtomicU32; 3],
    startup_done: AtomicBool,
}

impl AttitudeShare {
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            pitch: AtomicU32::new(0),
            roll: AtomicU32::new(0),
            yaw: AtomicU32::new(0),
            gyro: [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)],
            startup_done: AtomicBool::new(false),
        }
    }

    /// Writer side. Must only ever be called from one context; the odd
    /// sequence number marks a write in progress.
    pub fn publish(&self, sample: &AttitudeSample) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Release);

        self.pitch.store(sample.pitch.to_bits(), Ordering::Relaxed);
        self.roll.store(sample.roll.to_bits(), Ordering::Relaxed);
        self.yaw.store(sample.yaw.to_bits(), Ordering::Relaxed);
        for (slot, v) in self.gyro.iter().zip(sample.gyro.iter()) {
            slot.store(v.to_bits(), Ordering::Relaxed);
        }
        self.startup_done.store(sample.startup_done, Ordering::Relaxed);

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Reader side. Retries until a consistent snapshot is observed; with a
    /// single writer this terminates after at most one concurrent write.
    pub fn snapshot(&self) -> AttitudeSample {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 != 0 {
                continue;
            }
            let sample = AttitudeSample {
                pitch: f32::from_bits(self.pitch.load(Ordering::Relaxed)),
                roll: f32::from_bits(self.roll.load(Ordering::Relaxed)),
                yaw: f32::from_bits(self.yaw.load(Ordering::Relaxed)),
                gyro: [
                    f32::from_bits(self.gyro[0].load(Ordering::Relaxed)),
                    f32::from_bits(self.gyro[1].load(Ordering::Relaxed)),
                    f32::from_bits(self.gyro[2].load(Ordering::Relaxed)),
                ],
                startup_done: self.startup_done.load(Ordering::Relaxed),
            };
            let after = self.seq.load(Ordering::Acquire);
            if before == after {
                return sample;
            }
        }
    }
}

impl Default for AttitudeShare {
    fn default() -> Self {
        Self::new()
    }
}
