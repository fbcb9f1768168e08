//! Second-order Butterworth sections for telemetry smoothing.

use libm::{sqrtf, tanf};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BiquadKind {
    LowPass,
    HighPass,
}

/// Transposed direct-form II biquad. Two registers of state, reset on
/// re-engage so a previous ride cannot ring into the next one.
#[derive(Clone, Copy, Debug)]
pub struct Biquad {
    a0: f32,
    a1: f32,
    a2: f32,
    b1: f32,
    b2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    /// `normalized_cutoff` is the cutoff frequency divided by the sample
    /// (loop) frequency; only the range (0, 0.5) is meaningful.
    pub fn new(kind: BiquadKind, normalized_cutoff: f32) -> Self {
        let q = 1.0 / sqrtf(2.0);
        let k = tanf(core::f32::consts::PI * normalized_cutoff);
        let norm = 1.0 / (1.0 + k / q + k * k);

        let (a0, a1) = match kind {
            BiquadKind::LowPass => {
                let a0 = k * k * norm;
                (a0, 2.0 * a0)
            }
            BiquadKind::HighPass => {
                let a0 = norm;
                (a0, -2.0 * a0)
            }
        };

        Self {
            a0,
            a1,
            a2: a0,
            b1: 2.0 * (k * k - 1.0) * norm,
            b2: (1.0 - k / q + k * k) * norm,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn process(&mut self, sample: f32) -> f32 {
        let out = sample * self.a0 + self.z1;
        self.z1 = sample * self.a1 + self.z2 - self.b1 * out;
        self.z2 = sample * self.a2 - self.b2 * out;
        out
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::value_close;

    #[test]
    fn reset_then_zero_input_stays_at_zero() {
        let mut f = Biquad::new(BiquadKind::LowPass, 0.01);
        for i in 0..100 {
            f.process(i as f32);
        }
        f.reset();
        for _ in 0..50 {
            assert_eq!(f.process(0.0), 0.0);
        }
    }

    #[test]
    fn lowpass_settles_to_dc_input() {
        let mut f = Biquad::new(BiquadKind::LowPass, 0.02);
        let mut out = 0.0;
        for _ in 0..2_000 {
            out = f.process(10.0);
        }
        assert!(value_close(out, 10.0, 1e-3));
    }

    #[test]
    fn highpass_rejects_dc_input() {
        let mut f = Biquad::new(BiquadKind::HighPass, 0.02);
        let mut out = 10.0;
        for _ in 0..2_000 {
            out = f.process(10.0);
        }
        assert!(value_close(out, 0.0, 1e-3));
    }

    #[test]
    fn lowpass_output_never_leads_a_step() {
        let mut f = Biquad::new(BiquadKind::LowPass, 0.005);
        let first = f.process(40.0);
        // one sample into a 40 A step the filter has barely moved
        assert!(first < 1.0);
    }
}
