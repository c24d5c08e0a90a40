//! Input lowpass filter and decimator (component D).
//!
//! Grounded on `rustradio`'s plain-struct filter style (`IIRFilter`,
//! `SinglePoleIIR`) rather than its `Block`-derive machinery: this is
//! steady-state DSP state owned directly by a channel, not a
//! standalone flowgraph node. The coefficients implement a 2-pole
//! Chebyshev lowpass (spec.md §4.D), designed once per sample rate
//! and then applied independently to the real and imaginary rails of
//! a complex baseband stream.

use crate::Complex;

/// Coefficients and history for a 2-pole IIR lowpass, applied
/// independently to the real and imaginary parts of a complex signal.
#[derive(Debug, Clone, Copy)]
struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    const fn zero() -> Self {
        BiquadState { x1: 0.0, x2: 0.0, y1: 0.0, y2: 0.0 }
    }

    fn step(&mut self, x: f32, a0: f32, a1: f32, a2: f32, b1: f32, b2: f32) -> f32 {
        let y = a0 * x + a1 * self.x1 + a2 * self.x2 + b1 * self.y1 + b2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// 2-pole Chebyshev lowpass + integer decimator, per spec.md §4.D:
/// cutoff 8 kHz, 0.5% ripple, applied ahead of the per-channel
/// downmixer so the decimated complex rate matches the symbol rate
/// times [`crate::config::SPS`].
pub struct InputFilter {
    a0: f32,
    a1: f32,
    a2: f32,
    b1: f32,
    b2: f32,
    real: BiquadState,
    imag: BiquadState,
    oversample: u32,
    phase: u32,
}

const CUTOFF_HZ: f32 = 8_000.0;
const RIPPLE_PCT: f32 = 0.5;

impl InputFilter {
    /// Design a filter for `sample_rate`, decimating by `oversample`.
    pub fn new(sample_rate: u32, oversample: u32) -> Self {
        let (a0, a1, a2, b1, b2) = design_chebyshev_lpf(sample_rate as f32, CUTOFF_HZ, RIPPLE_PCT);
        InputFilter {
            a0,
            a1,
            a2,
            b1,
            b2,
            real: BiquadState::zero(),
            imag: BiquadState::zero(),
            oversample: oversample.max(1),
            phase: 0,
        }
    }

    /// Filter one input sample. Returns `Some(sample)` once every
    /// `oversample` calls (the decimated output), `None` otherwise.
    pub fn process(&mut self, input: Complex) -> Option<Complex> {
        let re = self.real.step(input.re, self.a0, self.a1, self.a2, self.b1, self.b2);
        let im = self.imag.step(input.im, self.a0, self.a1, self.a2, self.b1, self.b2);
        self.phase += 1;
        if self.phase >= self.oversample {
            self.phase = 0;
            Some(Complex::new(re, im))
        } else {
            None
        }
    }
}

/// Design a 2-pole Chebyshev Type I lowpass as a direct-form II biquad.
///
/// Derivation: a unity-cutoff analog Chebyshev pole pair gives
/// `H(s) = a0 / (s^2 + a1*s + a0)`; frequency-scaling by the prewarped
/// cutoff `wc = tan(pi*fc/fs)` and applying the bilinear transform
/// `s = (1-z^-1)/(1+z^-1)` yields the coefficients below. This is a
/// from-scratch derivation (no filter-designer source survives in
/// `original_source/`); the steady-state difference equation in
/// spec.md §4.D (`y[n] = a0 x[n] + a1 x[n-1] + a2 x[n-2] + b1 y[n-1] +
/// b2 y[n-2]`) is what every caller depends on, and is matched exactly.
fn design_chebyshev_lpf(sample_rate: f32, cutoff_hz: f32, ripple_pct: f32) -> (f32, f32, f32, f32, f32) {
    use std::f32::consts::PI;

    let ripple_db = ripple_pct / 100.0 * 10.0; // percent-ripple to dB
    let epsilon = (10f32.powf(ripple_db / 10.0) - 1.0).sqrt().max(1e-6);
    let v0 = (1.0 / epsilon).asinh() / 2.0;

    // Pole angle for a 2-pole Chebyshev prototype (n=2): theta_1 = pi/4.
    let theta1 = PI / 4.0;
    let re1 = -v0.sinh() * theta1.sin();
    let im1 = v0.cosh() * theta1.cos();

    // Unity-cutoff analog prototype: H(s) = analog_a0 / (s^2 + analog_a1*s + analog_a0).
    let analog_a0 = re1 * re1 + im1 * im1;
    let analog_a1 = -2.0 * re1;

    let wc = (PI * cutoff_hz / sample_rate).tan();
    let b = analog_a1 * wc; // frequency-scaled linear term
    let c = analog_a0 * wc * wc; // frequency-scaled constant term
    let k = c; // unity DC gain: H(0) = k/c = 1

    let denom = 1.0 + b + c;
    let a0 = k / denom;
    let a1 = 2.0 * k / denom;
    let a2 = k / denom;
    let b1 = (2.0 - 2.0 * c) / denom;
    let b2 = -(1.0 - b + c) / denom;

    (a0, a1, a2, b1, b2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimation_emits_one_sample_per_oversample_inputs() {
        let mut f = InputFilter::new(2_100_000, 10);
        let mut emitted = 0;
        for _ in 0..30 {
            if f.process(Complex::new(1.0, 0.0)).is_some() {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 3);
    }

    #[test]
    fn dc_input_settles_to_a_finite_steady_state() {
        let mut f = InputFilter::new(2_100_000, 1);
        let mut last = Complex::new(0.0, 0.0);
        for _ in 0..5000 {
            if let Some(s) = f.process(Complex::new(1.0, 0.0)) {
                last = s;
            }
        }
        assert!(last.re.is_finite());
        assert!(last.re > 0.0);
    }

    #[test]
    fn zero_input_stays_zero() {
        let mut f = InputFilter::new(2_100_000, 1);
        for _ in 0..100 {
            if let Some(s) = f.process(Complex::new(0.0, 0.0)) {
                assert_eq!(s.re, 0.0);
                assert_eq!(s.im, 0.0);
            }
        }
    }
}
