//! ERB-spaced gammatone filter bank.
//!
//! Filter design follows the Patterson-Holdsworth cochlear model with
//! Glasberg and Moore ERB parameters: each band is a fourth-order gammatone
//! realized as a cascade of four biquad sections sharing one overall gain.

use num_complex::Complex64;
use tracing::{debug, warn};

const EAR_Q: f64 = 9.26449;
const MIN_BANDWIDTH: f64 = 24.7;
const FILTER_ORDER: f64 = 1.0;

/// Designed coefficients for one gammatone band.
#[derive(Debug, Clone)]
pub struct BandCoefficients {
    pub a0: f64,
    pub a11: f64,
    pub a12: f64,
    pub a13: f64,
    pub a14: f64,
    pub a2: f64,
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub gain: f64,
}

/// Filter bank over `num_bands` ERB-spaced channels, lowest frequency first.
#[derive(Debug, Clone)]
pub struct GammatoneFilterBank {
    center_frequencies: Vec<f64>,
    coefficients: Vec<BandCoefficients>,
}

impl GammatoneFilterBank {
    /// Design the bank for a sample rate and frequency span.
    pub fn new(sample_rate: u32, num_bands: usize, low_freq: f64, mut high_freq: f64) -> Self {
        let nyquist = sample_rate as f64 / 2.0;
        if high_freq > nyquist {
            warn!(
                sample_rate,
                high_freq, "band ceiling above Nyquist, clamping"
            );
            high_freq = nyquist;
        }

        // Center frequencies come out highest-first from the ERB spacing
        // recurrence; reverse at the end so band 0 is the lowest.
        let mut cfs = uniform_center_frequencies(low_freq, high_freq, num_bands);
        let t = 1.0 / sample_rate as f64;
        let mut coefficients: Vec<BandCoefficients> =
            cfs.iter().map(|&cf| design_band(cf, t)).collect();
        cfs.reverse();
        coefficients.reverse();

        debug!(
            num_bands,
            low_freq,
            high_freq,
            lowest_cf = cfs.first().copied().unwrap_or(0.0),
            highest_cf = cfs.last().copied().unwrap_or(0.0),
            "designed gammatone filter bank"
        );

        Self {
            center_frequencies: cfs,
            coefficients,
        }
    }

    pub fn num_bands(&self) -> usize {
        self.coefficients.len()
    }

    pub fn center_frequencies(&self) -> &[f64] {
        &self.center_frequencies
    }

    /// Filter a frame through every band, producing one output row per band.
    pub fn filter_frame(&self, frame: &[f64]) -> Vec<Vec<f64>> {
        self.coefficients
            .iter()
            .map(|c| {
                let numer1 = [c.a0 / c.gain, c.a11 / c.gain, c.a2 / c.gain];
                let numer2 = [c.a0, c.a12, c.a2];
                let numer3 = [c.a0, c.a13, c.a2];
                let numer4 = [c.a0, c.a14, c.a2];
                let denom = [c.b0, c.b1, c.b2];

                let stage1 = biquad(&numer1, &denom, frame);
                let stage2 = biquad(&numer2, &denom, &stage1);
                let stage3 = biquad(&numer3, &denom, &stage2);
                biquad(&numer4, &denom, &stage3)
            })
            .collect()
    }
}

/// Direct form II transposed biquad with zero initial conditions.
fn biquad(numer: &[f64; 3], denom: &[f64; 3], signal: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(signal.len());
    let mut z1 = 0.0;
    let mut z2 = 0.0;
    for &x in signal {
        let y = numer[0] * x + z1;
        z1 = numer[1] * x + z2 - denom[1] * y;
        z2 = numer[2] * x - denom[2] * y;
        out.push(y);
    }
    out
}

/// ERB-spaced center frequencies, highest first.
///
/// Derived in Apple TR #35, "An Efficient Implementation of the
/// Patterson-Holdsworth Cochlear Filter Bank", pages 33-34.
fn uniform_center_frequencies(low_freq: f64, high_freq: f64, num_bands: usize) -> Vec<f64> {
    let a = -(EAR_Q * MIN_BANDWIDTH);
    let b = -(high_freq + EAR_Q * MIN_BANDWIDTH).ln();
    let c = (low_freq + EAR_Q * MIN_BANDWIDTH).ln();
    let d = high_freq + EAR_Q * MIN_BANDWIDTH;
    let e = (b + c) / num_bands as f64;

    (0..num_bands)
        .map(|i| a + ((i + 1) as f64 * e).exp() * d)
        .collect()
}

fn design_band(cf: f64, t: f64) -> BandCoefficients {
    use std::f64::consts::PI;

    let erb = ((cf / EAR_Q).powf(FILTER_ORDER) + MIN_BANDWIDTH.powf(FILTER_ORDER))
        .powf(1.0 / FILTER_ORDER);
    let bw = 1.019 * 2.0 * PI * erb;

    let exp_bt = (bw * t).exp();
    let cos_t = (2.0 * cf * PI * t).cos();
    let sin_t = (2.0 * cf * PI * t).sin();

    let b1 = -2.0 * cos_t / exp_bt;
    let b2 = (-2.0 * bw * t).exp();

    let sqrt_pos = (3.0 + 2f64.powf(1.5)).sqrt();
    let sqrt_neg = (3.0 - 2f64.powf(1.5)).sqrt();
    let b_pos = 2.0 * sin_t * t * sqrt_pos;
    let b_neg = 2.0 * sin_t * t * sqrt_neg;
    let a = 2.0 * t * cos_t;

    let a11 = -(a / exp_bt + b_pos / exp_bt) / 2.0;
    let a12 = -(a / exp_bt - b_pos / exp_bt) / 2.0;
    let a13 = -(a / exp_bt + b_neg / exp_bt) / 2.0;
    let a14 = -(a / exp_bt - b_neg / exp_bt) / 2.0;

    // The overall gain is the magnitude of the cascade's response at the
    // center frequency.
    let i = Complex64::new(0.0, 1.0);
    let x_exp = (4.0 * i * cf * PI * t).exp();
    let x01 = -2.0 * x_exp * t;
    let x02 = 2.0 * (-(bw * t) + 2.0 * i * cf * PI * t).exp() * t;

    let x1 = x01 + x02 * (cos_t - sqrt_neg * sin_t);
    let x2 = x01 + x02 * (cos_t + sqrt_neg * sin_t);
    let x3 = x01 + x02 * (cos_t - sqrt_pos * sin_t);
    let x4 = x01 + x02 * (cos_t + sqrt_pos * sin_t);
    let x5 = Complex64::new(-2.0 / (2.0 * bw * t).exp(), 0.0) - 2.0 * x_exp
        + (2.0 * (1.0 + x_exp)) / (bw * t).exp();
    let gain = ((x1 * x2 * x3 * x4) / x5.powf(4.0)).norm();

    BandCoefficients {
        a0: t,
        a11,
        a12,
        a13,
        a14,
        a2: 0.0,
        b0: 1.0,
        b1,
        b2,
        gain,
    }
}
