//! FFT cross-correlation and Hilbert envelopes for lag estimation.

use num_complex::Complex64;
use rustfft::FftPlanner;

/// Lag (in samples) of `b` relative to `a` that maximizes their
/// cross-correlation. Negative means `b` starts later than `a`, positive
/// that it starts earlier.
pub fn best_lag(a: &[f64], b: &[f64]) -> i64 {
    let max_lag = a.len().max(b.len()) as i64 - 1;
    if max_lag <= 0 {
        return 0;
    }

    let corr = cross_correlate(a, b);

    // corr holds positive lags at the head and negative lags wrapped onto
    // the tail; scan [-max_lag, max_lag] for the peak, preferring the
    // smallest magnitude lag on ties.
    let n = corr.len() as i64;
    let mut best = 0i64;
    let mut best_value = f64::NEG_INFINITY;
    for lag in -max_lag..=max_lag {
        let index = lag.rem_euclid(n) as usize;
        let value = corr[index];
        if value > best_value || (value == best_value && lag.abs() < best.abs()) {
            best_value = value;
            best = lag;
        }
    }
    best
}

/// Circular cross-correlation via the frequency domain, zero-padded to the
/// next power of two past 2n - 1 to make it linear.
fn cross_correlate(a: &[f64], b: &[f64]) -> Vec<f64> {
    let common = a.len().max(b.len());
    let fft_points = (2 * common - 1).next_power_of_two();

    let mut fa: Vec<Complex64> = a.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    let mut fb: Vec<Complex64> = b.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    fa.resize(fft_points, Complex64::new(0.0, 0.0));
    fb.resize(fft_points, Complex64::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    let forward = planner.plan_fft_forward(fft_points);
    forward.process(&mut fa);
    forward.process(&mut fb);

    let mut product: Vec<Complex64> = fa
        .iter()
        .zip(&fb)
        .map(|(x, y)| x * y.conj())
        .collect();

    let inverse = planner.plan_fft_inverse(fft_points);
    inverse.process(&mut product);

    product
        .iter()
        .map(|c| c.re / fft_points as f64)
        .collect()
}

/// Upper amplitude envelope via the analytic (Hilbert) signal.
pub fn upper_envelope(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let n = signal.len();
    let mean = signal.iter().sum::<f64>() / n as f64;

    let mut spectrum: Vec<Complex64> = signal
        .iter()
        .map(|&v| Complex64::new(v - mean, 0.0))
        .collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut spectrum);

    // Analytic-signal scaling: DC and Nyquist keep unit weight, positive
    // frequencies are doubled, negative frequencies are zeroed.
    let half = if n % 2 == 1 { (n + 1) / 2 } else { n / 2 };
    for (index, value) in spectrum.iter_mut().enumerate() {
        let scale = if index == 0 {
            1.0
        } else if index == n / 2 {
            if n % 2 == 1 {
                2.0
            } else {
                1.0
            }
        } else if index < half {
            2.0
        } else {
            0.0
        };
        *value *= scale;
    }

    planner.plan_fft_inverse(n).process(&mut spectrum);
    spectrum
        .iter()
        .map(|c| (*c / n as f64).norm() + mean)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_lag_for_identical_signals() {
        let signal: Vec<f64> = (0..256).map(|i| (i as f64 * 0.1).sin()).collect();
        assert_eq!(best_lag(&signal, &signal), 0);
    }

    #[test]
    fn detects_a_known_shift() {
        let base: Vec<f64> = (0..512)
            .map(|i| (i as f64 * 0.07).sin() + 0.3 * (i as f64 * 0.31).cos())
            .collect();
        let mut shifted = vec![0.0; 50];
        shifted.extend_from_slice(&base[..462]);
        // The delayed copy correlates best when pulled 50 samples back.
        assert_eq!(best_lag(&base, &shifted), -50);
        assert_eq!(best_lag(&shifted, &base), 50);
    }

    #[test]
    fn envelope_bounds_a_modulated_tone() {
        let signal: Vec<f64> = (0..1000)
            .map(|i| {
                let t = i as f64 / 1000.0;
                (1.0 + 0.5 * (2.0 * std::f64::consts::PI * 2.0 * t).sin())
                    * (2.0 * std::f64::consts::PI * 100.0 * t).sin()
            })
            .collect();
        let env = upper_envelope(&signal);
        assert_eq!(env.len(), signal.len());
        // Away from the edges, the envelope should dominate the carrier.
        for i in 100..900 {
            assert!(env[i] + 0.15 >= signal[i].abs());
        }
    }
}
