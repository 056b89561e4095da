//! Time-domain signal preprocessing.
//!
//! The degraded signal is gain-scaled to match the reference's sound
//! pressure level before any spectral analysis, so that loudness differences
//! introduced by transcoding chains do not register as quality loss.

use tracing::debug;

use crate::types::AudioSignal;

const SPL_REFERENCE_POINT: f64 = 0.00002;

/// Sound pressure level of a signal in dB relative to 20 micropascals.
pub fn sound_pressure_level(signal: &AudioSignal) -> f64 {
    let sum_sq: f64 = signal.samples.iter().map(|s| s * s).sum();
    let pressure = (sum_sq / signal.samples.len() as f64).sqrt();
    20.0 * (pressure / SPL_REFERENCE_POINT).log10()
}

/// Scale the degraded signal so its SPL matches the reference's.
pub fn scale_to_match_spl(reference: &AudioSignal, degraded: &AudioSignal) -> AudioSignal {
    let ref_spl = sound_pressure_level(reference);
    let deg_spl = sound_pressure_level(degraded);
    let scale = 10f64.powf((ref_spl - deg_spl) / 20.0);
    // A silent signal has no defined level to match.
    if !scale.is_finite() {
        return degraded.clone();
    }
    debug!(ref_spl, deg_spl, scale, "matching sound pressure level");
    AudioSignal::new(
        degraded.samples.iter().map(|s| s * scale).collect(),
        degraded.sample_rate,
    )
}

/// Extract the slice of a signal between two times, padding with silence
/// where the window extends before the start or past the end.
pub fn slice(signal: &AudioSignal, start_time: f64, end_time: f64) -> AudioSignal {
    let sr = signal.sample_rate as f64;
    let len = signal.samples.len() as isize;
    let start_index = (start_time * sr).floor() as isize;
    let end_index = (end_time * sr).floor() as isize;

    let mut samples = Vec::with_capacity((end_index - start_index).max(0) as usize);
    // Silence before the signal begins, for negative start times.
    if start_index < 0 {
        samples.resize((-start_index) as usize, 0.0);
    }
    let first = start_index.max(0).min(len) as usize;
    let last = end_index.max(0).min(len) as usize;
    samples.extend_from_slice(&signal.samples[first..last]);
    // Silence after the signal ends, if the window runs past it.
    if end_index > len {
        samples.resize(samples.len() + (end_index - len) as usize, 0.0);
    }
    AudioSignal::new(samples, signal.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spl_matching_restores_attenuated_signal() {
        let reference = AudioSignal::new(
            (0..4800).map(|i| (i as f64 * 0.01).sin()).collect(),
            48000,
        );
        let attenuated = AudioSignal::new(
            reference.samples.iter().map(|s| s * 0.25).collect(),
            48000,
        );
        let scaled = scale_to_match_spl(&reference, &attenuated);
        let err: f64 = scaled
            .samples
            .iter()
            .zip(&reference.samples)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        assert!(err < 1e-9);
    }

    #[test]
    fn silent_degraded_signal_is_left_untouched() {
        let reference = AudioSignal::new(vec![0.5; 100], 48000);
        let silence = AudioSignal::new(vec![0.0; 100], 48000);
        let scaled = scale_to_match_spl(&reference, &silence);
        assert!(scaled.samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn slice_pads_silence_on_both_sides() {
        let signal = AudioSignal::new(vec![1.0; 100], 100);
        let padded = slice(&signal, -0.1, 1.2);
        assert_eq!(padded.samples.len(), 130);
        assert_eq!(padded.samples[0], 0.0);
        assert_eq!(padded.samples[15], 1.0);
        assert_eq!(padded.samples[129], 0.0);
    }
}
