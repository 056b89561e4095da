//! End-to-End Pipeline Tests
//!
//! Exercises the full measurement pipeline on synthesized audio, without
//! any model artifacts on disk where possible.
//!
//! Key test areas:
//! - Identity: a signal compared to itself must score near perfect
//! - Ordering: heavier degradation must never score higher
//! - Alignment: delayed or truncated degraded signals must still be scored
//! - Determinism: repeated runs produce identical results
//! - Range: every score lands in [1.0, 5.0] no matter the input

use std::f64::consts::PI;

use moslqo::{
    AudioSignal, EngineConfig, ModelSelection, OperatingMode, QualityEngine, SearchWindow,
};

fn harmonic_signal(seconds: f64, sample_rate: u32) -> AudioSignal {
    let samples = (0..(seconds * sample_rate as f64) as usize)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let vibrato = (2.0 * PI * 5.0 * t).sin() * 3.0;
            0.4 * (2.0 * PI * (220.0 + vibrato) * t).sin()
                + 0.25 * (2.0 * PI * 660.0 * t).sin()
                + 0.15 * (2.0 * PI * 1760.0 * t).sin()
        })
        .collect();
    AudioSignal::new(samples, sample_rate)
}

/// Deterministic pseudo-noise so tests never depend on an RNG crate.
fn pseudo_noise(len: usize, amplitude: f64) -> Vec<f64> {
    (0..len)
        .map(|i| amplitude * (((i as f64 * 12.9898).sin() * 43758.5453).fract() - 0.5))
        .collect()
}

fn add_noise(signal: &AudioSignal, amplitude: f64) -> AudioSignal {
    let noise = pseudo_noise(signal.samples.len(), amplitude);
    AudioSignal::new(
        signal
            .samples
            .iter()
            .zip(noise)
            .map(|(s, n)| s + n)
            .collect(),
        signal.sample_rate,
    )
}

fn speech_engine() -> QualityEngine {
    QualityEngine::new(EngineConfig::new(
        OperatingMode::Speech,
        ModelSelection::Exponential { unscaled: false },
    ))
    .unwrap()
}

#[test]
fn identity_comparison_scores_near_perfect() {
    let _ = tracing_subscriber::fmt::try_init();
    let engine = speech_engine();
    let signal = harmonic_signal(3.0, 16000);
    let result = engine.measure(&signal, &signal).unwrap();
    assert!(result.vnsim > 0.99, "vnsim was {}", result.vnsim);
    assert!(result.moslqo > 4.5, "moslqo was {}", result.moslqo);
}

#[test]
fn heavier_noise_never_scores_higher() {
    let engine = speech_engine();
    let reference = harmonic_signal(3.0, 16000);
    let mut previous = f64::INFINITY;
    for amplitude in [0.0, 0.05, 0.2, 0.8] {
        let degraded = add_noise(&reference, amplitude);
        let result = engine.measure(&reference, &degraded).unwrap();
        assert!(
            result.moslqo <= previous + 1e-9,
            "noise {} scored {} above previous {}",
            amplitude,
            result.moslqo,
            previous
        );
        previous = result.moslqo;
    }
}

#[test]
fn delayed_degraded_signal_is_realigned() {
    let _ = tracing_subscriber::fmt::try_init();
    let engine = speech_engine();
    let reference = harmonic_signal(3.0, 16000);
    // Quarter-second of leading silence, well within the search radius.
    let mut delayed = vec![0.0; 4000];
    delayed.extend_from_slice(&reference.samples);
    let degraded = AudioSignal::new(delayed, 16000);

    let result = engine.measure(&reference, &degraded).unwrap();
    assert!(
        result.vnsim > 0.8,
        "alignment failed to recover the delay, vnsim {}",
        result.vnsim
    );
}

#[test]
fn degraded_sub_segment_finds_its_place_in_the_reference() {
    let engine = speech_engine();
    let reference = harmonic_signal(4.0, 16000);
    // Starts half a second in, a 50 frame offset within the default radius.
    let segment = AudioSignal::new(reference.samples[8000..40000].to_vec(), 16000);
    let result = engine.measure(&reference, &segment).unwrap();
    assert!((1.0..=5.0).contains(&result.moslqo));
    assert!(result.vnsim > 0.5, "vnsim was {}", result.vnsim);
}

#[test]
fn degraded_longer_than_reference_still_produces_a_score() {
    let engine = speech_engine();
    let reference = harmonic_signal(1.0, 16000);
    let degraded = harmonic_signal(4.0, 16000);
    let result = engine.measure(&reference, &degraded).unwrap();
    assert!((1.0..=5.0).contains(&result.moslqo));
    // The tail patches have nothing to align against.
    assert!(result.patches.iter().any(|p| p.is_unaligned()));
}

#[test]
fn scores_are_deterministic_across_runs() {
    let reference = harmonic_signal(2.0, 16000);
    let degraded = add_noise(&reference, 0.1);
    let mut scores = Vec::new();
    for _ in 0..3 {
        let engine = speech_engine();
        let result = engine.measure(&reference, &degraded).unwrap();
        scores.push((result.moslqo, result.vnsim));
    }
    assert_eq!(scores[0], scores[1]);
    assert_eq!(scores[1], scores[2]);
}

#[test]
fn audio_mode_uses_21_bands_and_speech_16() {
    let reference = harmonic_signal(3.0, 48000);
    let audio_engine = QualityEngine::new(EngineConfig::new(
        OperatingMode::Audio,
        ModelSelection::Exponential { unscaled: false },
    ))
    .unwrap();
    let result = audio_engine.measure(&reference, &reference).unwrap();
    assert_eq!(result.center_freq_bands.len(), 21);
    assert_eq!(result.features.band_count(), 21);

    let reference = harmonic_signal(3.0, 16000);
    let result = speech_engine().measure(&reference, &reference).unwrap();
    assert_eq!(result.center_freq_bands.len(), 16);
    assert_eq!(result.features.band_count(), 16);
}

#[test]
fn center_frequencies_ascend_from_50_hz() {
    let reference = harmonic_signal(2.0, 16000);
    let result = speech_engine().measure(&reference, &reference).unwrap();
    let bands = &result.center_freq_bands;
    assert!((bands[0] - 50.0).abs() < 1e-6);
    assert!(bands.windows(2).all(|w| w[1] > w[0]));
    assert!(*bands.last().unwrap() <= 8000.0);
}

#[test]
fn search_radius_zero_compares_frames_directly() {
    let mut config = EngineConfig::new(
        OperatingMode::Speech,
        ModelSelection::Exponential { unscaled: false },
    );
    config.search_window = SearchWindow::new(0);
    config.disable_realignment = true;
    let engine = QualityEngine::new(config).unwrap();

    let reference = harmonic_signal(2.0, 16000);
    let result = engine.measure(&reference, &reference).unwrap();
    assert!(result.patches.iter().all(|p| p.frame_offset == 0));
    assert!(result.vnsim > 0.99);
}

#[test]
fn swapping_reference_and_degraded_still_scores_validly() {
    let engine = speech_engine();
    let reference = harmonic_signal(2.0, 16000);
    let degraded = add_noise(&reference, 0.2);
    let forward = engine.measure(&reference, &degraded).unwrap();
    let reverse = engine.measure(&degraded, &reference).unwrap();
    assert!((1.0..=5.0).contains(&forward.moslqo));
    assert!((1.0..=5.0).contains(&reverse.moslqo));
}

#[test]
fn unscaled_speech_mapping_tops_out_below_five() {
    let engine = QualityEngine::new(EngineConfig::new(
        OperatingMode::Speech,
        ModelSelection::Exponential { unscaled: true },
    ))
    .unwrap();
    let signal = harmonic_signal(2.0, 16000);
    let result = engine.measure(&signal, &signal).unwrap();
    assert!(result.moslqo < 5.0);
    assert!(result.moslqo > 4.0);
}

#[test]
fn patch_diagnostics_cover_the_degraded_signal() {
    let engine = speech_engine();
    let reference = harmonic_signal(3.0, 16000);
    let result = engine.measure(&reference, &reference).unwrap();
    assert!(!result.patches.is_empty());
    for (i, patch) in result.patches.iter().enumerate() {
        assert_eq!(patch.patch_index, i);
        assert!(patch.similarity.similarity.is_finite());
    }
}
