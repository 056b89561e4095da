//! Conformance Tests
//!
//! Scores for a fixed set of known recordings are pinned so that results
//! stay comparable from version to version. These tests need the
//! conformance WAV corpus and the trained audio-mode model, neither of
//! which ships with the crate, so they are ignored by default. Place the
//! corpus under `testdata/` and run with `cargo test -- --ignored`.

use std::path::Path;

use moslqo::{
    conformance, AudioSignal, EngineConfig, ModelSelection, OperatingMode, QualityEngine,
};

fn load_wav(path: &str) -> AudioSignal {
    let mut reader = hound::WavReader::open(path)
        .unwrap_or_else(|e| panic!("missing conformance fixture {path}: {e}"));
    let spec = reader.spec();
    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.unwrap() as f64 / max)
                .collect()
        }
        hound::SampleFormat::Float => reader.samples::<f32>().map(|s| s.unwrap() as f64).collect(),
    };
    AudioSignal::from_interleaved(&interleaved, spec.channels as usize, spec.sample_rate)
}

fn audio_engine() -> QualityEngine {
    let model = Path::new("testdata/models/libsvm_nu_svr_model.txt");
    QualityEngine::new(EngineConfig::new(
        OperatingMode::Audio,
        ModelSelection::Svr(model.to_path_buf()),
    ))
    .unwrap()
}

fn speech_lattice_engine() -> QualityEngine {
    let model = Path::new("testdata/models/lattice_tcdaudio_nsim_lcc.json");
    QualityEngine::new(EngineConfig::new(
        OperatingMode::Speech,
        ModelSelection::Lattice(model.to_path_buf()),
    ))
    .unwrap()
}

fn assert_conforms(moslqo: f64, expected: f64) {
    assert!(
        (moslqo - expected).abs() < conformance::TOLERANCE,
        "score {moslqo} drifted from pinned {expected}; \
         bump CONFORMANCE_VERSION if the change is intentional"
    );
}

#[test]
#[ignore = "needs the conformance WAV corpus and lattice model under testdata/"]
fn speech_ca01_transcoded() {
    let reference = load_wav("testdata/clean_speech/CA01_01.wav");
    let degraded = load_wav("testdata/clean_speech/transcoded_CA01_01.wav");
    let result = speech_lattice_engine()
        .measure(&reference, &degraded)
        .unwrap();
    assert_conforms(result.moslqo, conformance::SPEECH_CA01_TRANSCODED);
}

#[test]
#[ignore = "needs the conformance WAV corpus under testdata/"]
fn strauss_lowpass_35() {
    let reference = load_wav("testdata/conformance_testdata_subset/strauss48_stereo.wav");
    let degraded = load_wav("testdata/conformance_testdata_subset/strauss48_stereo_lp35.wav");
    let result = audio_engine().measure(&reference, &degraded).unwrap();
    assert_conforms(result.moslqo, conformance::STRAUSS_LP35);
}

#[test]
#[ignore = "needs the conformance WAV corpus under testdata/"]
fn castanets_identity() {
    let signal = load_wav("testdata/conformance_testdata_subset/castanets48_stereo.wav");
    let result = audio_engine().measure(&signal, &signal).unwrap();
    assert_conforms(result.moslqo, conformance::CASTANETS_IDENTITY);
}

#[test]
#[ignore = "needs the conformance WAV corpus under testdata/"]
fn guitar_short_degraded_patch() {
    let reference = load_wav("testdata/short_duration/guitar48_stereo.wav");
    let degraded = load_wav("testdata/short_duration/guitar48_stereo_25s.wav");
    let result = audio_engine().measure(&reference, &degraded).unwrap();
    assert_conforms(result.moslqo, conformance::GUITAR_SHORT_DEGRADED_PATCH);
}

#[test]
#[ignore = "needs the conformance WAV corpus under testdata/"]
fn guitar_short_reference_patch() {
    let reference = load_wav("testdata/short_duration/guitar48_stereo_25s.wav");
    let degraded = load_wav("testdata/short_duration/guitar48_stereo.wav");
    let result = audio_engine().measure(&reference, &degraded).unwrap();
    assert_conforms(result.moslqo, conformance::GUITAR_SHORT_REFERENCE_PATCH);
}

#[test]
#[ignore = "needs the conformance WAV corpus under testdata/"]
fn different_audios_floor_to_one() {
    let reference = load_wav("testdata/conformance_testdata_subset/castanets48_stereo.wav");
    let degraded = load_wav("testdata/conformance_testdata_subset/strauss48_stereo.wav");
    let result = audio_engine().measure(&reference, &degraded).unwrap();
    assert_conforms(result.moslqo, conformance::DIFFERENT_AUDIOS);
}

#[test]
fn conformance_version_is_current() {
    assert_eq!(conformance::CONFORMANCE_VERSION, 300);
}
