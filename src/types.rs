use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QualityError {
    #[error("invalid signal: {0}")]
    InvalidSignal(String),
    #[error("no contributing patches for frequency band {band}")]
    EmptyBand { band: usize },
    #[error("failed to load quality model: {0}")]
    ModelLoad(String),
    #[error("non-finite value in {0}")]
    NonFinite(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QualityError>;

/// Decoded mono PCM buffer with its sample rate.
///
/// Produced by an external loader; the engine never mutates it. Stereo
/// material is folded down with [`AudioSignal::from_interleaved`] or scored
/// per channel by the caller.
#[derive(Debug, Clone)]
pub struct AudioSignal {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
}

impl AudioSignal {
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Fold an interleaved multi-channel buffer down to mono by averaging.
    pub fn from_interleaved(interleaved: &[f64], channels: usize, sample_rate: u32) -> Self {
        if channels <= 1 {
            return Self::new(interleaved.to_vec(), sample_rate);
        }
        let frames = interleaved.len() / channels;
        let mut samples = Vec::with_capacity(frames);
        for frame in 0..frames {
            let mut acc = 0.0;
            for chan in 0..channels {
                acc += interleaved[frame * channels + chan];
            }
            samples.push(acc / channels as f64);
        }
        Self::new(samples, sample_rate)
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Band layout and frame geometry for a measurement run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// Full audible band, 21 ERB-spaced bands, 80 ms frames.
    Audio,
    /// Voice band (50 Hz - 8 kHz), 16 bands, 40 ms frames.
    Speech,
}

impl OperatingMode {
    pub fn band_count(&self) -> usize {
        match self {
            OperatingMode::Audio => 21,
            OperatingMode::Speech => 16,
        }
    }

    pub fn window_duration(&self) -> f64 {
        match self {
            OperatingMode::Audio => 0.08,
            OperatingMode::Speech => 0.04,
        }
    }

    /// Frames per comparison patch.
    pub fn patch_size(&self) -> usize {
        match self {
            OperatingMode::Audio => 30,
            OperatingMode::Speech => 20,
        }
    }

    pub fn min_frequency(&self) -> f64 {
        50.0
    }

    pub fn max_frequency(&self, sample_rate: u32) -> f64 {
        let nyquist = sample_rate as f64 / 2.0;
        match self {
            OperatingMode::Audio => nyquist,
            OperatingMode::Speech => nyquist.min(8000.0),
        }
    }
}

/// Frame radius bounding the aligner's search, default 60.
///
/// Radius 0 disables alignment correction entirely (direct frame-to-frame
/// comparison).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    radius: usize,
}

impl SearchWindow {
    pub fn new(radius: usize) -> Self {
        Self { radius }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }
}

impl Default for SearchWindow {
    fn default() -> Self {
        Self { radius: 60 }
    }
}

/// Which trained score-mapping model the engine evaluates.
#[derive(Debug, Clone)]
pub enum ModelSelection {
    /// libsvm NU-SVR model text file (the general audio-mode path).
    Svr(PathBuf),
    /// Monotonic calibrated-lattice model artifact (speech mode default).
    Lattice(PathBuf),
    /// Fitted NSIM-to-MOS exponential, no artifact required.
    /// `unscaled` skips the final scale-to-max-MOS correction.
    Exponential { unscaled: bool },
}

/// Full configuration for one measurement pipeline.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: OperatingMode,
    pub search_window: SearchWindow,
    pub model: ModelSelection,
    /// Skip the per-patch fine realignment stage.
    pub disable_realignment: bool,
}

impl EngineConfig {
    pub fn new(mode: OperatingMode, model: ModelSelection) -> Self {
        Self {
            mode,
            search_window: SearchWindow::default(),
            model,
            disable_realignment: false,
        }
    }
}
