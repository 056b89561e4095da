//! Perceptual audio quality measurement.
//!
//! Estimates how a human listener would rate a degraded audio signal
//! against its clean reference, producing a MOS-LQO score in [1.0, 5.0].
//! Both signals are turned into gammatone spectrograms on a perceptual
//! frequency scale, aligned patch by patch to tolerate timing drift, and
//! compared with a neurogram similarity measure (NSIM). The per-band
//! similarity statistics are then mapped to a score by a trained model.
//!
//! ```no_run
//! use moslqo::{AudioSignal, EngineConfig, ModelSelection, OperatingMode, QualityEngine};
//!
//! # fn main() -> moslqo::Result<()> {
//! let config = EngineConfig::new(
//!     OperatingMode::Speech,
//!     ModelSelection::Exponential { unscaled: false },
//! );
//! let engine = QualityEngine::new(config)?;
//! let reference = AudioSignal::new(vec![0.0; 48000], 16000);
//! let degraded = AudioSignal::new(vec![0.0; 48000], 16000);
//! let result = engine.measure(&reference, &degraded)?;
//! println!("MOS-LQO: {:.3}", result.moslqo);
//! # Ok(())
//! # }
//! ```

pub mod alignment;
pub mod conformance;
pub mod engine;
pub mod features;
pub mod filterbank;
pub mod matrix;
pub mod model;
pub mod nsim;
pub mod signal;
pub mod spectrogram;
pub mod types;
pub mod window;
pub mod xcorr;

pub use crate::engine::{QualityEngine, SimilarityResult};
pub use crate::features::FeatureVector;
pub use crate::types::{
    AudioSignal, EngineConfig, ModelSelection, OperatingMode, QualityError, Result, SearchWindow,
};
