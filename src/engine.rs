//! End-to-end quality measurement pipeline.
//!
//! Ties the stages together: level matching, gammatone spectrograms,
//! noise-floor preparation, patch alignment, optional time-domain
//! realignment, feature aggregation, and model prediction. The output is a
//! MOS-LQO estimate in [1.0, 5.0] alongside the intermediate per-band and
//! per-patch data for anyone who wants to see why the score came out the
//! way it did.

use tracing::{debug, info, warn};

use crate::alignment::{AlignedPatch, PatchAligner};
use crate::features::{self, FeatureVector};
use crate::model::{self, SimilarityToQualityMapper};
use crate::signal;
use crate::spectrogram::{prepare_for_comparison, SpectrogramBuilder};
use crate::types::{AudioSignal, EngineConfig, ModelSelection, QualityError, Result};
use crate::window::AnalysisWindow;

/// Below this overall NSIM the signals are treated as unrelated and the
/// score is floored, since the models are only trained on pairs of the
/// same material at different qualities.
const DISSIMILARITY_FLOOR: f64 = 0.15;

const WINDOW_OVERLAP: f64 = 0.25;

/// Everything a measurement produces.
#[derive(Debug, Clone)]
pub struct SimilarityResult {
    /// Predicted mean opinion score, in [1.0, 5.0].
    pub moslqo: f64,
    /// Overall NSIM, the mean of `features.fvnsim`.
    pub vnsim: f64,
    /// The aggregated per-band features the model scored.
    pub features: FeatureVector,
    /// Per-patch alignment and similarity diagnostics.
    pub patches: Vec<AlignedPatch>,
    /// Center frequency of each band, lowest first.
    pub center_freq_bands: Vec<f64>,
}

/// A configured measurement pipeline.
///
/// Construction loads and validates the quality model; a single engine can
/// then score any number of signal pairs.
pub struct QualityEngine {
    config: EngineConfig,
    builder: SpectrogramBuilder,
    mapper: Box<dyn SimilarityToQualityMapper>,
}

impl QualityEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let mapper = model::create_mapper(&config.model, config.mode.band_count())?;
        let builder = SpectrogramBuilder::new(config.mode);
        Ok(Self {
            config,
            builder,
            mapper,
        })
    }

    /// Score `degraded` against `reference`.
    pub fn measure(
        &self,
        reference: &AudioSignal,
        degraded: &AudioSignal,
    ) -> Result<SimilarityResult> {
        self.validate_inputs(reference, degraded)?;

        let degraded = signal::scale_to_match_spl(reference, degraded);

        let window = AnalysisWindow::new(
            reference.sample_rate,
            WINDOW_OVERLAP,
            self.config.mode.window_duration(),
        );
        let frame_duration = window.frame_duration(reference.sample_rate);

        let mut ref_spectro = self.builder.build(reference, &window)?;
        let mut deg_spectro = self.builder.build(&degraded, &window)?;
        prepare_for_comparison(&mut ref_spectro, &mut deg_spectro);

        let aligner = PatchAligner::new(
            self.config.mode.patch_size(),
            self.config.search_window,
        );
        let mut patches = aligner.align(&ref_spectro, &deg_spectro, frame_duration);
        if !self.config.disable_realignment {
            patches = aligner.finely_align(patches, reference, &degraded, &self.builder, &window);
        }

        let tau = match self.config.model {
            ModelSelection::Lattice(_) => Some(0.5),
            _ => None,
        };
        let features = features::aggregate(&patches, frame_duration, tau)?;
        let vnsim = features.vnsim();

        let mut moslqo = self.mapper.predict_quality(&features)?;
        if vnsim < DISSIMILARITY_FLOOR {
            debug!(vnsim, "signals are too dissimilar for the model; flooring score");
            moslqo = 1.0;
        }
        moslqo = moslqo.clamp(1.0, 5.0);

        info!(moslqo, vnsim, patches = patches.len(), "measurement complete");
        Ok(SimilarityResult {
            moslqo,
            vnsim,
            features,
            patches,
            center_freq_bands: ref_spectro.center_frequencies().to_vec(),
        })
    }

    fn validate_inputs(&self, reference: &AudioSignal, degraded: &AudioSignal) -> Result<()> {
        if reference.samples.is_empty() || degraded.samples.is_empty() {
            return Err(QualityError::InvalidSignal("empty input signal".into()));
        }
        if reference.sample_rate != degraded.sample_rate {
            return Err(QualityError::InvalidSignal(format!(
                "sample rate mismatch: reference {} Hz, degraded {} Hz",
                reference.sample_rate, degraded.sample_rate
            )));
        }
        let ref_duration = reference.duration();
        let deg_duration = degraded.duration();
        if (ref_duration - deg_duration).abs() > 1.0 {
            warn!(
                ref_duration,
                deg_duration,
                "signal durations differ by more than a second; \
                 unmatched audio will drag the score down"
            );
        }
        Ok(())
    }
}
