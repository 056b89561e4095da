//! Similarity-to-quality models.
//!
//! Each model maps an aggregated [`FeatureVector`] to a MOS-LQO score.
//! Three families are supported:
//!
//! - [`svr::SvrModel`]: a support vector regression over all four band-wise
//!   features, the default for full-band audio
//! - [`lattice::LatticeModel`]: a calibrated monotonic lattice loaded from a
//!   JSON artifact, the higher-accuracy option for speech
//! - [`speech::ExponentialMapper`]: a closed-form exponential fit of mean
//!   NSIM to MOS, the zero-artifact speech fallback

pub mod lattice;
pub mod speech;
pub mod svr;

use crate::features::FeatureVector;
use crate::types::{ModelSelection, Result};

/// Anything that can turn aggregated similarity features into a MOS-LQO
/// score in [1.0, 5.0].
pub trait SimilarityToQualityMapper: Send + Sync {
    fn predict_quality(&self, features: &FeatureVector) -> Result<f64>;
}

/// Instantiate the mapper named by `selection`.
///
/// File-backed models are parsed and validated eagerly so that a bad
/// artifact fails here rather than mid-comparison.
pub fn create_mapper(
    selection: &ModelSelection,
    band_count: usize,
) -> Result<Box<dyn SimilarityToQualityMapper>> {
    match selection {
        ModelSelection::Svr(path) => {
            Ok(Box::new(svr::SvrModel::from_file(path, band_count * 4)?))
        }
        ModelSelection::Lattice(path) => {
            Ok(Box::new(lattice::LatticeModel::from_file(path, band_count)?))
        }
        ModelSelection::Exponential { unscaled } => {
            Ok(Box::new(speech::ExponentialMapper::new(!*unscaled)))
        }
    }
}

pub(crate) fn clamp_mos(mos: f64) -> f64 {
    mos.clamp(1.0, 5.0)
}
