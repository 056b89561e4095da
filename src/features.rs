//! Aggregation of per-patch similarity into a per-band feature vector.
//!
//! The quality models do not see individual patches. They see one vector of
//! per-band statistics summarizing the whole comparison:
//!
//! - `fvnsim`: mean NSIM per band across patches
//! - `fvnsim10`: mean of the lowest decile of per-patch NSIM per band,
//!   which tracks the worst stretches a listener would notice
//! - `fstdnsim`: pooled standard deviation of NSIM per band
//! - `fvdegenergy`: mean degraded-signal energy per band

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::alignment::AlignedPatch;
use crate::types::{QualityError, Result};

/// Per-band statistics fed to a quality model.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub fvnsim: Vec<f64>,
    pub fvnsim10: Vec<f64>,
    pub fstdnsim: Vec<f64>,
    pub fvdegenergy: Vec<f64>,
    /// Quantile conditioning input for lattice models; absent otherwise.
    pub tau: Option<f64>,
}

impl FeatureVector {
    pub fn band_count(&self) -> usize {
        self.fvnsim.len()
    }

    /// Mean NSIM over all bands.
    pub fn vnsim(&self) -> f64 {
        self.fvnsim.iter().sum::<f64>() / self.fvnsim.len() as f64
    }

    /// All four band-wise features concatenated, the layout the support
    /// vector model was trained on.
    pub fn observation(&self) -> Vec<f64> {
        let mut obs = Vec::with_capacity(self.band_count() * 4);
        obs.extend_from_slice(&self.fvnsim);
        obs.extend_from_slice(&self.fvnsim10);
        obs.extend_from_slice(&self.fstdnsim);
        obs.extend_from_slice(&self.fvdegenergy);
        obs
    }
}

// Serialized as a flat map of named scalars ("fvnsim0", "fvnsim10_0", ...)
// so the output matches the feature names lattice models are built against.
impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let n = self.band_count();
        let mut map = serializer.serialize_map(Some(n * 4 + 1))?;
        for (i, v) in self.fvnsim.iter().enumerate() {
            map.serialize_entry(&format!("fvnsim{i}"), v)?;
        }
        for (i, v) in self.fvnsim10.iter().enumerate() {
            map.serialize_entry(&format!("fvnsim10_{i}"), v)?;
        }
        for (i, v) in self.fstdnsim.iter().enumerate() {
            map.serialize_entry(&format!("fstdnsim{i}"), v)?;
        }
        for (i, v) in self.fvdegenergy.iter().enumerate() {
            map.serialize_entry(&format!("fvdegenergy{i}"), v)?;
        }
        map.serialize_entry("tau", &self.tau)?;
        map.end()
    }
}

/// Collapse aligned patches into a [`FeatureVector`].
///
/// `frame_duration` converts patch time spans back into frame counts for
/// the pooled-variance weighting.
pub fn aggregate(
    patches: &[AlignedPatch],
    frame_duration: f64,
    tau: Option<f64>,
) -> Result<FeatureVector> {
    // The aligner guarantees full coverage, so an empty patch list means an
    // upstream bug rather than bad input.
    let first = patches
        .first()
        .ok_or(QualityError::EmptyBand { band: 0 })?;
    let num_bands = first.similarity.freq_band_means.len();
    let num_patches = patches.len() as f64;

    let mut fvnsim = vec![0.0; num_bands];
    let mut fvdegenergy = vec![0.0; num_bands];
    for patch in patches {
        for band in 0..num_bands {
            fvnsim[band] += patch.similarity.freq_band_means[band];
            fvdegenergy[band] += patch.similarity.freq_band_deg_energy[band];
        }
    }
    for band in 0..num_bands {
        fvnsim[band] /= num_patches;
        fvdegenergy[band] /= num_patches;
    }

    let fvnsim10 = lowest_quantile_means(patches, num_bands, 0.10);
    let fstdnsim = pooled_stddevs(patches, &fvnsim, frame_duration);

    let features = FeatureVector {
        fvnsim,
        fvnsim10,
        fstdnsim,
        fvdegenergy,
        tau,
    };
    for (band, value) in features.observation().iter().enumerate() {
        if !value.is_finite() {
            return Err(QualityError::NonFinite(format!(
                "feature element {} is {}",
                band, value
            )));
        }
    }
    debug!(
        vnsim = features.vnsim(),
        bands = num_bands,
        patches = patches.len(),
        "aggregated similarity features"
    );
    Ok(features)
}

/// Per band, the mean of the lowest `quantile` fraction of per-patch NSIM
/// values (at least one value).
fn lowest_quantile_means(patches: &[AlignedPatch], num_bands: usize, quantile: f64) -> Vec<f64> {
    let take = ((patches.len() as f64 * quantile) as usize).max(1);
    (0..num_bands)
        .map(|band| {
            let mut values: Vec<f64> = patches
                .iter()
                .map(|p| p.similarity.freq_band_means[band])
                .collect();
            values.sort_by(|a, b| a.total_cmp(b));
            values[..take].iter().sum::<f64>() / take as f64
        })
        .collect()
}

/// Pooled per-band standard deviation across patches, each patch weighted
/// by the number of frames it spans.
fn pooled_stddevs(patches: &[AlignedPatch], fvnsim: &[f64], frame_duration: f64) -> Vec<f64> {
    let num_bands = fvnsim.len();
    let mut contribution = vec![0.0; num_bands];
    let mut total_frames = 0i64;

    for patch in patches {
        let sim = &patch.similarity;
        let secs = sim.ref_patch_end_time - sim.ref_patch_start_time;
        let frames = (secs / frame_duration).ceil() as i64;
        total_frames += frames;
        for band in 0..num_bands {
            let stddev = sim.freq_band_stddevs[band];
            let mean = sim.freq_band_means[band];
            contribution[band] += (frames - 1) as f64 * stddev * stddev;
            contribution[band] += frames as f64 * mean * mean;
        }
    }

    if total_frames < 2 {
        return vec![0.0; num_bands];
    }
    (0..num_bands)
        .map(|band| {
            let variance = (contribution[band]
                - fvnsim[band] * fvnsim[band] * total_frames as f64)
                / (total_frames - 1) as f64;
            // Negative values here are precision artifacts.
            if variance < 0.0 {
                0.0
            } else {
                variance.sqrt()
            }
        })
        .collect()
}
