//! Closed-form speech quality mapper.
//!
//! Maps mean NSIM to MOS through an exponential fit over the TCD-VOIP
//! dataset. The raw fit tops out near MOS 4.5 for a perfect NSIM of 1.0;
//! by default the result is scaled so that a perfect match earns a perfect
//! score.

use super::{clamp_mos, SimilarityToQualityMapper};
use crate::features::FeatureVector;
use crate::types::Result;

const FIT_PARAMETER_A: f64 = 1.15594553;
const FIT_PARAMETER_B: f64 = 4.685115504;
const FIT_PARAMETER_X0: f64 = 0.76552319;
const FIT_SCALE: f64 = 1.2031409;

pub struct ExponentialMapper {
    scale_to_max_mos: bool,
}

impl ExponentialMapper {
    pub fn new(scale_to_max_mos: bool) -> Self {
        Self { scale_to_max_mos }
    }
}

impl SimilarityToQualityMapper for ExponentialMapper {
    fn predict_quality(&self, features: &FeatureVector) -> Result<f64> {
        let mos = exponential_from_fit(
            features.vnsim(),
            FIT_PARAMETER_A,
            FIT_PARAMETER_B,
            FIT_PARAMETER_X0,
        );
        let scale = if self.scale_to_max_mos { FIT_SCALE } else { 1.0 };
        Ok(clamp_mos(mos * scale))
    }
}

fn exponential_from_fit(x: f64, a: f64, b: f64, x0: f64) -> f64 {
    a + (b * (x - x0)).exp()
}
