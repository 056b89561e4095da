//! Calibrated monotonic lattice model.
//!
//! The artifact is a JSON document describing, for each named input
//! feature, a piecewise-linear calibrator, plus a non-negative weight per
//! input and a final output calibrator. Monotonicity in the similarity
//! features is a structural property of the artifact, validated at load
//! time, so a better NSIM can never produce a worse score.
//!
//! Inputs are looked up by name (`fvnsim0`, `fvnsim10_0`, `fstdnsim0`,
//! `fvdegenergy0`, ..., `tau`), matching the serialized form of
//! [`FeatureVector`]. Prediction fixes the quantile input `tau` to 0.5,
//! the median-quality estimate.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::{clamp_mos, SimilarityToQualityMapper};
use crate::features::FeatureVector;
use crate::types::{QualityError, Result};

#[derive(Debug, Deserialize)]
struct Calibrator {
    input_keypoints: Vec<f64>,
    output_keypoints: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct InputSpec {
    name: String,
    #[serde(flatten)]
    calibrator: Calibrator,
}

#[derive(Debug, Deserialize)]
struct LatticeSpec {
    inputs: Vec<InputSpec>,
    weights: Vec<f64>,
    output_calibration: Calibrator,
}

pub struct LatticeModel {
    spec: LatticeSpec,
}

impl LatticeModel {
    pub fn from_file(path: &Path, band_count: usize) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let spec: LatticeSpec = serde_json::from_str(&text)?;
        let model = Self { spec };
        model
            .validate(band_count)
            .map_err(|e| QualityError::ModelLoad(format!("{}: {e}", path.display())))?;
        debug!(
            path = %path.display(),
            inputs = model.spec.inputs.len(),
            "loaded lattice quality model"
        );
        Ok(model)
    }

    fn validate(&self, band_count: usize) -> std::result::Result<(), String> {
        let expected = band_count * 4 + 1;
        if self.spec.inputs.len() != expected {
            return Err(format!(
                "expected {} inputs for {} bands, found {}",
                expected,
                band_count,
                self.spec.inputs.len()
            ));
        }
        if self.spec.weights.len() != self.spec.inputs.len() {
            return Err(format!(
                "{} weights for {} inputs",
                self.spec.weights.len(),
                self.spec.inputs.len()
            ));
        }
        if self.spec.weights.iter().any(|w| *w < 0.0) {
            return Err("negative input weight".into());
        }
        if !self.spec.inputs.iter().any(|i| i.name == "tau") {
            return Err("missing tau input".into());
        }
        for input in &self.spec.inputs {
            validate_calibrator(&input.calibrator, &input.name)?;
            // Similarity features must calibrate monotonically upward so
            // that better NSIM cannot lower the score.
            if input.name.starts_with("fvnsim") {
                let out = &input.calibrator.output_keypoints;
                if out.windows(2).any(|w| w[1] < w[0]) {
                    return Err(format!("calibrator for {} is not monotonic", input.name));
                }
            }
        }
        validate_calibrator(&self.spec.output_calibration, "output")?;
        // The output calibration sits after the weighted sum; if it
        // decreases anywhere, a better NSIM can lower the score even with
        // monotonic input calibrators.
        let out = &self.spec.output_calibration.output_keypoints;
        if out.windows(2).any(|w| w[1] < w[0]) {
            return Err("output calibration is not monotonic".into());
        }
        Ok(())
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let named = serde_json::to_value(features)?;
        let mut sum = 0.0;
        for (input, weight) in self.spec.inputs.iter().zip(&self.spec.weights) {
            let raw = named
                .get(&input.name)
                .and_then(|v| v.as_f64())
                .ok_or_else(|| {
                    QualityError::ModelLoad(format!(
                        "model input {:?} has no matching feature",
                        input.name
                    ))
                })?;
            sum += weight * evaluate(&input.calibrator, raw);
        }
        Ok(evaluate(&self.spec.output_calibration, sum))
    }
}

impl SimilarityToQualityMapper for LatticeModel {
    fn predict_quality(&self, features: &FeatureVector) -> Result<f64> {
        let mut features = features.clone();
        features.tau = Some(0.5);
        Ok(clamp_mos(self.predict(&features)?))
    }
}

fn validate_calibrator(cal: &Calibrator, name: &str) -> std::result::Result<(), String> {
    if cal.input_keypoints.len() < 2 {
        return Err(format!("calibrator for {} needs at least two keypoints", name));
    }
    if cal.input_keypoints.len() != cal.output_keypoints.len() {
        return Err(format!("calibrator for {} has mismatched keypoint lists", name));
    }
    if cal.input_keypoints.windows(2).any(|w| w[1] <= w[0]) {
        return Err(format!(
            "calibrator for {} has non-increasing input keypoints",
            name
        ));
    }
    if cal
        .input_keypoints
        .iter()
        .chain(&cal.output_keypoints)
        .any(|v| !v.is_finite())
    {
        return Err(format!("calibrator for {} has non-finite keypoints", name));
    }
    Ok(())
}

/// Piecewise-linear interpolation, clamped to the keypoint range.
fn evaluate(cal: &Calibrator, x: f64) -> f64 {
    let xs = &cal.input_keypoints;
    let ys = &cal.output_keypoints;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[xs.len() - 1] {
        return ys[ys.len() - 1];
    }
    let i = xs.partition_point(|&k| k <= x) - 1;
    let t = (x - xs[i]) / (xs[i + 1] - xs[i]);
    ys[i] + t * (ys[i + 1] - ys[i])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_calibrator() -> serde_json::Value {
        serde_json::json!({
            "input_keypoints": [0.0, 1.0],
            "output_keypoints": [0.0, 1.0],
        })
    }

    fn one_band_spec() -> serde_json::Value {
        let mut inputs = Vec::new();
        for name in ["fvnsim0", "fvnsim10_0", "fstdnsim0", "fvdegenergy0", "tau"] {
            let mut cal = identity_calibrator();
            cal["name"] = name.into();
            inputs.push(cal);
        }
        serde_json::json!({
            "inputs": inputs,
            "weights": [1.0, 0.5, 0.25, 0.0, 0.0],
            "output_calibration": {
                "input_keypoints": [0.0, 2.0],
                "output_keypoints": [1.0, 5.0],
            },
        })
    }

    fn load(spec: &serde_json::Value) -> std::result::Result<LatticeModel, String> {
        let model = LatticeModel {
            spec: serde_json::from_value(spec.clone()).map_err(|e| e.to_string())?,
        };
        model.validate(1)?;
        Ok(model)
    }

    fn features(nsim: f64) -> FeatureVector {
        FeatureVector {
            fvnsim: vec![nsim],
            fvnsim10: vec![nsim],
            fstdnsim: vec![0.0],
            fvdegenergy: vec![10.0],
            tau: None,
        }
    }

    #[test]
    fn evaluates_weighted_calibrated_sum() {
        let model = load(&one_band_spec()).unwrap();
        // nsim 1.0: sum = 1.0 + 0.5 + 0 + 0 + 0 = 1.5, output maps 0..2 to 1..5.
        let mos = model.predict_quality(&features(1.0)).unwrap();
        assert!((mos - 4.0).abs() < 1e-12);
    }

    #[test]
    fn better_nsim_never_scores_worse() {
        let model = load(&one_band_spec()).unwrap();
        let mut previous = 0.0;
        for step in 0..=10 {
            let mos = model
                .predict_quality(&features(step as f64 / 10.0))
                .unwrap();
            assert!(mos >= previous);
            previous = mos;
        }
    }

    #[test]
    fn rejects_non_monotonic_similarity_calibrator() {
        let mut spec = one_band_spec();
        spec["inputs"][0]["output_keypoints"] = serde_json::json!([1.0, 0.0]);
        assert!(load(&spec).is_err());
    }

    #[test]
    fn rejects_non_monotonic_output_calibration() {
        let mut spec = one_band_spec();
        spec["output_calibration"]["output_keypoints"] = serde_json::json!([5.0, 1.0]);
        assert!(load(&spec).is_err());
    }

    #[test]
    fn rejects_negative_weights() {
        let mut spec = one_band_spec();
        spec["weights"][0] = serde_json::json!(-1.0);
        assert!(load(&spec).is_err());
    }

    #[test]
    fn rejects_wrong_input_count() {
        let mut spec = one_band_spec();
        spec["inputs"].as_array_mut().unwrap().pop();
        spec["weights"].as_array_mut().unwrap().pop();
        assert!(load(&spec).is_err());
    }

    #[test]
    fn interpolation_clamps_outside_keypoints() {
        let cal = Calibrator {
            input_keypoints: vec![0.0, 1.0],
            output_keypoints: vec![2.0, 4.0],
        };
        assert_eq!(evaluate(&cal, -1.0), 2.0);
        assert_eq!(evaluate(&cal, 0.5), 3.0);
        assert_eq!(evaluate(&cal, 9.0), 4.0);
    }
}
