//! Support vector regression over similarity features.
//!
//! Loads a trained NU-SVR model in the libsvm text format: a small header
//! (svm type, kernel, gamma, rho) followed by one line per support vector
//! holding its dual coefficient and sparse `index:value` features, indices
//! one-based. Prediction is the kernel expansion
//! `sum_i coef_i * exp(-gamma * ||x - sv_i||^2) - rho`, clamped to [1, 5].

use std::fs;
use std::path::Path;

use tracing::debug;

use super::{clamp_mos, SimilarityToQualityMapper};
use crate::features::FeatureVector;
use crate::types::{QualityError, Result};

struct SupportVector {
    coefficient: f64,
    features: Vec<f64>,
}

pub struct SvrModel {
    gamma: f64,
    rho: f64,
    support_vectors: Vec<SupportVector>,
    num_features: usize,
}

impl SvrModel {
    /// Parse a libsvm model file, rejecting anything that is not an RBF
    /// NU-SVR or whose feature indices exceed `num_features`.
    pub fn from_file(path: &Path, num_features: usize) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let model = Self::parse(&text, num_features)
            .map_err(|e| QualityError::ModelLoad(format!("{}: {e}", path.display())))?;
        debug!(
            path = %path.display(),
            support_vectors = model.support_vectors.len(),
            gamma = model.gamma,
            "loaded support vector regression model"
        );
        Ok(model)
    }

    fn parse(text: &str, num_features: usize) -> std::result::Result<Self, String> {
        let mut gamma = None;
        let mut rho = None;
        let mut total_sv = None;
        let mut lines = text.lines();

        for line in lines.by_ref() {
            let line = line.trim();
            if line == "SV" {
                break;
            }
            let mut parts = line.split_whitespace();
            let key = parts.next().unwrap_or("");
            let value = parts.next();
            match key {
                "svm_type" => {
                    if value != Some("nu_svr") {
                        return Err(format!("unsupported svm_type {:?}", value));
                    }
                }
                "kernel_type" => {
                    if value != Some("rbf") {
                        return Err(format!("unsupported kernel_type {:?}", value));
                    }
                }
                "gamma" => {
                    gamma = Some(parse_scalar(value, "gamma")?);
                }
                "rho" => {
                    rho = Some(parse_scalar(value, "rho")?);
                }
                "total_sv" => {
                    total_sv = Some(parse_scalar(value, "total_sv")? as usize);
                }
                // nr_class, label counts and the like carry no information
                // for regression.
                _ => {}
            }
        }

        let gamma = gamma.ok_or("missing gamma")?;
        let rho = rho.ok_or("missing rho")?;

        let mut support_vectors = Vec::new();
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let coefficient: f64 = parts
                .next()
                .ok_or("empty support vector line")?
                .parse()
                .map_err(|e| format!("bad coefficient: {e}"))?;

            let mut features = vec![0.0; num_features];
            for pair in parts {
                let (index, value) = pair
                    .split_once(':')
                    .ok_or_else(|| format!("malformed feature pair {:?}", pair))?;
                let index: usize = index.parse().map_err(|e| format!("bad index: {e}"))?;
                if index == 0 || index > num_features {
                    return Err(format!(
                        "feature index {} out of range for {} features",
                        index, num_features
                    ));
                }
                features[index - 1] =
                    value.parse().map_err(|e| format!("bad value: {e}"))?;
            }
            support_vectors.push(SupportVector {
                coefficient,
                features,
            });
        }

        if support_vectors.is_empty() {
            return Err("no support vectors".into());
        }
        if let Some(total) = total_sv {
            if total != support_vectors.len() {
                return Err(format!(
                    "header declares {} support vectors, found {}",
                    total,
                    support_vectors.len()
                ));
            }
        }

        Ok(Self {
            gamma,
            rho,
            support_vectors,
            num_features,
        })
    }

    fn predict(&self, observation: &[f64]) -> f64 {
        let mut sum = 0.0;
        for sv in &self.support_vectors {
            let squared_distance: f64 = observation
                .iter()
                .zip(&sv.features)
                .map(|(x, s)| (x - s) * (x - s))
                .sum();
            sum += sv.coefficient * (-self.gamma * squared_distance).exp();
        }
        sum - self.rho
    }
}

fn parse_scalar(value: Option<&str>, name: &str) -> std::result::Result<f64, String> {
    value
        .ok_or_else(|| format!("missing value for {name}"))?
        .parse()
        .map_err(|e| format!("bad {name}: {e}"))
}

impl SimilarityToQualityMapper for SvrModel {
    fn predict_quality(&self, features: &FeatureVector) -> Result<f64> {
        let observation = features.observation();
        if observation.len() != self.num_features {
            return Err(QualityError::ModelLoad(format!(
                "model expects {} features, got {}",
                self.num_features,
                observation.len()
            )));
        }
        Ok(clamp_mos(self.predict(&observation)))
    }
}
