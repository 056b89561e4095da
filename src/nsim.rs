//! Neurogram Similarity Index Measure.
//!
//! Structural-similarity metric over spectral energy patches: an intensity
//! (luminance) term and a structure/contrast term computed over a 3x3
//! weighted neighborhood of frames and bands, normalized into [0, 1].

use crate::matrix::Matrix;

/// Weighted-mean window applied over the band/frame neighborhood.
const WINDOW: [f64; 9] = [
    0.0113033910173052,
    0.0838251475442633,
    0.0113033910173052,
    0.0838251475442633,
    0.619485845753726,
    0.0838251475442633,
    0.0113033910173052,
    0.0838251475442633,
    0.0113033910173052,
];

/// Dynamic range of the prepared spectrogram intensities.
const INTENSITY_RANGE: f64 = 1.0;

/// Per-band outcome of comparing one reference patch to one degraded patch.
#[derive(Debug, Clone)]
pub struct PatchSimilarity {
    /// Mean NSIM per frequency band, lowest band first.
    pub freq_band_means: Vec<f64>,
    /// NSIM standard deviation over time per band.
    pub freq_band_stddevs: Vec<f64>,
    /// Mean energy of the degraded patch per band.
    pub freq_band_deg_energy: Vec<f64>,
    /// Mean of the band means, the patch's overall NSIM.
    pub similarity: f64,
    pub ref_patch_start_time: f64,
    pub ref_patch_end_time: f64,
    pub deg_patch_start_time: f64,
    pub deg_patch_end_time: f64,
}

impl PatchSimilarity {
    /// A floor result for patches with no reference material to compare
    /// against; distinct from a silent patch.
    pub fn unaligned(num_bands: usize, deg_energy: Vec<f64>) -> Self {
        Self {
            freq_band_means: vec![0.0; num_bands],
            freq_band_stddevs: vec![0.0; num_bands],
            freq_band_deg_energy: deg_energy,
            similarity: 0.0,
            ref_patch_start_time: 0.0,
            ref_patch_end_time: 0.0,
            deg_patch_start_time: 0.0,
            deg_patch_end_time: 0.0,
        }
    }
}

/// Measure the similarity of two equally shaped patches.
///
/// Pure function of its inputs; the stabilizing constants keep near-silent
/// bands from dividing by zero.
pub fn measure_patch_similarity(ref_patch: &Matrix, deg_patch: &Matrix) -> PatchSimilarity {
    let c1 = (0.01 * INTENSITY_RANGE).powi(2);
    let c3 = (0.03 * INTENSITY_RANGE).powi(2) / 2.0;

    let mu_r = window_mean(ref_patch);
    let mu_d = window_mean(deg_patch);
    let mu_r_sq = mu_r.hadamard(&mu_r);
    let mu_d_sq = mu_d.hadamard(&mu_d);
    let mu_r_mu_d = mu_r.hadamard(&mu_d);

    let sigma_r_sq = sub(&window_mean(&ref_patch.hadamard(ref_patch)), &mu_r_sq);
    let sigma_d_sq = sub(&window_mean(&deg_patch.hadamard(deg_patch)), &mu_d_sq);
    let sigma_r_d = sub(&window_mean(&ref_patch.hadamard(deg_patch)), &mu_r_mu_d);

    let mut sim_map = Matrix::zeros(ref_patch.rows(), ref_patch.cols());
    for row in 0..sim_map.rows() {
        for col in 0..sim_map.cols() {
            let intensity = (2.0 * mu_r_mu_d.get(row, col) + c1)
                / (mu_r_sq.get(row, col) + mu_d_sq.get(row, col) + c1);

            // A silent patch can produce an epsilon-negative variance
            // product; treat it as zero spread rather than emitting a NaN.
            let var_product = sigma_r_sq.get(row, col) * sigma_d_sq.get(row, col);
            let spread = if var_product < 0.0 {
                c3
            } else {
                var_product.sqrt() + c3
            };
            let structure = (sigma_r_d.get(row, col) + c3) / spread;

            sim_map.set(row, col, intensity * structure);
        }
    }

    let freq_band_means = sim_map.row_means();
    let freq_band_stddevs = sim_map.row_stddevs();
    let freq_band_deg_energy = deg_patch.row_means();
    let similarity =
        freq_band_means.iter().sum::<f64>() / freq_band_means.len() as f64;

    PatchSimilarity {
        freq_band_means,
        freq_band_stddevs,
        freq_band_deg_energy,
        similarity,
        ref_patch_start_time: 0.0,
        ref_patch_end_time: 0.0,
        deg_patch_start_time: 0.0,
        deg_patch_end_time: 0.0,
    }
}

/// 3x3 weighted-mean convolution with replicated boundary, output the same
/// shape as the input.
fn window_mean(input: &Matrix) -> Matrix {
    let rows = input.rows() as isize;
    let cols = input.cols() as isize;
    let mut out = Matrix::zeros(input.rows(), input.cols());

    let sample = |row: isize, col: isize| -> f64 {
        let r = row.clamp(0, rows - 1) as usize;
        let c = col.clamp(0, cols - 1) as usize;
        input.get(r, c)
    };

    for row in 0..rows {
        for col in 0..cols {
            let mut acc = 0.0;
            for dr in -1..=1isize {
                for dc in -1..=1isize {
                    let w = WINDOW[((dr + 1) * 3 + (dc + 1)) as usize];
                    acc += w * sample(row + dr, col + dc);
                }
            }
            out.set(row as usize, col as usize, acc);
        }
    }
    out
}

fn sub(a: &Matrix, b: &Matrix) -> Matrix {
    let mut out = a.clone();
    for (o, v) in out.iter_mut().zip(b.iter()) {
        *o -= v;
    }
    out
}
