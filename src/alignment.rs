//! Reference/degraded temporal alignment.
//!
//! Transcoding chains drift, insert, and delete audio. The aligner walks the
//! degraded spectrogram patch by patch and, for each one, slides a bounded
//! window over the reference looking for the best-matching patch. This is a
//! deliberate bounded search, not a globally optimal dynamic-time-warping
//! match; the complexity/latency trade-off is intentional.

use tracing::{debug, warn};

use crate::matrix::Matrix;
use crate::nsim::{measure_patch_similarity, PatchSimilarity};
use crate::signal;
use crate::spectrogram::{prepare_for_comparison, Spectrogram, SpectrogramBuilder};
use crate::types::{AudioSignal, SearchWindow};
use crate::window::AnalysisWindow;
use crate::xcorr;

/// One degraded patch paired with its best reference match.
#[derive(Debug, Clone)]
pub struct AlignedPatch {
    /// Index of the patch within the degraded spectrogram.
    pub patch_index: usize,
    /// First degraded frame covered by this patch.
    pub deg_frame_index: usize,
    /// Chosen reference start frame, if any candidate existed in range.
    pub ref_frame_index: Option<usize>,
    /// Signed frame offset from the nominal (zero-drift) position.
    pub frame_offset: i64,
    /// Per-band similarity statistics for the chosen pairing.
    pub similarity: PatchSimilarity,
}

impl AlignedPatch {
    pub fn is_unaligned(&self) -> bool {
        self.ref_frame_index.is_none()
    }
}

/// Bounded sliding-window patch aligner.
pub struct PatchAligner {
    patch_size: usize,
    search_window: SearchWindow,
}

impl PatchAligner {
    pub fn new(patch_size: usize, search_window: SearchWindow) -> Self {
        Self {
            patch_size,
            search_window,
        }
    }

    /// Align every degraded patch against the reference spectrogram.
    ///
    /// The result covers the degraded file end-to-end: even when the
    /// degraded signal runs past the reference, every patch is represented,
    /// with out-of-range patches marked unaligned and given the minimum
    /// similarity rather than failing.
    pub fn align(
        &self,
        reference: &Spectrogram,
        degraded: &Spectrogram,
        frame_duration: f64,
    ) -> Vec<AlignedPatch> {
        let ref_frames = reference.num_frames() as i64;
        let radius = self.search_window.radius() as i64;
        let patch_duration = frame_duration * self.patch_size as f64;

        let mut patches = Vec::new();
        let mut unaligned_count = 0usize;

        for (patch_index, deg_start) in
            (0..degraded.num_frames()).step_by(self.patch_size).enumerate()
        {
            let deg_patch = extract_patch(degraded.data(), deg_start as i64, self.patch_size);
            let nominal = deg_start as i64;

            let (low, high) = if radius == 0 {
                (nominal, nominal)
            } else {
                (nominal - radius, nominal + radius)
            };
            let low = low.max(0);
            let high = high.min(ref_frames - 1);

            let mut best: Option<(i64, PatchSimilarity)> = None;
            for offset in low..=high {
                let ref_patch = extract_patch(reference.data(), offset, self.patch_size);
                let candidate = measure_patch_similarity(&ref_patch, &deg_patch);
                let replace = match &best {
                    None => true,
                    Some((best_offset, best_sim)) => {
                        let drift = (offset - nominal).abs();
                        let best_drift = (best_offset - nominal).abs();
                        candidate.similarity > best_sim.similarity
                            || (candidate.similarity == best_sim.similarity
                                && (drift < best_drift
                                    || (drift == best_drift && offset < *best_offset)))
                    }
                };
                if replace {
                    best = Some((offset, candidate));
                }
            }

            let patch = match best {
                Some((offset, mut similarity)) => {
                    similarity.ref_patch_start_time = offset as f64 * frame_duration;
                    similarity.ref_patch_end_time =
                        similarity.ref_patch_start_time + patch_duration;
                    similarity.deg_patch_start_time = deg_start as f64 * frame_duration;
                    similarity.deg_patch_end_time =
                        similarity.deg_patch_start_time + patch_duration;
                    AlignedPatch {
                        patch_index,
                        deg_frame_index: deg_start,
                        ref_frame_index: Some(offset as usize),
                        frame_offset: offset - nominal,
                        similarity,
                    }
                }
                None => {
                    // The degraded signal extends beyond anything the
                    // reference can offer within the search window.
                    unaligned_count += 1;
                    let deg_energy = deg_patch.row_means();
                    let mut similarity =
                        PatchSimilarity::unaligned(degraded.num_bands(), deg_energy);
                    similarity.ref_patch_start_time = 0.0;
                    similarity.ref_patch_end_time = 0.0;
                    similarity.deg_patch_start_time = deg_start as f64 * frame_duration;
                    similarity.deg_patch_end_time =
                        similarity.deg_patch_start_time + patch_duration;
                    AlignedPatch {
                        patch_index,
                        deg_frame_index: deg_start,
                        ref_frame_index: None,
                        frame_offset: 0,
                        similarity,
                    }
                }
            };
            patches.push(patch);
        }

        if unaligned_count > 0 {
            warn!(
                unaligned_count,
                total = patches.len(),
                "degraded patches had no reference material in the search window"
            );
        }
        debug!(
            patches = patches.len(),
            radius = self.search_window.radius(),
            "patch alignment complete"
        );
        patches
    }

    /// Refine each matched patch by realigning the underlying time-domain
    /// audio and re-measuring, keeping whichever similarity is better.
    ///
    /// The coarse search operates at frame granularity; codec timing drift
    /// is often a fraction of a frame, which this pass recovers.
    pub fn finely_align(
        &self,
        patches: Vec<AlignedPatch>,
        ref_signal: &AudioSignal,
        deg_signal: &AudioSignal,
        builder: &SpectrogramBuilder,
        window: &AnalysisWindow,
    ) -> Vec<AlignedPatch> {
        patches
            .into_iter()
            .map(|patch| {
                if patch.is_unaligned() {
                    return patch;
                }
                match refine_patch(&patch, ref_signal, deg_signal, builder, window) {
                    Some(refined) if refined.similarity.similarity
                        > patch.similarity.similarity =>
                    {
                        refined
                    }
                    _ => patch,
                }
            })
            .collect()
    }
}

/// Cut a patch of `patch_size` frames starting at `start` (frames outside
/// the spectrogram are silence).
fn extract_patch(data: &Matrix, start: i64, patch_size: usize) -> Matrix {
    data.columns_padded(start as isize, (start + patch_size as i64 - 1) as isize)
}

fn refine_patch(
    patch: &AlignedPatch,
    ref_signal: &AudioSignal,
    deg_signal: &AudioSignal,
    builder: &SpectrogramBuilder,
    window: &AnalysisWindow,
) -> Option<AlignedPatch> {
    let sim = &patch.similarity;
    let ref_audio = signal::slice(ref_signal, sim.ref_patch_start_time, sim.ref_patch_end_time);
    let deg_audio = signal::slice(deg_signal, sim.deg_patch_start_time, sim.deg_patch_end_time);

    let (ref_aligned, deg_aligned, lag) = align_and_truncate(&ref_audio, &deg_audio);

    let mut ref_spectro = builder.build(&ref_aligned, window).ok()?;
    let mut deg_spectro = builder.build(&deg_aligned, window).ok()?;
    prepare_for_comparison(&mut ref_spectro, &mut deg_spectro);

    let mut refined = measure_patch_similarity(ref_spectro.data(), deg_spectro.data());
    if lag > 0.0 {
        refined.ref_patch_start_time = sim.ref_patch_start_time + lag;
        refined.deg_patch_start_time = sim.deg_patch_start_time;
    } else {
        refined.ref_patch_start_time = sim.ref_patch_start_time;
        refined.deg_patch_start_time = sim.deg_patch_start_time - lag;
    }
    refined.ref_patch_end_time = refined.ref_patch_start_time + ref_aligned.duration();
    refined.deg_patch_end_time = refined.deg_patch_start_time + deg_aligned.duration();

    Some(AlignedPatch {
        patch_index: patch.patch_index,
        deg_frame_index: patch.deg_frame_index,
        ref_frame_index: patch.ref_frame_index,
        frame_offset: patch.frame_offset,
        similarity: refined,
    })
}

/// Shift the degraded signal onto the reference by envelope
/// cross-correlation, then truncate both to a common span.
///
/// Returns the two aligned signals and the applied lag in seconds.
pub fn align_and_truncate(
    ref_signal: &AudioSignal,
    deg_signal: &AudioSignal,
) -> (AudioSignal, AudioSignal, f64) {
    let (shifted_deg, lag) = globally_align(ref_signal, deg_signal);

    let ref_len = ref_signal.samples.len();
    let deg_len = shifted_deg.samples.len();
    let sample_rate = ref_signal.sample_rate;

    if ref_len > deg_len {
        let truncated_ref = AudioSignal::new(ref_signal.samples[..deg_len].to_vec(), sample_rate);
        (truncated_ref, shifted_deg, lag)
    } else if ref_len < deg_len {
        // Positive lag zero-padded the front of the degraded signal; drop
        // that span from both so the starts line up again.
        let skip = ((lag * sample_rate as f64) as usize).min(ref_len);
        let truncated_ref =
            AudioSignal::new(ref_signal.samples[skip..].to_vec(), sample_rate);
        let truncated_deg =
            AudioSignal::new(shifted_deg.samples[skip..ref_len].to_vec(), sample_rate);
        (truncated_ref, truncated_deg, lag)
    } else {
        (ref_signal.clone(), shifted_deg, lag)
    }
}

/// Estimate the global lag between two signals from their upper envelopes
/// and shift the degraded signal to cancel it.
fn globally_align(ref_signal: &AudioSignal, deg_signal: &AudioSignal) -> (AudioSignal, f64) {
    let ref_env = xcorr::upper_envelope(&ref_signal.samples);
    let deg_env = xcorr::upper_envelope(&deg_signal.samples);
    let best_lag = xcorr::best_lag(&ref_env, &deg_env);

    // A lag beyond half the reference is more likely a spurious correlation
    // than real drift; leave the signal alone.
    if best_lag == 0 || best_lag.unsigned_abs() as usize > ref_signal.samples.len() / 2 {
        return (deg_signal.clone(), 0.0);
    }

    let shifted = if best_lag < 0 {
        AudioSignal::new(
            deg_signal.samples[best_lag.unsigned_abs() as usize..].to_vec(),
            deg_signal.sample_rate,
        )
    } else {
        let mut samples = vec![0.0; best_lag as usize];
        samples.extend_from_slice(&deg_signal.samples);
        AudioSignal::new(samples, deg_signal.sample_rate)
    };
    (shifted, best_lag as f64 / deg_signal.sample_rate as f64)
}
