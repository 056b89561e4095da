//! Time-frequency decomposition and comparison preparation.
//!
//! A spectrogram here is not an STFT: each cell is the RMS of a gammatone
//! band filter output over one Hann-windowed frame, so the rows track the
//! cochlear band layout rather than linear FFT bins.

use tracing::debug;

use crate::filterbank::GammatoneFilterBank;
use crate::matrix::Matrix;
use crate::types::{AudioSignal, OperatingMode, QualityError, Result};
use crate::window::AnalysisWindow;

const NOISE_FLOOR_RELATIVE_TO_PEAK_DB: f64 = 45.0;
const NOISE_FLOOR_ABSOLUTE_DB: f64 = -45.0;

/// Band-major magnitude representation of one signal (rows = bands, lowest
/// first; columns = frames).
#[derive(Debug, Clone)]
pub struct Spectrogram {
    data: Matrix,
    center_frequencies: Vec<f64>,
}

impl Spectrogram {
    pub fn new(data: Matrix, center_frequencies: Vec<f64>) -> Self {
        Self {
            data,
            center_frequencies,
        }
    }

    pub fn data(&self) -> &Matrix {
        &self.data
    }

    pub fn num_bands(&self) -> usize {
        self.data.rows()
    }

    pub fn num_frames(&self) -> usize {
        self.data.cols()
    }

    pub fn center_frequencies(&self) -> &[f64] {
        &self.center_frequencies
    }

    fn convert_to_db(&mut self) {
        for v in self.data.iter_mut() {
            let abs = v.abs();
            let abs = if abs == 0.0 { f64::EPSILON } else { abs };
            *v = 10.0 * abs.log10();
        }
    }

    fn raise_floor(&mut self, new_floor: f64) {
        for v in self.data.iter_mut() {
            *v = v.max(new_floor);
        }
    }

    fn subtract_floor(&mut self, floor: f64) {
        for v in self.data.iter_mut() {
            *v -= floor;
        }
    }

    /// Raise each frame's floor to `noise_threshold` dB below the louder of
    /// the two corresponding frames. Both spectrograms share the per-frame
    /// floor.
    fn raise_floor_per_frame(&mut self, noise_threshold: f64, other: &mut Spectrogram) {
        let min_frames = self.num_frames().min(other.num_frames());
        for frame in 0..min_frames {
            let mut peak = f64::NEG_INFINITY;
            for band in 0..self.data.rows() {
                peak = peak.max(self.data.get(band, frame));
            }
            for band in 0..other.data.rows() {
                peak = peak.max(other.data.get(band, frame));
            }
            let floor = peak - noise_threshold;
            for band in 0..self.data.rows() {
                let v = self.data.get(band, frame);
                self.data.set(band, frame, v.max(floor));
            }
            for band in 0..other.data.rows() {
                let v = other.data.get(band, frame);
                other.data.set(band, frame, v.max(floor));
            }
        }
    }
}

/// Convert both spectrograms to dB, floor out frame-level and absolute
/// noise, and normalize both onto a shared 0 dB global floor.
pub fn prepare_for_comparison(reference: &mut Spectrogram, degraded: &mut Spectrogram) {
    reference.convert_to_db();
    degraded.convert_to_db();

    reference.raise_floor(NOISE_FLOOR_ABSOLUTE_DB);
    degraded.raise_floor(NOISE_FLOOR_ABSOLUTE_DB);

    // Signals with activity peak around -10 dB per frame; ambient noise
    // frames sit far below. Clip the quiet region relative to the louder of
    // the two frames.
    reference.raise_floor_per_frame(NOISE_FLOOR_RELATIVE_TO_PEAK_DB, degraded);

    let lowest_floor = reference.data.min_value().min(degraded.data.min_value());
    reference.subtract_floor(lowest_floor);
    degraded.subtract_floor(lowest_floor);
}

/// Builds gammatone spectrograms for one operating mode.
pub struct SpectrogramBuilder {
    mode: OperatingMode,
}

impl SpectrogramBuilder {
    pub fn new(mode: OperatingMode) -> Self {
        Self { mode }
    }

    /// Decompose a signal into per-frame, per-band RMS energy.
    pub fn build(&self, signal: &AudioSignal, window: &AnalysisWindow) -> Result<Spectrogram> {
        if signal.samples.is_empty() {
            return Err(QualityError::InvalidSignal("empty sample buffer".into()));
        }
        if signal.samples.len() < window.size {
            return Err(QualityError::InvalidSignal(format!(
                "too few samples ({}) to build a spectrogram ({} required minimum)",
                signal.samples.len(),
                window.size
            )));
        }
        let max_freq = self.mode.max_frequency(signal.sample_rate);
        let min_freq = self.mode.min_frequency();
        if max_freq <= min_freq {
            return Err(QualityError::InvalidSignal(format!(
                "sample rate {} is incompatible with the {:?} band layout",
                signal.sample_rate, self.mode
            )));
        }

        let bank = GammatoneFilterBank::new(
            signal.sample_rate,
            self.mode.band_count(),
            min_freq,
            max_freq,
        );

        let hop = window.hop_size();
        let num_frames = 1 + (signal.samples.len() - window.size) / hop;
        let mut data = Matrix::zeros(bank.num_bands(), num_frames);

        for frame_index in 0..num_frames {
            let start = frame_index * hop;
            let mut frame = signal.samples[start..start + window.size].to_vec();
            window.apply_hann(&mut frame);

            let filtered = bank.filter_frame(&frame);
            for (band, band_output) in filtered.iter().enumerate() {
                let rms = (band_output.iter().map(|s| s * s).sum::<f64>()
                    / band_output.len() as f64)
                    .sqrt();
                data.set(band, frame_index, rms);
            }
        }

        debug!(
            mode = ?self.mode,
            num_frames,
            num_bands = bank.num_bands(),
            sample_rate = signal.sample_rate,
            "built spectrogram"
        );

        Ok(Spectrogram::new(data, bank.center_frequencies().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, seconds: f64, sample_rate: u32) -> AudioSignal {
        let n = (seconds * sample_rate as f64) as usize;
        AudioSignal::new(
            (0..n)
                .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin())
                .collect(),
            sample_rate,
        )
    }

    #[test]
    fn empty_signal_is_rejected() {
        let builder = SpectrogramBuilder::new(OperatingMode::Audio);
        let window = AnalysisWindow::new(48000, 0.25, 0.08);
        let result = builder.build(&AudioSignal::new(vec![], 48000), &window);
        assert!(matches!(result, Err(QualityError::InvalidSignal(_))));
    }

    #[test]
    fn sub_frame_signal_is_rejected() {
        let builder = SpectrogramBuilder::new(OperatingMode::Audio);
        let window = AnalysisWindow::new(48000, 0.25, 0.08);
        let result = builder.build(&AudioSignal::new(vec![0.1; 1000], 48000), &window);
        assert!(matches!(result, Err(QualityError::InvalidSignal(_))));
    }

    #[test]
    fn signal_of_exactly_one_frame_yields_one_frame() {
        let builder = SpectrogramBuilder::new(OperatingMode::Speech);
        let window = AnalysisWindow::new(16000, 0.25, 0.04);
        let spectro = builder
            .build(&tone(440.0, 0.04, 16000), &window)
            .unwrap();
        assert_eq!(spectro.num_frames(), 1);
    }

    #[test]
    fn frame_count_follows_hop_arithmetic() {
        let builder = SpectrogramBuilder::new(OperatingMode::Audio);
        let window = AnalysisWindow::new(48000, 0.25, 0.08);
        let spectro = builder.build(&tone(440.0, 1.0, 48000), &window).unwrap();
        // 1 + (48000 - 3840) / 960
        assert_eq!(spectro.num_frames(), 47);
        assert_eq!(spectro.num_bands(), 21);
    }

    #[test]
    fn tone_energy_lands_in_the_right_band() {
        let builder = SpectrogramBuilder::new(OperatingMode::Speech);
        let window = AnalysisWindow::new(16000, 0.25, 0.04);
        let spectro = builder.build(&tone(1000.0, 0.5, 16000), &window).unwrap();

        let means: Vec<f64> = spectro.data().row_means();
        let loudest = means
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(band, _)| band)
            .unwrap();
        let cf = spectro.center_frequencies()[loudest];
        assert!((cf - 1000.0).abs() / 1000.0 < 0.35, "loudest band at {cf} Hz");
    }

    #[test]
    fn comparison_prep_floors_both_at_zero() {
        let builder = SpectrogramBuilder::new(OperatingMode::Speech);
        let window = AnalysisWindow::new(16000, 0.25, 0.04);
        let mut reference = builder.build(&tone(440.0, 0.5, 16000), &window).unwrap();
        let mut degraded = builder.build(&tone(450.0, 0.5, 16000), &window).unwrap();

        prepare_for_comparison(&mut reference, &mut degraded);

        let min = reference
            .data()
            .min_value()
            .min(degraded.data().min_value());
        assert!((0.0..1e-9).contains(&min));
    }
}
