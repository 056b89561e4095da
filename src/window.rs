//! Analysis window geometry for spectrogram framing.

/// Hann-windowed frame geometry shared by both spectrograms of a run.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisWindow {
    /// Frame length in samples.
    pub size: usize,
    /// Hop as a fraction of the frame length.
    pub overlap: f64,
}

impl AnalysisWindow {
    pub fn new(sample_rate: u32, overlap: f64, window_duration: f64) -> Self {
        Self {
            size: (sample_rate as f64 * window_duration).round() as usize,
            overlap,
        }
    }

    /// Hop length in samples.
    pub fn hop_size(&self) -> usize {
        ((self.size as f64 * self.overlap) as usize).max(1)
    }

    /// Seconds between consecutive frame starts.
    pub fn frame_duration(&self, sample_rate: u32) -> f64 {
        self.hop_size() as f64 / sample_rate as f64
    }

    /// Multiply a frame by a Hann window in place.
    pub fn apply_hann(&self, frame: &mut [f64]) {
        let n = frame.len();
        if n < 2 {
            return;
        }
        for (i, sample) in frame.iter_mut().enumerate() {
            let w = 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos();
            *sample *= w;
        }
    }
}
