//! # Pitch Tracking Module
//!
//! Turns raw microphone frames into [`PitchSample`] readings.
//!
//! ## Features
//! - RMS amplitude measurement and a silence gate
//! - YIN period estimation with a clarity check to reject noise
//! - Parabolic interpolation for sub-sample accuracy
//! - Spectrum refinement of the final estimate

use crate::PitchSample;
use crate::spectrum::{SpectrumAnalyzer, refine_from_spectrum};

/// Frames quieter than this RMS level are treated as silence.
pub const DEFAULT_NOISE_FLOOR: f32 = 0.01;

/// Cumulative-mean-normalized difference above which a dip is considered noise.
const CLARITY_THRESHOLD: f32 = 0.1;

/// Lowest frequency reported; anything below is rejected as rumble.
const MIN_FREQUENCY: f32 = 20.0;

/// Root mean square of a frame.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

/// Per-stream pitch tracker. Reuses its buffers between frames, so keep
/// one per input stream.
#[derive(Debug)]
pub struct PitchTracker {
    sample_rate: u32,
    noise_floor: f32,
    yin: Vec<f32>,
    spectrum: SpectrumAnalyzer,
}

impl PitchTracker {
    pub fn new(sample_rate: u32, frame_size: usize) -> Self {
        Self {
            sample_rate,
            noise_floor: DEFAULT_NOISE_FLOOR,
            yin: vec![0.0; frame_size / 2],
            spectrum: SpectrumAnalyzer::new(frame_size),
        }
    }

    pub fn with_noise_floor(mut self, noise_floor: f32) -> Self {
        self.noise_floor = noise_floor;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_size(&self) -> usize {
        self.spectrum.frame_size()
    }

    /// Analyzes one frame of mono audio.
    ///
    /// # Arguments
    /// * `frame` - Exactly `frame_size()` samples in the range -1.0..=1.0
    ///
    /// # Returns
    /// * `Some(sample)` - Refined frequency in Hz and the frame's RMS amplitude
    /// * `None` - Silence, noise without a clear period, or a frame of the wrong length
    pub fn process(&mut self, frame: &[f32]) -> Option<PitchSample> {
        if frame.len() != self.frame_size() {
            tracing::trace!(
                "frame of {} samples does not match tracker size {}",
                frame.len(),
                self.frame_size()
            );
            return None;
        }

        let amplitude = rms(frame);
        if amplitude < self.noise_floor {
            return None;
        }

        let rough = self.detect_yin(frame)?;
        let sample_rate = self.sample_rate;
        let frequency = match self.spectrum.magnitudes(frame) {
            Some(magnitudes) => refine_from_spectrum(magnitudes, rough, sample_rate),
            None => rough,
        };

        Some(PitchSample { frequency, amplitude })
    }

    /// YIN estimate of the fundamental frequency of `frame`.
    fn detect_yin(&mut self, frame: &[f32]) -> Option<f32> {
        let half = self.yin.len();
        if half < 3 {
            return None;
        }

        // Difference function
        self.yin[0] = 0.0;
        for tau in 1..half {
            self.yin[tau] = (0..half)
                .map(|i| {
                    let delta = frame[i] - frame[i + tau];
                    delta * delta
                })
                .sum();
        }

        // Cumulative mean normalized difference
        let mut running_sum = 0.0;
        self.yin[0] = 1.0;
        for tau in 1..half {
            running_sum += self.yin[tau];
            self.yin[tau] = if running_sum != 0.0 {
                self.yin[tau] * tau as f32 / running_sum
            } else {
                1.0
            };
        }

        // First dip close to the global minimum avoids octave errors.
        let min_val = self.yin[1..].iter().copied().fold(f32::INFINITY, f32::min);
        let threshold = min_val + 0.05;
        let mut period = (2..half).find(|&tau| self.yin[tau] < threshold && self.yin[tau] < self.yin[tau - 1])?;
        while period + 1 < half && self.yin[period + 1] < self.yin[period] {
            period += 1;
        }

        if self.yin[period] > CLARITY_THRESHOLD || period + 1 >= half {
            return None;
        }

        let y1 = self.yin[period - 1];
        let y2 = self.yin[period];
        let y3 = self.yin[period + 1];
        let curvature = y1 - 2.0 * y2 + y3;
        let period = if curvature != 0.0 {
            period as f32 + (y1 - y3) / (2.0 * curvature)
        } else {
            period as f32
        };

        let frequency = self.sample_rate as f32 / period;
        if frequency.is_finite() && frequency > MIN_FREQUENCY {
            Some(frequency)
        } else {
            None
        }
    }
}
