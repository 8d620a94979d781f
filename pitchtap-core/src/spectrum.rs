//! # Spectrum Module
//!
//! Magnitude spectra of fixed-size analysis frames, used to refine the
//! time-domain pitch estimate.

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

/// Computes magnitude spectra for frames of one fixed size.
///
/// The FFT plan, window and scratch buffers are built once and reused
/// for every frame.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("frame_size", &self.window.len())
            .finish()
    }
}

impl SpectrumAnalyzer {
    pub fn new(frame_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_size);
        let scratch_len = fft.get_inplace_scratch_len();
        Self {
            fft,
            window: hann_window(frame_size),
            buffer: vec![Complex::default(); frame_size],
            scratch: vec![Complex::default(); scratch_len],
            magnitudes: vec![0.0; frame_size / 2],
        }
    }

    pub fn frame_size(&self) -> usize {
        self.window.len()
    }

    /// Magnitudes of the bins up to Nyquist for `frame`.
    ///
    /// The frame is centred on zero and Hann-windowed first. Returns `None`
    /// when the frame length does not match the analyzer.
    pub fn magnitudes(&mut self, frame: &[f32]) -> Option<&[f32]> {
        if frame.len() != self.frame_size() {
            return None;
        }

        let dc = frame.iter().sum::<f32>() / frame.len() as f32;
        for ((slot, &sample), &w) in self.buffer.iter_mut().zip(frame).zip(&self.window) {
            *slot = Complex::new((sample - dc) * w, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (mag, c) in self.magnitudes.iter_mut().zip(&self.buffer) {
            *mag = c.norm();
        }
        Some(&self.magnitudes)
    }
}

fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Refines a rough frequency estimate using the spectrum peak near it.
///
/// Searches two bins either side of the estimate and interpolates the
/// log-magnitude peak with a parabola. Falls back to `rough_freq` whenever
/// the neighbourhood is unusable.
pub fn refine_from_spectrum(magnitudes: &[f32], rough_freq: f32, sample_rate: u32) -> f32 {
    if rough_freq <= 0.0 || magnitudes.len() < 3 {
        return rough_freq;
    }
    let frame_size = (magnitudes.len() * 2) as f32;
    let bin_hz = sample_rate as f32 / frame_size;
    let target_bin = rough_freq / bin_hz;
    const SEARCH_RADIUS: f32 = 2.0;

    let last = magnitudes.len() - 1;
    let start = (target_bin - SEARCH_RADIUS).max(0.0) as usize;
    let end = ((target_bin + SEARCH_RADIUS) as usize).min(last);
    if start >= end {
        return rough_freq;
    }

    let Some(peak) = (start..=end).max_by(|&a, &b| magnitudes[a].total_cmp(&magnitudes[b])) else {
        return rough_freq;
    };
    if peak == 0 || peak >= last {
        return rough_freq;
    }

    let y1 = magnitudes[peak - 1].ln();
    let y2 = magnitudes[peak].ln();
    let y3 = magnitudes[peak + 1].ln();
    if !(y1.is_finite() && y2.is_finite() && y3.is_finite()) {
        return rough_freq;
    }

    let denominator = 2.0 * y2 - y1 - y3;
    if denominator.abs() < 1e-6 {
        return rough_freq;
    }
    let shift = (y3 - y1) / (2.0 * denominator);
    let refined = (peak as f32 + shift) * bin_hz;

    if refined.is_finite() && refined > 0.0 { refined } else { rough_freq }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn peak_lands_on_tone_bin() {
        let mut analyzer = SpectrumAnalyzer::new(2048);
        let frame = sine(440.0, 44100, 2048);
        let mags = analyzer.magnitudes(&frame).unwrap();
        assert_eq!(mags.len(), 1024);

        let peak = (0..mags.len()).max_by(|&a, &b| mags[a].total_cmp(&mags[b])).unwrap();
        let bin_hz = 44100.0 / 2048.0;
        assert!((peak as f32 * bin_hz - 440.0).abs() < bin_hz);
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let mut analyzer = SpectrumAnalyzer::new(1024);
        assert!(analyzer.magnitudes(&[0.0; 512]).is_none());
    }

    #[test]
    fn refinement_moves_toward_true_pitch() {
        let mut analyzer = SpectrumAnalyzer::new(2048);
        let frame = sine(440.0, 44100, 2048);
        let mags = analyzer.magnitudes(&frame).unwrap().to_vec();
        let refined = refine_from_spectrum(&mags, 435.0, 44100);
        assert!((refined - 440.0).abs() < 3.0, "refined to {refined}");
    }

    #[test]
    fn refinement_falls_back_on_silence() {
        let mags = vec![0.0; 1024];
        assert_eq!(refine_from_spectrum(&mags, 440.0, 44100), 440.0);
    }
}
