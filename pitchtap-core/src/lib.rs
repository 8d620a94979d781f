// pitchtap-core/src/lib.rs

//! The core logic for the PitchTap practice tool.
//! This crate is responsible for audio capture, pitch tracking,
//! matching a sung or played note against a target frequency,
//! and laying out metronome sequences. It is completely headless
//! and contains no GUI code.

pub mod audio;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod metronome;
pub mod pitch;
pub mod spectrum;
pub mod stats;
pub mod tuning;

pub use error::{Error, Result};
pub use evaluator::{ListenState, MatchResult, PitchMatchEvaluator};

/// A single amplitude-tagged frequency reading from the pitch tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchSample {
    /// Estimated fundamental frequency in Hz.
    pub frequency: f32,
    /// Signal strength of the frame the estimate came from (RMS, 0.0 to 1.0).
    pub amplitude: f32,
}

impl PitchSample {
    pub fn new(frequency: f32, amplitude: f32) -> Self {
        Self { frequency, amplitude }
    }
}
