//! # Musical Tuning Module
//!
//! Note tables and frequency helpers for picking practice targets and
//! naming detected pitches.
//!
//! ## Features
//! - Chromatic note names with sharps or flats
//! - Equal temperament reference frequencies from C0 to B8
//! - Nearest-note lookup and cent deviation
//! - Random octave-four practice targets

use once_cell::sync::Lazy;
use rand::Rng;

/// Note names using sharps, indexed by pitch class (C = 0).
pub const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C♯", "D", "D♯", "E", "F", "F♯", "G", "G♯", "A", "A♯", "B",
];

/// Note names using flats, indexed by pitch class (C = 0).
pub const NOTE_NAMES_FLAT: [&str; 12] = [
    "C", "D♭", "D", "E♭", "E", "F", "G♭", "G", "A♭", "A", "B♭", "B",
];

/// Reference frequencies of octave zero (C0 to B0) in Hz.
pub const OCTAVE_ZERO_FREQUENCIES: [f32; 12] = [
    16.35, 17.32, 18.35, 19.45, 20.60, 21.83, 23.12, 24.50, 25.96, 27.50, 29.14, 30.87,
];

/// Frequencies of octave four (C4 to B4) in Hz, the practice range.
pub const OCTAVE_FOUR_FREQUENCIES: [f32; 12] = [
    261.63, 277.18, 293.66, 311.13, 329.63, 349.23, 369.99, 392.00, 415.30, 440.00, 466.16, 493.88,
];

const HIGHEST_OCTAVE: i32 = 8;

/// A named pitch with its reference frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteInfo {
    /// Pitch class, 0 (C) to 11 (B).
    pub pitch_class: usize,
    pub octave: i32,
    pub frequency: f32,
}

impl NoteInfo {
    /// Display name using sharps, e.g. `"A4"` or `"C♯3"`.
    pub fn name(&self) -> String {
        format!("{}{}", NOTE_NAMES_SHARP[self.pitch_class], self.octave)
    }

    /// Display name using flats, e.g. `"D♭3"`.
    pub fn flat_name(&self) -> String {
        format!("{}{}", NOTE_NAMES_FLAT[self.pitch_class], self.octave)
    }
}

/// A note the user is asked to sing or play.
#[derive(Debug, Clone, PartialEq)]
pub struct PracticeTarget {
    pub name: String,
    pub frequency: f32,
}

/// Every note from C0 to B8, ascending.
static NOTE_TABLE: Lazy<Vec<NoteInfo>> = Lazy::new(|| {
    (0..=HIGHEST_OCTAVE)
        .flat_map(|octave| {
            (0..12).map(move |pitch_class| NoteInfo {
                pitch_class,
                octave,
                frequency: note_frequency(pitch_class, octave),
            })
        })
        .collect()
});

/// Reference frequency of a pitch class in the given octave.
///
/// Octaves below zero are allowed and halve the octave-zero frequency.
pub fn note_frequency(pitch_class: usize, octave: i32) -> f32 {
    OCTAVE_ZERO_FREQUENCIES[pitch_class % 12] * 2.0_f32.powi(octave)
}

/// Finds the table note closest to a frequency.
///
/// # Arguments
/// * `freq` - Frequency in Hz
///
/// # Returns
/// * `Some(note)` - Closest note in the table
/// * `None` - `freq` is non-positive or non-finite
pub fn nearest_note(freq: f32) -> Option<NoteInfo> {
    if !(freq.is_finite() && freq > 0.0) {
        return None;
    }
    NOTE_TABLE
        .iter()
        .min_by(|a, b| {
            let diff_a = (a.frequency - freq).abs();
            let diff_b = (b.frequency - freq).abs();
            diff_a.total_cmp(&diff_b)
        })
        .cloned()
}

/// Deviation of `freq` from `target_freq` in cents (positive = sharp).
pub fn cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Picks a random octave-four note as the next practice target.
pub fn random_practice_target<R: Rng + ?Sized>(rng: &mut R) -> PracticeTarget {
    let pitch_class = rng.gen_range(0..OCTAVE_FOUR_FREQUENCIES.len());
    PracticeTarget {
        name: format!("{}4", NOTE_NAMES_SHARP[pitch_class]),
        frequency: OCTAVE_FOUR_FREQUENCIES[pitch_class],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn octave_four_follows_octave_zero() {
        for (pitch_class, &freq) in OCTAVE_FOUR_FREQUENCIES.iter().enumerate() {
            assert_relative_eq!(note_frequency(pitch_class, 4), freq, max_relative = 0.001);
        }
    }

    #[test]
    fn nearest_note_names_a4() {
        let note = nearest_note(443.0).unwrap();
        assert_eq!(note.name(), "A4");
        assert_relative_eq!(note.frequency, 440.0, epsilon = 0.01);

        let note = nearest_note(278.0).unwrap();
        assert_eq!(note.name(), "C♯4");
        assert_eq!(note.flat_name(), "D♭4");
    }

    #[test]
    fn nearest_note_rejects_nonsense() {
        assert_eq!(nearest_note(0.0), None);
        assert_eq!(nearest_note(-3.0), None);
        assert_eq!(nearest_note(f32::NAN), None);
    }

    #[test]
    fn cents_are_signed() {
        assert_relative_eq!(cents_deviation(880.0, 440.0), 1200.0, epsilon = 1e-3);
        assert!(cents_deviation(430.0, 440.0) < 0.0);
        assert_relative_eq!(cents_deviation(440.0, 440.0), 0.0);
    }

    #[test]
    fn random_targets_come_from_octave_four() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let target = random_practice_target(&mut rng);
            assert!(OCTAVE_FOUR_FREQUENCIES.contains(&target.frequency));
            assert!(target.name.ends_with('4'));
        }
    }
}
