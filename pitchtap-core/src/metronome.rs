//! # Metronome Module
//!
//! Lays out the note events of metronome sequences for rhythm practice.
//! This module only produces data (which note lands on which beat) and a
//! clock to follow it in wall time; turning events into sound is left to
//! whatever playback engine the caller uses.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Error, Result};

/// MIDI note used for the accented first beat of a bar.
pub const DOWNBEAT_NOTE: u8 = 47;
pub const DOWNBEAT_VELOCITY: u8 = 120;
/// MIDI note used for every other beat.
pub const BEAT_NOTE: u8 = 40;
pub const BEAT_VELOCITY: u8 = 90;

/// Velocity used when a sequence does not specify one.
pub const DEFAULT_VELOCITY: u8 = 127;

/// Settings of the practice click track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeSettings {
    /// Tempo in beats per minute.
    pub bpm: f64,
    /// Total number of beats in the sequence.
    pub beats: u32,
    /// Beats per bar (time signature numerator).
    pub beats_per_bar: u32,
}

impl Default for MetronomeSettings {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats: 40,
            beats_per_bar: 4,
        }
    }
}

impl MetronomeSettings {
    pub fn validate(&self) -> Result<()> {
        validate_tempo(self.bpm)?;
        if self.beats == 0 {
            return Err(Error::invalid("beats", self.beats, "must be at least 1"));
        }
        if self.beats_per_bar == 0 {
            return Err(Error::invalid("beats_per_bar", self.beats_per_bar, "must be at least 1"));
        }
        Ok(())
    }

    pub fn beat_duration(&self) -> Duration {
        beat_duration(self.bpm)
    }
}

/// One note event on a sequencer track. Positions and durations are in beats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceNote {
    pub note_number: u8,
    pub velocity: u8,
    pub channel: u8,
    pub position: f64,
    pub duration: f64,
}

/// An ordered list of note events with a length in beats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub length: f64,
    pub notes: Vec<SequenceNote>,
}

impl Track {
    pub fn with_length(length: f64) -> Self {
        Self {
            length,
            notes: Vec::new(),
        }
    }

    pub fn add(&mut self, note_number: u8, velocity: u8, position: f64, duration: f64) {
        self.notes.push(SequenceNote {
            note_number,
            velocity,
            channel: 0,
            position,
            duration,
        });
    }

    /// Notes whose start position lies in `[from, to)`.
    pub fn notes_between(&self, from: f64, to: f64) -> impl Iterator<Item = &SequenceNote> {
        self.notes
            .iter()
            .filter(move |n| n.position >= from && n.position < to)
    }
}

/// The practice click: a sound track and a beat-callback track carrying
/// the same events.
#[derive(Debug, Clone, PartialEq)]
pub struct MetronomeSequence {
    pub bpm: f64,
    pub beats_per_bar: u32,
    pub looping: bool,
    pub click: Track,
    pub callback: Track,
}

impl MetronomeSequence {
    /// Lays out one accented note at the start of every bar and a plain
    /// note on every other beat, each one beat long.
    pub fn layout(settings: &MetronomeSettings) -> Result<Self> {
        settings.validate()?;
        let length = f64::from(settings.beats);
        let mut click = Track::with_length(length);

        for beat in 0..settings.beats {
            let position = f64::from(beat);
            if beat % settings.beats_per_bar == 0 {
                click.add(DOWNBEAT_NOTE, DOWNBEAT_VELOCITY, position, 1.0);
            } else {
                click.add(BEAT_NOTE, BEAT_VELOCITY, position, 1.0);
            }
        }

        tracing::debug!(
            "[METRONOME] Laid out {} beats at {} BPM ({} per bar)",
            settings.beats, settings.bpm, settings.beats_per_bar
        );
        Ok(Self {
            bpm: settings.bpm,
            beats_per_bar: settings.beats_per_bar,
            looping: false,
            callback: click.clone(),
            click,
        })
    }

    pub fn length(&self) -> f64 {
        self.click.length
    }

    /// Clock whose downbeats land on this sequence's accented notes.
    pub fn clock(&self) -> BeatClock {
        BeatClock {
            bpm: self.bpm,
            length: self.length(),
            beats_per_bar: self.beats_per_bar,
        }
    }
}

/// Settings of the one-bar shaker pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShakerSettings {
    pub bpm: f64,
    pub beats_per_bar: u32,
    pub downbeat_note: u8,
    pub beat_note: u8,
    pub beat_velocity: u8,
}

impl Default for ShakerSettings {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats_per_bar: 4,
            downbeat_note: 6,
            beat_note: 10,
            beat_velocity: 100,
        }
    }
}

/// A single looping bar: a sound track plus a callback track whose note
/// number is the beat index, so a listener can tell which beat fired.
#[derive(Debug, Clone, PartialEq)]
pub struct ShakerSequence {
    pub bpm: f64,
    pub sound: Track,
    pub callback: Track,
}

impl ShakerSequence {
    pub fn layout(settings: &ShakerSettings) -> Result<Self> {
        validate_tempo(settings.bpm)?;
        if settings.beats_per_bar == 0 {
            return Err(Error::invalid("beats_per_bar", settings.beats_per_bar, "must be at least 1"));
        }
        if settings.beats_per_bar > 128 {
            return Err(Error::invalid("beats_per_bar", settings.beats_per_bar, "must fit in a MIDI note number"));
        }
        let length = f64::from(settings.beats_per_bar);

        let mut sound = Track::with_length(length);
        sound.add(settings.downbeat_note, DEFAULT_VELOCITY, 0.0, 0.4);
        for beat in 1..settings.beats_per_bar {
            sound.add(settings.beat_note, DEFAULT_VELOCITY, f64::from(beat), 0.1);
        }

        let mut callback = Track::with_length(length);
        for beat in 0..settings.beats_per_bar {
            // beats_per_bar <= 128 so every index fits
            callback.add(beat as u8, settings.beat_velocity, f64::from(beat), 0.1);
        }

        Ok(Self {
            bpm: settings.bpm,
            sound,
            callback,
        })
    }
}

/// Where a running sequence is at a given moment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatPosition {
    /// Fractional beats since the start.
    pub beats: f64,
    /// Index of the beat currently sounding.
    pub beat: u32,
    /// Beat index within the bar, starting at 0.
    pub beat_in_bar: u32,
    pub is_downbeat: bool,
}

/// Converts elapsed wall time into a position within a sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatClock {
    bpm: f64,
    length: f64,
    beats_per_bar: u32,
}

impl BeatClock {
    /// Position after `elapsed`, or `None` once the sequence has finished.
    pub fn position(&self, elapsed: Duration) -> Option<BeatPosition> {
        let beats = elapsed.as_secs_f64() * self.bpm / 60.0;
        if beats >= self.length {
            return None;
        }
        let beat = beats.floor() as u32;
        let beat_in_bar = beat % self.beats_per_bar.max(1);
        Some(BeatPosition {
            beats,
            beat,
            beat_in_bar,
            is_downbeat: beat_in_bar == 0,
        })
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        self.position(elapsed).is_none()
    }
}

fn validate_tempo(bpm: f64) -> Result<()> {
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(Error::invalid("bpm", bpm, "must be a positive tempo"));
    }
    Ok(())
}

/// Length of one beat at `bpm`.
pub fn beat_duration(bpm: f64) -> Duration {
    Duration::from_secs_f64(60.0 / bpm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_track_accents_each_bar() {
        let sequence = MetronomeSequence::layout(&MetronomeSettings::default()).unwrap();
        assert_eq!(sequence.click.notes.len(), 40);
        assert_eq!(sequence.length(), 40.0);
        assert!(!sequence.looping);

        for (i, note) in sequence.click.notes.iter().enumerate() {
            assert_eq!(note.position, i as f64);
            assert_eq!(note.duration, 1.0);
            if i % 4 == 0 {
                assert_eq!((note.note_number, note.velocity), (DOWNBEAT_NOTE, DOWNBEAT_VELOCITY));
            } else {
                assert_eq!((note.note_number, note.velocity), (BEAT_NOTE, BEAT_VELOCITY));
            }
        }
        assert_eq!(sequence.callback, sequence.click);
    }

    #[test]
    fn click_track_in_three() {
        let settings = MetronomeSettings {
            bpm: 90.0,
            beats: 7,
            beats_per_bar: 3,
        };
        let sequence = MetronomeSequence::layout(&settings).unwrap();
        let downbeats: Vec<f64> = sequence
            .click
            .notes
            .iter()
            .filter(|n| n.note_number == DOWNBEAT_NOTE)
            .map(|n| n.position)
            .collect();
        assert_eq!(downbeats, vec![0.0, 3.0, 6.0]);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let zero_bar = MetronomeSettings {
            beats_per_bar: 0,
            ..MetronomeSettings::default()
        };
        assert!(MetronomeSequence::layout(&zero_bar).is_err());

        let no_tempo = MetronomeSettings {
            bpm: -1.0,
            ..MetronomeSettings::default()
        };
        assert!(matches!(
            MetronomeSequence::layout(&no_tempo),
            Err(Error::InvalidParameter { name: "bpm", .. })
        ));
    }

    #[test]
    fn shaker_layout() {
        let shaker = ShakerSequence::layout(&ShakerSettings::default()).unwrap();

        assert_eq!(shaker.sound.notes.len(), 4);
        assert_eq!(shaker.sound.notes[0].note_number, 6);
        assert_eq!(shaker.sound.notes[0].duration, 0.4);
        assert!(shaker.sound.notes[1..].iter().all(|n| n.note_number == 10 && n.duration == 0.1));

        assert_eq!(shaker.callback.length, 4.0);
        let indices: Vec<u8> = shaker.callback.notes.iter().map(|n| n.note_number).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(shaker.callback.notes.iter().all(|n| n.velocity == 100));
    }

    #[test]
    fn notes_between_is_half_open() {
        let sequence = MetronomeSequence::layout(&MetronomeSettings::default()).unwrap();
        let positions: Vec<f64> = sequence.click.notes_between(2.0, 4.0).map(|n| n.position).collect();
        assert_eq!(positions, vec![2.0, 3.0]);
    }

    #[test]
    fn clock_follows_tempo() {
        let sequence = MetronomeSequence::layout(&MetronomeSettings::default()).unwrap();
        let clock = sequence.clock();
        assert_eq!(beat_duration(120.0), Duration::from_millis(500));

        let start = clock.position(Duration::ZERO).unwrap();
        assert_eq!(start.beat, 0);
        assert!(start.is_downbeat);

        let later = clock.position(Duration::from_millis(2750)).unwrap();
        assert_eq!(later.beat, 5);
        assert_eq!(later.beat_in_bar, 1);
        assert!(!later.is_downbeat);

        assert!(clock.is_finished(Duration::from_secs(20)));
        assert!(!clock.is_finished(Duration::from_millis(19_900)));
    }

    #[test]
    fn clock_downbeats_match_accents() {
        let settings = MetronomeSettings {
            bpm: 60.0,
            beats: 9,
            beats_per_bar: 3,
        };
        let sequence = MetronomeSequence::layout(&settings).unwrap();
        let clock = sequence.clock();

        for note in &sequence.click.notes {
            let at = Duration::from_secs_f64(note.position + 0.5);
            let position = clock.position(at).unwrap();
            assert_eq!(position.beat as f64, note.position);
            assert_eq!(position.is_downbeat, note.note_number == DOWNBEAT_NOTE);
        }
    }
}
