//! # PitchTap - Pitch Practice GUI
//!
//! Listens to the microphone, shows the detected pitch and amplitude, and
//! checks whether the user can sing or play a randomly chosen note. A
//! visual metronome helps with rhythm practice.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application
//! - **Audio Thread**: Capture and pitch tracking
//! - **Communication**: Crossbeam channels carry pitch readings to the GUI,
//!   which feeds them to the match evaluator on every tick

mod ui;

use crossbeam_channel::{Receiver, Sender};
use cpal::traits::StreamTrait;
use iced::{Element, Subscription, Theme};
use pitchtap_core::config::{AnalysisConfig, PitchTapConfig};
use pitchtap_core::metronome::{BeatClock, BeatPosition, DOWNBEAT_NOTE, MetronomeSequence};
use pitchtap_core::pitch::PitchTracker;
use pitchtap_core::tuning::{self, PracticeTarget};
use pitchtap_core::{MatchResult, PitchMatchEvaluator, PitchSample, audio};
use std::collections::VecDeque;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use ui::main_display::create_main_view;

const CONFIG_PATH: &str = "pitchtap.json";
/// Number of evaluator diagnostic lines kept on screen.
const DIAGNOSTIC_LINES: usize = 8;

pub fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("[MAIN] Starting PitchTap...");
    let result = iced::application("PitchTap", PitchTapApp::update, PitchTapApp::view)
        .subscription(PitchTapApp::subscription)
        .theme(PitchTapApp::theme)
        .run();
    tracing::info!("[MAIN] Application finished with result: {:?}", result);
    result
}

#[derive(Debug, Clone)]
pub enum Message {
    /// Pick a random target note and start listening for it.
    CheckNote,
    /// Stop listening without a result.
    CancelCheck,
    ToggleMetronome,
    Tick,
}

/// Text shown after a check completes.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Listening,
    Passed { checked: f32 },
    Missed { checked: f32 },
    AutoFail,
}

impl From<MatchResult> for CheckOutcome {
    fn from(result: MatchResult) -> Self {
        if result.auto_fail {
            CheckOutcome::AutoFail
        } else if result.passed {
            CheckOutcome::Passed { checked: result.checked_value }
        } else {
            CheckOutcome::Missed { checked: result.checked_value }
        }
    }
}

/// Data the view needs for rendering.
#[derive(Debug, Clone, Default)]
pub struct AppDisplayData {
    /// Cleared when the audio thread exits, e.g. no input device was found.
    pub audio_worker_active: bool,
    pub last_sample: Option<PitchSample>,
    pub target: Option<PracticeTarget>,
    pub outcome: Option<CheckOutcome>,
    pub metronome_beat: Option<BeatPosition>,
    pub diagnostics: VecDeque<String>,
}

struct RunningMetronome {
    sequence: MetronomeSequence,
    clock: BeatClock,
    started: Instant,
    last_beat: Option<u32>,
}

struct PitchTapApp {
    config: PitchTapConfig,
    audio_worker: Option<AudioWorker>,
    sample_receiver: Receiver<PitchSample>,
    evaluator: PitchMatchEvaluator,
    diagnostics_receiver: Receiver<String>,
    metronome: Option<RunningMetronome>,
    display_data: AppDisplayData,
}

/// Handle to the audio thread so it can be shut down.
struct AudioWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Default for PitchTapApp {
    fn default() -> Self {
        let config = PitchTapConfig::load_or_default(CONFIG_PATH).unwrap_or_else(|e| {
            tracing::warn!("[MAIN] Ignoring {}: {}", CONFIG_PATH, e);
            PitchTapConfig::default()
        });

        let (sample_tx, sample_rx) = crossbeam_channel::unbounded();
        let (diag_tx, diag_rx) = crossbeam_channel::unbounded::<String>();
        let evaluator = PitchMatchEvaluator::new(config.matching.clone()).with_diagnostics(move |line| {
            let _ = diag_tx.send(line.to_string());
        });

        let audio_worker = AudioWorker::spawn(config.analysis.clone(), sample_tx);

        Self {
            config,
            audio_worker: Some(audio_worker),
            sample_receiver: sample_rx,
            evaluator,
            diagnostics_receiver: diag_rx,
            metronome: None,
            display_data: AppDisplayData {
                audio_worker_active: true,
                ..AppDisplayData::default()
            },
        }
    }
}

impl Drop for PitchTapApp {
    fn drop(&mut self) {
        if let Some(worker) = self.audio_worker.take() {
            worker.shutdown();
        }
    }
}

impl AudioWorker {
    /// Spawns the capture and analysis thread.
    fn spawn(analysis: AnalysisConfig, sample_tx: Sender<PitchSample>) -> Self {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let thread_handle = thread::spawn(move || {
            if let Err(e) = run_audio_thread(analysis, sample_tx, shutdown_rx) {
                tracing::error!("[AUDIO-THREAD] Fatal error: {:#}", e);
            }
            tracing::info!("[AUDIO-THREAD] Audio thread finished");
        });
        Self {
            shutdown_tx,
            thread_handle: Some(thread_handle),
        }
    }

    fn is_running(&self) -> bool {
        self.thread_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn shutdown(mut self) {
        tracing::info!("[MAIN] Shutting down audio worker...");
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::error!("[MAIN] Audio thread panicked");
            }
        }
    }
}

fn run_audio_thread(
    analysis: AnalysisConfig,
    sample_tx: Sender<PitchSample>,
    shutdown_rx: Receiver<()>,
) -> anyhow::Result<()> {
    let (raw_audio_tx, raw_audio_rx) = crossbeam_channel::bounded::<Vec<f32>>(16);
    let (stream, sample_rate) =
        audio::start_audio_capture(raw_audio_tx, analysis.frame_size, analysis.preferred_sample_rate)?;
    tracing::info!("[AUDIO-THREAD] Audio capture started at {} Hz", sample_rate);

    let mut tracker = PitchTracker::new(sample_rate, analysis.frame_size);

    loop {
        crossbeam_channel::select! {
            recv(raw_audio_rx) -> msg => match msg {
                Ok(frame) => {
                    if let Some(sample) = tracker.process(&frame) {
                        if sample_tx.send(sample).is_err() {
                            tracing::warn!("[AUDIO-THREAD] GUI went away");
                            break;
                        }
                    }
                }
                Err(_) => {
                    tracing::warn!("[AUDIO-THREAD] Audio channel closed");
                    break;
                }
            },
            recv(shutdown_rx) -> _ => {
                tracing::info!("[AUDIO-THREAD] Received shutdown signal");
                break;
            },
        }
    }

    stream.pause()?;
    Ok(())
}

impl PitchTapApp {
    fn update(&mut self, message: Message) {
        match message {
            Message::CheckNote => {
                let target = tuning::random_practice_target(&mut rand::thread_rng());
                tracing::info!("[MAIN] Listening for {} ({} Hz)", target.name, target.frequency);
                self.evaluator.begin_listening(target.frequency);
                self.display_data.target = Some(target);
                self.display_data.outcome = Some(CheckOutcome::Listening);
            }
            Message::CancelCheck => {
                self.evaluator.cancel();
                self.display_data.outcome = None;
            }
            Message::ToggleMetronome => self.toggle_metronome(),
            Message::Tick => {
                let samples: Vec<PitchSample> = self.sample_receiver.try_iter().collect();
                for sample in samples {
                    self.process_sample(sample);
                }
                self.drain_diagnostics();
                self.advance_metronome();
                self.check_audio_worker();
            }
        }
    }

    fn check_audio_worker(&mut self) {
        if !self.display_data.audio_worker_active {
            return;
        }
        if self.audio_worker.as_ref().is_some_and(AudioWorker::is_running) {
            return;
        }
        tracing::warn!("[MAIN] Audio worker stopped, no audio input");
        self.display_data.audio_worker_active = false;
    }

    fn process_sample(&mut self, sample: PitchSample) {
        self.display_data.last_sample = Some(sample);
        if let Some(result) = self.evaluator.observe(sample) {
            tracing::info!(
                "[MAIN] Check finished: passed={} auto_fail={} checked={:.2} target={:.2}",
                result.passed, result.auto_fail, result.checked_value, result.target_value
            );
            self.display_data.outcome = Some(result.into());
        }
    }

    fn drain_diagnostics(&mut self) {
        let lines = &mut self.display_data.diagnostics;
        for line in self.diagnostics_receiver.try_iter() {
            lines.push_back(line);
            if lines.len() > DIAGNOSTIC_LINES {
                lines.pop_front();
            }
        }
    }

    fn toggle_metronome(&mut self) {
        if self.metronome.take().is_some() {
            tracing::info!("[METRONOME] Stopped");
            self.display_data.metronome_beat = None;
            return;
        }
        match MetronomeSequence::layout(&self.config.metronome) {
            Ok(sequence) => {
                let clock = sequence.clock();
                tracing::info!("[METRONOME] Started at {} BPM", sequence.bpm);
                self.metronome = Some(RunningMetronome {
                    sequence,
                    clock,
                    started: Instant::now(),
                    last_beat: None,
                });
            }
            Err(e) => tracing::error!("[METRONOME] Cannot start: {}", e),
        }
    }

    fn advance_metronome(&mut self) {
        let Some(running) = self.metronome.as_mut() else {
            return;
        };
        let Some(position) = running.clock.position(running.started.elapsed()) else {
            tracing::info!("[METRONOME] Sequence finished");
            self.metronome = None;
            self.display_data.metronome_beat = None;
            return;
        };

        if running.last_beat != Some(position.beat) {
            let from = running.last_beat.map_or(0.0, |b| f64::from(b + 1));
            for note in running.sequence.click.notes_between(from, f64::from(position.beat) + 1.0) {
                let accent = if note.note_number == DOWNBEAT_NOTE { "accent" } else { "beat" };
                tracing::debug!("[METRONOME] {} at beat {}", accent, note.position);
            }
            running.last_beat = Some(position.beat);
        }
        self.display_data.metronome_beat = Some(position);
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data, self.metronome.is_some())
    }

    /// Ticks at ~60 FPS to drain readings and move the metronome.
    fn subscription(&self) -> Subscription<Message> {
        iced::time::every(Duration::from_millis(16)).map(|_| Message::Tick)
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_reports_exit() {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let worker = AudioWorker {
            shutdown_tx,
            thread_handle: Some(thread::spawn(move || {
                let _ = shutdown_rx.recv();
            })),
        };
        assert!(worker.is_running());

        let _ = worker.shutdown_tx.send(());
        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!worker.is_running());
        worker.shutdown();
    }

    #[test]
    fn outcome_from_result() {
        let base = MatchResult {
            passed: true,
            auto_fail: false,
            checked_value: 441.0,
            target_value: 440.0,
        };
        assert_eq!(CheckOutcome::from(base), CheckOutcome::Passed { checked: 441.0 });
        assert_eq!(
            CheckOutcome::from(MatchResult { passed: false, ..base }),
            CheckOutcome::Missed { checked: 441.0 }
        );
        assert_eq!(
            CheckOutcome::from(MatchResult { passed: false, auto_fail: true, ..base }),
            CheckOutcome::AutoFail
        );
    }
}
