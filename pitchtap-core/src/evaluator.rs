//! # Pitch Match Evaluator
//!
//! Decides, from a short burst of noisy pitch readings, whether the performer
//! produced a note matching a target frequency within tolerance.
//!
//! A listening session starts with [`PitchMatchEvaluator::begin_listening`].
//! Valid readings are buffered by [`PitchMatchEvaluator::observe`] until the
//! batch is full, at which point the batch is filtered, averaged and compared
//! against the target exactly once. The evaluator then goes idle until the
//! next session.

use std::fmt;

use crate::config::{MatchConfig, OutlierStrategy};
pub use crate::stats::ToleranceBand;
use crate::{stats, PitchSample};

/// Whether the evaluator is accepting readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenState {
    #[default]
    Idle,
    Collecting,
}

/// Outcome of evaluating one full batch of readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// The averaged reading fell inside the tolerance band.
    pub passed: bool,
    /// No reading in the batch was near the target; nothing was averaged.
    pub auto_fail: bool,
    /// Mean of the readings that survived filtering (0.0 on auto-fail).
    pub checked_value: f32,
    /// The session target.
    pub target_value: f32,
}

impl MatchResult {
    fn auto_fail(target: f32) -> Self {
        Self {
            passed: false,
            auto_fail: true,
            checked_value: 0.0,
            target_value: target,
        }
    }
}

type DiagnosticSink = Box<dyn FnMut(&str) + Send>;

/// Collects pitch readings for one target at a time and judges them.
pub struct PitchMatchEvaluator {
    config: MatchConfig,
    state: ListenState,
    target: f32,
    buffer: Vec<f32>,
    diagnostics: Option<DiagnosticSink>,
}

impl fmt::Debug for PitchMatchEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PitchMatchEvaluator")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("target", &self.target)
            .field("buffer", &self.buffer)
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}

impl Default for PitchMatchEvaluator {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}

impl PitchMatchEvaluator {
    pub fn new(config: MatchConfig) -> Self {
        let capacity = config.batch_size;
        Self {
            config,
            state: ListenState::Idle,
            target: 0.0,
            buffer: Vec::with_capacity(capacity),
            diagnostics: None,
        }
    }

    /// Attaches a sink that receives a human-readable line at each decision point.
    pub fn with_diagnostics(mut self, sink: impl FnMut(&str) + Send + 'static) -> Self {
        self.set_diagnostics(sink);
        self
    }

    pub fn set_diagnostics(&mut self, sink: impl FnMut(&str) + Send + 'static) {
        self.diagnostics = Some(Box::new(sink));
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn state(&self) -> ListenState {
        self.state
    }

    /// Target of the current or most recent session.
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Readings collected so far in the current batch.
    pub fn buffered(&self) -> &[f32] {
        &self.buffer
    }

    /// Starts a new session, discarding anything collected so far.
    ///
    /// # Arguments
    /// * `target` - Frequency in Hz the performer is asked to produce. A
    ///   non-positive target is accepted but logged, and its batch auto-fails.
    pub fn begin_listening(&mut self, target: f32) {
        if !(target.is_finite() && target > 0.0) {
            tracing::warn!("[MATCH] Listening for non-positive target {}", target);
        }
        self.state = ListenState::Collecting;
        self.target = target;
        self.buffer.clear();
        self.emit(format_args!("Need frequency: {}", target));
    }

    /// Abandons the current session without producing a result.
    pub fn cancel(&mut self) {
        self.state = ListenState::Idle;
        self.buffer.clear();
    }

    /// Feeds one reading to the evaluator.
    ///
    /// # Arguments
    /// * `sample` - Detected frequency and amplitude. Ignored unless a session
    ///   is active and the amplitude meets the configured gate.
    ///
    /// # Returns
    /// * `Some(result)` - This reading completed the batch; the session is now idle
    /// * `None` - Still collecting, idle, or the reading was too quiet
    pub fn observe(&mut self, sample: PitchSample) -> Option<MatchResult> {
        if self.state != ListenState::Collecting {
            return None;
        }
        if !(sample.amplitude >= self.config.amplitude_gate) {
            return None;
        }

        let target = self.target;
        self.emit(format_args!("Pitch: {} | Needed: {}", sample.frequency, target));
        self.buffer.push(sample.frequency);

        if self.buffer.len() < self.config.batch_size {
            return None;
        }

        self.state = ListenState::Idle;
        let batch = std::mem::take(&mut self.buffer);
        let result = self.evaluate(&batch);
        // Reuse the allocation for the next session.
        self.buffer = batch;
        self.buffer.clear();
        Some(result)
    }

    fn evaluate(&mut self, batch: &[f32]) -> MatchResult {
        let target = self.target;
        let tolerance = self.config.tolerance;

        let kept = match self.config.outlier_strategy {
            OutlierStrategy::PercentBand => {
                let band = ToleranceBand::around(target, tolerance);
                self.emit(format_args!("LB: {} | UB: {}", band.lower, band.upper));
                stats::remove_outliers_in_band(batch, target, tolerance)
            }
            OutlierStrategy::Quartiles => {
                let kept = stats::remove_outliers_with_quartiles(batch);
                if kept.is_empty() { None } else { Some(kept) }
            }
        };
        self.emit(format_args!("Before: {:?}", batch));
        self.emit(format_args!("After: {:?}", kept.as_deref().unwrap_or(&[])));

        let Some(checked) = kept.as_deref().and_then(stats::mean) else {
            self.emit(format_args!("AutoFail"));
            return MatchResult::auto_fail(target);
        };

        // Same band as the filter, so a batch that survived filtering
        // whole can only fail through the quartile strategy.
        let band = ToleranceBand::around(target, tolerance);
        let passed = band.contains(checked);
        if passed {
            self.emit(format_args!(
                "Passed. Checked: {} | LB: {} | UB: {} | Target: {}",
                checked, band.lower, band.upper, target
            ));
        } else {
            self.emit(format_args!("Did not pass: {}", checked));
        }

        MatchResult {
            passed,
            auto_fail: false,
            checked_value: checked,
            target_value: target,
        }
    }

    fn emit(&mut self, message: fmt::Arguments<'_>) {
        tracing::debug!("[MATCH] {}", message);
        if let Some(sink) = self.diagnostics.as_mut() {
            sink(&message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn loud(frequency: f32) -> PitchSample {
        PitchSample::new(frequency, 0.8)
    }

    #[test]
    fn band_for_a4() {
        let band = ToleranceBand::around(440.0, 0.025);
        approx::assert_relative_eq!(band.lower, 429.0, epsilon = 1e-3);
        approx::assert_relative_eq!(band.upper, 451.0, epsilon = 1e-3);
        approx::assert_relative_eq!(band.lower, 440.0 * 0.975, epsilon = 1e-3);
        approx::assert_relative_eq!(band.upper, 440.0 * 1.025, epsilon = 1e-3);
    }

    #[test]
    fn batch_on_band_edges_passes() {
        for target in [50.37f32, 50.74, 261.63, 440.0, 1999.9] {
            let band = ToleranceBand::around(target, 0.025);
            for edge in [band.lower, band.upper] {
                let mut evaluator = PitchMatchEvaluator::default();
                evaluator.begin_listening(target);
                evaluator.observe(loud(edge));
                evaluator.observe(loud(edge));
                let result = evaluator.observe(loud(edge)).unwrap();
                assert!(result.passed, "edge {edge} of {target} failed: {result:?}");
                assert!(!result.auto_fail);
            }
        }
    }

    #[test]
    fn mixed_edges_pass() {
        let band = ToleranceBand::around(50.37, 0.025);
        let mut evaluator = PitchMatchEvaluator::default();
        evaluator.begin_listening(50.37);
        evaluator.observe(loud(band.lower));
        evaluator.observe(loud(band.upper));
        let result = evaluator.observe(loud(band.upper)).unwrap();
        assert!(result.passed);
    }

    #[test]
    fn starts_idle() {
        let evaluator = PitchMatchEvaluator::default();
        assert_eq!(evaluator.state(), ListenState::Idle);
        assert!(evaluator.buffered().is_empty());
    }

    #[test]
    fn collects_until_batch_is_full() {
        let mut evaluator = PitchMatchEvaluator::default();
        evaluator.begin_listening(440.0);
        assert_eq!(evaluator.observe(loud(440.0)), None);
        assert_eq!(evaluator.observe(loud(445.0)), None);
        assert_eq!(evaluator.buffered(), &[440.0, 445.0]);

        let result = evaluator.observe(loud(450.0)).unwrap();
        assert!(result.passed);
        assert!(!result.auto_fail);
        approx::assert_relative_eq!(result.checked_value, 445.0, epsilon = 1e-3);
        assert_eq!(result.target_value, 440.0);
    }

    #[test]
    fn outlier_is_ignored_in_average() {
        let mut evaluator = PitchMatchEvaluator::default();
        evaluator.begin_listening(440.0);
        evaluator.observe(loud(880.0));
        evaluator.observe(loud(441.0));
        let result = evaluator.observe(loud(443.0)).unwrap();
        assert!(result.passed);
        approx::assert_relative_eq!(result.checked_value, 442.0, epsilon = 1e-3);
    }

    #[test]
    fn cancel_discards_session() {
        let mut evaluator = PitchMatchEvaluator::default();
        evaluator.begin_listening(440.0);
        evaluator.observe(loud(440.0));
        evaluator.cancel();
        assert_eq!(evaluator.state(), ListenState::Idle);
        assert!(evaluator.buffered().is_empty());
        assert_eq!(evaluator.observe(loud(440.0)), None);
    }

    #[test]
    fn quartile_strategy_can_fail_without_auto_fail() {
        let config = MatchConfig {
            outlier_strategy: OutlierStrategy::Quartiles,
            ..MatchConfig::default()
        };
        let mut evaluator = PitchMatchEvaluator::new(config);
        evaluator.begin_listening(440.0);
        evaluator.observe(loud(300.0));
        evaluator.observe(loud(301.0));
        let result = evaluator.observe(loud(302.0)).unwrap();
        assert!(!result.passed);
        assert!(!result.auto_fail);
        approx::assert_relative_eq!(result.checked_value, 301.0, epsilon = 1e-3);
    }

    #[test]
    fn diagnostics_receive_decision_points() {
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&lines);
        let mut evaluator = PitchMatchEvaluator::default()
            .with_diagnostics(move |line| sink.lock().unwrap().push(line.to_string()));

        evaluator.begin_listening(440.0);
        for _ in 0..3 {
            evaluator.observe(loud(100.0));
        }

        let lines = lines.lock().unwrap();
        assert_eq!(lines.first().map(String::as_str), Some("Need frequency: 440"));
        assert!(lines.iter().any(|l| l.starts_with("LB: ")));
        assert!(lines.iter().any(|l| l == "Before: [100.0, 100.0, 100.0]"));
        assert!(lines.iter().any(|l| l == "After: []"));
        assert_eq!(lines.last().map(String::as_str), Some("AutoFail"));
    }
}
