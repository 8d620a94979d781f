//! # Statistics Module
//!
//! Small numeric helpers used when reducing a burst of noisy pitch
//! readings to a single value.
//!
//! ## Features
//! - Mean, sample standard deviation and median
//! - Percent-band outlier removal around a target frequency
//! - Quartile (Tukey fence) outlier removal as an alternative strategy

/// Q1, Q2 (median) and Q3 of a sorted sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    pub q1: f32,
    pub q2: f32,
    pub q3: f32,
}

impl Quartiles {
    /// Interquartile range, `Q3 - Q1`.
    pub fn iqr(&self) -> f32 {
        self.q3 - self.q1
    }
}

/// Inclusive `[lower, upper]` interval of `target ± tolerance·target`.
///
/// The filter and the pass/fail check share this one band so a reading
/// kept by one is never rejected by the other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceBand {
    pub lower: f32,
    pub upper: f32,
}

impl ToleranceBand {
    pub fn around(target: f32, tolerance: f32) -> Self {
        let offset = target * tolerance;
        Self {
            lower: target - offset,
            upper: target + offset,
        }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Multiplier applied to the IQR to place the outlier fences.
pub const IQR_FENCE_FACTOR: f32 = 1.5;

/// Arithmetic mean, or `None` for an empty slice.
///
/// Accumulates in `f64`, so the mean of values inside a closed `f32`
/// interval never rounds outside it.
pub fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().map(|&v| f64::from(v)).sum();
    Some((sum / values.len() as f64) as f32)
}

/// Sample standard deviation (`n - 1` denominator).
///
/// Returns `None` when fewer than two values are given.
pub fn std_dev(values: &[f32]) -> Option<f32> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance = values
        .iter()
        .map(|v| (v - avg) * (v - avg))
        .sum::<f32>()
        / (values.len() - 1) as f32;
    Some(variance.sqrt())
}

/// Median of the values. Even-length input averages the two middle elements.
pub fn median(values: &[f32]) -> Option<f32> {
    let sorted = sorted_copy(values);
    median_of_sorted(&sorted).map(|(_, _, m)| m)
}

/// Keeps only the values inside the tolerance band around a target.
///
/// This is the filter the evaluator uses before averaging a batch.
///
/// # Arguments
/// * `values` - Raw frequency readings in Hz, in any order
/// * `target` - Target frequency in Hz
/// * `tolerance` - Relative half-width of the band (0.025 = ±2.5%)
///
/// # Returns
/// * `Some(kept)` - Readings inside the inclusive band, sorted ascending
/// * `None` - No reading was anywhere near the target
pub fn remove_outliers_in_band(values: &[f32], target: f32, tolerance: f32) -> Option<Vec<f32>> {
    let band = ToleranceBand::around(target, tolerance);

    let kept: Vec<f32> = sorted_copy(values)
        .into_iter()
        .filter(|v| band.contains(*v))
        .collect();

    if kept.is_empty() { None } else { Some(kept) }
}

/// Computes quartiles of an ascending slice using the median-of-halves method.
///
/// The lower half is everything below the median position and the upper half
/// everything above it, so for odd lengths the median element belongs to
/// neither. Needs at least two values.
pub fn quartiles(sorted: &[f32]) -> Option<Quartiles> {
    if sorted.len() < 2 {
        return None;
    }
    let (lo, hi, q2) = median_of_sorted(sorted)?;
    let (_, _, q1) = median_of_sorted(&sorted[..hi])?;
    let (_, _, q3) = median_of_sorted(&sorted[lo + 1..])?;
    Some(Quartiles { q1, q2, q3 })
}

/// Removes values outside the Tukey fences `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]`.
///
/// Output is sorted ascending. Inputs too short to have quartiles are
/// returned sorted and otherwise untouched.
pub fn remove_outliers_with_quartiles(values: &[f32]) -> Vec<f32> {
    let sorted = sorted_copy(values);
    let Some(q) = quartiles(&sorted) else {
        return sorted;
    };

    let below = q.q1 - IQR_FENCE_FACTOR * q.iqr();
    let above = q.q3 + IQR_FENCE_FACTOR * q.iqr();
    tracing::trace!(
        "quartiles q1={} q2={} q3={} fences=[{}, {}]",
        q.q1, q.q2, q.q3, below, above
    );

    sorted
        .into_iter()
        .filter(|v| *v >= below && *v <= above)
        .collect()
}

fn sorted_copy(values: &[f32]) -> Vec<f32> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    sorted
}

/// Returns the two middle indices and the median of a sorted slice.
/// Both indices are equal for odd lengths.
fn median_of_sorted(sorted: &[f32]) -> Option<(usize, usize, f32)> {
    if sorted.is_empty() {
        return None;
    }
    let lo = (sorted.len() - 1) / 2;
    let hi = sorted.len() / 2;
    Some((lo, hi, (sorted[lo] + sorted[hi]) / 2.0))
}
