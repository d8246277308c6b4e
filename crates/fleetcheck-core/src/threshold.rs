//! Tri-state classification of a numeric observation.
//!
//! A `Threshold` pairs a warning and an error level with the direction in
//! which the observation goes bad. Comparisons are strict: a value equal
//! to a threshold does not trigger that threshold's level.

use serde::{Deserialize, Serialize};

use crate::types::Level;

/// Direction in which an observation becomes unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Too high / too many: triggers when `value > threshold`.
    Above,
    /// Too low / too few: triggers when `value < threshold`.
    Below,
}

impl Comparison {
    pub fn exceeds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Above => value > threshold,
            Comparison::Below => value < threshold,
        }
    }
}

/// A warning and an error level for one observed value. `comparison`
/// decides which side of each level is the bad one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub warning: f64,
    pub error: f64,
    pub comparison: Comparison,
}

impl Threshold {
    pub fn new(warning: f64, error: f64, comparison: Comparison) -> Self {
        Self {
            warning,
            error,
            comparison,
        }
    }

    pub fn classify(&self, value: f64) -> Level {
        classify(value, self)
    }
}

/// Error if the error threshold is crossed, else Warning if the warning
/// threshold is crossed, else Ok.
pub fn classify(value: f64, threshold: &Threshold) -> Level {
    if threshold.comparison.exceeds(value, threshold.error) {
        Level::Error
    } else if threshold.comparison.exceeds(value, threshold.warning) {
        Level::Warning
    } else {
        Level::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn above_classifies_each_level() {
        let t = Threshold::new(10.0, 20.0, Comparison::Above);
        assert_eq!(t.classify(5.0), Level::Ok);
        assert_eq!(t.classify(15.0), Level::Warning);
        assert_eq!(t.classify(25.0), Level::Error);
    }

    #[test]
    fn below_classifies_each_level() {
        let t = Threshold::new(7.0, 6.0, Comparison::Below);
        assert_eq!(t.classify(9.0), Level::Ok);
        assert_eq!(t.classify(6.5), Level::Warning);
        assert_eq!(t.classify(3.0), Level::Error);
    }

    #[test]
    fn equal_to_threshold_does_not_trigger_it() {
        let above = Threshold::new(10.0, 20.0, Comparison::Above);
        assert_eq!(above.classify(10.0), Level::Ok);
        assert_eq!(above.classify(20.0), Level::Warning);

        let below = Threshold::new(7.0, 6.0, Comparison::Below);
        assert_eq!(below.classify(7.0), Level::Ok);
        assert_eq!(below.classify(6.0), Level::Warning);
    }

    #[test]
    fn value_on_error_just_above_warning_is_warning() {
        let warning = 10.0;
        let error = warning + f64::EPSILON * 16.0;
        let t = Threshold::new(warning, error, Comparison::Above);
        assert_eq!(t.classify(error), Level::Warning);
    }

    #[test]
    fn error_takes_precedence_over_warning() {
        // Misordered thresholds still report the worse level first.
        let t = Threshold::new(30.0, 20.0, Comparison::Above);
        assert_eq!(t.classify(25.0), Level::Error);
    }
}
