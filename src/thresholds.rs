//! Warning/critical threshold evaluation
//!
//! Every plugin compares a fetched value against a warning and a critical
//! bound. Most checks alert when the value climbs (queue depth, memory
//! percent, run age, failure counts); a few alert when it drops (seconds
//! until a certificate expires, node population minimums).

use std::fmt;

use crate::Status;

/// Which way badness lies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Larger values are worse (the common case)
    HighIsBad,
    /// Smaller values are worse
    LowIsBad,
}

/// A warning/critical bound pair with a badness direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPair {
    pub warn: f64,
    pub crit: f64,
    pub direction: Direction,
}

/// Error for bound pairs where warn is more extreme than crit
#[derive(Debug, PartialEq)]
pub struct InvalidThresholds {
    pub warn: f64,
    pub crit: f64,
    pub direction: Direction,
}

impl fmt::Display for InvalidThresholds {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.direction {
            Direction::HighIsBad => write!(
                f,
                "thresholds do not make sense: warn ({}) is greater than crit ({})",
                self.warn, self.crit
            ),
            Direction::LowIsBad => write!(
                f,
                "thresholds do not make sense: warn ({}) is less than crit ({})",
                self.warn, self.crit
            ),
        }
    }
}

impl ThresholdPair {
    /// Bounds for a check where larger values are worse
    pub fn high(warn: f64, crit: f64) -> ThresholdPair {
        ThresholdPair {
            warn,
            crit,
            direction: Direction::HighIsBad,
        }
    }

    /// Bounds for a check where smaller values are worse
    pub fn low(warn: f64, crit: f64) -> ThresholdPair {
        ThresholdPair {
            warn,
            crit,
            direction: Direction::LowIsBad,
        }
    }

    /// Reject pairs where the warning bound is more extreme than the
    /// critical one
    ///
    /// Callers that treat this as fatal report the error and exit
    /// `Status::Unknown` before fetching anything. Equal bounds pass: the
    /// critical test runs first, so an equal pair simply never warns.
    pub fn validate(&self) -> Result<(), InvalidThresholds> {
        let ok = match self.direction {
            Direction::HighIsBad => self.warn <= self.crit,
            Direction::LowIsBad => self.warn >= self.crit,
        };
        if ok {
            Ok(())
        } else {
            Err(InvalidThresholds {
                warn: self.warn,
                crit: self.crit,
                direction: self.direction,
            })
        }
    }

    /// Compare a value against the bounds
    ///
    /// Pure and total: the critical bound is tested first, then the warning
    /// bound, literally as declared, even for pairs `validate` would
    /// reject.
    pub fn evaluate(&self, value: f64) -> Status {
        match self.direction {
            Direction::HighIsBad => {
                if value >= self.crit {
                    Status::Critical
                } else if value >= self.warn {
                    Status::Warning
                } else {
                    Status::Ok
                }
            }
            Direction::LowIsBad => {
                if value <= self.crit {
                    Status::Critical
                } else if value < self.warn {
                    Status::Warning
                } else {
                    Status::Ok
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::ThresholdPair;
    use crate::Status;

    #[test]
    fn high_is_bad_ranges() {
        let pair = ThresholdPair::high(100.0, 500.0);
        assert_eq!(pair.evaluate(50.0), Status::Ok);
        assert_eq!(pair.evaluate(99.9), Status::Ok);
        assert_eq!(pair.evaluate(100.0), Status::Warning);
        assert_eq!(pair.evaluate(499.9), Status::Warning);
        assert_eq!(pair.evaluate(500.0), Status::Critical);
        assert_eq!(pair.evaluate(600.0), Status::Critical);
    }

    #[test]
    fn low_is_bad_ranges() {
        let pair = ThresholdPair::low(604800.0, 86400.0);
        assert_eq!(pair.evaluate(1_000_000.0), Status::Ok);
        assert_eq!(pair.evaluate(604800.0), Status::Ok);
        assert_eq!(pair.evaluate(604799.0), Status::Warning);
        assert_eq!(pair.evaluate(86401.0), Status::Warning);
        assert_eq!(pair.evaluate(86400.0), Status::Critical);
        assert_eq!(pair.evaluate(0.0), Status::Critical);
    }

    #[test]
    fn misconfigured_bounds_apply_crit_first() {
        // crit below warn: anything at or above 10 is critical, the
        // warning bound never fires
        let pair = ThresholdPair::high(50.0, 10.0);
        assert_eq!(pair.evaluate(60.0), Status::Critical);
        assert_eq!(pair.evaluate(20.0), Status::Critical);
        assert_eq!(pair.evaluate(5.0), Status::Ok);
    }

    #[test]
    fn equal_bounds_never_warn() {
        let pair = ThresholdPair::high(10.0, 10.0);
        assert_eq!(pair.evaluate(10.0), Status::Critical);
        assert_eq!(pair.evaluate(9.0), Status::Ok);
        assert!(pair.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_pairs() {
        assert!(ThresholdPair::high(90.0, 80.0).validate().is_err());
        assert!(ThresholdPair::high(80.0, 90.0).validate().is_ok());
        assert!(ThresholdPair::low(80.0, 90.0).validate().is_err());
        assert!(ThresholdPair::low(90.0, 80.0).validate().is_ok());
    }

    #[test]
    fn validation_errors_name_both_bounds() {
        let err = ThresholdPair::high(90.0, 80.0).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "thresholds do not make sense: warn (90) is greater than crit (80)"
        );
    }
}
