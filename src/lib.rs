//! Support library for the devco monitoring plugins
//!
//! Every binary in `src/bin` is a standalone Nagios or Cacti plugin: it
//! fetches a handful of values from one external system, compares them
//! against warning/critical thresholds, prints a single status line and
//! exits with the matching Nagios code. This crate holds the pieces they
//! share: the [`Status`] codes, threshold evaluation, output formatting,
//! a small STOMP client and the ActiveMQ statistics-map decoder.
//!
//! See the [`scripts`] module for a description of each plugin.

use std::fmt;
use std::process;
use std::str::FromStr;

pub mod amq;
pub mod output;
pub mod procfs;
pub mod scripts;
pub mod stomp;
pub mod thresholds;

/// The statuses that Nagios understands
///
/// Ordered by badness, so `std::cmp::max` picks the worse of two statuses.
/// `Unknown` sorts last: a check that could not fetch its data outranks any
/// verdict it could have reached.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    /// The exit code that monitoring systems parse
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    /// End the process, reporting `self` to the monitoring system
    pub fn exit(self) -> ! {
        process::exit(self.code())
    }

    /// The strings accepted by the `FromStr` impl
    pub fn str_values() -> [&'static str; 4] {
        ["ok", "warning", "critical", "unknown"]
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Monitoring UIs pattern-match on these exact words
        let name = match *self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Error for strings that don't name a status
#[derive(Debug, PartialEq, Eq)]
pub struct UnknownStatus(String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "'{}' is not a status, expected one of ok, warning, critical, unknown",
            self.0
        )
    }
}

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Status, UnknownStatus> {
        match s {
            "ok" => Ok(Status::Ok),
            "warn" | "warning" => Ok(Status::Warning),
            "critical" => Ok(Status::Critical),
            "unknown" => Ok(Status::Unknown),
            _ => Err(UnknownStatus(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Status;

    #[test]
    fn exit_codes_match_severities() {
        assert_eq!(Status::Ok.code(), 0);
        assert_eq!(Status::Warning.code(), 1);
        assert_eq!(Status::Critical.code(), 2);
        assert_eq!(Status::Unknown.code(), 3);
    }

    #[test]
    fn max_picks_the_worse_status() {
        use std::cmp::max;
        assert_eq!(max(Status::Ok, Status::Warning), Status::Warning);
        assert_eq!(max(Status::Critical, Status::Warning), Status::Critical);
        assert_eq!(max(Status::Unknown, Status::Critical), Status::Unknown);
    }

    #[test]
    fn display_matches_what_dashboards_grep_for() {
        assert_eq!(Status::Ok.to_string(), "OK");
        assert_eq!(Status::Warning.to_string(), "WARNING");
        assert_eq!(Status::Critical.to_string(), "CRITICAL");
        assert_eq!(Status::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn parses_the_lowercase_names() {
        assert_eq!("ok".parse(), Ok(Status::Ok));
        assert_eq!("warn".parse(), Ok(Status::Warning));
        assert_eq!("warning".parse(), Ok(Status::Warning));
        assert!("okay".parse::<Status>().is_err());
    }
}
