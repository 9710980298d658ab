//! Assemble the one-line plugin output
//!
//! Checks that look at more than one metric evaluate each independently,
//! then report the worst status while keeping every metric's verdict in
//! the message, so operators can see all contributing values no matter
//! which one tripped the alert. The rendered shape is
//! `LEVEL: message, message|name=value name=value`, with the perfdata
//! suffix left off entirely when there is nothing to graph.

use std::fmt;

use itertools::Itertools;

use crate::Status;

/// One `name=value` token for the graphing system
#[derive(Debug, Clone, PartialEq)]
pub struct PerfDatum {
    name: String,
    value: String,
    bounds: Option<(f64, f64, f64)>,
}

/// Render a float the way the messages do: no decimals for round values
fn fmt_value(v: f64) -> String {
    format!("{:.*}", if v.round() == v { 0 } else { 2 }, v)
}

impl PerfDatum {
    pub fn new(name: &str, value: f64) -> PerfDatum {
        PerfDatum {
            name: name.to_owned(),
            value: fmt_value(value),
            bounds: None,
        }
    }

    /// A token with a fixed number of decimal places, for series where
    /// consumers expect them (e.g. `seconds=0.130000`)
    pub fn fixed(name: &str, value: f64, decimals: usize) -> PerfDatum {
        PerfDatum {
            name: name.to_owned(),
            value: format!("{:.*}", decimals, value),
            bounds: None,
        }
    }

    /// Attach `;warn;crit;min` so the grapher can draw the bounds
    pub fn with_bounds(mut self, warn: f64, crit: f64, min: f64) -> PerfDatum {
        self.bounds = Some((warn, crit, min));
        self
    }
}

impl fmt::Display for PerfDatum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some((warn, crit, min)) = self.bounds {
            write!(
                f,
                ";{};{};{}",
                fmt_value(warn),
                fmt_value(crit),
                fmt_value(min)
            )?;
        }
        Ok(())
    }
}

/// The aggregate result of one invocation
#[derive(Debug, Default)]
pub struct Report {
    results: Vec<(Status, String)>,
    perf: Vec<PerfDatum>,
}

impl Report {
    pub fn new() -> Report {
        Report::default()
    }

    /// Record one metric's verdict and message
    pub fn add<S: Into<String>>(&mut self, status: Status, message: S) {
        self.results.push((status, message.into()));
    }

    pub fn add_perf(&mut self, datum: PerfDatum) {
        self.perf.push(datum);
    }

    /// The worst status recorded so far, `Ok` when nothing was recorded
    pub fn overall(&self) -> Status {
        self.results
            .iter()
            .map(|&(status, _)| status)
            .max()
            .unwrap_or(Status::Ok)
    }

    /// The formatted status line
    pub fn render(&self) -> String {
        let mut line = format!(
            "{}: {}",
            self.overall(),
            self.results.iter().map(|(_, msg)| msg.as_str()).join(", ")
        );
        if !self.perf.is_empty() {
            line.push('|');
            line.push_str(&self.perf.iter().join(" "));
        }
        line
    }

    /// Print the status line and exit with the overall status
    pub fn finish(self) -> ! {
        println!("{}", self.render());
        self.overall().exit()
    }
}

#[cfg(test)]
mod test {
    use super::{PerfDatum, Report};
    use crate::Status;

    #[test]
    fn overall_is_the_worst_metric() {
        let mut report = Report::new();
        report.add(Status::Ok, "queue a ok");
        report.add(Status::Critical, "queue b full");
        report.add(Status::Warning, "memory high");
        assert_eq!(report.overall(), Status::Critical);
    }

    #[test]
    fn empty_report_is_ok() {
        assert_eq!(Report::new().overall(), Status::Ok);
    }

    #[test]
    fn every_message_survives_aggregation() {
        let mut report = Report::new();
        report.add(Status::Ok, "foo.bar has 50 messages");
        report.add(Status::Critical, "95% of broker memory used (>= 75%)");
        let line = report.render();
        assert!(line.starts_with("CRITICAL: "));
        assert!(line.contains("foo.bar has 50 messages"));
        assert!(line.contains("95% of broker memory used (>= 75%)"));
    }

    #[test]
    fn perfdata_suffix_only_when_present() {
        let mut report = Report::new();
        report.add(Status::Ok, "all quiet");
        assert_eq!(report.render(), "OK: all quiet");

        report.add_perf(PerfDatum::new("size", 600.0));
        report.add_perf(PerfDatum::new("memory_pct", 42.5));
        assert_eq!(report.render(), "OK: all quiet|size=600 memory_pct=42.50");
    }

    #[test]
    fn perfdatum_bounds_render_as_semicolon_fields() {
        let datum = PerfDatum::new("files", 12.0).with_bounds(100.0, 500.0, 0.0);
        assert_eq!(datum.to_string(), "files=12;100;500;0");
    }

    #[test]
    fn fixed_decimals_for_latency_series() {
        let datum = PerfDatum::fixed("seconds", 0.13, 6);
        assert_eq!(datum.to_string(), "seconds=0.130000");
    }
}
