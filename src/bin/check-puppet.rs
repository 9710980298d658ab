//! Check the local Puppet agent's last run
//!
//! Meant to run as root, e.g. under NRPE. The run summary YAML tells us
//! when Puppet last ran and how many resources failed; the state file's
//! mtime is the fallback clock for agents too old to write a summary, and
//! the lock file tells us whether the agent is disabled.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use structopt::StructOpt;

use devco_plugins::output::{PerfDatum, Report};
use devco_plugins::thresholds::ThresholdPair;
use devco_plugins::Status;

/// Check when Puppet last ran and how many resources failed.
///
/// A run summary that never got as far as recording events means the run
/// itself fell over (missing dependencies, catalog compilation failure);
/// that is always critical, whatever the thresholds say.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-puppet (part of devco-plugins)")]
struct Args {
    #[structopt(
        long = "warn",
        short = "w",
        default_value = "1",
        help = "Warning threshold for failed resources"
    )]
    warn: i64,
    #[structopt(
        long = "critical",
        short = "c",
        default_value = "5",
        help = "Critical threshold for failed resources"
    )]
    critical: i64,
    #[structopt(
        long = "warn-time",
        short = "u",
        default_value = "1900",
        help = "Warning threshold for seconds since the last run"
    )]
    warn_time: i64,
    #[structopt(
        long = "critical-time",
        short = "x",
        default_value = "3700",
        help = "Critical threshold for seconds since the last run"
    )]
    critical_time: i64,
    #[structopt(
        long = "only-enabled",
        short = "e",
        help = "Only alert if Puppet is enabled"
    )]
    only_enabled: bool,
    #[structopt(
        long = "lock-file",
        short = "l",
        default_value = "/var/lib/puppet/state/puppetdlock",
        help = "Location of the lock file"
    )]
    lock_file: PathBuf,
    #[structopt(
        long = "state-file",
        short = "t",
        default_value = "/var/lib/puppet/state/state.yaml",
        help = "Location of the state file"
    )]
    state_file: PathBuf,
    #[structopt(
        long = "summary-file",
        short = "s",
        default_value = "/var/lib/puppet/state/last_run_summary.yaml",
        help = "Location of the run summary file"
    )]
    summary_file: PathBuf,
}

/// An empty lock file means the admin disabled the agent; a non-empty one
/// is just a run in progress
fn agent_enabled(lock_file: &Path) -> bool {
    match fs::metadata(lock_file) {
        Ok(meta) => meta.len() != 0,
        Err(_) => true,
    }
}

/// What the last run summary has to say
#[derive(Debug, PartialEq)]
struct RunSummary {
    last_run: Option<i64>,
    failures: i64,
    total_failure: bool,
}

/// A run that died early writes a summary with nothing but `time` in it,
/// so a missing `events` section is a sentinel for "the run itself
/// failed" and forces the failure count high.
fn parse_summary(yaml: &str) -> Result<RunSummary, String> {
    let doc: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| format!("could not parse run summary: {}", e))?;
    if !doc.is_mapping() {
        return Err("run summary is not a map".to_owned());
    }

    let last_run = doc
        .get("time")
        .and_then(|time| time.get("last_run"))
        .and_then(serde_yaml::Value::as_i64);

    let (failures, total_failure) = match doc.get("events") {
        Some(events) => (
            events
                .get("failure")
                .and_then(serde_yaml::Value::as_i64)
                .unwrap_or(0),
            false,
        ),
        None => (99, true),
    };

    Ok(RunSummary {
        last_run,
        failures,
        total_failure,
    })
}

/// The state file's mtime, for agents that don't write a summary
fn state_file_mtime(state_file: &Path) -> Option<i64> {
    let modified = fs::metadata(state_file).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(since_epoch.as_secs() as i64)
}

fn do_check(enabled: bool, summary: &RunSummary, age: i64, args: &Args) -> Report {
    let mut report = Report::new();

    if !enabled {
        report.add(Status::Warning, "Puppet is disabled");
    }

    if summary.total_failure {
        report.add(
            Status::Critical,
            format!(
                "Puppet failed to run (missing dependencies or catalog compilation failure?), \
                 last ran {} seconds ago",
                age
            ),
        );
    } else {
        let bounds = ThresholdPair::high(args.warn as f64, args.critical as f64);
        let status = bounds.evaluate(summary.failures as f64);
        let message = match status {
            Status::Critical => format!(
                "last run had {} failures, expected < {}",
                summary.failures, args.critical
            ),
            Status::Warning => format!(
                "last run had {} failures, expected < {}",
                summary.failures, args.warn
            ),
            _ => format!("last run had {} failures", summary.failures),
        };
        report.add(status, message);
    }

    let bounds = ThresholdPair::high(args.warn_time as f64, args.critical_time as f64);
    let status = bounds.evaluate(age as f64);
    let message = match status {
        Status::Critical => format!(
            "Puppet last ran {} seconds ago, expected < {}",
            age, args.critical_time
        ),
        Status::Warning => format!(
            "Puppet last ran {} seconds ago, expected < {}",
            age, args.warn_time
        ),
        _ => format!("Puppet last ran {} seconds ago", age),
    };
    report.add(status, message);

    report.add_perf(PerfDatum::new("failures", summary.failures as f64));
    report.add_perf(PerfDatum::new("last_run_age", age as f64));
    report
}

fn now_epoch() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs() as i64,
        Err(_) => 0,
    }
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();

    let enabled = agent_enabled(&args.lock_file);

    let summary = if args.summary_file.exists() {
        let contents = match fs::read_to_string(&args.summary_file) {
            Ok(contents) => contents,
            Err(e) => {
                println!(
                    "UNKNOWN: could not read {}: {}",
                    args.summary_file.display(),
                    e
                );
                Status::Unknown.exit();
            }
        };
        match parse_summary(&contents) {
            Ok(summary) => Some(summary),
            Err(message) => {
                println!("UNKNOWN: {}: {}", args.summary_file.display(), message);
                Status::Unknown.exit();
            }
        }
    } else {
        None
    };

    let last_run = summary
        .as_ref()
        .and_then(|s| s.last_run)
        .or_else(|| state_file_mtime(&args.state_file))
        .unwrap_or(0);
    let age = now_epoch() - last_run;

    let summary = summary.unwrap_or(RunSummary {
        last_run: None,
        failures: 0,
        total_failure: false,
    });

    if args.only_enabled && !enabled {
        println!(
            "OK: Puppet is disabled, not alerting. Last run {} seconds ago with {} failures",
            age, summary.failures
        );
        Status::Ok.exit();
    }

    do_check(enabled, &summary, age, &args).finish();
}

#[cfg(test)]
mod test {
    use structopt::StructOpt;

    use devco_plugins::Status;

    use super::{do_check, parse_summary, Args, RunSummary};

    fn build_args(argv: Vec<&str>) -> Args {
        Args::from_iter(argv.into_iter())
    }

    fn healthy_summary() -> &'static str {
        "---\n\
         time:\n\
         \x20 last_run: 1424197509\n\
         \x20 total: 5.3\n\
         resources:\n\
         \x20 changed: 1\n\
         \x20 failed: 0\n\
         events:\n\
         \x20 failure: 0\n\
         \x20 success: 2\n\
         \x20 total: 2\n"
    }

    #[test]
    fn validate_argparse_defaults() {
        let args = build_args(vec!["check-puppet"]);
        assert_eq!(args.warn, 1);
        assert_eq!(args.critical, 5);
        assert_eq!(args.warn_time, 1900);
        assert_eq!(args.critical_time, 3700);
        assert!(!args.only_enabled);
        assert_eq!(
            args.lock_file.to_str(),
            Some("/var/lib/puppet/state/puppetdlock")
        );
    }

    #[test]
    fn healthy_summaries_parse() {
        let summary = parse_summary(healthy_summary()).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                last_run: Some(1424197509),
                failures: 0,
                total_failure: false,
            }
        );
    }

    #[test]
    fn events_without_a_failure_key_mean_zero() {
        let summary = parse_summary(
            "---\ntime:\n  last_run: 10\nevents:\n  success: 2\n",
        )
        .unwrap();
        assert_eq!(summary.failures, 0);
        assert!(!summary.total_failure);
    }

    #[test]
    fn missing_events_section_is_a_total_failure() {
        let summary = parse_summary("---\ntime:\n  last_run: 1424197509\n").unwrap();
        assert_eq!(summary.failures, 99);
        assert!(summary.total_failure);
    }

    #[test]
    fn garbage_summaries_are_errors_not_zeroes() {
        assert!(parse_summary("{{{{").is_err());
        assert!(parse_summary("just a string").is_err());
    }

    #[test]
    fn total_failure_is_critical_whatever_the_thresholds() {
        let args = build_args(vec!["check-puppet", "-c", "1000", "-w", "999"]);
        let summary = RunSummary {
            last_run: Some(0),
            failures: 99,
            total_failure: true,
        };
        let report = do_check(true, &summary, 120, &args);
        assert_eq!(report.overall(), Status::Critical);
        assert!(report.render().contains("failed to run"));
    }

    #[test]
    fn failures_and_age_both_show_up() {
        let args = build_args(vec!["check-puppet"]);
        let summary = RunSummary {
            last_run: Some(0),
            failures: 2,
            total_failure: false,
        };
        // failures are warning-to-critical, the age is fine
        let report = do_check(true, &summary, 120, &args);
        assert_eq!(report.overall(), Status::Warning);
        let line = report.render();
        assert!(line.contains("last run had 2 failures"));
        assert!(line.contains("Puppet last ran 120 seconds ago"));
        assert!(line.ends_with("|failures=2 last_run_age=120"));
    }

    #[test]
    fn stale_runs_go_critical() {
        let args = build_args(vec!["check-puppet"]);
        let summary = RunSummary {
            last_run: Some(0),
            failures: 0,
            total_failure: false,
        };
        let report = do_check(true, &summary, 4000, &args);
        assert_eq!(report.overall(), Status::Critical);
        assert!(report
            .render()
            .contains("Puppet last ran 4000 seconds ago, expected < 3700"));
    }

    #[test]
    fn disabled_agents_warn_unless_told_otherwise() {
        let args = build_args(vec!["check-puppet"]);
        let summary = RunSummary {
            last_run: Some(0),
            failures: 0,
            total_failure: false,
        };
        let report = do_check(false, &summary, 120, &args);
        assert_eq!(report.overall(), Status::Warning);
        assert!(report.render().contains("Puppet is disabled"));
    }

    #[test]
    fn failure_count_at_the_critical_bound_is_critical() {
        let args = build_args(vec!["check-puppet"]);
        let summary = RunSummary {
            last_run: Some(0),
            failures: 5,
            total_failure: false,
        };
        let report = do_check(true, &summary, 120, &args);
        assert_eq!(report.overall(), Status::Critical);
    }
}
