//! Count files in a directory

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use structopt::StructOpt;

use devco_plugins::output::{PerfDatum, Report};
use devco_plugins::thresholds::ThresholdPair;
use devco_plugins::Status;

/// Count the entries in a directory and alert when there are too many.
///
/// Handy for spool directories: a growing pile of files means whatever is
/// supposed to drain them isn't. With --regex only entries whose name
/// matches are counted.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-dir (part of devco-plugins)")]
struct Args {
    #[structopt(long = "directory", short = "d", help = "The directory to check")]
    directory: Option<PathBuf>,
    #[structopt(
        long = "warn",
        short = "w",
        help = "Number of files to raise a warning for"
    )]
    warn: Option<u64>,
    #[structopt(
        long = "crit",
        short = "c",
        help = "Number of files to raise a critical for"
    )]
    crit: Option<u64>,
    #[structopt(
        long = "regex",
        short = "r",
        help = "Only count files whose name matches this regex"
    )]
    regex: Option<String>,
    #[structopt(
        long = "lenient-thresholds",
        help = "Skip the warn/crit sanity check and apply the bounds literally"
    )]
    lenient_thresholds: bool,
}

fn count_entries(dir: &Path, pattern: Option<&Regex>) -> Result<u64, String> {
    if !dir.is_dir() {
        return Err(format!(
            "{} does not exist or is not a directory",
            dir.display()
        ));
    }
    let entries =
        fs::read_dir(dir).map_err(|e| format!("could not read {}: {}", dir.display(), e))?;
    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(|e| format!("could not read {}: {}", dir.display(), e))?;
        let name = entry.file_name();
        match pattern {
            Some(re) if !re.is_match(&name.to_string_lossy()) => {}
            _ => count += 1,
        }
    }
    Ok(count)
}

fn do_check(dir: &Path, count: u64, warn: u64, crit: u64) -> Report {
    let mut report = Report::new();
    let bounds = ThresholdPair::high(warn as f64, crit as f64);
    let status = bounds.evaluate(count as f64);
    let message = match status {
        Status::Critical => format!(
            "{} files found in {}, expected <= {}",
            count,
            dir.display(),
            crit
        ),
        Status::Warning => format!(
            "{} files found in {}, expected <= {}",
            count,
            dir.display(),
            warn
        ),
        _ => format!("{} files found in {}", count, dir.display()),
    };
    report.add(status, message);
    report.add_perf(PerfDatum::new("files", count as f64).with_bounds(
        warn as f64,
        crit as f64,
        0.0,
    ));
    report
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    let (dir, warn, crit) = match (args.directory.as_ref(), args.warn, args.crit) {
        (Some(dir), Some(warn), Some(crit)) => (dir, warn, crit),
        (None, _, _) => {
            println!("UNKNOWN: please specify a directory with --directory");
            Status::Unknown.exit();
        }
        _ => {
            println!("UNKNOWN: please specify both --warn and --crit");
            Status::Unknown.exit();
        }
    };

    if !args.lenient_thresholds {
        if let Err(e) = ThresholdPair::high(warn as f64, crit as f64).validate() {
            println!("UNKNOWN: {}", e);
            Status::Unknown.exit();
        }
    }

    let pattern = match args.regex.as_ref() {
        Some(raw) => match Regex::new(raw) {
            Ok(re) => Some(re),
            Err(e) => {
                println!("UNKNOWN: invalid file name regex {:?}: {}", raw, e);
                Status::Unknown.exit();
            }
        },
        None => None,
    };

    match count_entries(dir, pattern.as_ref()) {
        Ok(count) => do_check(dir, count, warn, crit).finish(),
        Err(message) => {
            println!("UNKNOWN: {}", message);
            Status::Unknown.exit();
        }
    }
}
