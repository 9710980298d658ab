//! Check expiry times for certificates and CRLs

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use structopt::StructOpt;

use devco_plugins::output::Report;
use devco_plugins::thresholds::ThresholdPair;
use devco_plugins::Status;

/// Alert when a certificate or CRL is close to expiry.
///
/// The end date is scraped from the openssl tool, so anything openssl can
/// read works. Thresholds are seconds of remaining lifetime: fewer is
/// worse, so warn must be larger than crit.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-cert (part of devco-plugins)")]
struct Args {
    #[structopt(long = "cert", help = "Path to a certificate to check")]
    cert: Option<PathBuf>,
    #[structopt(long = "crl", help = "Path to a CRL to check")]
    crl: Option<PathBuf>,
    #[structopt(
        long = "warn",
        short = "w",
        help = "Seconds before expiry to raise a warning"
    )]
    warn: i64,
    #[structopt(
        long = "crit",
        short = "c",
        help = "Seconds before expiry to raise a critical"
    )]
    crit: i64,
    #[structopt(
        long = "lenient-thresholds",
        help = "Skip the warn/crit sanity check and apply the bounds literally"
    )]
    lenient_thresholds: bool,
}

/// What we were asked to inspect
#[derive(Debug, PartialEq)]
enum Target {
    Cert(PathBuf),
    Crl(PathBuf),
}

impl Target {
    fn path(&self) -> &Path {
        match *self {
            Target::Cert(ref path) | Target::Crl(ref path) => path,
        }
    }

    /// The openssl subcommand, the flag that prints the date, and the
    /// label that date hides behind
    fn openssl_incantation(&self) -> (&'static str, &'static str, &'static str) {
        match *self {
            Target::Cert(_) => ("x509", "-enddate", "notAfter="),
            Target::Crl(_) => ("crl", "-nextupdate", "nextUpdate="),
        }
    }
}

fn target_from(args: &Args) -> Result<Target, String> {
    match (&args.cert, &args.crl) {
        (Some(cert), None) => Ok(Target::Cert(cert.clone())),
        (None, Some(crl)) => Ok(Target::Crl(crl.clone())),
        (Some(_), Some(_)) => Err("give only one of --cert and --crl".to_owned()),
        (None, None) => Err("don't know what to check, --cert and --crl are unset".to_owned()),
    }
}

#[derive(Debug)]
enum FetchError {
    Missing(PathBuf),
    Exec(io::Error),
    Unparsable(&'static str),
    BadDate(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FetchError::Missing(ref path) => write!(f, "{} doesn't exist", path.display()),
            FetchError::Exec(ref e) => write!(f, "could not run openssl: {}", e),
            FetchError::Unparsable(label) => {
                write!(f, "end date ({}) could not be parsed from openssl output", label)
            }
            FetchError::BadDate(ref date) => {
                write!(f, "openssl reported an unparsable date '{}'", date)
            }
        }
    }
}

/// Ask openssl when the target stops being valid
fn fetch_end_date(target: &Target) -> Result<DateTime<Utc>, FetchError> {
    let path = target.path();
    if !path.exists() {
        return Err(FetchError::Missing(path.to_owned()));
    }
    let (subcommand, date_flag, label) = target.openssl_incantation();
    let output = Command::new("openssl")
        .arg(subcommand)
        .arg("-in")
        .arg(path)
        .arg("-noout")
        .arg(date_flag)
        .output()
        .map_err(FetchError::Exec)?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(date) = line.trim().strip_prefix(label) {
            return parse_openssl_date(date).ok_or_else(|| FetchError::BadDate(date.to_owned()));
        }
    }
    Err(FetchError::Unparsable(label))
}

/// openssl prints dates like `Mar  9 12:00:00 2027 GMT`
fn parse_openssl_date(date: &str) -> Option<DateTime<Utc>> {
    let trimmed = date.trim().trim_end_matches(" GMT");
    NaiveDateTime::parse_from_str(trimmed, "%b %e %H:%M:%S %Y")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// A period of seconds in human-readable form, down to minutes
fn format_period(total: i64) -> String {
    let intervals = [
        ("years", 31556926),
        ("weeks", 604800),
        ("days", 86400),
        ("hours", 3600),
        ("mins", 60),
    ];
    let mut seconds = total;
    let mut out = String::new();
    for &(name, length) in &intervals {
        if seconds >= length {
            let count = seconds / length;
            seconds %= length;
            if !out.is_empty() {
                out.push_str(if name == "mins" { " and " } else { ", " });
            }
            out.push_str(&count.to_string());
            out.push(' ');
            out.push_str(name);
        }
    }
    if out.is_empty() {
        "0 mins".to_owned()
    } else {
        out
    }
}

fn do_check(target: &Target, seconds_left: i64, bounds: &ThresholdPair) -> Report {
    let mut report = Report::new();
    let status = bounds.evaluate(seconds_left as f64);
    let message = if seconds_left < 0 {
        format!(
            "{} expired {} ago",
            target.path().display(),
            format_period(-seconds_left)
        )
    } else {
        format!(
            "{} expires in {}",
            target.path().display(),
            format_period(seconds_left)
        )
    };
    report.add(status, message);
    report
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    let target = match target_from(&args) {
        Ok(target) => target,
        Err(message) => {
            println!("UNKNOWN: {}", message);
            Status::Unknown.exit();
        }
    };

    let bounds = ThresholdPair::low(args.warn as f64, args.crit as f64);
    if !args.lenient_thresholds {
        if let Err(e) = bounds.validate() {
            println!("UNKNOWN: {}", e);
            Status::Unknown.exit();
        }
    }

    let end_date = match fetch_end_date(&target) {
        Ok(end_date) => end_date,
        Err(e) => {
            println!("UNKNOWN: {}", e);
            Status::Unknown.exit();
        }
    };

    let seconds_left = (end_date - Utc::now()).num_seconds();
    do_check(&target, seconds_left, &bounds).finish();
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use structopt::StructOpt;

    use devco_plugins::thresholds::ThresholdPair;
    use devco_plugins::Status;

    use super::{do_check, format_period, parse_openssl_date, target_from, Args, Target};

    fn build_args(argv: Vec<&str>) -> Args {
        Args::from_iter(argv.into_iter())
    }

    #[test]
    fn validate_argparse() {
        let args = build_args(vec![
            "check-cert",
            "--cert",
            "/etc/pki/www.pem",
            "-w",
            "1209600",
            "-c",
            "86400",
        ]);
        assert_eq!(args.warn, 1209600);
        assert_eq!(args.crit, 86400);
        assert_eq!(
            target_from(&args).unwrap(),
            Target::Cert(PathBuf::from("/etc/pki/www.pem"))
        );
    }

    #[test]
    fn cert_and_crl_together_are_rejected() {
        let args = build_args(vec![
            "check-cert",
            "--cert",
            "/a.pem",
            "--crl",
            "/b.pem",
            "-w",
            "2",
            "-c",
            "1",
        ]);
        assert!(target_from(&args).is_err());
    }

    #[test]
    fn neither_cert_nor_crl_is_rejected() {
        let args = build_args(vec!["check-cert", "-w", "2", "-c", "1"]);
        assert!(target_from(&args).is_err());
    }

    #[test]
    fn openssl_dates_parse() {
        let date = parse_openssl_date("Mar 29 12:00:00 2027 GMT").unwrap();
        assert_eq!(date.timestamp(), 1806321600);
        // single-digit days come space padded
        assert!(parse_openssl_date("Mar  9 12:00:00 2027 GMT").is_some());
        assert!(parse_openssl_date("not a date").is_none());
    }

    #[test]
    fn periods_read_like_a_human_wrote_them() {
        assert_eq!(format_period(60), "1 mins");
        assert_eq!(format_period(86400 * 3 + 3600 * 2), "3 days, 2 hours");
        assert_eq!(format_period(604800 + 120), "1 weeks and 2 mins");
        assert_eq!(format_period(30), "0 mins");
    }

    #[test]
    fn nearly_expired_cert_goes_critical() {
        let target = Target::Cert(PathBuf::from("/etc/pki/www.pem"));
        let bounds = ThresholdPair::low(1209600.0, 86400.0);
        let report = do_check(&target, 3600, &bounds);
        assert_eq!(report.overall(), Status::Critical);
        assert_eq!(
            report.render(),
            "CRITICAL: /etc/pki/www.pem expires in 1 hours"
        );
    }

    #[test]
    fn comfortable_margin_is_ok() {
        let target = Target::Crl(PathBuf::from("/etc/pki/ca.crl"));
        let bounds = ThresholdPair::low(1209600.0, 86400.0);
        let report = do_check(&target, 4000000, &bounds);
        assert_eq!(report.overall(), Status::Ok);
    }

    #[test]
    fn already_expired_says_so() {
        let target = Target::Cert(PathBuf::from("/a.pem"));
        let bounds = ThresholdPair::low(1209600.0, 86400.0);
        let report = do_check(&target, -7200, &bounds);
        assert_eq!(report.overall(), Status::Critical);
        assert!(report.render().contains("expired 2 hours ago"));
    }
}
