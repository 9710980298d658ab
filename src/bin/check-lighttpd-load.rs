//! Check lighttpd's busy server count

use std::time::Duration;

use structopt::StructOpt;

use devco_plugins::output::Report;
use devco_plugins::thresholds::ThresholdPair;
use devco_plugins::Status;

/// Read the BusyServers value from lighttpd's status page and alert when
/// too many workers are busy.
///
/// lighttpd needs the status module enabled, e.g.:
///
///     $HTTP["remoteip"] =~ "^(10|127)" {
///         status.status-url = "/server-status"
///     }
#[derive(StructOpt, Debug)]
#[structopt(name = "check-lighttpd-load (part of devco-plugins)")]
struct Args {
    #[structopt(
        long = "host",
        short = "H",
        default_value = "localhost",
        help = "Host to check"
    )]
    host: String,
    #[structopt(
        long = "url",
        short = "u",
        default_value = "/server-status",
        help = "Status URL"
    )]
    url: String,
    #[structopt(long = "warn", short = "w", default_value = "0", help = "Warning load")]
    warn: i64,
    #[structopt(
        long = "critical",
        short = "c",
        default_value = "0",
        help = "Critical load"
    )]
    critical: i64,
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

fn status_url(host: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("http://{}{}?auto", host, path)
    } else {
        format!("http://{}/{}?auto", host, path)
    }
}

/// The `?auto` status page happens to be valid YAML
fn fetch_status(url: &str) -> Result<String, String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| e.to_string())?;
    let response = client
        .get(url)
        .send()
        .map_err(|e| format!("failed to retrieve {}: {}", url, e))?;
    if !response.status().is_success() {
        return Err(format!(
            "failed to retrieve {}: {}",
            url,
            response.status()
        ));
    }
    response
        .text()
        .map_err(|e| format!("failed to retrieve {}: {}", url, e))
}

fn busy_servers(body: &str) -> Option<i64> {
    let stats: serde_yaml::Value = serde_yaml::from_str(body).ok()?;
    stats.get("BusyServers").and_then(serde_yaml::Value::as_i64)
}

fn do_check(busy: i64, warn: i64, crit: i64) -> Report {
    let mut report = Report::new();
    let bounds = ThresholdPair::high(warn as f64, crit as f64);
    let status = bounds.evaluate(busy as f64);
    let message = match status {
        Status::Critical => format!("{} lighttpd busy servers (>= {})", busy, crit),
        Status::Warning => format!("{} lighttpd busy servers (>= {})", busy, warn),
        _ => format!("{} lighttpd busy servers", busy),
    };
    report.add(status, message);
    report
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    let url = status_url(&args.host, &args.url);

    let body = match fetch_status(&url) {
        Ok(body) => body,
        Err(message) => {
            println!("UNKNOWN: {}", message);
            Status::Unknown.exit();
        }
    };

    match busy_servers(&body) {
        Some(busy) => do_check(busy, args.warn, args.critical).finish(),
        None => {
            println!("UNKNOWN: could not parse lighttpd statistics");
            Status::Unknown.exit();
        }
    }
}

#[cfg(test)]
mod test {
    use structopt::StructOpt;

    use devco_plugins::Status;

    use super::{busy_servers, do_check, status_url, Args};

    fn auto_page() -> &'static str {
        "Total Accesses: 1234\n\
         Total kBytes: 649\n\
         Uptime: 7260\n\
         BusyServers: 5\n\
         IdleServers: 10\n\
         Scoreboard: khhr____\n"
    }

    #[test]
    fn validate_argparse_defaults() {
        let args = build_args(vec!["check-lighttpd-load", "-w", "20", "-c", "50"]);
        assert_eq!(args.host, "localhost");
        assert_eq!(args.url, "/server-status");
        assert_eq!(args.warn, 20);
        assert_eq!(args.critical, 50);
    }

    fn build_args(argv: Vec<&str>) -> Args {
        Args::from_iter(argv.into_iter())
    }

    #[test]
    fn urls_join_cleanly_either_way() {
        assert_eq!(
            status_url("web1", "/server-status"),
            "http://web1/server-status?auto"
        );
        assert_eq!(
            status_url("web1", "server-status"),
            "http://web1/server-status?auto"
        );
    }

    #[test]
    fn the_auto_page_parses_as_yaml() {
        assert_eq!(busy_servers(auto_page()), Some(5));
    }

    #[test]
    fn missing_key_is_a_parse_failure() {
        assert_eq!(busy_servers("Uptime: 7260\n"), None);
        assert_eq!(busy_servers("<html>not a status page</html>"), None);
    }

    #[test]
    fn busy_counts_drive_the_status() {
        let report = do_check(5, 20, 50);
        assert_eq!(report.overall(), Status::Ok);
        assert_eq!(report.render(), "OK: 5 lighttpd busy servers");

        let report = do_check(21, 20, 50);
        assert_eq!(report.overall(), Status::Warning);

        let report = do_check(50, 20, 50);
        assert_eq!(report.overall(), Status::Critical);
        assert_eq!(report.render(), "CRITICAL: 50 lighttpd busy servers (>= 50)");
    }
}
