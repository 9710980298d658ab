//! Check the depth of an ActiveMQ queue

use std::fmt;
use std::io;
use std::time::Duration;

use structopt::StructOpt;

use devco_plugins::amq::{self, MapParseError, StatsMap};
use devco_plugins::output::{PerfDatum, Report};
use devco_plugins::stomp::{Connection, StompError};
use devco_plugins::thresholds::ThresholdPair;
use devco_plugins::Status;

/// Check the size of a queue and the broker's memory use via the ActiveMQ
/// Statistics Plugin.
///
/// The broker must have the statistics plugin enabled. Give --host several
/// times for an active/passive pair; port, user and password must then be
/// the same on all of them.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-activemq-queue (part of devco-plugins)")]
struct Args {
    #[structopt(long = "host", help = "Broker host to connect to")]
    hosts: Vec<String>,
    #[structopt(long = "port", default_value = "6163", help = "Port to connect to")]
    port: u16,
    #[structopt(long = "user", default_value = "nagios", help = "Connect as user")]
    user: String,
    #[structopt(long = "password", help = "Connection password")]
    password: Option<String>,
    #[structopt(long = "queue", help = "What queue to monitor")]
    queue: Option<String>,
    #[structopt(
        long = "queue-warn",
        default_value = "100",
        help = "Warning queue size"
    )]
    queue_warn: i64,
    #[structopt(
        long = "queue-crit",
        default_value = "500",
        help = "Critical queue size"
    )]
    queue_crit: i64,
    #[structopt(
        long = "mem-warn",
        default_value = "50",
        help = "Warning percentage of broker memory used"
    )]
    mem_warn: i64,
    #[structopt(
        long = "mem-crit",
        default_value = "75",
        help = "Critical percentage of broker memory used"
    )]
    mem_crit: i64,
}

/// Everything that can keep us from having stats to evaluate
#[derive(Debug)]
enum FetchError {
    Stomp(StompError),
    Map(MapParseError),
    Hostname(io::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FetchError::Stomp(ref e) => write!(f, "{}", e),
            FetchError::Map(ref e) => write!(f, "{}", e),
            FetchError::Hostname(ref e) => write!(f, "could not determine hostname: {}", e),
        }
    }
}

impl From<StompError> for FetchError {
    fn from(e: StompError) -> FetchError {
        FetchError::Stomp(e)
    }
}

impl From<MapParseError> for FetchError {
    fn from(e: MapParseError) -> FetchError {
        FetchError::Map(e)
    }
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(2);

fn fetch_stats(args: &Args, queue: &str) -> Result<StatsMap, FetchError> {
    let hostname = amq::local_hostname().map_err(FetchError::Hostname)?;
    let reply_to = amq::reply_topic(&hostname);

    let mut conn = Connection::open(
        &args.hosts,
        args.port,
        &args.user,
        args.password.as_deref(),
        FETCH_TIMEOUT,
    )?;
    conn.subscribe(&reply_to, &[amq::MAP_TRANSFORMATION])?;
    conn.publish(
        &amq::queue_stats_destination(queue),
        "",
        &[("reply-to", &reply_to)],
    )?;
    let frame = conn.receive()?;
    conn.disconnect();

    Ok(amq::decode_map(&frame.body)?)
}

fn do_check(queue: &str, size: i64, memory_pct: i64, args: &Args) -> Report {
    let mut report = Report::new();

    let bounds = ThresholdPair::high(args.queue_warn as f64, args.queue_crit as f64);
    let status = bounds.evaluate(size as f64);
    let message = match status {
        Status::Critical => format!("{} has {} messages (>= {})", queue, size, args.queue_crit),
        Status::Warning => format!("{} has {} messages (>= {})", queue, size, args.queue_warn),
        _ => format!("{} has {} messages", queue, size),
    };
    report.add(status, message);

    let bounds = ThresholdPair::high(args.mem_warn as f64, args.mem_crit as f64);
    let status = bounds.evaluate(memory_pct as f64);
    let message = match status {
        Status::Critical => format!(
            "{}% of broker memory used (>= {}%)",
            memory_pct, args.mem_crit
        ),
        Status::Warning => format!(
            "{}% of broker memory used (>= {}%)",
            memory_pct, args.mem_warn
        ),
        _ => format!("{}% of broker memory used", memory_pct),
    };
    report.add(status, message);

    report.add_perf(PerfDatum::new("size", size as f64));
    report.add_perf(PerfDatum::new("memory_pct", memory_pct as f64));
    report
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    let queue = match args.queue {
        Some(ref queue) => queue.clone(),
        None => {
            println!("UNKNOWN: please specify a queue name with --queue");
            Status::Unknown.exit();
        }
    };

    let stats = match fetch_stats(&args, &queue) {
        Ok(stats) => stats,
        Err(e) => {
            println!("UNKNOWN: failed to get ActiveMQ stats: {}", e);
            Status::Unknown.exit();
        }
    };

    let size = stats.get_i64("size");
    let memory_pct = stats.get_i64("memoryPercentUsage");
    match (size, memory_pct) {
        (Ok(size), Ok(memory_pct)) => do_check(&queue, size, memory_pct, &args).finish(),
        (Err(e), _) | (_, Err(e)) => {
            println!("UNKNOWN: failed to get ActiveMQ stats: {}", e);
            Status::Unknown.exit();
        }
    }
}

#[cfg(test)]
mod test {
    use structopt::StructOpt;

    use devco_plugins::Status;

    use super::{do_check, Args};

    fn build_args(argv: Vec<&str>) -> Args {
        Args::from_iter(argv.into_iter())
    }

    #[test]
    fn validate_argparse_defaults() {
        let args = build_args(vec!["check-activemq-queue", "--queue", "foo.bar"]);
        assert_eq!(args.queue.as_deref(), Some("foo.bar"));
        assert_eq!(args.port, 6163);
        assert_eq!(args.user, "nagios");
        assert_eq!(args.queue_warn, 100);
        assert_eq!(args.queue_crit, 500);
        assert_eq!(args.mem_warn, 50);
        assert_eq!(args.mem_crit, 75);
    }

    #[test]
    fn validate_repeated_hosts() {
        let args = build_args(vec![
            "check-activemq-queue",
            "--host",
            "amq1",
            "--host",
            "amq2",
            "--queue",
            "q",
        ]);
        assert_eq!(args.hosts, ["amq1", "amq2"]);
    }

    #[test]
    fn deep_queue_goes_critical() {
        let args = build_args(vec!["check-activemq-queue", "--queue", "foo.bar"]);
        let report = do_check("foo.bar", 600, 10, &args);
        assert_eq!(report.overall(), Status::Critical);
        let line = report.render();
        assert!(line.contains("600"));
        assert!(line.starts_with("CRITICAL: "));
        assert!(line.ends_with("|size=600 memory_pct=10"));
    }

    #[test]
    fn quiet_queue_is_ok() {
        let args = build_args(vec!["check-activemq-queue", "--queue", "foo.bar"]);
        let report = do_check("foo.bar", 50, 10, &args);
        assert_eq!(report.overall(), Status::Ok);
        assert_eq!(
            report.render(),
            "OK: foo.bar has 50 messages, 10% of broker memory used|size=50 memory_pct=10"
        );
    }

    #[test]
    fn memory_alone_can_set_the_exit() {
        let args = build_args(vec!["check-activemq-queue", "--queue", "foo.bar"]);
        let report = do_check("foo.bar", 50, 80, &args);
        assert_eq!(report.overall(), Status::Critical);
        let line = report.render();
        // the healthy metric still shows up in the message
        assert!(line.contains("foo.bar has 50 messages"));
        assert!(line.contains("80% of broker memory used (>= 75%)"));
    }

    #[test]
    fn warning_band_uses_the_warn_bound_in_the_message() {
        let args = build_args(vec!["check-activemq-queue", "--queue", "foo.bar"]);
        let report = do_check("foo.bar", 150, 10, &args);
        assert_eq!(report.overall(), Status::Warning);
        assert!(report.render().contains("foo.bar has 150 messages (>= 100)"));
    }
}
