//! Dump ActiveMQ broker or queue statistics for cacti

use std::fmt;
use std::io;
use std::str::FromStr;
use std::time::Duration;

use itertools::Itertools;
use structopt::StructOpt;

use devco_plugins::amq::{self, MapParseError, StatsMap};
use devco_plugins::stomp::{Connection, StompError};
use devco_plugins::Status;

/// Fetch statistics about the broker or one queue from the ActiveMQ
/// Statistics Plugin and print them as key:value pairs for cacti.
///
/// Multiple brokers can be given with repeated --host flags for
/// active/passive clusters; they are tried in order until one answers,
/// so user, password and port must match on all of them.
#[derive(StructOpt, Debug)]
#[structopt(name = "query-activemq-stats (part of devco-plugins)")]
struct Args {
    #[structopt(long = "host", help = "Host to connect to")]
    hosts: Vec<String>,
    #[structopt(long = "port", default_value = "6163", help = "Port to connect to")]
    port: u16,
    #[structopt(long = "user", default_value = "nagios", help = "Connect as user")]
    user: String,
    #[structopt(long = "password", help = "Connection password")]
    password: Option<String>,
    #[structopt(
        long = "report",
        default_value = "broker",
        help = "What to report on: 'broker' or a queue name"
    )]
    report: ReportTarget,
}

/// What the statistics request is about
#[derive(Debug, Clone, PartialEq)]
enum ReportTarget {
    Broker,
    Queue(String),
}

impl ReportTarget {
    fn destination(&self) -> String {
        match *self {
            ReportTarget::Broker => amq::BROKER_STATS_DESTINATION.to_owned(),
            ReportTarget::Queue(ref queue) => amq::queue_stats_destination(queue),
        }
    }
}

impl FromStr for ReportTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<ReportTarget, String> {
        match s {
            "" => Err("report target may not be empty".to_owned()),
            "broker" => Ok(ReportTarget::Broker),
            queue => Ok(ReportTarget::Queue(queue.to_owned())),
        }
    }
}

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

fn fetch_stats(args: &Args) -> Result<StatsMap, FetchError> {
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
    conn.publish(&args.report.destination(), "", &[("reply-to", &reply_to)])?;
    let frame = conn.receive()?;
    conn.disconnect();

    Ok(amq::decode_map(&frame.body)?)
}

/// All pairs in document order, minus the `+`-keyed aggregates cacti can't
/// graph
fn format_line(stats: &StatsMap) -> String {
    stats
        .iter()
        .filter(|&&(ref key, _)| !key.contains('+'))
        .map(|&(ref key, ref value)| format!("{}:{}", key, value))
        .join(" ")
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    if args.hosts.is_empty() {
        println!("CRITICAL: No host to monitor supplied");
        Status::Critical.exit();
    }

    // cacti reads the output, not the exit code, so failures just say so
    match fetch_stats(&args) {
        Ok(stats) => println!("{}", format_line(&stats)),
        Err(e) => println!("Failed to get stats: {}", e),
    }
}
