//! Round-trip latency probe for an ActiveMQ broker

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use rand::Rng;
use structopt::StructOpt;

use devco_plugins::output::{PerfDatum, Report};
use devco_plugins::stomp::{Connection, StompError};
use devco_plugins::Status;

/// Publish a random token to a destination we are subscribed to and time
/// how long the broker takes to echo it back.
///
/// The critical threshold doubles as the probe timeout: a probe that takes
/// longer than that has failed, it is not an unknown. If several nagios
/// instances monitor the same infrastructure, give each one a unique
/// --destination topic rather than sharing a queue, or they will consume
/// each other's probes. Temp topics would also work but fail in certain
/// middleware topologies.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-activemq (part of devco-plugins)")]
struct Args {
    #[structopt(long = "host", short = "H", help = "Host to connect to")]
    hosts: Vec<String>,
    #[structopt(
        long = "port",
        short = "P",
        default_value = "61613",
        help = "Port to connect to"
    )]
    port: u16,
    #[structopt(
        long = "user",
        short = "u",
        default_value = "nagios",
        help = "User to connect as"
    )]
    user: String,
    #[structopt(
        long = "password",
        short = "p",
        help = "Password to connect with, or an absolute path to a file \
                holding it on its first line"
    )]
    password: Option<String>,
    #[structopt(
        long = "destination",
        short = "d",
        default_value = "/topic/nagios.monitor",
        help = "The topic or queue to use for monitoring"
    )]
    destination: String,
    #[structopt(
        long = "warning",
        short = "w",
        default_value = "2",
        help = "Warning threshold for turn around time, in seconds"
    )]
    warning: u64,
    #[structopt(
        long = "critical",
        short = "c",
        default_value = "5",
        help = "Critical threshold for turn around time, in seconds"
    )]
    critical: u64,
}

/// What happened to the probe message
#[derive(Debug, PartialEq)]
enum Probe {
    /// The token came back intact
    Echoed,
    /// Something came back, but not what we sent
    Mismatch { sent: String, received: String },
    /// The timeout fired before the echo arrived
    TimedOut,
    /// Could not connect, subscribe or publish at all
    Failed(String),
}

/// A password argument is either the password or a file holding it
fn resolve_password(raw: Option<&str>) -> Result<Option<String>, String> {
    match raw {
        Some(value) if value.starts_with('/') && Path::new(value).exists() => {
            let contents = fs::read_to_string(value)
                .map_err(|e| format!("could not read password file {}: {}", value, e))?;
            match contents.lines().next() {
                Some(line) => Ok(Some(line.trim_end().to_owned())),
                None => Err(format!("password file {} is empty", value)),
            }
        }
        Some(value) => Ok(Some(value.to_owned())),
        None => Ok(None),
    }
}

fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..10)
        .map(|_| rng.gen_range(0..100).to_string())
        .collect()
}

fn run_probe(args: &Args, password: Option<&str>, token: &str) -> Probe {
    let timeout = Duration::from_secs(args.critical);
    let result = (|| -> Result<String, StompError> {
        let mut conn = Connection::open(&args.hosts, args.port, &args.user, password, timeout)?;
        conn.subscribe(&args.destination, &[])?;
        conn.publish(&args.destination, token, &[])?;
        let frame = conn.receive()?;
        conn.disconnect();
        Ok(frame.body)
    })();

    match result {
        Ok(ref body) if body == token => Probe::Echoed,
        Ok(body) => Probe::Mismatch {
            sent: token.to_owned(),
            received: body,
        },
        Err(ref e) if e.is_timeout() => Probe::TimedOut,
        Err(e) => Probe::Failed(e.to_string()),
    }
}

fn classify(probe: &Probe, elapsed: f64, warning: u64, critical: u64) -> (Status, String) {
    match *probe {
        Probe::Mismatch {
            ref sent,
            ref received,
        } => (
            Status::Critical,
            format!(
                "sent \"{}\" but received \"{}\", possible corruption or misconfiguration",
                sent, received
            ),
        ),
        Probe::TimedOut => (
            Status::Critical,
            format!(
                "test took {:.2}s to complete, expected < {}s",
                elapsed, critical
            ),
        ),
        Probe::Failed(ref error) => (
            Status::Critical,
            format!("unexpected error during test: {}", error),
        ),
        Probe::Echoed => {
            if elapsed >= critical as f64 {
                (
                    Status::Critical,
                    format!(
                        "test took {:.2}s to complete, expected < {}s",
                        elapsed, critical
                    ),
                )
            } else if elapsed >= warning as f64 {
                (
                    Status::Warning,
                    format!(
                        "test took {:.2}s to complete, expected < {}s",
                        elapsed, warning
                    ),
                )
            } else {
                (
                    Status::Ok,
                    format!("test completed in {:.2} seconds", elapsed),
                )
            }
        }
    }
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    if args.hosts.is_empty() {
        println!("CRITICAL: no host to monitor supplied");
        Status::Critical.exit();
    }
    let password = match resolve_password(args.password.as_deref()) {
        Ok(password) => password,
        Err(message) => {
            println!("UNKNOWN: {}", message);
            Status::Unknown.exit();
        }
    };

    let token = random_token();
    let start = Instant::now();
    let probe = run_probe(&args, password.as_deref(), &token);
    let elapsed = start.elapsed().as_secs_f64();

    let (status, message) = classify(&probe, elapsed, args.warning, args.critical);
    let mut report = Report::new();
    report.add(status, message);
    report.add_perf(PerfDatum::fixed("seconds", elapsed, 6));
    report.finish();
}
