//! Check node freshness or population size in PuppetDB

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use structopt::StructOpt;

use devco_plugins::output::{PerfDatum, Report};
use devco_plugins::thresholds::ThresholdPair;
use devco_plugins::Status;

/// Query PuppetDB for active nodes and alert on catalog age or node count.
///
/// With --age, the check watches for nodes that have stopped checking in:
/// the oldest catalog in the population drives the status. With --nodes it
/// watches the population size; giving a critical threshold below the
/// warning one flips the comparison into a population floor, for "alert me
/// when nodes disappear" setups.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-puppetdb-nodes (part of devco-plugins)")]
struct Args {
    #[structopt(long = "age", help = "Check for nodes that have not checked in")]
    age: bool,
    #[structopt(long = "nodes", help = "Check the amount of active nodes")]
    nodes: bool,
    #[structopt(long = "warning", help = "Warning threshold")]
    warning: Option<i64>,
    #[structopt(long = "critical", help = "Critical threshold")]
    critical: Option<i64>,
    #[structopt(long = "host", help = "Hostname where PuppetDB runs")]
    host: Option<String>,
    #[structopt(long = "port", default_value = "8081", help = "Port where PuppetDB runs")]
    port: u16,
    #[structopt(long = "no-ssl", help = "Use plain http to talk to PuppetDB")]
    no_ssl: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Age,
    NodeCount,
}

fn mode_from(args: &Args) -> Result<Mode, String> {
    match (args.age, args.nodes) {
        (true, false) => Ok(Mode::Age),
        (false, true) => Ok(Mode::NodeCount),
        (true, true) => Err("give only one of --age and --nodes".to_owned()),
        (false, false) => Err("a mode like --age or --nodes is needed".to_owned()),
    }
}

/// One node from /v3/nodes
#[derive(Debug, Deserialize)]
struct Node {
    name: String,
    deactivated: Option<String>,
    catalog_timestamp: Option<String>,
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

fn fetch_nodes(url: &str) -> Result<Vec<Node>, String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| e.to_string())?;
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .map_err(|e| format!("failed to query {}: {}", url, e))?;
    if !response.status().is_success() {
        return Err(format!("failed to query {}: {}", url, response.status()));
    }
    response
        .json()
        .map_err(|e| format!("could not parse the reply from {}: {}", url, e))
}

/// Catalog ages in seconds for every active node
///
/// A node without a parsable catalog timestamp would poison every age
/// comparison, so it fails the fetch instead of being guessed at.
fn catalog_ages(nodes: &[Node], now: DateTime<Utc>) -> Result<Vec<i64>, String> {
    let mut ages = Vec::new();
    for node in nodes.iter().filter(|n| n.deactivated.is_none()) {
        let raw = node
            .catalog_timestamp
            .as_ref()
            .ok_or_else(|| format!("node {} has no catalog timestamp", node.name))?;
        let timestamp = DateTime::parse_from_rfc3339(raw).map_err(|e| {
            format!(
                "node {} has an unparsable catalog timestamp '{}': {}",
                node.name, raw, e
            )
        })?;
        ages.push((now - timestamp.with_timezone(&Utc)).num_seconds());
    }
    // newest first, like the dashboard sorts them
    ages.sort();
    Ok(ages)
}

fn population_perf(report: &mut Report, ages: &[i64]) {
    if let (Some(&newest), Some(&oldest)) = (ages.first(), ages.last()) {
        report.add_perf(PerfDatum::fixed("oldest", oldest as f64, 2));
        report.add_perf(PerfDatum::fixed("newest", newest as f64, 2));
    }
    report.add_perf(PerfDatum::fixed("count", ages.len() as f64, 2));
}

fn do_age_check(ages: &[i64], warning: i64, critical: i64) -> Report {
    let mut report = Report::new();
    if ages.is_empty() {
        report.add(Status::Unknown, "could not find any nodes");
        population_perf(&mut report, ages);
        return report;
    }

    let oldest = *ages.last().expect("ages is non-empty");
    let bounds = ThresholdPair::high(warning as f64, critical as f64);
    let status = bounds.evaluate(oldest as f64);
    let message = match status {
        Status::Critical => format!(
            "{} nodes not seen in {} seconds",
            ages.iter().filter(|&&age| age >= critical).count(),
            critical
        ),
        Status::Warning => format!(
            "{} nodes not seen in {} seconds",
            ages.iter().filter(|&&age| age >= warning).count(),
            warning
        ),
        _ => format!(
            "{} nodes checking in sooner than {} seconds",
            ages.len(),
            warning
        ),
    };
    report.add(status, message);
    population_perf(&mut report, ages);
    report
}

fn do_count_check(ages: &[i64], warning: i64, critical: i64) -> Report {
    let mut report = Report::new();
    let count = ages.len() as i64;

    // critical below warning turns the ceiling into a floor
    let ceiling = critical >= warning;
    let bounds = if ceiling {
        ThresholdPair::high(warning as f64, critical as f64)
    } else {
        ThresholdPair::low(warning as f64, critical as f64)
    };
    let status = bounds.evaluate(count as f64);

    let message = match status {
        Status::Ok => format!("{} nodes in population", count),
        _ => {
            let bound = if status == Status::Critical {
                critical
            } else {
                warning
            };
            let comparison = if ceiling { "<" } else { ">" };
            format!(
                "{} nodes in population, expected {} {}",
                count, comparison, bound
            )
        }
    };
    report.add(status, message);
    population_perf(&mut report, ages);
    report
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();

    let mode = match mode_from(&args) {
        Ok(mode) => mode,
        Err(message) => {
            println!("UNKNOWN: {}", message);
            Status::Unknown.exit();
        }
    };
    let (warning, critical) = match (args.warning, args.critical) {
        (Some(warning), Some(critical)) => (warning, critical),
        (None, _) => {
            println!("UNKNOWN: please specify a warning threshold");
            Status::Unknown.exit();
        }
        (_, None) => {
            println!("UNKNOWN: please specify a critical threshold");
            Status::Unknown.exit();
        }
    };
    let host = match args.host.as_ref() {
        Some(host) => host,
        None => {
            println!("UNKNOWN: please specify the PuppetDB host with --host");
            Status::Unknown.exit();
        }
    };

    if mode == Mode::Age
        && ThresholdPair::high(warning as f64, critical as f64)
            .validate()
            .is_err()
    {
        println!("UNKNOWN: critical threshold is smaller than warning threshold");
        Status::Unknown.exit();
    }

    let scheme = if args.no_ssl { "http" } else { "https" };
    let url = format!("{}://{}:{}/v3/nodes", scheme, host, args.port);

    let nodes = match fetch_nodes(&url) {
        Ok(nodes) => nodes,
        Err(message) => {
            println!("UNKNOWN: {}", message);
            Status::Unknown.exit();
        }
    };
    let ages = match catalog_ages(&nodes, Utc::now()) {
        Ok(ages) => ages,
        Err(message) => {
            println!("UNKNOWN: {}", message);
            Status::Unknown.exit();
        }
    };

    let report = match mode {
        Mode::Age => do_age_check(&ages, warning, critical),
        Mode::NodeCount => do_count_check(&ages, warning, critical),
    };
    report.finish();
}
