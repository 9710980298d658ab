//! Dump lighttpd fastcgi backend counters for cacti

use std::collections::BTreeMap;
use std::process;
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;
use structopt::StructOpt;

/// Where lighttpd serves its counter page
const COUNTER_PATH: &str = "/server-counters";

/// Aggregate lighttpd's fastcgi counters per backend and print them in the
/// shapes cacti data queries want.
///
/// `index` lists the backends, `query FIELD` prints `backend:value` for
/// every backend, `get FIELD BACKEND` prints one value.
#[derive(StructOpt, Debug)]
#[structopt(name = "query-lighttpd-stats (part of devco-plugins)")]
struct Args {
    #[structopt(help = "Host serving /server-counters")]
    host: String,
    #[structopt(help = "One of: index, query, get")]
    command: Command,
    #[structopt(help = "Counter field: connected, died, disabled, load, overloaded")]
    field: Option<Field>,
    #[structopt(help = "Backend name, for get")]
    backend: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Index,
    Query,
    Get,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Command, String> {
        match s {
            "index" => Ok(Command::Index),
            "query" => Ok(Command::Query),
            "get" => Ok(Command::Get),
            other => Err(format!("unknown command: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Connected,
    Died,
    Disabled,
    Load,
    Overloaded,
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Field, String> {
        match s {
            "connected" => Ok(Field::Connected),
            "died" => Ok(Field::Died),
            "disabled" => Ok(Field::Disabled),
            "load" => Ok(Field::Load),
            "overloaded" => Ok(Field::Overloaded),
            other => Err(format!("unknown field: {}", other)),
        }
    }
}

/// One backend's counters, summed over its instances
#[derive(Debug, Default, Clone, PartialEq)]
struct BackendStats {
    connected: u64,
    died: u64,
    disabled: u64,
    load: u64,
    overloaded: u64,
}

impl BackendStats {
    fn get(&self, field: Field) -> u64 {
        match field {
            Field::Connected => self.connected,
            Field::Died => self.died,
            Field::Disabled => self.disabled,
            Field::Load => self.load,
            Field::Overloaded => self.overloaded,
        }
    }

    fn bump(&mut self, field: Field, value: u64) {
        match field {
            Field::Connected => self.connected += value,
            Field::Died => self.died += value,
            Field::Disabled => self.disabled += value,
            Field::Load => self.load += value,
            Field::Overloaded => self.overloaded += value,
        }
    }
}

/// One counter line: `fastcgi.backend.NAME.INSTANCE.STAT: VALUE`
fn parse_line(re: &Regex, line: &str) -> Option<(String, Field, u64)> {
    let caps = re.captures(line)?;
    let backend = caps.get(1)?.as_str().to_owned();
    let field = caps.get(3)?.as_str().parse().ok()?;
    let value = caps.get(4)?.as_str().parse().ok()?;
    Some((backend, field, value))
}

/// Sum counters per backend; lines that aren't fastcgi counters (there are
/// plenty on that page) are skipped
fn parse_counters(body: &str) -> BTreeMap<String, BackendStats> {
    let re = Regex::new(
        r"^fastcgi\.backend\.(.+)\.(\d+)\.(connected|died|disabled|load|overloaded): (\d+)$",
    )
    .unwrap();
    let mut backends: BTreeMap<String, BackendStats> = BTreeMap::new();
    for line in body.lines() {
        if let Some((backend, field, value)) = parse_line(&re, line) {
            backends.entry(backend).or_default().bump(field, value);
        }
    }
    backends
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

fn fetch_counters(host: &str) -> Result<String, String> {
    let url = format!("http://{}{}", host, COUNTER_PATH);
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| e.to_string())?;
    let response = client
        .get(&url)
        .send()
        .map_err(|e| format!("Failed to retrieve {}: {}", url, e))?;
    if !response.status().is_success() {
        return Err(format!("Failed to retrieve {}: {}", url, response.status()));
    }
    response
        .text()
        .map_err(|e| format!("Failed to retrieve {}: {}", url, e))
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    let body = fetch_counters(&args.host).unwrap_or_else(|message| {
        println!("{}", message);
        process::exit(1);
    });
    let backends = parse_counters(&body);

    match args.command {
        Command::Index => {
            for name in backends.keys() {
                println!("{}", name);
            }
        }
        Command::Query => {
            let field = args.field.unwrap_or_else(|| {
                println!("Please specify a field to query");
                process::exit(1);
            });
            for (name, stats) in &backends {
                println!("{}:{}", name, stats.get(field));
            }
        }
        Command::Get => {
            let (field, backend) = match (args.field, args.backend.as_ref()) {
                (Some(field), Some(backend)) => (field, backend),
                _ => {
                    println!("Please specify a field and a backend to get");
                    process::exit(1);
                }
            };
            match backends.get(backend) {
                Some(stats) => println!("{}", stats.get(field)),
                None => {
                    println!("Unknown backend: {}", backend);
                    process::exit(1);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use structopt::StructOpt;

    use super::{parse_counters, Args, Command, Field};

    fn counter_page() -> &'static str {
        "fastcgi.backend.app.0.connected: 310\n\
         fastcgi.backend.app.0.died: 0\n\
         fastcgi.backend.app.0.load: 2\n\
         fastcgi.backend.app.1.connected: 290\n\
         fastcgi.backend.app.1.load: 3\n\
         fastcgi.backend.admin.ui.0.connected: 12\n\
         fastcgi.backend.app.load: 5\n\
         connection.counters: ignored\n"
    }

    #[test]
    fn validate_argparse() {
        let args = Args::from_iter(vec!["query-lighttpd-stats", "web1", "query", "load"]);
        assert_eq!(args.host, "web1");
        assert_eq!(args.command, Command::Query);
        assert_eq!(args.field, Some(Field::Load));
        assert_eq!(args.backend, None);
    }

    #[test]
    fn instances_sum_per_backend() {
        let backends = parse_counters(counter_page());
        let app = &backends["app"];
        assert_eq!(app.connected, 600);
        assert_eq!(app.load, 5);
        assert_eq!(app.died, 0);
    }

    #[test]
    fn backend_names_may_contain_dots() {
        let backends = parse_counters(counter_page());
        assert_eq!(backends["admin.ui"].connected, 12);
    }

    #[test]
    fn non_counter_lines_are_skipped() {
        let backends = parse_counters(counter_page());
        // "fastcgi.backend.app.load: 5" has no instance number and is not
        // a counter line
        assert_eq!(backends.len(), 2);
    }

    #[test]
    fn index_order_is_sorted() {
        let backends = parse_counters(counter_page());
        let names: Vec<&String> = backends.keys().collect();
        assert_eq!(names, ["admin.ui", "app"]);
    }
}
