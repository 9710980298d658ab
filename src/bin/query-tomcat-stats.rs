//! Dump Tomcat JVM memory and connector thread stats for cacti

use std::process;
use std::time::Duration;

use itertools::Itertools;
use quick_xml::events::Event;
use quick_xml::Reader;
use structopt::StructOpt;

/// Fetch memory and connector statistics from the Tomcat manager status
/// page and print them as key:value pairs for cacti.
#[derive(StructOpt, Debug)]
#[structopt(name = "query-tomcat-stats (part of devco-plugins)")]
struct Args {
    #[structopt(long = "user", short = "u", help = "Connect as user")]
    user: Option<String>,
    #[structopt(long = "password", short = "p", help = "Password to connect with")]
    password: Option<String>,
    #[structopt(
        long = "url",
        short = "U",
        default_value = "http://localhost/manager/status/",
        help = "Tomcat manager status url"
    )]
    url: String,
    #[structopt(
        long = "connector",
        default_value = "http-8080",
        help = "Connector to monitor"
    )]
    connector: String,
}

/// Pull the interesting attributes out of the status document: everything
/// on `<jvm><memory/>` (prefixed `memory_`) and everything on the named
/// connector's `<threadInfo/>`.
fn parse_status(xml: &str, connector: &str) -> Result<Vec<(String, String)>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_jvm = false;
    let mut in_wanted_connector = false;
    let mut memory: Vec<(String, String)> = Vec::new();
    let mut threads: Vec<(String, String)> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "jvm" => in_jvm = true,
                    "memory" if in_jvm => {
                        for attr in e.attributes() {
                            let attr = attr.map_err(|err| err.to_string())?;
                            memory.push((
                                format!("memory_{}", String::from_utf8_lossy(attr.key.as_ref())),
                                attr.unescape_value()
                                    .map_err(|err| err.to_string())?
                                    .into_owned(),
                            ));
                        }
                    }
                    "connector" => {
                        for attr in e.attributes() {
                            let attr = attr.map_err(|err| err.to_string())?;
                            if attr.key.as_ref() == b"name" {
                                let value = attr
                                    .unescape_value()
                                    .map_err(|err| err.to_string())?;
                                in_wanted_connector = value == connector;
                            }
                        }
                    }
                    "threadInfo" if in_wanted_connector => {
                        for attr in e.attributes() {
                            let attr = attr.map_err(|err| err.to_string())?;
                            threads.push((
                                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                                attr.unescape_value()
                                    .map_err(|err| err.to_string())?
                                    .into_owned(),
                            ));
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"jvm" => in_jvm = false,
                b"connector" => in_wanted_connector = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if memory.is_empty() {
        return Err("could not find jvm memory statistics".to_owned());
    }
    if threads.is_empty() {
        return Err(format!("could not find connector {}", connector));
    }
    memory.extend(threads);
    Ok(memory)
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

fn fetch_status(args: &Args) -> Result<String, String> {
    let url = format!("{}?XML=true", args.url);
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| e.to_string())?;
    let mut request = client.get(&url);
    if let (Some(user), Some(password)) = (args.user.as_ref(), args.password.as_ref()) {
        request = request.basic_auth(user, Some(password));
    }
    let response = request
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
    let xml = fetch_status(&args).unwrap_or_else(|message| {
        println!("{}", message);
        process::exit(1);
    });
    match parse_status(&xml, &args.connector) {
        Ok(stats) => println!(
            "{}",
            stats
                .iter()
                .map(|&(ref key, ref value)| format!("{}:{}", key, value))
                .join(" ")
        ),
        Err(message) => {
            println!("{}", message);
            process::exit(1);
        }
    }
}
