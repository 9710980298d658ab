//! Print one device's /proc/diskstats fields for SNMP
//!
//! Intended to run from snmpd's exec directive, which turns each output
//! line into one value:
//!
//! ```plain
//! exec .1.3.6.1.4.1.xxxxxx.1 sdaStats /usr/local/bin/diskstats-parse --device sda
//! ```

use std::process;

use structopt::StructOpt;

use devco_plugins::procfs::DiskStats;

/// Print the raw /proc/diskstats fields for a device, one per line.
#[derive(StructOpt, Debug)]
#[structopt(name = "diskstats-parse (part of devco-plugins)")]
struct Args {
    #[structopt(
        long = "device",
        short = "d",
        help = "The device to retrieve stats for, e.g. \"sda\""
    )]
    device: String,
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    match DiskStats::load(&args.device) {
        Ok(stats) => {
            for field in &stats.fields {
                println!("{}", field);
            }
        }
        Err(e) => {
            println!("Failed to parse /proc/diskstats: {}", e);
            process::exit(2);
        }
    }
}

#[cfg(test)]
mod test {
    use structopt::StructOpt;

    use super::Args;

    #[test]
    fn validate_argparse() {
        let args = Args::from_iter(vec!["diskstats-parse", "--device", "sda"]);
        assert_eq!(args.device, "sda");
        let args = Args::from_iter(vec!["diskstats-parse", "-d", "dm-0"]);
        assert_eq!(args.device, "dm-0");
    }
}
