//! The /proc files the plugins read
//!
//! Only `/proc/diskstats` today. Each line is `major minor device` followed
//! by eleven I/O counters; the SNMP exec wrapper wants the raw fields of
//! one device's line, so that is what [`DiskStats`] keeps.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};

/// Errors loading stats out of /proc
#[derive(Debug)]
pub enum ProcFsError {
    Io(io::Error),
    /// No diskstats line for the requested device
    DeviceNotFound(String),
}

impl fmt::Display for ProcFsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ProcFsError::Io(ref e) => write!(f, "{}", e),
            ProcFsError::DeviceNotFound(ref device) => {
                write!(f, "could not find stats for device {}", device)
            }
        }
    }
}

impl From<io::Error> for ProcFsError {
    fn from(e: io::Error) -> ProcFsError {
        ProcFsError::Io(e)
    }
}

/// One device's line from /proc/diskstats, split into fields
#[derive(Debug, PartialEq)]
pub struct DiskStats {
    pub device: String,
    pub fields: Vec<String>,
}

impl DiskStats {
    /// Read /proc/diskstats and pull out the line for `device`
    pub fn load(device: &str) -> Result<DiskStats, ProcFsError> {
        let mut contents = String::new();
        File::open("/proc/diskstats")?.read_to_string(&mut contents)?;
        DiskStats::from_contents(&contents, device)
    }

    /// Find `device`'s line in diskstats-shaped contents
    ///
    /// The device name is the third field; partial matches ("sda" against
    /// "sda1") don't count.
    pub fn from_contents(contents: &str, device: &str) -> Result<DiskStats, ProcFsError> {
        for line in contents.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.get(2) == Some(&device) {
                return Ok(DiskStats {
                    device: device.to_owned(),
                    fields: fields.into_iter().map(str::to_owned).collect(),
                });
            }
        }
        Err(ProcFsError::DeviceNotFound(device.to_owned()))
    }
}
