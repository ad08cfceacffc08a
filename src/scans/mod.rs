// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Recover which slices make up which scans.
//!
//! Each slice run directory (`YYMMDD.R`) has a log written by the instrument,
//! with lines like
//!
//! ```text
//! Mon Apr 23 17:37:59 2018: Solar
//! Mon Apr 23 17:38:40 2018: Retrieving b3621010.0: 1 sec
//! Mon Apr 23 17:39:02 2018: Request Completed
//! ```
//!
//! A scan starts with a line whose status is the scan type, lists its slices
//! and ends with "Request Completed".

mod error;
mod range;
mod split;
#[cfg(test)]
mod tests;

pub use error::ScanGroupError;
pub use range::{
    add_slice_catalog, generate, inventory_run_dirs, resolve_range, RangeRequest, RunBound,
    SliceRange,
};
pub use split::{
    read_header_and_scan_list, split_catalog_lines, write_split_batch, SplitBy, SPLIT_CONFIG_NAME,
};

use std::{
    io::BufRead,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use log::{trace, warn};
use regex::Regex;

/// The log file in every slice run directory.
pub const RUN_LOG_FILE_NAME: &str = "IFSretr.log";

/// The scan type collected unless told otherwise.
pub const DEFAULT_SCAN_TYPE: &str = "Solar";

const SCAN_COMPLETE: &str = "Request Completed";

lazy_static::lazy_static! {
    static ref SLICE_NUMBER: Regex = Regex::new(r"b(\d+)\.0").unwrap();
}

/// One scan recovered from a run log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedScan {
    pub date: NaiveDate,
    pub run: u32,
    /// Slice numbers in log order, e.g. "3621010" for `b3621010.0`.
    pub slice_ids: Vec<String>,
}

impl GroupedScan {
    /// This scan as a slice catalog line (`Y M D RUN FIRST_SLICE`), or `None`
    /// if it has no slices.
    pub fn catalog_line(&self) -> Option<String> {
        use chrono::Datelike;

        self.slice_ids.first().map(|first| {
            format!(
                "{} {} {} {} {first}",
                self.date.year(),
                self.date.month(),
                self.date.day(),
                self.run
            )
        })
    }
}

/// The status part of a run log line: everything after the third colon (the
/// timestamp has two). Lines with fewer colons give everything after the
/// first; lines without any are all status.
pub fn status_of(line: &str) -> &str {
    let status = match line.splitn(4, ':').nth(3) {
        Some(s) => s,
        None => line.split_once(':').map(|(_, s)| s).unwrap_or(line),
    };
    status.trim()
}

#[derive(Debug)]
enum GrouperState {
    Idle,
    InScan(Vec<String>),
}

/// Replays the lines of one run log.
#[derive(Debug)]
pub struct ScanGrouper<'a> {
    scan_type: &'a str,
    date: NaiveDate,
    run: u32,
    state: GrouperState,
}

impl<'a> ScanGrouper<'a> {
    pub fn new(scan_type: &'a str, date: NaiveDate, run: u32) -> ScanGrouper<'a> {
        ScanGrouper {
            scan_type,
            date,
            run,
            state: GrouperState::Idle,
        }
    }

    /// Feed one log line, getting a scan back if this line completed one.
    pub fn push_line(&mut self, line: &str) -> Option<GroupedScan> {
        let status = status_of(line);
        match &mut self.state {
            GrouperState::Idle => {
                if status == self.scan_type {
                    self.state = GrouperState::InScan(vec![]);
                }
                None
            }

            GrouperState::InScan(slices) => {
                if status == SCAN_COMPLETE {
                    let slice_ids = std::mem::take(slices);
                    self.state = GrouperState::Idle;
                    return Some(GroupedScan {
                        date: self.date,
                        run: self.run,
                        slice_ids,
                    });
                }

                match SLICE_NUMBER.captures(status) {
                    Some(caps) => slices.push(caps[1].to_string()),
                    None => {
                        warn!(
                            "Run {} {}: line inside a scan does not include a slice number; dropping this scan. Line was: {}",
                            self.date,
                            self.run,
                            line.trim_end()
                        );
                        self.state = GrouperState::Idle;
                    }
                }
                None
            }
        }
    }
}

/// Group every scan in a run log.
pub fn group_scans<R: BufRead>(
    reader: R,
    scan_type: &str,
    date: NaiveDate,
    run: u32,
) -> std::io::Result<Vec<GroupedScan>> {
    let mut grouper = ScanGrouper::new(scan_type, date, run);
    let mut scans = vec![];
    for line in reader.lines() {
        if let Some(scan) = grouper.push_line(&line?) {
            scans.push(scan);
        }
    }
    Ok(scans)
}

pub fn run_log_path(run_dir: &Path) -> PathBuf {
    run_dir.join(RUN_LOG_FILE_NAME)
}

/// Group the scans of one run directory. A missing log gives no scans and a
/// warning.
pub fn group_run_dir(
    run_dir: &Path,
    scan_type: &str,
    date: NaiveDate,
    run: u32,
) -> Result<Vec<GroupedScan>, ScanGroupError> {
    let log = run_log_path(run_dir);
    let bytes = match std::fs::read(&log) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "Cannot add data from {}, no {RUN_LOG_FILE_NAME} file",
                run_dir.display()
            );
            return Ok(vec![]);
        }
        Err(err) => return Err(ScanGroupError::Read { file: log, err }),
    };
    trace!("Read {}", log.display());
    // Logs are not always valid UTF-8.
    let text = String::from_utf8_lossy(&bytes);
    group_scans(text.as_bytes(), scan_type, date, run)
        .map_err(|err| ScanGroupError::Read { file: log, err })
}
