// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Ranges of slice run directories, and slice catalogs generated from them.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::NaiveDate;
use log::{debug, info, warn};
use regex::Regex;

use super::{group_run_dir, GroupedScan, ScanGroupError};
use crate::{
    catalog::slice_run_dir_name,
    io::write_via_temp_file,
    record::{ParamOverrides, RecordFile, RecordLayout, RewriteOptions},
};

lazy_static::lazy_static! {
    static ref RUN_DIR_NAME: Regex = Regex::new(r"^(\d{6})\.(\d+)$").unwrap();
}

/// A date, optionally with a run number, e.g. `190101`, `20190101` or
/// `190101.2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunBound {
    pub date: NaiveDate,
    pub run: Option<u32>,
}

impl RunBound {
    fn parse_named(s: &str, name: &'static str) -> Result<RunBound, ScanGroupError> {
        let bad = |reason: &str| ScanGroupError::BadBound {
            name,
            input: s.to_string(),
            reason: reason.to_string(),
        };

        if s.contains('-') {
            return Err(bad("dashes are not allowed"));
        }
        let (date_str, run) = match s.split('.').collect::<Vec<_>>().as_slice() {
            [d] => (*d, None),
            [d, r] => (
                *d,
                Some(
                    r.parse::<u32>()
                        .map_err(|_| bad("the run number is not an integer"))?,
                ),
            ),
            _ => return Err(bad("more than one period")),
        };
        let format = match date_str.len() {
            6 => "%y%m%d",
            8 => "%Y%m%d",
            _ => return Err(bad("the date must have 6 or 8 digits")),
        };
        let date = NaiveDate::parse_from_str(date_str, format).map_err(|_| bad("not a valid date"))?;
        Ok(RunBound { date, run })
    }
}

impl FromStr for RunBound {
    type Err = ScanGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunBound::parse_named(s, "date")
    }
}

/// Which run directories to collect scans from. Anything unset is filled from
/// the run directories on disk.
#[derive(Debug, Clone, Default)]
pub struct RangeRequest {
    pub start: Option<String>,
    pub end: Option<String>,
    pub start_run: Option<u32>,
    pub end_run: Option<u32>,
}

/// A resolved, inclusive range of run directories. Ordering is on (date,
/// run), so `start_run` only limits `start_date` and `end_run` only limits
/// `end_date`; every run of the dates in between is in the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_run: u32,
    pub end_run: u32,
}

impl SliceRange {
    /// Whether `run` of `date` is in the range. Runs on dates strictly between
    /// the ends are always in it.
    pub fn contains(&self, date: NaiveDate, run: u32) -> bool {
        (self.start_date, self.start_run) <= (date, run) && (date, run) <= (self.end_date, self.end_run)
    }

    fn check_order(self) -> Result<SliceRange, ScanGroupError> {
        if self.start_date > self.end_date {
            return Err(ScanGroupError::BackwardsRange {
                start: self.start_date.to_string(),
                end: self.end_date.to_string(),
            });
        }
        if self.start_date == self.end_date && self.start_run > self.end_run {
            return Err(ScanGroupError::BackwardsRange {
                start: format!("{} run {}", self.start_date, self.start_run),
                end: format!("{} run {}", self.end_date, self.end_run),
            });
        }
        Ok(self)
    }
}

/// The parsed bounds of a [`RangeRequest`].
struct Bounds {
    start: Option<RunBound>,
    end: Option<RunBound>,
    start_run: Option<u32>,
    end_run: Option<u32>,
}

impl Bounds {
    fn parse(request: &RangeRequest) -> Result<Bounds, ScanGroupError> {
        let start = request
            .start
            .as_deref()
            .map(|s| RunBound::parse_named(s, "start date"))
            .transpose()?;
        let end = request
            .end
            .as_deref()
            .map(|s| RunBound::parse_named(s, "end date"))
            .transpose()?;
        let start_run = finalise_run(request.start_run, start.and_then(|b| b.run), "start")?;
        let end_run = finalise_run(request.end_run, end.and_then(|b| b.run), "end")?;
        Ok(Bounds {
            start,
            end,
            start_run,
            end_run,
        })
    }

    /// The range, if every bound was given and nothing has to come from the
    /// run directories on disk.
    fn explicit_range(&self) -> Option<SliceRange> {
        Some(SliceRange {
            start_date: self.start?.date,
            end_date: self.end?.date,
            start_run: self.start_run?,
            end_run: self.end_run?,
        })
    }
}

/// List the `YYMMDD.R` directories in `slice_dir`, by date.
pub fn inventory_run_dirs(slice_dir: &Path) -> Result<BTreeMap<NaiveDate, Vec<u32>>, ScanGroupError> {
    let read_dir_err = |err| ScanGroupError::ReadDir {
        dir: slice_dir.to_path_buf(),
        err,
    };

    let mut run_dates: BTreeMap<NaiveDate, Vec<u32>> = BTreeMap::new();
    for entry in std::fs::read_dir(slice_dir).map_err(read_dir_err)? {
        let entry = entry.map_err(read_dir_err)?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let parsed = RUN_DIR_NAME.captures(&name).and_then(|caps| {
            let date = NaiveDate::parse_from_str(&caps[1], "%y%m%d").ok()?;
            let run = caps[2].parse::<u32>().ok()?;
            Some((date, run))
        });
        match parsed {
            Some((date, run)) if entry.path().is_dir() => run_dates.entry(date).or_default().push(run),
            _ => debug!(
                "Skipping {} as its name cannot be parsed as a run directory",
                entry.path().display()
            ),
        }
    }
    for runs in run_dates.values_mut() {
        runs.sort_unstable();
    }
    Ok(run_dates)
}

fn finalise_run(
    separate: Option<u32>,
    from_bound: Option<u32>,
    which: &'static str,
) -> Result<Option<u32>, ScanGroupError> {
    let run = match (separate, from_bound) {
        (Some(_), Some(_)) => return Err(ScanGroupError::RunGivenTwice { which }),
        (r, None) | (None, r) => r,
    };
    match run {
        Some(0) => Err(ScanGroupError::RunTooSmall { which }),
        r => Ok(r),
    }
}

/// Work out the concrete range for a request, using the run directories in
/// `slice_dir` for anything unset. If anything was unset, a range containing
/// no run directories is an error; a fully given range is used as is.
pub fn resolve_range(
    slice_dir: &Path,
    request: &RangeRequest,
    run_dates: &BTreeMap<NaiveDate, Vec<u32>>,
) -> Result<SliceRange, ScanGroupError> {
    let bounds = Bounds::parse(request)?;
    if let Some(range) = bounds.explicit_range() {
        return range.check_order();
    }

    let (first, last) = match (run_dates.keys().next(), run_dates.keys().next_back()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => {
            return Err(ScanGroupError::NoRunDirs {
                dir: slice_dir.to_path_buf(),
            })
        }
    };
    let start_date = bounds.start.map(|b| b.date).unwrap_or(first);
    let end_date = bounds.end.map(|b| b.date).unwrap_or(last);
    if start_date > end_date {
        return Err(ScanGroupError::BackwardsRange {
            start: start_date.to_string(),
            end: end_date.to_string(),
        });
    }
    if run_dates.range(start_date..=end_date).next().is_none() {
        return Err(ScanGroupError::Setup {
            dir: slice_dir.to_path_buf(),
            start: start_date,
            end: end_date,
        });
    }

    // Unset runs default to everything on the boundary dates.
    let start_run = bounds.start_run.unwrap_or_else(|| {
        run_dates
            .get(&start_date)
            .and_then(|r| r.first().copied())
            .unwrap_or(1)
    });
    let end_run = bounds.end_run.unwrap_or_else(|| {
        run_dates
            .get(&end_date)
            .and_then(|r| r.last().copied())
            .unwrap_or(u32::MAX)
    });
    SliceRange {
        start_date,
        end_date,
        start_run,
        end_run,
    }
    .check_order()
}

/// Group the scans of every run directory of `slice_dir` in the requested
/// range, in (date, run) order. Scans with no slices are included.
///
/// When every bound is given, the run directories named by the bounds are
/// looked at even if they don't exist (each missing one is a warning), and a
/// missing or empty `slice_dir` gives no scans rather than an error.
pub fn generate(
    slice_dir: &Path,
    request: &RangeRequest,
    scan_type: &str,
) -> Result<Vec<GroupedScan>, ScanGroupError> {
    let explicit = Bounds::parse(request)?.explicit_range().is_some();
    let run_dates = match inventory_run_dirs(slice_dir) {
        Ok(d) => d,
        Err(e) if explicit => {
            warn!("{e}; only looking for the run directories at the ends of the range");
            BTreeMap::new()
        }
        Err(e) => return Err(e),
    };
    let range = resolve_range(slice_dir, request, &run_dates)?;
    info!(
        "Collecting {scan_type} scans from {} run {} to {} run {}",
        range.start_date, range.start_run, range.end_date, range.end_run
    );

    let mut runs: BTreeSet<(NaiveDate, u32)> = run_dates
        .range(range.start_date..=range.end_date)
        .flat_map(|(&date, runs)| runs.iter().map(move |&run| (date, run)))
        .filter(|&(date, run)| range.contains(date, run))
        .collect();
    if explicit {
        runs.insert((range.start_date, range.start_run));
        runs.insert((range.end_date, range.end_run));
        if range.start_date == range.end_date {
            runs.extend((range.start_run..=range.end_run).map(|run| (range.start_date, run)));
        }
    }

    let mut scans = vec![];
    for (date, run) in runs {
        let run_dir = slice_dir.join(slice_run_dir_name(date, run));
        scans.extend(group_run_dir(&run_dir, scan_type, date, run)?);
    }
    Ok(scans)
}

/// Write a slice record file: the header of `template` followed by one catalog
/// line per scan found in the range. `slice_dir` defaults to the template's
/// parameter 1, relative to the template's directory. Returns the number of
/// scans written.
pub fn add_slice_catalog(
    template: &Path,
    dest: &Path,
    slice_dir: Option<&Path>,
    request: &RangeRequest,
    scan_type: &str,
    layout: &RecordLayout,
) -> Result<usize, ScanGroupError> {
    let record = RecordFile::read(template, layout.clone())?;
    let slice_dir: PathBuf = match slice_dir {
        Some(d) => d.to_path_buf(),
        None => {
            let param = record
                .header_param(1)
                .ok_or_else(|| ScanGroupError::NoSliceDir {
                    template: template.to_path_buf(),
                })?;
            let dir = PathBuf::from(param);
            if dir.is_absolute() {
                dir
            } else {
                template.parent().unwrap_or_else(|| Path::new(".")).join(dir)
            }
        }
    };

    let scans = generate(&slice_dir, request, scan_type)?;
    let options = RewriteOptions {
        include_catalog: false,
        catalog_dir: None,
    };
    let mut text = record.rewrite(&ParamOverrides::new(), &options)?;
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }

    let mut num_written = 0;
    for scan in &scans {
        match scan.catalog_line() {
            Some(line) => {
                // Writing to a String can't fail.
                let _ = writeln!(text, "{line}");
                num_written += 1;
            }
            None => debug!(
                "{} run {}: Skipping a scan with no slices",
                scan.date, scan.run
            ),
        }
    }

    write_via_temp_file(dest, &text).map_err(|err| ScanGroupError::Write {
        file: dest.to_path_buf(),
        err,
    })?;
    info!("Wrote {num_written} scans to {}", dest.display());
    Ok(num_written)
}
