// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The scan catalog at the bottom of a record file.
//!
//! Each catalog line describes one scan. There are two kinds of line, told
//! apart only by how many whitespace-separated columns they have:
//!
//! - slice lines have exactly [`SLICE_COLUMNS`] columns (year, month, day, run
//!   and the number of the first slice of the scan);
//! - full-interferogram lines have up to [`MAX_FULL_COLUMNS`] columns, starting
//!   with the interferogram file name.
//!
//! A single record file must not mix the two.


use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;

/// The number of columns in a slice catalog line.
pub const SLICE_COLUMNS: usize = 5;

/// The maximum number of columns in a full-interferogram catalog line.
pub const MAX_FULL_COLUMNS: usize = 18;

/// One parsed catalog line.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanRecord {
    Slice(SliceScan),
    Full(FullScan),
}

/// A scan made of slices, identified by the run directory it lives in and the
/// number of its first slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceScan {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub run: u32,
    /// Kept as text; leading zeros matter when building slice file names.
    pub slice_id: String,
}

/// A scan stored as a single interferogram file, plus whatever observational
/// metadata the catalog line carries.
#[derive(Debug, Clone, PartialEq)]
pub struct FullScan {
    pub filename: String,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub run: Option<u32>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f64>,
    /// Instrument/weather telemetry (Tins, Pins, Hins, Tout, Pout, Hout, SIA,
    /// FVSI, WSPD, WDIR), passed through untouched.
    pub telemetry: Vec<String>,
    columns: usize,
}

/// Which kind of catalog a record file has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Slices,
    Full,
}

/// Why [`classify_file`] couldn't decide on a [`CatalogKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndeterminedKind {
    /// There are no scans to look at.
    NoScans,

    /// The first scan has a column count that neither kind allows.
    ColumnCount(usize),
}

impl ScanRecord {
    /// How many columns the catalog line had.
    pub fn columns(&self) -> usize {
        match self {
            ScanRecord::Slice(_) => SLICE_COLUMNS,
            ScanRecord::Full(f) => f.columns,
        }
    }

    pub fn kind(&self) -> CatalogKind {
        match self {
            ScanRecord::Slice(_) => CatalogKind::Slices,
            ScanRecord::Full(_) => CatalogKind::Full,
        }
    }
}

impl SliceScan {
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// The name of the `YYMMDD.R` directory holding this scan's slices.
    pub fn run_dir_name(&self) -> Result<String, CatalogError> {
        let date = self.date().ok_or(CatalogError::InvalidDate {
            year: self.year,
            month: self.month,
            day: self.day,
        })?;
        Ok(slice_run_dir_name(date, self.run))
    }

    /// Format this scan as a catalog line.
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.year, self.month, self.day, self.run, self.slice_id
        )
    }
}

impl FullScan {
    /// The interferogram's file name without any directory. Catalogs written
    /// on Windows use backslashes.
    pub fn base_name(&self) -> &str {
        base_name(&self.filename)
    }
}

/// `name` without any directory part, split on `/` or `\`.
pub fn base_name(name: &str) -> &str {
    name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name)
}

/// Which kind of catalog line has `columns` columns, if any.
pub fn kind_from_columns(columns: usize) -> Option<CatalogKind> {
    match columns {
        SLICE_COLUMNS => Some(CatalogKind::Slices),
        1..=MAX_FULL_COLUMNS => Some(CatalogKind::Full),
        _ => None,
    }
}

/// The name of a slice run directory, `YYMMDD.R`.
pub fn slice_run_dir_name(date: NaiveDate, run: u32) -> String {
    format!("{}.{run}", date.format("%y%m%d"))
}

/// Parse one catalog line. `file` is only used to give errors some context.
pub fn parse_record(line: &str, file: Option<&Path>) -> Result<ScanRecord, CatalogError> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    let bad_value = |column: &'static str, value: &str| CatalogError::BadValue {
        column,
        value: value.to_string(),
        line: line.trim().to_string(),
        file: describe_file(file),
    };

    match cols.len() {
        SLICE_COLUMNS => Ok(ScanRecord::Slice(SliceScan {
            year: cols[0].parse().map_err(|_| bad_value("year", cols[0]))?,
            month: cols[1].parse().map_err(|_| bad_value("month", cols[1]))?,
            day: cols[2].parse().map_err(|_| bad_value("day", cols[2]))?,
            run: cols[3].parse().map_err(|_| bad_value("run", cols[3]))?,
            slice_id: cols[4].to_string(),
        })),

        n @ 1..=MAX_FULL_COLUMNS => {
            macro_rules! opt_col {
                ($i:expr, $name:expr) => {
                    match cols.get($i) {
                        Some(v) => {
                            let v: &str = v;
                            Some(v.parse().map_err(|_| bad_value($name, v))?)
                        }
                        None => None,
                    }
                };
            }

            Ok(ScanRecord::Full(FullScan {
                filename: cols[0].to_string(),
                year: opt_col!(1, "year"),
                month: opt_col!(2, "month"),
                day: opt_col!(3, "day"),
                run: opt_col!(4, "run"),
                lat: opt_col!(5, "lat"),
                lon: opt_col!(6, "lon"),
                alt: opt_col!(7, "alt"),
                telemetry: cols.iter().skip(8).map(|s| s.to_string()).collect(),
                columns: n,
            }))
        }

        n => Err(CatalogError::ColumnCount {
            found: n,
            line: line.trim().to_string(),
            file: describe_file(file),
        }),
    }
}

/// Decide the kind of a whole catalog from its first record only. Use
/// [`validate_uniform`] to check the rest agree.
pub fn classify_file(records: &[ScanRecord]) -> Result<CatalogKind, UndeterminedKind> {
    records
        .first()
        .map(|r| r.kind())
        .ok_or(UndeterminedKind::NoScans)
}

/// Like [`classify_file`], but only counts the columns of the first unparsed
/// catalog line.
pub fn classify_lines<S: AsRef<str>>(lines: &[S]) -> Result<CatalogKind, UndeterminedKind> {
    let first = lines.first().ok_or(UndeterminedKind::NoScans)?;
    let n = first.as_ref().split_whitespace().count();
    kind_from_columns(n).ok_or(UndeterminedKind::ColumnCount(n))
}

/// Check that every record has the same number of columns as the first.
pub fn validate_uniform(records: &[ScanRecord], file: Option<&Path>) -> Result<(), CatalogError> {
    check_column_counts(records.iter().map(|r| r.columns()), file)
}

/// The same as [`validate_uniform`], but for unparsed catalog lines.
pub fn validate_uniform_lines<S: AsRef<str>>(
    lines: &[S],
    file: Option<&Path>,
) -> Result<(), CatalogError> {
    check_column_counts(
        lines.iter().map(|l| l.as_ref().split_whitespace().count()),
        file,
    )
}

fn check_column_counts<I>(mut counts: I, file: Option<&Path>) -> Result<(), CatalogError>
where
    I: Iterator<Item = usize>,
{
    let expected = match counts.next() {
        Some(n) => n,
        None => return Ok(()),
    };
    for (i, found) in counts.enumerate() {
        if found != expected {
            return Err(CatalogError::Inconsistent {
                file: describe_file(file),
                expected,
                found,
                // 1-based, and the first record was consumed above.
                index: i + 2,
            });
        }
    }
    Ok(())
}

fn describe_file(file: Option<&Path>) -> String {
    file.map(|f| f.display().to_string())
        .unwrap_or_else(|| "<no file>".to_string())
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog line in {file} had {found} columns; expected {SLICE_COLUMNS} (slices) or no more than {MAX_FULL_COLUMNS} (full interferograms). Line was: {line}")]
    ColumnCount {
        found: usize,
        line: String,
        file: String,
    },

    #[error("Couldn't parse the {column} column ('{value}') of a catalog line in {file}. Line was: {line}")]
    BadValue {
        column: &'static str,
        value: String,
        line: String,
        file: String,
    },

    #[error("Inconsistent number of columns in the catalog of {file}: the first line had {expected} but line {index} had {found}")]
    Inconsistent {
        file: String,
        expected: usize,
        found: usize,
        index: usize,
    },

    #[error("Catalog date {year}-{month}-{day} is not a valid date")]
    InvalidDate { year: i32, month: u32, day: u32 },
}
