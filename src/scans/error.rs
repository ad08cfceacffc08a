// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with grouping slices into scans and generating catalogs.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::{
    catalog::{CatalogError, UndeterminedKind},
    config::ConfigError,
    record::RecordError,
};

#[derive(Error, Debug)]
pub enum ScanGroupError {
    #[error("No slice run directories in {dir} for the date range {start} to {end}")]
    Setup {
        dir: PathBuf,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("No slice run directories (YYMMDD.R) were found in {dir}")]
    NoRunDirs { dir: PathBuf },

    #[error("Couldn't interpret {name} '{input}': {reason}. Acceptable formats are YYMMDD or YYYYMMDD, optionally followed by .RUN")]
    BadBound {
        name: &'static str,
        input: String,
        reason: String,
    },

    #[error("Cannot include a run number as part of the {which} date and give a separate {which} run; only one may be given")]
    RunGivenTwice { which: &'static str },

    #[error("The {which} run cannot be less than 1")]
    RunTooSmall { which: &'static str },

    #[error("The start ({start}) is after the end ({end})")]
    BackwardsRange { start: String, end: String },

    #[error("{template} has no header parameter 1 to get the slice directory from")]
    NoSliceDir { template: PathBuf },

    #[error("Catalog line has no date to split on: {line}")]
    NoDate { line: String },

    #[error("Couldn't tell whether the catalog lists slices or full interferograms: {0:?}")]
    Undetermined(UndeterminedKind),

    #[error("Couldn't read directory {dir}: {err}")]
    ReadDir { dir: PathBuf, err: std::io::Error },

    #[error("Couldn't read {file}: {err}")]
    Read { file: PathBuf, err: std::io::Error },

    #[error("Couldn't write {file}: {err}")]
    Write { file: PathBuf, err: std::io::Error },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
