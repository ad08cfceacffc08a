// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with setting up run directories.

use std::path::PathBuf;

use itertools::Itertools;
use thiserror::Error;

use crate::{
    catalog::CatalogError, config::ConfigError, io::GlobError, record::RecordError,
    toolchain::ToolchainError,
};

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("{date_key}: {} source interferogram(s) listed in {record_file} do not exist:\n{}", missing.len(), missing.iter().map(|m| format!("*  {}", m.display())).join("\n"))]
    MissingSources {
        date_key: String,
        record_file: PathBuf,
        missing: Vec<PathBuf>,
    },

    #[error("{record_file} lists {found}, but its site is configured with uses_slices = {uses_slices}")]
    KindMismatch {
        record_file: PathBuf,
        found: &'static str,
        uses_slices: bool,
    },

    #[error("{file} is not a slice record file but slices need to be reorganised for it")]
    NotSlices { file: PathBuf },

    #[error("Slice number '{slice_id}' is not an integer")]
    BadSliceNumber { slice_id: String },

    #[error("No I2S input file (slice-i2s.in or opus-i2s.in) in {dir}")]
    NoInputFile { dir: PathBuf },

    #[error("Couldn't link {dst} to {src}: {err}")]
    Link {
        src: PathBuf,
        dst: PathBuf,
        err: std::io::Error,
    },

    #[error("Couldn't create directory {dir}: {err}")]
    CreateDir { dir: PathBuf, err: std::io::Error },

    #[error("Couldn't remove directory {dir}: {err}")]
    RemoveDir { dir: PathBuf, err: std::io::Error },

    #[error("Couldn't write {file}: {err}")]
    Write { file: PathBuf, err: std::io::Error },

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
}
