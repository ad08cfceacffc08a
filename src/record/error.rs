// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading, validating and rewriting record files.

use std::path::PathBuf;

use itertools::Itertools;
use thiserror::Error;

use crate::catalog::CatalogError;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Parameter {param} requires {expected} line(s), but {given} were given")]
    ParamLineCount {
        param: usize,
        expected: usize,
        given: usize,
    },

    #[error("Invalid parameter overrides:\n{}", problems.iter().map(|p| format!("  - {p}")).join("\n"))]
    Validation { problems: Vec<String> },

    #[error("{file} has no header parameter {param}")]
    MissingParam { file: PathBuf, param: usize },

    #[error("'{given}' is not a catalog start; expected a parameter number (e.g. 29) or 'l' and a line number (e.g. l239)")]
    CatalogStart { given: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Couldn't read record file {file}: {err}")]
    Read { file: PathBuf, err: std::io::Error },

    #[error("Couldn't write record file {file}: {err}")]
    Write { file: PathBuf, err: std::io::Error },
}
