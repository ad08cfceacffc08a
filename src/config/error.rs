// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with batch config files.

use std::path::PathBuf;

use itertools::Itertools;
use thiserror::Error;

use super::SiteField;
use crate::record::RecordError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Couldn't read config file {file}: {err}")]
    Read { file: PathBuf, err: std::io::Error },

    #[error("Couldn't parse {file} as TOML: {err}")]
    Parse { file: PathBuf, err: toml::de::Error },

    #[error("There are problems with one or more options in {file}:\n{}", problems.iter().map(|p| format!("*  {p}")).join("\n"))]
    Invalid { file: PathBuf, problems: Vec<String> },

    #[error("The option '{field}' was not found in the date-specific section ({site}/{date_key}) nor the overall site section")]
    MissingField {
        field: SiteField,
        site: String,
        date_key: String,
    },

    #[error("No key matching '{date}' found in site '{site}'")]
    SiteDate { site: String, date: String },

    #[error("Site '{site}' is not in the config")]
    UnknownSite { site: String },

    #[error("{file} does not contain a site abbreviation + date string (e.g. pa20040721) in its name")]
    NoSiteDate { file: PathBuf },

    #[error("Couldn't write config file {file}: {err}")]
    Write { file: PathBuf, err: std::io::Error },

    #[error("Couldn't serialise the config: {0}")]
    Serialise(#[from] toml::ser::Error),

    #[error(transparent)]
    Record(#[from] RecordError),
}
