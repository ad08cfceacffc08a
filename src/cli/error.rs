// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all i2s-batch-related errors. This should be the *only*
//! error enum that is publicly visible.

use thiserror::Error;

use crate::{
    catalog::CatalogError,
    config::ConfigError,
    execute::ExecuteError,
    io::GlobError,
    materialize::MaterializeError,
    record::RecordError,
    scans::ScanGroupError,
    toolchain::ToolchainError,
};

/// The *only* publicly visible error from i2s-batch. Each error message should
/// point at the help of the relevant subcommand, unless it's "generic".
#[derive(Error, Debug)]
pub enum I2sBatchError {
    /// An error in the header or catalog of a record (I2S input) file.
    #[error("{0}\n\nSee for more info: i2s-batch mod-records --help")]
    Record(String),

    /// An error in a batch config file.
    #[error("{0}\n\nSee for more info: i2s-batch build-cfg --help")]
    Config(String),

    /// An error while collecting scans from run directories.
    #[error("{0}\n\nSee for more info: i2s-batch slice-catalog --help")]
    Scans(String),

    /// An error while splitting a catalog into many record files.
    #[error("{0}\n\nSee for more info: i2s-batch split-catalog --help")]
    Split(String),

    /// An error while setting up run directories.
    #[error("{0}\n\nSee for more info: i2s-batch link --help")]
    Link(String),

    /// Run directories are missing some of their links.
    #[error("{0}\n\nRe-run i2s-batch link, or see for more info: i2s-batch check-links --help")]
    CheckLinks(String),

    /// An error while running I2S.
    #[error("{0}\n\nSee for more info: i2s-batch run --help")]
    Run(String),

    /// An error related to the GGG install.
    #[error("{0}\n\nThe GGG install is given by --ggg-path or $GGGPATH")]
    Toolchain(String),

    /// An error related to argument files.
    #[error("{0}\n\nArgument files are only supported by the link and run subcommands")]
    ArgFile(String),

    /// A generic error that can't be clarified further with documentation, e.g.
    /// IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

impl From<CatalogError> for I2sBatchError {
    fn from(e: CatalogError) -> Self {
        Self::Record(e.to_string())
    }
}

impl From<RecordError> for I2sBatchError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Catalog(e) => Self::from(e),
            RecordError::Read { .. } | RecordError::Write { .. } => Self::Generic(e.to_string()),
            RecordError::ParamLineCount { .. }
            | RecordError::Validation { .. }
            | RecordError::MissingParam { .. }
            | RecordError::CatalogStart { .. } => Self::Record(e.to_string()),
        }
    }
}

impl From<ConfigError> for I2sBatchError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Record(e) => Self::from(e),
            ConfigError::Read { .. } | ConfigError::Write { .. } => Self::Generic(e.to_string()),
            ConfigError::Parse { .. }
            | ConfigError::Invalid { .. }
            | ConfigError::MissingField { .. }
            | ConfigError::SiteDate { .. }
            | ConfigError::UnknownSite { .. }
            | ConfigError::NoSiteDate { .. }
            | ConfigError::Serialise(_) => Self::Config(e.to_string()),
        }
    }
}

impl From<ScanGroupError> for I2sBatchError {
    fn from(e: ScanGroupError) -> Self {
        match e {
            ScanGroupError::Catalog(e) => Self::from(e),
            ScanGroupError::Record(e) => Self::from(e),
            ScanGroupError::Config(e) => Self::from(e),
            ScanGroupError::ReadDir { .. }
            | ScanGroupError::Read { .. }
            | ScanGroupError::Write { .. } => Self::Generic(e.to_string()),
            ScanGroupError::NoDate { .. } | ScanGroupError::Undetermined(_) => {
                Self::Split(e.to_string())
            }
            ScanGroupError::Setup { .. }
            | ScanGroupError::NoRunDirs { .. }
            | ScanGroupError::BadBound { .. }
            | ScanGroupError::RunGivenTwice { .. }
            | ScanGroupError::RunTooSmall { .. }
            | ScanGroupError::BackwardsRange { .. }
            | ScanGroupError::NoSliceDir { .. } => Self::Scans(e.to_string()),
        }
    }
}

impl From<MaterializeError> for I2sBatchError {
    fn from(e: MaterializeError) -> Self {
        match e {
            MaterializeError::Glob(e) => Self::from(e),
            MaterializeError::Catalog(e) => Self::from(e),
            MaterializeError::Config(e) => Self::from(e),
            MaterializeError::Record(e) => Self::from(e),
            MaterializeError::Toolchain(e) => Self::from(e),
            MaterializeError::MissingSources { .. }
            | MaterializeError::KindMismatch { .. }
            | MaterializeError::NotSlices { .. }
            | MaterializeError::BadSliceNumber { .. } => Self::Link(e.to_string()),
            MaterializeError::NoInputFile { .. } => Self::CheckLinks(e.to_string()),
            MaterializeError::Link { .. }
            | MaterializeError::CreateDir { .. }
            | MaterializeError::RemoveDir { .. }
            | MaterializeError::Write { .. } => Self::Generic(e.to_string()),
        }
    }
}

impl From<ExecuteError> for I2sBatchError {
    fn from(e: ExecuteError) -> Self {
        match e {
            ExecuteError::Config(e) => Self::from(e),
            ExecuteError::Toolchain(e) => Self::from(e),
            ExecuteError::ClearHalt { .. } | ExecuteError::WriteHalt { .. } => {
                Self::Generic(e.to_string())
            }
            ExecuteError::ThreadPool { .. } => Self::Run(e.to_string()),
        }
    }
}

impl From<ToolchainError> for I2sBatchError {
    fn from(e: ToolchainError) -> Self {
        Self::Toolchain(e.to_string())
    }
}

impl From<GlobError> for I2sBatchError {
    fn from(e: GlobError) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<std::io::Error> for I2sBatchError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
