// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with running I2S over a batch.

use std::path::PathBuf;

use thiserror::Error;

use crate::{config::ConfigError, toolchain::ToolchainError};

#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("Couldn't remove the halt file {file}: {err}")]
    ClearHalt { file: PathBuf, err: std::io::Error },

    #[error("Couldn't write the halt file {file}: {err}")]
    WriteHalt { file: PathBuf, err: std::io::Error },

    #[error("Couldn't make a pool of {num_threads} threads: {err}")]
    ThreadPool {
        num_threads: usize,
        err: rayon::ThreadPoolBuildError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
}
