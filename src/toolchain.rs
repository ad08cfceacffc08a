// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Where the external I2S toolchain lives.
//!
//! Nothing here reads the environment; the CLI decides where the toolchain is
//! (e.g. from `--ggg-path` or `$GGGPATH`) and hands a locator to the code that
//! needs one.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// The name of the I2S executable.
pub const I2S_EXECUTABLE: &str = "i2s";

/// Finds executables and data files of an installed toolchain.
pub trait ToolchainLocator: Sync {
    /// The path to the executable `name`. The path may not exist.
    fn executable(&self, name: &str) -> PathBuf;

    /// The path to a data subdirectory, e.g. `["i2s"]` for I2S's own files.
    fn data_subdir(&self, parts: &[&str]) -> PathBuf;

    /// Like [`ToolchainLocator::executable`], but the executable must exist.
    fn existing_executable(&self, name: &str) -> Result<PathBuf, ToolchainError> {
        let exe = self.executable(name);
        if exe.is_file() {
            Ok(exe)
        } else {
            Err(ToolchainError::MissingExecutable { path: exe })
        }
    }
}

/// A GGG installation: executables in `bin/`, data under subdirectories named
/// after the program using them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GggInstall {
    root: PathBuf,
}

impl GggInstall {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<GggInstall, ToolchainError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ToolchainError::NotADirectory {
                root: root.to_path_buf(),
            });
        }
        Ok(GggInstall {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ToolchainLocator for GggInstall {
    fn executable(&self, name: &str) -> PathBuf {
        self.root.join("bin").join(name)
    }

    fn data_subdir(&self, parts: &[&str]) -> PathBuf {
        parts.iter().fold(self.root.clone(), |p, part| p.join(part))
    }
}

#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("The GGG path {root} is not a directory. Please check --ggg-path or $GGGPATH")]
    NotADirectory { root: PathBuf },

    #[error("{path} does not exist; does the GGG path point to a complete install of GGG?")]
    MissingExecutable { path: PathBuf },
}
