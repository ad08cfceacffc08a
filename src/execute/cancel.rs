// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Cooperative cancellation of a batch.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use crossbeam_utils::atomic::AtomicCell;
use log::debug;

use super::ExecuteError;

/// Something that can ask a batch to stop starting new dates.
pub trait CancellationSource: Sync {
    /// Has a halt been requested?
    fn halt_requested(&self) -> bool;

    /// Forget any earlier halt request.
    fn clear(&self) -> Result<(), ExecuteError>;
}

/// A halt requested by creating a file, e.g. from another process with
/// `i2s-batch halt`. Only the file's existence matters.
#[derive(Debug, Clone)]
pub struct HaltFile {
    path: PathBuf,
}

impl HaltFile {
    pub fn new<P: AsRef<Path>>(path: P) -> HaltFile {
        HaltFile {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Request a halt. The file is appended to, so an existing request is
    /// kept.
    pub fn request(&self) -> Result<(), ExecuteError> {
        let write_err = |err| ExecuteError::WriteHalt {
            file: self.path.clone(),
            err,
        };
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;
        writeln!(
            f,
            "Requested to abort further I2S runs at {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )
        .map_err(write_err)?;
        Ok(())
    }
}

impl CancellationSource for HaltFile {
    fn halt_requested(&self) -> bool {
        self.path.exists()
    }

    fn clear(&self) -> Result<(), ExecuteError> {
        debug!("Removing halt file ({}) if it exists", self.path.display());
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ExecuteError::ClearHalt {
                file: self.path.clone(),
                err,
            }),
        }
    }
}

/// An in-process halt request.
#[derive(Debug, Default)]
pub struct HaltFlag(AtomicCell<bool>);

impl HaltFlag {
    pub fn new() -> HaltFlag {
        HaltFlag::default()
    }

    pub fn request(&self) {
        self.0.store(true);
    }
}

impl CancellationSource for HaltFlag {
    fn halt_requested(&self) -> bool {
        self.0.load()
    }

    fn clear(&self) -> Result<(), ExecuteError> {
        self.0.store(false);
        Ok(())
    }
}

/// Shared by the workers of one batch. Once a halt is seen (or a worker
/// panics), the token stays halted for the rest of the batch, even if the
/// source is cleared.
pub struct HaltToken<'a> {
    source: &'a dyn CancellationSource,
    halted: AtomicCell<bool>,
}

impl<'a> HaltToken<'a> {
    pub fn new(source: &'a dyn CancellationSource) -> HaltToken<'a> {
        HaltToken {
            source,
            halted: AtomicCell::new(false),
        }
    }

    pub fn is_halted(&self) -> bool {
        if self.halted.load() {
            return true;
        }
        if self.source.halt_requested() {
            self.halt();
            return true;
        }
        false
    }

    pub fn halt(&self) {
        self.halted.store(true);
    }
}
