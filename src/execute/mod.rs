// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Run I2S in every run directory of a batch.
//!
//! Run directories must already be set up (see [`crate::materialize`]).
//! Dates are run one at a time, or on a pool of worker threads; each worker
//! only launches I2S and waits for it. A halt request stops dates that
//! haven't started yet, but anything already running finishes.

mod cancel;
mod error;

pub use cancel::{CancellationSource, HaltFile, HaltFlag, HaltToken};
pub use error::ExecuteError;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::SystemTime,
};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use scopeguard::defer_on_unwind;

use crate::{
    config::RunConfig,
    materialize::{find_input_file, SPECTRA_SUBDIR},
    toolchain::{ToolchainLocator, I2S_EXECUTABLE},
    PROGRESS_BARS,
};

/// What happened for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateOutcome {
    /// I2S ran. A non-zero exit is not treated as an error of the batch.
    Finished {
        exit_code: Option<i32>,
        success: bool,
        log_file: PathBuf,
        /// Spectra that are new, or newer than before the run.
        new_spectra: Vec<String>,
    },

    /// I2S couldn't be started.
    Failed(String),

    /// A halt was requested before this date started.
    Skipped,

    /// Nothing was run; this is what would have been.
    DryRun { input_file: PathBuf, log_file: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRun {
    pub site: String,
    pub date_key: String,
    pub run_dir: PathBuf,
    pub outcome: DateOutcome,
}

/// Run I2S for every date in `config`. `concurrency` dates are run at once;
/// 1 (or 0) runs them in this thread. Any earlier halt request is cleared
/// first. Returns once every date has finished or been skipped, in config
/// order.
pub fn run_all(
    config: &RunConfig,
    toolchain: &dyn ToolchainLocator,
    halt: &dyn CancellationSource,
    concurrency: usize,
    dry_run: bool,
) -> Result<Vec<DateRun>, ExecuteError> {
    // Clear at the start rather than at the end, so that a halt requested
    // for an earlier batch that's still going isn't lost.
    if !dry_run {
        halt.clear()?;
    }
    let i2s = toolchain.existing_executable(I2S_EXECUTABLE)?;
    debug!("Will run I2S from {}", i2s.display());

    let mut dates = Vec::with_capacity(config.num_dates());
    for (site, date_key) in config.dates() {
        dates.push((site, date_key, config.run_dir(site, date_key)?));
    }

    let progress = ProgressBar::with_draw_target(
        Some(dates.len() as _),
        if PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg}: [{wide_bar:.blue}] {pos:3}/{len:3} dates ({elapsed_precise}<{eta_precise})")
            .unwrap()
            .progress_chars("=> "),
    )
    .with_position(0)
    .with_message("Running I2S");

    let token = HaltToken::new(halt);
    let run_date = |(site, date_key, run_dir): &(&str, &str, PathBuf)| {
        // A panicking worker stops the rest of the batch.
        defer_on_unwind! { token.halt(); }
        let outcome = run_one(run_dir, &i2s, &token, dry_run);
        match &outcome {
            DateOutcome::Skipped => {
                warn!("{date_key}: skipped; a halt was requested")
            }
            DateOutcome::Failed(reason) => warn!("{date_key}: I2S not run: {reason}"),
            DateOutcome::Finished {
                success: false,
                exit_code,
                log_file,
                ..
            } => warn!(
                "{date_key}: I2S exited with {}; see {}",
                exit_code.map(|c| c.to_string()).unwrap_or_else(|| "a signal".to_string()),
                log_file.display()
            ),
            _ => (),
        }
        progress.inc(1);
        DateRun {
            site: site.to_string(),
            date_key: date_key.to_string(),
            run_dir: run_dir.clone(),
            outcome,
        }
    };

    let runs: Vec<DateRun> = if concurrency <= 1 {
        dates.iter().map(run_date).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .build()
            .map_err(|err| ExecuteError::ThreadPool {
                num_threads: concurrency,
                err,
            })?;
        // One date per task, so that each date checks for a halt just before
        // it starts.
        pool.install(|| {
            dates
                .par_iter()
                .with_max_len(1)
                .map(run_date)
                .collect()
        })
    };
    progress.abandon_with_message("Finished running I2S");

    Ok(runs)
}

fn run_one(
    run_dir: &Path,
    i2s: &Path,
    token: &HaltToken,
    dry_run: bool,
) -> DateOutcome {
    // A real run clears any old halt request first, so a dry run ignores it.
    if !dry_run && token.is_halted() {
        debug!("Halt requested; not running I2S in {}", run_dir.display());
        return DateOutcome::Skipped;
    }

    let input_file = match find_input_file(run_dir) {
        Ok(f) => f,
        Err(e) => return DateOutcome::Failed(e.to_string()),
    };
    let input_name = input_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    let log_file = run_dir.join(format!(
        "run_i2s_{}.log",
        chrono::Local::now().format("%Y%m%dT%H%M%S")
    ));
    info!(
        "Starting I2S ({}) in {} using {} as input file. I2S output piped to {}",
        i2s.display(),
        run_dir.display(),
        input_name.to_string_lossy(),
        log_file.display()
    );
    if dry_run {
        return DateOutcome::DryRun {
            input_file,
            log_file,
        };
    }

    let old_spectra = list_spectra(run_dir);
    let status = std::fs::File::create(&log_file)
        .and_then(|log| Ok((log.try_clone()?, log)))
        .and_then(|(stdout, stderr)| {
            Command::new(i2s)
                .arg(&input_name)
                .current_dir(run_dir)
                .stdin(Stdio::null())
                .stdout(stdout)
                .stderr(stderr)
                .status()
        });
    let status = match status {
        Ok(s) => s,
        Err(e) => return DateOutcome::Failed(format!("couldn't run {}: {e}", i2s.display())),
    };

    let new_spectra = new_spectra(&old_spectra, &list_spectra(run_dir));
    info!(
        "{} new spectra created in {}",
        new_spectra.len(),
        run_dir.display()
    );
    debug!("New spectra are: {}", new_spectra.join(", "));
    DateOutcome::Finished {
        exit_code: status.code(),
        success: status.success(),
        log_file,
        new_spectra,
    }
}

/// Modification times of everything in a run directory's spectra directory.
pub fn list_spectra(run_dir: &Path) -> HashMap<String, SystemTime> {
    let mut spectra = HashMap::new();
    let Ok(entries) = std::fs::read_dir(run_dir.join(SPECTRA_SUBDIR)) else {
        return spectra;
    };
    for entry in entries.flatten() {
        if let Ok(mtime) = entry.metadata().and_then(|m| m.modified()) {
            spectra.insert(entry.file_name().to_string_lossy().into_owned(), mtime);
        }
    }
    spectra
}

/// Spectra in `after` that aren't in `before`, or are newer than they were,
/// sorted by name.
pub fn new_spectra(
    before: &HashMap<String, SystemTime>,
    after: &HashMap<String, SystemTime>,
) -> Vec<String> {
    let mut new: Vec<String> = after
        .iter()
        .filter(|(name, mtime)| before.get(*name).map(|old| *mtime > old).unwrap_or(true))
        .map(|(name, _)| name.clone())
        .collect();
    new.sort();
    new
}
