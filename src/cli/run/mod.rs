// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.


use std::path::{Path, PathBuf};

use clap::Parser;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{
    common::{display_warnings, require_ggg, InfoPrinter, Warn, ARG_FILE_HELP},
    link::load_config,
};
use crate::{
    config::RunConfig,
    execute::{run_all, DateOutcome, HaltFile},
    I2sBatchError,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct RunArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// The batch config file.
    #[clap(short, long, parse(from_os_str))]
    pub(super) config: Option<PathBuf>,

    /// The number of dates to run at once. The default is 1, i.e. one date
    /// after another.
    #[clap(short = 'n', long)]
    pub(super) procs: Option<usize>,
}

impl RunArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    pub(super) fn merge(self) -> Result<RunArgs, I2sBatchError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let RunArgs {
                args_file: _,
                config,
                procs,
            } = unpack_arg_file!(arg_file);

            Ok(RunArgs {
                args_file: None,
                config: cli_args.config.or(config),
                procs: cli_args.procs.or(procs),
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn run(self, ggg_path: Option<&Path>, dry_run: bool) -> Result<(), I2sBatchError> {
        debug!("{:#?}", self);
        let config = load_config(self.config)?;
        let ggg = require_ggg(ggg_path)?;
        let procs = match self.procs {
            Some(0) => {
                "--procs 0 was given; running one date at a time".warn();
                1
            }
            Some(n) => n,
            None => 1,
        };
        let halt = HaltFile::new(&config.halt_file);

        let mut printer = InfoPrinter::new("Running I2S".into());
        printer.push_line(format!("{} dates, {procs} at a time", config.num_dates()).into());
        printer.push_line(
            format!(
                "To stop early, run \"i2s-batch halt\" or create {}",
                halt.path().display()
            )
            .into(),
        );
        printer.display();
        display_warnings();

        let runs = run_all(&config, &ggg, &halt, procs, dry_run)?;

        let mut num_ok = 0;
        let mut num_bad_exit = 0;
        let mut num_failed = 0;
        let mut num_skipped = 0;
        let mut num_new_spectra = 0;
        for run in &runs {
            match &run.outcome {
                DateOutcome::Finished {
                    success,
                    new_spectra,
                    ..
                } => {
                    num_new_spectra += new_spectra.len();
                    if *success {
                        num_ok += 1;
                    } else {
                        num_bad_exit += 1;
                    }
                }
                DateOutcome::Failed(_) => num_failed += 1,
                DateOutcome::Skipped => num_skipped += 1,
                DateOutcome::DryRun { .. } => (),
            }
        }
        if dry_run {
            info!("Dry run -- no dates were run.");
            return Ok(());
        }
        let mut printer = InfoPrinter::new("I2S summary".into());
        printer.push_block(vec![
            format!("{num_ok} dates finished").into(),
            format!("{num_new_spectra} new spectra").into(),
        ]);
        if num_bad_exit > 0 {
            printer.push_line(format!("{num_bad_exit} dates where I2S exited with an error").into());
        }
        if num_failed > 0 {
            printer.push_line(format!("{num_failed} dates where I2S couldn't be started").into());
        }
        if num_skipped > 0 {
            printer.push_line(format!("{num_skipped} dates skipped because of a halt").into());
        }
        printer.display();
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub(super) struct HaltArgs {
    /// The batch config of the run to stop. Its halt_file (by default
    /// abort-i2s in the run top directory) is created.
    #[clap(name = "CFG_FILE", required_unless_present("halt-file"), parse(from_os_str))]
    cfg_file: Option<PathBuf>,

    /// Create this halt file instead of the config's.
    #[clap(long, name = "halt-file", parse(from_os_str))]
    halt_file: Option<PathBuf>,
}

impl HaltArgs {
    pub(super) fn run(self) -> Result<(), I2sBatchError> {
        debug!("{:#?}", self);
        let halt = match (self.halt_file, self.cfg_file) {
            (Some(f), _) => HaltFile::new(f),
            (None, Some(cfg)) => HaltFile::new(RunConfig::load(cfg)?.halt_file),
            (None, None) => {
                return Err(I2sBatchError::Run(
                    "Either a config file or --halt-file must be given".to_string(),
                ))
            }
        };
        halt.request()?;
        info!(
            "Created {}; I2S will not be started for any more dates",
            halt.path().display()
        );
        Ok(())
    }
}
