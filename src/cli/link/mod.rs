// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.


use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use clap::Parser;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::common::{
    display_warnings, optional_ggg, require_ggg, InfoPrinter, Warn, ARG_FILE_HELP,
};
use crate::{
    config::RunConfig,
    materialize::{
        check_links, write_parallel_script, LinkOptions, LinkOutcome, Materializer,
        PARALLEL_SCRIPT_NAME,
    },
    record::RecordLayout,
    I2sBatchError,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct LinkArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// The batch config file.
    #[clap(short, long, parse(from_os_str))]
    pub(super) config: Option<PathBuf>,

    /// Replace existing links.
    #[clap(short, long)]
    #[serde(default)]
    pub(super) overwrite: bool,

    /// Skip (with a warning) dates whose interferograms aren't all there.
    /// Normally such dates fail.
    #[clap(short, long)]
    #[serde(default)]
    pub(super) ignore_missing: bool,

    /// Delete the existing igms/slices directory of each date first.
    #[clap(long)]
    #[serde(default)]
    pub(super) clean_links: bool,

    /// Delete the existing spectra directory of each date first.
    #[clap(long)]
    #[serde(default)]
    pub(super) clean_spectra: bool,

    /// Don't write a script for GNU parallel (multii2s.sh in the run top
    /// directory) after linking.
    #[clap(long)]
    #[serde(default)]
    pub(super) no_runscript: bool,
}

impl LinkArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    pub(super) fn merge(self) -> Result<LinkArgs, I2sBatchError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Read in the file arguments. Ensure all of the file args are
            // accounted for by pattern matching.
            let LinkArgs {
                args_file: _,
                config,
                overwrite,
                ignore_missing,
                clean_links,
                clean_spectra,
                no_runscript,
            } = unpack_arg_file!(arg_file);

            // Merge all the arguments, preferring the CLI args when available.
            Ok(LinkArgs {
                args_file: None,
                config: cli_args.config.or(config),
                overwrite: cli_args.overwrite || overwrite,
                ignore_missing: cli_args.ignore_missing || ignore_missing,
                clean_links: cli_args.clean_links || clean_links,
                clean_spectra: cli_args.clean_spectra || clean_spectra,
                no_runscript: cli_args.no_runscript || no_runscript,
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn run(
        self,
        ggg_path: Option<&Path>,
        layout: &RecordLayout,
        dry_run: bool,
    ) -> Result<(), I2sBatchError> {
        debug!("{:#?}", self);
        let LinkArgs {
            args_file: _,
            config,
            overwrite,
            ignore_missing,
            clean_links,
            clean_spectra,
            no_runscript,
        } = self;

        let config = load_config(config)?;
        let ggg = optional_ggg(ggg_path)?;
        let options = LinkOptions {
            overwrite,
            clean_links,
            clean_spectra,
            ignore_missing,
        };

        let mut printer = InfoPrinter::new("Linking".into());
        printer.push_line(
            format!(
                "{} dates from {} sites into {}",
                config.num_dates(),
                config.sites.len(),
                config.run_top_dir.display()
            )
            .into(),
        );
        let mut block: Vec<Cow<'static, str>> = vec![];
        if overwrite {
            block.push("Overwriting existing links".into());
        }
        if clean_links {
            block.push("Deleting existing igms/slices directories".into());
        }
        if clean_spectra {
            block.push("Deleting existing spectra directories".into());
        }
        if ignore_missing {
            block.push("Skipping dates with missing interferograms".into());
        }
        printer.push_block(block);
        printer.display();
        display_warnings();

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let mut materializer = Materializer::new(&config, options).with_layout(layout.clone());
        if let Some(ggg) = &ggg {
            materializer = materializer.with_toolchain(ggg);
        }
        let results = materializer.link_all();

        let mut num_linked = 0;
        let mut num_skipped = 0;
        let mut failed = vec![];
        for r in &results {
            match &r.result {
                Ok(LinkOutcome::Linked { .. }) => num_linked += 1,
                Ok(LinkOutcome::SkippedMissing { .. }) => num_skipped += 1,
                Err(_) => failed.push(r.date_key.clone()),
            }
        }
        let mut printer = InfoPrinter::new("Linking summary".into());
        printer.push_line(format!("{num_linked} dates ready to run").into());
        if num_skipped > 0 {
            printer.push_line(format!("{num_skipped} dates skipped (missing interferograms)").into());
        }
        if !failed.is_empty() {
            printer.push_line(format!("{} dates failed: {}", failed.len(), failed.join(", ")).into());
        }
        printer.display();

        if !no_runscript {
            match &ggg {
                Some(ggg) => {
                    let script = config.run_top_dir.join(PARALLEL_SCRIPT_NAME);
                    if let Err(e) = write_parallel_script(&config, ggg, &script, false) {
                        format!("Couldn't write {}: {e}", script.display()).warn();
                    }
                }
                None => "Not writing a GNU parallel script without a GGG install".warn(),
            }
            display_warnings();
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub(super) struct CheckLinksArgs {
    /// The batch config file.
    #[clap(name = "CFG_FILE", parse(from_os_str))]
    cfg_file: PathBuf,

    /// How much to report. 0: nothing, 1: dates missing something per site,
    /// 2: also the number missing per date, 3: also everything missing.
    #[clap(short, long, default_value = "1")]
    dump_level: u8,
}

impl CheckLinksArgs {
    pub(super) fn run(self, layout: &RecordLayout) -> Result<(), I2sBatchError> {
        debug!("{:#?}", self);
        let config = RunConfig::load(&self.cfg_file)?;
        let report = check_links(&config, layout)?;
        report.log(self.dump_level);

        match report.num_dates_missing() {
            0 => {
                info!("All {} dates have everything linked", report.dates.len());
                Ok(())
            }
            n => Err(I2sBatchError::CheckLinks(format!(
                "{n} of {} dates are missing interferograms or slices",
                report.dates.len()
            ))),
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub(super) struct ParFileArgs {
    /// The batch config file.
    #[clap(name = "CFG_FILE", parse(from_os_str))]
    cfg_file: PathBuf,

    /// Where to write the script. The default is multii2s.sh in the run top
    /// directory.
    #[clap(name = "SCRIPT", parse(from_os_str))]
    script: Option<PathBuf>,

    /// Use absolute paths to run directories. Normally they are relative to
    /// the script's directory.
    #[clap(short, long)]
    abspaths: bool,
}

impl ParFileArgs {
    pub(super) fn run(self, ggg_path: Option<&Path>, dry_run: bool) -> Result<(), I2sBatchError> {
        debug!("{:#?}", self);
        let config = RunConfig::load(&self.cfg_file)?;
        let ggg = require_ggg(ggg_path)?;
        let script = self
            .script
            .unwrap_or_else(|| config.run_top_dir.join(PARALLEL_SCRIPT_NAME));
        if dry_run {
            info!("Dry run -- not writing {}", script.display());
            return Ok(());
        }
        write_parallel_script(&config, &ggg, &script, self.abspaths)?;
        info!("Run with e.g.: parallel -j 4 < {}", script.display());
        Ok(())
    }
}

/// Load the batch config given by `--config` (or an arguments file).
pub(super) fn load_config(config: Option<PathBuf>) -> Result<RunConfig, I2sBatchError> {
    match config {
        Some(c) => Ok(RunConfig::load(c)?),
        None => Err(I2sBatchError::Config(
            "No batch config file was given (--config)".to_string(),
        )),
    }
}
