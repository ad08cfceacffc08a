// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info};

use super::common::{display_warnings, InfoPrinter, Warn};
use crate::{
    config::{build_config, update_config, write_config},
    record::RecordLayout,
    I2sBatchError,
};

#[derive(Parser, Debug, Clone)]
pub(super) struct BuildCfgArgs {
    /// The config file to write.
    #[clap(name = "CFG_FILE", parse(from_os_str))]
    cfg_file: PathBuf,

    /// The record files to make run directories for. Each file name must
    /// start with a two-letter site ID and a date (e.g. pa20190101.in); the
    /// site's settings are guessed from the files.
    #[clap(name = "RECORD_FILES", required = true, parse(from_os_str))]
    record_files: Vec<PathBuf>,

    /// An existing config file to take settings from. Only uses_slices and
    /// record_file are worked out again; sites and dates only in this file
    /// are kept.
    #[clap(short = 'c', long, parse(from_os_str))]
    old_cfg: Option<PathBuf>,

    /// Write record file paths relative to the config file's directory.
    #[clap(short, long)]
    relative_paths: bool,
}

impl BuildCfgArgs {
    pub(super) fn run(self, layout: &RecordLayout, dry_run: bool) -> Result<(), I2sBatchError> {
        debug!("{:#?}", self);
        let BuildCfgArgs {
            cfg_file,
            record_files,
            old_cfg,
            relative_paths,
        } = self;

        let doc = build_config(
            &cfg_file,
            &record_files,
            old_cfg.as_deref(),
            relative_paths,
            layout,
        )?;

        let sites = doc.get("Sites").and_then(|s| s.as_table());
        let mut printer = InfoPrinter::new(format!("Config for {}", cfg_file.display()).into());
        if let Some(sites) = sites {
            for (site, dates) in sites {
                let num_dates = dates
                    .as_table()
                    .map(|t| t.values().filter(|v| v.is_table()).count())
                    .unwrap_or(0);
                printer.push_line(format!("{site}: {num_dates} dates").into());
            }
        }
        printer.display();

        let run_top_dir_unset = doc
            .get("Run")
            .and_then(|r| r.get("run_top_dir"))
            .and_then(|d| d.as_str())
            .map(str::is_empty)
            .unwrap_or(true);
        if run_top_dir_unset {
            format!(
                "run_top_dir, site_root_dir and flimit_file need to be filled in in {} before linking",
                cfg_file.display()
            )
            .warn();
        }
        display_warnings();

        if dry_run {
            info!("Dry run -- not writing {}", cfg_file.display());
            return Ok(());
        }
        write_config(&doc, &cfg_file)?;
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub(super) struct UpdateCfgArgs {
    /// The config file to update.
    #[clap(name = "CFG_FILE", parse(from_os_str))]
    cfg_file: PathBuf,

    /// The new record files. Dates are matched on the site ID and date at the
    /// start of each file name.
    #[clap(name = "RECORD_FILES", required = true, parse(from_os_str))]
    record_files: Vec<PathBuf>,

    /// Write the updated config here instead of overwriting CFG_FILE.
    #[clap(short = 'c', long, parse(from_os_str))]
    new_cfg: Option<PathBuf>,

    /// Keep dates that don't have a new record file (with their old one).
    /// Normally they are removed.
    #[clap(short, long)]
    keep_missing: bool,
}

impl UpdateCfgArgs {
    pub(super) fn run(self, dry_run: bool) -> Result<(), I2sBatchError> {
        debug!("{:#?}", self);
        let UpdateCfgArgs {
            cfg_file,
            record_files,
            new_cfg,
            keep_missing,
        } = self;

        let doc = update_config(&cfg_file, &record_files, keep_missing)?;
        let dest = new_cfg.unwrap_or_else(|| cfg_file.clone());
        if dry_run {
            info!("Dry run -- not writing {}", dest.display());
            return Ok(());
        }
        write_config(&doc, &dest)?;
        Ok(())
    }
}
