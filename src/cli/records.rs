// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use clap::Parser;
use log::{debug, info, trace};

use super::common::{display_warnings, with_added_extension, Warn};
use crate::{
    record::{modify_record_file, CatalogDirAction, ParamOverrides, RecordLayout, RewriteOptions},
    I2sBatchError,
};

#[derive(Parser, Debug, Clone)]
pub(super) struct ModRecordsArgs {
    /// Header parameters to change, as alternating parameter numbers and
    /// values. e.g. "-p 1 ./igms/ 2 ./spectra/" sets parameter 1 to "./igms/"
    /// and parameter 2 to "./spectra/".
    #[clap(short, long, multiple_values(true))]
    parameters: Vec<String>,

    /// The record files to change.
    #[clap(short, long, multiple_values(true), required = true, parse(from_os_str))]
    files: Vec<PathBuf>,

    /// Save the changed files here, with the same names. Normally the files
    /// are changed in place.
    #[clap(short, long, parse(from_os_str))]
    save_dir: Option<PathBuf>,

    /// Always back up the original file to <file>.bak. The default is to back
    /// up only when the original is changed in place.
    #[clap(short, long)]
    backup: bool,

    /// Never back up the original file.
    #[clap(short, long)]
    no_backup: bool,

    /// Change the directory of the full interferograms in the catalogs.
    /// Without a value, only the file names are kept; with one (e.g.
    /// "--chdir /data/igms/"), the directory is replaced. Slice catalogs are
    /// left alone.
    #[clap(long)]
    chdir: Option<Option<String>>,
}

impl ModRecordsArgs {
    pub(super) fn run(self, layout: &RecordLayout, dry_run: bool) -> Result<(), I2sBatchError> {
        debug!("{:#?}", self);
        let ModRecordsArgs {
            parameters,
            files,
            save_dir,
            backup,
            no_backup,
            chdir,
        } = self;

        if backup && no_backup {
            return Err(I2sBatchError::Generic(
                "--backup and --no-backup can't both be given".to_string(),
            ));
        }
        let overrides = ParamOverrides::try_from_pairs(&parameters)?;
        overrides.validate_against(layout)?;
        if overrides.is_empty() && chdir.is_none() {
            "No parameters or catalog changes were given; files will be rewritten unchanged"
                .warn();
        }
        let backup = match (backup, no_backup) {
            (true, _) => true,
            (_, true) => false,
            _ => save_dir.is_none(),
        };
        let options = RewriteOptions {
            include_catalog: true,
            catalog_dir: chdir.map(|dir| match dir {
                Some(d) => CatalogDirAction::Replace(d),
                None => CatalogDirAction::Strip,
            }),
        };
        display_warnings();

        if let Some(dir) = &save_dir {
            if !dry_run {
                std::fs::create_dir_all(dir).map_err(|e| {
                    I2sBatchError::Generic(format!("Couldn't create {}: {e}", dir.display()))
                })?;
            }
        }

        for file in &files {
            let dest = match &save_dir {
                Some(dir) => dir.join(file.file_name().unwrap_or(file.as_os_str())),
                None => file.clone(),
            };
            if dry_run {
                info!("Would write {} to {}", file.display(), dest.display());
                continue;
            }
            if backup {
                back_up(file)?;
            }
            modify_record_file(file, Some(&dest), layout, &overrides, &options)?;
            info!("Wrote {}", dest.display());
        }
        Ok(())
    }
}

fn back_up(file: &Path) -> Result<(), I2sBatchError> {
    let backup = with_added_extension(file, "bak");
    trace!("Backing up {} to {}", file.display(), backup.display());
    std::fs::copy(file, &backup).map_err(|e| {
        I2sBatchError::Generic(format!(
            "Couldn't back up {} to {}: {e}",
            file.display(),
            backup.display()
        ))
    })?;
    Ok(())
}
