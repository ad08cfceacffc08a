// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info};

use super::common::display_warnings;
use crate::{
    io::write_via_temp_file,
    record::{concat_record_files, patch_record_headers, CatalogStart, RecordLayout},
    scans::{
        add_slice_catalog, read_header_and_scan_list, write_split_batch, RangeRequest, SplitBy,
        DEFAULT_SCAN_TYPE,
    },
    I2sBatchError,
};

#[derive(Parser, Debug, Clone)]
pub(super) struct HeaderCatalogArgs {
    /// Where to write the header (from the first record file).
    #[clap(name = "HEADER_FILE", parse(from_os_str))]
    header_file: PathBuf,

    /// Where to write the catalog lines of all record files.
    #[clap(name = "CATALOG_FILE", parse(from_os_str))]
    catalog_file: PathBuf,

    /// The record files to combine. Each must have a catalog of only slices
    /// or only full interferograms.
    #[clap(name = "RECORD_FILES", required = true, parse(from_os_str))]
    record_files: Vec<PathBuf>,
}

impl HeaderCatalogArgs {
    pub(super) fn run(self, layout: &RecordLayout, dry_run: bool) -> Result<(), I2sBatchError> {
        debug!("{:#?}", self);
        let combined = concat_record_files(&self.record_files, layout)?;
        info!(
            "{} header lines and {} catalog lines from {} record files",
            combined.header_lines.len(),
            combined.catalog_lines.len(),
            self.record_files.len()
        );
        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        for (file, lines) in [
            (&self.header_file, &combined.header_lines),
            (&self.catalog_file, &combined.catalog_lines),
        ] {
            let mut text = lines.join("\n");
            text.push('\n');
            write_via_temp_file(file, &text).map_err(|e| {
                I2sBatchError::Generic(format!("Couldn't write {}: {e}", file.display()))
            })?;
            info!("Wrote {}", file.display());
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub(super) struct SplitCatalogArgs {
    /// The two-letter ID of the site the scans are from.
    #[clap(name = "SITE_ID")]
    site: String,

    /// Where to write the split record files and their config.
    #[clap(name = "OUTPUT_DIR", parse(from_os_str))]
    output_dir: PathBuf,

    /// Record files to take the header (from the first) and the catalogs (from
    /// all) from.
    #[clap(name = "RECORD_FILES", parse(from_os_str))]
    files: Vec<PathBuf>,

    /// Take the header from this file instead of record files. The file holds
    /// the header lines of a record file, e.g. from header-catalog.
    #[clap(long, requires("scans"), conflicts_with("RECORD_FILES"), parse(from_os_str))]
    header: Option<PathBuf>,

    /// Take the catalog lines from this file instead of record files.
    #[clap(long, requires("header"), parse(from_os_str))]
    scans: Option<PathBuf>,

    /// Make one record file per day (D), month (M) or year (Y).
    #[clap(short = 's', long, default_value = "D")]
    split_by: SplitBy,

    /// The catalog lists slices. Normally this is worked out from the
    /// catalog.
    #[clap(long = "is-slices", conflicts_with("opus"))]
    slices: bool,

    /// The catalog lists full interferograms (e.g. OPUS files).
    #[clap(long = "is-opus")]
    opus: bool,
}

impl SplitCatalogArgs {
    pub(super) fn run(self, layout: &RecordLayout, dry_run: bool) -> Result<(), I2sBatchError> {
        debug!("{:#?}", self);
        let SplitCatalogArgs {
            site,
            output_dir,
            files,
            header,
            scans,
            split_by,
            slices,
            opus,
        } = self;

        let (header_lines, catalog_lines) = match (header, scans) {
            (Some(header), Some(scans)) => read_header_and_scan_list(&header, &scans)?,
            _ if files.is_empty() => {
                return Err(I2sBatchError::Split(
                    "Either record files or both --header and --scans must be given".to_string(),
                ))
            }
            _ => {
                let combined = concat_record_files(&files, layout)?;
                (combined.header_lines, combined.catalog_lines)
            }
        };
        let is_slices = match (slices, opus) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        display_warnings();

        info!(
            "Splitting {} scans for site {site} by {split_by}",
            catalog_lines.len()
        );
        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }
        let cfg_file = write_split_batch(
            &output_dir,
            &site,
            &header_lines,
            &catalog_lines,
            is_slices,
            split_by,
            layout,
        )?;
        info!("Config for the split record files is {}", cfg_file.display());
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub(super) struct PatchRecordsArgs {
    /// The record file to copy the header from.
    #[clap(name = "HEADER_EXAMPLE", parse(from_os_str))]
    header_example: PathBuf,

    /// Where to write the new record files. They get the same names as the
    /// files their catalogs come from.
    #[clap(name = "SAVE_DIR", parse(from_os_str))]
    save_dir: PathBuf,

    /// The record files to copy the catalogs from.
    #[clap(name = "CATALOG_FILES", required = true, parse(from_os_str))]
    catalog_files: Vec<PathBuf>,

    /// Where the catalogs start in the catalog files: a parameter number (e.g.
    /// 29) or "l" and a line number (e.g. l239). Line numbers need every
    /// catalog file to have the same number of header lines, but work with
    /// files whose parameters span a different number of lines. The default
    /// is the parameter after the header.
    #[clap(short = 'c', long)]
    catalog_start: Option<CatalogStart>,

    /// Replace files that already exist in the save directory.
    #[clap(short, long)]
    overwrite: bool,
}

impl PatchRecordsArgs {
    pub(super) fn run(self, layout: &RecordLayout, dry_run: bool) -> Result<(), I2sBatchError> {
        debug!("{:#?}", self);
        let start = self
            .catalog_start
            .unwrap_or_else(|| CatalogStart::after_header(layout));
        if dry_run {
            info!(
                "Dry run -- would give {} record files the header of {}",
                self.catalog_files.len(),
                self.header_example.display()
            );
            return Ok(());
        }
        let written = patch_record_headers(
            &self.header_example,
            &self.catalog_files,
            &self.save_dir,
            start,
            self.overwrite,
            layout,
        )?;
        info!(
            "Wrote {} of {} record files to {}",
            written.len(),
            self.catalog_files.len(),
            self.save_dir.display()
        );
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub(super) struct SliceCatalogArgs {
    /// A slice record file to copy the header from.
    #[clap(name = "TEMPLATE", parse(from_os_str))]
    template: PathBuf,

    /// Where to write the new record file.
    #[clap(name = "OUTPUT", parse(from_os_str))]
    output: PathBuf,

    /// The directory holding the YYMMDD.R run directories. The default is
    /// header parameter 1 of the template, relative to the template's
    /// directory.
    #[clap(short = 'd', long, parse(from_os_str))]
    slice_dir: Option<PathBuf>,

    /// The first run directory to use, as YYMMDD or YYYYMMDD, optionally with
    /// the run number (e.g. 190101.2). The default is the earliest.
    #[clap(short, long)]
    start: Option<String>,

    /// The last run directory to use, like --start. The default is the
    /// latest.
    #[clap(short, long)]
    end: Option<String>,

    /// The run number of the start date, if not given with --start.
    #[clap(long)]
    start_run: Option<u32>,

    /// The run number of the end date, if not given with --end.
    #[clap(long)]
    end_run: Option<u32>,

    /// The scan type (as in the run logs) to collect.
    #[clap(short = 't', long, default_value = DEFAULT_SCAN_TYPE)]
    scan_type: String,
}

impl SliceCatalogArgs {
    pub(super) fn run(self, layout: &RecordLayout, dry_run: bool) -> Result<(), I2sBatchError> {
        debug!("{:#?}", self);
        let SliceCatalogArgs {
            template,
            output,
            slice_dir,
            start,
            end,
            start_run,
            end_run,
            scan_type,
        } = self;

        let request = RangeRequest {
            start,
            end,
            start_run,
            end_run,
        };
        if dry_run {
            info!(
                "Dry run -- would write {scan_type} scans from {} to {}",
                template.display(),
                output.display()
            );
            return Ok(());
        }
        add_slice_catalog(
            &template,
            &output,
            slice_dir.as_deref(),
            &request,
            &scan_type,
            layout,
        )?;
        Ok(())
    }
}
