// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Check that run directories have everything their input files list.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info};

use super::{
    MaterializeError, FULL_INPUT_FILE_NAME, IGMS_SUBDIR, SCAN_SUBDIR, SLICES_SUBDIR,
    SLICE_INPUT_FILE_NAME,
};
use crate::{
    catalog::{CatalogKind, ScanRecord},
    config::RunConfig,
    record::{RecordFile, RecordLayout},
};

/// What one date's run directory is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateLinkCheck {
    pub site: String,
    pub date_key: String,
    /// Interferogram file names, or the first slice numbers of scans.
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkCheckReport {
    pub dates: Vec<DateLinkCheck>,
}

impl LinkCheckReport {
    /// The number of dates missing at least one interferogram or slice.
    pub fn num_dates_missing(&self) -> usize {
        self.dates.iter().filter(|d| !d.missing.is_empty()).count()
    }

    /// Log the report. At `dump_level` 0 nothing is logged, 1 gives the number
    /// of dates missing something per site, 2 adds the number missing per
    /// date and 3 lists everything missing.
    pub fn log(&self, dump_level: u8) {
        if dump_level == 0 {
            return;
        }

        let mut by_site: IndexMap<&str, Vec<&DateLinkCheck>> = IndexMap::new();
        for date in &self.dates {
            by_site.entry(date.site.as_str()).or_default().push(date);
        }
        for (site, dates) in by_site {
            for date in &dates {
                if dump_level >= 2 {
                    info!("{}: {} missing", date.date_key, date.missing.len());
                }
                if dump_level >= 3 {
                    for m in &date.missing {
                        info!("  * {m}");
                    }
                }
            }
            let n_missing = dates.iter().filter(|d| !d.missing.is_empty()).count();
            info!(
                "{site}: {n_missing}/{} dates missing at least 1 igram/slice",
                dates.len()
            );
        }
    }
}

fn find_record_file(run_dir: &Path) -> Result<PathBuf, MaterializeError> {
    [SLICE_INPUT_FILE_NAME, FULL_INPUT_FILE_NAME]
        .iter()
        .map(|name| run_dir.join(name))
        .find(|f| f.exists())
        .ok_or_else(|| MaterializeError::NoInputFile {
            dir: run_dir.to_path_buf(),
        })
}

/// Check every date's run directory.
pub fn check_links(
    config: &RunConfig,
    layout: &RecordLayout,
) -> Result<LinkCheckReport, MaterializeError> {
    let mut report = LinkCheckReport::default();
    for (site, date_key) in config.dates() {
        let run_dir = config.run_dir(site, date_key)?;
        let record = RecordFile::read(find_record_file(&run_dir)?, layout.clone())?;
        let missing = match record.catalog_kind() {
            Ok(CatalogKind::Full) => missing_full(&record.catalog()?, &run_dir),
            Ok(CatalogKind::Slices) => missing_slices(&record.catalog()?, &run_dir)?,
            Err(reason) => {
                // Nothing listed, so nothing missing.
                debug!("{date_key}: no scans to check ({reason:?})");
                vec![]
            }
        };
        report.dates.push(DateLinkCheck {
            site: site.to_string(),
            date_key: date_key.to_string(),
            missing,
        });
    }
    Ok(report)
}

fn missing_full(catalog: &[ScanRecord], run_dir: &Path) -> Vec<String> {
    let igms_dir = run_dir.join(IGMS_SUBDIR);
    catalog
        .iter()
        .filter_map(|r| match r {
            ScanRecord::Full(f) => Some(f),
            ScanRecord::Slice(_) => None,
        })
        .filter_map(|f| {
            // `exists` follows links, so dangling links are missing too.
            if igms_dir.join(f.base_name()).exists() {
                None
            } else {
                Some(f.base_name().to_string())
            }
        })
        .collect()
}

/// Only the first slice of each scan (and its `.info` files) is checked;
/// scans have no fixed number of slices.
fn missing_slices(catalog: &[ScanRecord], run_dir: &Path) -> Result<Vec<String>, MaterializeError> {
    let slices_dir = run_dir.join(SLICES_SUBDIR);
    let mut missing = vec![];
    for record in catalog {
        let ScanRecord::Slice(scan) = record else {
            continue;
        };
        let scan_dir = slices_dir.join(scan.run_dir_name()?).join(SCAN_SUBDIR);
        let id = &scan.slice_id;
        let all_present = [
            format!("b{id}.0"),
            format!("b{id}.0.info"),
            format!("b{id}.1.info"),
        ]
        .iter()
        .all(|f| scan_dir.join(f).exists());
        if !all_present {
            missing.push(id.clone());
        }
    }
    Ok(missing)
}
