// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Split one long catalog into many record files (one per day, month or year)
//! so they can be run in parallel.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info};
use strum_macros::{Display, EnumString};

use super::ScanGroupError;
use crate::{
    catalog::{classify_lines, parse_record, validate_uniform_lines, CatalogKind, ScanRecord},
    config::{build_config, write_config},
    io::write_via_temp_file,
    record::RecordLayout,
};

/// The name of the config written alongside split record files.
pub const SPLIT_CONFIG_NAME: &str = "i2s_parallel.toml";

/// How finely to split a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum SplitBy {
    /// One file per day.
    #[strum(serialize = "D", serialize = "d")]
    D,

    /// One file per month.
    #[strum(serialize = "M", serialize = "m")]
    M,

    /// One file per year.
    #[strum(serialize = "Y", serialize = "y")]
    Y,
}

impl SplitBy {
    /// The site date key, e.g. `pa20040721` when splitting by day.
    pub fn key(self, site: &str, date: NaiveDate) -> String {
        match self {
            SplitBy::Y => format!("{site}{:04}", date.year()),
            SplitBy::M => format!("{site}{:04}{:02}", date.year(), date.month()),
            SplitBy::D => format!("{site}{}", date.format("%Y%m%d")),
        }
    }
}

fn line_date(line: &str) -> Result<NaiveDate, ScanGroupError> {
    let date = match parse_record(line, None)? {
        ScanRecord::Slice(s) => s.date(),
        ScanRecord::Full(f) => match (f.year, f.month, f.day) {
            (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d),
            _ => None,
        },
    };
    date.ok_or_else(|| ScanGroupError::NoDate {
        line: line.to_string(),
    })
}

/// Group catalog lines by their split key, keeping line order. Lines with the
/// same key always end up in the same group, even if they aren't adjacent.
pub fn split_catalog_lines<S: AsRef<str>>(
    lines: &[S],
    site: &str,
    by: SplitBy,
) -> Result<IndexMap<String, Vec<String>>, ScanGroupError> {
    let mut splits: IndexMap<String, Vec<String>> = IndexMap::new();
    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }
        let key = by.key(site, line_date(line)?);
        splits.entry(key).or_default().push(line.to_string());
    }
    Ok(splits)
}

/// Read a file of header lines and a file with a bare catalog, e.g. for
/// [`write_split_batch`]. Lines are trimmed; blank catalog lines are dropped.
pub fn read_header_and_scan_list(
    header_file: &Path,
    scan_list: &Path,
) -> Result<(Vec<String>, Vec<String>), ScanGroupError> {
    let read = |file: &Path| {
        std::fs::read(file)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .map_err(|err| ScanGroupError::Read {
                file: file.to_path_buf(),
                err,
            })
    };
    let header_lines = read(header_file)?
        .lines()
        .map(|l| l.trim().to_string())
        .collect();
    let catalog_lines = read(scan_list)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    Ok((header_lines, catalog_lines))
}

/// Write `header_lines` plus each split of `catalog_lines` to
/// `{key}.{slice|opus}-i2s.in` in `output_dir`, then a config for all of them
/// ([`SPLIT_CONFIG_NAME`]) with paths relative to `output_dir`. If `is_slices`
/// is `None`, the catalog kind is worked out from the first line. Returns the
/// config's path.
pub fn write_split_batch<S: AsRef<str>>(
    output_dir: &Path,
    site: &str,
    header_lines: &[String],
    catalog_lines: &[S],
    is_slices: Option<bool>,
    by: SplitBy,
    layout: &RecordLayout,
) -> Result<PathBuf, ScanGroupError> {
    validate_uniform_lines(catalog_lines, None)?;
    let is_slices = match is_slices {
        Some(b) => b,
        None => classify_lines(catalog_lines).map_err(ScanGroupError::Undetermined)?
            == CatalogKind::Slices,
    };
    let kind = if is_slices { "slice" } else { "opus" };

    std::fs::create_dir_all(output_dir).map_err(|err| ScanGroupError::Write {
        file: output_dir.to_path_buf(),
        err,
    })?;

    let splits = split_catalog_lines(catalog_lines, site, by)?;
    let header = header_lines.iter().join("\n");
    let mut record_files = Vec::with_capacity(splits.len());
    for (key, lines) in &splits {
        let file = output_dir.join(format!("{key}.{kind}-i2s.in"));
        let text = format!("{header}\n{}\n", lines.join("\n"));
        write_via_temp_file(&file, &text).map_err(|err| ScanGroupError::Write {
            file: file.clone(),
            err,
        })?;
        debug!("Wrote {} scans to {}", lines.len(), file.display());
        record_files.push(file);
    }
    info!(
        "Split {} scans into {} record files in {}",
        catalog_lines.len(),
        record_files.len(),
        output_dir.display()
    );

    let cfg_file = output_dir.join(SPLIT_CONFIG_NAME);
    let doc = build_config(&cfg_file, &record_files, None, true, layout)?;
    write_config(&doc, &cfg_file)?;
    Ok(cfg_file)
}
