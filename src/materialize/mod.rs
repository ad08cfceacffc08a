// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Turn a batch config into run directories that I2S can be run in.
//!
//! Each date gets `<run_top_dir>/<site>/<date_key>/` containing:
//!
//! - `igms/` (links to full interferograms) or `slices/` (links to slice
//!   `YYMMDD.R` directories, each with a `scan/` subdirectory);
//! - `flimit.i2s`, a link to the flimit file;
//! - `spectra/`, where I2S writes its output;
//! - `opus-i2s.in` or `slice-i2s.in`, the date's record file with its header
//!   pointed at the above.

mod check;
mod error;
mod script;
#[cfg(test)]
mod tests;

pub use check::{check_links, DateLinkCheck, LinkCheckReport};
pub use error::MaterializeError;
pub use script::{find_input_file, write_parallel_script, PARALLEL_SCRIPT_NAME};

use std::path::{Path, PathBuf};

use glob::Pattern;
use log::{debug, info, warn};
use regex::Regex;

use crate::{
    catalog::{CatalogKind, ScanRecord},
    config::RunConfig,
    io::get_all_matches_from_glob,
    record::{
        modify_record_file, CatalogDirAction, ParamOverrides, RecordFile, RecordLayout,
        RewriteOptions,
    },
    toolchain::ToolchainLocator,
};

pub const SLICES_SUBDIR: &str = "slices";
pub const IGMS_SUBDIR: &str = "igms";
pub const SPECTRA_SUBDIR: &str = "spectra";
pub const FLIMIT_LINK_NAME: &str = "flimit.i2s";
pub const SLICE_INPUT_FILE_NAME: &str = "slice-i2s.in";
pub const FULL_INPUT_FILE_NAME: &str = "opus-i2s.in";

/// Slice files within a slice run directory live in this subdirectory.
pub const SCAN_SUBDIR: &str = "scan";

lazy_static::lazy_static! {
    static ref FIRST_NUMBER: Regex = Regex::new(r"\d+").unwrap();
}

/// What [`make_link`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    Created,
    Replaced,
    /// Something was already at the destination and `overwrite` was off.
    Kept,
}

#[cfg(unix)]
fn symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

/// Link `dst` to `src`. Anything already at `dst` (including a broken link)
/// counts as existing; it is replaced only if `overwrite` is set.
pub fn make_link(src: &Path, dst: &Path, overwrite: bool) -> std::io::Result<LinkAction> {
    let action = match std::fs::symlink_metadata(dst) {
        Ok(_) if !overwrite => {
            debug!("Link exists, not overwriting: {}", dst.display());
            return Ok(LinkAction::Kept);
        }
        Ok(_) => {
            debug!("Overwriting existing link: {}", dst.display());
            std::fs::remove_file(dst)?;
            LinkAction::Replaced
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => LinkAction::Created,
        Err(e) => return Err(e),
    };
    symlink(src, dst)?;
    Ok(action)
}

/// How to treat what's already in a run directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkOptions {
    /// Replace existing links.
    pub overwrite: bool,

    /// Delete the `igms`/`slices` directory before linking.
    pub clean_links: bool,

    /// Delete the `spectra` directory before linking.
    pub clean_spectra: bool,

    /// Skip dates with missing full interferograms (with a warning) rather
    /// than failing them.
    pub ignore_missing: bool,
}

/// The result of linking one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The run directory is ready. `num_links` counts new or replaced links.
    Linked { num_links: usize },

    /// Source interferograms were missing, so nothing was done.
    SkippedMissing { missing: Vec<PathBuf> },
}

/// The result of linking one date of a batch.
#[derive(Debug)]
pub struct DateLinkResult {
    pub site: String,
    pub date_key: String,
    pub result: Result<LinkOutcome, MaterializeError>,
}

/// The header parameters pointed at the run directory's contents. Values in
/// `[I2S]` take precedence.
pub fn standard_overrides(link_subdir: &str, config_overrides: &ParamOverrides) -> ParamOverrides {
    let mut std_opts = ParamOverrides::new();
    for (param, value) in [
        (1, format!("./{link_subdir}/")),
        (2, format!("./{SPECTRA_SUBDIR}/")),
        (3, "0".to_string()),
        (8, format!("./{FLIMIT_LINK_NAME}")),
    ] {
        // None of these are 0, so insert can't fail.
        let _ = std_opts.insert(param, &value);
    }
    config_overrides.merged_over(&std_opts)
}

/// Sets up run directories from a config.
pub struct Materializer<'a> {
    config: &'a RunConfig,
    toolchain: Option<&'a dyn ToolchainLocator>,
    layout: RecordLayout,
    options: LinkOptions,
}

impl<'a> Materializer<'a> {
    pub fn new(config: &'a RunConfig, options: LinkOptions) -> Materializer<'a> {
        Materializer {
            config,
            toolchain: None,
            layout: RecordLayout::default(),
            options,
        }
    }

    /// Look for flimit files that don't exist in this toolchain's `i2s`
    /// directory.
    pub fn with_toolchain(mut self, toolchain: &'a dyn ToolchainLocator) -> Materializer<'a> {
        self.toolchain = Some(toolchain);
        self
    }

    pub fn with_layout(mut self, layout: RecordLayout) -> Materializer<'a> {
        self.layout = layout;
        self
    }

    /// Link every date in the config. A failure for one date is logged and
    /// doesn't stop the others.
    pub fn link_all(&self) -> Vec<DateLinkResult> {
        let mut results = Vec::with_capacity(self.config.num_dates());
        let mut last_site = None;
        for (site, date_key) in self.config.dates() {
            if last_site != Some(site) {
                info!("Linking files for {site}");
                last_site = Some(site);
            }
            let result = self.link_date(site, date_key);
            match &result {
                Ok(LinkOutcome::Linked { num_links }) => {
                    debug!("{date_key}: {num_links} links made")
                }
                Ok(LinkOutcome::SkippedMissing { missing }) => warn!(
                    "{date_key}: skipped; {} source interferogram(s) missing",
                    missing.len()
                ),
                Err(e) => warn!("{date_key}: not linked: {e}"),
            }
            results.push(DateLinkResult {
                site: site.to_string(),
                date_key: date_key.to_string(),
                result,
            });
        }
        results
    }

    /// Set up the run directory for one date.
    pub fn link_date(&self, site: &str, date: &str) -> Result<LinkOutcome, MaterializeError> {
        let cfg = self.config;
        let date_key = cfg.date_key(site, date)?;
        let uses_slices = cfg.uses_slices(site, date_key)?;
        let record_file = cfg.record_file(site, date_key)?;
        let source_dir = cfg.source_dir(site, date_key)?;
        let (link_subdir, input_file_name) = if uses_slices {
            (SLICES_SUBDIR, SLICE_INPUT_FILE_NAME)
        } else {
            (IGMS_SUBDIR, FULL_INPUT_FILE_NAME)
        };
        let overrides = standard_overrides(link_subdir, &cfg.record_options);

        // Everything that can fail without touching the run directory is
        // done first.
        overrides.validate_against(&self.layout)?;
        let record = RecordFile::read(record_file, self.layout.clone())?;
        let catalog = record.catalog()?;
        if let Some(first) = catalog.first() {
            let is_slices = first.kind() == CatalogKind::Slices;
            if is_slices != uses_slices {
                return Err(MaterializeError::KindMismatch {
                    record_file: record_file.to_path_buf(),
                    found: if is_slices {
                        "slices"
                    } else {
                        "full interferograms"
                    },
                    uses_slices,
                });
            }
        }
        let flimit = self.find_flimit(site, date_key)?;

        let full_sources = if uses_slices {
            vec![]
        } else {
            let sources = full_sources(&catalog, &source_dir);
            let missing: Vec<PathBuf> = sources
                .iter()
                .filter(|(src, _)| !src.is_file())
                .map(|(src, _)| src.clone())
                .collect();
            if !missing.is_empty() {
                for m in &missing {
                    info!("{date_key}: missing source file {}", m.display());
                }
                if self.options.ignore_missing {
                    return Ok(LinkOutcome::SkippedMissing { missing });
                }
                return Err(MaterializeError::MissingSources {
                    date_key: date_key.to_string(),
                    record_file: record_file.to_path_buf(),
                    missing,
                });
            }
            sources
        };

        let run_dir = cfg.run_dir(site, date_key)?;
        let links_dir = run_dir.join(link_subdir);
        let spectra_dir = run_dir.join(SPECTRA_SUBDIR);
        if self.options.clean_links {
            remove_dir_if_exists(&links_dir)?;
        }
        if self.options.clean_spectra {
            remove_dir_if_exists(&spectra_dir)?;
        }
        create_dir(&links_dir)?;
        create_dir(&spectra_dir)?;

        let mut num_links = self.link(&flimit, &run_dir.join(FLIMIT_LINK_NAME))?;

        // Full interferograms are linked by file name alone, so the catalog
        // must list them that way too.
        let rewrite = RewriteOptions {
            include_catalog: true,
            catalog_dir: (!uses_slices).then_some(CatalogDirAction::Strip),
        };
        modify_record_file(
            record_file,
            Some(&run_dir.join(input_file_name)),
            &self.layout,
            &overrides,
            &rewrite,
        )?;

        if uses_slices {
            if cfg.slices_need_reorg(site, date_key)? {
                debug!("{date_key}: organising slices into run/scan directories");
                num_links += self.link_reorganised_slices(&catalog, &source_dir, &links_dir)?;
            } else {
                num_links += self.link_slice_run_dirs(&catalog, &source_dir, &links_dir)?;
            }
        } else {
            for (src, name) in &full_sources {
                num_links += self.link(src, &links_dir.join(name))?;
            }
        }

        Ok(LinkOutcome::Linked { num_links })
    }

    /// The configured flimit file, or the file of the same name in the
    /// toolchain if the configured one doesn't exist.
    fn find_flimit(&self, site: &str, date_key: &str) -> Result<PathBuf, MaterializeError> {
        let flimit = self.config.flimit_file(site, date_key)?;
        if flimit.exists() {
            return Ok(flimit);
        }
        if let (Some(toolchain), Some(name)) = (self.toolchain, flimit.file_name()) {
            let candidate = toolchain.data_subdir(&["i2s"]).join(name);
            if candidate.exists() {
                debug!(
                    "{date_key}: using flimit file {} from the toolchain",
                    candidate.display()
                );
                return Ok(candidate);
            }
        }
        warn!(
            "{date_key}: flimit file {} does not exist; linking it anyway",
            flimit.display()
        );
        Ok(flimit)
    }

    /// Make a link, counting it if it's new or replaced.
    fn link(&self, src: &Path, dst: &Path) -> Result<usize, MaterializeError> {
        match make_link(src, dst, self.options.overwrite) {
            Ok(LinkAction::Kept) => Ok(0),
            Ok(_) => Ok(1),
            Err(err) => Err(MaterializeError::Link {
                src: src.to_path_buf(),
                dst: dst.to_path_buf(),
                err,
            }),
        }
    }

    /// Link the `YYMMDD.R` directories the catalog uses.
    fn link_slice_run_dirs(
        &self,
        catalog: &[ScanRecord],
        source_dir: &Path,
        links_dir: &Path,
    ) -> Result<usize, MaterializeError> {
        let mut num_links = 0;
        let mut last_run_dir: Option<String> = None;
        for record in catalog {
            let ScanRecord::Slice(scan) = record else {
                continue;
            };
            let run_dir = scan.run_dir_name()?;
            // Consecutive scans are usually from the same run directory.
            if last_run_dir.as_deref() == Some(run_dir.as_str()) {
                continue;
            }
            let src = source_dir.join(&run_dir);
            if !src.is_dir() {
                warn!("Slice run directory {} does not exist", src.display());
            }
            num_links += self.link(&src, &links_dir.join(&run_dir))?;
            last_run_dir = Some(run_dir);
        }
        Ok(num_links)
    }

    /// Link loose slice files (`b*` in the source directory) into
    /// `YYMMDD.R/scan/` directories. Each scan takes the slices numbered from
    /// its first slice up to (not including) the next scan's first slice.
    /// Slice files are assumed to sort into slice-number order.
    fn link_reorganised_slices(
        &self,
        catalog: &[ScanRecord],
        source_dir: &Path,
        links_dir: &Path,
    ) -> Result<usize, MaterializeError> {
        let slice_files = get_all_matches_from_glob(&format!(
            "{}/b*",
            Pattern::escape(&source_dir.display().to_string())
        ))?;
        let numbered: Vec<(u64, &PathBuf, &std::ffi::OsStr)> = slice_files
            .iter()
            .filter_map(|f| {
                let name = f.file_name()?;
                let num = FIRST_NUMBER
                    .find(&name.to_string_lossy())
                    .and_then(|m| m.as_str().parse().ok())?;
                Some((num, f, name))
            })
            .collect();

        let mut num_links = 0;
        for (i, record) in catalog.iter().enumerate() {
            let ScanRecord::Slice(scan) = record else {
                return Err(MaterializeError::NotSlices {
                    file: source_dir.to_path_buf(),
                });
            };
            let start = parse_slice_number(&scan.slice_id)?;
            let end = match catalog.get(i + 1) {
                Some(ScanRecord::Slice(next)) => Some(parse_slice_number(&next.slice_id)?),
                _ => None,
            };

            let scan_dir = links_dir.join(scan.run_dir_name()?).join(SCAN_SUBDIR);
            create_dir(&scan_dir)?;
            for &(num, file, name) in &numbered {
                if num < start {
                    continue;
                }
                if end.map(|e| num >= e).unwrap_or(false) {
                    break;
                }
                num_links += self.link(file, &scan_dir.join(name))?;
            }
        }
        Ok(num_links)
    }
}

fn parse_slice_number(slice_id: &str) -> Result<u64, MaterializeError> {
    slice_id
        .parse()
        .map_err(|_| MaterializeError::BadSliceNumber {
            slice_id: slice_id.to_string(),
        })
}

/// The source path and link name of every full interferogram in a catalog.
/// Links are named after the file alone, whatever directory the catalog gives.
fn full_sources(catalog: &[ScanRecord], source_dir: &Path) -> Vec<(PathBuf, String)> {
    catalog
        .iter()
        .filter_map(|r| match r {
            ScanRecord::Full(f) => Some((source_dir.join(&f.filename), f.base_name().to_string())),
            ScanRecord::Slice(_) => None,
        })
        .collect()
}

fn create_dir(dir: &Path) -> Result<(), MaterializeError> {
    std::fs::create_dir_all(dir).map_err(|err| MaterializeError::CreateDir {
        dir: dir.to_path_buf(),
        err,
    })
}

fn remove_dir_if_exists(dir: &Path) -> Result<(), MaterializeError> {
    if dir.exists() {
        info!("Removing existing directory: {}", dir.display());
        std::fs::remove_dir_all(dir).map_err(|err| MaterializeError::RemoveDir {
            dir: dir.to_path_buf(),
            err,
        })?;
    }
    Ok(())
}
