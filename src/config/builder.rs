// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to generate and update batch config files from record files.
//!
//! These work on the raw TOML document rather than on [`super::RunConfig`],
//! because freshly built configs have placeholder values (e.g. an empty
//! `run_top_dir`) that must be filled in before the config can be loaded.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info, warn};
use regex::Regex;
use toml::{Table, Value};

use super::ConfigError;
use crate::{
    catalog::CatalogKind,
    io::write_via_temp_file,
    record::{RecordFile, RecordLayout},
};

lazy_static::lazy_static! {
    static ref SITE_DATE: Regex = Regex::new(r"(\w\w)(\d{4,8})").unwrap();
}

/// Site-level keys that a build always regenerates.
const REGENERATED_SITE_KEYS: &[&str] = &["uses_slices"];

/// Date-level keys that a build always regenerates.
const REGENERATED_DATE_KEYS: &[&str] = &["record_file"];

/// Record files grouped by site (`xx`), then by site date (`xxYYYY[MM[DD]]`).
pub type GroupedRecordFiles = IndexMap<String, IndexMap<String, PathBuf>>;

/// Group record files by the site abbreviation and date in their file names
/// (e.g. `pa20040721.opus-i2s.in`).
pub fn group_record_files<P: AsRef<Path>>(files: &[P]) -> Result<GroupedRecordFiles, ConfigError> {
    let mut grouped = GroupedRecordFiles::new();
    for file in files {
        let file = file.as_ref();
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        let caps = SITE_DATE
            .captures(&name)
            .ok_or_else(|| ConfigError::NoSiteDate {
                file: file.to_path_buf(),
            })?;
        let site = caps[1].to_string();
        let site_date = caps[0].to_string();
        grouped
            .entry(site)
            .or_default()
            .insert(site_date, file.to_path_buf());
    }
    Ok(grouped)
}

/// Decide whether a site uses slices: it does if more than half of the record
/// files that could be classified list slices.
fn site_uses_slices<'a, I>(files: I, layout: &RecordLayout) -> Result<bool, ConfigError>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let mut num_slices = 0;
    let mut num_classified = 0;
    for file in files {
        match RecordFile::read(file, layout.clone())?.catalog_kind() {
            Ok(kind) => {
                num_classified += 1;
                if kind == CatalogKind::Slices {
                    num_slices += 1;
                }
            }
            Err(reason) => warn!(
                "Couldn't tell whether {} lists slices or full interferograms ({reason:?}); it won't count towards its site's vote",
                file.display()
            ),
        }
    }
    Ok(num_slices * 2 > num_classified)
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Build a fresh config document from record files.
///
/// `cfg_file` is where the config will be written; if `relative_paths` is
/// set, record file paths under its directory are written relative to it. If
/// `prior` is given, every value in that config that isn't regenerated here
/// (`uses_slices` and `record_file`) is copied into the new one, as are
/// sites and dates that no longer have record files.
pub fn build_config<P: AsRef<Path>>(
    cfg_file: &Path,
    record_files: &[P],
    prior: Option<&Path>,
    relative_paths: bool,
    layout: &RecordLayout,
) -> Result<Table, ConfigError> {
    let grouped = group_record_files(record_files)?;
    let cfg_dir = absolute(cfg_file.parent().unwrap_or_else(|| Path::new(".")));

    let mut sites = Table::new();
    for (site, dates) in &grouped {
        let resolved: Vec<PathBuf> = dates.values().map(|f| absolute(f)).collect();
        let uses_slices = site_uses_slices(&resolved, layout)?;
        debug!("Site {site} uses slices: {uses_slices}");

        let mut site_table = Table::new();
        site_table.insert("uses_slices".into(), Value::Boolean(uses_slices));
        site_table.insert("site_root_dir".into(), Value::String(String::new()));
        site_table.insert("no_date_dir".into(), Value::Boolean(false));
        site_table.insert(
            "subdir".into(),
            Value::String(if uses_slices { "slices" } else { "igms" }.into()),
        );
        site_table.insert("slices_need_reorg".into(), Value::Boolean(false));
        site_table.insert("flimit_file".into(), Value::String(String::new()));

        for (site_date, file) in dates.keys().zip(resolved.iter()) {
            let path = if relative_paths {
                file.strip_prefix(&cfg_dir)
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|_| file.clone())
            } else {
                file.clone()
            };
            let mut date_table = Table::new();
            date_table.insert(
                "record_file".into(),
                Value::String(path.display().to_string()),
            );
            site_table.insert(site_date.clone(), Value::Table(date_table));
        }
        sites.insert(site.clone(), Value::Table(site_table));
    }

    let mut run = Table::new();
    run.insert("run_top_dir".into(), Value::String(String::new()));

    let mut doc = Table::new();
    doc.insert("Run".into(), Value::Table(run));
    doc.insert("I2S".into(), Value::Table(Table::new()));
    doc.insert("Sites".into(), Value::Table(sites));

    if let Some(prior) = prior {
        info!("Merging settings from {}", prior.display());
        let prior = read_document(prior)?;
        merge_prior(&mut doc, &prior);
    }

    Ok(doc)
}

/// Copy values from a prior config into a freshly built one.
fn merge_prior(doc: &mut Table, prior: &Table) {
    for (section, prior_value) in prior {
        match (doc.get_mut(section), prior_value) {
            (Some(Value::Table(new)), Value::Table(old)) if section == "Sites" => {
                merge_sites(new, old)
            }
            (Some(Value::Table(new)), Value::Table(old)) => {
                for (k, v) in old {
                    new.insert(k.clone(), v.clone());
                }
            }
            (Some(_), _) => (),
            (None, v) => {
                doc.insert(section.clone(), v.clone());
            }
        }
    }
}

fn merge_sites(new: &mut Table, old: &Table) {
    for (site, old_site) in old {
        let (new_site, old_site) = match (new.get_mut(site), old_site) {
            (Some(Value::Table(n)), Value::Table(o)) => (n, o),
            (None, _) => {
                debug!("Site {site} is only in the prior config; keeping it");
                new.insert(site.clone(), old_site.clone());
                continue;
            }
            _ => continue,
        };

        for (key, old_value) in old_site {
            match (new_site.get_mut(key), old_value) {
                (Some(Value::Table(new_date)), Value::Table(old_date)) => {
                    for (k, v) in old_date {
                        if !REGENERATED_DATE_KEYS.contains(&k.as_str()) {
                            new_date.insert(k.clone(), v.clone());
                        }
                    }
                }
                (None, Value::Table(_)) => {
                    debug!("Date {key} is only in the prior config; keeping it");
                    new_site.insert(key.clone(), old_value.clone());
                }
                (_, Value::Table(_)) => (),
                _ => {
                    if !REGENERATED_SITE_KEYS.contains(&key.as_str()) {
                        new_site.insert(key.clone(), old_value.clone());
                    }
                }
            }
        }
    }
}

/// Point the dates of an existing config at new record files. Dates without a
/// new record file are removed, unless `keep_missing` is set.
pub fn update_config<P: AsRef<Path>>(
    cfg_file: &Path,
    record_files: &[P],
    keep_missing: bool,
) -> Result<Table, ConfigError> {
    let mut doc = read_document(cfg_file)?;
    let grouped = group_record_files(record_files)?;
    let empty = IndexMap::new();

    if let Some(Value::Table(sites)) = doc.get_mut("Sites") {
        for (site, site_value) in sites.iter_mut() {
            let Value::Table(site_table) = site_value else {
                continue;
            };
            let site_files = grouped.get(site.as_str()).unwrap_or(&empty);

            let date_keys: Vec<String> = site_table
                .iter()
                .filter(|(_, v)| v.is_table())
                .map(|(k, _)| k.clone())
                .collect();
            for date_key in date_keys {
                match site_files.get(&date_key) {
                    Some(file) => {
                        if let Some(Value::Table(date_table)) = site_table.get_mut(&date_key) {
                            date_table.insert(
                                "record_file".into(),
                                Value::String(absolute(file).display().to_string()),
                            );
                        }
                    }
                    None if keep_missing => {
                        debug!("{date_key} does not have a record file in the new list, not updating");
                    }
                    None => {
                        info!("{date_key} does not have a record file anymore, removing");
                        site_table.remove(&date_key);
                    }
                }
            }
        }
    }

    Ok(doc)
}

fn read_document(path: &Path) -> Result<Table, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
        file: path.to_path_buf(),
        err,
    })?;
    toml::from_str(&text).map_err(|err| ConfigError::Parse {
        file: path.to_path_buf(),
        err,
    })
}

/// Write a config document to `path`.
pub fn write_config(doc: &Table, path: &Path) -> Result<(), ConfigError> {
    let text = toml::to_string_pretty(doc)?;
    write_via_temp_file(path, &text).map_err(|err| ConfigError::Write {
        file: path.to_path_buf(),
        err,
    })?;
    info!("Wrote config to {}", path.display());
    Ok(())
}
