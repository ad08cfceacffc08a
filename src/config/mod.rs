// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Batch config files.
//!
//! A batch config is TOML with three kinds of section:
//!
//! ```toml
//! [Run]
//! run_top_dir = "/data/i2s_runs"
//!
//! [I2S]
//! 2 = "./spectra/"
//!
//! [Sites.pa]
//! uses_slices = false
//! site_root_dir = "/data/pa"
//! subdir = "igms"
//!
//! [Sites.pa.pa20040721]
//! record_file = "pa20040721.opus-i2s.in"
//! flimit_file = "/data/pa/flimit.i2s"
//! ```
//!
//! Every site option can be given per date; a date without an option falls
//! back to its site's value. Relative paths are relative to the config file,
//! except `subdir`, which is relative to each date's source directory.

mod builder;
mod error;

pub use builder::{build_config, group_record_files, update_config, write_config};
pub use error::ConfigError;

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use indexmap::IndexMap;
use log::trace;
use strum_macros::{Display, EnumIter, EnumString};
use toml::Value;

use crate::record::{ParamOverrides, RecordError};

/// The sentinel file name used when `[Run]` doesn't specify `halt_file`.
pub const DEFAULT_HALT_FILE_NAME: &str = "abort-i2s";

/// The options that may be set for a site and overridden for each of its
/// dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SiteField {
    UsesSlices,
    SiteRootDir,
    NoDateDir,
    Subdir,
    SlicesNeedReorg,
    FlimitFile,
}

/// A resolved site option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteValue {
    Bool(bool),
    Path(PathBuf),
    Str(String),
}

/// Site options; `None` means "not set here".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteOptions {
    /// Are the raw data slices (rather than full interferograms)?
    pub uses_slices: Option<bool>,
    pub site_root_dir: Option<PathBuf>,
    /// If true, a date's data are in `site_root_dir/subdir` rather than
    /// `site_root_dir/<date key>/subdir`.
    pub no_date_dir: Option<bool>,
    pub subdir: Option<String>,
    /// Are the slices in one flat directory, rather than `YYMMDD.R/scan/`?
    pub slices_need_reorg: Option<bool>,
    pub flimit_file: Option<PathBuf>,
}

impl SiteOptions {
    pub fn get(&self, field: SiteField) -> Option<SiteValue> {
        match field {
            SiteField::UsesSlices => self.uses_slices.map(SiteValue::Bool),
            SiteField::SiteRootDir => self.site_root_dir.clone().map(SiteValue::Path),
            SiteField::NoDateDir => self.no_date_dir.map(SiteValue::Bool),
            SiteField::Subdir => self.subdir.clone().map(SiteValue::Str),
            SiteField::SlicesNeedReorg => self.slices_need_reorg.map(SiteValue::Bool),
            SiteField::FlimitFile => self.flimit_file.clone().map(SiteValue::Path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateConfig {
    /// The record file listing this date's scans.
    pub record_file: PathBuf,
    pub options: SiteOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteConfig {
    pub options: SiteOptions,
    /// Keyed by `xxYYYYMMDD`, in config order.
    pub dates: IndexMap<String, DateConfig>,
}

/// A loaded and validated batch config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Absolute.
    pub run_top_dir: PathBuf,
    pub halt_file: PathBuf,
    /// Record parameters to set in every date's record file (`[I2S]`).
    pub record_options: ParamOverrides,
    pub sites: IndexMap<String, SiteConfig>,
}

impl RunConfig {
    /// Read, validate and normalise a batch config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RunConfig, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            file: path.to_path_buf(),
            err,
        })?;
        RunConfig::parse(&text, path)
    }

    /// Validate and normalise batch config text. `file` is where the text came
    /// from; relative paths are resolved against its directory.
    pub fn parse(text: &str, file: &Path) -> Result<RunConfig, ConfigError> {
        let doc: toml::Table = toml::from_str(text).map_err(|err| ConfigError::Parse {
            file: file.to_path_buf(),
            err,
        })?;
        let cfg_dir = config_dir(file).map_err(|err| ConfigError::Read {
            file: file.to_path_buf(),
            err,
        })?;
        trace!("Resolving relative config paths against {}", cfg_dir.display());

        let mut v = Validator {
            cfg_dir: &cfg_dir,
            problems: vec![],
        };

        let mut run_top_dir = None;
        let mut halt_file = None;
        let mut record_options = ParamOverrides::new();
        let mut sites = IndexMap::new();

        for (key, value) in &doc {
            match (key.as_str(), value) {
                ("Run", Value::Table(run)) => {
                    for (k, val) in run {
                        match k.as_str() {
                            "run_top_dir" => run_top_dir = v.path("Run", k, val),
                            "halt_file" => halt_file = v.path("Run", k, val),
                            _ => v.unknown("Run", k),
                        }
                    }
                }

                ("I2S", Value::Table(table)) => match ParamOverrides::from_toml_table(table) {
                    Ok(o) => record_options = o,
                    Err(RecordError::Validation { problems }) => v
                        .problems
                        .extend(problems.into_iter().map(|p| format!("I2S: {p}"))),
                    Err(e) => v.problems.push(format!("I2S: {e}")),
                },

                ("Sites", Value::Table(table)) => {
                    for (site, site_value) in table {
                        match site_value {
                            Value::Table(t) => {
                                sites.insert(site.clone(), v.site(site, t));
                            }
                            _ => v.problems.push(format!("Sites/{site}: expected a section")),
                        }
                    }
                }

                ("Run" | "I2S" | "Sites", _) => v.problems.push(format!("{key}: expected a section")),

                _ => v.unknown("", key),
            }
        }

        if run_top_dir.is_none() {
            v.problems.push("Run/run_top_dir: required".to_string());
        }

        match run_top_dir {
            Some(run_top_dir) if v.problems.is_empty() => Ok(RunConfig {
                halt_file: halt_file.unwrap_or_else(|| run_top_dir.join(DEFAULT_HALT_FILE_NAME)),
                run_top_dir,
                record_options,
                sites,
            }),
            _ => Err(ConfigError::Invalid {
                file: file.to_path_buf(),
                problems: v.problems,
            }),
        }
    }

    pub fn site(&self, site: &str) -> Result<&SiteConfig, ConfigError> {
        self.sites.get(site).ok_or_else(|| ConfigError::UnknownSite {
            site: site.to_string(),
        })
    }

    /// Find the key for `date` in `site`. An exact match is preferred;
    /// otherwise the first key ending with `date` is used, so both
    /// `pa20040721` and `20040721` work.
    pub fn date_key(&self, site: &str, date: &str) -> Result<&str, ConfigError> {
        self.find_date(site, date).map(|(_, key, _)| key)
    }

    pub fn date(&self, site: &str, date: &str) -> Result<&DateConfig, ConfigError> {
        self.find_date(site, date).map(|(_, _, d)| d)
    }

    fn find_date(
        &self,
        site: &str,
        date: &str,
    ) -> Result<(&SiteConfig, &str, &DateConfig), ConfigError> {
        let site_cfg = self.site(site)?;
        site_cfg
            .dates
            .get_key_value(date)
            .or_else(|| site_cfg.dates.iter().find(|(k, _)| k.ends_with(date)))
            .map(|(k, d)| (site_cfg, k.as_str(), d))
            .ok_or_else(|| ConfigError::SiteDate {
                site: site.to_string(),
                date: date.to_string(),
            })
    }

    fn resolve_with<T>(
        &self,
        site: &str,
        date: &str,
        field: SiteField,
        pick: impl Fn(&SiteOptions) -> Option<T>,
    ) -> Result<T, ConfigError> {
        let (site_cfg, date_key, date_cfg) = self.find_date(site, date)?;
        pick(&date_cfg.options)
            .or_else(|| pick(&site_cfg.options))
            .ok_or_else(|| ConfigError::MissingField {
                field,
                site: site.to_string(),
                date_key: date_key.to_string(),
            })
    }

    /// Get a site option for a date: the date's own value if it has one,
    /// otherwise the site's.
    pub fn resolve(&self, site: &str, date: &str, field: SiteField) -> Result<SiteValue, ConfigError> {
        self.resolve_with(site, date, field, |o| o.get(field))
    }

    pub fn uses_slices(&self, site: &str, date: &str) -> Result<bool, ConfigError> {
        self.resolve_with(site, date, SiteField::UsesSlices, |o| o.uses_slices)
    }

    pub fn site_root_dir(&self, site: &str, date: &str) -> Result<PathBuf, ConfigError> {
        self.resolve_with(site, date, SiteField::SiteRootDir, |o| o.site_root_dir.clone())
    }

    pub fn no_date_dir(&self, site: &str, date: &str) -> Result<bool, ConfigError> {
        self.resolve_with(site, date, SiteField::NoDateDir, |o| o.no_date_dir)
    }

    pub fn subdir(&self, site: &str, date: &str) -> Result<String, ConfigError> {
        self.resolve_with(site, date, SiteField::Subdir, |o| o.subdir.clone())
    }

    pub fn slices_need_reorg(&self, site: &str, date: &str) -> Result<bool, ConfigError> {
        self.resolve_with(site, date, SiteField::SlicesNeedReorg, |o| o.slices_need_reorg)
    }

    pub fn flimit_file(&self, site: &str, date: &str) -> Result<PathBuf, ConfigError> {
        self.resolve_with(site, date, SiteField::FlimitFile, |o| o.flimit_file.clone())
    }

    pub fn record_file(&self, site: &str, date: &str) -> Result<&Path, ConfigError> {
        Ok(&self.date(site, date)?.record_file)
    }

    /// Every (site, date key) pair, in config order.
    pub fn dates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sites.iter().flat_map(|(site, site_cfg)| {
            site_cfg
                .dates
                .keys()
                .map(move |date| (site.as_str(), date.as_str()))
        })
    }

    pub fn num_dates(&self) -> usize {
        self.sites.values().map(|s| s.dates.len()).sum()
    }

    /// Where I2S runs for this date: `run_top_dir/<site>/<date key>`.
    pub fn run_dir(&self, site: &str, date: &str) -> Result<PathBuf, ConfigError> {
        let key = self.date_key(site, date)?;
        Ok(self.run_top_dir.join(site).join(key))
    }

    /// Where this date's raw data live.
    pub fn source_dir(&self, site: &str, date: &str) -> Result<PathBuf, ConfigError> {
        let root = self.site_root_dir(site, date)?;
        let subdir = self.subdir(site, date)?;
        if self.no_date_dir(site, date)? {
            Ok(root.join(subdir))
        } else {
            let key = self.date_key(site, date)?;
            Ok(root.join(key).join(subdir))
        }
    }
}

fn config_dir(file: &Path) -> std::io::Result<PathBuf> {
    match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => std::path::absolute(p),
        _ => std::env::current_dir(),
    }
}

/// Walks a config document, collecting every problem rather than stopping at
/// the first.
struct Validator<'a> {
    cfg_dir: &'a Path,
    problems: Vec<String>,
}

impl Validator<'_> {
    fn unknown(&mut self, section: &str, key: &str) {
        if section.is_empty() {
            self.problems.push(format!("{key}: unknown section or option"));
        } else {
            self.problems.push(format!("{section}/{key}: unknown option"));
        }
    }

    fn string(&mut self, section: &str, key: &str, value: &Value) -> Option<String> {
        match value {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => {
                self.problems.push(format!(
                    "{section}/{key}: expected a string, got a {}",
                    other.type_str()
                ));
                None
            }
        }
    }

    fn path(&mut self, section: &str, key: &str, value: &Value) -> Option<PathBuf> {
        self.string(section, key, value).map(|s| {
            let p = PathBuf::from(s);
            if p.is_absolute() {
                p
            } else {
                self.cfg_dir.join(p)
            }
        })
    }

    fn bool(&mut self, section: &str, key: &str, value: &Value) -> Option<bool> {
        match value {
            Value::Boolean(b) => Some(*b),
            other => {
                self.problems.push(format!(
                    "{section}/{key}: expected a boolean, got a {}",
                    other.type_str()
                ));
                None
            }
        }
    }

    /// Fill `opts` from `key`, if `key` is a site option.
    fn site_option(&mut self, section: &str, key: &str, value: &Value, opts: &mut SiteOptions) -> bool {
        let field = match SiteField::from_str(key) {
            Ok(f) => f,
            Err(_) => return false,
        };
        match field {
            SiteField::UsesSlices => opts.uses_slices = self.bool(section, key, value),
            SiteField::SiteRootDir => opts.site_root_dir = self.path(section, key, value),
            SiteField::NoDateDir => opts.no_date_dir = self.bool(section, key, value),
            // Relative to the source date directory, so left alone.
            SiteField::Subdir => opts.subdir = self.string(section, key, value),
            SiteField::SlicesNeedReorg => opts.slices_need_reorg = self.bool(section, key, value),
            SiteField::FlimitFile => opts.flimit_file = self.path(section, key, value),
        }
        true
    }

    fn site(&mut self, site: &str, table: &toml::Table) -> SiteConfig {
        let section = format!("Sites/{site}");
        let mut site_cfg = SiteConfig::default();
        for (key, value) in table {
            if let Value::Table(date_table) = value {
                if let Some(d) = self.date(&format!("{section}/{key}"), date_table) {
                    site_cfg.dates.insert(key.clone(), d);
                }
            } else if !self.site_option(&section, key, value, &mut site_cfg.options) {
                self.unknown(&section, key);
            }
        }
        // These flags are off unless a site turns them on.
        site_cfg.options.no_date_dir.get_or_insert(false);
        site_cfg.options.slices_need_reorg.get_or_insert(false);
        site_cfg
    }

    fn date(&mut self, section: &str, table: &toml::Table) -> Option<DateConfig> {
        let mut record_file = None;
        let mut options = SiteOptions::default();
        for (key, value) in table {
            if key == "record_file" {
                record_file = self.path(section, key, value);
            } else if !self.site_option(section, key, value, &mut options) {
                self.unknown(section, key);
            }
        }
        match record_file {
            Some(record_file) => Some(DateConfig {
                record_file,
                options,
            }),
            None => {
                self.problems.push(format!("{section}/record_file: required"));
                None
            }
        }
    }
}
