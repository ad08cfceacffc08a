// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to read and rewrite I2S record (input) files.
//!
//! A record file is a sequence of numbered header parameters followed by a
//! catalog of scans. Anything after the first colon on a line is a comment,
//! unless the colon is immediately followed by a backslash (a Windows drive
//! path, e.g. `c:\tccon`). Lines with nothing but whitespace before any
//! comment are not parameters. Most parameters take one line; those listed in
//! the [`RecordLayout`] take more. Once the parameter counter passes the last
//! header parameter, every remaining non-blank line is a catalog line.
//!
//! Rewriting only touches the value part of overridden parameters; every other
//! line comes back out exactly as it went in.

mod error;

pub use error::RecordError;

use std::{
    collections::BTreeMap,
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    catalog::{
        base_name, classify_lines, kind_from_columns, parse_record, validate_uniform,
        validate_uniform_lines, CatalogKind, ScanRecord, UndeterminedKind,
    },
    io::write_via_temp_file,
};

/// The number of header parameters in a standard I2S input file.
pub const DEFAULT_LAST_HEADER_PARAM: usize = 28;

/// Describes where the header of a record file ends and which parameters
/// span more than one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    last_header_param: usize,
    multi_line: BTreeMap<usize, usize>,
}

impl Default for RecordLayout {
    fn default() -> Self {
        RecordLayout::new(DEFAULT_LAST_HEADER_PARAM)
    }
}

impl RecordLayout {
    /// A layout with the standard multi-line parameters (#17 takes two lines)
    /// but a custom header length.
    pub fn new(last_header_param: usize) -> RecordLayout {
        RecordLayout {
            last_header_param,
            multi_line: BTreeMap::from([(17, 2)]),
        }
    }

    pub fn with_multi_line(mut self, param: usize, lines: usize) -> RecordLayout {
        self.multi_line.insert(param, lines.max(1));
        self
    }

    pub fn last_header_param(&self) -> usize {
        self.last_header_param
    }

    /// This layout with the header ending at `last_header_param` instead.
    pub fn ending_at(&self, last_header_param: usize) -> RecordLayout {
        RecordLayout {
            last_header_param,
            multi_line: self.multi_line.clone(),
        }
    }

    pub fn lines_for_param(&self, param: usize) -> usize {
        self.multi_line.get(&param).copied().unwrap_or(1)
    }
}

/// What a physical line of a record file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRole {
    /// Whitespace and/or a comment only.
    Blank,

    /// Line `part` (1-based) of header parameter `param` (1-based).
    Header { param: usize, part: usize },

    /// The `index`th (0-based) catalog line.
    Catalog { index: usize },
}

/// One physical line, without its line ending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLine {
    /// Everything before the comment delimiter, whitespace included.
    pub value: String,
    /// Everything after the comment delimiter.
    pub comment: Option<String>,
    pub role: LineRole,
}

impl RecordLine {
    fn text(&self) -> String {
        match &self.comment {
            Some(c) => format!("{}:{c}", self.value),
            None => self.value.clone(),
        }
    }
}

/// A header parameter's value(s), whitespace-trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderParam {
    pub number: usize,
    pub parts: Vec<String>,
}

impl HeaderParam {
    /// The value of this parameter, multiple lines joined with `\n`.
    pub fn value(&self) -> String {
        self.parts.join("\n")
    }
}

/// All of the header parameters of a record file, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderBlock {
    params: Vec<HeaderParam>,
}

impl HeaderBlock {
    pub fn get(&self, param: usize) -> Option<&HeaderParam> {
        param
            .checked_sub(1)
            .and_then(|i| self.params.get(i))
            .filter(|p| p.number == param)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderParam> {
        self.params.iter()
    }

    pub fn values(&self) -> Vec<String> {
        self.params.iter().map(|p| p.value()).collect()
    }
}

/// What to do to the directory part of full-interferogram catalog lines when
/// rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogDirAction {
    /// Leave only the file name.
    Strip,
    /// Replace the directory with this one.
    Replace(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Keep the catalog lines? If not, only the header is written.
    pub include_catalog: bool,
    pub catalog_dir: Option<CatalogDirAction>,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        RewriteOptions {
            include_catalog: true,
            catalog_dir: None,
        }
    }
}

/// A sparse set of header parameter values to write. Keys are 1-based
/// parameter numbers; each value holds one string per physical line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamOverrides(BTreeMap<usize, Vec<String>>);

impl ParamOverrides {
    pub fn new() -> ParamOverrides {
        ParamOverrides::default()
    }

    /// Set parameter `param`. `value` is split into lines on any of `\n`,
    /// `\r\n` or `\r`.
    pub fn insert(&mut self, param: usize, value: &str) -> Result<(), RecordError> {
        if param == 0 {
            return Err(RecordError::Validation {
                problems: vec!["parameter numbers must be positive integers, got 0".to_string()],
            });
        }
        self.0.insert(param, split_value_lines(value));
        Ok(())
    }

    /// Build overrides from alternating parameter numbers and values, e.g.
    /// `["1", "./igms/", "8", "./flimit.i2s"]`. Every problem is reported, not
    /// just the first.
    pub fn try_from_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<ParamOverrides, RecordError> {
        let mut problems = vec![];
        if pairs.len() % 2 != 0 {
            problems.push(format!(
                "parameters must be given as number/value pairs, but {} arguments were given",
                pairs.len()
            ));
        }

        let mut overrides = ParamOverrides::new();
        for (num, value) in pairs.iter().tuples() {
            match parse_param_number(num.as_ref()) {
                Ok(n) => {
                    overrides.0.insert(n, split_value_lines(value.as_ref()));
                }
                Err(p) => problems.push(p),
            }
        }

        if problems.is_empty() {
            Ok(overrides)
        } else {
            Err(RecordError::Validation { problems })
        }
    }

    /// Build overrides from a TOML table, e.g. the `[I2S]` section of a batch
    /// config. Keys must be positive integers and values must be strings.
    pub fn from_toml_table(table: &toml::value::Table) -> Result<ParamOverrides, RecordError> {
        let mut problems = vec![];
        let mut overrides = ParamOverrides::new();
        for (key, value) in table {
            let num = parse_param_number(key).map_err(|p| problems.push(p)).ok();
            let value = match value {
                toml::Value::String(s) => Some(s),
                other => {
                    problems.push(format!(
                        "the value for parameter '{key}' must be a string, but it is a {}",
                        other.type_str()
                    ));
                    None
                }
            };
            if let (Some(n), Some(v)) = (num, value) {
                overrides.0.insert(n, split_value_lines(v));
            }
        }

        if problems.is_empty() {
            Ok(overrides)
        } else {
            Err(RecordError::Validation { problems })
        }
    }

    /// Combine two sets of overrides; where both set a parameter, `self` wins.
    pub fn merged_over(&self, base: &ParamOverrides) -> ParamOverrides {
        let mut merged = base.clone();
        merged
            .0
            .extend(self.0.iter().map(|(k, v)| (*k, v.clone())));
        merged
    }

    pub fn get(&self, param: usize) -> Option<&[String]> {
        self.0.get(&param).map(|v| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.0.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Check these overrides make sense for `layout`: every parameter must be
    /// a header parameter and must have the right number of lines.
    pub fn validate_against(&self, layout: &RecordLayout) -> Result<(), RecordError> {
        let problems: Vec<String> = self
            .0
            .keys()
            .filter(|&&k| k > layout.last_header_param)
            .map(|k| {
                format!(
                    "parameter {k} is not a header parameter (the header ends at parameter {})",
                    layout.last_header_param
                )
            })
            .collect();
        if !problems.is_empty() {
            return Err(RecordError::Validation { problems });
        }

        for (&param, lines) in &self.0 {
            let expected = layout.lines_for_param(param);
            if lines.len() != expected {
                return Err(RecordError::ParamLineCount {
                    param,
                    expected,
                    given: lines.len(),
                });
            }
        }
        Ok(())
    }
}

fn parse_param_number(s: &str) -> Result<usize, String> {
    match s.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(n as usize),
        Ok(n) => Err(format!(
            "parameter numbers must be positive integers, got {n}"
        )),
        Err(_) => Err(format!(
            "parameter numbers must be positive integers, got '{s}'"
        )),
    }
}

fn normalise_line_endings(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

fn split_value_lines(value: &str) -> Vec<String> {
    normalise_line_endings(value)
        .lines()
        .map(|l| l.to_string())
        .collect()
}

/// Split a line into its value and comment. The delimiter is the first colon
/// that isn't immediately followed by a backslash.
fn split_comment(line: &str) -> (&str, Option<&str>) {
    match line
        .match_indices(':')
        .find(|(i, _)| !line[i + 1..].starts_with('\\'))
    {
        Some((i, _)) => (&line[..i], Some(&line[i + 1..])),
        None => (line, None),
    }
}

/// A parsed record file. Line endings are normalised to `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFile {
    layout: RecordLayout,
    lines: Vec<RecordLine>,
    trailing_newline: bool,
    path: Option<PathBuf>,
}

impl RecordFile {
    pub fn parse(text: &str, layout: RecordLayout) -> RecordFile {
        let text = normalise_line_endings(text);
        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(&text);

        let mut lines = vec![];
        if !text.is_empty() {
            let mut param = 1;
            let mut part = 1;
            let mut catalog_index = 0;
            for raw in body.split('\n') {
                let (value, comment) = split_comment(raw);
                let role = if value.trim().is_empty() {
                    LineRole::Blank
                } else if param > layout.last_header_param {
                    catalog_index += 1;
                    LineRole::Catalog {
                        index: catalog_index - 1,
                    }
                } else {
                    let role = LineRole::Header { param, part };
                    if part >= layout.lines_for_param(param) {
                        param += 1;
                        part = 1;
                    } else {
                        part += 1;
                    }
                    role
                };
                lines.push(RecordLine {
                    value: value.to_string(),
                    comment: comment.map(|c| c.to_string()),
                    role,
                });
            }
        }

        RecordFile {
            layout,
            lines,
            trailing_newline,
            path: None,
        }
    }

    /// Read and parse a record file. Invalid UTF-8 is replaced rather than
    /// rejected.
    pub fn read<P: AsRef<Path>>(path: P, layout: RecordLayout) -> Result<RecordFile, RecordError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| RecordError::Read {
            file: path.to_path_buf(),
            err,
        })?;
        let mut record = RecordFile::parse(&String::from_utf8_lossy(&bytes), layout);
        record.path = Some(path.to_path_buf());
        Ok(record)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    pub fn lines(&self) -> &[RecordLine] {
        &self.lines
    }

    pub fn header(&self) -> HeaderBlock {
        let mut params: Vec<HeaderParam> = vec![];
        for line in &self.lines {
            if let LineRole::Header { param, .. } = line.role {
                let value = line.value.trim().to_string();
                match params.last_mut() {
                    Some(p) if p.number == param => p.parts.push(value),
                    _ => params.push(HeaderParam {
                        number: param,
                        parts: vec![value],
                    }),
                }
            }
        }
        HeaderBlock { params }
    }

    /// The value of one header parameter, multiple lines joined with `\n`.
    pub fn header_param(&self, param: usize) -> Option<String> {
        self.header().get(param).map(|p| p.value())
    }

    /// Every line before the first catalog line, comments included and
    /// trailing whitespace removed.
    pub fn header_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .take_while(|l| !matches!(l.role, LineRole::Catalog { .. }))
            .map(|l| l.text().trim_end().to_string())
            .collect()
    }

    /// The catalog lines, without comments, whitespace-trimmed.
    pub fn catalog_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| matches!(l.role, LineRole::Catalog { .. }))
            .map(|l| l.value.trim())
            .collect()
    }

    /// Parse every catalog line and check they all have the same number of
    /// columns.
    pub fn catalog(&self) -> Result<Vec<ScanRecord>, RecordError> {
        let records = self
            .catalog_lines()
            .into_iter()
            .map(|l| parse_record(l, self.path()))
            .collect::<Result<Vec<_>, _>>()?;
        validate_uniform(&records, self.path())?;
        Ok(records)
    }

    /// Decide whether this file lists slices or full interferograms, looking
    /// only at the first catalog line.
    pub fn catalog_kind(&self) -> Result<CatalogKind, UndeterminedKind> {
        classify_lines(&self.catalog_lines())
    }

    /// Write this file back out with `overrides` applied. Lines that aren't
    /// overridden (or affected by `options`) are unchanged.
    pub fn rewrite(
        &self,
        overrides: &ParamOverrides,
        options: &RewriteOptions,
    ) -> Result<String, RecordError> {
        overrides.validate_against(&self.layout)?;

        let mut out = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            match line.role {
                LineRole::Header { param, part } => {
                    if let Some(new) = overrides.get(param).and_then(|v| v.get(part - 1)) {
                        // Keep the spacing between the value and any comment.
                        let trailing = &line.value[line.value.trim_end().len()..];
                        let new_line = RecordLine {
                            value: format!("{new}{trailing}"),
                            comment: line.comment.clone(),
                            role: line.role,
                        };
                        out.push(new_line.text());
                        continue;
                    }
                }

                LineRole::Catalog { .. } => {
                    if !options.include_catalog {
                        continue;
                    }
                    if let Some(action) = &options.catalog_dir {
                        let new_line = RecordLine {
                            value: rebase_catalog_value(&line.value, action),
                            comment: line.comment.clone(),
                            role: line.role,
                        };
                        out.push(new_line.text());
                        continue;
                    }
                }

                LineRole::Blank => (),
            }
            out.push(line.text());
        }

        let mut s = out.join("\n");
        if self.trailing_newline && !out.is_empty() {
            s.push('\n');
        }
        Ok(s)
    }
}

impl Display for RecordFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.lines.iter().map(|l| l.text()).join("\n"))?;
        if self.trailing_newline {
            writeln!(f)?;
        }
        Ok(())
    }
}

fn rebase_catalog_value(value: &str, action: &CatalogDirAction) -> String {
    if kind_from_columns(value.split_whitespace().count()) == Some(CatalogKind::Slices) {
        info!(
            "Not changing the directory of catalog line '{}'; it looks like a slice line",
            value.trim()
        );
        return value.to_string();
    }

    let stripped = value.trim_start();
    let lead = &value[..value.len() - stripped.len()];
    let name_end = stripped
        .find(char::is_whitespace)
        .unwrap_or(stripped.len());
    let (name, rest) = stripped.split_at(name_end);
    let base = base_name(name);
    let new_name = match action {
        CatalogDirAction::Strip => base.to_string(),
        CatalogDirAction::Replace(dir) => Path::new(dir).join(base).display().to_string(),
    };
    format!("{lead}{new_name}{rest}")
}

/// Rewrite the record file `src` with `overrides`, saving to `dest` (or over
/// `src` if `dest` is `None`). The overrides are validated before any file is
/// touched, and a failure part way through leaves the destination as it was.
pub fn modify_record_file(
    src: &Path,
    dest: Option<&Path>,
    layout: &RecordLayout,
    overrides: &ParamOverrides,
    options: &RewriteOptions,
) -> Result<(), RecordError> {
    overrides.validate_against(layout)?;

    let record = RecordFile::read(src, layout.clone())?;
    let new = record.rewrite(overrides, options)?;
    let dest = dest.unwrap_or(src);
    debug!("Writing modified {} to {}", src.display(), dest.display());
    write_via_temp_file(dest, &new).map_err(|err| RecordError::Write {
        file: dest.to_path_buf(),
        err,
    })
}

/// Read a record file's header values (multi-line values joined with `\n`)
/// and its verbatim, trimmed catalog lines.
pub fn read_header_and_catalog<P: AsRef<Path>>(
    path: P,
    layout: &RecordLayout,
) -> Result<(Vec<String>, Vec<String>), RecordError> {
    let record = RecordFile::read(path, layout.clone())?;
    let catalog = record
        .catalog_lines()
        .into_iter()
        .map(|l| l.to_string())
        .collect();
    Ok((record.header().values(), catalog))
}

/// The header of one record file and the catalogs of many.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatenatedRecords {
    pub header_lines: Vec<String>,
    pub catalog_lines: Vec<String>,
}

/// Join the catalogs of many record files. The header lines come from the
/// first file. Each file's catalog must be uniform on its own.
pub fn concat_record_files<P: AsRef<Path>>(
    files: &[P],
    layout: &RecordLayout,
) -> Result<ConcatenatedRecords, RecordError> {
    let mut header_lines = None;
    let mut catalog_lines = vec![];
    for file in files {
        let file = file.as_ref();
        let record = RecordFile::read(file, layout.clone())?;
        let these = record.catalog_lines();
        validate_uniform_lines(&these, Some(file))?;
        info!("{} scans found in {}", these.len(), file.display());

        if header_lines.is_none() {
            header_lines = Some(record.header_lines());
        }
        catalog_lines.extend(these.into_iter().map(|l| l.to_string()));
    }

    Ok(ConcatenatedRecords {
        header_lines: header_lines.unwrap_or_default(),
        catalog_lines,
    })
}

/// Where the catalog starts in the files given to [`patch_record_headers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogStart {
    /// Every parameter value from this (1-based) parameter number on.
    Param(usize),

    /// Every line from this (1-based) line number on. Useful when the files'
    /// headers don't follow the current layout, e.g. files from an older GGG
    /// where a parameter took a different number of lines.
    Line(usize),
}

impl CatalogStart {
    /// The first parameter after the header of `layout`.
    pub fn after_header(layout: &RecordLayout) -> CatalogStart {
        CatalogStart::Param(layout.last_header_param() + 1)
    }
}

impl FromStr for CatalogStart {
    type Err = RecordError;

    /// A parameter number (e.g. `29`) or a line number prefixed with `l`
    /// (e.g. `l239`).
    fn from_str(s: &str) -> Result<CatalogStart, RecordError> {
        let bad = || RecordError::CatalogStart {
            given: s.to_string(),
        };
        let s = s.trim();
        let (number, by_line) = match s.strip_prefix('l') {
            Some(n) => (n, true),
            None => (s, false),
        };
        let number: usize = number.parse().map_err(|_| bad())?;
        match (number, by_line) {
            (0, _) => Err(bad()),
            (n, true) => Ok(CatalogStart::Line(n)),
            (n, false) => Ok(CatalogStart::Param(n)),
        }
    }
}

/// The non-blank lines of a record file from `start` on, trimmed.
fn catalog_lines_from(text: &str, start: CatalogStart, layout: &RecordLayout) -> Vec<String> {
    match start {
        CatalogStart::Param(param) => RecordFile::parse(text, layout.ending_at(param - 1))
            .catalog_lines()
            .into_iter()
            .map(|l| l.to_string())
            .collect(),
        CatalogStart::Line(line) => normalise_line_endings(text)
            .lines()
            .skip(line - 1)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect(),
    }
}

/// Write a copy of each of `catalog_files` into `save_dir` with its header
/// replaced by the header of `header_example`. The copies keep the file names
/// of the catalog files. Existing files in `save_dir` are only replaced if
/// `overwrite` is set. Returns the files written.
pub fn patch_record_headers<P: AsRef<Path>>(
    header_example: &Path,
    catalog_files: &[P],
    save_dir: &Path,
    start: CatalogStart,
    overwrite: bool,
    layout: &RecordLayout,
) -> Result<Vec<PathBuf>, RecordError> {
    let header_lines = RecordFile::read(header_example, layout.clone())?.header_lines();
    debug!(
        "{} header lines read from {}",
        header_lines.len(),
        header_example.display()
    );
    std::fs::create_dir_all(save_dir).map_err(|err| RecordError::Write {
        file: save_dir.to_path_buf(),
        err,
    })?;

    let mut written = vec![];
    for file in catalog_files {
        let file = file.as_ref();
        let name = file.file_name().ok_or_else(|| RecordError::Read {
            file: file.to_path_buf(),
            err: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file name"),
        })?;
        let new_file = save_dir.join(name);
        if !overwrite && new_file.exists() {
            warn!("Not writing {} because it already exists", new_file.display());
            continue;
        }

        let bytes = std::fs::read(file).map_err(|err| RecordError::Read {
            file: file.to_path_buf(),
            err,
        })?;
        let catalog = catalog_lines_from(&String::from_utf8_lossy(&bytes), start, layout);
        let mut text = header_lines.iter().chain(catalog.iter()).join("\n");
        text.push('\n');
        info!("Writing {}", new_file.display());
        write_via_temp_file(&new_file, &text).map_err(|err| RecordError::Write {
            file: new_file.clone(),
            err,
        })?;
        written.push(new_file);
    }
    Ok(written)
}
