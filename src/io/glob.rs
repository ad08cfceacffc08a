// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Functions to glob files.

use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use thiserror::Error;

/// Given a glob pattern, get all of the matches from the filesystem. Matches
/// are returned sorted.
pub(crate) fn get_all_matches_from_glob(g: &str) -> Result<Vec<PathBuf>, GlobError> {
    let mut entries = vec![];
    for entry in glob(g)? {
        match entry {
            Ok(e) => entries.push(e),
            Err(e) => return Err(GlobError::GlobCrate(e)),
        }
    }
    Ok(entries)
}

/// Find the single entry of `dir` whose name matches `file_pattern`. The
/// directory part is escaped, so directories containing glob metacharacters
/// are handled. If there are no results, or more than one, an error is
/// returned.
pub(crate) fn get_single_match_in_dir(dir: &Path, file_pattern: &str) -> Result<PathBuf, GlobError> {
    let g = format!(
        "{}/{file_pattern}",
        Pattern::escape(&dir.display().to_string())
    );
    let entries = get_all_matches_from_glob(&g)?;
    match entries.as_slice() {
        [] => Err(GlobError::NoMatches { glob: g }),
        [e] => Ok(e.clone()),
        _ => Err(GlobError::MoreThanOneMatch {
            glob: g,
            matches: entries
                .iter()
                .map(|e| e.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

#[derive(Error, Debug)]
/// Error type associated with glob helper functions.
pub enum GlobError {
    #[error("No glob matches were found for {glob}")]
    NoMatches { glob: String },

    #[error("More than one glob match was found for {glob} ({matches}); we require only one match")]
    MoreThanOneMatch { glob: String, matches: String },

    #[error(transparent)]
    GlobCrate(#[from] glob::GlobError),

    #[error(transparent)]
    PatternError(#[from] glob::PatternError),
}
