// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! File stuff (globs, relative paths, staged writes) shared by the record
//! codec, the materialiser and the executor.

mod glob;
mod paths;
mod staged;

pub(crate) use self::glob::{get_all_matches_from_glob, get_single_match_in_dir, GlobError};
pub(crate) use paths::relative_to;
pub(crate) use staged::write_via_temp_file;
