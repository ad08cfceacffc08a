// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{io::Write, path::Path};

use log::trace;
use tempfile::NamedTempFile;

/// Write `contents` to a temporary file, then copy it over `dest`. If anything
/// fails before the copy, `dest` is untouched.
pub(crate) fn write_via_temp_file(dest: &Path, contents: &str) -> std::io::Result<()> {
    let mut tmp = NamedTempFile::new()?;
    trace!("Staging {} in {}", dest.display(), tmp.path().display());
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    std::fs::copy(tmp.path(), dest)?;
    Ok(())
}
