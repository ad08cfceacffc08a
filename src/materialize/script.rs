// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A script for running the whole batch with GNU parallel.

use std::{fmt::Write, path::Path};

use log::info;

use super::MaterializeError;
use crate::{
    config::RunConfig,
    io::{get_single_match_in_dir, relative_to, write_via_temp_file, GlobError},
    toolchain::{ToolchainLocator, I2S_EXECUTABLE},
};

/// The script written to `run_top_dir` after linking.
pub const PARALLEL_SCRIPT_NAME: &str = "multii2s.sh";

/// The single I2S input file (`*i2s*.in`) in a run directory.
pub fn find_input_file(run_dir: &Path) -> Result<std::path::PathBuf, GlobError> {
    get_single_match_in_dir(run_dir, "*i2s*.in")
}

/// Write a file with one line per date, `cd RUN_DIR && I2S INPUT > i2s.log`,
/// suitable for `parallel -j N < FILE`. Run directories are relative to the
/// script's directory unless `abspaths` is set. Returns the number of lines.
pub fn write_parallel_script(
    config: &RunConfig,
    toolchain: &dyn ToolchainLocator,
    script: &Path,
    abspaths: bool,
) -> Result<usize, MaterializeError> {
    let i2s = toolchain.existing_executable(I2S_EXECUTABLE)?;
    let script = std::path::absolute(script).map_err(|err| MaterializeError::Write {
        file: script.to_path_buf(),
        err,
    })?;
    let script_dir = script.parent().unwrap_or_else(|| Path::new("/"));

    let mut text = String::new();
    let mut num_lines = 0;
    for (site, date_key) in config.dates() {
        let run_dir = config.run_dir(site, date_key)?;
        let input_file = find_input_file(&run_dir)?;
        let input_name = input_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let cd_dir = if abspaths {
            run_dir
        } else {
            relative_to(&run_dir, script_dir)
        };
        // Writing to a String can't fail.
        let _ = writeln!(
            text,
            "cd {} && {} {input_name} > i2s.log",
            cd_dir.display(),
            i2s.display()
        );
        num_lines += 1;
    }

    write_via_temp_file(&script, &text).map_err(|err| MaterializeError::Write {
        file: script.clone(),
        err,
    })?;
    info!("Wrote {num_lines} I2S commands to {}", script.display());
    Ok(num_lines)
}
