// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod batch;
mod records;

use std::path::{Path, PathBuf};
use std::process::Output;
use std::str::from_utf8;

use assert_cmd::{output::OutputError, Command};

/// Header parameters in the record files made here.
const NUM_HEADER_PARAMS: &str = "8";

const HEADER: &str = "./igms/
./spectra/
0
param 4
param 5
param 6
param 7
./flimit.i2s
";

fn i2s_batch() -> Command {
    let mut cmd = Command::cargo_bin("i2s-batch").unwrap();
    cmd.env_remove("GGGPATH")
        .args(["--no-progress-bars", "--last-header-param", NUM_HEADER_PARAMS]);
    cmd
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

/// Write a record file listing full interferograms `igms` (file name, year,
/// month, day).
fn make_full_record_file(dir: &Path, name: &str, igms: &[(&str, u32, u32, u32)]) -> PathBuf {
    let mut text = HEADER.to_string();
    for (igm, year, month, day) in igms {
        text.push_str(&format!("{igm} {year} {month} {day} 1 45.94 -90.27 0.44\n"));
    }
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_no_args_prints_usage() {
    let (stdout, stderr) = get_cmd_output(Command::cargo_bin("i2s-batch").unwrap().ok());
    let text = format!("{stdout}{stderr}");
    assert!(text.contains("USAGE"), "{text}");
}

#[test]
fn test_subcommand_help() {
    for sub in [
        "build-cfg",
        "update-cfg",
        "header-catalog",
        "split-catalog",
        "mod-records",
        "patch-records",
        "slice-catalog",
        "link",
        "check-links",
        "par-file",
        "run",
        "halt",
    ] {
        let cmd = Command::cargo_bin("i2s-batch")
            .unwrap()
            .args([sub, "--help"])
            .ok();
        assert!(cmd.is_ok(), "{sub} --help failed: {:?}", cmd.err());
    }
}

#[test]
fn test_errors_go_to_stderr() {
    let tmp = tempfile::TempDir::new().unwrap();
    let missing = tmp.path().join("missing.toml");
    let cmd = i2s_batch()
        .args(["check-links", &missing.display().to_string()])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.starts_with("Error: "), "{stderr}");
    assert!(stderr.contains("missing.toml"), "{stderr}");
}
