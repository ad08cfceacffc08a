// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests of commands that make or change record files.

use std::path::Path;

use tempfile::TempDir;

use crate::{get_cmd_output, i2s_batch, make_full_record_file, HEADER};

fn make_slice_run(slice_dir: &Path, run: &str, slice_ids: &[&str]) {
    let run_dir = slice_dir.join(run);
    std::fs::create_dir_all(&run_dir).unwrap();
    let mut log = String::from("Mon Apr 23 17:37:59 2018: Solar\n");
    for id in slice_ids {
        log.push_str(&format!(
            "Mon Apr 23 17:38:40 2018: Retrieving b{id}.0: 1 sec\n"
        ));
    }
    log.push_str("Mon Apr 23 17:39:02 2018: Request Completed\n");
    std::fs::write(run_dir.join("IFSretr.log"), log).unwrap();
}

#[test]
fn test_mod_records() {
    let tmp = TempDir::new().unwrap();
    let file = make_full_record_file(tmp.path(), "ci20190101.in", &[("a.001", 2019, 1, 1)]);
    let original = std::fs::read_to_string(&file).unwrap();

    let cmd = i2s_batch()
        .args([
            "mod-records",
            "-p",
            "2",
            "./new_spectra/",
            "--chdir",
            "/igms/",
            "-f",
            &file.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "mod-records failed: {:?}", get_cmd_output(cmd));

    let new = std::fs::read_to_string(&file).unwrap();
    assert!(new.starts_with("./igms/\n./new_spectra/\n"), "{new}");
    assert!(new.contains("/igms/a.001 2019 1 1"), "{new}");
    let backup = std::fs::read_to_string(tmp.path().join("ci20190101.in.bak")).unwrap();
    assert_eq!(backup, original);
}

#[test]
fn test_mod_records_rejects_unknown_parameters() {
    let tmp = TempDir::new().unwrap();
    let file = make_full_record_file(tmp.path(), "ci20190101.in", &[("a.001", 2019, 1, 1)]);
    let original = std::fs::read_to_string(&file).unwrap();

    let cmd = i2s_batch()
        .args([
            "mod-records",
            "-p",
            "99",
            "x",
            "-f",
            &file.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("mod-records --help"), "{stderr}");
    assert_eq!(std::fs::read_to_string(&file).unwrap(), original);
}

#[test]
fn test_header_catalog() {
    let tmp = TempDir::new().unwrap();
    let first = make_full_record_file(tmp.path(), "ci20190101.in", &[("a.001", 2019, 1, 1)]);
    let second = make_full_record_file(tmp.path(), "ci20190102.in", &[("b.001", 2019, 1, 2)]);
    let header = tmp.path().join("header.txt");
    let catalog = tmp.path().join("catalog.txt");

    let cmd = i2s_batch()
        .args([
            "header-catalog",
            &header.display().to_string(),
            &catalog.display().to_string(),
            &first.display().to_string(),
            &second.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "header-catalog failed: {:?}", get_cmd_output(cmd));

    assert_eq!(std::fs::read_to_string(&header).unwrap(), HEADER);
    let catalog = std::fs::read_to_string(&catalog).unwrap();
    let lines: Vec<&str> = catalog.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("a.001 2019 1 1"));
    assert!(lines[1].starts_with("b.001 2019 1 2"));
}

#[test]
fn test_slice_catalog() {
    let tmp = TempDir::new().unwrap();
    let slices = tmp.path().join("slices");
    make_slice_run(&slices, "190101.1", &["0000001"]);
    make_slice_run(&slices, "190102.1", &["0000002", "0000003"]);
    make_slice_run(&slices, "190102.2", &["0000004"]);
    make_slice_run(&slices, "190103.1", &["0000005"]);

    let template = tmp.path().join("template.in");
    std::fs::write(&template, format!("{HEADER}2018 1 1 1 0000009\n")).unwrap();
    let output = tmp.path().join("slice-i2s.in");

    let cmd = i2s_batch()
        .args([
            "slice-catalog",
            &template.display().to_string(),
            &output.display().to_string(),
            "-d",
            &slices.display().to_string(),
            "-s",
            "190102",
            "-e",
            "20190102.2",
        ])
        .ok();
    assert!(cmd.is_ok(), "slice-catalog failed: {:?}", get_cmd_output(cmd));

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.starts_with(HEADER), "{written}");
    let catalog: Vec<&str> = written.lines().skip(8).collect();
    assert_eq!(catalog, vec!["2019 1 2 1 0000002", "2019 1 2 2 0000004"]);
}

#[test]
fn test_patch_records() {
    let tmp = TempDir::new().unwrap();
    let example = tmp.path().join("example.in");
    std::fs::write(&example, HEADER.replace("./spectra/", "./new_spectra/")).unwrap();
    let first = make_full_record_file(tmp.path(), "ci20190101.in", &[("a.001", 2019, 1, 1)]);
    let second = make_full_record_file(tmp.path(), "ci20190102.in", &[("b.001", 2019, 1, 2)]);
    let save_dir = tmp.path().join("patched");

    let cmd = i2s_batch()
        .args([
            "patch-records",
            &example.display().to_string(),
            &save_dir.display().to_string(),
            &first.display().to_string(),
            &second.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "patch-records failed: {:?}", get_cmd_output(cmd));

    let patched = std::fs::read_to_string(save_dir.join("ci20190102.in")).unwrap();
    assert!(patched.starts_with("./igms/\n./new_spectra/\n"), "{patched}");
    assert!(patched.ends_with("\nb.001 2019 1 2 1 45.94 -90.27 0.44\n"), "{patched}");
    assert!(save_dir.join("ci20190101.in").exists());

    // By line number, and not over the files already there.
    std::fs::write(save_dir.join("ci20190101.in"), "keep\n").unwrap();
    let cmd = i2s_batch()
        .args([
            "patch-runfiles",
            "-c",
            "l9",
            &example.display().to_string(),
            &save_dir.display().to_string(),
            &first.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "patch-runfiles failed: {:?}", get_cmd_output(cmd));
    assert_eq!(
        std::fs::read_to_string(save_dir.join("ci20190101.in")).unwrap(),
        "keep\n"
    );

    let cmd = i2s_batch()
        .args([
            "patch-records",
            "-c",
            "l9",
            "--overwrite",
            &example.display().to_string(),
            &save_dir.display().to_string(),
            &first.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "patch-records failed: {:?}", get_cmd_output(cmd));
    let patched = std::fs::read_to_string(save_dir.join("ci20190101.in")).unwrap();
    assert!(patched.starts_with("./igms/\n./new_spectra/\n"), "{patched}");
    assert!(patched.ends_with("\na.001 2019 1 1 1 45.94 -90.27 0.44\n"), "{patched}");

    let cmd = i2s_batch()
        .args([
            "patch-records",
            "-c",
            "line9",
            &example.display().to_string(),
            &save_dir.display().to_string(),
            &first.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_err());
}
