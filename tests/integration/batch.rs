// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests of whole batches: configs, linking and running.

use std::path::{Path, PathBuf};

use indoc::indoc;
use tempfile::TempDir;

use crate::{get_cmd_output, i2s_batch, make_full_record_file};

fn path_arg(p: &Path) -> String {
    p.display().to_string()
}

/// A batch of one date for site `ci` with two interferograms in `data/igms`.
/// Returns the config file.
fn make_linkable_batch(root: &Path) -> PathBuf {
    std::fs::create_dir_all(root.join("data/igms")).unwrap();
    for igm in ["ci20190101.001", "ci20190101.002"] {
        std::fs::write(root.join("data/igms").join(igm), igm).unwrap();
    }
    std::fs::write(root.join("flimit.i2s"), "flimit\n").unwrap();
    make_full_record_file(
        root,
        "ci20190101.in",
        &[("ci20190101.001", 2019, 1, 1), ("ci20190101.002", 2019, 1, 1)],
    );

    let cfg = root.join("i2s.toml");
    std::fs::write(
        &cfg,
        indoc! {r#"
            [Run]
            run_top_dir = "runs"

            [Sites.ci]
            uses_slices = false
            site_root_dir = "data"
            no_date_dir = true
            subdir = "igms"
            flimit_file = "flimit.i2s"

            [Sites.ci.ci20190101]
            record_file = "ci20190101.in"
        "#},
    )
    .unwrap();
    cfg
}

#[test]
fn test_build_cfg() {
    let tmp = TempDir::new().unwrap();
    let first = make_full_record_file(tmp.path(), "ci20190101.in", &[("a.001", 2019, 1, 1)]);
    let second = make_full_record_file(tmp.path(), "ci20190102.in", &[("b.001", 2019, 1, 2)]);
    let cfg = tmp.path().join("i2s.toml");

    let cmd = i2s_batch()
        .args([
            "build-cfg",
            &path_arg(&cfg),
            &path_arg(&first),
            &path_arg(&second),
        ])
        .ok();
    assert!(cmd.is_ok(), "build-cfg failed: {:?}", get_cmd_output(cmd));

    let text = std::fs::read_to_string(&cfg).unwrap();
    assert!(text.contains("uses_slices = false"), "{text}");
    assert!(text.contains("ci20190101"), "{text}");
    assert!(text.contains("ci20190102"), "{text}");
    assert!(text.contains("run_top_dir"), "{text}");
}

#[test]
fn test_build_cfg_dry_run_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let record = make_full_record_file(tmp.path(), "ci20190101.in", &[("a.001", 2019, 1, 1)]);
    let cfg = tmp.path().join("i2s.toml");

    let cmd = i2s_batch()
        .args(["--dry-run", "build-cfg", &path_arg(&cfg), &path_arg(&record)])
        .ok();
    assert!(cmd.is_ok(), "build-cfg failed: {:?}", get_cmd_output(cmd));
    assert!(!cfg.exists());
}

#[test]
fn test_split_catalog_by_month() {
    let tmp = TempDir::new().unwrap();
    let jan = make_full_record_file(
        tmp.path(),
        "ci20190101.in",
        &[("a.001", 2019, 1, 1), ("a.002", 2019, 1, 31)],
    );
    let feb = make_full_record_file(tmp.path(), "ci20190215.in", &[("b.001", 2019, 2, 15)]);
    let out = tmp.path().join("split");

    let cmd = i2s_batch()
        .args([
            "split-catalog",
            "-s",
            "M",
            "ci",
            &path_arg(&out),
            &path_arg(&jan),
            &path_arg(&feb),
        ])
        .ok();
    assert!(cmd.is_ok(), "split-catalog failed: {:?}", get_cmd_output(cmd));

    let jan_split = std::fs::read_to_string(out.join("ci201901.opus-i2s.in")).unwrap();
    assert!(jan_split.starts_with("./igms/\n"));
    assert!(jan_split.contains("a.001 2019 1 1"));
    assert!(jan_split.contains("a.002 2019 1 31"));
    assert!(!jan_split.contains("b.001"));
    let feb_split = std::fs::read_to_string(out.join("ci201902.opus-i2s.in")).unwrap();
    assert!(feb_split.contains("b.001 2019 2 15"));

    let cfg = std::fs::read_to_string(out.join("i2s_parallel.toml")).unwrap();
    assert!(cfg.contains("ci201901.opus-i2s.in"), "{cfg}");
    assert!(cfg.contains("ci201902.opus-i2s.in"), "{cfg}");
}

#[test]
fn test_link_then_check_links() {
    let tmp = TempDir::new().unwrap();
    let cfg = make_linkable_batch(tmp.path());

    let cmd = i2s_batch()
        .args(["link", "-c", &path_arg(&cfg), "--no-runscript"])
        .ok();
    assert!(cmd.is_ok(), "link failed: {:?}", get_cmd_output(cmd));

    let run_dir = tmp.path().join("runs/ci/ci20190101");
    assert!(run_dir.join("spectra").is_dir());
    assert!(run_dir.join("igms/ci20190101.001").exists());
    assert!(run_dir.join("flimit.i2s").exists());
    let input = std::fs::read_to_string(run_dir.join("opus-i2s.in")).unwrap();
    assert!(input.contains("ci20190101.002 2019 1 1"));

    let cmd = i2s_batch()
        .args(["check-links", &path_arg(&cfg)])
        .ok();
    assert!(cmd.is_ok(), "check-links failed: {:?}", get_cmd_output(cmd));

    // A link whose target has gone is missing.
    std::fs::remove_file(tmp.path().join("data/igms/ci20190101.002")).unwrap();
    let cmd = i2s_batch()
        .args(["check-links", "-d", "3", &path_arg(&cfg)])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("Error:"), "{stderr}");
    assert!(stderr.contains("1 of 1 dates"), "{stderr}");
}

#[test]
fn test_halt_file() {
    let tmp = TempDir::new().unwrap();
    let halt = tmp.path().join("stop");
    let cmd = i2s_batch()
        .args(["halt", "--halt-file", &path_arg(&halt)])
        .ok();
    assert!(cmd.is_ok(), "halt failed: {:?}", get_cmd_output(cmd));
    assert!(halt.exists());
}

#[test]
fn test_run_needs_a_ggg_install() {
    let tmp = TempDir::new().unwrap();
    let cfg = make_linkable_batch(tmp.path());
    let cmd = i2s_batch().args(["run", "-c", &path_arg(&cfg)]).ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("GGG"), "{stderr}");
}

#[cfg(unix)]
#[test]
fn test_link_and_run_with_a_toolchain() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = TempDir::new().unwrap();
    let cfg = make_linkable_batch(tmp.path());
    let bin = tmp.path().join("ggg/bin");
    std::fs::create_dir_all(&bin).unwrap();
    let i2s = bin.join("i2s");
    std::fs::write(&i2s, "#!/bin/sh\necho \"processing $1\"\ntouch spectra/ci20190101s0e00a.0001\n")
        .unwrap();
    std::fs::set_permissions(&i2s, std::fs::Permissions::from_mode(0o755)).unwrap();
    let ggg = path_arg(&tmp.path().join("ggg"));

    let cmd = i2s_batch()
        .args(["--ggg-path", &ggg, "link", "-c", &path_arg(&cfg)])
        .ok();
    assert!(cmd.is_ok(), "link failed: {:?}", get_cmd_output(cmd));
    let script = std::fs::read_to_string(tmp.path().join("runs/multii2s.sh")).unwrap();
    assert!(script.starts_with("cd ci/ci20190101 && "), "{script}");

    let cmd = i2s_batch()
        .args(["--ggg-path", &ggg, "run", "-c", &path_arg(&cfg)])
        .ok();
    assert!(cmd.is_ok(), "run failed: {:?}", get_cmd_output(cmd));

    let run_dir = tmp.path().join("runs/ci/ci20190101");
    assert!(run_dir.join("spectra/ci20190101s0e00a.0001").exists());
    let logs: Vec<PathBuf> = std::fs::read_dir(&run_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("run_i2s_")
        })
        .collect();
    assert_eq!(logs.len(), 1);
    let log = std::fs::read_to_string(&logs[0]).unwrap();
    assert!(log.contains("processing opus-i2s.in"), "{log}");
}
