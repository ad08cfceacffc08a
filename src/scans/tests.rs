// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{collections::BTreeMap, path::Path};

use indoc::indoc;
use tempfile::TempDir;

use super::*;
use crate::{config::RunConfig, record::RecordLayout};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_status_of() {
    assert_eq!(
        status_of("Mon Apr 23 17:38:40 2018: Retrieving b3621010.0: 1 sec"),
        "Retrieving b3621010.0: 1 sec"
    );
    assert_eq!(status_of("Mon Apr 23 17:37:59 2018: Solar"), "Solar");
    assert_eq!(status_of("t0: Solar"), "Solar");
    assert_eq!(status_of("  Request Completed  "), "Request Completed");
}

#[test]
fn test_group_one_scan() {
    let log = "t0: Solar\nt1: Retrieving b0000001.0\nt2: Request Completed\n";
    let scans = group_scans(log.as_bytes(), "Solar", ymd(2019, 1, 1), 1).unwrap();
    assert_eq!(
        scans,
        vec![GroupedScan {
            date: ymd(2019, 1, 1),
            run: 1,
            slice_ids: vec!["0000001".to_string()],
        }]
    );
    assert_eq!(
        scans[0].catalog_line().as_deref(),
        Some("2019 1 1 1 0000001")
    );
}

#[test]
fn test_group_real_log() {
    let log = indoc! {"
        Mon Apr 23 17:30:00 2018: Startup
        Mon Apr 23 17:37:59 2018: Solar
        Mon Apr 23 17:38:40 2018: Retrieving b3621010.0: 1 sec
        Mon Apr 23 17:38:51 2018: Retrieving b3621011.0: 1 sec
        Mon Apr 23 17:39:02 2018: Request Completed
        Mon Apr 23 17:40:00 2018: Lamp
        Mon Apr 23 17:40:10 2018: Request Completed
        Mon Apr 23 17:41:00 2018: Solar
        Mon Apr 23 17:41:10 2018: Retrieving b3621020.0: 1 sec
        Mon Apr 23 17:41:20 2018: Request Completed
    "};
    let scans = group_scans(log.as_bytes(), DEFAULT_SCAN_TYPE, ymd(2018, 4, 23), 2).unwrap();
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0].slice_ids, vec!["3621010", "3621011"]);
    assert_eq!(scans[1].slice_ids, vec!["3621020"]);

    // Other scan types can be collected instead.
    let lamps = group_scans(log.as_bytes(), "Lamp", ymd(2018, 4, 23), 2).unwrap();
    assert_eq!(lamps.len(), 1);
    assert!(lamps[0].slice_ids.is_empty());
    assert!(lamps[0].catalog_line().is_none());
}

#[test]
fn test_malformed_line_drops_scan() {
    let log = indoc! {"
        t0: Solar
        t1: Retrieving b0000001.0
        t2: Solar
        t3: Retrieving b0000002.0
        t4: Request Completed
        t5: Solar
        t6: Retrieving b0000003.0
        t7: Request Completed
    "};
    let scans = group_scans(log.as_bytes(), "Solar", ymd(2019, 1, 1), 1).unwrap();
    // The second "Solar" breaks the first scan and does not start a new one,
    // so the next scan found is the one at t5.
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].slice_ids, vec!["0000003"]);
}

#[test]
fn test_missing_log_gives_no_scans() {
    let tmp = TempDir::new().unwrap();
    let scans = group_run_dir(tmp.path(), "Solar", ymd(2019, 1, 1), 1).unwrap();
    assert!(scans.is_empty());
}

#[test]
fn test_run_bound_parsing() {
    assert_eq!(
        "190101".parse::<RunBound>().unwrap(),
        RunBound {
            date: ymd(2019, 1, 1),
            run: None
        }
    );
    assert_eq!(
        "20190101.3".parse::<RunBound>().unwrap(),
        RunBound {
            date: ymd(2019, 1, 1),
            run: Some(3)
        }
    );
    for bad in ["2019-01-01", "190101.1.2", "1901", "190132", "190101.x"] {
        assert!(
            matches!(
                bad.parse::<RunBound>(),
                Err(ScanGroupError::BadBound { .. })
            ),
            "{bad} should not parse"
        );
    }
}

/// Make a slice directory with run directories, each with one scan per slice
/// number given.
fn make_slice_dir(dir: &Path, runs: &[(&str, &[&str])]) {
    for (run_dir, slices) in runs {
        let run_dir = dir.join(run_dir);
        std::fs::create_dir_all(&run_dir).unwrap();
        let mut log = String::new();
        for slice in *slices {
            log.push_str(&format!(
                "t0: Solar\nt1: Retrieving b{slice}.0\nt2: Request Completed\n"
            ));
        }
        std::fs::write(run_log_path(&run_dir), log).unwrap();
    }
}

#[test]
fn test_resolve_range() {
    let tmp = TempDir::new().unwrap();
    make_slice_dir(
        tmp.path(),
        &[
            ("190101.1", &["1"]),
            ("190101.2", &["2"]),
            ("190103.1", &["3"]),
            ("190103.4", &["4"]),
        ],
    );
    // Not run directories.
    std::fs::create_dir(tmp.path().join("notes")).unwrap();
    std::fs::write(tmp.path().join("190102.1"), "a file").unwrap();

    let inventory = inventory_run_dirs(tmp.path()).unwrap();
    assert_eq!(inventory.len(), 2);
    assert_eq!(inventory[&ymd(2019, 1, 3)], vec![1, 4]);

    let range = resolve_range(tmp.path(), &RangeRequest::default(), &inventory).unwrap();
    assert_eq!(
        range,
        SliceRange {
            start_date: ymd(2019, 1, 1),
            end_date: ymd(2019, 1, 3),
            start_run: 1,
            end_run: 4,
        }
    );

    let request = RangeRequest {
        start: Some("190101.2".into()),
        start_run: Some(2),
        ..Default::default()
    };
    assert!(matches!(
        resolve_range(tmp.path(), &request, &inventory),
        Err(ScanGroupError::RunGivenTwice { which: "start" })
    ));

    let request = RangeRequest {
        end_run: Some(0),
        ..Default::default()
    };
    assert!(matches!(
        resolve_range(tmp.path(), &request, &inventory),
        Err(ScanGroupError::RunTooSmall { which: "end" })
    ));

    let request = RangeRequest {
        start: Some("20190102".into()),
        end: Some("190102".into()),
        ..Default::default()
    };
    assert!(matches!(
        resolve_range(tmp.path(), &request, &inventory),
        Err(ScanGroupError::Setup { .. })
    ));
}

#[test]
fn test_generate_respects_runs() {
    let tmp = TempDir::new().unwrap();
    make_slice_dir(
        tmp.path(),
        &[
            ("190101.1", &["1"]),
            ("190101.2", &["2", "3"]),
            ("190102.1", &["4"]),
            ("190103.1", &["5"]),
        ],
    );
    let request = RangeRequest {
        start: Some("190101.2".into()),
        end: Some("190103".into()),
        end_run: Some(1),
        ..Default::default()
    };
    let scans = generate(tmp.path(), &request, "Solar").unwrap();
    let firsts: Vec<&str> = scans.iter().map(|s| s.slice_ids[0].as_str()).collect();
    assert_eq!(firsts, vec!["2", "3", "4", "5"]);
}

#[test]
fn test_empty_slice_dir() {
    let tmp = TempDir::new().unwrap();
    assert!(matches!(
        generate(tmp.path(), &RangeRequest::default(), "Solar"),
        Err(ScanGroupError::NoRunDirs { .. })
    ));
}

#[test]
fn test_fully_given_range_needs_no_run_dirs() {
    let tmp = TempDir::new().unwrap();
    let request = RangeRequest {
        start: Some("190101.1".into()),
        end: Some("190102.1".into()),
        ..Default::default()
    };
    let range = resolve_range(tmp.path(), &request, &BTreeMap::new()).unwrap();
    assert_eq!(
        range,
        SliceRange {
            start_date: ymd(2019, 1, 1),
            end_date: ymd(2019, 1, 2),
            start_run: 1,
            end_run: 1,
        }
    );
    // Missing run directories only give warnings.
    assert!(generate(tmp.path(), &request, "Solar").unwrap().is_empty());
    assert!(generate(&tmp.path().join("nowhere"), &request, "Solar")
        .unwrap()
        .is_empty());

    // The named run directories are used even though nothing else is there.
    make_slice_dir(tmp.path(), &[("190102.1", &["7"])]);
    let scans = generate(tmp.path(), &request, "Solar").unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].slice_ids, vec!["7"]);

    // Within one date, every run between the bounds is looked for.
    make_slice_dir(tmp.path(), &[("190103.2", &["8"])]);
    let request = RangeRequest {
        start: Some("190103".into()),
        end: Some("190103".into()),
        start_run: Some(1),
        end_run: Some(3),
    };
    let scans = generate(tmp.path(), &request, "Solar").unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].run, 2);

    let backwards = RangeRequest {
        start: Some("190103.3".into()),
        end: Some("190103.1".into()),
        ..Default::default()
    };
    assert!(matches!(
        resolve_range(tmp.path(), &backwards, &BTreeMap::new()),
        Err(ScanGroupError::BackwardsRange { .. })
    ));
}

const TEMPLATE: &str = indoc! {"
    ./slices/                :Slice directory
    ./spectra/               :Output directory
    0                        :Catalog format
    2019 1 1 1 0000009
"};

#[test]
fn test_add_slice_catalog() {
    let tmp = TempDir::new().unwrap();
    let slices = tmp.path().join("slices");
    std::fs::create_dir(&slices).unwrap();
    make_slice_dir(&slices, &[("190101.1", &["0000001"]), ("190102.1", &["0000002"])]);
    // A run whose only scan has no slices.
    let empty_run = slices.join("190102.2");
    std::fs::create_dir(&empty_run).unwrap();
    std::fs::write(
        run_log_path(&empty_run),
        "t0: Solar\nt1: Request Completed\n",
    )
    .unwrap();

    let template = tmp.path().join("template.in");
    std::fs::write(&template, TEMPLATE).unwrap();
    let dest = tmp.path().join("slice-i2s.in");
    let layout = RecordLayout::new(3);
    let n = add_slice_catalog(
        &template,
        &dest,
        None,
        &RangeRequest::default(),
        "Solar",
        &layout,
    )
    .unwrap();
    assert_eq!(n, 2);

    let written = std::fs::read_to_string(&dest).unwrap();
    assert_eq!(
        written,
        indoc! {"
            ./slices/                :Slice directory
            ./spectra/               :Output directory
            0                        :Catalog format
            2019 1 1 1 0000001
            2019 1 2 1 0000002
        "}
    );
}

#[test]
fn test_split_catalog_lines() {
    let lines = [
        "2019 1 1 1 0000001",
        "2019 1 2 1 0000002",
        "2019 2 1 1 0000003",
        // Not adjacent to its day, but still grouped with it.
        "2019 1 1 2 0000004",
        "",
    ];
    let by_day = split_catalog_lines(&lines, "ci", SplitBy::D).unwrap();
    assert_eq!(
        by_day.keys().collect::<Vec<_>>(),
        vec!["ci20190101", "ci20190102", "ci20190201"]
    );
    assert_eq!(by_day["ci20190101"].len(), 2);

    let by_month = split_catalog_lines(&lines, "ci", SplitBy::M).unwrap();
    assert_eq!(
        by_month.keys().collect::<Vec<_>>(),
        vec!["ci201901", "ci201902"]
    );
    let by_year = split_catalog_lines(&lines, "ci", SplitBy::Y).unwrap();
    assert_eq!(by_year["ci2019"].len(), 4);

    assert!(matches!(
        split_catalog_lines(&["pa20040721saaaaa.043"], "pa", SplitBy::D),
        Err(ScanGroupError::NoDate { .. })
    ));
    assert_eq!("m".parse::<SplitBy>().unwrap(), SplitBy::M);
}

#[test]
fn test_write_split_batch() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("batch");
    let header: Vec<String> = ["./igms/", "./spectra/", "0"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let catalog = [
        "pa20040721saaaaa.043 2004 7 21 1 45.9 -90.2 442.0",
        "pa20040721saaaaa.044 2004 7 21 1 45.9 -90.2 442.0",
        "pa20040722saaaaa.001 2004 7 22 1 45.9 -90.2 442.0",
    ];
    let layout = RecordLayout::new(3);
    let cfg_file =
        write_split_batch(&out, "pa", &header, &catalog, None, SplitBy::D, &layout).unwrap();
    assert_eq!(cfg_file, out.join(SPLIT_CONFIG_NAME));

    let first = std::fs::read_to_string(out.join("pa20040721.opus-i2s.in")).unwrap();
    assert_eq!(first.lines().count(), 5);
    assert!(out.join("pa20040722.opus-i2s.in").exists());

    let text = std::fs::read_to_string(&cfg_file).unwrap();
    let doc: toml::Table = toml::from_str(&text).unwrap();
    assert_eq!(doc["Sites"]["pa"]["uses_slices"].as_bool(), Some(false));
    assert_eq!(
        doc["Sites"]["pa"]["pa20040722"]["record_file"].as_str(),
        Some("pa20040722.opus-i2s.in")
    );
    // The placeholders still need filling in before this loads.
    assert!(RunConfig::load(&cfg_file).is_err());
}
