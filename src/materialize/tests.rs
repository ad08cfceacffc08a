// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{collections::BTreeMap, path::Path};

use indoc::{formatdoc, indoc};
use tempfile::TempDir;

use super::*;
use crate::toolchain::GggInstall;

const HEADER: &str = indoc! {"
    ./orig_slices/        :Input directory
    ./orig_spectra/       :Output directory
    1                     :Save separated interferograms
    4
    5
    6
    7
    /old/flimit.i2s       :flimit file
"};

fn layout() -> RecordLayout {
    RecordLayout::new(8)
}

/// A batch with one date for site `ci`. The source data directory is
/// created, but nothing is put in it.
struct Batch {
    tmp: TempDir,
    config: RunConfig,
}

impl Batch {
    fn new(uses_slices: bool, site_options: &str, catalog: &[&str]) -> Batch {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let subdir = if uses_slices { "slices" } else { "igms" };
        std::fs::create_dir_all(root.join("data/ci/ci20190101").join(subdir)).unwrap();
        std::fs::create_dir(root.join("records")).unwrap();
        std::fs::write(root.join("flimit.i2s"), "flimit\n").unwrap();
        std::fs::write(
            root.join("records/ci20190101.in"),
            format!("{HEADER}{}\n", catalog.join("\n")),
        )
        .unwrap();

        let cfg_file = root.join("i2s.toml");
        std::fs::write(
            &cfg_file,
            formatdoc! {r#"
                [Run]
                run_top_dir = "runs"

                [Sites.ci]
                uses_slices = {uses_slices}
                site_root_dir = "data/ci"
                subdir = "{subdir}"
                flimit_file = "flimit.i2s"
                {site_options}

                [Sites.ci.ci20190101]
                record_file = "records/ci20190101.in"
            "#},
        )
        .unwrap();
        let config = RunConfig::load(&cfg_file).unwrap();
        Batch { tmp, config }
    }

    fn root(&self) -> &Path {
        self.tmp.path()
    }

    fn source_dir(&self) -> PathBuf {
        self.config.source_dir("ci", "ci20190101").unwrap()
    }

    fn run_dir(&self) -> PathBuf {
        self.config.run_dir("ci", "ci20190101").unwrap()
    }

    fn materializer(&self, options: LinkOptions) -> Materializer {
        Materializer::new(&self.config, options).with_layout(layout())
    }
}

/// Everything under `dir`: link targets for links, contents for files.
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, String> {
    let mut snap = BTreeMap::new();
    let mut to_visit = vec![dir.to_path_buf()];
    while let Some(d) = to_visit.pop() {
        for entry in std::fs::read_dir(&d).unwrap() {
            let path = entry.unwrap().path();
            let meta = std::fs::symlink_metadata(&path).unwrap();
            if meta.file_type().is_symlink() {
                let target = std::fs::read_link(&path).unwrap();
                snap.insert(path, format!("-> {}", target.display()));
            } else if meta.is_dir() {
                snap.insert(path.clone(), "dir".to_string());
                to_visit.push(path);
            } else {
                snap.insert(path.clone(), std::fs::read_to_string(&path).unwrap());
            }
        }
    }
    snap
}

#[test]
fn test_make_link() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    let link = tmp.path().join("link");
    std::fs::write(&a, "a").unwrap();
    std::fs::write(&b, "b").unwrap();

    assert_eq!(make_link(&a, &link, false).unwrap(), LinkAction::Created);
    assert_eq!(make_link(&b, &link, false).unwrap(), LinkAction::Kept);
    assert_eq!(std::fs::read_link(&link).unwrap(), a);
    assert_eq!(make_link(&b, &link, true).unwrap(), LinkAction::Replaced);
    assert_eq!(std::fs::read_link(&link).unwrap(), b);

    // A broken link still counts as existing.
    std::fs::remove_file(&b).unwrap();
    assert!(!link.exists());
    assert_eq!(make_link(&a, &link, false).unwrap(), LinkAction::Kept);
    assert_eq!(std::fs::read_link(&link).unwrap(), b);
}

#[test]
fn test_standard_overrides() {
    let mut config_overrides = ParamOverrides::new();
    config_overrides.insert(2, "./my_spectra/").unwrap();
    let o = standard_overrides(SLICES_SUBDIR, &config_overrides);
    assert_eq!(o.get(1).unwrap(), ["./slices/".to_string()]);
    assert_eq!(o.get(2).unwrap(), ["./my_spectra/".to_string()]);
    assert_eq!(o.get(3).unwrap(), ["0".to_string()]);
    assert_eq!(o.get(8).unwrap(), ["./flimit.i2s".to_string()]);
}

#[test]
fn test_link_slice_run_dirs() {
    let batch = Batch::new(true, "", &["2019 1 1 1 0000001", "2019 1 1 1 0000005"]);
    std::fs::create_dir(batch.source_dir().join("190101.1")).unwrap();

    let results = batch.materializer(LinkOptions::default()).link_all();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].result.as_ref().unwrap(),
        &LinkOutcome::Linked { num_links: 2 }
    );

    let run_dir = batch.run_dir();
    assert_eq!(run_dir, batch.root().join("runs/ci/ci20190101"));
    let slice_link = run_dir.join("slices/190101.1");
    assert!(std::fs::symlink_metadata(&slice_link)
        .unwrap()
        .file_type()
        .is_symlink());
    assert_eq!(
        std::fs::read_link(&slice_link).unwrap(),
        batch.source_dir().join("190101.1")
    );
    assert_eq!(
        std::fs::read_link(run_dir.join(FLIMIT_LINK_NAME)).unwrap(),
        batch.root().join("flimit.i2s")
    );
    assert!(run_dir.join(SPECTRA_SUBDIR).is_dir());

    let record = RecordFile::read(run_dir.join(SLICE_INPUT_FILE_NAME), layout()).unwrap();
    assert_eq!(record.header_param(1).unwrap(), "./slices/");
    assert_eq!(record.header_param(2).unwrap(), "./spectra/");
    assert_eq!(record.header_param(3).unwrap(), "0");
    assert_eq!(record.header_param(4).unwrap(), "4");
    assert_eq!(record.header_param(8).unwrap(), "./flimit.i2s");
    assert_eq!(record.catalog_lines().len(), 2);
    // Comments survive.
    assert!(std::fs::read_to_string(run_dir.join(SLICE_INPUT_FILE_NAME))
        .unwrap()
        .contains(":Input directory"));
}

#[test]
fn test_linking_twice_changes_nothing() {
    let batch = Batch::new(true, "", &["2019 1 1 1 0000001"]);
    std::fs::create_dir(batch.source_dir().join("190101.1")).unwrap();
    let m = batch.materializer(LinkOptions::default());

    assert_eq!(
        m.link_date("ci", "ci20190101").unwrap(),
        LinkOutcome::Linked { num_links: 2 }
    );
    let before = snapshot(&batch.run_dir());
    assert_eq!(
        m.link_date("ci", "20190101").unwrap(),
        LinkOutcome::Linked { num_links: 0 }
    );
    assert_eq!(snapshot(&batch.run_dir()), before);
}

#[test]
fn test_clean_spectra() {
    let batch = Batch::new(true, "", &["2019 1 1 1 0000001"]);
    batch
        .materializer(LinkOptions::default())
        .link_date("ci", "ci20190101")
        .unwrap();
    let old_spectrum = batch.run_dir().join("spectra/old_spectrum");
    std::fs::write(&old_spectrum, "").unwrap();

    let options = LinkOptions {
        clean_spectra: true,
        ..Default::default()
    };
    batch
        .materializer(options)
        .link_date("ci", "ci20190101")
        .unwrap();
    assert!(!old_spectrum.exists());
    assert!(batch.run_dir().join(SPECTRA_SUBDIR).is_dir());
}

const FULL_CATALOG: &[&str] = &[
    "ci20190101saaaaa.001 2019 1 1 1 34.1 -118.1 0.39",
    "ci20190101saaaaa.002 2019 1 1 1 34.1 -118.1 0.39",
];

#[test]
fn test_link_full_igrams() {
    let batch = Batch::new(false, "", FULL_CATALOG);
    for f in ["ci20190101saaaaa.001", "ci20190101saaaaa.002"] {
        std::fs::write(batch.source_dir().join(f), "igram").unwrap();
    }

    assert_eq!(
        batch
            .materializer(LinkOptions::default())
            .link_date("ci", "ci20190101")
            .unwrap(),
        LinkOutcome::Linked { num_links: 3 }
    );
    let igms = batch.run_dir().join(IGMS_SUBDIR);
    assert_eq!(
        std::fs::read_to_string(igms.join("ci20190101saaaaa.002")).unwrap(),
        "igram"
    );
    let record = RecordFile::read(batch.run_dir().join(FULL_INPUT_FILE_NAME), layout()).unwrap();
    assert_eq!(record.header_param(1).unwrap(), "./igms/");

    let report = check_links(&batch.config, &layout()).unwrap();
    assert_eq!(report.num_dates_missing(), 0);

    // A link whose target has gone is missing.
    std::fs::remove_file(batch.source_dir().join("ci20190101saaaaa.001")).unwrap();
    let report = check_links(&batch.config, &layout()).unwrap();
    assert_eq!(report.dates[0].missing, vec!["ci20190101saaaaa.001"]);
}

#[test]
fn test_catalog_dirs_are_dropped_for_full_igrams() {
    let batch = Batch::new(
        false,
        "",
        &["sub/ci20190101saaaaa.001 2019 1 1 1 34.1 -118.1 0.39"],
    );
    std::fs::create_dir(batch.source_dir().join("sub")).unwrap();
    std::fs::write(batch.source_dir().join("sub/ci20190101saaaaa.001"), "igram").unwrap();

    assert_eq!(
        batch
            .materializer(LinkOptions::default())
            .link_date("ci", "ci20190101")
            .unwrap(),
        LinkOutcome::Linked { num_links: 2 }
    );
    let igms = batch.run_dir().join(IGMS_SUBDIR);
    assert_eq!(
        std::fs::read_to_string(igms.join("ci20190101saaaaa.001")).unwrap(),
        "igram"
    );
    let record = RecordFile::read(batch.run_dir().join(FULL_INPUT_FILE_NAME), layout()).unwrap();
    assert!(record.catalog_lines()[0].starts_with("ci20190101saaaaa.001 2019 1 1"));

    let report = check_links(&batch.config, &layout()).unwrap();
    assert_eq!(report.num_dates_missing(), 0);

    std::fs::remove_file(batch.source_dir().join("sub/ci20190101saaaaa.001")).unwrap();
    let report = check_links(&batch.config, &layout()).unwrap();
    assert_eq!(report.dates[0].missing, vec!["ci20190101saaaaa.001"]);
}

#[test]
fn test_missing_igram_never_partially_links() {
    let batch = Batch::new(false, "", FULL_CATALOG);
    std::fs::write(batch.source_dir().join("ci20190101saaaaa.001"), "igram").unwrap();

    let result = batch
        .materializer(LinkOptions::default())
        .link_date("ci", "ci20190101");
    match result {
        Err(MaterializeError::MissingSources { missing, .. }) => {
            assert_eq!(
                missing,
                vec![batch.source_dir().join("ci20190101saaaaa.002")]
            )
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert!(!batch.run_dir().exists());

    let options = LinkOptions {
        ignore_missing: true,
        ..Default::default()
    };
    let outcome = batch
        .materializer(options)
        .link_date("ci", "ci20190101")
        .unwrap();
    assert!(matches!(outcome, LinkOutcome::SkippedMissing { missing } if missing.len() == 1));
    assert!(!batch.run_dir().exists());
}

#[test]
fn test_kind_mismatch() {
    let batch = Batch::new(true, "", FULL_CATALOG);
    assert!(matches!(
        batch
            .materializer(LinkOptions::default())
            .link_date("ci", "ci20190101"),
        Err(MaterializeError::KindMismatch { .. })
    ));
}

#[test]
fn test_reorganise_slices() {
    let batch = Batch::new(
        true,
        "slices_need_reorg = true",
        &["2019 1 1 1 0000001", "2019 1 1 1 0000003"],
    );
    let src = batch.source_dir();
    for f in [
        "b0000001.0",
        "b0000001.0.info",
        "b0000001.1.info",
        "b0000002.0",
        "b0000003.0",
        "not_a_slice",
    ] {
        std::fs::write(src.join(f), f).unwrap();
    }

    batch
        .materializer(LinkOptions::default())
        .link_date("ci", "ci20190101")
        .unwrap();
    let scan_dir = batch.run_dir().join("slices/190101.1/scan");
    let mut linked: Vec<String> = std::fs::read_dir(&scan_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    linked.sort();
    assert_eq!(
        linked,
        vec![
            "b0000001.0",
            "b0000001.0.info",
            "b0000001.1.info",
            "b0000002.0",
            "b0000003.0"
        ]
    );

    // The second scan only has its .0 file.
    let report = check_links(&batch.config, &layout()).unwrap();
    assert_eq!(report.dates[0].missing, vec!["0000003"]);
    assert_eq!(report.num_dates_missing(), 1);
}

#[test]
fn test_flimit_from_toolchain() {
    let batch = Batch::new(true, "", &["2019 1 1 1 0000001"]);
    std::fs::remove_file(batch.root().join("flimit.i2s")).unwrap();
    let ggg_dir = batch.root().join("ggg");
    std::fs::create_dir_all(ggg_dir.join("i2s")).unwrap();
    std::fs::write(ggg_dir.join("i2s/flimit.i2s"), "flimit\n").unwrap();
    let ggg = GggInstall::new(&ggg_dir).unwrap();

    batch
        .materializer(LinkOptions::default())
        .with_toolchain(&ggg)
        .link_date("ci", "ci20190101")
        .unwrap();
    assert_eq!(
        std::fs::read_link(batch.run_dir().join(FLIMIT_LINK_NAME)).unwrap(),
        ggg_dir.join("i2s/flimit.i2s")
    );
}

#[test]
fn test_check_links_without_input_file() {
    let batch = Batch::new(true, "", &["2019 1 1 1 0000001"]);
    assert!(matches!(
        check_links(&batch.config, &layout()),
        Err(MaterializeError::NoInputFile { .. })
    ));
}

#[test]
fn test_parallel_script() {
    let batch = Batch::new(true, "", &["2019 1 1 1 0000001"]);
    batch
        .materializer(LinkOptions::default())
        .link_date("ci", "ci20190101")
        .unwrap();
    let ggg_dir = batch.root().join("ggg");
    std::fs::create_dir_all(ggg_dir.join("bin")).unwrap();
    std::fs::write(ggg_dir.join("bin/i2s"), "").unwrap();
    let ggg = GggInstall::new(&ggg_dir).unwrap();

    let script = batch.config.run_top_dir.join(PARALLEL_SCRIPT_NAME);
    assert_eq!(
        write_parallel_script(&batch.config, &ggg, &script, false).unwrap(),
        1
    );
    assert_eq!(
        std::fs::read_to_string(&script).unwrap(),
        format!(
            "cd ci/ci20190101 && {} slice-i2s.in > i2s.log\n",
            ggg_dir.join("bin/i2s").display()
        )
    );

    write_parallel_script(&batch.config, &ggg, &script, true).unwrap();
    assert!(std::fs::read_to_string(&script)
        .unwrap()
        .starts_with(&format!("cd {} &&", batch.run_dir().display())));
}
