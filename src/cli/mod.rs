// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code. More specific options for `i2s-batch`
//! subcommands are contained in modules.
//!
//! Arguments that can come from an arguments file (`link` and `run`) follow
//! one rule: all booleans must have `#[serde(default)]` annotated, and
//! anything that isn't a boolean must be optional.
//!
//! Only 3 things should be public in this module: `I2sBatch`,
//! `I2sBatch::run`, and `I2sBatchError`.

#[macro_use]
mod common;
mod catalog;
mod config;
mod error;
mod link;
mod records;
mod run;

pub use error::I2sBatchError;

use std::path::PathBuf;

use clap::{AppSettings, Args, Parser, Subcommand};
use log::info;

use crate::{record::RecordLayout, PROGRESS_BARS};

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = r#"Set up and run batches of I2S (interferogram to spectrum) jobs across many sites and dates.
A batch is described by a TOML config file; see "i2s-batch build-cfg --help"."#
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct I2sBatch {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Don't draw progress bars.
    #[clap(long)]
    #[clap(global = true)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,

    /// Only verify that arguments were correctly ingested and print out
    /// high-level information. Nothing is written.
    #[clap(long)]
    #[clap(global = true)]
    dry_run: bool,

    /// Save the input arguments into a new TOML file that can be used to
    /// reproduce this run. Only used by the link and run subcommands.
    #[clap(long)]
    #[clap(global = true)]
    save_toml: Option<PathBuf>,

    /// The root of the GGG install providing I2S (bin/i2s) and its data files.
    #[clap(long, env = "GGGPATH")]
    #[clap(global = true)]
    ggg_path: Option<PathBuf>,

    /// The number of the last header parameter in record files. The default
    /// (28) suits standard I2S input files.
    #[clap(long)]
    #[clap(global = true)]
    last_header_param: Option<usize>,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(about = r#"Build a batch config file from record (I2S input) files.
Record file names must start with the site ID and date, e.g. pa20190101.in."#)]
    BuildCfg(config::BuildCfgArgs),

    #[clap(alias = "up-cfg")]
    #[clap(about = "Point the dates of a batch config at new record files.")]
    UpdateCfg(config::UpdateCfgArgs),

    #[clap(alias = "hc")]
    #[clap(about = "Combine record files into one header file and one catalog file.")]
    HeaderCatalog(catalog::HeaderCatalogArgs),

    #[clap(alias = "build-cfg-many")]
    #[clap(
        about = r#"Split the catalogs of record files (or a header and catalog file) by day, month or year.
Writes one record file per split and a batch config for all of them."#
    )]
    SplitCatalog(catalog::SplitCatalogArgs),

    #[clap(alias = "mod-runs")]
    #[clap(about = "Change header parameters and catalog directories of many record files.")]
    ModRecords(records::ModRecordsArgs),

    #[clap(alias = "patch-runfiles")]
    #[clap(about = "Give record files the header of another record file.")]
    PatchRecords(catalog::PatchRecordsArgs),

    #[clap(
        about = r#"Write a slice record file with scans found in YYMMDD.R run directories.
The header is copied from a template record file."#
    )]
    SliceCatalog(catalog::SliceCatalogArgs),

    #[clap(alias = "link-inp")]
    #[clap(about = "Set up the run directory of every date in a batch config.")]
    Link(link::LinkArgs),

    #[clap(alias = "chk-links")]
    #[clap(about = "Check that run directories have links to everything they list.")]
    CheckLinks(link::CheckLinksArgs),

    #[clap(alias = "par")]
    #[clap(about = "Write a script with one I2S command per date, for GNU parallel.")]
    ParFile(link::ParFileArgs),

    #[clap(about = "Run I2S in the run directory of every date in a batch config.")]
    Run(run::RunArgs),

    #[clap(about = r#"Ask a batch I2S run to stop.
Dates that have already started will finish."#)]
    Halt(run::HaltArgs),
}

impl I2sBatch {
    pub fn run(self) -> Result<(), I2sBatchError> {
        // Set up logging.
        let GlobalArgs {
            verbosity,
            dry_run,
            no_progress_bars,
            save_toml,
            ggg_path,
            last_header_param,
        } = self.global_opts;
        setup_logging(verbosity)
            .map_err(|e| I2sBatchError::Generic(format!("Failed to initialise logging: {e}")))?;
        // Enable progress bars if the user didn't say "no progress bars".
        if !no_progress_bars {
            PROGRESS_BARS.store(true);
        }

        // Print the version of i2s-batch and its build-time information.
        let sub_command = match &self.command {
            Command::BuildCfg(_) => "build-cfg",
            Command::UpdateCfg(_) => "update-cfg",
            Command::HeaderCatalog(_) => "header-catalog",
            Command::SplitCatalog(_) => "split-catalog",
            Command::ModRecords(_) => "mod-records",
            Command::PatchRecords(_) => "patch-records",
            Command::SliceCatalog(_) => "slice-catalog",
            Command::Link(_) => "link",
            Command::CheckLinks(_) => "check-links",
            Command::ParFile(_) => "par-file",
            Command::Run(_) => "run",
            Command::Halt(_) => "halt",
        };
        info!("i2s-batch {} {}", sub_command, env!("CARGO_PKG_VERSION"));
        display_build_info();

        let layout = last_header_param
            .map(RecordLayout::new)
            .unwrap_or_default();
        let ggg_path = ggg_path.as_deref();

        macro_rules! merge_save {
            ($args:expr) => {{
                let args = $args.merge()?;
                if let Some(toml) = save_toml {
                    let toml_str = toml::to_string(&args).map_err(|e| {
                        I2sBatchError::Generic(format!("Couldn't serialise arguments: {e}"))
                    })?;
                    std::fs::write(&toml, toml_str)?;
                    info!("Saved arguments to {}", toml.display());
                }
                args
            }};
        }

        match self.command {
            // Config and record file utilities.
            Command::BuildCfg(args) => args.run(&layout, dry_run)?,
            Command::UpdateCfg(args) => args.run(dry_run)?,
            Command::HeaderCatalog(args) => args.run(&layout, dry_run)?,
            Command::SplitCatalog(args) => args.run(&layout, dry_run)?,
            Command::ModRecords(args) => args.run(&layout, dry_run)?,
            Command::PatchRecords(args) => args.run(&layout, dry_run)?,
            Command::SliceCatalog(args) => args.run(&layout, dry_run)?,

            // Run directories.
            Command::Link(args) => merge_save!(args).run(ggg_path, &layout, dry_run)?,
            Command::CheckLinks(args) => args.run(&layout)?,
            Command::ParFile(args) => args.run(ggg_path, dry_run)?,

            // Running I2S.
            Command::Run(args) => merge_save!(args).run(ggg_path, dry_run)?,
            Command::Halt(args) => args.run()?,
        }

        info!("i2s-batch {} complete.", sub_command);
        Ok(())
    }
}

/// Activate a logger. All log messages are put onto `stdout`. `env_logger`
/// automatically only uses colours and fancy symbols if we're on a tty (e.g. a
/// terminal); piped output will be formatted sensibly. Source code lines are
/// displayed in log messages when verbosity >= 3.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.try_init()
}

/// Write many info-level log lines of how this executable was compiled.
fn display_build_info() {
    let dirty = match GIT_DIRTY {
        Some(true) => " (dirty)",
        _ => "",
    };
    match GIT_COMMIT_HASH_SHORT {
        Some(hash) => {
            info!("Compiled on git commit hash: {hash}{dirty}");
        }
        None => info!("Compiled on git commit hash: <no git info>"),
    }
    if let Some(hr) = GIT_HEAD_REF {
        info!("            git head ref: {}", hr);
    }
    info!("            {}", BUILT_TIME_UTC);
    info!("         with compiler {}", RUSTC_VERSION);
    info!("");
}
