// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Materialise and execute batch runs of the I2S interferogram-to-spectrum
pipeline across many sites and dates.
 */

pub mod catalog;
mod cli;
pub mod config;
pub mod execute;
pub(crate) mod io;
pub mod materialize;
pub mod record;
pub mod scans;
pub mod toolchain;

// Re-exports.
pub use catalog::{CatalogKind, ScanRecord};
pub use cli::{I2sBatch, I2sBatchError};
pub use config::{RunConfig, SiteConfig, SiteOptions};
pub use execute::{CancellationSource, HaltFile, HaltFlag};
pub use record::{ParamOverrides, RecordFile, RecordLayout};
pub use toolchain::{GggInstall, ToolchainLocator};

use crossbeam_utils::atomic::AtomicCell;

lazy_static::lazy_static! {
    /// Are progress bars being drawn? This should only ever be enabled by CLI
    /// code.
    static ref PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
}
