//! fu-generate: writes the generated definition files.
//!
//! Contains:
//! - currencies (deflated, vintage-qualified currency units)
//! - emissions (species units and GWP contexts)
//! - flows (per-flow units from property tables)

pub mod currencies;
pub mod emissions;
pub mod error;
pub mod flows;

use std::path::{Path, PathBuf};

use fu_units::FlowRegistry;
use tracing::info;

pub use error::{GenerateError, GenerateResult};

/// First lines of every generated file.
pub const FILE_HEADER: &str = "\
# This file is generated by fu-generate. Do not edit it by hand; change the
# input data and regenerate instead.

";

/// Input files of the generators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The `data/` directory shipped with the workspace.
    pub fn bundled() -> Self {
        Self::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../../data"))
    }

    pub fn currencies(&self) -> PathBuf {
        self.root.join("currencies.yaml")
    }

    pub fn gwp(&self) -> PathBuf {
        self.root.join("gwp.yaml")
    }

    pub fn flows_dir(&self) -> PathBuf {
        self.root.join("flows")
    }
}

/// Run all generators into `out` (the `generated/` directory): currencies,
/// emissions, then flows. `registry` is used to synthesize flow units.
pub fn generate_all(
    data: &DataLayout,
    registry: &FlowRegistry,
    out: &Path,
) -> GenerateResult<Vec<PathBuf>> {
    if !out.is_dir() {
        return Err(GenerateError::NotADirectory(out.to_path_buf()));
    }
    let mut written = Vec::new();

    let currencies = currencies::load_dataset(&data.currencies())?;
    written.extend(currencies::generate_currencies(&currencies, out)?);

    let gwp = emissions::load_dataset(&data.gwp())?;
    written.extend(emissions::generate_emissions(&gwp, out)?);

    written.extend(flows::generate_flows(registry, &data.flows_dir(), out)?);

    info!(files = written.len(), out = %out.display(), "generation finished");
    Ok(written)
}

pub(crate) fn write_file(path: &Path, contents: &str) -> GenerateResult<()> {
    std::fs::write(path, contents).map_err(GenerateError::io(path))
}
