//! Flow definition files from per-flow property tables.
//!
//! `data/flows/<ID>.csv` has a `property,value` header, one row per property:
//!
//! ```text
//! property,value
//! name,Hydrogen
//! energycontent_LHV,33.33 kWh/kg
//! ```

use std::path::{Path, PathBuf};

use fu_units::{FlowRegistry, FlowSpec};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{GenerateError, GenerateResult};
use crate::{FILE_HEADER, write_file};

/// Flows that get a generated definitions file.
pub const SUPPORTED_FLOWS: [&str; 5] = ["H2", "NG", "NH3", "MeOH", "H2O"];

#[derive(Debug, Deserialize)]
struct PropertyRow {
    property: String,
    value: String,
}

pub fn read_flow_spec(path: &Path) -> GenerateResult<FlowSpec> {
    let csv_error = |source| GenerateError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    let mut pairs = Vec::new();
    for row in reader.deserialize::<PropertyRow>() {
        let row = row.map_err(csv_error)?;
        pairs.push((row.property, row.value.trim().to_string()));
    }
    Ok(FlowSpec::from_pairs(pairs)?)
}

/// Supported `<ID>.csv` files in `data_dir`, sorted by id.
pub fn flow_sources(data_dir: &Path) -> GenerateResult<Vec<(String, PathBuf)>> {
    let entries = std::fs::read_dir(data_dir).map_err(GenerateError::io(data_dir))?;
    let mut sources = Vec::new();
    for entry in entries {
        let path = entry.map_err(GenerateError::io(data_dir))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !SUPPORTED_FLOWS.contains(&id) {
            debug!(flow = id, "skipping unsupported flow");
            continue;
        }
        sources.push((id.to_string(), path.clone()));
    }
    sources.sort();
    Ok(sources)
}

/// Write `flows/<ID>.txt` under `out` for every supported flow in `data_dir`.
///
/// `registry` must know the static units (`plain.txt`).
pub fn generate_flows(
    registry: &FlowRegistry,
    data_dir: &Path,
    out: &Path,
) -> GenerateResult<Vec<PathBuf>> {
    let dir = out.join("flows");
    std::fs::create_dir_all(&dir).map_err(GenerateError::io(&dir))?;

    let mut written = Vec::new();
    for (id, source) in flow_sources(data_dir)? {
        let spec = read_flow_spec(&source)?;
        let block = registry.generate_flow_definitions(&id, &spec)?;
        let path = dir.join(format!("{id}.txt"));
        write_file(&path, &format!("{FILE_HEADER}{block}"))?;
        written.push(path);
    }
    info!(flows = written.len(), "flow definitions written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fu_units::FactorKey;

    #[test]
    fn reads_property_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("H2.csv");
        std::fs::write(
            &path,
            "property,value\nname,Hydrogen\nenergycontent_LHV,33.33 kWh/kg\nsource,literature\n",
        )
        .unwrap();
        let spec = read_flow_spec(&path).unwrap();
        assert_eq!(spec.name(), "Hydrogen");
        assert_eq!(spec.factor(FactorKey::EnergyContentLhv), Some("33.33 kWh/kg"));
        assert_eq!(spec.factors().count(), 1);
    }

    #[test]
    fn missing_name_is_a_units_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("X.csv");
        std::fs::write(&path, "property,value\nc_ratio,0.5\n").unwrap();
        assert!(matches!(
            read_flow_spec(&path),
            Err(GenerateError::Units(fu_units::UnitsError::Config { .. }))
        ));
    }

    #[test]
    fn only_supported_flows_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["NH3.csv", "H2.csv", "Steel.csv", "notes.txt"] {
            std::fs::write(dir.path().join(name), "property,value\n").unwrap();
        }
        let ids: Vec<String> = flow_sources(dir.path())
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["H2", "NH3"]);
    }
}
