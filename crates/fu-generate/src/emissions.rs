//! Species-qualified emission units and GWP contexts.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use fu_units::{BUILTIN_SPECIES, ConversionTable, render_context_block, sanitize_species_label};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{GenerateError, GenerateResult};
use crate::{FILE_HEADER, write_file};

/// CO2 as the emission dimension, its equivalents and elemental carbon.
pub const GENERIC_DEFS: &str = "\
gram__CO2 = [ghg_emission] = g__CO2
metric_ton__CO2 = 1E+6 gram__CO2 = t__CO2

gram__CO2eq = gram__CO2 = g__CO2eq = gram__CO2_eq = g__CO2_eq = gram__CO2e = g__CO2e
metric_ton__CO2eq = 1E+6 gram__CO2eq = t__CO2eq = metric_ton__CO2_eq = t__CO2_eq = metric_ton__CO2e = t__CO2e
gram__C = gram__CO2eq * 3.6667 = g__C = gram__Ce = g__Ce
metric_ton__C = 1E+6 gram__C = t__C = metric_ton__Ce = t__Ce

";

/// GWP tables keyed by assessment id (`AR5GWP100`), then by species label.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct GwpDataset {
    pub assessments: BTreeMap<String, BTreeMap<String, f64>>,
}

pub fn load_dataset(path: &Path) -> GenerateResult<GwpDataset> {
    let content = std::fs::read_to_string(path).map_err(GenerateError::io(path))?;
    serde_yaml::from_str(&content).map_err(|source| GenerateError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

impl GwpDataset {
    /// Sanitized species of all assessments, sorted, without the built-in ones.
    pub fn species(&self) -> Vec<String> {
        let all: BTreeSet<String> = self
            .assessments
            .values()
            .flat_map(|table| table.keys())
            .map(|label| sanitize_species_label(label))
            .filter(|s| !s.is_empty() && !BUILTIN_SPECIES.contains(&s.as_str()))
            .collect();
        all.into_iter().collect()
    }

    /// One assessment as a table over sanitized species.
    pub fn table(&self, assessment: &str) -> Option<ConversionTable> {
        let values = self.assessments.get(assessment)?;
        let mut table = ConversionTable::new();
        for (label, gwp) in values {
            let species = sanitize_species_label(label);
            if BUILTIN_SPECIES.contains(&species.as_str()) {
                continue;
            }
            if table.insert(species.clone(), *gwp).is_some() {
                warn!(assessment, species, "label collides after sanitizing");
            }
        }
        Some(table)
    }
}

/// Contents of `generic.txt`: generic units, per-species units, imports.
pub fn render_generic(dataset: &GwpDataset) -> String {
    let mut out = String::from(FILE_HEADER);
    out.push_str(GENERIC_DEFS);
    for species in dataset.species() {
        out.push_str(&format!(
            "gram__{species} = NaN gram__CO2 = g__{species}\n\
             metric_ton__{species} = 1E+6 gram__{species} = t__{species}\n\n"
        ));
    }
    for assessment in dataset.assessments.keys() {
        out.push_str(&format!("@import {assessment}.txt\n"));
    }
    out
}

/// Write `emissions/{generic,species,<assessment>}.txt` under `out`.
pub fn generate_emissions(dataset: &GwpDataset, out: &Path) -> GenerateResult<Vec<PathBuf>> {
    let dir = out.join("emissions");
    std::fs::create_dir_all(&dir).map_err(GenerateError::io(&dir))?;
    let mut written = Vec::new();

    for assessment in dataset.assessments.keys() {
        let table = dataset.table(assessment).unwrap_or_default();
        if table.is_empty() {
            return Err(GenerateError::dataset(format!(
                "assessment {assessment} has no species"
            )));
        }
        let path = dir.join(format!("{assessment}.txt"));
        let text = format!("{FILE_HEADER}{}", render_context_block(assessment, &table));
        write_file(&path, &text)?;
        written.push(path);
    }

    let generic = dir.join("generic.txt");
    write_file(&generic, &render_generic(dataset))?;
    written.push(generic);

    let species = dataset.species();
    let list = dir.join("species.txt");
    let text: String = species.iter().map(|s| format!("{s}\n")).collect();
    write_file(&list, &text)?;
    written.push(list);

    info!(
        assessments = dataset.assessments.len(),
        species = species.len(),
        "emission definitions written"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> GwpDataset {
        serde_yaml::from_str(
            r#"
AR4GWP100:
  CH4: 25
  HFC-134a: 1430
AR5GWP100:
  CH4: 28
  N2O: 265
  CO2: 1
"#,
        )
        .unwrap()
    }

    #[test]
    fn species_are_sanitized_sorted_and_exclude_builtins() {
        assert_eq!(dataset().species(), vec!["CH4", "HFC_134a", "N2O"]);
    }

    #[test]
    fn generic_file_layout() {
        let text = render_generic(&dataset());
        assert!(text.starts_with(FILE_HEADER));
        assert!(text.contains("gram__CO2 = [ghg_emission] = g__CO2\n"));
        assert!(text.contains("gram__HFC_134a = NaN gram__CO2 = g__HFC_134a\n"));
        assert!(text.contains("metric_ton__N2O = 1E+6 gram__N2O = t__N2O\n\n"));
        assert!(text.ends_with("@import AR4GWP100.txt\n@import AR5GWP100.txt\n"));
        assert!(!text.contains("gram__CO2 = NaN"));
    }

    #[test]
    fn assessment_table_uses_sanitized_labels() {
        let table = dataset().table("AR4GWP100").unwrap();
        assert_eq!(table.get("HFC_134a"), Some(1430.0));
        assert!(dataset().table("AR4GWP100").unwrap().get("CO2").is_none());
        assert!(dataset().table("AR99").is_none());
    }
}
