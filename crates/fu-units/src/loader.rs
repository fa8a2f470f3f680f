//! Startup loading of static and generated definition files.
//!
//! Order is fixed: `plain.txt`, then emissions, then currencies; flows are
//! loaded on demand afterwards. Each stage refers to units of the previous
//! ones, so loading out of order fails with an undefined-unit error.

use std::path::{Path, PathBuf};

use fu_engine::{RedefinitionPolicy, UnitRegistry};
use tracing::{debug, info};

use crate::error::{UnitsError, UnitsResult};
use crate::species::SpeciesList;

/// Where the definition files live.
///
/// ```text
/// <root>/plain.txt
/// <root>/generated/emissions/{species,generic,<assessment>}.txt
/// <root>/generated/currencies/{currencies,<CODE>}.txt
/// <root>/generated/flows/<ID>.txt
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLayout {
    root: PathBuf,
}

impl PathLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The `definitions/` directory shipped with the workspace.
    pub fn bundled() -> Self {
        Self::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../../definitions"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plain(&self) -> PathBuf {
        self.root.join("plain.txt")
    }

    pub fn generated(&self) -> PathBuf {
        self.root.join("generated")
    }

    pub fn emissions_dir(&self) -> PathBuf {
        self.generated().join("emissions")
    }

    pub fn species_list(&self) -> PathBuf {
        self.emissions_dir().join("species.txt")
    }

    pub fn emissions_generic(&self) -> PathBuf {
        self.emissions_dir().join("generic.txt")
    }

    pub fn currencies_dir(&self) -> PathBuf {
        self.generated().join("currencies")
    }

    pub fn currency_list(&self) -> PathBuf {
        self.currencies_dir().join("currencies.txt")
    }

    pub fn currency_file(&self, code: &str) -> PathBuf {
        self.currencies_dir().join(format!("{code}.txt"))
    }

    pub fn flows_dir(&self) -> PathBuf {
        self.generated().join("flows")
    }

    pub fn flow_file(&self, flow_id: &str) -> PathBuf {
        self.flows_dir().join(format!("{flow_id}.txt"))
    }
}

pub struct DefinitionLoader<'a> {
    layout: &'a PathLayout,
}

impl<'a> DefinitionLoader<'a> {
    pub fn new(layout: &'a PathLayout) -> Self {
        Self { layout }
    }

    /// Static, emission and currency definitions, in that order. Returns the
    /// currency codes.
    pub fn load_all(
        &self,
        engine: &mut UnitRegistry,
        species: &mut SpeciesList,
    ) -> UnitsResult<Vec<String>> {
        self.load_static(engine)?;
        self.load_emissions(engine, species)?;
        let currencies = self.load_currencies(engine)?;
        info!(
            root = %self.layout.root().display(),
            units = engine.unit_count(),
            species = species.len(),
            currencies = currencies.len(),
            "definitions loaded"
        );
        Ok(currencies)
    }

    /// `plain.txt` redefines `year`; redefinitions are silent while it loads.
    pub fn load_static(&self, engine: &mut UnitRegistry) -> UnitsResult<()> {
        let previous = engine.redefinition_policy();
        engine.set_redefinition_policy(RedefinitionPolicy::Ignore);
        let result = engine.load_definitions(&self.layout.plain());
        engine.set_redefinition_policy(previous);
        result?;
        engine.set_redefinition_policy(RedefinitionPolicy::Warn);
        Ok(())
    }

    pub fn load_emissions(
        &self,
        engine: &mut UnitRegistry,
        species: &mut SpeciesList,
    ) -> UnitsResult<()> {
        let added = species.extend_from_lines(&read(&self.layout.species_list())?)?;
        debug!(added, "species registered");
        engine.load_definitions(&self.layout.emissions_generic())?;
        Ok(())
    }

    /// Currency files in `currencies.txt` order; the base currency is listed first.
    pub fn load_currencies(&self, engine: &mut UnitRegistry) -> UnitsResult<Vec<String>> {
        let codes: Vec<String> = read(&self.layout.currency_list())?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        for code in &codes {
            engine.load_definitions(&self.layout.currency_file(code))?;
        }
        Ok(codes)
    }

    pub fn load_flow(&self, engine: &mut UnitRegistry, flow_id: &str) -> UnitsResult<()> {
        let path = self.layout.flow_file(flow_id);
        if !path.is_file() {
            return Err(UnitsError::config(format!(
                "no definitions for flow '{flow_id}' at {}",
                path.display()
            )));
        }
        engine.load_definitions(&path)?;
        debug!(flow = flow_id, "flow definitions loaded");
        Ok(())
    }
}

fn read(path: &Path) -> UnitsResult<String> {
    std::fs::read_to_string(path).map_err(|source| UnitsError::Io {
        path: path.to_path_buf(),
        source,
    })
}
