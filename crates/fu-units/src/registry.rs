//! `FlowRegistry`: the engine plus species-aware rewriting and flow loading.

use std::rc::Rc;

use fu_engine::{FormatStyle, Quantity, UnitRegistry, UnitsContainer};
use tracing::debug;

use crate::contexts::{ContextTables, ConversionTable};
use crate::error::{UnitsError, UnitsResult};
use crate::flows::{DefinitionBlock, FlowSpec, synthesize};
use crate::formatter::{EngineFormatter, Formatter, RewritingFormatter};
use crate::loader::{DefinitionLoader, PathLayout};
use crate::rewriter::{RewriterCache, SymbolRewriter};
use crate::species::SpeciesList;

/// Where a flow's definitions come from.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowSource {
    /// Pre-generated `flows/<ID>.txt` under the definitions directory.
    Stored(String),
    /// Synthesized from a `FlowSpec` at load time.
    Spec { id: String, spec: FlowSpec },
}

impl From<&str> for FlowSource {
    fn from(id: &str) -> Self {
        FlowSource::Stored(id.to_string())
    }
}

/// Unit registry for energy and commodity flows.
///
/// Every string that reaches the engine's parser goes through
/// [`SymbolRewriter::preprocess`], and every formatted quantity through
/// [`SymbolRewriter::postprocess`], so `kg CO2` and `t CH4` work as units.
#[derive(Debug)]
pub struct FlowRegistry {
    engine: UnitRegistry,
    layout: Option<PathLayout>,
    species: SpeciesList,
    currencies: Vec<String>,
    rewriter: RewriterCache,
}

impl FlowRegistry {
    /// Stock units and built-in species only; no definitions directory.
    pub fn new() -> UnitsResult<Self> {
        Ok(Self {
            engine: UnitRegistry::with_defaults()?,
            layout: None,
            species: SpeciesList::builtin(),
            currencies: Vec::new(),
            rewriter: RewriterCache::new(),
        })
    }

    /// Load static, emission and currency definitions from `layout`.
    pub fn bootstrap(layout: PathLayout) -> UnitsResult<Self> {
        let mut registry = Self::new()?;
        registry.currencies =
            DefinitionLoader::new(&layout).load_all(&mut registry.engine, &mut registry.species)?;
        registry.layout = Some(layout);
        Ok(registry)
    }

    /// Only `plain.txt` from `layout`; enough to synthesize flow units.
    pub fn with_static(layout: PathLayout) -> UnitsResult<Self> {
        let mut registry = Self::new()?;
        DefinitionLoader::new(&layout).load_static(&mut registry.engine)?;
        registry.layout = Some(layout);
        Ok(registry)
    }

    pub fn engine(&self) -> &UnitRegistry {
        &self.engine
    }

    pub fn layout(&self) -> Option<&PathLayout> {
        self.layout.as_ref()
    }

    pub fn species(&self) -> &SpeciesList {
        &self.species
    }

    pub fn currencies(&self) -> &[String] {
        &self.currencies
    }

    pub fn add_species(&mut self, species: &str) -> UnitsResult<bool> {
        self.species.push(species)
    }

    fn rewriter(&self) -> UnitsResult<Rc<SymbolRewriter>> {
        Ok(self.rewriter.get(&self.species)?)
    }

    pub fn preprocess(&self, text: &str) -> UnitsResult<String> {
        Ok(self.rewriter()?.preprocess(text))
    }

    pub fn postprocess(&self, text: &str) -> UnitsResult<String> {
        Ok(self.rewriter()?.postprocess(text))
    }

    // ------------------------------------------------------------------
    // Parsing and conversion
    // ------------------------------------------------------------------

    pub fn parse_quantity(&self, text: &str) -> UnitsResult<Quantity> {
        Ok(self.engine.parse_expression(&self.preprocess(text)?)?)
    }

    pub fn parse_units(&self, text: &str) -> UnitsResult<UnitsContainer> {
        Ok(self.engine.parse_units(&self.preprocess(text)?)?)
    }

    /// Convert `quantity` to the unit expression `target`, with `context`
    /// (e.g. a GWP assessment) active for this call only.
    pub fn convert(
        &self,
        quantity: &Quantity,
        target: &str,
        context: Option<&str>,
    ) -> UnitsResult<Quantity> {
        let target = self.parse_units(target)?;
        Ok(self.engine.convert(quantity, &target, context)?)
    }

    pub fn convert_str(
        &self,
        source: &str,
        target: &str,
        context: Option<&str>,
    ) -> UnitsResult<Quantity> {
        let quantity = self.parse_quantity(source)?;
        self.convert(&quantity, target, context)
    }

    /// Abbreviated symbols, species re-spaced: `1.5 t CO2 / MWh_H2_LHV`.
    pub fn format_quantity(&self, quantity: &Quantity) -> UnitsResult<String> {
        self.format_quantity_with(quantity, FormatStyle::Abbreviated)
    }

    pub fn format_quantity_with(
        &self,
        quantity: &Quantity,
        style: FormatStyle,
    ) -> UnitsResult<String> {
        let formatter =
            RewritingFormatter::new(EngineFormatter::new(&self.engine, style), self.rewriter()?);
        formatter.format(quantity)
    }

    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    /// Define one unit or prefix.
    pub fn define(&mut self, line: &str) -> UnitsResult<()> {
        Ok(self.engine.define(line)?)
    }

    /// Load `flows/<ID>.txt` from the definitions directory.
    pub fn load_flow(&mut self, flow_id: &str) -> UnitsResult<()> {
        let layout = self
            .layout
            .as_ref()
            .ok_or_else(|| UnitsError::config("definitions directory not set"))?;
        DefinitionLoader::new(layout).load_flow(&mut self.engine, flow_id)
    }

    /// Synthesize and define the units of one flow.
    pub fn define_flow(&mut self, flow_id: &str, spec: &FlowSpec) -> UnitsResult<()> {
        let block = self.generate_flow_definitions(flow_id, spec)?;
        self.engine
            .load_str(&block.to_string(), &format!("<flow {flow_id}>"), None)?;
        debug!(flow = flow_id, units = block.unit_names().len(), "flow defined");
        Ok(())
    }

    pub fn define_flows<I, S>(&mut self, flows: I) -> UnitsResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<FlowSource>,
    {
        for flow in flows {
            match flow.into() {
                FlowSource::Stored(id) => self.load_flow(&id)?,
                FlowSource::Spec { id, spec } => self.define_flow(&id, &spec)?,
            }
        }
        Ok(())
    }

    /// Definition block for a flow, without defining it.
    pub fn generate_flow_definitions(
        &self,
        flow_id: &str,
        spec: &FlowSpec,
    ) -> UnitsResult<DefinitionBlock> {
        synthesize(&self.engine, flow_id, spec)
    }

    pub fn register_context(&mut self, id: &str, table: &ConversionTable) -> UnitsResult<()> {
        ContextTables::new(&mut self.engine).register(id, table)
    }

    pub fn context_ids(&self) -> Vec<&str> {
        self.engine.context_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::FactorKey;

    #[test]
    fn parse_rewrites_species() {
        let mut reg = FlowRegistry::new().unwrap();
        reg.define("gram__CO2 = [ghg_emission] = g__CO2").unwrap();
        let q = reg.parse_quantity("3 kg CO2 / kWh").unwrap();
        assert_eq!(q.units.exponent("kg__CO2"), 1);
        assert_eq!(reg.format_quantity(&q).unwrap(), "3 kg CO2 / kWh");
    }

    #[test]
    fn load_flow_needs_definitions_directory() {
        let mut reg = FlowRegistry::new().unwrap();
        let err = reg.define_flows(["H2"]).unwrap_err();
        assert!(matches!(err, UnitsError::Config { .. }));
    }

    #[test]
    fn define_flow_from_spec() {
        let mut reg = FlowRegistry::new().unwrap();
        let spec = FlowSpec::new("Hydrogen")
            .unwrap()
            .with_factor(FactorKey::EnergyContentLhv, "33.33 kWh/kg")
            .with_factor(FactorKey::EnergyContentHhv, "39.41 kWh/kg");
        // no volume factors, so no volume units are needed
        reg.define_flows([FlowSource::Spec {
            id: "H2".into(),
            spec,
        }])
        .unwrap();
        let q = reg.convert_str("1 kg_H2", "kWh_H2_LHV", None).unwrap();
        assert!((q.magnitude - 33.33).abs() < 0.1);
        assert_eq!(reg.format_quantity(&q).unwrap().split_once(' ').unwrap().1, "kWh_H2_LHV");
    }

    #[test]
    fn hostile_input_is_an_error_not_a_panic() {
        let reg = FlowRegistry::new().unwrap();
        let deep = format!("1 {}m{}", "(".repeat(10_000), ")".repeat(10_000));
        for source in [
            "1 m ** 2147483647 * m",
            "1 (m ** 65536) ** 65536",
            "1 (m ** 1000) ** 1000",
            deep.as_str(),
        ] {
            let err = reg.convert_str(source, "m", None).unwrap_err();
            assert!(
                matches!(err, UnitsError::Engine(fu_engine::EngineError::Parse { .. })),
                "{err}"
            );
        }
    }

    #[test]
    fn species_grow_and_rewriter_follows() {
        let mut reg = FlowRegistry::new().unwrap();
        assert_eq!(reg.preprocess("g SF6").unwrap(), "g SF6");
        assert!(reg.add_species("SF6").unwrap());
        assert_eq!(reg.preprocess("g SF6").unwrap(), "g__SF6");
        assert_eq!(reg.postprocess("g__SF6").unwrap(), "g SF6");
    }
}
