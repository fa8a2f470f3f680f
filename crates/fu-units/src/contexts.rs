//! Named conversion tables selectable per conversion call.

use std::collections::BTreeMap;

use fu_engine::{Quantity, UnitRegistry, UnitsContainer};

use crate::error::{UnitsError, UnitsResult};

/// Species -> CO2-equivalent factor, e.g. a GWP100 table of one assessment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionTable {
    factors: BTreeMap<String, f64>,
}

impl ConversionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, species: impl Into<String>, factor: f64) -> Option<f64> {
        self.factors.insert(species.into(), factor)
    }

    pub fn get(&self, species: &str) -> Option<f64> {
        self.factors.get(species).copied()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.factors.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ConversionTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            factors: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Context block in definition syntax:
///
/// ```text
/// @context AR5GWP100
///     gram__CH4 = gram__CO2eq * 28
/// @end
/// ```
pub fn render_context_block(id: &str, table: &ConversionTable) -> String {
    let mut out = format!("@context {id}\n");
    for (species, factor) in table.iter() {
        out.push_str("    ");
        out.push_str(&context_line(species, factor));
        out.push('\n');
    }
    out.push_str("@end\n");
    out
}

fn context_line(species: &str, factor: f64) -> String {
    format!("gram__{species} = gram__CO2eq * {factor}")
}

/// Registers tables with an engine and runs conversions under one of them.
///
/// The selected context is an argument of each call; nothing about the
/// selection outlives the call.
pub struct ContextTables<'a> {
    engine: &'a mut UnitRegistry,
}

impl<'a> ContextTables<'a> {
    pub fn new(engine: &'a mut UnitRegistry) -> Self {
        Self { engine }
    }

    pub fn register(&mut self, id: &str, table: &ConversionTable) -> UnitsResult<()> {
        if table.is_empty() {
            return Err(UnitsError::config(format!("context '{id}' has no entries")));
        }
        let lines: Vec<String> = table
            .iter()
            .map(|(species, factor)| context_line(species, factor))
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        self.engine.define_context(id, &refs)?;
        Ok(())
    }

    pub fn convert(
        &self,
        quantity: &Quantity,
        target: &UnitsContainer,
        context: Option<&str>,
    ) -> UnitsResult<Quantity> {
        Ok(self.engine.convert(quantity, target, context)?)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.engine.context_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fu_engine::EngineError;

    fn engine() -> UnitRegistry {
        let mut engine = UnitRegistry::with_defaults().unwrap();
        engine
            .load_str(
                "gram__CO2 = [ghg_emission] = g__CO2\n\
                 gram__CO2eq = gram__CO2 = g__CO2eq\n\
                 gram__CH4 = NaN gram__CO2 = g__CH4\n\
                 gram__N2O = NaN gram__CO2 = g__N2O\n",
                "emissions",
                None,
            )
            .unwrap();
        engine
    }

    #[test]
    fn render_matches_definition_syntax() {
        let table: ConversionTable = [("CH4", 28.0), ("N2O", 265.0)].into_iter().collect();
        assert_eq!(
            render_context_block("AR5GWP100", &table),
            "@context AR5GWP100\n    gram__CH4 = gram__CO2eq * 28\n    gram__N2O = gram__CO2eq * 265\n@end\n"
        );
    }

    #[test]
    fn contexts_do_not_leak() {
        let mut engine = engine();
        let mut tables = ContextTables::new(&mut engine);
        tables
            .register("AR4", &[("CH4", 25.0), ("N2O", 298.0)].into_iter().collect())
            .unwrap();
        tables
            .register("AR5", &[("CH4", 28.0)].into_iter().collect())
            .unwrap();

        let q = Quantity::new(1.0, UnitsContainer::single("g__CH4"));
        let target = UnitsContainer::single("g__CO2eq");
        assert_eq!(tables.convert(&q, &target, Some("AR5")).unwrap().magnitude, 28.0);
        assert_eq!(tables.convert(&q, &target, Some("AR4")).unwrap().magnitude, 25.0);
        assert_eq!(tables.convert(&q, &target, Some("AR5")).unwrap().magnitude, 28.0);
        assert!(tables.convert(&q, &target, None).unwrap().magnitude.is_nan());

        // N2O is only in AR4
        let n2o = Quantity::new(1.0, UnitsContainer::single("g__N2O"));
        assert!(tables.convert(&n2o, &target, Some("AR5")).unwrap().magnitude.is_nan());
        assert_eq!(tables.ids(), vec!["AR4", "AR5"]);
    }

    #[test]
    fn unknown_context_is_an_error() {
        let mut engine = engine();
        let tables = ContextTables::new(&mut engine);
        let q = Quantity::new(1.0, UnitsContainer::single("g__CH4"));
        let err = tables
            .convert(&q, &UnitsContainer::single("g__CO2eq"), Some("AR7"))
            .unwrap_err();
        assert!(matches!(
            err,
            UnitsError::Engine(EngineError::UnknownContext(id)) if id == "AR7"
        ));
    }

    #[test]
    fn empty_table_is_rejected() {
        let mut engine = engine();
        let mut tables = ContextTables::new(&mut engine);
        assert!(tables.register("AR6", &ConversionTable::new()).is_err());
    }
}
