//! Flow unit synthesis.
//!
//! A flow (hydrogen, ammonia, natural gas, ...) gets its own base dimension
//! `[amount_of_<name>]` with base unit `gram_<ID>`. Mass, energy and volume
//! units are then re-expressed as amounts of that flow, using the flow's
//! conversion factors (elemental mass ratios, heating values, densities).

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use fu_core::{ensure_finite, format_sig};
use fu_engine::{FormatStyle, Quantity, UnitRegistry};
use tracing::debug;

use crate::error::{UnitsError, UnitsResult};

/// Unit every flow is anchored to.
pub const BASE_UNIT: &str = "gram";

/// Significant digits of synthesized conversion factors.
const FACTOR_DIGITS: usize = 3;

/// Conversion factors a flow may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FactorKey {
    CRatio,
    HRatio,
    ORatio,
    NRatio,
    EnergyContentLhv,
    EnergyContentHhv,
    DensityNorm,
    DensityStd,
}

impl FactorKey {
    pub const ALL: [FactorKey; 8] = [
        FactorKey::CRatio,
        FactorKey::HRatio,
        FactorKey::ORatio,
        FactorKey::NRatio,
        FactorKey::EnergyContentLhv,
        FactorKey::EnergyContentHhv,
        FactorKey::DensityNorm,
        FactorKey::DensityStd,
    ];

    /// Key as it appears in flow data files.
    pub fn key(self) -> &'static str {
        match self {
            FactorKey::CRatio => "c_ratio",
            FactorKey::HRatio => "h_ratio",
            FactorKey::ORatio => "o_ratio",
            FactorKey::NRatio => "n_ratio",
            FactorKey::EnergyContentLhv => "energycontent_LHV",
            FactorKey::EnergyContentHhv => "energycontent_HHV",
            FactorKey::DensityNorm => "density_norm",
            FactorKey::DensityStd => "density_std",
        }
    }
}

impl FromStr for FactorKey {
    type Err = UnitsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FactorKey::ALL
            .into_iter()
            .find(|k| k.key() == s)
            .ok_or_else(|| UnitsError::config(format!("unknown flow factor '{s}'")))
    }
}

impl fmt::Display for FactorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalDimension {
    Mass,
    Energy,
    Volume,
}

impl PhysicalDimension {
    pub const ALL: [PhysicalDimension; 3] = [
        PhysicalDimension::Mass,
        PhysicalDimension::Energy,
        PhysicalDimension::Volume,
    ];

    /// Units that get a per-flow counterpart, in emission order.
    pub fn extendable_units(self) -> &'static [&'static str] {
        match self {
            PhysicalDimension::Mass => &["gram", "metric_ton", "ton"],
            PhysicalDimension::Energy => &[
                "joule",
                "watt_hour",
                "british_thermal_unit",
                "international_british_thermal_unit",
                "thermochemical_british_thermal_unit",
            ],
            PhysicalDimension::Volume => &["cubic_meter", "cubic_foot", "bcm", "liter"],
        }
    }
}

/// How a variant's factor enters the ratio `unit / gram`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinationRule {
    Divide,
    Multiply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    pub dimension: PhysicalDimension,
    pub qualifier: &'static str,
    pub factor: FactorKey,
    pub rule: CombinationRule,
}

const fn variant(
    dimension: PhysicalDimension,
    qualifier: &'static str,
    factor: FactorKey,
    rule: CombinationRule,
) -> Variant {
    Variant {
        dimension,
        qualifier,
        factor,
        rule,
    }
}

pub const VARIANTS: [Variant; 8] = [
    variant(PhysicalDimension::Mass, "C", FactorKey::CRatio, CombinationRule::Divide),
    variant(PhysicalDimension::Mass, "H", FactorKey::HRatio, CombinationRule::Divide),
    variant(PhysicalDimension::Mass, "O", FactorKey::ORatio, CombinationRule::Divide),
    variant(PhysicalDimension::Mass, "N", FactorKey::NRatio, CombinationRule::Divide),
    variant(PhysicalDimension::Energy, "LHV", FactorKey::EnergyContentLhv, CombinationRule::Divide),
    variant(PhysicalDimension::Energy, "HHV", FactorKey::EnergyContentHhv, CombinationRule::Divide),
    variant(PhysicalDimension::Volume, "norm", FactorKey::DensityNorm, CombinationRule::Multiply),
    variant(PhysicalDimension::Volume, "std", FactorKey::DensityStd, CombinationRule::Multiply),
];

pub fn variants(dimension: PhysicalDimension) -> impl Iterator<Item = &'static Variant> {
    VARIANTS.iter().filter(move |v| v.dimension == dimension)
}

/// Description of one flow: display name plus conversion factors given as
/// quantity expressions (`33.33 kWh/kg`, `0.08988 kg/m**3`, `0.75`).
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSpec {
    name: String,
    factors: BTreeMap<FactorKey, String>,
}

impl FlowSpec {
    pub fn new(name: impl Into<String>) -> UnitsResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(UnitsError::config("flow name must not be empty"));
        }
        Ok(Self {
            name,
            factors: BTreeMap::new(),
        })
    }

    pub fn with_factor(mut self, key: FactorKey, expr: impl Into<String>) -> Self {
        self.factors.insert(key, expr.into());
        self
    }

    /// Build from raw `property, value` pairs. `name` is required; keys that
    /// are not flow factors are skipped.
    pub fn from_pairs<I, K, V>(pairs: I) -> UnitsResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut name = None;
        let mut factors = BTreeMap::new();
        for (key, value) in pairs {
            let key = key.as_ref().trim();
            if key == "name" {
                name = Some(value.into());
                continue;
            }
            match key.parse::<FactorKey>() {
                Ok(factor) => {
                    factors.insert(factor, value.into());
                }
                Err(_) => debug!(key, "ignoring unknown flow property"),
            }
        }
        let name = name.ok_or_else(|| UnitsError::config("flow spec is missing 'name'"))?;
        let mut spec = FlowSpec::new(name)?;
        spec.factors = factors;
        Ok(spec)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn factor(&self, key: FactorKey) -> Option<&str> {
        self.factors.get(&key).map(String::as_str)
    }

    pub fn factors(&self) -> impl Iterator<Item = (FactorKey, &str)> {
        self.factors.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// `Natural Gas` -> `natural_gas`.
    pub fn dimension_name(&self) -> String {
        self.name.trim().to_lowercase().replace(' ', "_")
    }
}

/// Synthesized definition lines, grouped; groups print separated by a blank line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionBlock {
    groups: Vec<Vec<String>>,
}

impl DefinitionBlock {
    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().flatten().map(String::as_str)
    }

    /// Canonical unit names, in definition order.
    pub fn unit_names(&self) -> Vec<&str> {
        self.lines()
            .filter_map(|l| l.split_once(" = ").map(|(name, _)| name))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Vec::is_empty)
    }
}

impl fmt::Display for DefinitionBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<String> = self
            .groups
            .iter()
            .filter(|g| !g.is_empty())
            .map(|g| g.join("\n"))
            .collect();
        if groups.is_empty() {
            return Ok(());
        }
        writeln!(f, "{}", groups.join("\n\n"))
    }
}

/// Build the definition block for `flow_id`.
///
/// Every unit mentioned (the base unit, the extendable units and the units
/// inside factor expressions) must already be known to `engine`.
pub fn synthesize(
    engine: &UnitRegistry,
    flow_id: &str,
    spec: &FlowSpec,
) -> UnitsResult<DefinitionBlock> {
    if flow_id.is_empty() || !flow_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(UnitsError::config(format!("invalid flow id '{flow_id}'")));
    }
    let dim = spec.dimension_name();
    if !dim.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(UnitsError::config(format!(
            "flow name '{}' cannot be used as a dimension",
            spec.name()
        )));
    }

    let base = engine.lookup(BASE_UNIT)?;
    let base_name = base.unit.name.clone();
    let base_symbol = base.unit.symbol_or_name().to_string();
    let mut emitted: HashSet<String> = HashSet::new();
    let mut groups = Vec::new();

    // Base dimension and unit.
    let head = format!("{base_name}_{flow_id} = [amount_of_{dim}] = {base_symbol}_{flow_id}");
    emitted.insert(format!("{base_name}_{flow_id}"));
    groups.push(vec![head]);

    // Plain re-expressions of units compatible with the base unit.
    let compatible = engine.compatible_units(BASE_UNIT)?;
    let mut plain = Vec::new();
    for dimension in PhysicalDimension::ALL {
        for unit in dimension.extendable_units() {
            if *unit == base_name || !compatible.iter().any(|c| c == unit) {
                continue;
            }
            let ratio = Quantity::unit(*unit) / Quantity::unit(BASE_UNIT);
            let line = definition_line(engine, unit, flow_id, None, &ratio, &base_name)?;
            emitted.insert(format!("{unit}_{flow_id}"));
            plain.push(line);
        }
    }
    groups.push(plain);

    // Variant units, one group per dimension.
    for dimension in PhysicalDimension::ALL {
        let mut applicable = Vec::new();
        for v in variants(dimension) {
            let Some(expr) = spec.factor(v.factor) else {
                continue;
            };
            let factor = engine.parse_expression(expr)?;
            if factor.magnitude == 0.0 {
                debug!(flow = flow_id, factor = %v.factor, "skipping zero factor");
                continue;
            }
            applicable.push((v, factor));
        }

        let mut group = Vec::new();
        for unit in dimension.extendable_units() {
            for (v, factor) in &applicable {
                let unqualified = format!("{unit}_{flow_id}");
                let qualifier = if applicable.len() > 1 || emitted.contains(&unqualified) {
                    Some(v.qualifier)
                } else {
                    None
                };

                let per_base = Quantity::unit(*unit) / Quantity::unit(BASE_UNIT);
                let ratio = match v.rule {
                    CombinationRule::Divide => per_base / factor.clone(),
                    CombinationRule::Multiply => per_base * factor.clone(),
                };
                let line = definition_line(engine, unit, flow_id, qualifier, &ratio, &base_name)?;

                let name = match qualifier {
                    Some(q) => format!("{unit}_{flow_id}_{q}"),
                    None => unqualified,
                };
                if !emitted.insert(name.clone()) {
                    return Err(UnitsError::config(format!(
                        "flow '{flow_id}' would define '{name}' twice"
                    )));
                }
                group.push(line);
            }
        }
        groups.push(group);
    }

    Ok(DefinitionBlock { groups })
}

/// `<unit>_<ID>[_<q>] = <ratio> * <base>_<ID> = <sym>_<ID>[_<q>]`
fn definition_line(
    engine: &UnitRegistry,
    unit: &str,
    flow_id: &str,
    qualifier: Option<&str>,
    ratio: &Quantity,
    base_name: &str,
) -> UnitsResult<String> {
    let symbol = engine.lookup(unit)?.unit.symbol_or_name().to_string();
    let suffix = qualifier.map(|q| format!("_{q}")).unwrap_or_default();
    let factor = format_ratio(engine, ratio)?;
    Ok(format!(
        "{unit}_{flow_id}{suffix} = {factor} * {base_name}_{flow_id} = {symbol}_{flow_id}{suffix}"
    ))
}

/// Reduce `ratio` and print it with three significant digits. A ratio that
/// keeps a dimension is printed as a literal with its units.
fn format_ratio(engine: &UnitRegistry, ratio: &Quantity) -> UnitsResult<String> {
    let reduced = engine.to_reduced_units(ratio)?;
    let root = engine.root(&reduced, None)?;
    if root.dimension.is_dimensionless() {
        let factor = ensure_finite(root.factor, "flow conversion factor")?;
        return Ok(format_sig(factor, FACTOR_DIGITS));
    }
    let factor = ensure_finite(reduced.magnitude, "flow conversion factor")?;
    Ok(format!(
        "{} {}",
        format_sig(factor, FACTOR_DIGITS),
        engine.format_units(&reduced.units, FormatStyle::Full)
    ))
}
