//! The symbol table: units, prefixes and contexts.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::{debug, warn};

use crate::definition::{
    Definition, PrefixDefinition, UnitDefinition, UnitValue, is_identifier, parse_definition,
};
use crate::dimension::{Dimension, MAX_EXPONENT};
use crate::error::{EngineError, EngineResult};
use crate::expr::Expr;
use crate::quantity::{Quantity, UnitsContainer};

/// Stock definitions shipped with the engine (SI prefixes, base units,
/// common energy/mass/volume units).
pub const DEFAULT_DEFINITIONS: &str = include_str!("defaults.txt");

/// Nesting limit when resolving definitions; deeper chains are treated as cycles.
const MAX_DEPTH: usize = 64;

/// What `define` does when a name is already taken. Whatever is defined
/// last wins under `Ignore` and `Warn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedefinitionPolicy {
    Ignore,
    #[default]
    Warn,
    Error,
}

/// How unit tokens are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatStyle {
    /// Canonical names: `kilowatt_hour`.
    Full,
    /// Symbols where declared: `kWh`.
    #[default]
    Abbreviated,
}

/// Named set of unit redefinitions, active only for the call it is passed to.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub id: String,
    overrides: BTreeMap<String, Expr>,
}

impl Context {
    pub fn overrides(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.overrides.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

/// Magnitude and dimension after expanding every unit down to base units.
#[derive(Debug, Clone, PartialEq)]
pub struct RootQuantity {
    pub factor: f64,
    pub dimension: Dimension,
}

impl RootQuantity {
    fn scalar(factor: f64) -> Self {
        Self {
            factor,
            dimension: Dimension::dimensionless(),
        }
    }

    fn mul(self, other: RootQuantity) -> Option<Self> {
        Some(Self {
            factor: self.factor * other.factor,
            dimension: self.dimension.checked_mul(&other.dimension)?,
        })
    }

    fn div(self, other: RootQuantity) -> Option<Self> {
        Some(Self {
            factor: self.factor / other.factor,
            dimension: self.dimension.checked_div(&other.dimension)?,
        })
    }

    fn powi(self, n: i32) -> Option<Self> {
        Some(Self {
            factor: self.factor.powi(n),
            dimension: self.dimension.checked_powi(n)?,
        })
    }
}

fn exponent_overflow(input: &str) -> EngineError {
    EngineError::parse(
        input,
        format!("unit exponent outside ±{MAX_EXPONENT}"),
    )
}

/// A token split into its (optional) prefix and the unit it names.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedToken<'a> {
    pub prefix: Option<&'a PrefixDefinition>,
    pub unit: &'a UnitDefinition,
}

impl ResolvedToken<'_> {
    pub fn label(&self, style: FormatStyle) -> String {
        match style {
            FormatStyle::Full => format!(
                "{}{}",
                self.prefix.map(|p| p.name.as_str()).unwrap_or_default(),
                self.unit.name
            ),
            FormatStyle::Abbreviated => format!(
                "{}{}",
                self.prefix.map(|p| p.symbol_or_name()).unwrap_or_default(),
                self.unit.symbol_or_name()
            ),
        }
    }
}

/// Runtime unit registry.
///
/// Definitions are validated when they are added: every unit an expression
/// mentions must already resolve. Loading order therefore matters, and a
/// block that depends on another must come after it.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: HashMap<String, UnitDefinition>,
    /// name, symbol or alias -> canonical name
    index: HashMap<String, String>,
    prefixes: Vec<PrefixDefinition>,
    /// prefix name/symbol/alias -> index into `prefixes`, longest first
    prefix_index: Vec<(String, usize)>,
    contexts: HashMap<String, Context>,
    redefinition: RedefinitionPolicy,
}

impl UnitRegistry {
    /// Empty registry: no prefixes, no units.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with [`DEFAULT_DEFINITIONS`].
    pub fn with_defaults() -> EngineResult<Self> {
        let mut registry = Self::new();
        registry.load_str(DEFAULT_DEFINITIONS, "<defaults>", None)?;
        Ok(registry)
    }

    pub fn redefinition_policy(&self) -> RedefinitionPolicy {
        self.redefinition
    }

    pub fn set_redefinition_policy(&mut self, policy: RedefinitionPolicy) {
        self.redefinition = policy;
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    /// Add one definition statement.
    pub fn define(&mut self, line: &str) -> EngineResult<()> {
        match parse_definition(line)? {
            Definition::Prefix(prefix) => self.add_prefix(prefix),
            Definition::Unit(unit) => self.add_unit(unit),
        }
    }

    fn add_prefix(&mut self, prefix: PrefixDefinition) -> EngineResult<()> {
        if let Some(existing) = self.prefixes.iter().position(|p| p.name == prefix.name) {
            self.on_redefinition(&prefix.name)?;
            self.prefix_index.retain(|(_, idx)| *idx != existing);
            self.prefixes[existing] = prefix;
            self.index_prefix(existing);
        } else {
            self.prefixes.push(prefix);
            self.index_prefix(self.prefixes.len() - 1);
        }
        Ok(())
    }

    fn index_prefix(&mut self, idx: usize) {
        let names: Vec<String> = self.prefixes[idx].all_names().map(str::to_string).collect();
        for name in names {
            self.prefix_index.retain(|(n, _)| *n != name);
            self.prefix_index.push((name, idx));
        }
        self.prefix_index
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
    }

    fn add_unit(&mut self, unit: UnitDefinition) -> EngineResult<()> {
        if let UnitValue::Derived(expr) = &unit.value {
            if let Some(own) = unit.all_names().find(|n| expr.references(n)) {
                return Err(EngineError::Cycle(own.to_string()));
            }
            self.expr_root(expr, None, 0)?;
        }

        if let Some(taken) = unit.all_names().find(|n| self.index.contains_key(*n)) {
            self.on_redefinition(taken)?;
        }
        if let Some(replaced) = self.units.remove(&unit.name) {
            self.rehome_aliases(replaced, &unit);
        }

        for name in unit.all_names() {
            self.index.insert(name.to_string(), unit.name.clone());
        }
        self.units.insert(unit.name.clone(), unit);
        Ok(())
    }

    /// Names of `replaced` that `unit` does not take over keep their old
    /// meaning: they move to a copy of `replaced` named after the first of
    /// them. With none left, the old definition is dropped.
    fn rehome_aliases(&mut self, replaced: UnitDefinition, unit: &UnitDefinition) {
        let kept: Vec<String> = replaced
            .all_names()
            .filter(|n| !unit.all_names().any(|m| m == *n))
            .filter(|n| self.index.get(*n) == Some(&replaced.name))
            .map(str::to_string)
            .collect();
        let Some((name, aliases)) = kept.split_first() else {
            return;
        };
        let symbol = replaced
            .symbol
            .clone()
            .filter(|s| s != name && aliases.contains(s));
        let moved = UnitDefinition {
            name: name.clone(),
            aliases: aliases.iter().filter(|a| Some(*a) != symbol.as_ref()).cloned().collect(),
            symbol,
            value: replaced.value,
        };
        debug!(from = %replaced.name, to = %moved.name, "keeping aliases of redefined unit");
        for alias in moved.all_names() {
            self.index.insert(alias.to_string(), moved.name.clone());
        }
        self.units.insert(moved.name.clone(), moved);
    }

    fn on_redefinition(&self, name: &str) -> EngineResult<()> {
        match self.redefinition {
            RedefinitionPolicy::Ignore => Ok(()),
            RedefinitionPolicy::Warn => {
                warn!(unit = name, "redefining unit");
                Ok(())
            }
            RedefinitionPolicy::Error => Err(EngineError::Redefinition(name.to_string())),
        }
    }

    /// Register a context from `name = expression` lines.
    ///
    /// Every overridden name must already be a unit, and the overrides must
    /// resolve with the context active.
    pub fn define_context(&mut self, id: &str, lines: &[&str]) -> EngineResult<()> {
        if !is_identifier(id) {
            return Err(EngineError::InvalidDefinition {
                line: format!("@context {id}"),
                reason: "invalid context id".into(),
            });
        }

        let mut overrides = BTreeMap::new();
        for line in lines {
            let (name, value) = line
                .split_once('=')
                .map(|(n, v)| (n.trim(), v.trim()))
                .ok_or_else(|| EngineError::InvalidDefinition {
                    line: line.to_string(),
                    reason: "expected 'name = expression' inside context".into(),
                })?;
            let canonical = self
                .index
                .get(name)
                .cloned()
                .ok_or_else(|| EngineError::UndefinedUnit(name.to_string()))?;
            overrides.insert(canonical, Expr::parse(value)?);
        }

        let context = Context {
            id: id.to_string(),
            overrides,
        };
        for (name, expr) in &context.overrides {
            self.expr_root(expr, Some(&context), 0)
                .map_err(|err| match err {
                    EngineError::Cycle(_) => EngineError::Cycle(name.clone()),
                    other => other,
                })?;
        }

        if self.contexts.contains_key(id) {
            self.on_redefinition(id)?;
        }
        debug!(context = id, overrides = context.len(), "registered context");
        self.contexts.insert(id.to_string(), context);
        Ok(())
    }

    pub fn context(&self, id: &str) -> EngineResult<&Context> {
        self.contexts
            .get(id)
            .ok_or_else(|| EngineError::UnknownContext(id.to_string()))
    }

    pub fn context_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.contexts.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Load a definitions file. `@import` paths are relative to the file.
    pub fn load_definitions(&mut self, path: &Path) -> EngineResult<()> {
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loading definitions");
        self.load_str(&text, &path.display().to_string(), path.parent())
    }

    /// Load definitions from text. `origin` labels errors; `base_dir`
    /// resolves `@import` (imports are rejected without it).
    pub fn load_str(&mut self, text: &str, origin: &str, base_dir: Option<&Path>) -> EngineResult<()> {
        let at = |line: usize, source: EngineError| EngineError::AtLine {
            origin: origin.to_string(),
            line,
            source: Box::new(source),
        };

        let mut open_context: Option<(usize, String, Vec<&str>)> = None;

        for (idx, raw) in text.lines().enumerate() {
            let lineno = idx + 1;
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            if let Some((_, id, body)) = open_context.as_mut() {
                if line == "@end" {
                    let id = id.clone();
                    let body = std::mem::take(body);
                    open_context = None;
                    self.define_context(&id, &body).map_err(|e| at(lineno, e))?;
                } else if line.starts_with('@') {
                    return Err(at(
                        lineno,
                        EngineError::Unsupported(format!("'{line}' inside @context")),
                    ));
                } else {
                    body.push(line);
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix("@context") {
                let id = rest.trim();
                open_context = Some((lineno, id.to_string(), Vec::new()));
            } else if let Some(rest) = line.strip_prefix("@import") {
                let file = rest.trim();
                let dir = base_dir.ok_or_else(|| {
                    at(
                        lineno,
                        EngineError::Unsupported(format!("@import {file} without a base directory")),
                    )
                })?;
                self.load_definitions(&dir.join(file))
                    .map_err(|e| at(lineno, e))?;
            } else if line.starts_with('@') {
                return Err(at(lineno, EngineError::Unsupported(line.to_string())));
            } else {
                self.define(line).map_err(|e| at(lineno, e))?;
            }
        }

        if let Some((lineno, id, _)) = open_context {
            return Err(at(
                lineno,
                EngineError::InvalidDefinition {
                    line: format!("@context {id}"),
                    reason: "missing @end".into(),
                },
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Exact lookup by name, symbol or alias (no prefixes).
    pub fn unit(&self, name: &str) -> Option<&UnitDefinition> {
        self.index.get(name).and_then(|n| self.units.get(n))
    }

    /// Resolve a token, splitting off an SI prefix when there is no exact match.
    pub fn lookup(&self, token: &str) -> EngineResult<ResolvedToken<'_>> {
        if let Some(unit) = self.unit(token) {
            return Ok(ResolvedToken { prefix: None, unit });
        }
        for (prefix_name, idx) in &self.prefix_index {
            let Some(rest) = token.strip_prefix(prefix_name.as_str()) else {
                continue;
            };
            if let Some(unit) = self.unit(rest) {
                return Ok(ResolvedToken {
                    prefix: Some(&self.prefixes[*idx]),
                    unit,
                });
            }
        }
        Err(EngineError::UndefinedUnit(token.to_string()))
    }

    pub fn contains(&self, token: &str) -> bool {
        self.lookup(token).is_ok()
    }

    // ------------------------------------------------------------------
    // Parsing
    // ------------------------------------------------------------------

    /// Parse a quantity expression such as `1 USD_2020 / kg_H2`.
    pub fn parse_expression(&self, text: &str) -> EngineResult<Quantity> {
        let expr = Expr::parse(text)?;
        self.eval(&expr).map_err(|err| match err {
            EngineError::Parse { reason, .. } => EngineError::parse(text, reason),
            other => other,
        })
    }

    /// Parse a unit expression; a leading scale factor is rejected.
    pub fn parse_units(&self, text: &str) -> EngineResult<UnitsContainer> {
        let q = self.parse_expression(text)?;
        if q.magnitude != 1.0 {
            return Err(EngineError::parse(
                text,
                "unit expression must not carry a numeric factor",
            ));
        }
        Ok(q.units)
    }

    fn eval(&self, expr: &Expr) -> EngineResult<Quantity> {
        let overflow = || exponent_overflow(&expr.to_string());
        Ok(match expr {
            Expr::Number(v) => Quantity::scalar(*v),
            Expr::Unit(token) => {
                self.lookup(token)?;
                Quantity::unit(token.as_str())
            }
            Expr::Neg(e) => -self.eval(e)?,
            Expr::Mul(a, b) => self.eval(a)?.checked_mul(&self.eval(b)?).ok_or_else(overflow)?,
            Expr::Div(a, b) => self.eval(a)?.checked_div(&self.eval(b)?).ok_or_else(overflow)?,
            Expr::Pow(e, n) => self.eval(e)?.checked_powi(*n).ok_or_else(overflow)?,
        })
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    fn token_root(&self, token: &str, ctx: Option<&Context>, depth: usize) -> EngineResult<RootQuantity> {
        if depth > MAX_DEPTH {
            return Err(EngineError::Cycle(token.to_string()));
        }
        let resolved = self.lookup(token)?;
        let prefix = resolved.prefix.map_or(1.0, |p| p.factor);

        let expr = match ctx.and_then(|c| c.overrides.get(&resolved.unit.name)) {
            Some(expr) => expr,
            None => match &resolved.unit.value {
                UnitValue::Base(dim) => {
                    return Ok(RootQuantity {
                        factor: prefix,
                        dimension: Dimension::base(dim.clone()),
                    });
                }
                UnitValue::Derived(expr) => expr,
            },
        };
        let root = self.expr_root(expr, ctx, depth + 1)?;
        Ok(RootQuantity {
            factor: prefix * root.factor,
            dimension: root.dimension,
        })
    }

    fn expr_root(&self, expr: &Expr, ctx: Option<&Context>, depth: usize) -> EngineResult<RootQuantity> {
        let overflow = || exponent_overflow(&expr.to_string());
        Ok(match expr {
            Expr::Number(v) => RootQuantity::scalar(*v),
            Expr::Unit(token) => self.token_root(token, ctx, depth)?,
            Expr::Neg(e) => {
                let r = self.expr_root(e, ctx, depth)?;
                RootQuantity {
                    factor: -r.factor,
                    dimension: r.dimension,
                }
            }
            Expr::Mul(a, b) => self
                .expr_root(a, ctx, depth)?
                .mul(self.expr_root(b, ctx, depth)?)
                .ok_or_else(overflow)?,
            Expr::Div(a, b) => self
                .expr_root(a, ctx, depth)?
                .div(self.expr_root(b, ctx, depth)?)
                .ok_or_else(overflow)?,
            Expr::Pow(e, n) => self.expr_root(e, ctx, depth)?.powi(*n).ok_or_else(overflow)?,
        })
    }

    /// Expand a quantity to base units, optionally with a context active.
    pub fn root(&self, q: &Quantity, context: Option<&str>) -> EngineResult<RootQuantity> {
        let ctx = context.map(|id| self.context(id)).transpose()?;
        self.root_in(q, ctx)
    }

    fn root_in(&self, q: &Quantity, ctx: Option<&Context>) -> EngineResult<RootQuantity> {
        let mut root = RootQuantity::scalar(q.magnitude);
        for (token, exp) in q.units.iter() {
            root = self
                .token_root(token, ctx, 0)?
                .powi(exp)
                .and_then(|term| root.mul(term))
                .ok_or_else(|| exponent_overflow(&q.units.to_string()))?;
        }
        Ok(root)
    }

    pub fn dimensionality(&self, q: &Quantity) -> EngineResult<Dimension> {
        Ok(self.root_in(q, None)?.dimension)
    }

    pub fn is_dimensionless(&self, q: &Quantity) -> EngineResult<bool> {
        Ok(self.dimensionality(q)?.is_dimensionless())
    }

    // ------------------------------------------------------------------
    // Conversion
    // ------------------------------------------------------------------

    /// Convert `q` to `target`. With `context`, that context's redefinitions
    /// apply to this call only.
    pub fn convert(
        &self,
        q: &Quantity,
        target: &UnitsContainer,
        context: Option<&str>,
    ) -> EngineResult<Quantity> {
        let ctx = context.map(|id| self.context(id)).transpose()?;
        let from = self.root_in(q, ctx)?;
        let to = self.root_in(&Quantity::new(1.0, target.clone()), ctx)?;
        if from.dimension != to.dimension {
            return Err(EngineError::Dimensionality {
                from: q.units.to_string(),
                from_dim: from.dimension.to_string(),
                to: target.to_string(),
                to_dim: to.dimension.to_string(),
            });
        }
        Ok(Quantity::new(from.factor / to.factor, target.clone()))
    }

    /// Merge units whose dimensions are powers of one another into the first
    /// of them, so `J / g / (kWh / kg)` collapses to a plain number and
    /// `m3 / m ** 3` cancels.
    pub fn to_reduced_units(&self, q: &Quantity) -> EngineResult<Quantity> {
        let mut magnitude = q.magnitude;
        let mut kept: Vec<(String, i32, RootQuantity)> = Vec::new();

        for (token, exp) in q.units.iter() {
            let root = self.token_root(token, None, 0)?;
            let target = kept.iter_mut().find_map(|(_, kept_exp, kept_root)| {
                let (num, den) = root.dimension.power_ratio(&kept_root.dimension)?;
                let scaled = exp.checked_mul(num)?;
                (scaled % den == 0).then_some((kept_exp, kept_root, scaled / den))
            });
            match target {
                Some((kept_exp, kept_root, shift)) => {
                    magnitude *= root.factor.powi(exp) / kept_root.factor.powi(shift);
                    *kept_exp = kept_exp
                        .checked_add(shift)
                        .filter(|e| e.unsigned_abs() <= MAX_EXPONENT.unsigned_abs())
                        .ok_or_else(|| exponent_overflow(&q.units.to_string()))?;
                }
                None => kept.push((token.to_string(), exp, root)),
            }
        }

        let mut units = UnitsContainer::new();
        for (token, exp, _) in kept {
            units.push(&token, exp);
        }
        Ok(Quantity::new(magnitude, units))
    }

    /// Canonical names of all units sharing `token`'s dimension, sorted.
    /// Prefixed forms are not enumerated.
    pub fn compatible_units(&self, token: &str) -> EngineResult<Vec<String>> {
        let target = self.token_root(token, None, 0)?.dimension;
        let mut names: Vec<String> = self
            .units
            .keys()
            .filter(|name| {
                self.token_root(name, None, 0)
                    .map(|r| r.dimension == target)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        names.sort_unstable();
        Ok(names)
    }

    // ------------------------------------------------------------------
    // Formatting
    // ------------------------------------------------------------------

    pub fn format_units(&self, units: &UnitsContainer, style: FormatStyle) -> String {
        units.render(|token| match self.lookup(token) {
            Ok(resolved) => resolved.label(style),
            Err(_) => token.to_string(),
        })
    }

    pub fn format_quantity(&self, q: &Quantity, style: FormatStyle) -> String {
        if q.units.is_empty() {
            q.magnitude.to_string()
        } else {
            format!("{} {}", q.magnitude, self.format_units(&q.units, style))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fu_core::{Tolerances, nearly_equal};

    fn close(a: f64, b: f64) -> bool {
        nearly_equal(a, b, Tolerances::default())
    }

    fn registry() -> UnitRegistry {
        UnitRegistry::with_defaults().unwrap()
    }

    #[test]
    fn prefixes_resolve_against_units_and_symbols() {
        let reg = registry();
        let kg = reg.lookup("kg").unwrap();
        assert_eq!(kg.unit.name, "gram");
        assert_eq!(kg.prefix.unwrap().factor, 1e3);
        assert_eq!(reg.lookup("kilogram").unwrap().label(FormatStyle::Abbreviated), "kg");
        assert_eq!(reg.lookup("MWh").unwrap().label(FormatStyle::Full), "megawatt_hour");
        // exact names win over prefix splits
        assert!(reg.lookup("min").unwrap().prefix.is_none());
        assert!(reg.lookup("cd").unwrap().prefix.is_none());
        assert!(matches!(
            reg.lookup("kfoo"),
            Err(EngineError::UndefinedUnit(t)) if t == "kfoo"
        ));
    }

    #[test]
    fn convert_energy_units() {
        let reg = registry();
        let q = reg.parse_expression("1 kWh").unwrap();
        let out = reg.convert(&q, &reg.parse_units("MJ").unwrap(), None).unwrap();
        assert!(close(out.magnitude, 3.6));
    }

    #[test]
    fn convert_rejects_incompatible_dimensions() {
        let reg = registry();
        let q = reg.parse_expression("1 kg").unwrap();
        let err = reg.convert(&q, &reg.parse_units("J").unwrap(), None).unwrap_err();
        assert!(matches!(err, EngineError::Dimensionality { .. }));
    }

    #[test]
    fn reduce_cancels_same_dimension_units() {
        let reg = registry();
        let q = reg.parse_expression("J / g / (33.33 kWh / kg)").unwrap();
        let reduced = reg.to_reduced_units(&q).unwrap();
        assert!(reduced.is_unitless());
        assert!(close(reduced.magnitude, 1.0 / (33.33 * 3600.0)));

        let q = reg.parse_expression("J / g / 120").unwrap();
        let reduced = reg.to_reduced_units(&q).unwrap();
        assert_eq!(reduced.units.len(), 2);
        assert!(!reg.is_dimensionless(&reduced).unwrap());
    }

    #[test]
    fn reduce_merges_powers_of_a_dimension() {
        let mut reg = registry();
        reg.define("cubic_meter = meter ** 3 = m3").unwrap();
        let q = reg.parse_expression("ft ** 3 / g * (0.08988 kg / m ** 3)").unwrap();
        let reduced = reg.to_reduced_units(&q).unwrap();
        assert!(reduced.is_unitless());
        assert!(close(reduced.magnitude, 89.88 * 0.3048_f64.powi(3)));

        let q = reg.parse_expression("m3 / m ** 2").unwrap();
        let reduced = reg.to_reduced_units(&q).unwrap();
        assert_eq!(reduced.units.exponent("m"), 1);
        assert_eq!(reduced.units.len(), 1);
    }

    #[test]
    fn oversized_exponents_are_parse_errors() {
        let reg = registry();
        for input in [
            "1 m ** 2147483647 * m",
            "1 (m ** 1024) ** 1024",
            "1 m ** 1024 * m",
            "1 / (m ** 1024) / m",
        ] {
            assert!(
                matches!(reg.parse_expression(input), Err(EngineError::Parse { .. })),
                "{input}"
            );
        }

        // within the limit, but the expansion to base units is not
        let mut reg = registry();
        reg.define("hypermeter = meter ** 1024").unwrap();
        let q = reg.parse_expression("1 hypermeter * m").unwrap();
        assert!(matches!(reg.root(&q, None), Err(EngineError::Parse { .. })));
        assert!(matches!(reg.define("ultrameter = hypermeter ** 2"), Err(EngineError::Parse { .. })));
    }

    #[test]
    fn compatible_units_share_dimension() {
        let reg = registry();
        let mass = reg.compatible_units("gram").unwrap();
        assert!(mass.contains(&"metric_ton".to_string()));
        assert!(mass.contains(&"ton".to_string()));
        assert!(!mass.contains(&"joule".to_string()));
    }

    #[test]
    fn eager_validation_rejects_unknown_references() {
        let mut reg = registry();
        let err = reg.define("EUR_2024 = USD_2024 * 1.08").unwrap_err();
        assert!(matches!(err, EngineError::UndefinedUnit(u) if u == "USD_2024"));
        reg.define("USD_2024 = [currency]").unwrap();
        reg.define("EUR_2024 = USD_2024 * 1.08").unwrap();
        assert!(reg.contains("EUR_2024"));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut reg = registry();
        reg.define("gram__CO2 = [ghg_emission] = g__CO2").unwrap();
        let err = reg.define("gram__CO2 = NaN gram__CO2 = g__CO2").unwrap_err();
        assert!(matches!(err, EngineError::Cycle(_)));
    }

    #[test]
    fn redefinition_policies() {
        let mut reg = registry();
        reg.set_redefinition_policy(RedefinitionPolicy::Error);
        assert!(matches!(
            reg.define("year = 365 * day = a = yr"),
            Err(EngineError::Redefinition(_))
        ));

        reg.set_redefinition_policy(RedefinitionPolicy::Ignore);
        reg.define("year = 365 * day = a = yr").unwrap();
        let q = reg.parse_expression("1 a").unwrap();
        let days = reg.convert(&q, &reg.parse_units("day").unwrap(), None).unwrap();
        assert!(close(days.magnitude, 365.0));
    }

    #[test]
    fn redefinition_keeps_names_it_does_not_take_over() {
        let mut reg = registry();
        reg.set_redefinition_policy(RedefinitionPolicy::Ignore);
        reg.define("year = 365 * day = a = yr").unwrap();

        let days = |reg: &UnitRegistry, token: &str| {
            let q = reg.parse_expression(&format!("1 {token}")).unwrap();
            reg.convert(&q, &reg.parse_units("day").unwrap(), None)
                .unwrap()
                .magnitude
        };
        assert!(close(days(&reg, "yr"), 365.0));
        assert!(close(days(&reg, "julian_year"), 365.25));
        assert_eq!(reg.lookup("julian_year").unwrap().unit.name, "julian_year");
        assert_eq!(reg.lookup("year").unwrap().unit.name, "year");

        // a full takeover leaves nothing behind
        reg.define("day = 24 * hour = d").unwrap();
        reg.define("fortnight = 14 * day").unwrap();
        reg.define("fortnight = 15 * day").unwrap();
        assert!(close(days(&reg, "fortnight"), 15.0));
    }

    #[test]
    fn contexts_apply_per_call_only() {
        let mut reg = registry();
        reg.load_str(
            "gram__CO2 = [ghg_emission] = g__CO2\n\
             gram__CO2eq = gram__CO2 = g__CO2eq\n\
             gram__CH4 = NaN gram__CO2 = g__CH4\n\
             @context AR4\n    gram__CH4 = gram__CO2eq * 25\n@end\n\
             @context AR5\n    g__CH4 = gram__CO2eq * 28\n@end\n",
            "test",
            None,
        )
        .unwrap();

        let q = reg.parse_expression("2 g__CH4").unwrap();
        let target = reg.parse_units("g__CO2eq").unwrap();
        let ar4 = reg.convert(&q, &target, Some("AR4")).unwrap();
        let ar5 = reg.convert(&q, &target, Some("AR5")).unwrap();
        let none = reg.convert(&q, &target, None).unwrap();
        assert!(close(ar4.magnitude, 50.0));
        assert!(close(ar5.magnitude, 56.0));
        assert!(none.magnitude.is_nan());
        assert_eq!(reg.context_ids(), vec!["AR4", "AR5"]);

        assert!(matches!(
            reg.convert(&q, &target, Some("AR99")),
            Err(EngineError::UnknownContext(id)) if id == "AR99"
        ));
    }

    #[test]
    fn context_cycles_are_rejected() {
        let mut reg = registry();
        reg.define("gram__CO2 = [ghg_emission]").unwrap();
        reg.define("gram__CO2eq = gram__CO2").unwrap();
        let err = reg
            .define_context("loop", &["gram__CO2 = gram__CO2eq * 1"])
            .unwrap_err();
        assert!(matches!(err, EngineError::Cycle(name) if name == "gram__CO2"));
    }

    #[test]
    fn load_reports_line_numbers() {
        let mut reg = registry();
        let err = reg
            .load_str("# header\n\nfoo = 2 * quux\n", "broken.txt", None)
            .unwrap_err();
        assert!(matches!(err, EngineError::AtLine { line: 3, .. }));
        assert!(matches!(err.root_cause(), EngineError::UndefinedUnit(u) if u == "quux"));
    }

    #[test]
    fn unterminated_context_fails() {
        let mut reg = registry();
        let err = reg.load_str("@context AR6\n", "ctx.txt", None).unwrap_err();
        assert!(matches!(err.root_cause(), EngineError::InvalidDefinition { .. }));
    }

    #[test]
    fn formatting_styles() {
        let reg = registry();
        let q = reg.parse_expression("3 kilowatt_hour / kg").unwrap();
        assert_eq!(reg.format_quantity(&q, FormatStyle::Abbreviated), "3 kWh / kg");
        assert_eq!(
            reg.format_quantity(&q, FormatStyle::Full),
            "3 kilowatt_hour / kilogram"
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        const ENERGY: [&str; 6] = ["J", "kJ", "MJ", "kWh", "MWh", "Btu"];

        proptest! {
            #[test]
            fn conversion_there_and_back(
                value in -1e9f64..1e9,
                from in 0usize..ENERGY.len(),
                to in 0usize..ENERGY.len(),
            ) {
                let reg = registry();
                let q = Quantity::new(value, reg.parse_units(ENERGY[from]).unwrap());
                let there = reg.convert(&q, &reg.parse_units(ENERGY[to]).unwrap(), None).unwrap();
                let back = reg.convert(&there, &q.units, None).unwrap();
                prop_assert!(
                    nearly_equal(back.magnitude, value, Tolerances::default()),
                    "{} -> {} -> {}", value, there.magnitude, back.magnitude
                );
            }
        }
    }
}
