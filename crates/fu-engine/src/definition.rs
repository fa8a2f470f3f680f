//! Definition statements of the line-oriented DSL.
//!
//! ```text
//! gram = [mass] = g
//! kilo- = 1e3 = k-
//! metric_ton__CO2 = 1E+6 gram__CO2 = t__CO2
//! bcm = 1e9 * cubic_meter = _ = billion_cubic_meter
//! ```
//!
//! The first field after the value is the symbol (`_` for none), the rest
//! are aliases. Fields may be separated by `=` or `,`.

use crate::error::{EngineError, EngineResult};
use crate::expr::{Expr, is_ident_char, is_ident_start};

/// Value of a unit: either a new base dimension or an expression in other units.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitValue {
    /// Declares a base dimension, stored with brackets: `[mass]`.
    Base(String),
    Derived(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitDefinition {
    pub name: String,
    pub symbol: Option<String>,
    pub aliases: Vec<String>,
    pub value: UnitValue,
}

impl UnitDefinition {
    /// Symbol if declared, name otherwise.
    pub fn symbol_or_name(&self) -> &str {
        self.symbol.as_deref().unwrap_or(&self.name)
    }

    /// Name, symbol and aliases: every token this unit answers to.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.symbol.as_deref())
            .chain(self.aliases.iter().map(String::as_str))
    }

    pub fn is_base(&self) -> bool {
        matches!(self.value, UnitValue::Base(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefixDefinition {
    pub name: String,
    pub symbol: Option<String>,
    pub aliases: Vec<String>,
    pub factor: f64,
}

impl PrefixDefinition {
    pub fn symbol_or_name(&self) -> &str {
        self.symbol.as_deref().unwrap_or(&self.name)
    }

    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.symbol.as_deref())
            .chain(self.aliases.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Unit(UnitDefinition),
    Prefix(PrefixDefinition),
}

/// Parse one definition statement (no directives, no comments).
pub fn parse_definition(line: &str) -> EngineResult<Definition> {
    let invalid = |reason: &str| EngineError::InvalidDefinition {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let mut fields = line.split('=').map(str::trim);
    let name = fields.next().unwrap_or_default();
    let value = fields
        .next()
        .ok_or_else(|| invalid("expected 'name = value'"))?;
    if value.is_empty() {
        return Err(invalid("empty value"));
    }
    let mut extra: Vec<&str> = fields
        .flat_map(|f| f.split(','))
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();

    if name.starts_with('[') {
        return Err(EngineError::Unsupported(format!(
            "derived dimension definition '{line}'"
        )));
    }

    if let Some(prefix) = name.strip_suffix('-') {
        if !is_identifier(prefix) {
            return Err(invalid("invalid prefix name"));
        }
        let factor = Expr::parse(value)?
            .as_number()
            .ok_or_else(|| invalid("prefix value must be a number"))?;
        let names: Vec<String> = extra
            .drain(..)
            .map(|f| f.trim_end_matches('-').to_string())
            .collect();
        let (symbol, aliases) = split_symbol(names);
        for n in symbol.iter().chain(&aliases) {
            if !is_identifier(n) {
                return Err(invalid("invalid prefix symbol"));
            }
        }
        return Ok(Definition::Prefix(PrefixDefinition {
            name: prefix.to_string(),
            symbol,
            aliases,
            factor,
        }));
    }

    if !is_identifier(name) {
        return Err(invalid("invalid unit name"));
    }

    let value = match value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        Some(dim) if is_identifier(dim) => UnitValue::Base(format!("[{dim}]")),
        Some(_) => return Err(invalid("invalid base dimension")),
        None => UnitValue::Derived(Expr::parse(value)?),
    };

    let names: Vec<String> = extra.into_iter().map(str::to_string).collect();
    let (symbol, mut aliases) = split_symbol(names);
    for n in symbol.iter().chain(&aliases) {
        if !is_identifier(n) {
            return Err(invalid("invalid symbol or alias"));
        }
    }
    aliases.retain(|a| a != name && Some(a) != symbol.as_ref());
    let symbol = symbol.filter(|s| s != name);

    Ok(Definition::Unit(UnitDefinition {
        name: name.to_string(),
        symbol,
        aliases,
        value,
    }))
}

fn split_symbol(mut names: Vec<String>) -> (Option<String>, Vec<String>) {
    if names.is_empty() {
        return (None, names);
    }
    let first = names.remove(0);
    let symbol = if first == "_" { None } else { Some(first) };
    (symbol, names)
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => chars.all(is_ident_char),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(line: &str) -> UnitDefinition {
        match parse_definition(line).unwrap() {
            Definition::Unit(u) => u,
            other => panic!("expected unit, got {other:?}"),
        }
    }

    #[test]
    fn base_unit_with_symbol() {
        let u = unit("gram_H2 = [amount_of_hydrogen] = g_H2");
        assert_eq!(u.name, "gram_H2");
        assert_eq!(u.symbol.as_deref(), Some("g_H2"));
        assert_eq!(u.value, UnitValue::Base("[amount_of_hydrogen]".into()));
        assert!(u.is_base());
    }

    #[test]
    fn derived_unit_with_aliases() {
        let u = unit(
            "gram__CO2eq = gram__CO2 = g__CO2eq = gram__CO2_eq = g__CO2_eq = gram__CO2e = g__CO2e",
        );
        assert_eq!(u.symbol.as_deref(), Some("g__CO2eq"));
        assert_eq!(u.aliases.len(), 4);
        assert_eq!(u.value, UnitValue::Derived(Expr::Unit("gram__CO2".into())));
    }

    #[test]
    fn comma_separated_aliases_and_blank_symbol() {
        let u = unit("bcm = 1e9 * cubic_meter = _ = billion_cubic_meter, bcm3");
        assert_eq!(u.symbol, None);
        assert_eq!(u.aliases, vec!["billion_cubic_meter", "bcm3"]);
        assert_eq!(u.symbol_or_name(), "bcm");
    }

    #[test]
    fn symbol_equal_to_name_is_dropped() {
        let u = unit("ton_H2 = 9.07e+05 * gram_H2 = ton_H2");
        assert_eq!(u.symbol, None);
        assert_eq!(u.all_names().collect::<Vec<_>>(), vec!["ton_H2"]);
    }

    #[test]
    fn prefix_definition() {
        match parse_definition("micro- = 1e-6 = µ- = u-").unwrap() {
            Definition::Prefix(p) => {
                assert_eq!(p.name, "micro");
                assert_eq!(p.symbol.as_deref(), Some("µ"));
                assert_eq!(p.aliases, vec!["u"]);
                assert_eq!(p.factor, 1e-6);
            }
            other => panic!("expected prefix, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_definition("no_value").is_err());
        assert!(parse_definition("x =").is_err());
        assert!(parse_definition("2x = 3").is_err());
        assert!(parse_definition("kilo- = meter = k-").is_err());
        assert!(matches!(
            parse_definition("[energy] = [mass] * [length] ** 2 / [time] ** 2"),
            Err(EngineError::Unsupported(_))
        ));
    }
}
