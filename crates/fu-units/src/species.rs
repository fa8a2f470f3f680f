//! Emission species qualifiers.

use crate::error::{UnitsError, UnitsResult};

/// Species every registry knows, whatever the generated emission files add.
pub const BUILTIN_SPECIES: [&str; 6] = ["CO2", "CO2eq", "CO2_eq", "CO2e", "C", "Ce"];

/// Ordered, append-only set of species tokens (`CO2`, `CH4`, `HFC_134a`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeciesList {
    items: Vec<String>,
}

impl SpeciesList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut list = Self::new();
        for s in BUILTIN_SPECIES {
            list.items.push(s.to_string());
        }
        list
    }

    /// Append `species` unless already present. Returns whether it was new.
    pub fn push(&mut self, species: &str) -> UnitsResult<bool> {
        let species = species.trim();
        if !is_species_token(species) {
            return Err(UnitsError::config(format!(
                "invalid species token '{species}'"
            )));
        }
        if self.contains(species) {
            return Ok(false);
        }
        self.items.push(species.to_string());
        Ok(true)
    }

    /// Append every non-empty line of `text`.
    pub fn extend_from_lines(&mut self, text: &str) -> UnitsResult<usize> {
        let mut added = 0;
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if self.push(line)? {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn contains(&self, species: &str) -> bool {
        self.items.iter().any(|s| s == species)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }
}

fn is_species_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Turn a GHG label such as `HFC-134a` or `CH4(fossil)` into a unit-safe token.
pub fn sanitize_species_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if matches!(c, '(' | ')' | '-') { '_' } else { c })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}
