//! Text rewriting around the engine's parser and formatter.
//!
//! The engine reads `g CO2` as grams times an unrelated unit `CO2`.
//! Before parsing, the space between a mass prefix and a registered species
//! is replaced by [`MARKER`] (`g CO2` -> `g__CO2`, a single unit token);
//! after formatting, the marker is turned back into a space.

use std::cell::RefCell;
use std::rc::Rc;

use regex::Regex;

use crate::species::SpeciesList;

/// Joins a mass prefix to a species inside a single unit token.
pub const MARKER: &str = "__";

/// Mass prefixes that can carry a species qualifier.
pub const MASS_PREFIXES: [&str; 4] = ["g", "t", "gram", "metric_ton"];

/// Compiled rewrite patterns for one snapshot of the species list.
#[derive(Debug)]
pub struct SymbolRewriter {
    species_count: usize,
    patterns: Option<(Regex, Regex)>,
}

impl SymbolRewriter {
    /// Build patterns for `species`. An empty list gives the identity rewriter.
    pub fn new(species: &SpeciesList) -> Result<Self, regex::Error> {
        if species.is_empty() {
            return Ok(Self {
                species_count: 0,
                patterns: None,
            });
        }

        let mut names: Vec<&str> = species.iter().collect();
        // Longest first so `CO2eq` is tried before `CO2` and `C`.
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = names
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let prefixes = MASS_PREFIXES.join("|");

        let forward = Regex::new(&format!(r"({prefixes}) ({alternation})\b"))?;
        let backward = Regex::new(&format!(r"({prefixes}){MARKER}({alternation})\b"))?;
        Ok(Self {
            species_count: species.len(),
            patterns: Some((forward, backward)),
        })
    }

    /// Number of species the patterns were built from.
    pub fn species_count(&self) -> usize {
        self.species_count
    }

    /// `g CO2` -> `g__CO2`.
    pub fn preprocess(&self, text: &str) -> String {
        match &self.patterns {
            Some((forward, _)) => forward
                .replace_all(text, format!("${{1}}{MARKER}${{2}}").as_str())
                .into_owned(),
            None => text.to_string(),
        }
    }

    /// `g__CO2` -> `g CO2`.
    pub fn postprocess(&self, text: &str) -> String {
        match &self.patterns {
            Some((_, backward)) => backward.replace_all(text, "${1} ${2}").into_owned(),
            None => text.to_string(),
        }
    }
}

/// Lazily rebuilt rewriter.
///
/// The species list only ever grows, so its length identifies the snapshot a
/// cached rewriter was compiled from.
#[derive(Debug, Default)]
pub struct RewriterCache {
    cached: RefCell<Option<Rc<SymbolRewriter>>>,
}

impl RewriterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, species: &SpeciesList) -> Result<Rc<SymbolRewriter>, regex::Error> {
        if let Some(rw) = self.cached.borrow().as_ref() {
            if rw.species_count() == species.len() {
                return Ok(Rc::clone(rw));
            }
        }
        let rw = Rc::new(SymbolRewriter::new(species)?);
        *self.cached.borrow_mut() = Some(Rc::clone(&rw));
        Ok(rw)
    }
}
