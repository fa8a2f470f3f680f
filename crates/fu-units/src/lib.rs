//! fu-units: flow, emission and currency units on top of fu-engine.
//!
//! Contains:
//! - species / rewriter (species-qualified symbols: `g CO2` <-> `g__CO2`)
//! - flows (per-flow unit synthesis)
//! - contexts (named conversion tables, e.g. GWP assessments)
//! - loader (definition files, fixed load order)
//! - formatter / registry (`FlowRegistry`, the public facade)

pub mod contexts;
pub mod error;
pub mod flows;
pub mod formatter;
pub mod loader;
pub mod registry;
pub mod rewriter;
pub mod species;

pub use contexts::{ContextTables, ConversionTable, render_context_block};
pub use error::{UnitsError, UnitsResult};
pub use flows::{
    CombinationRule, DefinitionBlock, FactorKey, FlowSpec, PhysicalDimension, VARIANTS, Variant,
    synthesize, variants,
};
pub use formatter::{EngineFormatter, Formatter, RewritingFormatter};
pub use loader::{DefinitionLoader, PathLayout};
pub use registry::{FlowRegistry, FlowSource};
pub use rewriter::{MARKER, MASS_PREFIXES, RewriterCache, SymbolRewriter};
pub use species::{BUILTIN_SPECIES, SpeciesList, sanitize_species_label};

pub use fu_engine::{FormatStyle, Quantity, UnitsContainer};
