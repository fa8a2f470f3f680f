//! fu-engine: runtime dimensional-unit registry.
//!
//! Contains:
//! - definition (line DSL: units, prefixes)
//! - expr (unit expression parser)
//! - dimension / quantity (value types)
//! - registry (symbol table, contexts, conversion, reduction, formatting)

pub mod definition;
pub mod dimension;
pub mod error;
pub mod expr;
pub mod quantity;
pub mod registry;

pub use definition::{Definition, PrefixDefinition, UnitDefinition, UnitValue, parse_definition};
pub use dimension::Dimension;
pub use error::{EngineError, EngineResult};
pub use expr::Expr;
pub use quantity::{Quantity, UnitsContainer};
pub use registry::{
    Context, DEFAULT_DEFINITIONS, FormatStyle, RedefinitionPolicy, ResolvedToken, RootQuantity,
    UnitRegistry,
};
