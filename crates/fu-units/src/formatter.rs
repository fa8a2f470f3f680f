//! Quantity formatting.
//!
//! Formatters compose: [`RewritingFormatter`] wraps any inner formatter and
//! post-processes its output so species-qualified symbols read naturally.

use std::rc::Rc;

use fu_engine::{FormatStyle, Quantity, UnitRegistry};

use crate::error::UnitsResult;
use crate::rewriter::SymbolRewriter;

pub trait Formatter {
    fn format(&self, quantity: &Quantity) -> UnitsResult<String>;
}

/// Formats through the engine's own symbol table.
#[derive(Debug, Clone, Copy)]
pub struct EngineFormatter<'a> {
    engine: &'a UnitRegistry,
    style: FormatStyle,
}

impl<'a> EngineFormatter<'a> {
    pub fn new(engine: &'a UnitRegistry, style: FormatStyle) -> Self {
        Self { engine, style }
    }
}

impl Formatter for EngineFormatter<'_> {
    fn format(&self, quantity: &Quantity) -> UnitsResult<String> {
        Ok(self.engine.format_quantity(quantity, self.style))
    }
}

/// Applies [`SymbolRewriter::postprocess`] to whatever `inner` produces.
#[derive(Debug)]
pub struct RewritingFormatter<F> {
    inner: F,
    rewriter: Rc<SymbolRewriter>,
}

impl<F: Formatter> RewritingFormatter<F> {
    pub fn new(inner: F, rewriter: Rc<SymbolRewriter>) -> Self {
        Self { inner, rewriter }
    }
}

impl<F: Formatter> Formatter for RewritingFormatter<F> {
    fn format(&self, quantity: &Quantity) -> UnitsResult<String> {
        let text = self.inner.format(quantity)?;
        Ok(self.rewriter.postprocess(&text))
    }
}
