//! fu-core: shared foundation for flowunits.
//!
//! Contains:
//! - numeric (Real + tolerances + significant-digit formatting)
//! - error (shared error types)

pub mod error;
pub mod numeric;

pub use error::{FuError, FuResult};
pub use numeric::*;
