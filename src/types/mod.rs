//! Type definitions

pub mod plan;
pub mod rules;
pub mod stop;

pub use plan::*;
pub use rules::*;
pub use stop::*;
