// Variable interpolation
//
// Replaces `{{.name}}` references in text with values from a VariableMapping.

mod engine;
mod error;

pub use engine::{Engine, Interpolator};
pub use error::InterpolateError;
