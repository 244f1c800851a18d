// Job module
// Job-scoped values available to step commands

mod context;

pub use context::{JobContext, Variable, VariableMapping};
