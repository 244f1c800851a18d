// Error types for variable interpolation

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpolateError {
    #[error("unterminated reference at byte {offset}")]
    Unterminated { offset: usize },

    #[error("reference at byte {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("invalid variable name {name:?} at byte {offset}")]
    InvalidName { name: String, offset: usize },

    #[error("unknown filter {filter:?} at byte {offset}")]
    UnknownFilter { filter: String, offset: usize },

    #[error("filter {filter:?} requires a quoted argument at byte {offset}")]
    MissingArgument { filter: String, offset: usize },

    #[error("unexpected {found:?} in reference at byte {offset}")]
    UnexpectedToken { found: String, offset: usize },
}

pub type Result<T> = std::result::Result<T, InterpolateError>;
