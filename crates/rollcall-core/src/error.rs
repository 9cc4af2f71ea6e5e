use thiserror::Error;

/// Operator input that was rejected before anything was mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name cannot be empty")]
    EmptyName,
    #[error("invalid name {0:?}: must not contain path separators or control characters, or be a relative path")]
    InvalidName(String),
    #[error("please enter a number, got {0:?}")]
    NotANumber(String),
    #[error("invalid selection {selection}: choose between 1 and {len}")]
    OutOfRange { selection: i64, len: usize },
    #[error("invalid option {0:?}, please try again")]
    UnknownChoice(String),
}
