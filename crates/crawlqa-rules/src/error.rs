use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid JSON schema: {message}")]
    InvalidSchema { message: String },
}

pub type Result<T> = std::result::Result<T, RuleError>;
