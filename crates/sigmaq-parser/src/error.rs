use thiserror::Error;

/// Errors that can occur while loading Sigma rules or filters.
#[derive(Debug, Error)]
pub enum SigmaParserError {
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Condition parse error: {0}")]
    Condition(String),

    #[error("Unknown modifier '{0}'")]
    UnknownModifier(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Invalid detection: {0}")]
    InvalidDetection(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SigmaParserError>;
