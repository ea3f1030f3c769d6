//! Conversion-specific error types.

use thiserror::Error;

use crate::condition::Operator;

/// Errors that can occur during rule compilation, pipeline application, or
/// query rendering.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// A detection referenced in a condition was not found.
    #[error("unknown detection identifier: {0}")]
    UnknownIdentifier(String),

    /// A field match operator has no rendering rule in the chosen backend
    /// contract.
    #[error("operator '{operator}' on field '{field}' is not supported by this backend")]
    UnsupportedOperator { field: String, operator: Operator },

    /// A condition tree is structurally invalid (empty group, inexpressible
    /// quantifier, fully pruned condition).
    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    /// A processing pipeline definition is malformed.
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// A `rule_failure` transformation fired for this rule.
    #[error("rule failure: {0}")]
    RuleFailure(String),

    /// A regex pattern failed to compile.
    #[error("invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// A parser error propagated during conversion.
    #[error("parser error: {0}")]
    Parser(#[from] sigmaq_parser::SigmaParserError),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ConversionError>;
