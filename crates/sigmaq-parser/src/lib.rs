//! # sigmaq-parser
//!
//! A parser for Sigma detection rules and filters.
//!
//! This crate parses Sigma YAML files into a strongly-typed AST, handling:
//!
//! - **Detection rules**: field matching, wildcards, boolean conditions, field modifiers
//! - **Condition expressions**: `and`, `or`, `not`, `1 of`, `all of`, parenthesized groups
//! - **Filter documents**: a `global_filter` section targeting other rules by
//!   id/name, compiled downstream into an exclusion on every targeted rule
//! - **Rule collections**: multi-document YAML, `action: global/reset/repeat`,
//!   with per-document error collection so a collection can partially succeed
//! - **Value types**: strings with wildcards, numbers, booleans, null
//! - **Field modifiers**: `contains`, `endswith`, `startswith`, `all`, `re`,
//!   `cidr`, and comparison operators
//!
//! ## Architecture
//!
//! - **PEG grammar** ([`pest`]) for condition expression parsing with correct
//!   operator precedence (`NOT` > `AND` > `OR`) and Pratt parsing
//! - **serde_yaml** for YAML structure deserialization
//! - **Custom parsing** for field modifiers and wildcard strings
//!
//! ## Quick Start
//!
//! ```rust
//! use sigmaq_parser::parse_sigma_yaml;
//!
//! let yaml = r#"
//! title: Failed login
//! name: failed_login
//! logsource:
//!     category: process_creation
//!     product: windows
//! detection:
//!     selection:
//!         - EventID: 4625
//!         - EventID2: 4624
//!     condition: selection
//! "#;
//!
//! let collection = parse_sigma_yaml(yaml).unwrap();
//! assert_eq!(collection.rules.len(), 1);
//! assert_eq!(collection.rules[0].title, "Failed login");
//! ```
//!
//! ## Parsing condition expressions
//!
//! ```rust
//! use sigmaq_parser::parse_condition;
//!
//! let expr = parse_condition("selection_main and 1 of selection_extra_* and not 1 of filter_*").unwrap();
//! println!("{expr}");
//! ```

pub mod ast;
pub mod condition;
pub mod error;
pub mod parser;
pub mod value;

// Re-export the most commonly used types and functions at crate root
pub use ast::{
    ConditionExpr, Detection, DetectionItem, Detections, FieldSpec, GlobalFilter, Level,
    LoadError, LogSource, Modifier, Quantifier, SelectorPattern, SigmaCollection, SigmaFilter,
    SigmaRule, Status,
};
pub use condition::parse_condition;
pub use error::{Result, SigmaParserError};
pub use parser::{parse_field_spec, parse_sigma_directory, parse_sigma_file, parse_sigma_yaml};
pub use value::{SigmaString, SigmaValue, SpecialChar, StringPart};
