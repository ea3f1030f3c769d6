//! # sigmaq-convert
//!
//! Converts Sigma detection rules into target query strings.
//!
//! This crate consumes the AST produced by [`sigmaq_parser`] and drives the
//! conversion chain:
//!
//! 1. **Compile** each rule's declarative detection section into a boolean
//!    condition tree ([`ConditionNode`]) with field/value leaves.
//! 2. **Rewrite** the trees with a [`ProcessingPipeline`] — an ordered
//!    sequence of conditionally-applied transformations (field renames,
//!    condition injection, value rewrites). Sigma filters compile into the
//!    same mechanism via [`to_processing_item`].
//! 3. **Render** each final tree through a backend's [`QueryContract`] into a
//!    query string, with precedence-aware parenthesization.
//!
//! Per-rule errors (unknown identifiers, pipeline failures, unsupported
//! operators) abort only the affected rule; a conversion returns the
//! successfully rendered subset plus the failures.
//!
//! ## Quick Start
//!
//! ```rust
//! use sigmaq_convert::TextQueryBackend;
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
//! let backend = TextQueryBackend::default();
//! let result = backend.convert(&collection);
//! assert_eq!(result.queries, vec!["EventID=4625 or EventID2=4624".to_string()]);
//! ```
//!
//! ## Applying a filter
//!
//! ```rust
//! use sigmaq_convert::{ProcessingPipeline, QueryContract, TextQueryBackend, to_processing_item};
//! use sigmaq_parser::parse_sigma_yaml;
//!
//! let yaml = r#"
//! title: Failed login
//! id: 6f3e2987-db24-4c78-a860-b4f4095a7095
//! logsource:
//!     category: process_creation
//!     product: windows
//! detection:
//!     selection:
//!         - EventID: 4625
//!         - EventID2: 4624
//!     condition: selection
//! ---
//! title: Filter Administrator account
//! logsource:
//!     category: process_creation
//!     product: windows
//! global_filter:
//!   rules:
//!     - 6f3e2987-db24-4c78-a860-b4f4095a7095
//!   selection:
//!       User|startswith: 'adm_'
//!   condition: selection
//! "#;
//!
//! let collection = parse_sigma_yaml(yaml).unwrap();
//!
//! // Filters are sugar over processing items: compile and append them to the
//! // backend's own pipeline.
//! let mut pipeline = ProcessingPipeline::new("exclusions");
//! for filter in &collection.filters {
//!     pipeline.push(to_processing_item(filter).unwrap());
//! }
//!
//! let backend = TextQueryBackend::new(QueryContract::default(), pipeline);
//! let result = backend.convert(&collection);
//! assert_eq!(
//!     result.queries,
//!     vec![r#"(EventID=4625 or EventID2=4624) and not User startswith "adm_""#.to_string()]
//! );
//! ```

pub mod backend;
pub mod compiler;
pub mod condition;
pub mod error;
pub mod filters;
pub mod pipeline;

// Re-export the most commonly used types and functions at crate root
pub use backend::{ConversionFailure, ConversionResult, QueryContract, TextQueryBackend, render};
pub use compiler::{CompiledRule, compile_condition_expr, compile_detections, compile_rule};
pub use condition::{ConditionNode, FieldMatch, Operator};
pub use error::{ConversionError, Result};
pub use filters::to_processing_item;
pub use pipeline::{
    Combinator, ConditionLinking, FieldCondition, FieldMatcher, PipelineState, ProcessingItem,
    ProcessingPipeline, RuleCondition, Transformation, logsource_matches, merge_pipelines,
    parse_pipeline, parse_pipeline_file,
};
