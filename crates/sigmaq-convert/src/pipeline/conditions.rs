//! Pipeline conditions that gate when transformations are applied.
//!
//! Two levels of conditions:
//! - **Rule conditions**: evaluated against the whole [`CompiledRule`]
//! - **Field conditions**: evaluated against individual [`FieldMatch`] leaves
//!
//! Conditions are a fixed, enumerable set evaluated via pattern matching and
//! combined by an explicit [`ConditionLinking`] enum.

use regex::Regex;

use sigmaq_parser::{LogSource, SigmaValue};

use super::state::PipelineState;
use crate::compiler::CompiledRule;
use crate::condition::FieldMatch;

// =============================================================================
// Logsource matching
// =============================================================================

/// Pure logsource predicate: true iff every attribute present on the
/// specification side equals (ASCII case-insensitive) the corresponding
/// attribute on the rule side. Absent attributes are wildcards.
///
/// Used by [`RuleCondition::Logsource`] and directly by filter targeting.
pub fn logsource_matches(spec: &LogSource, rule_source: &LogSource) -> bool {
    fn attr_matches(spec: &Option<String>, rule: &Option<String>) -> bool {
        match spec {
            None => true,
            Some(want) => rule
                .as_deref()
                .is_some_and(|have| have.eq_ignore_ascii_case(want)),
        }
    }

    attr_matches(&spec.category, &rule_source.category)
        && attr_matches(&spec.product, &rule_source.product)
        && attr_matches(&spec.service, &rule_source.service)
        && spec.custom.iter().all(|(k, want)| {
            rule_source
                .custom
                .get(k)
                .is_some_and(|have| have.eq_ignore_ascii_case(want))
        })
}

// =============================================================================
// Condition linking
// =============================================================================

/// How a processing item combines its rule conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConditionLinking {
    /// All conditions must match (AND). The default.
    #[default]
    All,
    /// Any condition may match (OR).
    Any,
}

impl ConditionLinking {
    /// Combine a sequence of condition results.
    pub fn evaluate(self, results: impl IntoIterator<Item = bool>) -> bool {
        let mut iter = results.into_iter();
        match self {
            ConditionLinking::All => iter.all(|r| r),
            ConditionLinking::Any => iter.any(|r| r),
        }
    }
}

// =============================================================================
// Rule Conditions
// =============================================================================

/// A condition evaluated against a [`CompiledRule`]'s metadata and tree.
#[derive(Debug, Clone)]
pub enum RuleCondition {
    /// Rule logsource is compatible with the given specification.
    Logsource { spec: LogSource },

    /// Rule id or name is one of the given references.
    RuleId { ids: Vec<String> },

    /// Rule's condition tree contains a leaf on the given field (and value).
    ContainsFieldMatch {
        field: String,
        value: Option<String>,
    },

    /// A specific processing item was applied earlier.
    ProcessingItemApplied { processing_item_id: String },

    /// Check pipeline state key-value.
    ProcessingState { key: String, val: String },

    /// Match a rule attribute (level, status, etc.) against a value.
    RuleAttribute { attribute: String, value: String },

    /// Rule has a specific tag.
    Tag { tag: String },
}

impl RuleCondition {
    /// Check if this condition matches a compiled rule.
    pub fn matches_rule(&self, rule: &CompiledRule, state: &PipelineState) -> bool {
        match self {
            RuleCondition::Logsource { spec } => logsource_matches(spec, &rule.logsource),

            RuleCondition::RuleId { ids } => ids.iter().any(|id| {
                rule.id.as_deref() == Some(id.as_str())
                    || rule.name.as_deref() == Some(id.as_str())
            }),

            RuleCondition::ContainsFieldMatch { field, value } => {
                rule_contains_field_match(rule, field, value.as_deref())
            }

            RuleCondition::ProcessingItemApplied { processing_item_id } => {
                state.was_applied(processing_item_id)
            }

            RuleCondition::ProcessingState { key, val } => state.state_matches(key, val),

            RuleCondition::RuleAttribute { attribute, value } => {
                rule_attribute_matches(rule, attribute, value)
            }

            RuleCondition::Tag { tag } => rule.tags.iter().any(|t| t == tag),
        }
    }
}

fn rule_contains_field_match(rule: &CompiledRule, field: &str, value: Option<&str>) -> bool {
    let mut found = false;
    for condition in &rule.conditions {
        condition.for_each_match(&mut |m| {
            if found {
                return;
            }
            let field_ok = m
                .field
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(field));
            if !field_ok {
                return;
            }
            let value_ok = match value {
                None => true,
                Some(want) => match &m.value {
                    SigmaValue::String(s) => s.original.eq_ignore_ascii_case(want),
                    other => other.to_string() == want,
                },
            };
            if value_ok {
                found = true;
            }
        });
    }
    found
}

fn rule_attribute_matches(rule: &CompiledRule, attribute: &str, value: &str) -> bool {
    match attribute {
        "title" => rule.title.eq_ignore_ascii_case(value),
        "id" => rule.id.as_deref().is_some_and(|id| id == value),
        "name" => rule.name.as_deref().is_some_and(|n| n == value),
        "level" => rule
            .level
            .is_some_and(|l| l.as_str().eq_ignore_ascii_case(value)),
        _ => false,
    }
}

// =============================================================================
// Field Conditions
// =============================================================================

/// Pre-compiled field match list — either plain strings or compiled regexes.
#[derive(Debug, Clone)]
pub enum FieldMatcher {
    /// Exact string comparison.
    Plain(Vec<String>),
    /// Pre-compiled regex patterns.
    Regex(Vec<Regex>),
}

impl FieldMatcher {
    fn matches(&self, field_name: &str) -> bool {
        match self {
            FieldMatcher::Plain(fields) => fields.iter().any(|f| f == field_name),
            FieldMatcher::Regex(regexes) => regexes.iter().any(|re| re.is_match(field_name)),
        }
    }
}

/// A condition evaluated against a single [`FieldMatch`] leaf, restricting a
/// transformation's effect to part of the tree.
#[derive(Debug, Clone)]
pub enum FieldCondition {
    /// Leaf's field name must be in the include list.
    IncludeFields { matcher: FieldMatcher },

    /// Leaf's field name must NOT be in the exclude list.
    ExcludeFields { matcher: FieldMatcher },

    /// Leaf's string value matches a pre-compiled regex pattern.
    MatchValue { regex: Regex, negate: bool },

    /// Check pipeline state.
    ProcessingState { key: String, val: String },
}

impl FieldCondition {
    /// Check if this condition matches a leaf.
    pub fn matches(&self, leaf: &FieldMatch, state: &PipelineState) -> bool {
        match self {
            FieldCondition::IncludeFields { matcher } => leaf
                .field
                .as_deref()
                .is_some_and(|name| matcher.matches(name)),

            FieldCondition::ExcludeFields { matcher } => !leaf
                .field
                .as_deref()
                .is_some_and(|name| matcher.matches(name)),

            FieldCondition::MatchValue { regex, negate } => {
                let has_match = match &leaf.value {
                    SigmaValue::String(s) => regex.is_match(&s.original),
                    _ => false,
                };
                if *negate { !has_match } else { has_match }
            }

            FieldCondition::ProcessingState { key, val } => state.state_matches(key, val),
        }
    }
}

/// Check whether a leaf passes all field conditions (optionally negated).
///
/// An empty condition list always passes — transformations without leaf
/// gating apply to the whole tree.
pub fn field_conditions_match(
    leaf: &FieldMatch,
    state: &PipelineState,
    conditions: &[FieldCondition],
    negate: bool,
) -> bool {
    if conditions.is_empty() {
        return true;
    }
    let all_match = conditions.iter().all(|c| c.matches(leaf, state));
    if negate { !all_match } else { all_match }
}

// =============================================================================
// Tests
// =============================================================================
