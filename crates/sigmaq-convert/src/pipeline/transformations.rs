//! Pipeline transformations that mutate a [`CompiledRule`] in place.
//!
//! Each variant carries its configuration parameters and is applied via
//! [`Transformation::apply`]. Field-scoped variants honor the processing
//! item's field conditions, so an item can restrict its effect to part of the
//! condition tree.

use std::collections::HashMap;

use regex::Regex;

use sigmaq_parser::{SigmaString, SigmaValue};

use super::conditions::{FieldCondition, field_conditions_match};
use super::state::PipelineState;
use crate::compiler::CompiledRule;
use crate::condition::ConditionNode;
use crate::error::{ConversionError, Result};

// =============================================================================
// Transformation enum
// =============================================================================

/// How an injected condition combines with a rule's existing condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

/// All supported pipeline transformation types.
#[derive(Debug, Clone)]
pub enum Transformation {
    /// Map field names via a lookup table. Fields absent from the mapping are
    /// untouched.
    FieldNameMapping { mapping: HashMap<String, String> },

    /// Add a prefix to all matched field names.
    FieldNamePrefix { prefix: String },

    /// Add a suffix to all matched field names.
    FieldNameSuffix { suffix: String },

    /// Combine an extra condition into the rule's top-level condition.
    ///
    /// The original top-level node and the (optionally negated) extra node
    /// become the two children of a new group — never flattened into an
    /// existing group, so grouping stays unambiguous when rendered with
    /// parentheses.
    ConditionInjection {
        condition: ConditionNode,
        combinator: Combinator,
        negate: bool,
    },

    /// Remove matched leaves; groups emptied by the removal are pruned.
    DropFieldMatch,

    /// Replace logsource fields.
    ChangeLogsource {
        category: Option<String>,
        product: Option<String>,
        service: Option<String>,
    },

    /// Regex replacement in string values of matched leaves.
    ReplaceString { regex: String, replacement: String },

    /// Set key-value in pipeline state.
    SetState { key: String, value: String },

    /// Mark the rule unconvertible for this pipeline.
    RuleFailure { message: String },
}

// =============================================================================
// Application logic
// =============================================================================

impl Transformation {
    /// Apply this transformation to a `CompiledRule`, mutating it in place.
    ///
    /// Returns `Ok(true)` if the transformation was applied, `Ok(false)` if skipped.
    pub fn apply(
        &self,
        rule: &mut CompiledRule,
        state: &mut PipelineState,
        field_conditions: &[FieldCondition],
        field_cond_negate: bool,
    ) -> Result<bool> {
        match self {
            Transformation::FieldNameMapping { mapping } => {
                transform_field_names(rule, state, field_conditions, field_cond_negate, |name| {
                    mapping.get(name).cloned()
                });
                Ok(true)
            }

            Transformation::FieldNamePrefix { prefix } => {
                transform_field_names(rule, state, field_conditions, field_cond_negate, |name| {
                    Some(format!("{prefix}{name}"))
                });
                Ok(true)
            }

            Transformation::FieldNameSuffix { suffix } => {
                transform_field_names(rule, state, field_conditions, field_cond_negate, |name| {
                    Some(format!("{name}{suffix}"))
                });
                Ok(true)
            }

            Transformation::ConditionInjection {
                condition,
                combinator,
                negate,
            } => {
                let extra = if *negate {
                    ConditionNode::negation(condition.clone())
                } else {
                    condition.clone()
                };
                rule.conditions = rule
                    .conditions
                    .drain(..)
                    .map(|original| match combinator {
                        Combinator::And => ConditionNode::And(vec![original, extra.clone()]),
                        Combinator::Or => ConditionNode::Or(vec![original, extra.clone()]),
                    })
                    .collect();
                Ok(true)
            }

            Transformation::DropFieldMatch => {
                let mut pruned = Vec::with_capacity(rule.conditions.len());
                for condition in rule.conditions.drain(..) {
                    match prune_matches(condition, state, field_conditions, field_cond_negate) {
                        Some(kept) => pruned.push(kept),
                        None => {
                            return Err(ConversionError::InvalidCondition(format!(
                                "dropping field matches removed the entire condition of rule '{}'",
                                rule.title
                            )));
                        }
                    }
                }
                rule.conditions = pruned;
                Ok(true)
            }

            Transformation::ChangeLogsource {
                category,
                product,
                service,
            } => {
                if let Some(cat) = category {
                    rule.logsource.category = Some(cat.clone());
                }
                if let Some(prod) = product {
                    rule.logsource.product = Some(prod.clone());
                }
                if let Some(svc) = service {
                    rule.logsource.service = Some(svc.clone());
                }
                Ok(true)
            }

            Transformation::ReplaceString { regex, replacement } => {
                let re = Regex::new(regex)?;
                for condition in rule.conditions.iter_mut() {
                    condition.for_each_match_mut(&mut |leaf| {
                        if !field_conditions_match(leaf, state, field_conditions, field_cond_negate)
                        {
                            return;
                        }
                        if let SigmaValue::String(s) = &mut leaf.value {
                            let replaced = re.replace_all(&s.original, replacement.as_str());
                            if replaced != s.original {
                                *s = SigmaString::new(&replaced);
                            }
                        }
                    });
                }
                Ok(true)
            }

            Transformation::SetState { key, value } => {
                state.set_state(key.clone(), serde_json::Value::String(value.clone()));
                Ok(true)
            }

            Transformation::RuleFailure { message } => Err(ConversionError::RuleFailure(format!(
                "{message} (rule: {})",
                rule.title
            ))),
        }
    }
}

// =============================================================================
// Field name transformation helper
// =============================================================================

fn transform_field_names<F>(
    rule: &mut CompiledRule,
    state: &PipelineState,
    field_conditions: &[FieldCondition],
    field_cond_negate: bool,
    transform_fn: F,
) where
    F: Fn(&str) -> Option<String>,
{
    for condition in rule.conditions.iter_mut() {
        condition.for_each_match_mut(&mut |leaf| {
            if !field_conditions_match(leaf, state, field_conditions, field_cond_negate) {
                return;
            }
            if let Some(ref name) = leaf.field
                && let Some(new_name) = transform_fn(name)
            {
                leaf.field = Some(new_name);
            }
        });
    }
}

// =============================================================================
// Leaf pruning
// =============================================================================

/// Remove leaves matching the field conditions, pruning groups emptied by the
/// removal. Returns `None` when nothing of the node survives.
fn prune_matches(
    node: ConditionNode,
    state: &PipelineState,
    field_conditions: &[FieldCondition],
    field_cond_negate: bool,
) -> Option<ConditionNode> {
    match node {
        ConditionNode::Match(leaf) => {
            if field_conditions_match(&leaf, state, field_conditions, field_cond_negate) {
                None
            } else {
                Some(ConditionNode::Match(leaf))
            }
        }
        ConditionNode::And(children) => {
            let kept: Vec<ConditionNode> = children
                .into_iter()
                .filter_map(|c| prune_matches(c, state, field_conditions, field_cond_negate))
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(ConditionNode::And(kept))
            }
        }
        ConditionNode::Or(children) => {
            let kept: Vec<ConditionNode> = children
                .into_iter()
                .filter_map(|c| prune_matches(c, state, field_conditions, field_cond_negate))
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(ConditionNode::Or(kept))
            }
        }
        ConditionNode::Not(child) => {
            prune_matches(*child, state, field_conditions, field_cond_negate)
                .map(ConditionNode::negation)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{FieldMatch, Operator};
    use crate::pipeline::conditions::FieldMatcher;
    use sigmaq_parser::{Level, LogSource};

    fn str_leaf(field: &str, value: &str) -> ConditionNode {
        ConditionNode::Match(FieldMatch::new(
            field,
            Operator::Contains,
            SigmaValue::String(SigmaString::new(value)),
        ))
    }

    fn make_test_rule() -> CompiledRule {
        CompiledRule {
            title: "Test Rule".to_string(),
            id: Some("test-001".to_string()),
            name: None,
            level: Some(Level::Medium),
            tags: vec![],
            logsource: LogSource {
                category: Some("process_creation".to_string()),
                product: Some("windows".to_string()),
                service: None,
                custom: Default::default(),
            },
            conditions: vec![ConditionNode::And(vec![
                str_leaf("CommandLine", "whoami"),
                str_leaf("ParentImage", "\\cmd.exe"),
            ])],
        }
    }

    #[test]
    fn test_field_name_mapping() {
        let mut rule = make_test_rule();
        let mut state = PipelineState::default();
        let mut mapping = HashMap::new();
        mapping.insert(
            "CommandLine".to_string(),
            "process.command_line".to_string(),
        );

        let t = Transformation::FieldNameMapping { mapping };
        t.apply(&mut rule, &mut state, &[], false).unwrap();

        let fields: Vec<_> = rule.referenced_fields().into_iter().collect();
        assert_eq!(
            fields,
            vec![
                "ParentImage".to_string(),
                "process.command_line".to_string()
            ]
        );
    }

    #[test]
    fn test_field_name_mapping_unmapped_fields_untouched() {
        let mut rule = make_test_rule();
        let mut state = PipelineState::default();
        let t = Transformation::FieldNameMapping {
            mapping: HashMap::new(),
        };
        let before = rule.clone();
        t.apply(&mut rule, &mut state, &[], false).unwrap();
        assert_eq!(rule, before);
    }

    #[test]
    fn test_field_name_prefix_and_suffix() {
        let mut rule = make_test_rule();
        let mut state = PipelineState::default();

        Transformation::FieldNamePrefix {
            prefix: "winlog.".to_string(),
        }
        .apply(&mut rule, &mut state, &[], false)
        .unwrap();
        Transformation::FieldNameSuffix {
            suffix: ".keyword".to_string(),
        }
        .apply(&mut rule, &mut state, &[], false)
        .unwrap();

        assert!(
            rule.referenced_fields()
                .contains("winlog.CommandLine.keyword")
        );
    }

    #[test]
    fn test_condition_injection_nests_one_level() {
        let mut rule = make_test_rule();
        let mut state = PipelineState::default();

        let t = Transformation::ConditionInjection {
            condition: str_leaf("User", "adm_"),
            combinator: Combinator::And,
            negate: true,
        };
        t.apply(&mut rule, &mut state, &[], false).unwrap();

        // Top level is a fresh two-child And: [original And, Not(leaf)]
        match &rule.conditions[0] {
            ConditionNode::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0], ConditionNode::And(_)));
                assert!(matches!(children[1], ConditionNode::Not(_)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_condition_injection_or_combinator() {
        let mut rule = make_test_rule();
        let mut state = PipelineState::default();

        let t = Transformation::ConditionInjection {
            condition: str_leaf("Fallback", "x"),
            combinator: Combinator::Or,
            negate: false,
        };
        t.apply(&mut rule, &mut state, &[], false).unwrap();

        match &rule.conditions[0] {
            ConditionNode::Or(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[1], ConditionNode::Match(_)));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn test_drop_field_match_with_include_condition() {
        let mut rule = make_test_rule();
        let mut state = PipelineState::default();

        let conds = vec![FieldCondition::IncludeFields {
            matcher: FieldMatcher::Plain(vec!["ParentImage".to_string()]),
        }];

        Transformation::DropFieldMatch
            .apply(&mut rule, &mut state, &conds, false)
            .unwrap();

        let fields: Vec<_> = rule.referenced_fields().into_iter().collect();
        assert_eq!(fields, vec!["CommandLine".to_string()]);
    }

    #[test]
    fn test_drop_field_match_removing_everything_fails() {
        let mut rule = make_test_rule();
        let mut state = PipelineState::default();

        // No conditions = every leaf matches = whole condition dropped
        let err = Transformation::DropFieldMatch
            .apply(&mut rule, &mut state, &[], false)
            .unwrap_err();
        assert!(matches!(err, ConversionError::InvalidCondition(_)));
    }

    #[test]
    fn test_change_logsource() {
        let mut rule = make_test_rule();
        let mut state = PipelineState::default();
        Transformation::ChangeLogsource {
            category: Some("endpoint".to_string()),
            product: None,
            service: None,
        }
        .apply(&mut rule, &mut state, &[], false)
        .unwrap();

        assert_eq!(rule.logsource.category, Some("endpoint".to_string()));
        assert_eq!(rule.logsource.product, Some("windows".to_string()));
    }

    #[test]
    fn test_replace_string() {
        let mut rule = make_test_rule();
        let mut state = PipelineState::default();
        Transformation::ReplaceString {
            regex: "^whoami$".to_string(),
            replacement: "REPLACED".to_string(),
        }
        .apply(&mut rule, &mut state, &[], false)
        .unwrap();

        let mut values = Vec::new();
        rule.conditions[0].for_each_match(&mut |m| values.push(m.value.to_string()));
        assert_eq!(values, vec!["REPLACED".to_string(), "\\cmd.exe".to_string()]);
    }

    #[test]
    fn test_replace_string_invalid_regex() {
        let mut rule = make_test_rule();
        let mut state = PipelineState::default();
        let err = Transformation::ReplaceString {
            regex: "[unclosed".to_string(),
            replacement: "x".to_string(),
        }
        .apply(&mut rule, &mut state, &[], false)
        .unwrap_err();
        assert!(matches!(err, ConversionError::InvalidRegex(_)));
    }

    #[test]
    fn test_set_state() {
        let mut rule = make_test_rule();
        let mut state = PipelineState::default();
        Transformation::SetState {
            key: "index".to_string(),
            value: "windows".to_string(),
        }
        .apply(&mut rule, &mut state, &[], false)
        .unwrap();
        assert!(state.state_matches("index", "windows"));
    }

    #[test]
    fn test_rule_failure() {
        let mut rule = make_test_rule();
        let mut state = PipelineState::default();
        let err = Transformation::RuleFailure {
            message: "Unsupported rule".to_string(),
        }
        .apply(&mut rule, &mut state, &[], false)
        .unwrap_err();
        assert!(matches!(err, ConversionError::RuleFailure(_)));
    }
}
