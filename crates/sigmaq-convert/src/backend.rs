//! Backend query rendering.
//!
//! A [`QueryContract`] describes a target query language: one template per
//! operator (`{field}` / `{value}` placeholders), join tokens, and value
//! quoting rules. [`TextQueryBackend`] drives the whole conversion — compile,
//! apply its pipeline, render — and collects per-rule failures so one bad rule
//! never aborts the rest.
//!
//! Rendering is deterministic: identical tree + identical contract produces
//! an identical string on every call.

use sigmaq_parser::{SigmaCollection, SigmaRule, SigmaValue};

use crate::compiler::compile_rule;
use crate::condition::{ConditionNode, FieldMatch, Operator};
use crate::error::{ConversionError, Result};
use crate::pipeline::{PipelineState, ProcessingPipeline};

// =============================================================================
// Query contract
// =============================================================================

/// The operator/quoting contract of a target query language.
///
/// An absent operator template means the backend cannot express that operator;
/// rendering a leaf with it fails with
/// [`ConversionError::UnsupportedOperator`].
#[derive(Debug, Clone)]
pub struct QueryContract {
    pub eq_template: Option<String>,
    pub contains_template: Option<String>,
    pub startswith_template: Option<String>,
    pub endswith_template: Option<String>,
    pub regex_template: Option<String>,
    pub cidr_template: Option<String>,
    pub gt_template: Option<String>,
    pub gte_template: Option<String>,
    pub lt_template: Option<String>,
    pub lte_template: Option<String>,
    /// Template for keyword leaves without a field binding.
    pub unbound_template: Option<String>,

    pub and_token: String,
    pub or_token: String,
    pub not_token: String,
    pub group_open: String,
    pub group_close: String,

    pub str_quote: char,
    pub escape_char: char,
    pub true_token: String,
    pub false_token: String,
    pub null_token: String,
}

impl Default for QueryContract {
    fn default() -> Self {
        QueryContract {
            eq_template: Some("{field}={value}".to_string()),
            contains_template: Some("{field} contains {value}".to_string()),
            startswith_template: Some("{field} startswith {value}".to_string()),
            endswith_template: Some("{field} endswith {value}".to_string()),
            regex_template: Some("{field}=~{value}".to_string()),
            cidr_template: Some("{field} in {value}".to_string()),
            gt_template: Some("{field}>{value}".to_string()),
            gte_template: Some("{field}>={value}".to_string()),
            lt_template: Some("{field}<{value}".to_string()),
            lte_template: Some("{field}<={value}".to_string()),
            unbound_template: Some("{value}".to_string()),
            and_token: " and ".to_string(),
            or_token: " or ".to_string(),
            not_token: "not ".to_string(),
            group_open: "(".to_string(),
            group_close: ")".to_string(),
            str_quote: '"',
            escape_char: '\\',
            true_token: "true".to_string(),
            false_token: "false".to_string(),
            null_token: "null".to_string(),
        }
    }
}

impl QueryContract {
    fn template_for(&self, op: Operator) -> Option<&str> {
        let template = match op {
            Operator::Equals => &self.eq_template,
            Operator::Contains => &self.contains_template,
            Operator::StartsWith => &self.startswith_template,
            Operator::EndsWith => &self.endswith_template,
            Operator::Regex => &self.regex_template,
            Operator::Cidr => &self.cidr_template,
            Operator::Gt => &self.gt_template,
            Operator::Gte => &self.gte_template,
            Operator::Lt => &self.lt_template,
            Operator::Lte => &self.lte_template,
        };
        template.as_deref()
    }

    /// Render a value: double-quoted strings (quote char escaped), bare
    /// numbers, boolean/null tokens.
    fn render_value(&self, value: &SigmaValue) -> String {
        match value {
            SigmaValue::String(s) => {
                let mut out = String::with_capacity(s.original.len() + 2);
                out.push(self.str_quote);
                for c in s.original.chars() {
                    if c == self.str_quote {
                        out.push(self.escape_char);
                    }
                    out.push(c);
                }
                out.push(self.str_quote);
                out
            }
            SigmaValue::Integer(n) => n.to_string(),
            SigmaValue::Float(n) => n.to_string(),
            SigmaValue::Bool(true) => self.true_token.clone(),
            SigmaValue::Bool(false) => self.false_token.clone(),
            SigmaValue::Null => self.null_token.clone(),
        }
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Render a condition tree into a query string under the given contract.
pub fn render(node: &ConditionNode, contract: &QueryContract) -> Result<String> {
    match node {
        ConditionNode::Match(m) => render_leaf(m, contract),

        ConditionNode::And(children) => {
            let parts = children
                .iter()
                .map(|child| render_operand(child, contract, BinaryOp::And))
                .collect::<Result<Vec<_>>>()?;
            Ok(parts.join(&contract.and_token))
        }

        ConditionNode::Or(children) => {
            let parts = children
                .iter()
                .map(|child| render_operand(child, contract, BinaryOp::Or))
                .collect::<Result<Vec<_>>>()?;
            Ok(parts.join(&contract.or_token))
        }

        ConditionNode::Not(child) => {
            let inner = render(child, contract)?;
            if compound_group(child) {
                Ok(format!(
                    "{}{}{inner}{}",
                    contract.not_token, contract.group_open, contract.group_close
                ))
            } else {
                Ok(format!("{}{inner}", contract.not_token))
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    And,
    Or,
}

/// Render a child of an AND/OR group, parenthesizing when the child is a
/// compound group of the other binary operator.
fn render_operand(child: &ConditionNode, contract: &QueryContract, parent: BinaryOp) -> Result<String> {
    let rendered = render(child, contract)?;
    let parenthesize = match effective(child) {
        ConditionNode::Or(children) => parent == BinaryOp::And && children.len() > 1,
        ConditionNode::And(children) => parent == BinaryOp::Or && children.len() > 1,
        _ => false,
    };
    if parenthesize {
        Ok(format!(
            "{}{rendered}{}",
            contract.group_open, contract.group_close
        ))
    } else {
        Ok(rendered)
    }
}

/// Look through single-child groups to the node that determines binding.
fn effective(node: &ConditionNode) -> &ConditionNode {
    match node {
        ConditionNode::And(children) | ConditionNode::Or(children) if children.len() == 1 => {
            effective(&children[0])
        }
        _ => node,
    }
}

/// A negation of a compound child always parenthesizes.
fn compound_group(node: &ConditionNode) -> bool {
    matches!(
        effective(node),
        ConditionNode::And(children) | ConditionNode::Or(children) if children.len() > 1
    )
}

fn render_leaf(m: &FieldMatch, contract: &QueryContract) -> Result<String> {
    let value = contract.render_value(&m.value);
    match &m.field {
        Some(field) => {
            let template =
                contract
                    .template_for(m.op)
                    .ok_or_else(|| ConversionError::UnsupportedOperator {
                        field: field.clone(),
                        operator: m.op,
                    })?;
            Ok(template.replace("{field}", field).replace("{value}", &value))
        }
        None => {
            let template = contract.unbound_template.as_deref().ok_or_else(|| {
                ConversionError::UnsupportedOperator {
                    field: "<keyword>".to_string(),
                    operator: m.op,
                }
            })?;
            Ok(template.replace("{value}", &value))
        }
    }
}

// =============================================================================
// Backend
// =============================================================================

/// A render failure for a single rule.
#[derive(Debug)]
pub struct ConversionFailure {
    /// Rule identity (id, name, or title).
    pub rule: String,
    pub error: ConversionError,
}

/// Result of converting a collection: the successfully rendered queries plus
/// the per-rule failures.
#[derive(Debug, Default)]
pub struct ConversionResult {
    pub queries: Vec<String>,
    pub failures: Vec<ConversionFailure>,
}

/// A text query backend: a contract plus a processing pipeline.
///
/// Pipelines are explicit values passed to the conversion call, so multiple
/// independent conversions with different pipelines never interfere.
#[derive(Debug, Clone, Default)]
pub struct TextQueryBackend {
    pub contract: QueryContract,
    pub pipeline: ProcessingPipeline,
}

impl TextQueryBackend {
    pub fn new(contract: QueryContract, pipeline: ProcessingPipeline) -> Self {
        TextQueryBackend { contract, pipeline }
    }

    /// Convert every rule in a collection, in collection order.
    ///
    /// Load errors already collected in the collection and per-rule
    /// compile/pipeline/render errors all land in the result's failures; the
    /// successfully converted subset is returned regardless.
    pub fn convert(&self, collection: &SigmaCollection) -> ConversionResult {
        let mut result = ConversionResult::default();

        for load_error in &collection.errors {
            result.failures.push(ConversionFailure {
                rule: load_error
                    .identity
                    .clone()
                    .unwrap_or_else(|| "<unknown>".to_string()),
                error: ConversionError::InvalidCondition(load_error.message.clone()),
            });
        }

        let mut state = PipelineState::new();
        for rule in &collection.rules {
            match self.convert_with_state(rule, &mut state) {
                Ok(queries) => result.queries.extend(queries),
                Err(error) => result.failures.push(ConversionFailure {
                    rule: rule.identity().to_string(),
                    error,
                }),
            }
        }

        result
    }

    /// Convert a single rule, one query per condition.
    pub fn convert_rule(&self, rule: &SigmaRule) -> Result<Vec<String>> {
        let mut state = PipelineState::new();
        self.convert_with_state(rule, &mut state)
    }

    fn convert_with_state(
        &self,
        rule: &SigmaRule,
        state: &mut PipelineState,
    ) -> Result<Vec<String>> {
        let mut compiled = compile_rule(rule)?;
        self.pipeline.apply(&mut compiled, state)?;
        compiled
            .conditions
            .iter()
            .map(|condition| render(condition, &self.contract))
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
