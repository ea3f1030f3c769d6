//! Compile parsed Sigma rules into condition trees.
//!
//! The compiler transforms the parser AST (`SigmaRule`, `Detection`,
//! `DetectionItem`) into a [`CompiledRule`] holding one [`ConditionNode`] per
//! declarative condition string, with named-selection references substituted
//! by their compiled sub-trees.
//!
//! Modifier interpretation happens here: the compiler reads the
//! `Vec<Modifier>` from each `FieldSpec` and produces the appropriate
//! [`Operator`], while the `all` modifier switches multi-value linking from
//! OR to AND.

use std::collections::{BTreeSet, HashMap};

use sigmaq_parser::{
    ConditionExpr, Detection, DetectionItem, Detections, Level, LogSource, Modifier, Quantifier,
    SelectorPattern, SigmaRule,
};

use crate::condition::{ConditionNode, FieldMatch, Operator};
use crate::error::{ConversionError, Result};

// =============================================================================
// Compiled rule
// =============================================================================

/// A compiled Sigma rule, ready for pipeline application and rendering.
///
/// Owned by the conversion run; mutated in place only by processing items
/// during pipeline application, read-only afterwards during rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub title: String,
    pub id: Option<String>,
    pub name: Option<String>,
    pub level: Option<Level>,
    pub tags: Vec<String>,
    pub logsource: LogSource,
    /// One condition tree per declarative condition string (usually one).
    pub conditions: Vec<ConditionNode>,
}

impl CompiledRule {
    /// Stable identity for error reporting: id, then name, then title.
    pub fn identity(&self) -> &str {
        self.id
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.title)
    }

    /// The set of field names referenced across all condition trees.
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        for condition in &self.conditions {
            fields.extend(condition.referenced_fields());
        }
        fields
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Compile a parsed `SigmaRule` into a `CompiledRule`.
///
/// Compilation is pure: the parsed rule is not mutated, and compiling the same
/// rule twice yields equal results.
pub fn compile_rule(rule: &SigmaRule) -> Result<CompiledRule> {
    let conditions = compile_detections(&rule.detection)?;

    Ok(CompiledRule {
        title: rule.title.clone(),
        id: rule.id.clone(),
        name: rule.name.clone(),
        level: rule.level,
        tags: rule.tags.clone(),
        logsource: rule.logsource.clone(),
        conditions,
    })
}

/// Compile a detection section into one condition tree per condition string.
///
/// Used for rules and for filter `global_filter` sections alike.
pub fn compile_detections(detections: &Detections) -> Result<Vec<ConditionNode>> {
    if detections.conditions.is_empty() {
        return Err(ConversionError::InvalidCondition(
            "detection has no condition".into(),
        ));
    }
    detections
        .conditions
        .iter()
        .map(|expr| compile_condition_expr(expr, &detections.named))
        .collect()
}

// =============================================================================
// Condition expression compilation
// =============================================================================

/// Substitute named-selection references in a condition expression with their
/// compiled sub-trees.
pub fn compile_condition_expr(
    expr: &ConditionExpr,
    named: &HashMap<String, Detection>,
) -> Result<ConditionNode> {
    match expr {
        ConditionExpr::Identifier(name) => {
            let detection = named
                .get(name)
                .ok_or_else(|| ConversionError::UnknownIdentifier(name.clone()))?;
            compile_detection(detection)
        }
        ConditionExpr::And(exprs) => {
            let children = exprs
                .iter()
                .map(|e| compile_condition_expr(e, named))
                .collect::<Result<Vec<_>>>()?;
            ConditionNode::conjunction(children)
        }
        ConditionExpr::Or(exprs) => {
            let children = exprs
                .iter()
                .map(|e| compile_condition_expr(e, named))
                .collect::<Result<Vec<_>>>()?;
            ConditionNode::disjunction(children)
        }
        ConditionExpr::Not(inner) => {
            Ok(ConditionNode::negation(compile_condition_expr(inner, named)?))
        }
        ConditionExpr::Selector {
            quantifier,
            pattern,
        } => compile_selector(quantifier, pattern, named),
    }
}

/// Expand a quantified selector (`1 of selection_*`, `all of them`) into an
/// OR/AND group over the matching named selections.
///
/// Matched names are sorted so expansion order is independent of map iteration
/// order and rendering stays deterministic.
fn compile_selector(
    quantifier: &Quantifier,
    pattern: &SelectorPattern,
    named: &HashMap<String, Detection>,
) -> Result<ConditionNode> {
    let mut names: Vec<&String> = match pattern {
        SelectorPattern::Them => named.keys().collect(),
        SelectorPattern::Pattern(p) => named
            .keys()
            .filter(|name| wildcard_match(p, name))
            .collect(),
    };
    names.sort();

    if names.is_empty() {
        return Err(ConversionError::UnknownIdentifier(pattern.to_string()));
    }

    let children = names
        .iter()
        .map(|name| compile_detection(&named[name.as_str()]))
        .collect::<Result<Vec<_>>>()?;

    match quantifier {
        Quantifier::Any => ConditionNode::disjunction(children),
        Quantifier::All => ConditionNode::conjunction(children),
        Quantifier::Count(n) => Err(ConversionError::InvalidCondition(format!(
            "'{n} of {pattern}' is not expressible as a boolean query"
        ))),
    }
}

/// Match a selection name against a `*`-wildcard pattern.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && p[pi] != '*' && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

// =============================================================================
// Detection compilation
// =============================================================================

/// Compile a named detection into a condition sub-tree.
///
/// A YAML mapping compiles to a conjunction, a sequence of mappings to a
/// disjunction of conjunctions (preserved even for singleton sequences), and a
/// sequence of scalars to keyword leaves.
pub fn compile_detection(detection: &Detection) -> Result<ConditionNode> {
    match detection {
        Detection::AllOf(items) => {
            let children = items
                .iter()
                .map(compile_detection_item)
                .collect::<Result<Vec<_>>>()?;
            ConditionNode::conjunction(children)
        }
        Detection::AnyOf(subs) => {
            let children = subs
                .iter()
                .map(compile_detection)
                .collect::<Result<Vec<_>>>()?;
            ConditionNode::disjunction(children)
        }
        Detection::Keywords(values) => {
            let leaves: Vec<ConditionNode> = values
                .iter()
                .map(|v| ConditionNode::Match(FieldMatch::keyword(Operator::Equals, v.clone())))
                .collect();
            if leaves.len() == 1 {
                Ok(leaves.into_iter().next().ok_or_else(|| {
                    ConversionError::InvalidCondition("empty keyword detection".into())
                })?)
            } else {
                ConditionNode::disjunction(leaves)
            }
        }
    }
}

fn compile_detection_item(item: &DetectionItem) -> Result<ConditionNode> {
    let (op, link_all) = interpret_modifiers(&item.field.modifiers, item.field.name.as_deref())?;

    let leaves: Vec<ConditionNode> = item
        .values
        .iter()
        .map(|value| {
            ConditionNode::Match(FieldMatch {
                field: item.field.name.clone(),
                op,
                value: value.clone(),
            })
        })
        .collect();

    match leaves.len() {
        0 => Err(ConversionError::InvalidCondition(format!(
            "detection item '{}' has no values",
            item.field.name.as_deref().unwrap_or("<keyword>")
        ))),
        1 => Ok(leaves
            .into_iter()
            .next()
            .ok_or_else(|| ConversionError::InvalidCondition("empty detection item".into()))?),
        // Multiple values OR by default; the `all` modifier switches to AND.
        _ if link_all => ConditionNode::conjunction(leaves),
        _ => ConditionNode::disjunction(leaves),
    }
}

/// Map a field's modifier list to a single operator plus the value-linking
/// flag. Conflicting positional modifiers are rejected.
fn interpret_modifiers(modifiers: &[Modifier], field: Option<&str>) -> Result<(Operator, bool)> {
    let mut op: Option<Operator> = None;
    let mut link_all = false;

    for m in modifiers {
        let mapped = match m {
            Modifier::All => {
                link_all = true;
                continue;
            }
            Modifier::Contains => Operator::Contains,
            Modifier::StartsWith => Operator::StartsWith,
            Modifier::EndsWith => Operator::EndsWith,
            Modifier::Re => Operator::Regex,
            Modifier::Cidr => Operator::Cidr,
            Modifier::Gt => Operator::Gt,
            Modifier::Gte => Operator::Gte,
            Modifier::Lt => Operator::Lt,
            Modifier::Lte => Operator::Lte,
        };
        if let Some(existing) = op
            && existing != mapped
        {
            return Err(ConversionError::InvalidCondition(format!(
                "conflicting modifiers '{existing}' and '{mapped}' on field '{}'",
                field.unwrap_or("<keyword>")
            )));
        }
        op = Some(mapped);
    }

    Ok((op.unwrap_or(Operator::Equals), link_all))
}

// =============================================================================
// Tests
// =============================================================================
