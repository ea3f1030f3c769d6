//! Compile Sigma filters into processing items.
//!
//! A filter is sugar over the pipeline mechanism, not a separate execution
//! path: compiling one yields a single [`ProcessingItem`] whose transformation
//! ANDs a negated copy of the filter's condition into every rule that passes
//! the filter's targeting conditions. The item is appended to whatever
//! pipeline a backend uses, exactly like a hand-authored item.

use sigmaq_parser::SigmaFilter;

use crate::compiler::compile_detections;
use crate::condition::ConditionNode;
use crate::error::Result;
use crate::pipeline::{Combinator, ProcessingItem, RuleCondition, Transformation};

/// Compile a filter into one processing item.
///
/// Targeting:
/// - the filter's logsource must be compatible with the rule's, and
/// - when the filter names target rules, the rule's id or name must be among
///   them — an empty target list means every rule matching the logsource.
///
/// The injected transformation is always `AND NOT (filter condition)`.
///
/// Compilation is a pure function: the filter is not mutated, and repeated
/// calls produce equivalent items.
pub fn to_processing_item(filter: &SigmaFilter) -> Result<ProcessingItem> {
    let condition = compile_filter_condition(filter)?;

    let mut rule_conditions = vec![RuleCondition::Logsource {
        spec: filter.logsource.clone(),
    }];
    if !filter.filter.rules.is_empty() {
        rule_conditions.push(RuleCondition::RuleId {
            ids: filter.filter.rules.clone(),
        });
    }

    Ok(ProcessingItem {
        id: filter
            .id
            .clone()
            .or_else(|| filter.name.clone())
            .or_else(|| Some(filter.title.clone())),
        ..ProcessingItem::with_rule_conditions(
            Transformation::ConditionInjection {
                condition,
                combinator: Combinator::And,
                negate: true,
            },
            rule_conditions,
        )
    })
}

/// Compile the filter's own selection condition.
///
/// The full condition mini-language is supported; the rare multi-condition
/// filter combines its entries as alternatives (OR).
fn compile_filter_condition(filter: &SigmaFilter) -> Result<ConditionNode> {
    let mut compiled = compile_detections(&filter.filter.detection)?;
    if compiled.len() == 1 {
        // compile_detections guarantees at least one condition
        return compiled
            .pop()
            .ok_or_else(|| crate::error::ConversionError::InvalidCondition(
                "filter has no condition".into(),
            ));
    }
    ConditionNode::disjunction(compiled)
}
