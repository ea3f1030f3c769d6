//! Processing pipeline system for rewriting compiled rules before rendering.
//!
//! A pipeline is an ordered sequence of processing items. Each item pairs a
//! transformation with gating conditions deciding whether it applies to a
//! given rule (and, for field-scoped transformations, to which leaves of the
//! rule's condition tree). Items apply in sequence order; later items observe
//! the effects of earlier ones.
//!
//! Pipelines are plain values: build them in code, parse them from YAML, or
//! concatenate two with [`ProcessingPipeline::concat`] — which is also how a
//! compiled filter's item joins a backend's own pipeline.
//!
//! # Example
//!
//! ```rust
//! use sigmaq_convert::pipeline::parse_pipeline;
//!
//! let yaml = r#"
//! name: Sysmon Field Mapping
//! priority: 10
//! transformations:
//!   - id: sysmon_field_mapping
//!     type: field_name_mapping
//!     mapping:
//!       CommandLine: process.command_line
//!       ParentImage: process.parent.executable
//!     rule_conditions:
//!       - type: logsource
//!         product: windows
//! "#;
//!
//! let pipeline = parse_pipeline(yaml).unwrap();
//! assert_eq!(pipeline.name, "Sysmon Field Mapping");
//! ```

pub mod conditions;
pub mod state;
pub mod transformations;

use std::path::Path;

use sigmaq_parser::{LogSource, SigmaValue};

use regex::Regex;

use crate::compiler::CompiledRule;
use crate::condition::{ConditionNode, FieldMatch, Operator};
use crate::error::{ConversionError, Result};

pub use conditions::{
    ConditionLinking, FieldCondition, FieldMatcher, RuleCondition, logsource_matches,
};
pub use state::PipelineState;
pub use transformations::{Combinator, Transformation};

// =============================================================================
// Processing item
// =============================================================================

/// A single transformation with its gating conditions.
#[derive(Debug, Clone)]
pub struct ProcessingItem {
    /// Optional ID for tracking in pipeline state.
    pub id: Option<String>,
    /// The transformation to apply.
    pub transformation: Transformation,
    /// Rule-level conditions gating the transformation.
    pub rule_conditions: Vec<RuleCondition>,
    /// How rule conditions combine. Default: all must match.
    pub rule_condition_linking: ConditionLinking,
    /// Leaf-level conditions restricting the transformation's effect.
    pub field_conditions: Vec<FieldCondition>,
    /// If true, negate the field conditions.
    pub field_cond_negate: bool,
}

impl ProcessingItem {
    /// An unconditional item applying to every rule.
    pub fn new(transformation: Transformation) -> Self {
        ProcessingItem {
            id: None,
            transformation,
            rule_conditions: Vec::new(),
            rule_condition_linking: ConditionLinking::All,
            field_conditions: Vec::new(),
            field_cond_negate: false,
        }
    }

    /// An item gated by rule conditions (AND-linked).
    pub fn with_rule_conditions(
        transformation: Transformation,
        rule_conditions: Vec<RuleCondition>,
    ) -> Self {
        ProcessingItem {
            rule_conditions,
            ..ProcessingItem::new(transformation)
        }
    }

    /// Apply this item to a rule.
    ///
    /// Returns `Ok(false)` without side effects when the rule conditions do
    /// not hold.
    pub fn apply(&self, rule: &mut CompiledRule, state: &mut PipelineState) -> Result<bool> {
        if !self.rule_conditions_match(rule, state) {
            return Ok(false);
        }

        let applied = self.transformation.apply(
            rule,
            state,
            &self.field_conditions,
            self.field_cond_negate,
        )?;

        if applied && let Some(ref id) = self.id {
            state.mark_applied(id);
        }

        Ok(applied)
    }

    fn rule_conditions_match(&self, rule: &CompiledRule, state: &PipelineState) -> bool {
        if self.rule_conditions.is_empty() {
            return true;
        }
        self.rule_condition_linking.evaluate(
            self.rule_conditions
                .iter()
                .map(|c| c.matches_rule(rule, state)),
        )
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// A processing pipeline: an ordered sequence of processing items.
#[derive(Debug, Clone, Default)]
pub struct ProcessingPipeline {
    /// Pipeline name.
    pub name: String,
    /// Priority (lower runs first when merging multiple pipelines). Default: 0.
    pub priority: i32,
    /// Ordered processing items.
    pub items: Vec<ProcessingItem>,
}

impl ProcessingPipeline {
    pub fn new(name: impl Into<String>) -> Self {
        ProcessingPipeline {
            name: name.into(),
            priority: 0,
            items: Vec::new(),
        }
    }

    pub fn from_items(name: impl Into<String>, items: Vec<ProcessingItem>) -> Self {
        ProcessingPipeline {
            name: name.into(),
            priority: 0,
            items,
        }
    }

    /// Append a processing item.
    pub fn push(&mut self, item: ProcessingItem) {
        self.items.push(item);
    }

    /// Concatenate two pipelines, preserving both orderings with `self`'s
    /// items first.
    pub fn concat(mut self, other: ProcessingPipeline) -> ProcessingPipeline {
        self.items.extend(other.items);
        self
    }

    /// Apply this pipeline to a single rule, mutating it in place.
    ///
    /// An error aborts only this rule's further processing; the rule should be
    /// treated as failed by the caller.
    pub fn apply(&self, rule: &mut CompiledRule, state: &mut PipelineState) -> Result<()> {
        state.reset_rule();
        for item in &self.items {
            item.apply(rule, state)?;
        }
        Ok(())
    }

    /// Apply this pipeline to all rules, in collection order.
    ///
    /// Failed rules are removed from the collection and returned, keyed by
    /// rule identity; the rest are processed normally.
    pub fn apply_to_collection(
        &self,
        rules: &mut Vec<CompiledRule>,
    ) -> Vec<(String, ConversionError)> {
        let mut state = PipelineState::new();
        let mut failures = Vec::new();
        let mut kept = Vec::with_capacity(rules.len());

        for mut rule in rules.drain(..) {
            match self.apply(&mut rule, &mut state) {
                Ok(()) => kept.push(rule),
                Err(e) => failures.push((rule.identity().to_string(), e)),
            }
        }

        *rules = kept;
        failures
    }
}

/// Sort pipelines by priority (lower = first) before applying them in order.
pub fn merge_pipelines(pipelines: &mut [ProcessingPipeline]) {
    pipelines.sort_by_key(|p| p.priority);
}

// =============================================================================
// YAML parsing
// =============================================================================

/// Parse a pipeline from a YAML string.
pub fn parse_pipeline(yaml: &str) -> Result<ProcessingPipeline> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)
        .map_err(|e| ConversionError::InvalidPipeline(format!("pipeline YAML parse error: {e}")))?;
    parse_pipeline_value(&value)
}

/// Parse a pipeline from a YAML file.
pub fn parse_pipeline_file(path: &Path) -> Result<ProcessingPipeline> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConversionError::InvalidPipeline(format!("cannot read pipeline file: {e}")))?;
    parse_pipeline(&content)
}

fn parse_pipeline_value(value: &serde_yaml::Value) -> Result<ProcessingPipeline> {
    let obj = value.as_mapping().ok_or_else(|| {
        ConversionError::InvalidPipeline("pipeline YAML must be a mapping".to_string())
    })?;

    let name = obj
        .get(ykey("name"))
        .and_then(|v| v.as_str())
        .unwrap_or("unnamed")
        .to_string();

    let priority = obj
        .get(ykey("priority"))
        .and_then(|v| v.as_i64())
        .unwrap_or(0) as i32;

    let items = if let Some(items) = obj.get(ykey("transformations")) {
        parse_processing_items(items)?
    } else {
        Vec::new()
    };

    Ok(ProcessingPipeline {
        name,
        priority,
        items,
    })
}

fn ykey(s: &str) -> serde_yaml::Value {
    serde_yaml::Value::String(s.to_string())
}

fn parse_processing_items(value: &serde_yaml::Value) -> Result<Vec<ProcessingItem>> {
    let items = value.as_sequence().ok_or_else(|| {
        ConversionError::InvalidPipeline("transformations must be a sequence".to_string())
    })?;

    items.iter().map(parse_processing_item).collect()
}

fn parse_processing_item(value: &serde_yaml::Value) -> Result<ProcessingItem> {
    let obj = value.as_mapping().ok_or_else(|| {
        ConversionError::InvalidPipeline("transformation item must be a mapping".to_string())
    })?;

    let id = obj
        .get(ykey("id"))
        .and_then(|v| v.as_str())
        .map(String::from);

    let transformation = parse_transformation(obj)?;

    let rule_conditions = if let Some(conds) = obj.get(ykey("rule_conditions")) {
        parse_rule_conditions(conds)?
    } else {
        Vec::new()
    };

    let rule_condition_linking = match obj.get(ykey("rule_cond_linking")).and_then(|v| v.as_str()) {
        None | Some("and") => ConditionLinking::All,
        Some("or") => ConditionLinking::Any,
        Some(other) => {
            return Err(ConversionError::InvalidPipeline(format!(
                "unknown rule_cond_linking: {other}"
            )));
        }
    };

    let field_conditions = if let Some(conds) = obj.get(ykey("field_conditions")) {
        parse_field_conditions(conds)?
    } else {
        Vec::new()
    };

    let field_cond_negate = obj
        .get(ykey("field_cond_negate"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    Ok(ProcessingItem {
        id,
        transformation,
        rule_conditions,
        rule_condition_linking,
        field_conditions,
        field_cond_negate,
    })
}

fn parse_transformation(obj: &serde_yaml::Mapping) -> Result<Transformation> {
    let type_str = obj
        .get(ykey("type"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ConversionError::InvalidPipeline("transformation must have a 'type' field".to_string())
        })?;

    match type_str {
        "field_name_mapping" => {
            let mapping = parse_string_mapping(obj.get(ykey("mapping")));
            Ok(Transformation::FieldNameMapping { mapping })
        }

        "field_name_prefix" => {
            let prefix = obj
                .get(ykey("prefix"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Ok(Transformation::FieldNamePrefix { prefix })
        }

        "field_name_suffix" => {
            let suffix = obj
                .get(ykey("suffix"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Ok(Transformation::FieldNameSuffix { suffix })
        }

        "add_condition" => {
            let condition = parse_injected_condition(obj.get(ykey("conditions")))?;
            let negate = obj
                .get(ykey("negated"))
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let combinator = match obj.get(ykey("combinator")).and_then(|v| v.as_str()) {
                None | Some("and") => Combinator::And,
                Some("or") => Combinator::Or,
                Some(other) => {
                    return Err(ConversionError::InvalidPipeline(format!(
                        "unknown combinator: {other}"
                    )));
                }
            };
            Ok(Transformation::ConditionInjection {
                condition,
                combinator,
                negate,
            })
        }

        "drop_field_match" => Ok(Transformation::DropFieldMatch),

        "change_logsource" => {
            let category = obj
                .get(ykey("category"))
                .and_then(|v| v.as_str())
                .map(String::from);
            let product = obj
                .get(ykey("product"))
                .and_then(|v| v.as_str())
                .map(String::from);
            let service = obj
                .get(ykey("service"))
                .and_then(|v| v.as_str())
                .map(String::from);
            Ok(Transformation::ChangeLogsource {
                category,
                product,
                service,
            })
        }

        "replace_string" => {
            let regex = obj
                .get(ykey("regex"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let replacement = obj
                .get(ykey("replacement"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Ok(Transformation::ReplaceString { regex, replacement })
        }

        "set_state" => {
            let key = obj
                .get(ykey("key"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let value = obj
                .get(ykey("value"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Ok(Transformation::SetState { key, value })
        }

        "rule_failure" => {
            let message = obj
                .get(ykey("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("rule failure")
                .to_string();
            Ok(Transformation::RuleFailure { message })
        }

        other => Err(ConversionError::InvalidPipeline(format!(
            "unknown transformation type: {other}"
        ))),
    }
}

/// Build the injected condition of an `add_condition` transformation from a
/// field → value mapping: a conjunction of equality leaves, in mapping order.
fn parse_injected_condition(value: Option<&serde_yaml::Value>) -> Result<ConditionNode> {
    let Some(serde_yaml::Value::Mapping(m)) = value else {
        return Err(ConversionError::InvalidPipeline(
            "add_condition requires a 'conditions' mapping".to_string(),
        ));
    };

    let leaves: Vec<ConditionNode> = m
        .iter()
        .filter_map(|(k, v)| {
            k.as_str().map(|field| {
                ConditionNode::Match(FieldMatch::new(
                    field,
                    Operator::Equals,
                    SigmaValue::from_yaml(v),
                ))
            })
        })
        .collect();

    ConditionNode::conjunction(leaves)
}

// =============================================================================
// Condition YAML parsing
// =============================================================================

fn parse_rule_conditions(value: &serde_yaml::Value) -> Result<Vec<RuleCondition>> {
    let items = value.as_sequence().ok_or_else(|| {
        ConversionError::InvalidPipeline("rule_conditions must be a sequence".to_string())
    })?;

    items.iter().map(parse_rule_condition).collect()
}

fn parse_rule_condition(value: &serde_yaml::Value) -> Result<RuleCondition> {
    let obj = value.as_mapping().ok_or_else(|| {
        ConversionError::InvalidPipeline("rule condition must be a mapping".to_string())
    })?;

    let type_str = obj
        .get(ykey("type"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ConversionError::InvalidPipeline("rule condition must have a 'type' field".to_string())
        })?;

    match type_str {
        "logsource" => {
            let spec = LogSource {
                category: obj
                    .get(ykey("category"))
                    .and_then(|v| v.as_str())
                    .map(String::from),
                product: obj
                    .get(ykey("product"))
                    .and_then(|v| v.as_str())
                    .map(String::from),
                service: obj
                    .get(ykey("service"))
                    .and_then(|v| v.as_str())
                    .map(String::from),
                custom: Default::default(),
            };
            Ok(RuleCondition::Logsource { spec })
        }

        "rule_id" => {
            let ids = parse_string_list(obj.get(ykey("ids")).or_else(|| obj.get(ykey("rules"))));
            Ok(RuleCondition::RuleId { ids })
        }

        "contains_field_match" => {
            let field = obj
                .get(ykey("field"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let value = obj
                .get(ykey("value"))
                .and_then(|v| v.as_str())
                .map(String::from);
            Ok(RuleCondition::ContainsFieldMatch { field, value })
        }

        "processing_item_applied" => {
            let id = obj
                .get(ykey("processing_item_id"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Ok(RuleCondition::ProcessingItemApplied {
                processing_item_id: id,
            })
        }

        "processing_state" => {
            let key = obj
                .get(ykey("key"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let val = obj
                .get(ykey("val"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Ok(RuleCondition::ProcessingState { key, val })
        }

        "rule_attribute" => {
            let attribute = obj
                .get(ykey("attribute"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let value = obj
                .get(ykey("value"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Ok(RuleCondition::RuleAttribute { attribute, value })
        }

        "tag" => {
            let tag = obj
                .get(ykey("tag"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Ok(RuleCondition::Tag { tag })
        }

        other => Err(ConversionError::InvalidPipeline(format!(
            "unknown rule condition type: {other}"
        ))),
    }
}

fn parse_field_conditions(value: &serde_yaml::Value) -> Result<Vec<FieldCondition>> {
    let items = value.as_sequence().ok_or_else(|| {
        ConversionError::InvalidPipeline("field_conditions must be a sequence".to_string())
    })?;

    items.iter().map(parse_field_condition).collect()
}

fn parse_field_condition(value: &serde_yaml::Value) -> Result<FieldCondition> {
    let obj = value.as_mapping().ok_or_else(|| {
        ConversionError::InvalidPipeline("field condition must be a mapping".to_string())
    })?;

    let type_str = obj
        .get(ykey("type"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ConversionError::InvalidPipeline("field condition must have a 'type' field".to_string())
        })?;

    let match_type_str = obj
        .get(ykey("match_type"))
        .and_then(|v| v.as_str())
        .unwrap_or("plain");
    let is_regex = matches!(match_type_str, "regex" | "re");

    match type_str {
        "include_fields" => {
            let fields = parse_string_list(obj.get(ykey("fields")));
            let matcher = build_field_matcher(fields, is_regex)?;
            Ok(FieldCondition::IncludeFields { matcher })
        }

        "exclude_fields" => {
            let fields = parse_string_list(obj.get(ykey("fields")));
            let matcher = build_field_matcher(fields, is_regex)?;
            Ok(FieldCondition::ExcludeFields { matcher })
        }

        "match_value" => {
            let pattern = obj
                .get(ykey("pattern"))
                .and_then(|v| v.as_str())
                .unwrap_or(".*")
                .to_string();
            let negate = obj
                .get(ykey("negate"))
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let regex = Regex::new(&pattern).map_err(|e| {
                ConversionError::InvalidPipeline(format!(
                    "invalid match_value regex '{pattern}': {e}"
                ))
            })?;
            Ok(FieldCondition::MatchValue { regex, negate })
        }

        "processing_state" => {
            let key = obj
                .get(ykey("key"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let val = obj
                .get(ykey("val"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Ok(FieldCondition::ProcessingState { key, val })
        }

        other => Err(ConversionError::InvalidPipeline(format!(
            "unknown field condition type: {other}"
        ))),
    }
}

// =============================================================================
// YAML parsing helpers
// =============================================================================

fn parse_string_mapping(
    value: Option<&serde_yaml::Value>,
) -> std::collections::HashMap<String, String> {
    let mut map = std::collections::HashMap::new();
    if let Some(serde_yaml::Value::Mapping(m)) = value {
        for (k, v) in m {
            if let (Some(key), Some(val)) = (k.as_str(), v.as_str()) {
                map.insert(key.to_string(), val.to_string());
            }
        }
    }
    map
}

fn parse_string_list(value: Option<&serde_yaml::Value>) -> Vec<String> {
    match value {
        Some(serde_yaml::Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|item| item.as_str().map(String::from))
            .collect(),
        Some(serde_yaml::Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn build_field_matcher(fields: Vec<String>, is_regex: bool) -> Result<FieldMatcher> {
    if is_regex {
        let regexes = fields
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    ConversionError::InvalidPipeline(format!("invalid field regex '{p}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(FieldMatcher::Regex(regexes))
    } else {
        Ok(FieldMatcher::Plain(fields))
    }
}

// =============================================================================
// Tests
// =============================================================================
