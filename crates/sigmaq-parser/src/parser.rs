//! Main YAML → AST parser for Sigma rules, filters, and collections.
//!
//! Handles:
//! - Single-document YAML (one rule)
//! - Multi-document YAML (--- separator, action: global/reset/repeat)
//! - Detection section parsing (named detections, field modifiers, values)
//! - Filter document parsing (`global_filter` section)
//! - Directory-based rule collection loading
//!
//! Per-document failures are collected into `SigmaCollection::errors` instead
//! of aborting the whole load, so a collection can partially succeed.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::ast::*;
use crate::condition::parse_condition;
use crate::error::{Result, SigmaParserError};
use crate::value::SigmaValue;

// =============================================================================
// Public API
// =============================================================================

/// Parse a YAML string containing one or more Sigma documents.
///
/// Handles multi-document YAML (separated by `---`) and collection actions
/// (`action: global`, `action: reset`, `action: repeat`).
pub fn parse_sigma_yaml(yaml: &str) -> Result<SigmaCollection> {
    let mut collection = SigmaCollection::new();
    let mut global: Option<Value> = None;
    let mut previous: Option<Value> = None;

    for doc in serde_yaml::Deserializer::from_str(yaml) {
        let value: Value = match Value::deserialize(doc) {
            Ok(v) => v,
            Err(e) => {
                collection.errors.push(LoadError {
                    identity: None,
                    message: format!("YAML parse error: {e}"),
                });
                continue;
            }
        };

        let Some(mapping) = value.as_mapping() else {
            collection.errors.push(LoadError {
                identity: None,
                message: "Document is not a YAML mapping".to_string(),
            });
            continue;
        };

        // Check for collection action
        if let Some(action_val) = mapping.get(val_key("action")) {
            let action = action_val.as_str().unwrap_or("");
            match action {
                "global" => {
                    let mut global_map = value.clone();
                    if let Some(m) = global_map.as_mapping_mut() {
                        m.remove(val_key("action"));
                    }
                    global = Some(global_map);
                    continue;
                }
                "reset" => {
                    global = None;
                    continue;
                }
                "repeat" => {
                    // Merge current document onto the previous document
                    if let Some(ref prev) = previous {
                        let mut repeat_val = value.clone();
                        if let Some(m) = repeat_val.as_mapping_mut() {
                            m.remove(val_key("action"));
                        }
                        let merged_repeat = deep_merge(prev.clone(), repeat_val);

                        // Apply global template if present
                        let final_val = if let Some(ref global_val) = global {
                            deep_merge(global_val.clone(), merged_repeat)
                        } else {
                            merged_repeat
                        };

                        previous = Some(final_val.clone());
                        push_document(&mut collection, &final_val);
                    } else {
                        collection.errors.push(LoadError {
                            identity: document_identity(&value),
                            message: "'action: repeat' without a previous document".to_string(),
                        });
                    }
                    continue;
                }
                other => {
                    collection.errors.push(LoadError {
                        identity: document_identity(&value),
                        message: format!("Unknown collection action: {other}"),
                    });
                    continue;
                }
            }
        }

        // Merge with global template if present
        let merged = if let Some(ref global_val) = global {
            deep_merge(global_val.clone(), value)
        } else {
            value
        };

        // Track previous document for `action: repeat`
        previous = Some(merged.clone());

        push_document(&mut collection, &merged);
    }

    Ok(collection)
}

/// Parse a single Sigma YAML file from a path.
pub fn parse_sigma_file(path: &Path) -> Result<SigmaCollection> {
    let content = std::fs::read_to_string(path)?;
    parse_sigma_yaml(&content)
}

/// Parse all Sigma YAML files from a directory (recursively).
pub fn parse_sigma_directory(dir: &Path) -> Result<SigmaCollection> {
    let mut collection = SigmaCollection::new();

    fn walk(dir: &Path, collection: &mut SigmaCollection) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                walk(&path, collection)?;
            } else if matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml" | "yaml")
            ) {
                match parse_sigma_file(&path) {
                    Ok(sub) => {
                        collection.rules.extend(sub.rules);
                        collection.filters.extend(sub.filters);
                        collection.errors.extend(sub.errors);
                    }
                    Err(e) => {
                        collection.errors.push(LoadError {
                            identity: Some(path.display().to_string()),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    walk(dir, &mut collection)?;
    Ok(collection)
}

// =============================================================================
// Document type detection and dispatch
// =============================================================================

/// Parse a document and push the result (or a keyed load error) onto the
/// collection.
fn push_document(collection: &mut SigmaCollection, value: &Value) {
    match parse_document(value) {
        Ok(SigmaDocument::Rule(rule)) => collection.rules.push(rule),
        Ok(SigmaDocument::Filter(filter)) => collection.filters.push(filter),
        Err(e) => {
            collection.errors.push(LoadError {
                identity: document_identity(value),
                message: e.to_string(),
            });
        }
    }
}

/// A single parsed document from a Sigma YAML file.
enum SigmaDocument {
    Rule(SigmaRule),
    Filter(SigmaFilter),
}

/// Parse a single YAML value into the appropriate Sigma document type.
///
/// A document with a `global_filter` (or legacy `filter`) section is a filter;
/// everything else is a detection rule.
fn parse_document(value: &Value) -> Result<SigmaDocument> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| SigmaParserError::InvalidRule("Document is not a YAML mapping".into()))?;

    if mapping.contains_key(val_key("global_filter")) || mapping.contains_key(val_key("filter")) {
        parse_filter(value).map(SigmaDocument::Filter)
    } else {
        parse_detection_rule(value).map(SigmaDocument::Rule)
    }
}

/// Extract whatever identity a raw document carries (id, name, or title), for
/// keying load errors.
fn document_identity(value: &Value) -> Option<String> {
    let m = value.as_mapping()?;
    get_str(m, "id")
        .or_else(|| get_str(m, "name"))
        .or_else(|| get_str(m, "title"))
        .map(|s| s.to_string())
}

// =============================================================================
// Detection Rule Parsing
// =============================================================================

/// Parse a detection rule from a YAML value.
fn parse_detection_rule(value: &Value) -> Result<SigmaRule> {
    let m = value
        .as_mapping()
        .ok_or_else(|| SigmaParserError::InvalidRule("Expected a YAML mapping".into()))?;

    let title = get_str(m, "title")
        .ok_or_else(|| SigmaParserError::MissingField("title".into()))?
        .to_string();

    let detection_val = m
        .get(val_key("detection"))
        .ok_or_else(|| SigmaParserError::MissingField("detection".into()))?;
    let detection = parse_detections(detection_val)?;

    let logsource = m
        .get(val_key("logsource"))
        .map(parse_logsource)
        .transpose()?
        .unwrap_or_default();

    Ok(SigmaRule {
        title,
        logsource,
        detection,
        id: get_str(m, "id").map(|s| s.to_string()),
        name: get_str(m, "name").map(|s| s.to_string()),
        status: get_str(m, "status").and_then(Status::from_str),
        description: get_str(m, "description").map(|s| s.to_string()),
        author: get_str(m, "author").map(|s| s.to_string()),
        references: get_str_list(m, "references"),
        date: get_str(m, "date").map(|s| s.to_string()),
        modified: get_str(m, "modified").map(|s| s.to_string()),
        fields: get_str_list(m, "fields"),
        falsepositives: get_str_or_str_list(m, "falsepositives"),
        level: get_str(m, "level").and_then(Level::from_str),
        tags: get_str_list(m, "tags"),
    })
}

// =============================================================================
// Detection Section Parsing
// =============================================================================

/// Parse a `detection:`-style section: named detections plus a condition.
///
/// The section contains:
/// - `condition`: string or list of strings
/// - Everything else: named detection identifiers
fn parse_detections(value: &Value) -> Result<Detections> {
    let m = value.as_mapping().ok_or_else(|| {
        SigmaParserError::InvalidDetection("Detection section must be a mapping".into())
    })?;

    // Extract condition (required)
    let condition_val = m
        .get(val_key("condition"))
        .ok_or_else(|| SigmaParserError::MissingField("condition".into()))?;

    let condition_strings = match condition_val {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        _ => {
            return Err(SigmaParserError::InvalidDetection(
                "condition must be a string or list of strings".into(),
            ));
        }
    };

    // Parse each condition string
    let conditions: Vec<ConditionExpr> = condition_strings
        .iter()
        .map(|s| parse_condition(s))
        .collect::<Result<Vec<_>>>()?;

    // Parse all named detections (everything except condition)
    let mut named = HashMap::new();
    for (key, val) in m {
        let key_str = key.as_str().unwrap_or("");
        if key_str == "condition" {
            continue;
        }
        named.insert(key_str.to_string(), parse_detection(val)?);
    }

    Ok(Detections {
        named,
        conditions,
        condition_strings,
    })
}

/// Parse a single named detection definition.
///
/// A detection can be:
/// 1. A mapping (key-value pairs, AND-linked)
/// 2. A list of plain values (keyword detection)
/// 3. A list of mappings (OR-linked sub-detections)
fn parse_detection(value: &Value) -> Result<Detection> {
    match value {
        Value::Mapping(m) => {
            // Case 1: key-value mapping → AND-linked detection items
            let items: Vec<DetectionItem> = m
                .iter()
                .map(|(k, v)| parse_detection_item(k.as_str().unwrap_or(""), v))
                .collect::<Result<Vec<_>>>()?;
            Ok(Detection::AllOf(items))
        }
        Value::Sequence(seq) => {
            // Check if all items are plain values (strings/numbers/etc.)
            let all_plain = seq.iter().all(|v| !v.is_mapping() && !v.is_sequence());
            if all_plain {
                // Case 2: list of plain values → keyword detection
                let values = seq.iter().map(SigmaValue::from_yaml).collect();
                Ok(Detection::Keywords(values))
            } else {
                // Case 3: list of mappings → OR-linked sub-detections
                let subs: Vec<Detection> = seq
                    .iter()
                    .map(parse_detection)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Detection::AnyOf(subs))
            }
        }
        // Plain value → single keyword
        _ => Ok(Detection::Keywords(vec![SigmaValue::from_yaml(value)])),
    }
}

/// Parse a single detection item from a key-value pair.
///
/// The key contains the field name and optional modifiers separated by `|`:
/// - `EventType` → field="EventType", no modifiers
/// - `TargetObject|endswith` → field="TargetObject", modifiers=[EndsWith]
/// - `Destination|contains|all` → field="Destination", modifiers=[Contains, All]
fn parse_detection_item(key: &str, value: &Value) -> Result<DetectionItem> {
    let field = parse_field_spec(key)?;

    let values = match value {
        Value::Sequence(seq) => seq.iter().map(|v| to_sigma_value(v, &field)).collect(),
        _ => vec![to_sigma_value(value, &field)],
    };

    Ok(DetectionItem { field, values })
}

/// Convert a YAML value to a SigmaValue, respecting field modifiers.
///
/// When the `re` modifier is present, strings are treated as raw (no wildcard
/// parsing).
fn to_sigma_value(v: &Value, field: &FieldSpec) -> SigmaValue {
    if field.has_modifier(Modifier::Re)
        && let Value::String(s) = v
    {
        return SigmaValue::from_raw_string(s);
    }
    SigmaValue::from_yaml(v)
}

/// Parse a field specification string like `"TargetObject|endswith"`.
pub fn parse_field_spec(key: &str) -> Result<FieldSpec> {
    if key.is_empty() {
        return Ok(FieldSpec::new(None, Vec::new()));
    }

    let parts: Vec<&str> = key.split('|').collect();
    let field_name = parts[0];
    let field = if field_name.is_empty() {
        None
    } else {
        Some(field_name.to_string())
    };

    let mut modifiers = Vec::new();
    for &mod_str in &parts[1..] {
        let m = Modifier::from_str(mod_str)
            .ok_or_else(|| SigmaParserError::UnknownModifier(mod_str.to_string()))?;
        modifiers.push(m);
    }

    Ok(FieldSpec::new(field, modifiers))
}

// =============================================================================
// Log Source Parsing
// =============================================================================

fn parse_logsource(value: &Value) -> Result<LogSource> {
    let m = value
        .as_mapping()
        .ok_or_else(|| SigmaParserError::InvalidRule("logsource must be a mapping".into()))?;

    let mut custom = HashMap::new();
    let known_keys = ["category", "product", "service", "definition"];

    for (k, v) in m {
        let key_str = k.as_str().unwrap_or("");
        if !known_keys.contains(&key_str)
            && let Some(val_str) = v.as_str()
        {
            custom.insert(key_str.to_string(), val_str.to_string());
        }
    }

    Ok(LogSource {
        category: get_str(m, "category").map(|s| s.to_string()),
        product: get_str(m, "product").map(|s| s.to_string()),
        service: get_str(m, "service").map(|s| s.to_string()),
        custom,
    })
}

// =============================================================================
// Filter Parsing
// =============================================================================

/// Parse a filter document.
///
/// The `global_filter` section carries the targeted rule references plus the
/// filter's own selections and condition:
///
/// ```yaml
/// title: Filter Administrator account
/// logsource:
///     category: process_creation
///     product: windows
/// global_filter:
///   rules:
///     - 6f3e2987-db24-4c78-a860-b4f4095a7095
///   selection:
///       User|startswith: 'adm_'
///   condition: selection
/// ```
fn parse_filter(value: &Value) -> Result<SigmaFilter> {
    let m = value
        .as_mapping()
        .ok_or_else(|| SigmaParserError::InvalidFilter("Expected a YAML mapping".into()))?;

    let title = get_str(m, "title")
        .ok_or_else(|| SigmaParserError::MissingField("title".into()))?
        .to_string();

    let filter_val = m
        .get(val_key("global_filter"))
        .or_else(|| m.get(val_key("filter")))
        .ok_or_else(|| SigmaParserError::MissingField("global_filter".into()))?;
    let fm = filter_val.as_mapping().ok_or_else(|| {
        SigmaParserError::InvalidFilter("global_filter must be a mapping".into())
    })?;

    let rules = match fm.get(val_key("rules")) {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        None => Vec::new(),
        _ => {
            return Err(SigmaParserError::InvalidFilter(
                "global_filter rules must be a list of rule references".into(),
            ));
        }
    };

    // The remainder of the global_filter section (selections + condition)
    // parses exactly like a rule's detection section.
    let mut detection_map = serde_yaml::Mapping::new();
    for (k, v) in fm {
        if k.as_str() != Some("rules") {
            detection_map.insert(k.clone(), v.clone());
        }
    }
    let detection = parse_detections(&Value::Mapping(detection_map))?;

    let logsource = m
        .get(val_key("logsource"))
        .map(parse_logsource)
        .transpose()?
        .unwrap_or_default();

    Ok(SigmaFilter {
        title,
        id: get_str(m, "id").map(|s| s.to_string()),
        name: get_str(m, "name").map(|s| s.to_string()),
        status: get_str(m, "status").and_then(Status::from_str),
        description: get_str(m, "description").map(|s| s.to_string()),
        author: get_str(m, "author").map(|s| s.to_string()),
        date: get_str(m, "date").map(|s| s.to_string()),
        modified: get_str(m, "modified").map(|s| s.to_string()),
        logsource,
        filter: GlobalFilter { rules, detection },
    })
}

// =============================================================================
// YAML Helpers
// =============================================================================

fn val_key(s: &str) -> Value {
    Value::String(s.to_string())
}

fn get_str<'a>(m: &'a serde_yaml::Mapping, key: &str) -> Option<&'a str> {
    m.get(val_key(key)).and_then(|v| v.as_str())
}

fn get_str_list(m: &serde_yaml::Mapping, key: &str) -> Vec<String> {
    match m.get(val_key(key)) {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

fn get_str_or_str_list(m: &serde_yaml::Mapping, key: &str) -> Vec<String> {
    match m.get(val_key(key)) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Deep-merge two YAML values (src overrides dest, recursively for mappings).
fn deep_merge(dest: Value, src: Value) -> Value {
    match (dest, src) {
        (Value::Mapping(mut dest_map), Value::Mapping(src_map)) => {
            for (k, v) in src_map {
                let merged = if let Some(existing) = dest_map.remove(&k) {
                    deep_merge(existing, v)
                } else {
                    v
                };
                dest_map.insert(k, merged);
            }
            Value::Mapping(dest_map)
        }
        (_, src) => src, // non-mapping: source wins
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_rule() {
        let yaml = r#"
title: Test Rule
id: 12345678-1234-1234-1234-123456789012
status: test
logsource:
    product: windows
    category: process_creation
detection:
    selection:
        CommandLine|contains: 'whoami'
    condition: selection
level: medium
"#;
        let collection = parse_sigma_yaml(yaml).unwrap();
        assert_eq!(collection.rules.len(), 1);

        let rule = &collection.rules[0];
        assert_eq!(rule.title, "Test Rule");
        assert_eq!(rule.logsource.product, Some("windows".to_string()));
        assert_eq!(
            rule.logsource.category,
            Some("process_creation".to_string())
        );
        assert_eq!(rule.level, Some(Level::Medium));
        assert_eq!(rule.detection.conditions.len(), 1);
        assert_eq!(
            rule.detection.conditions[0],
            ConditionExpr::Identifier("selection".to_string())
        );
        assert!(rule.detection.named.contains_key("selection"));
    }

    #[test]
    fn test_parse_field_modifiers() {
        let spec = parse_field_spec("TargetObject|endswith").unwrap();
        assert_eq!(spec.name, Some("TargetObject".to_string()));
        assert_eq!(spec.modifiers, vec![Modifier::EndsWith]);

        let spec = parse_field_spec("Destination|contains|all").unwrap();
        assert_eq!(spec.name, Some("Destination".to_string()));
        assert_eq!(spec.modifiers, vec![Modifier::Contains, Modifier::All]);

        let spec = parse_field_spec("Details|re").unwrap();
        assert_eq!(spec.name, Some("Details".to_string()));
        assert_eq!(spec.modifiers, vec![Modifier::Re]);
    }

    #[test]
    fn test_parse_detection_or_linked() {
        let yaml = r#"
title: OR-linked detections
logsource:
    product: windows
    category: wmi_event
detection:
    selection:
        - Destination|contains|all:
              - 'new-object'
              - 'net.webclient'
        - Destination|contains:
              - 'WScript.Shell'
    condition: selection
level: high
"#;
        let collection = parse_sigma_yaml(yaml).unwrap();
        let rule = &collection.rules[0];
        let detection = &rule.detection.named["selection"];

        match detection {
            Detection::AnyOf(subs) => {
                assert_eq!(subs.len(), 2);
            }
            _ => panic!("Expected AnyOf detection, got {detection:?}"),
        }
    }

    #[test]
    fn test_parse_singleton_list_stays_or_linked() {
        // A one-element list of mappings is still AnyOf, never collapsed
        let yaml = r#"
title: Singleton list
logsource:
    category: test
detection:
    selection:
        - EventID: 4625
    condition: selection
"#;
        let collection = parse_sigma_yaml(yaml).unwrap();
        let rule = &collection.rules[0];
        match &rule.detection.named["selection"] {
            Detection::AnyOf(subs) => {
                assert_eq!(subs.len(), 1);
                assert!(matches!(subs[0], Detection::AllOf(_)));
            }
            other => panic!("Expected AnyOf detection, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_keyword_detection() {
        let yaml = r#"
title: Keyword Rule
logsource:
    category: test
detection:
    keywords:
        - 'suspicious'
        - 'malware'
    condition: keywords
level: high
"#;
        let collection = parse_sigma_yaml(yaml).unwrap();
        let rule = &collection.rules[0];
        let det = &rule.detection.named["keywords"];
        match det {
            Detection::Keywords(vals) => assert_eq!(vals.len(), 2),
            _ => panic!("Expected Keywords detection"),
        }
    }

    #[test]
    fn test_parse_global_action() {
        let yaml = r#"
action: global
title: Global Rule
logsource:
    product: windows
---
detection:
    selection:
        EventID: 1
    condition: selection
level: high
---
detection:
    selection:
        EventID: 2
    condition: selection
level: medium
"#;
        let collection = parse_sigma_yaml(yaml).unwrap();
        assert_eq!(collection.rules.len(), 2);
        assert_eq!(collection.rules[0].title, "Global Rule");
        assert_eq!(collection.rules[1].title, "Global Rule");
    }

    #[test]
    fn test_action_repeat() {
        let yaml = r#"
title: Base Rule
logsource:
    product: windows
    category: process_creation
detection:
    selection:
        CommandLine|contains: 'whoami'
    condition: selection
level: medium
---
action: repeat
title: Repeated Rule
detection:
    selection:
        CommandLine|contains: 'ipconfig'
    condition: selection
"#;
        let collection = parse_sigma_yaml(yaml).unwrap();
        assert_eq!(collection.rules.len(), 2);
        assert!(
            collection.errors.is_empty(),
            "errors: {:?}",
            collection.errors
        );

        assert_eq!(collection.rules[0].title, "Base Rule");
        assert_eq!(collection.rules[1].title, "Repeated Rule");
        // Logsource and level are inherited from the previous document
        assert_eq!(
            collection.rules[1].logsource.product,
            Some("windows".to_string())
        );
        assert_eq!(collection.rules[1].level, Some(Level::Medium));
    }

    #[test]
    fn test_parse_filter_document() {
        let yaml = r#"
title: Filter Administrator account
description: The valid administrator account start with adm_
logsource:
    category: process_creation
    product: windows
global_filter:
  rules:
    - 6f3e2987-db24-4c78-a860-b4f4095a7095
    - df0841c0-9846-4e9f-ad8a-7df91571771b
  selection:
      User|startswith: 'adm_'
  condition: selection
"#;
        let collection = parse_sigma_yaml(yaml).unwrap();
        assert_eq!(collection.rules.len(), 0);
        assert_eq!(collection.filters.len(), 1);

        let filter = &collection.filters[0];
        assert_eq!(filter.title, "Filter Administrator account");
        assert_eq!(
            filter.description.as_deref(),
            Some("The valid administrator account start with adm_")
        );
        assert_eq!(
            filter.logsource.category,
            Some("process_creation".to_string())
        );
        assert_eq!(filter.filter.rules.len(), 2);
        assert!(filter.filter.detection.named.contains_key("selection"));
        assert_eq!(
            filter.filter.detection.conditions[0],
            ConditionExpr::Identifier("selection".to_string())
        );
    }

    #[test]
    fn test_parse_filter_without_rules_list() {
        let yaml = r#"
title: Broad filter
logsource:
    product: windows
global_filter:
  selection:
      User: SYSTEM
  condition: selection
"#;
        let collection = parse_sigma_yaml(yaml).unwrap();
        assert_eq!(collection.filters.len(), 1);
        assert!(collection.filters[0].filter.rules.is_empty());
    }

    #[test]
    fn test_unknown_modifier_error() {
        let result = parse_field_spec("field|foobar");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_condition_is_error() {
        let yaml = r#"
title: No Condition
logsource:
    category: test
detection:
    selection:
        EventID: 1
"#;
        let collection = parse_sigma_yaml(yaml).unwrap();
        assert_eq!(collection.rules.len(), 0);
        assert_eq!(collection.errors.len(), 1);
        assert!(collection.errors[0].message.contains("condition"));
    }

    #[test]
    fn test_errors_keyed_by_identity() {
        let yaml = r#"
title: Valid Rule
logsource:
    product: windows
detection:
    selection:
        CommandLine|contains: test
    condition: selection
---
title: Broken Rule
name: broken_rule
logsource:
    product: windows
detection:
    selection:
        CommandLine|badmodifier: test
    condition: selection
"#;
        let collection = parse_sigma_yaml(yaml).unwrap();
        assert_eq!(collection.rules.len(), 1);
        assert_eq!(collection.errors.len(), 1);
        assert_eq!(
            collection.errors[0].identity.as_deref(),
            Some("broken_rule")
        );
    }
}
