mod helpers;

use helpers::test_backend;
use sigmaq_convert::{ConversionError, QueryContract, TextQueryBackend};
use sigmaq_parser::parse_sigma_yaml;

fn convert_one(yaml: &str) -> String {
    let collection = parse_sigma_yaml(yaml).unwrap();
    let backend = TextQueryBackend::default();
    let mut result = backend.convert(&collection);
    assert!(result.failures.is_empty(), "failures: {:?}", result.failures);
    assert_eq!(result.queries.len(), 1);
    result.queries.remove(0)
}

#[test]
fn convert_simple_selection() {
    let query = convert_one(
        r#"
title: Whoami
logsource:
    product: windows
    category: process_creation
detection:
    selection:
        CommandLine|contains: 'whoami'
    condition: selection
"#,
    );
    assert_eq!(query, r#"CommandLine contains "whoami""#);
}

#[test]
fn convert_and_linked_fields() {
    let query = convert_one(
        r#"
title: Two fields
logsource:
    category: test
detection:
    selection:
        EventID: 4625
        User|startswith: 'adm_'
    condition: selection
"#,
    );
    assert_eq!(query, r#"EventID=4625 and User startswith "adm_""#);
}

#[test]
fn convert_condition_with_negated_selection() {
    let query = convert_one(
        r#"
title: With filter selection
logsource:
    category: test
detection:
    selection:
        EventID: 1
    filter_system:
        User: SYSTEM
    condition: selection and not filter_system
"#,
    );
    assert_eq!(query, r#"EventID=1 and not User="SYSTEM""#);
}

#[test]
fn convert_negated_multi_field_selection_parenthesizes() {
    let query = convert_one(
        r#"
title: Negated compound
logsource:
    category: test
detection:
    selection:
        EventID: 1
    filter_main:
        User: SYSTEM
        Host: dc01
    condition: selection and not filter_main
"#,
    );
    assert_eq!(query, r#"EventID=1 and not (User="SYSTEM" and Host="dc01")"#);
}

#[test]
fn convert_keyword_detection() {
    let query = convert_one(
        r#"
title: Keywords
logsource:
    category: test
detection:
    keywords:
        - 'suspicious'
        - 'malware'
    condition: keywords
"#,
    );
    assert_eq!(query, r#""suspicious" or "malware""#);
}

#[test]
fn convert_selector_condition() {
    let query = convert_one(
        r#"
title: Selector
logsource:
    category: test
detection:
    selection_a:
        FieldA: 1
    selection_b:
        FieldB: 2
    condition: 1 of selection_*
"#,
    );
    assert_eq!(query, "FieldA=1 or FieldB=2");
}

#[test]
fn convert_multiple_condition_strings_yield_multiple_queries() {
    let collection = parse_sigma_yaml(
        r#"
title: Two conditions
logsource:
    category: test
detection:
    selection1:
        EventID: 1
    selection2:
        EventID: 2
    condition:
        - selection1
        - selection2
"#,
    )
    .unwrap();
    let backend = TextQueryBackend::default();
    let result = backend.convert(&collection);
    assert_eq!(
        result.queries,
        vec!["EventID=1".to_string(), "EventID=2".to_string()]
    );
}

#[test]
fn conversion_is_deterministic_across_calls() {
    let collection = parse_sigma_yaml(
        r#"
title: Determinism
logsource:
    category: test
detection:
    sel_b:
        FieldB: 2
    sel_a:
        FieldA: 1
    sel_c:
        FieldC: 3
    condition: all of them
"#,
    )
    .unwrap();
    let backend = TextQueryBackend::default();
    let first = backend.convert(&collection).queries;
    assert_eq!(first, vec!["FieldA=1 and FieldB=2 and FieldC=3".to_string()]);
    for _ in 0..5 {
        assert_eq!(backend.convert(&collection).queries, first);
    }
}

#[test]
fn unsupported_operator_fails_only_affected_rule() {
    let collection = parse_sigma_yaml(
        r#"
title: Uses contains
name: contains_rule
logsource:
    category: test
detection:
    selection:
        CommandLine|contains: 'whoami'
    condition: selection
---
title: Plain equals
name: equals_rule
logsource:
    category: test
detection:
    selection:
        EventID: 1
    condition: selection
"#,
    )
    .unwrap();

    let backend = TextQueryBackend {
        contract: QueryContract {
            contains_template: None,
            ..QueryContract::default()
        },
        ..TextQueryBackend::default()
    };

    let result = backend.convert(&collection);
    assert_eq!(result.queries, vec!["EventID=1".to_string()]);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].rule, "contains_rule");
    assert!(matches!(
        result.failures[0].error,
        ConversionError::UnsupportedOperator { ref field, .. } if field == "CommandLine"
    ));
}

#[test]
fn unknown_identifier_fails_only_affected_rule() {
    let collection = parse_sigma_yaml(
        r#"
title: Dangling reference
name: dangling
logsource:
    category: test
detection:
    selection:
        EventID: 1
    condition: missing_selection
---
title: Fine
logsource:
    category: test
detection:
    selection:
        EventID: 2
    condition: selection
"#,
    )
    .unwrap();

    let backend = TextQueryBackend::default();
    let result = backend.convert(&collection);
    assert_eq!(result.queries, vec!["EventID=2".to_string()]);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].rule, "dangling");
    assert!(matches!(
        result.failures[0].error,
        ConversionError::UnknownIdentifier(_)
    ));
}

#[test]
fn load_errors_surface_in_conversion_failures() {
    let collection = parse_sigma_yaml(
        r#"
title: Broken
name: broken_rule
logsource:
    category: test
detection:
    selection:
        Field|nosuchmodifier: 1
    condition: selection
---
title: Fine
logsource:
    category: test
detection:
    selection:
        EventID: 2
    condition: selection
"#,
    )
    .unwrap();

    let backend = TextQueryBackend::default();
    let result = backend.convert(&collection);
    assert_eq!(result.queries, vec!["EventID=2".to_string()]);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].rule, "broken_rule");
}

#[test]
fn singleton_sequence_selection_renders_without_stray_parens() {
    // Disjunction-of-conjunction structure is preserved through compilation,
    // but a singleton group renders transparently.
    let query = convert_one(
        r#"
title: Singleton
logsource:
    category: test
detection:
    selection:
        - EventID: 4625
    condition: selection
"#,
    );
    assert_eq!(query, "EventID=4625");
}

#[test]
fn backend_pipeline_state_is_isolated_per_backend_call() {
    // Two conversions with differently-configured pipelines do not interfere.
    let collection = helpers::rule_collection();

    let plain = TextQueryBackend::default();
    let filtered = test_backend(vec![
        sigmaq_convert::to_processing_item(&helpers::admin_filter()).unwrap(),
        helpers::account_rename_item(),
    ]);

    let plain_queries = plain.convert(&collection).queries;
    let filtered_queries = filtered.convert(&collection).queries;
    assert_eq!(
        plain_queries,
        vec!["EventID=4625 or EventID2=4624".to_string()]
    );
    assert_ne!(plain_queries, filtered_queries);
    // And the plain backend still renders the same afterwards.
    assert_eq!(plain.convert(&collection).queries, plain_queries);
}
