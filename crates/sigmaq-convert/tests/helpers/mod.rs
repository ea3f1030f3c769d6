use sigmaq_convert::{
    ProcessingItem, ProcessingPipeline, QueryContract, RuleCondition, TextQueryBackend,
    Transformation,
};
use sigmaq_parser::{LogSource, SigmaCollection, SigmaFilter, parse_sigma_yaml};

/// Simplified test contract: `startswith` rendered with the equals template,
/// so exclusion clauses read as plain comparisons.
pub fn test_contract() -> QueryContract {
    QueryContract {
        startswith_template: Some("{field}={value}".to_string()),
        ..QueryContract::default()
    }
}

/// The canonical failed-login rule targeted by the administrator filter.
pub fn rule_collection() -> SigmaCollection {
    parse_sigma_yaml(
        r#"
title: Failed login
name: failed_login
id: 6f3e2987-db24-4c78-a860-b4f4095a7095
logsource:
    category: process_creation
    product: windows
detection:
    selection:
        - EventID: 4625
        - EventID2: 4624
    condition: selection
"#,
    )
    .unwrap()
}

/// The administrator-account filter fixture.
pub fn admin_filter() -> SigmaFilter {
    parse_sigma_yaml(
        r#"
title: Filter Administrator account
description: The valid administrator account start with adm_
logsource:
    category: process_creation
    product: windows
global_filter:
  rules:
    - 6f3e2987-db24-4c78-a860-b4f4095a7095 # Data Compressed - rar.exe
    - df0841c0-9846-4e9f-ad8a-7df91571771b # Login on jump host
  selection:
      User|startswith: 'adm_'
  condition: selection
"#,
    )
    .unwrap()
    .filters
    .remove(0)
}

/// Pipeline item normalizing the `adm_` account prefix to the canonical
/// `Admin` spelling, scoped to the Windows process-creation logsource.
pub fn account_rename_item() -> ProcessingItem {
    ProcessingItem::with_rule_conditions(
        Transformation::ReplaceString {
            regex: "^adm_$".to_string(),
            replacement: "Admin".to_string(),
        },
        vec![RuleCondition::Logsource {
            spec: LogSource {
                category: Some("process_creation".to_string()),
                product: Some("windows".to_string()),
                ..Default::default()
            },
        }],
    )
}

/// A test backend with the simplified contract and the given pipeline items.
pub fn test_backend(items: Vec<ProcessingItem>) -> TextQueryBackend {
    TextQueryBackend::new(
        test_contract(),
        ProcessingPipeline::from_items("test", items),
    )
}
