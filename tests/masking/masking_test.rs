use std::collections::HashSet;
use std::sync::Arc;

use dataport::masking::{FieldProjector, MaskingService, DEFAULT_MASK};
use dataport::model::{FieldDefinition, MaskingConfig, MaskingType, Row};
use serde_json::{json, Value};

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

#[test]
fn test_disabled_passes_through() {
    let masking = MaskingService::new();
    let config = MaskingConfig {
        enabled: false,
        ..MaskingConfig::fixed(Some("X"))
    };
    assert_eq!(masking.apply("secret", &config), "secret");
    assert_eq!(masking.apply_value(&json!(42), &config), json!(42));
}

#[test]
fn test_fixed() {
    let masking = MaskingService::new();
    assert_eq!(masking.apply("anything", &MaskingConfig::fixed(None)), DEFAULT_MASK);
    assert_eq!(
        masking.apply("SecretData", &MaskingConfig::fixed(Some("CONFIDENTIAL"))),
        "CONFIDENTIAL"
    );
}

#[test]
fn test_regex() {
    let masking = MaskingService::new();
    assert_eq!(
        masking.apply("555-123-4567", &MaskingConfig::regex(r"\d", "#")),
        "###-###-####"
    );
    assert_eq!(
        masking.apply("card 4111111111111111", &MaskingConfig::regex(r"\d{12}(\d{4})", "XXXX$1")),
        "card XXXX1111"
    );
    // digits and word characters after a group reference are literal
    assert_eq!(
        masking.apply("5551234", &MaskingConfig::regex(r"(\d{3})\d{4}", "$1XXXX")),
        "555XXXX"
    );
    assert_eq!(
        masking.apply("john@example.com", &MaskingConfig::regex(r"(\w+)@", "$1_hidden@")),
        "john_hidden@example.com"
    );
    assert_eq!(
        masking.apply("total 42", &MaskingConfig::regex(r"\d+", r"\$0")),
        "total $0"
    );
    // no match leaves the value alone
    assert_eq!(masking.apply("abc", &MaskingConfig::regex(r"\d", "#")), "abc");
}

#[test]
fn test_invalid_regex_masks_fully() {
    let masking = MaskingService::new();
    let config = MaskingConfig::regex("([unclosed", "x");
    assert_eq!(masking.apply("value", &config), DEFAULT_MASK);
    // memoized invalid pattern gives the same answer
    assert_eq!(masking.apply("other", &config), DEFAULT_MASK);
}

#[test]
fn test_regex_missing_group_masks_fully() {
    let masking = MaskingService::new();
    let config = MaskingConfig::regex(r"(\d+)", "$2");
    assert_eq!(masking.apply("123", &config), DEFAULT_MASK);
}

#[test]
fn test_regex_without_replacement_is_unchanged() {
    let masking = MaskingService::new();
    let config = MaskingConfig {
        enabled: true,
        kind: MaskingType::Regex,
        pattern: Some(r"\d".to_string()),
        replacement: None,
    };
    assert_eq!(masking.apply("123", &config), "123");
}

#[test]
fn test_partial_show_first_and_last() {
    let masking = MaskingService::new();
    assert_eq!(
        masking.apply("123456789", &MaskingConfig::partial("ShowFirst3")),
        "123******"
    );
    assert_eq!(
        masking.apply("123456789", &MaskingConfig::partial("ShowLast4")),
        "*****6789"
    );
    // shorter than N: unchanged
    assert_eq!(masking.apply("ab", &MaskingConfig::partial("ShowFirst3")), "ab");
    assert_eq!(masking.apply("ab", &MaskingConfig::partial("ShowLast2")), "ab");
}

#[test]
fn test_partial_counts_characters_not_bytes() {
    let masking = MaskingService::new();
    assert_eq!(
        masking.apply("Zoë Ångström", &MaskingConfig::partial("ShowFirst3")),
        "Zoë*********"
    );
}

#[test]
fn test_partial_malformed_count() {
    let masking = MaskingService::new();
    assert_eq!(masking.apply("123456", &MaskingConfig::partial("ShowFirstX")), DEFAULT_MASK);
    assert_eq!(masking.apply("123456", &MaskingConfig::partial("ShowLast")), DEFAULT_MASK);
}

#[test]
fn test_partial_email() {
    let masking = MaskingService::new();
    let config = MaskingConfig::partial("***@***.com");
    assert_eq!(masking.apply("john.doe@example.com", &config), "j****e@example.com");
    assert_eq!(masking.apply("ab@example.com", &config), "****@example.com");
    assert_eq!(masking.apply("not-an-email", &config), DEFAULT_MASK);
}

#[test]
fn test_partial_blank_and_literal_patterns() {
    let masking = MaskingService::new();
    assert_eq!(masking.apply("secret", &MaskingConfig::partial("   ")), DEFAULT_MASK);
    assert_eq!(masking.apply("secret", &MaskingConfig::partial("[hidden]")), "[hidden]");
}

#[test]
fn test_apply_value_types() {
    let masking = MaskingService::new();
    let config = MaskingConfig::partial("ShowLast2");
    assert_eq!(masking.apply_value(&Value::Null, &config), Value::Null);
    assert_eq!(masking.apply_value(&json!(123456), &config), json!("****56"));
    assert_eq!(masking.apply_value(&json!(true), &MaskingConfig::fixed(None)), json!("*****"));
}

#[test]
fn test_projector_orders_and_renames() {
    let masking = MaskingService::new();
    let fields = Arc::new(vec![
        FieldDefinition::new("name").aliased("fullName"),
        FieldDefinition::new("email").masked(MaskingConfig::partial("***@***.com")),
        FieldDefinition::new("missing"),
    ]);
    let projector = FieldProjector::new(fields);

    let projected = projector.project(
        &masking,
        row(json!({
            "email": "jane.roe@example.com",
            "id": 7,
            "name": "Jane Roe",
        })),
    );

    let keys: Vec<&str> = projected.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["fullName", "email"]);
    assert_eq!(projected["fullName"], json!("Jane Roe"));
    assert_eq!(projected["email"], json!("j****e@example.com"));
}

#[test]
fn test_projector_matches_folded_column_names() {
    let masking = MaskingService::new();
    let projector = FieldProjector::new(Arc::new(vec![FieldDefinition::new("CreatedAt")]));
    let projected = projector.project(&masking, row(json!({"createdat": "2024-01-01"})));
    assert_eq!(projected["CreatedAt"], json!("2024-01-01"));
}

#[test]
fn test_projector_without_fields_is_passthrough() {
    let masking = MaskingService::new();
    let projector = FieldProjector::new(Arc::new(Vec::new()));
    assert!(projector.is_passthrough());

    let rows = vec![row(json!({"a": 1, "b": 2}))];
    assert_eq!(projector.project_all(&masking, rows.clone()), rows);
}

#[test]
fn test_projector_skips_fields_masked_in_sql() {
    let masking = MaskingService::new();
    let fields = Arc::new(vec![
        FieldDefinition::new("ssn")
            .aliased("taxId")
            .masked(MaskingConfig::fixed(None)),
        FieldDefinition::new("phone").masked(MaskingConfig::partial("ShowLast4")),
    ]);
    let masked_in_sql: HashSet<String> = ["taxId".to_string()].into_iter().collect();
    let projector = FieldProjector::projected_in_sql(fields, masked_in_sql);

    let projected = projector.project(
        &masking,
        row(json!({"taxId": "#####", "phone": "5551234567"})),
    );
    assert_eq!(projected["taxId"], json!("#####"));
    assert_eq!(projected["phone"], json!("******4567"));
}
