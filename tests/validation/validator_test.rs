use std::collections::HashSet;

use dataport::validation::{
    IdentifierKind, QueryValidator, ValidationError, MAX_IDENTIFIER_LENGTH, MAX_INPUT_LENGTH,
    RESERVED_KEYWORDS,
};

#[test]
fn test_valid_identifiers() {
    for name in ["users", "_private", "Order_Items2", "a", "T"] {
        assert!(
            QueryValidator::validate_identifier(name, IdentifierKind::Table).is_ok(),
            "{} should be accepted",
            name
        );
    }

    let longest = "a".repeat(MAX_IDENTIFIER_LENGTH);
    assert!(QueryValidator::validate_column_name(&longest).is_ok());
}

#[test]
fn test_every_keyword_is_rejected_in_any_case() {
    for keyword in RESERVED_KEYWORDS {
        let lower = keyword.to_lowercase();
        assert!(matches!(
            QueryValidator::validate_column_name(&lower),
            Err(ValidationError::ReservedKeyword { .. })
        ));
    }
}

#[test]
fn test_malformed_identifiers() {
    for name in ["users;", "users--", "first name", "1users", "users.name", "naïve", "a-b"] {
        assert!(
            matches!(
                QueryValidator::validate_table_name(name),
                Err(ValidationError::InvalidIdentifier { .. })
            ),
            "{} should be rejected",
            name
        );
    }

    assert_eq!(
        QueryValidator::validate_table_name(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1)),
        Err(ValidationError::IdentifierTooLong {
            kind: IdentifierKind::Table
        })
    );
    assert_eq!(
        QueryValidator::validate_schema_name(""),
        Err(ValidationError::Empty {
            kind: IdentifierKind::Schema
        })
    );
}

#[test]
fn test_error_messages_name_kind_and_value() {
    let err = QueryValidator::validate_table_name("bad name").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid Table name: 'bad name'. Only alphanumeric characters and underscores are allowed."
    );

    let err = QueryValidator::validate_identifier("SELECT", IdentifierKind::SortField).unwrap_err();
    assert!(err.to_string().contains("Sort field"));
    assert!(err.to_string().contains("SELECT"));
}

#[test]
fn test_injection_signatures() {
    let attacks = [
        "' OR '1'='1",
        "1' UNION SELECT NULL--",
        "'; DROP TABLE users;",
        "admin'--",
        "x /* comment */",
        "1 AND 1=1",
        "'; EXEC xp_cmdshell('dir')",
        "call xp_ 'dir'",
        "<script>alert(1)</script>",
        "javascript:alert(1)",
        "1; WAITFOR DELAY '0:0:5'",
        "SLEEP(5)",
        "drop database prod",
    ];
    for attack in attacks {
        assert!(
            QueryValidator::contains_injection_pattern(attack),
            "{} should be flagged",
            attack
        );
    }
}

#[test]
fn test_benign_input() {
    for input in [
        "John Doe",
        "test@example.com",
        "O'Brien",
        "2024-01-01",
        "100.50",
        "Portland",
        "SP_500",
        "o.sp_id = s.id",
        "xp_points",
    ] {
        assert!(
            QueryValidator::validate_user_input(input, "Filter value").is_ok(),
            "{} should be accepted",
            input
        );
    }
    assert!(QueryValidator::validate_optional_input(None, "Filter value").is_ok());
}

#[test]
fn test_input_length_cap_applies_before_patterns() {
    let long = "a".repeat(MAX_INPUT_LENGTH + 1);
    assert_eq!(
        QueryValidator::validate_user_input(&long, "Custom SQL query"),
        Err(ValidationError::InputTooLong {
            field: "Custom SQL query".to_string()
        })
    );

    let exact = "a".repeat(MAX_INPUT_LENGTH);
    assert!(QueryValidator::validate_user_input(&exact, "Custom SQL query").is_ok());
}

#[test]
fn test_sanitize_value() {
    assert_eq!(QueryValidator::sanitize_value("  ab\0c  "), "abc");
    assert_eq!(QueryValidator::sanitize_value("O'Brien"), "O'Brien");
}

#[test]
fn test_whitelists() {
    let tables: HashSet<String> = ["users", "orders"].iter().map(|s| s.to_string()).collect();
    assert!(QueryValidator::validate_table_in_whitelist("users", &tables).is_ok());
    assert_eq!(
        QueryValidator::validate_table_in_whitelist("payments", &tables),
        Err(ValidationError::TableNotRegistered("payments".to_string()))
    );
    assert!(matches!(
        QueryValidator::validate_table_in_whitelist("drop", &tables),
        Err(ValidationError::ReservedKeyword { .. })
    ));

    let columns: HashSet<String> = ["id", "email"].iter().map(|s| s.to_string()).collect();
    assert!(QueryValidator::validate_column_in_whitelist("email", &columns).is_ok());
    assert_eq!(
        QueryValidator::validate_column_in_whitelist("ssn", &columns),
        Err(ValidationError::ColumnNotAvailable("ssn".to_string()))
    );
}

#[test]
fn test_order_by_clause() {
    let columns: HashSet<String> = ["created_at", "id"].iter().map(|s| s.to_string()).collect();

    assert!(QueryValidator::validate_order_by("", &columns).is_ok());
    assert!(QueryValidator::validate_order_by("id", &columns).is_ok());
    assert!(QueryValidator::validate_order_by("created_at desc", &columns).is_ok());
    assert!(matches!(
        QueryValidator::validate_order_by("created_at sideways", &columns),
        Err(ValidationError::InvalidSortDirection(_))
    ));
    assert!(matches!(
        QueryValidator::validate_order_by("id ASC, created_at", &columns),
        Err(ValidationError::InvalidOrderBy(_))
    ));
}
