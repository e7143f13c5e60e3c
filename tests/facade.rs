// Exercises the re-exported API the way an embedding service would.
use pgrule::{
    codec, matcher, select_statement, Column, Filter, MemoryModel, PolicyError, PolicyModel,
    RuleRow, TableName,
};

#[test]
fn filter_and_delete_statements_bind_every_value() {
    let table = TableName::new(Some("tenant_a"), pgrule::DEFAULT_TABLE_NAME).expect("table");

    let filter = Filter::new()
        .with(Column::PType, ["p"])
        .with(Column::V0, ["alice'; DROP TABLE x; --"]);
    let select = select_statement(&table, &filter);
    assert!(!select.sql.contains("alice"));
    assert_eq!(select.args.len(), 2);

    let fields = matcher::project_window(1, &["data1", "read"]).expect("window");
    let delete = matcher::delete_statement(&table, "p", &fields);
    assert_eq!(
        delete.sql,
        "DELETE FROM \"tenant_a_casbin_rule\" WHERE p_type = $1 AND v1 = $2 AND v2 = $3"
    );
}

#[test]
fn json_filters_are_validated() {
    let err = Filter::try_from(&serde_json::json!({ "v0": 7 })).unwrap_err();
    assert!(matches!(err, PolicyError::InvalidFilter(_)));
}

#[test]
fn rows_decode_into_model_lines() {
    let mut model = MemoryModel::new();
    for row in [
        RuleRow::new("p", &["alice", "data1", "read"]),
        RuleRow::new("g", &["alice", "admin"]),
    ] {
        let line = codec::decode(&row);
        assert!(!line.is_empty(), "{}", codec::rule_line(&line));
        model.load_rule(line).expect("load");
    }
    assert_eq!(
        model.section_rules("g"),
        vec![("g".to_string(), vec!["alice".to_string(), "admin".to_string()])]
    );
}

#[test]
fn unsupported_driver_is_a_config_error() {
    let err: PolicyError = pgrule::AdapterConfig::for_driver("sqlite", "sqlite::memory:")
        .unwrap_err()
        .into();
    assert!(matches!(err, PolicyError::Config(_)));
}

#[tokio::test]
async fn connecting_without_a_url_fails_before_dialing() {
    let err = pgrule::connect_from_env_with_prefix("PGRULE_FACADE_UNSET_")
        .await
        .err()
        .expect("missing url");
    assert!(matches!(
        err,
        PolicyError::Config(pgrule::ConfigError::MissingEnvVar(key))
            if key == "PGRULE_FACADE_UNSET_DATABASE_URL"
    ));
}

#[tokio::test]
async fn unsafe_table_name_from_env_is_rejected() {
    std::env::set_var("PGRULE_FACADE_BAD_DATABASE_URL", "postgres://localhost/authz");
    std::env::set_var("PGRULE_FACADE_BAD_POLICY_TABLE", "rules; DROP TABLE users");

    let err = pgrule::connect_from_env_with_prefix("PGRULE_FACADE_BAD_")
        .await
        .err()
        .expect("invalid table");
    assert!(matches!(
        err,
        PolicyError::Config(pgrule::ConfigError::InvalidIdentifier { .. })
    ));
}
