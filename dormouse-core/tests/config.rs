use dormouse_core::config::{ConfigError, ConfigValue, DormouseConfig};
use serial_test::serial;

#[test]
fn empty_config_has_no_keys() {
    let config = DormouseConfig::empty();
    assert!(matches!(
        config.get::<String>("dormouse.datasource.address"),
        Err(ConfigError::NotFound(_))
    ));
    assert_eq!(config.get_opt::<String>("missing").unwrap(), None);
}

#[test]
fn yaml_is_flattened_into_dotted_keys() {
    let yaml = r#"
dormouse:
  datasource:
    driver: sqlite
    address: "data/app.db"
    auto-reconnect: true
    max-connections: 4
  entities:
    - "app.entity"
"#;
    let config = DormouseConfig::from_yaml_str(yaml, "test").unwrap();
    assert_eq!(config.get::<String>("dormouse.datasource.driver").unwrap(), "sqlite");
    assert!(config.get::<bool>("dormouse.datasource.auto-reconnect").unwrap());
    assert_eq!(config.get::<u32>("dormouse.datasource.max-connections").unwrap(), 4);
    assert_eq!(
        config.get::<Vec<String>>("dormouse.entities").unwrap(),
        vec!["app.entity".to_string()]
    );
}

#[test]
fn type_mismatch_names_the_key() {
    let mut config = DormouseConfig::empty();
    config.set("dormouse.datasource.max-connections", ConfigValue::String("many".into()));
    match config.get::<u32>("dormouse.datasource.max-connections") {
        Err(ConfigError::TypeMismatch { key, expected }) => {
            assert_eq!(key, "dormouse.datasource.max-connections");
            assert_eq!(expected, "i64");
        }
        other => panic!("expected a type mismatch, got {other:?}"),
    }
}

#[test]
fn section_strips_the_prefix() {
    let yaml = r#"
dormouse:
  settings:
    sqlite.journal_mode: DELETE
    pool.max_connections: 2
"#;
    let config = DormouseConfig::from_yaml_str(yaml, "test").unwrap();
    let section = config.section("dormouse.settings");
    assert_eq!(
        section,
        vec![
            ("pool.max_connections".to_string(), ConfigValue::Integer(2)),
            ("sqlite.journal_mode".to_string(), ConfigValue::String("DELETE".into())),
        ]
    );
}

#[test]
#[serial]
fn profile_file_and_environment_override_base() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("dormouse.yaml"),
        "dormouse:\n  datasource:\n    address: base.db\n    username: app\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("dormouse-prod.yaml"),
        "dormouse:\n  datasource:\n    address: prod.db\n",
    )
    .unwrap();

    std::env::set_var("DORMOUSE_DATASOURCE_USERNAME", "from-env");
    let config = DormouseConfig::load_from(dir.path(), "prod").unwrap();
    std::env::remove_var("DORMOUSE_DATASOURCE_USERNAME");

    assert_eq!(config.profile(), "prod");
    assert_eq!(config.get::<String>("dormouse.datasource.address").unwrap(), "prod.db");
    assert_eq!(config.get::<String>("dormouse.datasource.username").unwrap(), "from-env");
}

#[test]
#[serial]
fn placeholders_resolve_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("dormouse.yaml"),
        "dormouse:\n  datasource:\n    password: \"${DORMOUSE_TEST_SECRET}\"\n",
    )
    .unwrap();

    std::env::set_var("DORMOUSE_TEST_SECRET", "s3cret");
    let config = DormouseConfig::load_from(dir.path(), "dev").unwrap();
    std::env::remove_var("DORMOUSE_TEST_SECRET");

    assert_eq!(config.get::<String>("dormouse.datasource.password").unwrap(), "s3cret");
}
