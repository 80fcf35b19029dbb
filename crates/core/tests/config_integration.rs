//! logkeep.toml 통합 설정 테스트
//!
//! - logkeep.toml.example 파싱 테스트
//! - 부분 설정 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use logkeep_core::config::LogkeepConfig;
use logkeep_core::error::{ConfigError, LogkeepError};

fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
    let originals: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(k, _)| ((*k).to_owned(), std::env::var(k).ok()))
        .collect();
    for (k, v) in vars {
        // SAFETY: 테스트는 #[serial]로 직렬화되어 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var(k, v) };
    }

    let result = f();

    for (k, original) in originals {
        // SAFETY: 테스트 정리
        unsafe {
            match original {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
    result
}

// =============================================================================
// logkeep.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../logkeep.toml.example");
    let config = LogkeepConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert!(config.collector.target_containers.is_empty());
    assert_eq!(config.collector.log_dir, "./logs");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../logkeep.toml.example");
    let config = LogkeepConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../logkeep.toml.example");
    let parsed = LogkeepConfig::parse(content).expect("should parse");
    let defaults = LogkeepConfig::default();

    assert_eq!(
        parsed.collector.max_log_size_mb,
        defaults.collector.max_log_size_mb
    );
    assert_eq!(parsed.collector.max_backups, defaults.collector.max_backups);
    assert_eq!(
        parsed.collector.max_age_days,
        defaults.collector.max_age_days
    );
    assert_eq!(
        parsed.collector.drain_timeout_secs,
        defaults.collector.drain_timeout_secs
    );
    assert_eq!(parsed.metrics.port, defaults.metrics.port);
    assert_eq!(parsed.metrics.enabled, defaults.metrics.enabled);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_collector_only() {
    let toml = r#"
[collector]
target_containers = ["web", "abc123456789"]
log_dir = "/var/log/containers"
"#;
    let config = LogkeepConfig::parse(toml).expect("should parse");
    assert_eq!(config.collector.target_containers.len(), 2);
    assert_eq!(config.collector.log_dir, "/var/log/containers");
    assert_eq!(config.general.log_level, "info");
    assert!(!config.metrics.enabled);
}

#[test]
fn partial_config_metrics_only() {
    let toml = r#"
[metrics]
enabled = true
port = 9100
"#;
    let config = LogkeepConfig::parse(toml).expect("should parse");
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.port, 9100);
    assert_eq!(config.metrics.listen_addr, "127.0.0.1");
    assert_eq!(config.collector.max_backups, 5);
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[collector]
max_log_size_mb = 50
log_dir = "/from/file"
"#;
    let config = with_env(&[("MAX_LOG_SIZE_MB", "1"), ("LOG_DIR", "/from/env")], || {
        let mut config = LogkeepConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config
    });

    assert_eq!(config.collector.max_log_size_mb, 1);
    assert_eq!(config.collector.log_dir, "/from/env");
}

#[test]
#[serial_test::serial]
fn env_invalid_value_keeps_toml_value() {
    let toml = r#"
[collector]
max_backups = 8
"#;
    let config = with_env(&[("MAX_BACKUPS", "0")], || {
        let mut config = LogkeepConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config
    });

    assert_eq!(config.collector.max_backups, 8);
}

#[test]
#[serial_test::serial]
fn env_override_csv_replaces_file_list() {
    let toml = r#"
[collector]
target_containers = ["db"]
"#;
    let config = with_env(&[("TARGET_CONTAINERS", "web,cache")], || {
        let mut config = LogkeepConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config
    });

    assert_eq!(config.collector.target_containers, vec!["web", "cache"]);
}

#[test]
#[serial_test::serial]
fn env_override_missing_var_keeps_toml_value() {
    let toml = r#"
[general]
log_level = "debug"
"#;
    let config = with_env(&[], || {
        // SAFETY: 테스트는 #[serial]로 직렬화되어 환경변수 조작이 안전합니다.
        unsafe { std::env::remove_var("LOG_LEVEL") };
        let mut config = LogkeepConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config
    });

    assert_eq!(config.general.log_level, "debug");
}

// =============================================================================
// 에러 케이스
// =============================================================================

#[test]
fn empty_string_parses_with_defaults() {
    let config = LogkeepConfig::parse("").expect("empty should parse");
    assert_eq!(config.collector.log_dir, "./logs");
    config.validate().expect("defaults should validate");
}

#[test]
fn comments_only_parses_with_defaults() {
    let config = LogkeepConfig::parse("# nothing here\n# still nothing\n").expect("should parse");
    assert_eq!(config.collector.max_log_size_mb, 10);
}

#[test]
fn malformed_toml_returns_parse_error() {
    let result = LogkeepConfig::parse("[invalid toml");
    assert!(matches!(
        result.unwrap_err(),
        LogkeepError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn wrong_type_for_numeric_field() {
    let toml = r#"
[collector]
max_backups = "five"
"#;
    assert!(matches!(
        LogkeepConfig::parse(toml).unwrap_err(),
        LogkeepError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn parsed_zero_size_fails_validation() {
    let toml = r#"
[collector]
max_log_size_mb = 0
"#;
    let config = LogkeepConfig::parse(toml).expect("should parse");
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("max_log_size_mb"));
}

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let result = LogkeepConfig::from_file("/tmp/logkeep_test_nonexistent_12345.toml").await;
    assert!(matches!(
        result.unwrap_err(),
        LogkeepError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
#[serial_test::serial]
async fn load_example_config_from_disk() {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let example_path = format!("{}/../../logkeep.toml.example", manifest_dir);

    let config = LogkeepConfig::load(&example_path)
        .await
        .expect("example should load");
    assert_eq!(config.metrics.port, 9464);
}
