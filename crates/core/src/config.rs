//! 설정 관리 -- 환경변수와 선택적 TOML 파일에서 런타임 설정 로딩
//!
//! [`LogkeepConfig`]는 모든 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, daemon에서 적용)
//! 2. 환경변수 (`TARGET_CONTAINERS`, `MAX_LOG_SIZE_MB`, `LOG_DIR` 등)
//! 3. 설정 파일 (`--config logkeep.toml`, 선택)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logkeep_core::error::LogkeepError> {
//! use logkeep_core::config::LogkeepConfig;
//!
//! // 기본값 + 환경변수
//! let config = LogkeepConfig::from_env()?;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogkeepConfig::load("logkeep.toml").await?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogkeepError};
use crate::types::RotationPolicy;

/// 환경변수 키
pub const ENV_TARGET_CONTAINERS: &str = "TARGET_CONTAINERS";
pub const ENV_MAX_LOG_SIZE_MB: &str = "MAX_LOG_SIZE_MB";
pub const ENV_MAX_BACKUPS: &str = "MAX_BACKUPS";
pub const ENV_MAX_AGE_DAYS: &str = "MAX_AGE_DAYS";
pub const ENV_LOG_DIR: &str = "LOG_DIR";
pub const ENV_DOCKER_SOCKET: &str = "DOCKER_SOCKET";
pub const ENV_DRAIN_TIMEOUT_SECS: &str = "DRAIN_TIMEOUT_SECS";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
pub const ENV_METRICS_ENABLED: &str = "METRICS_ENABLED";
pub const ENV_METRICS_LISTEN_ADDR: &str = "METRICS_LISTEN_ADDR";
pub const ENV_METRICS_PORT: &str = "METRICS_PORT";

/// 설정 상한값 상수
const MAX_DRAIN_TIMEOUT_SECS: u64 = 300;

/// logkeep 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogkeepConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 수집 설정
    #[serde(default)]
    pub collector: CollectorConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogkeepConfig {
    /// 기본값에 환경변수 오버라이드를 적용하고 검증합니다.
    pub fn from_env() -> Result<Self, LogkeepError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogkeepError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogkeepError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogkeepError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogkeepError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogkeepError> {
        toml::from_str(toml_str).map_err(|e| {
            LogkeepError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 정수 값은 파싱할 수 없거나 0 이하이면 경고 후 무시합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, ENV_LOG_LEVEL);
        override_string(&mut self.general.log_format, ENV_LOG_FORMAT);

        // Collector
        override_csv(&mut self.collector.target_containers, ENV_TARGET_CONTAINERS);
        override_positive_u64(&mut self.collector.max_log_size_mb, ENV_MAX_LOG_SIZE_MB);
        override_positive_usize(&mut self.collector.max_backups, ENV_MAX_BACKUPS);
        override_positive_u64(&mut self.collector.max_age_days, ENV_MAX_AGE_DAYS);
        override_non_empty_string(&mut self.collector.log_dir, ENV_LOG_DIR);
        override_string(&mut self.collector.docker_socket, ENV_DOCKER_SOCKET);
        override_positive_u64(
            &mut self.collector.drain_timeout_secs,
            ENV_DRAIN_TIMEOUT_SECS,
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, ENV_METRICS_ENABLED);
        override_string(&mut self.metrics.listen_addr, ENV_METRICS_LISTEN_ADDR);
        override_u16(&mut self.metrics.port, ENV_METRICS_PORT);
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogkeepError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.collector.log_dir.is_empty() {
            return Err(invalid("collector.log_dir", "must not be empty".to_owned()));
        }

        if self.collector.max_log_size_mb == 0 {
            return Err(invalid(
                "collector.max_log_size_mb",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.collector.max_backups == 0 {
            return Err(invalid(
                "collector.max_backups",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.collector.max_age_days == 0 {
            return Err(invalid(
                "collector.max_age_days",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.collector.drain_timeout_secs == 0
            || self.collector.drain_timeout_secs > MAX_DRAIN_TIMEOUT_SECS
        {
            return Err(invalid(
                "collector.drain_timeout_secs",
                format!("must be 1-{MAX_DRAIN_TIMEOUT_SECS}"),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "port must not be 0 when metrics are enabled".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> LogkeepError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 로그 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// 수집 대상 컨테이너 이름 또는 짧은 ID (비어 있으면 전체)
    pub target_containers: Vec<String>,
    /// 로그 파일 디렉토리
    pub log_dir: String,
    /// 활성 로그 파일 최대 크기 (MB)
    pub max_log_size_mb: u64,
    /// 보관할 백업 파일 수
    pub max_backups: usize,
    /// 백업 파일 보관 기간 (일)
    pub max_age_days: u64,
    /// Docker 소켓 경로 (비어 있으면 로컬 기본값, `DOCKER_HOST` 반영)
    pub docker_socket: String,
    /// 종료 시 태스크 드레인 대기 시간 (초)
    pub drain_timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            target_containers: Vec::new(),
            log_dir: "./logs".to_owned(),
            max_log_size_mb: 10,
            max_backups: 5,
            max_age_days: 30,
            docker_socket: String::new(),
            drain_timeout_secs: 5,
        }
    }
}

impl CollectorConfig {
    /// 로테이션 정책을 만듭니다.
    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy::from_units(self.max_log_size_mb, self.max_backups, self.max_age_days)
    }

    /// 로그 디렉토리 경로를 반환합니다.
    pub fn log_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.log_dir)
    }

    /// 드레인 타임아웃을 반환합니다.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_non_empty_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        if !val.is_empty() {
            *target = val;
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_positive_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().parse::<u64>() {
            Ok(parsed) if parsed > 0 => *target = parsed,
            _ => warn!(
                env_key,
                value = val.as_str(),
                default = *target,
                "expected a positive integer in env var, keeping default"
            ),
        }
    }
}

fn override_positive_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().parse::<usize>() {
            Ok(parsed) if parsed > 0 => *target = parsed,
            _ => warn!(
                env_key,
                value = val.as_str(),
                default = *target,
                "expected a positive integer in env var, keeping default"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
