//! 컬렉터 설정
//!
//! [`CollectorSettings`]는 core의 [`CollectorConfig`](logkeep_core::config::CollectorConfig)를
//! 컬렉터 내부에서 쓰는 타입(경로, 로테이션 정책, 타임아웃)으로 변환한 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use logkeep_core::config::LogkeepConfig;
//! use logkeep_collector::config::CollectorSettings;
//!
//! let core_config = LogkeepConfig::default();
//! let settings = CollectorSettings::from_core(&core_config.collector);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use logkeep_core::config::CollectorConfig;
use logkeep_core::types::RotationPolicy;

use crate::error::CollectorError;
use crate::filter::TargetFilter;

/// 설정 상한값 상수
const MAX_SPAWN_CHANNEL_CAPACITY: usize = 65_536;

/// 컬렉터 실행 설정
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// 수집 대상 필터
    pub filter: TargetFilter,
    /// 로그 파일 디렉토리
    pub log_dir: PathBuf,
    /// 로테이션 정책
    pub rotation: RotationPolicy,
    /// 종료 시 드레인 대기 시간
    pub drain_timeout: Duration,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 이벤트 감시자 → supervisor 요청 채널 용량
    pub spawn_channel_capacity: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self::from_core(&CollectorConfig::default())
    }
}

impl CollectorSettings {
    /// core의 `CollectorConfig`에서 컬렉터 설정을 생성합니다.
    pub fn from_core(core: &CollectorConfig) -> Self {
        Self {
            filter: TargetFilter::new(&core.target_containers),
            log_dir: core.log_dir_path(),
            rotation: core.rotation_policy(),
            drain_timeout: core.drain_timeout(),
            spawn_channel_capacity: 256,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.log_dir.as_os_str().is_empty() {
            return Err(CollectorError::Config {
                field: "log_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.rotation.max_size_bytes == 0 {
            return Err(CollectorError::Config {
                field: "max_log_size_mb".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.drain_timeout.is_zero() {
            return Err(CollectorError::Config {
                field: "drain_timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.spawn_channel_capacity == 0
            || self.spawn_channel_capacity > MAX_SPAWN_CHANNEL_CAPACITY
        {
            return Err(CollectorError::Config {
                field: "spawn_channel_capacity".to_owned(),
                reason: format!("must be 1-{MAX_SPAWN_CHANNEL_CAPACITY}"),
            });
        }

        Ok(())
    }
}
