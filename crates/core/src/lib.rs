//! logkeep-core -- 공통 타입, 에러, 설정
//!
//! collector와 daemon이 함께 사용하는 기반 크레이트입니다.
//!
//! - [`config`]: TOML 파일과 환경변수에서 읽는 [`LogkeepConfig`]
//! - [`error`]: 최상위 에러 [`LogkeepError`]와 도메인 에러
//! - [`types`]: [`ContainerRef`], [`RotationPolicy`]
//! - [`metrics`]: Prometheus 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogkeepError, RuntimeError, SinkError};

// 설정
pub use config::{CollectorConfig, GeneralConfig, LogkeepConfig, MetricsConfig};

// 도메인 타입
pub use types::{ContainerRef, RotationPolicy, SHORT_ID_LEN};
