//! 컬렉터 에러 타입
//!
//! [`CollectorError`]는 컬렉터 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<CollectorError> for LogkeepError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logkeep_core::error::{ConfigError, LogkeepError, RuntimeError, SinkError};

/// 컬렉터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// Docker 소켓 연결 실패
    #[error("docker connection error: {0}")]
    DockerConnection(String),

    /// Docker API 호출 실패
    #[error("docker api error: {0}")]
    DockerApi(String),

    /// 초기 컨테이너 목록 조회 실패
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// 컨테이너를 찾을 수 없음
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// 로그 스트림 연결 실패
    #[error("attach failed for container '{container_id}': {reason}")]
    Attach {
        /// 대상 컨테이너 ID
        container_id: String,
        /// 실패 사유
        reason: String,
    },

    /// 로그 스트림 읽기 실패
    #[error("log stream error for container '{container_id}': {reason}")]
    Stream {
        /// 대상 컨테이너 ID
        container_id: String,
        /// 실패 사유
        reason: String,
    },

    /// 이벤트 스트림 에러
    #[error("event stream error: {0}")]
    Events(String),

    /// 활성 로그 파일 열기/쓰기 실패
    #[error("sink error: {path}: {reason}")]
    Sink {
        /// 로그 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<CollectorError> for LogkeepError {
    fn from(err: CollectorError) -> Self {
        match err {
            CollectorError::DockerConnection(msg) => {
                LogkeepError::Runtime(RuntimeError::Connection(msg))
            }
            CollectorError::Discovery(msg) => LogkeepError::Runtime(RuntimeError::Discovery(msg)),
            CollectorError::Attach {
                container_id,
                reason,
            } => LogkeepError::Runtime(RuntimeError::Attach {
                container_id,
                reason,
            }),
            CollectorError::Sink { path, reason } => {
                LogkeepError::Sink(SinkError::Write { path, reason })
            }
            CollectorError::Config { field, reason } => {
                LogkeepError::Config(ConfigError::InvalidValue { field, reason })
            }
            other @ (CollectorError::DockerApi(_)
            | CollectorError::ContainerNotFound(_)
            | CollectorError::Stream { .. }
            | CollectorError::Events(_)) => {
                LogkeepError::Runtime(RuntimeError::Api(other.to_string()))
            }
        }
    }
}
