//! 에러 타입 -- 도메인별 에러 정의
//!
//! 라이브러리 크레이트는 각자의 `thiserror` 에러를 정의하고
//! `From` 변환으로 [`LogkeepError`]에 합류합니다.

/// logkeep 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogkeepError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 컨테이너 런타임 에러
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// 로그 싱크 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 컨테이너 런타임 에러
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// 런타임 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 초기 컨테이너 목록 조회 실패
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// 로그 스트림 연결 실패
    #[error("attach failed for container '{container_id}': {reason}")]
    Attach {
        container_id: String,
        reason: String,
    },

    /// 런타임 API 호출 실패
    #[error("api error: {0}")]
    Api(String),
}

/// 로그 싱크 에러
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 활성 로그 파일 열기/쓰기 실패
    #[error("write to {path} failed: {reason}")]
    Write { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_top_level() {
        let err: LogkeepError = ConfigError::InvalidValue {
            field: "collector.log_dir".to_owned(),
            reason: "must not be empty".to_owned(),
        }
        .into();
        assert!(matches!(err, LogkeepError::Config(_)));
        assert!(err.to_string().contains("collector.log_dir"));
    }

    #[test]
    fn attach_error_display_names_container() {
        let err = RuntimeError::Attach {
            container_id: "abc123def456".to_owned(),
            reason: "container is not running".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123def456"));
        assert!(msg.contains("not running"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: LogkeepError = io.into();
        assert!(matches!(err, LogkeepError::Io(_)));
    }
}
