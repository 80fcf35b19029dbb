//! Collector work items and outcomes.
//!
//! [`SpawnRequest`] travels from the discoverer and the event watcher to the
//! supervisor. [`CopyReport`] travels back from every finished copier task.

use std::fmt;

use logkeep_core::types::ContainerRef;

/// 요청이 만들어진 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOrigin {
    /// 시작 시점 목록 조회에서 발견됨
    Discovered,
    /// 실행 중 시작 이벤트로 관측됨
    Started,
}

impl fmt::Display for SpawnOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovered => write!(f, "discovered"),
            Self::Started => write!(f, "started"),
        }
    }
}

/// 컨테이너 로그 수집 시작 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    /// 대상 컨테이너
    pub container: ContainerRef,
    /// 이 시각(Unix 초) 이전 출력은 건너뜀
    pub since: Option<i64>,
    /// 요청 경로
    pub origin: SpawnOrigin,
}

impl SpawnRequest {
    /// 발견된 컨테이너 요청. 과거 출력 전체를 가져옵니다.
    pub fn discovered(container: ContainerRef) -> Self {
        Self {
            container,
            since: None,
            origin: SpawnOrigin::Discovered,
        }
    }

    /// 시작 이벤트 요청. 이벤트 시각 이후 출력만 가져옵니다.
    pub fn started(container: ContainerRef, since: Option<i64>) -> Self {
        Self {
            container,
            since,
            origin: SpawnOrigin::Started,
        }
    }
}

/// copier 종료 사유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// 스트림이 정상 종료됨 (컨테이너 정지)
    Clean,
    /// 취소 토큰이 발동됨
    Cancelled,
    /// 로그 스트림 연결 실패
    AttachFailed(String),
    /// 스트림 읽기 실패
    StreamError(String),
    /// 로그 파일 쓰기 실패
    WriteFailed(String),
}

impl CloseReason {
    /// 메트릭 레이블 값
    pub fn label(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Cancelled => "cancelled",
            Self::AttachFailed(_) => "attach_failed",
            Self::StreamError(_) => "stream_error",
            Self::WriteFailed(_) => "write_failed",
        }
    }

    /// 에러로 끝났는지 여부. 취소와 정상 종료는 에러가 아닙니다.
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Clean | Self::Cancelled)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::AttachFailed(msg) => write!(f, "attach failed: {msg}"),
            Self::StreamError(msg) => write!(f, "stream error: {msg}"),
            Self::WriteFailed(msg) => write!(f, "write failed: {msg}"),
        }
    }
}

/// copier 실행 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    /// 대상 컨테이너
    pub container: ContainerRef,
    /// 기록한 바이트 수
    pub bytes_copied: u64,
    /// 종료 사유
    pub reason: CloseReason,
}
