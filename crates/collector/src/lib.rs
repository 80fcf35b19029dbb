//! logkeep-collector: 컨테이너 발견, 로그 스트리밍, 파일 로테이션
//!
//! # Module Structure
//!
//! - [`error`]: 도메인 에러 타입 (`CollectorError`)
//! - [`config`]: 컬렉터 실행 설정 (`CollectorSettings`)
//! - [`docker`]: Docker API 추상화 (`DockerClient` trait, `BollardDockerClient`)
//! - [`filter`]: 수집 대상 필터 (`TargetFilter`)
//! - [`event`]: 수집 요청과 종료 보고 (`SpawnRequest`, `CopyReport`)
//! - [`sink`]: 크기 기반 로테이션 파일 (`RotatingSink`)
//! - [`copier`]: 컨테이너 하나의 스트림 → 파일 복사 (`StreamCopier`)
//! - [`discovery`]: 시작 시점 컨테이너 열거 (`Discoverer`)
//! - [`watcher`]: 시작 이벤트 감시 (`EventWatcher`)
//! - [`registry`]: 컨테이너/경로별 단일 작성자 보장 (`TaskRegistry`)
//! - [`supervisor`]: 메인 오케스트레이터 (`Supervisor`, `SupervisorBuilder`)
//!
//! # Architecture
//!
//! ```text
//! Docker events --> EventWatcher --mpsc--> Supervisor <-- Discoverer (startup)
//!                                              |
//!                                        TaskRegistry.admit()
//!                                              |
//!                          StreamCopier (one task per container)
//!                                              |
//!                                  RotatingSink --> {log_dir}/{name}.log
//! ```

pub mod config;
pub mod copier;
pub mod discovery;
pub mod docker;
pub mod error;
pub mod event;
pub mod filter;
pub mod registry;
pub mod sink;
pub mod supervisor;
pub mod watcher;

// --- Public API Re-exports ---

// Supervisor (main orchestrator)
pub use supervisor::{ShutdownReport, Supervisor, SupervisorBuilder, log_path_for};

// Configuration
pub use config::CollectorSettings;

// Error
pub use error::CollectorError;

// Docker API
pub use docker::{BollardDockerClient, DockerClient, EventStream, LogChunk, LogStream, StartEvent};

// Requests and reports
pub use event::{CloseReason, CopyReport, SpawnOrigin, SpawnRequest};

// Building blocks
pub use copier::{CopierState, StreamCopier};
pub use discovery::Discoverer;
pub use filter::{TargetFilter, should_log};
pub use registry::{Admission, TaskRegistry};
pub use sink::RotatingSink;
pub use watcher::{EventWatcher, WatchExit};
