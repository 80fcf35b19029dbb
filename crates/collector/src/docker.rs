//! Docker API 추상화.
//!
//! [`DockerClient`] trait은 수집기가 쓰는 런타임 연산을 묶습니다.
//! 실행 중 컨테이너 목록 조회, 시작 이벤트 구독, 로그 스트림 연결이 여기에 속합니다.
//! 운영 코드는 [`BollardDockerClient`]를, 테스트는 `MockDockerClient`를 사용합니다.
//!
//! # 구조
//!
//! ```text
//!   Discoverer   EventWatcher   StreamCopier
//!        \            |             /
//!         ▼           ▼            ▼
//!            ┌─────────────┐
//!            │DockerClient │ (trait)
//!            └─────────────┘
//!               │       │
//!               ▼       ▼
//!          ┌───────┐ ┌────┐
//!          │Bollard│ │Mock│
//!          └───┬───┘ └────┘
//!              ▼
//!        Docker Daemon
//! ```
//!
//! # 사용 예시
//!
//! ```ignore
//! use logkeep_collector::{BollardDockerClient, DockerClient};
//!
//! let client = BollardDockerClient::connect_local()?;
//! let running = client.list_running_containers().await?;
//! let logs = client.attach_logs(&running[0].id, None).await?;
//! # Ok::<(), logkeep_collector::CollectorError>(())
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use logkeep_core::types::ContainerRef;

use crate::error::CollectorError;

/// 역다중화된 로그 프레임 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogChunk {
    /// 표준 출력 프레임
    Stdout(Bytes),
    /// 표준 에러 프레임
    Stderr(Bytes),
}

impl LogChunk {
    /// 프레임의 바이트를 반환합니다.
    pub fn bytes(&self) -> &Bytes {
        match self {
            Self::Stdout(b) | Self::Stderr(b) => b,
        }
    }

    /// 메트릭 레이블에 쓰는 스트림 이름
    pub fn stream_name(&self) -> &'static str {
        match self {
            Self::Stdout(_) => "stdout",
            Self::Stderr(_) => "stderr",
        }
    }
}

/// 컨테이너 시작 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartEvent {
    /// 시작된 컨테이너
    pub container: ContainerRef,
    /// 이벤트 발생 시각 (Unix 초)
    pub time: Option<i64>,
}

/// 라이브 로그 스트림
pub type LogStream = BoxStream<'static, Result<LogChunk, CollectorError>>;

/// 시작 이벤트 스트림
pub type EventStream = BoxStream<'static, Result<StartEvent, CollectorError>>;

/// Docker API에 넘기기 전에 컨테이너 ID를 검증합니다.
///
/// 컨테이너 ID는 64자 16진수 문자열이거나 그보다 짧은 접두사입니다.
fn validate_container_id(id: &str) -> Result<(), CollectorError> {
    if id.is_empty() || id.len() > 64 {
        return Err(CollectorError::DockerApi(format!(
            "invalid container ID: length {} (must be 1-64)",
            id.len()
        )));
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CollectorError::DockerApi(
            "invalid container ID: contains non-hex characters".to_owned(),
        ));
    }
    Ok(())
}

/// 컨테이너 런타임 추상화 trait
///
/// `Send + Sync + 'static`이므로 `Arc<D>`로 감싸 탐색기, 이벤트 감시자,
/// 각 copier 태스크가 공유합니다.
pub trait DockerClient: Send + Sync + 'static {
    /// 실행 중인 컨테이너 목록을 조회합니다.
    ///
    /// 정지되거나 종료된 컨테이너는 포함하지 않습니다.
    ///
    /// # Errors
    ///
    /// Docker API 호출이 실패하면 `CollectorError::DockerApi`를 반환합니다.
    fn list_running_containers(
        &self,
    ) -> impl Future<Output = Result<Vec<ContainerRef>, CollectorError>> + Send;

    /// 컨테이너가 현재 실행 중인지 확인합니다.
    ///
    /// # Errors
    ///
    /// - `CollectorError::ContainerNotFound`: 컨테이너가 없음 (404)
    /// - `CollectorError::DockerApi`: 잘못된 ID 또는 기타 API 에러
    fn is_running(&self, id: &str) -> impl Future<Output = Result<bool, CollectorError>> + Send;

    /// 컨테이너 시작 이벤트를 구독합니다.
    ///
    /// 서버 측 필터 `type=container`, `event=start`를 사용합니다.
    /// 구독 요청은 스트림을 처음 폴링할 때 전송되며, 데몬이 연결을 닫으면 스트림이 끝납니다.
    fn start_events(&self) -> EventStream;

    /// 실행 중인 컨테이너의 stdout/stderr 통합 스트림에 연결합니다.
    ///
    /// 타임스탬프 없이 실시간으로 따라가며, 컨테이너가 멈추면 정상 종료됩니다.
    /// `since`(Unix 초)가 주어지면 그 이전 출력은 건너뜁니다.
    ///
    /// # Errors
    ///
    /// 컨테이너가 실행 중이 아니거나 데몬에 닿을 수 없으면 `CollectorError::Attach`를 반환합니다.
    fn attach_logs(
        &self,
        id: &str,
        since: Option<i64>,
    ) -> impl Future<Output = Result<LogStream, CollectorError>> + Send;

    /// Docker 데몬 연결을 확인합니다.
    ///
    /// # Errors
    ///
    /// 데몬에 닿을 수 없으면 `CollectorError::DockerConnection`을 반환합니다.
    fn ping(&self) -> impl Future<Output = Result<(), CollectorError>> + Send;
}

/// `bollard` 기반 운영용 Docker 클라이언트
///
/// 내부적으로 `Arc<bollard::Docker>`를 사용해 비동기 태스크 간에 공유합니다.
///
/// # 연결 관리
///
/// - 연결 타임아웃: 120초
/// - API 버전: 기본값 (자동 협상)
/// - 소켓 경로: 설정 가능, 로컬 기본값은 `DOCKER_HOST`를 따름
pub struct BollardDockerClient {
    docker: Arc<bollard::Docker>,
}

impl BollardDockerClient {
    /// 로컬 기본값(`DOCKER_HOST` 또는 플랫폼 소켓)으로 연결합니다.
    ///
    /// # Errors
    ///
    /// 연결에 실패하면 `CollectorError::DockerConnection`을 반환합니다.
    pub fn connect_local() -> Result<Self, CollectorError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            CollectorError::DockerConnection(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// 지정한 소켓 경로로 연결합니다.
    ///
    /// # Errors
    ///
    /// 연결에 실패하면 `CollectorError::DockerConnection`을 반환합니다.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, CollectorError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    CollectorError::DockerConnection(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// 설정의 소켓 경로로 연결합니다. 비어 있으면 로컬 기본값을 사용합니다.
    pub fn connect(socket_path: &str) -> Result<Self, CollectorError> {
        if socket_path.is_empty() {
            Self::connect_local()
        } else {
            Self::connect_with_socket(socket_path)
        }
    }
}

impl DockerClient for BollardDockerClient {
    async fn list_running_containers(&self) -> Result<Vec<ContainerRef>, CollectorError> {
        use bollard::container::ListContainersOptions;

        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| CollectorError::DockerApi(format!("list containers failed: {e}")))?;

        let result = containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                let name = c
                    .names
                    .and_then(|names| names.into_iter().next())
                    .unwrap_or_default();
                Some(ContainerRef::new(id, name))
            })
            .collect();

        Ok(result)
    }

    async fn is_running(&self, id: &str) -> Result<bool, CollectorError> {
        validate_container_id(id)?;

        let details = self.docker.inspect_container(id, None).await.map_err(|e| {
            if e.to_string().contains("404") {
                CollectorError::ContainerNotFound(id.to_owned())
            } else {
                CollectorError::DockerApi(format!("inspect container failed: {e}"))
            }
        })?;

        Ok(details.state.and_then(|s| s.running).unwrap_or(false))
    }

    fn start_events(&self) -> EventStream {
        use bollard::system::EventsOptions;

        let mut filters = HashMap::new();
        filters.insert("type".to_owned(), vec!["container".to_owned()]);
        filters.insert("event".to_owned(), vec!["start".to_owned()]);

        let options = EventsOptions::<String> {
            filters,
            ..Default::default()
        };

        self.docker
            .events(Some(options))
            .filter_map(|item| async move {
                match item {
                    Ok(msg) => {
                        let actor = msg.actor?;
                        let id = actor.id?;
                        let name = actor
                            .attributes
                            .and_then(|mut attrs| attrs.remove("name"))
                            .unwrap_or_default();
                        Some(Ok(StartEvent {
                            container: ContainerRef::new(id, name),
                            time: msg.time,
                        }))
                    }
                    Err(e) => Some(Err(CollectorError::Events(e.to_string()))),
                }
            })
            .boxed()
    }

    async fn attach_logs(&self, id: &str, since: Option<i64>) -> Result<LogStream, CollectorError> {
        use bollard::container::{LogOutput, LogsOptions};

        let running = self
            .is_running(id)
            .await
            .map_err(|e| CollectorError::Attach {
                container_id: id.to_owned(),
                reason: e.to_string(),
            })?;
        if !running {
            return Err(CollectorError::Attach {
                container_id: id.to_owned(),
                reason: "container is not running".to_owned(),
            });
        }

        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            timestamps: false,
            since: since.unwrap_or(0),
            tail: "all".to_owned(),
            ..Default::default()
        };

        let container_id = id.to_owned();
        let stream = self.docker.logs(id, Some(options)).map(move |item| match item {
            Ok(LogOutput::StdErr { message }) => Ok(LogChunk::Stderr(message)),
            Ok(
                LogOutput::StdOut { message }
                | LogOutput::Console { message }
                | LogOutput::StdIn { message },
            ) => Ok(LogChunk::Stdout(message)),
            Err(e) => Err(CollectorError::Stream {
                container_id: container_id.clone(),
                reason: e.to_string(),
            }),
        });

        Ok(stream.boxed())
    }

    async fn ping(&self) -> Result<(), CollectorError> {
        self.docker
            .ping()
            .await
            .map_err(|e| CollectorError::DockerConnection(format!("ping failed: {e}")))?;
        Ok(())
    }
}

/// 테스트용 Mock Docker 클라이언트
///
/// 설정 가능한 응답을 반환하여 Docker 없이도 테스트할 수 있습니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockDockerClient {
    /// 실행 중인 컨테이너
    pub running: Vec<ContainerRef>,
    /// 정지된 컨테이너 (목록에는 없고 attach는 실패)
    pub stopped: Vec<ContainerRef>,
    /// 컨테이너별 로그 프레임 (attach마다 처음부터 재생)
    pub logs: HashMap<String, Vec<Result<LogChunk, String>>>,
    /// 라이브 로그 채널 (첫 attach가 가져감)
    pub live_logs: std::sync::Mutex<
        HashMap<String, tokio::sync::mpsc::UnboundedReceiver<Result<LogChunk, CollectorError>>>,
    >,
    /// 시작 이벤트 채널 (첫 구독이 가져감)
    pub events: std::sync::Mutex<
        Option<tokio::sync::mpsc::UnboundedReceiver<Result<StartEvent, CollectorError>>>,
    >,
    /// list 호출 시 실패를 시뮬레이션할지 여부
    pub fail_list: bool,
    /// attach 호출 기록
    pub attach_calls: std::sync::Mutex<Vec<(String, Option<i64>)>>,
}

#[cfg(test)]
impl MockDockerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_running(mut self, containers: Vec<ContainerRef>) -> Self {
        self.running = containers;
        self
    }

    pub fn with_stopped(mut self, containers: Vec<ContainerRef>) -> Self {
        self.stopped = containers;
        self
    }

    pub fn with_logs(mut self, id: &str, chunks: Vec<Result<LogChunk, String>>) -> Self {
        self.logs.insert(id.to_owned(), chunks);
        self
    }

    pub fn with_live_logs(
        self,
        id: &str,
        rx: tokio::sync::mpsc::UnboundedReceiver<Result<LogChunk, CollectorError>>,
    ) -> Self {
        if let Ok(mut live) = self.live_logs.lock() {
            live.insert(id.to_owned(), rx);
        }
        self
    }

    pub fn with_events(
        self,
        rx: tokio::sync::mpsc::UnboundedReceiver<Result<StartEvent, CollectorError>>,
    ) -> Self {
        if let Ok(mut events) = self.events.lock() {
            *events = Some(rx);
        }
        self
    }

    pub fn with_failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn attached_ids(&self) -> Vec<String> {
        self.attach_calls
            .lock()
            .map(|calls| calls.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
fn receiver_stream<T: Send + 'static>(
    rx: tokio::sync::mpsc::UnboundedReceiver<T>,
) -> BoxStream<'static, T> {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed()
}

#[cfg(test)]
impl DockerClient for MockDockerClient {
    async fn list_running_containers(&self) -> Result<Vec<ContainerRef>, CollectorError> {
        if self.fail_list {
            return Err(CollectorError::DockerApi("mock list failure".to_owned()));
        }
        Ok(self.running.clone())
    }

    async fn is_running(&self, id: &str) -> Result<bool, CollectorError> {
        if self.running.iter().any(|c| c.id == id) {
            Ok(true)
        } else if self.stopped.iter().any(|c| c.id == id) {
            Ok(false)
        } else {
            Err(CollectorError::ContainerNotFound(id.to_owned()))
        }
    }

    fn start_events(&self) -> EventStream {
        let rx = self.events.lock().ok().and_then(|mut events| events.take());
        match rx {
            Some(rx) => receiver_stream(rx),
            None => futures::stream::pending().boxed(),
        }
    }

    async fn attach_logs(&self, id: &str, since: Option<i64>) -> Result<LogStream, CollectorError> {
        if let Ok(mut calls) = self.attach_calls.lock() {
            calls.push((id.to_owned(), since));
        }

        if !self.is_running(id).await.unwrap_or(false) {
            return Err(CollectorError::Attach {
                container_id: id.to_owned(),
                reason: "container is not running".to_owned(),
            });
        }

        let live = self.live_logs.lock().ok().and_then(|mut live| live.remove(id));
        if let Some(rx) = live {
            return Ok(receiver_stream(rx));
        }

        let container_id = id.to_owned();
        let chunks: Vec<Result<LogChunk, CollectorError>> = self
            .logs
            .get(id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|item| {
                item.map_err(|reason| CollectorError::Stream {
                    container_id: container_id.clone(),
                    reason,
                })
            })
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn ping(&self) -> Result<(), CollectorError> {
        Ok(())
    }
}
