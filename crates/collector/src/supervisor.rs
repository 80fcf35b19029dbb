//! Supervisor -- 컬렉터 전체 오케스트레이션
//!
//! [`Supervisor`]는 루트 취소 토큰, 활성 태스크 레지스트리, copier 태스크의
//! `JoinSet`을 단독으로 소유합니다.
//!
//! # 실행 흐름
//!
//! ```text
//! EventWatcher ──SpawnRequest──┐
//!                              ▼
//! Discoverer ──SpawnRequest──> Supervisor ──(registry admit)──> StreamCopier tasks
//!                              ▲                                      │
//!                              └──────────── CopyReport ──────────────┘
//! ```
//!
//! 종료 신호를 받으면 루트 토큰을 취소하고, 드레인 타임아웃 안에 끝나지 않은
//! 태스크는 중단합니다.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use logkeep_core::metrics as m;
use logkeep_core::types::ContainerRef;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CollectorSettings;
use crate::copier::StreamCopier;
use crate::discovery::Discoverer;
use crate::docker::DockerClient;
use crate::error::CollectorError;
use crate::event::{CopyReport, SpawnRequest};
use crate::registry::{Admission, TaskRegistry};
use crate::sink::RotatingSink;
use crate::watcher::{EventWatcher, WatchExit};

/// 드레인 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// 타임아웃 안에 정상 종료된 태스크 수
    pub drained: usize,
    /// 타임아웃 후 중단된 태스크 수
    pub aborted: usize,
}

/// 컨테이너 로그 수집 supervisor
pub struct Supervisor<D: DockerClient> {
    docker: Arc<D>,
    settings: CollectorSettings,
    cancel: CancellationToken,
    registry: TaskRegistry,
    tasks: JoinSet<CopyReport>,
}

impl<D: DockerClient> Supervisor<D> {
    /// 루트 취소 토큰의 복제본을 반환합니다. 취소하면 supervisor가 종료를 시작합니다.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 컨테이너의 로그 파일 경로
    pub fn log_path_for(&self, container: &ContainerRef) -> PathBuf {
        log_path_for(&self.settings.log_dir, container)
    }

    /// 발견, 감시, 복사를 시작하고 `shutdown`이 완료되거나 루트 토큰이 취소될 때까지 실행합니다.
    ///
    /// 초기 목록 조회 실패는 에러로 반환합니다. 그 밖의 태스크별 실패는 로그만 남깁니다.
    pub async fn run<F>(mut self, shutdown: F) -> Result<ShutdownReport, CollectorError>
    where
        F: Future<Output = ()> + Send,
    {
        let (spawn_tx, mut spawn_rx) = mpsc::channel(self.settings.spawn_channel_capacity);

        // 감시 태스크를 목록 조회보다 먼저 띄운다. 구독은 태스크가 처음 폴링될 때 열리므로
        // 그 전에 시작된 컨테이너는 놓칠 수 있다.
        let mut watcher = self.spawn_watcher(spawn_tx);

        let discoverer = Discoverer::new(Arc::clone(&self.docker));
        let initial = match discoverer.initial_requests(&self.settings.filter).await {
            Ok(requests) => requests,
            Err(e) => {
                error!(error = %e, "initial container discovery failed");
                self.cancel.cancel();
                let _ = watcher.await;
                return Err(e);
            }
        };

        for request in initial {
            self.spawn(request).await;
        }

        tokio::pin!(shutdown);
        let mut watcher_done = false;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping log collection");
                    break;
                }
                _ = self.cancel.cancelled() => {
                    info!("collector cancelled, stopping log collection");
                    break;
                }
                Some(request) = spawn_rx.recv() => {
                    self.spawn(request).await;
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    match joined {
                        Ok(report) => self.on_task_finished(report).await,
                        Err(e) => warn!(error = %e, "log copier task failed"),
                    }
                }
                exit = &mut watcher, if !watcher_done => {
                    watcher_done = true;
                    match exit {
                        Ok(WatchExit::StreamClosed) if self.registry.is_empty() => warn!(
                            "event watcher stopped with no active copiers, idle until shutdown"
                        ),
                        Ok(WatchExit::StreamClosed) => warn!(
                            active = self.registry.len(),
                            "event watcher stopped, running copiers continue until shutdown"
                        ),
                        Ok(other) => debug!(exit = ?other, "event watcher stopped"),
                        Err(e) => error!(error = %e, "event watcher task failed"),
                    }
                }
            }
        }

        Ok(self.shutdown(watcher, watcher_done).await)
    }

    fn spawn_watcher(&self, spawn_tx: mpsc::Sender<SpawnRequest>) -> JoinHandle<WatchExit> {
        let watcher = EventWatcher::new(Arc::clone(&self.docker), self.settings.filter.clone());
        let cancel = self.cancel.child_token();
        tokio::spawn(async move { watcher.watch(cancel, spawn_tx).await })
    }

    /// 요청을 레지스트리에 넣고 수락되면 copier 태스크를 실행합니다.
    async fn spawn(&mut self, request: SpawnRequest) {
        if self.cancel.is_cancelled() {
            return;
        }

        let path = self.log_path_for(&request.container);
        let token = match self.registry.admit(&request, &path, &self.cancel) {
            Admission::Spawn(token) => token,
            Admission::Deferred => {
                metrics::counter!(m::COLLECTOR_DUPLICATE_REQUESTS_TOTAL).increment(1);
                debug!(
                    container_id = %request.container.id,
                    container_name = %request.container.name,
                    origin = %request.origin,
                    "container already being logged, deferring request"
                );
                return;
            }
            Admission::PathBusy { owner } => {
                metrics::counter!(m::COLLECTOR_DUPLICATE_REQUESTS_TOTAL).increment(1);
                warn!(
                    container_id = %request.container.id,
                    container_name = %request.container.name,
                    owner_id = %owner,
                    path = %path.display(),
                    "log path in use by another container, deferring request"
                );
                return;
            }
        };

        let sink = match RotatingSink::open(&path, self.settings.rotation.clone()).await {
            Ok(sink) => sink,
            Err(e) => {
                error!(
                    container_id = %request.container.id,
                    container_name = %request.container.name,
                    error = %e,
                    "failed to open log file"
                );
                self.registry.release(&request.container.id);
                return;
            }
        };

        let docker = Arc::clone(&self.docker);
        self.tasks.spawn(async move {
            let mut copier = StreamCopier::new(docker, request, sink);
            copier.run(token).await
        });
    }

    async fn on_task_finished(&mut self, report: CopyReport) {
        debug!(
            container_id = %report.container.id,
            bytes = report.bytes_copied,
            reason = %report.reason,
            "log copier finished"
        );

        if let Some(pending) = self.registry.release(&report.container.id) {
            info!(
                container_id = %pending.container.id,
                container_name = %pending.container.name,
                "replaying deferred start request"
            );
            self.spawn(pending).await;
        }
    }

    /// 루트 토큰을 취소하고 드레인 타임아웃까지 태스크를 기다립니다.
    async fn shutdown(
        mut self,
        watcher: JoinHandle<WatchExit>,
        watcher_done: bool,
    ) -> ShutdownReport {
        self.cancel.cancel();
        let deadline = tokio::time::Instant::now() + self.settings.drain_timeout;
        let mut report = ShutdownReport::default();

        let outstanding = self.tasks.len();
        info!(
            tasks = outstanding,
            timeout_secs = self.settings.drain_timeout.as_secs_f64(),
            "draining log copiers"
        );

        let drain = async {
            while let Some(joined) = self.tasks.join_next().await {
                report.drained += 1;
                if let Err(e) = joined {
                    warn!(error = %e, "log copier task failed during drain");
                }
            }
        };
        if tokio::time::timeout_at(deadline, drain).await.is_err() {
            report.aborted = self.tasks.len();
            warn!(
                aborted = report.aborted,
                "drain timeout elapsed, aborting remaining copiers"
            );
            self.tasks.abort_all();
            while self.tasks.join_next().await.is_some() {}
        }

        if !watcher_done {
            let mut watcher = watcher;
            if tokio::time::timeout_at(deadline, &mut watcher).await.is_err() {
                watcher.abort();
            }
        }

        info!(
            drained = report.drained,
            aborted = report.aborted,
            "log collection stopped"
        );
        report
    }
}

/// `{log_dir}/{name}.log` 경로를 만듭니다. 이름이 비어 있으면 짧은 ID를 씁니다.
pub fn log_path_for(log_dir: &std::path::Path, container: &ContainerRef) -> PathBuf {
    let stem: String = container
        .file_stem()
        .chars()
        .map(|c| if std::path::is_separator(c) { '_' } else { c })
        .collect();
    log_dir.join(format!("{stem}.log"))
}

/// [`Supervisor`] 빌더
pub struct SupervisorBuilder<D: DockerClient> {
    settings: CollectorSettings,
    docker: Option<Arc<D>>,
    cancel: Option<CancellationToken>,
}

impl<D: DockerClient> Default for SupervisorBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DockerClient> SupervisorBuilder<D> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            settings: CollectorSettings::default(),
            docker: None,
            cancel: None,
        }
    }

    /// 컬렉터 설정을 지정합니다.
    pub fn settings(mut self, settings: CollectorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Docker 클라이언트를 설정합니다.
    pub fn docker_client(mut self, docker: Arc<D>) -> Self {
        self.docker = Some(docker);
        self
    }

    /// 외부 루트 토큰을 사용합니다. 지정하지 않으면 새 토큰을 만듭니다.
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// supervisor를 빌드합니다.
    pub fn build(self) -> Result<Supervisor<D>, CollectorError> {
        self.settings.validate()?;

        let docker = self.docker.ok_or_else(|| CollectorError::Config {
            field: "docker_client".to_owned(),
            reason: "docker client must be provided".to_owned(),
        })?;

        Ok(Supervisor {
            docker,
            settings: self.settings,
            cancel: self.cancel.unwrap_or_else(CancellationToken::new),
            registry: TaskRegistry::new(),
            tasks: JoinSet::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::docker::{LogChunk, MockDockerClient, StartEvent};
    use crate::filter::TargetFilter;

    fn settings(dir: &Path) -> CollectorSettings {
        CollectorSettings {
            log_dir: dir.to_path_buf(),
            drain_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    fn web() -> ContainerRef {
        ContainerRef::new("1111111111111111aaaa", "web")
    }

    #[test]
    fn log_path_uses_name() {
        let path = log_path_for(Path::new("/logs"), &web());
        assert_eq!(path, PathBuf::from("/logs/web.log"));
    }

    #[test]
    fn log_path_falls_back_to_short_id() {
        let path = log_path_for(Path::new("/logs"), &ContainerRef::new("abc123456789ffff", ""));
        assert_eq!(path, PathBuf::from("/logs/abc123456789.log"));
    }

    #[test]
    fn log_path_never_escapes_log_dir() {
        let path = log_path_for(Path::new("/logs"), &ContainerRef::new("abc", "a/../b"));
        assert_eq!(path.parent(), Some(Path::new("/logs")));
    }

    #[test]
    fn build_requires_docker_client() {
        let result = SupervisorBuilder::<MockDockerClient>::new().build();
        assert!(matches!(result, Err(CollectorError::Config { .. })));
    }

    #[test]
    fn build_validates_settings() {
        let mut bad = CollectorSettings::default();
        bad.rotation.max_size_bytes = 0;
        let result = SupervisorBuilder::new()
            .settings(bad)
            .docker_client(Arc::new(MockDockerClient::new()))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn discovery_failure_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = SupervisorBuilder::new()
            .settings(settings(dir.path()))
            .docker_client(Arc::new(MockDockerClient::new().with_failing_list()))
            .build()
            .unwrap();

        let result = supervisor.run(std::future::pending()).await;
        assert!(matches!(result, Err(CollectorError::Discovery(_))));
    }

    #[tokio::test]
    async fn discovered_containers_are_logged_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (log_tx, log_rx) = mpsc::unbounded_channel();
        let docker = Arc::new(
            MockDockerClient::new()
                .with_running(vec![web()])
                .with_live_logs(&web().id, log_rx),
        );
        let supervisor = SupervisorBuilder::new()
            .settings(settings(dir.path()))
            .docker_client(Arc::clone(&docker))
            .build()
            .unwrap();
        let cancel = supervisor.cancel_token();

        let handle = tokio::spawn(supervisor.run(std::future::pending()));
        log_tx
            .send(Ok(LogChunk::Stdout(Bytes::from_static(b"hello\n"))))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let report = tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("supervisor should stop")
            .unwrap()
            .unwrap();
        assert_eq!(report.aborted, 0);
        assert_eq!(std::fs::read(dir.path().join("web.log")).unwrap(), b"hello\n");
    }

    #[tokio::test]
    async fn shutdown_future_stops_the_supervisor() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = SupervisorBuilder::new()
            .settings(settings(dir.path()))
            .docker_client(Arc::new(MockDockerClient::new()))
            .build()
            .unwrap();

        let report = tokio::time::timeout(
            Duration::from_secs(2),
            supervisor.run(tokio::time::sleep(Duration::from_millis(20))),
        )
        .await
        .expect("supervisor should stop")
        .unwrap();
        assert_eq!(report, ShutdownReport::default());
    }

    #[tokio::test]
    async fn start_event_for_target_spawns_copier() {
        let dir = tempfile::tempdir().unwrap();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let docker = Arc::new(
            MockDockerClient::new()
                .with_running(vec![web()])
                .with_logs(&web().id, vec![Ok(LogChunk::Stderr(Bytes::from_static(b"started\n")))])
                .with_events(event_rx),
        );
        let mut cfg = settings(dir.path());
        cfg.filter = TargetFilter::new(["web"]);
        let supervisor = SupervisorBuilder::new()
            .settings(cfg)
            .docker_client(Arc::clone(&docker))
            .build()
            .unwrap();
        let cancel = supervisor.cancel_token();
        let handle = tokio::spawn(supervisor.run(std::future::pending()));

        // 발견 단계에서 이미 한 번 붙은 뒤 스트림이 끝난다. 이벤트로 다시 붙는다.
        tokio::time::sleep(Duration::from_millis(50)).await;
        event_tx
            .send(Ok(StartEvent {
                container: web(),
                time: Some(1_700_000_000),
            }))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        let calls = docker.attach_calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], (web().id, Some(1_700_000_000)));
    }
}
