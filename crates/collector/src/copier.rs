//! 스트림 복사기 -- 컨테이너 로그 스트림을 로테이션 싱크로 옮김
//!
//! [`StreamCopier`]는 컨테이너 하나당 하나씩 실행됩니다.
//! 상태는 `Attaching -> Streaming -> Closed` 한 방향으로만 진행하며,
//! 연결과 읽기 대기 지점에서 취소 토큰을 관측합니다. 이미 읽은 청크의 파일 기록은
//! 취소되지 않으며, 종료 시간은 supervisor의 드레인 타임아웃이 제한합니다.
//! 어떤 경로로 끝나든 스트림을 해제하고 싱크를 닫습니다.

use std::sync::Arc;

use futures::StreamExt;
use logkeep_core::metrics as m;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::docker::{DockerClient, LogChunk};
use crate::error::CollectorError;
use crate::event::{CloseReason, CopyReport, SpawnRequest};
use crate::sink::RotatingSink;

/// copier 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopierState {
    /// 로그 스트림 연결 중
    Attaching,
    /// 바이트 복사 중
    Streaming,
    /// 종료됨
    Closed(CloseReason),
}

/// 한 번의 대기 결과
enum Step<T> {
    Ready(T),
    Cancelled,
}

/// 컨테이너 하나의 로그 스트림을 싱크로 복사합니다.
pub struct StreamCopier<D: DockerClient> {
    client: Arc<D>,
    request: SpawnRequest,
    sink: RotatingSink,
    state: CopierState,
    bytes_copied: u64,
}

impl<D: DockerClient> StreamCopier<D> {
    /// 새 copier를 생성합니다.
    pub fn new(client: Arc<D>, request: SpawnRequest, sink: RotatingSink) -> Self {
        Self {
            client,
            request,
            sink,
            state: CopierState::Attaching,
            bytes_copied: 0,
        }
    }

    /// 현재 상태
    pub fn state(&self) -> &CopierState {
        &self.state
    }

    /// 스트림이 끝나거나 취소될 때까지 복사합니다.
    ///
    /// 연결 실패는 재시도하지 않습니다.
    pub async fn run(&mut self, cancel: CancellationToken) -> CopyReport {
        if self.state != CopierState::Attaching {
            return self.report();
        }

        let client = Arc::clone(&self.client);
        let container_id = self.request.container.id.clone();
        let since = self.request.since;

        debug!(
            container_id = %container_id,
            container_name = %self.request.container.name,
            origin = %self.request.origin,
            since = ?since,
            "attaching to log stream"
        );

        let attached = tokio::select! {
            biased;
            _ = cancel.cancelled() => Step::Cancelled,
            res = client.attach_logs(&container_id, since) => Step::Ready(res),
        };

        let mut stream = match attached {
            Step::Cancelled => return self.finish(CloseReason::Cancelled).await,
            Step::Ready(Err(e)) => {
                metrics::counter!(m::COLLECTOR_ATTACH_FAILURES_TOTAL).increment(1);
                return self.finish(CloseReason::AttachFailed(e.to_string())).await;
            }
            Step::Ready(Ok(stream)) => stream,
        };

        self.state = CopierState::Streaming;
        metrics::gauge!(m::COLLECTOR_ACTIVE_COPIERS).increment(1.0);
        info!(
            container_id = %container_id,
            container_name = %self.request.container.name,
            path = %self.sink.path().display(),
            "streaming container logs"
        );

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                item = stream.next() => Step::Ready(item),
            };

            let chunk = match next {
                Step::Cancelled => break CloseReason::Cancelled,
                Step::Ready(None) => break CloseReason::Clean,
                Step::Ready(Some(Err(e))) => break CloseReason::StreamError(e.to_string()),
                Step::Ready(Some(Ok(chunk))) => chunk,
            };

            // 스트림에서 꺼낸 청크는 취소와 무관하게 끝까지 기록한다
            if let Err(e) = self.write_chunk(&chunk).await {
                break CloseReason::WriteFailed(e.to_string());
            }
        };

        drop(stream);
        self.finish(reason).await
    }

    async fn write_chunk(&mut self, chunk: &LogChunk) -> Result<(), CollectorError> {
        let n = self.sink.write(chunk.bytes()).await?;
        self.bytes_copied += n as u64;
        metrics::counter!(m::COLLECTOR_BYTES_WRITTEN_TOTAL, m::LABEL_STREAM => chunk.stream_name())
            .increment(n as u64);
        Ok(())
    }

    async fn finish(&mut self, reason: CloseReason) -> CopyReport {
        if self.state == CopierState::Streaming {
            metrics::gauge!(m::COLLECTOR_ACTIVE_COPIERS).decrement(1.0);
        }

        if let Err(e) = self.sink.close().await {
            warn!(
                container_id = %self.request.container.id,
                path = %self.sink.path().display(),
                error = %e,
                "failed to close log file"
            );
        }

        let container = &self.request.container;
        if reason.is_error() {
            warn!(
                container_id = %container.id,
                container_name = %container.name,
                bytes = self.bytes_copied,
                error = %reason,
                "log copier stopped"
            );
        } else if reason == CloseReason::Clean {
            info!(
                container_id = %container.id,
                container_name = %container.name,
                bytes = self.bytes_copied,
                "log stream ended"
            );
        } else {
            debug!(
                container_id = %container.id,
                container_name = %container.name,
                bytes = self.bytes_copied,
                "log copier cancelled"
            );
        }

        metrics::counter!(m::COLLECTOR_COPIERS_CLOSED_TOTAL, m::LABEL_REASON => reason.label())
            .increment(1);
        self.state = CopierState::Closed(reason);
        self.report()
    }

    fn report(&self) -> CopyReport {
        let reason = match &self.state {
            CopierState::Closed(reason) => reason.clone(),
            _ => CloseReason::Cancelled,
        };
        CopyReport {
            container: self.request.container.clone(),
            bytes_copied: self.bytes_copied,
            reason,
        }
    }
}
