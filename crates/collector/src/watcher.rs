//! 시작 이벤트 감시
//!
//! [`EventWatcher`]는 런타임의 컨테이너 시작 이벤트를 한 번 구독하고,
//! 필터에 매칭되는 이벤트마다 supervisor로 [`SpawnRequest`]를 보냅니다.
//! 전달 에러는 로그만 남기고 계속 감시합니다. 재구독이나 백오프는 없습니다.

use std::sync::Arc;

use futures::StreamExt;
use logkeep_core::metrics as m;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::docker::DockerClient;
use crate::event::SpawnRequest;
use crate::filter::TargetFilter;

/// 감시 루프 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// 취소 토큰이 발동됨
    Cancelled,
    /// 런타임이 이벤트 스트림을 닫음
    StreamClosed,
    /// supervisor 쪽 요청 채널이 닫힘
    ChannelClosed,
}

/// 컨테이너 시작 이벤트 감시자
pub struct EventWatcher<D: DockerClient> {
    docker: Arc<D>,
    filter: TargetFilter,
}

impl<D: DockerClient> EventWatcher<D> {
    /// 새 감시자를 생성합니다.
    pub fn new(docker: Arc<D>, filter: TargetFilter) -> Self {
        Self { docker, filter }
    }

    /// 취소되거나 스트림이 닫힐 때까지 시작 이벤트를 감시합니다.
    pub async fn watch(
        &self,
        cancel: CancellationToken,
        spawn_tx: mpsc::Sender<SpawnRequest>,
    ) -> WatchExit {
        let mut events = self.docker.start_events();
        info!("watching container start events");

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("event watcher cancelled");
                    return WatchExit::Cancelled;
                }
                item = events.next() => item,
            };

            let event = match item {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    metrics::counter!(m::COLLECTOR_EVENT_ERRORS_TOTAL).increment(1);
                    warn!(error = %e, "container event delivery failed");
                    continue;
                }
                None => {
                    error!("container event stream closed by runtime, no new containers will be picked up");
                    return WatchExit::StreamClosed;
                }
            };

            if !self.filter.matches(&event.container) {
                debug!(
                    container_id = %event.container.id,
                    container_name = %event.container.name,
                    "ignoring start event for non-target container"
                );
                continue;
            }

            info!(
                container_id = %event.container.id,
                container_name = %event.container.name,
                "container started"
            );

            let request = SpawnRequest::started(event.container, event.time);
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return WatchExit::Cancelled,
                res = spawn_tx.send(request) => res,
            };
            if sent.is_err() {
                debug!("spawn channel closed, stopping event watcher");
                return WatchExit::ChannelClosed;
            }
        }
    }
}
