//! 컨테이너 발견 -- 시작 시점의 실행 중 컨테이너 열거
//!
//! [`Discoverer`]는 실행 중인 컨테이너 목록을 가져와 필터를 적용하고,
//! 초기 copier 태스크의 씨앗이 될 요청을 만듭니다.
//! 목록 조회 실패는 치명적이며 호출자가 프로세스를 종료합니다.

use std::sync::Arc;

use logkeep_core::types::ContainerRef;
use tracing::{debug, info};

use crate::docker::DockerClient;
use crate::error::CollectorError;
use crate::event::SpawnRequest;
use crate::filter::TargetFilter;

/// 실행 중 컨테이너 열거기
pub struct Discoverer<D: DockerClient> {
    docker: Arc<D>,
}

impl<D: DockerClient> Discoverer<D> {
    /// 새 Discoverer를 생성합니다.
    pub fn new(docker: Arc<D>) -> Self {
        Self { docker }
    }

    /// 실행 중인 모든 컨테이너를 반환합니다.
    pub async fn discover(&self) -> Result<Vec<ContainerRef>, CollectorError> {
        let containers = self
            .docker
            .list_running_containers()
            .await
            .map_err(|e| CollectorError::Discovery(e.to_string()))?;
        debug!(count = containers.len(), "listed running containers");
        Ok(containers)
    }

    /// 필터에 매칭되는 실행 중 컨테이너를 반환합니다.
    pub async fn discover_targets(
        &self,
        filter: &TargetFilter,
    ) -> Result<Vec<ContainerRef>, CollectorError> {
        let containers = self.discover().await?;
        let total = containers.len();
        let targets: Vec<ContainerRef> = containers
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect();

        info!(
            running = total,
            targets = targets.len(),
            "discovered containers"
        );
        Ok(targets)
    }

    /// 필터에 매칭되는 컨테이너마다 수집 요청을 만듭니다.
    pub async fn initial_requests(
        &self,
        filter: &TargetFilter,
    ) -> Result<Vec<SpawnRequest>, CollectorError> {
        Ok(self
            .discover_targets(filter)
            .await?
            .into_iter()
            .map(SpawnRequest::discovered)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::MockDockerClient;
    use crate::event::SpawnOrigin;

    fn fleet() -> MockDockerClient {
        MockDockerClient::new()
            .with_running(vec![
                ContainerRef::new("1111111111111111", "/web"),
                ContainerRef::new("2222222222222222", "/db"),
            ])
            .with_stopped(vec![ContainerRef::new("abc123456789def0", "/old")])
    }

    #[tokio::test]
    async fn discover_returns_running_only() {
        let discoverer = Discoverer::new(Arc::new(fleet()));
        let found = discoverer.discover().await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| c.name != "old"));
    }

    #[tokio::test]
    async fn discover_targets_applies_filter() {
        let discoverer = Discoverer::new(Arc::new(fleet()));
        let filter = TargetFilter::new(["web", "abc123456789"]);
        let targets = discoverer.discover_targets(&filter).await.unwrap();
        assert_eq!(targets, vec![ContainerRef::new("1111111111111111", "web")]);
    }

    #[tokio::test]
    async fn empty_filter_targets_everything_running() {
        let discoverer = Discoverer::new(Arc::new(fleet()));
        let targets = discoverer
            .discover_targets(&TargetFilter::match_all())
            .await
            .unwrap();
        assert_eq!(targets.len(), 2);
    }

    #[tokio::test]
    async fn listing_failure_is_a_discovery_error() {
        let discoverer = Discoverer::new(Arc::new(MockDockerClient::new().with_failing_list()));
        let err = discoverer.discover().await.unwrap_err();
        assert!(matches!(err, CollectorError::Discovery(_)));
    }

    #[tokio::test]
    async fn initial_requests_have_no_since() {
        let discoverer = Discoverer::new(Arc::new(fleet()));
        let requests = discoverer
            .initial_requests(&TargetFilter::match_all())
            .await
            .unwrap();
        assert!(requests.iter().all(|r| r.since.is_none()));
        assert!(requests.iter().all(|r| r.origin == SpawnOrigin::Discovered));
    }
}
