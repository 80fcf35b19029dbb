//! 활성 copier 레지스트리
//!
//! 컨테이너 ID마다, 그리고 로그 파일 경로마다 활성 작성자가 최대 하나임을 보장합니다.
//!
//! 중복 요청 정책: 이미 활성인 컨테이너(또는 경로)에 대한 요청은 바로 실행하지 않고
//! 보류해 두었다가 활성 태스크가 끝나면 한 번 다시 실행합니다. 재시작 이벤트가
//! 이전 스트림의 종료보다 먼저 도착해도 재시작 이후 출력을 놓치지 않습니다.
//! 보류 슬롯은 하나이며 가장 최근 요청이 남습니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::event::SpawnRequest;

/// 요청 수락 결과
#[derive(Debug)]
pub enum Admission {
    /// 새 태스크를 실행합니다. 토큰은 루트 토큰의 자식입니다.
    Spawn(CancellationToken),
    /// 같은 컨테이너가 이미 활성이라 보류됨
    Deferred,
    /// 같은 경로를 다른 컨테이너가 쓰고 있어 보류됨
    PathBusy {
        /// 경로를 소유한 컨테이너 ID
        owner: String,
    },
}

#[derive(Debug)]
struct Entry {
    path: PathBuf,
    pending: Option<SpawnRequest>,
}

/// 컨테이너 ID → 활성 태스크 맵
#[derive(Debug, Default)]
pub struct TaskRegistry {
    active: HashMap<String, Entry>,
    paths: HashMap<PathBuf, String>,
}

impl TaskRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 요청을 수락할지 결정하고, 수락하면 활성 항목으로 등록합니다.
    pub fn admit(
        &mut self,
        request: &SpawnRequest,
        path: &Path,
        parent: &CancellationToken,
    ) -> Admission {
        let id = &request.container.id;

        if let Some(entry) = self.active.get_mut(id) {
            entry.pending = Some(request.clone());
            return Admission::Deferred;
        }

        if let Some(owner) = self.paths.get(path) {
            let owner = owner.clone();
            if let Some(entry) = self.active.get_mut(&owner) {
                entry.pending = Some(request.clone());
            }
            return Admission::PathBusy { owner };
        }

        let token = parent.child_token();
        self.active.insert(
            id.clone(),
            Entry {
                path: path.to_path_buf(),
                pending: None,
            },
        );
        self.paths.insert(path.to_path_buf(), id.clone());
        Admission::Spawn(token)
    }

    /// 활성 항목을 제거하고 보류된 요청이 있으면 반환합니다.
    pub fn release(&mut self, container_id: &str) -> Option<SpawnRequest> {
        let entry = self.active.remove(container_id)?;
        self.paths.remove(&entry.path);
        entry.pending
    }

    /// 활성 태스크 수
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// 활성 태스크가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use logkeep_core::types::ContainerRef;

    use super::*;

    fn request(id: &str, name: &str) -> SpawnRequest {
        SpawnRequest::discovered(ContainerRef::new(id, name))
    }

    #[test]
    fn first_request_is_spawned() {
        let mut registry = TaskRegistry::new();
        let root = CancellationToken::new();
        let admission = registry.admit(&request("a1", "web"), Path::new("/l/web.log"), &root);
        assert!(matches!(admission, Admission::Spawn(_)));
        assert_eq!(registry.len(), 1);

        let same_path = registry.admit(&request("b2", "web"), Path::new("/l/web.log"), &root);
        assert!(matches!(same_path, Admission::PathBusy { ref owner } if owner == "a1"));
    }

    #[test]
    fn duplicate_is_deferred_and_replayed_once() {
        let mut registry = TaskRegistry::new();
        let root = CancellationToken::new();
        let path = Path::new("/l/web.log");
        registry.admit(&request("a1", "web"), path, &root);

        let dup = SpawnRequest::started(ContainerRef::new("a1", "web"), Some(99));
        assert!(matches!(registry.admit(&dup, path, &root), Admission::Deferred));
        assert_eq!(registry.len(), 1);

        let pending = registry.release("a1").unwrap();
        assert_eq!(pending.since, Some(99));
        assert!(registry.is_empty());
        assert!(registry.release("a1").is_none());
    }

    #[test]
    fn path_conflict_with_other_id_is_held() {
        let mut registry = TaskRegistry::new();
        let root = CancellationToken::new();
        let path = Path::new("/l/web.log");
        registry.admit(&request("old", "web"), path, &root);

        let admission = registry.admit(&request("new", "web"), path, &root);
        assert!(matches!(admission, Admission::PathBusy { ref owner } if owner == "old"));
        assert_eq!(registry.len(), 1);

        let pending = registry.release("old").unwrap();
        assert_eq!(pending.container.id, "new");
        assert!(matches!(
            registry.admit(&pending, path, &root),
            Admission::Spawn(_)
        ));
    }

    #[test]
    fn latest_pending_request_wins() {
        let mut registry = TaskRegistry::new();
        let root = CancellationToken::new();
        let path = Path::new("/l/web.log");
        registry.admit(&request("a1", "web"), path, &root);
        registry.admit(
            &SpawnRequest::started(ContainerRef::new("a1", "web"), Some(1)),
            path,
            &root,
        );
        registry.admit(
            &SpawnRequest::started(ContainerRef::new("a1", "web"), Some(2)),
            path,
            &root,
        );
        assert_eq!(registry.release("a1").unwrap().since, Some(2));
    }

    #[test]
    fn child_tokens_follow_root() {
        let mut registry = TaskRegistry::new();
        let root = CancellationToken::new();
        let Admission::Spawn(token) =
            registry.admit(&request("a1", "web"), Path::new("/l/web.log"), &root)
        else {
            panic!("expected spawn");
        };
        root.cancel();
        assert!(token.is_cancelled());
    }
}
