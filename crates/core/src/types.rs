//! 도메인 타입 -- 컨테이너 식별자와 로테이션 정책
//!
//! collector와 daemon이 공유하는 데이터 구조를 정의합니다.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 짧은 컨테이너 ID 길이 (Docker CLI 표기와 동일)
pub const SHORT_ID_LEN: usize = 12;

/// 1 MiB
const MIB: u64 = 1024 * 1024;

/// 하루(초)
const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// 관측된 컨테이너의 식별 정보
///
/// 한 번 생성되면 변경되지 않습니다. 이름 앞의 `/` 접두어는
/// 생성 시 제거됩니다 (Docker API는 `/web` 형태로 이름을 반환합니다).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerRef {
    /// 전체 컨테이너 ID
    pub id: String,
    /// 컨테이너 이름 (`/` 접두어 제거됨)
    pub name: String,
}

impl ContainerRef {
    /// 새 `ContainerRef`를 생성합니다.
    pub fn new(id: impl Into<String>, name: impl AsRef<str>) -> Self {
        Self {
            id: id.into(),
            name: name.as_ref().trim_start_matches('/').to_owned(),
        }
    }

    /// ID의 앞 12자를 반환합니다. ID가 더 짧으면 전체를 반환합니다.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(SHORT_ID_LEN) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }

    /// 로그 파일 이름에 사용할 stem을 반환합니다.
    ///
    /// 이름이 비어 있으면 짧은 ID를 사용합니다.
    pub fn file_stem(&self) -> &str {
        if self.name.is_empty() {
            self.short_id()
        } else {
            &self.name
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.short_id())
    }
}

/// 로그 파일 로테이션 정책
///
/// 실행 중에는 변경되지 않으며 설정에서 한 번 만들어집니다.
/// `max_backups == 0`이나 `max_age == 0`은 해당 제한이 없음을 뜻합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// 활성 파일 최대 크기 (바이트)
    pub max_size_bytes: u64,
    /// 보관할 백업 파일 최대 개수
    pub max_backups: usize,
    /// 백업 파일 최대 보관 기간
    pub max_age: Duration,
    /// 로테이션된 파일 gzip 압축 여부
    pub compress: bool,
}

impl RotationPolicy {
    /// 설정 단위(MB, 일)로 정책을 만듭니다.
    pub fn from_units(max_size_mb: u64, max_backups: usize, max_age_days: u64) -> Self {
        Self {
            max_size_bytes: max_size_mb.saturating_mul(MIB),
            max_backups,
            max_age: Duration::from_secs(max_age_days.saturating_mul(SECS_PER_DAY)),
            compress: true,
        }
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::from_units(10, 5, 30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_strips_leading_slash() {
        let c = ContainerRef::new("abc123def456789", "/web");
        assert_eq!(c.name, "web");
    }

    #[test]
    fn new_keeps_name_without_slash() {
        let c = ContainerRef::new("abc123def456789", "db");
        assert_eq!(c.name, "db");
    }

    #[test]
    fn short_id_is_first_twelve_chars() {
        let c = ContainerRef::new("abc123456789def000", "web");
        assert_eq!(c.short_id(), "abc123456789");
    }

    #[test]
    fn short_id_of_short_id_does_not_panic() {
        let c = ContainerRef::new("abc", "web");
        assert_eq!(c.short_id(), "abc");
    }

    #[test]
    fn file_stem_falls_back_to_short_id() {
        let c = ContainerRef::new("abc123456789def000", "");
        assert_eq!(c.file_stem(), "abc123456789");
    }

    #[test]
    fn display_shows_name_and_short_id() {
        let c = ContainerRef::new("abc123456789def000", "/web");
        assert_eq!(c.to_string(), "web (abc123456789)");
    }

    #[test]
    fn default_policy_matches_documented_defaults() {
        let p = RotationPolicy::default();
        assert_eq!(p.max_size_bytes, 10 * 1024 * 1024);
        assert_eq!(p.max_backups, 5);
        assert_eq!(p.max_age, Duration::from_secs(30 * 24 * 60 * 60));
        assert!(p.compress);
    }
}
