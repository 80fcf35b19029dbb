//! 수집 대상 필터
//!
//! [`TargetFilter`]는 설정의 허용 목록(컨테이너 이름 또는 12자 짧은 ID)으로
//! 컨테이너를 로그 수집 대상으로 삼을지 결정합니다.

use logkeep_core::types::{ContainerRef, SHORT_ID_LEN};

/// 수집 대상 허용 목록
///
/// 비어 있으면 모든 컨테이너에 매칭됩니다. 매칭은 이름 전체 또는
/// ID 앞 12자와의 정확한 문자열 비교이며, 부분 문자열이나 임의 길이
/// 접두어는 매칭하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFilter {
    tokens: Vec<String>,
}

impl TargetFilter {
    /// 토큰 목록으로 필터를 만듭니다.
    ///
    /// 앞뒤 공백은 제거하고 빈 토큰은 버리며, 중복은 처음 나온 순서를 유지해 하나로 합칩니다.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() || unique.iter().any(|t| t == token) {
                continue;
            }
            unique.push(token.to_owned());
        }
        Self { tokens: unique }
    }

    /// 모든 컨테이너에 매칭되는 필터
    pub fn match_all() -> Self {
        Self::default()
    }

    /// 허용 목록이 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// 정규화된 토큰 목록
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// 컨테이너가 이 필터에 매칭되는지 확인합니다.
    pub fn matches(&self, container: &ContainerRef) -> bool {
        if self.tokens.is_empty() {
            return true;
        }
        self.tokens.iter().any(|token| {
            *token == container.name || token_is_short_id_of(token, &container.id)
        })
    }
}

/// 토큰이 정확히 ID의 앞 12자와 같은지 확인합니다.
fn token_is_short_id_of(token: &str, id: &str) -> bool {
    if token.chars().count() != SHORT_ID_LEN {
        return false;
    }
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx] == token,
        None => id.chars().count() == SHORT_ID_LEN && id == token,
    }
}

/// 컨테이너를 로그 수집 대상으로 삼을지 결정합니다.
pub fn should_log(container: &ContainerRef, filter: &TargetFilter) -> bool {
    filter.matches(container)
}
