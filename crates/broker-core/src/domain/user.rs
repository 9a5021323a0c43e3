//! 세션에 바인딩되는 사용자 식별자.

use serde::{Deserialize, Serialize};

/// 실시간 세션의 소유자.
///
/// 세션은 단일 계좌로 동작하므로 한 번에 하나의 `UserIdentity`만
/// 바인딩됩니다. 토큰 저장소의 키로도 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// 사용자 식별자 (토큰 저장소 키)
    pub user_id: String,
    /// HTS ID (체결통보 수신에 필요한 경우)
    pub hts_id: Option<String>,
}

impl UserIdentity {
    /// 새 사용자 식별자 생성.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            hts_id: None,
        }
    }

    /// HTS ID 설정.
    pub fn with_hts_id(mut self, hts_id: impl Into<String>) -> Self {
        self.hts_id = Some(hts_id.into());
        self
    }

    /// 식별자가 비어 있는지 확인.
    pub fn is_empty(&self) -> bool {
        self.user_id.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_empty() {
        assert!(UserIdentity::new("").is_empty());
        assert!(UserIdentity::new("   ").is_empty());
        assert!(!UserIdentity::new("user-1").is_empty());
    }

    #[test]
    fn test_identity_hts_id() {
        let user = UserIdentity::new("user-1").with_hts_id("myhts");
        assert_eq!(user.hts_id.as_deref(), Some("myhts"));
    }
}
