//! 브로커 자격증명.
//!
//! KIS 게이트웨이는 두 종류의 자격증명을 요구합니다:
//! - 접근 토큰: REST 호출용 (POST /oauth2/tokenP 발급)
//! - 접속키 (approval_key): 실시간 WebSocket 인증용 (POST /oauth2/Approval 발급)
//!
//! 둘은 항상 쌍으로 저장됩니다. 접근 토큰만 새것이고 접속키가 낡은
//! 자격증명은 사용할 수 없는 상태이므로, 갱신은 트랜잭션으로 함께
//! 커밋됩니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 만료 시각이 포함된 접근 토큰.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// 접근 토큰
    pub access_token: String,
    /// 토큰 타입 (항상 "Bearer")
    pub token_type: String,
    /// 만료 시각 (UTC)
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// 새 접근 토큰 생성.
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_at,
        }
    }

    /// 토큰이 아직 유효한지 확인.
    ///
    /// 호출 시점의 벽시계를 읽습니다. 결과를 캐싱하지 마세요.
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }

    /// Authorization 헤더 값 반환.
    pub fn auth_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// 접근 토큰 + 실시간 접속키 쌍.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// REST 접근 토큰
    pub access: AccessToken,
    /// WebSocket 접속키
    pub approval_key: String,
}

impl Credential {
    /// 자격증명 쌍 생성.
    pub fn new(access: AccessToken, approval_key: impl Into<String>) -> Self {
        Self {
            access,
            approval_key: approval_key.into(),
        }
    }

    /// 쌍 전체가 사용 가능한 상태인지 확인.
    ///
    /// 게이트웨이는 접속키의 만료를 알려주지 않으므로, 접근 토큰이
    /// 유효하고 접속키가 존재하면 사용 가능한 것으로 간주합니다.
    pub fn is_usable(&self) -> bool {
        self.access.is_valid() && !self.approval_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_in: Duration) -> AccessToken {
        AccessToken::new("tok", "Bearer", Utc::now() + expires_in)
    }

    #[test]
    fn test_token_validity_reads_clock() {
        assert!(token(Duration::hours(1)).is_valid());
        assert!(!token(Duration::seconds(-1)).is_valid());
    }

    #[test]
    fn test_auth_header() {
        assert_eq!(token(Duration::hours(1)).auth_header(), "Bearer tok");
    }

    #[test]
    fn test_credential_usability() {
        let good = Credential::new(token(Duration::hours(1)), "key");
        assert!(good.is_usable());

        let no_key = Credential::new(token(Duration::hours(1)), "");
        assert!(!no_key.is_usable());

        let expired = Credential::new(token(Duration::seconds(-1)), "key");
        assert!(!expired.is_usable());
    }
}
