//! 게이트웨이 연동 에러 타입.

use thiserror::Error;

/// 세션 작업이 요구하는 사전 조건.
///
/// 호출자가 "시작된 적이 없음"과 "시작됐지만 사용자/토큰이 없음"을
/// 구분해 보고할 수 있도록 원인을 나눕니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// 세션이 시작되지 않음
    NotStarted,
    /// 바인딩된 사용자가 없음
    NoUser,
    /// 실시간 접속키가 설정되지 않음
    NoStreamToken,
}

impl std::fmt::Display for Precondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Precondition::NotStarted => "session not started",
            Precondition::NoUser => "no user bound to session",
            Precondition::NoStreamToken => "no stream approval key set",
        };
        f.write_str(s)
    }
}

/// KIS 게이트웨이 연동 에러.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 사전 조건 불충족 (호출자가 교정 가능, 자동 재시도 금지)
    #[error("Precondition failed: {0}")]
    PreconditionFailed(Precondition),

    /// 잘못된 인자 (빈 종목코드/토큰 등)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 게이트웨이가 비정상 HTTP 상태를 반환함
    #[error("Upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    /// 소켓 연결/전송 실패
    #[error("Transport error: {0}")]
    Transport(String),

    /// 응답/프레임 디코딩 실패
    #[error("Decode error: {0}")]
    Decode(String),

    /// 토큰 저장소 에러
    #[error("Token store error: {0}")]
    Store(String),
}

/// 게이트웨이 작업을 위한 Result 타입.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// 재시도 가능한 에러인지 확인.
    ///
    /// 사전 조건/인자 에러는 재시도해도 달라지지 않습니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_) | GatewayError::Upstream { .. }
        )
    }

    /// 해당 원인의 사전 조건 에러인지 확인.
    pub fn is_precondition(&self, cause: Precondition) -> bool {
        matches!(self, GatewayError::PreconditionFailed(c) if *c == cause)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}
