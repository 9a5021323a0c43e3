//! 한국투자증권 (KIS) API 설정.
//!
//! KIS API는 app_key / app_secret을 사용한 OAuth 2.0 인증이 필요하며,
//! 실전투자와 모의투자가 서로 다른 엔드포인트를 사용합니다.

use serde::{Deserialize, Serialize};

/// KIS API 환경 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KisEnvironment {
    /// 실전투자
    Real,
    /// 모의투자
    #[default]
    Paper,
}

impl KisEnvironment {
    /// 이 환경의 REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &'static str {
        match self {
            KisEnvironment::Real => "https://openapi.koreainvestment.com:9443",
            KisEnvironment::Paper => "https://openapivts.koreainvestment.com:29443",
        }
    }

    /// 이 환경의 WebSocket URL 반환.
    pub fn websocket_url(&self) -> &'static str {
        match self {
            KisEnvironment::Real => "ws://ops.koreainvestment.com:21000",
            KisEnvironment::Paper => "ws://ops.koreainvestment.com:31000",
        }
    }
}

/// KIS API 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KisConfig {
    /// 앱키
    pub app_key: String,
    /// 앱시크릿
    pub app_secret: String,
    /// 환경 (실전/모의)
    pub environment: KisEnvironment,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// REST 기본 URL 재정의 (테스트 서버용)
    pub rest_base_override: Option<String>,
    /// WebSocket URL 재정의 (테스트 서버용)
    pub ws_url_override: Option<String>,
}

impl KisConfig {
    /// 새로운 KIS 설정 생성.
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        environment: KisEnvironment,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            environment,
            timeout_secs: 30,
            rest_base_override: None,
            ws_url_override: None,
        }
    }

    /// REST 기본 URL 재정의.
    pub fn with_rest_base_url(mut self, url: impl Into<String>) -> Self {
        self.rest_base_override = Some(url.into());
        self
    }

    /// WebSocket URL 재정의.
    pub fn with_websocket_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url_override = Some(url.into());
        self
    }

    /// 환경 변수에서 설정 생성.
    ///
    /// # 환경 변수
    /// - `KIS_APP_KEY`, `KIS_APP_SECRET` (필수)
    /// - `KIS_ENVIRONMENT`: "real" | "paper" (기본값: paper)
    pub fn from_env() -> Option<Self> {
        let app_key = std::env::var("KIS_APP_KEY").ok()?;
        let app_secret = std::env::var("KIS_APP_SECRET").ok()?;
        let environment = match std::env::var("KIS_ENVIRONMENT").ok().as_deref() {
            Some("real") => KisEnvironment::Real,
            _ => KisEnvironment::Paper,
        };

        Some(Self::new(app_key, app_secret, environment))
    }

    /// REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &str {
        self.rest_base_override
            .as_deref()
            .unwrap_or_else(|| self.environment.rest_base_url())
    }

    /// WebSocket URL 반환.
    pub fn websocket_url(&self) -> &str {
        self.ws_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.websocket_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_urls() {
        assert_eq!(
            KisEnvironment::Real.rest_base_url(),
            "https://openapi.koreainvestment.com:9443"
        );
        assert_eq!(
            KisEnvironment::Paper.rest_base_url(),
            "https://openapivts.koreainvestment.com:29443"
        );
        assert_eq!(
            KisEnvironment::Real.websocket_url(),
            "ws://ops.koreainvestment.com:21000"
        );
        assert_eq!(
            KisEnvironment::Paper.websocket_url(),
            "ws://ops.koreainvestment.com:31000"
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = KisConfig::new("key", "secret", KisEnvironment::Paper);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.rest_base_url(), KisEnvironment::Paper.rest_base_url());
    }

    #[test]
    fn test_config_overrides() {
        let config = KisConfig::new("key", "secret", KisEnvironment::Paper)
            .with_rest_base_url("http://127.0.0.1:9999")
            .with_websocket_url("ws://127.0.0.1:9998");

        assert_eq!(config.rest_base_url(), "http://127.0.0.1:9999");
        assert_eq!(config.websocket_url(), "ws://127.0.0.1:9998");
    }
}
