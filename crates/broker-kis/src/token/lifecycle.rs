//! KIS OAuth 토큰 수명 주기 서비스.
//!
//! 처리 기능:
//! - 접근 토큰 발급 (POST /oauth2/tokenP)
//! - WebSocket 접속키 발급 (POST /oauth2/Approval)
//! - 토큰 폐기 (POST /oauth2/revokeP)
//! - 만료 검사 및 갱신 (`ensure_valid_token`)
//!
//! 갱신은 사용자별 single-flight로 보호됩니다. 게이트웨이의 토큰
//! 발급은 호출 횟수가 제한되어 있고, 중복 발급은 진행 중인 토큰을
//! 무효화할 수 있기 때문입니다. 늦게 도착한 호출자는 진행 중인
//! 갱신의 결과를 그대로 관찰합니다.

use std::collections::HashMap;
use std::sync::Arc;

use broker_core::{AccessToken, Credential, UserIdentity};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::KisConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::token::store::{TokenStore, TokenTransaction};

/// KIS OAuth 토큰 응답.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: i64,
    /// 만료 시각 (KIS 형식: "YYYY-MM-DD HH:MM:SS", KST)
    access_token_token_expired: String,
}

/// KIS WebSocket 접속 승인 응답.
#[derive(Debug, Deserialize)]
struct ApprovalResponse {
    approval_key: String,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    appkey: &'a str,
    appsecret: &'a str,
}

/// 접속키 발급은 시크릿 필드명이 다름 (게이트웨이 특성).
#[derive(Serialize)]
struct ApprovalRequest<'a> {
    grant_type: &'a str,
    appkey: &'a str,
    secretkey: &'a str,
}

#[derive(Serialize)]
struct RevokeRequest<'a> {
    appkey: &'a str,
    appsecret: &'a str,
    token: &'a str,
}

/// 토큰 수명 주기 서비스.
///
/// 접근 토큰과 접속키는 하나의 저장소 트랜잭션으로 함께 커밋됩니다.
/// 한쪽만 새것인 자격증명 쌍은 사용할 수 없는 상태이기 때문입니다.
pub struct TokenLifecycleService<S: TokenStore> {
    config: KisConfig,
    client: Client,
    store: Arc<S>,
    refresh_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: TokenStore> TokenLifecycleService<S> {
    /// 새 수명 주기 서비스 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `GatewayError::Transport`를 반환합니다.
    pub fn new(config: KisConfig, store: Arc<S>) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(format!("HTTP client 생성 실패: {}", e)))?;

        Ok(Self {
            config,
            client,
            store,
            refresh_locks: Mutex::new(HashMap::new()),
        })
    }

    /// 접근 토큰 발급.
    pub async fn refresh_access_token(&self) -> GatewayResult<AccessToken> {
        let url = format!("{}/oauth2/tokenP", self.config.rest_base_url());
        let body = TokenRequest {
            grant_type: "client_credentials",
            appkey: &self.config.app_key,
            appsecret: &self.config.app_secret,
        };

        info!("Requesting new KIS access token...");
        let raw = self.post_json(&url, &body).await?;

        let resp: TokenResponse = serde_json::from_str(&raw)
            .map_err(|e| GatewayError::Decode(format!("토큰 응답 파싱 실패: {}", e)))?;

        let expires_at = parse_kis_datetime(&resp.access_token_token_expired)
            .unwrap_or_else(|| Utc::now() + Duration::seconds(resp.expires_in));

        let token = AccessToken::new(resp.access_token, resp.token_type, expires_at);
        info!("KIS access token obtained, expires at: {}", token.expires_at);
        Ok(token)
    }

    /// WebSocket 접속키 발급.
    pub async fn refresh_stream_approval(&self) -> GatewayResult<String> {
        let url = format!("{}/oauth2/Approval", self.config.rest_base_url());
        let body = ApprovalRequest {
            grant_type: "client_credentials",
            appkey: &self.config.app_key,
            secretkey: &self.config.app_secret,
        };

        info!("Requesting WebSocket approval key...");
        let raw = self.post_json(&url, &body).await?;

        let resp: ApprovalResponse = serde_json::from_str(&raw)
            .map_err(|e| GatewayError::Decode(format!("접속키 응답 파싱 실패: {}", e)))?;

        info!("WebSocket approval key obtained");
        Ok(resp.approval_key)
    }

    /// 유효한 자격증명 쌍 보장.
    ///
    /// 저장된 쌍이 사용 가능하면 그대로 반환하고, 아니면 접근 토큰과
    /// 접속키를 모두 새로 발급해 하나의 트랜잭션으로 저장합니다.
    /// 같은 사용자의 갱신은 한 번에 하나만 진행됩니다.
    pub async fn ensure_valid_token(&self, user: &UserIdentity) -> GatewayResult<Credential> {
        if user.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "사용자 식별자가 비어 있습니다".to_string(),
            ));
        }

        if let Some(cred) = self.store.load(&user.user_id).await? {
            if cred.is_usable() {
                debug!(user = %user.user_id, "Using stored credential");
                return Ok(cred);
            }
            warn!(user = %user.user_id, "Stored credential expired, refreshing...");
        }

        let lock = self.user_lock(&user.user_id).await;
        let _guard = lock.lock().await;

        // 대기하는 동안 다른 호출자의 갱신이 끝났을 수 있음
        if let Some(cred) = self.store.load(&user.user_id).await? {
            if cred.is_usable() {
                debug!(user = %user.user_id, "Refresh already completed by in-flight caller");
                return Ok(cred);
            }
        }

        let mut tx = self.store.begin().await?;
        match self.refresh_into(&user.user_id, tx.as_mut()).await {
            Ok(cred) => {
                tx.commit().await?;
                info!(user = %user.user_id, "Credential pair refreshed");
                Ok(cred)
            }
            Err(e) => {
                // 이전 자격증명이 저장소에 그대로 남아야 함
                if let Err(rb) = tx.rollback().await {
                    warn!("토큰 트랜잭션 롤백 실패: {}", rb);
                }
                Err(e)
            }
        }
    }

    /// 현재 접근 토큰 폐기 (로그아웃 시).
    ///
    /// 게이트웨이 호출이 실패해도 로컬 상태는 비웁니다.
    pub async fn revoke_token(&self, user: &UserIdentity) -> GatewayResult<()> {
        let Some(cred) = self.store.load(&user.user_id).await? else {
            return Ok(());
        };

        let url = format!("{}/oauth2/revokeP", self.config.rest_base_url());
        let body = RevokeRequest {
            appkey: &self.config.app_key,
            appsecret: &self.config.app_secret,
            token: &cred.access.access_token,
        };

        info!(user = %user.user_id, "Revoking KIS access token...");
        if let Err(e) = self.post_json(&url, &body).await {
            warn!("Token revocation failed, clearing local state anyway: {}", e);
        }

        self.store.delete(&user.user_id).await
    }

    /// 두 발급을 수행하며 트랜잭션에 차례로 기록.
    async fn refresh_into(
        &self,
        user_id: &str,
        tx: &mut dyn TokenTransaction,
    ) -> GatewayResult<Credential> {
        let access = self.refresh_access_token().await?;
        tx.save_access_token(user_id, &access).await?;

        let approval_key = self.refresh_stream_approval().await?;
        tx.save_approval_key(user_id, &approval_key).await?;

        Ok(Credential::new(access, approval_key))
    }

    /// 사용자별 갱신 락 조회/생성.
    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// JSON POST 공통 처리. 비정상 상태는 `Upstream`으로 변환.
    async fn post_json<B: Serialize>(&self, url: &str, body: &B) -> GatewayResult<String> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json; charset=utf-8")
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body: raw,
            });
        }

        Ok(raw)
    }
}

/// KIS 날짜시간 형식 파싱 ("YYYY-MM-DD HH:MM:SS", KST 기준).
fn parse_kis_datetime(s: &str) -> Option<DateTime<Utc>> {
    use chrono::{NaiveDateTime, TimeZone};
    use chrono_tz::Asia::Seoul;

    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()?;
    let kst = Seoul.from_local_datetime(&naive).single()?;
    Some(kst.with_timezone(&Utc))
}
