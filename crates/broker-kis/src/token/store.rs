//! 토큰 저장소 인터페이스.
//!
//! 실제 저장 방식(DB, 파일 등)은 이 크레이트 밖의 관심사입니다.
//! 여기서는 최소한의 계약만 정의합니다: 조회, 그리고 접근 토큰과
//! 접속키를 함께 커밋하거나 함께 버리는 2단계 쓰기 트랜잭션.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use broker_core::{AccessToken, Credential};
use tokio::sync::RwLock;

use crate::error::{GatewayError, GatewayResult};

/// 진행 중인 자격증명 쓰기 트랜잭션.
///
/// `commit` 전에는 어떤 쓰기도 저장소에 보이지 않아야 합니다.
#[async_trait]
pub trait TokenTransaction: Send {
    /// 접근 토큰 쓰기 예약.
    async fn save_access_token(&mut self, user_id: &str, token: &AccessToken)
        -> GatewayResult<()>;

    /// 접속키 쓰기 예약.
    async fn save_approval_key(&mut self, user_id: &str, approval_key: &str)
        -> GatewayResult<()>;

    /// 예약된 쓰기를 원자적으로 반영.
    async fn commit(self: Box<Self>) -> GatewayResult<()>;

    /// 예약된 쓰기를 모두 버림.
    async fn rollback(self: Box<Self>) -> GatewayResult<()>;
}

/// 사용자별 자격증명 저장소.
#[async_trait]
pub trait TokenStore: Send + Sync + 'static {
    /// 저장된 자격증명 조회.
    async fn load(&self, user_id: &str) -> GatewayResult<Option<Credential>>;

    /// 쓰기 트랜잭션 시작.
    async fn begin(&self) -> GatewayResult<Box<dyn TokenTransaction>>;

    /// 자격증명 삭제 (로그아웃/폐기 시).
    async fn delete(&self, user_id: &str) -> GatewayResult<()>;
}

/// 인메모리 토큰 저장소.
///
/// 단일 프로세스 배포와 테스트에서 사용합니다. SQL 기반 구현은
/// 동일한 trait 뒤에서 이 크레이트 밖에 존재합니다.
#[derive(Default)]
pub struct MemoryTokenStore {
    inner: Arc<RwLock<HashMap<String, Credential>>>,
}

impl MemoryTokenStore {
    /// 빈 저장소 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 자격증명 직접 삽입 (부트스트랩/테스트용).
    pub async fn insert(&self, user_id: impl Into<String>, credential: Credential) {
        self.inner.write().await.insert(user_id.into(), credential);
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self, user_id: &str) -> GatewayResult<Option<Credential>> {
        Ok(self.inner.read().await.get(user_id).cloned())
    }

    async fn begin(&self) -> GatewayResult<Box<dyn TokenTransaction>> {
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            pending_access: HashMap::new(),
            pending_approval: HashMap::new(),
        }))
    }

    async fn delete(&self, user_id: &str) -> GatewayResult<()> {
        self.inner.write().await.remove(user_id);
        Ok(())
    }
}

/// `MemoryTokenStore`의 버퍼링 트랜잭션.
struct MemoryTransaction {
    inner: Arc<RwLock<HashMap<String, Credential>>>,
    pending_access: HashMap<String, AccessToken>,
    pending_approval: HashMap<String, String>,
}

#[async_trait]
impl TokenTransaction for MemoryTransaction {
    async fn save_access_token(
        &mut self,
        user_id: &str,
        token: &AccessToken,
    ) -> GatewayResult<()> {
        self.pending_access.insert(user_id.to_string(), token.clone());
        Ok(())
    }

    async fn save_approval_key(
        &mut self,
        user_id: &str,
        approval_key: &str,
    ) -> GatewayResult<()> {
        self.pending_approval
            .insert(user_id.to_string(), approval_key.to_string());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> GatewayResult<()> {
        let mut map = self.inner.write().await;

        // 반영 전 검증: 접속키만 있는 사용자는 기존 자격증명이 있어야 함
        for user_id in self.pending_approval.keys() {
            if !self.pending_access.contains_key(user_id) && !map.contains_key(user_id) {
                return Err(GatewayError::Store(format!(
                    "접근 토큰 없이 접속키만 커밋할 수 없습니다: {}",
                    user_id
                )));
            }
        }

        for (user_id, access) in self.pending_access.drain() {
            let approval_key = self
                .pending_approval
                .remove(&user_id)
                .or_else(|| map.get(&user_id).map(|c| c.approval_key.clone()))
                .unwrap_or_default();
            map.insert(user_id, Credential::new(access, approval_key));
        }

        for (user_id, key) in self.pending_approval.drain() {
            if let Some(cred) = map.get_mut(&user_id) {
                cred.approval_key = key;
            }
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> GatewayResult<()> {
        // 버퍼만 버리면 됨
        Ok(())
    }
}
