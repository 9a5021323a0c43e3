//! 세션 상태 가드.

use std::sync::{Mutex, MutexGuard};

use broker_core::UserIdentity;

use crate::error::{GatewayError, GatewayResult, Precondition};

#[derive(Debug, Default)]
struct StateInner {
    started: bool,
    user: Option<UserIdentity>,
}

/// 시작 플래그와 바인딩된 사용자를 보관하는 스레드 안전 홀더.
///
/// 불변식: `user`는 `started`가 true일 때만 존재합니다.
/// 모든 읽기/쓰기는 하나의 뮤텍스로 직렬화되며, 락을 잡은 채
/// I/O를 수행하지 않습니다.
#[derive(Debug, Default)]
pub struct ServiceState {
    inner: Mutex<StateInner>,
}

impl ServiceState {
    /// 중지 상태로 생성.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StateInner> {
        // 락 보유 중 패닉한 쓰레드의 상태를 그대로 이어받음
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 세션 시작: 사용자를 바인딩하고 시작 플래그를 올립니다.
    ///
    /// 이미 시작된 세션에 다시 호출하면 사용자를 덮어씁니다.
    /// 깨끗한 재시작이 필요하면 먼저 `stop()`을 호출하세요
    /// (문서화된 사전 조건이며 여기서 강제하지 않습니다).
    pub fn start(&self, user: UserIdentity) -> GatewayResult<()> {
        if user.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "사용자 식별자가 비어 있습니다".to_string(),
            ));
        }

        let mut inner = self.lock();
        inner.started = true;
        inner.user = Some(user);
        Ok(())
    }

    /// 세션 중지: 플래그와 사용자를 함께 비웁니다. 항상 성공합니다.
    pub fn stop(&self) {
        let mut inner = self.lock();
        inner.started = false;
        inner.user = None;
    }

    /// 시작 여부 확인.
    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    /// 시작되지 않았으면 `PreconditionFailed(NotStarted)`.
    pub fn ensure_started(&self) -> GatewayResult<()> {
        if self.lock().started {
            Ok(())
        } else {
            Err(GatewayError::PreconditionFailed(Precondition::NotStarted))
        }
    }

    /// 바인딩된 사용자 반환. 없으면 `PreconditionFailed(NoUser)`.
    ///
    /// `ensure_started`와 구분되는 에러를 내어, 호출자가 "시작된 적
    /// 없음"과 "시작됐지만 사용자 없음"을 다르게 보고할 수 있습니다.
    pub fn ensure_user(&self) -> GatewayResult<UserIdentity> {
        self.lock()
            .user
            .clone()
            .ok_or(GatewayError::PreconditionFailed(Precondition::NoUser))
    }

    /// 현재 사용자 조회 (가드 없이).
    pub fn current_user(&self) -> Option<UserIdentity> {
        self.lock().user.clone()
    }
}
