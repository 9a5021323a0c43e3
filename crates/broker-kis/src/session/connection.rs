//! 스트림 연결 수명 주기 관리.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::transport::StreamTransport;

/// 연결 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// 연결 안 됨 (초기 상태)
    Disconnected,
    /// 연결 시도 중
    Connecting,
    /// 연결됨
    Connected,
    /// 백오프 후 재연결 시도 중
    Reconnecting,
    /// 재연결 시도 한도 초과
    GaveUp,
}

/// 재연결/복원 백오프 정책.
///
/// 기본값은 원 동작을 보존합니다: 고정 간격, 시도 횟수 무제한.
/// 한도가 필요한 호출자는 `max_attempts`를 설정합니다.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// 재연결 전 대기 시간
    pub reconnect_delay: Duration,
    /// 구독 복원 시 메시지 간 대기 시간 (게이트웨이 호출 간격 배려)
    pub replay_delay: Duration,
    /// 재연결 최대 시도 횟수 (`None` = 무제한)
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            replay_delay: Duration::from_millis(500),
            max_attempts: None,
        }
    }
}

impl BackoffPolicy {
    /// 재연결 대기 시간 설정.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// 복원 메시지 간격 설정.
    pub fn with_replay_delay(mut self, delay: Duration) -> Self {
        self.replay_delay = delay;
        self
    }

    /// 재연결 시도 한도 설정.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }
}

/// 전송 계층의 연결 수명 주기를 관리합니다.
///
/// 연결, 종료, 백오프 후 재연결, 그리고 재연결 뒤 호출자가 준
/// 구독 동작으로 레지스트리를 재생하는 일을 담당합니다.
pub struct ConnectionManager<T: StreamTransport> {
    transport: Arc<T>,
    url: String,
    policy: BackoffPolicy,
    state: Mutex<ConnectionState>,
    attempts: AtomicU32,
}

impl<T: StreamTransport> ConnectionManager<T> {
    /// 새 연결 관리자 생성.
    pub fn new(transport: Arc<T>, url: impl Into<String>, policy: BackoffPolicy) -> Self {
        Self {
            transport,
            url: url.into(),
            policy,
            state: Mutex::new(ConnectionState::Disconnected),
            attempts: AtomicU32::new(0),
        }
    }

    /// 현재 연결 상태.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    /// 연결 수립.
    ///
    /// 실패하면 `Disconnected`로 남고 에러를 올립니다. 재시도 여부는
    /// 호출자가 결정합니다.
    pub async fn connect(&self) -> GatewayResult<()> {
        self.set_state(ConnectionState::Connecting);

        match self.transport.connect(&self.url).await {
            Ok(()) => {
                self.set_state(ConnectionState::Connected);
                self.attempts.store(0, Ordering::SeqCst);
                info!(url = %self.url, "stream connected");
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// 연결 종료 (어느 상태에서든).
    ///
    /// 소켓이 이미 죽어 있을 수 있으므로 종료 실패는 무시합니다.
    pub async fn disconnect(&self) {
        if let Err(e) = self.transport.disconnect().await {
            debug!("transport close failed: {}", e);
        }
        self.set_state(ConnectionState::Disconnected);
        self.attempts.store(0, Ordering::SeqCst);
    }

    /// 고정 백오프 후 재연결.
    ///
    /// 한도를 설정하지 않았으면 호출자가 원하는 만큼 다시 호출할 수
    /// 있습니다. 한도를 넘으면 `GaveUp`으로 이동합니다.
    pub async fn reconnect(&self) -> GatewayResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(max) = self.policy.max_attempts {
            if attempt > max {
                self.set_state(ConnectionState::GaveUp);
                return Err(GatewayError::Transport(format!(
                    "재연결 시도 한도 초과 ({}회)",
                    max
                )));
            }
        }

        self.set_state(ConnectionState::Reconnecting);
        warn!(
            attempt,
            delay_secs = self.policy.reconnect_delay.as_secs(),
            "reconnecting after backoff"
        );
        sleep(self.policy.reconnect_delay).await;

        self.connect().await
    }

    /// 구독 복원 재생.
    ///
    /// 종목을 등록 순서대로 `subscribe_fn`에 넘기며, 게이트웨이 호출
    /// 간격을 위해 메시지 사이에 고정 지연을 둡니다. 한 종목의 복원
    /// 실패는 기록만 하고 나머지 재생을 계속합니다.
    pub async fn resubscribe<F, Fut>(&self, symbols: &[String], mut subscribe_fn: F)
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = GatewayResult<()>>,
    {
        for (idx, symbol) in symbols.iter().enumerate() {
            if idx > 0 {
                sleep(self.policy.replay_delay).await;
            }
            match subscribe_fn(symbol.clone()).await {
                Ok(()) => debug!(%symbol, "구독 복원"),
                Err(e) => warn!(%symbol, "구독 복원 실패: {}", e),
            }
        }
    }
}
