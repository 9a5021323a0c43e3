//! 실시간 시세 세션의 호출자 표면.
//!
//! 세션 시작은 자격증명 확보, 접속키 설정, 소켓 연결, 수신 루프
//! 기동을 순서대로 수행합니다. 중간 단계가 실패하면 세션 상태를
//! 시작 전으로 되돌린 뒤 에러를 올립니다. 절반만 시작된 세션이
//! 이후 호출의 사전 조건 검사를 통과해서는 안 됩니다.

use std::sync::{Arc, Mutex as StdMutex};

use broker_core::{RealtimeEvent, UserIdentity};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::KisConfig;
use crate::error::GatewayResult;
use crate::session::broadcast::RealtimeBroadcaster;
use crate::session::connection::{BackoffPolicy, ConnectionManager, ConnectionState};
use crate::session::processor::RealtimeDataProcessor;
use crate::session::registry::SubscriptionRegistry;
use crate::session::state::ServiceState;
use crate::session::subscription::SubscriptionManager;
use crate::token::{TokenLifecycleService, TokenStore};
use crate::transport::StreamTransport;

/// 실시간 시세 세션 서비스.
pub struct RealtimeMarketService<T: StreamTransport, S: TokenStore> {
    state: Arc<ServiceState>,
    registry: Arc<SubscriptionRegistry>,
    connection: Arc<ConnectionManager<T>>,
    subscriptions: Arc<SubscriptionManager<T>>,
    tokens: TokenLifecycleService<S>,
    broadcaster: RealtimeBroadcaster,
    transport: Arc<T>,
    reader: StdMutex<Option<JoinHandle<()>>>,
}

impl<T: StreamTransport, S: TokenStore> RealtimeMarketService<T, S> {
    /// 새 세션 서비스 생성.
    ///
    /// # Errors
    /// 토큰 서비스의 HTTP 클라이언트 생성에 실패하면 `Transport`를 반환합니다.
    pub fn new(
        config: KisConfig,
        transport: Arc<T>,
        store: Arc<S>,
        policy: BackoffPolicy,
    ) -> GatewayResult<Self> {
        let registry = Arc::new(SubscriptionRegistry::new());
        let connection = Arc::new(ConnectionManager::new(
            Arc::clone(&transport),
            config.websocket_url(),
            policy,
        ));
        let subscriptions = Arc::new(SubscriptionManager::new(
            Arc::clone(&transport),
            Arc::clone(&registry),
        ));
        let tokens = TokenLifecycleService::new(config, store)?;

        Ok(Self {
            state: Arc::new(ServiceState::new()),
            registry,
            connection,
            subscriptions,
            tokens,
            broadcaster: RealtimeBroadcaster::default(),
            transport,
            reader: StdMutex::new(None),
        })
    }

    /// 세션 시작.
    ///
    /// 1. 사용자 바인딩
    /// 2. 자격증명 쌍 확보 (필요 시 갱신)
    /// 3. 접속키 설정
    /// 4. 소켓 연결
    /// 5. 수신 루프 기동
    pub async fn start_session(&self, user: UserIdentity) -> GatewayResult<()> {
        self.state.start(user.clone())?;

        let result = self.bring_up(&user).await;
        if let Err(e) = result {
            self.state.stop();
            return Err(e);
        }

        self.spawn_reader();
        info!(user = %user.user_id, "실시간 세션 시작");
        Ok(())
    }

    async fn bring_up(&self, user: &UserIdentity) -> GatewayResult<()> {
        let cred = self.tokens.ensure_valid_token(user).await?;
        self.subscriptions.set_stream_token(&cred.approval_key)?;
        self.connection.connect().await
    }

    /// 세션 중지. 항상 성공합니다.
    ///
    /// 상태를 먼저 내려 수신 루프가 재연결 대신 종료를 선택하게
    /// 하고, 구독 레지스트리를 비운 뒤 소켓을 닫습니다.
    pub async fn stop_session(&self) {
        self.state.stop();
        self.registry.clear();
        self.connection.disconnect().await;

        if let Some(handle) = self.reader.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
        info!("실시간 세션 중지");
    }

    /// 종목 구독. 세션 시작과 사용자 바인딩이 선행돼야 합니다.
    pub async fn subscribe_symbol(&self, symbol: &str) -> GatewayResult<()> {
        self.state.ensure_started()?;
        self.state.ensure_user()?;
        self.subscriptions.subscribe(symbol).await
    }

    /// 종목 구독 해제.
    pub async fn unsubscribe_symbol(&self, symbol: &str) -> GatewayResult<()> {
        self.state.ensure_started()?;
        self.state.ensure_user()?;
        self.subscriptions.unsubscribe(symbol).await
    }

    /// 현재 구독 목록 (등록 순서의 복사본).
    pub fn subscribed_symbols(&self) -> GatewayResult<Vec<String>> {
        self.state.ensure_started()?;
        Ok(self.subscriptions.subscribed())
    }

    /// 디코딩된 이벤트 수신기 발급. 세션 시작 여부와 무관합니다.
    pub fn events(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.broadcaster.subscribe()
    }

    /// 세션 시작 여부.
    pub fn is_started(&self) -> bool {
        self.state.is_started()
    }

    /// 현재 연결 상태.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// 토큰 수명 주기 서비스 접근 (폐기 등 세션 외 작업용).
    pub fn tokens(&self) -> &TokenLifecycleService<S> {
        &self.tokens
    }

    /// 수신 루프 기동. 기존 루프가 있으면 중단하고 교체합니다.
    fn spawn_reader(&self) {
        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);
        let connection = Arc::clone(&self.connection);
        let subscriptions = Arc::clone(&self.subscriptions);
        let registry = Arc::clone(&self.registry);
        let processor = RealtimeDataProcessor::new(self.broadcaster.clone());

        let handle = tokio::spawn(async move {
            loop {
                match transport.next_frame().await {
                    Some(frame) => processor.process_frame(&frame),
                    None => {
                        if !state.is_started() {
                            break;
                        }
                        warn!("스트림 끊김, 재연결 시도");
                        if !recover(&state, &connection, &subscriptions, &registry).await {
                            break;
                        }
                    }
                }
            }
        });

        let mut guard = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = guard.replace(handle) {
            old.abort();
        }
    }
}

/// 재연결과 구독 복원. 루프를 계속할 수 있으면 `true`.
async fn recover<T: StreamTransport>(
    state: &ServiceState,
    connection: &ConnectionManager<T>,
    subscriptions: &Arc<SubscriptionManager<T>>,
    registry: &SubscriptionRegistry,
) -> bool {
    loop {
        if !state.is_started() {
            return false;
        }
        match connection.reconnect().await {
            Ok(()) => break,
            Err(e) => {
                if connection.state() == ConnectionState::GaveUp {
                    warn!("재연결 포기: {}", e);
                    return false;
                }
                warn!("재연결 실패, 재시도: {}", e);
            }
        }
    }

    if !state.is_started() {
        return false;
    }

    let symbols = registry.snapshot();
    info!(count = symbols.len(), "구독 복원 시작");
    let subs = Arc::clone(subscriptions);
    connection
        .resubscribe(&symbols, move |symbol| {
            let subs = Arc::clone(&subs);
            async move { subs.resubscribe(&symbol).await }
        })
        .await;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KisEnvironment;
    use crate::error::{GatewayError, Precondition};
    use crate::token::MemoryTokenStore;
    use crate::transport::testing::MockTransport;
    use serde_json::json;
    use std::time::Duration;

    fn fast_policy() -> BackoffPolicy {
        BackoffPolicy::default()
            .with_reconnect_delay(Duration::from_millis(10))
            .with_replay_delay(Duration::from_millis(5))
    }

    async fn mock_gateway() -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/tokenP")
            .with_status(200)
            .with_body(
                json!({
                    "access_token": "tok",
                    "token_type": "Bearer",
                    "expires_in": 86400,
                    "access_token_token_expired": "2099-01-01 00:00:00"
                })
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("POST", "/oauth2/Approval")
            .with_status(200)
            .with_body(json!({ "approval_key": "approval" }).to_string())
            .create_async()
            .await;
        server
    }

    fn service(
        server: &mockito::Server,
        transport: Arc<MockTransport>,
    ) -> RealtimeMarketService<MockTransport, MemoryTokenStore> {
        let config = KisConfig::new("key", "secret", KisEnvironment::Paper)
            .with_rest_base_url(server.url())
            .with_websocket_url("ws://mock");
        RealtimeMarketService::new(config, transport, Arc::new(MemoryTokenStore::new()), fast_policy())
            .unwrap()
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_operations_require_started_session() {
        let server = mock_gateway().await;
        let svc = service(&server, Arc::new(MockTransport::new()));

        let err = svc.subscribe_symbol("005930").await.unwrap_err();
        assert!(err.is_precondition(Precondition::NotStarted));
        assert!(svc.subscribed_symbols().is_err());
    }

    #[tokio::test]
    async fn test_start_session_rejects_empty_user() {
        let server = mock_gateway().await;
        let svc = service(&server, Arc::new(MockTransport::new()));

        let err = svc.start_session(UserIdentity::new("")).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArgument(_)));
        assert!(!svc.is_started());
    }

    #[tokio::test]
    async fn test_start_session_connects_and_decodes() {
        let server = mock_gateway().await;
        let transport = Arc::new(MockTransport::new());
        let svc = service(&server, Arc::clone(&transport));

        svc.start_session(UserIdentity::new("u1")).await.unwrap();
        assert!(svc.is_started());
        assert_eq!(svc.connection_state(), ConnectionState::Connected);

        let mut events = svc.events();
        transport.push_frame("0|H0STCNT0|001|005930^093000^70000^2^500^0.72^x^x^x^x^x^x^10^15000");

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.symbol(), "005930");

        svc.stop_session().await;
    }

    #[tokio::test]
    async fn test_token_failure_rolls_back_session_state() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/tokenP")
            .with_status(500)
            .with_body("gateway down")
            .create_async()
            .await;

        let svc = service(&server, Arc::new(MockTransport::new()));
        let err = svc.start_session(UserIdentity::new("u1")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Upstream { status: 500, .. }));

        // 절반 시작 금지: 이후 호출은 여전히 사전 조건에 걸려야 함
        assert!(!svc.is_started());
        let err = svc.subscribe_symbol("005930").await.unwrap_err();
        assert!(err.is_precondition(Precondition::NotStarted));
    }

    #[tokio::test]
    async fn test_connect_failure_rolls_back_session_state() {
        let server = mock_gateway().await;
        let transport = Arc::new(MockTransport::new());
        transport
            .connect_failures
            .store(1, std::sync::atomic::Ordering::SeqCst);

        let svc = service(&server, Arc::clone(&transport));
        assert!(svc.start_session(UserIdentity::new("u1")).await.is_err());
        assert!(!svc.is_started());
    }

    #[tokio::test]
    async fn test_stop_session_clears_subscriptions() {
        let server = mock_gateway().await;
        let transport = Arc::new(MockTransport::new());
        let svc = service(&server, Arc::clone(&transport));

        svc.start_session(UserIdentity::new("u1")).await.unwrap();
        svc.subscribe_symbol("005930").await.unwrap();
        svc.stop_session().await;

        assert!(!svc.is_started());
        assert_eq!(svc.connection_state(), ConnectionState::Disconnected);
        assert!(svc.subscribed_symbols().is_err());

        // 재시작하면 빈 구독 목록에서 다시 시작
        svc.start_session(UserIdentity::new("u1")).await.unwrap();
        assert!(svc.subscribed_symbols().unwrap().is_empty());
        svc.stop_session().await;
    }

    #[tokio::test]
    async fn test_reconnect_replays_subscriptions_in_order() {
        let server = mock_gateway().await;
        let transport = Arc::new(MockTransport::new());
        let svc = service(&server, Arc::clone(&transport));

        svc.start_session(UserIdentity::new("u1")).await.unwrap();
        svc.subscribe_symbol("005930").await.unwrap();
        svc.subscribe_symbol("000660").await.unwrap();
        transport.clear_sent();

        transport.drop_stream();

        // 재연결 + 복원: 종목당 등록 메시지 2건, 등록 순서 유지
        wait_until(|| transport.sent().len() >= 4).await;
        wait_until(|| transport.connect_count() >= 2).await;

        let keys: Vec<String> = transport
            .sent()
            .iter()
            .map(|m| {
                let v: serde_json::Value = serde_json::from_str(m).unwrap();
                v["body"]["input"]["tr_key"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(keys, vec!["005930", "005930", "000660", "000660"]);

        // 복원은 레지스트리를 건드리지 않음
        assert_eq!(svc.subscribed_symbols().unwrap(), vec!["005930", "000660"]);

        svc.stop_session().await;
    }
}
