//! 한국투자증권 (KIS) 실시간 시세 게이트웨이.
//!
//! OAuth 토큰 수명 주기와 WebSocket 실시간 세션을 제공합니다:
//! - [`token::TokenLifecycleService`]: 접근 토큰/접속키 발급·갱신·폐기
//! - [`session::RealtimeMarketService`]: 구독 관리, 재연결 복원, 이벤트 팬아웃
//!
//! ```no_run
//! use std::sync::Arc;
//! use broker_core::UserIdentity;
//! use broker_kis::{BackoffPolicy, KisConfig, KisEnvironment};
//! use broker_kis::{MemoryTokenStore, RealtimeMarketService, WsTransport};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = KisConfig::new("app-key", "app-secret", KisEnvironment::Paper);
//! let service = RealtimeMarketService::new(
//!     config,
//!     Arc::new(WsTransport::new()),
//!     Arc::new(MemoryTokenStore::new()),
//!     BackoffPolicy::default(),
//! )?;
//!
//! let mut events = service.events();
//! service.start_session(UserIdentity::new("user-1")).await?;
//! service.subscribe_symbol("005930").await?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{}: {:?}", event.symbol(), event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod session;
pub mod token;
pub mod transport;

/// KIS 실시간 TR 코드.
pub mod tr_id {
    /// 국내주식 실시간 체결가
    pub const REALTIME_PRICE: &str = "H0STCNT0";
    /// 국내주식 실시간 체결통보
    pub const EXECUTION_NOTICE: &str = "H0STCNI0";
}

pub use config::{KisConfig, KisEnvironment};
pub use error::{GatewayError, GatewayResult, Precondition};
pub use session::{BackoffPolicy, ConnectionState, RealtimeMarketService};
pub use token::{MemoryTokenStore, TokenLifecycleService, TokenStore, TokenTransaction};
pub use transport::{StreamTransport, WsTransport};
