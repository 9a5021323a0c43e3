//! 실시간 시세 세션.
//!
//! 구성 요소 (아래에서 위로):
//! - [`state::ServiceState`]: 시작 플래그 + 바인딩된 사용자
//! - [`registry::SubscriptionRegistry`]: 구독 중인 종목 집합 (등록 순서 유지)
//! - [`connection::ConnectionManager`]: 연결/재연결/구독 복원
//! - [`subscription::SubscriptionManager`]: 구독/해제 와이어 메시지
//! - [`processor::RealtimeDataProcessor`]: 수신 프레임 디코딩
//! - [`broadcast::RealtimeBroadcaster`]: 타입드 이벤트 팬아웃
//! - [`service::RealtimeMarketService`]: 호출자에게 노출되는 표면

pub mod broadcast;
pub mod connection;
pub mod processor;
pub mod registry;
pub mod service;
pub mod state;
pub mod subscription;

pub use broadcast::RealtimeBroadcaster;
pub use connection::{BackoffPolicy, ConnectionManager, ConnectionState};
pub use processor::RealtimeDataProcessor;
pub use registry::SubscriptionRegistry;
pub use service::RealtimeMarketService;
pub use state::ServiceState;
pub use subscription::SubscriptionManager;
