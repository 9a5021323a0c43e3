//! 브로커 토큰 수명 주기.
//!
//! 접근 토큰(REST)과 접속키(WebSocket)는 항상 쌍으로 갱신·저장됩니다.

pub mod lifecycle;
pub mod store;

pub use lifecycle::TokenLifecycleService;
pub use store::{MemoryTokenStore, TokenStore, TokenTransaction};
