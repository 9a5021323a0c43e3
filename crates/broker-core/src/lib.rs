//! KIS 계좌 브로커의 핵심 도메인 모델.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 사용자/세션 식별자
//! - 브로커 자격증명 (접근 토큰 + 실시간 접속키)
//! - 실시간 시세/체결 이벤트 타입
//! - tracing 기반 로깅 초기화

pub mod domain;
pub mod logging;

pub use domain::credential::{AccessToken, Credential};
pub use domain::market_data::{ExecutionNotice, PriceTick, RealtimeEvent};
pub use domain::user::UserIdentity;
pub use logging::{init_logging, init_logging_from_env, LogConfig, LogFormat};
