//! 도메인 타입 모음.

pub mod credential;
pub mod market_data;
pub mod user;
