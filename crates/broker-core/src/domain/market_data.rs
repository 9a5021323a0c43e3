//! 실시간 스트림에서 디코딩된 시장 이벤트 타입.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 실시간 체결가 틱.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTick {
    /// 종목코드
    pub symbol: String,
    /// 체결가
    pub price: Decimal,
    /// 체결량
    pub volume: i64,
    /// 누적거래량
    pub acc_volume: i64,
    /// 체결시간 (HHMMSS)
    pub trade_time: String,
    /// 전일대비 부호 (1:상한, 2:상승, 3:보합, 4:하한, 5:하락)
    pub sign: String,
    /// 전일대비
    pub change: Decimal,
    /// 등락률
    pub change_rate: Decimal,
}

/// 주문 체결통보.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionNotice {
    /// 종목코드
    pub symbol: String,
    /// 주문번호
    pub order_id: String,
    /// 체결수량
    pub quantity: i64,
    /// 체결단가
    pub price: Decimal,
    /// 체결시간 (HHMMSS)
    pub exec_time: String,
}

/// 다운스트림으로 발행되는 타입드 이벤트.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    /// 시세 수신
    Price(PriceTick),
    /// 체결통보 수신
    Execution(ExecutionNotice),
}

impl RealtimeEvent {
    /// 이벤트가 속한 종목코드 반환.
    pub fn symbol(&self) -> &str {
        match self {
            RealtimeEvent::Price(tick) => &tick.symbol,
            RealtimeEvent::Execution(notice) => &notice.symbol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_event_symbol() {
        let tick = PriceTick {
            symbol: "005930".to_string(),
            price: dec!(70000),
            volume: 10,
            acc_volume: 1000,
            trade_time: "093000".to_string(),
            sign: "2".to_string(),
            change: dec!(500),
            change_rate: dec!(0.72),
        };
        assert_eq!(RealtimeEvent::Price(tick).symbol(), "005930");
    }
}
