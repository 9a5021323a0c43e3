//! 수신 프레임 디코딩.
//!
//! 게이트웨이의 인바운드 프레임은 두 종류입니다:
//! - 데이터: `암호화여부|TR_ID|데이터건수|응답데이터` 형태의 파이프
//!   구분 텍스트. 응답데이터는 `^` 구분 필드 나열.
//! - 제어: JSON (PINGPONG 하트비트, 구독 등록 ACK 등).
//!
//! 디코딩 실패는 경고 후 프레임을 버립니다. 스트림 중간의 깨진
//! 프레임 하나가 세션 전체를 멈춰서는 안 됩니다.

use broker_core::{ExecutionNotice, PriceTick, RealtimeEvent};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, warn};

use crate::session::broadcast::RealtimeBroadcaster;
use crate::tr_id;

/// 프레임을 디코딩해 타입드 이벤트로 발행합니다.
pub struct RealtimeDataProcessor {
    broadcaster: RealtimeBroadcaster,
}

impl RealtimeDataProcessor {
    /// 발행 대상 브로드캐스터를 받아 생성.
    pub fn new(broadcaster: RealtimeBroadcaster) -> Self {
        Self { broadcaster }
    }

    /// 수신 프레임 한 건 처리. 어떤 입력에도 에러를 내지 않습니다.
    pub fn process_frame(&self, raw: &str) {
        if raw.contains('|') {
            self.process_data_frame(raw);
        } else {
            self.process_control_frame(raw);
        }
    }

    fn process_data_frame(&self, raw: &str) {
        let parts: Vec<&str> = raw.split('|').collect();
        if parts.len() < 4 {
            warn!("파이프 프레임 필드 부족, 버림: {}", raw);
            return;
        }

        let frame_tr_id = parts[1];
        let data = parts[3];

        match frame_tr_id {
            tr_id::REALTIME_PRICE => {
                if let Some(tick) = parse_price_tick(data) {
                    self.broadcaster.publish(RealtimeEvent::Price(tick));
                } else {
                    warn!("체결가 프레임 파싱 실패, 버림");
                }
            }
            tr_id::EXECUTION_NOTICE => {
                if let Some(notice) = parse_execution_notice(data) {
                    self.broadcaster.publish(RealtimeEvent::Execution(notice));
                } else {
                    warn!("체결통보 프레임 파싱 실패, 버림");
                }
            }
            other => debug!(tr_id = %other, "처리 대상 아닌 TR, 버림"),
        }
    }

    fn process_control_frame(&self, raw: &str) {
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            warn!("해석 불가 프레임, 버림: {}", raw);
            return;
        };

        match value["header"]["tr_id"].as_str() {
            Some("PINGPONG") => debug!("게이트웨이 하트비트 수신"),
            Some(tr) => debug!(tr_id = %tr, "제어 응답 수신"),
            None => debug!("알 수 없는 제어 프레임"),
        }
    }
}

/// 체결가(H0STCNT0) 응답데이터 파싱.
///
/// 필드 배치: 0 종목코드, 1 체결시간, 2 체결가, 3 부호, 4 전일대비,
/// 5 등락률, 12 체결량, 13 누적거래량. 숫자 필드는 관대하게 읽어
/// 깨진 값은 0으로 둡니다.
fn parse_price_tick(data: &str) -> Option<PriceTick> {
    let fields: Vec<&str> = data.split('^').collect();
    if fields.len() < 14 {
        return None;
    }

    Some(PriceTick {
        symbol: fields[0].to_string(),
        trade_time: fields[1].to_string(),
        price: fields[2].parse().unwrap_or(Decimal::ZERO),
        sign: fields[3].to_string(),
        change: fields[4].parse().unwrap_or(Decimal::ZERO),
        change_rate: fields[5].parse().unwrap_or(Decimal::ZERO),
        volume: fields[12].parse().unwrap_or(0),
        acc_volume: fields[13].parse().unwrap_or(0),
    })
}

/// 체결통보(H0STCNI0) 응답데이터 파싱.
///
/// 필드 배치: 0 종목코드, 1 주문번호, 2 체결시간, 3 체결수량,
/// 4 체결단가.
fn parse_execution_notice(data: &str) -> Option<ExecutionNotice> {
    let fields: Vec<&str> = data.split('^').collect();
    if fields.len() < 5 {
        return None;
    }

    Some(ExecutionNotice {
        symbol: fields[0].to_string(),
        order_id: fields[1].to_string(),
        exec_time: fields[2].to_string(),
        quantity: fields[3].parse().unwrap_or(0),
        price: fields[4].parse().unwrap_or(Decimal::ZERO),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio::sync::broadcast::error::TryRecvError;

    fn processor() -> (RealtimeDataProcessor, tokio::sync::broadcast::Receiver<RealtimeEvent>) {
        let bus = RealtimeBroadcaster::default();
        let rx = bus.subscribe();
        (RealtimeDataProcessor::new(bus), rx)
    }

    fn price_frame() -> String {
        // 0:종목 1:시간 2:가격 3:부호 4:대비 5:등락률 ... 12:체결량 13:누적
        let data = "005930^093000^70000^2^500^0.72^x^x^x^x^x^x^10^15000";
        format!("0|H0STCNT0|001|{}", data)
    }

    #[tokio::test]
    async fn test_price_frame_decodes_to_tick() {
        let (proc_, mut rx) = processor();
        proc_.process_frame(&price_frame());

        let RealtimeEvent::Price(tick) = rx.try_recv().unwrap() else {
            panic!("expected price event");
        };
        assert_eq!(tick.symbol, "005930");
        assert_eq!(tick.trade_time, "093000");
        assert_eq!(tick.price, dec!(70000));
        assert_eq!(tick.sign, "2");
        assert_eq!(tick.change, dec!(500));
        assert_eq!(tick.change_rate, dec!(0.72));
        assert_eq!(tick.volume, 10);
        assert_eq!(tick.acc_volume, 15000);
    }

    #[tokio::test]
    async fn test_execution_frame_decodes_to_notice() {
        let (proc_, mut rx) = processor();
        proc_.process_frame("0|H0STCNI0|001|005930^ORD123^093001^5^70100");

        let RealtimeEvent::Execution(notice) = rx.try_recv().unwrap() else {
            panic!("expected execution event");
        };
        assert_eq!(notice.symbol, "005930");
        assert_eq!(notice.order_id, "ORD123");
        assert_eq!(notice.exec_time, "093001");
        assert_eq!(notice.quantity, 5);
        assert_eq!(notice.price, dec!(70100));
    }

    #[tokio::test]
    async fn test_heartbeat_fires_no_event() {
        let (proc_, mut rx) = processor();
        proc_.process_frame(r#"{"header":{"tr_id":"PINGPONG","datetime":"20260830093000"}}"#);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_subscribe_ack_fires_no_event() {
        let (proc_, mut rx) = processor();
        proc_.process_frame(
            r#"{"header":{"tr_id":"H0STCNT0"},"body":{"rt_cd":"0","msg1":"SUBSCRIBE SUCCESS"}}"#,
        );
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_malformed_frames_are_dropped() {
        let (proc_, mut rx) = processor();

        proc_.process_frame("not json");
        proc_.process_frame("0|H0STCNT0|001"); // 파이프 필드 부족
        proc_.process_frame("0|H0STCNT0|001|005930^093000"); // ^ 필드 부족
        proc_.process_frame("0|H0UNKNOWN|001|whatever");

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_broken_numeric_fields_read_as_zero() {
        let (proc_, mut rx) = processor();
        proc_.process_frame("0|H0STCNT0|001|005930^093000^abc^2^500^0.72^x^x^x^x^x^x^bad^15000");

        let RealtimeEvent::Price(tick) = rx.try_recv().unwrap() else {
            panic!("expected price event");
        };
        assert_eq!(tick.price, Decimal::ZERO);
        assert_eq!(tick.volume, 0);
        assert_eq!(tick.acc_volume, 15000);
    }
}
