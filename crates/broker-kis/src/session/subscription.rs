//! 실시간 구독/해제 와이어 메시지.
//!
//! 종목 하나를 구독하면 게이트웨이에 등록 메시지 두 건이 나갑니다:
//! 체결통보(H0STCNI0) 먼저, 체결가(H0STCNT0) 다음. 해제도 같은 쌍을
//! 역할만 바꿔(tr_type) 보냅니다.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult, Precondition};
use crate::session::registry::SubscriptionRegistry;
use crate::transport::StreamTransport;
use crate::tr_id;

const TR_TYPE_REGISTER: &str = "1";
const TR_TYPE_UNREGISTER: &str = "2";

#[derive(Serialize)]
struct SubscribeRequest<'a> {
    header: SubscribeHeader<'a>,
    body: SubscribeBody<'a>,
}

#[derive(Serialize)]
struct SubscribeHeader<'a> {
    approval_key: &'a str,
    custtype: &'a str,
    tr_type: &'a str,
    #[serde(rename = "content-type")]
    content_type: &'a str,
}

#[derive(Serialize)]
struct SubscribeBody<'a> {
    input: SubscribeInput<'a>,
}

#[derive(Serialize)]
struct SubscribeInput<'a> {
    tr_id: &'a str,
    tr_key: &'a str,
}

fn build_message(
    approval_key: &str,
    tr_type: &str,
    tr_id: &str,
    symbol: &str,
) -> GatewayResult<String> {
    let request = SubscribeRequest {
        header: SubscribeHeader {
            approval_key,
            custtype: "P",
            tr_type,
            content_type: "utf-8",
        },
        body: SubscribeBody {
            input: SubscribeInput { tr_id, tr_key: symbol },
        },
    };
    Ok(serde_json::to_string(&request)?)
}

/// 구독/해제 메시지를 조립해 전송하고 레지스트리를 관리합니다.
///
/// 레지스트리 반영은 와이어 전송 성공 뒤에만 일어납니다. 전송에
/// 실패한 종목이 레지스트리에 남으면 재연결 복원이 게이트웨이가
/// 모르는 구독을 재생하게 됩니다.
pub struct SubscriptionManager<T: StreamTransport> {
    transport: Arc<T>,
    registry: Arc<SubscriptionRegistry>,
    approval_key: RwLock<Option<String>>,
}

impl<T: StreamTransport> SubscriptionManager<T> {
    /// 새 구독 관리자 생성.
    pub fn new(transport: Arc<T>, registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            transport,
            registry,
            approval_key: RwLock::new(None),
        }
    }

    /// 실시간 접속키 설정. 이후 구독 메시지 헤더에 사용됩니다.
    pub fn set_stream_token(&self, approval_key: &str) -> GatewayResult<()> {
        if approval_key.trim().is_empty() {
            return Err(GatewayError::InvalidArgument(
                "접속키가 비어 있습니다".to_string(),
            ));
        }
        *self
            .approval_key
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(approval_key.to_string());
        Ok(())
    }

    fn current_key(&self) -> GatewayResult<String> {
        self.approval_key
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(GatewayError::PreconditionFailed(Precondition::NoStreamToken))
    }

    /// 종목 구독.
    ///
    /// 이미 구독 중이면 아무 메시지도 보내지 않고 성공합니다.
    /// 두 등록 메시지 중 하나라도 실패하면 레지스트리에 기록하지
    /// 않고 에러를 올립니다.
    pub async fn subscribe(&self, symbol: &str) -> GatewayResult<()> {
        if symbol.trim().is_empty() {
            return Err(GatewayError::InvalidArgument(
                "종목코드가 비어 있습니다".to_string(),
            ));
        }
        if self.registry.contains(symbol) {
            debug!(%symbol, "이미 구독 중");
            return Ok(());
        }

        let key = self.current_key()?;
        self.send_pair(&key, TR_TYPE_REGISTER, symbol).await?;

        self.registry.insert(symbol);
        info!(%symbol, "실시간 구독 등록");
        Ok(())
    }

    /// 종목 구독 해제.
    ///
    /// 해제 메시지 실패는 기록만 하고 레지스트리에서는 항상
    /// 제거합니다. 소켓이 죽어 있어도 로컬 상태는 호출자의 의도를
    /// 따라야 하기 때문입니다.
    pub async fn unsubscribe(&self, symbol: &str) -> GatewayResult<()> {
        if !self.registry.contains(symbol) {
            return Ok(());
        }

        if let Ok(key) = self.current_key() {
            if let Err(e) = self.send_pair(&key, TR_TYPE_UNREGISTER, symbol).await {
                warn!(%symbol, "구독 해제 메시지 전송 실패: {}", e);
            }
        }

        self.registry.remove(symbol);
        info!(%symbol, "실시간 구독 해제");
        Ok(())
    }

    /// 전체 구독 해제 (세션 중지 시).
    pub async fn unsubscribe_all(&self) {
        for symbol in self.registry.snapshot() {
            if let Err(e) = self.unsubscribe(&symbol).await {
                warn!(%symbol, "구독 해제 실패: {}", e);
            }
        }
    }

    /// 레지스트리를 건드리지 않고 등록 메시지 쌍만 재전송.
    ///
    /// 재연결 후 구독 복원 전용입니다.
    pub async fn resubscribe(&self, symbol: &str) -> GatewayResult<()> {
        let key = self.current_key()?;
        self.send_pair(&key, TR_TYPE_REGISTER, symbol).await
    }

    /// 현재 구독 중인 종목 (등록 순서).
    pub fn subscribed(&self) -> Vec<String> {
        self.registry.snapshot()
    }

    async fn send_pair(&self, key: &str, tr_type: &str, symbol: &str) -> GatewayResult<()> {
        // 체결통보를 먼저 등록해야 첫 체결가 수신 전에 통보 경로가 열림
        let notice = build_message(key, tr_type, tr_id::EXECUTION_NOTICE, symbol)?;
        self.transport.send(&notice).await?;

        let price = build_message(key, tr_type, tr_id::REALTIME_PRICE, symbol)?;
        self.transport.send(&price).await?;
        Ok(())
    }
}
