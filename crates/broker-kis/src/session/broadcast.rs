//! 타입드 이벤트 팬아웃.

use broker_core::RealtimeEvent;
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 1024;

/// 디코딩된 이벤트를 구독자들에게 팬아웃합니다.
///
/// tokio broadcast 채널을 그대로 감싼 얇은 타입입니다. 발행은 절대
/// 블로킹하지 않으며, 느린 구독자는 자기 수신기에서 `Lagged`를
/// 관찰할 뿐 프레임 처리 루프를 멈추지 못합니다.
#[derive(Clone)]
pub struct RealtimeBroadcaster {
    tx: broadcast::Sender<RealtimeEvent>,
}

impl RealtimeBroadcaster {
    /// 지정한 버퍼 용량으로 생성.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 새 이벤트 수신기 발급.
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tx.subscribe()
    }

    /// 이벤트 발행. 수신자가 없으면 조용히 버립니다.
    pub fn publish(&self, event: RealtimeEvent) {
        if self.tx.send(event).is_err() {
            trace!("수신자 없음, 이벤트 버림");
        }
    }

    /// 현재 구독자 수.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for RealtimeBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
