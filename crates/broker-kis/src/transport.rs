//! 실시간 스트림 전송 계층.
//!
//! `StreamTransport`는 영속 소켓의 최소 표면만 노출합니다:
//! 연결, 텍스트 전송, 종료, 수신 프레임 스트림. 재연결 정책은
//! 한 단계 위의 `ConnectionManager`가 담당합니다.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};

/// 게이트웨이와의 영속 스트림 연결.
#[async_trait]
pub trait StreamTransport: Send + Sync + 'static {
    /// 소켓 연결 수립.
    async fn connect(&self, url: &str) -> GatewayResult<()>;

    /// 텍스트 프레임 전송.
    async fn send(&self, text: &str) -> GatewayResult<()>;

    /// 연결 종료. 소켓이 이미 죽어 있어도 에러로 보지 않습니다.
    async fn disconnect(&self) -> GatewayResult<()>;

    /// 다음 수신 텍스트 프레임.
    ///
    /// 연결이 끊기면 `None`을 반환합니다. 제어 프레임(Ping 등)은
    /// 구현 내부에서 처리됩니다.
    async fn next_frame(&self) -> Option<String>;
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// tokio-tungstenite 기반 `StreamTransport` 구현.
#[derive(Default)]
pub struct WsTransport {
    writer: Mutex<Option<WsSink>>,
    reader: Mutex<Option<WsSource>>,
}

impl WsTransport {
    /// 새 WebSocket 전송 계층 생성 (연결 전 상태).
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StreamTransport for WsTransport {
    async fn connect(&self, url: &str) -> GatewayResult<()> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| GatewayError::Transport(format!("WebSocket 연결 실패: {}", e)))?;

        let (write, read) = stream.split();
        *self.writer.lock().await = Some(write);
        *self.reader.lock().await = Some(read);

        debug!(%url, "WebSocket connected");
        Ok(())
    }

    async fn send(&self, text: &str) -> GatewayResult<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| GatewayError::Transport("소켓이 연결되어 있지 않습니다".to_string()))?;

        writer
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn disconnect(&self) -> GatewayResult<()> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            // 이미 죽은 소켓일 수 있으므로 종료 실패는 무시
            if let Err(e) = writer.send(Message::Close(None)).await {
                debug!("Close frame send failed: {}", e);
            }
            let _ = writer.close().await;
        }
        self.reader.lock().await.take();

        debug!("WebSocket disconnected");
        Ok(())
    }

    async fn next_frame(&self) -> Option<String> {
        loop {
            let msg = {
                let mut guard = self.reader.lock().await;
                let reader = guard.as_mut()?;
                reader.next().await
            };

            match msg {
                Some(Ok(Message::Text(text))) => return Some(text),
                Some(Ok(Message::Ping(data))) => {
                    // 게이트웨이는 무응답 연결을 끊으므로 즉시 Pong 응답
                    let mut guard = self.writer.lock().await;
                    if let Some(writer) = guard.as_mut() {
                        if let Err(e) = writer.send(Message::Pong(data)).await {
                            warn!("Pong 전송 실패: {}", e);
                        }
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    debug!("서버에서 연결 종료 요청");
                    return None;
                }
                Some(Err(e)) => {
                    warn!("WebSocket 수신 에러: {}", e);
                    return None;
                }
                None => return None,
                _ => {}
            }
        }
    }
}
