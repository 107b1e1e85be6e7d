//! WebSocket transport backed by `tokio-tungstenite`.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use noderpc_core::error::RpcError;
use noderpc_core::transport::{RpcTransport, TransportKind};

type Reply = oneshot::Sender<Result<String, RpcError>>;
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Command sent from callers to the background WS task.
enum WsCommand {
    Send { payload: String, tx: Reply },
    Close { done: oneshot::Sender<()> },
}

/// Persistent WebSocket channel to one node.
///
/// The socket is owned by a background task. When the peer closes the
/// connection the task ends and every later `send` fails with
/// [`RpcError::ConnectionClosed`].
pub struct WsTransport {
    url: String,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    // Serialises request/reply exchanges on the socket.
    exchange: Mutex<()>,
}

impl WsTransport {
    /// Open the socket and start the background task.
    pub async fn connect(url: impl Into<String>) -> Result<Self, RpcError> {
        let url = url.into();
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(map_ws_error)?;
        tracing::debug!(url = %url, "WebSocket connected");

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(ws_task(url.clone(), ws_stream, cmd_rx));

        Ok(Self { url, cmd_tx, exchange: Mutex::new(()) })
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        let (done, _) = oneshot::channel();
        let _ = self.cmd_tx.send(WsCommand::Close { done });
    }
}

#[async_trait]
impl RpcTransport for WsTransport {
    async fn send(&self, payload: &str) -> Result<String, RpcError> {
        let _turn = self.exchange.lock().await;
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Send { payload: payload.to_string(), tx })
            .map_err(|_| RpcError::ConnectionClosed("WebSocket task closed".into()))?;
        rx.await
            .map_err(|_| RpcError::ConnectionClosed("WebSocket reply dropped".into()))?
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Persistent
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn close(&self) -> Result<(), RpcError> {
        let (done, wait) = oneshot::channel();
        if self.cmd_tx.send(WsCommand::Close { done }).is_err() {
            return Ok(());
        }
        let _ = wait.await;
        Ok(())
    }
}

fn map_ws_error(e: tungstenite::Error) -> RpcError {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            RpcError::ConnectionClosed(e.to_string())
        }
        other => RpcError::Transport(other.to_string()),
    }
}

fn fail_all(pending: &mut VecDeque<Reply>, reason: &str) {
    for tx in pending.drain(..) {
        let _ = tx.send(Err(RpcError::ConnectionClosed(reason.to_string())));
    }
}

/// Background task that owns the WebSocket connection.
async fn ws_task(url: String, ws_stream: WsStream, mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>) {
    let (mut sink, mut stream) = ws_stream.split();
    let mut pending: VecDeque<Reply> = VecDeque::new();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                None => {
                    let _ = sink.close().await;
                    return;
                }
                Some(WsCommand::Close { done }) => {
                    let _ = sink.close().await;
                    fail_all(&mut pending, "closed by client");
                    let _ = done.send(());
                    tracing::debug!(url = %url, "WebSocket closed");
                    return;
                }
                Some(WsCommand::Send { payload, tx }) => {
                    if let Err(e) = sink.send(Message::Text(payload.into())).await {
                        let _ = tx.send(Err(map_ws_error(e)));
                        fail_all(&mut pending, "send failed");
                        return;
                    }
                    pending.push_back(tx);
                }
            },
            msg = stream.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(t))) => t.to_string(),
                    Some(Ok(Message::Binary(b))) => String::from_utf8_lossy(&b).into_owned(),
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                    Some(Ok(Message::Close(frame))) => {
                        tracing::warn!(url = %url, ?frame, "WebSocket closed by peer");
                        fail_all(&mut pending, "closed by peer");
                        return;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(url = %url, error = %e, "WebSocket error");
                        let reason = e.to_string();
                        let closed = matches!(map_ws_error(e), RpcError::ConnectionClosed(_));
                        for tx in pending.drain(..) {
                            let _ = tx.send(Err(if closed {
                                RpcError::ConnectionClosed(reason.clone())
                            } else {
                                RpcError::Transport(reason.clone())
                            }));
                        }
                        return;
                    }
                    None => {
                        fail_all(&mut pending, "stream ended");
                        return;
                    }
                };
                match pending.pop_front() {
                    Some(tx) => { let _ = tx.send(Ok(text)); }
                    None => tracing::debug!(url = %url, "unsolicited WebSocket message dropped"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one client; echo `replies_before_close` messages, then close.
    async fn echo_server(replies_before_close: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(sock).await.unwrap();
            let mut answered = 0;
            while let Some(Ok(msg)) = ws.next().await {
                if answered == replies_before_close {
                    let _ = ws.close(None).await;
                    return;
                }
                if msg.is_text() {
                    ws.send(msg).await.unwrap();
                    answered += 1;
                }
            }
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn send_receives_reply() {
        let url = echo_server(2).await;
        let t = WsTransport::connect(&url).await.unwrap();
        assert_eq!(t.kind(), TransportKind::Persistent);
        assert_eq!(t.send(r#"{"id":1}"#).await.unwrap(), r#"{"id":1}"#);
        assert_eq!(t.send(r#"{"id":2}"#).await.unwrap(), r#"{"id":2}"#);
        t.close().await.unwrap();
    }

    #[tokio::test]
    async fn peer_close_is_connection_closed() {
        let url = echo_server(0).await;
        let t = WsTransport::connect(&url).await.unwrap();
        let err = t.send(r#"{"id":1}"#).await.unwrap_err();
        assert!(matches!(err, RpcError::ConnectionClosed(_)), "got {err:?}");
        let err = t.send(r#"{"id":2}"#).await.unwrap_err();
        assert!(matches!(err, RpcError::ConnectionClosed(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = WsTransport::connect(format!("ws://{addr}")).await.err().unwrap();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
