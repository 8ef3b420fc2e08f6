use crate::cursor::SentTextCursor;
use crate::protocol::{parse_server_frame, ClientFrame, ServerFrame};
use async_trait::async_trait;
use echodub_core::{AudioFormat, BridgeError, StreamMode, VoiceConfig};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

const MODE_STREAM: u8 = 0;
const MODE_FALLBACK: u8 = 1;

/// Source of the short-lived bearer credential required to connect.
/// Session/token issuance itself lives outside this crate.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(&self) -> Option<String>;
}

/// Fixed token provider, for tests and for environments where the token is
/// injected externally.
pub struct StaticCredential(pub String);

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn credential(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.clone())
        }
    }
}

/// Inbound events surfaced to the session wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Relay acknowledged the hello and negotiated an operating mode.
    Mode(StreamMode),
    /// A base64-encoded synthesized audio fragment.
    Audio { data: String, format: AudioFormat },
    /// Non-fatal error frame; the connection stays open.
    RemoteError(String),
    /// The connection ended, locally or remotely. Fired exactly once per
    /// connection lifetime.
    Disconnected,
}

/// Owns one persistent duplex connection to the synthesis relay.
pub struct StreamBridge {
    endpoint: String,
    voice: VoiceConfig,
    connect_timeout: Duration,
    cursor: SentTextCursor,
    writer: Option<WsSink>,
    connected: Arc<AtomicBool>,
    mode: Arc<AtomicU8>,
    hook_fired: Arc<AtomicBool>,
    event_tx: mpsc::UnboundedSender<BridgeEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<BridgeEvent>>,
    reader_task: Option<tokio::task::JoinHandle<()>>,
}

impl StreamBridge {
    pub fn new(endpoint: &str, voice: VoiceConfig, connect_timeout_ms: u64) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            endpoint: endpoint.to_string(),
            voice,
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            cursor: SentTextCursor::new(),
            writer: None,
            connected: Arc::new(AtomicBool::new(false)),
            mode: Arc::new(AtomicU8::new(MODE_STREAM)),
            hook_fired: Arc::new(AtomicBool::new(false)),
            event_tx,
            event_rx: Some(event_rx),
            reader_task: None,
        }
    }

    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<BridgeEvent>> {
        self.event_rx.take()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn mode(&self) -> StreamMode {
        match self.mode.load(Ordering::Relaxed) {
            MODE_FALLBACK => StreamMode::HttpFallback,
            _ => StreamMode::Stream,
        }
    }

    pub fn set_mode(&self, mode: StreamMode) {
        let v = match mode {
            StreamMode::Stream => MODE_STREAM,
            StreamMode::HttpFallback => MODE_FALLBACK,
        };
        self.mode.store(v, Ordering::Relaxed);
    }

    /// Open the connection and send the voice/language hello. Bounded by the
    /// connect timeout; on failure the caller should switch to fallback mode
    /// rather than retry indefinitely.
    pub async fn connect(
        &mut self,
        credentials: &dyn CredentialProvider,
    ) -> Result<(), BridgeError> {
        if self.is_connected() {
            return Ok(());
        }

        let token = credentials
            .credential()
            .await
            .ok_or(BridgeError::AuthRequired)?;

        // Bearer tokens are URL-safe by construction; passed as a query
        // parameter because the relay authenticates before the upgrade.
        let url = format!("{}?token={}", self.endpoint, token);
        let timeout_ms = self.connect_timeout.as_millis() as u64;

        let (ws, _response) = timeout(self.connect_timeout, connect_async(&url))
            .await
            .map_err(|_| BridgeError::ConnectTimeout(timeout_ms))?
            .map_err(|e| BridgeError::Transport(e.to_string()))?;

        let (mut write, mut read) = ws.split();

        // Voice config must precede the first text delta on every connection.
        let hello = ClientFrame::Hello {
            voice_id: self.voice.voice_id.clone(),
            lang: self.voice.language.clone(),
        };
        let hello_json =
            serde_json::to_string(&hello).map_err(|e| BridgeError::Protocol(e.to_string()))?;
        write
            .send(Message::Text(hello_json.into()))
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))?;

        // Fresh connection: new cursor epoch, hook re-armed.
        self.cursor.reset();
        self.connected.store(true, Ordering::Relaxed);
        self.hook_fired.store(false, Ordering::Relaxed);

        let connected = Arc::clone(&self.connected);
        let mode = Arc::clone(&self.mode);
        let hook_fired = Arc::clone(&self.hook_fired);
        let event_tx = self.event_tx.clone();

        let reader_task = tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => match parse_server_frame(&text) {
                        Some(ServerFrame::Hello { mode: m }) => {
                            let v = match m {
                                StreamMode::Stream => MODE_STREAM,
                                StreamMode::HttpFallback => MODE_FALLBACK,
                            };
                            mode.store(v, Ordering::Relaxed);
                            tracing::info!(mode = m.as_str(), "relay hello");
                            let _ = event_tx.send(BridgeEvent::Mode(m));
                        }
                        Some(ServerFrame::Error { message }) => {
                            tracing::warn!("relay error: {message}");
                            let _ = event_tx.send(BridgeEvent::RemoteError(message));
                        }
                        Some(ServerFrame::Chunk { audio, format }) => {
                            let _ = event_tx.send(BridgeEvent::Audio {
                                data: audio,
                                format,
                            });
                        }
                        None => {}
                    },
                    Ok(Message::Close(_)) => {
                        tracing::info!("relay closed the connection");
                        break;
                    }
                    Ok(_) => {} // ping/pong/binary
                    Err(e) => {
                        tracing::warn!("connection error: {e}");
                        break;
                    }
                }
            }
            connected.store(false, Ordering::Relaxed);
            if !hook_fired.swap(true, Ordering::SeqCst) {
                let _ = event_tx.send(BridgeEvent::Disconnected);
            }
        });

        self.writer = Some(write);
        self.reader_task = Some(reader_task);
        tracing::info!(endpoint = %self.endpoint, "connected");
        Ok(())
    }

    /// Forward the unsent suffix of `full` with `commit = is_final`.
    /// A commit starts a fresh cursor epoch; the caller clears the audio
    /// dedup window alongside.
    pub async fn send_text_delta(
        &mut self,
        full: &str,
        is_final: bool,
    ) -> Result<(), BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::NotConnected);
        }
        let writer = self.writer.as_mut().ok_or(BridgeError::NotConnected)?;

        let delta = self.cursor.delta(full);
        let frame = ClientFrame::InputText {
            text: delta,
            commit: is_final,
            voice_id: self.voice.voice_id.clone(),
            lang: self.voice.language.clone(),
        };
        let json =
            serde_json::to_string(&frame).map_err(|e| BridgeError::Protocol(e.to_string()))?;
        writer
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))?;

        if is_final {
            self.cursor.reset();
        }
        Ok(())
    }

    /// Reset the cursor without touching the connection. Used when a fresh
    /// capture session begins mid-connection.
    pub fn reset_cursor(&mut self) {
        self.cursor.reset();
    }

    /// Close the connection and reset connection state. The disconnection
    /// hook fires exactly once whether the close was local or remote.
    pub async fn disconnect(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.close().await;
        }
        if let Some(mut task) = self.reader_task.take() {
            // The reader ends once the close handshake completes; abort if
            // the peer never answers.
            if timeout(Duration::from_millis(500), &mut task).await.is_err() {
                task.abort();
            }
        }
        self.connected.store(false, Ordering::Relaxed);
        self.cursor.reset();
        if !self.hook_fired.swap(true, Ordering::SeqCst) {
            let _ = self.event_tx.send(BridgeEvent::Disconnected);
        }
        tracing::info!("disconnected");
    }
}

impl Drop for StreamBridge {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_credential_empty_is_none() {
        assert!(StaticCredential(String::new()).credential().await.is_none());
        assert_eq!(
            StaticCredential("tok".to_string()).credential().await,
            Some("tok".to_string()),
        );
    }

    #[tokio::test]
    async fn test_connect_requires_credential() {
        let voice = VoiceConfig {
            voice_id: "narrator_warm".to_string(),
            language: "en-US".to_string(),
        };
        let mut bridge = StreamBridge::new("ws://127.0.0.1:1/ws/echodub", voice, 1000);
        let result = bridge.connect(&StaticCredential(String::new())).await;
        match result {
            Err(BridgeError::AuthRequired) => {}
            other => panic!("expected AuthRequired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let voice = VoiceConfig {
            voice_id: "narrator_warm".to_string(),
            language: "en-US".to_string(),
        };
        let mut bridge = StreamBridge::new("ws://127.0.0.1:1/ws/echodub", voice, 1000);
        let result = bridge.send_text_delta("hello", false).await;
        match result {
            Err(BridgeError::NotConnected) => {}
            other => panic!("expected NotConnected, got {other:?}"),
        }
    }

    #[test]
    fn test_mode_default_and_set() {
        let voice = VoiceConfig {
            voice_id: "v".to_string(),
            language: "en-US".to_string(),
        };
        let bridge = StreamBridge::new("ws://x/ws", voice, 1000);
        assert_eq!(bridge.mode(), StreamMode::Stream);
        bridge.set_mode(StreamMode::HttpFallback);
        assert_eq!(bridge.mode(), StreamMode::HttpFallback);
    }
}
