// frontend/src/live_session/telemetry_channel.rs

use crate::config::{BaseUrl, ReconnectPolicy};
use crate::error::{ClientError, Result};
use crate::transport::routes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, future};
use labstand_shared::TelemetrySample;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    Status(ConnectionStatus),
    /// Any JSON object, plus the whole document for verbatim display.
    Sample {
        sample: TelemetrySample,
        document: Value,
    },
    /// A frame that was not a JSON object, as received.
    Raw(String),
}

impl TelemetryEvent {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(document @ Value::Object(_)) => {
                match serde_json::from_value::<TelemetrySample>(document.clone()) {
                    Ok(sample) => TelemetryEvent::Sample { sample, document },
                    Err(e) => {
                        tracing::debug!("telemetry frame did not decode ({e}); showing raw");
                        TelemetryEvent::Raw(text.to_string())
                    }
                }
            }
            _ => TelemetryEvent::Raw(text.to_string()),
        }
    }
}

// ---------- Connector ----------

/// Text frames of one telemetry connection. The stream ends when the
/// connection closes.
pub type FrameStream = BoxStream<'static, Result<String>>;

/// Opens one telemetry connection.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<FrameStream>> + Send;
}

pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn for_base(base: &BaseUrl) -> Self {
        Self::new(base.ws(routes::TELEMETRY_WS))
    }
}

fn text_frame(
    item: std::result::Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<String>> {
    match item {
        Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
        // binary, ping/pong and close frames carry no telemetry
        Ok(_) => None,
        Err(e) => Some(Err(ClientError::from(e))),
    }
}

impl Connector for WsConnector {
    async fn connect(&self) -> Result<FrameStream> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let frames = ws_stream.filter_map(|item| future::ready(text_frame(item)));
        Ok(frames.boxed())
    }
}

// ---------- Supervisor ----------

/// Keeps one telemetry connection alive for the life of a session.
///
/// Every loss is followed by exactly one attempt after the policy's delay; a
/// failed attempt counts as another loss. The loop ends when the receiving
/// side of `events` is dropped.
pub struct TelemetryChannel<C> {
    connector: C,
    policy: ReconnectPolicy,
}

impl<C: Connector> TelemetryChannel<C> {
    pub fn new(connector: C, policy: ReconnectPolicy) -> Self {
        Self { connector, policy }
    }

    pub async fn run<E>(self, events: mpsc::UnboundedSender<E>)
    where
        E: From<TelemetryEvent> + Send + 'static,
    {
        let emit = |ev: TelemetryEvent| events.send(E::from(ev)).is_ok();
        let mut losses: u32 = 0;

        loop {
            if !emit(TelemetryEvent::Status(ConnectionStatus::Connecting)) {
                break;
            }

            match self.connector.connect().await {
                Ok(mut frames) => {
                    tracing::info!("telemetry connected");
                    losses = 0;
                    if !emit(TelemetryEvent::Status(ConnectionStatus::Connected)) {
                        break;
                    }
                    while let Some(item) = frames.next().await {
                        match item {
                            Ok(text) => {
                                if !emit(TelemetryEvent::parse(&text)) {
                                    return;
                                }
                            }
                            Err(e) => {
                                tracing::warn!("telemetry stream error: {e}");
                                break;
                            }
                        }
                    }
                    tracing::warn!("telemetry connection lost");
                }
                Err(e) => tracing::warn!("telemetry connect failed: {e}"),
            }

            if !emit(TelemetryEvent::Status(ConnectionStatus::Disconnected)) {
                break;
            }

            losses = losses.saturating_add(1);
            let delay = self.policy.delay(losses);
            tracing::debug!(?delay, losses, "telemetry reconnect scheduled");
            tokio::time::sleep(delay).await;
        }

        tracing::debug!("telemetry channel stopped");
    }
}
