//! Push transport (`spec.md` §4.5, component C5): agent-initiated WebSocket
//! connection to the hub. The agent dials out, completes a HELLO handshake,
//! then streams samples on a fixed cadence until the hub asks for one early
//! or the connection drops — reconnecting with jittered exponential backoff.

use crate::agent::config::AgentConfig;
use crate::agent::AgentCore;
use crate::wire::{ConnectionType, EnrollmentRejectReason, PushFrame};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{error, info, warn};

const MIN_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60);
const SAMPLE_INTERVAL: Duration = Duration::from_secs(60);

type Write = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Debug, thiserror::Error)]
pub enum PushTransportError {
    #[error("HUB_URL/TOKEN not configured, push transport disabled")]
    Disabled,
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("hub rejected enrollment: {0}")]
    Rejected(EnrollmentRejectReason),
    #[error("frame serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Runs forever, reconnecting with backoff on every disconnect. Intended to
/// be spawned as its own task by the agent binary when push is configured.
pub async fn run(config: AgentConfig, core: Arc<Mutex<AgentCore>>) {
    let mut backoff = MIN_BACKOFF;

    loop {
        match connect_and_serve(&config, &core).await {
            Ok(()) => {
                backoff = MIN_BACKOFF;
            }
            Err(PushTransportError::Disabled) => {
                warn!("push transport has no HUB_URL/TOKEN configured; not retrying");
                return;
            }
            Err(err) => {
                error!(error = %err, backoff_secs = backoff.as_secs(), "push transport disconnected");
            }
        }

        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..500));
        tokio::time::sleep(backoff + jitter).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

async fn connect_and_serve(
    config: &AgentConfig,
    core: &Arc<Mutex<AgentCore>>,
) -> Result<(), PushTransportError> {
    let (hub_url, token) = match (&config.hub_url, &config.token) {
        (Some(url), Some(token)) => (url.clone(), token.clone()),
        _ => return Err(PushTransportError::Disabled),
    };

    let (stream, _response) = tokio_tungstenite::connect_async(&hub_url).await?;
    info!(hub_url = %hub_url, "push transport connected");
    let (mut write, mut read) = stream.split();

    let hostname = core.lock().await.hostname().to_string();
    let hello = PushFrame::Hello {
        version: env!("CARGO_PKG_VERSION").to_string(),
        token,
        fingerprint_candidate: hostname.clone(),
        hostname,
        address: String::new(),
    };
    send_frame(&mut write, &hello).await?;

    let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
    interval.tick().await; // first tick fires immediately; consume it

    loop {
        tokio::select! {
            _ = interval.tick() => {
                send_sample(&mut write, core).await?;
            }
            msg = read.next() => {
                let Some(msg) = msg else { return Ok(()) };
                match handle_inbound(msg?, &mut write, core).await? {
                    true => continue,
                    false => return Ok(()),
                }
            }
        }
    }
}

/// Returns `false` when the connection should close.
async fn handle_inbound(
    msg: Message,
    write: &mut Write,
    core: &Arc<Mutex<AgentCore>>,
) -> Result<bool, PushTransportError> {
    let text = match msg {
        Message::Text(t) => t,
        Message::Close(_) => return Ok(false),
        Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => {
            return Ok(true)
        }
    };

    let frame: PushFrame = match serde_json::from_str(&text) {
        Ok(frame) => frame,
        Err(_) => return Ok(true),
    };

    match frame {
        PushFrame::HelloOk { interval_sec, .. } => {
            info!(interval_sec, "enrollment accepted");
        }
        PushFrame::HelloReject { reason } => {
            return Err(PushTransportError::Rejected(reason));
        }
        PushFrame::SampleReq => {
            send_sample(write, core).await?;
        }
        PushFrame::Ping => {
            send_frame(write, &PushFrame::Pong).await?;
        }
        PushFrame::Pong | PushFrame::Sample { .. } | PushFrame::Hello { .. } => {}
    }
    Ok(true)
}

async fn send_sample(write: &mut Write, core: &Arc<Mutex<AgentCore>>) -> Result<(), PushTransportError> {
    let snapshot = core.lock().await.snapshot(ConnectionType::Push).await;
    send_frame(write, &PushFrame::Sample { data: snapshot }).await
}

async fn send_frame(write: &mut Write, frame: &PushFrame) -> Result<(), PushTransportError> {
    let text = serde_json::to_string(frame)?;
    write.send(Message::Text(text)).await?;
    Ok(())
}
