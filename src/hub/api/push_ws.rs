//! Push-transport accept endpoint (`spec.md` §4.5, component C5 hub side):
//! the agent dials in over a WebSocket, completes a `HELLO` handshake, then
//! streams `Sample` frames on its own cadence until the hub asks for one
//! early via [`crate::hub::session::PushHandle::request_snapshot`]. Grounded
//! in the donor's `axum::extract::ws` dashboard-stream handler, generalized
//! from one-way push to the bidirectional handshake-then-stream protocol in
//! [`crate::wire::PushFrame`].

use crate::hub::session::PushHandle;
use crate::hub::{enrollment, writer, HubState};
use crate::wire::PushFrame;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn push_accept(ws: WebSocketUpgrade, State(hub): State<Arc<HubState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve(socket, hub))
}

async fn serve(mut socket: WebSocket, hub: Arc<HubState>) {
    let hello = match recv_frame(&mut socket).await {
        Some(PushFrame::Hello { version, token, fingerprint_candidate, hostname, address }) => {
            (version, token, fingerprint_candidate, hostname, address)
        }
        _ => {
            warn!("push connection closed before a HELLO frame arrived");
            return;
        }
    };
    let (_version, token, fingerprint_candidate, hostname, address) = hello;
    let host = if address.is_empty() { hostname.clone() } else { address };

    let enrolled = match enrollment::enroll(
        hub.store.as_ref(),
        hub.universal_token.as_ref(),
        &hostname,
        &host,
        &token,
        &fingerprint_candidate,
    )
    .await
    {
        Ok(enrolled) => enrolled,
        Err(err) => {
            let reason = (&err).into();
            let _ = send_frame(&mut socket, &PushFrame::HelloReject { reason }).await;
            info!(%err, "push enrollment rejected");
            return;
        }
    };
    let system_id = enrolled.system_id;

    let interval_sec = hub.config.push_sample_interval_secs;
    if send_frame(&mut socket, &PushFrame::HelloOk { system_id: system_id.clone(), interval_sec }).await.is_err() {
        return;
    }

    let (to_agent_tx, mut to_agent_rx) = mpsc::unbounded_channel::<PushFrame>();
    let push_handle = PushHandle::new(to_agent_tx);
    hub.registry.register_push(&system_id, push_handle.clone()).await;
    hub.registry.record_success(&system_id).await;

    let system_name = match hub.store.get_system(&system_id).await {
        Ok(Some(system)) => system.name,
        _ => hostname.clone(),
    };

    loop {
        tokio::select! {
            outbound = to_agent_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if send_frame(&mut socket, &frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = recv_frame(&mut socket) => {
                match inbound {
                    Some(PushFrame::Sample { data }) => {
                        push_handle.deliver(data.clone()).await;
                        if let Err(err) = writer::ingest(
                            hub.store.as_ref(),
                            hub.notifier.as_ref(),
                            &system_id,
                            &system_name,
                            &data,
                            Utc::now(),
                        )
                        .await
                        {
                            warn!(system_id = %system_id, %err, "failed to persist pushed sample");
                        }
                        hub.registry.record_success(&system_id).await;
                    }
                    Some(PushFrame::Ping) => {
                        if send_frame(&mut socket, &PushFrame::Pong).await.is_err() {
                            break;
                        }
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }

    hub.registry.remove_push(&system_id).await;
    info!(system_id = %system_id, "push session closed");
}

async fn recv_frame(socket: &mut WebSocket) -> Option<PushFrame> {
    loop {
        match socket.recv().await? {
            Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                Ok(frame) => return Some(frame),
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &PushFrame) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).unwrap_or_default();
    socket.send(Message::Text(text)).await
}
