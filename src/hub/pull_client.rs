//! Hub-side SSH client (`spec.md` §4.3 consumer): dials an agent's pull
//! transport, authenticates with the hub's own keypair (the public half of
//! which operators configure into each agent's `KEY`/`KEY_FILE`), opens one
//! channel, reads exactly one encoded snapshot, and disconnects.

use crate::wire::{decode, upgrade_legacy_mb_fields, CodecError, SystemSnapshot, WireCodec};
use async_trait::async_trait;
use russh::client::{Handle, Handler};
use russh_keys::key::KeyPair;
use std::sync::Arc;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum PullClientError {
    #[error("ssh error: {0}")]
    Ssh(#[from] russh::Error),
    #[error("key error: {0}")]
    Key(#[from] russh_keys::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("connection timed out")]
    Timeout,
    #[error("agent closed the channel without sending a snapshot")]
    NoPayload,
}

struct TrustingHandler;

#[async_trait]
impl Handler for TrustingHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Pull transport's trust anchor is the payload-level fingerprint
        // pinned at enrollment (`spec.md` §4.5), not the SSH host key, so
        // any host key is accepted here.
        Ok(true)
    }
}

/// Dial `host:port`, authenticate as `hub_key`, and return the single
/// snapshot the agent streams back.
pub async fn fetch_snapshot(
    host: &str,
    port: u16,
    hub_key: &KeyPair,
    hub_version: &str,
) -> Result<SystemSnapshot, PullClientError> {
    let config = Arc::new(russh::client::Config {
        connection_timeout: Some(CONNECT_TIMEOUT),
        ..Default::default()
    });

    let mut session: Handle<TrustingHandler> =
        tokio::time::timeout(CONNECT_TIMEOUT, russh::client::connect(config, (host, port), TrustingHandler))
            .await
            .map_err(|_| PullClientError::Timeout)??;

    let authenticated = tokio::time::timeout(
        CONNECT_TIMEOUT,
        session.authenticate_publickey("beszel-hub", Arc::new(hub_key.clone())),
    )
    .await
    .map_err(|_| PullClientError::Timeout)??;

    if !authenticated {
        return Err(PullClientError::Ssh(russh::Error::NotAuthenticated));
    }

    let mut channel = session.channel_open_session().await?;
    let mut payload = Vec::new();

    let deadline = tokio::time::Instant::now() + SNAPSHOT_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Err(PullClientError::Timeout);
        }
        let Some(msg) = tokio::time::timeout(remaining, channel.wait()).await.map_err(|_| PullClientError::Timeout)? else {
            break;
        };
        match msg {
            russh::ChannelMsg::Data { data } => payload.extend_from_slice(&data),
            russh::ChannelMsg::Eof | russh::ChannelMsg::Close => break,
            _ => {}
        }
    }

    if payload.is_empty() {
        return Err(PullClientError::NoPayload);
    }

    let codec = crate::wire::codec_for_hub_version(hub_version);
    let snapshot = decode(&payload, codec)?;
    Ok(if codec == WireCodec::LegacyJson { upgrade_legacy_mb_fields(snapshot) } else { snapshot })
}
