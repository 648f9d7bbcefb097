//! Pull transport (`spec.md` §4.4, component C4): an SSH server that accepts
//! exactly one authorized public key, opens exactly one channel, writes a
//! single encoded snapshot to it, and closes. No shell, no exec, no pty —
//! this is a data pipe, not a login service.

use crate::agent::AgentCore;
use crate::wire::{codec_for_hub_version, encode, ConnectionType};
use async_trait::async_trait;
use russh::server::{Auth, Handler, Msg, Server as _, Session};
use russh::{Channel, ChannelId};
use russh_keys::key::PublicKey;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum PullTransportError {
    #[error("ssh server error: {0}")]
    Russh(#[from] russh::Error),
    #[error("no host key could be generated")]
    HostKey,
}

/// Parses an `authorized_keys`-style line (`ssh-ed25519 AAAA... comment`)
/// into its fingerprint, the same form `Handler::auth_publickey` receives
/// for the connecting client's key. Lines that don't parse are skipped with
/// a warning rather than failing startup — one bad entry in `KEY`/`KEY_FILE`
/// shouldn't take down the whole transport.
fn authorized_key_fingerprints(raw_keys: &[String]) -> Vec<String> {
    raw_keys
        .iter()
        .filter_map(|line| {
            let base64 = line.split_whitespace().nth(1).unwrap_or(line);
            match russh_keys::parse_public_key_base64(base64) {
                Ok(key) => Some(key.fingerprint()),
                Err(err) => {
                    warn!(%err, "skipping unparsable authorized key entry");
                    None
                }
            }
        })
        .collect()
}

/// Runs the pull-transport SSH listener until the process exits.
pub async fn run(
    bind_addr: String,
    authorized_keys: Vec<String>,
    core: Arc<Mutex<AgentCore>>,
) -> Result<(), PullTransportError> {
    let host_key = russh_keys::key::KeyPair::generate_ed25519().ok_or(PullTransportError::HostKey)?;

    let config = Arc::new(russh::server::Config {
        auth_rejection_time: AUTH_TIMEOUT,
        auth_rejection_time_initial: Some(AUTH_TIMEOUT),
        keys: vec![host_key],
        ..Default::default()
    });

    let fingerprints = authorized_key_fingerprints(&authorized_keys);
    if fingerprints.is_empty() {
        warn!("no authorized key entries parsed successfully; pull transport will reject all connections");
    }

    let mut server = PullServer {
        authorized_keys: Arc::new(fingerprints),
        core,
    };

    info!(addr = %bind_addr, "pull transport listening");
    server.run_on_address(config, bind_addr.parse::<SocketAddr>().map_err(|_| {
        russh::Error::Disconnect
    })?).await?;
    Ok(())
}

struct PullServer {
    authorized_keys: Arc<Vec<String>>,
    core: Arc<Mutex<AgentCore>>,
}

impl russh::server::Server for PullServer {
    type Handler = PullSession;

    fn new_client(&mut self, peer: Option<SocketAddr>) -> PullSession {
        if let Some(addr) = peer {
            info!(%addr, "pull transport connection accepted");
        }
        PullSession {
            authorized_keys: self.authorized_keys.clone(),
            core: self.core.clone(),
            authenticated: false,
        }
    }
}

struct PullSession {
    authorized_keys: Arc<Vec<String>>,
    core: Arc<Mutex<AgentCore>>,
    authenticated: bool,
}

#[async_trait]
impl Handler for PullSession {
    type Error = russh::Error;

    async fn auth_publickey(&mut self, _user: &str, key: &PublicKey) -> Result<Auth, Self::Error> {
        let fingerprint = key.fingerprint();
        if self.authorized_keys.iter().any(|k| k == &fingerprint) {
            self.authenticated = true;
            Ok(Auth::Accept)
        } else {
            warn!(fingerprint, "pull transport rejected unauthorized key");
            Ok(Auth::Reject {
                proceed_with_methods: None,
            })
        }
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        session: &mut Session,
    ) -> Result<bool, Self::Error> {
        if !self.authenticated {
            return Ok(false);
        }

        // The SSH transport has no in-band field for the hub to declare its
        // version before the channel opens, so this agent always emits the
        // binary codec; hubs older than 0.12.0 are not supported over pull.
        let codec = codec_for_hub_version("0.12.0");
        let snapshot = self.core.lock().await.snapshot(ConnectionType::Pull).await;
        let bytes = encode(&snapshot, codec).map_err(|_| russh::Error::Disconnect)?;

        session.data(channel.id(), bytes.into());
        session.close(channel.id());
        Ok(true)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        _data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_failure(channel);
        Ok(())
    }

    async fn shell_request(&mut self, channel: ChannelId, session: &mut Session) -> Result<(), Self::Error> {
        session.channel_failure(channel);
        Ok(())
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(russh::Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_failure(channel);
        Ok(())
    }

    async fn subsystem_request(
        &mut self,
        channel: ChannelId,
        _name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_failure(channel);
        Ok(())
    }
}
