//! Agent configuration — environment variables, with legacy aliases
//! (`spec.md` §4.2).

use std::path::PathBuf;

/// Which socket family the pull transport binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    Tcp,
    Unix,
}

/// Where the pull transport listens.
#[derive(Debug, Clone)]
pub enum ListenAddr {
    Tcp(String),
    Unix(PathBuf),
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// SSH public keys accepted by the pull transport.
    pub authorized_keys: Vec<String>,
    /// Pull-transport bind address.
    pub listen: ListenAddr,
    /// Push-transport auth token, if push is enabled.
    pub token: Option<String>,
    /// Push-transport hub URL, if push is enabled.
    pub hub_url: Option<String>,
    /// Root-filesystem device override.
    pub filesystem: Option<String>,
    /// Extra filesystems/devices to sample.
    pub extra_filesystems: Vec<String>,
    /// Container-engine endpoint override.
    pub docker_host: Option<String>,
    /// Whether GPU sampling is enabled.
    pub gpu_enabled: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no authorized keys configured: set KEY or KEY_FILE")]
    MissingKeys,
    #[error("cannot read key file {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid listen address {0:?}")]
    InvalidListen(String),
}

impl AgentConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let authorized_keys = load_authorized_keys()?;

        let network = std::env::var("NETWORK").ok().and_then(|v| match v.as_str() {
            "tcp" => Some(NetworkKind::Tcp),
            "unix" => Some(NetworkKind::Unix),
            _ => None,
        });

        let listen_raw = std::env::var("LISTEN")
            .or_else(|_| std::env::var("ADDR"))
            .ok()
            .or_else(|| std::env::var("PORT").ok().map(|p| format!(":{p}")))
            .unwrap_or_else(|| ":45876".to_string());

        let listen = parse_listen(&listen_raw, network)?;

        let token = std::env::var("TOKEN").ok().filter(|s| !s.is_empty());
        let hub_url = std::env::var("HUB_URL").ok().filter(|s| !s.is_empty());

        let filesystem = std::env::var("FILESYSTEM").ok().filter(|s| !s.is_empty());
        let extra_filesystems = std::env::var("EXTRA_FILESYSTEMS")
            .ok()
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let docker_host = std::env::var("DOCKER_HOST").ok().filter(|s| !s.is_empty());

        let gpu_enabled = std::env::var("GPU")
            .ok()
            .map(|v| v != "false" && v != "0")
            .or_else(|| std::env::var("NVML").ok().map(|v| v != "false" && v != "0"))
            .unwrap_or(true);

        Ok(Self {
            authorized_keys,
            listen,
            token,
            hub_url,
            filesystem,
            extra_filesystems,
            docker_host,
            gpu_enabled,
        })
    }

    pub fn push_enabled(&self) -> bool {
        self.token.is_some() && self.hub_url.is_some()
    }
}

fn load_authorized_keys() -> Result<Vec<String>, ConfigError> {
    let raw = if let Ok(path) = std::env::var("KEY_FILE") {
        std::fs::read_to_string(&path).map_err(|source| ConfigError::KeyFile { path, source })?
    } else if let Ok(keys) = std::env::var("KEY") {
        keys
    } else {
        return Err(ConfigError::MissingKeys);
    };

    let keys: Vec<String> = raw
        .split([',', '\n'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if keys.is_empty() {
        return Err(ConfigError::MissingKeys);
    }

    Ok(keys)
}

fn parse_listen(raw: &str, network: Option<NetworkKind>) -> Result<ListenAddr, ConfigError> {
    if network == Some(NetworkKind::Unix) || (network.is_none() && raw.starts_with('/')) {
        return Ok(ListenAddr::Unix(PathBuf::from(raw)));
    }

    if let Some(port) = raw.strip_prefix(':') {
        if port.parse::<u16>().is_err() {
            return Err(ConfigError::InvalidListen(raw.to_string()));
        }
        return Ok(ListenAddr::Tcp(format!("0.0.0.0:{port}")));
    }

    if raw.contains(':') {
        return Ok(ListenAddr::Tcp(raw.to_string()));
    }

    Err(ConfigError::InvalidListen(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_only_binds_all_interfaces() {
        let addr = parse_listen(":45876", None).unwrap();
        match addr {
            ListenAddr::Tcp(s) => assert_eq!(s, "0.0.0.0:45876"),
            _ => panic!("expected tcp"),
        }
    }

    #[test]
    fn unix_socket_path_detected() {
        let addr = parse_listen("/var/run/beszel-agent.sock", None).unwrap();
        matches!(addr, ListenAddr::Unix(_));
    }

    #[test]
    fn forced_network_overrides_sniffing() {
        let addr = parse_listen("45876", Some(NetworkKind::Tcp));
        assert!(addr.is_err(), "bare port with no colon is not a valid host:port");
    }
}
