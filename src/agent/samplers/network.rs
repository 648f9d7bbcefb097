//! Network sampler (`spec.md` §4.1 "Network").
//!
//! Sums cumulative bytes across all non-loopback, non-virtual interfaces
//! found in `/proc/net/dev` and turns the sum into rate/total/max via
//! [`RateCounter`], mirroring the disk I/O sampler.

use super::rate::RateCounter;

const EXCLUDED_PREFIXES: &[&str] = &["lo", "docker", "veth", "br-", "virbr", "tailscale", "wg"];

#[derive(Debug, thiserror::Error)]
pub enum NetworkSamplerError {
    #[error("failed to read /proc/net/dev: {0}")]
    Read(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkReading {
    pub sent_rate: f64,
    pub recv_rate: f64,
    pub sent_total: u64,
    pub recv_total: u64,
    pub max: [u64; 2],
}

#[derive(Default)]
pub struct NetworkSampler {
    sent: RateCounter,
    recv: RateCounter,
}

impl NetworkSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> Result<(), NetworkSamplerError> {
        let (sent, recv) = read_net_totals()?;
        self.sent.tick(sent);
        self.recv.tick(recv);
        Ok(())
    }

    pub fn collect(&mut self, elapsed_secs: f64) -> Result<NetworkReading, NetworkSamplerError> {
        let (sent, recv) = read_net_totals()?;
        let sent_sample = self.sent.collect(sent, elapsed_secs);
        let recv_sample = self.recv.collect(recv, elapsed_secs);

        Ok(NetworkReading {
            sent_rate: sent_sample.rate,
            recv_rate: recv_sample.rate,
            sent_total: sent_sample.total,
            recv_total: recv_sample.total,
            max: [sent_sample.max, recv_sample.max],
        })
    }
}

fn read_net_totals() -> Result<(u64, u64), NetworkSamplerError> {
    let contents = std::fs::read_to_string("/proc/net/dev")?;
    Ok(parse_net_dev(&contents))
}

/// Returns `(sent_bytes, recv_bytes)` summed across eligible interfaces.
fn parse_net_dev(contents: &str) -> (u64, u64) {
    let mut sent = 0u64;
    let mut recv = 0u64;

    for line in contents.lines().skip(2) {
        let Some((iface, rest)) = line.split_once(':') else {
            continue;
        };
        let iface = iface.trim();
        if is_excluded(iface) {
            continue;
        }
        let fields: Vec<u64> = rest
            .split_whitespace()
            .filter_map(|t| t.parse().ok())
            .collect();
        // receive bytes is field 0, transmit bytes is field 8 (0-indexed).
        if let (Some(rx), Some(tx)) = (fields.first(), fields.get(8)) {
            recv += rx;
            sent += tx;
        }
    }

    (sent, recv)
}

fn is_excluded(iface: &str) -> bool {
    EXCLUDED_PREFIXES.iter().any(|p| iface.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:    1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0
  eth0:   50000     100    0    0    0     0          0         0    20000      80    0    0    0     0       0          0
docker0:    3000      20    0    0    0     0          0         0     2000      15    0    0    0     0       0          0
";

    #[test]
    fn loopback_and_virtual_interfaces_excluded() {
        let (sent, recv) = parse_net_dev(NET_DEV);
        assert_eq!(recv, 50000);
        assert_eq!(sent, 20000);
    }
}
