//! Snapshot wire codecs.
//!
//! The pull transport (C4) picks one of two codecs based on the hub's
//! declared version: the compact binary codec (preferred, required for hub
//! ≥ 0.12.0) or the legacy JSON codec (`spec.md` §4.3).

use super::snapshot::SystemSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("binary codec error: {0}")]
    Binary(#[from] bincode::Error),
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireCodec {
    /// Compact binary encoding (`bincode`).
    Binary,
    /// Legacy JSON encoding, kept for hubs older than 0.12.0.
    LegacyJson,
}

/// Minimum hub version (inclusive) that requires the binary codec.
const BINARY_CODEC_MIN_VERSION: (u32, u32, u32) = (0, 12, 0);

/// Choose the codec a pull-transport response must use, from the hub's
/// self-reported version string (e.g. `"0.12.3"`).
///
/// Unparseable version strings are treated conservatively as pre-0.12,
/// i.e. they fall back to the legacy JSON codec rather than risk feeding a
/// binary payload to a hub that cannot decode it.
pub fn codec_for_hub_version(version: &str) -> WireCodec {
    match parse_version(version) {
        Some(v) if v >= BINARY_CODEC_MIN_VERSION => WireCodec::Binary,
        _ => WireCodec::LegacyJson,
    }
}

fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
    let version = version.trim().trim_start_matches('v');
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().unwrap_or("0").parse().ok()?;
    let patch = parts
        .next()
        .unwrap_or("0")
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or("0")
        .parse()
        .ok()?;
    Some((major, minor, patch))
}

/// Encode a snapshot for the wire, per the chosen codec.
pub fn encode(snapshot: &SystemSnapshot, codec: WireCodec) -> Result<Vec<u8>, CodecError> {
    match codec {
        WireCodec::Binary => Ok(bincode::serialize(snapshot)?),
        WireCodec::LegacyJson => Ok(serde_json::to_vec(snapshot)?),
    }
}

/// Decode a snapshot received on the wire.
pub fn decode(bytes: &[u8], codec: WireCodec) -> Result<SystemSnapshot, CodecError> {
    match codec {
        WireCodec::Binary => Ok(bincode::deserialize(bytes)?),
        WireCodec::LegacyJson => Ok(serde_json::from_slice(bytes)?),
    }
}

/// Convert a legacy-format JSON payload (some numeric fields in megabytes)
/// into the canonical bytes-denominated `SystemSnapshot`.
///
/// `spec.md` §9: "the legacy JSON payload carries some fields in megabytes
/// and some in bytes; the canonical internal representation is bytes."
/// Memory and root-disk totals/used are the fields historically reported in
/// MB by older agents; everything else (network, disk I/O rates, per-fs
/// usage) was always bytes.
pub fn upgrade_legacy_mb_fields(mut snapshot: SystemSnapshot) -> SystemSnapshot {
    const MB: u64 = 1_000_000;
    snapshot.stats.mem_total = snapshot.stats.mem_total.saturating_mul(MB);
    snapshot.stats.mem_used = snapshot.stats.mem_used.saturating_mul(MB);
    snapshot.stats.buff_cache = snapshot.stats.buff_cache.saturating_mul(MB);
    snapshot.stats.swap_total = snapshot.stats.swap_total.saturating_mul(MB);
    snapshot.stats.swap_used = snapshot.stats.swap_used.saturating_mul(MB);
    snapshot.stats.disk_total = snapshot.stats.disk_total.saturating_mul(MB);
    snapshot.stats.disk_used = snapshot.stats.disk_used.saturating_mul(MB);
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_gate_picks_binary_at_0_12_0() {
        assert_eq!(codec_for_hub_version("0.12.0"), WireCodec::Binary);
        assert_eq!(codec_for_hub_version("0.12.3"), WireCodec::Binary);
        assert_eq!(codec_for_hub_version("1.0.0"), WireCodec::Binary);
    }

    #[test]
    fn version_gate_picks_json_below_0_12_0() {
        assert_eq!(codec_for_hub_version("0.11.9"), WireCodec::LegacyJson);
        assert_eq!(codec_for_hub_version("0.9.0"), WireCodec::LegacyJson);
    }

    #[test]
    fn unparseable_version_falls_back_to_json() {
        assert_eq!(codec_for_hub_version("garbage"), WireCodec::LegacyJson);
        assert_eq!(codec_for_hub_version(""), WireCodec::LegacyJson);
    }

    #[test]
    fn round_trip_binary_and_json() {
        let mut snap = SystemSnapshot::default();
        snap.stats.cpu = 42.5;
        snap.info.hostname = "box1".to_string();

        let encoded = encode(&snap, WireCodec::Binary).unwrap();
        let decoded = decode(&encoded, WireCodec::Binary).unwrap();
        assert_eq!(decoded.stats.cpu, 42.5);
        assert_eq!(decoded.info.hostname, "box1");

        let encoded = encode(&snap, WireCodec::LegacyJson).unwrap();
        let decoded = decode(&encoded, WireCodec::LegacyJson).unwrap();
        assert_eq!(decoded.stats.cpu, 42.5);
    }
}
