//! Push-transport (C5) frame types, exchanged over the WebSocket-compatible
//! bidirectional framed connection (`spec.md` §6).

use super::snapshot::SystemSnapshot;
use serde::{Deserialize, Serialize};

/// One frame of the agent↔hub push-transport protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PushFrame {
    /// Agent → hub, sent once per connection on first contact.
    Hello {
        version: String,
        token: String,
        fingerprint_candidate: String,
        hostname: String,
        address: String,
    },
    /// Hub → agent: enrollment accepted.
    HelloOk { system_id: String, interval_sec: u64 },
    /// Hub → agent: enrollment refused.
    HelloReject { reason: EnrollmentRejectReason },
    /// Hub → agent: please sample and upload now.
    SampleReq,
    /// Agent → hub: a snapshot.
    Sample { data: SystemSnapshot },
    Ping,
    Pong,
}

/// Why a push-transport HELLO was rejected (`spec.md` §4.5/§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentRejectReason {
    FingerprintMismatch,
    Blocked,
    InvalidToken,
}

impl std::fmt::Display for EnrollmentRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EnrollmentRejectReason::FingerprintMismatch => "fingerprint_mismatch",
            EnrollmentRejectReason::Blocked => "blocked",
            EnrollmentRejectReason::InvalidToken => "invalid_token",
        };
        write!(f, "{s}")
    }
}
