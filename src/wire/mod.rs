//! Shared wire types: the snapshot schema, its two codecs, and the
//! push-transport frame protocol. Everything in this module is understood by
//! both `agent` and `hub`.

pub mod bucket;
pub mod codec;
pub mod container;
pub mod frames;
pub mod info;
pub mod smart;
pub mod snapshot;
pub mod stats;

pub use bucket::Bucket;
pub use codec::{codec_for_hub_version, decode, encode, CodecError, WireCodec};
pub use container::{Container, ContainerHealth};
pub use frames::{EnrollmentRejectReason, PushFrame};
pub use info::{ConnectionType, Info};
pub use smart::Smart;
pub use snapshot::SystemSnapshot;
pub use stats::{BatteryState, CoreTimes, ExtraFs, Gpu, Stats};
