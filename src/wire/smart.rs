//! SMART attribute snapshot for a single block device.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Vendor-attribute dictionary for one device, as returned by the external
/// `smartctl`-style helper. Values are kept as opaque strings — the hub does
/// not interpret SMART attribute semantics, only stores and displays them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Smart {
    pub device: String,
    pub attributes: HashMap<String, String>,
}
