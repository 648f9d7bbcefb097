//! OS-telemetry samplers (`spec.md` §4.1), one module per resource.
//!
//! Each sampler owns whatever previous-tick state it needs to turn a raw
//! `/proc` or `/sys` counter into a rate or percentage; [`crate::agent`]
//! owns one instance of each and calls them once per reporting interval.

pub mod battery;
pub mod cpu;
pub mod disk;
pub mod diskio;
pub mod gpu;
pub mod loadavg;
pub mod memory;
pub mod network;
pub mod rate;
pub mod smart;
pub mod temperature;
