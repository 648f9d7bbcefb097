//! beszel-rs: a two-tier server-monitoring fabric.
//!
//! A fleet of lightweight agents samples OS/container telemetry on each
//! monitored host; a central hub collects those samples, retains
//! multi-resolution time-series history, evaluates alert rules, and exposes
//! queryable state over a small JSON REST surface.
//!
//! ## Modules
//!
//! - `wire` — shared snapshot/codec types exchanged between agent and hub
//! - `agent` — samplers, container inspector, agent core, pull/push transports
//! - `hub` — session registry, poll scheduler, record store, rollup/retention,
//!   alert evaluator, enrollment, REST API

pub mod wire;
pub mod agent;
pub mod hub;
