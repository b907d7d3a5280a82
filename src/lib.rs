//! Livefeed - Real-time event ingestion pipeline
//!
//! Keeps a push stream (SSE or NDJSON over HTTP) alive with reconnect and
//! backoff, falls back to polling while it is down, deduplicates and
//! shallow-merges inbound events into per-entity state, and fans the
//! resulting updates out to in-process subscribers.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
