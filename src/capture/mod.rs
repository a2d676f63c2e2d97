//! Passive packet capture: pulls HTTP requests off the wire without
//! participating in the TCP connection itself.
//!
//! - [`types`] — the [`types::HttpEvent`]/[`types::TcpMeta`] data model handed to the engine.
//! - [`interfaces`] — enumerating capture-capable network interfaces.
//! - [`permissions`] — root/`CAP_NET_RAW` preflight check.
//! - [`extractor`] — best-effort HTTP request sniffing out of a raw TCP payload.
//! - [`listener`] — the BPF-filtered `pcap` capture loop that drives the engine.

pub mod extractor;
pub mod interfaces;
pub mod listener;
pub mod permissions;
pub mod types;

pub use listener::{open_capture, run_capture_loop, CaptureError};
pub use types::HttpEvent;
