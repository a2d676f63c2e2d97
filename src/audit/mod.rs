//! SQLite-backed audit trail: one row per sniffed request, patched in
//! place as the pipeline reaches a decision and (if blocked) attempts an
//! injection, plus a per-request append-only log of classifier calls.

pub mod store;

pub use store::{AuditError, AuditResult, AuditStore};
