//! External URL-classifier HTTP client.
//!
//! - [`types`] — the request/response data model and error taxonomy.
//! - [`client`] — the blocking HTTP call and tolerant response parsing.

pub mod client;
pub mod types;

pub use client::ClassifierClient;
pub use types::{AiErrorCode, AiResult, ClassifierConfig};
