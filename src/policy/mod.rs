//! Policy cache and matcher: the first, database-backed line of
//! enforcement that runs before any call out to the external classifier.
//!
//! - [`types`] — `Action`/`RuleType`/`MatchType` and the `Policy`/`PolicyRule` rows.
//! - [`cache`] — loads the enabled policy/rule set once at startup.
//! - [`matcher`] — first-match-wins evaluation against one request.

pub mod cache;
pub mod matcher;
pub mod types;

pub use matcher::match_policy;
pub use types::{Policy, PolicyDecision};
