//! # GateGuard
//!
//! An inline HTTP gateway/guard: it passively sniffs HTTP requests off a
//! network interface, checks them against a local policy cache and (if
//! nothing matches) an external URL classifier, and for any request that
//! comes back BLOCK, forges a server-to-client 403 response directly onto
//! the wire. Every request is recorded to a local audit database whether
//! or not it is ever classified or blocked.
//!
//! ## Architecture
//!
//! - [`capture`] sniffs HTTP requests passively off the wire.
//! - [`policy`] holds the local allow/block rule cache.
//! - [`classifier`] calls out to an external scoring service.
//! - [`decision`] arbitrates a classifier score into a final action.
//! - [`forge`] and [`inject`] build and send the forged 403 response.
//! - [`audit`] persists one row per request plus a log of classifier calls.
//! - [`engine`] wires all of the above into the per-request dispatch.
//!
//! The whole pipeline runs on a single thread: the capture loop itself.

mod audit;
mod capture;
mod classifier;
mod config;
mod decision;
mod engine;
mod forge;
mod inject;
mod policy;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};

use audit::AuditStore;
use classifier::{ClassifierClient, ClassifierConfig};
use config::Config;
use engine::Engine;

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::load();

    info!("GateGuard starting on interface {}", config.ifname);

    let audit = AuditStore::open(Path::new(&config.db_path)).with_context(|| {
        format!("failed to open audit database at {}", config.db_path)
    })?;

    // Policy load failure is tolerated at startup: the engine still runs,
    // it simply falls through to the classifier for every request.
    let policies = match audit.load_policies() {
        Ok(policies) => {
            info!(
                "policy loaded: {} polic{}",
                policies.len(),
                if policies.len() == 1 { "y" } else { "ies" }
            );
            policies
        }
        Err(e) => {
            error!("policy load failed: {e}");
            Vec::new()
        }
    };

    let classifier_config = ClassifierConfig {
        endpoint: config.ai_endpoint.clone(),
        connect_timeout_ms: config.ai_connect_timeout_ms,
        total_timeout_ms: config.ai_total_timeout_ms,
        token: config.ai_token.clone(),
    };
    let classifier = match ClassifierClient::new(classifier_config) {
        Ok(c) => c,
        Err(e) => {
            // MVP: keep running; every request will simply fail classification
            // and fall through to REVIEW/FAIL_STAGE.
            warn!("classifier client init failed: {e}");
            ClassifierClient::new(ClassifierConfig {
                endpoint: String::new(),
                connect_timeout_ms: config.ai_connect_timeout_ms,
                total_timeout_ms: config.ai_total_timeout_ms,
                token: None,
            })
            .expect("degraded classifier client must still build")
        }
    };

    let engine = Engine::new(Arc::new(policies), Arc::new(classifier), audit, config.ai_threshold);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            info!("SIGINT received, shutting down");
            running.store(false, Ordering::SeqCst);
        })
        .context("failed to set SIGINT handler")?;
    }

    capture::run_capture_loop(&config.ifname, running, move |event| {
        engine.handle_http_event(&event);
    })
    .context("capture loop failed")?;

    Ok(())
}
