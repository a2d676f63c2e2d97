//! Wires capture, policy matching, classification, decision-making,
//! injection, and audit logging together into the per-request dispatch
//! that the capture loop calls for every sniffed HTTP event.

use std::sync::Arc;

use log::warn;
use uuid::Uuid;

use crate::audit::AuditStore;
use crate::capture::HttpEvent;
use crate::classifier::ClassifierClient;
use crate::decision;
use crate::inject;
use crate::policy::{self, Policy};
use crate::policy::types::Action;

pub struct Engine {
    policies: Arc<Vec<Policy>>,
    classifier: Arc<ClassifierClient>,
    audit: AuditStore,
    threshold: f64,
}

impl Engine {
    pub fn new(
        policies: Arc<Vec<Policy>>,
        classifier: Arc<ClassifierClient>,
        audit: AuditStore,
        threshold: f64,
    ) -> Self {
        Self {
            policies,
            classifier,
            audit,
            threshold,
        }
    }

    /// Handles one sniffed HTTP request end to end. Never panics on a bad
    /// audit write or classifier failure — those are logged and the
    /// pipeline falls through to its documented fail-safe outcome.
    pub fn handle_http_event(&self, event: &HttpEvent) {
        let request_id = Uuid::new_v4().to_string();

        let log_id = match self.audit.insert_access_log(
            &request_id,
            &event.meta.client_ip.to_string(),
            &event.host,
            &event.path,
        ) {
            Ok(id) => id,
            Err(e) => {
                warn!("failed to insert access log: {e}");
                return;
            }
        };

        let decision = policy::match_policy(&self.policies, &event.host, &event.path, &event.url_norm);

        if decision.matched {
            self.dispatch_policy_decision(event, log_id, &decision);
            return;
        }

        self.dispatch_classifier_decision(event, log_id, &request_id);
    }

    fn dispatch_policy_decision(&self, event: &HttpEvent, log_id: i64, decision: &policy::PolicyDecision) {
        let action = decision.action.unwrap_or(Action::Unknown);

        match action {
            Action::Block => {
                self.record_decision(log_id, Action::Block, "POLICY", "POLICY_STAGE", decision.policy_id);
                self.inject_and_record(event, log_id, decision.block_status_code);
            }
            Action::Allow => {
                self.record_decision(log_id, Action::Allow, "POLICY", "POLICY_STAGE", decision.policy_id);
            }
            // A policy-level redirect has no enforcement surface yet on this
            // synchronous capture path, so it collapses to REVIEW pending a
            // proper redirect implementation. See the design notes on why
            // this is intentional rather than an oversight.
            Action::Redirect | Action::Review | Action::Unknown => {
                self.record_decision(log_id, Action::Review, "POLICY", "POLICY_STAGE", decision.policy_id);
            }
        }
    }

    fn dispatch_classifier_decision(&self, event: &HttpEvent, log_id: i64, request_id: &str) {
        let result = self.classifier.classify(event, Some(request_id));

        let error_code = if result.ok {
            None
        } else {
            Some(result.error_code.as_code(result.http_status))
        };

        if let Err(e) = self
            .audit
            .insert_ai_analysis(log_id, &result, result.ok, error_code.as_deref())
        {
            warn!("failed to insert ai analysis: {e}");
        }

        if !result.ok {
            self.record_decision(log_id, Action::Review, "SYSTEM", "FAIL_STAGE", 0);
            return;
        }

        match decision::decide(&result, self.threshold) {
            Action::Block => {
                self.record_decision(log_id, Action::Block, "AI", "AI_STAGE", 0);
                self.inject_and_record(event, log_id, 403);
            }
            Action::Allow => {
                self.record_decision(log_id, Action::Allow, "AI", "AI_STAGE", 0);
            }
            _ => {
                self.record_decision(log_id, Action::Review, "AI", "AI_STAGE", 0);
            }
        }
    }

    fn record_decision(&self, log_id: i64, action: Action, reason: &str, stage: &str, policy_id: i64) {
        if let Err(e) = self
            .audit
            .update_access_log_decision(log_id, action, reason, stage, policy_id)
        {
            warn!("failed to update access log decision: {e}");
        }
    }

    fn inject_and_record(&self, event: &HttpEvent, log_id: i64, status_code: i32) {
        let ip_id = (log_id & 0xFFFF) as u16;
        let outcome = inject::inject(event, status_code, ip_id);
        if let Err(e) = self.audit.update_access_log_inject(log_id, &outcome) {
            warn!("failed to update access log injection result: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::TcpMeta;
    use crate::classifier::{AiResult, ClassifierConfig};
    use crate::policy::types::{MatchType, PolicyRule, RuleType};
    use std::net::Ipv4Addr;

    fn event<'a>(payload: &'a [u8], host: &str, path: &str) -> HttpEvent<'a> {
        HttpEvent {
            method: "GET".to_string(),
            host: host.to_string(),
            path: path.to_string(),
            url_norm: format!("{host}{path}"),
            payload,
            meta: TcpMeta {
                client_ip: Ipv4Addr::new(10, 0, 0, 5),
                server_ip: Ipv4Addr::new(10, 0, 0, 1),
                client_port: 51234,
                server_port: 80,
                seq: 1000,
                ack: 2000,
                tcp_flags: 0x18,
            },
        }
    }

    fn blocking_policy() -> Policy {
        Policy {
            policy_id: 1,
            policy_name: "block-evil".to_string(),
            policy_type: "blocklist".to_string(),
            action: Action::Block,
            priority: 100,
            is_enabled: true,
            risk_level: "high".to_string(),
            category: "test".to_string(),
            block_status_code: 403,
            redirect_url: String::new(),
            rules: vec![PolicyRule {
                rule_id: 1,
                policy_id: 1,
                rule_type: RuleType::Host,
                match_type: MatchType::Contains,
                pattern: "evil".to_string(),
                is_case_sensitive: false,
                is_negated: false,
                rule_order: 0,
                is_enabled: true,
            }],
        }
    }

    #[test]
    fn policy_block_records_decision_without_calling_classifier() {
        let audit = AuditStore::open_in_memory().unwrap();
        let classifier = ClassifierClient::new(ClassifierConfig {
            endpoint: String::new(), // unreachable on purpose; should never be called
            connect_timeout_ms: 100,
            total_timeout_ms: 100,
            token: None,
        })
        .unwrap();

        let engine = Engine::new(
            Arc::new(vec![blocking_policy()]),
            Arc::new(classifier),
            audit.clone(),
            0.5,
        );

        let payload = b"GET /x HTTP/1.1\r\nHost: evil.example.com\r\n\r\n";
        let ev = event(payload, "evil.example.com", "/x");
        engine.handle_http_event(&ev);

        let (decision, reason, stage) = audit.debug_fetch_decision(1);
        assert_eq!(decision, "BLOCK");
        assert_eq!(reason, "POLICY");
        assert_eq!(stage, "POLICY_STAGE");
    }

    #[test]
    fn policy_allow_records_decision_without_injecting_or_calling_classifier() {
        let audit = AuditStore::open_in_memory().unwrap();
        let classifier = ClassifierClient::new(ClassifierConfig {
            endpoint: String::new(), // unreachable on purpose; should never be called
            connect_timeout_ms: 100,
            total_timeout_ms: 100,
            token: None,
        })
        .unwrap();

        let allow_policy = Policy {
            policy_id: 1,
            policy_name: "allow-health".to_string(),
            policy_type: "allowlist".to_string(),
            action: Action::Allow,
            priority: 100,
            is_enabled: true,
            risk_level: "low".to_string(),
            category: "test".to_string(),
            block_status_code: 403,
            redirect_url: String::new(),
            rules: vec![PolicyRule {
                rule_id: 1,
                policy_id: 1,
                rule_type: RuleType::Path,
                match_type: MatchType::Prefix,
                pattern: "/health".to_string(),
                is_case_sensitive: false,
                is_negated: false,
                rule_order: 0,
                is_enabled: true,
            }],
        };

        let engine = Engine::new(Arc::new(vec![allow_policy]), Arc::new(classifier), audit.clone(), 0.5);

        let payload = b"GET /healthz HTTP/1.1\r\nHost: svc\r\n\r\n";
        let ev = event(payload, "svc", "/healthz");
        engine.handle_http_event(&ev);

        let (decision, reason, stage) = audit.debug_fetch_decision(1);
        assert_eq!(decision, "ALLOW");
        assert_eq!(reason, "POLICY");
        assert_eq!(stage, "POLICY_STAGE");
    }

    #[test]
    fn missing_host_header_still_reaches_a_terminal_decision() {
        // No policy matches "_missing_", so this falls through to the
        // classifier, which is unreachable here — the request must still
        // land on a single terminal decision (REVIEW/FAIL_STAGE) rather
        // than being dropped for lacking a Host header.
        let audit = AuditStore::open_in_memory().unwrap();
        let classifier = ClassifierClient::new(ClassifierConfig {
            endpoint: String::new(),
            connect_timeout_ms: 50,
            total_timeout_ms: 50,
            token: None,
        })
        .unwrap();

        let engine = Engine::new(Arc::new(Vec::new()), Arc::new(classifier), audit.clone(), 0.5);

        let payload = b"GET /submit HTTP/1.1\r\n\r\n";
        let ev = event(payload, "_missing_", "/submit");
        engine.handle_http_event(&ev);

        let (decision, reason, stage) = audit.debug_fetch_decision(1);
        assert_eq!(decision, "REVIEW");
        assert_eq!(reason, "SYSTEM");
        assert_eq!(stage, "FAIL_STAGE");
    }

    #[test]
    fn ai_result_error_code_round_trips_through_as_code() {
        let r = AiResult {
            ok: false,
            ..Default::default()
        };
        assert_eq!(r.error_code.as_code(0), "AI_EMPTY");
    }
}
