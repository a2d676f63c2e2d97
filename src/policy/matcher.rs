use regex::RegexBuilder;

use super::types::{MatchType, Policy, PolicyDecision, RuleType};

fn eq_ci(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn starts_with(target: &str, pattern: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        target.starts_with(pattern)
    } else {
        target
            .as_bytes()
            .get(..pattern.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(pattern.as_bytes()))
    }
}

fn contains(target: &str, pattern: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        target.contains(pattern)
    } else {
        target.to_ascii_lowercase().contains(&pattern.to_ascii_lowercase())
    }
}

/// Compiles `pattern` and tests it against `target`. A pattern that fails
/// to compile never matches — it is not a dispatch error, just a rule that
/// can never fire.
fn matches_regex(target: &str, pattern: &str, case_sensitive: bool) -> bool {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map(|re| re.is_match(target))
        .unwrap_or(false)
}

fn rule_matches(rule: &super::types::PolicyRule, host: &str, path: &str, url_norm: &str) -> bool {
    if !rule.is_enabled {
        return false;
    }

    let target = match rule.rule_type {
        RuleType::Host => host,
        RuleType::Path => path,
        RuleType::Url => url_norm,
    };

    let matched = match rule.match_type {
        MatchType::Exact => {
            if rule.is_case_sensitive {
                target == rule.pattern
            } else {
                eq_ci(target, &rule.pattern)
            }
        }
        MatchType::Prefix => starts_with(target, &rule.pattern, rule.is_case_sensitive),
        MatchType::Contains => contains(target, &rule.pattern, rule.is_case_sensitive),
        MatchType::Regex => matches_regex(target, &rule.pattern, rule.is_case_sensitive),
    };

    if rule.is_negated {
        !matched
    } else {
        matched
    }
}

/// Walks the cache in load order (priority descending, then policy id
/// ascending — the order `policies` was built in) and returns the first
/// enabled, non-empty policy with any matching rule. A policy with zero
/// rules can never match.
pub fn match_policy(policies: &[Policy], host: &str, path: &str, url_norm: &str) -> PolicyDecision {
    let host = if host.is_empty() { "" } else { host };
    let path = if path.is_empty() { "/" } else { path };

    for policy in policies {
        if !policy.is_enabled || policy.rules.is_empty() {
            continue;
        }

        let any_match = policy
            .rules
            .iter()
            .any(|rule| rule_matches(rule, host, path, url_norm));

        if any_match {
            return PolicyDecision {
                matched: true,
                policy_id: policy.policy_id,
                action: Some(policy.action),
                block_status_code: if policy.block_status_code > 0 {
                    policy.block_status_code
                } else {
                    403
                },
                redirect_url: policy.redirect_url.clone(),
            };
        }
    }

    PolicyDecision::default()
}
