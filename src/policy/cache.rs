use std::collections::HashMap;

use rusqlite::Connection;

use super::types::{Action, MatchType, Policy, PolicyRule, RuleType};

/// Loads every enabled policy and its enabled rules, in the order the
/// matcher should walk them.
///
/// This is a snapshot: there is no reload path (policy changes require a
/// restart), so the returned `Vec` is meant to be held for the life of the
/// process behind an `Arc`.
pub fn load(conn: &Connection) -> rusqlite::Result<Vec<Policy>> {
    let mut stmt = conn.prepare(
        "SELECT policy_id, policy_name, policy_type, action, priority, is_enabled, \
                risk_level, category, block_status_code, redirect_url \
         FROM policy \
         WHERE is_enabled = 1 \
         ORDER BY priority DESC, policy_id ASC",
    )?;

    let mut policies: Vec<Policy> = stmt
        .query_map([], |row| {
            Ok(Policy {
                policy_id: row.get(0)?,
                policy_name: row.get(1)?,
                policy_type: row.get(2)?,
                action: Action::parse(&row.get::<_, String>(3)?),
                priority: row.get(4)?,
                is_enabled: row.get::<_, i64>(5)? != 0,
                risk_level: row.get(6)?,
                category: row.get(7)?,
                block_status_code: row.get(8)?,
                redirect_url: row.get(9)?,
                rules: Vec::new(),
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    let index: HashMap<i64, usize> = policies
        .iter()
        .enumerate()
        .map(|(i, p)| (p.policy_id, i))
        .collect();

    let mut rule_stmt = conn.prepare(
        "SELECT rule_id, policy_id, rule_type, match_type, pattern, \
                is_case_sensitive, is_negated, rule_order, is_enabled \
         FROM policy_rule \
         WHERE is_enabled = 1 \
         ORDER BY policy_id ASC, rule_order ASC, rule_id ASC",
    )?;

    let rule_rows = rule_stmt.query_map([], |row| {
        Ok(PolicyRule {
            rule_id: row.get(0)?,
            policy_id: row.get(1)?,
            rule_type: RuleType::parse(&row.get::<_, String>(2)?),
            match_type: MatchType::parse(&row.get::<_, String>(3)?),
            pattern: row.get(4)?,
            is_case_sensitive: row.get::<_, i64>(5)? != 0,
            is_negated: row.get::<_, i64>(6)? != 0,
            rule_order: row.get(7)?,
            is_enabled: row.get::<_, i64>(8)? != 0,
        })
    })?;

    for rule in rule_rows {
        let rule = rule?;
        if let Some(&idx) = index.get(&rule.policy_id) {
            policies[idx].rules.push(rule);
        }
    }

    Ok(policies)
}
