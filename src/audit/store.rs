use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use thiserror::Error;

use crate::classifier::types::AiResult;
use crate::policy::types::Action;

/// Errors surfaced from the audit store. Per the engine's error-handling
/// contract, callers log these and keep going — a failed audit write never
/// aborts the request pipeline.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database connection poisoned")]
    Poisoned,
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Creates the `access_log`, `ai_analysis`, `policy`, and `policy_rule`
/// tables if they don't already exist. Safe to call on every startup.
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS access_log (
            log_id              INTEGER PRIMARY KEY AUTOINCREMENT,
            request_id          TEXT NOT NULL,
            detect_timestamp    TEXT NOT NULL DEFAULT (datetime('now')),
            client_ip           TEXT NOT NULL,
            host                TEXT NOT NULL,
            path                TEXT NOT NULL,
            decision            TEXT NOT NULL,
            reason              TEXT NOT NULL,
            decision_stage      TEXT NOT NULL,
            policy_id           INTEGER,
            inject_attempted    INTEGER,
            inject_send         INTEGER,
            inject_errno        INTEGER,
            inject_latency_ms   INTEGER,
            inject_status_code  INTEGER
         );

         CREATE TABLE IF NOT EXISTS ai_analysis (
            analysis_id     INTEGER PRIMARY KEY AUTOINCREMENT,
            log_id          INTEGER NOT NULL,
            analyzed_at     TEXT NOT NULL DEFAULT (datetime('now')),
            score           REAL,
            label           TEXT,
            ai_response     INTEGER NOT NULL,
            latency_ms      INTEGER,
            model_version   TEXT,
            error_code      TEXT,
            analysis_seq    INTEGER NOT NULL
         );

         CREATE TABLE IF NOT EXISTS policy (
            policy_id           INTEGER PRIMARY KEY,
            policy_name         TEXT NOT NULL,
            policy_type         TEXT NOT NULL,
            action              TEXT NOT NULL,
            priority            INTEGER NOT NULL DEFAULT 0,
            is_enabled          INTEGER NOT NULL DEFAULT 1,
            risk_level          TEXT NOT NULL DEFAULT '',
            category            TEXT NOT NULL DEFAULT '',
            block_status_code   INTEGER NOT NULL DEFAULT 403,
            redirect_url        TEXT NOT NULL DEFAULT ''
         );

         CREATE TABLE IF NOT EXISTS policy_rule (
            rule_id             INTEGER PRIMARY KEY,
            policy_id           INTEGER NOT NULL,
            rule_type           TEXT NOT NULL,
            match_type          TEXT NOT NULL,
            pattern             TEXT NOT NULL,
            is_case_sensitive   INTEGER NOT NULL DEFAULT 0,
            is_negated          INTEGER NOT NULL DEFAULT 0,
            rule_order          INTEGER NOT NULL DEFAULT 0,
            is_enabled          INTEGER NOT NULL DEFAULT 1
         );",
    )
}

/// Thread-safe handle to the audit SQLite database.
///
/// Only one thread ever touches this in practice (the capture loop), but
/// the connection is still wrapped the same way the rest of this codebase
/// wraps shared state, so a future multi-threaded offload doesn't need a
/// rewrite here.
#[derive(Clone)]
pub struct AuditStore {
    connection: Arc<Mutex<Connection>>,
}

impl AuditStore {
    pub fn open(path: &Path) -> AuditResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        ensure_schema(&conn)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> AuditResult<Self> {
        let conn = Connection::open_in_memory()?;
        ensure_schema(&conn)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> AuditResult<std::sync::MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|_| AuditError::Poisoned)
    }

    /// Loads the enabled policy/rule set over the same connection the
    /// audit log uses. Policies and access-log rows live in the same
    /// database, so there's no separate connection to manage.
    pub fn load_policies(&self) -> AuditResult<Vec<crate::policy::Policy>> {
        let conn = self.lock()?;
        Ok(crate::policy::cache::load(&conn)?)
    }

    /// Reads back one access_log row's decision fields. Test-only: production
    /// code never needs to read its own writes back.
    #[cfg(test)]
    pub fn debug_fetch_decision(&self, log_id: i64) -> (String, String, String) {
        let conn = self.lock().unwrap();
        conn.query_row(
            "SELECT decision, reason, decision_stage FROM access_log WHERE log_id = ?1",
            [log_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap()
    }

    /// Inserts the initial row for a sniffed request. Starts out in the
    /// `ERROR`/`SYSTEM`/`FAIL_STAGE` state so a row left un-updated (the
    /// process dying mid-dispatch) reads as a failure rather than a
    /// silently-allowed request.
    pub fn insert_access_log(
        &self,
        request_id: &str,
        client_ip: &str,
        host: &str,
        path: &str,
    ) -> AuditResult<i64> {
        let path = if path.is_empty() { "/" } else { path };
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO access_log (request_id, client_ip, host, path, decision, reason, decision_stage) \
             VALUES (?1, ?2, ?3, ?4, 'ERROR', 'SYSTEM', 'FAIL_STAGE')",
            rusqlite::params![request_id, client_ip, host, path],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_access_log_decision(
        &self,
        log_id: i64,
        decision: Action,
        reason: &str,
        stage: &str,
        policy_id: i64,
    ) -> AuditResult<()> {
        let conn = self.lock()?;
        let policy_id_param: Option<i64> = if policy_id == 0 { None } else { Some(policy_id) };
        conn.execute(
            "UPDATE access_log SET decision = ?1, reason = ?2, decision_stage = ?3, policy_id = ?4 \
             WHERE log_id = ?5",
            rusqlite::params![decision.as_str(), reason, stage, policy_id_param, log_id],
        )?;
        Ok(())
    }

    pub fn update_access_log_inject(
        &self,
        log_id: i64,
        outcome: &crate::inject::InjectOutcome,
    ) -> AuditResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE access_log SET \
                inject_attempted = ?1, inject_send = ?2, inject_errno = ?3, \
                inject_latency_ms = ?4, inject_status_code = ?5 \
             WHERE log_id = ?6",
            rusqlite::params![
                outcome.attempted as i64,
                outcome.send_ok as i64,
                outcome.errno,
                outcome.latency_ms,
                outcome.status_code,
                log_id,
            ],
        )?;
        Ok(())
    }

    /// Inserts one `ai_analysis` row, computing the next contiguous
    /// `analysis_seq` for this `log_id` inside the same transaction so
    /// concurrent writers (were there any) couldn't race on the sequence.
    pub fn insert_ai_analysis(
        &self,
        log_id: i64,
        result: &AiResult,
        ai_response: bool,
        error_code: Option<&str>,
    ) -> AuditResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(analysis_seq), -1) + 1 FROM ai_analysis WHERE log_id = ?1",
            [log_id],
            |row| row.get(0),
        )?;

        let label: Option<&str> = if result.label.is_empty() {
            None
        } else {
            Some(&result.label)
        };
        let model_version = if result.model_version.is_empty() {
            "unknown"
        } else {
            &result.model_version
        };

        tx.execute(
            "INSERT INTO ai_analysis \
                (log_id, score, label, ai_response, latency_ms, model_version, error_code, analysis_seq) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                log_id,
                result.score,
                label,
                ai_response as i64,
                result.latency_ms,
                model_version,
                error_code,
                seq,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::types::AiErrorCode;

    fn store() -> AuditStore {
        AuditStore::open_in_memory().unwrap()
    }

    #[test]
    fn insert_access_log_starts_in_fail_state() {
        let s = store();
        let log_id = s.insert_access_log("req-1", "1.2.3.4", "example.com", "/x").unwrap();
        assert!(log_id > 0);
    }

    #[test]
    fn decision_update_binds_null_policy_id_for_zero() {
        let s = store();
        let log_id = s.insert_access_log("req-1", "1.2.3.4", "example.com", "/").unwrap();
        s.update_access_log_decision(log_id, Action::Review, "SYSTEM", "FAIL_STAGE", 0)
            .unwrap();
    }

    #[test]
    fn open_creates_parent_directories_and_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("access.db");

        {
            let s = AuditStore::open(&db_path).unwrap();
            s.insert_access_log("req-1", "1.2.3.4", "example.com", "/").unwrap();
        }

        let s = AuditStore::open(&db_path).unwrap();
        let (decision, _, _) = s.debug_fetch_decision(1);
        assert_eq!(decision, "ERROR"); // never updated past insertion
    }

    #[test]
    fn analysis_seq_is_contiguous_per_log_id() {
        let s = store();
        let log_id = s.insert_access_log("req-1", "1.2.3.4", "example.com", "/").unwrap();

        let mut result = AiResult {
            ok: true,
            score: 0.1,
            label: "benign".to_string(),
            model_version: "m1".to_string(),
            http_status: 200,
            error_code: AiErrorCode::Ok,
            latency_ms: 5,
            raw: String::new(),
        };
        s.insert_ai_analysis(log_id, &result, true, None).unwrap();
        result.score = 0.9;
        s.insert_ai_analysis(log_id, &result, true, None).unwrap();

        let conn = s.connection.lock().unwrap();
        let seqs: Vec<i64> = conn
            .prepare("SELECT analysis_seq FROM ai_analysis WHERE log_id = ?1 ORDER BY analysis_seq")
            .unwrap()
            .query_map([log_id], |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(seqs, vec![0, 1]);
    }
}
