/// Error taxonomy for a failed classification call, ordered the same way
/// the engine checks for them: transport-level failures take precedence
/// over HTTP-status failures, which take precedence over body-parse
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiErrorCode {
    Ok,
    /// Any non-timeout transport failure (DNS, connection refused, TLS, ...).
    Curl,
    /// A non-2xx HTTP response.
    Http,
    /// The request exceeded its connect or total timeout.
    Timeout,
    /// The response body parsed as something, but was missing `score`/`label`.
    Parse,
    /// No event to classify, or the client was never configured.
    Empty,
}

impl AiErrorCode {
    /// The stable code persisted to `ai_analysis.error_code`.
    pub fn as_code(self, http_status: i32) -> String {
        match self {
            AiErrorCode::Ok => "OK".to_string(),
            AiErrorCode::Timeout => "AI_TIMEOUT".to_string(),
            AiErrorCode::Http => {
                if http_status > 0 {
                    format!("AI_HTTP_{http_status}")
                } else {
                    "AI_HTTP".to_string()
                }
            }
            AiErrorCode::Parse => "AI_RESPONSE_INVALID".to_string(),
            AiErrorCode::Curl => "AI_CURL".to_string(),
            AiErrorCode::Empty => "AI_EMPTY".to_string(),
        }
    }
}

/// Outcome of one classification attempt. Always populated, never a
/// `Result` — a failed classification is a normal, recorded branch of the
/// pipeline rather than an exceptional one.
#[derive(Debug, Clone)]
pub struct AiResult {
    pub ok: bool,
    pub score: f64,
    pub label: String,
    pub model_version: String,
    pub http_status: i32,
    pub error_code: AiErrorCode,
    pub latency_ms: i64,
    /// Raw response snippet kept for diagnostics on failure; empty on success.
    pub raw: String,
}

impl Default for AiResult {
    fn default() -> Self {
        Self {
            ok: false,
            score: 0.0,
            label: String::new(),
            model_version: String::new(),
            http_status: 0,
            error_code: AiErrorCode::Empty,
            latency_ms: 0,
            raw: String::new(),
        }
    }
}

/// Classifier client configuration, built once at startup and held
/// read-only for the rest of the process.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub connect_timeout_ms: u64,
    pub total_timeout_ms: u64,
    pub token: Option<String>,
}
