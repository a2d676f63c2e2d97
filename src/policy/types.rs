/// What the matching policy tells the engine to do with a request.
///
/// `Unknown` is the safe default for any unrecognized string read out of
/// the store — it never causes a parse error, it just can't ever be the
/// action of a policy that actually matches (see [`super::matcher`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Unknown,
    Allow,
    Block,
    Redirect,
    Review,
}

impl Action {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "ALLOW" => Action::Allow,
            "BLOCK" => Action::Block,
            "REDIRECT" => Action::Redirect,
            "REVIEW" => Action::Review,
            _ => Action::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Unknown => "UNKNOWN",
            Action::Allow => "ALLOW",
            Action::Block => "BLOCK",
            Action::Redirect => "REDIRECT",
            Action::Review => "REVIEW",
        }
    }
}

/// Which part of the request a rule's pattern is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleType {
    Host,
    Path,
    Url,
}

impl RuleType {
    /// Unrecognized strings fall back to `Host`, matching the coercion the
    /// original policy loader applies.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "PATH" => RuleType::Path,
            "URL" => RuleType::Url,
            _ => RuleType::Host,
        }
    }
}

/// How a rule's pattern is compared against its target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    Prefix,
    Contains,
    Regex,
}

impl MatchType {
    /// Unrecognized strings fall back to `Exact`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "PREFIX" => MatchType::Prefix,
            "CONTAINS" => MatchType::Contains,
            "REGEX" => MatchType::Regex,
            _ => MatchType::Exact,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub rule_id: i64,
    pub policy_id: i64,
    pub rule_type: RuleType,
    pub match_type: MatchType,
    pub pattern: String,
    pub is_case_sensitive: bool,
    pub is_negated: bool,
    pub rule_order: i32,
    pub is_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct Policy {
    pub policy_id: i64,
    pub policy_name: String,
    pub policy_type: String,
    pub action: Action,
    pub priority: i32,
    pub is_enabled: bool,
    pub risk_level: String,
    pub category: String,
    pub block_status_code: i32,
    pub redirect_url: String,
    pub rules: Vec<PolicyRule>,
}

/// Outcome of walking the policy cache for one request.
#[derive(Debug, Clone, Default)]
pub struct PolicyDecision {
    pub matched: bool,
    pub policy_id: i64,
    pub action: Option<Action>,
    pub block_status_code: i32,
    pub redirect_url: String,
}
