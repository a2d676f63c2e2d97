//! Arbitrates a classifier score against the configured threshold.

use crate::classifier::types::AiResult;
use crate::policy::types::Action;

/// `threshold <= 0.0` is replaced with the default of `0.5`, so a
/// misconfigured (or unset) threshold degrades to a sane value instead of
/// blocking or allowing everything.
pub fn decide(result: &AiResult, threshold: f64) -> Action {
    if !result.ok {
        return Action::Review;
    }

    let threshold = if threshold > 0.0 { threshold } else { 0.5 };

    if result.score >= threshold {
        return Action::Block;
    }

    if result.label == "benign" && result.score < threshold * 0.5 {
        return Action::Allow;
    }

    Action::Review
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::types::AiErrorCode;

    fn ok_result(score: f64, label: &str) -> AiResult {
        AiResult {
            ok: true,
            score,
            label: label.to_string(),
            model_version: "test".to_string(),
            http_status: 200,
            error_code: AiErrorCode::Ok,
            latency_ms: 5,
            raw: String::new(),
        }
    }

    #[test]
    fn failed_classification_reviews() {
        let mut r = ok_result(0.9, "malicious");
        r.ok = false;
        assert_eq!(decide(&r, 0.5), Action::Review);
    }

    #[test]
    fn score_at_or_above_threshold_blocks() {
        assert_eq!(decide(&ok_result(0.5, "malicious"), 0.5), Action::Block);
        assert_eq!(decide(&ok_result(0.9, "malicious"), 0.5), Action::Block);
    }

    #[test]
    fn low_score_benign_allows() {
        assert_eq!(decide(&ok_result(0.1, "benign"), 0.5), Action::Allow);
    }

    #[test]
    fn benign_but_not_low_enough_reviews() {
        assert_eq!(decide(&ok_result(0.4, "benign"), 0.5), Action::Review);
    }

    #[test]
    fn non_benign_mid_score_reviews() {
        assert_eq!(decide(&ok_result(0.3, "suspicious"), 0.5), Action::Review);
    }

    #[test]
    fn non_positive_threshold_falls_back_to_default() {
        assert_eq!(decide(&ok_result(0.6, "malicious"), 0.0), Action::Block);
        assert_eq!(decide(&ok_result(0.6, "malicious"), -1.0), Action::Block);
    }
}
