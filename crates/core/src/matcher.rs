//! Path-to-Plex-item matching with confidence scoring.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How sure a match is. A single unambiguous hit at any matching strategy
/// is `High`; more than one candidate surviving a strategy is `Low` and
/// leaves the decision (DLQ vs. skip) to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    High,
    Low,
}

impl fmt::Display for MatchConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchConfidence::High => "high",
            MatchConfidence::Low => "low",
        })
    }
}

/// A single candidate item surviving a matching strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub rating_key: String,
    pub library_section: String,
    pub file_path: String,
}

/// Result of running [`find_candidates`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    High(Candidate),
    Low(Vec<Candidate>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatcherError {
    #[error("no candidates found for path {0:?}")]
    NotFound(String),
}

/// One `(find, replace)` path-prefix rewrite, applied in list order with
/// first-match-wins semantics before any matching strategy runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRewriteRule {
    pub find_prefix: String,
    pub replace_with: String,
}

/// Apply the configured rewrite rules to `path`, in order, stopping at the
/// first rule whose prefix matches.
pub fn apply_path_rewrites(path: &str, rules: &[PathRewriteRule]) -> String {
    for rule in rules {
        if let Some(rest) = path.strip_prefix(rule.find_prefix.as_str()) {
            return format!("{}{}", rule.replace_with, rest);
        }
    }
    path.to_string()
}

fn filename_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Resolve `file_path` against the media parts of a single library section
/// using three ordered strategies: exact path, filename-only
/// (case-sensitive), then filename-only (case-insensitive). The first
/// strategy to produce any candidates wins; it is not retried against later
/// strategies even if ambiguous.
pub fn find_candidates(
    library_parts: &[Candidate],
    file_path: &str,
    rewrite_rules: &[PathRewriteRule],
) -> Result<MatchOutcome, MatcherError> {
    let rewritten = apply_path_rewrites(file_path, rewrite_rules);
    let target_name = filename_of(&rewritten);

    let exact: Vec<Candidate> = library_parts
        .iter()
        .filter(|c| c.file_path == rewritten)
        .cloned()
        .collect();
    if !exact.is_empty() {
        return Ok(outcome_from(exact));
    }

    let by_name: Vec<Candidate> = library_parts
        .iter()
        .filter(|c| filename_of(&c.file_path) == target_name)
        .cloned()
        .collect();
    if !by_name.is_empty() {
        return Ok(outcome_from(by_name));
    }

    let target_lower = target_name.to_lowercase();
    let by_name_ci: Vec<Candidate> = library_parts
        .iter()
        .filter(|c| filename_of(&c.file_path).to_lowercase() == target_lower)
        .cloned()
        .collect();
    if !by_name_ci.is_empty() {
        return Ok(outcome_from(by_name_ci));
    }

    Err(MatcherError::NotFound(file_path.to_string()))
}

fn outcome_from(mut candidates: Vec<Candidate>) -> MatchOutcome {
    if candidates.len() == 1 {
        MatchOutcome::High(candidates.remove(0))
    } else {
        MatchOutcome::Low(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(path: &str) -> Candidate {
        Candidate {
            rating_key: path.to_string(),
            library_section: "Movies".to_string(),
            file_path: path.to_string(),
        }
    }

    #[test]
    fn exact_path_match_is_high_confidence() {
        let parts = vec![candidate("/m/a.mp4"), candidate("/m/b.mp4")];
        let outcome = find_candidates(&parts, "/m/a.mp4", &[]).unwrap();
        assert_eq!(outcome, MatchOutcome::High(candidate("/m/a.mp4")));
    }

    #[test]
    fn falls_back_to_filename_match() {
        let parts = vec![candidate("/plex/m/a.mp4")];
        let outcome = find_candidates(&parts, "/stash/m/a.mp4", &[]).unwrap();
        assert_eq!(outcome, MatchOutcome::High(candidate("/plex/m/a.mp4")));
    }

    #[test]
    fn case_insensitive_filename_is_last_resort() {
        let parts = vec![candidate("/plex/m/A.MP4")];
        let outcome = find_candidates(&parts, "/stash/m/a.mp4", &[]).unwrap();
        assert_eq!(outcome, MatchOutcome::High(candidate("/plex/m/A.MP4")));
    }

    #[test]
    fn ambiguous_filename_is_low_confidence() {
        let parts = vec![candidate("/plex/dir1/a.mp4"), candidate("/plex/dir2/a.mp4")];
        let outcome = find_candidates(&parts, "/stash/a.mp4", &[]).unwrap();
        match outcome {
            MatchOutcome::Low(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("expected Low, got {other:?}"),
        }
    }

    #[test]
    fn zero_matches_is_not_found() {
        let parts = vec![candidate("/plex/m/other.mp4")];
        let err = find_candidates(&parts, "/stash/m/a.mp4", &[]).unwrap_err();
        assert!(matches!(err, MatcherError::NotFound(_)));
    }

    #[test]
    fn empty_section_is_not_found() {
        let err = find_candidates(&[], "/stash/m/a.mp4", &[]).unwrap_err();
        assert!(matches!(err, MatcherError::NotFound(_)));
    }

    #[test]
    fn rewrite_rules_apply_first_match_wins_in_order() {
        let rules = vec![
            PathRewriteRule {
                find_prefix: "/stash".to_string(),
                replace_with: "/plex".to_string(),
            },
            PathRewriteRule {
                find_prefix: "/stash/m".to_string(),
                replace_with: "/never".to_string(),
            },
        ];
        assert_eq!(apply_path_rewrites("/stash/m/a.mp4", &rules), "/plex/m/a.mp4");
    }

    #[test]
    fn exact_path_strategy_does_not_fall_through_when_ambiguous() {
        let parts = vec![candidate("/m/a.mp4"), candidate("/m/a.mp4")];
        let outcome = find_candidates(&parts, "/m/a.mp4", &[]).unwrap();
        match outcome {
            MatchOutcome::Low(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("expected Low, got {other:?}"),
        }
    }
}
