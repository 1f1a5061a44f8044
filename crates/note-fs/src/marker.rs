//! Candidate spellings for a marker token after markdown-editor escaping.
//!
//! Editors sometimes backslash-escape square brackets on save; the job
//! engine still has to find its own placeholder. This is a compatibility
//! fallback, not a parser: every candidate is matched as a literal
//! substring, never as a pattern.

/// Ordered, de-duplicated list of spellings a marker token might appear as
/// in saved note content: the raw token, then progressively more-escaped
/// variants of its outer (and then all) square brackets.
pub fn marker_candidates(marker_token: &str) -> Vec<String> {
    if marker_token.is_empty() {
        return Vec::new();
    }

    let outer_escaped = marker_token.replace("[[", r"\[\[");
    let both_escaped = outer_escaped.replace("]]", r"\]\]");
    let all_escaped = marker_token.replace('[', r"\[").replace(']', r"\]");

    let candidates = [
        marker_token.to_string(),
        outer_escaped,
        both_escaped,
        all_escaped,
    ];

    let mut seen = std::collections::HashSet::new();
    let mut ordered = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if seen.insert(candidate.clone()) {
            ordered.push(candidate);
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_has_no_candidates() {
        assert!(marker_candidates("").is_empty());
    }

    #[test]
    fn generates_outer_and_full_escapes() {
        // The "escape every bracket individually" variant collapses onto the
        // "escape only the outer pair" variant for a token with exactly one
        // `[[...]]` wrapping, so only 3 candidates survive dedup.
        let candidates = marker_candidates("[[tx:m:x]]");
        assert_eq!(
            candidates,
            vec![
                "[[tx:m:x]]".to_string(),
                r"\[\[tx:m:x]]".to_string(),
                r"\[\[tx:m:x\]\]".to_string(),
            ]
        );
    }

    #[test]
    fn nested_brackets_keep_all_variants_distinct() {
        // A token with brackets inside the outer pair makes the
        // "escape every bracket" variant diverge from "escape only outer".
        let candidates = marker_candidates("[[tx:m:[x]]]");
        assert_eq!(candidates.len(), 4);
        assert_eq!(candidates[0], "[[tx:m:[x]]]");
    }

    #[test]
    fn deduplicates_when_token_has_no_brackets() {
        let candidates = marker_candidates("plain-token");
        assert_eq!(candidates, vec!["plain-token".to_string()]);
    }
}
