// src/ingest/classify.rs
//! Term-string classification. Matching is case-sensitive, as upstream
//! capitalizes season names.

const SUMMER_KEYWORD: &str = "Summer";
const OFFSEASON_KEYWORDS: [&str; 3] = ["Fall", "Winter", "Spring"];

pub fn is_summer<S: AsRef<str>>(terms: &[S]) -> bool {
    terms.iter().any(|t| t.as_ref().contains(SUMMER_KEYWORD))
}

pub fn is_offseason<S: AsRef<str>>(terms: &[S]) -> bool {
    terms
        .iter()
        .any(|t| OFFSEASON_KEYWORDS.iter().any(|k| t.as_ref().contains(k)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summer_only() {
        let t = ["Summer 2026"];
        assert!(is_summer(&t));
        assert!(!is_offseason(&t));
    }

    #[test]
    fn each_offseason_keyword_matches() {
        for t in ["Fall 2025", "Winter 2026", "Spring 2026"] {
            assert!(is_offseason(&[t]), "{t}");
            assert!(!is_summer(&[t]), "{t}");
        }
    }

    #[test]
    fn malformed_dual_terms_match_both() {
        let t = ["Summer 2026", "Fall 2025"];
        assert!(is_summer(&t));
        assert!(is_offseason(&t));
    }

    #[test]
    fn case_sensitive_and_empty() {
        assert!(!is_summer(&["summer 2026"]));
        assert!(!is_offseason(&["fall 2025"]));
        let none: [&str; 0] = [];
        assert!(!is_summer(&none));
        assert!(!is_offseason(&none));
    }
}
