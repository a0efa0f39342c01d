//! Group filtering engine
//!
//! Decides which catalog entries make it into the playlist. A pattern is one
//! of three shapes, tried in order:
//!
//! 1. **Multi-token** (contains whitespace): both pattern and label are split
//!    into whitespace tokens and compared position by position — wildcard
//!    tokens glob-match, plain tokens substring-match, and every position
//!    must succeed. A pattern with more tokens than the label cannot match.
//! 2. **Wildcard** (`*` or `?`): glob match against the whole label.
//! 3. **Plain**: case-insensitive substring containment.
//!
//! Matching runs for every (stream, pattern) pair of a request, so
//! [`GroupFilter`] lower-cases the pattern set once at compile time and the
//! per-stream labels once per call.

use glob_match::glob_match;

use crate::models::FilterSpec;

/// Check whether a label satisfies a filter pattern (case-insensitive)
pub fn matches(label: &str, pattern: &str) -> bool {
    matches_lowered(&label.to_lowercase(), &pattern.to_lowercase())
}

/// Matching core; both inputs must already be lower-cased
fn matches_lowered(label: &str, pattern: &str) -> bool {
    if pattern.contains(' ') {
        let pattern_tokens: Vec<&str> = pattern.split_whitespace().collect();
        let label_tokens: Vec<&str> = label.split_whitespace().collect();

        if pattern_tokens.len() > label_tokens.len() {
            return false;
        }

        return pattern_tokens.iter().enumerate().all(|(i, token)| {
            if has_wildcard(token) {
                glob_match(token, label_tokens[i])
            } else {
                label_tokens[i].contains(token)
            }
        });
    }

    if has_wildcard(pattern) {
        glob_match(pattern, label)
    } else {
        label.contains(pattern)
    }
}

fn has_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// A [`FilterSpec`] compiled for one request: patterns lower-cased once and
/// reused across every stream
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    wanted: Vec<String>,
    unwanted: Vec<String>,
}

impl GroupFilter {
    /// Lower-case the pattern sets. A non-empty `wanted` list switches the
    /// filter into inclusion mode and `unwanted` is ignored entirely.
    pub fn compile(spec: &FilterSpec) -> Self {
        Self {
            wanted: spec.wanted.iter().map(|p| p.to_lowercase()).collect(),
            unwanted: spec.unwanted.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Decide inclusion for a stream, testing each pattern against both the
    /// raw category name and the content-kind-prefixed group title so a
    /// filter value matches whether or not the caller anticipated the prefix
    pub fn includes(&self, category_name: &str, group_title: &str) -> bool {
        if self.wanted.is_empty() && self.unwanted.is_empty() {
            return true;
        }

        let category = category_name.to_lowercase();
        let title = group_title.to_lowercase();
        let hit = |patterns: &[String]| {
            patterns
                .iter()
                .any(|p| matches_lowered(&category, p) || matches_lowered(&title, p))
        };

        if !self.wanted.is_empty() {
            hit(&self.wanted)
        } else {
            !hit(&self.unwanted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_pattern_is_substring_containment() {
        assert!(matches("Sports HD", "sport"));
        assert!(matches("UK | NEWS", "news"));
        assert!(!matches("Documentaries", "sport"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert!(matches("SPORTS", "sports"));
        assert!(matches("sports", "SPORTS"));
    }

    #[test]
    fn test_wildcard_pattern_matches_whole_label() {
        assert!(matches("Sports HD", "sport*"));
        assert!(matches("US Sports", "*sports"));
        assert!(matches("Sport", "spor?"));
        // Glob must cover the whole label, unlike substring patterns
        assert!(!matches("US Sports HD", "sports*"));
    }

    #[test]
    fn test_multi_token_pattern_matches_per_position() {
        assert!(matches("Sports HD", "sport h*"));
        assert!(matches("UK Sports HD", "uk sport"));
        assert!(!matches("Sports", "sport h*"));
        assert!(!matches("HD Sports", "sport h*"));
    }

    #[test]
    fn test_multi_token_requires_enough_label_tokens() {
        assert!(!matches("Sports", "sports hd extra"));
        assert!(matches("Sports HD Extra", "sports hd extra"));
    }

    #[test]
    fn test_wanted_mode_shadows_unwanted() {
        let filter = GroupFilter::compile(&FilterSpec {
            wanted: vec!["News".into()],
            unwanted: vec!["Sports".into()],
        });
        // Matches both lists; the unwanted list never runs in wanted mode
        assert!(filter.includes("Sports News", "Sports News"));
        assert!(filter.includes("News", "News"));
        assert!(!filter.includes("Sports", "Sports"));
    }

    #[test]
    fn test_unwanted_mode_excludes_matches() {
        let filter = GroupFilter::compile(&FilterSpec {
            wanted: vec![],
            unwanted: vec!["Sports".into()],
        });
        assert!(!filter.includes("Sports", "Sports"));
        assert!(filter.includes("News", "News"));
    }

    #[test]
    fn test_empty_filter_includes_everything() {
        let filter = GroupFilter::compile(&FilterSpec::default());
        assert!(filter.includes("Anything", "VOD - Anything"));
    }

    #[test]
    fn test_patterns_match_raw_or_prefixed_title() {
        let filter = GroupFilter::compile(&FilterSpec {
            wanted: vec!["Action".into()],
            unwanted: vec![],
        });
        assert!(filter.includes("Action", "Series - Action"));

        let filter = GroupFilter::compile(&FilterSpec {
            wanted: vec!["Series - Action".into()],
            unwanted: vec![],
        });
        assert!(filter.includes("Action", "Series - Action"));
    }
}
