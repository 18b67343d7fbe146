//! Keyword Matcher
//!
//! Decides whether a content unit's aggregated text mentions any filtered
//! keyword. Matching is whole-word and case-insensitive, and each keyword
//! also matches its possessive (`kw's`) and plural (`kw` + `s`) forms.
//!
//! The plural rule is deliberately naive: `"mouse"` yields `"mouses"`, never
//! `"mice"`.
//!
//! ```
//! use uf_core::matcher::matches;
//!
//! assert!(matches("Trump's policy", &["trump"]));
//! assert!(!matches("trumpeter plays", &["trump"]));
//! ```

use regex::Regex;

/// Error type for keyword compilation.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Failed to compile pattern for keyword '{keyword}': {source}")]
    Pattern {
        keyword: String,
        #[source]
        source: regex::Error,
    },
}

// =============================================================================
// KeywordMatcher
// =============================================================================

/// One compiled pattern per keyword.
struct KeywordPattern {
    keyword: String,
    regex: Regex,
}

/// A filter set compiled once and reused for every content unit.
pub struct KeywordMatcher {
    patterns: Vec<KeywordPattern>,
}

impl KeywordMatcher {
    /// Compile a filter set.
    ///
    /// Keywords that are empty after trimming are skipped: their pattern
    /// would match at every word boundary.
    pub fn new<S: AsRef<str>>(filters: &[S]) -> Result<Self, MatchError> {
        let mut patterns = Vec::with_capacity(filters.len());

        for filter in filters {
            let keyword = filter.as_ref();
            if keyword.trim().is_empty() {
                log::debug!("Skipping blank keyword");
                continue;
            }

            let regex = Regex::new(&keyword_pattern(keyword)).map_err(|source| MatchError::Pattern {
                keyword: keyword.to_string(),
                source,
            })?;
            patterns.push(KeywordPattern {
                keyword: keyword.to_string(),
                regex,
            });
        }

        Ok(Self { patterns })
    }

    /// Number of usable keywords.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True if any keyword occurs in `text` as a whole word.
    pub fn is_match(&self, text: &str) -> bool {
        self.find_keyword(text).is_some()
    }

    /// The first keyword (in filter order) found in `text`.
    pub fn find_keyword(&self, text: &str) -> Option<&str> {
        if text.is_empty() || self.patterns.is_empty() {
            return None;
        }

        let normalized = text.to_lowercase();
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(&normalized))
            .map(|p| p.keyword.as_str())
    }

    /// The keywords this matcher was compiled from, blanks excluded.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.keyword.as_str())
    }
}

impl std::fmt::Debug for KeywordMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordMatcher")
            .field("keywords", &self.keywords().collect::<Vec<_>>())
            .finish()
    }
}

/// Match `text` against `filters` without keeping the compiled form.
///
/// Never panics: a keyword that fails to compile is logged and the text is
/// reported as not matching.
pub fn matches<S: AsRef<str>>(text: &str, filters: &[S]) -> bool {
    match KeywordMatcher::new(filters) {
        Ok(matcher) => matcher.is_match(text),
        Err(e) => {
            log::warn!("{}", e);
            false
        }
    }
}

/// Build `\b(?:kw|kw's|kws)\b` for a lowercased, escaped keyword.
fn keyword_pattern(keyword: &str) -> String {
    let kw = regex::escape(&keyword.to_lowercase());
    format!(r"\b(?:{kw}|{kw}'s|{kw}s)\b")
}
