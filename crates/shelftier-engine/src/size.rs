//! Package-size bucket detection from SKU and variant title text.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

pub const DEFAULT_SIZE30_PATTERN: &str = r"(?:^|[^0-9])30(?:\s*ml)?(?:$|[^0-9])";
pub const DEFAULT_SIZE100_PATTERN: &str = r"(?:^|[^0-9])100(?:\s*ml)?(?:$|[^0-9])";

static SUFFIX_30_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-30\b").expect("valid regex"));
static SUFFIX_100_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-100\b").expect("valid regex"));

/// A compiled text predicate. Implemented for [`Regex`]; other matchers can
/// be injected for tests or alternative catalogs.
pub trait TextMatcher: Send + Sync {
    fn is_match(&self, text: &str) -> bool;
}

impl TextMatcher for Regex {
    fn is_match(&self, text: &str) -> bool {
        Regex::is_match(self, text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeBucket {
    Size30,
    Size100,
}

/// Classifier verdict. At most one flag is ever set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeMatch {
    pub is30: bool,
    pub is100: bool,
}

impl SizeMatch {
    #[must_use]
    pub fn bucket(self) -> Option<SizeBucket> {
        match (self.is30, self.is100) {
            (true, false) => Some(SizeBucket::Size30),
            (false, true) => Some(SizeBucket::Size100),
            _ => None,
        }
    }
}

pub struct SizeClassifier {
    size30: Box<dyn TextMatcher>,
    size100: Box<dyn TextMatcher>,
}

impl std::fmt::Debug for SizeClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SizeClassifier").finish_non_exhaustive()
    }
}

impl Default for SizeClassifier {
    fn default() -> Self {
        Self::from_patterns(None, None)
    }
}

impl SizeClassifier {
    pub fn new(size30: Box<dyn TextMatcher>, size100: Box<dyn TextMatcher>) -> Self {
        Self { size30, size100 }
    }

    /// Compiles case-insensitive patterns once. A pattern that is absent or
    /// fails to compile is replaced by the built-in default.
    #[must_use]
    pub fn from_patterns(size30: Option<&str>, size100: Option<&str>) -> Self {
        Self {
            size30: Box::new(compile_or_default(size30, DEFAULT_SIZE30_PATTERN, "size30")),
            size100: Box::new(compile_or_default(
                size100,
                DEFAULT_SIZE100_PATTERN,
                "size100",
            )),
        }
    }

    /// Tests both patterns against the SKU and title, plus the `-30`/`-100`
    /// suffix on the SKU. A line matching both sizes is classified as neither.
    #[must_use]
    pub fn classify(&self, sku: &str, title: &str) -> SizeMatch {
        let has100 = self.size100.is_match(sku)
            || self.size100.is_match(title)
            || SUFFIX_100_RE.is_match(sku);
        let has30 = self.size30.is_match(sku)
            || self.size30.is_match(title)
            || SUFFIX_30_RE.is_match(sku);
        SizeMatch {
            is30: has30 && !has100,
            is100: has100 && !has30,
        }
    }
}

fn compile_or_default(pattern: Option<&str>, default: &str, which: &str) -> Regex {
    if let Some(raw) = pattern.map(str::trim).filter(|p| !p.is_empty()) {
        match RegexBuilder::new(raw).case_insensitive(true).build() {
            Ok(re) => return re,
            Err(e) => {
                tracing::warn!(pattern = raw, which, error = %e, "invalid size pattern, using default");
            }
        }
    }
    RegexBuilder::new(default)
        .case_insensitive(true)
        .build()
        .expect("valid regex")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_size_tokens_in_title() {
        let c = SizeClassifier::default();
        assert_eq!(c.classify("", "100 ml").bucket(), Some(SizeBucket::Size100));
        assert_eq!(c.classify("", "30ML").bucket(), Some(SizeBucket::Size30));
        assert_eq!(c.classify("", "Travel 30").bucket(), Some(SizeBucket::Size30));
    }

    #[test]
    fn ignores_digits_embedded_in_longer_numbers() {
        let c = SizeClassifier::default();
        assert_eq!(c.classify("ROSE1000", "1300 ml").bucket(), None);
        assert_eq!(c.classify("", "330").bucket(), None);
    }

    #[test]
    fn sku_suffix_is_a_fallback() {
        let c = SizeClassifier::from_patterns(Some("^never$"), Some("^never$"));
        assert_eq!(c.classify("PF-ROSE-100", "").bucket(), Some(SizeBucket::Size100));
        assert_eq!(c.classify("PF-ROSE-30", "").bucket(), Some(SizeBucket::Size30));
        assert_eq!(c.classify("PF-ROSE-300", "").bucket(), None);
    }

    #[test]
    fn both_sizes_match_is_neither() {
        let c = SizeClassifier::default();
        let verdict = c.classify("ROSE-30", "100 ml");
        assert_eq!(verdict, SizeMatch::default());
        assert_eq!(verdict.bucket(), None);
    }

    #[test]
    fn invalid_pattern_falls_back_to_default() {
        let c = SizeClassifier::from_patterns(Some("(unclosed"), None);
        assert_eq!(c.classify("", "30 ml").bucket(), Some(SizeBucket::Size30));
    }

    #[test]
    fn custom_patterns_are_case_insensitive() {
        let c = SizeClassifier::from_patterns(Some(r"\bmini\b"), Some(r"\bfull\b"));
        assert_eq!(c.classify("", "MINI").bucket(), Some(SizeBucket::Size30));
        assert_eq!(c.classify("", "Full size").bucket(), Some(SizeBucket::Size100));
    }

    struct Never;

    impl TextMatcher for Never {
        fn is_match(&self, _text: &str) -> bool {
            false
        }
    }

    #[test]
    fn injected_matchers_replace_patterns() {
        let c = SizeClassifier::new(Box::new(Never), Box::new(Never));
        assert_eq!(c.classify("", "100 ml").bucket(), None);
        // The suffix fallback stays active regardless of the injected matchers.
        assert_eq!(c.classify("X-100", "").bucket(), Some(SizeBucket::Size100));
    }
}
