//! Output masking for secret values.
//!
//! [`SecretMasker`] is the process-wide secret registry. Every string that
//! leaves the process (console lines, timeline issues, diagnostic logs) goes
//! through [`SecretMasker::mask`] first.

use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use crate::error::Result;

use super::matcher::{Replacement, SecretMatcher};
use super::pattern::SecretEnvDetector;

/// Text substituted for each masked run, whatever its length.
pub const MASK: &str = "********";

/// Registry of secrets and the redaction engine over them.
///
/// Matchers are appended and never removed. Masking takes a read lock over
/// the registry, registration takes the write lock.
///
/// # Example
///
/// ```
/// use hauler::secrets::SecretMasker;
///
/// let masker = SecretMasker::new();
/// masker.add_value("def");
/// masker.add_value("bcd");
///
/// // Overlapping secrets collapse into one masked run.
/// assert_eq!(masker.mask("abcdefg"), "a********g");
/// ```
#[derive(Debug, Default)]
pub struct SecretMasker {
    matchers: RwLock<Vec<SecretMatcher>>,
}

impl SecretMasker {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a literal secret value.
    ///
    /// Empty values are accepted and match nothing.
    pub fn add_value(&self, value: impl Into<String>) {
        self.add_matcher(SecretMatcher::literal(value));
    }

    /// Register multiple literal secret values.
    pub fn add_values(&self, values: impl IntoIterator<Item = impl Into<String>>) {
        for value in values {
            self.add_value(value);
        }
    }

    /// Register a regular-expression secret.
    pub fn add_regex(&self, expression: impl Into<String>, case_insensitive: bool) -> Result<()> {
        let matcher = SecretMatcher::pattern(expression, case_insensitive)?;
        self.add_matcher(matcher);
        Ok(())
    }

    /// Register an already-built matcher.
    pub fn add_matcher(&self, matcher: SecretMatcher) {
        let mut matchers = self.matchers.write().unwrap_or_else(PoisonError::into_inner);
        // Re-registering a literal is a no-op.
        if let SecretMatcher::Literal(literal) = &matcher {
            let known = matchers
                .iter()
                .any(|m| matches!(m, SecretMatcher::Literal(l) if l == literal));
            if known {
                return;
            }
        }
        matchers.push(matcher);
    }

    /// Register the values of every variable whose name looks secret.
    ///
    /// Returns the number of values registered.
    ///
    /// # Example
    ///
    /// ```
    /// use hauler::secrets::{SecretEnvDetector, SecretMasker};
    ///
    /// let masker = SecretMasker::new();
    /// let vars = vec![
    ///     ("GITHUB_TOKEN".to_string(), "ghp_abc".to_string()),
    ///     ("PATH".to_string(), "/usr/bin".to_string()),
    /// ];
    /// let added = masker.register_env_secrets(&SecretEnvDetector::with_builtins(), vars);
    /// assert_eq!(added, 1);
    /// assert_eq!(masker.mask("token=ghp_abc"), "token=********");
    /// ```
    pub fn register_env_secrets(
        &self,
        detector: &SecretEnvDetector,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> usize {
        let mut added = 0;
        for (name, value) in vars {
            if !value.is_empty() && detector.is_secret(&name) {
                tracing::debug!(variable = %name, "registering secret from environment");
                self.add_value(value);
                added += 1;
            }
        }
        added
    }

    /// Get the number of registered matchers.
    pub fn matcher_count(&self) -> usize {
        self.read().len()
    }

    /// Replace every secret occurrence in `input` with [`MASK`].
    ///
    /// Spans from all matchers are merged when they overlap or touch, so the
    /// result does not depend on registration order.
    pub fn mask(&self, input: &str) -> String {
        if input.is_empty() {
            return String::new();
        }

        let mut spans: Vec<Replacement> = {
            let matchers = self.read();
            matchers.iter().flat_map(|m| m.positions(input)).collect()
        };
        if spans.is_empty() {
            return input.to_string();
        }
        spans.sort_unstable();

        let mut output = String::with_capacity(input.len());
        let mut cursor = 0;
        for span in merge_spans(spans) {
            output.push_str(&input[cursor..span.start]);
            output.push_str(MASK);
            cursor = span.end();
        }
        output.push_str(&input[cursor..]);
        output
    }

    /// Mask an optional string; `None` yields an empty string.
    pub fn mask_optional(&self, input: Option<&str>) -> String {
        input.map(|s| self.mask(s)).unwrap_or_default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<SecretMatcher>> {
        self.matchers.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fold sorted spans so that overlapping or adjacent spans become one.
fn merge_spans(sorted: Vec<Replacement>) -> Vec<Replacement> {
    let mut merged: Vec<Replacement> = Vec::with_capacity(sorted.len());
    for span in sorted {
        match merged.last_mut() {
            Some(current) if span.start <= current.end() => {
                let end = current.end().max(span.end());
                current.length = end - current.start;
            }
            _ => merged.push(span),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masker_with(values: &[&str]) -> SecretMasker {
        let masker = SecretMasker::new();
        masker.add_values(values.iter().copied());
        masker
    }

    #[test]
    fn empty_input_yields_empty_string() {
        let masker = masker_with(&["abcd"]);
        assert_eq!(masker.mask(""), "");
        assert_eq!(masker.mask_optional(None), "");
    }

    #[test]
    fn no_secrets_returns_input() {
        let masker = SecretMasker::new();
        assert_eq!(masker.mask("abcdefg"), "abcdefg");
    }

    #[test]
    fn basic_replacement() {
        let masker = masker_with(&["def"]);
        assert_eq!(masker.mask("abcdefg"), "abc********g");
    }

    #[test]
    fn multiple_instances() {
        let masker = masker_with(&["def"]);
        assert_eq!(masker.mask("abcdefgdef"), "abc********g********");
    }

    #[test]
    fn multiple_adjacent_instances() {
        let masker = masker_with(&["abc"]);
        assert_eq!(masker.mask("abcabcdef"), "********def");
    }

    #[test]
    fn multiple_secrets() {
        let masker = masker_with(&["bcd", "fgh"]);
        assert_eq!(masker.mask("abcdefghi"), "a********e********i");
    }

    #[test]
    fn overlapping_secrets_merge() {
        let masker = masker_with(&["def", "bcd"]);
        assert_eq!(masker.mask("abcdefg"), "a********g");
    }

    #[test]
    fn adjacent_secrets_merge() {
        let masker = masker_with(&["efg", "bcd"]);
        assert_eq!(masker.mask("abcdefgh"), "a********h");
    }

    #[test]
    fn registration_order_does_not_matter() {
        let inputs = ["abcdefg", "abcdefgh", "xxbcdefgxxdefbcd", "bcdbcdefg"];
        let forward = masker_with(&["def", "bcd", "efg"]);
        let backward = masker_with(&["efg", "bcd", "def"]);
        for input in inputs {
            assert_eq!(forward.mask(input), backward.mask(input), "input: {input}");
        }
    }

    #[test]
    fn masking_is_idempotent() {
        let masker = masker_with(&["hunter2", "ter"]);
        masker.add_regex("[0-9]{4}", false).unwrap();
        let once = masker.mask("password hunter2, pin 1234, counter");
        assert_eq!(masker.mask(&once), once);
    }

    #[test]
    fn literal_and_pattern_secrets_combine() {
        let masker = masker_with(&["abc"]);
        masker.add_regex("c[de]+", false).unwrap();
        assert_eq!(masker.mask("xabcdeey"), "x********y");
    }

    #[test]
    fn contained_span_is_absorbed() {
        let masker = masker_with(&["abcdef", "cd"]);
        assert_eq!(masker.mask("_abcdef_"), "_********_");
    }

    #[test]
    fn empty_secret_is_ignored() {
        let masker = masker_with(&["", "real-secret"]);
        assert_eq!(masker.mask("The real-secret is here"), "The ******** is here");
    }

    #[test]
    fn invalid_regex_is_rejected_without_registering() {
        let masker = SecretMasker::new();
        assert!(masker.add_regex("(", false).is_err());
        assert_eq!(masker.matcher_count(), 0);
    }

    #[test]
    fn merge_spans_joins_touching_spans() {
        let merged = merge_spans(vec![
            Replacement::new(0, 2),
            Replacement::new(2, 2),
            Replacement::new(6, 1),
        ]);
        assert_eq!(merged, vec![Replacement::new(0, 4), Replacement::new(6, 1)]);
    }

    #[test]
    fn masker_is_shareable_across_threads() {
        let masker = std::sync::Arc::new(masker_with(&["token"]));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let masker = masker.clone();
                std::thread::spawn(move || masker.mask("a token b"))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "a ******** b");
        }
    }
}
