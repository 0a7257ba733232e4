//! Secret matchers.
//!
//! A [`SecretMatcher`] finds the spans of one secret inside arbitrary text.
//! Matches are reported as [`Replacement`]s in ascending start order, and a
//! matcher reports overlapping occurrences of its own secret: after a match
//! at `start`, the search resumes one character past `start`, not past the
//! end of the match.

use regex::{Regex, RegexBuilder};

use crate::error::{HaulerError, Result};

/// A matched span, in bytes, of the input string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Replacement {
    /// Byte offset where the match starts.
    pub start: usize,
    /// Length of the match in bytes.
    pub length: usize,
}

impl Replacement {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    /// Byte offset one past the end of the match.
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// An exact, case-sensitive secret value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralSecret {
    value: String,
}

impl LiteralSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// A regular expression identifying secret text.
#[derive(Debug, Clone)]
pub struct PatternSecret {
    source: String,
    // None for an empty expression, which matches nothing.
    regex: Option<Regex>,
}

impl PatternSecret {
    /// Compile a pattern secret.
    ///
    /// An empty expression is accepted and never matches.
    ///
    /// # Example
    ///
    /// ```
    /// use hauler::secrets::PatternSecret;
    ///
    /// let secret = PatternSecret::new("ghp_[a-z0-9]+", true).unwrap();
    /// assert_eq!(secret.source(), "ghp_[a-z0-9]+");
    /// assert!(PatternSecret::new("(unclosed", false).is_err());
    /// ```
    pub fn new(expression: impl Into<String>, case_insensitive: bool) -> Result<Self> {
        let source = expression.into();
        if source.is_empty() {
            return Ok(Self {
                source,
                regex: None,
            });
        }

        let regex = RegexBuilder::new(&source)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| HaulerError::InvalidSecretPattern {
                pattern: source.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            source,
            regex: Some(regex),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// One registered secret.
#[derive(Debug, Clone)]
pub enum SecretMatcher {
    Literal(LiteralSecret),
    Pattern(PatternSecret),
}

impl SecretMatcher {
    /// Matcher for an exact value.
    pub fn literal(value: impl Into<String>) -> Self {
        SecretMatcher::Literal(LiteralSecret::new(value))
    }

    /// Matcher for a regular expression.
    pub fn pattern(expression: impl Into<String>, case_insensitive: bool) -> Result<Self> {
        PatternSecret::new(expression, case_insensitive).map(SecretMatcher::Pattern)
    }

    /// Lazily enumerate the spans this matcher covers in `input`.
    ///
    /// The iterator borrows both the matcher and the input, so calling
    /// `positions` again restarts the scan from the beginning.
    ///
    /// # Example
    ///
    /// ```
    /// use hauler::secrets::{Replacement, SecretMatcher};
    ///
    /// let matcher = SecretMatcher::literal("cdcd");
    /// let spans: Vec<_> = matcher.positions("abcdcdcdefg").collect();
    /// assert_eq!(spans, vec![Replacement::new(2, 4), Replacement::new(4, 4)]);
    /// ```
    pub fn positions<'m, 'i>(&'m self, input: &'i str) -> Positions<'m, 'i> {
        Positions {
            matcher: self,
            input,
            next_start: 0,
        }
    }

    fn find_from(&self, input: &str, from: usize) -> Option<Replacement> {
        match self {
            SecretMatcher::Literal(literal) => {
                if literal.value.is_empty() {
                    return None;
                }
                input[from..]
                    .find(literal.value.as_str())
                    .map(|offset| Replacement::new(from + offset, literal.value.len()))
            }
            SecretMatcher::Pattern(pattern) => pattern
                .regex
                .as_ref()?
                .find_at(input, from)
                .map(|m| Replacement::new(m.start(), m.len())),
        }
    }
}

/// Iterator over the spans of one matcher. See [`SecretMatcher::positions`].
pub struct Positions<'m, 'i> {
    matcher: &'m SecretMatcher,
    input: &'i str,
    next_start: usize,
}

impl Iterator for Positions<'_, '_> {
    type Item = Replacement;

    fn next(&mut self) -> Option<Replacement> {
        loop {
            if self.next_start > self.input.len() {
                return None;
            }

            let found = self.matcher.find_from(self.input, self.next_start)?;
            self.next_start = step_past(self.input, found.start);

            // Zero-width regex matches cover nothing.
            if found.length > 0 {
                return Some(found);
            }
        }
    }
}

/// Offset of the character after the one starting at `index`.
fn step_past(input: &str, index: usize) -> usize {
    input[index..]
        .chars()
        .next()
        .map_or(input.len() + 1, |c| index + c.len_utf8())
}
