//! Secret registration and output masking.
//!
//! - [`SecretMatcher`] - A literal or regex secret and its match spans
//! - [`SecretMasker`] - The registry and overlap-safe redaction engine
//! - [`SecretEnvDetector`] - Decides which environment variables hold secrets
//!
//! # Example
//!
//! ```
//! use hauler::secrets::SecretMasker;
//!
//! let masker = SecretMasker::new();
//! masker.add_value("efg");
//! masker.add_value("bcd");
//!
//! // Adjacent matches from different secrets become one masked run.
//! assert_eq!(masker.mask("abcdefgh"), "a********h");
//! ```

pub mod mask;
pub mod matcher;
pub mod pattern;

pub use mask::{SecretMasker, MASK};
pub use matcher::{LiteralSecret, PatternSecret, Positions, Replacement, SecretMatcher};
pub use pattern::{NameRule, SecretEnvDetector, BUILTIN_RULES};
