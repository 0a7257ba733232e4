//! Which environment variables hold secrets.
//!
//! A variable name is split into segments on `_`, `.` and `-`, uppercased,
//! and compared by its trailing segments: `NPM_TOKEN` ends in `TOKEN`,
//! `HTTP_COMPAT` ends in `COMPAT` and is not a personal access token.

/// A secret-looking variable name shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameRule {
    pub name: &'static str,
    /// Trailing segments, any one of which marks a secret.
    pub endings: &'static [&'static [&'static str]],
    /// Whether the ending may be the whole name. `PWD` alone is the shell's
    /// working directory.
    pub bare: bool,
}

/// Rules applied by [`SecretEnvDetector::with_builtins`].
pub const BUILTIN_RULES: &[NameRule] = &[
    NameRule {
        name: "token",
        endings: &[&["TOKEN"], &["ACCESSTOKEN"], &["PAT"]],
        bare: true,
    },
    NameRule {
        name: "api_key",
        endings: &[&["API", "KEY"], &["APIKEY"]],
        bare: true,
    },
    NameRule {
        name: "secret",
        endings: &[&["SECRET"], &["SECRET", "KEY"]],
        bare: true,
    },
    NameRule {
        name: "password",
        endings: &[&["PASSWORD"], &["PASSWD"]],
        bare: true,
    },
    NameRule {
        name: "pwd",
        endings: &[&["PWD"]],
        bare: false,
    },
    NameRule {
        name: "credential",
        endings: &[&["CREDENTIAL"], &["CREDENTIALS"]],
        bare: true,
    },
    NameRule {
        name: "private_key",
        endings: &[&["PRIVATE", "KEY"]],
        bare: true,
    },
    NameRule {
        name: "connection_string",
        endings: &[&["CONNECTION", "STRING"], &["CONNECTIONSTRING"], &["DATABASE", "URL"]],
        bare: true,
    },
];

impl NameRule {
    fn matches(&self, segments: &[String]) -> bool {
        self.endings.iter().any(|ending| {
            segments.len() >= ending.len()
                && (self.bare || segments.len() > ending.len())
                && segments[segments.len() - ending.len()..]
                    .iter()
                    .zip(ending.iter())
                    .all(|(segment, expected)| segment == expected)
        })
    }
}

fn segments(name: &str) -> Vec<String> {
    name.split(['_', '.', '-'])
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_uppercase())
        .collect()
}

/// Decides by name whether a variable's value must be masked.
///
/// # Example
///
/// ```
/// use hauler::secrets::SecretEnvDetector;
///
/// let detector = SecretEnvDetector::with_builtins();
///
/// assert!(detector.is_secret("SYSTEM_ACCESSTOKEN"));
/// assert!(detector.is_secret("nuget.password"));
/// assert!(!detector.is_secret("HTTP_COMPAT"));
/// ```
#[derive(Debug, Clone)]
pub struct SecretEnvDetector {
    rules: Vec<NameRule>,
    names: Vec<String>,
}

impl SecretEnvDetector {
    pub fn with_builtins() -> Self {
        Self {
            rules: BUILTIN_RULES.to_vec(),
            names: Vec::new(),
        }
    }

    /// Only the given exact, case-sensitive names.
    pub fn with_names(names: &[String]) -> Self {
        Self {
            rules: Vec::new(),
            names: names.to_vec(),
        }
    }

    pub fn with_builtins_and_custom(names: &[String]) -> Self {
        Self {
            names: names.to_vec(),
            ..Self::with_builtins()
        }
    }

    pub fn is_secret(&self, env_name: &str) -> bool {
        if self.names.iter().any(|n| n == env_name) {
            return true;
        }
        if self.rules.is_empty() {
            return false;
        }
        let segments = segments(env_name);
        self.rules.iter().any(|rule| rule.matches(&segments))
    }

    /// Name of the first built-in rule `env_name` matches.
    pub fn matching_rule(&self, env_name: &str) -> Option<&'static str> {
        let segments = segments(env_name);
        self.rules
            .iter()
            .find(|rule| rule.matches(&segments))
            .map(|rule| rule.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rules_by_name() {
        let detector = SecretEnvDetector::with_builtins();
        let cases = [
            ("TOKEN", Some("token")),
            ("GITHUB_TOKEN", Some("token")),
            ("SYSTEM_ACCESSTOKEN", Some("token")),
            ("system.accessToken", Some("token")),
            ("AZURE_DEVOPS_PAT", Some("token")),
            ("api_key", Some("api_key")),
            ("SONAR_API_KEY", Some("api_key")),
            ("MY_APIKEY", Some("api_key")),
            ("AWS_SECRET_KEY", Some("secret")),
            ("CLIENT_SECRET", Some("secret")),
            ("REGISTRY_PASSWORD", Some("password")),
            ("nuget.password", Some("password")),
            ("MYSQL_PWD", Some("pwd")),
            ("GCP_CREDENTIALS", Some("credential")),
            ("SSH_PRIVATE_KEY", Some("private_key")),
            ("DATABASE_URL", Some("connection_string")),
            ("SQL-CONNECTION-STRING", Some("connection_string")),
        ];
        for (name, rule) in cases {
            assert_eq!(detector.matching_rule(name), rule, "{}", name);
            assert!(detector.is_secret(name), "{}", name);
        }
    }

    #[test]
    fn lookalike_names_are_not_secrets() {
        let detector = SecretEnvDetector::with_builtins();
        for name in [
            "PATH",
            "HOME",
            "PWD",
            "OLDPWD",
            "HTTP_COMPAT",
            "TOKENIZER_PATH",
            "PASSWORD_FILE",
            "SECRET_KEY_PATH",
            "BUILD_NUMBER",
            "AGENT_NAME",
            "",
        ] {
            assert!(!detector.is_secret(name), "{}", name);
        }
    }

    #[test]
    fn custom_names_are_exact() {
        let detector = SecretEnvDetector::with_builtins_and_custom(&["SIGNING_CERT".to_string()]);

        assert!(detector.is_secret("SIGNING_CERT"));
        assert!(!detector.is_secret("SIGNING_CERT_PATH"));
        assert!(!detector.is_secret("signing_cert"));
        assert!(detector.is_secret("API_KEY"));
    }

    #[test]
    fn names_only_detector_ignores_builtins() {
        let detector = SecretEnvDetector::with_names(&["DEPLOY_KEY".to_string()]);

        assert!(detector.is_secret("DEPLOY_KEY"));
        assert!(!detector.is_secret("API_KEY"));
        assert_eq!(detector.matching_rule("API_KEY"), None);
    }
}
