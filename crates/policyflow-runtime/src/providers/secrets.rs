//! Credential handling for providers.
//!
//! Credentials are wrapped in `secrecy::SecretString` as soon as they are
//! read. `Debug` shows `[REDACTED]`; the value is only reachable through
//! [`ApiCredential::expose`] at the point of use.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read from an environment variable
    Environment,
    /// Passed in by the caller
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a credential value.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Read a credential from an environment variable.
    ///
    /// Callers choose when to do this; configuration loading never reads
    /// the environment on its own.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        match std::env::var(env_var) {
            Ok(value) if !value.trim().is_empty() => {
                Ok(Self::new(value, CredentialSource::Environment, name))
            }
            _ => Err(ProviderError::NotConfigured(format!(
                "{} not set: configure '{}' environment variable",
                name, env_var
            ))),
        }
    }

    /// Expose the value for use in a request header. Never store the result.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_value() {
        let cred = ApiCredential::new(
            "sk-ant-very-secret",
            CredentialSource::Programmatic,
            "Anthropic API key",
        );
        let debug = format!("{:?}", cred);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("very-secret"));
        assert_eq!(cred.expose(), "sk-ant-very-secret");
    }

    #[test]
    fn test_missing_env_var() {
        let result = ApiCredential::from_env("POLICYFLOW_TEST_UNSET_KEY_8F3A", "Test key");
        match result {
            Err(ProviderError::NotConfigured(msg)) => {
                assert!(msg.contains("POLICYFLOW_TEST_UNSET_KEY_8F3A"));
            }
            other => panic!("Expected NotConfigured, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_detection() {
        let cred = ApiCredential::new("", CredentialSource::Programmatic, "Test key");
        assert!(cred.is_empty());
        assert_eq!(cred.source(), CredentialSource::Programmatic);
    }
}
