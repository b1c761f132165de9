//! Credential verification.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

/// The single credential record read at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialRecord {
    /// Expected username, compared exactly.
    pub username: String,
    /// bcrypt hash of the password.
    pub password: String,
}

/// Verifies login credentials against the stored record.
///
/// Failure is always signalled by returning `false`; a malformed stored
/// hash is treated as a verification failure, never a panic.
#[derive(Debug, Clone)]
pub struct IdentityGate {
    record: CredentialRecord,
}

impl IdentityGate {
    pub fn new(record: CredentialRecord) -> Self {
        Self { record }
    }

    /// Load the credential record from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading credential file {}", path.display()))?;
        let record: CredentialRecord = serde_json::from_str(&contents)
            .with_context(|| format!("parsing credential file {}", path.display()))?;
        Ok(Self::new(record))
    }

    /// Check a username/password pair against the stored record.
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        if username != self.record.username {
            return false;
        }
        match bcrypt::verify(password, &self.record.password) {
            Ok(verified) => verified,
            Err(err) => {
                warn!("verifying password hash: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_with_password(password: &str) -> IdentityGate {
        IdentityGate::new(CredentialRecord {
            username: "operator".to_string(),
            password: bcrypt::hash(password, 4).unwrap(),
        })
    }

    #[test]
    fn test_authenticate_accepts_correct_credentials() {
        let gate = gate_with_password("hunter2");
        assert!(gate.authenticate("operator", "hunter2"));
    }

    #[test]
    fn test_authenticate_rejects_wrong_password() {
        let gate = gate_with_password("hunter2");
        assert!(!gate.authenticate("operator", "hunter3"));
    }

    #[test]
    fn test_authenticate_rejects_wrong_username() {
        let gate = gate_with_password("hunter2");
        assert!(!gate.authenticate("Operator", "hunter2"));
    }

    #[test]
    fn test_malformed_hash_fails_closed() {
        let gate = IdentityGate::new(CredentialRecord {
            username: "operator".to_string(),
            password: "not-a-bcrypt-hash".to_string(),
        });
        assert!(!gate.authenticate("operator", "anything"));
    }
}
