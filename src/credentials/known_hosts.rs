//! Trusted host-key database in OpenSSH `known_hosts` format.
//!
//! # Responsibilities
//! - Parse `known_hosts` text into an immutable lookup table
//! - Verify a server's presented public key against the table
//! - Compute OpenSSH-style SHA256 fingerprints for logging
//!
//! # Design Decisions
//! - The database is a snapshot: no append, no removal. Rotation happens by
//!   reloading the whole file into a fresh snapshot.
//! - A malformed entry is a parse error, not a skipped line, so a corrupt
//!   file rejects the reload as a whole.
//! - Unknown hosts and changed keys are both reported distinctly; the caller
//!   decides severity, but neither outcome is trusted.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use russh::keys::{PublicKey, PublicKeyBase64};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Error parsing a `known_hosts` file.
#[derive(Debug, Error)]
pub enum KnownHostsError {
    #[error("failed to read known hosts file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed known hosts entry at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Outcome of verifying a presented host key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyVerification {
    /// Key matches a trusted entry.
    Verified,
    /// Host has no trusted entry (first contact).
    Unknown { fingerprint: String },
    /// Host has a trusted entry for this key type, but the key differs.
    Mismatch {
        expected_fingerprint: String,
        actual_fingerprint: String,
    },
}

impl fmt::Display for HostKeyVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostKeyVerification::Verified => write!(f, "verified"),
            HostKeyVerification::Unknown { fingerprint } => {
                write!(f, "unknown host (presented {fingerprint})")
            }
            HostKeyVerification::Mismatch {
                expected_fingerprint,
                actual_fingerprint,
            } => write!(
                f,
                "key mismatch (expected {expected_fingerprint}, presented {actual_fingerprint})"
            ),
        }
    }
}

/// One trusted key: (key type, base64 key blob).
#[derive(Clone, Debug)]
struct HostKeyEntry {
    key_type: String,
    key_data: String,
}

/// Immutable set of trusted host keys, keyed by normalized hostname.
#[derive(Debug, Default)]
pub struct TrustedHostKeys {
    hosts: HashMap<String, Vec<HostKeyEntry>>,
    entry_count: usize,
}

impl TrustedHostKeys {
    /// Read and parse a `known_hosts` file.
    pub fn from_file(path: &Path) -> Result<Self, KnownHostsError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse `known_hosts` text.
    ///
    /// Accepts the plain OpenSSH layout (`hostnames keytype base64 [comment]`
    /// with comma-separated hostnames and `[host]:port` for non-default
    /// ports). Hashed hostnames (`|1|...`) and `@marker` lines cannot be
    /// matched against a snapshot and are skipped; their hosts simply stay
    /// untrusted.
    pub fn parse(text: &str) -> Result<Self, KnownHostsError> {
        let mut hosts: HashMap<String, Vec<HostKeyEntry>> = HashMap::new();
        let mut entry_count = 0;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('@') {
                tracing::warn!(line = idx + 1, "skipping marker entry in known hosts");
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                return Err(KnownHostsError::Malformed {
                    line: idx + 1,
                    reason: format!("expected at least 3 fields, found {}", parts.len()),
                });
            }

            let hostnames = parts[0];
            let key_type = parts[1];
            let key_data = parts[2];
            if BASE64.decode(key_data).is_err() {
                return Err(KnownHostsError::Malformed {
                    line: idx + 1,
                    reason: "key data is not valid base64".to_string(),
                });
            }

            let entry = HostKeyEntry {
                key_type: key_type.to_string(),
                key_data: key_data.to_string(),
            };

            for hostname in hostnames.split(',') {
                if hostname.starts_with('|') {
                    continue;
                }
                hosts
                    .entry(Self::normalize_hostname(hostname))
                    .or_default()
                    .push(entry.clone());
                entry_count += 1;
            }
        }

        Ok(Self { hosts, entry_count })
    }

    /// Number of trusted (host, key) entries.
    pub fn len(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Normalize hostname for lookup: strip `[host]:port` brackets, lowercase.
    fn normalize_hostname(host: &str) -> String {
        let host = host.trim_start_matches('[');
        if let Some(idx) = host.find("]:") {
            host[..idx].to_lowercase()
        } else {
            host.trim_end_matches(']').to_lowercase()
        }
    }

    /// Lookup key in the OpenSSH convention: bare hostname for port 22,
    /// `[host]:port` otherwise.
    fn make_key(host: &str, port: u16) -> String {
        let host = host.to_lowercase();
        if port == 22 {
            host
        } else {
            format!("[{host}]:{port}")
        }
    }

    /// OpenSSH-style SHA256 fingerprint of a public key.
    pub fn fingerprint(key: &PublicKey) -> String {
        Self::fingerprint_bytes(&key.public_key_bytes())
    }

    fn fingerprint_bytes(key_bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key_bytes);
        let hash = hasher.finalize();
        format!("SHA256:{}", BASE64.encode(hash).trim_end_matches('='))
    }

    /// Verify a server's presented key for `host:port`.
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> HostKeyVerification {
        let actual_key_b64 = BASE64.encode(key.public_key_bytes());
        let algorithm = key.algorithm();
        let actual_key_type = algorithm.as_str();
        let fingerprint = Self::fingerprint(key);

        let check = |entries: &Vec<HostKeyEntry>| -> Option<HostKeyVerification> {
            for entry in entries {
                if entry.key_type != actual_key_type {
                    continue;
                }
                if entry.key_data == actual_key_b64 {
                    return Some(HostKeyVerification::Verified);
                }
                let expected_fingerprint = BASE64
                    .decode(&entry.key_data)
                    .map(|bytes| Self::fingerprint_bytes(&bytes))
                    .unwrap_or_else(|_| "unknown".to_string());
                return Some(HostKeyVerification::Mismatch {
                    expected_fingerprint,
                    actual_fingerprint: fingerprint.clone(),
                });
            }
            None
        };

        // Exact (with port) first, then the bare hostname.
        if let Some(entries) = self.hosts.get(&Self::make_key(host, port)) {
            if let Some(result) = check(entries) {
                return result;
            }
            // Host known only under a different key type.
            return HostKeyVerification::Unknown { fingerprint };
        }
        if let Some(entries) = self.hosts.get(&host.to_lowercase()) {
            if let Some(result) = check(entries) {
                return result;
            }
            return HostKeyVerification::Unknown { fingerprint };
        }

        HostKeyVerification::Unknown { fingerprint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST_KEY_B64: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIOWquJT48kArBbas551rPYJPpkT6obz3vv19YHckhZrT";
    const OTHER_KEY_B64: &str = "AAAAC3NzaC1lZDI1NTE5AAAAICkCloqA0yRpBHJzsGclvW9lcDi3gPGbj1l4oVUuWgUi";

    fn presented_key() -> PublicKey {
        PublicKey::from_openssh(&format!("ssh-ed25519 {HOST_KEY_B64} test"))
            .expect("valid test key")
    }

    #[test]
    fn test_normalize_hostname() {
        assert_eq!(
            TrustedHostKeys::normalize_hostname("example.internal"),
            "example.internal"
        );
        assert_eq!(
            TrustedHostKeys::normalize_hostname("[example.internal]:22"),
            "example.internal"
        );
        assert_eq!(
            TrustedHostKeys::normalize_hostname("[relay.example]:2222"),
            "relay.example"
        );
    }

    #[test]
    fn test_make_key() {
        assert_eq!(
            TrustedHostKeys::make_key("example.internal", 22),
            "example.internal"
        );
        assert_eq!(
            TrustedHostKeys::make_key("relay.example", 2222),
            "[relay.example]:2222"
        );
    }

    #[test]
    fn test_verify_trusted_key() {
        let db = TrustedHostKeys::parse(&format!(
            "# comment\nexample.internal ssh-ed25519 {HOST_KEY_B64} ops\n"
        ))
        .unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(
            db.verify("example.internal", 22, &presented_key()),
            HostKeyVerification::Verified
        );
        // Hostname matching is case-insensitive.
        assert_eq!(
            db.verify("Example.INTERNAL", 22, &presented_key()),
            HostKeyVerification::Verified
        );
    }

    #[test]
    fn test_verify_unknown_host() {
        let db = TrustedHostKeys::parse(&format!(
            "other.internal ssh-ed25519 {HOST_KEY_B64}\n"
        ))
        .unwrap();
        match db.verify("example.internal", 22, &presented_key()) {
            HostKeyVerification::Unknown { fingerprint } => {
                assert!(fingerprint.starts_with("SHA256:"));
            }
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_changed_key() {
        let db = TrustedHostKeys::parse(&format!(
            "example.internal ssh-ed25519 {OTHER_KEY_B64}\n"
        ))
        .unwrap();
        match db.verify("example.internal", 22, &presented_key()) {
            HostKeyVerification::Mismatch {
                expected_fingerprint,
                actual_fingerprint,
            } => {
                assert_ne!(expected_fingerprint, actual_fingerprint);
            }
            other => panic!("expected Mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_port_qualified_entry() {
        let db = TrustedHostKeys::parse(&format!(
            "[example.internal]:2222 ssh-ed25519 {HOST_KEY_B64}\n"
        ))
        .unwrap();
        assert_eq!(
            db.verify("example.internal", 2222, &presented_key()),
            HostKeyVerification::Verified
        );
        // Bare-hostname entries also cover non-default ports.
        let db = TrustedHostKeys::parse(&format!(
            "example.internal ssh-ed25519 {HOST_KEY_B64}\n"
        ))
        .unwrap();
        assert_eq!(
            db.verify("example.internal", 2222, &presented_key()),
            HostKeyVerification::Verified
        );
    }

    #[test]
    fn test_comma_separated_aliases() {
        let db = TrustedHostKeys::parse(&format!(
            "example.internal,web.internal ssh-ed25519 {HOST_KEY_B64}\n"
        ))
        .unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(
            db.verify("web.internal", 22, &presented_key()),
            HostKeyVerification::Verified
        );
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let err = TrustedHostKeys::parse("example.internal ssh-ed25519\n").unwrap_err();
        assert!(matches!(err, KnownHostsError::Malformed { line: 1, .. }));

        let err = TrustedHostKeys::parse(&format!(
            "ok.internal ssh-ed25519 {HOST_KEY_B64}\nbad.internal ssh-ed25519 !!!notbase64\n"
        ))
        .unwrap_err();
        assert!(matches!(err, KnownHostsError::Malformed { line: 2, .. }));
    }
}
