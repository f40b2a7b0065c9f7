//! Capture targets and the deterministic names derived from them.

use sha2::{Digest, Sha256};
use std::fmt;

/// Longest readable prefix kept in a file stem before the digest suffix.
const MAX_READABLE_LEN: usize = 96;

/// Hex characters of the SHA-256 digest appended to every stem.
const DIGEST_LEN: usize = 12;

/// One endpoint to capture, expressed as a URL string.
///
/// Targets are taken as given: no normalization or deduplication happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(String);

impl Target {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe name shared by the fetched artifact and the output image.
    ///
    /// The readable part replaces the scheme separator and every character
    /// outside `[A-Za-z0-9-]` with `_`; a short SHA-256 digest of the full URL
    /// keeps targets such as `a.b` and `a_b` apart. The result only depends on
    /// the target string, so reruns produce the same names.
    ///
    /// ```
    /// let t = sitesnap::Target::new("https://example.com:8443/login");
    /// let stem = t.file_stem();
    /// assert!(stem.starts_with("https_example_com_8443_login_"));
    /// assert_eq!(stem, t.file_stem());
    /// ```
    pub fn file_stem(&self) -> String {
        let readable: String = self
            .0
            .replacen("://", "_", 1)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .take(MAX_READABLE_LEN)
            .collect();
        let digest = hex::encode(Sha256::digest(self.0.as_bytes()));
        format!("{}_{}", readable, &digest[..DIGEST_LEN])
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_is_repeatable() {
        let a = Target::new("http://10.0.0.1:8080");
        let b = Target::new("http://10.0.0.1:8080");
        assert_eq!(a.file_stem(), b.file_stem());
    }

    #[test]
    fn stem_separates_lookalike_targets() {
        let dotted = Target::new("http://a.b").file_stem();
        let underscored = Target::new("http://a_b").file_stem();
        assert_ne!(dotted, underscored);
        assert!(dotted.starts_with("http_a_b_"));
    }

    #[test]
    fn stem_is_filesystem_safe_and_bounded() {
        let long = format!("https://host/{}?q=../../etc/passwd", "x".repeat(500));
        let stem = Target::new(long).file_stem();
        assert!(stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(stem.len(), MAX_READABLE_LEN + 1 + DIGEST_LEN);
    }
}
