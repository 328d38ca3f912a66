//! Cache key derivation.
//!
//! Keys are `(subject, resource)` pairs. Subjects are normalized so that
//! every spelling of the same instrument maps to one key:
//!
//! - surrounding whitespace is trimmed
//! - letters are upper-cased
//! - a leading `A` in front of an all-digit code is dropped
//!   (`A005930` and `005930` are the same subject)

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

/// Kind of payload stored in the two-level cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    /// Narrative digest built from the parallel narrative fetch.
    News,
    /// Synthesized outlook (recommendation, confidence, price levels).
    Outlook,
}

impl ResourceType {
    /// All resource types, in declaration order.
    pub const ALL: [ResourceType; 2] = [ResourceType::News, ResourceType::Outlook];

    /// Stable identifier used in file names and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::News => "news",
            ResourceType::Outlook => "outlook",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown resource type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource type '{0}'")]
pub struct UnknownResourceType(pub String);

impl FromStr for ResourceType {
    type Err = UnknownResourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        ResourceType::ALL
            .into_iter()
            .find(|r| r.as_str() == lowered)
            .ok_or_else(|| UnknownResourceType(s.to_string()))
    }
}

/// Normalizes a subject identifier.
///
/// Trims whitespace, upper-cases, and strips the `A` prefix some upstream
/// systems put in front of numeric instrument codes.
pub fn normalize_subject(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    match upper.strip_prefix('A') {
        Some(code) if !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit()) => {
            code.to_string()
        }
        _ => upper,
    }
}

/// Key identifying one cached resource for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    subject: String,
    resource: ResourceType,
}

impl CacheKey {
    /// Creates a key, normalizing the subject.
    pub fn new(subject: &str, resource: ResourceType) -> Self {
        Self {
            subject: normalize_subject(subject),
            resource,
        }
    }

    /// The normalized subject.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The resource type.
    pub fn resource(&self) -> ResourceType {
        self.resource
    }

    /// File stem for the durable layer: `{subject}_{resource}`.
    ///
    /// Subjects containing characters outside `[A-Z0-9_-]` (names in
    /// non-Latin scripts, paths) are replaced by a SHA-256 prefix so the
    /// stem is always a single safe path component.
    pub fn file_stem(&self) -> String {
        let safe = !self.subject.is_empty()
            && self
                .subject
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-');

        if safe {
            format!("{}_{}", self.subject, self.resource)
        } else {
            let digest = Sha256::digest(self.subject.as_bytes());
            let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
            format!("h{}_{}", hex, self.resource)
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject, self.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_strips_code_prefix() {
        assert_eq!(normalize_subject("A005930"), "005930");
        assert_eq!(normalize_subject(" a005930 "), "005930");
        assert_eq!(normalize_subject("005930"), "005930");
    }

    #[test]
    fn test_normalize_keeps_alphabetic_subjects() {
        assert_eq!(normalize_subject("AAPL"), "AAPL");
        assert_eq!(normalize_subject("market"), "MARKET");
        assert_eq!(normalize_subject("A"), "A");
    }

    #[test]
    fn test_key_equality_after_normalization() {
        let a = CacheKey::new("A005930", ResourceType::News);
        let b = CacheKey::new("005930", ResourceType::News);
        assert_eq!(a, b);
        assert_ne!(a, CacheKey::new("005930", ResourceType::Outlook));
    }

    #[test]
    fn test_key_display() {
        let key = CacheKey::new("005930", ResourceType::Outlook);
        assert_eq!(key.to_string(), "005930:outlook");
    }

    #[test]
    fn test_file_stem_safe_subject() {
        let key = CacheKey::new("005930", ResourceType::Outlook);
        assert_eq!(key.file_stem(), "005930_outlook");
    }

    #[test]
    fn test_file_stem_hashes_unsafe_subject() {
        let key = CacheKey::new("삼성전자", ResourceType::News);
        let stem = key.file_stem();
        assert!(stem.starts_with('h'));
        assert!(stem.ends_with("_news"));
        assert!(!stem.contains('/'));

        let traversal = CacheKey::new("../etc", ResourceType::News);
        assert!(!traversal.file_stem().contains(".."));
    }

    #[test]
    fn test_resource_type_parse() {
        assert_eq!("news".parse::<ResourceType>(), Ok(ResourceType::News));
        assert_eq!(" Outlook ".parse::<ResourceType>(), Ok(ResourceType::Outlook));
        assert!("quotes".parse::<ResourceType>().is_err());
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(raw in "[ aA]{0,2}[a-zA-Z0-9]{0,10}[ ]{0,2}") {
            let once = normalize_subject(&raw);
            prop_assert_eq!(normalize_subject(&once), once.clone());
        }

        #[test]
        fn prop_prefixed_and_bare_codes_share_key(code in "[0-9]{6}") {
            let prefixed = CacheKey::new(&format!("A{}", code), ResourceType::News);
            let bare = CacheKey::new(&code, ResourceType::News);
            prop_assert_eq!(prefixed, bare);
        }
    }
}
