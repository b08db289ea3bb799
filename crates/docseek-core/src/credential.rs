//! API key value type and credential validity.

use serde::{Deserialize, Serialize};

/// Prefix every OpenAI secret key carries.
pub const API_KEY_PREFIX: &str = "sk-";

/// Session storage key under which the credential is persisted.
pub const SESSION_KEY: &str = "openai_api_key";

/// Credential validity as seen by dependent workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    #[default]
    Unset,
    Validating,
    Valid,
    Invalid,
}

impl std::fmt::Display for Validity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unset => write!(f, "unset"),
            Self::Validating => write!(f, "validating"),
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// Raw API key. `Debug` and `Display` only reveal the prefix and last four characters.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The unmasked key, for request headers and form fields only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Local shape check: non-empty and carrying the vendor prefix.
    pub fn has_expected_shape(&self) -> bool {
        !self.0.is_empty() && self.0.starts_with(API_KEY_PREFIX)
    }

    fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= API_KEY_PREFIX.len() + 4 {
            return "****".into();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", API_KEY_PREFIX, tail)
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey({})", self.masked())
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.masked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_check() {
        assert!(ApiKey::new("sk-abc123").has_expected_shape());
        assert!(!ApiKey::new("").has_expected_shape());
        assert!(!ApiKey::new("pk-abc123").has_expected_shape());
        assert!(!ApiKey::new("SK-abc123").has_expected_shape());
    }

    #[test]
    fn test_masking() {
        let key = ApiKey::new("sk-proj-1234567890abcd");
        assert_eq!(key.to_string(), "sk-…abcd");
        assert_eq!(format!("{:?}", key), "ApiKey(sk-…abcd)");
        assert_eq!(ApiKey::new("sk-1").to_string(), "****");
    }

    #[test]
    fn test_validity_serde() {
        let json = serde_json::to_string(&Validity::Validating).unwrap();
        assert_eq!(json, "\"validating\"");
        assert_eq!(Validity::default(), Validity::Unset);
    }
}
