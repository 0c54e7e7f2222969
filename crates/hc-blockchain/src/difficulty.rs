use std::fmt;

use serde::{Deserialize, Serialize};

use crate::BlockchainError;

/// The proof-of-work predicate: a block hash is accepted when its hex
/// encoding starts with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Difficulty {
    prefix: String,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self {
            prefix: "11".to_string(),
        }
    }
}

impl Difficulty {
    /// Hashes are lowercase hex, so the prefix must be too.
    pub fn new(prefix: impl Into<String>) -> Result<Self, BlockchainError> {
        let prefix = prefix.into();
        let is_hex = prefix
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if prefix.is_empty() || !is_hex {
            return Err(BlockchainError::InvalidDifficulty(prefix));
        }
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_satisfied_by(&self, hash: &str) -> bool {
        hash.starts_with(&self.prefix)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)
    }
}

impl TryFrom<String> for Difficulty {
    type Error = BlockchainError;

    fn try_from(prefix: String) -> Result<Self, Self::Error> {
        Self::new(prefix)
    }
}

impl From<Difficulty> for String {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.prefix
    }
}

impl std::str::FromStr for Difficulty {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefix_is_eleven() {
        assert_eq!(Difficulty::default().prefix(), "11");
    }

    #[test]
    fn rejects_empty_and_non_hex_prefixes() {
        assert!(Difficulty::new("").is_err());
        assert!(Difficulty::new("zz").is_err());
        assert!(Difficulty::new("AB").is_err());
        assert!(Difficulty::new("0a").is_ok());
    }

    #[test]
    fn predicate_is_a_prefix_match() {
        let d = Difficulty::new("11").unwrap();
        assert!(d.is_satisfied_by("11abcdef"));
        assert!(!d.is_satisfied_by("a11bcdef"));
    }
}
