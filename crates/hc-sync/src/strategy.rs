use hc_blockchain::{Blockchain, Difficulty};
use serde::{Deserialize, Serialize};

use crate::PeerError;

/// Decides which peer chains are eligible to replace the local one.
///
/// Both rules pick by length; they differ in whether a candidate must prove
/// its linkage and proof-of-work first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsensusRule {
    /// Only chains that pass full validation against the local difficulty
    /// are considered.
    #[default]
    LongestValid,

    /// Any decodable chain is considered on length alone.  Reproduces the
    /// naive trust-on-length behaviour and accepts corrupt chains.
    LongestTrusted,
}

impl ConsensusRule {
    /// Screen a decoded candidate.
    pub fn admit(&self, chain: &Blockchain, difficulty: &Difficulty) -> Result<(), PeerError> {
        match self {
            ConsensusRule::LongestTrusted => Ok(()),
            ConsensusRule::LongestValid => chain
                .validate(difficulty)
                .map_err(|e| PeerError::InvalidChain(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_validating() {
        assert_eq!(ConsensusRule::default(), ConsensusRule::LongestValid);
    }

    #[test]
    fn trusted_rule_admits_empty_chain() {
        let empty = Blockchain::new();
        assert!(ConsensusRule::LongestTrusted
            .admit(&empty, &Difficulty::default())
            .is_ok());
        assert!(matches!(
            ConsensusRule::LongestValid.admit(&empty, &Difficulty::default()),
            Err(PeerError::InvalidChain(_))
        ));
    }
}
