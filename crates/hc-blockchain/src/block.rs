use chrono::Utc;
use hc_transaction::{canonical_json, Transaction};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{BlockchainError, Difficulty};

/// `createdAt` rendering.  Part of the hash input, so fixed.
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const PENDING_MESSAGE: &str = "new block pending";
const COMMITTED_MESSAGE: &str = "block added to the chain";

/// A block of transactions linked to its predecessor by hash.
///
/// A block starts out *pending*: it has no `hash` or `previous_hash` and
/// accepts transactions through [`Block::attach`].  Once a
/// [`crate::Blockchain`] mines it, `index`, `previous_hash`, `nonce` and `hash`
/// are fixed and the block is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    index: u64,
    created_at: String,
    previous_hash: Option<String>,
    hash: Option<String>,
    nonce: u64,
    transactions: Vec<Transaction>,
    /// Human-readable annotation; not part of the hash.
    #[serde(default)]
    status_message: String,
}

impl Default for Block {
    fn default() -> Self {
        Self::pending()
    }
}

impl Block {
    /// A new, empty pending block stamped with the current UTC time.
    pub fn pending() -> Self {
        Self::pending_at(Utc::now().format(CREATED_AT_FORMAT).to_string())
    }

    /// A pending block with an explicit `createdAt` value.
    pub fn pending_at(created_at: impl Into<String>) -> Self {
        Self {
            index: 0,
            created_at: created_at.into(),
            previous_hash: None,
            hash: None,
            nonce: 0,
            transactions: Vec::new(),
            status_message: PENDING_MESSAGE.to_string(),
        }
    }

    /// Append a transaction.  Only pending blocks accept transactions.
    pub fn attach(&mut self, transaction: Transaction) -> Result<&mut Self, BlockchainError> {
        if self.is_committed() {
            return Err(BlockchainError::AlreadyMined);
        }
        self.transactions.push(transaction);
        Ok(self)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn is_committed(&self) -> bool {
        self.hash.is_some()
    }

    /// The exact hash input: `index`, `createdAt`, `previousHash`, the
    /// canonical JSON of `transactions` and `nonce`, concatenated in that
    /// order.  A pending block renders its missing previous hash as "".
    pub fn canonical_key(&self) -> Result<String, BlockchainError> {
        Ok(format!("{}{}", self.key_stem()?, self.nonce))
    }

    /// Hex-encoded SHA-256 of [`Block::canonical_key`].
    pub fn compute_hash(&self) -> Result<String, BlockchainError> {
        Ok(hash_key(&self.canonical_key()?))
    }

    /// Check a committed block in isolation: its stored hash must match the
    /// recomputed one and satisfy `difficulty`.  Linkage is checked by the
    /// chain.
    pub fn validate(&self, difficulty: &Difficulty) -> Result<(), BlockchainError> {
        let stored = self.hash.as_deref().ok_or_else(|| {
            BlockchainError::InvalidChain(format!("block {} has no hash", self.index))
        })?;
        if self.previous_hash.is_none() {
            return Err(BlockchainError::InvalidChain(format!(
                "block {} has no previous hash",
                self.index
            )));
        }
        if stored != self.compute_hash()? {
            return Err(BlockchainError::InvalidChain(format!(
                "block {} hash does not match its contents",
                self.index
            )));
        }
        if !difficulty.is_satisfied_by(stored) {
            return Err(BlockchainError::InvalidChain(format!(
                "block {} hash {stored} does not meet difficulty {difficulty}",
                self.index
            )));
        }
        Ok(())
    }

    /// Everything in the canonical key except the trailing nonce.
    pub(crate) fn key_stem(&self) -> Result<String, BlockchainError> {
        Ok(format!(
            "{}{}{}{}",
            self.index,
            self.created_at,
            self.previous_hash.as_deref().unwrap_or(""),
            canonical_json(&self.transactions)?,
        ))
    }

    pub(crate) fn link(&mut self, index: u64, previous_hash: String) {
        self.index = index;
        self.previous_hash = Some(previous_hash);
        self.nonce = 0;
    }

    pub(crate) fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    pub(crate) fn commit(&mut self, hash: String) {
        self.hash = Some(hash);
        self.status_message = COMMITTED_MESSAGE.to_string();
    }

    /// Undo a failed mining attempt so the block is pending again.
    pub(crate) fn unlink(&mut self) {
        self.previous_hash = None;
        self.nonce = 0;
    }

    #[cfg(test)]
    pub(crate) fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }
}

pub(crate) fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_block_defaults() {
        let block = Block::pending();
        assert_eq!(block.index(), 0);
        assert_eq!(block.nonce(), 0);
        assert!(block.hash().is_none());
        assert!(block.previous_hash().is_none());
        assert!(block.transactions().is_empty());
        assert_eq!(block.created_at().len(), "2018-08-10 12:00:00".len());
    }

    #[test]
    fn attach_chains_and_keeps_order() {
        let mut block = Block::pending();
        block
            .attach(Transaction::new("A", "B", 1.0))
            .unwrap()
            .attach(Transaction::new("B", "C", 2.0))
            .unwrap();
        assert_eq!(block.transactions()[0].from, "A");
        assert_eq!(block.transactions()[1].from, "B");
    }

    #[test]
    fn committed_block_rejects_transactions() {
        let mut block = Block::pending();
        block.commit("11ab".into());
        assert!(matches!(
            block.attach(Transaction::new("A", "B", 1.0)),
            Err(BlockchainError::AlreadyMined)
        ));
    }

    #[test]
    fn canonical_key_concatenates_fields_in_order() {
        let mut block = Block::pending_at("2018-08-10 12:00:00");
        block.attach(Transaction::new("A", "B", 10.0)).unwrap();
        block.link(3, "abc".into());
        block.set_nonce(42);
        assert_eq!(
            block.canonical_key().unwrap(),
            r#"32018-08-10 12:00:00abc[{"from":"A","to":"B","amount":10.0}]42"#
        );
    }

    #[test]
    fn status_message_is_not_hashed() {
        let mut a = Block::pending_at("2018-08-10 12:00:00");
        let b = a.clone();
        a.status_message = "something else".into();
        assert_eq!(a.compute_hash().unwrap(), b.compute_hash().unwrap());
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = serde_json::to_value(Block::pending_at("t")).unwrap();
        for key in [
            "index",
            "createdAt",
            "previousHash",
            "hash",
            "nonce",
            "transactions",
            "statusMessage",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn validate_rejects_uncommitted_block() {
        assert!(Block::pending().validate(&Difficulty::default()).is_err());
    }
}
