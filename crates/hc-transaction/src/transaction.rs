use serde::{Deserialize, Serialize};

use crate::TransactionError;

/// A transfer of `amount` from one identifier to another.
///
/// Once a transaction has been attached to a block and that block is mined,
/// it is part of the block's hash input and must never change.  No balance or
/// sign checks are made here; `amount` is recorded exactly as supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sending identifier.
    pub from: String,

    /// Receiving identifier.
    pub to: String,

    /// Signed amount transferred.
    pub amount: f64,
}

impl Transaction {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }
}

/// Encode a transaction sequence as the compact JSON array used both on the
/// wire and as the transaction segment of a block's hash input.
///
/// Field order is `from`, `to`, `amount`.  Changing this encoding changes
/// every block hash, so it is part of the chain format.
pub fn canonical_json(transactions: &[Transaction]) -> Result<String, TransactionError> {
    Ok(serde_json::to_string(transactions)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_keeps_field_order() {
        let json = canonical_json(&[Transaction::new("A", "B", 10.0)]).unwrap();
        assert_eq!(json, r#"[{"from":"A","to":"B","amount":10.0}]"#);
    }

    #[test]
    fn canonical_json_preserves_insertion_order() {
        let txs = vec![
            Transaction::new("A", "B", 1.5),
            Transaction::new("B", "C", -2.0),
        ];
        let json = canonical_json(&txs).unwrap();
        let a = json.find(r#""from":"A""#).unwrap();
        let b = json.find(r#""from":"B""#).unwrap();
        assert!(a < b);
    }

    #[test]
    fn empty_sequence_encodes_as_empty_array() {
        assert_eq!(canonical_json(&[]).unwrap(), "[]");
    }

    #[test]
    fn decodes_integer_amounts() {
        let tx: Transaction = serde_json::from_str(r#"{"from":"A","to":"B","amount":10}"#).unwrap();
        assert_eq!(tx, Transaction::new("A", "B", 10.0));
    }

    #[test]
    fn decoded_amounts_reencode_identically() {
        let txs: Vec<Transaction> = [0.01 * 1.1, 0.02 * 1.1, 0.1 * 1.1, 1.0715660391465826e-75]
            .into_iter()
            .map(|amount| Transaction::new("A", "B", amount))
            .collect();

        let json = canonical_json(&txs).unwrap();
        let back: Vec<Transaction> = serde_json::from_str(&json).unwrap();

        assert_eq!(back, txs);
        assert_eq!(canonical_json(&back).unwrap(), json);
    }
}
