//! `transaction_test` fixtures: raw transaction bytes and whether each fork
//! accepts them.

use primitives::{serde_hex, Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use specs::ExceptionCategory;
use std::collections::BTreeMap;

/// A transaction test fixture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFixture {
    /// Signed transaction bytes.
    pub txbytes: Bytes,
    /// Outcome keyed by fork name.
    pub result: BTreeMap<String, TransactionResult>,
}

/// Outcome of decoding and validating a transaction on one fork.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    /// Transaction hash, valid transactions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<B256>,
    /// Recovered sender, valid transactions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Address>,
    /// Intrinsic gas, zero for invalid transactions.
    #[serde(with = "serde_hex::u64_quantity")]
    pub intrinsic_gas: u64,
    /// Why the transaction is invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionCategory>,
}

impl TransactionResult {
    /// A valid transaction.
    pub fn valid(hash: B256, sender: Address, intrinsic_gas: u64) -> Self {
        Self {
            hash: Some(hash),
            sender: Some(sender),
            intrinsic_gas,
            exception: None,
        }
    }

    /// An invalid transaction.
    pub fn invalid(exception: ExceptionCategory) -> Self {
        Self {
            exception: Some(exception),
            ..Default::default()
        }
    }
}
