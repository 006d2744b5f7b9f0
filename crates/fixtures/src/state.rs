//! `state_test` fixtures: one transaction on top of a pre-state, with the
//! post-state root per fork.

use primitives::{serde_hex, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use specs::{
    AccessListItem, Alloc, ExceptionCategory, ResolvedEnvironment, ResolvedTransaction,
    SignedAuthorization,
};
use std::collections::BTreeMap;

/// A state test fixture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFixture {
    /// Block context the transaction runs in.
    pub env: ResolvedEnvironment,
    /// Pre-state.
    pub pre: Alloc,
    /// The transaction, in the indexed state test form.
    pub transaction: StateTransaction,
    /// Results keyed by fork name.
    pub post: BTreeMap<String, Vec<StatePost>>,
    /// Chain configuration.
    pub config: StateConfig,
}

/// Chain configuration of a state fixture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Chain id.
    #[serde(with = "serde_hex::u64_quantity")]
    pub chainid: u64,
}

/// The transaction of a state test. `data`, `gasLimit` and `value` are lists
/// that [`StatePost::indexes`] select from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransaction {
    /// Envelope type.
    #[serde(rename = "type", with = "serde_hex::u64_quantity")]
    pub tx_type: u64,
    /// Chain id, when the transaction is replay protected.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Nonce.
    #[serde(with = "serde_hex::u64_quantity")]
    pub nonce: u64,
    /// Legacy gas price.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    /// Max fee per gas.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    /// Max priority fee per gas.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    /// Max fee per blob gas.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub max_fee_per_blob_gas: Option<U256>,
    /// Recipient, `""` for creation.
    #[serde(with = "target")]
    pub to: Option<Address>,
    /// Calldata variants.
    pub data: Vec<Bytes>,
    /// Gas limit variants.
    #[serde(with = "quantity_list")]
    pub gas_limit: Vec<u64>,
    /// Value variants.
    pub value: Vec<U256>,
    /// Access list per data variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_lists: Option<Vec<Vec<AccessListItem>>>,
    /// Blob versioned hashes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_versioned_hashes: Option<Vec<B256>>,
    /// Signed authorizations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_list: Option<Vec<SignedAuthorization>>,
    /// Sender.
    pub sender: Address,
    /// Signing key, when the transaction was signed by the filler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<B256>,
}

impl From<&ResolvedTransaction> for StateTransaction {
    fn from(tx: &ResolvedTransaction) -> Self {
        Self {
            tx_type: u64::from(tx.tx_type.as_u8()),
            chain_id: tx.chain_id,
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            max_fee_per_gas: tx.max_fee_per_gas,
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
            max_fee_per_blob_gas: tx.max_fee_per_blob_gas,
            to: tx.to,
            data: vec![tx.data.clone()],
            gas_limit: vec![tx.gas_limit],
            value: vec![tx.value],
            access_lists: tx.access_list.clone().map(|list| vec![list]),
            blob_versioned_hashes: tx.blob_versioned_hashes.clone(),
            authorization_list: tx.authorization_list.clone(),
            sender: tx.sender,
            secret_key: tx.secret_key,
        }
    }
}

/// Result of one transaction variant on one fork.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePost {
    /// State root after the transaction.
    pub hash: B256,
    /// Hash of the RLP-encoded logs.
    pub logs: B256,
    /// Signed transaction bytes.
    pub txbytes: Bytes,
    /// Selected transaction variant.
    pub indexes: TxIndexes,
    /// Post-state.
    pub state: Alloc,
    /// Exception the transaction is rejected with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_exception: Option<ExceptionCategory>,
}

/// Indexes into the `data`, `gasLimit` and `value` lists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIndexes {
    /// Index into `data`.
    pub data: usize,
    /// Index into `gasLimit`.
    pub gas: usize,
    /// Index into `value`.
    pub value: usize,
}

pub(crate) mod target {
    use primitives::Address;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(to: &Option<Address>, s: S) -> Result<S::Ok, S::Error> {
        match to {
            Some(address) => s.collect_str(address),
            None => s.serialize_str(""),
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Address>, D::Error> {
        match Option::<String>::deserialize(d)?.as_deref() {
            None | Some("") | Some("0x") => Ok(None),
            Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}

mod quantity_list {
    use primitives::{HexCodec, Quantity};
    use serde::{de::Error, ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(values: &[u64], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&value.to_hex())?;
        }
        seq.end()
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u64>, D::Error> {
        Vec::<String>::deserialize(d)?
            .iter()
            .map(|s| u64::parse_lenient(s).map_err(D::Error::custom))
            .collect()
    }
}
