//! `blockchain_test` fixtures: a genesis block and a chain of RLP-encoded
//! blocks, valid or expected to be rejected.

use crate::state::target;
use primitives::{serde_hex, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use specs::{
    AccessListItem, Alloc, BlockHeader, ExceptionCategory, ResolvedTransaction,
    SignedAuthorization, Withdrawal,
};

/// Seal engine of every fixture this crate writes.
pub const SEAL_ENGINE: &str = "NoProof";

/// A blockchain test fixture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainFixture {
    /// Fork or transition name.
    pub network: String,
    /// Genesis header.
    pub genesis_block_header: FixtureHeader,
    /// Genesis block RLP.
    #[serde(rename = "genesisRLP")]
    pub genesis_rlp: Bytes,
    /// Blocks in import order.
    pub blocks: Vec<FixtureBlock>,
    /// Hash of the last valid block.
    pub lastblockhash: B256,
    /// Pre-state.
    pub pre: Alloc,
    /// State after the last valid block.
    pub post_state: Alloc,
    /// Always [`SEAL_ENGINE`].
    pub seal_engine: String,
    /// Chain configuration.
    pub config: BlockchainConfig,
}

/// Chain configuration of a blockchain fixture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainConfig {
    /// Fork or transition name.
    pub network: String,
    /// Chain id.
    #[serde(with = "serde_hex::u64_quantity")]
    pub chainid: u64,
}

/// A block header together with its hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureHeader {
    /// Header fields.
    #[serde(flatten)]
    pub header: BlockHeader,
    /// Keccak-256 of the header RLP.
    pub hash: B256,
}

impl From<BlockHeader> for FixtureHeader {
    fn from(header: BlockHeader) -> Self {
        let hash = header.hash();
        Self { header, hash }
    }
}

/// One block of a blockchain fixture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureBlock {
    /// Full block RLP.
    pub rlp: Bytes,
    /// Decoded header.
    pub block_header: FixtureHeader,
    /// Decoded transactions.
    pub transactions: Vec<FixtureTransaction>,
    /// Always empty.
    #[serde(default)]
    pub uncle_headers: Vec<FixtureHeader>,
    /// Withdrawals, from Shanghai on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// Exception a client must reject the block with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_exception: Option<ExceptionCategory>,
}

impl FixtureBlock {
    /// Returns `true` if clients must reject this block.
    pub fn is_invalid(&self) -> bool {
        self.expect_exception.is_some()
    }
}

/// A transaction as it appears in a blockchain fixture block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureTransaction {
    /// Envelope type.
    #[serde(rename = "type", with = "serde_hex::u64_quantity")]
    pub tx_type: u64,
    /// Chain id.
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
    /// Gas limit.
    #[serde(with = "serde_hex::u64_quantity")]
    pub gas_limit: u64,
    /// Recipient, `""` for creation.
    #[serde(with = "target")]
    pub to: Option<Address>,
    /// Value.
    #[serde(with = "serde_hex::quantity")]
    pub value: U256,
    /// Calldata.
    pub data: Bytes,
    /// Access list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<Vec<AccessListItem>>,
    /// Blob versioned hashes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_versioned_hashes: Option<Vec<B256>>,
    /// Signed authorizations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_list: Option<Vec<SignedAuthorization>>,
    /// `v` or `yParity`.
    #[serde(with = "serde_hex::quantity")]
    pub v: U256,
    /// `r`.
    #[serde(with = "serde_hex::quantity")]
    pub r: U256,
    /// `s`.
    #[serde(with = "serde_hex::quantity")]
    pub s: U256,
    /// Sender.
    pub sender: Address,
}

impl From<&ResolvedTransaction> for FixtureTransaction {
    fn from(tx: &ResolvedTransaction) -> Self {
        Self {
            tx_type: u64::from(tx.tx_type.as_u8()),
            chain_id: tx.chain_id,
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            max_fee_per_gas: tx.max_fee_per_gas,
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
            max_fee_per_blob_gas: tx.max_fee_per_blob_gas,
            gas_limit: tx.gas_limit,
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            access_list: tx.access_list.clone(),
            blob_versioned_hashes: tx.blob_versioned_hashes.clone(),
            authorization_list: tx.authorization_list.clone(),
            v: tx.v,
            r: tx.r,
            s: tx.s,
            sender: tx.sender,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::constants::EMPTY_ROOT_HASH;

    #[test]
    fn header_carries_its_hash() {
        let header = BlockHeader {
            number: 1,
            gas_limit: 30_000_000,
            base_fee_per_gas: Some(7),
            ..Default::default()
        };
        let fixture = FixtureHeader::from(header.clone());
        assert_eq!(fixture.hash, header.hash());

        let json = serde_json::to_value(&fixture).unwrap();
        assert_eq!(json["hash"], serde_json::to_value(header.hash()).unwrap());
        assert_eq!(json["stateRoot"], serde_json::to_value(EMPTY_ROOT_HASH).unwrap());
        assert!(json.get("baseFeePerGas").is_some());

        let back: FixtureHeader = serde_json::from_value(json).unwrap();
        assert_eq!(back, fixture);
    }
}
