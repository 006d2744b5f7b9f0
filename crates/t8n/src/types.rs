use primitives::{alloy_primitives::Bloom, serde_hex, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use specs::{Alloc, ResolvedEnvironment, ResolvedTransaction};
use std::collections::BTreeMap;

/// One evaluation: execute `txs` in a block described by `env` on top of
/// `alloc`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct T8nRequest {
    /// Test case the call belongs to, used for logs and dumps.
    pub case_id: String,
    /// Fork name as the evaluator knows it.
    pub fork: String,
    /// Chain id.
    pub chain_id: u64,
    /// Block reward, `None` to skip rewarding the coinbase.
    pub reward: Option<U256>,
    /// Pre-state.
    pub alloc: Alloc,
    /// Block context.
    pub env: ResolvedEnvironment,
    /// Signed transactions in block order.
    pub txs: Vec<ResolvedTransaction>,
    /// Storage slots to read back per account, for backends that cannot
    /// list the whole post-state.
    pub watched: BTreeMap<Address, Vec<U256>>,
}

/// What goes to the evaluator's stdin.
#[derive(Serialize)]
pub(crate) struct T8nInput<'a> {
    pub(crate) alloc: &'a Alloc,
    pub(crate) env: &'a ResolvedEnvironment,
    pub(crate) txs: &'a [ResolvedTransaction],
}

impl<'a> From<&'a T8nRequest> for T8nInput<'a> {
    fn from(request: &'a T8nRequest) -> Self {
        Self {
            alloc: &request.alloc,
            env: &request.env,
            txs: &request.txs,
        }
    }
}

/// Evaluator output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct T8nOutput {
    /// Post-state.
    pub alloc: Alloc,
    /// Block result.
    pub result: T8nResult,
    /// RLP list of the included transactions, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Bytes>,
}

impl T8nOutput {
    /// Rejection of the transaction at `index`, if it was rejected.
    pub fn rejection(&self, index: usize) -> Option<&RejectedTx> {
        self.result.rejected.iter().find(|r| r.index == index)
    }
}

/// Block-level result of an evaluation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct T8nResult {
    /// State root after the block.
    pub state_root: B256,
    /// Transactions trie root.
    pub tx_root: B256,
    /// Receipts trie root.
    pub receipts_root: B256,
    /// Hash of the RLP-encoded logs.
    pub logs_hash: B256,
    /// Bloom over every log.
    pub logs_bloom: Bloom,
    /// Receipts of the included transactions.
    #[serde(default)]
    pub receipts: Vec<Receipt>,
    /// Transactions the evaluator refused to include.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub rejected: Vec<RejectedTx>,
    /// Difficulty the evaluator computed, pre-Paris.
    #[serde(
        default,
        rename = "currentDifficulty",
        with = "serde_hex::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub difficulty: Option<U256>,
    /// Gas used by the block.
    #[serde(with = "serde_hex::u64_quantity")]
    pub gas_used: u64,
    /// Base fee the evaluator used.
    #[serde(
        default,
        rename = "currentBaseFee",
        with = "serde_hex::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub base_fee: Option<u64>,
    /// Withdrawals root, from Shanghai on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<B256>,
    /// Excess blob gas, from Cancun on.
    #[serde(
        default,
        rename = "currentExcessBlobGas",
        with = "serde_hex::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub excess_blob_gas: Option<u64>,
    /// Blob gas used, from Cancun on.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<u64>,
    /// Requests hash, from Prague on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_hash: Option<B256>,
}

fn null_as_empty<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}

/// Receipt of an included transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Transaction hash.
    pub transaction_hash: B256,
    /// Gas used by this transaction.
    #[serde(with = "serde_hex::u64_quantity")]
    pub gas_used: u64,
    /// Gas used by the block up to and including this transaction.
    #[serde(default, with = "serde_hex::u64_quantity")]
    pub cumulative_gas_used: u64,
    /// 1 on success, 0 on revert or exceptional halt. Absent before
    /// Byzantium.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub status: Option<u64>,
    /// Created contract, for creations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    /// Emitted logs as the evaluator reports them.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub logs: Vec<serde_json::Value>,
}

/// A transaction the evaluator did not include.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedTx {
    /// Position in the request.
    pub index: usize,
    /// The evaluator's message.
    pub error: String,
}
