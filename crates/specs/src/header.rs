use crate::{env::Withdrawal, transaction::ResolvedTransaction, trie, ResolvedEnvironment};
use alloy_rlp::{Encodable, Header};
use forks::{Fork, ForkFeatures};
use primitives::{
    alloy_primitives::Bloom,
    constants::{EMPTY_OMMERS_HASH, EMPTY_REQUESTS_HASH, EMPTY_ROOT_HASH},
    keccak256, serde_hex, Address, Bytes, FixedBytes, B256, U256,
};
use serde::{Deserialize, Serialize};

/// Block header with the fields of every fork up to Prague. Fields a fork
/// does not have are `None` and are left out of the RLP encoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    /// Parent block hash.
    pub parent_hash: B256,
    /// Ommers hash.
    pub uncle_hash: B256,
    /// Beneficiary.
    pub coinbase: Address,
    /// State root after the block.
    pub state_root: B256,
    /// Transactions trie root.
    pub transactions_trie: B256,
    /// Receipts trie root.
    pub receipt_trie: B256,
    /// Logs bloom.
    pub bloom: Bloom,
    /// Difficulty, zero from Paris on.
    #[serde(with = "serde_hex::quantity")]
    pub difficulty: U256,
    /// Block number.
    #[serde(with = "serde_hex::u64_quantity")]
    pub number: u64,
    /// Gas limit.
    #[serde(with = "serde_hex::u64_quantity")]
    pub gas_limit: u64,
    /// Gas used.
    #[serde(with = "serde_hex::u64_quantity")]
    pub gas_used: u64,
    /// Timestamp.
    #[serde(with = "serde_hex::u64_quantity")]
    pub timestamp: u64,
    /// Extra data.
    pub extra_data: Bytes,
    /// Mix hash, `prevRandao` from Paris on.
    pub mix_hash: B256,
    /// Proof-of-work nonce.
    pub nonce: FixedBytes<8>,
    /// Base fee, from London on.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<u64>,
    /// Withdrawals root, from Shanghai on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<B256>,
    /// Blob gas used, from Cancun on.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<u64>,
    /// Excess blob gas, from Cancun on.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub excess_blob_gas: Option<u64>,
    /// Parent beacon block root, from Cancun on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<B256>,
    /// Requests hash, from Prague on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_hash: Option<B256>,
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            parent_hash: B256::ZERO,
            uncle_hash: EMPTY_OMMERS_HASH,
            coinbase: Address::ZERO,
            state_root: EMPTY_ROOT_HASH,
            transactions_trie: EMPTY_ROOT_HASH,
            receipt_trie: EMPTY_ROOT_HASH,
            bloom: Bloom::ZERO,
            difficulty: U256::ZERO,
            number: 0,
            gas_limit: 0,
            gas_used: 0,
            timestamp: 0,
            extra_data: Bytes::new(),
            mix_hash: B256::ZERO,
            nonce: FixedBytes::ZERO,
            base_fee_per_gas: None,
            withdrawals_root: None,
            blob_gas_used: None,
            excess_blob_gas: None,
            parent_beacon_block_root: None,
            requests_hash: None,
        }
    }
}

impl BlockHeader {
    /// Genesis header for `fork` over a pre-state with root `state_root`.
    ///
    /// Block number and timestamp are zero; every other value comes from
    /// `env`, with the fork deciding which optional fields exist.
    pub fn genesis(fork: &Fork, env: &ResolvedEnvironment, state_root: B256) -> Self {
        Self {
            coinbase: Address::ZERO,
            state_root,
            difficulty: env.current_difficulty.unwrap_or_default(),
            number: 0,
            gas_limit: env.current_gas_limit,
            timestamp: 0,
            extra_data: Bytes::from_static(&[0x00]),
            mix_hash: env.current_random.unwrap_or_default(),
            base_fee_per_gas: env.current_base_fee,
            ..Self::default()
        }
        .with_fork_fields(fork, env)
    }

    /// Sets the optional fields `fork` requires from `env` and clears the
    /// ones it does not have.
    pub fn with_fork_fields(mut self, fork: &Fork, env: &ResolvedEnvironment) -> Self {
        if !fork.supports(ForkFeatures::FEE_MARKET) {
            self.base_fee_per_gas = None;
        }
        self.withdrawals_root = fork.supports(ForkFeatures::WITHDRAWALS).then(|| {
            self.withdrawals_root.unwrap_or_else(|| {
                withdrawals_root(env.withdrawals.as_deref().unwrap_or_default())
            })
        });
        if fork.supports(ForkFeatures::BLOBS) {
            self.blob_gas_used.get_or_insert(0);
            self.excess_blob_gas = Some(env.current_excess_blob_gas.unwrap_or_default());
        } else {
            self.blob_gas_used = None;
            self.excess_blob_gas = None;
        }
        self.parent_beacon_block_root = fork
            .supports(ForkFeatures::BEACON_ROOT)
            .then(|| env.parent_beacon_block_root.unwrap_or_default());
        self.requests_hash = fork
            .supports(ForkFeatures::REQUESTS_HASH)
            .then(|| self.requests_hash.unwrap_or(EMPTY_REQUESTS_HASH));
        self
    }

    /// Keccak-256 of the RLP encoding.
    pub fn hash(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }

    fn payload_length(&self) -> usize {
        let mut length = self.parent_hash.length()
            + self.uncle_hash.length()
            + self.coinbase.length()
            + self.state_root.length()
            + self.transactions_trie.length()
            + self.receipt_trie.length()
            + self.bloom.length()
            + self.difficulty.length()
            + self.number.length()
            + self.gas_limit.length()
            + self.gas_used.length()
            + self.timestamp.length()
            + self.extra_data.length()
            + self.mix_hash.length()
            + self.nonce.length();
        length += self.base_fee_per_gas.map_or(0, |v| v.length());
        length += self.withdrawals_root.map_or(0, |v| v.length());
        length += self.blob_gas_used.map_or(0, |v| v.length());
        length += self.excess_blob_gas.map_or(0, |v| v.length());
        length += self.parent_beacon_block_root.map_or(0, |v| v.length());
        length += self.requests_hash.map_or(0, |v| v.length());
        length
    }
}

impl Encodable for BlockHeader {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.parent_hash.encode(out);
        self.uncle_hash.encode(out);
        self.coinbase.encode(out);
        self.state_root.encode(out);
        self.transactions_trie.encode(out);
        self.receipt_trie.encode(out);
        self.bloom.encode(out);
        self.difficulty.encode(out);
        self.number.encode(out);
        self.gas_limit.encode(out);
        self.gas_used.encode(out);
        self.timestamp.encode(out);
        self.extra_data.encode(out);
        self.mix_hash.encode(out);
        self.nonce.encode(out);
        if let Some(v) = self.base_fee_per_gas {
            v.encode(out);
        }
        if let Some(v) = self.withdrawals_root {
            v.encode(out);
        }
        if let Some(v) = self.blob_gas_used {
            v.encode(out);
        }
        if let Some(v) = self.excess_blob_gas {
            v.encode(out);
        }
        if let Some(v) = self.parent_beacon_block_root {
            v.encode(out);
        }
        if let Some(v) = self.requests_hash {
            v.encode(out);
        }
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

/// Root of the withdrawals trie.
pub fn withdrawals_root(withdrawals: &[Withdrawal]) -> B256 {
    trie::ordered_root(withdrawals.iter().map(alloy_rlp::encode))
}

/// Root of the transactions trie.
pub fn transactions_root(txs: &[ResolvedTransaction]) -> B256 {
    trie::ordered_root(txs.iter().map(|tx| tx.encoded.clone()))
}

/// RLP of a full block: header, transactions, no ommers and, from Shanghai
/// on, withdrawals.
pub fn encode_block(
    header: &BlockHeader,
    txs: &[ResolvedTransaction],
    withdrawals: Option<&[Withdrawal]>,
) -> Bytes {
    let txs_payload: usize = txs.iter().map(ResolvedTransaction::block_body_length).sum();
    let txs_header = Header {
        list: true,
        payload_length: txs_payload,
    };
    let ommers_header = Header {
        list: true,
        payload_length: 0,
    };
    let withdrawals_payload: Option<usize> =
        withdrawals.map(|w| w.iter().map(Encodable::length).sum());

    let payload_length = header.length()
        + txs_header.length()
        + txs_payload
        + ommers_header.length()
        + withdrawals_payload.map_or(0, |p| p + alloy_rlp::length_of_length(p));

    let mut out = Vec::with_capacity(payload_length + 9);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    header.encode(&mut out);
    txs_header.encode(&mut out);
    for tx in txs {
        tx.encode_for_block_body(&mut out);
    }
    ommers_header.encode(&mut out);
    if let (Some(withdrawals), Some(payload_length)) = (withdrawals, withdrawals_payload) {
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        for w in withdrawals {
            w.encode(&mut out);
        }
    }
    out.into()
}
