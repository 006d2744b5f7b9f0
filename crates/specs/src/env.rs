use crate::header::BlockHeader;
use alloy_rlp::{Encodable, Header};
use forks::{
    fee::{next_base_fee, INITIAL_BASE_FEE},
    Fork, ForkFeatures,
};
use primitives::{
    constants::{
        DEFAULT_BASE_FEE, DEFAULT_BLOCK_NUMBER, DEFAULT_COINBASE, DEFAULT_DIFFICULTY,
        DEFAULT_ENV_GAS_LIMIT, DEFAULT_TIMESTAMP,
    },
    serde_hex, Address, Bytes, B256, U256,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Seconds between consecutive blocks when a blockchain test leaves the
/// timestamp unset.
pub const DEFAULT_BLOCK_TIME: u64 = 12;

/// EIP-4895 beacon chain withdrawal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Withdrawal {
    /// Monotonic withdrawal index.
    #[serde(with = "serde_hex::u64_quantity")]
    pub index: u64,
    /// Validator index.
    #[serde(with = "serde_hex::u64_quantity")]
    pub validator_index: u64,
    /// Recipient.
    pub address: Address,
    /// Amount in gwei.
    #[serde(with = "serde_hex::u64_quantity")]
    pub amount: u64,
}

impl Encodable for Withdrawal {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.index.encode(out);
        self.validator_index.encode(out);
        self.address.encode(out);
        self.amount.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Withdrawal {
    fn payload_length(&self) -> usize {
        self.index.length()
            + self.validator_index.length()
            + self.address.length()
            + self.amount.length()
    }
}

/// Block context as authored. Every field is optional; [`Environment::resolve`]
/// fills in what the fork requires.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Environment {
    /// Block beneficiary.
    pub coinbase: Option<Address>,
    /// Block gas limit.
    #[serde(with = "serde_hex::option")]
    pub gas_limit: Option<u64>,
    /// Block number.
    #[serde(with = "serde_hex::option")]
    pub number: Option<u64>,
    /// Block timestamp.
    #[serde(with = "serde_hex::option")]
    pub timestamp: Option<u64>,
    /// Proof-of-work difficulty, used before Paris.
    #[serde(with = "serde_hex::option")]
    pub difficulty: Option<U256>,
    /// Beacon randomness, used from Paris on.
    pub prev_randao: Option<B256>,
    /// Base fee, used from London on.
    #[serde(with = "serde_hex::option")]
    pub base_fee_per_gas: Option<u64>,
    /// Excess blob gas, used from Cancun on.
    #[serde(with = "serde_hex::option")]
    pub excess_blob_gas: Option<u64>,
    /// Parent beacon block root, used from Cancun on.
    pub parent_beacon_block_root: Option<B256>,
    /// Withdrawals, used from Shanghai on.
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// Header extra data.
    pub extra_data: Option<Bytes>,
    /// Parent difficulty.
    #[serde(with = "serde_hex::option")]
    pub parent_difficulty: Option<U256>,
    /// Parent timestamp.
    #[serde(with = "serde_hex::option")]
    pub parent_timestamp: Option<u64>,
    /// Parent base fee, for base fee derivation.
    #[serde(with = "serde_hex::option")]
    pub parent_base_fee_per_gas: Option<u64>,
    /// Parent gas used, for base fee derivation.
    #[serde(with = "serde_hex::option")]
    pub parent_gas_used: Option<u64>,
    /// Parent gas limit, for base fee derivation.
    #[serde(with = "serde_hex::option")]
    pub parent_gas_limit: Option<u64>,
    /// Parent excess blob gas, for excess blob gas derivation.
    #[serde(with = "serde_hex::option")]
    pub parent_excess_blob_gas: Option<u64>,
    /// Parent blob gas used, for excess blob gas derivation.
    #[serde(with = "serde_hex::option")]
    pub parent_blob_gas_used: Option<u64>,
    /// Hashes readable through `BLOCKHASH`.
    pub block_hashes: BTreeMap<u64, B256>,
}

impl Environment {
    /// Fills every field `fork` requires with either the authored value, a
    /// value derived from the parent fields, or a default.
    pub fn resolve(&self, fork: &Fork) -> ResolvedEnvironment {
        let gas_limit = self.gas_limit.unwrap_or(DEFAULT_ENV_GAS_LIMIT);

        let base_fee = fork.supports(ForkFeatures::FEE_MARKET).then(|| {
            self.base_fee_per_gas.unwrap_or_else(|| {
                match (
                    self.parent_gas_limit,
                    self.parent_gas_used,
                    self.parent_base_fee_per_gas,
                ) {
                    (Some(limit), Some(used), Some(base)) => next_base_fee(limit, used, base),
                    _ => DEFAULT_BASE_FEE,
                }
            })
        });

        let excess_blob_gas = fork.blobs().map(|blobs| {
            self.excess_blob_gas.unwrap_or_else(|| {
                match (self.parent_excess_blob_gas, self.parent_blob_gas_used) {
                    (Some(excess), Some(used)) => blobs.next_excess_blob_gas(
                        excess,
                        used,
                        self.parent_base_fee_per_gas.or(base_fee).unwrap_or_default(),
                    ),
                    _ => 0,
                }
            })
        });

        let post_merge = fork.supports(ForkFeatures::PREV_RANDAO);

        ResolvedEnvironment {
            current_coinbase: self.coinbase.unwrap_or(DEFAULT_COINBASE),
            current_gas_limit: gas_limit,
            current_number: self.number.unwrap_or(DEFAULT_BLOCK_NUMBER),
            current_timestamp: self.timestamp.unwrap_or(DEFAULT_TIMESTAMP),
            current_difficulty: (!post_merge)
                .then(|| self.difficulty.unwrap_or(U256::from(DEFAULT_DIFFICULTY))),
            current_random: post_merge.then(|| self.prev_randao.unwrap_or_default()),
            current_base_fee: base_fee,
            current_excess_blob_gas: excess_blob_gas,
            parent_beacon_block_root: fork
                .supports(ForkFeatures::BEACON_ROOT)
                .then(|| self.parent_beacon_block_root.unwrap_or_default()),
            withdrawals: fork
                .supports(ForkFeatures::WITHDRAWALS)
                .then(|| self.withdrawals.clone().unwrap_or_default()),
            parent_difficulty: self.parent_difficulty,
            parent_timestamp: self.parent_timestamp,
            parent_base_fee: self.parent_base_fee_per_gas,
            parent_gas_used: self.parent_gas_used,
            parent_gas_limit: self.parent_gas_limit,
            parent_excess_blob_gas: self.parent_excess_blob_gas,
            parent_blob_gas_used: self.parent_blob_gas_used,
            block_hashes: self.block_hashes.clone(),
            extra_data: self.extra_data.clone().unwrap_or_default(),
        }
    }

    /// Resolves the environment of a block built on top of `parent`.
    ///
    /// Number, timestamp and gas limit follow the parent unless set; the base
    /// fee and excess blob gas are derived from the parent's header. The first
    /// fee-market block after a pre-London parent starts at
    /// [`INITIAL_BASE_FEE`].
    pub fn resolve_child(&self, fork: &Fork, parent: &BlockHeader) -> ResolvedEnvironment {
        let mut env = self.clone();
        env.number.get_or_insert(parent.number + 1);
        env.timestamp
            .get_or_insert(parent.timestamp + DEFAULT_BLOCK_TIME);
        env.gas_limit.get_or_insert(parent.gas_limit);
        env.parent_difficulty = Some(parent.difficulty);
        env.parent_timestamp = Some(parent.timestamp);
        env.parent_gas_used = Some(parent.gas_used);
        env.parent_gas_limit = Some(parent.gas_limit);
        env.parent_base_fee_per_gas = parent.base_fee_per_gas;
        env.parent_excess_blob_gas = Some(parent.excess_blob_gas.unwrap_or_default());
        env.parent_blob_gas_used = Some(parent.blob_gas_used.unwrap_or_default());
        env.block_hashes.insert(parent.number, parent.hash());
        if parent.base_fee_per_gas.is_none() && fork.supports(ForkFeatures::FEE_MARKET) {
            env.base_fee_per_gas.get_or_insert(INITIAL_BASE_FEE);
        }
        env.resolve(fork)
    }
}

/// Fully populated block context, in the evaluator's `env` format.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEnvironment {
    /// Block beneficiary.
    pub current_coinbase: Address,
    /// Block gas limit.
    #[serde(with = "serde_hex::u64_quantity")]
    pub current_gas_limit: u64,
    /// Block number.
    #[serde(with = "serde_hex::u64_quantity")]
    pub current_number: u64,
    /// Block timestamp.
    #[serde(with = "serde_hex::u64_quantity")]
    pub current_timestamp: u64,
    /// Difficulty, before Paris.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub current_difficulty: Option<U256>,
    /// `prevRandao`, from Paris on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_random: Option<B256>,
    /// Base fee, from London on.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub current_base_fee: Option<u64>,
    /// Excess blob gas, from Cancun on.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub current_excess_blob_gas: Option<u64>,
    /// Parent beacon block root, from Cancun on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<B256>,
    /// Withdrawals, from Shanghai on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// Parent difficulty.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub parent_difficulty: Option<U256>,
    /// Parent timestamp.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub parent_timestamp: Option<u64>,
    /// Parent base fee.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub parent_base_fee: Option<u64>,
    /// Parent gas used.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub parent_gas_used: Option<u64>,
    /// Parent gas limit.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub parent_gas_limit: Option<u64>,
    /// Parent excess blob gas.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub parent_excess_blob_gas: Option<u64>,
    /// Parent blob gas used.
    #[serde(default, with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub parent_blob_gas_used: Option<u64>,
    /// Hashes readable through `BLOCKHASH`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub block_hashes: BTreeMap<u64, B256>,
    /// Header extra data. Not part of the evaluator input.
    #[serde(skip)]
    pub extra_data: Bytes,
}

impl ResolvedEnvironment {
    /// Blob base fee at this block, `None` before Cancun.
    pub fn blob_base_fee(&self, fork: &Fork) -> Option<u128> {
        let excess = self.current_excess_blob_gas?;
        fork.blobs().map(|b| b.blob_base_fee(excess))
    }

    /// The fee a fee-market transaction must at least offer.
    pub fn base_fee(&self) -> u64 {
        self.current_base_fee.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forks::ForkRegistry;
    use primitives::hardfork::ForkId::{self, *};
    use rstest::rstest;

    fn fork(id: ForkId) -> &'static Fork {
        ForkRegistry::mainnet().get(id).unwrap()
    }

    #[rstest]
    #[case(BERLIN, true, false, false, false)]
    #[case(LONDON, true, true, false, false)]
    #[case(PARIS, false, true, false, false)]
    #[case(SHANGHAI, false, true, true, false)]
    #[case(CANCUN, false, true, true, true)]
    #[case(PRAGUE, false, true, true, true)]
    fn fork_dependent_fields(
        #[case] id: ForkId,
        #[case] difficulty: bool,
        #[case] base_fee: bool,
        #[case] withdrawals: bool,
        #[case] blobs: bool,
    ) {
        let env = Environment::default().resolve(fork(id));
        assert_eq!(env.current_difficulty.is_some(), difficulty);
        assert_eq!(env.current_random.is_some(), !difficulty);
        assert_eq!(env.current_base_fee.is_some(), base_fee);
        assert_eq!(env.withdrawals.is_some(), withdrawals);
        assert_eq!(env.current_excess_blob_gas.is_some(), blobs);
        assert_eq!(env.parent_beacon_block_root.is_some(), blobs);
    }

    #[test]
    fn defaults() {
        let env = Environment::default().resolve(fork(CANCUN));
        assert_eq!(env.current_coinbase, DEFAULT_COINBASE);
        assert_eq!(env.current_number, DEFAULT_BLOCK_NUMBER);
        assert_eq!(env.current_timestamp, DEFAULT_TIMESTAMP);
        assert_eq!(env.current_gas_limit, DEFAULT_ENV_GAS_LIMIT);
        assert_eq!(env.current_base_fee, Some(DEFAULT_BASE_FEE));
        assert_eq!(env.current_excess_blob_gas, Some(0));
        assert_eq!(env.blob_base_fee(fork(CANCUN)), Some(1));
    }

    #[test]
    fn base_fee_derived_from_parent() {
        let env = Environment {
            parent_gas_limit: Some(30_000_000),
            parent_gas_used: Some(30_000_000),
            parent_base_fee_per_gas: Some(1_000),
            ..Default::default()
        }
        .resolve(fork(LONDON));
        assert_eq!(env.current_base_fee, Some(1_125));
    }

    #[test]
    fn excess_blob_gas_derived_from_parent() {
        let env = Environment {
            parent_excess_blob_gas: Some(0),
            parent_blob_gas_used: Some(6 * forks::fee::GAS_PER_BLOB),
            ..Default::default()
        }
        .resolve(fork(CANCUN));
        assert_eq!(env.current_excess_blob_gas, Some(3 * forks::fee::GAS_PER_BLOB));
    }

    #[test]
    fn evaluator_field_names() {
        let env = Environment {
            block_hashes: [(0, B256::repeat_byte(1))].into_iter().collect(),
            ..Default::default()
        }
        .resolve(fork(SHANGHAI));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["currentCoinbase"], "0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba");
        assert_eq!(json["currentNumber"], "0x01");
        assert_eq!(json["currentBaseFee"], "0x07");
        assert_eq!(json["currentRandom"], serde_json::to_value(B256::ZERO).unwrap());
        assert_eq!(json["withdrawals"], serde_json::json!([]));
        assert!(json.get("currentDifficulty").is_none());
        assert!(json["blockHashes"].get("0").is_some());
    }

    #[test]
    fn child_of_pre_london_parent_starts_at_initial_base_fee() {
        let parent = BlockHeader {
            number: 4,
            timestamp: 48,
            gas_limit: 30_000_000,
            ..Default::default()
        };
        let env = Environment::default().resolve_child(fork(LONDON), &parent);
        assert_eq!(env.current_number, 5);
        assert_eq!(env.current_timestamp, 60);
        assert_eq!(env.current_base_fee, Some(INITIAL_BASE_FEE));
        assert_eq!(env.block_hashes.get(&4), Some(&parent.hash()));
    }
}
