//! Default values used when a spec leaves a field unset.

use alloy_primitives::{address, b256, Address, B256};

/// Secret key of the default transaction sender.
pub const TEST_SECRET_KEY: B256 =
    b256!("45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8");

/// Address derived from [`TEST_SECRET_KEY`].
pub const TEST_SENDER: Address = address!("a94f5374fce5edbc8e2a8697c15331677e6ebf0b");

/// Default transaction recipient.
pub const DEFAULT_RECIPIENT: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");

/// Default block beneficiary.
pub const DEFAULT_COINBASE: Address = address!("2adc25665018aa1fe0e6bc666dac8fc2697ff9ba");

/// Default chain id.
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Default block gas limit for state tests.
pub const DEFAULT_ENV_GAS_LIMIT: u64 = 100_000_000_000_000_000;

/// Default block number of the executed block.
pub const DEFAULT_BLOCK_NUMBER: u64 = 1;

/// Default timestamp of the executed block.
pub const DEFAULT_TIMESTAMP: u64 = 1_000;

/// Default difficulty before the merge.
pub const DEFAULT_DIFFICULTY: u64 = 0x20000;

/// Default base fee from London on.
pub const DEFAULT_BASE_FEE: u64 = 7;

/// Default transaction gas limit.
pub const DEFAULT_TX_GAS_LIMIT: u64 = 21_000;

/// Default legacy gas price.
pub const DEFAULT_GAS_PRICE: u64 = 10;

/// Keccak-256 of the empty byte string.
pub const KECCAK_EMPTY: B256 =
    b256!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");

/// Root of an empty Merkle-Patricia trie.
pub const EMPTY_ROOT_HASH: B256 =
    b256!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");

/// Keccak-256 of the RLP encoding of an empty list.
pub const EMPTY_OMMERS_HASH: B256 =
    b256!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347");

/// SHA-256 of the empty byte string, the requests hash of a block without
/// requests.
pub const EMPTY_REQUESTS_HASH: B256 =
    b256!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
