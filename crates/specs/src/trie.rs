//! Merkle-Patricia roots over state, transactions and withdrawals.

use crate::account::Account;
use alloy_rlp::{Encodable, Header};
use hash_db::Hasher;
use plain_hasher::PlainHasher;
use primitives::{keccak256, Address, Storage, B256};
use triehash::{ordered_trie_root, sec_trie_root};

/// Secure trie root of a set of accounts.
pub fn state_root<'a>(accounts: impl IntoIterator<Item = (&'a Address, &'a Account)>) -> B256 {
    sec_trie_root::<KeccakHasher, _, _, _>(
        accounts
            .into_iter()
            .map(|(address, account)| (*address, trie_account_rlp(account))),
    )
}

/// Secure trie root of a storage map. Zero-valued slots are left out.
pub fn storage_root(storage: &Storage) -> B256 {
    sec_trie_root::<KeccakHasher, _, _, _>(
        storage
            .iter()
            .filter(|(_, v)| !v.is_zero())
            .map(|(k, v)| (B256::from(k.to_be_bytes::<32>()), alloy_rlp::encode(v))),
    )
}

/// Returns the RLP for this account.
pub fn trie_account_rlp(account: &Account) -> Vec<u8> {
    let storage_root = storage_root(&account.storage);
    let code_hash = account.code_hash();
    let payload_length = account.nonce.length()
        + account.balance.length()
        + storage_root.length()
        + code_hash.length();

    let mut out = Vec::with_capacity(payload_length + 3);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    account.nonce.encode(&mut out);
    account.balance.encode(&mut out);
    storage_root.encode(&mut out);
    code_hash.encode(&mut out);
    out
}

/// Root of a trie keyed by RLP-encoded position, as used for transactions,
/// receipts and withdrawals.
pub fn ordered_root<I>(items: I) -> B256
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    ordered_trie_root::<KeccakHasher, _>(items)
}

/// Keccak-256 hasher for `triehash`.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct KeccakHasher;

impl Hasher for KeccakHasher {
    type Out = B256;
    type StdHasher = PlainHasher;
    const LENGTH: usize = 32;

    fn hash(x: &[u8]) -> Self::Out {
        keccak256(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Alloc;
    use primitives::{address, constants::EMPTY_ROOT_HASH, U256};

    #[test]
    fn empty_roots() {
        assert_eq!(Alloc::new().state_root(), EMPTY_ROOT_HASH);
        assert_eq!(storage_root(&Storage::new()), EMPTY_ROOT_HASH);
        assert_eq!(ordered_root(Vec::<Vec<u8>>::new()), EMPTY_ROOT_HASH);
    }

    #[test]
    fn zero_slots_do_not_change_the_root() {
        let storage: Storage = [(1u64, 0u64)].into_iter().collect();
        assert_eq!(storage_root(&storage), EMPTY_ROOT_HASH);
    }

    #[test]
    fn single_funded_account() {
        let alloc = Alloc::new().with(
            address!("a94f5374fce5edbc8e2a8697c15331677e6ebf0b"),
            Account::with_balance(U256::from(1_000_000_000_000_000_000u64)),
        );
        let root = alloc.state_root();
        assert_ne!(root, EMPTY_ROOT_HASH);
        assert_eq!(root, alloc.clone().state_root());

        let touched = alloc.with(
            address!("1000000000000000000000000000000000000000"),
            Account::default(),
        );
        assert_ne!(touched.state_root(), root);
    }
}
