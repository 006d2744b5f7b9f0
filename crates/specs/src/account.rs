use bytecode::Bytecode;
use primitives::{
    constants::KECCAK_EMPTY, keccak256, serde_hex, Address, Bytes, Storage, B256, U256,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{btree_map, BTreeMap};

/// Account state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Account {
    /// Balance in wei.
    #[serde(default, with = "serde_hex::quantity")]
    pub balance: U256,
    /// Transaction count.
    #[serde(default, with = "serde_hex::u64_quantity")]
    pub nonce: u64,
    /// Runtime code.
    #[serde(default, deserialize_with = "deserialize_code")]
    pub code: Bytes,
    /// Storage slots.
    #[serde(default)]
    pub storage: Storage,
}

impl Account {
    /// An externally owned account holding `balance`.
    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }

    /// A contract account running `code`.
    pub fn with_code(code: impl Into<Bytes>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    /// Sets the nonce.
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets a storage slot.
    pub fn storage_slot(mut self, key: U256, value: U256) -> Self {
        self.storage.insert(key, value);
        self
    }

    /// Keccak-256 of the code.
    pub fn code_hash(&self) -> B256 {
        if self.code.is_empty() {
            KECCAK_EMPTY
        } else {
            keccak256(&self.code)
        }
    }

    /// Empty as defined by EIP-161: no code, zero nonce and zero balance.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.nonce == 0 && self.balance.is_zero()
    }
}

/// Accepts code as hex bytes or as `{ "asm": "PUSH1 0x01 ..." }`.
pub(crate) fn deserialize_code<'de, D: Deserializer<'de>>(d: D) -> Result<Bytes, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Hex(Bytes),
        Asm { asm: String },
    }

    match Code::deserialize(d)? {
        Code::Hex(bytes) => Ok(bytes),
        Code::Asm { asm } => Bytecode::from_asm(&asm)
            .map(Bytecode::into_bytes)
            .map_err(serde::de::Error::custom),
    }
}

/// Address to account map: a pre-state or an observed post-state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Alloc(BTreeMap<Address, Account>);

impl Alloc {
    /// Empty alloc.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an account, returning the previous one.
    pub fn insert(&mut self, address: Address, account: Account) -> Option<Account> {
        self.0.insert(address, account)
    }

    /// Builder form of [`Alloc::insert`].
    pub fn with(mut self, address: Address, account: Account) -> Self {
        self.insert(address, account);
        self
    }

    /// Account at `address`.
    pub fn get(&self, address: &Address) -> Option<&Account> {
        self.0.get(address)
    }

    /// Mutable account at `address`.
    pub fn get_mut(&mut self, address: &Address) -> Option<&mut Account> {
        self.0.get_mut(address)
    }

    /// Whether `address` is present.
    pub fn contains(&self, address: &Address) -> bool {
        self.0.contains_key(address)
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no accounts.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Accounts in address order.
    pub fn iter(&self) -> btree_map::Iter<'_, Address, Account> {
        self.0.iter()
    }

    /// Addresses in order.
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.0.keys()
    }

    /// Secure Merkle-Patricia root of the state.
    pub fn state_root(&self) -> B256 {
        crate::trie::state_root(self.iter())
    }
}

impl FromIterator<(Address, Account)> for Alloc {
    fn from_iter<I: IntoIterator<Item = (Address, Account)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Alloc {
    type Item = (Address, Account);
    type IntoIter = btree_map::IntoIter<Address, Account>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Alloc {
    type Item = (&'a Address, &'a Account);
    type IntoIter = btree_map::Iter<'a, Address, Account>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::address;

    #[test]
    fn code_from_asm() {
        let account: Account = serde_json::from_str(
            r#"{"balance": "1000", "nonce": "0x01", "code": {"asm": "PUSH1 0x01 PUSH1 0x00 SSTORE"}}"#,
        )
        .unwrap();
        assert_eq!(account.code.as_ref(), &[0x60, 0x01, 0x60, 0x00, 0x55]);
        assert_eq!(account.balance, U256::from(1000));
        assert_eq!(account.nonce, 1);
        assert!(account.storage.is_empty());
    }

    #[test]
    fn code_from_hex_and_bad_asm() {
        let account: Account = serde_json::from_str(r#"{"code": "0x6001"}"#).unwrap();
        assert_eq!(account.code.as_ref(), &[0x60, 0x01]);

        let err = serde_json::from_str::<Account>(r#"{"code": {"asm": "NOT_AN_OPCODE"}}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("NOT_AN_OPCODE"), "{err}");
    }

    #[test]
    fn canonical_output() {
        let alloc = Alloc::new().with(
            address!("0000000000000000000000000000000000001000"),
            Account::with_code([0x00u8]).storage_slot(U256::from(1), U256::from(2)),
        );
        let json = serde_json::to_value(&alloc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "0x0000000000000000000000000000000000001000": {
                    "balance": "0x00",
                    "nonce": "0x00",
                    "code": "0x00",
                    "storage": {"0x01": "0x02"}
                }
            })
        );
    }

    #[test]
    fn empty_account() {
        assert!(Account::default().is_empty());
        assert!(!Account::with_balance(U256::from(1)).is_empty());
        assert_eq!(Account::default().code_hash(), KECCAK_EMPTY);
    }
}
