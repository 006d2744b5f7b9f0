use crate::account::deserialize_code;
use primitives::{serde_hex, Address, Bytes, Storage, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{btree_map, BTreeMap};

/// Constraints on one account of the post-state.
///
/// Only the fields that are set are checked. Listed storage slots must hold
/// exactly the given value, where zero also matches an absent slot; slots not
/// listed are unconstrained.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct AccountExpectation {
    /// Expected nonce.
    #[serde(with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    /// Expected balance.
    #[serde(with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub balance: Option<U256>,
    /// Expected code.
    #[serde(
        deserialize_with = "deserialize_optional_code",
        skip_serializing_if = "Option::is_none"
    )]
    pub code: Option<Bytes>,
    /// Expected storage slots.
    #[serde(skip_serializing_if = "Storage::is_empty")]
    pub storage: Storage,
}

fn deserialize_optional_code<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Bytes>, D::Error> {
    deserialize_code(d).map(Some)
}

/// Expected state of one account after execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpectedAccount {
    /// The account must not exist. Written as `null`.
    Absent,
    /// The account must exist and match every set field.
    Present(AccountExpectation),
}

impl ExpectedAccount {
    /// Expects only the balance.
    pub fn balance(balance: U256) -> Self {
        Self::Present(AccountExpectation {
            balance: Some(balance),
            ..Default::default()
        })
    }

    /// Expects only the nonce.
    pub fn nonce(nonce: u64) -> Self {
        Self::Present(AccountExpectation {
            nonce: Some(nonce),
            ..Default::default()
        })
    }

    /// Adds a storage slot constraint. An [`ExpectedAccount::Absent`] becomes
    /// present.
    pub fn with_storage(self, key: U256, value: U256) -> Self {
        let mut fields = match self {
            Self::Absent => AccountExpectation::default(),
            Self::Present(fields) => fields,
        };
        fields.storage.insert(key, value);
        Self::Present(fields)
    }
}

impl Serialize for ExpectedAccount {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent => s.serialize_none(),
            Self::Present(fields) => fields.serialize(s),
        }
    }
}

impl<'de> Deserialize<'de> for ExpectedAccount {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(match Option::<AccountExpectation>::deserialize(d)? {
            None => Self::Absent,
            Some(fields) => Self::Present(fields),
        })
    }
}

/// Partial post-state. Accounts that are not listed are unconstrained.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expectation(BTreeMap<Address, ExpectedAccount>);

impl Expectation {
    /// No constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constraint on `address`.
    pub fn with(mut self, address: Address, account: ExpectedAccount) -> Self {
        self.0.insert(address, account);
        self
    }

    /// Constraint on `address`, if any.
    pub fn get(&self, address: &Address) -> Option<&ExpectedAccount> {
        self.0.get(address)
    }

    /// Returns `true` if nothing is constrained.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Constrained accounts in address order.
    pub fn iter(&self) -> btree_map::Iter<'_, Address, ExpectedAccount> {
        self.0.iter()
    }
}

impl FromIterator<(Address, ExpectedAccount)> for Expectation {
    fn from_iter<I: IntoIterator<Item = (Address, ExpectedAccount)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
