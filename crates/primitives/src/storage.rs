use crate::{codec::HexCodec, Quantity, UintTryFrom, U256};
use core::fmt;
use serde::{de, ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{btree_map, BTreeMap};

/// Account storage: 256-bit keys to 256-bit values, ordered by key.
///
/// A zero value is equivalent to an absent slot. Equality compares the raw
/// maps, use [`Storage::without_zeros`] first when zero entries may be present
/// on one side only.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Storage(BTreeMap<U256, U256>);

impl Storage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `key`, zero when unset.
    pub fn get(&self, key: &U256) -> U256 {
        self.0.get(key).copied().unwrap_or_default()
    }

    /// Value of `key` if it is explicitly present.
    pub fn get_explicit(&self, key: &U256) -> Option<U256> {
        self.0.get(key).copied()
    }

    /// Sets `key` to `value`, returning the previous explicit value.
    pub fn insert(&mut self, key: U256, value: U256) -> Option<U256> {
        self.0.insert(key, value)
    }

    /// Copy of this storage with zero-valued slots removed.
    pub fn without_zeros(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(_, v)| !v.is_zero())
                .map(|(k, v)| (*k, *v))
                .collect(),
        )
    }

    /// Returns `true` if no slot holds a non-zero value.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|v| v.is_zero())
    }

    /// Number of explicit entries, zero values included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over explicit entries in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, U256, U256> {
        self.0.iter()
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(k, v)| (k.to_hex(), v.to_hex())))
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Storage
where
    U256: UintTryFrom<K> + UintTryFrom<V>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (U256::from(k), U256::from(v)))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Storage {
    type Item = (&'a U256, &'a U256);
    type IntoIter = btree_map::Iter<'a, U256, U256>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<BTreeMap<U256, U256>> for Storage {
    fn from(map: BTreeMap<U256, U256>) -> Self {
        Self(map)
    }
}

impl Serialize for Storage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(&k.to_hex(), &v.to_hex())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Storage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Value {
            Str(String),
            Num(u64),
        }

        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let mut storage = BTreeMap::new();
        for (k, v) in raw {
            let key = U256::parse_lenient(&k).map_err(de::Error::custom)?;
            let value = match v {
                Value::Str(s) => U256::parse_lenient(&s).map_err(de::Error::custom)?,
                Value::Num(n) => U256::from(n),
            };
            storage.insert(key, value);
        }
        Ok(Self(storage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_equals_absent() {
        let storage: Storage = [(1u64, 0u64), (2, 5)].into_iter().collect();
        assert_eq!(storage.get(&U256::from(1)), U256::ZERO);
        assert_eq!(storage.get(&U256::from(9)), U256::ZERO);
        assert_eq!(storage.get_explicit(&U256::from(1)), Some(U256::ZERO));
        assert_eq!(storage.without_zeros().len(), 1);
        assert!(!storage.is_empty());
        assert!(Storage::from_iter([(3u64, 0u64)]).is_empty());
    }

    #[test]
    fn serde_canonical() {
        let storage: Storage =
            serde_json::from_str(r#"{"0x0": "0x1", "0x01": 2, "16": "0x0100"}"#).unwrap();
        assert_eq!(storage.len(), 3);
        assert_eq!(storage.get(&U256::from(16)), U256::from(256));
        assert_eq!(
            serde_json::to_string(&storage).unwrap(),
            r#"{"0x00":"0x01","0x01":"0x02","0x10":"0x0100"}"#
        );
    }
}
