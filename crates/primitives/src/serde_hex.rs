//! Serde adapters for integer quantities.
//!
//! Output is always the canonical [`HexCodec`] form. Input additionally
//! accepts odd-length hex, decimal strings and JSON numbers, which is what
//! hand-written spec files and most evaluators produce.
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Env {
//!     #[serde(with = "serde_hex::quantity")]
//!     gas_limit: U256,
//!     #[serde(default, with = "serde_hex::option")]
//!     base_fee: Option<u64>,
//! }
//! ```

use crate::codec::{HexCodec, Quantity};
use core::{fmt, marker::PhantomData};
use serde::{de, Deserializer, Serializer};

struct QuantityVisitor<T>(PhantomData<T>);

impl<T: Quantity> de::Visitor<'_> for QuantityVisitor<T> {
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a hex or decimal quantity")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<T, E> {
        T::parse_lenient(v).map_err(|e| E::custom(format!("{e}: {v:?}")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<T, E> {
        Ok(T::from_u64(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<T, E> {
        u64::try_from(v)
            .map(T::from_u64)
            .map_err(|_| E::custom("negative quantity"))
    }
}

/// Required quantities.
pub mod quantity {
    use super::*;

    /// Serializes `value` as canonical hex.
    pub fn serialize<T: HexCodec, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_hex())
    }

    /// Deserializes a lenient quantity.
    pub fn deserialize<'de, T: Quantity, D: Deserializer<'de>>(d: D) -> Result<T, D::Error> {
        d.deserialize_any(QuantityVisitor(PhantomData))
    }
}

/// Optional quantities. Use together with `#[serde(default)]`.
pub mod option {
    use super::*;
    use serde::Deserialize;

    /// Serializes `Some` as canonical hex and `None` as `null`.
    pub fn serialize<T: HexCodec, S: Serializer>(
        value: &Option<T>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_str(&v.to_hex()),
            None => s.serialize_none(),
        }
    }

    /// Deserializes an optional lenient quantity.
    pub fn deserialize<'de, T: Quantity, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<T>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Num(u64),
        }

        match Option::<Raw>::deserialize(d)? {
            None => Ok(None),
            Some(Raw::Num(n)) => Ok(Some(T::from_u64(n))),
            Some(Raw::Str(s)) => T::parse_lenient(&s)
                .map(Some)
                .map_err(|e| de::Error::custom(format!("{e}: {s:?}"))),
        }
    }
}

/// `u64` fields such as nonces and gas values.
pub mod u64_quantity {
    use super::*;

    /// Serializes as canonical hex.
    pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
        quantity::serialize(value, s)
    }

    /// Deserializes a lenient quantity.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        quantity::deserialize(d)
    }
}

#[cfg(test)]
mod tests {
    use crate::U256;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::quantity")]
        value: U256,
        #[serde(with = "super::u64_quantity")]
        nonce: u64,
        #[serde(default, with = "super::option", skip_serializing_if = "Option::is_none")]
        base_fee: Option<u64>,
    }

    #[test]
    fn lenient_in_canonical_out() {
        let sample: Sample =
            serde_json::from_str(r#"{"value": "0x1", "nonce": 7, "base_fee": null}"#).unwrap();
        assert_eq!(
            sample,
            Sample {
                value: U256::from(1),
                nonce: 7,
                base_fee: None
            }
        );
        assert_eq!(
            serde_json::to_string(&sample).unwrap(),
            r#"{"value":"0x01","nonce":"0x07"}"#
        );
    }

    #[test]
    fn decimal_strings_and_missing_options() {
        let sample: Sample =
            serde_json::from_str(r#"{"value": "1000", "nonce": "0x00"}"#).unwrap();
        assert_eq!(sample.value, U256::from(1000));
        assert_eq!(sample.nonce, 0);
        assert_eq!(sample.base_fee, None);

        let sample: Sample =
            serde_json::from_str(r#"{"value": "0x00", "nonce": "0x0", "base_fee": "0x07"}"#)
                .unwrap();
        assert_eq!(sample.base_fee, Some(7));
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Sample>(r#"{"value": "0xzz", "nonce": 0}"#).is_err());
        assert!(serde_json::from_str::<Sample>(r#"{"value": "0x00", "nonce": -1}"#).is_err());
    }
}
