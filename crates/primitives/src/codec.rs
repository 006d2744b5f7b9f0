//! Canonical hex and raw-byte encodings.
//!
//! The canonical hex form is `0x`-prefixed, lowercase and of even length.
//! Integers use their minimal big-endian byte representation (zero is
//! `0x00`), fixed-size byte types always use their full width.

use alloy_primitives::{hex, ruint::Uint, Address, Bytes, FixedBytes};

/// Errors returned while decoding canonical encodings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    /// The string does not start with `0x`.
    #[error("missing 0x prefix")]
    MissingPrefix,
    /// The number of hex digits is odd.
    #[error("odd number of hex digits")]
    OddLength,
    /// A character is not a hex digit.
    #[error("invalid hex character")]
    InvalidCharacter,
    /// The value does not fit the target type.
    #[error("value needs {got} bytes but the type holds {max}")]
    Overflow {
        /// Number of bytes provided.
        got: usize,
        /// Maximum number of bytes the type can hold.
        max: usize,
    },
    /// A fixed-width value was given the wrong number of bytes.
    #[error("expected exactly {expected} bytes, got {got}")]
    InvalidLength {
        /// Required byte length.
        expected: usize,
        /// Provided byte length.
        got: usize,
    },
    /// A decimal literal could not be parsed.
    #[error("invalid decimal literal")]
    InvalidDecimal,
}

/// Canonical textual and binary representation of a value.
///
/// For every valid `x`, `T::from_hex(&x.to_hex()) == Ok(x)` and
/// `T::from_raw(&x.to_raw()) == Ok(x)`.
pub trait HexCodec: Sized {
    /// Canonical raw bytes.
    fn to_raw(&self) -> Vec<u8>;

    /// Decodes raw bytes.
    fn from_raw(bytes: &[u8]) -> Result<Self, HexError>;

    /// Canonical `0x`-prefixed even-length hex.
    fn to_hex(&self) -> String {
        hex::encode_prefixed(self.to_raw())
    }

    /// Decodes canonical hex. Only the `0x` prefix and even length are
    /// enforced; leading zero bytes of integers are accepted.
    fn from_hex(s: &str) -> Result<Self, HexError> {
        let digits = s.strip_prefix("0x").ok_or(HexError::MissingPrefix)?;
        if digits.len() % 2 != 0 {
            return Err(HexError::OddLength);
        }
        let bytes = hex::decode(digits).map_err(|_| HexError::InvalidCharacter)?;
        Self::from_raw(&bytes)
    }
}

impl<const BITS: usize, const LIMBS: usize> HexCodec for Uint<BITS, LIMBS> {
    fn to_raw(&self) -> Vec<u8> {
        let bytes = self.to_be_bytes_vec();
        let first = bytes.iter().position(|b| *b != 0);
        match first {
            Some(i) => bytes[i..].to_vec(),
            None => vec![0],
        }
    }

    fn from_raw(bytes: &[u8]) -> Result<Self, HexError> {
        Self::try_from_be_slice(bytes).ok_or(HexError::Overflow {
            got: bytes.len(),
            max: BITS.div_ceil(8),
        })
    }
}

impl HexCodec for u64 {
    fn to_raw(&self) -> Vec<u8> {
        let bytes = self.to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(7);
        bytes[first..].to_vec()
    }

    fn from_raw(bytes: &[u8]) -> Result<Self, HexError> {
        let significant = bytes.iter().position(|b| *b != 0).map_or(&[][..], |i| &bytes[i..]);
        if significant.len() > 8 {
            return Err(HexError::Overflow {
                got: significant.len(),
                max: 8,
            });
        }
        Ok(significant.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
    }
}

impl<const N: usize> HexCodec for FixedBytes<N> {
    fn to_raw(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    fn from_raw(bytes: &[u8]) -> Result<Self, HexError> {
        if bytes.len() != N {
            return Err(HexError::InvalidLength {
                expected: N,
                got: bytes.len(),
            });
        }
        Ok(Self::from_slice(bytes))
    }
}

impl HexCodec for Address {
    fn to_raw(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    fn from_raw(bytes: &[u8]) -> Result<Self, HexError> {
        FixedBytes::<20>::from_raw(bytes).map(Address::from)
    }
}

impl HexCodec for Bytes {
    fn to_raw(&self) -> Vec<u8> {
        self.to_vec()
    }

    fn from_raw(bytes: &[u8]) -> Result<Self, HexError> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

/// Integer types that can also be written as decimal literals or with an odd
/// number of hex digits, the way hand-written specs and evaluators emit them.
pub trait Quantity: HexCodec + Copy {
    /// Parses a decimal literal.
    fn from_decimal(s: &str) -> Result<Self, HexError>;

    /// Converts a JSON integer.
    fn from_u64(value: u64) -> Self;

    /// Parses `0x`-prefixed hex of any length, or a decimal literal.
    fn parse_lenient(s: &str) -> Result<Self, HexError> {
        let s = s.trim();
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some("") => Ok(Self::from_u64(0)),
            Some(digits) if digits.len() % 2 == 1 => Self::from_hex(&format!("0x0{digits}")),
            Some(_) => Self::from_hex(s),
            None => Self::from_decimal(s),
        }
    }
}

impl<const BITS: usize, const LIMBS: usize> Quantity for Uint<BITS, LIMBS> {
    fn from_decimal(s: &str) -> Result<Self, HexError> {
        Self::from_str_radix(s, 10).map_err(|_| HexError::InvalidDecimal)
    }

    fn from_u64(value: u64) -> Self {
        Self::from(value)
    }
}

impl Quantity for u64 {
    fn from_decimal(s: &str) -> Result<Self, HexError> {
        s.parse().map_err(|_| HexError::InvalidDecimal)
    }

    fn from_u64(value: u64) -> Self {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{address, b256, U16, U256, U8};
    use rstest::rstest;

    #[rstest]
    #[case::zero(U256::ZERO, "0x00")]
    #[case::one(U256::from(1), "0x01")]
    #[case::word(U256::from(0x1234), "0x1234")]
    #[case::odd_nibbles(U256::from(0x123), "0x0123")]
    #[case::max(U256::MAX, "0xffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff")]
    fn uint_canonical_hex(#[case] value: U256, #[case] expected: &str) {
        assert_eq!(value.to_hex(), expected);
        assert_eq!(U256::from_hex(expected), Ok(value));
        assert_eq!(U256::from_raw(&value.to_raw()), Ok(value));
    }

    #[test]
    fn narrow_integers_reject_overflow() {
        assert_eq!(
            U8::from_hex("0x0100"),
            Err(HexError::Overflow { got: 2, max: 1 })
        );
        assert_eq!(U16::from_hex("0x0100"), Ok(U16::from(256)));
    }

    #[test]
    fn narrow_integers_wrap() {
        let max = U8::MAX;
        assert_eq!(max.wrapping_add(U8::from(1)), U8::ZERO);
        assert_eq!(U256::ZERO.wrapping_sub(U256::from(1)), U256::MAX);
    }

    #[test]
    fn strict_hex_rules() {
        assert_eq!(U256::from_hex("12"), Err(HexError::MissingPrefix));
        assert_eq!(U256::from_hex("0x123"), Err(HexError::OddLength));
        assert_eq!(U256::from_hex("0xzz"), Err(HexError::InvalidCharacter));
    }

    #[test]
    fn fixed_width_types() {
        let addr = address!("a94f5374fce5edbc8e2a8697c15331677e6ebf0b");
        assert_eq!(addr.to_hex(), "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b");
        assert_eq!(Address::from_hex(&addr.to_hex()), Ok(addr));
        assert_eq!(
            Address::from_hex("0x01"),
            Err(HexError::InvalidLength {
                expected: 20,
                got: 1
            })
        );

        let hash = b256!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");
        assert_eq!(crate::B256::from_hex(&hash.to_hex()), Ok(hash));
        assert_eq!(hash.to_raw().len(), 32);
    }

    #[test]
    fn bytes_round_trip() {
        let empty = Bytes::new();
        assert_eq!(empty.to_hex(), "0x");
        assert_eq!(Bytes::from_hex("0x"), Ok(empty));
        let code = Bytes::from_static(&[0x60, 0x01, 0x00]);
        assert_eq!(Bytes::from_hex(&code.to_hex()), Ok(code));
    }

    #[test]
    fn u64_codec() {
        assert_eq!(0u64.to_hex(), "0x00");
        assert_eq!(0x1_0000u64.to_hex(), "0x010000");
        assert_eq!(u64::from_hex("0x0000000000000000ff"), Ok(255));
        assert!(u64::from_hex("0x010000000000000000").is_err());
    }

    #[rstest]
    #[case("0x0", 0)]
    #[case("0x", 0)]
    #[case("0x5208", 21000)]
    #[case("0x123", 0x123)]
    #[case("21000", 21000)]
    fn lenient_parsing(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(u64::parse_lenient(input), Ok(expected));
        assert_eq!(U256::parse_lenient(input), Ok(U256::from(expected)));
    }
}
