//! Exception categories a test can expect.
//!
//! Names follow the `TransactionException.NAME` / `BlockException.NAME`
//! convention used by consuming client test runners. Several alternatives can
//! be accepted at once by joining them with `|`.

use core::{fmt, str::FromStr};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! exceptions {
    ($(#[$attr:meta])* $name:ident { $($(#[$vattr:meta])* $variant:ident),* $(,)? }) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[allow(non_camel_case_types)]
        pub enum $name {
            $($(#[$vattr])* $variant,)*
        }

        impl $name {
            /// All variants.
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            /// Name without the category prefix.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)*
                }
            }

            /// Looks up a variant by name, without the category prefix.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some($name::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

exceptions! {
    /// A transaction is invalid and must not be included.
    TransactionException {
        /// Sender cannot pay `gas_limit * max_fee + value`.
        INSUFFICIENT_ACCOUNT_FUNDS,
        /// Max fee per gas below the block base fee.
        INSUFFICIENT_MAX_FEE_PER_GAS,
        /// Priority fee above the max fee.
        PRIORITY_GREATER_THAN_MAX_FEE_PER_GAS,
        /// Max fee per blob gas below the blob base fee.
        INSUFFICIENT_MAX_FEE_PER_BLOB_GAS,
        /// Gas limit below the intrinsic cost.
        INTRINSIC_GAS_TOO_LOW,
        /// Gas limit below the EIP-7623 calldata floor.
        INTRINSIC_GAS_BELOW_FLOOR_GAS_COST,
        /// Initcode longer than the EIP-3860 limit.
        INITCODE_SIZE_EXCEEDED,
        /// Transaction type not enabled.
        TYPE_NOT_SUPPORTED,
        /// Nonce above the sender's.
        NONCE_MISMATCH_TOO_HIGH,
        /// Nonce below the sender's.
        NONCE_MISMATCH_TOO_LOW,
        /// Sender nonce is `2^64 - 1`.
        NONCE_IS_MAX,
        /// Gas limit above what is left in the block.
        GAS_ALLOWANCE_EXCEEDED,
        /// Gas limit above the EIP-7825 cap.
        GAS_LIMIT_EXCEEDS_MAXIMUM,
        /// `gas_limit * gas_price` overflows.
        GASLIMIT_PRICE_PRODUCT_OVERFLOW,
        /// Sender has code.
        SENDER_NOT_EOA,
        /// Wrong chain id.
        INVALID_CHAINID,
        /// Blob transaction before Cancun.
        TYPE_3_TX_PRE_FORK,
        /// Blob transaction without blobs.
        TYPE_3_TX_ZERO_BLOBS,
        /// Too many blobs in one transaction.
        TYPE_3_TX_BLOB_COUNT_EXCEEDED,
        /// Blob gas above the block allowance.
        TYPE_3_TX_MAX_BLOB_GAS_ALLOWANCE_EXCEEDED,
        /// Versioned hash with an unknown version byte.
        TYPE_3_TX_INVALID_BLOB_VERSIONED_HASH,
        /// Blob transaction without a target.
        TYPE_3_TX_CONTRACT_CREATION,
        /// Set-code transaction before Prague.
        TYPE_4_TX_PRE_FORK,
        /// Set-code transaction without authorizations.
        TYPE_4_EMPTY_AUTHORIZATION_LIST,
        /// Set-code transaction without a target.
        TYPE_4_TX_CONTRACT_CREATION,
        /// Malformed authorization tuple.
        TYPE_4_INVALID_AUTHORIZATION_FORMAT,
        /// Any other rejection.
        UNDEFINED,
    }
}

exceptions! {
    /// A block is invalid and must not be imported.
    BlockException {
        /// Header fields do not match the fork.
        INCORRECT_BLOCK_FORMAT,
        /// `blobGasUsed` does not match the transactions.
        INCORRECT_BLOB_GAS_USED,
        /// `excessBlobGas` does not match the parent.
        INCORRECT_EXCESS_BLOB_GAS,
        /// Blob gas above the block maximum.
        BLOB_GAS_USED_ABOVE_LIMIT,
        /// Gas used above the gas limit.
        GAS_USED_OVERFLOW,
        /// Base fee does not match the parent.
        INVALID_BASEFEE_PER_GAS,
        /// Gas limit changed too much.
        INVALID_GASLIMIT,
        /// State root mismatch.
        INVALID_STATE_ROOT,
        /// Withdrawals root mismatch.
        INVALID_WITHDRAWALS_ROOT,
        /// Requests hash mismatch.
        INVALID_REQUESTS,
        /// Extra data too long.
        EXTRA_DATA_TOO_BIG,
        /// Malformed block RLP.
        RLP_STRUCTURES_ENCODING,
        /// Any other rejection.
        UNDEFINED,
    }
}

/// A single expected exception.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Exception {
    /// Invalid transaction.
    Transaction(TransactionException),
    /// Invalid block.
    Block(BlockException),
}

impl Exception {
    /// Whether this is a transaction exception.
    pub const fn is_transaction(&self) -> bool {
        matches!(self, Exception::Transaction(_))
    }
}

impl From<TransactionException> for Exception {
    fn from(e: TransactionException) -> Self {
        Exception::Transaction(e)
    }
}

impl From<BlockException> for Exception {
    fn from(e: BlockException) -> Self {
        Exception::Block(e)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exception::Transaction(e) => write!(f, "TransactionException.{}", e.as_str()),
            Exception::Block(e) => write!(f, "BlockException.{}", e.as_str()),
        }
    }
}

/// Error parsing an exception name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown exception {0:?}")]
pub struct UnknownException(pub String);

impl FromStr for Exception {
    type Err = UnknownException;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let unknown = || UnknownException(s.to_string());
        let (category, name) = s.split_once('.').ok_or_else(unknown)?;
        match category {
            "TransactionException" => TransactionException::from_name(name)
                .map(Exception::Transaction)
                .ok_or_else(unknown),
            "BlockException" => BlockException::from_name(name)
                .map(Exception::Block)
                .ok_or_else(unknown),
            _ => Err(unknown()),
        }
    }
}

/// One or more acceptable exceptions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExceptionCategory(Vec<Exception>);

impl ExceptionCategory {
    /// A category accepting exactly one exception.
    pub fn single(exception: impl Into<Exception>) -> Self {
        Self(vec![exception.into()])
    }

    /// Adds an alternative.
    pub fn or(mut self, exception: impl Into<Exception>) -> Self {
        let exception = exception.into();
        if !self.0.contains(&exception) {
            self.0.push(exception);
        }
        self
    }

    /// Accepted alternatives.
    pub fn alternatives(&self) -> &[Exception] {
        &self.0
    }

    /// Returns `true` if `exception` is one of the alternatives.
    pub fn matches(&self, exception: &Exception) -> bool {
        self.0.contains(exception)
    }

    /// Returns `true` if any alternative is a transaction exception.
    pub fn has_transaction_exception(&self) -> bool {
        self.0.iter().any(Exception::is_transaction)
    }

    /// Returns `true` if any alternative is a block exception.
    pub fn has_block_exception(&self) -> bool {
        self.0.iter().any(|e| !e.is_transaction())
    }
}

impl From<TransactionException> for ExceptionCategory {
    fn from(e: TransactionException) -> Self {
        Self::single(e)
    }
}

impl From<BlockException> for ExceptionCategory {
    fn from(e: BlockException) -> Self {
        Self::single(e)
    }
}

impl fmt::Display for ExceptionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl FromStr for ExceptionCategory {
    type Err = UnknownException;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let exceptions = s
            .split('|')
            .map(str::parse)
            .collect::<Result<Vec<Exception>, _>>()?;
        if exceptions.is_empty() {
            return Err(UnknownException(s.to_string()));
        }
        Ok(Self(exceptions))
    }
}

impl Serialize for ExceptionCategory {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExceptionCategory {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("TransactionException.INTRINSIC_GAS_TOO_LOW", 1)]
    #[case(
        "TransactionException.INSUFFICIENT_ACCOUNT_FUNDS|TransactionException.INTRINSIC_GAS_TOO_LOW",
        2
    )]
    #[case("BlockException.INCORRECT_BLOB_GAS_USED | TransactionException.UNDEFINED", 2)]
    fn parse_alternatives(#[case] input: &str, #[case] count: usize) {
        let category: ExceptionCategory = input.parse().unwrap();
        assert_eq!(category.alternatives().len(), count);
    }

    #[rstest]
    #[case("INTRINSIC_GAS_TOO_LOW")]
    #[case("TransactionException.NOT_A_THING")]
    #[case("StateException.INTRINSIC_GAS_TOO_LOW")]
    #[case("")]
    fn parse_rejects(#[case] input: &str) {
        assert!(input.parse::<ExceptionCategory>().is_err());
    }

    #[test]
    fn matches_any_alternative() {
        let category = ExceptionCategory::single(TransactionException::INSUFFICIENT_ACCOUNT_FUNDS)
            .or(TransactionException::INTRINSIC_GAS_TOO_LOW);
        assert!(category.matches(&TransactionException::INTRINSIC_GAS_TOO_LOW.into()));
        assert!(!category.matches(&TransactionException::NONCE_IS_MAX.into()));
        assert!(category.has_transaction_exception());
        assert!(!category.has_block_exception());
    }

    #[test]
    fn serde_as_string() {
        let category = ExceptionCategory::single(BlockException::INVALID_GASLIMIT)
            .or(TransactionException::GAS_ALLOWANCE_EXCEEDED);
        let json = serde_json::to_string(&category).unwrap();
        assert_eq!(
            json,
            r#""BlockException.INVALID_GASLIMIT|TransactionException.GAS_ALLOWANCE_EXCEEDED""#
        );
        assert_eq!(serde_json::from_str::<ExceptionCategory>(&json).unwrap(), category);
    }

    #[test]
    fn names_round_trip() {
        for e in TransactionException::ALL {
            assert_eq!(TransactionException::from_name(e.as_str()), Some(*e));
        }
        for e in BlockException::ALL {
            assert_eq!(BlockException::from_name(e.as_str()), Some(*e));
        }
    }
}
