//! Mapping of evaluator rejection messages to exception names.
//!
//! Evaluators report why they refused a transaction as free text. Each
//! [`ExceptionMapper`] rule is a substring of such a message and the
//! [`Exception`] it stands for. Matching is case-insensitive and the first
//! matching rule wins, so more specific substrings go first.

use specs::{Exception, TransactionException};

/// Substring rules from evaluator messages to exceptions.
#[derive(Clone, Debug, Default)]
pub struct ExceptionMapper {
    rules: Vec<(String, Exception)>,
}

impl ExceptionMapper {
    /// A mapper without rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for go-ethereum's `evm t8n`.
    pub fn geth() -> Self {
        use TransactionException::*;
        Self::from_rules([
            ("insufficient funds for gas * price + value", INSUFFICIENT_ACCOUNT_FUNDS),
            ("insufficient funds", INSUFFICIENT_ACCOUNT_FUNDS),
            ("max fee per gas less than block base fee", INSUFFICIENT_MAX_FEE_PER_GAS),
            ("max priority fee per gas higher than max fee per gas", PRIORITY_GREATER_THAN_MAX_FEE_PER_GAS),
            ("max fee per blob gas less than block blob gas fee", INSUFFICIENT_MAX_FEE_PER_BLOB_GAS),
            ("insufficient gas for floor data gas cost", INTRINSIC_GAS_BELOW_FLOOR_GAS_COST),
            ("intrinsic gas too low", INTRINSIC_GAS_TOO_LOW),
            ("max initcode size exceeded", INITCODE_SIZE_EXCEEDED),
            ("nonce has max value", NONCE_IS_MAX),
            ("nonce too high", NONCE_MISMATCH_TOO_HIGH),
            ("nonce too low", NONCE_MISMATCH_TOO_LOW),
            ("gas limit reached", GAS_ALLOWANCE_EXCEEDED),
            ("transaction gas limit too high", GAS_LIMIT_EXCEEDS_MAXIMUM),
            ("gas uint64 overflow", GASLIMIT_PRICE_PRODUCT_OVERFLOW),
            ("sender not an eoa", SENDER_NOT_EOA),
            ("invalid chain id", INVALID_CHAINID),
            ("blob transaction missing blob hashes", TYPE_3_TX_ZERO_BLOBS),
            ("blob transaction of type create", TYPE_3_TX_CONTRACT_CREATION),
            ("blob gas limit exceeded", TYPE_3_TX_MAX_BLOB_GAS_ALLOWANCE_EXCEEDED),
            ("too many blobs", TYPE_3_TX_BLOB_COUNT_EXCEEDED),
            ("blob version", TYPE_3_TX_INVALID_BLOB_VERSIONED_HASH),
            ("empty auth list", TYPE_4_EMPTY_AUTHORIZATION_LIST),
            ("eip-7702 transaction cannot be used to create contract", TYPE_4_TX_CONTRACT_CREATION),
            ("transaction type not supported", TYPE_NOT_SUPPORTED),
        ])
    }

    /// Rules for the execution-specs evaluator (`ethereum-spec-evm t8n`).
    pub fn eels() -> Self {
        use TransactionException::*;
        Self::from_rules([
            ("insufficientbalanceerror", INSUFFICIENT_ACCOUNT_FUNDS),
            ("insufficientmaxfeepergaserror", INSUFFICIENT_MAX_FEE_PER_GAS),
            ("priorityfeegreaterthanmaxfeeerror", PRIORITY_GREATER_THAN_MAX_FEE_PER_GAS),
            ("insufficientmaxfeeperblobgaserror", INSUFFICIENT_MAX_FEE_PER_BLOB_GAS),
            ("insufficienttransactiongaserror", INTRINSIC_GAS_TOO_LOW),
            ("initcodetoolargeerror", INITCODE_SIZE_EXCEEDED),
            ("nonceoverflowerror", NONCE_IS_MAX),
            ("noncemismatcherror: nonce too high", NONCE_MISMATCH_TOO_HIGH),
            ("noncemismatcherror: nonce too low", NONCE_MISMATCH_TOO_LOW),
            ("gasusedexceedslimiterror", GAS_ALLOWANCE_EXCEEDED),
            ("transactiongaslimitexceedederror", GAS_LIMIT_EXCEEDS_MAXIMUM),
            ("invalidsendererror", SENDER_NOT_EOA),
            ("blobcountexceedederror", TYPE_3_TX_BLOB_COUNT_EXCEEDED),
            ("blobgaslimitexceedederror", TYPE_3_TX_MAX_BLOB_GAS_ALLOWANCE_EXCEEDED),
            ("noblobdataerror", TYPE_3_TX_ZERO_BLOBS),
            ("invalidblobversionedhasherror", TYPE_3_TX_INVALID_BLOB_VERSIONED_HASH),
            ("emptyauthorizationlisterror", TYPE_4_EMPTY_AUTHORIZATION_LIST),
            ("transactiontypecontractcreationerror", TYPE_4_TX_CONTRACT_CREATION),
            ("transactiontypeerror", TYPE_NOT_SUPPORTED),
        ])
    }

    /// Rules for both evaluators.
    pub fn all() -> Self {
        let mut mapper = Self::geth();
        mapper.rules.extend(Self::eels().rules);
        mapper
    }

    fn from_rules<const N: usize>(rules: [(&str, TransactionException); N]) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(needle, exception)| (needle.to_owned(), exception.into()))
                .collect(),
        }
    }

    /// Adds a rule that takes precedence over the existing ones.
    pub fn with_rule(mut self, needle: impl Into<String>, exception: impl Into<Exception>) -> Self {
        self.rules
            .insert(0, (needle.into().to_lowercase(), exception.into()));
        self
    }

    /// Exception for an evaluator message, `None` when no rule matches.
    pub fn map(&self, message: &str) -> Option<Exception> {
        let message = message.to_lowercase();
        self.rules
            .iter()
            .find(|(needle, _)| message.contains(needle.as_str()))
            .map(|(_, exception)| *exception)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if the mapper has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use specs::BlockException;

    #[rstest]
    #[case("insufficient funds for gas * price + value: address 0xa94f have 0 want 21000", TransactionException::INSUFFICIENT_ACCOUNT_FUNDS)]
    #[case("intrinsic gas too low: have 20999, want 21000", TransactionException::INTRINSIC_GAS_TOO_LOW)]
    #[case("nonce too high: address 0xa94f, tx: 5 state: 0", TransactionException::NONCE_MISMATCH_TOO_HIGH)]
    #[case("max fee per gas less than block base fee: address 0xa94f, maxFeePerGas: 1, baseFee: 7", TransactionException::INSUFFICIENT_MAX_FEE_PER_GAS)]
    #[case("InsufficientTransactionGasError('Insufficient gas')", TransactionException::INTRINSIC_GAS_TOO_LOW)]
    #[case("NonceMismatchError: nonce too low", TransactionException::NONCE_MISMATCH_TOO_LOW)]
    fn known_messages(#[case] message: &str, #[case] expected: TransactionException) {
        assert_eq!(ExceptionMapper::all().map(message), Some(expected.into()));
    }

    #[test]
    fn unknown_message() {
        assert_eq!(ExceptionMapper::all().map("out of cheese"), None);
        assert_eq!(ExceptionMapper::new().map("intrinsic gas too low"), None);
    }

    #[test]
    fn custom_rules_take_precedence() {
        let mapper = ExceptionMapper::geth().with_rule("Intrinsic Gas", BlockException::GAS_USED_OVERFLOW);
        assert_eq!(
            mapper.map("intrinsic gas too low"),
            Some(BlockException::GAS_USED_OVERFLOW.into())
        );
        assert_eq!(mapper.len(), ExceptionMapper::geth().len() + 1);
    }
}
