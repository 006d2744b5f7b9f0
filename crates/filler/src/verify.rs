//! Subset matching of observed results against expectations.

use primitives::{Address, U256};
use specs::{Alloc, Exception, ExceptionCategory, ExpectedAccount, Expectation};
use std::fmt;

/// Account field compared by [`verify_post`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountField {
    /// Nonce.
    Nonce,
    /// Balance.
    Balance,
    /// Code.
    Code,
}

impl fmt::Display for AccountField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nonce => "nonce",
            Self::Balance => "balance",
            Self::Code => "code",
        })
    }
}

/// Where in a test case an exception was expected or observed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Location {
    /// Block index, blockchain tests only.
    pub block: Option<usize>,
    /// Transaction index within the block.
    pub tx: Option<usize>,
}

impl Location {
    /// The transaction at `tx` of a single-transaction case.
    pub const fn tx(tx: usize) -> Self {
        Self {
            block: None,
            tx: Some(tx),
        }
    }

    /// Block `block` as a whole.
    pub const fn block(block: usize) -> Self {
        Self {
            block: Some(block),
            tx: None,
        }
    }

    /// Transaction `tx` of block `block`.
    pub const fn block_tx(block: usize, tx: usize) -> Self {
        Self {
            block: Some(block),
            tx: Some(tx),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.block, self.tx) {
            (Some(b), Some(t)) => write!(f, "block {b} tx {t}"),
            (Some(b), None) => write!(f, "block {b}"),
            (None, Some(t)) => write!(f, "tx {t}"),
            (None, None) => f.write_str("case"),
        }
    }
}

/// One difference between what a test case expects and what the evaluator
/// produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mismatch {
    /// An expected account does not exist.
    MissingAccount {
        /// The account.
        address: Address,
    },
    /// An account expected to be absent exists.
    UnexpectedAccount {
        /// The account.
        address: Address,
    },
    /// An account field differs.
    Field {
        /// The account.
        address: Address,
        /// Which field.
        field: AccountField,
        /// Expected value.
        expected: String,
        /// Observed value.
        observed: String,
    },
    /// A storage slot differs.
    Storage {
        /// The account.
        address: Address,
        /// Slot.
        key: U256,
        /// Expected value.
        expected: U256,
        /// Observed value, zero when unset.
        observed: U256,
    },
    /// The exception raised is not one of the expected ones.
    ExceptionMismatch {
        /// Where.
        location: Location,
        /// Accepted exceptions.
        expected: ExceptionCategory,
        /// Exception the evaluator message maps to, if any.
        observed: Option<Exception>,
        /// Evaluator message.
        message: String,
    },
    /// Something was rejected although no exception was expected.
    UnexpectedException {
        /// Where.
        location: Location,
        /// Exception the evaluator message maps to, if any.
        observed: Option<Exception>,
        /// Evaluator message.
        message: String,
    },
    /// An exception was expected but nothing was rejected.
    UnexpectedSuccess {
        /// Where.
        location: Location,
        /// Accepted exceptions.
        expected: ExceptionCategory,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAccount { address } => write!(f, "{address}: expected account is missing"),
            Self::UnexpectedAccount { address } => {
                write!(f, "{address}: account expected to be absent exists")
            }
            Self::Field {
                address,
                field,
                expected,
                observed,
            } => write!(f, "{address}: {field} expected {expected}, got {observed}"),
            Self::Storage {
                address,
                key,
                expected,
                observed,
            } => write!(f, "{address}: storage[{key:#x}] expected {expected:#x}, got {observed:#x}"),
            Self::ExceptionMismatch {
                location,
                expected,
                observed,
                message,
            } => match observed {
                Some(observed) => {
                    write!(f, "{location}: expected {expected}, got {observed} ({message})")
                }
                None => write!(f, "{location}: expected {expected}, got unmapped error {message:?}"),
            },
            Self::UnexpectedException {
                location,
                observed,
                message,
            } => match observed {
                Some(observed) => write!(f, "{location}: unexpected {observed} ({message})"),
                None => write!(f, "{location}: unexpected error {message:?}"),
            },
            Self::UnexpectedSuccess { location, expected } => {
                write!(f, "{location}: expected {expected}, but it succeeded")
            }
        }
    }
}

/// Checks `observed` against `expected`. Only what the expectation lists is
/// checked; an empty result means the post-state matches.
pub fn verify_post(expected: &Expectation, observed: &Alloc) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    for (address, expectation) in expected.iter() {
        let address = *address;
        let account = observed.get(&address);
        let expectation = match (expectation, account) {
            (ExpectedAccount::Absent, None) => continue,
            (ExpectedAccount::Absent, Some(_)) => {
                mismatches.push(Mismatch::UnexpectedAccount { address });
                continue;
            }
            (ExpectedAccount::Present(_), None) => {
                mismatches.push(Mismatch::MissingAccount { address });
                continue;
            }
            (ExpectedAccount::Present(expectation), Some(_)) => expectation,
        };
        let Some(account) = account else { continue };

        let mut field = |field, expected: String, observed: String| {
            if expected != observed {
                mismatches.push(Mismatch::Field {
                    address,
                    field,
                    expected,
                    observed,
                });
            }
        };
        if let Some(nonce) = expectation.nonce {
            field(AccountField::Nonce, nonce.to_string(), account.nonce.to_string());
        }
        if let Some(balance) = expectation.balance {
            field(AccountField::Balance, balance.to_string(), account.balance.to_string());
        }
        if let Some(code) = &expectation.code {
            field(AccountField::Code, code.to_string(), account.code.to_string());
        }
        for (key, value) in expectation.storage.iter() {
            let actual = account.storage.get(key);
            if actual != *value {
                mismatches.push(Mismatch::Storage {
                    address,
                    key: *key,
                    expected: *value,
                    observed: actual,
                });
            }
        }
    }
    mismatches
}

/// Compares the outcome of one transaction or block with its expected
/// exception. `rejection` is the evaluator's message together with the
/// exception it maps to.
pub fn verify_exception(
    location: Location,
    expected: Option<&ExceptionCategory>,
    rejection: Option<(&str, Option<Exception>)>,
) -> Option<Mismatch> {
    match (expected, rejection) {
        (None, None) => None,
        (Some(expected), None) => Some(Mismatch::UnexpectedSuccess {
            location,
            expected: expected.clone(),
        }),
        (None, Some((message, observed))) => Some(Mismatch::UnexpectedException {
            location,
            observed,
            message: message.to_string(),
        }),
        (Some(expected), Some((message, observed))) => match observed {
            Some(exception) if expected.matches(&exception) => None,
            observed => Some(Mismatch::ExceptionMismatch {
                location,
                expected: expected.clone(),
                observed,
                message: message.to_string(),
            }),
        },
    }
}
