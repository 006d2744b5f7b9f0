//! Compilation of one test case into a sealed fixture.
//!
//! Each stage is its own type and consumes the previous one:
//!
//! ```text
//! Pending --execute--> Executed --verify--> Verified --seal--> Sealed
//!                                      \--> Rejected
//! ```
//!
//! Only a [`Verified`] case can be sealed, so a fixture whose post-state or
//! exceptions disagree with the test case never gets a content hash.

use crate::{
    verify::{verify_exception, verify_post, Location},
    FillError, Mismatch,
};
use fixtures::{
    BlockchainConfig, BlockchainFixture, Fixture, FixtureBlock, FixtureEntry, FixtureTransaction,
    StateConfig, StateFixture, StatePost, TransactionFixture, TransactionResult, TxIndexes,
    blockchain::SEAL_ENGINE,
};
use forks::{Fork, ForkFeatures, ForkRegistry};
use primitives::{Address, ForkId, B256, U256};
use specs::{
    env::DEFAULT_BLOCK_TIME,
    header::{encode_block, transactions_root},
    Alloc, BlockHeader, BlockchainCase, Environment, Exception, ExceptionCategory,
    ExpectedAccount, Expectation, StateCase, TestCase, TestCaseKind, TransactionCase,
};
use std::{collections::BTreeMap, fmt};
use t8n::{CancelToken, ExceptionMapper, RejectedTx, T8nOutput, T8nRequest, TransitionTool};
use tracing::{debug, trace};

/// Name recorded as the filler of transaction tests, which are checked
/// without an evaluator.
pub const LOCAL_VALIDATOR: &str = concat!("ethfill-filler/", env!("CARGO_PKG_VERSION"));

/// What a compilation needs besides the case itself.
#[derive(Clone, Copy)]
pub struct FillContext<'a> {
    /// Evaluator.
    pub tool: &'a dyn TransitionTool,
    /// Maps evaluator messages to exceptions.
    pub mapper: &'a ExceptionMapper,
    /// Forks.
    pub registry: &'a ForkRegistry,
    /// Stops the compilation at the next stage boundary.
    pub cancel: &'a CancelToken,
}

impl fmt::Debug for FillContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillContext")
            .field("tool", &self.tool.name())
            .field("mapper", &self.mapper)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl<'a> FillContext<'a> {
    fn fork(&self, case: &TestCase, id: ForkId) -> Result<&'a Fork, FillError> {
        self.registry.get(id).ok_or_else(|| FillError::UnknownFork {
            case: case.id.clone(),
            fork: id,
        })
    }

    fn check_cancelled(&self) -> Result<(), FillError> {
        if self.cancel.is_cancelled() {
            return Err(FillError::Cancelled);
        }
        Ok(())
    }

    fn evaluate(&self, case: &TestCase, request: &T8nRequest) -> Result<T8nOutput, FillError> {
        self.check_cancelled()?;
        trace!(id = %case.id, fork = %request.fork, txs = request.txs.len(), "evaluating");
        self.tool
            .evaluate(request, self.cancel)
            .map_err(|source| FillError::tool(&case.id, source))
    }

    /// State root of the returned alloc. When the evaluator computes roots
    /// itself, its answer must agree with the alloc it returned.
    fn state_root(&self, case: &TestCase, output: &T8nOutput) -> Result<B256, FillError> {
        let local = output.alloc.state_root();
        if self.tool.computes_state_root() && local != output.result.state_root {
            return Err(FillError::Malformed {
                case: case.id.clone(),
                reason: format!(
                    "reported state root {} but the returned alloc hashes to {local}",
                    output.result.state_root
                ),
            });
        }
        Ok(local)
    }

    fn rejection(&self, rejected: &RejectedTx) -> Rejection {
        Rejection {
            message: rejected.error.clone(),
            exception: self.mapper.map(&rejected.error),
        }
    }
}

/// A rejection as reported, with the exception it maps to.
#[derive(Clone, Debug)]
struct Rejection {
    message: String,
    exception: Option<Exception>,
}

/// One expected-exception comparison, evaluated in [`Executed::verify`].
#[derive(Clone, Debug)]
struct ExceptionCheck {
    location: Location,
    expected: Option<ExceptionCategory>,
    rejection: Option<Rejection>,
}

impl ExceptionCheck {
    fn run(&self) -> Option<Mismatch> {
        verify_exception(
            self.location,
            self.expected.as_ref(),
            self.rejection
                .as_ref()
                .map(|r| (r.message.as_str(), r.exception)),
        )
    }
}

/// Slots the expectation reads, for evaluators that cannot list storage.
fn watched(post: &Expectation) -> BTreeMap<Address, Vec<U256>> {
    post.iter()
        .filter_map(|(address, account)| match account {
            ExpectedAccount::Present(fields) if !fields.storage.is_empty() => {
                Some((*address, fields.storage.iter().map(|(k, _)| *k).collect()))
            }
            _ => None,
        })
        .collect()
}

/// A test case that has not been evaluated yet.
#[derive(Debug)]
pub struct Pending {
    case: TestCase,
}

impl Pending {
    /// Wraps `case`.
    pub fn new(case: TestCase) -> Self {
        Self { case }
    }

    /// The test case.
    pub fn case(&self) -> &TestCase {
        &self.case
    }

    /// Runs the case through the evaluator, one call per block.
    pub fn execute(self, ctx: &FillContext<'_>) -> Result<Executed, FillError> {
        ctx.check_cancelled()?;
        let executed = match &self.case.kind {
            TestCaseKind::State(state) => execute_state(&self.case, state, ctx)?,
            TestCaseKind::Blockchain(chain) => execute_blockchain(&self.case, chain, ctx)?,
            TestCaseKind::Transaction(tx) => execute_transaction(&self.case, tx, ctx)?,
        };
        debug!(id = %self.case.id, checks = executed.checks.len(), "executed");
        Ok(executed)
    }
}

/// A test case with the evaluator's results, not yet compared with the
/// expectations.
#[derive(Debug)]
pub struct Executed {
    case: TestCase,
    fixture: Fixture,
    filled_by: String,
    expected: Expectation,
    post: Alloc,
    checks: Vec<ExceptionCheck>,
}

impl Executed {
    /// The test case.
    pub fn case(&self) -> &TestCase {
        &self.case
    }

    /// The fixture that will be sealed if verification passes.
    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    /// Final post-state reported by the evaluator.
    pub fn post(&self) -> &Alloc {
        &self.post
    }

    /// Compares exceptions and the post-state with the expectations.
    pub fn verify(self) -> Verification {
        let mut mismatches: Vec<Mismatch> =
            self.checks.iter().filter_map(ExceptionCheck::run).collect();
        mismatches.extend(verify_post(&self.expected, &self.post));

        if mismatches.is_empty() {
            debug!(id = %self.case.id, "verified");
            Verification::Verified(Verified {
                case: self.case,
                fixture: self.fixture,
                filled_by: self.filled_by,
            })
        } else {
            debug!(id = %self.case.id, mismatches = mismatches.len(), "rejected");
            Verification::Rejected(Rejected {
                case_id: self.case.id,
                mismatches,
            })
        }
    }
}

/// Outcome of [`Executed::verify`].
#[derive(Debug)]
pub enum Verification {
    /// Everything matched.
    Verified(Verified),
    /// At least one mismatch.
    Rejected(Rejected),
}

/// A test case whose results match its expectations.
#[derive(Debug)]
pub struct Verified {
    case: TestCase,
    fixture: Fixture,
    filled_by: String,
}

impl Verified {
    /// The test case.
    pub fn case(&self) -> &TestCase {
        &self.case
    }

    /// Hashes the fixture. Fails with [`FillError::Cancelled`] if `cancel`
    /// has fired, so an interrupted run never seals anything.
    pub fn seal(self, cancel: &CancelToken) -> Result<Sealed, FillError> {
        if cancel.is_cancelled() {
            return Err(FillError::Cancelled);
        }
        let entry = FixtureEntry::seal(
            self.fixture,
            self.case.id.as_str(),
            self.case.fork.to_string(),
            self.filled_by,
        )?;
        debug!(id = %self.case.id, hash = %entry.hash(), "sealed");
        Ok(Sealed { entry })
    }
}

/// A sealed fixture, ready to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sealed {
    entry: FixtureEntry,
}

impl Sealed {
    /// The entry.
    pub fn entry(&self) -> &FixtureEntry {
        &self.entry
    }

    /// Content hash.
    pub fn hash(&self) -> B256 {
        self.entry.hash()
    }

    /// Takes the entry.
    pub fn into_entry(self) -> FixtureEntry {
        self.entry
    }
}

/// A test case whose results contradict its expectations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejected {
    case_id: String,
    mismatches: Vec<Mismatch>,
}

impl Rejected {
    /// Test case id.
    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    /// Every difference found. Never empty.
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rejected:", self.case_id)?;
        for mismatch in &self.mismatches {
            write!(f, "\n  {mismatch}")?;
        }
        Ok(())
    }
}

/// Result of [`fill`].
#[derive(Debug)]
pub enum Filled {
    /// The case produced a fixture.
    Sealed(Sealed),
    /// The case disagrees with the evaluator.
    Rejected(Rejected),
}

/// Runs `case` through every stage.
pub fn fill(case: TestCase, ctx: &FillContext<'_>) -> Result<Filled, FillError> {
    match Pending::new(case).execute(ctx)?.verify() {
        Verification::Verified(verified) => Ok(Filled::Sealed(verified.seal(ctx.cancel)?)),
        Verification::Rejected(rejected) => Ok(Filled::Rejected(rejected)),
    }
}

fn execute_state(
    case: &TestCase,
    state: &StateCase,
    ctx: &FillContext<'_>,
) -> Result<Executed, FillError> {
    let fork = ctx.fork(case, case.fork.latest())?;
    let request = T8nRequest {
        case_id: case.id.clone(),
        fork: fork.t8n_name().to_string(),
        chain_id: case.chain_id,
        reward: None,
        alloc: state.pre.clone(),
        env: state.env.clone(),
        txs: vec![state.tx.clone()],
        watched: watched(&state.post),
    };
    let output = ctx.evaluate(case, &request)?;
    let state_root = ctx.state_root(case, &output)?;

    let check = ExceptionCheck {
        location: Location::tx(0),
        expected: state.expected_exception.clone(),
        rejection: output.rejection(0).map(|r| ctx.rejection(r)),
    };
    let post = StatePost {
        hash: state_root,
        logs: output.result.logs_hash,
        txbytes: state.tx.encoded.clone(),
        indexes: TxIndexes::default(),
        state: output.alloc.clone(),
        expect_exception: state.expected_exception.clone(),
    };
    let fixture = StateFixture {
        env: state.env.clone(),
        pre: state.pre.clone(),
        transaction: (&state.tx).into(),
        post: [(fork.name().to_string(), vec![post])].into(),
        config: StateConfig {
            chainid: case.chain_id,
        },
    };

    Ok(Executed {
        case: case.clone(),
        fixture: fixture.into(),
        filled_by: ctx.tool.name(),
        expected: state.post.clone(),
        post: output.alloc,
        checks: vec![check],
    })
}

fn execute_blockchain(
    case: &TestCase,
    chain: &BlockchainCase,
    ctx: &FillContext<'_>,
) -> Result<Executed, FillError> {
    let genesis_fork = ctx.fork(case, case.fork.genesis_fork())?;
    let watched = watched(&chain.post);

    let mut alloc = chain.pre.clone();
    let mut parent = chain.genesis.clone();
    let mut hashes = BTreeMap::new();
    let mut blocks = Vec::with_capacity(chain.blocks.len());
    let mut checks = Vec::new();

    for (i, block) in chain.blocks.iter().enumerate() {
        let mut authored: Environment = block.env.clone();
        for (number, hash) in &hashes {
            authored.block_hashes.entry(*number).or_insert(*hash);
        }
        let number = authored.number.unwrap_or(parent.number + 1);
        let timestamp = authored
            .timestamp
            .unwrap_or(parent.timestamp + DEFAULT_BLOCK_TIME);
        let fork = ctx.fork(case, case.fork.fork_at(number, timestamp))?;
        let env = authored.resolve_child(fork, &parent);

        let request = T8nRequest {
            case_id: case.id.clone(),
            fork: fork.t8n_name().to_string(),
            chain_id: case.chain_id,
            reward: Some(fork.block_reward()),
            alloc: alloc.clone(),
            env: env.clone(),
            txs: block.txs.clone(),
            watched: watched.clone(),
        };
        let output = ctx.evaluate(case, &request)?;
        let state_root = ctx.state_root(case, &output)?;

        match &block.exception {
            Some(expected) => {
                let first = output.result.rejected.iter().min_by_key(|r| r.index);
                // Block-level exceptions are not observable through the
                // evaluator, so a block without rejected transactions is
                // taken as declared.
                if first.is_some() || !expected.has_block_exception() {
                    checks.push(ExceptionCheck {
                        location: first
                            .map_or(Location::block(i), |r| Location::block_tx(i, r.index)),
                        expected: Some(expected.clone()),
                        rejection: first.map(|r| ctx.rejection(r)),
                    });
                }
            }
            None => checks.extend(output.result.rejected.iter().map(|r| ExceptionCheck {
                location: Location::block_tx(i, r.index),
                expected: None,
                rejection: Some(ctx.rejection(r)),
            })),
        }

        let header = BlockHeader {
            parent_hash: parent.hash(),
            coinbase: env.current_coinbase,
            state_root,
            transactions_trie: transactions_root(&block.txs),
            receipt_trie: output.result.receipts_root,
            bloom: output.result.logs_bloom,
            difficulty: output
                .result
                .difficulty
                .or(env.current_difficulty)
                .unwrap_or_default(),
            number: env.current_number,
            gas_limit: env.current_gas_limit,
            gas_used: output.result.gas_used,
            timestamp: env.current_timestamp,
            extra_data: env.extra_data.clone(),
            mix_hash: env.current_random.unwrap_or_default(),
            base_fee_per_gas: env.current_base_fee,
            withdrawals_root: output.result.withdrawals_root,
            blob_gas_used: output.result.blob_gas_used,
            requests_hash: output.result.requests_hash,
            ..BlockHeader::default()
        }
        .with_fork_fields(fork, &env);

        let withdrawals = env.withdrawals.clone();
        blocks.push(FixtureBlock {
            rlp: encode_block(&header, &block.txs, withdrawals.as_deref()),
            block_header: header.clone().into(),
            transactions: block.txs.iter().map(FixtureTransaction::from).collect(),
            uncle_headers: Vec::new(),
            withdrawals,
            expect_exception: block.exception.clone(),
        });
        trace!(id = %case.id, block = i, fork = %fork.name(), invalid = block.exception.is_some(), "built block");

        if block.exception.is_none() {
            alloc = output.alloc;
            hashes.insert(parent.number, parent.hash());
            parent = header;
        }
        ctx.check_cancelled()?;
    }

    let genesis_withdrawals = genesis_fork
        .supports(ForkFeatures::WITHDRAWALS)
        .then_some(&[][..]);
    let network = case.fork.name().to_string();
    let fixture = BlockchainFixture {
        network: network.clone(),
        genesis_block_header: chain.genesis.clone().into(),
        genesis_rlp: encode_block(&chain.genesis, &[], genesis_withdrawals),
        blocks,
        lastblockhash: parent.hash(),
        pre: chain.pre.clone(),
        post_state: alloc.clone(),
        seal_engine: SEAL_ENGINE.to_string(),
        config: BlockchainConfig {
            network,
            chainid: case.chain_id,
        },
    };

    Ok(Executed {
        case: case.clone(),
        fixture: fixture.into(),
        filled_by: ctx.tool.name(),
        expected: chain.post.clone(),
        post: alloc,
        checks,
    })
}

/// Transaction tests only check static validity, which is decided locally.
fn execute_transaction(
    case: &TestCase,
    test: &TransactionCase,
    ctx: &FillContext<'_>,
) -> Result<Executed, FillError> {
    let fork = ctx.fork(case, case.fork.latest())?;
    let env = Environment::default().resolve(fork);
    let tx = &test.tx;
    let exception = tx.validate(fork, &env).map(Exception::from);

    let result = match exception {
        Some(exception) => TransactionResult::invalid(
            test.expected_exception
                .clone()
                .unwrap_or_else(|| ExceptionCategory::single(exception)),
        ),
        None => TransactionResult::valid(tx.hash, tx.sender, tx.intrinsic_gas(fork)),
    };
    let check = ExceptionCheck {
        location: Location::tx(0),
        expected: test.expected_exception.clone(),
        rejection: exception.map(|exception| Rejection {
            message: exception.to_string(),
            exception: Some(exception),
        }),
    };
    let fixture = TransactionFixture {
        txbytes: tx.encoded.clone(),
        result: [(fork.name().to_string(), result)].into(),
    };

    Ok(Executed {
        case: case.clone(),
        fixture: fixture.into(),
        filled_by: LOCAL_VALIDATOR.to_string(),
        expected: Expectation::new(),
        post: Alloc::new(),
        checks: vec![check],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::address;

    #[test]
    fn watched_slots_come_from_present_accounts() {
        let a = address!("00000000000000000000000000000000000000aa");
        let b = address!("00000000000000000000000000000000000000bb");
        let c = address!("00000000000000000000000000000000000000cc");
        let post = Expectation::new()
            .with(a, ExpectedAccount::nonce(1).with_storage(U256::from(3), U256::from(1)))
            .with(b, ExpectedAccount::Absent)
            .with(c, ExpectedAccount::nonce(0));
        let watched = watched(&post);
        assert_eq!(watched.len(), 1);
        assert_eq!(watched[&a], vec![U256::from(3)]);
    }

    #[test]
    fn rejected_lists_every_mismatch() {
        let rejected = Rejected {
            case_id: "t[fork_Cancun-state_test]".into(),
            mismatches: vec![
                Mismatch::MissingAccount {
                    address: Address::ZERO,
                },
                Mismatch::UnexpectedAccount {
                    address: Address::ZERO,
                },
            ],
        };
        let text = rejected.to_string();
        assert!(text.starts_with("t[fork_Cancun-state_test] rejected:"));
        assert_eq!(text.lines().count(), 3);
    }
}
