//! Spec kinds and their per-fork expansion into test cases.

use crate::{
    account::Alloc,
    env::Environment,
    exception::ExceptionCategory,
    expect::Expectation,
    header::BlockHeader,
    transaction::{ResolvedTransaction, Transaction, TransactionError, TxType},
    ResolvedEnvironment,
};
use bytecode::{BytecodeIterator, OpCode};
use core::fmt;
use forks::{Fork, ForkFeatures, ForkId, ForkRegistry, ForkSelector};
use primitives::{constants::DEFAULT_CHAIN_ID, Address, Bytes};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Forks a spec applies to.
///
/// `from` and `until` are inclusive; a missing bound is open. Forks the
/// registry marks as ignored are skipped. When `at_transition_to` is set the
/// spec runs only against the transition forks ending in that fork.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ForkRange {
    /// First fork, inclusive.
    #[serde(default, rename = "validFrom", skip_serializing_if = "Option::is_none")]
    pub from: Option<ForkId>,
    /// Last fork, inclusive.
    #[serde(default, rename = "validUntil", skip_serializing_if = "Option::is_none")]
    pub until: Option<ForkId>,
    /// Select the transitions into this fork instead of single forks.
    #[serde(
        default,
        rename = "validAtTransitionTo",
        skip_serializing_if = "Option::is_none"
    )]
    pub at_transition_to: Option<ForkId>,
}

impl ForkRange {
    /// Every fork from `from` on.
    pub fn since(from: ForkId) -> Self {
        Self {
            from: Some(from),
            ..Default::default()
        }
    }

    /// Every fork in `from..=until`.
    pub fn between(from: ForkId, until: ForkId) -> Self {
        Self {
            from: Some(from),
            until: Some(until),
            at_transition_to: None,
        }
    }

    /// Transitions into `to`.
    pub fn at_transition_to(to: ForkId) -> Self {
        Self {
            at_transition_to: Some(to),
            ..Default::default()
        }
    }

    /// Whether `id` lies within the single-fork bounds.
    pub fn contains(&self, id: ForkId) -> bool {
        self.from.map_or(true, |from| id >= from) && self.until.map_or(true, |until| id <= until)
    }

    /// Selected forks in registry order.
    pub fn select(&self, registry: &ForkRegistry) -> Vec<ForkSelector> {
        if let Some(to) = self.at_transition_to {
            return registry
                .transitions()
                .iter()
                .filter(|t| t.to == to)
                .map(|t| ForkSelector::Transition(*t))
                .collect();
        }
        registry
            .iter()
            .filter(|fork| !fork.is_ignored() && self.contains(fork.id()))
            .map(|fork| ForkSelector::Single(fork.id()))
            .collect()
    }
}

/// Fixture format a test case compiles to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureFormat {
    /// One transaction against one pre-state.
    StateTest,
    /// A chain of blocks on top of a genesis block.
    BlockchainTest,
    /// A single transaction checked without an evaluator.
    TransactionTest,
}

impl FixtureFormat {
    /// Name used in test case ids and fixtures.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StateTest => "state_test",
            Self::BlockchainTest => "blockchain_test",
            Self::TransactionTest => "transaction_test",
        }
    }
}

impl fmt::Display for FixtureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feature used by a spec that a fork lacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnsupportedFeature {
    /// Transaction envelope type.
    TxType(TxType),
    /// Blob fields on a non-blob transaction or fork.
    BlobFields,
    /// EIP-7702 authorization list.
    AuthorizationList,
    /// Beacon chain withdrawals.
    Withdrawals,
    /// An opcode in account code or initcode.
    Opcode {
        /// Account holding the code, `None` for initcode.
        address: Option<Address>,
        /// Offset of the opcode.
        pc: usize,
        /// The opcode.
        opcode: OpCode,
    },
}

impl fmt::Display for UnsupportedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TxType(ty) => write!(f, "transaction type {}", ty.as_u8()),
            Self::BlobFields => f.write_str("blob transaction fields"),
            Self::AuthorizationList => f.write_str("authorization lists"),
            Self::Withdrawals => f.write_str("withdrawals"),
            Self::Opcode {
                address: Some(address),
                pc,
                opcode,
            } => write!(f, "opcode {opcode} at {address}:{pc}"),
            Self::Opcode {
                address: None,
                pc,
                opcode,
            } => write!(f, "opcode {opcode} in initcode at {pc}"),
        }
    }
}

/// A spec's fork range includes a fork that lacks a feature the spec uses.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("fork {fork} does not support {feature}")]
pub struct SpecForkMismatchError {
    /// The fork.
    pub fork: ForkId,
    /// What it lacks.
    pub feature: UnsupportedFeature,
}

/// Errors expanding a spec. Each aborts only the spec it came from.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    /// Feature not available in a selected fork.
    #[error("{spec}: {source}")]
    ForkMismatch {
        /// Spec name.
        spec: String,
        /// The mismatch.
        #[source]
        source: SpecForkMismatchError,
    },
    /// A transaction could not be signed.
    #[error("{spec}: transaction {index}: {source}")]
    Transaction {
        /// Spec name.
        spec: String,
        /// Position of the transaction in the spec.
        index: usize,
        /// The failure.
        #[source]
        source: TransactionError,
    },
    /// The registry has no entry for a fork.
    #[error("{spec}: fork {fork} is not registered")]
    UnknownFork {
        /// Spec name.
        spec: String,
        /// The fork.
        fork: ForkId,
    },
    /// The format cannot be generated for the fork selection.
    #[error("{spec}: {format} cannot run against {fork}")]
    UnsupportedFormat {
        /// Spec name.
        spec: String,
        /// Format.
        format: FixtureFormat,
        /// Fork selection.
        fork: String,
    },
}

/// A single transaction executed in a single block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StateTest {
    /// Block context.
    #[serde(default)]
    pub env: Environment,
    /// Pre-state.
    pub pre: Alloc,
    /// The transaction. Its `expectException` is the expected outcome.
    pub transaction: Transaction,
    /// Expected post-state.
    #[serde(default)]
    pub post: Expectation,
    /// Also generate a one-block blockchain test.
    #[serde(default)]
    pub blockchain: bool,
}

impl StateTest {
    /// The equivalent one-block blockchain test: genesis carries the state
    /// test's gas limit, fees and coinbase, and the single block inherits the
    /// remaining environment.
    pub fn to_blockchain_test(&self) -> BlockchainTest {
        let genesis_environment = Environment {
            gas_limit: self.env.gas_limit,
            base_fee_per_gas: self.env.base_fee_per_gas,
            excess_blob_gas: self.env.excess_blob_gas,
            difficulty: self.env.difficulty,
            prev_randao: self.env.prev_randao,
            ..Default::default()
        };
        let block_env = Environment {
            coinbase: self.env.coinbase,
            difficulty: self.env.difficulty,
            prev_randao: self.env.prev_randao,
            parent_beacon_block_root: self.env.parent_beacon_block_root,
            withdrawals: self.env.withdrawals.clone(),
            extra_data: self.env.extra_data.clone(),
            ..Default::default()
        };
        BlockchainTest {
            genesis_environment,
            pre: self.pre.clone(),
            blocks: vec![Block {
                env: block_env,
                txs: vec![self.transaction.clone()],
                exception: None,
            }],
            post: self.post.clone(),
        }
    }
}

/// One block of a blockchain test.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Block {
    /// Header overrides. Unset values follow from the parent.
    #[serde(default)]
    pub env: Environment,
    /// Transactions in block order.
    #[serde(default)]
    pub txs: Vec<Transaction>,
    /// Exception the block is expected to raise.
    #[serde(default, rename = "expectException")]
    pub exception: Option<ExceptionCategory>,
}

impl Block {
    /// Expected exception of the block itself or of one of its transactions.
    pub fn expected_exception(&self) -> Option<ExceptionCategory> {
        self.exception
            .clone()
            .or_else(|| self.txs.iter().find_map(|tx| tx.error.clone()))
    }
}

/// A chain of blocks on top of a genesis block built from the pre-state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BlockchainTest {
    /// Genesis block context.
    #[serde(default)]
    pub genesis_environment: Environment,
    /// Pre-state, the genesis allocation.
    pub pre: Alloc,
    /// Blocks in chain order.
    pub blocks: Vec<Block>,
    /// Expected post-state after the last valid block.
    #[serde(default)]
    pub post: Expectation,
}

/// A transaction checked for validity without an evaluator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransactionTest {
    /// The transaction. Its `expectException` is the expected outcome.
    pub transaction: Transaction,
}

/// The kind of a spec with its contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpecKind {
    /// See [`StateTest`].
    StateTest(StateTest),
    /// See [`BlockchainTest`].
    BlockchainTest(BlockchainTest),
    /// See [`TransactionTest`].
    TransactionTest(TransactionTest),
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

/// An authored test: pre-state, action and expected outcome, bound to a
/// range of forks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    /// Name, unique within a run.
    pub name: String,
    /// Forks the spec applies to.
    #[serde(default)]
    pub forks: ForkRange,
    /// Chain id used for signing and by the evaluator.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Contents.
    #[serde(flatten)]
    pub kind: SpecKind,
}

impl Spec {
    /// A spec over `forks` with the default chain id.
    pub fn new(name: impl Into<String>, forks: ForkRange, kind: SpecKind) -> Self {
        Self {
            name: name.into(),
            forks,
            chain_id: DEFAULT_CHAIN_ID,
            kind,
        }
    }

    /// Formats the spec compiles to.
    pub fn formats(&self) -> Vec<FixtureFormat> {
        match &self.kind {
            SpecKind::StateTest(test) if test.blockchain => {
                vec![FixtureFormat::StateTest, FixtureFormat::BlockchainTest]
            }
            SpecKind::StateTest(_) => vec![FixtureFormat::StateTest],
            SpecKind::BlockchainTest(_) => vec![FixtureFormat::BlockchainTest],
            SpecKind::TransactionTest(_) => vec![FixtureFormat::TransactionTest],
        }
    }

    /// Expands the spec for one fork selection: one test case per format.
    ///
    /// Every test case owns its own copy of the pre-state. Transitions are
    /// only meaningful for blockchain tests; other formats are skipped for
    /// them.
    pub fn generate(
        &self,
        registry: &ForkRegistry,
        fork: ForkSelector,
    ) -> Result<Vec<TestCase>, SpecError> {
        let mut cases = Vec::new();
        for format in self.formats() {
            let kind = match (&self.kind, format, fork) {
                (_, FixtureFormat::BlockchainTest, _) => {
                    let test = match &self.kind {
                        SpecKind::StateTest(test) => test.to_blockchain_test(),
                        SpecKind::BlockchainTest(test) => test.clone(),
                        SpecKind::TransactionTest(_) => continue,
                    };
                    TestCaseKind::Blockchain(self.expand_blockchain(registry, fork, &test)?)
                }
                (_, _, ForkSelector::Transition(_)) => continue,
                (SpecKind::StateTest(test), FixtureFormat::StateTest, ForkSelector::Single(id)) => {
                    TestCaseKind::State(self.expand_state(self.fork(registry, id)?, test)?)
                }
                (
                    SpecKind::TransactionTest(test),
                    FixtureFormat::TransactionTest,
                    ForkSelector::Single(id),
                ) => TestCaseKind::Transaction(
                    self.expand_transaction(self.fork(registry, id)?, test)?,
                ),
                _ => {
                    return Err(SpecError::UnsupportedFormat {
                        spec: self.name.clone(),
                        format,
                        fork: fork.to_string(),
                    })
                }
            };
            let case = TestCase {
                id: format!("{}[fork_{}-{}]", self.name, fork, format),
                spec: self.name.clone(),
                fork,
                chain_id: self.chain_id,
                kind,
            };
            debug!(id = %case.id, "expanded test case");
            cases.push(case);
        }
        Ok(cases)
    }

    /// Expands the spec for every fork in its range, stopping at the first
    /// error.
    pub fn generate_all(&self, registry: &ForkRegistry) -> Result<Vec<TestCase>, SpecError> {
        let mut cases = Vec::new();
        for fork in self.forks.select(registry) {
            cases.extend(self.generate(registry, fork)?);
        }
        Ok(cases)
    }

    fn fork<'a>(&self, registry: &'a ForkRegistry, id: ForkId) -> Result<&'a Fork, SpecError> {
        registry.get(id).ok_or_else(|| SpecError::UnknownFork {
            spec: self.name.clone(),
            fork: id,
        })
    }

    fn mismatch(&self, fork: &Fork, feature: UnsupportedFeature) -> SpecError {
        SpecError::ForkMismatch {
            spec: self.name.clone(),
            source: SpecForkMismatchError {
                fork: fork.id(),
                feature,
            },
        }
    }

    fn resolve_tx(
        &self,
        index: usize,
        tx: &Transaction,
        fork: &Fork,
        env: &ResolvedEnvironment,
    ) -> Result<ResolvedTransaction, SpecError> {
        tx.resolve(fork, self.chain_id, env)
            .map_err(|source| SpecError::Transaction {
                spec: self.name.clone(),
                index,
                source,
            })
    }

    fn expand_state(&self, fork: &Fork, test: &StateTest) -> Result<StateCase, SpecError> {
        self.check_env(fork, &test.env)?;
        self.check_transaction(fork, &test.transaction)?;
        if !test.transaction.expects_error() {
            self.check_code(fork, &test.pre)?;
        }
        let env = test.env.resolve(fork);
        let tx = self.resolve_tx(0, &test.transaction, fork, &env)?;
        Ok(StateCase {
            env,
            pre: test.pre.clone(),
            tx,
            post: test.post.clone(),
            expected_exception: test.transaction.error.clone(),
        })
    }

    fn expand_transaction(
        &self,
        fork: &Fork,
        test: &TransactionTest,
    ) -> Result<TransactionCase, SpecError> {
        self.check_transaction(fork, &test.transaction)?;
        let env = Environment::default().resolve(fork);
        let tx = self.resolve_tx(0, &test.transaction, fork, &env)?;
        Ok(TransactionCase {
            tx,
            expected_exception: test.transaction.error.clone(),
        })
    }

    /// Builds the genesis header locally and resolves every block's
    /// transactions against an estimated chain in which each parent used
    /// exactly its gas and blob gas targets. Fees then never exceed the
    /// estimate when actual usage stays at or below target.
    fn expand_blockchain(
        &self,
        registry: &ForkRegistry,
        selector: ForkSelector,
        test: &BlockchainTest,
    ) -> Result<BlockchainCase, SpecError> {
        let genesis_fork = self.fork(registry, selector.genesis_fork())?;
        if !test.blocks.iter().any(|b| b.expected_exception().is_some()) {
            self.check_code(genesis_fork, &test.pre)?;
        }
        let genesis_env = test.genesis_environment.resolve(genesis_fork);
        let genesis = BlockHeader::genesis(genesis_fork, &genesis_env, test.pre.state_root());

        let mut blocks = Vec::with_capacity(test.blocks.len());
        let mut parent = genesis.clone();
        let mut index = 0;
        for block in &test.blocks {
            let number = block.env.number.unwrap_or(parent.number + 1);
            let timestamp = block
                .env
                .timestamp
                .unwrap_or(parent.timestamp + crate::env::DEFAULT_BLOCK_TIME);
            let fork = self.fork(registry, selector.fork_at(number, timestamp))?;

            self.check_env(fork, &block.env)?;
            for tx in &block.txs {
                self.check_transaction(fork, tx)?;
            }

            let env = block.env.resolve_child(fork, &parent);
            let mut txs = Vec::with_capacity(block.txs.len());
            for tx in &block.txs {
                txs.push(self.resolve_tx(index, tx, fork, &env)?);
                index += 1;
            }
            parent = estimated_header(fork, &env, &parent);
            blocks.push(BlockCase {
                env: block.env.clone(),
                txs,
                exception: block.expected_exception(),
            });
        }

        Ok(BlockchainCase {
            genesis,
            pre: test.pre.clone(),
            blocks,
            post: test.post.clone(),
        })
    }

    fn check_env(&self, fork: &Fork, env: &Environment) -> Result<(), SpecError> {
        if env.withdrawals.is_some() && !fork.supports(ForkFeatures::WITHDRAWALS) {
            return Err(self.mismatch(fork, UnsupportedFeature::Withdrawals));
        }
        Ok(())
    }

    /// Transactions that expect an error may use anything.
    fn check_transaction(&self, fork: &Fork, tx: &Transaction) -> Result<(), SpecError> {
        if tx.expects_error() {
            return Ok(());
        }
        let ty = tx.tx_type();
        if !fork.supports_tx_type(ty.as_u8()) {
            return Err(self.mismatch(fork, UnsupportedFeature::TxType(ty)));
        }
        if (tx.blob_versioned_hashes.is_some() || tx.max_fee_per_blob_gas.is_some())
            && (ty != TxType::Blob || !fork.supports(ForkFeatures::BLOBS))
        {
            return Err(self.mismatch(fork, UnsupportedFeature::BlobFields));
        }
        if tx.authorization_list.is_some()
            && (ty != TxType::SetCode || !fork.supports(ForkFeatures::SET_CODE))
        {
            return Err(self.mismatch(fork, UnsupportedFeature::AuthorizationList));
        }
        if tx.to.is_none() {
            check_opcodes(fork, None, &tx.data).map_err(|f| self.mismatch(fork, f))?;
        }
        Ok(())
    }

    fn check_code(&self, fork: &Fork, pre: &Alloc) -> Result<(), SpecError> {
        for (address, account) in pre {
            check_opcodes(fork, Some(*address), &account.code)
                .map_err(|f| self.mismatch(fork, f))?;
        }
        Ok(())
    }
}

/// Flags the first opcode that is defined but not active in `fork`.
/// Undefined bytes are left alone since malformed code is a valid test input.
fn check_opcodes(
    fork: &Fork,
    address: Option<Address>,
    code: &Bytes,
) -> Result<(), UnsupportedFeature> {
    for instruction in BytecodeIterator::new(code) {
        if let (Some(opcode), Ok(None)) = (instruction.op(), fork.opcode(instruction.opcode)) {
            return Err(UnsupportedFeature::Opcode {
                address,
                pc: instruction.pc,
                opcode,
            });
        }
    }
    Ok(())
}

/// Header of a block built from `env` that used exactly its gas and blob
/// gas targets.
fn estimated_header(fork: &Fork, env: &ResolvedEnvironment, parent: &BlockHeader) -> BlockHeader {
    BlockHeader {
        parent_hash: parent.hash(),
        coinbase: env.current_coinbase,
        difficulty: env.current_difficulty.unwrap_or_default(),
        number: env.current_number,
        gas_limit: env.current_gas_limit,
        gas_used: env.current_gas_limit / forks::fee::ELASTICITY_MULTIPLIER,
        timestamp: env.current_timestamp,
        mix_hash: env.current_random.unwrap_or_default(),
        base_fee_per_gas: env.current_base_fee,
        blob_gas_used: fork.blobs().map(|b| b.target_blob_gas_per_block()),
        ..BlockHeader::default()
    }
    .with_fork_fields(fork, env)
}

/// One fork-specific expansion of a spec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    /// `<spec>[fork_<fork>-<format>]`.
    pub id: String,
    /// Name of the spec it came from.
    pub spec: String,
    /// Fork selection.
    pub fork: ForkSelector,
    /// Chain id.
    pub chain_id: u64,
    /// Contents.
    pub kind: TestCaseKind,
}

impl TestCase {
    /// Fixture format of the case.
    pub fn format(&self) -> FixtureFormat {
        match self.kind {
            TestCaseKind::State(_) => FixtureFormat::StateTest,
            TestCaseKind::Blockchain(_) => FixtureFormat::BlockchainTest,
            TestCaseKind::Transaction(_) => FixtureFormat::TransactionTest,
        }
    }
}

/// Contents of a test case, by format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestCaseKind {
    /// State test.
    State(StateCase),
    /// Blockchain test.
    Blockchain(BlockchainCase),
    /// Transaction test.
    Transaction(TransactionCase),
}

/// A resolved state test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateCase {
    /// Block context.
    pub env: ResolvedEnvironment,
    /// Pre-state.
    pub pre: Alloc,
    /// Signed transaction.
    pub tx: ResolvedTransaction,
    /// Expected post-state.
    pub post: Expectation,
    /// Expected transaction exception.
    pub expected_exception: Option<ExceptionCategory>,
}

/// A resolved blockchain test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockchainCase {
    /// Genesis header.
    pub genesis: BlockHeader,
    /// Genesis allocation.
    pub pre: Alloc,
    /// Blocks in chain order.
    pub blocks: Vec<BlockCase>,
    /// Expected post-state.
    pub post: Expectation,
}

/// A block with signed transactions. The environment stays unresolved
/// because it depends on the executed parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockCase {
    /// Header overrides.
    pub env: Environment,
    /// Signed transactions.
    pub txs: Vec<ResolvedTransaction>,
    /// Expected block or transaction exception.
    pub exception: Option<ExceptionCategory>,
}

/// A resolved transaction test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionCase {
    /// Signed transaction.
    pub tx: ResolvedTransaction,
    /// Expected exception.
    pub expected_exception: Option<ExceptionCategory>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{account::Account, authorization::AuthorizationTuple, expect::ExpectedAccount};
    use bytecode::bytecode;
    use primitives::{
        address,
        constants::{DEFAULT_RECIPIENT, TEST_SENDER},
        hardfork::ForkId::*,
        U256,
    };

    fn registry() -> &'static ForkRegistry {
        ForkRegistry::mainnet()
    }

    fn transfer() -> StateTest {
        StateTest {
            pre: Alloc::new().with(TEST_SENDER, Account::with_balance(U256::from(10u64.pow(18)))),
            transaction: Transaction {
                value: U256::from(10),
                ..Default::default()
            },
            post: Expectation::new().with(DEFAULT_RECIPIENT, ExpectedAccount::balance(U256::from(10))),
            ..Default::default()
        }
    }

    #[test]
    fn range_selection_skips_ignored_forks() {
        let forks = ForkRange::between(BYZANTIUM, ISTANBUL).select(registry());
        let names: Vec<_> = forks.iter().map(ForkSelector::name).collect();
        assert!(!names.contains(&"Constantinople"));
        assert_eq!(forks.first(), Some(&ForkSelector::Single(BYZANTIUM)));
        assert_eq!(forks.last(), Some(&ForkSelector::Single(ISTANBUL)));
    }

    #[test]
    fn transition_selection() {
        let forks = ForkRange::at_transition_to(CANCUN).select(registry());
        assert_eq!(forks.len(), 1);
        assert_eq!(forks[0].name(), "ShanghaiToCancunAtTime15k");
    }

    #[test]
    fn three_forks_three_cases() {
        let spec = Spec::new(
            "transfer",
            ForkRange::between(SHANGHAI, PRAGUE),
            SpecKind::StateTest(transfer()),
        );
        let cases = spec.generate_all(registry()).unwrap();
        assert_eq!(cases.len(), 3);
        assert_eq!(cases[0].id, "transfer[fork_Shanghai-state_test]");
        assert!(cases.iter().all(|c| c.format() == FixtureFormat::StateTest));
    }

    #[test]
    fn state_test_can_also_produce_blockchain_case() {
        let spec = Spec::new(
            "transfer",
            ForkRange::between(CANCUN, CANCUN),
            SpecKind::StateTest(StateTest {
                blockchain: true,
                ..transfer()
            }),
        );
        let cases = spec.generate_all(registry()).unwrap();
        let formats: Vec<_> = cases.iter().map(TestCase::format).collect();
        assert_eq!(
            formats,
            [FixtureFormat::StateTest, FixtureFormat::BlockchainTest]
        );
        let TestCaseKind::Blockchain(chain) = &cases[1].kind else {
            panic!("expected a blockchain case");
        };
        assert_eq!(chain.blocks.len(), 1);
        assert_eq!(chain.genesis.state_root, chain.pre.state_root());
    }

    #[test]
    fn pre_state_is_copied_per_case() {
        let spec = Spec::new(
            "transfer",
            ForkRange::between(SHANGHAI, CANCUN),
            SpecKind::StateTest(transfer()),
        );
        let mut cases = spec.generate_all(registry()).unwrap();
        let TestCaseKind::State(first) = &mut cases[0].kind else {
            panic!("expected a state case");
        };
        first
            .pre
            .get_mut(&TEST_SENDER)
            .unwrap()
            .balance = U256::ZERO;
        let TestCaseKind::State(second) = &cases[1].kind else {
            panic!("expected a state case");
        };
        assert_eq!(
            second.pre.get(&TEST_SENDER).unwrap().balance,
            U256::from(10u64.pow(18))
        );
    }

    #[test]
    fn access_list_before_berlin_is_a_mismatch() {
        let spec = Spec::new(
            "access_list",
            ForkRange::between(ISTANBUL, BERLIN),
            SpecKind::StateTest(StateTest {
                transaction: Transaction {
                    access_list: Some(vec![]),
                    ..Default::default()
                },
                ..transfer()
            }),
        );
        let err = spec.generate_all(registry()).unwrap_err();
        assert_eq!(
            err,
            SpecError::ForkMismatch {
                spec: "access_list".into(),
                source: SpecForkMismatchError {
                    fork: ISTANBUL,
                    feature: UnsupportedFeature::TxType(TxType::AccessList),
                },
            }
        );
    }

    #[test]
    fn expected_error_may_use_unsupported_features() {
        let spec = Spec::new(
            "set_code_pre_fork",
            ForkRange::between(CANCUN, CANCUN),
            SpecKind::StateTest(StateTest {
                transaction: Transaction {
                    authorization_list: Some(vec![AuthorizationTuple::new(1, Address::ZERO, 0)]),
                    error: Some("TransactionException.TYPE_4_TX_PRE_FORK".parse().unwrap()),
                    ..Default::default()
                },
                ..transfer()
            }),
        );
        assert_eq!(spec.generate_all(registry()).unwrap().len(), 1);
    }

    #[test]
    fn inactive_opcode_in_code_is_a_mismatch() {
        let contract = address!("0000000000000000000000000000000000001000");
        let mut test = transfer();
        test.pre
            .insert(contract, Account::with_code(bytecode! { PUSH0 STOP }.into_bytes()));
        let spec = Spec::new(
            "push0",
            ForkRange::between(PARIS, SHANGHAI),
            SpecKind::StateTest(test),
        );
        let Err(SpecError::ForkMismatch { source, .. }) = spec.generate_all(registry()) else {
            panic!("expected a fork mismatch");
        };
        assert_eq!(source.fork, PARIS);
        assert!(matches!(
            source.feature,
            UnsupportedFeature::Opcode { address: Some(a), pc: 0, .. } if a == contract
        ));
    }

    #[test]
    fn withdrawals_before_shanghai_are_a_mismatch() {
        let spec = Spec::new(
            "withdrawals",
            ForkRange::between(PARIS, PARIS),
            SpecKind::BlockchainTest(BlockchainTest {
                pre: Alloc::new(),
                blocks: vec![Block {
                    env: Environment {
                        withdrawals: Some(vec![]),
                        ..Default::default()
                    },
                    ..Default::default()
                }],
                ..Default::default()
            }),
        );
        assert!(matches!(
            spec.generate_all(registry()),
            Err(SpecError::ForkMismatch { source: SpecForkMismatchError { feature: UnsupportedFeature::Withdrawals, .. }, .. })
        ));
    }

    #[test]
    fn transition_blocks_use_the_fork_at_their_timestamp() {
        let spec = Spec::new(
            "transition",
            ForkRange::at_transition_to(CANCUN),
            SpecKind::BlockchainTest(BlockchainTest {
                pre: transfer().pre,
                blocks: vec![
                    Block::default(),
                    Block {
                        env: Environment {
                            timestamp: Some(15_000),
                            ..Default::default()
                        },
                        txs: vec![Transaction {
                            blob_versioned_hashes: Some(vec![primitives::B256::with_last_byte(1)]),
                            ..Default::default()
                        }],
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
        );
        let cases = spec.generate_all(registry()).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].id, "transition[fork_ShanghaiToCancunAtTime15k-blockchain_test]");
        let TestCaseKind::Blockchain(chain) = &cases[0].kind else {
            panic!("expected a blockchain case");
        };
        assert_eq!(chain.genesis.excess_blob_gas, None);
        assert_eq!(chain.blocks[1].txs[0].tx_type, TxType::Blob);
    }

    #[test]
    fn spec_json() {
        let spec: Spec = serde_json::from_str(
            r#"{
                "name": "simple_transfer",
                "type": "state_test",
                "forks": { "validFrom": "Cancun" },
                "pre": { "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b": { "balance": "0x0de0b6b3a7640000" } },
                "transaction": { "value": "0x0a" },
                "post": { "0x00000000000000000000000000000000000000aa": { "balance": "0x0a" } }
            }"#,
        )
        .unwrap();
        assert_eq!(spec.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(spec.forks, ForkRange::since(CANCUN));
        assert!(matches!(spec.kind, SpecKind::StateTest(_)));
    }
}
