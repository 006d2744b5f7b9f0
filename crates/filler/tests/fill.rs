mod common;

use bytecode::Bytecode;
use common::{wei, ScriptedTool};
use ethfill_filler::{
    compiler::LOCAL_VALIDATOR, fill, AccountField, FillContext, FillError, Filled, Location,
    Mismatch, Runner, RunnerConfig,
};
use fixtures::{Fixture, FixtureContainer, FixtureEntry, FixtureWriter};
use forks::ForkRegistry;
use primitives::{address, constants::TEST_SENDER, Address, Bytes, ForkId::*, B256};
use specs::{
    Account, Alloc, Block, BlockchainTest, Exception, ExceptionCategory, ExpectedAccount, Expectation,
    ForkRange, Spec, SpecKind, StateTest, TestCase, Transaction, TransactionException,
    TransactionTest,
};
use std::collections::BTreeSet;
use t8n::{CancelToken, ExceptionMapper};

const B: Address = address!("00000000000000000000000000000000000000bb");
const C: Address = address!("00000000000000000000000000000000000000cc");

fn transfer(nonce: u64, value: u64) -> Transaction {
    Transaction {
        nonce,
        to: Some(B),
        value: wei(value),
        ..Default::default()
    }
}

fn funded(balance: u64) -> Alloc {
    Alloc::new().with(TEST_SENDER, Account::with_balance(wei(balance)))
}

fn state_spec(forks: ForkRange, test: StateTest) -> Spec {
    Spec::new("transfer", forks, SpecKind::StateTest(test))
}

/// A:100 sends 10 to B, expecting A:90 and B:10.
fn transfer_spec(forks: ForkRange) -> Spec {
    state_spec(
        forks,
        StateTest {
            pre: funded(100),
            transaction: transfer(0, 10),
            post: Expectation::new()
                .with(TEST_SENDER, ExpectedAccount::balance(wei(90)))
                .with(B, ExpectedAccount::balance(wei(10))),
            ..Default::default()
        },
    )
}

fn cases(spec: &Spec) -> Vec<TestCase> {
    spec.generate_all(ForkRegistry::mainnet()).unwrap()
}

fn single_case(spec: &Spec) -> TestCase {
    let mut cases = cases(spec);
    assert_eq!(cases.len(), 1);
    cases.remove(0)
}

fn fill_with(tool: &ScriptedTool, case: TestCase) -> Result<Filled, FillError> {
    let mapper = ExceptionMapper::geth();
    let cancel = CancelToken::new();
    let ctx = FillContext {
        tool,
        mapper: &mapper,
        registry: ForkRegistry::mainnet(),
        cancel: &cancel,
    };
    fill(case, &ctx)
}

fn sealed(filled: Filled) -> FixtureEntry {
    match filled {
        Filled::Sealed(sealed) => sealed.into_entry(),
        Filled::Rejected(rejected) => panic!("{rejected}"),
    }
}

fn mismatches(filled: Filled) -> Vec<Mismatch> {
    match filled {
        Filled::Rejected(rejected) => rejected.mismatches().to_vec(),
        Filled::Sealed(sealed) => panic!("sealed {}", sealed.hash()),
    }
}

#[test]
fn transfer_is_sealed_with_a_stable_hash() {
    let spec = transfer_spec(ForkRange::between(CANCUN, CANCUN));
    let tool = ScriptedTool::new();
    let entry = sealed(fill_with(&tool, single_case(&spec)).unwrap());

    assert_eq!(entry.info().fork, "Cancun");
    assert_eq!(entry.info().test_id, "transfer[fork_Cancun-state_test]");
    assert_eq!(entry.info().filling_transition_tool, "scripted");
    assert!(entry.verify_hash());
    let Fixture::StateTest(fixture) = entry.fixture() else {
        panic!("expected a state test");
    };
    let post = &fixture.post["Cancun"][0];
    assert_eq!(post.state.get(&B).unwrap().balance, wei(10));
    assert_eq!(post.state.get(&TEST_SENDER).unwrap().balance, wei(90));
    assert_eq!(post.hash, post.state.state_root());

    let again = sealed(fill_with(&ScriptedTool::new(), single_case(&spec)).unwrap());
    assert_eq!(again.hash(), entry.hash());
    assert_eq!(again, entry);
}

#[test]
fn insufficient_gas_is_verified_by_its_exception() {
    let spec = state_spec(
        ForkRange::between(CANCUN, CANCUN),
        StateTest {
            pre: funded(100),
            transaction: Transaction {
                gas_limit: Some(20_000),
                error: Some(TransactionException::INTRINSIC_GAS_TOO_LOW.into()),
                ..transfer(0, 10)
            },
            ..Default::default()
        },
    );
    let entry = sealed(fill_with(&ScriptedTool::new(), single_case(&spec)).unwrap());
    let Fixture::StateTest(fixture) = entry.fixture() else {
        panic!("expected a state test");
    };
    let post = &fixture.post["Cancun"][0];
    assert_eq!(
        post.expect_exception,
        Some(ExceptionCategory::single(TransactionException::INTRINSIC_GAS_TOO_LOW))
    );
    assert_eq!(post.state, funded(100));
}

#[test]
fn wrong_exception_is_rejected() {
    let spec = state_spec(
        ForkRange::between(CANCUN, CANCUN),
        StateTest {
            pre: funded(100),
            transaction: Transaction {
                gas_limit: Some(20_000),
                error: Some(TransactionException::NONCE_MISMATCH_TOO_HIGH.into()),
                ..transfer(0, 10)
            },
            ..Default::default()
        },
    );
    let found = mismatches(fill_with(&ScriptedTool::new(), single_case(&spec)).unwrap());
    assert!(matches!(
        found.as_slice(),
        [Mismatch::ExceptionMismatch { location, observed: Some(observed), .. }]
            if *location == Location::tx(0)
                && *observed == Exception::from(TransactionException::INTRINSIC_GAS_TOO_LOW)
    ));
}

#[test]
fn expected_exception_that_never_happens_is_rejected() {
    let spec = state_spec(
        ForkRange::between(CANCUN, CANCUN),
        StateTest {
            pre: funded(100),
            transaction: Transaction {
                error: Some(TransactionException::INSUFFICIENT_ACCOUNT_FUNDS.into()),
                ..transfer(0, 10)
            },
            ..Default::default()
        },
    );
    let found = mismatches(fill_with(&ScriptedTool::new(), single_case(&spec)).unwrap());
    assert!(matches!(found.as_slice(), [Mismatch::UnexpectedSuccess { .. }]));
}

#[test]
fn only_expected_fields_are_compared() {
    let spec = transfer_spec(ForkRange::between(CANCUN, CANCUN));

    let noisy = ScriptedTool::with_hook(|output, _| {
        let b = output.alloc.get_mut(&B).unwrap();
        b.nonce = 7;
        b.code = Bytes::from_static(&[0x00]);
        b.storage.insert(wei(1), wei(1));
        output.alloc.insert(C, Account::with_balance(wei(1)));
        output.result.state_root = output.alloc.state_root();
    });
    sealed(fill_with(&noisy, single_case(&spec)).unwrap());

    let wrong_balance = ScriptedTool::with_hook(|output, _| {
        output.alloc.get_mut(&B).unwrap().balance = wei(11);
        output.result.state_root = output.alloc.state_root();
    });
    assert_eq!(
        mismatches(fill_with(&wrong_balance, single_case(&spec)).unwrap()),
        vec![Mismatch::Field {
            address: B,
            field: AccountField::Balance,
            expected: "10".into(),
            observed: "11".into(),
        }]
    );
}

#[test]
fn inconsistent_state_root_is_an_error() {
    let spec = transfer_spec(ForkRange::between(CANCUN, CANCUN));
    let tool = ScriptedTool::with_hook(|output, _| {
        output.result.state_root = B256::repeat_byte(1);
    });
    assert!(matches!(
        fill_with(&tool, single_case(&spec)),
        Err(FillError::Malformed { .. })
    ));
}

#[test]
fn three_forks_make_three_fixtures() {
    let spec = transfer_spec(ForkRange::between(SHANGHAI, PRAGUE));
    let cases = cases(&spec);
    assert_eq!(cases.len(), 3);

    let tool = ScriptedTool::new();
    let mapper = ExceptionMapper::geth();
    let runner = Runner::new(&tool, &mapper).with_config(RunnerConfig {
        threads: Some(3),
        ..Default::default()
    });
    let mut writer = FixtureWriter::new(Vec::new());
    let summary = runner.run(cases, &mut writer).unwrap();
    writer.finish().unwrap();

    assert!(summary.is_success(), "{summary:?}");
    assert_eq!(summary.sealed, 3);
    let container = FixtureContainer::read_from(writer.into_inner().as_slice()).unwrap();
    assert_eq!(container.len(), 3);
    let forks: BTreeSet<_> = container.iter().map(|e| e.info().fork.clone()).collect();
    assert_eq!(forks, BTreeSet::from(["Cancun", "Prague", "Shanghai"].map(String::from)));

    let evaluated: BTreeSet<_> = tool.requests().into_iter().map(|r| r.fork).collect();
    assert_eq!(evaluated.len(), 3);
}

#[test]
fn malformed_code_reaches_the_evaluator_unchanged() {
    // PUSH32 followed by a single byte
    let code = Bytecode::from_asm("PUSH1 0x01 0x7f01").unwrap();
    assert_eq!(code.as_slice(), &[0x60, 0x01, 0x7f, 0x01]);

    let spec = state_spec(
        ForkRange::between(PRAGUE, PRAGUE),
        StateTest {
            pre: funded(100).with(C, Account::with_code(code.clone())),
            transaction: Transaction {
                to: Some(C),
                ..transfer(0, 1)
            },
            post: Expectation::new().with(C, ExpectedAccount::balance(wei(1))),
            ..Default::default()
        },
    );
    let tool = ScriptedTool::new();
    let entry = sealed(fill_with(&tool, single_case(&spec)).unwrap());

    let requests = tool.requests();
    assert_eq!(requests[0].alloc.get(&C).unwrap().code, code.into_bytes());
    let Fixture::StateTest(fixture) = entry.fixture() else {
        panic!("expected a state test");
    };
    assert_eq!(fixture.pre, requests[0].alloc);
}

#[test]
fn cancellation_prevents_sealing() {
    let spec = transfer_spec(ForkRange::between(SHANGHAI, PRAGUE));
    let tool = ScriptedTool::with_hook(|_, cancel| cancel.cancel());
    let mapper = ExceptionMapper::geth();
    let runner = Runner::new(&tool, &mapper).with_config(RunnerConfig {
        threads: Some(1),
        ..Default::default()
    });
    let mut writer = FixtureWriter::new(Vec::new());
    let summary = runner.run(cases(&spec), &mut writer).unwrap();
    writer.finish().unwrap();

    assert!(runner.cancel_token().is_cancelled());
    assert_eq!(summary.sealed, 0);
    assert_eq!(summary.unfinished, 3);
    assert!(!summary.is_success());
    assert_eq!(tool.requests().len(), 1);
    let container = FixtureContainer::read_from(writer.into_inner().as_slice()).unwrap();
    assert!(container.is_empty());
}

#[test]
fn blockchain_blocks_chain_together() {
    let spec = Spec::new(
        "two_blocks",
        ForkRange::between(CANCUN, CANCUN),
        SpecKind::BlockchainTest(BlockchainTest {
            pre: funded(100),
            blocks: vec![
                Block {
                    txs: vec![transfer(0, 10)],
                    ..Default::default()
                },
                Block {
                    txs: vec![transfer(1, 10)],
                    ..Default::default()
                },
            ],
            post: Expectation::new()
                .with(TEST_SENDER, ExpectedAccount::balance(wei(80)).with_storage(wei(0), wei(0)))
                .with(B, ExpectedAccount::balance(wei(20))),
            ..Default::default()
        }),
    );
    let tool = ScriptedTool::new();
    let entry = sealed(fill_with(&tool, single_case(&spec)).unwrap());
    let Fixture::BlockchainTest(fixture) = entry.fixture() else {
        panic!("expected a blockchain test");
    };

    assert_eq!(fixture.network, "Cancun");
    assert_eq!(fixture.blocks.len(), 2);
    let genesis = &fixture.genesis_block_header;
    let [first, second] = &fixture.blocks[..] else {
        unreachable!()
    };
    assert_eq!(first.block_header.header.parent_hash, genesis.hash);
    assert_eq!(second.block_header.header.parent_hash, first.block_header.hash);
    assert_eq!(second.block_header.header.number, 2);
    assert_eq!(fixture.lastblockhash, second.block_header.hash);
    assert_eq!(fixture.post_state.get(&B).unwrap().balance, wei(20));

    let requests = tool.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.reward.is_some()));
    assert!(requests[1].watched.contains_key(&TEST_SENDER));
    assert_eq!(requests[1].env.block_hashes.get(&0), Some(&genesis.hash));
    assert_eq!(requests[1].env.block_hashes.get(&1), Some(&first.block_header.hash));
}

#[test]
fn invalid_block_does_not_advance_the_chain() {
    let spec = Spec::new(
        "invalid_second_block",
        ForkRange::between(CANCUN, CANCUN),
        SpecKind::BlockchainTest(BlockchainTest {
            pre: funded(100),
            blocks: vec![
                Block {
                    txs: vec![transfer(0, 10)],
                    ..Default::default()
                },
                Block {
                    txs: vec![Transaction {
                        error: Some(TransactionException::NONCE_MISMATCH_TOO_HIGH.into()),
                        ..transfer(5, 10)
                    }],
                    ..Default::default()
                },
            ],
            post: Expectation::new().with(TEST_SENDER, ExpectedAccount::balance(wei(90))),
            ..Default::default()
        }),
    );
    let entry = sealed(fill_with(&ScriptedTool::new(), single_case(&spec)).unwrap());
    let Fixture::BlockchainTest(fixture) = entry.fixture() else {
        panic!("expected a blockchain test");
    };
    assert!(!fixture.blocks[0].is_invalid());
    assert!(fixture.blocks[1].is_invalid());
    assert_eq!(fixture.lastblockhash, fixture.blocks[0].block_header.hash);
    assert_eq!(fixture.post_state.get(&TEST_SENDER).unwrap().nonce, 1);
}

#[test]
fn state_test_can_also_fill_a_blockchain_test() {
    let mut spec = transfer_spec(ForkRange::between(CANCUN, CANCUN));
    let SpecKind::StateTest(test) = &mut spec.kind else {
        unreachable!()
    };
    test.blockchain = true;

    let ids: Vec<_> = cases(&spec)
        .into_iter()
        .map(|case| {
            let id = case.id.clone();
            sealed(fill_with(&ScriptedTool::new(), case).unwrap());
            id
        })
        .collect();
    assert_eq!(
        ids,
        [
            "transfer[fork_Cancun-state_test]",
            "transfer[fork_Cancun-blockchain_test]"
        ]
    );
}

#[test]
fn transaction_tests_are_checked_locally() {
    let valid = Spec::new(
        "valid_tx",
        ForkRange::between(CANCUN, CANCUN),
        SpecKind::TransactionTest(TransactionTest {
            transaction: transfer(0, 10),
        }),
    );
    let tool = ScriptedTool::new();
    let entry = sealed(fill_with(&tool, single_case(&valid)).unwrap());
    assert_eq!(entry.info().filling_transition_tool, LOCAL_VALIDATOR);
    let Fixture::TransactionTest(fixture) = entry.fixture() else {
        panic!("expected a transaction test");
    };
    let result = &fixture.result["Cancun"];
    assert_eq!(result.intrinsic_gas, 21_000);
    assert_eq!(result.sender, Some(TEST_SENDER));
    assert!(tool.requests().is_empty());

    let invalid = Spec::new(
        "low_gas_tx",
        ForkRange::between(CANCUN, CANCUN),
        SpecKind::TransactionTest(TransactionTest {
            transaction: Transaction {
                gas_limit: Some(20_000),
                error: Some(TransactionException::INTRINSIC_GAS_TOO_LOW.into()),
                ..transfer(0, 10)
            },
        }),
    );
    let entry = sealed(fill_with(&tool, single_case(&invalid)).unwrap());
    let Fixture::TransactionTest(fixture) = entry.fixture() else {
        panic!("expected a transaction test");
    };
    assert_eq!(fixture.result["Cancun"].hash, None);
    assert_eq!(fixture.result["Cancun"].intrinsic_gas, 0);
}
