use crate::{
    fee::BlobSchedule,
    fork::{Fork, ForkCriteria, ForkFeatures, OpcodeSet},
    transition::TransitionFork,
};
use core::ops::{Bound, RangeBounds};
use once_cell::sync::Lazy;
use primitives::{hardfork::ForkId::*, hardfork::ForkId, U256};

/// Errors building a registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Forks are not in strictly increasing order.
    #[error("fork {next} does not come after {prev}")]
    OutOfOrder {
        /// Previous fork.
        prev: ForkId,
        /// Offending fork.
        next: ForkId,
    },
    /// A transition names a fork that is not registered.
    #[error("transition {0} references an unregistered fork")]
    UnknownTransitionFork(&'static str),
}

/// Ordered set of forks, immutable once built.
#[derive(Clone, Debug)]
pub struct ForkRegistry {
    forks: Vec<Fork>,
    transitions: Vec<TransitionFork>,
}

static MAINNET: Lazy<ForkRegistry> = Lazy::new(|| {
    ForkRegistry::new(mainnet_forks(), mainnet_transitions())
        .unwrap_or_else(|err| panic!("invalid mainnet fork table: {err}"))
});

impl ForkRegistry {
    /// Builds a registry from forks in activation order.
    ///
    /// Opcode sets are derived here: a fork enables every opcode introduced at
    /// or before it, minus everything deprecated at or before it.
    pub fn new(
        mut forks: Vec<Fork>,
        transitions: Vec<TransitionFork>,
    ) -> Result<Self, RegistryError> {
        for pair in forks.windows(2) {
            if pair[0].id >= pair[1].id {
                return Err(RegistryError::OutOfOrder {
                    prev: pair[0].id,
                    next: pair[1].id,
                });
            }
        }

        let mut deprecated = OpcodeSet::ZERO;
        for fork in &mut forks {
            for code in &fork.deprecates {
                deprecated.set(*code as usize, true);
            }
            fork.fill_opcodes(&deprecated);
        }

        let registry = Self { forks, transitions };
        for t in &registry.transitions {
            if registry.get(t.from).is_none() || registry.get(t.to).is_none() {
                return Err(RegistryError::UnknownTransitionFork(t.name));
            }
        }
        Ok(registry)
    }

    /// The process-wide Ethereum mainnet registry.
    pub fn mainnet() -> &'static ForkRegistry {
        &MAINNET
    }

    /// Looks up a fork.
    pub fn get(&self, id: ForkId) -> Option<&Fork> {
        self.forks
            .binary_search_by_key(&id, |f| f.id)
            .ok()
            .map(|i| &self.forks[i])
    }

    /// All forks in order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Fork> {
        self.forks.iter()
    }

    /// The fork active for a block.
    pub fn resolve(&self, block: u64, timestamp: u64) -> Option<&Fork> {
        self.forks
            .iter()
            .rev()
            .find(|f| f.criteria.is_active(block, timestamp))
    }

    /// Forks with identifiers inside `range`, in order.
    pub fn range(&self, range: impl RangeBounds<ForkId>) -> impl Iterator<Item = &Fork> {
        let start = range.start_bound().cloned();
        let end = range.end_bound().cloned();
        self.forks.iter().filter(move |f| {
            let after_start = match start {
                Bound::Included(s) => f.id >= s,
                Bound::Excluded(s) => f.id > s,
                Bound::Unbounded => true,
            };
            let before_end = match end {
                Bound::Included(e) => f.id <= e,
                Bound::Excluded(e) => f.id < e,
                Bound::Unbounded => true,
            };
            after_start && before_end
        })
    }

    /// Forks at or after `id`.
    pub fn at_least(&self, id: ForkId) -> impl Iterator<Item = &Fork> {
        self.range(id..)
    }

    /// Forks strictly before `id`.
    pub fn before(&self, id: ForkId) -> impl Iterator<Item = &Fork> {
        self.range(..id)
    }

    /// Registered transitions.
    pub fn transitions(&self) -> &[TransitionFork] {
        &self.transitions
    }

    /// Looks up a transition by name.
    pub fn transition(&self, name: &str) -> Option<&TransitionFork> {
        self.transitions.iter().find(|t| t.name == name)
    }
}

const ETHER: u64 = 1_000_000_000_000_000_000;

fn mainnet_forks() -> Vec<Fork> {
    let frontier = Fork::new(FRONTIER, "Frontier", ForkCriteria::Block(0))
        .with_block_reward(U256::from(5 * ETHER as u128));

    // EIP-2: contract creation costs 32000 on top of the base.
    let homestead = frontier
        .successor(HOMESTEAD, "Homestead", ForkCriteria::Block(1_150_000))
        .with_gas(|g| g.tx_create = 32_000);

    // EIP-150: IO-heavy operations repriced.
    let tangerine = homestead
        .successor(TANGERINE_WHISTLE, "EIP150", ForkCriteria::Block(2_463_000))
        .with_gas(|g| {
            g.balance = 400;
            g.ext_code = 700;
            g.sload = 200;
            g.call = 700;
            g.selfdestruct = 5_000;
        });

    // EIP-155 and EIP-160.
    let spurious = tangerine
        .successor(SPURIOUS_DRAGON, "EIP158", ForkCriteria::Block(2_675_000))
        .with_features(ForkFeatures::EIP155)
        .with_gas(|g| g.exp_byte = 50);

    let byzantium = spurious
        .successor(BYZANTIUM, "Byzantium", ForkCriteria::Block(4_370_000))
        .with_block_reward(U256::from(3 * ETHER as u128));

    // Superseded by Petersburg before it activated.
    let constantinople = byzantium
        .successor(CONSTANTINOPLE, "Constantinople", ForkCriteria::Unscheduled)
        .with_block_reward(U256::from(2 * ETHER as u128))
        .with_gas(|g| g.ext_code_hash = 400)
        .ignored();

    let petersburg = constantinople.successor(
        PETERSBURG,
        "ConstantinopleFix",
        ForkCriteria::Block(7_280_000),
    );

    // EIP-1884 and EIP-2028.
    let istanbul = petersburg
        .successor(ISTANBUL, "Istanbul", ForkCriteria::Block(9_069_000))
        .with_gas(|g| {
            g.balance = 700;
            g.ext_code_hash = 700;
            g.sload = 800;
            g.sstore_min = 800;
            g.tx_data_non_zero = 16;
        });

    let muir_glacier = istanbul
        .successor(MUIR_GLACIER, "MuirGlacier", ForkCriteria::Block(9_200_000))
        .ignored();

    // EIP-2929 and EIP-2930.
    let berlin = muir_glacier
        .successor(BERLIN, "Berlin", ForkCriteria::Block(12_244_000))
        .with_features(ForkFeatures::ACCESS_LISTS)
        .with_gas(|g| {
            g.balance = 100;
            g.ext_code = 100;
            g.ext_code_hash = 100;
            g.sload = 100;
            g.sstore_min = 100;
            g.sstore_reset = 2_900;
            g.call = 100;
            g.warm_access = 100;
            g.cold_account_access = 2_600;
            g.cold_sload = 2_100;
            g.tx_access_list_address = 2_400;
            g.tx_access_list_storage_key = 1_900;
        });

    let london = berlin
        .successor(LONDON, "London", ForkCriteria::Block(12_965_000))
        .with_features(ForkFeatures::FEE_MARKET);

    let arrow_glacier = london
        .successor(ARROW_GLACIER, "ArrowGlacier", ForkCriteria::Block(13_773_000))
        .ignored();

    let gray_glacier = arrow_glacier
        .successor(GRAY_GLACIER, "GrayGlacier", ForkCriteria::Block(15_050_000))
        .ignored();

    let paris = gray_glacier
        .successor(PARIS, "Merge", ForkCriteria::Block(15_537_394))
        .with_features(ForkFeatures::PREV_RANDAO)
        .with_block_reward(U256::ZERO);

    let shanghai = paris
        .successor(SHANGHAI, "Shanghai", ForkCriteria::Timestamp(1_681_338_455))
        .with_features(
            ForkFeatures::PUSH0 | ForkFeatures::INITCODE_LIMIT | ForkFeatures::WITHDRAWALS,
        )
        .with_gas(|g| g.tx_initcode_word = 2);

    let cancun = shanghai
        .successor(CANCUN, "Cancun", ForkCriteria::Timestamp(1_710_338_135))
        .with_features(ForkFeatures::BLOBS | ForkFeatures::BEACON_ROOT)
        .with_blobs(BlobSchedule::CANCUN);

    // EIP-7623, EIP-7691 and EIP-7702.
    let prague = cancun
        .successor(PRAGUE, "Prague", ForkCriteria::Timestamp(1_746_612_311))
        .with_features(ForkFeatures::SET_CODE | ForkFeatures::REQUESTS_HASH)
        .with_blobs(BlobSchedule::PRAGUE)
        .with_gas(|g| {
            g.tx_authorization = 25_000;
            g.tx_floor_token = 10;
        });

    let osaka = prague
        .successor(OSAKA, "Osaka", ForkCriteria::Timestamp(1_764_798_551))
        .with_features(ForkFeatures::TX_GAS_LIMIT_CAP)
        .with_blobs(BlobSchedule {
            reserve_price: true,
            ..BlobSchedule::PRAGUE
        });

    vec![
        frontier,
        homestead,
        tangerine,
        spurious,
        byzantium,
        constantinople,
        petersburg,
        istanbul,
        muir_glacier,
        berlin,
        london,
        arrow_glacier,
        gray_glacier,
        paris,
        shanghai,
        cancun,
        prague,
        osaka,
    ]
}

fn mainnet_transitions() -> Vec<TransitionFork> {
    vec![
        TransitionFork {
            name: "BerlinToLondonAt5",
            from: BERLIN,
            to: LONDON,
            at: ForkCriteria::Block(5),
        },
        TransitionFork {
            name: "ParisToShanghaiAtTime15k",
            from: PARIS,
            to: SHANGHAI,
            at: ForkCriteria::Timestamp(15_000),
        },
        TransitionFork {
            name: "ShanghaiToCancunAtTime15k",
            from: SHANGHAI,
            to: CANCUN,
            at: ForkCriteria::Timestamp(15_000),
        },
        TransitionFork {
            name: "CancunToPragueAtTime15k",
            from: CANCUN,
            to: PRAGUE,
            at: ForkCriteria::Timestamp(15_000),
        },
        TransitionFork {
            name: "PragueToOsakaAtTime15k",
            from: PRAGUE,
            to: OSAKA,
            at: ForkCriteria::Timestamp(15_000),
        },
    ]
}
