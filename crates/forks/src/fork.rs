use crate::{
    fee::BlobSchedule,
    gas::{GasSchedule, IntrinsicGasInput},
};
use bitvec::{array::BitArray, order::Lsb0};
use bytecode::{opcode::OPCODE_INFO, OpCode};
use primitives::{hardfork::ForkId, U256};

/// Set of enabled opcodes, one bit per byte value.
pub type OpcodeSet = BitArray<[u8; 32], Lsb0>;

/// Activation condition of a fork.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForkCriteria {
    /// Active from this block number on.
    Block(u64),
    /// Active from this timestamp on.
    Timestamp(u64),
    /// Never activated on this chain.
    Unscheduled,
}

impl ForkCriteria {
    /// Whether the condition holds for a block.
    pub const fn is_active(&self, block: u64, timestamp: u64) -> bool {
        match *self {
            ForkCriteria::Block(at) => block >= at,
            ForkCriteria::Timestamp(at) => timestamp >= at,
            ForkCriteria::Unscheduled => false,
        }
    }
}

bitflags::bitflags! {
    /// Protocol features a fork enables.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ForkFeatures: u32 {
        /// EIP-155 replay protected signatures.
        const EIP155 = 1 << 0;
        /// EIP-2930 access list transactions.
        const ACCESS_LISTS = 1 << 1;
        /// EIP-1559 fee market transactions and header base fee.
        const FEE_MARKET = 1 << 2;
        /// EIP-4399 `prevRandao` replaces difficulty.
        const PREV_RANDAO = 1 << 3;
        /// EIP-3855 `PUSH0`.
        const PUSH0 = 1 << 4;
        /// EIP-3860 initcode size limit and metering.
        const INITCODE_LIMIT = 1 << 5;
        /// EIP-4895 beacon chain withdrawals.
        const WITHDRAWALS = 1 << 6;
        /// EIP-4844 blob transactions and header blob fields.
        const BLOBS = 1 << 7;
        /// EIP-4788 parent beacon block root in the header.
        const BEACON_ROOT = 1 << 8;
        /// EIP-7702 set-code transactions.
        const SET_CODE = 1 << 9;
        /// EIP-7685 requests hash in the header.
        const REQUESTS_HASH = 1 << 10;
        /// EIP-7825 transaction gas limit cap.
        const TX_GAS_LIMIT_CAP = 1 << 11;
    }
}

/// An opcode as enabled by a fork.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveOpcode {
    /// The opcode.
    pub opcode: OpCode,
    /// Static gas cost. Dynamic parts such as memory expansion, cold access
    /// surcharges or per-word charges are not included.
    pub base_gas: u64,
    /// Stack inputs.
    pub inputs: u8,
    /// Stack outputs.
    pub outputs: u8,
    /// Immediate width.
    pub immediate_size: u8,
}

/// Byte that is not an opcode in any fork.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("opcode 0x{0:02x} is not defined in any fork")]
pub struct UnknownOpcodeError(pub u8);

/// Transaction gas limit cap introduced by EIP-7825.
pub const TX_GAS_LIMIT_CAP: u64 = 1 << 24;

/// A protocol upgrade as data: opcode set, gas schedule and feature flags.
///
/// Forks are built by deriving each one from its predecessor with
/// [`Fork::successor`] and the `with_*` adjusters; the opcode set is filled in
/// when the fork is added to a [`ForkRegistry`](crate::ForkRegistry).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fork {
    pub(crate) id: ForkId,
    pub(crate) t8n_name: &'static str,
    pub(crate) criteria: ForkCriteria,
    pub(crate) features: ForkFeatures,
    pub(crate) gas: GasSchedule,
    pub(crate) blobs: Option<BlobSchedule>,
    pub(crate) block_reward: U256,
    pub(crate) ignored: bool,
    pub(crate) deprecates: Vec<u8>,
    pub(crate) opcodes: OpcodeSet,
}

impl Fork {
    /// A fork with Frontier rules.
    pub fn new(id: ForkId, t8n_name: &'static str, criteria: ForkCriteria) -> Self {
        Self {
            id,
            t8n_name,
            criteria,
            features: ForkFeatures::empty(),
            gas: GasSchedule::FRONTIER,
            blobs: None,
            block_reward: U256::ZERO,
            ignored: false,
            deprecates: Vec::new(),
            opcodes: OpcodeSet::ZERO,
        }
    }

    /// A fork inheriting everything but its identity from `self`.
    pub fn successor(&self, id: ForkId, t8n_name: &'static str, criteria: ForkCriteria) -> Self {
        Self {
            id,
            t8n_name,
            criteria,
            ignored: false,
            deprecates: Vec::new(),
            opcodes: OpcodeSet::ZERO,
            ..self.clone()
        }
    }

    /// Adds feature flags.
    pub fn with_features(mut self, features: ForkFeatures) -> Self {
        self.features |= features;
        self
    }

    /// Adjusts the gas schedule.
    pub fn with_gas(mut self, f: impl FnOnce(&mut GasSchedule)) -> Self {
        f(&mut self.gas);
        self
    }

    /// Sets the blob parameters.
    pub fn with_blobs(mut self, blobs: BlobSchedule) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Sets the block reward in wei.
    pub fn with_block_reward(mut self, reward: U256) -> Self {
        self.block_reward = reward;
        self
    }

    /// Excludes the fork from default fork ranges.
    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    /// Disables opcodes from this fork on.
    pub fn deprecating(mut self, opcodes: &[u8]) -> Self {
        self.deprecates.extend_from_slice(opcodes);
        self
    }

    /// Identifier.
    pub fn id(&self) -> ForkId {
        self.id
    }

    /// Fixture name.
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    /// Name the transition tool understands.
    pub fn t8n_name(&self) -> &'static str {
        self.t8n_name
    }

    /// Activation condition.
    pub fn criteria(&self) -> ForkCriteria {
        self.criteria
    }

    /// Enabled feature flags.
    pub fn features(&self) -> ForkFeatures {
        self.features
    }

    /// Returns `true` if all of `features` are enabled.
    pub fn supports(&self, features: ForkFeatures) -> bool {
        self.features.contains(features)
    }

    /// Gas schedule.
    pub fn gas(&self) -> &GasSchedule {
        &self.gas
    }

    /// Blob parameters, `None` before Cancun.
    pub fn blobs(&self) -> Option<&BlobSchedule> {
        self.blobs.as_ref()
    }

    /// Block reward in wei.
    pub fn block_reward(&self) -> U256 {
        self.block_reward
    }

    /// Whether default fork ranges skip this fork.
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// Enabled opcodes.
    pub fn opcodes(&self) -> &OpcodeSet {
        &self.opcodes
    }

    /// Looks up an opcode.
    ///
    /// Returns `Ok(None)` for opcodes that exist in some fork but not in this
    /// one, and an error for bytes that are not opcodes at all.
    pub fn opcode(&self, code: u8) -> Result<Option<ActiveOpcode>, UnknownOpcodeError> {
        let opcode = OpCode::new(code).ok_or(UnknownOpcodeError(code))?;
        if !self.opcodes[code as usize] {
            return Ok(None);
        }
        let info = opcode.info();
        Ok(Some(ActiveOpcode {
            opcode,
            base_gas: self.gas.tier_cost(info.gas_tier()),
            inputs: info.inputs(),
            outputs: info.outputs(),
            immediate_size: info.immediate_size(),
        }))
    }

    /// Returns `true` if `code` is enabled in this fork.
    pub fn is_opcode_active(&self, code: u8) -> bool {
        self.opcodes[code as usize]
    }

    /// Transaction types this fork accepts.
    pub fn tx_types(&self) -> Vec<u8> {
        let mut types = vec![0];
        for (ty, feature) in [
            (1, ForkFeatures::ACCESS_LISTS),
            (2, ForkFeatures::FEE_MARKET),
            (3, ForkFeatures::BLOBS),
            (4, ForkFeatures::SET_CODE),
        ] {
            if self.supports(feature) {
                types.push(ty);
            }
        }
        types
    }

    /// Returns `true` if transactions of type `ty` are valid.
    pub fn supports_tx_type(&self, ty: u8) -> bool {
        self.tx_types().contains(&ty)
    }

    /// Minimum gas limit for a transaction to be valid under this fork.
    pub fn intrinsic_gas(&self, input: &IntrinsicGasInput<'_>) -> u64 {
        self.gas.min_tx_gas_limit(input)
    }

    /// Maximum gas limit of a single transaction, if capped.
    pub fn tx_gas_limit_cap(&self) -> Option<u64> {
        self.supports(ForkFeatures::TX_GAS_LIMIT_CAP)
            .then_some(TX_GAS_LIMIT_CAP)
    }

    /// Computes the enabled opcode set from the opcode table and the
    /// accumulated deprecations.
    pub(crate) fn fill_opcodes(&mut self, deprecated: &OpcodeSet) {
        let mut set = OpcodeSet::ZERO;
        for (code, info) in OPCODE_INFO.iter().enumerate() {
            if let Some(info) = info {
                if info.since() <= self.id && !deprecated[code] {
                    set.set(code, true);
                }
            }
        }
        self.opcodes = set;
    }
}
