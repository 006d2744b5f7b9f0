//! Gas schedule and intrinsic gas.

use bytecode::GasTier;

/// Gas cost for operations that consume zero gas.
pub const ZERO: u64 = 0;
/// Base gas cost for basic operations.
pub const BASE: u64 = 2;
/// Gas cost for very low-cost operations.
pub const VERYLOW: u64 = 3;
/// Gas cost for low-cost operations.
pub const LOW: u64 = 5;
/// Gas cost for medium-cost operations.
pub const MID: u64 = 8;
/// Gas cost for high-cost operations.
pub const HIGH: u64 = 10;
/// Gas cost for JUMPDEST instruction.
pub const JUMPDEST: u64 = 1;

/// Fork-dependent gas constants.
///
/// Only costs that changed at some fork live here; fixed tiers are the
/// constants above.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GasSchedule {
    /// `EXP` static cost.
    pub exp: u64,
    /// `EXP` cost per exponent byte.
    pub exp_byte: u64,
    /// `KECCAK256` static cost.
    pub keccak256: u64,
    /// `KECCAK256` cost per word.
    pub keccak256_word: u64,
    /// `BALANCE` (warm cost from Berlin on).
    pub balance: u64,
    /// `EXTCODESIZE` / `EXTCODECOPY` (warm cost from Berlin on).
    pub ext_code: u64,
    /// `EXTCODEHASH` (warm cost from Berlin on).
    pub ext_code_hash: u64,
    /// `SLOAD` (warm cost from Berlin on).
    pub sload: u64,
    /// Lowest possible `SSTORE` charge.
    pub sstore_min: u64,
    /// `SSTORE` zero to non-zero.
    pub sstore_set: u64,
    /// `SSTORE` non-zero to non-zero.
    pub sstore_reset: u64,
    /// Warm storage read, also the transient storage cost.
    pub warm_access: u64,
    /// Cold account access surcharge, zero before Berlin.
    pub cold_account_access: u64,
    /// Cold storage slot access surcharge, zero before Berlin.
    pub cold_sload: u64,
    /// Message call static cost (warm cost from Berlin on).
    pub call: u64,
    /// Contract creation opcode cost.
    pub create: u64,
    /// `LOG` static cost.
    pub log: u64,
    /// `LOG` cost per topic.
    pub log_topic: u64,
    /// `LOG` cost per data byte.
    pub log_data: u64,
    /// `BLOCKHASH` cost.
    pub block_hash: u64,
    /// `SELFDESTRUCT` static cost.
    pub selfdestruct: u64,
    /// Base cost of every transaction.
    pub tx_base: u64,
    /// Extra base cost of a contract creation transaction.
    pub tx_create: u64,
    /// Cost of a zero calldata byte.
    pub tx_data_zero: u64,
    /// Cost of a non-zero calldata byte.
    pub tx_data_non_zero: u64,
    /// Cost of an access list address.
    pub tx_access_list_address: u64,
    /// Cost of an access list storage key.
    pub tx_access_list_storage_key: u64,
    /// Cost per 32-byte word of initcode.
    pub tx_initcode_word: u64,
    /// Cost per authorization tuple.
    pub tx_authorization: u64,
    /// Calldata floor cost per token, zero when there is no floor.
    pub tx_floor_token: u64,
}

impl GasSchedule {
    /// Frontier costs.
    pub const FRONTIER: Self = Self {
        exp: 10,
        exp_byte: 10,
        keccak256: 30,
        keccak256_word: 6,
        balance: 20,
        ext_code: 20,
        ext_code_hash: 0,
        sload: 50,
        sstore_min: 5_000,
        sstore_set: 20_000,
        sstore_reset: 5_000,
        warm_access: 0,
        cold_account_access: 0,
        cold_sload: 0,
        call: 40,
        create: 32_000,
        log: 375,
        log_topic: 375,
        log_data: 8,
        block_hash: 20,
        selfdestruct: 0,
        tx_base: 21_000,
        tx_create: 0,
        tx_data_zero: 4,
        tx_data_non_zero: 68,
        tx_access_list_address: 0,
        tx_access_list_storage_key: 0,
        tx_initcode_word: 0,
        tx_authorization: 0,
        tx_floor_token: 0,
    };

    /// Cost of a gas tier under this schedule.
    pub const fn tier_cost(&self, tier: GasTier) -> u64 {
        match tier {
            GasTier::Zero => ZERO,
            GasTier::Base => BASE,
            GasTier::VeryLow => VERYLOW,
            GasTier::Low => LOW,
            GasTier::Mid => MID,
            GasTier::High => HIGH,
            GasTier::JumpDest => JUMPDEST,
            GasTier::Exp => self.exp,
            GasTier::Keccak => self.keccak256,
            GasTier::Balance => self.balance,
            GasTier::ExtCode => self.ext_code,
            GasTier::ExtCodeHash => self.ext_code_hash,
            GasTier::SLoad => self.sload,
            GasTier::SStore => self.sstore_min,
            GasTier::WarmAccess => self.warm_access,
            GasTier::Call => self.call,
            GasTier::Create => self.create,
            GasTier::Log => self.log,
            GasTier::BlockHash => self.block_hash,
            GasTier::SelfDestruct => self.selfdestruct,
        }
    }
}

/// What a transaction is charged for before execution starts.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntrinsicGasInput<'a> {
    /// Calldata, or initcode for a creation.
    pub calldata: &'a [u8],
    /// Whether the transaction creates a contract.
    pub contract_creation: bool,
    /// Number of addresses in the access list.
    pub access_list_addresses: u64,
    /// Total number of storage keys in the access list.
    pub access_list_storage_keys: u64,
    /// Number of authorization tuples.
    pub authorizations: u64,
}

impl IntrinsicGasInput<'_> {
    fn zero_bytes(&self) -> u64 {
        self.calldata.iter().filter(|b| **b == 0).count() as u64
    }

    /// Calldata tokens as defined by EIP-7623: zero bytes count one, other
    /// bytes four.
    pub fn tokens(&self) -> u64 {
        let zeros = self.zero_bytes();
        zeros + (self.calldata.len() as u64 - zeros) * 4
    }
}

impl GasSchedule {
    /// Gas charged before execution, without the calldata floor.
    pub fn intrinsic_gas(&self, input: &IntrinsicGasInput<'_>) -> u64 {
        let zeros = input.zero_bytes();
        let non_zeros = input.calldata.len() as u64 - zeros;

        let mut gas = self.tx_base;
        gas += zeros * self.tx_data_zero;
        gas += non_zeros * self.tx_data_non_zero;
        gas += input.access_list_addresses * self.tx_access_list_address;
        gas += input.access_list_storage_keys * self.tx_access_list_storage_key;
        gas += input.authorizations * self.tx_authorization;
        if input.contract_creation {
            gas += self.tx_create;
            gas += (input.calldata.len() as u64).div_ceil(32) * self.tx_initcode_word;
        }
        gas
    }

    /// EIP-7623 floor, zero when the schedule has no floor.
    pub fn calldata_floor(&self, input: &IntrinsicGasInput<'_>) -> u64 {
        if self.tx_floor_token == 0 {
            return 0;
        }
        self.tx_base + input.tokens() * self.tx_floor_token
    }

    /// Minimum gas limit for a transaction to be valid.
    pub fn min_tx_gas_limit(&self, input: &IntrinsicGasInput<'_>) -> u64 {
        self.intrinsic_gas(input).max(self.calldata_floor(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_transfer_costs_21000() {
        let input = IntrinsicGasInput::default();
        assert_eq!(GasSchedule::FRONTIER.intrinsic_gas(&input), 21_000);
        assert_eq!(GasSchedule::FRONTIER.min_tx_gas_limit(&input), 21_000);
    }

    #[test]
    fn calldata_and_creation() {
        let schedule = GasSchedule {
            tx_create: 32_000,
            tx_initcode_word: 2,
            ..GasSchedule::FRONTIER
        };
        let input = IntrinsicGasInput {
            calldata: &[0, 1, 0, 2],
            contract_creation: true,
            ..Default::default()
        };
        // 21000 + 2 * 4 + 2 * 68 + 32000 + 1 word * 2
        assert_eq!(schedule.intrinsic_gas(&input), 53_146);
    }

    #[test]
    fn floor_dominates_for_large_calldata() {
        let schedule = GasSchedule {
            tx_data_non_zero: 16,
            tx_floor_token: 10,
            ..GasSchedule::FRONTIER
        };
        let data = [1u8; 100];
        let input = IntrinsicGasInput {
            calldata: &data,
            ..Default::default()
        };
        assert_eq!(input.tokens(), 400);
        assert_eq!(schedule.intrinsic_gas(&input), 21_000 + 1_600);
        assert_eq!(schedule.calldata_floor(&input), 21_000 + 4_000);
        assert_eq!(schedule.min_tx_gas_limit(&input), 25_000);
    }
}
