//! EIP-1559 base fee and EIP-4844 blob gas accounting.

/// Gas consumption of a single data blob (== blob byte size).
pub const GAS_PER_BLOB: u64 = 1 << 17;

/// Minimum blob base fee.
pub const MIN_BLOB_BASE_FEE: u64 = 1;

/// EIP-7918 execution cost a blob is priced against.
pub const BLOB_BASE_COST: u64 = 1 << 13;

/// Base fee bound divisor of EIP-1559.
pub const BASE_FEE_MAX_CHANGE_DENOMINATOR: u64 = 8;

/// Gas limit elasticity multiplier of EIP-1559.
pub const ELASTICITY_MULTIPLIER: u64 = 2;

/// Base fee of the first London block.
pub const INITIAL_BASE_FEE: u64 = 1_000_000_000;

/// Blob parameters of a fork.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlobSchedule {
    /// Target number of blobs per block.
    pub target_blobs_per_block: u64,
    /// Maximum number of blobs per block.
    pub max_blobs_per_block: u64,
    /// Controls the maximum rate of change of the blob base fee.
    pub base_fee_update_fraction: u64,
    /// Whether EIP-7918 bounds the blob base fee by the execution base fee.
    pub reserve_price: bool,
}

impl BlobSchedule {
    /// Cancun parameters.
    pub const CANCUN: Self = Self {
        target_blobs_per_block: 3,
        max_blobs_per_block: 6,
        base_fee_update_fraction: 3_338_477,
        reserve_price: false,
    };

    /// Prague parameters (EIP-7691).
    pub const PRAGUE: Self = Self {
        target_blobs_per_block: 6,
        max_blobs_per_block: 9,
        base_fee_update_fraction: 5_007_716,
        reserve_price: false,
    };

    /// Target blob gas per block.
    pub const fn target_blob_gas_per_block(&self) -> u64 {
        self.target_blobs_per_block * GAS_PER_BLOB
    }

    /// Maximum blob gas per block.
    pub const fn max_blob_gas_per_block(&self) -> u64 {
        self.max_blobs_per_block * GAS_PER_BLOB
    }

    /// Blob base fee for a given excess blob gas.
    pub fn blob_base_fee(&self, excess_blob_gas: u64) -> u128 {
        fake_exponential(
            MIN_BLOB_BASE_FEE,
            excess_blob_gas,
            self.base_fee_update_fraction,
        )
    }

    /// Excess blob gas of a block given its parent's header values.
    pub fn next_excess_blob_gas(
        &self,
        parent_excess_blob_gas: u64,
        parent_blob_gas_used: u64,
        parent_base_fee: u64,
    ) -> u64 {
        let target = self.target_blob_gas_per_block();
        let total = parent_excess_blob_gas.saturating_add(parent_blob_gas_used);
        if total < target {
            return 0;
        }
        if self.reserve_price
            && (BLOB_BASE_COST as u128) * (parent_base_fee as u128)
                > (GAS_PER_BLOB as u128) * self.blob_base_fee(parent_excess_blob_gas)
        {
            let max = self.max_blobs_per_block;
            let target_blobs = self.target_blobs_per_block;
            return parent_excess_blob_gas
                + parent_blob_gas_used * (max - target_blobs) / max;
        }
        total - target
    }
}

/// Approximates `factor * e ** (numerator / denominator)` using Taylor
/// expansion, as specified by EIP-4844.
pub fn fake_exponential(factor: u64, numerator: u64, denominator: u64) -> u128 {
    assert_ne!(denominator, 0, "attempt to divide by zero");
    let factor = factor as u128;
    let numerator = numerator as u128;
    let denominator = denominator as u128;

    let mut i = 1;
    let mut output = 0;
    let mut numerator_accum = factor * denominator;
    while numerator_accum > 0 {
        output += numerator_accum;

        // Denominator is asserted as not zero at the start of the function.
        numerator_accum = (numerator_accum * numerator) / (denominator * i);
        i += 1;
    }
    output / denominator
}

/// Base fee of a block given its parent's gas limit, gas used and base fee.
pub fn next_base_fee(parent_gas_limit: u64, parent_gas_used: u64, parent_base_fee: u64) -> u64 {
    let target = parent_gas_limit / ELASTICITY_MULTIPLIER;
    if target == 0 || parent_gas_used == target {
        return parent_base_fee;
    }
    let base = parent_base_fee as u128;
    let target_u = target as u128;
    if parent_gas_used > target {
        let delta = (parent_gas_used - target) as u128;
        let change = (base * delta / target_u / BASE_FEE_MAX_CHANGE_DENOMINATOR as u128).max(1);
        (base + change) as u64
    } else {
        let delta = (target - parent_gas_used) as u128;
        let change = base * delta / target_u / BASE_FEE_MAX_CHANGE_DENOMINATOR as u128;
        (base - change) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_exponential_vectors() {
        for (factor, numerator, denominator, expected) in [
            (1u64, 0u64, 1u64, 1u128),
            (38493, 0, 1000, 38493),
            (0, 1234, 2345, 0),
            (1, 2, 1, 6),
            (1, 4, 2, 6),
            (1, 3, 1, 16),
            (1, 6, 2, 18),
            (1, 4, 1, 49),
            (1, 8, 2, 50),
            (10, 8, 2, 542),
            (11, 8, 2, 596),
            (1, 5, 1, 136),
            (1, 5, 2, 11),
            (2, 5, 2, 23),
        ] {
            assert_eq!(
                fake_exponential(factor, numerator, denominator),
                expected,
                "fake_exponential({factor}, {numerator}, {denominator})"
            );
        }
    }

    #[test]
    fn base_fee_moves_toward_target() {
        assert_eq!(next_base_fee(30_000_000, 15_000_000, 1_000), 1_000);
        assert_eq!(next_base_fee(30_000_000, 30_000_000, 1_000), 1_125);
        assert_eq!(next_base_fee(30_000_000, 0, 1_000), 875);
        // Increase is at least one wei.
        assert_eq!(next_base_fee(30_000_000, 15_000_001, 7), 8);
    }

    #[test]
    fn excess_blob_gas() {
        let cancun = BlobSchedule::CANCUN;
        assert_eq!(cancun.next_excess_blob_gas(0, 0, 7), 0);
        let target = cancun.target_blob_gas_per_block();
        assert_eq!(cancun.next_excess_blob_gas(0, target, 7), 0);
        assert_eq!(
            cancun.next_excess_blob_gas(GAS_PER_BLOB, target, 7),
            GAS_PER_BLOB
        );
        assert_eq!(cancun.blob_base_fee(0), 1);
    }

    #[test]
    fn reserve_price_slows_excess_decrease() {
        let osaka = BlobSchedule {
            reserve_price: true,
            ..BlobSchedule::PRAGUE
        };
        let used = osaka.max_blob_gas_per_block();
        // A high execution base fee triggers the reserve price branch.
        let excess = osaka.next_excess_blob_gas(0, used, 1_000_000_000);
        assert_eq!(excess, used * 3 / 9);
        // A low one does not.
        let excess = osaka.next_excess_blob_gas(0, used, 1);
        assert_eq!(excess, used - osaka.target_blob_gas_per_block());
    }
}
