use crate::ForkCriteria;
use core::fmt;
use primitives::hardfork::ForkId;

/// Two base forks and the boundary where the chain moves from one to the
/// other. Used by multi-block tests that cross a fork boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransitionFork {
    /// Name, e.g. `ShanghaiToCancunAtTime15k`.
    pub name: &'static str,
    /// Fork before the boundary.
    pub from: ForkId,
    /// Fork from the boundary on.
    pub to: ForkId,
    /// The boundary.
    pub at: ForkCriteria,
}

impl TransitionFork {
    /// The base fork in effect for a block.
    pub const fn fork_at(&self, block: u64, timestamp: u64) -> ForkId {
        if self.at.is_active(block, timestamp) {
            self.to
        } else {
            self.from
        }
    }
}

/// What a test case runs against: one fork for every block, or a
/// transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForkSelector {
    /// A single fork.
    Single(ForkId),
    /// A transition between two forks.
    Transition(TransitionFork),
}

impl ForkSelector {
    /// Base fork in effect for a block.
    pub const fn fork_at(&self, block: u64, timestamp: u64) -> ForkId {
        match self {
            ForkSelector::Single(id) => *id,
            ForkSelector::Transition(t) => t.fork_at(block, timestamp),
        }
    }

    /// Fork of the genesis block.
    pub const fn genesis_fork(&self) -> ForkId {
        match self {
            ForkSelector::Single(id) => *id,
            ForkSelector::Transition(t) => t.from,
        }
    }

    /// Latest fork the selector reaches.
    pub const fn latest(&self) -> ForkId {
        match self {
            ForkSelector::Single(id) => *id,
            ForkSelector::Transition(t) => t.to,
        }
    }

    /// Name written to fixtures.
    pub fn name(&self) -> &'static str {
        match self {
            ForkSelector::Single(id) => id.name(),
            ForkSelector::Transition(t) => t.name,
        }
    }
}

impl From<ForkId> for ForkSelector {
    fn from(id: ForkId) -> Self {
        ForkSelector::Single(id)
    }
}

impl fmt::Display for ForkSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
