use crate::{BlockchainFixture, StateFixture, TransactionFixture};
use primitives::B256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use specs::FixtureFormat;

/// A fixture of any format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Fixture {
    /// State test.
    StateTest(StateFixture),
    /// Blockchain test.
    BlockchainTest(BlockchainFixture),
    /// Transaction test.
    TransactionTest(TransactionFixture),
}

impl Fixture {
    /// Format of this fixture.
    pub fn format(&self) -> FixtureFormat {
        match self {
            Self::StateTest(_) => FixtureFormat::StateTest,
            Self::BlockchainTest(_) => FixtureFormat::BlockchainTest,
            Self::TransactionTest(_) => FixtureFormat::TransactionTest,
        }
    }

    /// Canonical serialization: compact JSON with map keys in sorted order.
    pub fn canonical_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// SHA-256 of [`canonical_json`](Self::canonical_json).
    pub fn content_hash(&self) -> Result<B256, serde_json::Error> {
        let digest = Sha256::digest(self.canonical_json()?);
        Ok(B256::from_slice(&digest))
    }
}

impl From<StateFixture> for Fixture {
    fn from(fixture: StateFixture) -> Self {
        Self::StateTest(fixture)
    }
}

impl From<BlockchainFixture> for Fixture {
    fn from(fixture: BlockchainFixture) -> Self {
        Self::BlockchainTest(fixture)
    }
}

impl From<TransactionFixture> for Fixture {
    fn from(fixture: TransactionFixture) -> Self {
        Self::TransactionTest(fixture)
    }
}

/// Metadata stored next to a fixture. Not covered by the content hash
/// except for `hash` itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FixtureInfo {
    /// Content hash of the fixture body.
    pub hash: B256,
    /// Test case the fixture was filled from.
    pub test_id: String,
    /// Fork or transition name.
    pub fork: String,
    /// Evaluator that filled the fixture.
    pub filling_transition_tool: String,
    /// Free-form note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A sealed fixture: the body plus metadata carrying its content hash.
///
/// Fields are private so that the hash always matches the body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureEntry {
    #[serde(rename = "_info")]
    info: FixtureInfo,
    #[serde(flatten)]
    fixture: Fixture,
}

impl FixtureEntry {
    /// Hashes `fixture` and wraps it with its metadata.
    pub fn seal(
        fixture: Fixture,
        test_id: impl Into<String>,
        fork: impl Into<String>,
        filled_by: impl Into<String>,
    ) -> Result<Self, serde_json::Error> {
        let hash = fixture.content_hash()?;
        Ok(Self {
            info: FixtureInfo {
                hash,
                test_id: test_id.into(),
                fork: fork.into(),
                filling_transition_tool: filled_by.into(),
                comment: None,
            },
            fixture,
        })
    }

    /// Attaches a comment. The hash is unaffected.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.info.comment = Some(comment.into());
        self
    }

    /// Content hash.
    pub fn hash(&self) -> B256 {
        self.info.hash
    }

    /// Metadata.
    pub fn info(&self) -> &FixtureInfo {
        &self.info
    }

    /// The fixture body.
    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    /// Returns `true` if the stored hash matches the body, which fails for
    /// entries read from files that were edited by hand.
    pub fn verify_hash(&self) -> bool {
        self.fixture
            .content_hash()
            .is_ok_and(|hash| hash == self.info.hash)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{TransactionFixture, TransactionResult};
    use primitives::{bytes, ForkId};
    use specs::{ExceptionCategory, TransactionException};

    pub(crate) fn transaction_fixture(fork: ForkId) -> Fixture {
        TransactionFixture {
            txbytes: bytes!("f85f800a8252089400000000000000000000000000000000000000aa0a801ca0"),
            result: [(
                fork.name().to_string(),
                TransactionResult::invalid(ExceptionCategory::single(
                    TransactionException::INTRINSIC_GAS_TOO_LOW,
                )),
            )]
            .into(),
        }
        .into()
    }

    #[test]
    fn hash_is_deterministic_and_fork_sensitive() {
        let cancun = transaction_fixture(ForkId::CANCUN);
        assert_eq!(cancun.content_hash().unwrap(), cancun.clone().content_hash().unwrap());
        assert_ne!(
            cancun.content_hash().unwrap(),
            transaction_fixture(ForkId::PRAGUE).content_hash().unwrap()
        );
    }

    #[test]
    fn metadata_is_not_hashed() {
        let a = FixtureEntry::seal(transaction_fixture(ForkId::CANCUN), "a", "Cancun", "evm").unwrap();
        let b = FixtureEntry::seal(transaction_fixture(ForkId::CANCUN), "b", "Cancun", "other")
            .unwrap()
            .with_comment("refilled");
        assert_eq!(a.hash(), b.hash());
        assert!(b.verify_hash());
    }

    #[test]
    fn entry_json_shape() {
        let entry = FixtureEntry::seal(transaction_fixture(ForkId::CANCUN), "tx[fork_Cancun-transaction_test]", "Cancun", "evm")
            .unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["format"], "transaction_test");
        assert_eq!(json["_info"]["test-id"], "tx[fork_Cancun-transaction_test]");
        assert_eq!(json["_info"]["filling-transition-tool"], "evm");
        assert_eq!(json["result"]["Cancun"]["exception"], "TransactionException.INTRINSIC_GAS_TOO_LOW");
        assert_eq!(json["result"]["Cancun"]["intrinsicGas"], "0x00");

        let back: FixtureEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
        assert!(back.verify_hash());
    }

    #[test]
    fn tampered_body_fails_verification() {
        let entry = FixtureEntry::seal(transaction_fixture(ForkId::CANCUN), "t", "Cancun", "evm").unwrap();
        let mut json = serde_json::to_value(&entry).unwrap();
        json["txbytes"] = "0x00".into();
        let tampered: FixtureEntry = serde_json::from_value(json).unwrap();
        assert!(!tampered.verify_hash());
    }
}
