use crate::spec::Spec;
use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};

/// Errors loading a spec file.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The file could not be read.
    #[error("reading {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The file is not a valid spec document.
    #[error("parsing {path}: {source}")]
    Parse {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// Two specs in the document share a name.
    #[error("{path}: duplicate spec name {name}")]
    DuplicateName {
        /// File path.
        path: String,
        /// The name.
        name: String,
    },
}

/// Contents of a spec file: one spec or a list of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecDocument {
    /// A single spec.
    Single(Box<Spec>),
    /// Several specs.
    Many(Vec<Spec>),
}

impl SpecDocument {
    /// Parses a document from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads and parses `path`, rejecting duplicate spec names.
    pub fn load(path: &Path) -> Result<Vec<Spec>, DocumentError> {
        let display = path.display().to_string();
        let json = fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: display.clone(),
            source,
        })?;
        let specs = Self::from_json(&json)
            .map_err(|source| DocumentError::Parse {
                path: display.clone(),
                source,
            })?
            .into_specs();

        let mut names = std::collections::BTreeSet::new();
        for spec in &specs {
            if !names.insert(spec.name.as_str()) {
                return Err(DocumentError::DuplicateName {
                    path: display,
                    name: spec.name.clone(),
                });
            }
        }
        Ok(specs)
    }

    /// The specs in document order.
    pub fn into_specs(self) -> Vec<Spec> {
        match self {
            Self::Single(spec) => vec![*spec],
            Self::Many(specs) => specs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SpecKind;

    const TRANSFER: &str = r#"{
        "name": "transfer",
        "type": "state_test",
        "pre": { "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b": { "balance": "1000000000000000000" } },
        "transaction": { "value": 10 }
    }"#;

    #[test]
    fn single_and_many() {
        let single = SpecDocument::from_json(TRANSFER).unwrap().into_specs();
        assert_eq!(single.len(), 1);
        assert!(matches!(single[0].kind, SpecKind::StateTest(_)));

        let many = SpecDocument::from_json(&format!("[{TRANSFER}, {}]", TRANSFER.replace("\"transfer\"", "\"other\"")))
            .unwrap()
            .into_specs();
        assert_eq!(many.len(), 2);
        assert_eq!(many[1].name, "other");
    }

    #[test]
    fn code_as_assembly() {
        let json = r#"{
            "name": "sstore",
            "type": "blockchain_test",
            "pre": { "0x0000000000000000000000000000000000001000": { "code": { "asm": "PUSH1 0x01 PUSH1 0x00 SSTORE" } } },
            "blocks": [ { "txs": [ { "to": "0x0000000000000000000000000000000000001000" } ] } ]
        }"#;
        let spec = SpecDocument::from_json(json).unwrap().into_specs().remove(0);
        let SpecKind::BlockchainTest(test) = spec.kind else {
            panic!("expected a blockchain test");
        };
        let (_, account) = test.pre.iter().next().unwrap();
        assert_eq!(account.code.as_ref(), &[0x60, 0x01, 0x60, 0x00, 0x55]);
    }

    #[test]
    fn load_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.json");
        fs::write(&path, format!("[{TRANSFER}, {TRANSFER}]")).unwrap();
        assert!(matches!(
            SpecDocument::load(&path),
            Err(DocumentError::DuplicateName { name, .. }) if name == "transfer"
        ));
        assert!(matches!(
            SpecDocument::load(&dir.path().join("missing.json")),
            Err(DocumentError::Io { .. })
        ));
    }
}
