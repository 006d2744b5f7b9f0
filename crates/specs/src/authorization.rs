use crate::signing::{self, RecoverableSignature, SigningError};
use alloy_rlp::{Encodable, Header};
use primitives::{constants::TEST_SECRET_KEY, keccak256, serde_hex, Address, B256, U256};
use serde::{Deserialize, Serialize};

/// EIP-7702 magic byte prefixed to the authorization signing payload.
pub const AUTHORIZATION_MAGIC: u8 = 0x05;

/// An authorization tuple as authored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthorizationTuple {
    /// Chain the authorization is valid on, zero for any chain.
    #[serde(default, with = "serde_hex::quantity")]
    pub chain_id: U256,
    /// Account whose code the authority delegates to.
    pub address: Address,
    /// Authority nonce.
    #[serde(default, with = "serde_hex::u64_quantity")]
    pub nonce: u64,
    /// Secret key of the authority. Defaults to the test sender's key.
    #[serde(default)]
    pub secret_key: Option<B256>,
    /// Explicit `yParity`, overriding the computed signature.
    #[serde(default, with = "serde_hex::option")]
    pub y_parity: Option<u64>,
    /// Explicit `r`.
    #[serde(default, with = "serde_hex::option")]
    pub r: Option<U256>,
    /// Explicit `s`.
    #[serde(default, with = "serde_hex::option")]
    pub s: Option<U256>,
}

impl AuthorizationTuple {
    /// A tuple delegating to `address`, signed by the test sender.
    pub fn new(chain_id: u64, address: Address, nonce: u64) -> Self {
        Self {
            chain_id: U256::from(chain_id),
            address,
            nonce,
            secret_key: None,
            y_parity: None,
            r: None,
            s: None,
        }
    }

    /// Hash the authority signs: `keccak256(0x05 || rlp([chain_id, address, nonce]))`.
    pub fn signature_hash(&self) -> B256 {
        let payload_length = self.chain_id.length() + self.address.length() + self.nonce.length();
        let mut out = Vec::with_capacity(payload_length + 4);
        out.push(AUTHORIZATION_MAGIC);
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.chain_id.encode(&mut out);
        self.address.encode(&mut out);
        self.nonce.encode(&mut out);
        keccak256(out)
    }

    /// Signs the tuple, or takes the explicit signature values.
    ///
    /// With an explicit signature the authority is recovered when possible;
    /// malformed signatures are kept as they are with no authority, since
    /// invalid tuples are legitimate test inputs.
    pub fn sign(&self) -> Result<SignedAuthorization, SigningError> {
        let hash = self.signature_hash();
        let key = self.secret_key.unwrap_or(TEST_SECRET_KEY);
        let (signature, authority) = match (self.y_parity, self.r, self.s) {
            (None, None, None) => (
                signing::sign_hash(&key, &hash)?,
                Some(signing::address_of(&key)?),
            ),
            (y_parity, r, s) => {
                let computed = signing::sign_hash(&key, &hash)?;
                let signature = RecoverableSignature {
                    y_parity: y_parity.map_or(computed.y_parity, |y| y as u8),
                    r: r.unwrap_or(computed.r),
                    s: s.unwrap_or(computed.s),
                };
                (signature, signing::recover(&hash, &signature).ok())
            }
        };
        Ok(SignedAuthorization {
            chain_id: self.chain_id,
            address: self.address,
            nonce: self.nonce,
            y_parity: signature.y_parity,
            r: signature.r,
            s: signature.s,
            signer: authority,
        })
    }
}

/// A signed authorization tuple.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAuthorization {
    /// Chain id.
    #[serde(with = "serde_hex::quantity")]
    pub chain_id: U256,
    /// Delegation target.
    pub address: Address,
    /// Authority nonce.
    #[serde(with = "serde_hex::u64_quantity")]
    pub nonce: u64,
    /// Signature parity.
    #[serde(with = "y_parity")]
    pub y_parity: u8,
    /// Signature `r`.
    #[serde(with = "serde_hex::quantity")]
    pub r: U256,
    /// Signature `s`.
    #[serde(with = "serde_hex::quantity")]
    pub s: U256,
    /// Recovered authority, `None` for invalid signatures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<Address>,
}

impl SignedAuthorization {
    fn payload_length(&self) -> usize {
        self.chain_id.length()
            + self.address.length()
            + self.nonce.length()
            + self.y_parity.length()
            + self.r.length()
            + self.s.length()
    }
}

impl Encodable for SignedAuthorization {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.chain_id.encode(out);
        self.address.encode(out);
        self.nonce.encode(out);
        self.y_parity.encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

mod y_parity {
    use primitives::serde_hex::u64_quantity;
    use serde::{Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &u8, s: S) -> Result<S::Ok, S::Error> {
        u64_quantity::serialize(&(*value as u64), s)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
        let v = u64_quantity::deserialize(d)?;
        u8::try_from(v).map_err(|_| serde::de::Error::custom("yParity out of range"))
    }
}
