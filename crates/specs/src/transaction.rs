use crate::{
    account::deserialize_code,
    authorization::{AuthorizationTuple, SignedAuthorization},
    exception::{ExceptionCategory, TransactionException},
    signing::{self, RecoverableSignature, SigningError},
    ResolvedEnvironment,
};
use alloy_rlp::{Encodable, Header};
use forks::{Fork, ForkFeatures, IntrinsicGasInput};
use primitives::{
    constants::{DEFAULT_GAS_PRICE, DEFAULT_RECIPIENT, DEFAULT_TX_GAS_LIMIT, TEST_SECRET_KEY},
    keccak256, serde_hex, Address, Bytes, B256, U256,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// EIP-3860 initcode size limit.
pub const MAX_INITCODE_SIZE: usize = 2 * 24_576;

/// Version byte of a KZG versioned hash.
pub const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;

/// Transaction envelope type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TxType {
    /// Legacy transaction.
    Legacy = 0,
    /// EIP-2930 access list transaction.
    AccessList = 1,
    /// EIP-1559 fee market transaction.
    FeeMarket = 2,
    /// EIP-4844 blob transaction.
    Blob = 3,
    /// EIP-7702 set-code transaction.
    SetCode = 4,
}

impl TxType {
    /// Type byte.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Type from its byte.
    pub const fn from_u8(ty: u8) -> Option<Self> {
        Some(match ty {
            0 => Self::Legacy,
            1 => Self::AccessList,
            2 => Self::FeeMarket,
            3 => Self::Blob,
            4 => Self::SetCode,
            _ => return None,
        })
    }

    /// Whether the type carries EIP-1559 fee fields.
    pub const fn is_fee_market(self) -> bool {
        self as u8 >= 2
    }
}

impl Serialize for TxType {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        serde_hex::u64_quantity::serialize(&(*self as u64), s)
    }
}

impl<'de> Deserialize<'de> for TxType {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let ty = serde_hex::u64_quantity::deserialize(d)?;
        u8::try_from(ty)
            .ok()
            .and_then(TxType::from_u8)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown transaction type {ty}")))
    }
}

/// EIP-2930 access list entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AccessListItem {
    /// Accessed account.
    pub address: Address,
    /// Accessed slots.
    #[serde(default)]
    pub storage_keys: Vec<B256>,
}

impl Encodable for AccessListItem {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        Header {
            list: true,
            payload_length: self.address.length() + self.storage_keys.length(),
        }
        .encode(out);
        self.address.encode(out);
        self.storage_keys.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.address.length() + self.storage_keys.length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

/// Explicit signature values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TxSignature {
    /// `v` for legacy transactions, `yParity` for typed ones.
    #[serde(with = "serde_hex::quantity")]
    pub v: U256,
    /// `r`.
    #[serde(with = "serde_hex::quantity")]
    pub r: U256,
    /// `s`.
    #[serde(with = "serde_hex::quantity")]
    pub s: U256,
}

/// Errors resolving a transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    /// Signing or recovery failed.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// Explicit signature without a recoverable sender.
    #[error("explicit signature does not recover and no sender is given")]
    UnknownSender,
}

/// A transaction as authored. Unset fields get fork-dependent defaults in
/// [`Transaction::resolve`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Transaction {
    /// Envelope type, inferred from the populated fields when unset.
    #[serde(rename = "type")]
    pub ty: Option<TxType>,
    /// Chain id, defaults to the test's chain id.
    #[serde(with = "serde_hex::option")]
    pub chain_id: Option<u64>,
    /// Sender nonce.
    #[serde(with = "serde_hex::u64_quantity")]
    pub nonce: u64,
    /// Gas limit, defaults to the larger of 21000 and the intrinsic cost.
    #[serde(with = "serde_hex::option")]
    pub gas_limit: Option<u64>,
    /// Legacy gas price.
    #[serde(with = "serde_hex::option")]
    pub gas_price: Option<U256>,
    /// EIP-1559 max fee per gas.
    #[serde(with = "serde_hex::option")]
    pub max_fee_per_gas: Option<U256>,
    /// EIP-1559 max priority fee per gas.
    #[serde(with = "serde_hex::option")]
    pub max_priority_fee_per_gas: Option<U256>,
    /// EIP-4844 max fee per blob gas.
    #[serde(with = "serde_hex::option")]
    pub max_fee_per_blob_gas: Option<U256>,
    /// Recipient, `None` for contract creation.
    #[serde(deserialize_with = "deserialize_target")]
    pub to: Option<Address>,
    /// Transferred value.
    #[serde(with = "serde_hex::quantity")]
    pub value: U256,
    /// Calldata or initcode.
    #[serde(deserialize_with = "deserialize_code")]
    pub data: Bytes,
    /// Access list.
    pub access_list: Option<Vec<AccessListItem>>,
    /// Blob versioned hashes.
    pub blob_versioned_hashes: Option<Vec<B256>>,
    /// Authorization tuples.
    pub authorization_list: Option<Vec<AuthorizationTuple>>,
    /// Whether a legacy transaction is EIP-155 protected. Defaults to whether
    /// the fork supports EIP-155.
    pub protected: Option<bool>,
    /// Sender secret key, defaults to the test sender's.
    pub secret_key: Option<B256>,
    /// Explicit signature, overriding the computed one.
    pub signature: Option<TxSignature>,
    /// Sender to record when an explicit signature does not recover.
    pub sender: Option<Address>,
    /// Exception the transaction is expected to raise.
    #[serde(rename = "expectException")]
    pub error: Option<ExceptionCategory>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            ty: None,
            chain_id: None,
            nonce: 0,
            gas_limit: None,
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            max_fee_per_blob_gas: None,
            to: Some(DEFAULT_RECIPIENT),
            value: U256::ZERO,
            data: Bytes::new(),
            access_list: None,
            blob_versioned_hashes: None,
            authorization_list: None,
            protected: None,
            secret_key: None,
            signature: None,
            sender: None,
            error: None,
        }
    }
}

/// Accepts an address, or `null` / `""` for contract creation.
fn deserialize_target<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Address>, D::Error> {
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(s) if s.is_empty() || s == "0x" => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

impl Transaction {
    /// Envelope type: the explicit one, or the lowest type able to carry the
    /// populated fields.
    pub fn tx_type(&self) -> TxType {
        if let Some(ty) = self.ty {
            return ty;
        }
        if self.authorization_list.is_some() {
            TxType::SetCode
        } else if self.blob_versioned_hashes.is_some() || self.max_fee_per_blob_gas.is_some() {
            TxType::Blob
        } else if self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some() {
            TxType::FeeMarket
        } else if self.access_list.is_some() {
            TxType::AccessList
        } else {
            TxType::Legacy
        }
    }

    /// Returns `true` if the transaction is expected to be rejected.
    pub fn expects_error(&self) -> bool {
        self.error.is_some()
    }

    /// Intrinsic gas input of the transaction.
    pub fn intrinsic_gas_input(&self) -> IntrinsicGasInput<'_> {
        let access_list = self.access_list.as_deref().unwrap_or_default();
        IntrinsicGasInput {
            calldata: &self.data,
            contract_creation: self.to.is_none(),
            access_list_addresses: access_list.len() as u64,
            access_list_storage_keys: access_list
                .iter()
                .map(|item| item.storage_keys.len() as u64)
                .sum(),
            authorizations: self.authorization_list.as_ref().map_or(0, Vec::len) as u64,
        }
    }

    /// Fills in defaults for `fork`, signs and encodes the transaction.
    ///
    /// Fee fields default to the lowest values `env` accepts: the legacy gas
    /// price to the larger of 10 and the base fee, the max fee to the base
    /// fee, the priority fee to zero and the max blob fee to the current blob
    /// base fee.
    pub fn resolve(
        &self,
        fork: &Fork,
        chain_id: u64,
        env: &ResolvedEnvironment,
    ) -> Result<ResolvedTransaction, TransactionError> {
        let tx_type = self.tx_type();
        let chain_id = self.chain_id.unwrap_or(chain_id);
        let base_fee = U256::from(env.base_fee());

        let (gas_price, max_fee_per_gas, max_priority_fee_per_gas) = if tx_type.is_fee_market() {
            let priority = self.max_priority_fee_per_gas.unwrap_or_default();
            let max_fee = self.max_fee_per_gas.unwrap_or(base_fee.max(priority));
            (None, Some(max_fee), Some(priority))
        } else {
            let price = self
                .gas_price
                .unwrap_or(U256::from(DEFAULT_GAS_PRICE).max(base_fee));
            (Some(price), None, None)
        };

        let max_fee_per_blob_gas = (tx_type == TxType::Blob).then(|| {
            self.max_fee_per_blob_gas.unwrap_or_else(|| {
                U256::from(env.blob_base_fee(fork).unwrap_or(1))
            })
        });
        let blob_versioned_hashes = (tx_type == TxType::Blob)
            .then(|| self.blob_versioned_hashes.clone().unwrap_or_default());
        let access_list =
            (tx_type != TxType::Legacy).then(|| self.access_list.clone().unwrap_or_default());
        let authorization_list = match (tx_type, &self.authorization_list) {
            (TxType::SetCode, list) => Some(
                list.iter()
                    .flatten()
                    .map(AuthorizationTuple::sign)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            _ => None,
        };

        let gas_limit = self.gas_limit.unwrap_or_else(|| {
            DEFAULT_TX_GAS_LIMIT.max(fork.intrinsic_gas(&self.intrinsic_gas_input()))
        });

        let protected = tx_type != TxType::Legacy
            || self
                .protected
                .unwrap_or_else(|| fork.supports(ForkFeatures::EIP155));

        let mut tx = ResolvedTransaction {
            tx_type,
            chain_id: (tx_type != TxType::Legacy || protected).then_some(chain_id),
            nonce: self.nonce,
            gas_limit,
            gas_price,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            max_fee_per_blob_gas,
            to: self.to,
            value: self.value,
            data: self.data.clone(),
            access_list,
            blob_versioned_hashes,
            authorization_list,
            v: U256::ZERO,
            r: U256::ZERO,
            s: U256::ZERO,
            sender: Address::ZERO,
            hash: B256::ZERO,
            encoded: Bytes::new(),
            secret_key: None,
        };

        let sighash = keccak256(tx.signing_payload());
        match self.signature {
            Some(signature) => {
                tx.v = signature.v;
                tx.r = signature.r;
                tx.s = signature.s;
                let recovered = tx
                    .y_parity()
                    .and_then(|y_parity| {
                        signing::recover(
                            &sighash,
                            &RecoverableSignature {
                                y_parity,
                                r: signature.r,
                                s: signature.s,
                            },
                        )
                        .ok()
                    });
                tx.sender = recovered
                    .or(self.sender)
                    .ok_or(TransactionError::UnknownSender)?;
            }
            None => {
                let key = self.secret_key.unwrap_or(TEST_SECRET_KEY);
                let signature = signing::sign_hash(&key, &sighash)?;
                let y_parity = U256::from(signature.y_parity);
                tx.v = match (tx_type, tx.chain_id) {
                    (TxType::Legacy, Some(id)) => U256::from(35 + 2 * id) + y_parity,
                    (TxType::Legacy, None) => U256::from(27) + y_parity,
                    _ => y_parity,
                };
                tx.r = signature.r;
                tx.s = signature.s;
                tx.sender = signing::address_of(&key)?;
                tx.secret_key = Some(key);
            }
        }

        tx.encoded = tx.encode_signed().into();
        tx.hash = keccak256(&tx.encoded);
        Ok(tx)
    }
}

/// A fully populated, signed transaction.
///
/// Serializes in the evaluator's transaction format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTransaction {
    /// Envelope type.
    #[serde(rename = "type")]
    pub tx_type: TxType,
    /// Chain id, `None` for unprotected legacy transactions.
    #[serde(with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Nonce.
    #[serde(with = "serde_hex::u64_quantity")]
    pub nonce: u64,
    /// Gas limit.
    #[serde(rename = "gas", with = "serde_hex::u64_quantity")]
    pub gas_limit: u64,
    /// Legacy gas price.
    #[serde(with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    /// Max fee per gas.
    #[serde(with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    /// Max priority fee per gas.
    #[serde(with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    /// Max fee per blob gas.
    #[serde(with = "serde_hex::option", skip_serializing_if = "Option::is_none")]
    pub max_fee_per_blob_gas: Option<U256>,
    /// Recipient, `None` for creation.
    pub to: Option<Address>,
    /// Value.
    #[serde(with = "serde_hex::quantity")]
    pub value: U256,
    /// Calldata.
    #[serde(rename = "input")]
    pub data: Bytes,
    /// Access list, typed transactions only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_list: Option<Vec<AccessListItem>>,
    /// Blob versioned hashes, blob transactions only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_versioned_hashes: Option<Vec<B256>>,
    /// Signed authorizations, set-code transactions only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_list: Option<Vec<SignedAuthorization>>,
    /// `v`, or `yParity` for typed transactions.
    #[serde(with = "serde_hex::quantity")]
    pub v: U256,
    /// `r`.
    #[serde(with = "serde_hex::quantity")]
    pub r: U256,
    /// `s`.
    #[serde(with = "serde_hex::quantity")]
    pub s: U256,
    /// Sender.
    pub sender: Address,
    /// Transaction hash.
    pub hash: B256,
    /// EIP-2718 encoding.
    #[serde(skip)]
    pub encoded: Bytes,
    /// Secret key the transaction was signed with, if signed here.
    #[serde(skip)]
    pub secret_key: Option<B256>,
}

/// RLP encoding of the recipient: the address, or the empty string for
/// creation.
struct Target(Option<Address>);

impl Encodable for Target {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        match &self.0 {
            Some(address) => address.encode(out),
            None => out.put_u8(alloy_rlp::EMPTY_STRING_CODE),
        }
    }

    fn length(&self) -> usize {
        self.0.as_ref().map_or(1, Encodable::length)
    }
}

fn rlp_list(fields: &[&dyn Encodable]) -> Vec<u8> {
    let payload_length = fields.iter().map(|f| f.length()).sum();
    let mut out = Vec::with_capacity(payload_length + 9);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    for field in fields {
        field.encode(&mut out);
    }
    out
}

impl ResolvedTransaction {
    /// Signature parity derived from `v`, `None` when `v` is not a valid
    /// value for the envelope type.
    pub fn y_parity(&self) -> Option<u8> {
        let v = u64::try_from(self.v).ok()?;
        match (self.tx_type, self.chain_id) {
            (TxType::Legacy, Some(id)) => v.checked_sub(35 + 2 * id).filter(|p| *p <= 1),
            (TxType::Legacy, None) => v.checked_sub(27).filter(|p| *p <= 1),
            _ => Some(v).filter(|p| *p <= 1),
        }
        .map(|p| p as u8)
    }

    /// Intrinsic gas input of the transaction.
    pub fn intrinsic_gas_input(&self) -> IntrinsicGasInput<'_> {
        let access_list = self.access_list.as_deref().unwrap_or_default();
        IntrinsicGasInput {
            calldata: &self.data,
            contract_creation: self.to.is_none(),
            access_list_addresses: access_list.len() as u64,
            access_list_storage_keys: access_list
                .iter()
                .map(|item| item.storage_keys.len() as u64)
                .sum(),
            authorizations: self.authorization_list.as_ref().map_or(0, Vec::len) as u64,
        }
    }

    /// Minimum gas limit under `fork`.
    pub fn intrinsic_gas(&self, fork: &Fork) -> u64 {
        fork.intrinsic_gas(&self.intrinsic_gas_input())
    }

    /// Number of blobs carried.
    pub fn blob_count(&self) -> usize {
        self.blob_versioned_hashes.as_ref().map_or(0, Vec::len)
    }

    /// Checks the stateless validity rules of `fork`: type support, gas
    /// limit against intrinsic cost and cap, initcode size, blob and
    /// authorization list shape, fee ordering.
    ///
    /// Returns the first rule broken. Rules that need the sender's account
    /// (nonce, balance) are left to the evaluator.
    pub fn validate(&self, fork: &Fork, env: &ResolvedEnvironment) -> Option<TransactionException> {
        use TransactionException::*;

        match self.tx_type {
            TxType::Blob if !fork.supports(ForkFeatures::BLOBS) => return Some(TYPE_3_TX_PRE_FORK),
            TxType::SetCode if !fork.supports(ForkFeatures::SET_CODE) => {
                return Some(TYPE_4_TX_PRE_FORK)
            }
            ty if !fork.supports_tx_type(ty.as_u8()) => return Some(TYPE_NOT_SUPPORTED),
            _ => {}
        }
        if self.tx_type == TxType::Legacy
            && self.chain_id.is_some()
            && !fork.supports(ForkFeatures::EIP155)
        {
            return Some(INVALID_CHAINID);
        }
        if self.nonce == u64::MAX {
            return Some(NONCE_IS_MAX);
        }
        if let Some(cap) = fork.tx_gas_limit_cap() {
            if self.gas_limit > cap {
                return Some(GAS_LIMIT_EXCEEDS_MAXIMUM);
            }
        }
        let input = self.intrinsic_gas_input();
        let gas = fork.gas();
        if self.gas_limit < gas.intrinsic_gas(&input) {
            return Some(INTRINSIC_GAS_TOO_LOW);
        }
        if self.gas_limit < gas.calldata_floor(&input) {
            return Some(INTRINSIC_GAS_BELOW_FLOOR_GAS_COST);
        }
        if self.to.is_none()
            && fork.supports(ForkFeatures::INITCODE_LIMIT)
            && self.data.len() > MAX_INITCODE_SIZE
        {
            return Some(INITCODE_SIZE_EXCEEDED);
        }
        if self.gas_limit > env.current_gas_limit {
            return Some(GAS_ALLOWANCE_EXCEEDED);
        }
        if let (Some(max_fee), Some(priority)) =
            (self.max_fee_per_gas, self.max_priority_fee_per_gas)
        {
            if priority > max_fee {
                return Some(PRIORITY_GREATER_THAN_MAX_FEE_PER_GAS);
            }
        }
        let offered = self.max_fee_per_gas.or(self.gas_price).unwrap_or_default();
        if let Some(base_fee) = env.current_base_fee {
            if offered < U256::from(base_fee) {
                return Some(INSUFFICIENT_MAX_FEE_PER_GAS);
            }
        }
        if offered.checked_mul(U256::from(self.gas_limit)).is_none() {
            return Some(GASLIMIT_PRICE_PRODUCT_OVERFLOW);
        }
        if self.tx_type == TxType::Blob {
            if self.to.is_none() {
                return Some(TYPE_3_TX_CONTRACT_CREATION);
            }
            let hashes = self.blob_versioned_hashes.as_deref().unwrap_or_default();
            if hashes.is_empty() {
                return Some(TYPE_3_TX_ZERO_BLOBS);
            }
            if hashes.iter().any(|h| h[0] != VERSIONED_HASH_VERSION_KZG) {
                return Some(TYPE_3_TX_INVALID_BLOB_VERSIONED_HASH);
            }
            if let Some(blobs) = fork.blobs() {
                if hashes.len() as u64 > blobs.max_blobs_per_block {
                    return Some(TYPE_3_TX_BLOB_COUNT_EXCEEDED);
                }
            }
            if let (Some(max), Some(current)) = (self.max_fee_per_blob_gas, env.blob_base_fee(fork))
            {
                if max < U256::from(current) {
                    return Some(INSUFFICIENT_MAX_FEE_PER_BLOB_GAS);
                }
            }
        }
        if self.tx_type == TxType::SetCode {
            if self.to.is_none() {
                return Some(TYPE_4_TX_CONTRACT_CREATION);
            }
            if self.authorization_list.as_ref().map_or(true, Vec::is_empty) {
                return Some(TYPE_4_EMPTY_AUTHORIZATION_LIST);
            }
        }
        None
    }

    /// The payload the sender signs.
    fn signing_payload(&self) -> Vec<u8> {
        let to = Target(self.to);
        let chain_id = self.chain_id.unwrap_or_default();
        let gas_price = self.gas_price.unwrap_or_default();
        let max_fee = self.max_fee_per_gas.unwrap_or_default();
        let priority = self.max_priority_fee_per_gas.unwrap_or_default();
        let access_list = self.access_list.clone().unwrap_or_default();

        match self.tx_type {
            TxType::Legacy => match self.chain_id {
                Some(id) => rlp_list(&[
                    &self.nonce,
                    &gas_price,
                    &self.gas_limit,
                    &to,
                    &self.value,
                    &self.data,
                    &id,
                    &0u8,
                    &0u8,
                ]),
                None => rlp_list(&[
                    &self.nonce,
                    &gas_price,
                    &self.gas_limit,
                    &to,
                    &self.value,
                    &self.data,
                ]),
            },
            TxType::AccessList => typed(
                1,
                &[
                    &chain_id,
                    &self.nonce,
                    &gas_price,
                    &self.gas_limit,
                    &to,
                    &self.value,
                    &self.data,
                    &access_list,
                ],
            ),
            TxType::FeeMarket => typed(
                2,
                &[
                    &chain_id,
                    &self.nonce,
                    &priority,
                    &max_fee,
                    &self.gas_limit,
                    &to,
                    &self.value,
                    &self.data,
                    &access_list,
                ],
            ),
            TxType::Blob => typed(
                3,
                &[
                    &chain_id,
                    &self.nonce,
                    &priority,
                    &max_fee,
                    &self.gas_limit,
                    &to,
                    &self.value,
                    &self.data,
                    &access_list,
                    &self.max_fee_per_blob_gas.unwrap_or_default(),
                    &self.blob_versioned_hashes.clone().unwrap_or_default(),
                ],
            ),
            TxType::SetCode => typed(
                4,
                &[
                    &chain_id,
                    &self.nonce,
                    &priority,
                    &max_fee,
                    &self.gas_limit,
                    &to,
                    &self.value,
                    &self.data,
                    &access_list,
                    &self.authorization_list.clone().unwrap_or_default(),
                ],
            ),
        }
    }

    /// EIP-2718 encoding of the signed transaction.
    fn encode_signed(&self) -> Vec<u8> {
        let to = Target(self.to);
        let chain_id = self.chain_id.unwrap_or_default();
        let gas_price = self.gas_price.unwrap_or_default();
        let max_fee = self.max_fee_per_gas.unwrap_or_default();
        let priority = self.max_priority_fee_per_gas.unwrap_or_default();
        let access_list = self.access_list.clone().unwrap_or_default();
        let max_fee_per_blob_gas = self.max_fee_per_blob_gas.unwrap_or_default();
        let blob_hashes = self.blob_versioned_hashes.clone().unwrap_or_default();
        let authorizations = self.authorization_list.clone().unwrap_or_default();

        let mut fields: Vec<&dyn Encodable> = match self.tx_type {
            TxType::Legacy => vec![
                &self.nonce,
                &gas_price,
                &self.gas_limit,
                &to,
                &self.value,
                &self.data,
            ],
            TxType::AccessList => vec![
                &chain_id,
                &self.nonce,
                &gas_price,
                &self.gas_limit,
                &to,
                &self.value,
                &self.data,
                &access_list,
            ],
            TxType::FeeMarket | TxType::Blob | TxType::SetCode => vec![
                &chain_id,
                &self.nonce,
                &priority,
                &max_fee,
                &self.gas_limit,
                &to,
                &self.value,
                &self.data,
                &access_list,
            ],
        };
        match self.tx_type {
            TxType::Blob => {
                fields.push(&max_fee_per_blob_gas);
                fields.push(&blob_hashes);
            }
            TxType::SetCode => fields.push(&authorizations),
            _ => {}
        }
        fields.extend([&self.v as &dyn Encodable, &self.r, &self.s]);

        match self.tx_type {
            TxType::Legacy => rlp_list(&fields),
            ty => typed(ty.as_u8(), &fields),
        }
    }

    /// Length of the transaction inside a block body: legacy transactions
    /// are inlined, typed ones are wrapped in an RLP string.
    pub fn block_body_length(&self) -> usize {
        match self.tx_type {
            TxType::Legacy => self.encoded.len(),
            _ => self.encoded.as_ref().length(),
        }
    }

    /// Appends the transaction as it appears in a block body.
    pub fn encode_for_block_body(&self, out: &mut dyn alloy_rlp::BufMut) {
        match self.tx_type {
            TxType::Legacy => out.put_slice(&self.encoded),
            _ => self.encoded.as_ref().encode(out),
        }
    }
}

fn typed(ty: u8, fields: &[&dyn Encodable]) -> Vec<u8> {
    let body = rlp_list(fields);
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(ty);
    out.extend_from_slice(&body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Environment;
    use forks::ForkRegistry;
    use primitives::{
        address,
        constants::TEST_SENDER,
        hardfork::ForkId::{self, *},
    };
    use rstest::rstest;

    fn resolve(tx: &Transaction, id: ForkId) -> ResolvedTransaction {
        let fork = ForkRegistry::mainnet().get(id).unwrap();
        let env = Environment::default().resolve(fork);
        tx.resolve(fork, 1, &env).unwrap()
    }

    #[rstest]
    #[case(Transaction::default(), TxType::Legacy)]
    #[case(Transaction { access_list: Some(vec![]), ..Default::default() }, TxType::AccessList)]
    #[case(Transaction { max_fee_per_gas: Some(U256::from(10)), ..Default::default() }, TxType::FeeMarket)]
    #[case(Transaction { blob_versioned_hashes: Some(vec![]), ..Default::default() }, TxType::Blob)]
    #[case(Transaction { authorization_list: Some(vec![]), ..Default::default() }, TxType::SetCode)]
    #[case(Transaction { ty: Some(TxType::FeeMarket), ..Default::default() }, TxType::FeeMarket)]
    fn type_inference(#[case] tx: Transaction, #[case] expected: TxType) {
        assert_eq!(tx.tx_type(), expected);
    }

    #[test]
    fn legacy_eip155_signature() {
        let tx = resolve(&Transaction::default(), CANCUN);
        assert_eq!(tx.sender, TEST_SENDER);
        assert_eq!(tx.chain_id, Some(1));
        assert!(tx.v == U256::from(37) || tx.v == U256::from(38));
        assert_eq!(tx.gas_price, Some(U256::from(DEFAULT_GAS_PRICE)));
        assert_eq!(tx.gas_limit, DEFAULT_TX_GAS_LIMIT);
        assert_eq!(tx.hash, keccak256(&tx.encoded));
        // legacy encoding is a bare RLP list
        assert!(tx.encoded[0] >= 0xc0);
    }

    #[test]
    fn legacy_unprotected_before_spurious_dragon() {
        let tx = resolve(&Transaction::default(), HOMESTEAD);
        assert_eq!(tx.chain_id, None);
        assert!(tx.v == U256::from(27) || tx.v == U256::from(28));
    }

    #[test]
    fn typed_envelopes() {
        let tx = resolve(
            &Transaction {
                max_priority_fee_per_gas: Some(U256::from(1)),
                ..Default::default()
            },
            LONDON,
        );
        assert_eq!(tx.encoded[0], 2);
        assert_eq!(tx.max_fee_per_gas, Some(U256::from(7)));
        assert!(tx.v <= U256::from(1));

        let blob = resolve(
            &Transaction {
                blob_versioned_hashes: Some(vec![B256::with_last_byte(1)]),
                ..Default::default()
            },
            CANCUN,
        );
        assert_eq!(blob.encoded[0], 3);
        assert_eq!(blob.max_fee_per_blob_gas, Some(U256::from(1)));
    }

    #[test]
    fn set_code_signs_authorizations() {
        let tx = resolve(
            &Transaction {
                authorization_list: Some(vec![AuthorizationTuple::new(
                    1,
                    address!("0000000000000000000000000000000000001000"),
                    0,
                )]),
                ..Default::default()
            },
            PRAGUE,
        );
        assert_eq!(tx.encoded[0], 4);
        let auths = tx.authorization_list.as_ref().unwrap();
        assert_eq!(auths[0].signer, Some(TEST_SENDER));
        assert_eq!(tx.gas_limit, 21_000 + 25_000);
    }

    #[test]
    fn default_gas_limit_covers_intrinsic_cost() {
        let tx = resolve(
            &Transaction {
                data: Bytes::from(vec![0xff; 100]),
                ..Default::default()
            },
            PRAGUE,
        );
        assert_eq!(tx.gas_limit, 21_000 + 100 * 40);
        assert_eq!(tx.intrinsic_gas(ForkRegistry::mainnet().get(PRAGUE).unwrap()), tx.gas_limit);
    }

    #[test]
    fn explicit_signature_recovers_sender() {
        let signed = resolve(&Transaction::default(), CANCUN);
        let replay = resolve(
            &Transaction {
                signature: Some(TxSignature {
                    v: signed.v,
                    r: signed.r,
                    s: signed.s,
                }),
                ..Default::default()
            },
            CANCUN,
        );
        assert_eq!(replay.sender, TEST_SENDER);
        assert_eq!(replay.hash, signed.hash);

        let fork = ForkRegistry::mainnet().get(CANCUN).unwrap();
        let env = Environment::default().resolve(fork);
        let garbage = Transaction {
            signature: Some(TxSignature {
                v: U256::from(99),
                r: U256::from(1),
                s: U256::from(1),
            }),
            ..Default::default()
        };
        assert_eq!(
            garbage.resolve(fork, 1, &env),
            Err(TransactionError::UnknownSender)
        );
    }

    #[rstest]
    #[case(Transaction { gas_limit: Some(20_999), ..Default::default() }, CANCUN, Some(TransactionException::INTRINSIC_GAS_TOO_LOW))]
    #[case(Transaction { max_fee_per_gas: Some(U256::from(7)), ..Default::default() }, BERLIN, Some(TransactionException::TYPE_NOT_SUPPORTED))]
    #[case(Transaction { blob_versioned_hashes: Some(vec![B256::with_last_byte(1)]), ..Default::default() }, SHANGHAI, Some(TransactionException::TYPE_3_TX_PRE_FORK))]
    #[case(Transaction { blob_versioned_hashes: Some(vec![]), ..Default::default() }, CANCUN, Some(TransactionException::TYPE_3_TX_ZERO_BLOBS))]
    #[case(Transaction { gas_price: Some(U256::from(1)), ..Default::default() }, LONDON, Some(TransactionException::INSUFFICIENT_MAX_FEE_PER_GAS))]
    #[case(Transaction { authorization_list: Some(vec![]), ..Default::default() }, PRAGUE, Some(TransactionException::TYPE_4_EMPTY_AUTHORIZATION_LIST))]
    #[case(Transaction { gas_limit: Some(1 << 25), ..Default::default() }, OSAKA, Some(TransactionException::GAS_LIMIT_EXCEEDS_MAXIMUM))]
    #[case(Transaction::default(), CANCUN, None)]
    fn stateless_validation(
        #[case] tx: Transaction,
        #[case] id: ForkId,
        #[case] expected: Option<TransactionException>,
    ) {
        let fork = ForkRegistry::mainnet().get(id).unwrap();
        let env = Environment::default().resolve(fork);
        let resolved = tx.resolve(fork, 1, &env).unwrap();
        assert_eq!(resolved.validate(fork, &env), expected);
    }

    #[test]
    fn creation_target() {
        let tx: Transaction = serde_json::from_str(r#"{"to": null, "data": "0x00"}"#).unwrap();
        assert_eq!(tx.to, None);
        let tx: Transaction = serde_json::from_str(r#"{"to": ""}"#).unwrap();
        assert_eq!(tx.to, None);
        let tx: Transaction = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(tx.to, Some(DEFAULT_RECIPIENT));
    }
}
