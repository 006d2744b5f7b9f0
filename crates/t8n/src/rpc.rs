//! Live-network backend: executes requests by sending transactions to a
//! node over JSON-RPC.

use crate::{
    types::{Receipt, RejectedTx, T8nOutput, T8nRequest, T8nResult},
    CancelToken, TransitionTool, TransitionToolError,
};
use forks::ForkRegistry;
use primitives::{
    constants::DEFAULT_TX_GAS_LIMIT, serde_hex, Address, Bytes, Quantity, Storage, B256, U256,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use specs::{signing, Account, Alloc, ResolvedTransaction, Transaction, TxType};
use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, info};

/// Executes requests against a live node.
///
/// Pre-state accounts are funded from a seed key, the request's signed
/// transactions are submitted as they are, and the post-state is read back
/// for every account the request touches. Only plain funded accounts can be
/// set up this way; pre-states with code, storage or nonces are rejected.
#[derive(Debug)]
pub struct RpcBackend {
    client: reqwest::blocking::Client,
    endpoint: String,
    chain_id: u64,
    seed_key: B256,
    receipt_timeout: Duration,
    poll_interval: Duration,
    request_id: AtomicU64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_hash: B256,
    #[serde(with = "serde_hex::u64_quantity")]
    gas_used: u64,
    #[serde(with = "serde_hex::u64_quantity")]
    cumulative_gas_used: u64,
    #[serde(default, with = "serde_hex::option")]
    status: Option<u64>,
    #[serde(default)]
    contract_address: Option<Address>,
    #[serde(default)]
    logs: Vec<Value>,
}

impl From<RpcReceipt> for Receipt {
    fn from(r: RpcReceipt) -> Self {
        Receipt {
            transaction_hash: r.transaction_hash,
            gas_used: r.gas_used,
            cumulative_gas_used: r.cumulative_gas_used,
            status: r.status,
            contract_address: r.contract_address,
            logs: r.logs,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlock {
    state_root: B256,
    receipts_root: B256,
    transactions_root: B256,
    #[serde(with = "serde_hex::u64_quantity")]
    gas_used: u64,
    #[serde(default, with = "serde_hex::option")]
    base_fee_per_gas: Option<u64>,
}

fn quantity<T: Quantity>(value: Value) -> Result<T, TransitionToolError> {
    let s = value.as_str().ok_or_else(|| {
        TransitionToolError::Transport(format!("expected a quantity, got {value}"))
    })?;
    T::parse_lenient(s).map_err(|e| TransitionToolError::Transport(format!("{e}: {s}")))
}

impl RpcBackend {
    /// A backend for the node at `endpoint`, funding accounts from
    /// `seed_key`.
    pub fn new(endpoint: impl Into<String>, chain_id: u64, seed_key: B256) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: endpoint.into(),
            chain_id,
            seed_key,
            receipt_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            request_id: AtomicU64::new(1),
        }
    }

    /// How long to wait for a transaction to be included.
    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, TransitionToolError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let response: JsonRpcResponse = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .and_then(|r| r.json())
            .map_err(|e| TransitionToolError::Transport(format!("{method}: {e}")))?;
        if let Some(error) = response.error {
            return Err(TransitionToolError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        serde_json::from_value(response.result.unwrap_or(Value::Null))
            .map_err(|e| TransitionToolError::Transport(format!("{method}: {e}")))
    }

    fn quantity_call<T: Quantity>(&self, method: &str, params: Value) -> Result<T, TransitionToolError> {
        quantity(self.call(method, params)?)
    }

    fn send_raw(&self, tx: &ResolvedTransaction) -> Result<B256, TransitionToolError> {
        self.call("eth_sendRawTransaction", json!([tx.encoded]))
    }

    fn wait_for_receipt(&self, hash: B256, cancel: &CancelToken) -> Result<RpcReceipt, TransitionToolError> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(TransitionToolError::Cancelled);
            }
            if let Some(receipt) =
                self.call::<Option<RpcReceipt>>("eth_getTransactionReceipt", json!([hash]))?
            {
                return Ok(receipt);
            }
            if started.elapsed() >= self.receipt_timeout {
                return Err(TransitionToolError::Timeout(self.receipt_timeout));
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Sends value from the seed account so that every pre-state account
    /// holds at least its declared balance.
    fn fund(&self, request: &T8nRequest, cancel: &CancelToken) -> Result<(), TransitionToolError> {
        let fork = ForkRegistry::mainnet()
            .iter()
            .find(|f| f.t8n_name() == request.fork)
            .ok_or_else(|| TransitionToolError::Unsupported(format!("fork {}", request.fork)))?;
        let seed = signing::address_of(&self.seed_key)
            .map_err(|e| TransitionToolError::Unsupported(e.to_string()))?;
        let mut nonce: u64 = self.quantity_call("eth_getTransactionCount", json!([seed, "pending"]))?;
        let gas_price: U256 = self.quantity_call("eth_gasPrice", json!([]))?;

        let mut pending = Vec::new();
        for (address, account) in &request.alloc {
            let live: U256 = self.quantity_call("eth_getBalance", json!([address, "latest"]))?;
            if live >= account.balance {
                continue;
            }
            let funding = Transaction {
                ty: Some(TxType::Legacy),
                nonce,
                gas_limit: Some(DEFAULT_TX_GAS_LIMIT),
                gas_price: Some(gas_price),
                to: Some(*address),
                value: account.balance - live,
                protected: Some(true),
                secret_key: Some(self.seed_key),
                ..Default::default()
            }
            .resolve(fork, self.chain_id, &request.env)
            .map_err(|e| TransitionToolError::Unsupported(e.to_string()))?;
            pending.push(self.send_raw(&funding)?);
            nonce += 1;
        }
        debug!(accounts = pending.len(), "funding pre-state accounts");
        for hash in pending {
            self.wait_for_receipt(hash, cancel)?;
        }
        Ok(())
    }

    fn read_account(&self, address: Address, slots: &[U256]) -> Result<Account, TransitionToolError> {
        let mut storage = Storage::new();
        for slot in slots {
            let value: B256 = self.call("eth_getStorageAt", json!([address, slot, "latest"]))?;
            storage.insert(*slot, U256::from_be_bytes(value.0));
        }
        Ok(Account {
            balance: self.quantity_call("eth_getBalance", json!([address, "latest"]))?,
            nonce: self.quantity_call("eth_getTransactionCount", json!([address, "latest"]))?,
            code: self.call::<Bytes>("eth_getCode", json!([address, "latest"]))?,
            storage,
        })
    }
}

impl TransitionTool for RpcBackend {
    fn name(&self) -> String {
        self.endpoint.clone()
    }

    fn computes_state_root(&self) -> bool {
        false
    }

    fn evaluate(
        &self,
        request: &T8nRequest,
        cancel: &CancelToken,
    ) -> Result<T8nOutput, TransitionToolError> {
        if request.chain_id != self.chain_id {
            return Err(TransitionToolError::Unsupported(format!(
                "chain id {} on a chain with id {}",
                request.chain_id, self.chain_id
            )));
        }
        if let Some((address, _)) = request
            .alloc
            .iter()
            .find(|(_, a)| !a.code.is_empty() || !a.storage.is_empty() || a.nonce != 0)
        {
            return Err(TransitionToolError::Unsupported(format!(
                "pre-state account {address} with code, storage or nonce"
            )));
        }

        self.fund(request, cancel)?;

        let mut rejected = Vec::new();
        let mut sent = Vec::new();
        for (index, tx) in request.txs.iter().enumerate() {
            match self.send_raw(tx) {
                Ok(hash) => sent.push(hash),
                // only an error object from the node is a rejection
                Err(TransitionToolError::Rpc { message, .. }) => {
                    rejected.push(RejectedTx { index, error: message })
                }
                Err(err) => return Err(err),
            }
        }

        let mut receipts = Vec::with_capacity(sent.len());
        for hash in sent {
            receipts.push(self.wait_for_receipt(hash, cancel)?);
        }

        let mut result = T8nResult {
            gas_used: receipts.iter().map(|r| r.gas_used).sum(),
            rejected,
            ..Default::default()
        };
        if let Some(last) = receipts.last() {
            let block: RpcBlock =
                self.call("eth_getBlockByHash", json!([last.block_hash, false]))?;
            result.state_root = block.state_root;
            result.receipts_root = block.receipts_root;
            result.tx_root = block.transactions_root;
            result.base_fee = block.base_fee_per_gas;
            debug!(block_gas_used = block.gas_used, "read inclusion block");
        }

        let mut touched: BTreeSet<Address> = request.alloc.addresses().copied().collect();
        touched.extend(request.watched.keys().copied());
        touched.extend(request.txs.iter().filter_map(|tx| tx.to));
        touched.extend(request.txs.iter().map(|tx| tx.sender));
        touched.extend(receipts.iter().filter_map(|r| r.contract_address));

        let mut alloc = Alloc::new();
        for address in touched {
            let slots = request.watched.get(&address).map_or(&[][..], Vec::as_slice);
            let account = self.read_account(address, slots)?;
            if !account.is_empty() || !account.storage.without_zeros().is_empty() {
                alloc.insert(address, account);
            }
        }
        result.receipts = receipts.into_iter().map(Receipt::from).collect();
        info!(
            case = %request.case_id,
            included = result.receipts.len(),
            rejected = result.rejected.len(),
            "executed on live network"
        );

        Ok(T8nOutput {
            alloc,
            result,
            body: None,
        })
    }
}
