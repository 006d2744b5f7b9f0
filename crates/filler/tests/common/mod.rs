//! An in-process evaluator for the filler tests.
#![allow(dead_code)]

use primitives::{keccak256, U256};
use specs::Account;
use std::sync::Mutex;
use t8n::{
    CancelToken, Receipt, RejectedTx, T8nOutput, T8nRequest, T8nResult, TransitionTool,
    TransitionToolError,
};

type Hook = Box<dyn Fn(&mut T8nOutput, &CancelToken) + Send + Sync>;

/// Executes plain value transfers. Gas is checked against the transfer
/// cost but never charged, so balances only move by the transferred value.
/// Every request is recorded.
#[derive(Default)]
pub struct ScriptedTool {
    requests: Mutex<Vec<T8nRequest>>,
    hook: Option<Hook>,
}

impl ScriptedTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `hook` on every output before it is returned.
    pub fn with_hook(hook: impl Fn(&mut T8nOutput, &CancelToken) + Send + Sync + 'static) -> Self {
        Self {
            requests: Mutex::default(),
            hook: Some(Box::new(hook)),
        }
    }

    pub fn requests(&self) -> Vec<T8nRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TransitionTool for ScriptedTool {
    fn name(&self) -> String {
        "scripted".into()
    }

    fn evaluate(
        &self,
        request: &T8nRequest,
        cancel: &CancelToken,
    ) -> Result<T8nOutput, TransitionToolError> {
        self.requests.lock().unwrap().push(request.clone());
        if cancel.is_cancelled() {
            return Err(TransitionToolError::Cancelled);
        }

        let mut alloc = request.alloc.clone();
        let mut receipts = Vec::new();
        let mut rejected = Vec::new();
        let mut gas_used = 0;
        for (index, tx) in request.txs.iter().enumerate() {
            let sender = alloc.get(&tx.sender).cloned().unwrap_or_default();
            let error = if tx.gas_limit < 21_000 {
                Some(format!("intrinsic gas too low: have {}, want 21000", tx.gas_limit))
            } else if tx.nonce < sender.nonce {
                Some(format!("nonce too low: address {}, tx: {} state: {}", tx.sender, tx.nonce, sender.nonce))
            } else if tx.nonce > sender.nonce {
                Some(format!("nonce too high: address {}, tx: {} state: {}", tx.sender, tx.nonce, sender.nonce))
            } else if sender.balance < tx.value {
                Some(format!("insufficient funds for gas * price + value: address {}", tx.sender))
            } else {
                None
            };
            if let Some(error) = error {
                rejected.push(RejectedTx { index, error });
                continue;
            }

            let Some(to) = tx.to else {
                return Err(TransitionToolError::Unsupported("contract creation".into()));
            };
            let from = alloc.get_mut(&tx.sender).expect("sender checked above");
            from.balance -= tx.value;
            from.nonce += 1;
            match alloc.get_mut(&to) {
                Some(account) => account.balance += tx.value,
                None => {
                    alloc.insert(to, Account::with_balance(tx.value));
                }
            }
            gas_used += 21_000;
            receipts.push(Receipt {
                transaction_hash: tx.hash,
                gas_used: 21_000,
                cumulative_gas_used: gas_used,
                status: Some(1),
                ..Default::default()
            });
        }

        if let Some(reward) = request.reward.filter(|r| !r.is_zero()) {
            let coinbase = request.env.current_coinbase;
            match alloc.get_mut(&coinbase) {
                Some(account) => account.balance += reward,
                None => {
                    alloc.insert(coinbase, Account::with_balance(reward));
                }
            }
        }

        let mut output = T8nOutput {
            result: T8nResult {
                state_root: alloc.state_root(),
                logs_hash: keccak256([0xc0]),
                receipts,
                rejected,
                gas_used,
                base_fee: request.env.current_base_fee,
                ..Default::default()
            },
            alloc,
            body: None,
        };
        if let Some(hook) = &self.hook {
            hook(&mut output, cancel);
        }
        Ok(output)
    }
}

/// `n` wei.
pub fn wei(n: u64) -> U256 {
    U256::from(n)
}
