//! Sparse transaction options and pending contract calls

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, U256};

/// Transaction fields given by the caller
///
/// A field left as `None` is resolved later (nonce, from, gas) or left to the
/// node's default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub gas: Option<U256>,
    pub gas_price: Option<U256>,
    pub nonce: Option<U256>,
    pub value: Option<U256>,
    pub data: Option<Bytes>,
}

/// A function call (or contract creation) that has been encoded but not sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    /// Target contract, `None` for a contract creation
    pub to: Option<Address>,
    /// ABI encoded call data, or init code for a creation
    pub data: Bytes,
}

impl ContractCall {
    pub fn function(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            data: data.into(),
        }
    }

    pub fn creation(initcode: impl Into<Bytes>) -> Self {
        Self {
            to: None,
            data: initcode.into(),
        }
    }
}

/// Build transaction options from the values given on the command line,
/// omitting every value that is unset
pub fn build_transaction_options(
    gas: Option<U256>,
    gas_price: Option<U256>,
    nonce: Option<U256>,
    value: Option<U256>,
) -> TransactionOptions {
    TransactionOptions {
        gas,
        gas_price,
        nonce,
        value,
        ..Default::default()
    }
}

impl TransactionOptions {
    /// Increase the nonce by one if there is one
    pub fn increase_nonce(&mut self) {
        if let Some(nonce) = self.nonce.as_mut() {
            *nonce += U256::one();
        }
    }

    /// Target the options at a pending contract call
    pub fn apply_call(&mut self, call: &ContractCall) {
        self.to = call.to;
        self.data = Some(call.data.clone());
    }

    /// Build a legacy transaction request from the set fields
    pub fn to_typed_transaction(&self) -> TypedTransaction {
        let mut tx = TransactionRequest::new();
        if let Some(from) = self.from {
            tx = tx.from(from);
        }
        if let Some(to) = self.to {
            tx = tx.to(to);
        }
        if let Some(gas) = self.gas {
            tx = tx.gas(gas);
        }
        if let Some(gas_price) = self.gas_price {
            tx = tx.gas_price(gas_price);
        }
        if let Some(nonce) = self.nonce {
            tx = tx.nonce(nonce);
        }
        if let Some(value) = self.value {
            tx = tx.value(value);
        }
        if let Some(data) = self.data.clone() {
            tx = tx.data(data);
        }
        TypedTransaction::Legacy(tx)
    }
}
