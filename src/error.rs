//! Error types for deploy-tools

use ethers::types::{H256, U64};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for compiling, deploying and transacting
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Usage(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Transaction {tx_hash:?} failed")]
    TransactionFailed { tx_hash: H256 },

    #[error("{} transaction(s) failed: {}", .tx_hashes.len(), format_hashes(.tx_hashes))]
    TransactionsFailed { tx_hashes: BTreeSet<H256> },

    #[error("Unexpected value for status in the receipt of {tx_hash:?}: {status:?}")]
    UnexpectedReceiptStatus { tx_hash: H256, status: Option<U64> },

    #[error("From can not be set to {from} if a private key for {key_address} is used")]
    FromAddressConflict { from: String, key_address: String },

    #[error("No account available on the node to send the transaction from")]
    NoAccount,

    #[error("Contract {0} was not found")]
    UnknownContract(String),

    #[error("Found no function {name} taking {arg_count} argument(s)")]
    NoMatchingFunction { name: String, arg_count: usize },

    #[error("Found multiple functions {name} taking {arg_count} argument(s)")]
    AmbiguousFunction { name: String, arg_count: usize },

    #[error("Invalid argument {arg:?} for type {kind}: {message}")]
    InvalidArgument {
        arg: String,
        kind: String,
        message: String,
    },

    #[error("Cannot handle parameter of type {0} yet")]
    UnsupportedType(String),

    #[error("The address parameter is not recognized to be an address: {0}")]
    InvalidAddress(String),

    #[error("ABI error: {0}")]
    Abi(#[from] ethers::abi::Error),

    #[error("Keystore error: {0}")]
    Keystore(String),

    #[error("Compilation failed: {0}")]
    Compile(String),

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    /// Check if the error reports transactions that were mined but reverted
    pub fn is_transaction_failure(&self) -> bool {
        matches!(
            self,
            DeployError::TransactionFailed { .. } | DeployError::TransactionsFailed { .. }
        )
    }

    /// Hashes of the reverted transactions carried by this error
    pub fn failed_hashes(&self) -> Vec<H256> {
        match self {
            DeployError::TransactionFailed { tx_hash } => vec![*tx_hash],
            DeployError::TransactionsFailed { tx_hashes } => tx_hashes.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Check if the error was caused by invalid user input rather than the node
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            DeployError::Usage(_)
                | DeployError::FromAddressConflict { .. }
                | DeployError::UnknownContract(_)
                | DeployError::NoMatchingFunction { .. }
                | DeployError::AmbiguousFunction { .. }
                | DeployError::InvalidArgument { .. }
                | DeployError::UnsupportedType(_)
                | DeployError::InvalidAddress(_)
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeployError::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_hashes(hashes: &BTreeSet<H256>) -> String {
    hashes
        .iter()
        .map(|h| format!("{:?}", h))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for deploy-tools operations
pub type DeployResult<T> = Result<T, DeployError>;
