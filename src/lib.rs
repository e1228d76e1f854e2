//! deploy-tools - compile, deploy and interact with EVM smart contracts
//!
//! The library holds the transaction lifecycle (options, nonce resolution,
//! signing, submission and receipt confirmation) together with the compiler
//! and ABI helpers the command line interface is built from.

pub mod abi;
pub mod artifacts;
pub mod chain;
pub mod cli;
pub mod compile;
pub mod config;
pub mod contract;
pub mod deploy;
pub mod error;
pub mod tx;

pub use error::{DeployError, DeployResult};
