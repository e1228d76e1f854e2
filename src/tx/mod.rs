//! Transaction lifecycle: options, nonce resolution, signing, submission and
//! receipt confirmation

mod gas;
mod nonce;
mod options;
mod receipt;
mod sender;

pub use gas::fill_transaction_defaults;
pub use nonce::{fill_nonce, resolve_cli_nonce};
pub use options::{build_transaction_options, ContractCall, TransactionOptions};
pub use receipt::{ReceiptWaiter, DEFAULT_BULK_RECEIPT_TIMEOUT, DEFAULT_RECEIPT_TIMEOUT};
pub use sender::TransactionSender;
