//! Transaction construction and submission: units, nonce, gas, assembly,
//! signing and broadcast

mod assembler;
mod gas;
mod nonce;
mod sender;
mod signer;
pub mod units;

pub use assembler::{assemble, UnsignedTransaction};
pub use gas::{GasEstimator, GasParameters};
pub use nonce::{AccountLocks, NonceResolver};
pub use sender::{Confirmation, TransactionSender};
pub use signer::{SignedTransaction, TxSigner};
pub use units::{from_base_units, to_base_units};
