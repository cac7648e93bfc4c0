//! Executor wallet
//!
//! Holds the executor signing key and the read-only simulator used before
//! signing. The private key never leaves this module.

mod signer;
mod simulator;

pub use signer::SecureWallet;
pub use simulator::{SimulationResult, TransactionSimulator};
