//! Vault rebalancer
//!
//! An automation executor for console sub-accounts:
//! - Polls the console task registry for pending tasks
//! - Evaluates each task with a strategy (best-yield Morpho vault, recurring transfer)
//! - Batches the resulting calls, signs an EIP-712 authorization and submits it
//! - Follows the submission's workflow until it settles
//! - Registers the executor with the console and the kernel (one-off)
//!
//! # Security Model
//!
//! - The executor key only produces off-chain authorizations; it never sends transactions
//! - Private keys never leave the wallet module and are never logged
//! - Every accepted submission is journaled so a task is never signed twice

pub mod chain;
pub mod config;
pub mod console;
pub mod journal;
pub mod morpho;
pub mod multisend;
pub mod poller;
pub mod registration;
pub mod scheduler;
pub mod strategy;
pub mod submission;
pub mod tokens;
pub mod wallet;

mod error;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{Config, Credentials};
pub use error::{Error, Result};
pub use poller::{CycleReport, Poller};
pub use strategy::{ExecutionResult, Strategy};
pub use submission::{SubmissionOutcome, TaskSubmitter};
