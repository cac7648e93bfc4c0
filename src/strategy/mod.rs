//! Automation strategies
//!
//! A strategy looks at one task and decides whether the sub-account needs
//! to act. It never signs or submits anything; it only returns the
//! transactions that should run.

mod rebalance;
mod transfer;

pub use rebalance::{RebalancingStrategy, DEFAULT_SLIPPAGE_PERCENT};
pub use transfer::TransferStrategy;

use crate::console::{TaskParams, UnsignedTransaction};
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Outcome of evaluating a task
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ExecutionResult {
    /// Nothing to do this cycle
    Skip { message: String },
    /// Transactions to run, in order
    Execute {
        message: String,
        transactions: Vec<UnsignedTransaction>,
    },
}

impl ExecutionResult {
    pub fn skip(message: impl Into<String>) -> Self {
        Self::Skip {
            message: message.into(),
        }
    }

    pub fn execute(message: impl Into<String>, transactions: Vec<UnsignedTransaction>) -> Self {
        Self::Execute {
            message: message.into(),
            transactions,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Skip { message } | Self::Execute { message, .. } => message,
        }
    }

    pub fn transactions(&self) -> &[UnsignedTransaction] {
        match self {
            Self::Skip { .. } => &[],
            Self::Execute { transactions, .. } => transactions,
        }
    }
}

#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decide what, if anything, `params` requires.
    ///
    /// Failures while building transactions come back as a skip carrying the
    /// error text; an `Err` means the inputs could not be fetched at all.
    async fn evaluate(&self, params: &TaskParams) -> Result<ExecutionResult>;
}
