//! Error types for the vault rebalancer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Console API error: {0}")]
    Console(String),

    #[error("GraphQL query failed: {0}")]
    GraphQL(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Strategy error: {0}")]
    Strategy(String),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Transaction simulation failed: {0}")]
    Simulation(String),

    #[error("Journal error: {0}")]
    Journal(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Execution for task {0} carries no transactions")]
    EmptyExecution(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
