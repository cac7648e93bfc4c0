//! Console automation API
//!
//! The console backend owns the task registry: it hands out pending tasks,
//! executor nonces and workflow state, accepts signed executions, and builds
//! Morpho deposit/withdraw calldata. Everything the polling loop needs from
//! it goes through the [`ConsoleApi`] trait so the loop can run against a
//! fake in tests.

mod client;
pub mod digest;
pub mod types;

pub use client::ConsoleClient;
pub use digest::{ExecutableDigest, ExecutionParams};
pub use types::{
    ConsoleExecutorConfig, DepositParams, Executable, ExecutableDigestRequest, ExecutorDetails,
    ExecutorListing, KernelExecutorConfig, Operation, SignedTask, SubmitPayload,
    SubmitTaskRequest, Subscription, SubscriptionMetadata, Task, TaskParams, UnsignedTransaction,
    WithdrawParams, WorkflowState, WorkflowStatus,
};

use crate::Result;
use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;

#[async_trait]
pub trait ConsoleApi: Send + Sync {
    /// Pending tasks for a registry, `limit` at most, starting at `offset`
    async fn fetch_tasks(&self, registry_id: &str, offset: u32, limit: u32) -> Result<Vec<Task>>;

    /// Current executor nonce for a sub-account
    async fn fetch_executor_nonce(
        &self,
        account: Address,
        executor: Address,
        chain_id: u64,
    ) -> Result<U256>;

    /// Typed payload the executor signs to authorize an execution
    async fn generate_executable_digest(
        &self,
        request: ExecutableDigestRequest,
    ) -> Result<ExecutableDigest> {
        Ok(ExecutableDigest::new(&request))
    }

    /// Hand a signed execution to the console
    async fn submit_task(&self, request: SubmitTaskRequest) -> Result<()>;

    /// Workflow state of a submitted task (None until the workflow exists)
    async fn fetch_workflow_state(&self, task_id: &str) -> Result<Option<WorkflowState>>;

    /// Calldata for depositing into Morpho vaults from `account`
    async fn morpho_deposit(
        &self,
        chain_id: u64,
        account: Address,
        params: DepositParams,
    ) -> Result<Vec<UnsignedTransaction>>;

    /// Calldata for redeeming Morpho vault shares held by `account`
    async fn morpho_withdraw(
        &self,
        chain_id: u64,
        account: Address,
        params: WithdrawParams,
    ) -> Result<Vec<UnsignedTransaction>>;
}

/// Executor onboarding. Both registrations are EIP-712 messages the console
/// composes and the executor key signs.
#[async_trait]
pub trait ExecutorRegistryApi: Send + Sync {
    async fn console_registration_message(
        &self,
        chain_id: u64,
        config: &ConsoleExecutorConfig,
    ) -> Result<TypedData>;

    /// Returns the new registry entry; its id is the registry to poll
    async fn register_on_console(
        &self,
        signature: String,
        chain_id: u64,
        config: ConsoleExecutorConfig,
        listing: ExecutorListing,
    ) -> Result<ExecutorDetails>;

    async fn kernel_registration_message(
        &self,
        chain_id: u64,
        registry_id: &str,
        config: &KernelExecutorConfig,
    ) -> Result<TypedData>;

    async fn register_on_kernel(
        &self,
        registry_id: &str,
        signature: String,
        config: KernelExecutorConfig,
    ) -> Result<()>;

    async fn fetch_executor_details(&self, registry_id: &str) -> Result<ExecutorDetails>;
}
