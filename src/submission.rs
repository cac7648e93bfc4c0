//! Signing and submitting executions
//!
//! Turns a strategy's transactions into one executable, authorizes it with
//! the executor key (EIP-712, never a raw transaction) and hands it to the
//! console, then follows the resulting workflow until it settles.

use crate::config::ContractAddresses;
use crate::console::{
    ConsoleApi, Executable, ExecutableDigestRequest, Operation, SignedTask, SubmitPayload,
    SubmitTaskRequest, Task, UnsignedTransaction, WorkflowState, WorkflowStatus,
};
use crate::journal::{JournalEntry, SubmissionJournal};
use crate::multisend::prepare_executable;
use crate::scheduler::{poll_until, PollPolicy};
use crate::wallet::{SecureWallet, TransactionSimulator};
use crate::{Error, Result};
use alloy::hex;
use alloy::primitives::B256;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Final state of a submitted task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub task_id: String,
    pub status: WorkflowStatus,
    pub output_tx_hash: Option<B256>,
}

pub struct TaskSubmitter {
    console: Arc<dyn ConsoleApi>,
    wallet: Arc<SecureWallet>,
    journal: Arc<SubmissionJournal>,
    simulator: Option<TransactionSimulator>,
    registry_id: String,
    /// Chain the executor's RPC points at; used for nonce lookups
    executor_chain_id: u64,
    contracts: ContractAddresses,
    monitor: PollPolicy,
}

impl TaskSubmitter {
    pub fn new(
        console: Arc<dyn ConsoleApi>,
        wallet: Arc<SecureWallet>,
        journal: Arc<SubmissionJournal>,
        registry_id: impl Into<String>,
        executor_chain_id: u64,
    ) -> Self {
        Self {
            console,
            wallet,
            journal,
            simulator: None,
            registry_id: registry_id.into(),
            executor_chain_id,
            contracts: ContractAddresses::default(),
            monitor: crate::config::WorkflowConfig::default().poll_policy(),
        }
    }

    pub fn with_contracts(mut self, contracts: ContractAddresses) -> Self {
        self.contracts = contracts;
        self
    }

    pub fn with_monitor_policy(mut self, policy: PollPolicy) -> Self {
        self.monitor = policy;
        self
    }

    pub fn with_simulator(mut self, simulator: TransactionSimulator) -> Self {
        self.simulator = Some(simulator);
        self
    }

    pub fn journal(&self) -> &SubmissionJournal {
        &self.journal
    }

    /// The single executable that would be signed for `transactions`
    pub fn prepare(&self, task_id: &str, transactions: &[UnsignedTransaction]) -> Result<UnsignedTransaction> {
        prepare_executable(task_id, transactions, self.contracts.multi_send)
    }

    /// Sign, submit and monitor one task
    pub async fn submit(
        &self,
        task: &Task,
        transactions: &[UnsignedTransaction],
        message: &str,
    ) -> Result<SubmissionOutcome> {
        let params = task.params();
        let subaccount = params.sub_account_address;
        let executable = self.prepare(&task.id, transactions)?;
        debug!(
            task_id = %task.id,
            to = %executable.to,
            operation = ?executable.operation,
            calls = transactions.len(),
            "Prepared executable"
        );

        self.simulate(subaccount, &executable).await?;

        // Fetched right before signing; the console is the nonce authority
        let executor = self.wallet.address();
        let nonce = self
            .console
            .fetch_executor_nonce(subaccount, executor, self.executor_chain_id)
            .await?;
        debug!(task_id = %task.id, nonce = %nonce, "Fetched executor nonce");

        let digest = self
            .console
            .generate_executable_digest(ExecutableDigestRequest {
                account: subaccount,
                chain_id: params.chain_id,
                data: executable.data.clone(),
                executor,
                nonce,
                operation: executable.operation,
                plugin_address: self.contracts.executor_plugin,
                to: executable.to,
                value: executable.value,
            })
            .await?;
        let signature = self.wallet.sign_digest(&digest)?;

        self.console
            .submit_task(SubmitTaskRequest {
                id: task.id.clone(),
                payload: SubmitPayload {
                    task: SignedTask {
                        executable: Executable::from(&executable),
                        executor_signature: hex::encode_prefixed(signature.as_bytes()),
                        executor,
                        skip: false,
                        skip_reason: String::new(),
                        subaccount,
                    },
                },
                registry_id: self.registry_id.clone(),
            })
            .await?;
        info!(task_id = %task.id, subaccount = %subaccount, "Submitted task");

        let entry = JournalEntry::new(&task.id, &self.registry_id, subaccount, &executable);
        if let Err(e) = self.journal.record(entry).await {
            error!(task_id = %task.id, error = %e, "Failed to journal submission");
        }

        let state = self.monitor(&task.id).await?;
        let outcome = SubmissionOutcome {
            task_id: task.id.clone(),
            output_tx_hash: state.output_tx_hash(),
            status: state.status,
        };
        info!(
            task_id = %task.id,
            status = %outcome.status,
            tx_hash = ?outcome.output_tx_hash,
            "{}",
            message
        );
        Ok(outcome)
    }

    async fn simulate(
        &self,
        subaccount: alloy::primitives::Address,
        executable: &UnsignedTransaction,
    ) -> Result<()> {
        let Some(simulator) = &self.simulator else {
            return Ok(());
        };
        if executable.operation == Operation::DelegateCall {
            debug!("Delegate-call executable, skipping simulation");
            return Ok(());
        }

        let result = simulator.simulate(subaccount, executable).await?;
        if !result.success {
            let reason = result
                .revert_reason
                .unwrap_or_else(|| "unknown revert".to_string());
            warn!(subaccount = %subaccount, reason = %reason, "Simulation reverted");
            return Err(Error::Simulation(reason));
        }
        debug!(gas_used = ?result.gas_used, "Simulation succeeded");
        Ok(())
    }

    /// Poll the workflow until it leaves the running state
    async fn monitor(&self, task_id: &str) -> Result<WorkflowState> {
        let settled = poll_until(
            || self.console.fetch_workflow_state(task_id),
            |state: &Option<WorkflowState>| state.as_ref().is_some_and(|s| !s.status.is_running()),
            self.monitor,
        )
        .await
        .map_err(|e| Error::Workflow(format!("Monitoring task {} failed: {}", task_id, e)))?;

        settled.ok_or_else(|| Error::Workflow(format!("No workflow state for task {}", task_id)))
    }
}
