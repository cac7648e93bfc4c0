//! Task polling loop
//!
//! Each cycle fetches one page of pending tasks and handles them one at a
//! time. A failure never escapes its task: it is logged and the task stays
//! pending upstream, so the next cycle picks it up again (unless it was
//! already submitted, see [`crate::journal`]).

use crate::console::{ConsoleApi, Task, WorkflowStatus};
use crate::scheduler::{repeat, RepeatHandle};
use crate::strategy::{ExecutionResult, Strategy};
use crate::submission::{SubmissionOutcome, TaskSubmitter};
use crate::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// What happened during one polling cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub fetched: usize,
    /// Strategy skips plus tasks already in the journal
    pub skipped: usize,
    pub submitted: usize,
    /// Dry run only: executables built but not signed
    pub prepared: usize,
    pub failed: usize,
    pub fetch_failed: bool,
}

#[derive(Debug)]
enum TaskOutcome {
    AlreadySubmitted,
    Skipped,
    Prepared,
    Submitted(SubmissionOutcome),
}

pub struct Poller {
    console: Arc<dyn ConsoleApi>,
    strategy: Arc<dyn Strategy>,
    submitter: Arc<TaskSubmitter>,
    registry_id: String,
    page_offset: u32,
    page_limit: u32,
    dry_run: bool,
    cycle: AtomicU64,
}

impl Poller {
    pub fn new(
        console: Arc<dyn ConsoleApi>,
        strategy: Arc<dyn Strategy>,
        submitter: Arc<TaskSubmitter>,
        registry_id: impl Into<String>,
    ) -> Self {
        Self {
            console,
            strategy,
            submitter,
            registry_id: registry_id.into(),
            page_offset: 0,
            page_limit: 10,
            dry_run: false,
            cycle: AtomicU64::new(0),
        }
    }

    /// Task window fetched per cycle. Tasks beyond it wait for a later cycle.
    pub fn with_page(mut self, offset: u32, limit: u32) -> Self {
        self.page_offset = offset;
        self.page_limit = limit;
        self
    }

    /// Evaluate and prepare, but never sign or submit
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn cycles(&self) -> u64 {
        self.cycle.load(Ordering::Relaxed)
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let cycle = self.cycle.fetch_add(1, Ordering::Relaxed) + 1;
        let mut report = CycleReport {
            cycle,
            ..Default::default()
        };
        info!(cycle, strategy = self.strategy.name(), "Polling cycle");

        let tasks = match self
            .console
            .fetch_tasks(&self.registry_id, self.page_offset, self.page_limit)
            .await
        {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(cycle, registry_id = %self.registry_id, error = %e, "Failed to fetch tasks");
                report.fetch_failed = true;
                return report;
            }
        };
        report.fetched = tasks.len();
        info!(registry_id = %self.registry_id, count = tasks.len(), "Fetched tasks");

        for task in &tasks {
            info!(
                task_id = %task.id,
                subaccount = %task.params().sub_account_address,
                "Processing task"
            );
            match self.process(task).await {
                Ok(TaskOutcome::AlreadySubmitted | TaskOutcome::Skipped) => report.skipped += 1,
                Ok(TaskOutcome::Prepared) => report.prepared += 1,
                Ok(TaskOutcome::Submitted(outcome)) => {
                    if outcome.status != WorkflowStatus::Completed {
                        warn!(task_id = %task.id, status = %outcome.status, "Workflow did not complete");
                    }
                    report.submitted += 1;
                }
                Err(e) => {
                    error!(task_id = %task.id, error = %e, "Error processing task");
                    report.failed += 1;
                }
            }
        }

        info!(
            cycle,
            fetched = report.fetched,
            skipped = report.skipped,
            submitted = report.submitted,
            prepared = report.prepared,
            failed = report.failed,
            "Cycle complete"
        );
        report
    }

    async fn process(&self, task: &Task) -> Result<TaskOutcome> {
        if self.submitter.journal().contains(&task.id).await {
            info!(task_id = %task.id, "Already submitted, skipping");
            return Ok(TaskOutcome::AlreadySubmitted);
        }

        match self.strategy.evaluate(task.params()).await? {
            ExecutionResult::Skip { message } => {
                info!(task_id = %task.id, reason = %message, "Skipping task");
                Ok(TaskOutcome::Skipped)
            }
            ExecutionResult::Execute {
                message,
                transactions,
            } if self.dry_run => {
                let executable = self.submitter.prepare(&task.id, &transactions)?;
                info!(
                    task_id = %task.id,
                    message = %message,
                    executable = %serde_json::to_string(&executable)?,
                    "Dry run, not submitting"
                );
                Ok(TaskOutcome::Prepared)
            }
            ExecutionResult::Execute {
                message,
                transactions,
            } => {
                let outcome = self.submitter.submit(task, &transactions, &message).await?;
                Ok(TaskOutcome::Submitted(outcome))
            }
        }
    }

    /// Run a cycle every `interval` until the handle is cancelled
    pub fn spawn(self: Arc<Self>, interval: Duration) -> RepeatHandle {
        repeat(
            move || {
                let poller = self.clone();
                async move { poller.run_cycle().await }
            },
            |_: &CycleReport| true,
            interval,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{SubscriptionMetadata, TaskParams};
    use crate::journal::SubmissionJournal;
    use crate::scheduler::PollPolicy;
    use crate::strategy::TransferStrategy;
    use crate::testing::*;
    use crate::wallet::SecureWallet;
    use crate::Error;
    use alloy::primitives::{Address, U256};
    use async_trait::async_trait;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn transfer_metadata() -> SubscriptionMetadata {
        SubscriptionMetadata {
            receiver: Some(Address::repeat_byte(0x22)),
            transfer_amount: Some(U256::from(5_000_000u64)),
            every: Some("1d".to_string()),
            ..Default::default()
        }
    }

    fn transfer_task(id: &str) -> Task {
        task(id, Address::repeat_byte(0x5a), transfer_metadata())
    }

    fn poller_with(console: Arc<FakeConsole>, strategy: Arc<dyn Strategy>) -> Poller {
        let wallet = Arc::new(SecureWallet::from_hex(TEST_KEY).unwrap());
        let submitter = TaskSubmitter::new(
            console.clone(),
            wallet,
            Arc::new(SubmissionJournal::in_memory()),
            "registry-1",
            CHAIN_ID,
        )
        .with_monitor_policy(PollPolicy::every(Duration::from_millis(2)));
        Poller::new(console, strategy, Arc::new(submitter), "registry-1")
    }

    /// Errors on tasks whose id starts with `bad`, transfers otherwise
    struct FailingFor;

    #[async_trait]
    impl Strategy for FailingFor {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn evaluate(&self, params: &TaskParams) -> Result<ExecutionResult> {
            if params.subscription.id.starts_with("sub-bad") {
                return Err(Error::GraphQL("vault service unavailable".to_string()));
            }
            TransferStrategy::new().evaluate(params).await
        }
    }

    #[tokio::test]
    async fn fetch_failure_ends_cycle_early() {
        let console = Arc::new(FakeConsole::with_tasks(vec![transfer_task("t1")]));
        console.fail_fetch.store(true, Ordering::SeqCst);
        let poller = poller_with(console.clone(), Arc::new(TransferStrategy::new()));

        let report = poller.run_cycle().await;
        assert!(report.fetch_failed);
        assert_eq!(report.fetched, 0);
        assert!(console.submitted.lock().unwrap().is_empty());

        // The next cycle runs normally once the console recovers
        console.fail_fetch.store(false, Ordering::SeqCst);
        let report = poller.run_cycle().await;
        assert_eq!(report.cycle, 2);
        assert!(!report.fetch_failed);
        assert_eq!(report.submitted, 1);
    }

    #[tokio::test]
    async fn handles_tasks_sequentially_and_isolates_failures() {
        let mut inconsistent = transfer_metadata();
        inconsistent.every = None;
        let console = Arc::new(FakeConsole::with_tasks(vec![
            transfer_task("bad-1"),
            task("t2", Address::repeat_byte(0x5a), inconsistent),
            transfer_task("t3"),
        ]));
        let poller = poller_with(console.clone(), Arc::new(FailingFor));

        let report = poller.run_cycle().await;
        assert_eq!(
            report,
            CycleReport {
                cycle: 1,
                fetched: 3,
                skipped: 1,
                submitted: 1,
                prepared: 0,
                failed: 1,
                fetch_failed: false,
            }
        );
        assert_eq!(console.submitted_ids(), vec!["t3".to_string()]);
    }

    #[tokio::test]
    async fn journaled_tasks_are_not_resubmitted() {
        let console = Arc::new(FakeConsole::with_tasks(vec![transfer_task("t1")]));
        let poller = poller_with(console.clone(), Arc::new(TransferStrategy::new()));

        assert_eq!(poller.run_cycle().await.submitted, 1);
        // The task is still pending upstream on the next cycle
        let report = poller.run_cycle().await;
        assert_eq!(report.submitted, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(console.submitted_ids(), vec!["t1".to_string()]);
    }

    #[tokio::test]
    async fn dry_run_prepares_without_signing() {
        let console = Arc::new(FakeConsole::with_tasks(vec![transfer_task("t1")]));
        let poller =
            poller_with(console.clone(), Arc::new(TransferStrategy::new())).with_dry_run(true);

        let report = poller.run_cycle().await;
        assert_eq!(report.prepared, 1);
        assert_eq!(report.submitted, 0);
        assert_eq!(console.nonce_requests.load(Ordering::SeqCst), 0);
        assert!(console.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetches_one_page_per_cycle() {
        let tasks: Vec<Task> = (0..12).map(|i| transfer_task(&format!("t{}", i))).collect();
        let console = Arc::new(FakeConsole::with_tasks(tasks));
        let poller =
            poller_with(console.clone(), Arc::new(TransferStrategy::new())).with_dry_run(true);

        assert_eq!(poller.run_cycle().await.fetched, 10);

        let second_page = poller_with(console, Arc::new(TransferStrategy::new()))
            .with_dry_run(true)
            .with_page(10, 10);
        assert_eq!(second_page.run_cycle().await.fetched, 2);
    }

    #[tokio::test]
    async fn spawned_loop_runs_until_cancelled() {
        let console = Arc::new(FakeConsole::default());
        let poller = Arc::new(poller_with(
            console.clone(),
            Arc::new(TransferStrategy::new()),
        ));

        let handle = poller.clone().spawn(Duration::from_millis(2));
        while console.fetch_calls.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        handle.cancel();
        let iterations = handle.join().await.unwrap();

        assert!(iterations >= 3);
        assert_eq!(poller.cycles(), iterations);
    }
}
