//! In-memory stand-ins for the console, Morpho and the chain

use crate::chain::ChainReader;
use crate::console::{
    ConsoleApi, ConsoleExecutorConfig, DepositParams, ExecutorDetails, ExecutorListing,
    ExecutorRegistryApi, KernelExecutorConfig, SubmitTaskRequest, Subscription,
    SubscriptionMetadata, Task, TaskParams, UnsignedTransaction, WithdrawParams, WorkflowState,
    WorkflowStatus,
};
use crate::console::types::{TaskPayload, WorkflowOutput};
use crate::morpho::{rank_by_net_apy, Position, Vault, VaultData};
use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::dyn_abi::TypedData;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub const CHAIN_ID: u64 = 8453;
pub const FAKE_REGISTRY_ID: &str = "registry-new";

/// Registration message the fake console hands out, always bound to `chain_id`
pub fn registration_message(primary: &str, chain_id: u64) -> TypedData {
    serde_json::from_value(serde_json::json!({
        "types": {
            "EIP712Domain": [
                { "name": "name", "type": "string" },
                { "name": "chainId", "type": "uint256" }
            ],
            (primary): [{ "name": "action", "type": "string" }]
        },
        "primaryType": primary,
        "domain": { "name": "ConsoleExecutorRegistry", "chainId": chain_id },
        "message": { "action": primary }
    }))
    .unwrap()
}

/// A registration the fake console accepted
#[derive(Debug, Clone)]
pub enum RegistrationCall {
    Console {
        signature: String,
        config: ConsoleExecutorConfig,
    },
    Kernel {
        registry_id: String,
        signature: String,
    },
}

pub fn vault(byte: u8, net_apy: f64) -> Vault {
    Vault {
        id: format!("vault-{}", byte),
        address: Address::repeat_byte(byte),
        symbol: format!("mV{}", byte),
        net_apy,
    }
}

pub fn position(byte: u8, shares: u64) -> Position {
    Position {
        id: format!("position-{}", byte),
        vault_address: Address::repeat_byte(byte),
        vault_symbol: format!("mV{}", byte),
        shares: U256::from(shares),
    }
}

pub fn task(id: &str, subaccount: Address, metadata: SubscriptionMetadata) -> Task {
    Task {
        id: id.to_string(),
        payload: TaskPayload {
            params: TaskParams {
                sub_account_address: subaccount,
                chain_id: CHAIN_ID,
                subscription: Subscription {
                    id: format!("sub-{}", id),
                    metadata,
                },
            },
        },
    }
}

pub fn rebalance_metadata(base_token: Address) -> SubscriptionMetadata {
    SubscriptionMetadata {
        base_token: Some(base_token),
        ..Default::default()
    }
}

/// Calldata tagged with what the builder was asked to do
fn tagged(tag: &[u8], amount: U256) -> Bytes {
    let mut data = tag.to_vec();
    data.extend_from_slice(&amount.to_be_bytes::<32>());
    data.into()
}

#[derive(Default)]
pub struct FakeVaults {
    pub vaults: Vec<Vault>,
    pub positions: Vec<Position>,
    pub fail: bool,
}

impl FakeVaults {
    pub fn new(vaults: Vec<Vault>, positions: Vec<Position>) -> Self {
        Self {
            vaults,
            positions,
            fail: false,
        }
    }
}

#[async_trait]
impl VaultData for FakeVaults {
    async fn get_vaults(
        &self,
        _asset: Address,
        _chain_id: u64,
        preferred: &[Address],
    ) -> Result<Vec<Vault>> {
        if self.fail {
            return Err(Error::GraphQL("vault service unavailable".to_string()));
        }
        let mut vaults: Vec<Vault> = self
            .vaults
            .iter()
            .filter(|v| preferred.is_empty() || preferred.contains(&v.address))
            .cloned()
            .collect();
        rank_by_net_apy(&mut vaults);
        Ok(vaults)
    }

    async fn get_user_positions(&self, _user: Address) -> Result<Vec<Position>> {
        if self.fail {
            return Err(Error::GraphQL("vault service unavailable".to_string()));
        }
        Ok(self.positions.clone())
    }
}

#[derive(Default)]
pub struct FakeChain {
    pub balances: HashMap<(Address, Address), U256>,
    /// Assets paid out per share on redemption
    pub assets_per_share: u64,
    pub vault_assets: HashMap<Address, Address>,
    pub fail_reads: bool,
}

impl FakeChain {
    pub fn with_balance(token: Address, owner: Address, amount: U256) -> Self {
        let mut chain = Self {
            assets_per_share: 1,
            ..Default::default()
        };
        chain.balances.insert((token, owner), amount);
        chain
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(CHAIN_ID)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        if self.fail_reads {
            return Err(Error::Rpc("rpc unavailable".to_string()));
        }
        Ok(self
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn preview_redeem(&self, _vault: Address, shares: U256) -> Result<U256> {
        if self.fail_reads {
            return Err(Error::Rpc("rpc unavailable".to_string()));
        }
        Ok(shares * U256::from(self.assets_per_share))
    }

    async fn vault_asset(&self, vault: Address) -> Result<Address> {
        self.vault_assets
            .get(&vault)
            .copied()
            .ok_or_else(|| Error::Rpc(format!("unknown vault {}", vault)))
    }
}

/// Scripted reply to a workflow-state poll
#[derive(Debug, Clone)]
pub enum WorkflowReply {
    Missing,
    Status(WorkflowStatus),
    Error,
}

pub struct FakeConsole {
    pub tasks: Mutex<Vec<Task>>,
    pub fail_fetch: AtomicBool,
    pub fail_submit: AtomicBool,
    pub fail_builder: AtomicBool,
    pub nonce: U256,
    pub output_tx_hash: B256,
    pub workflow_replies: Mutex<VecDeque<WorkflowReply>>,
    pub submitted: Mutex<Vec<SubmitTaskRequest>>,
    pub deposits: Mutex<Vec<DepositParams>>,
    pub withdrawals: Mutex<Vec<WithdrawParams>>,
    pub nonce_requests: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub fail_register: AtomicBool,
    pub registrations: Mutex<Vec<RegistrationCall>>,
}

impl Default for FakeConsole {
    fn default() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            fail_fetch: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
            fail_builder: AtomicBool::new(false),
            nonce: U256::from(7),
            output_tx_hash: B256::repeat_byte(0xee),
            workflow_replies: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            deposits: Mutex::new(Vec::new()),
            withdrawals: Mutex::new(Vec::new()),
            nonce_requests: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            fail_register: AtomicBool::new(false),
            registrations: Mutex::new(Vec::new()),
        }
    }
}

impl FakeConsole {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Default::default()
        }
    }

    pub fn script_workflow(&self, replies: impl IntoIterator<Item = WorkflowReply>) {
        self.workflow_replies.lock().unwrap().extend(replies);
    }

    pub fn submitted_ids(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }
}

#[async_trait]
impl ConsoleApi for FakeConsole {
    async fn fetch_tasks(&self, _registry_id: &str, offset: u32, limit: u32) -> Result<Vec<Task>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::Console("connection reset by peer".to_string()));
        }
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn fetch_executor_nonce(
        &self,
        _account: Address,
        _executor: Address,
        _chain_id: u64,
    ) -> Result<U256> {
        self.nonce_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.nonce)
    }

    async fn submit_task(&self, request: SubmitTaskRequest) -> Result<()> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(Error::Console("HTTP 500: submit rejected".to_string()));
        }
        self.submitted.lock().unwrap().push(request);
        Ok(())
    }

    async fn fetch_workflow_state(&self, _task_id: &str) -> Result<Option<WorkflowState>> {
        let reply = self.workflow_replies.lock().unwrap().pop_front();
        match reply {
            Some(WorkflowReply::Missing) => Ok(None),
            Some(WorkflowReply::Error) => Err(Error::Console("HTTP 502: bad gateway".to_string())),
            Some(WorkflowReply::Status(status)) => Ok(Some(WorkflowState { status, out: None })),
            None => Ok(Some(WorkflowState {
                status: WorkflowStatus::Completed,
                out: Some(WorkflowOutput {
                    output_tx_hash: Some(self.output_tx_hash),
                }),
            })),
        }
    }

    async fn morpho_deposit(
        &self,
        _chain_id: u64,
        _account: Address,
        params: DepositParams,
    ) -> Result<Vec<UnsignedTransaction>> {
        if self.fail_builder.load(Ordering::SeqCst) {
            return Err(Error::Console("builder unavailable".to_string()));
        }
        let amount = params.input_amount.first().copied().unwrap_or_default();
        let vault = params.vaults.first().copied().unwrap_or_default();
        let txs = vec![
            UnsignedTransaction::call(params.input_token, tagged(b"approve", amount)),
            UnsignedTransaction::call(vault, tagged(b"deposit", amount)),
        ];
        self.deposits.lock().unwrap().push(params);
        Ok(txs)
    }

    async fn morpho_withdraw(
        &self,
        _chain_id: u64,
        _account: Address,
        params: WithdrawParams,
    ) -> Result<Vec<UnsignedTransaction>> {
        if self.fail_builder.load(Ordering::SeqCst) {
            return Err(Error::Console("builder unavailable".to_string()));
        }
        let shares = params.share_amounts.first().copied().unwrap_or_default();
        let vault = params.vaults.first().copied().unwrap_or_default();
        let txs = vec![UnsignedTransaction::call(vault, tagged(b"redeem", shares))];
        self.withdrawals.lock().unwrap().push(params);
        Ok(txs)
    }
}

/// True when `tx` was produced by the fake builder for `tag`
pub fn is_tagged(tx: &UnsignedTransaction, tag: &[u8]) -> bool {
    tx.data.starts_with(tag)
}

#[async_trait]
impl ExecutorRegistryApi for FakeConsole {
    async fn console_registration_message(
        &self,
        _chain_id: u64,
        _config: &ConsoleExecutorConfig,
    ) -> Result<TypedData> {
        Ok(registration_message("ConsoleRegistration", CHAIN_ID))
    }

    async fn register_on_console(
        &self,
        signature: String,
        _chain_id: u64,
        config: ConsoleExecutorConfig,
        _listing: ExecutorListing,
    ) -> Result<ExecutorDetails> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(Error::Console("HTTP 400: duplicate client id".to_string()));
        }
        self.registrations
            .lock()
            .unwrap()
            .push(RegistrationCall::Console { signature, config });
        Ok(ExecutorDetails {
            id: FAKE_REGISTRY_ID.to_string(),
            extra: Default::default(),
        })
    }

    async fn kernel_registration_message(
        &self,
        _chain_id: u64,
        _registry_id: &str,
        _config: &KernelExecutorConfig,
    ) -> Result<TypedData> {
        Ok(registration_message("KernelRegistration", CHAIN_ID))
    }

    async fn register_on_kernel(
        &self,
        registry_id: &str,
        signature: String,
        _config: KernelExecutorConfig,
    ) -> Result<()> {
        self.registrations
            .lock()
            .unwrap()
            .push(RegistrationCall::Kernel {
                registry_id: registry_id.to_string(),
                signature,
            });
        Ok(())
    }

    async fn fetch_executor_details(&self, registry_id: &str) -> Result<ExecutorDetails> {
        let mut extra = serde_json::Map::new();
        extra.insert("status".to_string(), serde_json::json!("active"));
        Ok(ExecutorDetails {
            id: registry_id.to_string(),
            extra,
        })
    }
}
