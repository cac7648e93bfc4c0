//! Wire types for the console automation API

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Response envelope used by every console endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// A pending automation task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub payload: TaskPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayload {
    pub params: TaskParams,
}

impl Task {
    pub fn params(&self) -> &TaskParams {
        &self.payload.params
    }
}

/// Parameters the backend attaches to a task when a user subscribes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskParams {
    pub sub_account_address: Address,
    #[serde(rename = "chainID")]
    pub chain_id: u64,
    pub subscription: Subscription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub metadata: SubscriptionMetadata,
}

/// Strategy inputs chosen by the user at subscription time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_token: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_vaults: Option<Vec<Address>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Address>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_decimal_u256"
    )]
    pub transfer_amount: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every: Option<String>,
    /// Keys this executor does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// How the account executes a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Operation {
    #[default]
    Call,
    DelegateCall,
}

impl TryFrom<u8> for Operation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Operation::Call),
            1 => Ok(Operation::DelegateCall),
            other => Err(format!("unknown operation {}", other)),
        }
    }
}

impl From<Operation> for u8 {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Call => 0,
            Operation::DelegateCall => 1,
        }
    }
}

/// An instruction waiting to be batched and signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub to: Address,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default, with = "decimal_u256")]
    pub value: U256,
    #[serde(default)]
    pub operation: Operation,
}

impl UnsignedTransaction {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            value: U256::ZERO,
            operation: Operation::Call,
        }
    }
}

/// Workflow lifecycle reported by the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Canceled,
    Terminated,
    TimedOut,
    Other(String),
}

impl WorkflowStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, WorkflowStatus::Running)
    }
}

impl From<&str> for WorkflowStatus {
    fn from(s: &str) -> Self {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "running" => WorkflowStatus::Running,
            "completed" => WorkflowStatus::Completed,
            "failed" => WorkflowStatus::Failed,
            "canceled" | "cancelled" => WorkflowStatus::Canceled,
            "terminated" => WorkflowStatus::Terminated,
            "timed_out" => WorkflowStatus::TimedOut,
            _ => WorkflowStatus::Other(s.to_string()),
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Running => write!(f, "running"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Failed => write!(f, "failed"),
            WorkflowStatus::Canceled => write!(f, "canceled"),
            WorkflowStatus::Terminated => write!(f, "terminated"),
            WorkflowStatus::TimedOut => write!(f, "timed_out"),
            WorkflowStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

impl<'de> Deserialize<'de> for WorkflowStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(WorkflowStatus::from(raw.as_str()))
    }
}

impl Serialize for WorkflowStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub status: WorkflowStatus,
    #[serde(default)]
    pub out: Option<WorkflowOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOutput {
    #[serde(default)]
    pub output_tx_hash: Option<B256>,
}

impl WorkflowState {
    pub fn output_tx_hash(&self) -> Option<B256> {
        self.out.as_ref().and_then(|o| o.output_tx_hash)
    }
}

/// Fields covered by the executor's EIP-712 signature
#[derive(Debug, Clone)]
pub struct ExecutableDigestRequest {
    pub account: Address,
    pub chain_id: u64,
    pub data: Bytes,
    pub executor: Address,
    pub nonce: U256,
    pub operation: Operation,
    pub plugin_address: Address,
    pub to: Address,
    pub value: U256,
}

/// Executable portion of a submitted task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Executable {
    pub call_type: Operation,
    pub data: Bytes,
    pub to: Address,
    #[serde(with = "decimal_u256")]
    pub value: U256,
}

impl From<&UnsignedTransaction> for Executable {
    fn from(tx: &UnsignedTransaction) -> Self {
        Self {
            call_type: tx.operation,
            data: tx.data.clone(),
            to: tx.to,
            value: tx.value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTask {
    pub executable: Executable,
    pub executor_signature: String,
    pub executor: Address,
    pub skip: bool,
    pub skip_reason: String,
    pub subaccount: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPayload {
    pub task: SignedTask,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTaskRequest {
    pub id: String,
    pub payload: SubmitPayload,
    pub registry_id: String,
}

/// Inputs to the Morpho deposit builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositParams {
    pub input_token: Address,
    #[serde(with = "decimal_u256_vec")]
    pub input_amount: Vec<U256>,
    pub vaults: Vec<Address>,
    pub slippage: f64,
}

/// Inputs to the Morpho withdrawal builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawParams {
    pub convert_to_output_token: bool,
    #[serde(with = "decimal_u256_vec")]
    pub share_amounts: Vec<U256>,
    pub vaults: Vec<Address>,
    pub slippage: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuilderOutput {
    pub transactions: Vec<UnsignedTransaction>,
}

/// Limits the console enforces on every execution by this executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleExecutorConfig {
    pub client_id: String,
    pub executor: Address,
    pub fee_receiver: Address,
    /// Contracts executions may call into
    pub hop_addresses: Vec<Address>,
    pub input_tokens: Vec<Address>,
    pub limit_per_execution: bool,
    /// Unix milliseconds
    pub timestamp: i64,
}

/// How the kernel schedules tasks for this executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelExecutorConfig {
    pub default_every: String,
    #[serde(rename = "executionTTL")]
    pub execution_ttl: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for KernelExecutorConfig {
    fn default() -> Self {
        Self {
            default_every: "120s".to_string(),
            execution_ttl: "120s".to_string(),
            kind: "INTERVAL".to_string(),
        }
    }
}

/// Listing shown to users browsing executors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorListing {
    pub name: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleRegistrationRequest {
    pub signature: String,
    pub chain_id: u64,
    pub config: ConsoleExecutorConfig,
    #[serde(flatten)]
    pub listing: ExecutorListing,
}

#[derive(Debug, Clone, Serialize)]
pub struct KernelRegistrationRequest {
    pub signature: String,
    pub config: KernelExecutorConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleRegistrationMessageRequest<'a> {
    pub chain_id: u64,
    pub config: &'a ConsoleExecutorConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelRegistrationMessageRequest<'a> {
    pub chain_id: u64,
    #[serde(rename = "registryID")]
    pub registry_id: &'a str,
    pub config: &'a KernelExecutorConfig,
}

/// A registered executor as the console reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorDetails {
    /// Registry id tasks are published under
    pub id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Accepts a decimal string, a 0x-hex string or a JSON integer; writes decimal.
/// Integers past u64 only keep their digits when read from text, see
/// [`exact_u256`].
pub(crate) mod decimal_u256 {
    use alloy::primitives::U256;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;
    use std::str::FromStr;

    pub fn parse(s: &str) -> Result<U256, String> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(U256::ZERO);
        }
        U256::from_str(s).map_err(|e| format!("invalid uint256 {:?}: {}", s, e))
    }

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    struct U256Visitor;

    impl<'de> Visitor<'de> for U256Visitor {
        type Value = U256;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a uint256 as a decimal or 0x-hex string, or a non-negative integer")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<U256, E> {
            parse(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<U256, E> {
            Ok(U256::from(v))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<U256, E> {
            Ok(U256::from(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<U256, E> {
            u64::try_from(v)
                .map(U256::from)
                .map_err(|_| E::custom(format!("negative uint256: {}", v)))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<U256, E> {
            Err(E::custom(format!(
                "uint256 {} is not an integer or lost precision; send it as a string",
                v
            )))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        deserializer.deserialize_any(U256Visitor)
    }
}

/// Reads the literal JSON text, so bare integers of any width stay exact.
/// Only usable where the value is parsed straight from a string or bytes.
pub(crate) mod exact_u256 {
    use alloy::primitives::U256;
    use serde::{de, Deserialize, Deserializer};
    use serde_json::value::RawValue;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let text = raw.get();
        let literal = if text.starts_with('"') {
            serde_json::from_str::<String>(text).map_err(de::Error::custom)?
        } else {
            text.to_string()
        };
        super::decimal_u256::parse(&literal).map_err(de::Error::custom)
    }
}

pub(crate) mod decimal_u256_vec {
    use alloy::primitives::U256;
    use serde::ser::SerializeSeq;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[U256], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&value.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<U256>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| super::decimal_u256::parse(s).map_err(de::Error::custom))
            .collect()
    }
}

pub(crate) mod optional_decimal_u256 {
    use alloy::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<U256>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super::decimal_u256")] U256);

        Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
    }
}
