//! HTTP client for the console automation API

use super::types::{
    ApiResponse, BuilderOutput, ConsoleExecutorConfig, ConsoleRegistrationMessageRequest,
    ConsoleRegistrationRequest, DepositParams, ExecutorDetails, ExecutorListing,
    KernelExecutorConfig, KernelRegistrationMessageRequest, KernelRegistrationRequest,
    SubmitTaskRequest, Task, UnsignedTransaction, WithdrawParams, WorkflowState,
};
use super::{ConsoleApi, ExecutorRegistryApi};
use crate::{Error, Result};
use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const API_KEY_HEADER: &str = "x-api-key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct NonceValue(#[serde(with = "super::types::decimal_u256")] U256);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuilderRequest<'a, P> {
    chain_id: u64,
    account: Address,
    params: &'a P,
}

/// Console API client
pub struct ConsoleClient {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl ConsoleClient {
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid console base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Console base URL cannot have paths: {}",
                base_url
            )));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Append path segments to the base URL, escaping each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Invalid console base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<(StatusCode, String)> {
        tracing::debug!(url = %url, "GET console");
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await?;
        let status = response.status();
        Ok((status, response.text().await?))
    }

    async fn post<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<(StatusCode, String)> {
        tracing::debug!(url = %url, "POST console");
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(body)
            .send()
            .await?;
        let status = response.status();
        Ok((status, response.text().await?))
    }
}

/// Unwrap the `{ "data": ... }` envelope of a successful response
fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    if !status.is_success() {
        return Err(Error::Console(format!("HTTP {}: {}", status, truncate(body))));
    }
    let envelope: ApiResponse<T> = serde_json::from_str(body).map_err(|e| {
        Error::Console(format!("Unexpected response ({}): {}", e, truncate(body)))
    })?;
    Ok(envelope.data)
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(500) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl ConsoleApi for ConsoleClient {
    async fn fetch_tasks(&self, registry_id: &str, offset: u32, limit: u32) -> Result<Vec<Task>> {
        let mut url = self.endpoint(&["v1", "automations", "tasks", registry_id])?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &limit.to_string());

        let (status, body) = self.get(url).await?;
        decode_envelope(status, &body)
    }

    async fn fetch_executor_nonce(
        &self,
        account: Address,
        executor: Address,
        chain_id: u64,
    ) -> Result<U256> {
        let mut url = self.endpoint(&["v1", "automations", "executor", "nonce"])?;
        url.query_pairs_mut()
            .append_pair("chainId", &chain_id.to_string())
            .append_pair("account", &account.to_string())
            .append_pair("executor", &executor.to_string());

        let (status, body) = self.get(url).await?;
        let NonceValue(nonce) = decode_envelope(status, &body)?;
        Ok(nonce)
    }

    async fn submit_task(&self, request: SubmitTaskRequest) -> Result<()> {
        let url = self.endpoint(&["v1", "automations", "tasks", "submit", &request.id])?;
        let (status, body) = self.post(url, &request).await?;
        if !status.is_success() {
            return Err(Error::Console(format!(
                "Task {} submission rejected (HTTP {}): {}",
                request.id,
                status,
                truncate(&body)
            )));
        }
        Ok(())
    }

    async fn fetch_workflow_state(&self, task_id: &str) -> Result<Option<WorkflowState>> {
        let url = self.endpoint(&["v1", "automations", "tasks", "workflow", task_id])?;
        let (status, body) = self.get(url).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode_envelope(status, &body)
    }

    async fn morpho_deposit(
        &self,
        chain_id: u64,
        account: Address,
        params: DepositParams,
    ) -> Result<Vec<UnsignedTransaction>> {
        let url = self.endpoint(&["v1", "builder", "morpho", "deposit"])?;
        let request = BuilderRequest {
            chain_id,
            account,
            params: &params,
        };
        let (status, body) = self.post(url, &request).await?;
        let output: BuilderOutput = decode_envelope(status, &body)?;
        Ok(output.transactions)
    }

    async fn morpho_withdraw(
        &self,
        chain_id: u64,
        account: Address,
        params: WithdrawParams,
    ) -> Result<Vec<UnsignedTransaction>> {
        let url = self.endpoint(&["v1", "builder", "morpho", "withdraw"])?;
        let request = BuilderRequest {
            chain_id,
            account,
            params: &params,
        };
        let (status, body) = self.post(url, &request).await?;
        let output: BuilderOutput = decode_envelope(status, &body)?;
        Ok(output.transactions)
    }
}

#[async_trait]
impl ExecutorRegistryApi for ConsoleClient {
    async fn console_registration_message(
        &self,
        chain_id: u64,
        config: &ConsoleExecutorConfig,
    ) -> Result<TypedData> {
        let url =
            self.endpoint(&["v1", "automations", "executor", "generate", "712", "console"])?;
        let request = ConsoleRegistrationMessageRequest { chain_id, config };
        let (status, body) = self.post(url, &request).await?;
        decode_envelope(status, &body)
    }

    async fn register_on_console(
        &self,
        signature: String,
        chain_id: u64,
        config: ConsoleExecutorConfig,
        listing: ExecutorListing,
    ) -> Result<ExecutorDetails> {
        let url = self.endpoint(&["v1", "automations", "executor"])?;
        let request = ConsoleRegistrationRequest {
            signature,
            chain_id,
            config,
            listing,
        };
        let (status, body) = self.post(url, &request).await?;
        decode_envelope(status, &body)
    }

    async fn kernel_registration_message(
        &self,
        chain_id: u64,
        registry_id: &str,
        config: &KernelExecutorConfig,
    ) -> Result<TypedData> {
        let url =
            self.endpoint(&["v1", "automations", "executor", "generate", "712", "kernel"])?;
        let request = KernelRegistrationMessageRequest {
            chain_id,
            registry_id,
            config,
        };
        let (status, body) = self.post(url, &request).await?;
        decode_envelope(status, &body)
    }

    async fn register_on_kernel(
        &self,
        registry_id: &str,
        signature: String,
        config: KernelExecutorConfig,
    ) -> Result<()> {
        let url = self.endpoint(&["v1", "kernel", "executor", registry_id, "register"])?;
        let request = KernelRegistrationRequest { signature, config };
        let (status, body) = self.post(url, &request).await?;
        if !status.is_success() {
            return Err(Error::Console(format!(
                "Kernel registration of {} rejected (HTTP {}): {}",
                registry_id,
                status,
                truncate(&body)
            )));
        }
        Ok(())
    }

    async fn fetch_executor_details(&self, registry_id: &str) -> Result<ExecutorDetails> {
        let url = self.endpoint(&["v1", "automations", "executor", registry_id])?;
        let (status, body) = self.get(url).await?;
        decode_envelope(status, &body)
    }
}
