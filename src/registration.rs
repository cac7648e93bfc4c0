//! Executor onboarding
//!
//! Runs once per executor key. The console records the executor's limits and
//! answers with the registry id tasks will be published under; the kernel is
//! then told how often to schedule them. Both steps are authorized by an
//! EIP-712 signature from the executor key over a message the console
//! composes.

use crate::config::contracts::CONSOLE_FEE_RECEIVER;
use crate::console::{
    ConsoleExecutorConfig, ExecutorDetails, ExecutorListing, ExecutorRegistryApi,
    KernelExecutorConfig,
};
use crate::wallet::SecureWallet;
use crate::{Error, Result};
use alloy::dyn_abi::TypedData;
use alloy::hex;
use alloy::primitives::{Address, U256};
use chrono::Utc;
use tracing::info;

pub const DEFAULT_EXECUTOR_NAME: &str = "morpho-agent-executor";

impl ConsoleExecutorConfig {
    /// Policy for `executor`, timestamped now. The console fee receiver is
    /// always allowed as a hop.
    pub fn for_executor(
        client_id: impl Into<String>,
        executor: Address,
        hops: &[Address],
        input_tokens: Vec<Address>,
    ) -> Self {
        let mut hop_addresses = Vec::with_capacity(hops.len() + 1);
        for hop in hops.iter().copied().chain([CONSOLE_FEE_RECEIVER]) {
            if !hop_addresses.contains(&hop) {
                hop_addresses.push(hop);
            }
        }

        Self {
            client_id: client_id.into(),
            executor,
            fee_receiver: Address::ZERO,
            hop_addresses,
            input_tokens,
            limit_per_execution: true,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Everything needed to onboard one executor on one chain
#[derive(Debug, Clone)]
pub struct Registration {
    pub chain_id: u64,
    pub console: ConsoleExecutorConfig,
    pub listing: ExecutorListing,
    pub kernel: KernelExecutorConfig,
}

/// Register on the console, then on the kernel, and return the details the
/// console now holds for the new registry
pub async fn register_executor(
    api: &dyn ExecutorRegistryApi,
    wallet: &SecureWallet,
    registration: Registration,
) -> Result<ExecutorDetails> {
    let Registration {
        chain_id,
        console,
        listing,
        kernel,
    } = registration;

    if console.executor != wallet.address() {
        return Err(Error::Config(format!(
            "Executor {} does not match the signing key {}",
            console.executor,
            wallet.address()
        )));
    }

    let message = api.console_registration_message(chain_id, &console).await?;
    let signature = sign(wallet, &message, chain_id)?;
    let registered = api
        .register_on_console(signature, chain_id, console, listing)
        .await
        .map_err(|e| Error::Console(format!("Executor registration on console failed: {}", e)))?;
    info!(registry_id = %registered.id, chain_id, "Executor registered on console");

    let message = api
        .kernel_registration_message(chain_id, &registered.id, &kernel)
        .await?;
    let signature = sign(wallet, &message, chain_id)?;
    api.register_on_kernel(&registered.id, signature, kernel)
        .await
        .map_err(|e| Error::Console(format!("Executor registration on kernel failed: {}", e)))?;
    info!(registry_id = %registered.id, "Executor registered on kernel");

    api.fetch_executor_details(&registered.id).await
}

/// Refuse to sign a message bound to another chain
fn sign(wallet: &SecureWallet, message: &TypedData, chain_id: u64) -> Result<String> {
    if let Some(domain_chain) = message.domain.chain_id {
        if domain_chain != U256::from(chain_id) {
            return Err(Error::Console(format!(
                "Registration message is for chain {}, expected {}",
                domain_chain, chain_id
            )));
        }
    }
    let signature = wallet.sign_typed_data(message)?;
    Ok(hex::encode_prefixed(signature.as_bytes()))
}
