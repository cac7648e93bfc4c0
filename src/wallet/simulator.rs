//! Pre-signing simulation of executables
//!
//! Uses `eth_call` from the sub-account to catch reverts before the executor
//! signs anything. Only plain calls can be simulated this way: a
//! delegate-call executable runs in the account's own context, which
//! `eth_call` cannot reproduce.
//!
//! This module is read-only - it never signs or submits transactions.

use crate::console::{Operation, UnsignedTransaction};
use crate::{Error, Result};
use alloy::hex;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use serde::{Deserialize, Serialize};

/// Result of simulating a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub success: bool,
    pub gas_used: Option<u64>,
    pub revert_reason: Option<String>,
}

impl SimulationResult {
    pub fn success(gas_used: u64) -> Self {
        Self {
            success: true,
            gas_used: Some(gas_used),
            revert_reason: None,
        }
    }

    pub fn failed(reason: String) -> Self {
        Self {
            success: false,
            gas_used: None,
            revert_reason: Some(reason),
        }
    }
}

/// Transaction simulator using eth_call
pub struct TransactionSimulator {
    provider: DynProvider,
}

impl TransactionSimulator {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e| Error::Config(format!("Invalid RPC URL: {}", e)))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider })
    }

    /// Simulate `tx` as if sent by `from`
    pub async fn simulate(&self, from: Address, tx: &UnsignedTransaction) -> Result<SimulationResult> {
        if tx.operation == Operation::DelegateCall {
            return Err(Error::Simulation(
                "delegate-call executables cannot be simulated with eth_call".to_string(),
            ));
        }

        let request = TransactionRequest::default()
            .from(from)
            .to(tx.to)
            .input(tx.data.clone().into())
            .value(tx.value);

        match self.provider.call(request.clone()).await {
            Ok(_) => {
                let gas = self.provider.estimate_gas(request).await.unwrap_or(0);
                Ok(SimulationResult::success(gas))
            }
            Err(e) => Ok(SimulationResult::failed(parse_revert_reason(&e.to_string()))),
        }
    }
}

/// Extract a readable revert reason from an RPC error message
fn parse_revert_reason(error: &str) -> String {
    if !error.contains("execution reverted") {
        return error.to_string();
    }

    if let Some(start) = error.find("revert: ") {
        let reason = &error[start + 8..];
        return match reason.find('"') {
            Some(end) => reason[..end].to_string(),
            None => reason.to_string(),
        };
    }

    if let Some(start) = error.find("0x") {
        let hex_data = &error[start..];
        let end = hex_data[2..]
            .find(|c: char| !c.is_ascii_hexdigit())
            .map(|i| i + 2)
            .unwrap_or(hex_data.len());
        let data = &hex_data[..end];
        // Error(string): selector + offset + length + payload
        if data.starts_with("0x08c379a0") && data.len() > 138 {
            if let Ok(decoded) = hex::decode(&data[138..]) {
                let text: Vec<u8> = decoded.into_iter().filter(|&b| b != 0).collect();
                if let Ok(s) = String::from_utf8(text) {
                    return s;
                }
            }
        }
        return format!("Reverted with data: {}", data);
    }

    "execution reverted".to_string()
}
