//! EIP-712 execution digest
//!
//! The executor plugin verifies an `ExecutionParams` struct signed by the
//! executor key under the plugin's domain. The signature authorizes the
//! console to execute the call from the user's sub-account.

use super::types::ExecutableDigestRequest;
use alloy::primitives::B256;
use alloy::sol;
use alloy::sol_types::{eip712_domain, Eip712Domain, SolStruct};

pub const DOMAIN_NAME: &str = "ExecutorPlugin";
pub const DOMAIN_VERSION: &str = "1.0";

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct ExecutionParams {
        address to;
        uint256 value;
        bytes data;
        uint8 operation;
        address account;
        address executor;
        uint256 nonce;
    }
}

/// Typed structured-signing payload (domain + message)
#[derive(Debug, Clone)]
pub struct ExecutableDigest {
    pub domain: Eip712Domain,
    pub message: ExecutionParams,
}

impl ExecutableDigest {
    pub fn new(request: &ExecutableDigestRequest) -> Self {
        let domain = eip712_domain! {
            name: DOMAIN_NAME,
            version: DOMAIN_VERSION,
            chain_id: request.chain_id,
            verifying_contract: request.plugin_address,
        };

        let message = ExecutionParams {
            to: request.to,
            value: request.value,
            data: request.data.clone(),
            operation: request.operation.into(),
            account: request.account,
            executor: request.executor,
            nonce: request.nonce,
        };

        Self { domain, message }
    }

    /// Hash the executor signs: keccak256("\x19\x01" ‖ domainSeparator ‖ structHash)
    pub fn signing_hash(&self) -> B256 {
        self.message.eip712_signing_hash(&self.domain)
    }

    /// Canonical type string of the primary type
    pub fn encode_type() -> String {
        ExecutionParams::eip712_encode_type().into_owned()
    }
}
