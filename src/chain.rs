//! On-chain reads used by the strategies
//!
//! READ-ONLY: nothing here signs or sends transactions.

use crate::{Error, Result};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    #[sol(rpc)]
    interface IERC4626 {
        function asset() external view returns (address);
        function previewRedeem(uint256 shares) external view returns (uint256 assets);
    }
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    /// ERC-20 balance of `owner`
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    /// Assets a vault would pay out for `shares` right now
    async fn preview_redeem(&self, vault: Address, shares: U256) -> Result<U256>;

    /// Underlying asset of an ERC-4626 vault
    async fn vault_asset(&self, vault: Address) -> Result<Address>;
}

/// [`ChainReader`] backed by a JSON-RPC endpoint
#[derive(Clone)]
pub struct RpcChainReader {
    provider: DynProvider,
}

impl RpcChainReader {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e| Error::Config(format!("Invalid RPC URL: {}", e)))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider })
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| Error::Rpc(format!("Failed to get chain id: {}", e)))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        IERC20::new(token, self.provider.clone())
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| Error::Rpc(format!("balanceOf({}) on {} failed: {}", owner, token, e)))
    }

    async fn preview_redeem(&self, vault: Address, shares: U256) -> Result<U256> {
        IERC4626::new(vault, self.provider.clone())
            .previewRedeem(shares)
            .call()
            .await
            .map_err(|e| Error::Rpc(format!("previewRedeem on {} failed: {}", vault, e)))
    }

    async fn vault_asset(&self, vault: Address) -> Result<Address> {
        IERC4626::new(vault, self.provider.clone())
            .asset()
            .call()
            .await
            .map_err(|e| Error::Rpc(format!("asset() on {} failed: {}", vault, e)))
    }
}
