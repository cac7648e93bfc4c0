//! Morpho vault data
//!
//! Read-only view of Morpho vaults (ranked by net APY) and of a user's
//! vault positions.

mod client;

pub use client::MorphoClient;

use crate::Result;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Number of vaults fetched when the task has no allow-list
pub const DEFAULT_TOP_VAULTS: usize = 10;

/// A yield-bearing vault snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vault {
    pub id: String,
    pub address: Address,
    pub symbol: String,
    /// Net annual yield as a fraction (0.05 = 5%)
    pub net_apy: f64,
}

/// A user's holding in one vault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub vault_address: Address,
    pub vault_symbol: String,
    pub shares: U256,
}

#[async_trait]
pub trait VaultData: Send + Sync {
    /// Whitelisted vaults for `asset` on `chain_id`, best net APY first.
    /// A non-empty `preferred` list restricts the result to those vaults.
    async fn get_vaults(
        &self,
        asset: Address,
        chain_id: u64,
        preferred: &[Address],
    ) -> Result<Vec<Vault>>;

    /// Vault positions held by `user` (empty when the user is unknown)
    async fn get_user_positions(&self, user: Address) -> Result<Vec<Position>>;
}

/// Sort vaults by net APY, highest first. NaN yields sink to the end.
pub fn rank_by_net_apy(vaults: &mut [Vault]) {
    vaults.sort_by(|a, b| match (a.net_apy.is_nan(), b.net_apy.is_nan()) {
        (false, false) => b.net_apy.total_cmp(&a.net_apy),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    });
}
