//! Keep a sub-account's funds in the best-yield Morpho vault

use super::{ExecutionResult, Strategy};
use crate::chain::ChainReader;
use crate::console::{ConsoleApi, DepositParams, TaskParams, WithdrawParams};
use crate::morpho::{Position, VaultData};
use crate::{tokens, Error, Result};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Slippage tolerance for vault deposits and withdrawals (percent)
pub const DEFAULT_SLIPPAGE_PERCENT: f64 = 2.0;

pub struct RebalancingStrategy {
    vaults: Arc<dyn VaultData>,
    chain: Arc<dyn ChainReader>,
    console: Arc<dyn ConsoleApi>,
    slippage: f64,
}

impl RebalancingStrategy {
    pub fn new(
        vaults: Arc<dyn VaultData>,
        chain: Arc<dyn ChainReader>,
        console: Arc<dyn ConsoleApi>,
    ) -> Self {
        Self {
            vaults,
            chain,
            console,
            slippage: DEFAULT_SLIPPAGE_PERCENT,
        }
    }

    pub fn with_slippage(mut self, slippage_percent: f64) -> Self {
        self.slippage = slippage_percent;
        self
    }

    /// Deposit the whole base-token balance into `vault`
    async fn deposit(
        &self,
        params: &TaskParams,
        token: Address,
        vault: Address,
    ) -> Result<ExecutionResult> {
        let subaccount = params.sub_account_address;
        let balance = self.chain.token_balance(token, subaccount).await?;
        debug!(
            subaccount = %subaccount,
            balance = %tokens::display_amount(token, balance),
            "Available balance"
        );

        if balance.is_zero() {
            return Ok(ExecutionResult::skip("No balance available for deposit"));
        }

        let transactions = self
            .console
            .morpho_deposit(
                params.chain_id,
                subaccount,
                DepositParams {
                    input_token: token,
                    input_amount: vec![balance],
                    vaults: vec![vault],
                    slippage: self.slippage,
                },
            )
            .await?;

        Ok(ExecutionResult::execute(
            format!("Depositing into vault {}", vault),
            transactions,
        ))
    }

    /// Redeem every share of `current` and deposit the proceeds into `target`
    async fn rebalance(
        &self,
        params: &TaskParams,
        current: &Position,
        target: Address,
    ) -> Result<ExecutionResult> {
        let subaccount = params.sub_account_address;
        let from = current.vault_address;

        let expected_assets = self.chain.preview_redeem(from, current.shares).await?;
        let asset = self.chain.vault_asset(from).await?;
        debug!(
            vault = %from,
            shares = %current.shares,
            expected = %tokens::display_amount(asset, expected_assets),
            "Previewed redemption"
        );

        let mut transactions = self
            .console
            .morpho_withdraw(
                params.chain_id,
                subaccount,
                WithdrawParams {
                    convert_to_output_token: false,
                    share_amounts: vec![current.shares],
                    vaults: vec![from],
                    slippage: self.slippage,
                },
            )
            .await?;

        // The deposit spends what the withdrawal frees, so it must come second
        let deposits = self
            .console
            .morpho_deposit(
                params.chain_id,
                subaccount,
                DepositParams {
                    input_token: asset,
                    input_amount: vec![expected_assets],
                    vaults: vec![target],
                    slippage: self.slippage,
                },
            )
            .await?;
        transactions.extend(deposits);

        Ok(ExecutionResult::execute(
            format!(
                "Withdrawing from {} (will deposit to {} after)",
                from, target
            ),
            transactions,
        ))
    }
}

#[async_trait]
impl Strategy for RebalancingStrategy {
    fn name(&self) -> &'static str {
        "rebalance"
    }

    async fn evaluate(&self, params: &TaskParams) -> Result<ExecutionResult> {
        let subaccount = params.sub_account_address;
        let metadata = &params.subscription.metadata;
        let base_token = metadata.base_token.ok_or_else(|| {
            Error::Strategy(format!(
                "Subscription {} has no baseToken",
                params.subscription.id
            ))
        })?;
        let preferred = metadata.preferred_vaults.as_deref().unwrap_or_default();

        info!(subaccount = %subaccount, chain_id = params.chain_id, "Evaluating rebalance");

        let vaults = self
            .vaults
            .get_vaults(base_token, params.chain_id, preferred)
            .await?;
        let Some(best) = vaults.first() else {
            return Ok(ExecutionResult::skip("No vaults found"));
        };
        debug!(vault = %best.address, net_apy = best.net_apy, "Best vault");

        // Multi-vault positions are not supported: only the first one counts
        let positions = self.vaults.get_user_positions(subaccount).await?;
        let Some(current) = positions.first() else {
            info!(vault = %best.address, "No current position, depositing into best vault");
            return Ok(self
                .deposit(params, base_token, best.address)
                .await
                .unwrap_or_else(|e| {
                    warn!(subaccount = %subaccount, error = %e, "Deposit failed");
                    ExecutionResult::skip(format!("Deposit error: {}", e))
                }));
        };

        // Addresses compare byte-wise, so checksum casing never matters
        let Some(current_vault) = vaults.iter().find(|v| v.address == current.vault_address)
        else {
            warn!(
                vault = %current.vault_address,
                "Current vault not in candidate list, possible configuration issue"
            );
            return Ok(ExecutionResult::skip("Current vault not in allowlist"));
        };

        if best.address == current_vault.address {
            debug!(vault = %best.address, "Already in best vault");
            return Ok(ExecutionResult::skip("Already in best vault"));
        }

        info!(
            from = %current_vault.address,
            from_apy = current_vault.net_apy,
            to = %best.address,
            to_apy = best.net_apy,
            "Rebalancing"
        );
        Ok(self
            .rebalance(params, current, best.address)
            .await
            .unwrap_or_else(|e| {
                warn!(subaccount = %subaccount, error = %e, "Rebalance failed");
                ExecutionResult::skip(format!("Rebalance error: {}", e))
            }))
    }
}
