//! Recurring ERC-20 transfer out of the sub-account

use super::{ExecutionResult, Strategy};
use crate::chain::IERC20;
use crate::console::{TaskParams, UnsignedTransaction};
use crate::{tokens, Error, Result};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use tracing::{info, warn};

/// Sends `transferAmount` of the task's token to `receiver` every time the
/// registry schedules the task. The schedule itself (`every`) is enforced
/// upstream; it only has to be present.
#[derive(Debug, Default, Clone)]
pub struct TransferStrategy;

impl TransferStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Strategy for TransferStrategy {
    fn name(&self) -> &'static str {
        "transfer"
    }

    async fn evaluate(&self, params: &TaskParams) -> Result<ExecutionResult> {
        let metadata = &params.subscription.metadata;
        let (Some(receiver), Some(amount), Some(_every)) =
            (metadata.receiver, metadata.transfer_amount, &metadata.every)
        else {
            warn!(
                subscription = %params.subscription.id,
                "Inconsistent task metadata, skipping"
            );
            return Ok(ExecutionResult::skip("Inconsistent task metadata"));
        };

        let token = metadata
            .token
            .or_else(|| tokens::usdc(params.chain_id))
            .ok_or_else(|| {
                Error::Strategy(format!("No token configured for chain {}", params.chain_id))
            })?;

        let data = IERC20::transferCall {
            to: receiver,
            amount,
        }
        .abi_encode();

        info!(
            subaccount = %params.sub_account_address,
            receiver = %receiver,
            amount = %tokens::display_amount(token, amount),
            "Preparing transfer"
        );
        Ok(ExecutionResult::execute(
            format!("Transferring {} to {}", tokens::display_amount(token, amount), receiver),
            vec![UnsignedTransaction::call(token, data)],
        ))
    }
}
