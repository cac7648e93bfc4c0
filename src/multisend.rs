//! Batching several account calls into one executable
//!
//! Each call is packed as `uint8 operation ‖ address to ‖ uint256 value ‖
//! uint256 len(data) ‖ data`; the concatenation is handed to the multisend
//! contract through a delegate call so every inner call runs as the account.

use crate::console::{Operation, UnsignedTransaction};
use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    function multiSend(bytes transactions);
}

/// Packed encoding of a batch, without the `multiSend` selector
pub fn pack_transactions(transactions: &[UnsignedTransaction]) -> Bytes {
    let mut packed = Vec::new();
    for tx in transactions {
        packed.push(u8::from(tx.operation));
        packed.extend_from_slice(tx.to.as_slice());
        packed.extend_from_slice(&tx.value.to_be_bytes::<32>());
        packed.extend_from_slice(&U256::from(tx.data.len()).to_be_bytes::<32>());
        packed.extend_from_slice(&tx.data);
    }
    packed.into()
}

/// Wrap a batch in a single delegate call to `multi_send`
pub fn encode_multi(transactions: &[UnsignedTransaction], multi_send: Address) -> UnsignedTransaction {
    let data = multiSendCall {
        transactions: pack_transactions(transactions),
    }
    .abi_encode();

    UnsignedTransaction {
        to: multi_send,
        data: data.into(),
        value: U256::ZERO,
        operation: Operation::DelegateCall,
    }
}

/// Collapse a strategy's transaction list into the one executable that gets signed.
/// A single transaction passes through untouched.
pub fn prepare_executable(
    task_id: &str,
    transactions: &[UnsignedTransaction],
    multi_send: Address,
) -> Result<UnsignedTransaction> {
    match transactions {
        [] => Err(Error::EmptyExecution(task_id.to_string())),
        [single] => Ok(single.clone()),
        many => Ok(encode_multi(many, multi_send)),
    }
}
