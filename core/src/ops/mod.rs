//! The two mutating operations.
//!
//! Each is split into a synchronous `validate`, which runs every precondition
//! without touching the wallet, and an async `submit` on the validated
//! request. A request can only be built by passing validation.

mod approve;
mod stake;

pub use approve::ApprovalRequest;
pub use stake::StakeRequest;

use stakeflow_interface::{TransactionReceipt, TxStatus, WalletProvider};

use crate::amount::{to_fixed_point, Amount};
use crate::contract::PendingTransaction;
use crate::error::Error;

/// Parses the amount typed into the form. Surrounding whitespace is ignored.
pub fn requested_amount(input: &str) -> Result<Amount, Error> {
  let input = input.trim();
  if input.is_empty() {
    return Err(Error::EmptyAmount);
  }
  Ok(to_fixed_point(input)?)
}

async fn confirm<P: WalletProvider>(pending: PendingTransaction<P>) -> Result<TransactionReceipt, Error> {
  let hash = pending.hash();
  let receipt = pending.wait().await.map_err(Error::submission)?;
  match receipt.status {
    TxStatus::Confirmed => Ok(receipt),
    TxStatus::Reverted => Err(Error::TransactionReverted(format!(
      "transaction {hash} reverted after using {} gas",
      receipt.gas_used
    ))),
  }
}
