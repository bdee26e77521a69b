use stakeflow_interface::abi::IStakingToken;
use stakeflow_interface::{TransactionReceipt, WalletProvider};

use super::{confirm, requested_amount};
use crate::amount::Amount;
use crate::error::Error;
use crate::session::Session;
use crate::utils::ContractLayout;

/// An approval that passed validation.
///
/// Approval moves no funds, so neither balance nor allowance is consulted.
/// The approved amount replaces any previous allowance.
#[derive(Debug)]
pub struct ApprovalRequest<P> {
  session: Session<P>,
  amount: Amount,
}

impl<P> ApprovalRequest<P>
where
  P: WalletProvider,
{
  /// Checks, in order: a session exists, the input is not empty, the input
  /// parses.
  pub fn validate(session: Option<Session<P>>, input: &str) -> Result<Self, Error> {
    let session = session.ok_or(Error::NotConnected)?;
    let amount = requested_amount(input)?;
    Ok(ApprovalRequest { session, amount })
  }

  pub fn amount(&self) -> Amount {
    self.amount
  }

  pub fn session(&self) -> &Session<P> {
    &self.session
  }

  /// Approves the stake target for the requested amount and waits for
  /// confirmation.
  pub async fn submit(&self, layout: &ContractLayout) -> Result<TransactionReceipt, Error> {
    let call = IStakingToken::approveCall {
      spender: layout.stake_target(),
      amount: self.amount.base_units(),
    };
    tracing::info!(amount = %self.amount, spender = %call.spender, "submitting approval");
    let pending = self
      .session
      .contract(layout.token())
      .submit(&call, None)
      .await
      .map_err(Error::submission)?;
    confirm(pending).await
  }
}
