use stakeflow_interface::abi::IStakeDapp;
use stakeflow_interface::{TransactionReceipt, WalletProvider};

use super::{confirm, requested_amount};
use crate::amount::Amount;
use crate::error::Error;
use crate::session::Session;
use crate::utils::CoordinatorOpts;

/// A stake that passed validation against the cached balance and allowance.
///
/// The cached values may lag the chain. Validation does not re-read them; a
/// stale cache shows up as a reverted transaction instead.
#[derive(Debug)]
pub struct StakeRequest<P> {
  session: Session<P>,
  amount: Amount,
}

impl<P> StakeRequest<P>
where
  P: WalletProvider,
{
  /// Checks, in order: a session exists, the input is not empty and parses,
  /// the amount is covered by `balance`, the amount is covered by
  /// `allowance`.
  pub fn validate(
    session: Option<Session<P>>,
    input: &str,
    balance: Amount,
    allowance: Amount,
  ) -> Result<Self, Error> {
    let session = session.ok_or(Error::NotConnected)?;
    let amount = requested_amount(input)?;
    if amount > balance {
      return Err(Error::InsufficientBalance {
        requested: amount,
        available: balance,
      });
    }
    if amount > allowance {
      return Err(Error::InsufficientAllowance {
        requested: amount,
        approved: allowance,
        shortfall: amount.saturating_sub(allowance),
      });
    }
    Ok(StakeRequest { session, amount })
  }

  pub fn amount(&self) -> Amount {
    self.amount
  }

  pub fn session(&self) -> &Session<P> {
    &self.session
  }

  /// Sends `stake` to the stake target with the configured gas ceiling and
  /// waits for confirmation.
  pub async fn submit(&self, opts: &CoordinatorOpts) -> Result<TransactionReceipt, Error> {
    let target = opts.layout().stake_target();
    let call = IStakeDapp::stakeCall {
      amount: self.amount.base_units(),
    };
    tracing::info!(
      amount = %self.amount,
      %target,
      gas_limit = opts.stake_gas_limit(),
      "submitting stake"
    );
    let pending = self
      .session
      .contract(target)
      .submit(&call, Some(opts.stake_gas_limit()))
      .await
      .map_err(Error::submission)?;
    confirm(pending).await
  }
}
