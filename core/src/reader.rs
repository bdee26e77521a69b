//! Balance and allowance reads for the session account.
//!
//! Reads never submit anything and may run concurrently. A failure leaves it
//! to the caller to keep whatever value it had cached.

use stakeflow_interface::abi::IStakingToken;
use stakeflow_interface::WalletProvider;

use crate::amount::Amount;
use crate::error::{Error, ReadTarget};
use crate::session::Session;
use crate::utils::ContractLayout;

/// The token balance of the session account.
pub async fn refresh_balance<P: WalletProvider>(
  session: &Session<P>,
  layout: &ContractLayout,
) -> Result<Amount, Error> {
  let call = IStakingToken::balanceOfCall {
    owner: session.account(),
  };
  let ret = session
    .contract(layout.token())
    .call(&call)
    .await
    .map_err(|e| Error::read(ReadTarget::Balance, e))?;
  let balance = Amount::from(ret._0);
  tracing::debug!(account = %session.account(), %balance, "balance read");
  Ok(balance)
}

/// How much the stake target may still pull from the session account.
pub async fn refresh_allowance<P: WalletProvider>(
  session: &Session<P>,
  layout: &ContractLayout,
) -> Result<Amount, Error> {
  let call = IStakingToken::allowanceCall {
    owner: session.account(),
    spender: layout.stake_target(),
  };
  let ret = session
    .contract(layout.token())
    .call(&call)
    .await
    .map_err(|e| Error::read(ReadTarget::Allowance, e))?;
  let allowance = Amount::from(ret._0);
  tracing::debug!(account = %session.account(), %allowance, "allowance read");
  Ok(allowance)
}

/// Reads balance and allowance concurrently.
pub async fn refresh_all<P: WalletProvider>(
  session: &Session<P>,
  layout: &ContractLayout,
) -> (Result<Amount, Error>, Result<Amount, Error>) {
  futures::join!(
    refresh_balance(session, layout),
    refresh_allowance(session, layout)
  )
}
