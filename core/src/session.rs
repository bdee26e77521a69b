use std::fmt;
use std::sync::Arc;

use stakeflow_interface::{Address, WalletProvider};

use crate::contract::ContractClient;
use crate::error::Error;

/// A connected account together with the provider handle that signs for it.
///
/// Sessions are only created by [`Session::establish`]; every operation that
/// touches the chain takes one, so nothing can be read or submitted before a
/// wallet is connected.
pub struct Session<P> {
  account: Address,
  provider: Arc<P>,
}

impl<P> Session<P>
where
  P: WalletProvider,
{
  /// Detects the wallet and asks the user to authorize an account. The first
  /// account the wallet reports becomes the session account.
  pub async fn establish(provider: Arc<P>) -> Result<Self, Error> {
    if !provider.detect().await {
      return Err(Error::ProviderUnavailable);
    }
    let accounts = provider
      .request_accounts()
      .await
      .map_err(|e| Error::AuthorizationDenied(e.reason_or_code()))?;
    let account = accounts
      .first()
      .copied()
      .ok_or_else(|| Error::AuthorizationDenied("wallet returned no accounts".to_string()))?;
    Ok(Session { account, provider })
  }

  pub fn account(&self) -> Address {
    self.account
  }

  /// A client for the contract at `address`, signing as the session account.
  pub fn contract(&self, address: Address) -> ContractClient<P> {
    ContractClient::new(address, self.account, self.provider.clone())
  }
}

impl<P> Clone for Session<P> {
  fn clone(&self) -> Self {
    Session {
      account: self.account,
      provider: self.provider.clone(),
    }
  }
}

impl<P> fmt::Debug for Session<P> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Session")
      .field("account", &self.account)
      .finish_non_exhaustive()
  }
}
