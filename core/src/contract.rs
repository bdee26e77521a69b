use std::sync::Arc;

use alloy_sol_types::SolCall;
use stakeflow_interface::{
  Address, ErrorCode, ProviderError, TransactionReceipt, TransactionRequest, TxHash, WalletProvider,
};

/// A contract at a fixed address, called on behalf of the session account.
pub struct ContractClient<P> {
  address: Address,
  signer: Address,
  provider: Arc<P>,
}

impl<P> ContractClient<P>
where
  P: WalletProvider,
{
  pub fn new(address: Address, signer: Address, provider: Arc<P>) -> Self {
    ContractClient {
      address,
      signer,
      provider,
    }
  }

  pub fn address(&self) -> Address {
    self.address
  }

  /// Executes a view call and decodes its return values. Nothing is signed.
  pub async fn call<C: SolCall>(&self, call: &C) -> Result<C::Return, ProviderError> {
    let data = call.abi_encode();
    tracing::debug!(to = %self.address, "call 0x{}", hex::encode(&data));
    let output = self.provider.call(self.address, data.into()).await?;
    C::abi_decode_returns(&output, true)
      .map_err(|e| ProviderError::with_reason(ErrorCode::BadData, e.to_string()))
  }

  /// Asks the wallet to sign and broadcast `call`. An explicit `gas_limit`
  /// skips the wallet's own estimation.
  pub async fn submit<C: SolCall>(
    &self,
    call: &C,
    gas_limit: Option<u64>,
  ) -> Result<PendingTransaction<P>, ProviderError> {
    let mut tx = TransactionRequest::new(self.signer, self.address, call.abi_encode());
    tx.gas_limit = gas_limit;
    tracing::debug!(to = %self.address, ?gas_limit, "submit 0x{}", hex::encode(&tx.data));
    let hash = self.provider.send_transaction(tx).await?;
    tracing::info!(%hash, to = %self.address, "transaction submitted");
    Ok(PendingTransaction {
      hash,
      provider: self.provider.clone(),
    })
  }
}

/// A broadcast transaction that has not been confirmed yet.
pub struct PendingTransaction<P> {
  hash: TxHash,
  provider: Arc<P>,
}

impl<P> PendingTransaction<P>
where
  P: WalletProvider,
{
  pub fn hash(&self) -> TxHash {
    self.hash
  }

  /// Waits for the transaction to be final, however long that takes.
  pub async fn wait(self) -> Result<TransactionReceipt, ProviderError> {
    self.provider.wait_for_receipt(self.hash).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use stakeflow_interface::abi::IStakingToken;
  use stakeflow_interface::{Bytes, MockWalletProvider, TxStatus, ADDRESS_ALICE, U256};

  const TOKEN: Address = Address::repeat_byte(0x70);

  #[tokio::test]
  async fn call_decodes_return() {
    let mut provider = MockWalletProvider::new();
    provider
      .expect_call()
      .withf(|to, data| *to == TOKEN && data[..4] == IStakingToken::balanceOfCall::SELECTOR)
      .times(1)
      .returning(|_, _| {
        Ok(Bytes::from(IStakingToken::balanceOfCall::abi_encode_returns(&(
          U256::from(42u64),
        ))))
      });
    let client = ContractClient::new(TOKEN, ADDRESS_ALICE, Arc::new(provider));
    let ret = client
      .call(&IStakingToken::balanceOfCall {
        owner: ADDRESS_ALICE,
      })
      .await
      .unwrap();
    assert_eq!(ret._0, U256::from(42u64));
  }

  #[tokio::test]
  async fn call_rejects_garbage() {
    let mut provider = MockWalletProvider::new();
    provider
      .expect_call()
      .returning(|_, _| Ok(Bytes::from_static(&[1, 2, 3])));
    let client = ContractClient::new(TOKEN, ADDRESS_ALICE, Arc::new(provider));
    let err = client
      .call(&IStakingToken::balanceOfCall {
        owner: ADDRESS_ALICE,
      })
      .await
      .unwrap_err();
    assert_eq!(err.code, ErrorCode::BadData);
  }

  #[tokio::test]
  async fn submit_signs_as_session_account() {
    let hash = TxHash::repeat_byte(9);
    let mut provider = MockWalletProvider::new();
    provider
      .expect_send_transaction()
      .withf(|tx| tx.from == ADDRESS_ALICE && tx.to == TOKEN && tx.gas_limit == Some(21_000))
      .times(1)
      .returning(move |_| Ok(hash));
    provider
      .expect_wait_for_receipt()
      .times(1)
      .returning(|hash| Ok(TransactionReceipt::new(hash, TxStatus::Confirmed, 21_000)));
    let client = ContractClient::new(TOKEN, ADDRESS_ALICE, Arc::new(provider));
    let pending = client
      .submit(
        &IStakingToken::approveCall {
          spender: TOKEN,
          amount: U256::from(1u8),
        },
        Some(21_000),
      )
      .await
      .unwrap();
    assert_eq!(pending.hash(), hash);
    assert!(pending.wait().await.unwrap().is_confirmed());
  }
}
