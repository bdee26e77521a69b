use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy_primitives::{keccak256, Address, Bytes, TxHash, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;

use crate::abi::{IStakeDapp, IStakingToken};
use crate::{
  ErrorCode, ProviderError, TransactionReceipt, TransactionRequest, TxStatus, WalletProvider,
};

/// Gas consumed by an approval.
pub const APPROVE_GAS: u64 = 46_000;
/// Gas consumed by a stake. A stake sent with a lower ceiling runs out of gas.
pub const STAKE_GAS: u64 = 120_000;

// switches used to simulate wallet and network failures
#[derive(Debug, Default, Clone, Copy)]
struct Faults {
  missing: bool,
  deny_accounts: bool,
  reject_signing: bool,
  gas_estimation: bool,
  revert_next: bool,
  reads: bool,
}

#[derive(Debug, Default)]
struct ChainState {
  accounts: Vec<Address>,
  balances: BTreeMap<Address, U256>,
  allowances: BTreeMap<(Address, Address), U256>,
  staked: BTreeMap<Address, U256>,
  pending: BTreeMap<TxHash, TransactionReceipt>,
  submitted: Vec<TransactionRequest>,
  nonce: u64,
  faults: Faults,
}

/// An in-memory wallet backed by a token and a staking contract.
///
/// Useful for running the coordinator standalone and in tests. Calls are
/// decoded from their ABI encoding, so the coordinator talks to it exactly as
/// it would to a real provider. Transactions execute when they are sent and
/// their receipts are handed out by `wait_for_receipt`.
#[derive(Debug)]
pub struct MockChain {
  token: Address,
  staking: Address,
  state: Mutex<ChainState>,
}

impl MockChain {
  /// A chain where `staking` receives stakes on behalf of `token`. Passing
  /// the same address twice models a token that accepts stakes itself.
  pub fn new(token: Address, staking: Address) -> Self {
    MockChain {
      token,
      staking,
      state: Mutex::new(ChainState::default()),
    }
  }

  /// Adds a wallet account holding `balance` base units.
  pub fn with_account(self, account: Address, balance: U256) -> Self {
    {
      let mut state = self.state();
      state.accounts.push(account);
      state.balances.insert(account, balance);
    }
    self
  }

  pub fn token(&self) -> Address {
    self.token
  }

  pub fn staking(&self) -> Address {
    self.staking
  }

  fn state(&self) -> MutexGuard<'_, ChainState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn set_balance(&self, account: &Address, balance: U256) {
    self.state().balances.insert(*account, balance);
  }

  pub fn balance_of(&self, account: &Address) -> U256 {
    self
      .state()
      .balances
      .get(account)
      .copied()
      .unwrap_or_default()
  }

  pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
    self
      .state()
      .allowances
      .get(&(*owner, *spender))
      .copied()
      .unwrap_or_default()
  }

  pub fn staked(&self, account: &Address) -> U256 {
    self.state().staked.get(account).copied().unwrap_or_default()
  }

  /// Makes the wallet report `accounts`, first one active.
  pub fn set_accounts(&self, accounts: Vec<Address>) {
    self.state().accounts = accounts;
  }

  /// Every transaction the wallet was asked to sign, including rejected ones.
  pub fn submitted(&self) -> Vec<TransactionRequest> {
    self.state().submitted.clone()
  }

  pub fn set_missing(&self, missing: bool) {
    self.state().faults.missing = missing;
  }

  pub fn set_deny_accounts(&self, deny: bool) {
    self.state().faults.deny_accounts = deny;
  }

  pub fn set_reject_signing(&self, reject: bool) {
    self.state().faults.reject_signing = reject;
  }

  pub fn set_gas_estimation_failure(&self, fail: bool) {
    self.state().faults.gas_estimation = fail;
  }

  /// The next transaction that would otherwise succeed is reverted.
  pub fn set_revert_next(&self, revert: bool) {
    self.state().faults.revert_next = revert;
  }

  pub fn set_read_failure(&self, fail: bool) {
    self.state().faults.reads = fail;
  }

  /// Clears all simulated faults.
  pub fn heal(&self) {
    self.state().faults = Faults::default();
  }

  fn read(&self, to: Address, data: &[u8]) -> Result<Bytes, ProviderError> {
    if to != self.token {
      return Err(ProviderError::with_reason(
        ErrorCode::CallException,
        "call to non-contract",
      ));
    }
    let state = self.state();
    let selector = selector(data)?;
    let output = if selector == IStakingToken::balanceOfCall::SELECTOR {
      let call = decode::<IStakingToken::balanceOfCall>(data)?;
      let balance = state.balances.get(&call.owner).copied().unwrap_or_default();
      IStakingToken::balanceOfCall::abi_encode_returns(&(balance,))
    } else if selector == IStakingToken::allowanceCall::SELECTOR {
      let call = decode::<IStakingToken::allowanceCall>(data)?;
      let allowance = state
        .allowances
        .get(&(call.owner, call.spender))
        .copied()
        .unwrap_or_default();
      IStakingToken::allowanceCall::abi_encode_returns(&(allowance,))
    } else {
      return Err(ProviderError::with_reason(
        ErrorCode::CallException,
        format!("unknown selector 0x{}", hex::encode(selector)),
      ));
    };
    Ok(output.into())
  }

  // Applies the transaction and returns the status and the gas it used.
  fn execute(&self, state: &mut ChainState, tx: &TransactionRequest) -> Result<(TxStatus, u64), ProviderError> {
    let selector = selector(&tx.data)?;
    if selector == IStakingToken::approveCall::SELECTOR && tx.to == self.token {
      let call = decode::<IStakingToken::approveCall>(&tx.data)?;
      if tx.gas_limit.is_some_and(|limit| limit < APPROVE_GAS) {
        return Ok((TxStatus::Reverted, tx.gas_limit.unwrap_or_default()));
      }
      // allowances are overwritten, never accumulated
      state.allowances.insert((tx.from, call.spender), call.amount);
      return Ok((TxStatus::Confirmed, APPROVE_GAS));
    }

    if selector == IStakeDapp::stakeCall::SELECTOR && tx.to == self.staking {
      let call = decode::<IStakeDapp::stakeCall>(&tx.data)?;
      if tx.gas_limit.is_some_and(|limit| limit < STAKE_GAS) {
        return Ok((TxStatus::Reverted, tx.gas_limit.unwrap_or_default()));
      }
      let balance = state.balances.get(&tx.from).copied().unwrap_or_default();
      let key = (tx.from, self.staking);
      let allowance = state.allowances.get(&key).copied().unwrap_or_default();
      if call.amount > balance || call.amount > allowance {
        return Ok((TxStatus::Reverted, STAKE_GAS));
      }
      state.balances.insert(tx.from, balance - call.amount);
      state.allowances.insert(key, allowance - call.amount);
      *state.staked.entry(tx.from).or_default() += call.amount;
      return Ok((TxStatus::Confirmed, STAKE_GAS));
    }

    Err(ProviderError::with_reason(
      ErrorCode::CallException,
      format!("no method 0x{} at {}", hex::encode(selector), tx.to),
    ))
  }
}

fn selector(data: &[u8]) -> Result<[u8; 4], ProviderError> {
  data
    .get(..4)
    .and_then(|s| s.try_into().ok())
    .ok_or_else(|| ProviderError::with_reason(ErrorCode::CallException, "missing selector"))
}

fn decode<C: SolCall>(data: &[u8]) -> Result<C, ProviderError> {
  C::abi_decode(data, true)
    .map_err(|e| ProviderError::with_reason(ErrorCode::CallException, e.to_string()))
}

#[async_trait]
impl WalletProvider for MockChain {
  async fn detect(&self) -> bool {
    !self.state().faults.missing
  }

  async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
    let state = self.state();
    if state.faults.deny_accounts {
      return Err(ProviderError::with_reason(
        ErrorCode::ActionRejected,
        "user rejected the request",
      ));
    }
    Ok(state.accounts.clone())
  }

  async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError> {
    if self.state().faults.reads {
      return Err(ProviderError::with_reason(
        ErrorCode::NetworkError,
        "could not detect network",
      ));
    }
    self.read(to, &data)
  }

  async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ProviderError> {
    let mut state = self.state();
    state.submitted.push(tx.clone());
    if state.faults.reject_signing {
      return Err(ProviderError::with_reason(
        ErrorCode::ActionRejected,
        "user denied transaction signature",
      ));
    }
    if state.faults.gas_estimation {
      return Err(ProviderError::with_reason(
        ErrorCode::UnpredictableGasLimit,
        "cannot estimate gas; transaction may fail or may require manual gas limit",
      ));
    }
    if !state.accounts.contains(&tx.from) {
      return Err(ProviderError::with_reason(
        ErrorCode::ActionRejected,
        "unknown account",
      ));
    }

    state.nonce += 1;
    let hash = keccak256(state.nonce.to_be_bytes());
    let (status, gas_used) = if state.faults.revert_next {
      state.faults.revert_next = false;
      (TxStatus::Reverted, 0)
    } else {
      self.execute(&mut state, &tx)?
    };
    tracing::debug!(%hash, ?status, gas_used, "mock chain executed transaction");
    state
      .pending
      .insert(hash, TransactionReceipt::new(hash, status, gas_used));
    Ok(hash)
  }

  async fn wait_for_receipt(&self, hash: TxHash) -> Result<TransactionReceipt, ProviderError> {
    self
      .state()
      .pending
      .remove(&hash)
      .ok_or_else(|| ProviderError::with_reason(ErrorCode::Unknown, format!("unknown transaction {hash}")))
  }
}
