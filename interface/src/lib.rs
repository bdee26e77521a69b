//! # Stakeflow Interface
//!
//! Core types and traits describing the wallet/contract layer the staking
//! coordinator drives: addresses and hashes, the token and staking ABI
//! surfaces, provider error codes and the [`WalletProvider`] trait.

use std::fmt;

use async_trait::async_trait;

pub mod abi;
mod mock;
mod transaction;

pub use alloy_primitives::{address, Address, Bytes, TxHash, U256};
pub use mock::MockChain;
pub use transaction::{TransactionReceipt, TransactionRequest, TxStatus};

/// Number of decimal places used by the staking token.
pub const TOKEN_DECIMALS: usize = 18;

/// Token contract used when nothing else is configured.
pub const DEFAULT_TOKEN_ADDRESS: Address = address!("2b135a08c50e8871c6a8932b74d8cd0325e44d9b");
/// Staking contract used by the split layout when nothing else is configured.
pub const DEFAULT_STAKING_ADDRESS: Address = address!("8755b5bffc86dfabb8b15148074d05c411aad1b6");

pub const ADDRESS_ALICE: Address = Address::repeat_byte(0xa1);
pub const ADDRESS_BOB: Address = Address::repeat_byte(0xb0);

/// Error codes reported by a wallet provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
  ActionRejected,
  CallException,
  UnpredictableGasLimit,
  BadData,
  NetworkError,
  ServerError,
  Unknown,
}

impl fmt::Display for ErrorCode {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      ErrorCode::ActionRejected => write!(f, "The user rejected the request."),
      ErrorCode::CallException => write!(f, "The contract call reverted."),
      ErrorCode::UnpredictableGasLimit => write!(f, "Gas could not be estimated for the transaction."),
      ErrorCode::BadData => write!(f, "The returned data could not be decoded."),
      ErrorCode::NetworkError => write!(f, "The network could not be reached."),
      ErrorCode::ServerError => write!(f, "The node answered with a server error."),
      ErrorCode::Unknown => write!(f, "Unknown provider error."),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
  pub code: ErrorCode,
  pub reason: Option<String>,
}

impl ProviderError {
  pub fn new(code: ErrorCode) -> Self {
    ProviderError { code, reason: None }
  }

  pub fn with_reason<R: Into<String>>(code: ErrorCode, reason: R) -> Self {
    ProviderError {
      code,
      reason: Some(reason.into()),
    }
  }

  /// The reason if the provider gave one, the code description otherwise.
  pub fn reason_or_code(&self) -> String {
    self
      .reason
      .clone()
      .unwrap_or_else(|| self.code.to_string())
  }
}

impl fmt::Display for ProviderError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match &self.reason {
      Some(reason) => write!(f, "{} ({})", self.code, reason),
      None => write!(f, "{}", self.code),
    }
  }
}

impl std::error::Error for ProviderError {}

/// The wallet provider boundary: detection, account authorization,
/// read-only calls and transaction submission.
#[mockall::automock]
#[async_trait]
pub trait WalletProvider: Send + Sync {
  /// Whether a compatible wallet is installed.
  async fn detect(&self) -> bool;

  /// Asks the user to authorize access to their accounts.
  async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

  /// Executes a read-only call without submitting a transaction.
  async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError>;

  /// Signs and broadcasts a transaction, returning its hash.
  async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ProviderError>;

  /// Blocks until the transaction is final.
  async fn wait_for_receipt(&self, hash: TxHash) -> Result<TransactionReceipt, ProviderError>;
}
