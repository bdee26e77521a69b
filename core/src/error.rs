use stakeflow_interface::{ErrorCode, ProviderError};
use thiserror::Error;

use crate::amount::{Amount, AmountError};

/// Which cached value a failed read was refreshing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTarget {
  Balance,
  Allowance,
}

impl std::fmt::Display for ReadTarget {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      ReadTarget::Balance => write!(f, "balance"),
      ReadTarget::Allowance => write!(f, "allowance"),
    }
  }
}

/// How the caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  /// The user can fix the input, the wallet or the approval and retry.
  UserCorrectable,
  /// Something outside the user's control went wrong.
  Unexpected,
}

/// Every way a coordinator operation can fail.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
  #[error("no compatible wallet detected, install a wallet extension")]
  ProviderUnavailable,
  #[error("wallet authorization denied: {0}")]
  AuthorizationDenied(String),
  #[error("connect a wallet first")]
  NotConnected,
  #[error("enter an amount")]
  EmptyAmount,
  #[error("malformed amount: {0}")]
  MalformedAmount(#[from] AmountError),
  #[error("insufficient balance: requested {requested}, available {available}")]
  InsufficientBalance { requested: Amount, available: Amount },
  #[error("insufficient allowance: requested {requested}, approved {approved}; approve at least {shortfall} more first")]
  InsufficientAllowance {
    requested: Amount,
    approved: Amount,
    shortfall: Amount,
  },
  #[error("gas estimation failed: {0}")]
  GasEstimationFailure(String),
  #[error("transaction rejected in the wallet")]
  TransactionRejected,
  #[error("transaction reverted: {0}")]
  TransactionReverted(String),
  #[error("failed to read {target}: {reason}")]
  ReadFailure { target: ReadTarget, reason: String },
  #[error("unexpected error: {0}")]
  UnexpectedError(String),
}

impl Error {
  pub fn class(&self) -> ErrorClass {
    match self {
      Error::ReadFailure { .. } | Error::UnexpectedError(_) => ErrorClass::Unexpected,
      _ => ErrorClass::UserCorrectable,
    }
  }

  pub fn is_user_correctable(&self) -> bool {
    self.class() == ErrorClass::UserCorrectable
  }

  /// Whether the error was raised before anything was sent to the wallet.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Error::NotConnected
        | Error::EmptyAmount
        | Error::MalformedAmount(_)
        | Error::InsufficientBalance { .. }
        | Error::InsufficientAllowance { .. }
    )
  }

  pub(crate) fn read(target: ReadTarget, err: ProviderError) -> Self {
    Error::ReadFailure {
      target,
      reason: err.reason_or_code(),
    }
  }

  /// Maps a failure reported while submitting or confirming a transaction.
  pub(crate) fn submission(err: ProviderError) -> Self {
    match err.code {
      ErrorCode::ActionRejected => Error::TransactionRejected,
      ErrorCode::UnpredictableGasLimit => Error::GasEstimationFailure(
        err
          .reason
          .unwrap_or_else(|| "try increasing the gas limit or check contract logic".to_string()),
      ),
      ErrorCode::CallException => Error::TransactionReverted(err.reason_or_code()),
      _ => Error::UnexpectedError(err.to_string()),
    }
  }
}
