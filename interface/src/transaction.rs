use alloy_primitives::{Address, Bytes, TxHash};

/// A transaction the wallet is asked to sign and broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
  pub from: Address,
  pub to: Address,
  pub data: Bytes,
  /// Explicit gas ceiling. `None` lets the wallet estimate.
  pub gas_limit: Option<u64>,
}

impl TransactionRequest {
  pub fn new<D>(from: Address, to: Address, data: D) -> Self
  where
    D: Into<Bytes>,
  {
    Self {
      from,
      to,
      data: data.into(),
      gas_limit: None,
    }
  }

  pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
    self.gas_limit = Some(gas_limit);
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
  Confirmed,
  Reverted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
  pub hash: TxHash,
  pub status: TxStatus,
  pub gas_used: u64,
}

impl TransactionReceipt {
  pub fn new(hash: TxHash, status: TxStatus, gas_used: u64) -> Self {
    TransactionReceipt {
      hash,
      status,
      gas_used,
    }
  }

  pub fn is_confirmed(&self) -> bool {
    self.status == TxStatus::Confirmed
  }
}
