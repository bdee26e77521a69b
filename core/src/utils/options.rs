use stakeflow_interface::{Address, DEFAULT_STAKING_ADDRESS, DEFAULT_TOKEN_ADDRESS};

/// Gas ceiling sent with every stake. Estimation against the staking
/// contract under-reports, so a fixed bound is used instead.
pub const DEFAULT_STAKE_GAS_LIMIT: u64 = 300_000;

/// Where `stake` lives relative to the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractLayout {
  /// The token contract accepts stakes and is its own spender.
  Combined { token: Address },
  /// A separate staking contract is approved to pull tokens.
  Split { token: Address, staking: Address },
}

impl ContractLayout {
  pub fn token(&self) -> Address {
    match self {
      ContractLayout::Combined { token } | ContractLayout::Split { token, .. } => *token,
    }
  }

  /// The contract that receives `stake` and therefore needs the allowance.
  pub fn stake_target(&self) -> Address {
    match self {
      ContractLayout::Combined { token } => *token,
      ContractLayout::Split { staking, .. } => *staking,
    }
  }
}

impl Default for ContractLayout {
  fn default() -> Self {
    ContractLayout::Split {
      token: DEFAULT_TOKEN_ADDRESS,
      staking: DEFAULT_STAKING_ADDRESS,
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorOpts {
  layout: ContractLayout,
  stake_gas_limit: u64,
}

impl CoordinatorOpts {
  pub fn new(layout: ContractLayout) -> Self {
    Self {
      layout,
      ..Self::default()
    }
  }

  // Method to apply options
  pub fn with_options(mut self, opts: impl IntoIterator<Item = impl FnOnce(&mut Self)>) -> Self {
    for opt in opts {
      opt(&mut self);
    }
    self
  }

  pub fn layout(&self) -> &ContractLayout {
    &self.layout
  }

  pub fn stake_gas_limit(&self) -> u64 {
    self.stake_gas_limit
  }
}

impl Default for CoordinatorOpts {
  fn default() -> Self {
    Self {
      layout: ContractLayout::default(),
      stake_gas_limit: DEFAULT_STAKE_GAS_LIMIT,
    }
  }
}

// Functional option for the stake gas ceiling
pub fn with_stake_gas_limit(value: u64) -> impl FnOnce(&mut CoordinatorOpts) {
  move |opts: &mut CoordinatorOpts| {
    opts.stake_gas_limit = value;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn combined_layout_stakes_on_token() {
    let token = Address::repeat_byte(7);
    let layout = ContractLayout::Combined { token };
    assert_eq!(layout.token(), token);
    assert_eq!(layout.stake_target(), token);
  }

  #[test]
  fn split_layout_stakes_on_staking_contract() {
    let layout = ContractLayout::default();
    assert_eq!(layout.token(), DEFAULT_TOKEN_ADDRESS);
    assert_eq!(layout.stake_target(), DEFAULT_STAKING_ADDRESS);
  }

  #[test]
  fn options_apply() {
    let opts = CoordinatorOpts::default();
    assert_eq!(opts.stake_gas_limit(), DEFAULT_STAKE_GAS_LIMIT);

    let opts = CoordinatorOpts::new(ContractLayout::default()).with_options([with_stake_gas_limit(500_000)]);
    assert_eq!(opts.stake_gas_limit(), 500_000);
  }
}
