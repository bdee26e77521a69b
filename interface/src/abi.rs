//! ABI surfaces of the token and staking contracts.
//!
//! A deployment either splits the two (the token is approved for a separate
//! staking contract) or combines them (the token contract accepts stakes
//! itself). Both expose the same `stake(uint256)` entry point, so the
//! coordinator only needs to know which address to send it to.

use alloy_sol_types::sol;

sol! {
  #[derive(Debug)]
  interface IStakingToken {
    function balanceOf(address owner) external view returns (uint256);
    function approve(address spender, uint256 amount) external returns (bool);
    function allowance(address owner, address spender) external view returns (uint256);
  }

  #[derive(Debug)]
  interface IStakeDapp {
    function stake(uint256 amount) external;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use alloy_primitives::{Address, U256};
  use alloy_sol_types::SolCall;

  #[test]
  fn selectors_match_erc20() {
    assert_eq!(IStakingToken::balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);
    assert_eq!(IStakingToken::approveCall::SELECTOR, [0x09, 0x5e, 0xa7, 0xb3]);
    assert_eq!(IStakingToken::allowanceCall::SELECTOR, [0xdd, 0x62, 0xed, 0x3e]);
    assert_eq!(IStakeDapp::stakeCall::SELECTOR, [0xa6, 0x94, 0xfc, 0x3a]);
  }

  #[test]
  fn approve_calldata_layout() {
    let spender = Address::repeat_byte(0x11);
    let call = IStakingToken::approveCall {
      spender,
      amount: U256::from(7u64),
    };
    let data = call.abi_encode();
    // selector plus two 32-byte words
    assert_eq!(data.len(), 4 + 64);
    assert_eq!(&data[16..36], spender.as_slice());
    assert_eq!(data[67], 7);
  }
}
