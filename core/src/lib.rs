//! # Stakeflow Core
//!
//! Drives the connect, approve and stake flow against a [`WalletProvider`]:
//! fixed-point amount handling, the wallet session, balance and allowance
//! reads, the two mutating operations and the [`Coordinator`] that ties them
//! into a single state container.
//!
//! [`WalletProvider`]: stakeflow_interface::WalletProvider

pub mod amount;
pub mod contract;
pub mod coordinator;
pub mod error;
pub mod ops;
pub mod reader;
pub mod session;
pub mod utils;

pub use amount::{to_decimal_string, to_fixed_point, Amount, AmountError};
pub use coordinator::{Coordinator, Phase, Snapshot};
pub use error::{Error, ErrorClass, ReadTarget};
pub use session::Session;
pub use utils::{setup_logger, ContractLayout, CoordinatorOpts};
