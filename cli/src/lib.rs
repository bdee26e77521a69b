pub mod commands;
mod util;

pub const STAKEFLOW_VERSION_MESSAGE: &str = concat!("stakeflow ", env!("CARGO_PKG_VERSION"));
