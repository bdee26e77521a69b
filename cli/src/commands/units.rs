use anyhow::{Context, Result};
use clap::Parser;
use stakeflow_core::{to_decimal_string, to_fixed_point, Amount};
use stakeflow_interface::U256;

#[derive(Parser)]
#[command(
  name = "units",
  about = "Convert between token amounts and base units."
)]
pub struct UnitsCmd {
  /// The amount to convert, e.g. `2.5`.
  amount: String,

  /// Read the amount as an integer count of base units and print tokens.
  #[arg(long, action)]
  from_base: bool,
}

impl UnitsCmd {
  pub fn run(&self) -> Result<()> {
    println!("{}", self.convert()?);
    Ok(())
  }

  fn convert(&self) -> Result<String> {
    let amount = self.amount.trim();
    if self.from_base {
      let units: U256 = amount
        .parse()
        .with_context(|| format!("`{amount}` is not a base unit count"))?;
      Ok(to_decimal_string(Amount::from(units)))
    } else {
      let amount = to_fixed_point(amount).with_context(|| format!("`{amount}` is not a token amount"))?;
      Ok(amount.base_units().to_string())
    }
  }
}
