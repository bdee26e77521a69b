use anyhow::Result;
use clap::{Parser, Subcommand};
use stakeflow_cli::{
  commands::{run::RunCmd, units::UnitsCmd},
  STAKEFLOW_VERSION_MESSAGE,
};

#[derive(Parser)]
#[command(name = "stakeflow", author, about, long_about = None, args_conflicts_with_subcommands = true, version = STAKEFLOW_VERSION_MESSAGE)]
pub struct StakeflowCli {
  #[clap(subcommand)]
  pub command: Option<StakeflowCliCommands>,

  #[clap(flatten)]
  pub run: RunCmd,
}

#[derive(Subcommand)]
pub enum StakeflowCliCommands {
  Run(RunCmd),
  Units(UnitsCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = StakeflowCli::parse();
  let command = args.command.unwrap_or(StakeflowCliCommands::Run(args.run));
  match command {
    StakeflowCliCommands::Run(cmd) => cmd.run().await,
    StakeflowCliCommands::Units(cmd) => cmd.run(),
  }
}
