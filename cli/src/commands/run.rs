use std::io::{IsTerminal, Write};
use std::ops::ControlFlow;
use std::str::FromStr;
use std::sync::Arc;
use std::fmt;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use stakeflow_core::utils::{
  setup_logger_with_default, with_stake_gas_limit, DEFAULT_STAKE_GAS_LIMIT,
};
use stakeflow_core::{
  to_fixed_point, ContractLayout, Coordinator, CoordinatorOpts, Error, ErrorClass, Snapshot,
};
use stakeflow_interface::{
  Address, MockChain, TransactionReceipt, ADDRESS_ALICE, DEFAULT_STAKING_ADDRESS,
  DEFAULT_TOKEN_ADDRESS,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use yansi::Paint;

use crate::util::{write_status, CYAN, GREEN, RED, YELLOW};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Layout {
  /// A separate staking contract pulls approved tokens.
  Split,
  /// The token contract accepts stakes itself.
  Combined,
}

#[derive(Parser)]
#[command(
  name = "run",
  about = "(default) Open the staking form against a simulated wallet"
)]
pub struct RunCmd {
  /// Which contract receives stakes.
  #[arg(long, value_enum, env = "STAKEFLOW_LAYOUT", default_value_t = Layout::Split)]
  layout: Layout,

  /// Token contract address.
  #[arg(long, env = "STAKEFLOW_TOKEN", default_value_t = DEFAULT_TOKEN_ADDRESS)]
  token: Address,

  /// Staking contract address, ignored by the combined layout.
  #[arg(long, env = "STAKEFLOW_STAKING", default_value_t = DEFAULT_STAKING_ADDRESS)]
  staking: Address,

  /// Gas ceiling sent with every stake.
  #[arg(long, env = "STAKEFLOW_GAS_LIMIT", default_value_t = DEFAULT_STAKE_GAS_LIMIT)]
  gas_limit: u64,

  /// Token balance the simulated account starts with.
  #[arg(long, env = "STAKEFLOW_BALANCE", default_value = "100")]
  balance: String,

  /// Account the simulated wallet authorizes.
  #[arg(long, env = "STAKEFLOW_ACCOUNT", default_value_t = ADDRESS_ALICE)]
  account: Address,

  /// Start without a wallet installed.
  #[arg(long, env = "STAKEFLOW_NO_WALLET", action)]
  no_wallet: bool,

  /// Log at `info` instead of `warn` when `RUST_LOG` is unset.
  #[arg(long, action)]
  verbose: bool,
}

impl RunCmd {
  pub async fn run(&self) -> Result<()> {
    setup_logger_with_default(self.log_directives());

    let form = self.form()?;
    let prompt = std::io::stdin().is_terminal();
    if prompt {
      println!("{}", "Type `help` for the list of commands.".dim());
    }
    form.drive(BufReader::new(tokio::io::stdin()), prompt).await
  }

  fn log_directives(&self) -> &'static str {
    if self.verbose {
      "info"
    } else {
      "warn"
    }
  }

  fn layout(&self) -> ContractLayout {
    match self.layout {
      Layout::Split => ContractLayout::Split {
        token: self.token,
        staking: self.staking,
      },
      Layout::Combined => ContractLayout::Combined { token: self.token },
    }
  }

  fn form(&self) -> Result<Form> {
    let balance = to_fixed_point(self.balance.trim())
      .with_context(|| format!("invalid starting balance `{}`", self.balance))?;
    let layout = self.layout();
    let chain = Arc::new(
      MockChain::new(layout.token(), layout.stake_target())
        .with_account(self.account, balance.base_units()),
    );
    chain.set_missing(self.no_wallet);

    let opts = CoordinatorOpts::new(layout).with_options([with_stake_gas_limit(self.gas_limit)]);
    tracing::debug!(?opts, %balance, account = %self.account, "simulated wallet ready");
    Ok(Form::new(chain, opts))
  }
}

/// A failure the simulated wallet can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
  NoWallet,
  Deny,
  Reject,
  Gas,
  Revert,
  Reads,
}

impl FromStr for Fault {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "no-wallet" => Ok(Fault::NoWallet),
      "deny" => Ok(Fault::Deny),
      "reject" => Ok(Fault::Reject),
      "gas" => Ok(Fault::Gas),
      "revert" => Ok(Fault::Revert),
      "reads" => Ok(Fault::Reads),
      _ => Err(format!(
        "unknown fault `{s}`, expected one of: no-wallet, deny, reject, gas, revert, reads"
      )),
    }
  }
}

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FormAction {
  Connect,
  Disconnect,
  Refresh,
  Status,
  Amount(String),
  Approve(Option<String>),
  Stake(Option<String>),
  Simulate(Fault),
  Heal,
  Help,
  Quit,
}

impl FromStr for FormAction {
  type Err = String;

  fn from_str(line: &str) -> Result<Self, Self::Err> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
      Some((command, rest)) => (command, Some(rest.trim().to_string())),
      None => (line, None),
    };
    let action = match command {
      "connect" => FormAction::Connect,
      "disconnect" => FormAction::Disconnect,
      "refresh" => FormAction::Refresh,
      "status" => FormAction::Status,
      // the field keeps whatever was typed, validation happens on submit
      "amount" => FormAction::Amount(rest.unwrap_or_default()),
      "approve" => FormAction::Approve(rest),
      "stake" => FormAction::Stake(rest),
      "simulate" => FormAction::Simulate(
        rest
          .ok_or_else(|| "simulate needs a fault name".to_string())?
          .parse()?,
      ),
      "heal" => FormAction::Heal,
      "help" | "?" => FormAction::Help,
      "quit" | "exit" => FormAction::Quit,
      other => return Err(format!("unknown command `{other}`, type `help`")),
    };
    Ok(action)
  }
}

const HELP: &[(&str, &str)] = &[
  ("connect", "connect the wallet, or re-read its active account"),
  ("amount <decimal>", "set the amount field"),
  ("approve [decimal]", "approve the staking contract for the amount"),
  ("stake [decimal]", "stake the amount"),
  ("refresh", "re-read balance and allowance"),
  ("status", "show account, balance and allowance"),
  ("disconnect", "forget the connected account"),
  ("simulate <fault>", "no-wallet, deny, reject, gas, revert or reads"),
  ("heal", "clear simulated faults"),
  ("quit", "leave"),
];

/// The staking form: one amount field, two buttons and a read-only summary.
struct Form {
  chain: Arc<MockChain>,
  coordinator: Coordinator<MockChain>,
}

impl Form {
  fn new(chain: Arc<MockChain>, opts: CoordinatorOpts) -> Self {
    let coordinator = Coordinator::new(chain.clone(), opts);
    Form { chain, coordinator }
  }

  async fn drive<R>(&self, input: R, prompt: bool) -> Result<()>
  where
    R: AsyncBufRead + Unpin,
  {
    let mut lines = input.lines();
    loop {
      if prompt {
        print!("{} ", ">".bold());
        std::io::stdout().flush()?;
      }
      let Some(line) = lines.next_line().await.context("failed to read input")? else {
        return Ok(());
      };
      if line.trim().is_empty() {
        continue;
      }
      let action = match line.parse::<FormAction>() {
        Ok(action) => action,
        Err(message) => {
          write_status(&YELLOW, "Usage", &message);
          continue;
        }
      };
      tracing::debug!(?action, "form action");
      if self.apply(action).await.is_break() {
        return Ok(());
      }
    }
  }

  async fn apply(&self, action: FormAction) -> ControlFlow<()> {
    match action {
      FormAction::Connect => {
        if let Ok(account) = self.coordinator.connect().await {
          write_status(&GREEN, "Connected", &account.to_string());
        }
      }
      FormAction::Disconnect => {
        self.coordinator.disconnect().await;
        write_status(&GREEN, "Disconnected", "");
      }
      FormAction::Refresh => {
        let _ = self.coordinator.refresh().await;
      }
      FormAction::Status => {}
      FormAction::Amount(amount) => self.coordinator.set_input(amount),
      FormAction::Approve(amount) => {
        if let Some(amount) = amount {
          self.coordinator.set_input(amount);
        }
        if let Ok(receipt) = self.coordinator.approve_input().await {
          confirmed("approval", &receipt);
        }
      }
      FormAction::Stake(amount) => {
        if let Some(amount) = amount {
          self.coordinator.set_input(amount);
        }
        if let Ok(receipt) = self.coordinator.stake_input().await {
          confirmed("stake", &receipt);
        }
      }
      FormAction::Simulate(fault) => {
        self.simulate(fault);
        write_status(&CYAN, "Simulating", &format!("{fault:?}"));
      }
      FormAction::Heal => self.chain.heal(),
      FormAction::Help => {
        for (command, description) in HELP {
          println!("  {} {description}", format!("{command:<20}").bold());
        }
        return ControlFlow::Continue(());
      }
      FormAction::Quit => return ControlFlow::Break(()),
    }
    print_status(&self.coordinator.snapshot());
    ControlFlow::Continue(())
  }

  fn simulate(&self, fault: Fault) {
    match fault {
      Fault::NoWallet => self.chain.set_missing(true),
      Fault::Deny => self.chain.set_deny_accounts(true),
      Fault::Reject => self.chain.set_reject_signing(true),
      Fault::Gas => self.chain.set_gas_estimation_failure(true),
      Fault::Revert => self.chain.set_revert_next(true),
      Fault::Reads => self.chain.set_read_failure(true),
    }
  }
}

fn confirmed(what: &str, receipt: &TransactionReceipt) {
  write_status(
    &GREEN,
    "Confirmed",
    &format!("{what} {} ({} gas)", receipt.hash, receipt.gas_used),
  );
}

struct Account(Option<Address>);

impl fmt::Display for Account {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self.0 {
      Some(account) => write!(f, "{account}"),
      None => write!(f, "not connected"),
    }
  }
}

fn print_status(snapshot: &Snapshot) {
  write_status(&CYAN, "Account", &Account(snapshot.account).to_string());
  write_status(&CYAN, "Balance", &snapshot.balance.to_string());
  write_status(&CYAN, "Allowance", &snapshot.allowance.to_string());
  if !snapshot.input.is_empty() {
    write_status(&CYAN, "Amount", &snapshot.input);
  }
  if let Some(err) = &snapshot.last_error {
    print_error(err);
  }
}

fn print_error(err: &Error) {
  let style = match err.class() {
    ErrorClass::UserCorrectable => YELLOW,
    ErrorClass::Unexpected => RED,
  };
  write_status(&style, "Error", &err.to_string());
}
