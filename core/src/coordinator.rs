use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stakeflow_interface::{Address, TransactionReceipt, WalletProvider};
use tokio::sync::{watch, Mutex as AsyncMutex};

use crate::amount::Amount;
use crate::error::{Error, ErrorClass};
use crate::ops::{ApprovalRequest, StakeRequest};
use crate::reader;
use crate::session::Session;
use crate::utils::CoordinatorOpts;

/// Where the coordinator is in the connect/approve/stake flow.
///
/// `Connecting`, `Approving` and `Staking` only last while the matching
/// operation is in flight. A failed operation returns to the phase it started
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Disconnected,
  Connecting,
  Connected,
  Approving,
  Staking,
}

/// A copy of everything a form needs to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
  pub phase: Phase,
  pub account: Option<Address>,
  pub balance: Amount,
  pub allowance: Amount,
  pub input: String,
  pub last_error: Option<Error>,
}

struct State<P> {
  session: Option<Session<P>>,
  phase: Phase,
  balance: Amount,
  allowance: Amount,
  input: String,
  last_error: Option<Error>,
}

impl<P: WalletProvider> State<P> {
  fn record(&mut self, err: &Error) {
    match err.class() {
      ErrorClass::UserCorrectable => tracing::warn!(%err, "operation failed"),
      ErrorClass::Unexpected => tracing::error!(?err, "operation failed"),
    }
    self.last_error = Some(err.clone());
  }

  fn clear(&mut self) {
    self.balance = Amount::ZERO;
    self.allowance = Amount::ZERO;
  }

  fn snapshot(&self) -> Snapshot {
    Snapshot {
      phase: self.phase,
      account: self.session.as_ref().map(Session::account),
      balance: self.balance,
      allowance: self.allowance,
      input: self.input.clone(),
      last_error: self.last_error.clone(),
    }
  }
}

#[derive(Debug, Clone, Copy)]
enum Refresh {
  Allowance,
  Both,
}

/// Single source of truth for the connected account, its balance and
/// allowance, the pending input and the last error.
///
/// Mutating operations are serialized: a call made while another is in
/// flight waits for it, then validates against the state it left behind.
/// Cached state is behind a plain mutex that is never held across an await,
/// so [`Coordinator::snapshot`] stays responsive while an operation is
/// pending. Every refresh and disconnect is also pushed to
/// [`Coordinator::subscribe`] receivers.
pub struct Coordinator<P> {
  provider: Arc<P>,
  opts: CoordinatorOpts,
  state: Mutex<State<P>>,
  lane: AsyncMutex<()>,
  updates: watch::Sender<Snapshot>,
}

impl<P> Coordinator<P>
where
  P: WalletProvider,
{
  pub fn new(provider: Arc<P>, opts: CoordinatorOpts) -> Self {
    let state = State {
      session: None,
      phase: Phase::Disconnected,
      balance: Amount::ZERO,
      allowance: Amount::ZERO,
      input: String::new(),
      last_error: None,
    };
    let (updates, _) = watch::channel(state.snapshot());
    Coordinator {
      provider,
      opts,
      state: Mutex::new(state),
      lane: AsyncMutex::new(()),
      updates,
    }
  }

  pub fn opts(&self) -> &CoordinatorOpts {
    &self.opts
  }

  fn state(&self) -> MutexGuard<'_, State<P>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn snapshot(&self) -> Snapshot {
    self.state().snapshot()
  }

  /// A receiver that is handed a fresh snapshot each time balance and
  /// allowance are re-read or the session is dropped.
  pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
    self.updates.subscribe()
  }

  fn publish(&self, snapshot: Snapshot) {
    tracing::debug!(balance = %snapshot.balance, allowance = %snapshot.allowance, "state published");
    self.updates.send_replace(snapshot);
  }

  pub fn phase(&self) -> Phase {
    self.state().phase
  }

  pub fn account(&self) -> Option<Address> {
    self.state().session.as_ref().map(Session::account)
  }

  pub fn balance(&self) -> Amount {
    self.state().balance
  }

  pub fn allowance(&self) -> Amount {
    self.state().allowance
  }

  pub fn last_error(&self) -> Option<Error> {
    self.state().last_error.clone()
  }

  pub fn input(&self) -> String {
    self.state().input.clone()
  }

  /// Replaces the pending input. It is only validated when an operation runs.
  pub fn set_input<S: Into<String>>(&self, input: S) {
    self.state().input = input.into();
  }

  /// Whether an operation is in flight. A form can use this to disable its
  /// controls.
  pub fn is_busy(&self) -> bool {
    self.lane.try_lock().is_err()
  }

  fn session(&self) -> Option<Session<P>> {
    self.state().session.clone()
  }

  fn enter(&self, phase: Phase) -> Phase {
    std::mem::replace(&mut self.state().phase, phase)
  }

  fn fail(&self, resume: Phase, err: Error) -> Error {
    let mut state = self.state();
    state.phase = resume;
    state.record(&err);
    err
  }

  fn record(&self, err: Error) -> Error {
    self.state().record(&err);
    err
  }

  /// Connects the wallet and reads balance and allowance for the account it
  /// reports. Connecting again re-runs the handshake and follows the wallet
  /// if it now reports a different account; a failed reconnect keeps the
  /// existing session.
  #[tracing::instrument(skip(self))]
  pub async fn connect(&self) -> Result<Address, Error> {
    let _lane = self.lane.lock().await;
    let resume = self.enter(Phase::Connecting);
    let session = match Session::establish(self.provider.clone()).await {
      Ok(session) => session,
      Err(err) => return Err(self.fail(resume, err)),
    };

    let account = session.account();
    {
      let mut state = self.state();
      let previous = state.session.as_ref().map(Session::account);
      if previous != Some(account) {
        if let Some(previous) = previous {
          tracing::info!(%previous, %account, "wallet switched account");
        }
        state.clear();
      }
      state.session = Some(session.clone());
      state.phase = Phase::Connected;
      state.last_error = None;
    }
    tracing::info!(%account, "wallet connected");

    // a failed read is recorded but does not undo the connection
    let _ = self.refresh_with(&session, Refresh::Both).await;
    Ok(account)
  }

  /// Forgets the session and everything read through it.
  #[tracing::instrument(skip(self))]
  pub async fn disconnect(&self) {
    let _lane = self.lane.lock().await;
    let snapshot = {
      let mut state = self.state();
      if let Some(session) = state.session.take() {
        tracing::info!(account = %session.account(), "wallet disconnected");
      }
      state.clear();
      state.phase = Phase::Disconnected;
      state.last_error = None;
      state.snapshot()
    };
    self.publish(snapshot);
  }

  /// Re-reads balance and allowance. Success clears the last error.
  #[tracing::instrument(skip(self))]
  pub async fn refresh(&self) -> Result<(), Error> {
    let _lane = self.lane.lock().await;
    let Some(session) = self.session() else {
      return Err(self.record(Error::NotConnected));
    };
    self.refresh_with(&session, Refresh::Both).await
  }

  /// Approves the stake target for `requested` tokens, replacing any previous
  /// allowance, then re-reads the allowance.
  #[tracing::instrument(skip(self))]
  pub async fn approve(&self, requested: &str) -> Result<TransactionReceipt, Error> {
    let _lane = self.lane.lock().await;
    let request = match ApprovalRequest::validate(self.session(), requested) {
      Ok(request) => request,
      Err(err) => return Err(self.record(err)),
    };

    self.enter(Phase::Approving);
    let receipt = match request.submit(self.opts.layout()).await {
      Ok(receipt) => receipt,
      Err(err) => return Err(self.fail(Phase::Connected, err)),
    };
    self.settle();
    tracing::info!(hash = %receipt.hash, amount = %request.amount(), "approval confirmed");

    let _ = self.refresh_with(request.session(), Refresh::Allowance).await;
    Ok(receipt)
  }

  /// Stakes `requested` tokens after checking them against the last read
  /// balance and allowance, then re-reads both.
  #[tracing::instrument(skip(self))]
  pub async fn stake(&self, requested: &str) -> Result<TransactionReceipt, Error> {
    let _lane = self.lane.lock().await;
    let (session, balance, allowance) = {
      let state = self.state();
      (state.session.clone(), state.balance, state.allowance)
    };
    let request = match StakeRequest::validate(session, requested, balance, allowance) {
      Ok(request) => request,
      Err(err) => return Err(self.record(err)),
    };

    self.enter(Phase::Staking);
    let receipt = match request.submit(&self.opts).await {
      Ok(receipt) => receipt,
      Err(err) => return Err(self.fail(Phase::Connected, err)),
    };
    self.settle();
    tracing::info!(hash = %receipt.hash, amount = %request.amount(), "stake confirmed");

    // the contract spends allowance as it stakes; read it back rather than
    // subtracting locally
    let _ = self.refresh_with(request.session(), Refresh::Both).await;
    Ok(receipt)
  }

  /// [`Coordinator::approve`] with the pending input.
  pub async fn approve_input(&self) -> Result<TransactionReceipt, Error> {
    let input = self.input();
    self.approve(&input).await
  }

  /// [`Coordinator::stake`] with the pending input.
  pub async fn stake_input(&self) -> Result<TransactionReceipt, Error> {
    let input = self.input();
    self.stake(&input).await
  }

  fn settle(&self) {
    let mut state = self.state();
    state.phase = Phase::Connected;
    state.last_error = None;
  }

  async fn refresh_with(&self, session: &Session<P>, which: Refresh) -> Result<(), Error> {
    let layout = self.opts.layout();
    let (balance, allowance) = match which {
      Refresh::Allowance => (None, Some(reader::refresh_allowance(session, layout).await)),
      Refresh::Both => {
        let (balance, allowance) = reader::refresh_all(session, layout).await;
        (Some(balance), Some(allowance))
      }
    };

    let mut state = self.state();
    let mut failure = None;
    match balance {
      Some(Ok(balance)) => state.balance = balance,
      Some(Err(err)) => failure = Some(err),
      None => {}
    }
    match allowance {
      Some(Ok(allowance)) => state.allowance = allowance,
      Some(Err(err)) => {
        failure.get_or_insert(err);
      }
      None => {}
    }
    let result = match failure {
      Some(err) => {
        state.record(&err);
        Err(err)
      }
      None => {
        state.last_error = None;
        Ok(())
      }
    };
    let snapshot = state.snapshot();
    drop(state);
    self.publish(snapshot);
    result
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::utils::setup_test_logger;
  use async_trait::async_trait;
  use stakeflow_interface::{
    Bytes, ErrorCode, MockChain, MockWalletProvider, ProviderError, TransactionRequest, TxHash,
    ADDRESS_ALICE, ADDRESS_BOB, DEFAULT_STAKING_ADDRESS, DEFAULT_TOKEN_ADDRESS,
  };

  fn tokens(n: u64) -> Amount {
    Amount::from_tokens(n)
  }

  fn chain(balance: u64) -> Arc<MockChain> {
    Arc::new(
      MockChain::new(DEFAULT_TOKEN_ADDRESS, DEFAULT_STAKING_ADDRESS)
        .with_account(ADDRESS_ALICE, tokens(balance).base_units()),
    )
  }

  // Yields to the scheduler before every receipt so concurrent callers
  // interleave.
  struct SlowChain(Arc<MockChain>);

  #[async_trait]
  impl WalletProvider for SlowChain {
    async fn detect(&self) -> bool {
      self.0.detect().await
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
      self.0.request_accounts().await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError> {
      self.0.call(to, data).await
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ProviderError> {
      self.0.send_transaction(tx).await
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TransactionReceipt, ProviderError> {
      tokio::task::yield_now().await;
      self.0.wait_for_receipt(hash).await
    }
  }

  #[tokio::test]
  async fn phases_follow_the_flow() {
    setup_test_logger();
    let coordinator = Coordinator::new(chain(10), CoordinatorOpts::default());
    assert_eq!(coordinator.phase(), Phase::Disconnected);

    coordinator.connect().await.unwrap();
    assert_eq!(coordinator.phase(), Phase::Connected);

    coordinator.approve("4").await.unwrap();
    assert_eq!(coordinator.phase(), Phase::Connected);

    coordinator.stake("9").await.unwrap_err();
    assert_eq!(coordinator.phase(), Phase::Connected);

    coordinator.disconnect().await;
    assert_eq!(coordinator.phase(), Phase::Disconnected);
    assert_eq!(coordinator.account(), None);
    assert_eq!(coordinator.balance(), Amount::ZERO);
  }

  #[tokio::test]
  async fn failed_reconnect_keeps_session() {
    let chain = chain(10);
    let coordinator = Coordinator::new(chain.clone(), CoordinatorOpts::default());
    coordinator.connect().await.unwrap();

    chain.set_deny_accounts(true);
    let err = coordinator.connect().await.unwrap_err();
    assert!(matches!(err, Error::AuthorizationDenied(_)));
    assert_eq!(coordinator.phase(), Phase::Connected);
    assert_eq!(coordinator.account(), Some(ADDRESS_ALICE));
    assert_eq!(coordinator.balance(), tokens(10));
  }

  #[tokio::test]
  async fn reconnect_follows_account_switch() {
    let chain = chain(10);
    chain.set_balance(&ADDRESS_BOB, tokens(2).base_units());
    let coordinator = Coordinator::new(chain.clone(), CoordinatorOpts::default());
    coordinator.connect().await.unwrap();
    assert_eq!(coordinator.balance(), tokens(10));

    chain.set_accounts(vec![ADDRESS_BOB, ADDRESS_ALICE]);
    assert_eq!(coordinator.connect().await.unwrap(), ADDRESS_BOB);
    assert_eq!(coordinator.balance(), tokens(2));
  }

  #[tokio::test]
  async fn input_is_kept_verbatim_until_used() {
    let coordinator = Coordinator::new(chain(10), CoordinatorOpts::default());
    coordinator.set_input("abc");
    assert_eq!(coordinator.input(), "abc");
    // no session yet, so the input is never looked at
    assert_eq!(coordinator.stake_input().await.unwrap_err(), Error::NotConnected);

    coordinator.connect().await.unwrap();
    assert!(matches!(
      coordinator.approve_input().await.unwrap_err(),
      Error::MalformedAmount(_)
    ));
    coordinator.set_input("2");
    coordinator.approve_input().await.unwrap();
    assert_eq!(coordinator.allowance(), tokens(2));
    assert_eq!(coordinator.last_error(), None);
  }

  #[tokio::test]
  async fn new_error_overwrites_old() {
    let coordinator = Coordinator::new(chain(10), CoordinatorOpts::default());
    coordinator.approve("1").await.unwrap_err();
    assert_eq!(coordinator.last_error(), Some(Error::NotConnected));

    coordinator.connect().await.unwrap();
    assert_eq!(coordinator.last_error(), None);
    coordinator.stake("").await.unwrap_err();
    assert_eq!(coordinator.last_error(), Some(Error::EmptyAmount));
  }

  #[tokio::test]
  async fn operations_are_serialized() {
    let chain = chain(10);
    let coordinator = Coordinator::new(Arc::new(SlowChain(chain.clone())), CoordinatorOpts::default());
    coordinator.connect().await.unwrap();

    // the stake would fail on a zero allowance if it validated before the
    // approval's refresh landed
    let (approved, staked) = tokio::join!(coordinator.approve("5"), coordinator.stake("5"));
    approved.unwrap();
    staked.unwrap();
    assert_eq!(chain.staked(&ADDRESS_ALICE), tokens(5).base_units());
    assert_eq!(coordinator.balance(), tokens(5));
    assert_eq!(coordinator.allowance(), Amount::ZERO);
  }

  #[tokio::test]
  async fn subscribers_see_refreshed_balance() {
    let coordinator = Coordinator::new(chain(10), CoordinatorOpts::default());
    let mut updates = coordinator.subscribe();
    assert_eq!(updates.borrow_and_update().balance, Amount::ZERO);

    coordinator.connect().await.unwrap();
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().balance, tokens(10));

    coordinator.approve("4").await.unwrap();
    coordinator.stake("4").await.unwrap();
    let seen = updates.borrow_and_update().clone();
    assert_eq!(seen.balance, tokens(6));
    assert_eq!(seen.allowance, Amount::ZERO);
    assert_eq!(seen.phase, Phase::Connected);

    coordinator.disconnect().await;
    let seen = updates.borrow_and_update().clone();
    assert_eq!(seen.account, None);
    assert_eq!(seen.balance, Amount::ZERO);
  }

  #[tokio::test]
  async fn refresh_clears_read_failure() {
    let chain = chain(10);
    let coordinator = Coordinator::new(chain.clone(), CoordinatorOpts::default());
    coordinator.connect().await.unwrap();

    chain.set_read_failure(true);
    coordinator.refresh().await.unwrap_err();
    assert!(matches!(
      coordinator.last_error(),
      Some(Error::ReadFailure { .. })
    ));

    chain.heal();
    coordinator.refresh().await.unwrap();
    assert_eq!(coordinator.last_error(), None);
    assert_eq!(coordinator.balance(), tokens(10));
  }

  #[tokio::test]
  async fn busy_while_in_flight() {
    let chain = chain(10);
    let coordinator = Coordinator::new(Arc::new(SlowChain(chain)), CoordinatorOpts::default());
    coordinator.connect().await.unwrap();
    assert!(!coordinator.is_busy());

    let (approved, busy) = tokio::join!(coordinator.approve("1"), async {
      (coordinator.is_busy(), coordinator.phase())
    });
    approved.unwrap();
    assert_eq!(busy, (true, Phase::Approving));
    assert!(!coordinator.is_busy());
  }

  #[tokio::test]
  async fn unexpected_provider_error_is_recorded() {
    let mut provider = MockWalletProvider::new();
    provider.expect_detect().returning(|| true);
    provider
      .expect_request_accounts()
      .returning(|| Ok(vec![ADDRESS_ALICE]));
    provider
      .expect_call()
      .returning(|_, _| Err(ProviderError::new(ErrorCode::ServerError)));
    provider
      .expect_send_transaction()
      .returning(|_| Err(ProviderError::with_reason(ErrorCode::ServerError, "internal error")));

    let coordinator = Coordinator::new(Arc::new(provider), CoordinatorOpts::default());
    coordinator.connect().await.unwrap();
    assert!(matches!(
      coordinator.last_error(),
      Some(Error::ReadFailure { .. })
    ));

    let err = coordinator.approve("1").await.unwrap_err();
    assert!(matches!(err, Error::UnexpectedError(_)));
    assert_eq!(err.class(), ErrorClass::Unexpected);
    assert_eq!(coordinator.phase(), Phase::Connected);
  }
}
