use std::collections::HashSet;

use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use haiku_core::{
    Address,
    DayClock,
    DaySnapshot,
    LineSlot,
    SubmitAttempt,
    SubmitPhase,
    VoteAttempt,
    VotePhase,
    classify_revert,
    validate_line,
};
use tokio::{
    sync::mpsc,
    time::{
        self,
        Duration,
        Interval,
    },
};
use tracing::{
    error,
    info,
    warn,
};

use crate::{
    cache::{
        DayEndRecord,
        DayEndStore,
    },
    gateway::{
        CallStatus,
        ContractCall,
        DayWinners,
        HttpGateway,
        SendCallsRequest,
        WalletGateway,
    },
    ui,
    wallets,
};

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8080";
pub const DEFAULT_CHAIN_ID: u64 = 8453;

const MAX_ERRORS: usize = 50;
const WINNER_HISTORY_DAYS: u64 = 7;
const POLL_INTERVAL: Duration = Duration::from_secs(10);
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(500);
const STATUS_POLL_ATTEMPTS: u32 = 240;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub gateway_url: String,
    pub wallet: Option<String>,
    pub wallet_dir: Option<String>,
    pub chain_id: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            wallet: None,
            wallet_dir: None,
            chain_id: DEFAULT_CHAIN_ID,
        }
    }
}

/// Everything the UI renders for one frame.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub day_id: u64,
    pub today: DaySnapshot,
    pub yesterday: Option<DaySnapshot>,
    pub next_slot: Option<LineSlot>,
    pub submitted_today: bool,
    pub streak: u64,
    pub voted_yesterday: bool,
    pub winners: Vec<DayWinners>,
    pub closes_at: DateTime<Utc>,
    pub wallet: Option<Address>,
    pub submit: Option<SubmitAttempt>,
    pub vote: Option<VoteAttempt>,
    pub status: String,
    pub errors: Vec<String>,
}

/// One round of contract reads, fetched together so a frame never mixes
/// data from different polls.
#[derive(Clone, Debug)]
pub struct ReadBundle {
    today: haiku_core::RawDayHaiku,
    yesterday: Option<haiku_core::RawDayHaiku>,
    next_line: u8,
    submitted_today: bool,
    streak: u64,
    voted_yesterday: bool,
    winners: Vec<DayWinners>,
}

async fn fetch_bundle<G: WalletGateway>(
    gateway: &G,
    wallet: Option<&Address>,
    day_clock: DayClock,
    now: DateTime<Utc>,
) -> Result<ReadBundle> {
    let today = gateway.todays_haiku().await?;
    let yesterday_id = day_clock.yesterday_id(now);
    let yesterday = match yesterday_id {
        Some(_) => Some(gateway.yesterdays_haiku().await?),
        None => None,
    };
    let next_line = gateway.next_line_number().await?;
    let (submitted_today, streak, voted_yesterday) = match wallet {
        Some(address) => {
            let submitted = gateway.has_submitted_today(address).await?;
            let streak = gateway.user_streak(address).await?;
            let voted = match yesterday_id {
                Some(day_id) => gateway.has_voted_on_day(address, day_id).await?,
                None => false,
            };
            (submitted, streak, voted)
        }
        None => (false, 0, false),
    };
    let today_id = day_clock.day_id(now);
    let mut winners = Vec::new();
    for day_id in today_id.saturating_sub(WINNER_HISTORY_DAYS)..today_id {
        if let Some(day) = gateway.day_winners(day_id).await? {
            winners.push(day);
        }
    }
    winners.reverse();
    Ok(ReadBundle {
        today,
        yesterday,
        next_line,
        submitted_today,
        streak,
        voted_yesterday,
        winners,
    })
}

pub struct AppController<G> {
    gateway: G,
    wallet: Option<Address>,
    chain_id: u64,
    paymaster_url: String,
    day_clock: DayClock,
    end_store: Option<DayEndStore>,
    /// Days this session has voted on, so a second vote never leaves the
    /// client even before the contract read catches up.
    voted_days: HashSet<u64>,
    submit_attempt: Option<SubmitAttempt>,
    vote_attempt: Option<VoteAttempt>,
    last_bundle: Option<ReadBundle>,
    status: String,
    errors: Vec<String>,
}

impl<G: WalletGateway> AppController<G> {
    pub fn new(
        gateway: G,
        wallet: Option<Address>,
        chain_id: u64,
        paymaster_url: String,
    ) -> Self {
        AppController {
            gateway,
            wallet,
            chain_id,
            paymaster_url,
            day_clock: DayClock::default(),
            end_store: None,
            voted_days: HashSet::new(),
            submit_attempt: None,
            vote_attempt: None,
            last_bundle: None,
            status: String::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_end_store(mut self, end_store: Option<DayEndStore>) -> Self {
        self.end_store = end_store;
        self
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    pub fn push_errors(&mut self, mut items: Vec<String>) {
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let excess = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..excess);
        }
    }

    fn submit_in_flight(&self) -> bool {
        self.submit_attempt.as_ref().is_some_and(|a| a.in_flight())
    }

    fn vote_in_flight(&self) -> bool {
        self.vote_attempt.as_ref().is_some_and(|a| a.in_flight())
    }

    /// Frame shown before the first read bundle arrives. The countdown uses
    /// the cached end time when one exists for the current day.
    pub fn initial_snapshot(&self, now: DateTime<Utc>) -> AppSnapshot {
        let day_id = self.day_clock.day_id(now);
        let closes_at = self
            .end_store
            .as_ref()
            .and_then(|store| store.load_for_day(day_id))
            .map(|record| record.ends_at)
            .unwrap_or_else(|| self.day_clock.day_end(now));
        AppSnapshot {
            day_id,
            today: DaySnapshot::default(),
            yesterday: None,
            next_slot: None,
            submitted_today: false,
            streak: 0,
            voted_yesterday: false,
            winners: Vec::new(),
            closes_at,
            wallet: self.wallet.clone(),
            submit: None,
            vote: None,
            status: "Connecting to gateway...".to_string(),
            errors: Vec::new(),
        }
    }

    pub fn ingest_bundle(&mut self, bundle: ReadBundle, now: DateTime<Utc>) {
        if bundle.voted_yesterday
            && let Some(day_id) = self.day_clock.yesterday_id(now)
        {
            self.voted_days.insert(day_id);
        }
        self.last_bundle = Some(bundle);
        self.persist_day_end(now);
    }

    fn persist_day_end(&self, now: DateTime<Utc>) {
        let Some(store) = &self.end_store else {
            return;
        };
        let day_id = self.day_clock.day_id(now);
        let record = DayEndRecord {
            day_id,
            ends_at: self.day_clock.day_end(now),
        };
        if store.load_for_day(day_id).as_ref() == Some(&record) {
            return;
        }
        if let Err(err) = store.save(&record) {
            warn!(?err, "failed to cache day end");
        }
    }

    pub fn build_snapshot(&self, now: DateTime<Utc>) -> Result<AppSnapshot> {
        let bundle = self
            .last_bundle
            .as_ref()
            .ok_or_else(|| eyre!("no read bundle ingested yet"))?;
        let voted_locally = self
            .day_clock
            .yesterday_id(now)
            .is_some_and(|day_id| self.voted_days.contains(&day_id));
        Ok(AppSnapshot {
            day_id: self.day_clock.day_id(now),
            today: DaySnapshot::from_raw(bundle.today.clone()),
            yesterday: bundle.yesterday.clone().map(DaySnapshot::from_raw),
            next_slot: LineSlot::from_line_number(bundle.next_line),
            submitted_today: bundle.submitted_today,
            streak: bundle.streak,
            voted_yesterday: bundle.voted_yesterday || voted_locally,
            winners: bundle.winners.clone(),
            closes_at: self.day_clock.day_end(now),
            wallet: self.wallet.clone(),
            submit: self.submit_attempt.clone(),
            vote: self.vote_attempt.clone(),
            status: self.status.clone(),
            errors: self.errors.clone(),
        })
    }

    /// Looks up whether the wallet sponsors fees on our chain; when it does,
    /// writes carry the proxy URL so the gateway can route sponsorship.
    async fn sponsorship_url(&self, from: &Address) -> Option<String> {
        let capabilities = match self.gateway.capabilities(from).await {
            Ok(capabilities) => capabilities,
            Err(err) => {
                warn!(?err, "capability lookup failed, submitting unsponsored");
                return None;
            }
        };
        capabilities
            .get(&self.chain_id)
            .is_some_and(|c| c.paymaster_supported)
            .then(|| self.paymaster_url.clone())
    }

    /// Polls the call bundle until it leaves the pending state or the
    /// retry limit runs out.
    async fn await_confirmation(&self, id: &str) -> Result<CallStatus> {
        for _ in 0..STATUS_POLL_ATTEMPTS {
            match self.gateway.call_status(id).await? {
                CallStatus::Pending => time::sleep(STATUS_POLL_INTERVAL).await,
                done => return Ok(done),
            }
        }
        Ok(CallStatus::Pending)
    }

    /// Submits a line for today's next open slot.
    ///
    /// Returns whether the day state changed and is worth refetching.
    /// Validation failures and reverts end up in the attempt state rather
    /// than as errors; only the attempt bookkeeping itself can fail.
    pub async fn submit_line(&mut self, text: &str) -> Result<bool> {
        if self.submit_in_flight() {
            self.set_status("A submission is already pending");
            return Ok(false);
        }
        let slot = match self.gateway.next_line_number().await {
            Ok(n) => match LineSlot::from_line_number(n) {
                Some(slot) => slot,
                None => {
                    self.set_status("Today's haiku is already complete");
                    return Ok(true);
                }
            },
            Err(err) => {
                self.push_errors(vec![format!("Could not reach the gateway: {err}")]);
                return Ok(false);
            }
        };

        let mut attempt = SubmitAttempt::new(text, slot);
        attempt.phase = SubmitPhase::Validating;
        if let Err(reason) = validate_line(text, slot, self.wallet.is_some()) {
            attempt.fail(reason.to_string());
            self.submit_attempt = Some(attempt);
            return Ok(false);
        }
        let Some(from) = self.wallet.clone() else {
            attempt.fail("Connect a wallet first");
            self.submit_attempt = Some(attempt);
            return Ok(false);
        };

        attempt.phase = SubmitPhase::Signing;
        self.submit_attempt = Some(attempt.clone());
        let paymaster_url = self.sponsorship_url(&from).await;
        let request = SendCallsRequest {
            from,
            chain_id: self.chain_id,
            calls: vec![ContractCall::submit_line(slot, text)],
            paymaster_url,
        };
        let id = match self.gateway.send_calls(request).await {
            Ok(id) => id,
            Err(err) => {
                error!(error = %err, "send_calls for line submission failed");
                attempt.fail(format!("Wallet rejected the submission: {err}"));
                self.submit_attempt = Some(attempt);
                return Ok(false);
            }
        };

        attempt.phase = SubmitPhase::PendingConfirmation;
        self.submit_attempt = Some(attempt.clone());
        self.set_status(format!("Submitting the {}...", slot.label()));
        match self.await_confirmation(&id).await {
            Ok(CallStatus::Confirmed) => {
                info!(line = slot.line_number(), "line submission confirmed");
                attempt.succeed(format!("Line {} submitted", slot.line_number()));
                self.submit_attempt = Some(attempt);
                self.set_status("Line submitted");
                Ok(true)
            }
            Ok(CallStatus::Failed { revert_reason }) => {
                let reason =
                    revert_reason.unwrap_or_else(|| "call reverted".to_string());
                let outcome = classify_revert(&reason);
                if outcome.is_soft_success() {
                    // The contract already holds what we tried to add, so
                    // from the user's side this submission is done.
                    info!(%reason, "revert resolved as soft success");
                    attempt.succeed(outcome.message());
                    self.submit_attempt = Some(attempt);
                    self.set_status(outcome.message());
                    Ok(true)
                } else {
                    warn!(%reason, "line submission reverted");
                    attempt.fail(outcome.message());
                    self.submit_attempt = Some(attempt);
                    Ok(false)
                }
            }
            Ok(CallStatus::Pending) => {
                attempt.fail("No confirmation from the gateway in time");
                self.submit_attempt = Some(attempt);
                Ok(false)
            }
            Err(err) => {
                attempt.fail(format!("Lost track of the submission: {err}"));
                self.submit_attempt = Some(attempt);
                Ok(false)
            }
        }
    }

    /// Casts a vote on yesterday's haiku. The already-voted checks here are
    /// advisory; the contract enforces one vote per day regardless.
    pub async fn vote_for_yesterday(&mut self, now: DateTime<Utc>) -> Result<bool> {
        let Some(day_id) = self.day_clock.yesterday_id(now) else {
            self.set_status("Nothing to vote on during the first day");
            return Ok(false);
        };
        if self.vote_in_flight() {
            return Ok(false);
        }
        let Some(from) = self.wallet.clone() else {
            self.push_errors(vec!["Connect a wallet to vote".to_string()]);
            return Ok(false);
        };
        let already_voted = self.voted_days.contains(&day_id)
            || self.last_bundle.as_ref().is_some_and(|b| b.voted_yesterday);
        if already_voted {
            self.set_status("You already voted on yesterday's haiku");
            return Ok(false);
        }

        let mut attempt = VoteAttempt::new(day_id);
        attempt.phase = VotePhase::Submitting;
        self.vote_attempt = Some(attempt.clone());
        self.set_status("Casting vote...");
        let paymaster_url = self.sponsorship_url(&from).await;
        let request = SendCallsRequest {
            from,
            chain_id: self.chain_id,
            calls: vec![ContractCall::vote_for_yesterday()],
            paymaster_url,
        };
        let id = match self.gateway.send_calls(request).await {
            Ok(id) => id,
            Err(err) => {
                error!(error = %err, "send_calls for vote failed");
                attempt.phase = VotePhase::Failed;
                attempt.message = Some(format!("Wallet rejected the vote: {err}"));
                self.vote_attempt = Some(attempt);
                return Ok(false);
            }
        };
        match self.await_confirmation(&id).await {
            Ok(CallStatus::Confirmed) => {
                info!(day_id, "vote confirmed");
                self.voted_days.insert(day_id);
                attempt.phase = VotePhase::Succeeded;
                attempt.message = Some("Vote counted".to_string());
                self.vote_attempt = Some(attempt);
                self.set_status("Vote counted");
                Ok(true)
            }
            Ok(CallStatus::Failed { revert_reason }) => {
                let reason =
                    revert_reason.unwrap_or_else(|| "call reverted".to_string());
                if reason.contains("already voted") {
                    self.voted_days.insert(day_id);
                }
                warn!(%reason, "vote reverted");
                attempt.phase = VotePhase::Failed;
                attempt.message = Some(format!("Vote failed: {reason}"));
                self.vote_attempt = Some(attempt);
                Ok(false)
            }
            Ok(CallStatus::Pending) => {
                attempt.phase = VotePhase::Failed;
                attempt.message =
                    Some("No confirmation from the gateway in time".to_string());
                self.vote_attempt = Some(attempt);
                Ok(false)
            }
            Err(err) => {
                attempt.phase = VotePhase::Failed;
                attempt.message = Some(format!("Lost track of the vote: {err}"));
                self.vote_attempt = Some(attempt);
                Ok(false)
            }
        }
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let gateway = HttpGateway::new(&config.gateway_url);
    info!(%gateway, "connecting");

    let wallet = match config.wallet.as_deref() {
        Some(name) => {
            let dir = wallets::resolve_wallet_dir(config.wallet_dir.as_deref())?;
            let descriptor = wallets::find_wallet(&dir, name)?;
            let unlocked = wallets::unlock_wallet(&descriptor)?;
            info!(wallet = %unlocked.name, address = %unlocked.address, "wallet unlocked");
            Some(unlocked.address)
        }
        None => None,
    };

    let end_store = match DayEndStore::new() {
        Ok(store) => Some(store),
        Err(err) => {
            warn!(?err, "day end cache unavailable");
            None
        }
    };

    let paymaster_url = gateway.paymaster_proxy_url();
    let controller = AppController::new(gateway, wallet, config.chain_id, paymaster_url)
        .with_end_store(end_store);

    let mut ui_state = ui::UiState::default();
    tracing::info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    tracing::info!("UI ready");
    let mut input_events = ui::input_event_stream();
    let res = run_loop(controller, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

fn sync_status<G: WalletGateway>(
    controller: &mut AppController<G>,
    snapshot: &mut AppSnapshot,
    status: impl Into<String>,
) {
    controller.set_status(status);
    snapshot.status = controller.status.clone();
    snapshot.errors = controller.errors.clone();
}

fn sync_error<G: WalletGateway>(
    controller: &mut AppController<G>,
    snapshot: &mut AppSnapshot,
    error_msg: impl Into<String>,
) {
    controller.push_errors(vec![error_msg.into()]);
    snapshot.errors = controller.errors.clone();
    snapshot.status = controller.status.clone();
}

fn show_processing_status<G: WalletGateway>(
    controller: &mut AppController<G>,
    snapshot: &mut AppSnapshot,
    ui_state: &mut ui::UiState,
    message: impl Into<String>,
    context: &'static str,
) -> Result<()> {
    sync_status(controller, snapshot, message);
    ui::draw(ui_state, snapshot).wrap_err(context)
}

/// Awaits an in-flight action without stalling the display: countdown
/// ticks keep firing and redrawing while the action (which may poll for
/// confirmation for a while) runs to completion.
async fn drive_with_countdown<F>(
    action: F,
    ui_state: &mut ui::UiState,
    snapshot: Option<&AppSnapshot>,
    countdown_tick: &mut Interval,
) -> Result<F::Output>
where
    F: Future,
{
    tokio::pin!(action);
    loop {
        tokio::select! {
            out = &mut action => return Ok(out),
            _ = countdown_tick.tick() => {
                if let Some(snapshot) = snapshot {
                    ui::draw(ui_state, snapshot)
                        .wrap_err("countdown redraw failed")?;
                }
            }
        }
    }
}

enum RefreshCommand {
    FetchNow,
    Shutdown,
}

enum RefreshEvent {
    Bundle(ReadBundle),
}

/// Polls the `LineSubmitted` log feed and refetches the read bundle when
/// new lines land, on request, or once at startup.
async fn refresh_worker<G: WalletGateway>(
    poll_interval: Duration,
    gateway: G,
    wallet: Option<Address>,
    day_clock: DayClock,
    mut cmd_rx: mpsc::UnboundedReceiver<RefreshCommand>,
    event_tx: mpsc::UnboundedSender<RefreshEvent>,
) -> Result<()> {
    async fn fetch<G: WalletGateway>(
        gateway: &G,
        wallet: Option<&Address>,
        day_clock: DayClock,
        event_tx: &mpsc::UnboundedSender<RefreshEvent>,
    ) -> Result<()> {
        let bundle = fetch_bundle(gateway, wallet, day_clock, Utc::now()).await?;
        event_tx
            .send(RefreshEvent::Bundle(bundle))
            .map_err(|_| eyre!("bundle receiver dropped"))?;
        Ok(())
    }

    // Prime the cursor so only lines submitted after startup trigger an
    // extra refetch; the initial fetch below covers everything older.
    let mut cursor = 0u64;
    match gateway.line_submitted_events(cursor).await {
        Ok(page) => cursor = page.next_cursor,
        Err(err) => warn!(?err, "initial event poll failed"),
    }
    fetch(&gateway, wallet.as_ref(), day_clock, &event_tx).await?;

    let mut ticker = time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match gateway.line_submitted_events(cursor).await {
                    Ok(page) => {
                        let fresh = !page.events.is_empty() || page.next_cursor != cursor;
                        cursor = page.next_cursor;
                        for event in &page.events {
                            info!(
                                day_id = event.day_id,
                                line = event.line_number,
                                author = %event.author,
                                text = %event.text,
                                "line submitted onchain"
                            );
                        }
                        if fresh
                            && let Err(err) =
                                fetch(&gateway, wallet.as_ref(), day_clock, &event_tx).await
                        {
                            warn!(?err, "refetch after new lines failed");
                        }
                    }
                    Err(err) => warn!(?err, "event poll failed"),
                }
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                match cmd {
                    RefreshCommand::FetchNow => {
                        if let Err(err) =
                            fetch(&gateway, wallet.as_ref(), day_clock, &event_tx).await
                        {
                            warn!(?err, "bundle fetch failed");
                        }
                    }
                    RefreshCommand::Shutdown => break,
                }
            }
        }
    }
    Ok(())
}

async fn run_loop<G>(
    mut controller: AppController<G>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEvents,
) -> Result<()>
where
    G: WalletGateway + Clone + Send + Sync + 'static,
{
    tracing::info!("Running app loop");
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let worker_handle = tokio::spawn(refresh_worker(
        POLL_INTERVAL,
        controller.gateway.clone(),
        controller.wallet.clone(),
        controller.day_clock,
        cmd_rx,
        event_tx,
    ));

    let mut last_snapshot: Option<AppSnapshot> = None;
    let initial = controller.initial_snapshot(Utc::now());
    ui::draw(ui_state, &initial).wrap_err("initial draw failed")?;

    let mut countdown_tick = time::interval(Duration::from_secs(1));
    countdown_tick.tick().await;

    loop {
        tokio::select! {
            maybe_event = event_rx.recv() => {
                match maybe_event {
                    Some(RefreshEvent::Bundle(bundle)) => {
                        controller.ingest_bundle(bundle, Utc::now());
                        let snapshot = controller
                            .build_snapshot(Utc::now())
                            .wrap_err("snapshot refresh failed")?;
                        ui::draw(ui_state, &snapshot)
                            .wrap_err("draw after bundle refresh failed")?;
                        last_snapshot = Some(snapshot);
                    }
                    None => {
                        tracing::warn!("refresh worker channel closed");
                        break;
                    }
                }
            }
            _ = countdown_tick.tick() => {
                // Redraw so the countdown advances even between polls.
                if let Some(snapshot) = last_snapshot.as_ref() {
                    ui::draw(ui_state, snapshot).wrap_err("countdown redraw failed")?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = cmd_tx.send(RefreshCommand::Shutdown);
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                if last_snapshot.is_none() {
                    if matches!(ev, ui::UserEvent::Quit) {
                        let _ = cmd_tx.send(RefreshCommand::Shutdown);
                        break;
                    }
                    continue;
                }
                match ev {
                    ui::UserEvent::Quit => {
                        let _ = cmd_tx.send(RefreshCommand::Shutdown);
                        break;
                    }
                    ui::UserEvent::Redraw => {
                        if let Some(snapshot) = last_snapshot.as_ref() {
                            ui::draw(ui_state, snapshot)
                                .wrap_err("draw during modal/redraw failed")?;
                        }
                    }
                    ui::UserEvent::Refresh => {
                        if let Some(snapshot) = last_snapshot.as_mut() {
                            sync_status(&mut controller, snapshot, "Refreshing...");
                            ui::draw(ui_state, snapshot)
                                .wrap_err("draw during refresh failed")?;
                        }
                        let _ = cmd_tx.send(RefreshCommand::FetchNow);
                    }
                    ui::UserEvent::Submit(text) => {
                        if let Some(snapshot) = last_snapshot.as_mut() {
                            show_processing_status(
                                &mut controller,
                                snapshot,
                                ui_state,
                                "Submitting line...",
                                "draw while submitting line failed",
                            )?;
                        }
                        let outcome = drive_with_countdown(
                            controller.submit_line(&text),
                            ui_state,
                            last_snapshot.as_ref(),
                            &mut countdown_tick,
                        )
                        .await?;
                        match outcome {
                            Ok(refetch) => {
                                if refetch {
                                    let _ = cmd_tx.send(RefreshCommand::FetchNow);
                                }
                            }
                            Err(e) => {
                                let msg = format!("Line submission failed: {}", e);
                                error!(error = %e, "line submission failed");
                                if let Some(snapshot) = last_snapshot.as_mut() {
                                    sync_error(&mut controller, snapshot, msg);
                                } else {
                                    controller.push_errors(vec![msg]);
                                }
                            }
                        }
                        let snapshot = controller
                            .build_snapshot(Utc::now())
                            .wrap_err("snapshot rebuild after submission failed")?;
                        ui::draw(ui_state, &snapshot)
                            .wrap_err("draw after submission failed")?;
                        last_snapshot = Some(snapshot);
                    }
                    ui::UserEvent::Vote => {
                        if let Some(snapshot) = last_snapshot.as_mut() {
                            show_processing_status(
                                &mut controller,
                                snapshot,
                                ui_state,
                                "Casting vote...",
                                "draw while casting vote failed",
                            )?;
                        }
                        let outcome = drive_with_countdown(
                            controller.vote_for_yesterday(Utc::now()),
                            ui_state,
                            last_snapshot.as_ref(),
                            &mut countdown_tick,
                        )
                        .await?;
                        match outcome {
                            Ok(refetch) => {
                                if refetch {
                                    let _ = cmd_tx.send(RefreshCommand::FetchNow);
                                }
                            }
                            Err(e) => {
                                let msg = format!("Vote failed: {}", e);
                                error!(error = %e, "vote failed");
                                if let Some(snapshot) = last_snapshot.as_mut() {
                                    sync_error(&mut controller, snapshot, msg);
                                } else {
                                    controller.push_errors(vec![msg]);
                                }
                            }
                        }
                        let snapshot = controller
                            .build_snapshot(Utc::now())
                            .wrap_err("snapshot rebuild after vote failed")?;
                        ui::draw(ui_state, &snapshot)
                            .wrap_err("draw after vote failed")?;
                        last_snapshot = Some(snapshot);
                    }
                }
            }
        }
    }

    worker_handle.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use std::{
        collections::HashMap,
        sync::Mutex,
    };

    use haiku_core::RawDayHaiku;

    use crate::gateway::{
        ChainCapabilities,
        EventPage,
    };

    const WALLET: &str = "0x1234567890abcdef1234567890abcdef12345678";
    const PAYMASTER: &str = "http://localhost:8080/api/paymaster";

    fn day_two() -> DateTime<Utc> {
        chrono::TimeZone::with_ymd_and_hms(&Utc, 1970, 1, 3, 12, 0, 0).unwrap()
    }

    #[derive(Default)]
    struct FakeGateway {
        next_line: u8,
        submitted_today: bool,
        voted_yesterday: bool,
        paymaster_supported: bool,
        revert_reason: Option<String>,
        sent: Mutex<Vec<SendCallsRequest>>,
    }

    impl FakeGateway {
        fn sent(&self) -> Vec<SendCallsRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl WalletGateway for &FakeGateway {
        async fn todays_haiku(&self) -> Result<RawDayHaiku> {
            Ok(RawDayHaiku {
                lines: [
                    "an old silent pond".to_string(),
                    String::new(),
                    String::new(),
                ],
                authors: [WALLET.to_string(), String::new(), String::new()],
                vote_count: 0,
                submitted_lines: 1,
                winner_declared: false,
                is_winning: false,
            })
        }

        async fn yesterdays_haiku(&self) -> Result<RawDayHaiku> {
            Ok(RawDayHaiku {
                lines: [
                    "an old silent pond".to_string(),
                    "a frog jumps into the pond".to_string(),
                    "splash, silence again".to_string(),
                ],
                authors: [WALLET.to_string(), WALLET.to_string(), WALLET.to_string()],
                vote_count: 4,
                submitted_lines: 3,
                winner_declared: false,
                is_winning: false,
            })
        }

        async fn next_line_number(&self) -> Result<u8> {
            Ok(self.next_line)
        }

        async fn has_submitted_today(&self, _address: &Address) -> Result<bool> {
            Ok(self.submitted_today)
        }

        async fn user_streak(&self, _address: &Address) -> Result<u64> {
            Ok(3)
        }

        async fn day_winners(&self, _day_id: u64) -> Result<Option<DayWinners>> {
            Ok(None)
        }

        async fn has_voted_on_day(
            &self,
            _address: &Address,
            _day_id: u64,
        ) -> Result<bool> {
            Ok(self.voted_yesterday)
        }

        async fn line_submitted_events(&self, cursor: u64) -> Result<EventPage> {
            Ok(EventPage {
                events: Vec::new(),
                next_cursor: cursor,
            })
        }

        async fn capabilities(
            &self,
            _address: &Address,
        ) -> Result<HashMap<u64, ChainCapabilities>> {
            let mut capabilities = HashMap::new();
            capabilities.insert(
                DEFAULT_CHAIN_ID,
                ChainCapabilities {
                    paymaster_supported: self.paymaster_supported,
                },
            );
            Ok(capabilities)
        }

        async fn send_calls(&self, request: SendCallsRequest) -> Result<String> {
            self.sent.lock().unwrap().push(request);
            Ok("bundle-1".to_string())
        }

        async fn call_status(&self, _id: &str) -> Result<CallStatus> {
            Ok(match &self.revert_reason {
                Some(reason) => CallStatus::Failed {
                    revert_reason: Some(reason.clone()),
                },
                None => CallStatus::Confirmed,
            })
        }
    }

    fn controller(gateway: &FakeGateway) -> AppController<&FakeGateway> {
        AppController::new(
            gateway,
            Some(WALLET.parse().unwrap()),
            DEFAULT_CHAIN_ID,
            PAYMASTER.to_string(),
        )
    }

    #[tokio::test]
    async fn submit_line__rejects_an_invalid_line_without_sending_anything() {
        // given a line with too few syllables for slot two
        let gateway = FakeGateway {
            next_line: 2,
            ..FakeGateway::default()
        };
        let mut controller = controller(&gateway);

        // when
        let refetch = controller.submit_line("too short").await.unwrap();

        // then no write call left the client
        assert!(!refetch);
        assert!(gateway.sent().is_empty());
        let attempt = controller.submit_attempt.unwrap();
        assert_eq!(attempt.phase, SubmitPhase::Failed);
        assert_eq!(
            attempt.message.as_deref(),
            Some("This line needs 7 syllables, counted 2")
        );
    }

    #[tokio::test]
    async fn submit_line__without_a_wallet_fails_validation() {
        let gateway = FakeGateway {
            next_line: 1,
            ..FakeGateway::default()
        };
        let mut controller = AppController::new(
            &gateway,
            None,
            DEFAULT_CHAIN_ID,
            PAYMASTER.to_string(),
        );

        let refetch = controller
            .submit_line("an old silent pond")
            .await
            .unwrap();

        assert!(!refetch);
        assert!(gateway.sent().is_empty());
        assert_eq!(
            controller.submit_attempt.unwrap().message.as_deref(),
            Some("Connect a wallet first")
        );
    }

    #[tokio::test]
    async fn submit_line__confirmed_submission_requests_a_refetch() {
        // given
        let gateway = FakeGateway {
            next_line: 1,
            ..FakeGateway::default()
        };
        let mut controller = controller(&gateway);

        // when
        let refetch = controller
            .submit_line("an old silent pond")
            .await
            .unwrap();

        // then
        assert!(refetch);
        let sent = gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].calls[0].function, "submitLine");
        assert_eq!(
            controller.submit_attempt.unwrap().phase,
            SubmitPhase::Succeeded
        );
    }

    #[tokio::test]
    async fn submit_line__daily_limit_revert_resolves_as_soft_success() {
        // given the contract rejecting a second line for the day
        let gateway = FakeGateway {
            next_line: 2,
            revert_reason: Some(
                "execution reverted: You already submitted a line today".to_string(),
            ),
            ..FakeGateway::default()
        };
        let mut controller = controller(&gateway);

        // when
        let refetch = controller
            .submit_line("a frog jumps into the pond")
            .await
            .unwrap();

        // then the success path runs anyway
        assert!(refetch);
        let attempt = controller.submit_attempt.unwrap();
        assert_eq!(attempt.phase, SubmitPhase::Succeeded);
        assert_eq!(
            attempt.message.as_deref(),
            Some("You already submitted your line for today")
        );
    }

    #[tokio::test]
    async fn submit_line__unknown_reverts_fail_the_attempt() {
        let gateway = FakeGateway {
            next_line: 1,
            revert_reason: Some("execution reverted: Day is over".to_string()),
            ..FakeGateway::default()
        };
        let mut controller = controller(&gateway);

        let refetch = controller
            .submit_line("an old silent pond")
            .await
            .unwrap();

        assert!(!refetch);
        let attempt = controller.submit_attempt.unwrap();
        assert_eq!(attempt.phase, SubmitPhase::Failed);
        assert_eq!(
            attempt.message.as_deref(),
            Some("Submission failed: execution reverted: Day is over")
        );
    }

    #[tokio::test]
    async fn submit_line__attaches_the_paymaster_only_when_the_chain_supports_it() {
        // given sponsorship advertised for our chain
        let sponsored = FakeGateway {
            next_line: 1,
            paymaster_supported: true,
            ..FakeGateway::default()
        };
        let mut sponsored_controller = controller(&sponsored);
        sponsored_controller
            .submit_line("an old silent pond")
            .await
            .unwrap();
        assert_eq!(
            sponsored.sent()[0].paymaster_url.as_deref(),
            Some(PAYMASTER)
        );

        // and without support the request goes out unsponsored
        let unsponsored = FakeGateway {
            next_line: 1,
            ..FakeGateway::default()
        };
        let mut unsponsored_controller = controller(&unsponsored);
        unsponsored_controller
            .submit_line("an old silent pond")
            .await
            .unwrap();
        assert_eq!(unsponsored.sent()[0].paymaster_url, None);
    }

    #[tokio::test]
    async fn vote_for_yesterday__dispatches_once_and_never_twice() {
        // given
        let gateway = FakeGateway::default();
        let mut controller = controller(&gateway);

        // when voting twice for the same day
        let first = controller.vote_for_yesterday(day_two()).await.unwrap();
        let second = controller.vote_for_yesterday(day_two()).await.unwrap();

        // then only the first vote reached the gateway
        assert!(first);
        assert!(!second);
        let sent = gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].calls[0].function, "voteForYesterday");
        assert_eq!(
            controller.vote_attempt.unwrap().phase,
            VotePhase::Succeeded
        );
    }

    #[tokio::test]
    async fn vote_for_yesterday__respects_the_contract_reported_voted_flag() {
        // given a bundle that says we already voted
        let gateway = FakeGateway {
            voted_yesterday: true,
            ..FakeGateway::default()
        };
        let mut controller = controller(&gateway);
        let bundle =
            fetch_bundle(&&gateway, controller.wallet.clone().as_ref(), DayClock::default(), day_two())
                .await
                .unwrap();
        controller.ingest_bundle(bundle, day_two());

        // when
        let refetch = controller.vote_for_yesterday(day_two()).await.unwrap();

        // then nothing was dispatched
        assert!(!refetch);
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn vote_for_yesterday__does_nothing_on_day_zero() {
        let gateway = FakeGateway::default();
        let mut controller = controller(&gateway);
        let day_zero = chrono::TimeZone::with_ymd_and_hms(&Utc, 1970, 1, 1, 6, 0, 0).unwrap();

        let refetch = controller.vote_for_yesterday(day_zero).await.unwrap();

        assert!(!refetch);
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn build_snapshot__reflects_the_ingested_bundle() {
        // given
        let gateway = FakeGateway {
            next_line: 2,
            submitted_today: true,
            ..FakeGateway::default()
        };
        let mut controller = controller(&gateway);
        let bundle = fetch_bundle(
            &&gateway,
            controller.wallet.clone().as_ref(),
            DayClock::default(),
            day_two(),
        )
        .await
        .unwrap();
        controller.ingest_bundle(bundle, day_two());

        // when
        let snapshot = controller.build_snapshot(day_two()).unwrap();

        // then
        assert_eq!(snapshot.day_id, 2);
        assert_eq!(snapshot.today.lines.len(), 1);
        assert_eq!(snapshot.next_slot, Some(LineSlot::Two));
        assert!(snapshot.submitted_today);
        assert_eq!(snapshot.streak, 3);
        assert_eq!(
            snapshot.yesterday.as_ref().map(|d| d.vote_count),
            Some(4)
        );
        assert_eq!(
            snapshot.closes_at,
            chrono::TimeZone::with_ymd_and_hms(&Utc, 1970, 1, 4, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn drive_with_countdown__returns_the_action_output_while_ticking() {
        // given a slow action and a fast countdown interval
        let mut ui_state = ui::UiState::default();
        let mut tick = time::interval(Duration::from_millis(1));
        tick.tick().await;

        let action = async {
            time::sleep(Duration::from_millis(10)).await;
            42u32
        };

        // when
        let out = drive_with_countdown(action, &mut ui_state, None, &mut tick)
            .await
            .unwrap();

        // then the countdown arm never starves the action
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn push_errors__caps_the_error_ring() {
        let gateway = FakeGateway::default();
        let mut controller = controller(&gateway);

        for i in 0..(MAX_ERRORS + 10) {
            controller.push_errors(vec![format!("error {i}")]);
        }

        assert_eq!(controller.errors.len(), MAX_ERRORS);
        assert_eq!(controller.errors[0], "error 10");
    }
}
