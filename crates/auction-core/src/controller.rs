// Operator session controller.
//
// Owns the `AuctionSession` and the `DataCache` and runs one event loop over
// operator commands, the bidding countdown and results of spawned backend
// calls. Every change the projectors can see is published to the
// `Broadcaster`; every change the operator can see is pushed to the console
// as a `ConsoleUpdate`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::broadcast::{AuctionSnapshot, Broadcaster};
use crate::cache::{DataCache, Fetched};
use crate::error::{AuctionError, AuctionResult, Entity};
use crate::gateway::AuctionGateway;
use crate::model::{Player, Team};
use crate::session::{
    next_unsold, AuctionSession, BidStep, Phase, SaleRequest, SoldAnnouncement, TickOutcome,
};

/// Countdown resolution.
pub const TICK: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Commands from the operator console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Stage the first Unsold player.
    StageNext,
    /// Stage a specific player.
    Stage(i64),
    /// A team takes the lead at the next minimum increment.
    Bid { team_id: i64 },
    /// The leader raises.
    Raise(BidStep),
    Sell,
    Pass,
    /// Move on after a sale.
    Advance,
    Refresh,
    Quit,
}

/// Everything the console renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleSnapshot {
    pub auction: AuctionSnapshot,
    pub phase: Phase,
    pub sale_in_flight: bool,
    pub teams: Vec<Team>,
    pub players: Vec<Player>,
    /// Last backend failure, shown as a banner.
    pub banner: Option<String>,
}

/// Updates pushed from the controller to the console.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleUpdate {
    State(Box<ConsoleSnapshot>),
    /// A command was refused; the session is unchanged.
    Rejected(String),
    /// Fires once per completed sale.
    Sold(SoldAnnouncement),
}

/// Results of spawned backend calls, fed back into the loop.
#[derive(Debug)]
enum TaskEvent {
    Fetched(Fetched),
    SaleDone(AuctionResult<i64>),
    PassDone(AuctionResult<()>),
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct Controller {
    session: AuctionSession,
    cache: DataCache,
    gateway: Arc<dyn AuctionGateway>,
    broadcaster: Broadcaster,
    /// Bumped whenever the countdown restarts from the full window.
    countdown_epoch: u64,
}

impl Controller {
    pub fn new(
        session: AuctionSession,
        gateway: Arc<dyn AuctionGateway>,
        broadcaster: Broadcaster,
    ) -> Self {
        Controller {
            session,
            cache: DataCache::new(),
            gateway,
            broadcaster,
            countdown_epoch: 0,
        }
    }

    pub fn console_snapshot(&self) -> ConsoleSnapshot {
        ConsoleSnapshot {
            auction: self.session.snapshot(),
            phase: self.session.phase(),
            sale_in_flight: self.session.sale_in_flight(),
            teams: self.cache.teams().to_vec(),
            players: self.cache.players().to_vec(),
            banner: self.cache.error().map(str::to_string),
        }
    }

    fn publish(&self) {
        self.broadcaster.publish(self.session.snapshot());
    }

    async fn push_state(&self, ui_tx: &mpsc::Sender<ConsoleUpdate>) {
        let _ = ui_tx
            .send(ConsoleUpdate::State(Box::new(self.console_snapshot())))
            .await;
    }

    /// A transition visible to projectors and the console happened.
    async fn changed(&self, ui_tx: &mpsc::Sender<ConsoleUpdate>) {
        self.publish();
        self.push_state(ui_tx).await;
    }

    fn restart_countdown(&mut self) {
        self.countdown_epoch += 1;
    }

    // ------------------------------------------------------------------
    // Spawned backend calls
    // ------------------------------------------------------------------

    fn spawn_refresh(&self, task_tx: &mpsc::Sender<TaskEvent>) {
        let gateway = Arc::clone(&self.gateway);
        let task_tx = task_tx.clone();
        tokio::spawn(async move {
            let fetched = DataCache::fetch(gateway.as_ref()).await;
            let _ = task_tx.send(TaskEvent::Fetched(fetched)).await;
        });
    }

    fn spawn_sale(&self, request: SaleRequest, task_tx: &mpsc::Sender<TaskEvent>) {
        info!(
            player_id = request.player_id,
            team_id = request.team_id,
            amount = request.amount,
            "Finalizing sale"
        );
        let gateway = Arc::clone(&self.gateway);
        let task_tx = task_tx.clone();
        tokio::spawn(async move {
            let outcome = gateway.sell(request).await;
            let _ = task_tx.send(TaskEvent::SaleDone(outcome)).await;
        });
    }

    fn spawn_pass(&self, player_id: i64, task_tx: &mpsc::Sender<TaskEvent>) {
        let gateway = Arc::clone(&self.gateway);
        let task_tx = task_tx.clone();
        tokio::spawn(async move {
            let outcome = gateway.mark_unsold(player_id).await;
            let _ = task_tx.send(TaskEvent::PassDone(outcome)).await;
        });
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    async fn handle_command(
        &mut self,
        cmd: OperatorCommand,
        task_tx: &mpsc::Sender<TaskEvent>,
        ui_tx: &mpsc::Sender<ConsoleUpdate>,
    ) {
        debug!("Operator command: {cmd:?}");
        match self.apply_command(cmd, task_tx) {
            Ok(true) => self.changed(ui_tx).await,
            Ok(false) => {}
            Err(e) => {
                info!("Command rejected: {e}");
                let _ = ui_tx.send(ConsoleUpdate::Rejected(e.to_string())).await;
            }
        }
    }

    /// Apply one command. Returns whether the session changed.
    fn apply_command(
        &mut self,
        cmd: OperatorCommand,
        task_tx: &mpsc::Sender<TaskEvent>,
    ) -> AuctionResult<bool> {
        match cmd {
            OperatorCommand::StageNext => {
                let next = next_unsold(self.cache.players(), self.session.just_sold())
                    .cloned()
                    .ok_or_else(|| AuctionError::InvalidState("no Unsold players remain".into()))?;
                self.stage(next)?;
            }
            OperatorCommand::Stage(player_id) => {
                let player = self
                    .cache
                    .player(player_id)
                    .cloned()
                    .ok_or_else(|| AuctionError::not_found(Entity::Player, player_id))?;
                self.stage(player)?;
            }
            OperatorCommand::Bid { team_id } => {
                let team = self
                    .cache
                    .team(team_id)
                    .cloned()
                    .ok_or_else(|| AuctionError::not_found(Entity::Team, team_id))?;
                self.session.bid(&team)?;
                self.restart_countdown();
            }
            OperatorCommand::Raise(step) => {
                self.session.raise(step)?;
                self.restart_countdown();
            }
            OperatorCommand::Sell => {
                let request = self.session.begin_sale()?;
                self.spawn_sale(request, task_tx);
            }
            OperatorCommand::Pass => {
                let player_id = self.session.pass()?;
                info!(player_id, "Player passed");
                self.spawn_pass(player_id, task_tx);
            }
            OperatorCommand::Advance => {
                if self.session.advance(self.cache.players())?.is_some() {
                    self.restart_countdown();
                }
            }
            OperatorCommand::Refresh => {
                self.spawn_refresh(task_tx);
                return Ok(false);
            }
            OperatorCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn stage(&mut self, player: Player) -> AuctionResult<()> {
        let (id, name) = (player.id, player.name.clone());
        self.session.stage(player)?;
        self.restart_countdown();
        info!(player_id = id, "Staged {name}");
        Ok(())
    }

    async fn handle_tick(
        &mut self,
        task_tx: &mpsc::Sender<TaskEvent>,
        ui_tx: &mpsc::Sender<ConsoleUpdate>,
    ) {
        match self.session.tick() {
            TickOutcome::Stopped => {}
            TickOutcome::Counted(_) => self.changed(ui_tx).await,
            TickOutcome::Expired => {
                info!("Countdown expired with no bids");
                self.changed(ui_tx).await;
            }
            TickOutcome::Finalize(request) => {
                self.spawn_sale(request, task_tx);
                self.changed(ui_tx).await;
            }
        }
    }

    async fn handle_task_event(
        &mut self,
        event: TaskEvent,
        task_tx: &mpsc::Sender<TaskEvent>,
        ui_tx: &mpsc::Sender<ConsoleUpdate>,
    ) {
        match event {
            TaskEvent::Fetched(fetched) => {
                self.cache.apply(fetched);
                self.session.sync_teams(self.cache.teams());
                self.push_state(ui_tx).await;
            }
            TaskEvent::SaleDone(outcome) => {
                match self.session.complete_sale(outcome) {
                    Ok(announcement) => {
                        info!(
                            player = %announcement.player.name,
                            team = %announcement.team.name,
                            amount = announcement.amount,
                            "SOLD"
                        );
                        let _ = ui_tx.send(ConsoleUpdate::Sold(announcement)).await;
                    }
                    Err(e) => {
                        warn!("Sale failed: {e}");
                        if matches!(e, AuctionError::Network(_)) {
                            self.cache.set_error(e.to_string());
                        }
                        let _ = ui_tx
                            .send(ConsoleUpdate::Rejected(format!("Sale failed: {e}")))
                            .await;
                    }
                }
                self.changed(ui_tx).await;
                self.spawn_refresh(task_tx);
            }
            TaskEvent::PassDone(outcome) => {
                if let Err(e) = outcome {
                    warn!("Marking player unsold failed: {e}");
                    self.cache.set_error(e.to_string());
                    self.push_state(ui_tx).await;
                }
                self.spawn_refresh(task_tx);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

fn new_countdown() -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Completes on the next countdown tick, or never when there is no countdown.
async fn next_tick(countdown: &mut Option<Interval>) {
    match countdown {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Run the operator session until `Quit` or the command channel closes.
///
/// Listens on three sources using `tokio::select!`:
/// 1. Operator commands from the console
/// 2. The one-second countdown, present only while bidding is live
/// 3. Results of spawned backend calls (refetch, sell, pass)
pub async fn run(
    mut cmd_rx: mpsc::Receiver<OperatorCommand>,
    ui_tx: mpsc::Sender<ConsoleUpdate>,
    mut controller: Controller,
) -> anyhow::Result<()> {
    info!("Auction controller started");

    let (task_tx, mut task_rx) = mpsc::channel::<TaskEvent>(32);
    controller.spawn_refresh(&task_tx);
    controller.publish();

    let mut countdown: Option<Interval> = None;
    let mut countdown_epoch = controller.countdown_epoch;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(OperatorCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => {
                        controller.handle_command(cmd, &task_tx, &ui_tx).await;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            _ = next_tick(&mut countdown) => {
                controller.handle_tick(&task_tx, &ui_tx).await;
            }

            // task_tx is held above, so this channel never closes.
            Some(event) = task_rx.recv() => {
                controller.handle_task_event(event, &task_tx, &ui_tx).await;
            }
        }

        // Keep exactly one countdown alive, and only while bidding is live.
        if !controller.session.is_counting() {
            countdown = None;
        } else if countdown.is_none() || countdown_epoch != controller.countdown_epoch {
            countdown = Some(new_countdown());
        }
        countdown_epoch = controller.countdown_epoch;
    }

    drop(countdown);
    info!("Auction controller exiting");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
