// Live auction state machine for the player currently on the block.
//
// Idle -> Bidding (stage) -> Sold (sale committed) -> Bidding | Idle (advance)
// with Bidding -> Idle on a pass. Persistent effects (the sale itself, marking
// a passed player Unsold) are handed back to the caller as requests; the
// session never talks to the store directly.

use crate::broadcast::AuctionSnapshot;
use crate::config::BidRules;
use crate::error::{AuctionError, AuctionResult};
use crate::model::{Player, PlayerStatus, Team};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Bidding,
    Sold,
}

/// A raise by the team already leading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidStep {
    /// One of the configured one-key amounts.
    Quick(i64),
    /// An operator-chosen amount inside the custom range.
    Custom(i64),
}

impl BidStep {
    pub fn amount(&self) -> i64 {
        match self {
            BidStep::Quick(amount) | BidStep::Custom(amount) => *amount,
        }
    }
}

/// Arguments for the transaction engine, produced when a sale starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleRequest {
    pub player_id: i64,
    pub team_id: i64,
    pub amount: i64,
}

/// Produced exactly once per completed sale.
#[derive(Debug, Clone, PartialEq)]
pub struct SoldAnnouncement {
    pub player: Player,
    pub team: Team,
    pub amount: i64,
}

/// Result of one countdown tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is counting down (idle, sold, frozen by a sale, or already 0).
    Stopped,
    /// One second elapsed.
    Counted(u32),
    /// Reached zero with no leader; the player stays on the block.
    Expired,
    /// Reached zero with a leader; the sale has begun.
    Finalize(SaleRequest),
}

#[derive(Debug, Clone)]
pub struct AuctionSession {
    rules: BidRules,
    phase: Phase,
    staged: Option<Player>,
    current_bid: i64,
    leader: Option<Team>,
    countdown: u32,
    sale_in_flight: bool,
}

impl AuctionSession {
    pub fn new(rules: BidRules) -> Self {
        let countdown = rules.countdown_secs;
        AuctionSession {
            rules,
            phase: Phase::Idle,
            staged: None,
            current_bid: 0,
            leader: None,
            countdown,
            sale_in_flight: false,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn rules(&self) -> &BidRules {
        &self.rules
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn staged(&self) -> Option<&Player> {
        self.staged.as_ref()
    }

    pub fn current_bid(&self) -> i64 {
        self.current_bid
    }

    pub fn leader(&self) -> Option<&Team> {
        self.leader.as_ref()
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn sale_in_flight(&self) -> bool {
        self.sale_in_flight
    }

    /// True while the countdown should be ticking.
    pub fn is_counting(&self) -> bool {
        self.phase == Phase::Bidding && !self.sale_in_flight && self.countdown > 0
    }

    pub fn snapshot(&self) -> AuctionSnapshot {
        AuctionSnapshot {
            staged_player: self.staged.clone(),
            current_bid: self.current_bid,
            leading_team: self.leader.clone(),
            is_sold: self.phase == Phase::Sold,
            countdown: self.countdown,
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Put an Unsold player on the block at their base price.
    pub fn stage(&mut self, player: Player) -> AuctionResult<()> {
        self.ensure_no_sale()?;
        if self.phase == Phase::Bidding {
            return Err(AuctionError::InvalidState(
                "sell or pass the current player before staging another".into(),
            ));
        }
        // A refetch may not yet show the sale that just completed.
        let status = if self.just_sold() == Some(player.id) {
            PlayerStatus::Sold
        } else {
            player.status
        };
        if status != PlayerStatus::Unsold {
            return Err(AuctionError::PlayerUnavailable {
                player_id: player.id,
                status,
            });
        }

        self.current_bid = player.base_price;
        self.staged = Some(player);
        self.leader = None;
        self.countdown = self.rules.countdown_secs;
        self.phase = Phase::Bidding;
        Ok(())
    }

    /// Whether `team` may take the lead right now, and at what bid.
    pub fn bid_check(&self, team: &Team) -> AuctionResult<i64> {
        self.ensure_bidding()?;
        if self.leader.as_ref().is_some_and(|l| l.id == team.id) {
            return Err(AuctionError::InvalidState(format!(
                "{} already leads; raise instead",
                team.name
            )));
        }
        self.affordable(team, self.rules.min_increment)
    }

    /// `team` takes the lead at the current bid plus the minimum increment.
    pub fn bid(&mut self, team: &Team) -> AuctionResult<()> {
        let next = self.bid_check(team)?;
        self.accept(team.clone(), next);
        Ok(())
    }

    /// The current leader raises its own bid.
    pub fn raise(&mut self, step: BidStep) -> AuctionResult<()> {
        self.ensure_bidding()?;
        let leader = self
            .leader
            .clone()
            .ok_or_else(|| AuctionError::InvalidState("no team is leading yet".into()))?;

        let amount = step.amount();
        let allowed = match step {
            BidStep::Quick(_) => self.rules.quick_increments.contains(&amount),
            BidStep::Custom(_) => self.rules.custom_increment.contains(amount),
        };
        if !allowed {
            return Err(AuctionError::validation(format!(
                "{amount} is not an allowed increment"
            )));
        }

        let next = self.affordable(&leader, amount)?;
        self.accept(leader, next);
        Ok(())
    }

    /// Start the sale to the current leader at the current bid. Freezes the
    /// countdown and blocks every other transition until
    /// [`complete_sale`](Self::complete_sale).
    pub fn begin_sale(&mut self) -> AuctionResult<SaleRequest> {
        self.ensure_bidding()?;
        let (player, team) = match (&self.staged, &self.leader) {
            (Some(player), Some(team)) => (player, team),
            _ => {
                return Err(AuctionError::InvalidState(
                    "a player can only be sold to a leading team".into(),
                ))
            }
        };
        let request = SaleRequest {
            player_id: player.id,
            team_id: team.id,
            amount: self.current_bid,
        };
        self.sale_in_flight = true;
        Ok(request)
    }

    /// Record the transaction engine's answer. Success moves to `Sold` and
    /// yields the announcement; failure leaves the session bidding and
    /// hands the error back.
    pub fn complete_sale(&mut self, outcome: AuctionResult<i64>) -> AuctionResult<SoldAnnouncement> {
        if !self.sale_in_flight {
            return Err(AuctionError::InvalidState("no sale is in progress".into()));
        }
        self.sale_in_flight = false;
        let new_budget = outcome?;

        let (Some(player), Some(team)) = (self.staged.as_mut(), self.leader.as_mut()) else {
            return Err(AuctionError::InvalidState("sale completed with nothing staged".into()));
        };
        player.status = PlayerStatus::Sold;
        player.sold_price = self.current_bid;
        player.sold_to_team_id = Some(team.id);
        team.remaining_budget = new_budget;
        team.players.push(player.id);
        self.phase = Phase::Sold;

        Ok(SoldAnnouncement {
            player: player.clone(),
            team: team.clone(),
            amount: self.current_bid,
        })
    }

    /// Take the staged player off the block unsold. Returns the player id to
    /// mark Unsold in the store.
    pub fn pass(&mut self) -> AuctionResult<i64> {
        self.ensure_bidding()?;
        let player = self
            .staged
            .take()
            .ok_or_else(|| AuctionError::InvalidState("no player is staged".into()))?;
        self.reset_to_idle();
        Ok(player.id)
    }

    /// After a sale, stage the next Unsold player (skipping the one just
    /// sold) or go idle when none remain. Returns the staged player's id.
    /// The player sold in the current `Sold` phase.
    pub fn just_sold(&self) -> Option<i64> {
        match self.phase {
            Phase::Sold => self.staged.as_ref().map(|p| p.id),
            _ => None,
        }
    }

    pub fn advance(&mut self, players: &[Player]) -> AuctionResult<Option<i64>> {
        if self.phase != Phase::Sold {
            return Err(AuctionError::InvalidState(
                "advance is only possible after a sale".into(),
            ));
        }
        let exclude = self.just_sold();
        self.reset_to_idle();
        match next_unsold(players, exclude) {
            Some(next) => {
                let id = next.id;
                self.stage(next.clone())?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Advance the countdown by one second, starting the sale when it runs
    /// out with a leader.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_counting() {
            return TickOutcome::Stopped;
        }
        self.countdown -= 1;
        if self.countdown > 0 {
            return TickOutcome::Counted(self.countdown);
        }
        match self.begin_sale() {
            Ok(request) => TickOutcome::Finalize(request),
            Err(_) => TickOutcome::Expired,
        }
    }

    /// Refresh the leader's record (budget, roster) from freshly fetched
    /// teams.
    pub fn sync_teams(&mut self, teams: &[Team]) {
        if let Some(leader) = self.leader.as_mut() {
            if let Some(fresh) = teams.iter().find(|t| t.id == leader.id) {
                *leader = fresh.clone();
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn ensure_no_sale(&self) -> AuctionResult<()> {
        if self.sale_in_flight {
            return Err(AuctionError::SaleInFlight);
        }
        Ok(())
    }

    fn ensure_bidding(&self) -> AuctionResult<()> {
        self.ensure_no_sale()?;
        match self.phase {
            Phase::Bidding => Ok(()),
            Phase::Idle => Err(AuctionError::InvalidState("no player is staged".into())),
            Phase::Sold => Err(AuctionError::InvalidState("the player is already sold".into())),
        }
    }

    /// A team moving the bid up by `increment` must still be able to pay
    /// the current bid plus at least the minimum increment.
    fn affordable(&self, team: &Team, increment: i64) -> AuctionResult<i64> {
        let required = self.current_bid + increment.max(self.rules.min_increment);
        if team.remaining_budget < required {
            return Err(AuctionError::InsufficientFunds {
                attempted: required,
                available: team.remaining_budget,
            });
        }
        Ok(self.current_bid + increment)
    }

    fn accept(&mut self, leader: Team, bid: i64) {
        self.leader = Some(leader);
        self.current_bid = bid;
        self.countdown = self.rules.countdown_secs;
    }

    fn reset_to_idle(&mut self) {
        self.phase = Phase::Idle;
        self.staged = None;
        self.leader = None;
        self.current_bid = 0;
        self.countdown = self.rules.countdown_secs;
    }
}

/// First Unsold player in list order, optionally skipping one id.
pub fn next_unsold(players: &[Player], exclude: Option<i64>) -> Option<&Player> {
    players
        .iter()
        .find(|p| p.status == PlayerStatus::Unsold && Some(p.id) != exclude)
}
