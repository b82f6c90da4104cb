// Projector view: a read-only big-screen display of the live auction.
//
// Each broadcast snapshot replaces the displayed state wholesale. Entering
// the sold state raises the celebration flag once per sale.

use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use futures_util::StreamExt;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Frame;
use tokio::sync::mpsc;
use tracing::{info, warn};

use auction_core::broadcast::{AuctionSnapshot, BroadcastMessage};
use auction_core::hub;

use super::{format_amount, init_terminal, render_tick};

/// Pause between attempts to reach the broadcast hub.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// ProjectorState
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ProjectorState {
    /// `None` until the first broadcast arrives.
    pub snapshot: Option<AuctionSnapshot>,
    pub celebrating: bool,
}

impl ProjectorState {
    /// Replace the displayed state. Returns `true` when this snapshot is the
    /// one that entered the sold state.
    pub fn apply(&mut self, message: BroadcastMessage) -> bool {
        let BroadcastMessage::Update(next) = message;

        let was_sold_same_player = self.snapshot.as_ref().is_some_and(|prev| {
            prev.is_sold
                && prev.staged_player.as_ref().map(|p| p.id)
                    == next.staged_player.as_ref().map(|p| p.id)
        });
        let entered_sold = next.is_sold && !was_sold_same_player;

        if entered_sold {
            self.celebrating = true;
        } else if !next.is_sold {
            self.celebrating = false;
        }
        self.snapshot = Some(next);
        entered_sold
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render_frame(frame: &mut Frame, state: &ProjectorState, window_secs: u32) {
    let area = frame.area();
    let border_color = if state.celebrating { Color::Yellow } else { Color::Cyan };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(
            " LIVE AUCTION ",
            Style::default().fg(border_color).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(snapshot) = &state.snapshot else {
        render_centered(frame, inner, "Waiting for the auction to start...", Color::Gray);
        return;
    };
    let Some(player) = &snapshot.staged_player else {
        render_centered(frame, inner, "Next player coming up...", Color::Gray);
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // player
            Constraint::Length(3), // bid
            Constraint::Length(2), // leader
            Constraint::Min(1),    // banner
            Constraint::Length(1), // countdown
        ])
        .split(inner);

    let player_lines = vec![
        Line::from(Span::styled(
            player.name.to_uppercase(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!(
            "{}  {}",
            player.role.as_str(),
            player.style.as_deref().unwrap_or("")
        )),
        Line::from(format!("Base price {}", format_amount(player.base_price))),
    ];
    frame.render_widget(
        Paragraph::new(player_lines).alignment(Alignment::Center),
        rows[0],
    );

    let bid = Paragraph::new(vec![
        Line::from("CURRENT BID"),
        Line::from(Span::styled(
            format_amount(snapshot.current_bid),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(bid, rows[1]);

    let leader = snapshot
        .leading_team
        .as_ref()
        .map_or("No bids yet".to_string(), |t| format!("Leading: {}", t.name));
    frame.render_widget(
        Paragraph::new(leader).alignment(Alignment::Center),
        rows[2],
    );

    if snapshot.is_sold {
        let buyer = snapshot
            .leading_team
            .as_ref()
            .map_or(String::new(), |t| format!(" TO {}", t.name.to_uppercase()));
        let style = if state.celebrating {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        };
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(format!(" SOLD{buyer}! "), style)))
                .alignment(Alignment::Center),
            rows[3],
        );
    } else {
        let window = window_secs.max(1);
        let color = if snapshot.countdown <= 10 { Color::Red } else { Color::Green };
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(color))
            .ratio(f64::from(snapshot.countdown.min(window)) / f64::from(window))
            .label(format!("{}s", snapshot.countdown));
        frame.render_widget(gauge, rows[4]);
    }
}

fn render_centered(frame: &mut Frame, area: Rect, text: &str, color: Color) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);
    let paragraph = Paragraph::new(Span::styled(text.to_string(), Style::default().fg(color)))
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, vertical[1]);
}

// ---------------------------------------------------------------------------
// Feed and main loop
// ---------------------------------------------------------------------------

/// Keep a connection to the broadcast hub at `url`, reconnecting after
/// failures, until the view drops its receiver.
pub async fn follow_hub(url: String, tx: mpsc::Sender<BroadcastMessage>) {
    loop {
        match hub::subscribe_remote(&url, tx.clone()).await {
            Ok(()) => info!("Broadcast hub connection closed"),
            Err(e) => warn!("Cannot reach broadcast hub at {url}: {e}"),
        }
        if tx.is_closed() {
            break;
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Run the projector view until q, Esc or Ctrl+C.
pub async fn run(mut rx: mpsc::Receiver<BroadcastMessage>, window_secs: u32) -> anyhow::Result<()> {
    let mut terminal = init_terminal();
    let mut state = ProjectorState::default();
    let mut event_stream = EventStream::new();
    let mut render_tick = render_tick();

    loop {
        tokio::select! {
            message = rx.recv() => {
                match message {
                    Some(message) => {
                        if state.apply(message) {
                            info!("Sale shown on projector");
                        }
                    }
                    None => break,
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        let ctrl_c = key.code == KeyCode::Char('c')
                            && key.modifiers.contains(KeyModifiers::CONTROL);
                        if ctrl_c || matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }

            _ = render_tick.tick() => {
                terminal.draw(|frame| render_frame(frame, &state, window_secs))?;
            }
        }
    }

    ratatui::restore();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
