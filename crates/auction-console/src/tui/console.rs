// Operator console view.
//
// Mirrors the controller's `ConsoleSnapshot` plus a little local state (pool
// cursor, custom raise amount, message line) and renders the bidding desk.

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use ratatui::layout::Constraint;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table};
use ratatui::Frame;
use tokio::sync::mpsc;
use tracing::{debug, info};

use auction_core::config::BidRules;
use auction_core::controller::{ConsoleSnapshot, ConsoleUpdate, OperatorCommand};
use auction_core::model::{Player, PlayerStatus, Team};
use auction_core::session::Phase;

use super::layout::{build_layout, ConsoleLayout};
use super::{format_amount, init_terminal, input, render_tick};

// ---------------------------------------------------------------------------
// ConsoleView
// ---------------------------------------------------------------------------

/// Content of the message line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Rejected(String),
    Sold(String),
}

pub struct ConsoleView {
    pub rules: BidRules,
    /// Latest state from the controller; `None` until the first push.
    pub snapshot: Option<ConsoleSnapshot>,
    /// Amount used by the custom raise key.
    pub custom_amount: i64,
    /// Index into the Unsold pool.
    pub cursor: usize,
    pub message: Option<Notice>,
}

impl ConsoleView {
    pub fn new(rules: BidRules) -> Self {
        let custom_amount = rules.custom_increment.min;
        ConsoleView {
            rules,
            snapshot: None,
            custom_amount,
            cursor: 0,
            message: None,
        }
    }

    pub fn teams(&self) -> &[Team] {
        self.snapshot
            .as_ref()
            .map(|s| s.teams.as_slice())
            .unwrap_or(&[])
    }

    /// Players that can be staged, in pool order.
    pub fn pool(&self) -> Vec<&Player> {
        self.snapshot
            .as_ref()
            .map(|s| {
                s.players
                    .iter()
                    .filter(|p| p.status == PlayerStatus::Unsold)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn selected_player(&self) -> Option<&Player> {
        self.pool().get(self.cursor).copied()
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.pool().len();
        if len == 0 {
            self.cursor = 0;
            return;
        }
        self.cursor = self.cursor.saturating_add_signed(delta).min(len - 1);
    }

    /// Move the custom raise by `steps` grid steps, staying inside the range.
    pub fn adjust_custom(&mut self, steps: i64) {
        let range = &self.rules.custom_increment;
        self.custom_amount = range.clamp(self.custom_amount + steps * range.step);
    }

    /// Whether `team` could take the lead at the next minimum increment.
    pub fn can_bid(&self, team: &Team) -> bool {
        let Some(snapshot) = &self.snapshot else {
            return false;
        };
        let auction = &snapshot.auction;
        let leads = auction.leading_team.as_ref().is_some_and(|t| t.id == team.id);
        snapshot.phase == Phase::Bidding
            && !leads
            && team.remaining_budget >= auction.current_bid + self.rules.min_increment
    }

    pub fn apply_update(&mut self, update: ConsoleUpdate) {
        match update {
            ConsoleUpdate::State(snapshot) => {
                self.snapshot = Some(*snapshot);
                let len = self.pool().len();
                self.cursor = self.cursor.min(len.saturating_sub(1));
            }
            ConsoleUpdate::Rejected(reason) => {
                debug!("Command rejected: {reason}");
                self.message = Some(Notice::Rejected(reason));
            }
            ConsoleUpdate::Sold(announcement) => {
                self.message = Some(Notice::Sold(format!(
                    "SOLD! {} to {} for {}",
                    announcement.player.name,
                    announcement.team.name,
                    format_amount(announcement.amount)
                )));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render_frame(frame: &mut Frame, view: &ConsoleView) {
    let layout = build_layout(frame.area());

    render_status_bar(frame, &layout, view);
    render_auction_panel(frame, &layout, view);
    render_teams(frame, &layout, view);
    render_pool(frame, &layout, view);
    render_message(frame, &layout, view);
    render_help_bar(frame, &layout, view);
}

fn phase_label(phase: Phase) -> (&'static str, Color) {
    match phase {
        Phase::Idle => ("IDLE", Color::Gray),
        Phase::Bidding => ("BIDDING", Color::Green),
        Phase::Sold => ("SOLD", Color::Yellow),
    }
}

fn render_status_bar(frame: &mut Frame, layout: &ConsoleLayout, view: &ConsoleView) {
    let mut spans = Vec::new();

    match &view.snapshot {
        None => spans.push(Span::styled(
            " Loading auction data...",
            Style::default().fg(Color::White),
        )),
        Some(snapshot) => {
            let (label, color) = phase_label(snapshot.phase);
            spans.push(Span::styled(
                format!(" {label} "),
                Style::default().fg(Color::Black).bg(color).add_modifier(Modifier::BOLD),
            ));
            let sold = snapshot
                .players
                .iter()
                .filter(|p| p.status == PlayerStatus::Sold)
                .count();
            spans.push(Span::styled(
                format!(" {sold}/{} sold", snapshot.players.len()),
                Style::default().fg(Color::White),
            ));
            if snapshot.sale_in_flight {
                spans.push(Span::styled(
                    " | selling...",
                    Style::default().fg(Color::Yellow),
                ));
            }
            if let Some(banner) = &snapshot.banner {
                spans.push(Span::styled(
                    format!(" | {banner}"),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ));
            }
        }
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, layout.status_bar);
}

fn render_auction_panel(frame: &mut Frame, layout: &ConsoleLayout, view: &ConsoleView) {
    let block = Block::default().borders(Borders::ALL).title("On the Block");
    let area = layout.auction_panel;

    let Some(snapshot) = &view.snapshot else {
        frame.render_widget(Paragraph::new("").block(block), area);
        return;
    };
    let auction = &snapshot.auction;

    let Some(player) = &auction.staged_player else {
        let hint = if view.pool().is_empty() {
            "No Unsold players left."
        } else {
            "No player staged. Press n to stage the next player."
        };
        frame.render_widget(Paragraph::new(hint).block(block), area);
        return;
    };

    let leader = auction
        .leading_team
        .as_ref()
        .map_or("--".to_string(), |t| t.name.clone());
    let lines = vec![
        Line::from(vec![
            Span::styled(
                player.name.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(
                "  {} {}  base {}",
                player.role.as_str(),
                player.style.as_deref().unwrap_or(""),
                format_amount(player.base_price)
            )),
        ]),
        Line::from(vec![
            Span::raw("Bid: "),
            Span::styled(
                format_amount(auction.current_bid),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("  Leader: {leader}")),
            Span::raw(format!(
                "  Custom raise: {}",
                format_amount(view.custom_amount)
            )),
        ]),
    ];

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let text_area = ratatui::layout::Rect { height: inner.height.saturating_sub(1), ..inner };
    frame.render_widget(Paragraph::new(lines), text_area);

    if inner.height > 0 {
        let gauge_area = ratatui::layout::Rect {
            y: inner.y + inner.height - 1,
            height: 1,
            ..inner
        };
        let (label, ratio, color) = if auction.is_sold {
            ("SOLD".to_string(), 1.0, Color::Yellow)
        } else {
            let window = view.rules.countdown_secs.max(1);
            (
                format!("{}s", auction.countdown),
                f64::from(auction.countdown.min(window)) / f64::from(window),
                if auction.countdown <= 10 { Color::Red } else { Color::Green },
            )
        };
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(color))
            .ratio(ratio)
            .label(label);
        frame.render_widget(gauge, gauge_area);
    }
}

fn render_teams(frame: &mut Frame, layout: &ConsoleLayout, view: &ConsoleView) {
    let header = Row::new(vec![
        Cell::from("#"),
        Cell::from("Team"),
        Cell::from("Remaining"),
        Cell::from("Players"),
    ])
    .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD));

    let leader_id = view
        .snapshot
        .as_ref()
        .and_then(|s| s.auction.leading_team.as_ref())
        .map(|t| t.id);

    let rows: Vec<Row> = if view.teams().is_empty() {
        vec![Row::new(vec![Cell::from(""), Cell::from("No teams registered")])]
    } else {
        view.teams()
            .iter()
            .enumerate()
            .map(|(i, team)| {
                let key = if i < 9 { format!("{}", i + 1) } else { String::new() };
                let style = if Some(team.id) == leader_id {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else if view.can_bid(team) {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                Row::new(vec![
                    Cell::from(key),
                    Cell::from(team.name.clone()),
                    Cell::from(format_amount(team.remaining_budget)),
                    Cell::from(format!("{}", team.players.len())),
                ])
                .style(style)
            })
            .collect()
    };

    let widths = [
        Constraint::Length(2),
        Constraint::Min(14),
        Constraint::Length(12),
        Constraint::Length(7),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Teams"));
    frame.render_widget(table, layout.teams);
}

fn render_pool(frame: &mut Frame, layout: &ConsoleLayout, view: &ConsoleView) {
    let pool = view.pool();
    let rows: Vec<Row> = pool
        .iter()
        .enumerate()
        .map(|(i, player)| {
            let style = if i == view.cursor {
                Style::default().fg(Color::Black).bg(Color::White)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(player.name.clone()),
                Cell::from(player.role.as_str()),
                Cell::from(format_amount(player.base_price)),
            ])
            .style(style)
        })
        .collect();

    let widths = [Constraint::Min(14), Constraint::Length(14), Constraint::Length(10)];
    let table = Table::new(rows, widths).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Pool ({})", pool.len())),
    );
    frame.render_widget(table, layout.pool);
}

fn render_message(frame: &mut Frame, layout: &ConsoleLayout, view: &ConsoleView) {
    let line = match &view.message {
        None => Line::from(""),
        Some(Notice::Rejected(text)) => Line::from(Span::styled(
            format!(" {text}"),
            Style::default().fg(Color::Red),
        )),
        Some(Notice::Sold(text)) => Line::from(Span::styled(
            format!(" {text}"),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
    };
    frame.render_widget(Paragraph::new(line), layout.message);
}

fn render_help_bar(frame: &mut Frame, layout: &ConsoleLayout, view: &ConsoleView) {
    let quick: Vec<String> = input::QUICK_KEYS
        .iter()
        .zip(&view.rules.quick_increments)
        .map(|(key, amount)| format!("{key}:+{}", format_amount(*amount)))
        .collect();
    let text = format!(
        " n:Next | Space:Stage | 1-9:Bid | {} | +/-/c:Custom | s:Sell | p:Pass | Enter:Advance | r:Refresh | Ctrl+C:Quit",
        quick.join(" ")
    );
    let paragraph = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(Color::White).add_modifier(Modifier::DIM),
    )))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, layout.help_bar);
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

/// Run the operator console until Ctrl+C or until the controller goes away.
pub async fn run(
    mut ui_rx: mpsc::Receiver<ConsoleUpdate>,
    cmd_tx: mpsc::Sender<OperatorCommand>,
    rules: BidRules,
) -> anyhow::Result<()> {
    let mut terminal = init_terminal();
    let mut view = ConsoleView::new(rules);
    let mut event_stream = EventStream::new();
    let mut render_tick = render_tick();

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(update) => view.apply_update(update),
                    None => {
                        info!("Controller closed the update channel");
                        break;
                    }
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(command) = input::handle_key(key_event, &mut view) {
                            let quit = command == OperatorCommand::Quit;
                            let _ = cmd_tx.send(command).await;
                            if quit {
                                break;
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }

            _ = render_tick.tick() => {
                terminal.draw(|frame| render_frame(frame, &view))?;
            }
        }
    }

    ratatui::restore();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
