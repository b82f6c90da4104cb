// Operator console layout.
//
// +--------------------------------------------------+
// | Status Bar (1 row)                                |
// +--------------------------------------------------+
// | Auction Panel (6 rows)                            |
// +-------------------------+------------------------+
// | Teams (55%)              | Player Pool (45%)      |
// +-------------------------+------------------------+
// | Message Line (1 row)                              |
// | Help Bar (1 row)                                  |
// +--------------------------------------------------+

use ratatui::layout::{Constraint, Direction, Layout, Rect};

#[derive(Debug, Clone)]
pub struct ConsoleLayout {
    /// Phase, countdown and the backend error banner.
    pub status_bar: Rect,
    /// Staged player, current bid and leader.
    pub auction_panel: Rect,
    pub teams: Rect,
    /// Unsold players with the selection cursor.
    pub pool: Rect,
    /// Last rejection or sale announcement.
    pub message: Rect,
    pub help_bar: Rect,
}

pub fn build_layout(area: Rect) -> ConsoleLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Length(6), // auction panel
            Constraint::Min(6),    // teams + pool
            Constraint::Length(1), // message
            Constraint::Length(1), // help bar
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(vertical[2]);

    ConsoleLayout {
        status_bar: vertical[0],
        auction_panel: vertical[1],
        teams: horizontal[0],
        pool: horizontal[1],
        message: vertical[3],
        help_bar: vertical[4],
    }
}
