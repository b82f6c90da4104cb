// Terminal views: the operator console and the projector display.
//
// Both views keep a local state struct that is replaced or patched by
// messages from their feed (controller updates or broadcast snapshots) and
// re-render at ~30 fps.

pub mod console;
pub mod input;
pub mod layout;
pub mod projector;

use std::time::Duration;

use ratatui::DefaultTerminal;

/// Render interval for both views.
pub const RENDER_INTERVAL: Duration = Duration::from_millis(33);

/// Enter raw mode and the alternate screen, and make sure a panic restores
/// the terminal before the default hook prints.
fn init_terminal() -> DefaultTerminal {
    let terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        ratatui::restore();
        original_hook(panic_info);
    }));

    terminal
}

fn render_tick() -> tokio::time::Interval {
    let mut tick = tokio::time::interval(RENDER_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tick
}

/// Format a currency amount with thousands separators, e.g. `1,250,000`.
pub fn format_amount(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_amount_groups_thousands() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(999), "999");
        assert_eq!(format_amount(1_000), "1,000");
        assert_eq!(format_amount(750_000), "750,000");
        assert_eq!(format_amount(12_500_000), "12,500,000");
        assert_eq!(format_amount(-100_000), "-100,000");
    }
}
