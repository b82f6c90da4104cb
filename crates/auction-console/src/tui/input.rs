// Keyboard input for the operator console.
//
// Translates crossterm key events into `OperatorCommand`s for the
// controller, or into local `ConsoleView` changes (pool cursor, custom raise
// amount, clearing the message line).

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use auction_core::controller::OperatorCommand;
use auction_core::session::BidStep;

use super::console::ConsoleView;

/// Keys for the quick raises, in the order of the configured increments.
pub const QUICK_KEYS: [char; 3] = ['q', 'w', 'e'];

/// Handle one key event. Returns the command to forward, if any.
pub fn handle_key(key_event: KeyEvent, view: &mut ConsoleView) -> Option<OperatorCommand> {
    // crossterm reports releases on some platforms
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    if key_event.modifiers.contains(KeyModifiers::CONTROL) && key_event.code == KeyCode::Char('c')
    {
        return Some(OperatorCommand::Quit);
    }

    match key_event.code {
        KeyCode::Char('n') => Some(OperatorCommand::StageNext),
        KeyCode::Char(' ') => view
            .selected_player()
            .map(|player| OperatorCommand::Stage(player.id)),

        KeyCode::Char(d @ '1'..='9') => {
            let index = d as usize - '1' as usize;
            view.teams()
                .get(index)
                .map(|team| OperatorCommand::Bid { team_id: team.id })
        }

        KeyCode::Char(c) if QUICK_KEYS.contains(&c) => {
            let index = QUICK_KEYS.iter().position(|k| *k == c)?;
            view.rules
                .quick_increments
                .get(index)
                .map(|amount| OperatorCommand::Raise(BidStep::Quick(*amount)))
        }

        KeyCode::Char('+') | KeyCode::Char('=') => {
            view.adjust_custom(1);
            None
        }
        KeyCode::Char('-') => {
            view.adjust_custom(-1);
            None
        }
        KeyCode::Char('c') => Some(OperatorCommand::Raise(BidStep::Custom(view.custom_amount))),

        KeyCode::Char('s') => Some(OperatorCommand::Sell),
        KeyCode::Char('p') => Some(OperatorCommand::Pass),
        KeyCode::Enter => Some(OperatorCommand::Advance),
        KeyCode::Char('r') => Some(OperatorCommand::Refresh),

        KeyCode::Up | KeyCode::Char('k') => {
            view.move_cursor(-1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            view.move_cursor(1);
            None
        }

        KeyCode::Esc => {
            view.message = None;
            None
        }

        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
