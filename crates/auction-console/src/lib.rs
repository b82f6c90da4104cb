// Terminal clients for a live auction: the operator console, which drives
// the auction session against the HTTP API and hosts the broadcast hub, and
// the projector view, which follows that hub.

pub mod client;
pub mod tui;
