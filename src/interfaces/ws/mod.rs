//! WebSocket interfaces
//!
//! - `live`: per-location stream of committed spot changes

pub mod live;

pub use live::{live_updates_handler, LiveState};
