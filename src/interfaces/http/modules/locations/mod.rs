//! Locations module: listing, lot grid, spot reads and booking

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
