//! Health module: store reachability and live-viewer counts

pub mod handlers;

pub use handlers::*;
