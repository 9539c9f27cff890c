//! HTTP REST API interfaces
//!
//! - `common`: response envelope, error mapping, validated extractors
//! - `middleware`: bearer-token identity
//! - `modules`: handlers grouped by resource
//! - `router`: API router with Swagger documentation

pub mod common;
pub mod middleware;
pub mod modules;
pub mod router;

pub use router::{create_api_router, ApiServices};
