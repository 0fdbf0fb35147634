//! HTTP API for the Stridelink server.
//!
//! Exposes the authorization flow endpoints consumed by the browser and
//! the bearer-authenticated activity API consumed by the frontend.

pub mod handlers;
pub mod server;
pub mod types;

pub use server::{router, ApiState};
pub use types::*;
