//! Stridelink server library.
//!
//! Exposes the API router and configuration loading so integration
//! tests can assemble the service in-process.

pub mod api;
pub mod config;
