//! Maintdash - a maintenance management dashboard
//!
//! This crate tracks equipment across a site and location hierarchy,
//! schedules and records maintenance work, keeps a calendar of events
//! and serves an aggregated dashboard over a JSON API.

pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod permission;
pub mod routes;
pub mod service;
pub mod state;
pub mod task;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
