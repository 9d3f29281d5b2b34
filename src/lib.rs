//! Daily pollen forecast bot.
//!
//! Fetches the pollen.com forecast for Astoria, NY, and when today's index is
//! worth mentioning posts a short summary to every configured target.

pub mod config;
pub mod constants;
pub mod error;
pub mod forecast;
pub mod formatters;
pub mod models;
pub mod params;
pub mod pipeline;
pub mod publisher;
pub mod retry;
pub mod targets;

pub use config::Config;
pub use error::PollenError;
pub use pipeline::{Pipeline, RunOutcome};
