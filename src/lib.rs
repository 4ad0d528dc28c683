//! Profile gateway for the UBA baseline engine.
//!
//! Proxies profile CRUD to the remote baseline engine, falling back to a
//! local Postgres copy when the engine is unavailable, and reshapes the
//! engine's per-user analytics for the dashboard.

pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod output;
pub mod payload;
pub mod schema;
pub mod serve;
pub mod simulate;
pub mod store;
pub mod translate;
pub mod users;
