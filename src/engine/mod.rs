//! Outbound access to the baseline engine.

mod client;
pub mod vpn;

pub use client::{
    AnomalyQuery, BaselineEngineClient, DeviationRequest, EngineError, HistoryFilters,
    ProfileFilters, ProfileView, UserView,
};
