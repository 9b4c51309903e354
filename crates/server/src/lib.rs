//! Magpie server: REST resources over the prediction orchestrator

pub mod api;
pub mod config;

pub use api::{create_router, serve, AppState};
pub use config::ServerConfig;
