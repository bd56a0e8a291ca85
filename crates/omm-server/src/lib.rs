//! omm-server
//!
//! Multi-client async TCP interactive provider speaking framed RWF.

pub mod config;
pub mod types;
pub mod item_store;
pub mod provider;
pub mod server;

// internal, not re-exported
mod client;
