//! Shared types for the provider.
//!
//! This module defines:
//! - `ClientId`: a lightweight handle for connected clients
//! - channel aliases between clients and the provider loop
//! - `ProviderRequest`: decoded messages flowing from clients to the provider

use std::sync::Arc;

use dashmap::DashMap;
use omm_core::Msg;
use tokio::sync::mpsc;

/// Identifier for a connected client, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

/// Outbound messages from the provider to a given client.
pub type OutboundTx = mpsc::UnboundedSender<Msg>;
pub type OutboundRx = mpsc::UnboundedReceiver<Msg>;

/// Connected clients and their outbound channels.
pub type ClientRegistry = Arc<DashMap<ClientId, OutboundTx>>;

/// Message flowing from a client task into the central provider task.
#[derive(Debug)]
pub struct ProviderRequest {
    pub client_id: ClientId,
    pub msg: Msg,
}

/// Channel from clients to the provider task.
pub type ProviderTx = mpsc::UnboundedSender<ProviderRequest>;
pub type ProviderRx = mpsc::UnboundedReceiver<ProviderRequest>;
