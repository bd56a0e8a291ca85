//! Listener and wiring for the provider.
//!
//! One task per accepted connection does framing and decoding. A single
//! provider task owns the item store; clients reach it over an unbounded
//! channel and get replies through their entry in the `ClientRegistry`.
//! Connections past `max_clients` are closed as soon as they are accepted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::client;
use crate::config::Config;
use crate::provider::{self, Provider};
use crate::types::{ClientId, ClientRegistry, OutboundRx, OutboundTx, ProviderRx, ProviderTx};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_client_id() -> ClientId {
    let id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
    ClientId(id)
}

/// Bind the configured address and serve until the listener fails.
pub async fn run(config: Config) -> Result<()> {
    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Listening on {}", addr);

    serve(listener, config).await
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener, config: Config) -> Result<()> {
    let dictionary = Arc::new(config.load_dictionary()?);
    info!(
        "Dictionary loaded: {} fields, {} enum tables",
        dictionary.number_of_entries(),
        dictionary.enum_tables().len()
    );

    let clients: ClientRegistry = Arc::new(DashMap::new());

    let (provider_tx, provider_rx): (ProviderTx, ProviderRx) = mpsc::unbounded_channel();

    {
        let provider = Provider::new(&config, dictionary.clone());
        let clients = clients.clone();
        tokio::spawn(async move {
            provider::run_provider_loop(provider_rx, clients, provider).await;
        });
    }

    loop {
        let (stream, peer_addr) = listener.accept().await?;

        if clients.len() >= config.max_clients {
            warn!(
                "Rejecting connection from {}: max_clients ({}) reached",
                peer_addr, config.max_clients
            );
            continue;
        }

        let client_id = next_client_id();
        info!("Accepted connection {} from {}", client_id.0, peer_addr);

        let (out_tx, out_rx): (OutboundTx, OutboundRx) = mpsc::unbounded_channel();
        clients.insert(client_id, out_tx);

        let clients = clients.clone();
        let provider_tx = provider_tx.clone();
        let dictionary = dictionary.clone();

        tokio::spawn(async move {
            match client::run_client(client_id, stream, provider_tx, out_rx, clients, dictionary)
                .await
            {
                Ok(()) => info!("Client {} disconnected", client_id.0),
                Err(e) => warn!("Client {} error: {:#}", client_id.0, e),
            }
        });
    }
}
