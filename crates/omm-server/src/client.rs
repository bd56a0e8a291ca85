//! Per-connection I/O.
//!
//! The reader half decodes `u32`-framed RWF messages and forwards them to
//! the provider task. A writer task encodes whatever the provider routes
//! to this client. A frame that does not decode ends the connection.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use omm_codec::{decode_msg, encode_frame, split_frame};
use omm_core::{DataDictionary, Msg};

use crate::types::{ClientId, ClientRegistry, OutboundRx, ProviderRequest, ProviderTx};

/// Run the client I/O loop for a single connection.
pub async fn run_client(
    client_id: ClientId,
    stream: TcpStream,
    provider_tx: ProviderTx,
    out_rx: OutboundRx,
    clients: ClientRegistry,
    dictionary: Arc<DataDictionary>,
) -> Result<()> {
    stream.set_nodelay(true)?;
    let (read_stream, write_stream) = stream.into_split();

    let writer_handle = tokio::spawn(run_writer(client_id, write_stream, out_rx));

    let result = run_reader(client_id, read_stream, &provider_tx, &dictionary).await;

    // Dropping the registry entry closes the outbound channel, which ends
    // the writer once it has flushed what is queued.
    clients.remove(&client_id);
    if let Err(e) = writer_handle.await {
        warn!("Client {} writer task failed: {}", client_id.0, e);
    }

    result
}

async fn run_reader(
    client_id: ClientId,
    mut read_stream: OwnedReadHalf,
    provider_tx: &ProviderTx,
    dictionary: &DataDictionary,
) -> Result<()> {
    let mut buffer = BytesMut::with_capacity(64 * 1024);

    loop {
        while let Some(frame) = split_frame(&mut buffer)
            .with_context(|| format!("client {} sent a bad frame", client_id.0))?
        {
            let msg = match decode_msg(&frame, Some(dictionary)) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Client {} decode error: {}, dropping client", client_id.0, e);
                    return Ok(());
                }
            };
            debug!(
                "Client {} -> {} stream {}",
                client_id.0,
                msg.class_name(),
                msg.stream_id()
            );

            if provider_tx.send(ProviderRequest { client_id, msg }).is_err() {
                warn!("Provider channel closed");
                return Ok(());
            }
        }

        let n = read_stream.read_buf(&mut buffer).await?;
        if n == 0 {
            debug!("Client {} closed the connection", client_id.0);
            return Ok(());
        }
    }
}

async fn run_writer(client_id: ClientId, mut write_stream: OwnedWriteHalf, mut out_rx: OutboundRx) {
    let mut buffer = BytesMut::with_capacity(64 * 1024);

    while let Some(msg) = out_rx.recv().await {
        if let Err(e) = write_message(&mut write_stream, &mut buffer, &msg).await {
            warn!("Client {} write error: {:?}", client_id.0, e);
            break;
        }
    }
}

async fn write_message(stream: &mut OwnedWriteHalf, buffer: &mut BytesMut, msg: &Msg) -> Result<()> {
    buffer.clear();
    encode_frame(msg, buffer).with_context(|| format!("encoding {}", msg.class_name()))?;

    stream.write_all(&buffer[..]).await?;
    stream.flush().await?;
    Ok(())
}
