// crates/omm-consumer/src/network.rs

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::BytesMut;
use futures::stream::{self, Stream};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use omm_codec::{
    decode_enum_type_dictionary, decode_field_dictionary, decode_msg, encode_frame, split_frame,
    verbosity, ENUM_DICTIONARY_NAME, FIELD_DICTIONARY_NAME,
};
use omm_core::{domain, Data, DataDictionary, Msg, MsgKey, RefreshMsg, RequestMsg, StreamState};

use crate::error::ConsumerError;

/// Stream id the login is opened on. Item streams start after it.
pub const LOGIN_STREAM_ID: i32 = 1;

pub struct OmmConnection {
    server_addr: String,
    stream: TcpStream,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
    dictionary: Option<Arc<DataDictionary>>,
    next_stream_id: i32,
}

impl OmmConnection {
    pub async fn connect(server_addr: &str) -> Result<Self> {
        info!("Connecting to {}...", server_addr);
        let stream = TcpStream::connect(server_addr)
            .await
            .with_context(|| format!("connecting to {}", server_addr))?;
        stream.set_nodelay(true)?;
        info!("Connected");

        Ok(Self {
            server_addr: server_addr.to_string(),
            stream,
            read_buffer: BytesMut::with_capacity(65536),
            write_buffer: BytesMut::with_capacity(65536),
            dictionary: None,
            next_stream_id: LOGIN_STREAM_ID + 1,
        })
    }

    /// Dictionary used to type FieldList entries of received messages.
    pub fn set_dictionary(&mut self, dictionary: Arc<DataDictionary>) {
        self.dictionary = Some(dictionary);
    }

    pub fn dictionary(&self) -> Option<&Arc<DataDictionary>> {
        self.dictionary.as_ref()
    }

    /// Local IPv4 address as carried in `PostUserInfo`, 0 when not IPv4.
    pub fn local_address(&self) -> u32 {
        match self.stream.local_addr() {
            Ok(SocketAddr::V4(addr)) => u32::from(*addr.ip()),
            _ => 0,
        }
    }

    pub fn next_stream_id(&mut self) -> i32 {
        let id = self.next_stream_id;
        self.next_stream_id += 1;
        id
    }

    pub async fn send(&mut self, msg: &Msg) -> Result<()> {
        self.write_buffer.clear();
        encode_frame(msg, &mut self.write_buffer)
            .with_context(|| format!("encoding {}", msg.class_name()))?;

        self.stream.write_all(&self.write_buffer[..]).await?;
        self.stream.flush().await?;

        debug!("Sent {} on stream {}", msg.class_name(), msg.stream_id());
        Ok(())
    }

    /// Next message from the provider; `None` once the connection closes.
    pub async fn recv(&mut self) -> Result<Option<Msg>> {
        loop {
            if let Some(frame) = split_frame(&mut self.read_buffer)? {
                let msg = decode_msg(&frame, self.dictionary.as_deref())?;
                debug!("Received {} on stream {}", msg.class_name(), msg.stream_id());
                return Ok(Some(msg));
            }

            let n = self.stream.read_buf(&mut self.read_buffer).await?;
            if n == 0 {
                return Ok(None);
            }
        }
    }

    /// Like `recv`, but a closed connection is an error.
    pub async fn expect_msg(&mut self) -> Result<Msg> {
        match self.recv().await? {
            Some(msg) => Ok(msg),
            None => Err(ConsumerError::ConnectionClosed(self.server_addr.clone()).into()),
        }
    }

    /// Open the login stream and wait for it to be accepted.
    pub async fn login(&mut self, user: &str) -> Result<RefreshMsg> {
        let req = RequestMsg {
            stream_id: LOGIN_STREAM_ID,
            domain_type: domain::LOGIN,
            key: MsgKey::named(user).with_name_type(1),
            streaming: true,
            ..Default::default()
        };
        self.send(&req.into()).await?;

        loop {
            match self.expect_msg().await? {
                Msg::Refresh(refresh) if refresh.stream_id == LOGIN_STREAM_ID => {
                    if refresh.state.stream_state != StreamState::Open {
                        return Err(ConsumerError::LoginRejected(refresh.state).into());
                    }
                    info!("Logged in as '{}'", user);
                    return Ok(refresh);
                }
                Msg::Status(status) if status.stream_id == LOGIN_STREAM_ID => {
                    let state = status.state.unwrap_or_default();
                    return Err(ConsumerError::LoginRejected(state).into());
                }
                other => debug!("Ignoring {} before login", other.class_name()),
            }
        }
    }

    /// Fetch both dictionaries over the Dictionary domain.
    pub async fn download_dictionary(&mut self, service_id: u16) -> Result<DataDictionary> {
        let mut dictionary = DataDictionary::new();

        for (name, level) in [
            (FIELD_DICTIONARY_NAME, verbosity::NORMAL),
            (ENUM_DICTIONARY_NAME, verbosity::VERBOSE),
        ] {
            let stream_id = self.next_stream_id();
            let req = RequestMsg {
                stream_id,
                domain_type: domain::DICTIONARY,
                key: MsgKey::named(name)
                    .with_service_id(service_id)
                    .with_filter(level),
                ..Default::default()
            };
            self.send(&req.into()).await?;

            // Multi-part refreshes keep coming until one is marked complete.
            loop {
                match self.expect_msg().await? {
                    Msg::Refresh(refresh) if refresh.stream_id == stream_id => {
                        let series = match &refresh.payload {
                            Data::Series(series) => series,
                            _ => {
                                return Err(ConsumerError::UnexpectedMsg {
                                    class: "RefreshMsg",
                                    stream_id,
                                }
                                .into())
                            }
                        };
                        if name == FIELD_DICTIONARY_NAME {
                            decode_field_dictionary(series, &mut dictionary)?;
                        } else {
                            decode_enum_type_dictionary(series, &mut dictionary)?;
                        }
                        if refresh.complete {
                            break;
                        }
                    }
                    Msg::Status(status) if status.stream_id == stream_id => {
                        return Err(ConsumerError::DictionaryUnavailable {
                            name: name.to_string(),
                            state: status.state.unwrap_or_default(),
                        }
                        .into());
                    }
                    other => debug!("Ignoring {} during dictionary download", other.class_name()),
                }
            }
        }

        info!(
            "Downloaded dictionary: {} fields, {} enum tables",
            dictionary.number_of_entries(),
            dictionary.enum_tables().len()
        );
        Ok(dictionary)
    }

    /// Everything the provider sends from now on, as a stream. The stream
    /// ends when the connection closes or after the first error.
    pub fn into_messages(self) -> impl Stream<Item = Result<Msg>> {
        stream::unfold(Some(self), |state| async move {
            let mut conn = state?;
            match conn.recv().await {
                Ok(Some(msg)) => Some((Ok(msg), Some(conn))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
