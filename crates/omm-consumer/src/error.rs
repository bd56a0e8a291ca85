// crates/omm-consumer/src/error.rs

use omm_core::{Msg, State};
use thiserror::Error;

/// Ways a conversation with the provider can go wrong.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("connection to {0} closed by the provider")]
    ConnectionClosed(String),

    #[error("login rejected: {0}")]
    LoginRejected(State),

    #[error("dictionary {name} unavailable: {state}")]
    DictionaryUnavailable { name: String, state: State },

    #[error("unexpected {class} on stream {stream_id}")]
    UnexpectedMsg { class: &'static str, stream_id: i32 },
}

impl ConsumerError {
    pub fn unexpected(msg: &Msg) -> Self {
        ConsumerError::UnexpectedMsg {
            class: msg.class_name(),
            stream_id: msg.stream_id(),
        }
    }
}
