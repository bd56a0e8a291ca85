//! Central provider loop.
//!
//! This task owns the `ItemStore` and processes every `ProviderRequest`
//! coming from clients.
//!
//! Routing policy:
//! - Refresh, Status, Ack and echoed Generic messages go only to the
//!   originating client, on the stream they were asked on.
//! - Updates produced by a post go to every subscriber of the item, each
//!   on its own stream id.

use std::sync::Arc;

use tracing::{debug, info, warn};

use omm_codec::{
    encode_enum_type_dictionary, encode_field_dictionary, verbosity, ENUM_DICTIONARY_NAME,
    FIELD_DICTIONARY_NAME,
};
use omm_core::{
    domain, AckMsg, CloseMsg, Data, DataDictionary, DataState, FieldList, Msg, MsgKey, NakCode,
    PostMsg, Qos, RefreshMsg, RequestMsg, State, StateCode, StatusMsg, StreamState, UpdateMsg,
};

use crate::config::Config;
use crate::item_store::{ItemStore, Subscription};
use crate::types::{ClientId, ClientRegistry, ProviderRequest, ProviderRx};

/// A reply addressed to one client.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub client_id: ClientId,
    pub msg: Msg,
}

impl Outbound {
    fn to(client_id: ClientId, msg: impl Into<Msg>) -> Self {
        Outbound {
            client_id,
            msg: msg.into(),
        }
    }
}

/// Request handling, independent of any I/O.
pub struct Provider {
    service_id: u16,
    service_name: String,
    dictionary: Arc<DataDictionary>,
    items: ItemStore,
}

impl Provider {
    pub fn new(config: &Config, dictionary: Arc<DataDictionary>) -> Self {
        let mut items = ItemStore::new();
        for name in &config.items {
            items.seed(name);
        }
        Provider {
            service_id: config.service_id,
            service_name: config.service_name.clone(),
            dictionary,
            items,
        }
    }

    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    /// Process one message from `client_id` and return the replies.
    pub fn handle(&mut self, client_id: ClientId, msg: Msg) -> Vec<Outbound> {
        match msg {
            Msg::Request(req) => self.on_request(client_id, req),
            Msg::Post(post) => self.on_post(client_id, post),
            Msg::Close(close) => {
                self.on_close(client_id, &close);
                Vec::new()
            }
            Msg::Generic(generic) => vec![Outbound::to(client_id, generic)],
            other => {
                debug!(
                    "Client {} sent {} on stream {}, ignoring",
                    client_id.0,
                    other.class_name(),
                    other.stream_id()
                );
                Vec::new()
            }
        }
    }

    /// Forget subscriptions held by clients that are gone.
    pub fn drop_disconnected(&mut self, clients: &ClientRegistry) {
        let removed = self.items.retain_clients(|c| clients.contains_key(&c));
        if removed > 0 {
            debug!("Dropped {} subscriptions of disconnected clients", removed);
        }
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    fn on_request(&mut self, client_id: ClientId, req: RequestMsg) -> Vec<Outbound> {
        let reply = match req.domain_type {
            domain::LOGIN => self.login_refresh(&req),
            domain::DICTIONARY => self.dictionary_refresh(&req),
            domain::MARKET_PRICE => self.item_request(client_id, &req),
            other => status_for(
                &req,
                State::new(StreamState::Closed, DataState::Suspect)
                    .with_code(StateCode::USAGE_ERROR)
                    .with_text(format!("Domain {} is not supported", domain::name(other))),
            ),
        };
        reply.map(|m| vec![Outbound::to(client_id, m)]).unwrap_or_default()
    }

    fn login_refresh(&self, req: &RequestMsg) -> Option<Msg> {
        let user = req.key.name.as_deref().unwrap_or("");
        info!("Login from '{}' on stream {}", user, req.stream_id);
        Some(
            RefreshMsg {
                stream_id: req.stream_id,
                domain_type: domain::LOGIN,
                key: Some(req.key.clone()),
                state: State::open_ok("Login accepted"),
                solicited: true,
                complete: true,
                ..Default::default()
            }
            .into(),
        )
    }

    fn dictionary_refresh(&self, req: &RequestMsg) -> Option<Msg> {
        let name = req.key.name.as_deref().unwrap_or("");
        let level = req.key.filter.unwrap_or(verbosity::NORMAL);
        let payload = match name {
            FIELD_DICTIONARY_NAME => encode_field_dictionary(&self.dictionary, level),
            ENUM_DICTIONARY_NAME => encode_enum_type_dictionary(&self.dictionary, level),
            _ => {
                return status_for(
                    req,
                    not_found(format!("Dictionary '{}' is not available", name)),
                )
            }
        };
        debug!("Sending dictionary {} at verbosity {:#x}", name, level);

        Some(
            RefreshMsg {
                stream_id: req.stream_id,
                domain_type: domain::DICTIONARY,
                key: Some(self.service_key(name).with_filter(level)),
                state: State::new(StreamState::NonStreaming, DataState::Ok),
                solicited: true,
                complete: true,
                payload: payload.into(),
                ..Default::default()
            }
            .into(),
        )
    }

    fn item_request(&mut self, client_id: ClientId, req: &RequestMsg) -> Option<Msg> {
        let name = match req.key.name.as_deref() {
            Some(name) => name,
            None => {
                return status_for(
                    req,
                    State::new(StreamState::Closed, DataState::Suspect)
                        .with_code(StateCode::USAGE_ERROR)
                        .with_text("Request has no item name"),
                )
            }
        };

        let image = match self.items.image(name) {
            Some(image) => image,
            None => {
                info!("Client {} requested unknown item '{}'", client_id.0, name);
                return status_for(req, not_found(format!("Item '{}' not found", name)));
            }
        };

        let state = if req.streaming {
            self.items.subscribe(
                name,
                Subscription {
                    client_id,
                    stream_id: req.stream_id,
                },
            );
            State::open_ok("")
        } else {
            State::new(StreamState::NonStreaming, DataState::Ok)
        };

        if req.no_refresh {
            return None;
        }

        Some(
            RefreshMsg {
                stream_id: req.stream_id,
                domain_type: domain::MARKET_PRICE,
                key: Some(self.service_key(name)),
                state,
                qos: Some(Qos::realtime_tick_by_tick()),
                solicited: true,
                complete: true,
                private_stream: req.private_stream,
                payload: image.into(),
                ..Default::default()
            }
            .into(),
        )
    }

    fn service_key(&self, name: &str) -> MsgKey {
        MsgKey::named(name).with_service_id(self.service_id)
    }

    // ------------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------------

    fn on_post(&mut self, client_id: ClientId, post: PostMsg) -> Vec<Outbound> {
        let name = post
            .key
            .as_ref()
            .and_then(|k| k.name.clone())
            .or_else(|| {
                self.items
                    .item_for_stream(client_id, post.stream_id)
                    .map(str::to_string)
            });

        let name = match name {
            Some(name) => name,
            None => {
                warn!("Client {} posted without an item name", client_id.0);
                return nak(client_id, &post, NakCode::SYMBOL_UNKNOWN, "No item to post to");
            }
        };

        let fields = match posted_fields(&post.payload) {
            Some(fields) => fields,
            None => {
                warn!(
                    "Client {} posted {} to '{}', expected field data",
                    client_id.0,
                    post.payload.data_type(),
                    name
                );
                return nak(client_id, &post, NakCode::INVALID_CONTENT, "Post carries no fields");
            }
        };

        if self.items.apply(&name, fields) {
            info!("Item '{}' created by post from client {}", name, client_id.0);
        }

        let mut out: Vec<Outbound> = self
            .items
            .subscribers(&name)
            .into_iter()
            .map(|sub| {
                Outbound::to(
                    sub.client_id,
                    UpdateMsg {
                        stream_id: sub.stream_id,
                        domain_type: domain::MARKET_PRICE,
                        post_user_info: Some(post.post_user_info),
                        payload: fields.clone().into(),
                        ..Default::default()
                    },
                )
            })
            .collect();
        debug!(
            "Post to '{}' fanned out to {} subscribers",
            name,
            out.len()
        );

        if post.ack {
            out.push(Outbound::to(
                client_id,
                AckMsg {
                    stream_id: post.stream_id,
                    domain_type: post.domain_type,
                    ack_id: post.post_id.unwrap_or(0),
                    seq_num: post.seq_num,
                    ..Default::default()
                },
            ));
        }
        out
    }

    fn on_close(&mut self, client_id: ClientId, close: &CloseMsg) {
        match self.items.unsubscribe(client_id, close.stream_id) {
            Some(name) => debug!(
                "Client {} closed stream {} ('{}')",
                client_id.0, close.stream_id, name
            ),
            None => debug!(
                "Client {} closed stream {} with no subscription",
                client_id.0, close.stream_id
            ),
        }
    }
}

/// FieldList carried by a post, either directly or inside an
/// Update/Refresh.
fn posted_fields(payload: &Data) -> Option<&FieldList> {
    match payload {
        Data::FieldList(fields) => Some(fields),
        Data::Msg(inner) => match inner.as_ref() {
            Msg::Update(UpdateMsg { payload, .. }) | Msg::Refresh(RefreshMsg { payload, .. }) => {
                payload.as_field_list()
            }
            _ => None,
        },
        _ => None,
    }
}

fn not_found(text: String) -> State {
    State::new(StreamState::ClosedRecover, DataState::Suspect)
        .with_code(StateCode::NOT_FOUND)
        .with_text(text)
}

fn status_for(req: &RequestMsg, state: State) -> Option<Msg> {
    Some(
        StatusMsg {
            stream_id: req.stream_id,
            domain_type: req.domain_type,
            key: Some(req.key.clone()),
            state: Some(state),
            ..Default::default()
        }
        .into(),
    )
}

fn nak(client_id: ClientId, post: &PostMsg, code: NakCode, text: &str) -> Vec<Outbound> {
    if !post.ack {
        return Vec::new();
    }
    vec![Outbound::to(
        client_id,
        AckMsg {
            stream_id: post.stream_id,
            domain_type: post.domain_type,
            ack_id: post.post_id.unwrap_or(0),
            nak_code: Some(code),
            text: Some(text.to_string()),
            seq_num: post.seq_num,
            ..Default::default()
        },
    )]
}

// ============================================================================
// Loop
// ============================================================================

/// Run the central provider processing loop.
///
/// - `provider_rx`: receives requests from all client tasks.
/// - `clients`: registry of connected clients and their outbound channels.
pub async fn run_provider_loop(
    mut provider_rx: ProviderRx,
    clients: ClientRegistry,
    mut provider: Provider,
) {
    info!(
        "Provider for service '{}' ({}) ready with {} items",
        provider.service_name,
        provider.service_id,
        provider.items.len()
    );

    while let Some(req) = provider_rx.recv().await {
        let ProviderRequest { client_id, msg } = req;

        if matches!(msg, Msg::Post(_)) {
            provider.drop_disconnected(&clients);
        }

        for out in provider.handle(client_id, msg) {
            route_output(out, &clients);
        }
    }

    info!("Provider loop shutting down (provider_rx closed)");
}

fn route_output(out: Outbound, clients: &ClientRegistry) {
    let Outbound { client_id, msg } = out;
    match clients.get(&client_id) {
        Some(tx) => {
            if tx.send(msg).is_err() {
                debug!("Client {} outbound channel closed", client_id.0);
            }
        }
        None => debug!("Client {} gone, dropping {}", client_id.0, msg.class_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omm_core::{real_hint, ElementList, GenericMsg, MsgClass, PostUserInfo, Real};

    const BID: i16 = 22;

    fn provider() -> Provider {
        let dictionary = Arc::new(DataDictionary::embedded().unwrap());
        Provider::new(&Config::default(), dictionary)
    }

    fn request(stream_id: i32, domain_type: u8, name: &str, streaming: bool) -> Msg {
        RequestMsg {
            stream_id,
            domain_type,
            key: MsgKey::named(name).with_service_id(1),
            streaming,
            ..Default::default()
        }
        .into()
    }

    fn post(stream_id: i32, name: Option<&str>, fields: FieldList) -> Msg {
        PostMsg {
            stream_id,
            domain_type: domain::MARKET_PRICE,
            post_user_info: PostUserInfo {
                address: 0x7F00_0001,
                user_id: 1,
            },
            key: name.map(MsgKey::named),
            post_id: Some(42),
            complete: true,
            ack: true,
            payload: Data::Msg(Box::new(
                UpdateMsg {
                    domain_type: domain::MARKET_PRICE,
                    payload: fields.into(),
                    ..Default::default()
                }
                .into(),
            )),
            ..Default::default()
        }
        .into()
    }

    #[test]
    fn streaming_request_gets_image_and_subscribes() {
        let mut p = provider();
        let out = p.handle(ClientId(1), request(5, domain::MARKET_PRICE, "TRI.N", true));
        assert_eq!(out.len(), 1);
        match &out[0].msg {
            Msg::Refresh(r) => {
                assert_eq!(r.stream_id, 5);
                assert_eq!(r.state.stream_state, StreamState::Open);
                assert!(r.solicited && r.complete);
                assert_eq!(r.key.as_ref().unwrap().service_id, Some(1));
                assert_eq!(r.payload.as_field_list().unwrap().len(), 6);
            }
            other => panic!("expected refresh, got {:?}", other),
        }
        assert_eq!(p.items().subscribers("TRI.N").len(), 1);
    }

    #[test]
    fn snapshot_does_not_subscribe() {
        let mut p = provider();
        let out = p.handle(ClientId(1), request(5, domain::MARKET_PRICE, "IBM.N", false));
        match &out[0].msg {
            Msg::Refresh(r) => assert_eq!(r.state.stream_state, StreamState::NonStreaming),
            other => panic!("expected refresh, got {:?}", other),
        }
        assert!(p.items().subscribers("IBM.N").is_empty());
    }

    #[test]
    fn unknown_item_is_closed_recoverable() {
        let mut p = provider();
        let out = p.handle(ClientId(1), request(6, domain::MARKET_PRICE, "NOPE", true));
        match &out[0].msg {
            Msg::Status(s) => {
                let state = s.state.as_ref().unwrap();
                assert_eq!(state.stream_state, StreamState::ClosedRecover);
                assert_eq!(state.data_state, DataState::Suspect);
                assert_eq!(state.code, StateCode::NOT_FOUND);
            }
            other => panic!("expected status, got {:?}", other),
        }
    }

    #[test]
    fn login_echoes_the_user() {
        let mut p = provider();
        let out = p.handle(ClientId(1), request(1, domain::LOGIN, "alice", true));
        assert_eq!(out[0].msg.class(), MsgClass::Refresh);
        assert_eq!(out[0].msg.item_name(), Some("alice"));
    }

    #[test]
    fn dictionary_requests_by_name() {
        let mut p = provider();
        let out = p.handle(ClientId(1), request(3, domain::DICTIONARY, "RWFFld", false));
        assert!(matches!(out[0].msg.payload(), Data::Series(_)));

        let out = p.handle(ClientId(1), request(4, domain::DICTIONARY, "Other", false));
        assert_eq!(out[0].msg.class(), MsgClass::Status);
    }

    #[test]
    fn post_fans_out_and_acks() {
        let mut p = provider();
        p.handle(ClientId(1), request(5, domain::MARKET_PRICE, "TRI.N", true));
        p.handle(ClientId(2), request(9, domain::MARKET_PRICE, "TRI.N", true));

        let bid = Real::new(3990, real_hint::EXPONENT_2);
        let out = p.handle(ClientId(3), post(1, Some("TRI.N"), FieldList::new().add(BID, bid)));
        assert_eq!(out.len(), 3);

        let updates: Vec<(ClientId, i32)> = out
            .iter()
            .filter(|o| o.msg.class() == MsgClass::Update)
            .map(|o| (o.client_id, o.msg.stream_id()))
            .collect();
        assert_eq!(updates, vec![(ClientId(1), 5), (ClientId(2), 9)]);

        match &out[2].msg {
            Msg::Ack(ack) => {
                assert_eq!(ack.ack_id, 42);
                assert_eq!(ack.nak_code, None);
                assert_eq!(out[2].client_id, ClientId(3));
            }
            other => panic!("expected ack, got {:?}", other),
        }

        let image = p.items().image("TRI.N").unwrap();
        assert_eq!(image.get(BID), Some(&Data::Real(bid)));
    }

    #[test]
    fn post_on_item_stream_needs_no_key() {
        let mut p = provider();
        p.handle(ClientId(1), request(5, domain::MARKET_PRICE, "TRI.N", true));
        let out = p.handle(ClientId(1), post(5, None, FieldList::new().add(BID, Real::new(1, 14))));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].msg.class(), MsgClass::Update);
        assert_eq!(out[1].msg.class(), MsgClass::Ack);
    }

    #[test]
    fn post_creates_item_and_bad_post_is_nakked() {
        let mut p = provider();
        p.handle(ClientId(1), post(1, Some("NEW.O"), FieldList::new().add(BID, Real::new(5, 14))));
        assert!(p.items().contains("NEW.O"));

        let out = p.handle(ClientId(1), post(2, None, FieldList::new()));
        match &out[0].msg {
            Msg::Ack(ack) => assert_eq!(ack.nak_code, Some(NakCode::SYMBOL_UNKNOWN)),
            other => panic!("expected nak, got {:?}", other),
        }
    }

    #[test]
    fn close_drops_the_subscription() {
        let mut p = provider();
        p.handle(ClientId(1), request(5, domain::MARKET_PRICE, "TRI.N", true));
        let close = CloseMsg {
            stream_id: 5,
            domain_type: domain::MARKET_PRICE,
            ..Default::default()
        };
        assert!(p.handle(ClientId(1), close.into()).is_empty());
        assert!(p.items().subscribers("TRI.N").is_empty());
    }

    #[test]
    fn generic_is_echoed() {
        let mut p = provider();
        let generic: Msg = GenericMsg {
            stream_id: 12,
            domain_type: 128,
            payload: ElementList::new().add("ping", 1u64).into(),
            ..Default::default()
        }
        .into();
        let out = p.handle(ClientId(4), generic.clone());
        assert_eq!(out, vec![Outbound::to(ClientId(4), generic)]);
    }
}
