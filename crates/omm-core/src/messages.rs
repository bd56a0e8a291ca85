//! OMM messages.
//!
//! Eight message classes share a common header (stream id, domain,
//! payload) and add class-specific members. Every optional member is an
//! `Option`; every presence-only flag is a `bool`. Wire flag bits are
//! derived from these at encode time, so a message can never claim a
//! member it does not carry.

use bytes::Bytes;

use crate::containers::Data;
use crate::primitives::{Qos, State};

/// Well-known domain types.
pub mod domain {
    pub const LOGIN: u8 = 1;
    pub const SOURCE: u8 = 4;
    pub const DICTIONARY: u8 = 5;
    pub const MARKET_PRICE: u8 = 6;
    pub const MARKET_BY_ORDER: u8 = 7;
    pub const MARKET_BY_PRICE: u8 = 8;
    pub const MARKET_MAKER: u8 = 9;
    pub const SYMBOL_LIST: u8 = 10;

    pub fn name(domain: u8) -> &'static str {
        match domain {
            LOGIN => "Login",
            SOURCE => "Source",
            DICTIONARY => "Dictionary",
            MARKET_PRICE => "MarketPrice",
            MARKET_BY_ORDER => "MarketByOrder",
            MARKET_BY_PRICE => "MarketByPrice",
            MARKET_MAKER => "MarketMaker",
            SYMBOL_LIST => "SymbolList",
            _ => "Unknown",
        }
    }
}

/// Message class codes.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MsgClass {
    Request = 1,
    Refresh = 2,
    Status = 3,
    Update = 4,
    Close = 5,
    Ack = 6,
    Generic = 7,
    Post = 8,
}

impl MsgClass {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(MsgClass::Request),
            2 => Some(MsgClass::Refresh),
            3 => Some(MsgClass::Status),
            4 => Some(MsgClass::Update),
            5 => Some(MsgClass::Close),
            6 => Some(MsgClass::Ack),
            7 => Some(MsgClass::Generic),
            8 => Some(MsgClass::Post),
            _ => None,
        }
    }
}

// ============================================================================
// Shared header members
// ============================================================================

/// Identifies the item a stream is about.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MsgKey {
    pub service_id: Option<u16>,
    pub name: Option<String>,
    /// Only sent together with `name`.
    pub name_type: Option<u8>,
    pub filter: Option<u32>,
    pub identifier: Option<i32>,
    pub attrib: Option<Box<Data>>,
}

impl MsgKey {
    pub fn named(name: impl Into<String>) -> Self {
        MsgKey {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_service_id(mut self, service_id: u16) -> Self {
        self.service_id = Some(service_id);
        self
    }

    pub fn with_name_type(mut self, name_type: u8) -> Self {
        self.name_type = Some(name_type);
        self
    }

    pub fn with_filter(mut self, filter: u32) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_identifier(mut self, identifier: i32) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn with_attrib(mut self, attrib: impl Into<Data>) -> Self {
        self.attrib = Some(Box::new(attrib.into()));
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct PostUserInfo {
    /// IPv4 address of the posting user.
    pub address: u32,
    pub user_id: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Priority {
    pub class: u8,
    pub count: u16,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ConflationInfo {
    pub count: u16,
    pub time: u16,
}

/// Negative-acknowledgement reason. Zero means a positive ack.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct NakCode(pub u8);

impl NakCode {
    pub const NONE: NakCode = NakCode(0);
    pub const ACCESS_DENIED: NakCode = NakCode(1);
    pub const DENIED_BY_SOURCE: NakCode = NakCode(2);
    pub const SOURCE_DOWN: NakCode = NakCode(3);
    pub const SOURCE_UNKNOWN: NakCode = NakCode(4);
    pub const NO_RESOURCES: NakCode = NakCode(5);
    pub const NO_RESPONSE: NakCode = NakCode(6);
    pub const GATEWAY_DOWN: NakCode = NakCode(7);
    pub const SYMBOL_UNKNOWN: NakCode = NakCode(10);
    pub const NOT_OPEN: NakCode = NakCode(11);
    pub const INVALID_CONTENT: NakCode = NakCode(12);

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "None",
            1 => "AccessDenied",
            2 => "DeniedBySource",
            3 => "SourceDown",
            4 => "SourceUnknown",
            5 => "NoResources",
            6 => "NoResponse",
            7 => "GatewayDown",
            10 => "SymbolUnknown",
            11 => "NotOpen",
            12 => "InvalidContent",
            _ => "Unknown",
        }
    }
}

// ============================================================================
// Message classes
// ============================================================================

/// Consumer → provider: open (or reissue) a stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestMsg {
    pub stream_id: i32,
    pub domain_type: u8,
    pub key: MsgKey,
    pub priority: Option<Priority>,
    pub qos: Option<Qos>,
    pub worst_qos: Option<Qos>,
    pub extended_header: Option<Bytes>,
    pub streaming: bool,
    pub no_refresh: bool,
    pub msg_key_in_updates: bool,
    pub conf_info_in_updates: bool,
    pub private_stream: bool,
    pub pause: bool,
    pub qualified_stream: bool,
    pub has_view: bool,
    pub has_batch: bool,
    pub payload: Data,
}

/// Provider → consumer: full image (possibly in several parts).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RefreshMsg {
    pub stream_id: i32,
    pub domain_type: u8,
    pub key: Option<MsgKey>,
    pub state: State,
    pub group_id: Bytes,
    pub seq_num: Option<u32>,
    pub perm_data: Option<Bytes>,
    pub qos: Option<Qos>,
    pub part_num: Option<u16>,
    pub post_user_info: Option<PostUserInfo>,
    pub extended_header: Option<Bytes>,
    pub solicited: bool,
    pub complete: bool,
    pub clear_cache: bool,
    pub do_not_cache: bool,
    pub private_stream: bool,
    pub qualified_stream: bool,
    pub request_key: bool,
    pub payload: Data,
}

/// Provider → consumer: changes to the image.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateMsg {
    pub stream_id: i32,
    pub domain_type: u8,
    pub update_type: u8,
    pub key: Option<MsgKey>,
    pub seq_num: Option<u32>,
    pub conflation: Option<ConflationInfo>,
    pub perm_data: Option<Bytes>,
    pub post_user_info: Option<PostUserInfo>,
    pub extended_header: Option<Bytes>,
    pub do_not_cache: bool,
    pub do_not_conflate: bool,
    pub do_not_ripple: bool,
    pub discardable: bool,
    pub payload: Data,
}

/// Provider → consumer: state change without data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusMsg {
    pub stream_id: i32,
    pub domain_type: u8,
    pub key: Option<MsgKey>,
    pub state: Option<State>,
    pub group_id: Option<Bytes>,
    pub perm_data: Option<Bytes>,
    pub post_user_info: Option<PostUserInfo>,
    pub extended_header: Option<Bytes>,
    pub clear_cache: bool,
    pub private_stream: bool,
    pub qualified_stream: bool,
    pub request_key: bool,
    pub payload: Data,
}

/// Consumer → provider: close a stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CloseMsg {
    pub stream_id: i32,
    pub domain_type: u8,
    pub extended_header: Option<Bytes>,
    pub ack: bool,
    pub batch: bool,
    pub payload: Data,
}

/// Provider → consumer: (n)ack for a post or close.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AckMsg {
    pub stream_id: i32,
    pub domain_type: u8,
    pub ack_id: u32,
    pub nak_code: Option<NakCode>,
    pub text: Option<String>,
    pub seq_num: Option<u32>,
    pub key: Option<MsgKey>,
    pub extended_header: Option<Bytes>,
    pub private_stream: bool,
    pub qualified_stream: bool,
    pub payload: Data,
}

/// Either direction: bidirectional content outside request/response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenericMsg {
    pub stream_id: i32,
    pub domain_type: u8,
    pub key: Option<MsgKey>,
    pub seq_num: Option<u32>,
    pub secondary_seq_num: Option<u32>,
    pub perm_data: Option<Bytes>,
    pub part_num: Option<u16>,
    pub extended_header: Option<Bytes>,
    pub complete: bool,
    pub provider_driven: bool,
    pub payload: Data,
}

/// Consumer → provider: contribute data to an item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PostMsg {
    pub stream_id: i32,
    pub domain_type: u8,
    pub post_user_info: PostUserInfo,
    pub key: Option<MsgKey>,
    pub seq_num: Option<u32>,
    pub post_id: Option<u32>,
    pub perm_data: Option<Bytes>,
    pub part_num: Option<u16>,
    pub post_user_rights: Option<u16>,
    pub extended_header: Option<Bytes>,
    pub complete: bool,
    pub ack: bool,
    pub payload: Data,
}

/// Any OMM message.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    Request(RequestMsg),
    Refresh(RefreshMsg),
    Status(StatusMsg),
    Update(UpdateMsg),
    Close(CloseMsg),
    Ack(AckMsg),
    Generic(GenericMsg),
    Post(PostMsg),
}

macro_rules! each_msg {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            Msg::Request($m) => $body,
            Msg::Refresh($m) => $body,
            Msg::Status($m) => $body,
            Msg::Update($m) => $body,
            Msg::Close($m) => $body,
            Msg::Ack($m) => $body,
            Msg::Generic($m) => $body,
            Msg::Post($m) => $body,
        }
    };
}

impl Msg {
    pub fn class(&self) -> MsgClass {
        match self {
            Msg::Request(_) => MsgClass::Request,
            Msg::Refresh(_) => MsgClass::Refresh,
            Msg::Status(_) => MsgClass::Status,
            Msg::Update(_) => MsgClass::Update,
            Msg::Close(_) => MsgClass::Close,
            Msg::Ack(_) => MsgClass::Ack,
            Msg::Generic(_) => MsgClass::Generic,
            Msg::Post(_) => MsgClass::Post,
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            Msg::Request(_) => "ReqMsg",
            Msg::Refresh(_) => "RefreshMsg",
            Msg::Status(_) => "StatusMsg",
            Msg::Update(_) => "UpdateMsg",
            Msg::Close(_) => "CloseMsg",
            Msg::Ack(_) => "AckMsg",
            Msg::Generic(_) => "GenericMsg",
            Msg::Post(_) => "PostMsg",
        }
    }

    pub fn stream_id(&self) -> i32 {
        each_msg!(self, m => m.stream_id)
    }

    pub fn set_stream_id(&mut self, stream_id: i32) {
        each_msg!(self, m => m.stream_id = stream_id)
    }

    pub fn domain_type(&self) -> u8 {
        each_msg!(self, m => m.domain_type)
    }

    pub fn payload(&self) -> &Data {
        each_msg!(self, m => &m.payload)
    }

    pub fn extended_header(&self) -> Option<&Bytes> {
        each_msg!(self, m => m.extended_header.as_ref())
    }

    /// The message key, when the class carries one and it is present.
    pub fn key(&self) -> Option<&MsgKey> {
        match self {
            Msg::Request(m) => Some(&m.key),
            Msg::Refresh(m) => m.key.as_ref(),
            Msg::Status(m) => m.key.as_ref(),
            Msg::Update(m) => m.key.as_ref(),
            Msg::Close(_) => None,
            Msg::Ack(m) => m.key.as_ref(),
            Msg::Generic(m) => m.key.as_ref(),
            Msg::Post(m) => m.key.as_ref(),
        }
    }

    /// Item name from the key, if any.
    pub fn item_name(&self) -> Option<&str> {
        self.key().and_then(|k| k.name.as_deref())
    }
}

impl From<RequestMsg> for Msg {
    fn from(m: RequestMsg) -> Self {
        Msg::Request(m)
    }
}

impl From<RefreshMsg> for Msg {
    fn from(m: RefreshMsg) -> Self {
        Msg::Refresh(m)
    }
}

impl From<StatusMsg> for Msg {
    fn from(m: StatusMsg) -> Self {
        Msg::Status(m)
    }
}

impl From<UpdateMsg> for Msg {
    fn from(m: UpdateMsg) -> Self {
        Msg::Update(m)
    }
}

impl From<CloseMsg> for Msg {
    fn from(m: CloseMsg) -> Self {
        Msg::Close(m)
    }
}

impl From<AckMsg> for Msg {
    fn from(m: AckMsg) -> Self {
        Msg::Ack(m)
    }
}

impl From<GenericMsg> for Msg {
    fn from(m: GenericMsg) -> Self {
        Msg::Generic(m)
    }
}

impl From<PostMsg> for Msg {
    fn from(m: PostMsg) -> Self {
        Msg::Post(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::FieldList;

    #[test]
    fn header_accessors_cover_every_class() {
        let mut msg: Msg = RefreshMsg {
            stream_id: 5,
            domain_type: domain::MARKET_PRICE,
            key: Some(MsgKey::named("TRI.N").with_service_id(1)),
            payload: FieldList::new().add(22, 10u64).into(),
            ..Default::default()
        }
        .into();

        assert_eq!(msg.stream_id(), 5);
        assert_eq!(msg.domain_type(), domain::MARKET_PRICE);
        assert_eq!(msg.item_name(), Some("TRI.N"));
        assert_eq!(msg.class(), MsgClass::Refresh);

        msg.set_stream_id(9);
        assert_eq!(msg.stream_id(), 9);

        let close: Msg = CloseMsg::default().into();
        assert_eq!(close.key(), None);
        assert_eq!(close.class_name(), "CloseMsg");
    }

    #[test]
    fn cloned_message_compares_equal() {
        let post = PostMsg {
            stream_id: 3,
            domain_type: domain::MARKET_PRICE,
            post_user_info: PostUserInfo {
                address: 0x7f000001,
                user_id: 42,
            },
            post_id: Some(7),
            ack: true,
            payload: FieldList::new().add(22, 1u64).into(),
            ..Default::default()
        };
        let copy = post.clone();
        assert_eq!(copy, post);
    }

    #[test]
    fn msg_class_codes() {
        for code in 1..=8 {
            assert_eq!(MsgClass::from_u8(code).map(|c| c as u8), Some(code));
        }
        assert_eq!(MsgClass::from_u8(0), None);
        assert_eq!(MsgClass::from_u8(9), None);
    }
}
