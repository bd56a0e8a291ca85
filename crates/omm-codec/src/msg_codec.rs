//! Message encoding.
//!
//! Every message is laid out as:
//!
//! ```text
//! [header size u16]                 bytes that follow, up to the payload
//! [msg class u8] [domain u8] [stream id i32]
//! [flags u15rb] [container type - 128]
//! [class-specific members ...]
//! [payload ...]                     the rest of the buffer
//! ```
//!
//! Members that ride at the end of a header (post user info, part number,
//! post user rights) are only read when the header still has room, so a
//! peer that sets the flag but omits the member is tolerated.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use omm_core::{
    AckMsg, CloseMsg, ConflationInfo, Data, DataDictionary, DataType, GenericMsg, Msg, MsgClass,
    MsgKey, NakCode, PostMsg, PostUserInfo, Priority, RefreshMsg, RequestMsg, StatusMsg, UpdateMsg,
};

use crate::container_codec::{decode_with, encode_data, Ctx};
use crate::error::CodecError;
use crate::primitive_codec::{decode_qos, decode_state, encode_qos, encode_state, utf8};
use crate::wire_types::{
    ack_flags, close_flags, generic_flags, key_flags, post_flags, put_buf15, put_buf16, put_buf8,
    put_u15rb, put_u16ob, refresh_flags, request_flags, status_flags, update_flags, Reader,
};

/// Offset of the stream id inside an encoded message.
const STREAM_ID_OFFSET: usize = 4;

// ============================================================================
// Public entry points
// ============================================================================

/// Append an encoded message to `out`.
pub fn encode_msg(msg: &Msg, out: &mut BytesMut) -> Result<(), CodecError> {
    let payload = msg.payload();
    let container = payload_type(payload)?;

    let mut header = BytesMut::new();
    header.put_u8(msg.class() as u8);
    header.put_u8(msg.domain_type());
    header.put_i32(msg.stream_id());

    match msg {
        Msg::Request(m) => encode_request(m, container, &mut header)?,
        Msg::Refresh(m) => encode_refresh(m, container, &mut header)?,
        Msg::Status(m) => encode_status(m, container, &mut header)?,
        Msg::Update(m) => encode_update(m, container, &mut header)?,
        Msg::Close(m) => encode_close(m, container, &mut header)?,
        Msg::Ack(m) => encode_ack(m, container, &mut header)?,
        Msg::Generic(m) => encode_generic(m, container, &mut header)?,
        Msg::Post(m) => encode_post(m, container, &mut header)?,
    }

    if header.len() > u16::MAX as usize {
        return Err(CodecError::ValueTooLarge {
            field: "message header",
            value: header.len() as u64,
        });
    }
    out.put_u16(header.len() as u16);
    out.put_slice(&header);
    encode_data(payload, out)
}

/// Decode one message. FieldList payloads are typed through `dict`.
pub fn decode_msg(buf: &[u8], dict: Option<&DataDictionary>) -> Result<Msg, CodecError> {
    decode_msg_with(buf, Ctx::new(dict))
}

/// Copy of an encoded message with only the stream id changed.
pub fn reencode_with_stream_id(buf: &[u8], stream_id: i32) -> Result<Bytes, CodecError> {
    extract_msg_class(buf)?;
    let mut out = BytesMut::from(buf);
    out[STREAM_ID_OFFSET..STREAM_ID_OFFSET + 4].copy_from_slice(&stream_id.to_be_bytes());
    Ok(out.freeze())
}

/// Message class without decoding the rest of the header.
pub fn extract_msg_class(buf: &[u8]) -> Result<MsgClass, CodecError> {
    if buf.len() < STREAM_ID_OFFSET + 4 {
        return Err(CodecError::Incomplete);
    }
    let code = buf[2] & 0x1F;
    MsgClass::from_u8(code).ok_or(CodecError::UnknownMsgClass(code))
}

/// Stream id without decoding the rest of the header.
pub fn extract_stream_id(buf: &[u8]) -> Result<i32, CodecError> {
    let mut r = Reader::new(buf);
    r.skip_to(STREAM_ID_OFFSET)?;
    r.i32()
}

pub(crate) fn decode_msg_with(buf: &[u8], ctx: Ctx<'_>) -> Result<Msg, CodecError> {
    let mut outer = Reader::new(buf);
    let header_size = outer.u16()? as usize;
    let header = outer.bytes(header_size)?;
    let payload = outer.rest();

    let mut r = Reader::new(header);
    let class_byte = r.u8()? & 0x1F;
    let class = MsgClass::from_u8(class_byte).ok_or(CodecError::UnknownMsgClass(class_byte))?;
    let domain_type = r.u8()?;
    let stream_id = r.i32()?;
    let flags = r.u15rb()?;
    let container_byte = r.u8()?;
    let container = DataType::from_container_byte(container_byte)
        .ok_or(CodecError::UnknownDataType(container_byte.wrapping_add(128)))?;

    let h = Header {
        domain_type,
        stream_id,
        flags,
    };
    let mut msg = match class {
        MsgClass::Request => Msg::Request(decode_request(h, &mut r, ctx)?),
        MsgClass::Refresh => Msg::Refresh(decode_refresh(h, &mut r, ctx)?),
        MsgClass::Status => Msg::Status(decode_status(h, &mut r, ctx)?),
        MsgClass::Update => Msg::Update(decode_update(h, &mut r, ctx)?),
        MsgClass::Close => Msg::Close(decode_close(h, &mut r)?),
        MsgClass::Ack => Msg::Ack(decode_ack(h, &mut r, ctx)?),
        MsgClass::Generic => Msg::Generic(decode_generic(h, &mut r, ctx)?),
        MsgClass::Post => Msg::Post(decode_post(h, &mut r, ctx)?),
    };

    let data = decode_with(container, payload, ctx).map_err(|err| {
        debug!(stream_id, %container, error = %err, "message payload decode failed");
        err
    })?;
    set_payload(&mut msg, data);
    Ok(msg)
}

fn set_payload(msg: &mut Msg, data: Data) {
    match msg {
        Msg::Request(m) => m.payload = data,
        Msg::Refresh(m) => m.payload = data,
        Msg::Status(m) => m.payload = data,
        Msg::Update(m) => m.payload = data,
        Msg::Close(m) => m.payload = data,
        Msg::Ack(m) => m.payload = data,
        Msg::Generic(m) => m.payload = data,
        Msg::Post(m) => m.payload = data,
    }
}

/// Container type byte for a message payload.
fn payload_type(payload: &Data) -> Result<DataType, CodecError> {
    let t = match payload {
        Data::Error(e) => e.data_type,
        other => other.data_type(),
    };
    if t.is_container() {
        Ok(t)
    } else {
        Err(CodecError::UnsupportedType(t, "message payload"))
    }
}

/// Members common to every class, read before the class-specific ones.
#[derive(Debug, Clone, Copy)]
struct Header {
    domain_type: u8,
    stream_id: i32,
    flags: u16,
}

impl Header {
    fn has(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }
}

fn flag(set: bool, bit: u16) -> u16 {
    if set {
        bit
    } else {
        0
    }
}

fn begin(out: &mut BytesMut, flags: u16, container: DataType) -> Result<(), CodecError> {
    put_u15rb(out, flags as usize, "message flags")?;
    out.put_u8(container.to_container_byte());
    Ok(())
}

// ============================================================================
// Shared members
// ============================================================================

fn put_key(out: &mut BytesMut, key: &MsgKey) -> Result<(), CodecError> {
    // An empty name is sent as no name, and takes the name type with it.
    let name = key.name.as_deref().filter(|n| !n.is_empty());

    let mut flags = 0u16;
    flags |= flag(key.service_id.is_some(), key_flags::HAS_SERVICE_ID);
    flags |= flag(name.is_some(), key_flags::HAS_NAME);
    flags |= flag(name.is_some() && key.name_type.is_some(), key_flags::HAS_NAME_TYPE);
    flags |= flag(key.filter.is_some(), key_flags::HAS_FILTER);
    flags |= flag(key.identifier.is_some(), key_flags::HAS_IDENTIFIER);
    flags |= flag(key.attrib.is_some(), key_flags::HAS_ATTRIB);

    let mut k = BytesMut::new();
    put_u15rb(&mut k, flags as usize, "key flags")?;
    if let Some(id) = key.service_id {
        put_u16ob(&mut k, id as usize, "service id")?;
    }
    if let Some(name) = name {
        put_buf8(&mut k, name.as_bytes(), "key name")?;
        if let Some(name_type) = key.name_type {
            k.put_u8(name_type);
        }
    }
    if let Some(filter) = key.filter {
        k.put_u32(filter);
    }
    if let Some(identifier) = key.identifier {
        k.put_i32(identifier);
    }
    if let Some(attrib) = &key.attrib {
        let t = payload_type(attrib)?;
        k.put_u8(t.to_container_byte());
        let mut a = BytesMut::new();
        encode_data(attrib, &mut a)?;
        put_buf15(&mut k, &a, "key attrib")?;
    }
    put_buf15(out, &k, "message key")
}

fn read_key(r: &mut Reader<'_>, ctx: Ctx<'_>) -> Result<MsgKey, CodecError> {
    let mut k = Reader::new(r.buf15()?);
    let flags = k.u15rb()?;
    let mut key = MsgKey::default();
    if flags & key_flags::HAS_SERVICE_ID != 0 {
        key.service_id = Some(k.u16ob()?);
    }
    if flags & key_flags::HAS_NAME != 0 {
        key.name = Some(utf8(k.buf8()?, "key name")?);
        if flags & key_flags::HAS_NAME_TYPE != 0 {
            key.name_type = Some(k.u8()?);
        }
    }
    if flags & key_flags::HAS_FILTER != 0 {
        key.filter = Some(k.u32()?);
    }
    if flags & key_flags::HAS_IDENTIFIER != 0 {
        key.identifier = Some(k.i32()?);
    }
    if flags & key_flags::HAS_ATTRIB != 0 {
        let b = k.u8()?;
        let t = DataType::from_container_byte(b)
            .ok_or(CodecError::UnknownDataType(b.wrapping_add(128)))?;
        let raw = k.buf15()?;
        key.attrib = Some(Box::new(decode_with(t, raw, ctx)?));
    }
    Ok(key)
}

fn put_opt_buf8(out: &mut BytesMut, b: &Option<Bytes>, field: &'static str) -> Result<(), CodecError> {
    match b {
        Some(b) => put_buf8(out, b, field),
        None => Ok(()),
    }
}

fn put_opt_buf15(out: &mut BytesMut, b: &Option<Bytes>, field: &'static str) -> Result<(), CodecError> {
    match b {
        Some(b) => put_buf15(out, b, field),
        None => Ok(()),
    }
}

fn put_post_user_info(out: &mut BytesMut, info: &PostUserInfo) {
    out.put_u32(info.address);
    out.put_u32(info.user_id);
}

fn read_post_user_info(r: &mut Reader<'_>) -> Result<PostUserInfo, CodecError> {
    Ok(PostUserInfo {
        address: r.u32()?,
        user_id: r.u32()?,
    })
}

fn copy(b: &[u8]) -> Bytes {
    Bytes::copy_from_slice(b)
}

// ============================================================================
// Request
// ============================================================================

fn encode_request(m: &RequestMsg, container: DataType, out: &mut BytesMut) -> Result<(), CodecError> {
    let flags = flag(m.extended_header.is_some(), request_flags::HAS_EXTENDED_HEADER)
        | flag(m.priority.is_some(), request_flags::HAS_PRIORITY)
        | flag(m.streaming, request_flags::STREAMING)
        | flag(m.msg_key_in_updates, request_flags::MSG_KEY_IN_UPDATES)
        | flag(m.conf_info_in_updates, request_flags::CONF_INFO_IN_UPDATES)
        | flag(m.no_refresh, request_flags::NO_REFRESH)
        | flag(m.qos.is_some(), request_flags::HAS_QOS)
        | flag(m.worst_qos.is_some(), request_flags::HAS_WORST_QOS)
        | flag(m.private_stream, request_flags::PRIVATE_STREAM)
        | flag(m.pause, request_flags::PAUSE)
        | flag(m.has_view, request_flags::HAS_VIEW)
        | flag(m.has_batch, request_flags::HAS_BATCH)
        | flag(m.qualified_stream, request_flags::QUALIFIED_STREAM);
    begin(out, flags, container)?;

    if let Some(p) = m.priority {
        out.put_u8(p.class);
        put_u16ob(out, p.count as usize, "priority count")?;
    }
    if let Some(q) = &m.qos {
        encode_qos(q, out)?;
    }
    if let Some(q) = &m.worst_qos {
        encode_qos(q, out)?;
    }
    put_key(out, &m.key)?;
    put_opt_buf8(out, &m.extended_header, "extended header")
}

fn decode_request(h: Header, r: &mut Reader<'_>, ctx: Ctx<'_>) -> Result<RequestMsg, CodecError> {
    let mut m = RequestMsg {
        stream_id: h.stream_id,
        domain_type: h.domain_type,
        streaming: h.has(request_flags::STREAMING),
        no_refresh: h.has(request_flags::NO_REFRESH),
        msg_key_in_updates: h.has(request_flags::MSG_KEY_IN_UPDATES),
        conf_info_in_updates: h.has(request_flags::CONF_INFO_IN_UPDATES),
        private_stream: h.has(request_flags::PRIVATE_STREAM),
        pause: h.has(request_flags::PAUSE),
        qualified_stream: h.has(request_flags::QUALIFIED_STREAM),
        has_view: h.has(request_flags::HAS_VIEW),
        has_batch: h.has(request_flags::HAS_BATCH),
        ..Default::default()
    };
    if h.has(request_flags::HAS_PRIORITY) {
        let class = r.u8()?;
        let count = r.u16ob()?;
        m.priority = Some(Priority { class, count });
    }
    if h.has(request_flags::HAS_QOS) {
        m.qos = Some(decode_qos(r)?);
    }
    if h.has(request_flags::HAS_WORST_QOS) {
        m.worst_qos = Some(decode_qos(r)?);
    }
    m.key = read_key(r, ctx)?;
    if h.has(request_flags::HAS_EXTENDED_HEADER) {
        m.extended_header = Some(copy(r.buf8()?));
    }
    Ok(m)
}

// ============================================================================
// Refresh
// ============================================================================

fn encode_refresh(m: &RefreshMsg, container: DataType, out: &mut BytesMut) -> Result<(), CodecError> {
    let flags = flag(m.extended_header.is_some(), refresh_flags::HAS_EXTENDED_HEADER)
        | flag(m.perm_data.is_some(), refresh_flags::HAS_PERM_DATA)
        | flag(m.key.is_some(), refresh_flags::HAS_MSG_KEY)
        | flag(m.seq_num.is_some(), refresh_flags::HAS_SEQ_NUM)
        | flag(m.solicited, refresh_flags::SOLICITED)
        | flag(m.complete, refresh_flags::REFRESH_COMPLETE)
        | flag(m.qos.is_some(), refresh_flags::HAS_QOS)
        | flag(m.clear_cache, refresh_flags::CLEAR_CACHE)
        | flag(m.do_not_cache, refresh_flags::DO_NOT_CACHE)
        | flag(m.private_stream, refresh_flags::PRIVATE_STREAM)
        | flag(m.post_user_info.is_some(), refresh_flags::HAS_POST_USER_INFO)
        | flag(m.part_num.is_some(), refresh_flags::HAS_PART_NUM)
        | flag(m.request_key, refresh_flags::HAS_REQ_MSG_KEY)
        | flag(m.qualified_stream, refresh_flags::QUALIFIED_STREAM);
    begin(out, flags, container)?;

    if let Some(seq) = m.seq_num {
        out.put_u32(seq);
    }
    encode_state(&m.state, out)?;
    put_buf8(out, &m.group_id, "group id")?;
    put_opt_buf15(out, &m.perm_data, "permission data")?;
    if let Some(q) = &m.qos {
        encode_qos(q, out)?;
    }
    if let Some(key) = &m.key {
        put_key(out, key)?;
    }
    put_opt_buf8(out, &m.extended_header, "extended header")?;
    if let Some(info) = &m.post_user_info {
        put_post_user_info(out, info);
    }
    if let Some(part) = m.part_num {
        put_u15rb(out, part as usize, "part number")?;
    }
    Ok(())
}

fn decode_refresh(h: Header, r: &mut Reader<'_>, ctx: Ctx<'_>) -> Result<RefreshMsg, CodecError> {
    let mut m = RefreshMsg {
        stream_id: h.stream_id,
        domain_type: h.domain_type,
        solicited: h.has(refresh_flags::SOLICITED),
        complete: h.has(refresh_flags::REFRESH_COMPLETE),
        clear_cache: h.has(refresh_flags::CLEAR_CACHE),
        do_not_cache: h.has(refresh_flags::DO_NOT_CACHE),
        private_stream: h.has(refresh_flags::PRIVATE_STREAM),
        qualified_stream: h.has(refresh_flags::QUALIFIED_STREAM),
        request_key: h.has(refresh_flags::HAS_REQ_MSG_KEY),
        ..Default::default()
    };
    if h.has(refresh_flags::HAS_SEQ_NUM) {
        m.seq_num = Some(r.u32()?);
    }
    m.state = decode_state(r)?;
    m.group_id = copy(r.buf8()?);
    if h.has(refresh_flags::HAS_PERM_DATA) {
        m.perm_data = Some(copy(r.buf15()?));
    }
    if h.has(refresh_flags::HAS_QOS) {
        m.qos = Some(decode_qos(r)?);
    }
    if h.has(refresh_flags::HAS_MSG_KEY) {
        m.key = Some(read_key(r, ctx)?);
    }
    if h.has(refresh_flags::HAS_EXTENDED_HEADER) {
        m.extended_header = Some(copy(r.buf8()?));
    }
    if h.has(refresh_flags::HAS_POST_USER_INFO) && !r.is_empty() {
        m.post_user_info = Some(read_post_user_info(r)?);
    }
    if h.has(refresh_flags::HAS_PART_NUM) && !r.is_empty() {
        m.part_num = Some(r.u15rb()?);
    }
    Ok(m)
}

// ============================================================================
// Status
// ============================================================================

fn encode_status(m: &StatusMsg, container: DataType, out: &mut BytesMut) -> Result<(), CodecError> {
    let flags = flag(m.extended_header.is_some(), status_flags::HAS_EXTENDED_HEADER)
        | flag(m.perm_data.is_some(), status_flags::HAS_PERM_DATA)
        | flag(m.key.is_some(), status_flags::HAS_MSG_KEY)
        | flag(m.group_id.is_some(), status_flags::HAS_GROUP_ID)
        | flag(m.state.is_some(), status_flags::HAS_STATE)
        | flag(m.clear_cache, status_flags::CLEAR_CACHE)
        | flag(m.private_stream, status_flags::PRIVATE_STREAM)
        | flag(m.post_user_info.is_some(), status_flags::HAS_POST_USER_INFO)
        | flag(m.request_key, status_flags::HAS_REQ_MSG_KEY)
        | flag(m.qualified_stream, status_flags::QUALIFIED_STREAM);
    begin(out, flags, container)?;

    if let Some(state) = &m.state {
        encode_state(state, out)?;
    }
    put_opt_buf8(out, &m.group_id, "group id")?;
    put_opt_buf15(out, &m.perm_data, "permission data")?;
    if let Some(key) = &m.key {
        put_key(out, key)?;
    }
    put_opt_buf8(out, &m.extended_header, "extended header")?;
    if let Some(info) = &m.post_user_info {
        put_post_user_info(out, info);
    }
    Ok(())
}

fn decode_status(h: Header, r: &mut Reader<'_>, ctx: Ctx<'_>) -> Result<StatusMsg, CodecError> {
    let mut m = StatusMsg {
        stream_id: h.stream_id,
        domain_type: h.domain_type,
        clear_cache: h.has(status_flags::CLEAR_CACHE),
        private_stream: h.has(status_flags::PRIVATE_STREAM),
        qualified_stream: h.has(status_flags::QUALIFIED_STREAM),
        request_key: h.has(status_flags::HAS_REQ_MSG_KEY),
        ..Default::default()
    };
    if h.has(status_flags::HAS_STATE) {
        m.state = Some(decode_state(r)?);
    }
    if h.has(status_flags::HAS_GROUP_ID) {
        m.group_id = Some(copy(r.buf8()?));
    }
    if h.has(status_flags::HAS_PERM_DATA) {
        m.perm_data = Some(copy(r.buf15()?));
    }
    if h.has(status_flags::HAS_MSG_KEY) {
        m.key = Some(read_key(r, ctx)?);
    }
    if h.has(status_flags::HAS_EXTENDED_HEADER) {
        m.extended_header = Some(copy(r.buf8()?));
    }
    if h.has(status_flags::HAS_POST_USER_INFO) && !r.is_empty() {
        m.post_user_info = Some(read_post_user_info(r)?);
    }
    Ok(m)
}

// ============================================================================
// Update
// ============================================================================

fn encode_update(m: &UpdateMsg, container: DataType, out: &mut BytesMut) -> Result<(), CodecError> {
    let flags = flag(m.extended_header.is_some(), update_flags::HAS_EXTENDED_HEADER)
        | flag(m.perm_data.is_some(), update_flags::HAS_PERM_DATA)
        | flag(m.key.is_some(), update_flags::HAS_MSG_KEY)
        | flag(m.seq_num.is_some(), update_flags::HAS_SEQ_NUM)
        | flag(m.conflation.is_some(), update_flags::HAS_CONF_INFO)
        | flag(m.do_not_cache, update_flags::DO_NOT_CACHE)
        | flag(m.do_not_conflate, update_flags::DO_NOT_CONFLATE)
        | flag(m.do_not_ripple, update_flags::DO_NOT_RIPPLE)
        | flag(m.post_user_info.is_some(), update_flags::HAS_POST_USER_INFO)
        | flag(m.discardable, update_flags::DISCARDABLE);
    begin(out, flags, container)?;

    out.put_u8(m.update_type);
    if let Some(seq) = m.seq_num {
        out.put_u32(seq);
    }
    if let Some(conf) = m.conflation {
        put_u15rb(out, conf.count as usize, "conflation count")?;
        out.put_u16(conf.time);
    }
    put_opt_buf15(out, &m.perm_data, "permission data")?;
    if let Some(key) = &m.key {
        put_key(out, key)?;
    }
    put_opt_buf8(out, &m.extended_header, "extended header")?;
    if let Some(info) = &m.post_user_info {
        put_post_user_info(out, info);
    }
    Ok(())
}

fn decode_update(h: Header, r: &mut Reader<'_>, ctx: Ctx<'_>) -> Result<UpdateMsg, CodecError> {
    let mut m = UpdateMsg {
        stream_id: h.stream_id,
        domain_type: h.domain_type,
        do_not_cache: h.has(update_flags::DO_NOT_CACHE),
        do_not_conflate: h.has(update_flags::DO_NOT_CONFLATE),
        do_not_ripple: h.has(update_flags::DO_NOT_RIPPLE),
        discardable: h.has(update_flags::DISCARDABLE),
        ..Default::default()
    };
    m.update_type = r.u8()?;
    if h.has(update_flags::HAS_SEQ_NUM) {
        m.seq_num = Some(r.u32()?);
    }
    if h.has(update_flags::HAS_CONF_INFO) {
        let count = r.u15rb()?;
        let time = r.u16()?;
        m.conflation = Some(ConflationInfo { count, time });
    }
    if h.has(update_flags::HAS_PERM_DATA) {
        m.perm_data = Some(copy(r.buf15()?));
    }
    if h.has(update_flags::HAS_MSG_KEY) {
        m.key = Some(read_key(r, ctx)?);
    }
    if h.has(update_flags::HAS_EXTENDED_HEADER) {
        m.extended_header = Some(copy(r.buf8()?));
    }
    if h.has(update_flags::HAS_POST_USER_INFO) && !r.is_empty() {
        m.post_user_info = Some(read_post_user_info(r)?);
    }
    Ok(m)
}

// ============================================================================
// Close
// ============================================================================

fn encode_close(m: &CloseMsg, container: DataType, out: &mut BytesMut) -> Result<(), CodecError> {
    let flags = flag(m.extended_header.is_some(), close_flags::HAS_EXTENDED_HEADER)
        | flag(m.ack, close_flags::ACK)
        | flag(m.batch, close_flags::HAS_BATCH);
    begin(out, flags, container)?;
    put_opt_buf8(out, &m.extended_header, "extended header")
}

fn decode_close(h: Header, r: &mut Reader<'_>) -> Result<CloseMsg, CodecError> {
    let mut m = CloseMsg {
        stream_id: h.stream_id,
        domain_type: h.domain_type,
        ack: h.has(close_flags::ACK),
        batch: h.has(close_flags::HAS_BATCH),
        ..Default::default()
    };
    if h.has(close_flags::HAS_EXTENDED_HEADER) {
        m.extended_header = Some(copy(r.buf8()?));
    }
    Ok(m)
}

// ============================================================================
// Ack
// ============================================================================

fn encode_ack(m: &AckMsg, container: DataType, out: &mut BytesMut) -> Result<(), CodecError> {
    let flags = flag(m.extended_header.is_some(), ack_flags::HAS_EXTENDED_HEADER)
        | flag(m.text.is_some(), ack_flags::HAS_TEXT)
        | flag(m.private_stream, ack_flags::PRIVATE_STREAM)
        | flag(m.seq_num.is_some(), ack_flags::HAS_SEQ_NUM)
        | flag(m.key.is_some(), ack_flags::HAS_MSG_KEY)
        | flag(m.nak_code.is_some(), ack_flags::HAS_NAK_CODE)
        | flag(m.qualified_stream, ack_flags::QUALIFIED_STREAM);
    begin(out, flags, container)?;

    out.put_u32(m.ack_id);
    if let Some(code) = m.nak_code {
        out.put_u8(code.0);
    }
    if let Some(text) = &m.text {
        put_buf16(out, text.as_bytes(), "ack text")?;
    }
    if let Some(seq) = m.seq_num {
        out.put_u32(seq);
    }
    if let Some(key) = &m.key {
        put_key(out, key)?;
    }
    put_opt_buf8(out, &m.extended_header, "extended header")
}

fn decode_ack(h: Header, r: &mut Reader<'_>, ctx: Ctx<'_>) -> Result<AckMsg, CodecError> {
    let mut m = AckMsg {
        stream_id: h.stream_id,
        domain_type: h.domain_type,
        private_stream: h.has(ack_flags::PRIVATE_STREAM),
        qualified_stream: h.has(ack_flags::QUALIFIED_STREAM),
        ..Default::default()
    };
    m.ack_id = r.u32()?;
    if h.has(ack_flags::HAS_NAK_CODE) {
        m.nak_code = Some(NakCode(r.u8()?));
    }
    if h.has(ack_flags::HAS_TEXT) {
        m.text = Some(utf8(r.buf16()?, "ack text")?);
    }
    if h.has(ack_flags::HAS_SEQ_NUM) {
        m.seq_num = Some(r.u32()?);
    }
    if h.has(ack_flags::HAS_MSG_KEY) {
        m.key = Some(read_key(r, ctx)?);
    }
    if h.has(ack_flags::HAS_EXTENDED_HEADER) {
        m.extended_header = Some(copy(r.buf8()?));
    }
    Ok(m)
}

// ============================================================================
// Generic
// ============================================================================

fn encode_generic(m: &GenericMsg, container: DataType, out: &mut BytesMut) -> Result<(), CodecError> {
    let flags = flag(m.extended_header.is_some(), generic_flags::HAS_EXTENDED_HEADER)
        | flag(m.perm_data.is_some(), generic_flags::HAS_PERM_DATA)
        | flag(m.key.is_some(), generic_flags::HAS_MSG_KEY)
        | flag(m.seq_num.is_some(), generic_flags::HAS_SEQ_NUM)
        | flag(m.complete, generic_flags::MESSAGE_COMPLETE)
        | flag(m.secondary_seq_num.is_some(), generic_flags::HAS_SECONDARY_SEQ_NUM)
        | flag(m.part_num.is_some(), generic_flags::HAS_PART_NUM)
        | flag(m.provider_driven, generic_flags::PROVIDER_DRIVEN);
    begin(out, flags, container)?;

    if let Some(seq) = m.seq_num {
        out.put_u32(seq);
    }
    if let Some(seq) = m.secondary_seq_num {
        out.put_u32(seq);
    }
    put_opt_buf15(out, &m.perm_data, "permission data")?;
    if let Some(key) = &m.key {
        put_key(out, key)?;
    }
    put_opt_buf8(out, &m.extended_header, "extended header")?;
    if let Some(part) = m.part_num {
        put_u15rb(out, part as usize, "part number")?;
    }
    Ok(())
}

fn decode_generic(h: Header, r: &mut Reader<'_>, ctx: Ctx<'_>) -> Result<GenericMsg, CodecError> {
    let mut m = GenericMsg {
        stream_id: h.stream_id,
        domain_type: h.domain_type,
        complete: h.has(generic_flags::MESSAGE_COMPLETE),
        provider_driven: h.has(generic_flags::PROVIDER_DRIVEN),
        ..Default::default()
    };
    if h.has(generic_flags::HAS_SEQ_NUM) {
        m.seq_num = Some(r.u32()?);
    }
    if h.has(generic_flags::HAS_SECONDARY_SEQ_NUM) {
        m.secondary_seq_num = Some(r.u32()?);
    }
    if h.has(generic_flags::HAS_PERM_DATA) {
        m.perm_data = Some(copy(r.buf15()?));
    }
    if h.has(generic_flags::HAS_MSG_KEY) {
        m.key = Some(read_key(r, ctx)?);
    }
    if h.has(generic_flags::HAS_EXTENDED_HEADER) {
        m.extended_header = Some(copy(r.buf8()?));
    }
    if h.has(generic_flags::HAS_PART_NUM) && !r.is_empty() {
        m.part_num = Some(r.u15rb()?);
    }
    Ok(m)
}

// ============================================================================
// Post
// ============================================================================

fn encode_post(m: &PostMsg, container: DataType, out: &mut BytesMut) -> Result<(), CodecError> {
    let flags = flag(m.extended_header.is_some(), post_flags::HAS_EXTENDED_HEADER)
        | flag(m.post_id.is_some(), post_flags::HAS_POST_ID)
        | flag(m.key.is_some(), post_flags::HAS_MSG_KEY)
        | flag(m.seq_num.is_some(), post_flags::HAS_SEQ_NUM)
        | flag(m.complete, post_flags::POST_COMPLETE)
        | flag(m.ack, post_flags::ACK)
        | flag(m.perm_data.is_some(), post_flags::HAS_PERM_DATA)
        | flag(m.part_num.is_some(), post_flags::HAS_PART_NUM)
        | flag(m.post_user_rights.is_some(), post_flags::HAS_POST_USER_RIGHTS);
    begin(out, flags, container)?;

    put_post_user_info(out, &m.post_user_info);
    if let Some(seq) = m.seq_num {
        out.put_u32(seq);
    }
    if let Some(id) = m.post_id {
        out.put_u32(id);
    }
    put_opt_buf15(out, &m.perm_data, "permission data")?;
    if let Some(key) = &m.key {
        put_key(out, key)?;
    }
    put_opt_buf8(out, &m.extended_header, "extended header")?;
    if let Some(part) = m.part_num {
        put_u15rb(out, part as usize, "part number")?;
    }
    if let Some(rights) = m.post_user_rights {
        put_u15rb(out, rights as usize, "post user rights")?;
    }
    Ok(())
}

fn decode_post(h: Header, r: &mut Reader<'_>, ctx: Ctx<'_>) -> Result<PostMsg, CodecError> {
    let mut m = PostMsg {
        stream_id: h.stream_id,
        domain_type: h.domain_type,
        complete: h.has(post_flags::POST_COMPLETE),
        ack: h.has(post_flags::ACK),
        ..Default::default()
    };
    m.post_user_info = read_post_user_info(r)?;
    if h.has(post_flags::HAS_SEQ_NUM) {
        m.seq_num = Some(r.u32()?);
    }
    if h.has(post_flags::HAS_POST_ID) {
        m.post_id = Some(r.u32()?);
    }
    if h.has(post_flags::HAS_PERM_DATA) {
        m.perm_data = Some(copy(r.buf15()?));
    }
    if h.has(post_flags::HAS_MSG_KEY) {
        m.key = Some(read_key(r, ctx)?);
    }
    if h.has(post_flags::HAS_EXTENDED_HEADER) {
        m.extended_header = Some(copy(r.buf8()?));
    }
    if h.has(post_flags::HAS_PART_NUM) && !r.is_empty() {
        m.part_num = Some(r.u15rb()?);
    }
    if h.has(post_flags::HAS_POST_USER_RIGHTS) && !r.is_empty() {
        m.post_user_rights = Some(r.u15rb()?);
    }
    Ok(m)
}
