//! Container encoding and the generic `Data` entry points.
//!
//! Layouts (all counts big-endian):
//!
//! ```text
//! FieldList    [flags] [info]? [set data]? [count u16] { [fid i16] [u16ob len] [content] }*
//! ElementList  [flags] [info]? [set data]? [count u16] { [u15rb name] [type] [u16ob len]? [content] }*
//! Map          [flags] [key type] [container-128] [key fid]? [set defs]? [summary]? [hint]? [count u16]
//!              { [action|flags<<4] [perm]? [u15rb key] [u16ob payload]? }*
//! Vector       [flags] [container-128] [set defs]? [summary]? [hint]? [count u16]
//!              { [action|flags<<4] [u30rb index] [perm]? [u16ob payload]? }*
//! Series       [flags] [container-128] [set defs]? [summary]? [hint]? [count u16] { [u16ob payload] }*
//! FilterList   [flags] [container-128] [hint u8]? [count u8]
//!              { [action|flags<<4] [id] [container-128]? [perm]? [u16ob payload]? }*
//! Array        [primitive type] [u16ob item length] [count u16] { fixed item | [u16ob len] item }*
//! ```
//!
//! A failure while decoding one entry's payload does not fail the whole
//! container: the entry becomes `Data::Error` carrying the raw bytes.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use omm_core::{
    Data, DataDictionary, DataType, DecodeError, DecodeErrorCode, ElementEntry, ElementList,
    FieldEntry, FieldList, FieldListInfo, FilterAction, FilterEntry, FilterList, Map, MapAction,
    MapEntry, OmmArray, Series, SetData, Vector, VectorAction, VectorEntry,
};

use crate::error::CodecError;
use crate::msg_codec;
use crate::primitive_codec::{decode_primitive, encode_fixed_width, encode_primitive, utf8};
use crate::wire_types::{
    action_byte, element_list_flags, entry_flags, field_list_flags, filter_list_flags, map_flags,
    put_buf15, put_buf16, put_u15rb, put_u16ob, put_u30rb, read_uint_be, series_flags,
    split_action_byte, vector_flags, Reader, MAX_NESTING_DEPTH, MAX_U16,
};

/// Decoding context threaded through nested containers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ctx<'d> {
    pub dict: Option<&'d DataDictionary>,
    pub depth: usize,
}

impl<'d> Ctx<'d> {
    pub fn new(dict: Option<&'d DataDictionary>) -> Self {
        Ctx { dict, depth: 0 }
    }

    fn nested(self) -> Result<Self, CodecError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(CodecError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        Ok(Ctx {
            dict: self.dict,
            depth: self.depth + 1,
        })
    }
}

// ============================================================================
// Public entry points
// ============================================================================

/// Append the encoded content of any value (no type or length prefix).
pub fn encode_data(data: &Data, out: &mut BytesMut) -> Result<(), CodecError> {
    match data {
        Data::NoData => Ok(()),
        Data::Opaque(b) | Data::AnsiPage(b) => {
            out.put_slice(b);
            Ok(())
        }
        Data::Xml(s) | Data::Json(s) => {
            out.put_slice(s.as_bytes());
            Ok(())
        }
        Data::FieldList(fl) => encode_field_list(fl, out),
        Data::ElementList(el) => encode_element_list(el, out),
        Data::Map(m) => encode_map(m, out),
        Data::Vector(v) => encode_vector(v, out),
        Data::Series(s) => encode_series(s, out),
        Data::FilterList(f) => encode_filter_list(f, out),
        Data::Array(a) => encode_array(a, out),
        Data::Msg(m) => msg_codec::encode_msg(m, out),
        Data::Error(e) => {
            out.put_slice(&e.raw);
            Ok(())
        }
        primitive => encode_primitive(primitive, out),
    }
}

/// Decode content of the given type. FieldList entries are typed through
/// `dict`; without one they decode as `FieldIdNotFound` errors.
pub fn decode_data(
    data_type: DataType,
    content: &[u8],
    dict: Option<&DataDictionary>,
) -> Result<Data, CodecError> {
    decode_with(data_type, content, Ctx::new(dict))
}

pub(crate) fn decode_with(
    data_type: DataType,
    content: &[u8],
    ctx: Ctx<'_>,
) -> Result<Data, CodecError> {
    match data_type {
        DataType::NoData => Ok(Data::NoData),
        DataType::Opaque => Ok(Data::Opaque(Bytes::copy_from_slice(content))),
        DataType::AnsiPage => Ok(Data::AnsiPage(Bytes::copy_from_slice(content))),
        DataType::Xml => Ok(Data::Xml(utf8(content, "xml")?)),
        DataType::Json => Ok(Data::Json(utf8(content, "json")?)),
        DataType::FieldList => decode_field_list(content, ctx).map(Data::FieldList),
        DataType::ElementList => decode_element_list(content, ctx).map(Data::ElementList),
        DataType::Map => decode_map(content, ctx).map(Data::Map),
        DataType::Vector => decode_vector(content, ctx).map(Data::Vector),
        DataType::Series => decode_series(content, ctx).map(Data::Series),
        DataType::FilterList => decode_filter_list(content, ctx).map(Data::FilterList),
        DataType::Array => decode_array(content).map(Data::Array),
        DataType::Msg => {
            let msg = msg_codec::decode_msg_with(content, ctx.nested()?)?;
            Ok(Data::Msg(Box::new(msg)))
        }
        DataType::Unknown => Err(CodecError::UnsupportedType(DataType::Unknown, "decoding")),
        primitive => decode_primitive(primitive, content),
    }
}

/// Decode one entry payload, turning failures into `Data::Error`.
fn decode_entry(data_type: DataType, content: &[u8], ctx: Ctx<'_>) -> Result<Data, CodecError> {
    match decode_with(data_type, content, ctx) {
        Ok(data) => Ok(data),
        Err(CodecError::NestingTooDeep(n)) => Err(CodecError::NestingTooDeep(n)),
        Err(err) => {
            trace!(%data_type, error = %err, "entry payload decode failed");
            let code = match err {
                CodecError::Incomplete => DecodeErrorCode::IncompleteData,
                CodecError::UnsupportedType(..) | CodecError::UnknownDataType(_) => {
                    DecodeErrorCode::UnsupportedDataType
                }
                _ => DecodeErrorCode::InvalidData,
            };
            Ok(error_entry(code, data_type, content))
        }
    }
}

fn error_entry(code: DecodeErrorCode, data_type: DataType, content: &[u8]) -> Data {
    Data::Error(DecodeError {
        code,
        data_type,
        wire_type: None,
        raw: Bytes::copy_from_slice(content),
    })
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Entry payloads must match the container's declared type.
fn check_type(expected: DataType, load: &Data) -> Result<(), CodecError> {
    match load {
        Data::NoData | Data::Error(_) => Ok(()),
        other if other.data_type() == expected => Ok(()),
        other => Err(CodecError::ContainerTypeMismatch {
            expected,
            actual: other.data_type(),
        }),
    }
}

fn put_count(out: &mut BytesMut, n: usize, field: &'static str) -> Result<(), CodecError> {
    if n > MAX_U16 {
        return Err(CodecError::ValueTooLarge {
            field,
            value: n as u64,
        });
    }
    out.put_u16(n as u16);
    Ok(())
}

/// `u16ob` length-prefixed payload.
fn put_payload(out: &mut BytesMut, load: &Data) -> Result<(), CodecError> {
    let mut tmp = BytesMut::new();
    encode_data(load, &mut tmp)?;
    put_buf16(out, &tmp, "entry payload")
}

/// `u15rb` length-prefixed summary.
fn put_summary(out: &mut BytesMut, summary: &Data) -> Result<(), CodecError> {
    let mut tmp = BytesMut::new();
    encode_data(summary, &mut tmp)?;
    put_buf15(out, &tmp, "summary data")
}

fn read_container_type(r: &mut Reader<'_>) -> Result<DataType, CodecError> {
    let b = r.u8()?;
    DataType::from_container_byte(b).ok_or(CodecError::UnknownDataType(b.wrapping_add(128)))
}

fn copy(b: &[u8]) -> Bytes {
    Bytes::copy_from_slice(b)
}

// ============================================================================
// FieldList
// ============================================================================

fn encode_field_list(fl: &FieldList, out: &mut BytesMut) -> Result<(), CodecError> {
    let mut flags = 0u8;
    if fl.info.is_some() {
        flags |= field_list_flags::HAS_FIELD_LIST_INFO;
    }
    if let Some(set) = &fl.set_data {
        flags |= field_list_flags::HAS_SET_DATA;
        if set.set_id != 0 {
            flags |= field_list_flags::HAS_SET_ID;
        }
    }
    if !fl.entries.is_empty() || fl.set_data.is_none() {
        flags |= field_list_flags::HAS_STANDARD_DATA;
    }
    out.put_u8(flags);

    if let Some(info) = &fl.info {
        let mut tmp = BytesMut::new();
        put_u15rb(&mut tmp, info.dictionary_id as usize, "dictionary id")?;
        tmp.put_i16(info.field_list_num);
        out.put_u8(tmp.len() as u8);
        out.put_slice(&tmp);
    }

    if let Some(set) = &fl.set_data {
        put_set_data(
            out,
            set,
            flags & field_list_flags::HAS_SET_ID != 0,
            flags & field_list_flags::HAS_STANDARD_DATA != 0,
        )?;
    }

    if flags & field_list_flags::HAS_STANDARD_DATA != 0 {
        put_count(out, fl.entries.len(), "field list count")?;
        for entry in &fl.entries {
            out.put_i16(entry.field_id);
            put_payload(out, &entry.load)?;
        }
    }
    Ok(())
}

fn put_set_data(
    out: &mut BytesMut,
    set: &SetData,
    has_set_id: bool,
    has_standard: bool,
) -> Result<(), CodecError> {
    if has_set_id {
        put_u15rb(out, set.set_id as usize, "set id")?;
    }
    if has_standard {
        put_buf15(out, &set.raw, "set data")
    } else {
        out.put_slice(&set.raw);
        Ok(())
    }
}

fn read_set_data(
    r: &mut Reader<'_>,
    has_set_id: bool,
    has_standard: bool,
) -> Result<SetData, CodecError> {
    let set_id = if has_set_id { r.u15rb()? } else { 0 };
    let raw = if has_standard { r.buf15()? } else { r.rest() };
    Ok(SetData {
        set_id,
        raw: copy(raw),
    })
}

fn decode_field_list(content: &[u8], ctx: Ctx<'_>) -> Result<FieldList, CodecError> {
    let mut fl = FieldList::new();
    if content.is_empty() {
        return Ok(fl);
    }
    let child = ctx.nested()?;
    let mut r = Reader::new(content);
    let flags = r.u8()?;

    if flags & field_list_flags::HAS_FIELD_LIST_INFO != 0 {
        let len = r.u8()? as usize;
        let start = r.position();
        let dictionary_id = r.u15rb()?;
        let field_list_num = r.i16()?;
        r.skip_to(start + len)?;
        fl.info = Some(FieldListInfo {
            dictionary_id,
            field_list_num,
        });
    }

    let has_standard = flags & field_list_flags::HAS_STANDARD_DATA != 0;
    if flags & field_list_flags::HAS_SET_DATA != 0 {
        fl.set_data = Some(read_set_data(
            &mut r,
            flags & field_list_flags::HAS_SET_ID != 0,
            has_standard,
        )?);
    }

    if has_standard {
        let count = r.u16()?;
        for _ in 0..count {
            let field_id = r.i16()?;
            let raw = r.buf16()?;
            let load = match child.dict.and_then(|d| d.entry(field_id)) {
                Some(def) => decode_entry(def.rwf_type, raw, child)?,
                None => error_entry(DecodeErrorCode::FieldIdNotFound, DataType::Unknown, raw),
            };
            fl.entries.push(FieldEntry { field_id, load });
        }
    }
    Ok(fl)
}

// ============================================================================
// ElementList
// ============================================================================

/// Type byte written for an element; undecodable entries keep the byte
/// they arrived with.
fn element_type_byte(load: &Data) -> u8 {
    match load {
        Data::Error(e) => e.wire_type.unwrap_or_else(|| e.data_type.as_u8()),
        other => other.data_type().as_u8(),
    }
}

fn encode_element_list(el: &ElementList, out: &mut BytesMut) -> Result<(), CodecError> {
    let mut flags = 0u8;
    if el.info.is_some() {
        flags |= element_list_flags::HAS_ELEMENT_LIST_INFO;
    }
    if let Some(set) = &el.set_data {
        flags |= element_list_flags::HAS_SET_DATA;
        if set.set_id != 0 {
            flags |= element_list_flags::HAS_SET_ID;
        }
    }
    if !el.entries.is_empty() || el.set_data.is_none() {
        flags |= element_list_flags::HAS_STANDARD_DATA;
    }
    out.put_u8(flags);

    if let Some(num) = el.info {
        out.put_u8(2);
        out.put_u16(num);
    }

    if let Some(set) = &el.set_data {
        put_set_data(
            out,
            set,
            flags & element_list_flags::HAS_SET_ID != 0,
            flags & element_list_flags::HAS_STANDARD_DATA != 0,
        )?;
    }

    if flags & element_list_flags::HAS_STANDARD_DATA != 0 {
        put_count(out, el.entries.len(), "element list count")?;
        for entry in &el.entries {
            put_buf15(out, entry.name.as_bytes(), "element name")?;
            let type_byte = element_type_byte(&entry.load);
            out.put_u8(type_byte);
            if type_byte != DataType::NoData.as_u8() {
                put_payload(out, &entry.load)?;
            }
        }
    }
    Ok(())
}

fn decode_element_list(content: &[u8], ctx: Ctx<'_>) -> Result<ElementList, CodecError> {
    let mut el = ElementList::new();
    if content.is_empty() {
        return Ok(el);
    }
    let child = ctx.nested()?;
    let mut r = Reader::new(content);
    let flags = r.u8()?;

    if flags & element_list_flags::HAS_ELEMENT_LIST_INFO != 0 {
        let len = r.u8()? as usize;
        let start = r.position();
        el.info = Some(r.u16()?);
        r.skip_to(start + len)?;
    }

    let has_standard = flags & element_list_flags::HAS_STANDARD_DATA != 0;
    if flags & element_list_flags::HAS_SET_DATA != 0 {
        el.set_data = Some(read_set_data(
            &mut r,
            flags & element_list_flags::HAS_SET_ID != 0,
            has_standard,
        )?);
    }

    if has_standard {
        let count = r.u16()?;
        for _ in 0..count {
            let name = utf8(r.buf15()?, "element name")?;
            let type_byte = r.u8()?;
            let load = match DataType::from_u8(type_byte) {
                Some(DataType::NoData) => Data::NoData,
                Some(t) => decode_entry(t, r.buf16()?, child)?,
                None => Data::Error(DecodeError {
                    code: DecodeErrorCode::UnsupportedDataType,
                    data_type: DataType::Unknown,
                    wire_type: Some(type_byte),
                    raw: Bytes::copy_from_slice(r.buf16()?),
                }),
            };
            el.entries.push(ElementEntry { name, load });
        }
    }
    Ok(el)
}

// ============================================================================
// Map
// ============================================================================

fn encode_map(map: &Map, out: &mut BytesMut) -> Result<(), CodecError> {
    if !map.key_type.is_primitive() || map.key_type == DataType::Array {
        return Err(CodecError::UnsupportedType(map.key_type, "map key"));
    }

    let has_perm = map.entries.iter().any(|e| e.perm_data.is_some());
    let mut flags = 0u8;
    if map.set_defs.is_some() {
        flags |= map_flags::HAS_SET_DEFS;
    }
    if map.summary.is_some() {
        flags |= map_flags::HAS_SUMMARY_DATA;
    }
    if has_perm {
        flags |= map_flags::HAS_PER_ENTRY_PERM_DATA;
    }
    if map.total_count_hint.is_some() {
        flags |= map_flags::HAS_TOTAL_COUNT_HINT;
    }
    if map.key_field_id.is_some() {
        flags |= map_flags::HAS_KEY_FIELD_ID;
    }

    out.put_u8(flags);
    out.put_u8(map.key_type.as_u8());
    out.put_u8(map.container_type.to_container_byte());
    if let Some(fid) = map.key_field_id {
        out.put_i16(fid);
    }
    if let Some(defs) = &map.set_defs {
        put_buf15(out, defs, "set definitions")?;
    }
    if let Some(summary) = &map.summary {
        check_type(map.container_type, summary)?;
        put_summary(out, summary)?;
    }
    if let Some(hint) = map.total_count_hint {
        put_u30rb(out, hint, "total count hint")?;
    }

    put_count(out, map.entries.len(), "map count")?;
    for entry in &map.entries {
        let entry_flags = if entry.perm_data.is_some() {
            entry_flags::HAS_PERM_DATA
        } else {
            0
        };
        out.put_u8(action_byte(entry.action as u8, entry_flags));
        if let Some(perm) = &entry.perm_data {
            put_buf15(out, perm, "permission data")?;
        }

        match &entry.key {
            key if key.data_type() == map.key_type => {}
            key => {
                return Err(CodecError::ContainerTypeMismatch {
                    expected: map.key_type,
                    actual: key.data_type(),
                })
            }
        }
        let mut key = BytesMut::new();
        encode_primitive(&entry.key, &mut key)?;
        put_buf15(out, &key, "map key")?;

        if entry.action != MapAction::Delete && map.container_type != DataType::NoData {
            check_type(map.container_type, &entry.load)?;
            put_payload(out, &entry.load)?;
        }
    }
    Ok(())
}

fn decode_map(content: &[u8], ctx: Ctx<'_>) -> Result<Map, CodecError> {
    if content.is_empty() {
        return Ok(Map::new(DataType::Unknown, DataType::NoData));
    }
    let child = ctx.nested()?;
    let mut r = Reader::new(content);
    let flags = r.u8()?;
    let key_byte = r.u8()?;
    let key_type = DataType::from_u8(key_byte)
        .filter(|t| t.is_primitive())
        .ok_or(CodecError::UnknownDataType(key_byte))?;
    let container_type = read_container_type(&mut r)?;

    let mut map = Map::new(key_type, container_type);
    if flags & map_flags::HAS_KEY_FIELD_ID != 0 {
        map.key_field_id = Some(r.i16()?);
    }
    if flags & map_flags::HAS_SET_DEFS != 0 {
        map.set_defs = Some(copy(r.buf15()?));
    }
    if flags & map_flags::HAS_SUMMARY_DATA != 0 {
        let raw = r.buf15()?;
        map.summary = Some(Box::new(decode_entry(container_type, raw, child)?));
    }
    if flags & map_flags::HAS_TOTAL_COUNT_HINT != 0 {
        map.total_count_hint = Some(r.u30rb()?);
    }

    let count = r.u16()?;
    for _ in 0..count {
        let (action, eflags) = split_action_byte(r.u8()?);
        let action = MapAction::from_u8(action).ok_or(CodecError::InvalidData("map entry action"))?;
        let perm_data = if eflags & entry_flags::HAS_PERM_DATA != 0
            && flags & map_flags::HAS_PER_ENTRY_PERM_DATA != 0
        {
            Some(copy(r.buf15()?))
        } else {
            None
        };
        let key = decode_primitive(key_type, r.buf15()?)?;
        let load = if action != MapAction::Delete && container_type != DataType::NoData {
            decode_entry(container_type, r.buf16()?, child)?
        } else {
            Data::NoData
        };
        map.entries.push(MapEntry {
            action,
            key,
            perm_data,
            load,
        });
    }
    Ok(map)
}

// ============================================================================
// Vector
// ============================================================================

fn encode_vector(vector: &Vector, out: &mut BytesMut) -> Result<(), CodecError> {
    let has_perm = vector.entries.iter().any(|e| e.perm_data.is_some());
    let mut flags = 0u8;
    if vector.set_defs.is_some() {
        flags |= vector_flags::HAS_SET_DEFS;
    }
    if vector.summary.is_some() {
        flags |= vector_flags::HAS_SUMMARY_DATA;
    }
    if has_perm {
        flags |= vector_flags::HAS_PER_ENTRY_PERM_DATA;
    }
    if vector.total_count_hint.is_some() {
        flags |= vector_flags::HAS_TOTAL_COUNT_HINT;
    }
    if vector.supports_sorting {
        flags |= vector_flags::SUPPORTS_SORTING;
    }

    out.put_u8(flags);
    out.put_u8(vector.container_type.to_container_byte());
    if let Some(defs) = &vector.set_defs {
        put_buf15(out, defs, "set definitions")?;
    }
    if let Some(summary) = &vector.summary {
        check_type(vector.container_type, summary)?;
        put_summary(out, summary)?;
    }
    if let Some(hint) = vector.total_count_hint {
        put_u30rb(out, hint, "total count hint")?;
    }

    put_count(out, vector.entries.len(), "vector count")?;
    for entry in &vector.entries {
        let entry_flags = if entry.perm_data.is_some() {
            entry_flags::HAS_PERM_DATA
        } else {
            0
        };
        out.put_u8(action_byte(entry.action as u8, entry_flags));
        put_u30rb(out, entry.index, "vector index")?;
        if let Some(perm) = &entry.perm_data {
            put_buf15(out, perm, "permission data")?;
        }
        if entry.action.has_payload() && vector.container_type != DataType::NoData {
            check_type(vector.container_type, &entry.load)?;
            put_payload(out, &entry.load)?;
        }
    }
    Ok(())
}

fn decode_vector(content: &[u8], ctx: Ctx<'_>) -> Result<Vector, CodecError> {
    if content.is_empty() {
        return Ok(Vector::new(DataType::NoData));
    }
    let child = ctx.nested()?;
    let mut r = Reader::new(content);
    let flags = r.u8()?;
    let container_type = read_container_type(&mut r)?;

    let mut vector = Vector::new(container_type);
    vector.supports_sorting = flags & vector_flags::SUPPORTS_SORTING != 0;
    if flags & vector_flags::HAS_SET_DEFS != 0 {
        vector.set_defs = Some(copy(r.buf15()?));
    }
    if flags & vector_flags::HAS_SUMMARY_DATA != 0 {
        let raw = r.buf15()?;
        vector.summary = Some(Box::new(decode_entry(container_type, raw, child)?));
    }
    if flags & vector_flags::HAS_TOTAL_COUNT_HINT != 0 {
        vector.total_count_hint = Some(r.u30rb()?);
    }

    let count = r.u16()?;
    for _ in 0..count {
        let (action, eflags) = split_action_byte(r.u8()?);
        let action =
            VectorAction::from_u8(action).ok_or(CodecError::InvalidData("vector entry action"))?;
        let index = r.u30rb()?;
        let perm_data = if eflags & entry_flags::HAS_PERM_DATA != 0
            && flags & vector_flags::HAS_PER_ENTRY_PERM_DATA != 0
        {
            Some(copy(r.buf15()?))
        } else {
            None
        };
        let load = if action.has_payload() && container_type != DataType::NoData {
            decode_entry(container_type, r.buf16()?, child)?
        } else {
            Data::NoData
        };
        vector.entries.push(VectorEntry {
            index,
            action,
            perm_data,
            load,
        });
    }
    Ok(vector)
}

// ============================================================================
// Series
// ============================================================================

fn encode_series(series: &Series, out: &mut BytesMut) -> Result<(), CodecError> {
    let mut flags = 0u8;
    if series.set_defs.is_some() {
        flags |= series_flags::HAS_SET_DEFS;
    }
    if series.summary.is_some() {
        flags |= series_flags::HAS_SUMMARY_DATA;
    }
    if series.total_count_hint.is_some() {
        flags |= series_flags::HAS_TOTAL_COUNT_HINT;
    }

    out.put_u8(flags);
    out.put_u8(series.container_type.to_container_byte());
    if let Some(defs) = &series.set_defs {
        put_buf15(out, defs, "set definitions")?;
    }
    if let Some(summary) = &series.summary {
        check_type(series.container_type, summary)?;
        put_summary(out, summary)?;
    }
    if let Some(hint) = series.total_count_hint {
        put_u30rb(out, hint, "total count hint")?;
    }

    put_count(out, series.entries.len(), "series count")?;
    for load in &series.entries {
        if series.container_type != DataType::NoData {
            check_type(series.container_type, load)?;
            put_payload(out, load)?;
        }
    }
    Ok(())
}

fn decode_series(content: &[u8], ctx: Ctx<'_>) -> Result<Series, CodecError> {
    if content.is_empty() {
        return Ok(Series::new(DataType::NoData));
    }
    let child = ctx.nested()?;
    let mut r = Reader::new(content);
    let flags = r.u8()?;
    let container_type = read_container_type(&mut r)?;

    let mut series = Series::new(container_type);
    if flags & series_flags::HAS_SET_DEFS != 0 {
        series.set_defs = Some(copy(r.buf15()?));
    }
    if flags & series_flags::HAS_SUMMARY_DATA != 0 {
        let raw = r.buf15()?;
        series.summary = Some(Box::new(decode_entry(container_type, raw, child)?));
    }
    if flags & series_flags::HAS_TOTAL_COUNT_HINT != 0 {
        series.total_count_hint = Some(r.u30rb()?);
    }

    let count = r.u16()?;
    for _ in 0..count {
        let load = if container_type != DataType::NoData {
            decode_entry(container_type, r.buf16()?, child)?
        } else {
            Data::NoData
        };
        series.entries.push(load);
    }
    Ok(series)
}

// ============================================================================
// FilterList
// ============================================================================

fn encode_filter_list(list: &FilterList, out: &mut BytesMut) -> Result<(), CodecError> {
    if list.entries.len() > u8::MAX as usize {
        return Err(CodecError::ValueTooLarge {
            field: "filter list count",
            value: list.entries.len() as u64,
        });
    }

    let has_perm = list.entries.iter().any(|e| e.perm_data.is_some());
    let mut flags = 0u8;
    if has_perm {
        flags |= filter_list_flags::HAS_PER_ENTRY_PERM_DATA;
    }
    if list.total_count_hint.is_some() {
        flags |= filter_list_flags::HAS_TOTAL_COUNT_HINT;
    }

    out.put_u8(flags);
    out.put_u8(list.container_type.to_container_byte());
    if let Some(hint) = list.total_count_hint {
        out.put_u8(hint);
    }
    out.put_u8(list.entries.len() as u8);

    for entry in &list.entries {
        let mut eflags = 0u8;
        if entry.perm_data.is_some() {
            eflags |= entry_flags::HAS_PERM_DATA;
        }
        if entry.container_type.is_some() {
            eflags |= entry_flags::HAS_CONTAINER_TYPE;
        }
        out.put_u8(action_byte(entry.action as u8, eflags));
        out.put_u8(entry.id);
        if let Some(t) = entry.container_type {
            if !t.is_container() {
                return Err(CodecError::UnsupportedType(t, "filter entry container type"));
            }
            out.put_u8(t.to_container_byte());
        }
        if let Some(perm) = &entry.perm_data {
            put_buf15(out, perm, "permission data")?;
        }
        let effective = entry.effective_type(list.container_type);
        if entry.action != FilterAction::Clear && effective != DataType::NoData {
            check_type(effective, &entry.load)?;
            put_payload(out, &entry.load)?;
        }
    }
    Ok(())
}

fn decode_filter_list(content: &[u8], ctx: Ctx<'_>) -> Result<FilterList, CodecError> {
    if content.is_empty() {
        return Ok(FilterList::new(DataType::NoData));
    }
    let child = ctx.nested()?;
    let mut r = Reader::new(content);
    let flags = r.u8()?;
    let container_type = read_container_type(&mut r)?;

    let mut list = FilterList::new(container_type);
    if flags & filter_list_flags::HAS_TOTAL_COUNT_HINT != 0 {
        list.total_count_hint = Some(r.u8()?);
    }

    let count = r.u8()?;
    for _ in 0..count {
        let (action, eflags) = split_action_byte(r.u8()?);
        let action =
            FilterAction::from_u8(action).ok_or(CodecError::InvalidData("filter entry action"))?;
        let id = r.u8()?;
        let entry_type = if eflags & entry_flags::HAS_CONTAINER_TYPE != 0 {
            Some(read_container_type(&mut r)?)
        } else {
            None
        };
        let perm_data = if eflags & entry_flags::HAS_PERM_DATA != 0
            && flags & filter_list_flags::HAS_PER_ENTRY_PERM_DATA != 0
        {
            Some(copy(r.buf15()?))
        } else {
            None
        };
        let effective = entry_type.unwrap_or(container_type);
        let load = if action != FilterAction::Clear && effective != DataType::NoData {
            decode_entry(effective, r.buf16()?, child)?
        } else {
            Data::NoData
        };
        list.entries.push(FilterEntry {
            id,
            action,
            container_type: entry_type,
            perm_data,
            load,
        });
    }
    Ok(list)
}

// ============================================================================
// Array
// ============================================================================

fn encode_array(array: &OmmArray, out: &mut BytesMut) -> Result<(), CodecError> {
    let t = array.primitive_type;
    if !t.is_primitive() || t == DataType::Array {
        return Err(CodecError::UnsupportedType(t, "array item"));
    }

    out.put_u8(t.as_u8());
    put_u16ob(out, array.item_length as usize, "array item length")?;
    put_count(out, array.entries.len(), "array count")?;

    for item in &array.entries {
        if item.data_type() != t {
            return Err(CodecError::ContainerTypeMismatch {
                expected: t,
                actual: item.data_type(),
            });
        }
        if array.item_length > 0 {
            encode_fixed_width(item, array.item_length as usize, out)?;
        } else {
            let mut tmp = BytesMut::new();
            encode_primitive(item, &mut tmp)?;
            put_buf16(out, &tmp, "array item")?;
        }
    }
    Ok(())
}

fn decode_array(content: &[u8]) -> Result<OmmArray, CodecError> {
    let mut r = Reader::new(content);
    let type_byte = r.u8()?;
    let t = DataType::from_u8(type_byte)
        .filter(|t| t.is_primitive() && *t != DataType::Array)
        .ok_or(CodecError::UnknownDataType(type_byte))?;
    let item_length = r.u16ob()?;
    let count = r.u16()?;

    let mut array = OmmArray::new(t).fixed_width(item_length);
    for _ in 0..count {
        let item = if item_length > 0 {
            let raw = r.bytes(item_length as usize)?;
            if t == DataType::Enum {
                let v = read_uint_be(raw)?;
                Data::Enum(u16::try_from(v).map_err(|_| CodecError::InvalidData("enum value"))?)
            } else {
                decode_primitive(t, raw)?
            }
        } else {
            decode_primitive(t, r.buf16()?)?
        };
        array.entries.push(item);
    }
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use omm_core::{real_hint, Real};

    fn encoded(data: &Data) -> Vec<u8> {
        let mut out = BytesMut::new();
        encode_data(data, &mut out).unwrap();
        out.to_vec()
    }

    #[test]
    fn field_list_layout() {
        let fl = FieldList::new().add(22, Real::new(3990, real_hint::EXPONENT_2));
        assert_eq!(
            encoded(&fl.into()),
            vec![0x08, 0x00, 0x01, 0x00, 0x16, 0x03, 0x0C, 0x0F, 0x96]
        );
    }

    #[test]
    fn field_list_without_dictionary_keeps_raw_entries() {
        let fl = FieldList::new().add(22, Real::new(3990, real_hint::EXPONENT_2));
        let bytes = encoded(&fl.into());
        let decoded = decode_data(DataType::FieldList, &bytes, None).unwrap();
        let entry = &decoded.as_field_list().unwrap().entries[0];
        match &entry.load {
            Data::Error(e) => {
                assert_eq!(e.code, DecodeErrorCode::FieldIdNotFound);
                assert_eq!(&e.raw[..], &[0x0C, 0x0F, 0x96]);
            }
            other => panic!("unexpected {:?}", other),
        }
        // Raw bytes survive a re-encode.
        assert_eq!(encoded(&decoded), bytes);
    }

    #[test]
    fn element_list_round_trip() {
        let el = ElementList::new()
            .with_info(7)
            .add("Name", "TRI.N")
            .add("Count", 12u64)
            .add("Nothing", Data::NoData);
        let data: Data = el.into();
        assert_eq!(decode_data(DataType::ElementList, &encoded(&data), None).unwrap(), data);
    }

    #[test]
    fn map_rejects_mismatched_payload() {
        let map = Map::new(DataType::AsciiString, DataType::FieldList)
            .add(MapAction::Add, "A", ElementList::new());
        let err = encode_data(&map.into(), &mut BytesMut::new()).unwrap_err();
        assert_eq!(
            err,
            CodecError::ContainerTypeMismatch {
                expected: DataType::FieldList,
                actual: DataType::ElementList
            }
        );
    }

    #[test]
    fn map_delete_has_no_payload() {
        let map = Map::new(DataType::Buffer, DataType::ElementList)
            .add(MapAction::Delete, Data::Buffer(Bytes::from_static(b"k")), Data::NoData);
        let bytes = encoded(&map.clone().into());
        // flags, key type, container, count(2), action, key len, key
        assert_eq!(bytes.len(), 8);
        assert_eq!(decode_data(DataType::Map, &bytes, None).unwrap(), Data::Map(map));
    }

    #[test]
    fn empty_content_decodes_as_empty_container() {
        assert_eq!(
            decode_data(DataType::Map, &[], None).unwrap(),
            Data::Map(Map::new(DataType::Unknown, DataType::NoData))
        );
        assert_eq!(
            decode_data(DataType::FieldList, &[], None).unwrap(),
            Data::FieldList(FieldList::new())
        );
    }

    #[test]
    fn truncated_entry_becomes_error_entry() {
        let el = ElementList::new().add("Nested", ElementList::new().add("X", 1i64));
        let mut bytes = encoded(&el.into());
        // Shrink the nested payload's declared length.
        let len_pos = bytes.len() - 9;
        assert_eq!(bytes[len_pos], 8);
        bytes[len_pos] = 3;
        bytes.truncate(len_pos + 4);
        let decoded = decode_data(DataType::ElementList, &bytes, None).unwrap();
        match &decoded.as_element_list().unwrap().entries[0].load {
            Data::Error(e) => {
                assert_eq!(e.code, DecodeErrorCode::IncompleteData);
                assert_eq!(e.data_type, DataType::ElementList);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_element_type_is_written_back() {
        let bytes = vec![0x08, 0x00, 0x01, 0x01, b'X', 0x07, 0x02, 0xAA, 0xBB];
        let decoded = decode_data(DataType::ElementList, &bytes, None).unwrap();
        match &decoded.as_element_list().unwrap().entries[0].load {
            Data::Error(e) => {
                assert_eq!(e.code, DecodeErrorCode::UnsupportedDataType);
                assert_eq!(e.wire_type, Some(7));
                assert_eq!(&e.raw[..], &[0xAA, 0xBB]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(encoded(&decoded), bytes);
    }

    #[test]
    fn nesting_is_bounded() {
        let mut data: Data = ElementList::new().add("leaf", 1i64).into();
        for _ in 0..MAX_NESTING_DEPTH + 1 {
            data = ElementList::new().add("e", data).into();
        }
        let bytes = encoded(&data);
        assert!(matches!(
            decode_data(DataType::ElementList, &bytes, None),
            Err(CodecError::NestingTooDeep(_))
        ));
    }

    #[test]
    fn fixed_width_array() {
        let array = OmmArray::new(DataType::UInt).fixed_width(2).add(1u64).add(0xFFFFu64);
        let bytes = encoded(&array.clone().into());
        assert_eq!(bytes, vec![4, 2, 0, 2, 0, 1, 0xFF, 0xFF]);
        assert_eq!(decode_data(DataType::Array, &bytes, None).unwrap(), Data::Array(array));
    }

    #[test]
    fn filter_list_entry_type_override() {
        let list = FilterList::new(DataType::ElementList)
            .add(1, FilterAction::Set, ElementList::new().add("Name", "DIRECT_FEED"))
            .add_entry(FilterEntry {
                id: 2,
                action: FilterAction::Update,
                container_type: Some(DataType::Map),
                perm_data: Some(Bytes::from_static(&[0x03, 0x01])),
                load: Map::new(DataType::UInt, DataType::FilterList).into(),
            })
            .add(3, FilterAction::Clear, Data::NoData);
        let data: Data = list.into();
        assert_eq!(decode_data(DataType::FilterList, &encoded(&data), None).unwrap(), data);
    }
}
