//! Human-readable forms.
//!
//! - `render_msg` prints a decoded message as indented XML-like text, one
//!   element per header member and per container entry
//! - `parse_field_assignment` turns `ACRONYM=value` or `FID=value` into a
//!   typed `FieldEntry` using the dictionary's RWF type

use std::fmt::Write;

use omm_core::{
    domain, real_hint, Data, DataDictionary, DataType, Date, DateTime, FieldEntry, Msg, MsgKey,
    Real, State, Time,
};

use crate::error::CodecError;

const INDENT: &str = "    ";

// ============================================================================
// Rendering
// ============================================================================

/// Render a message. Field names and enum displays are looked up in
/// `dict` when given.
pub fn render_msg(msg: &Msg, dict: Option<&DataDictionary>) -> String {
    let mut r = Renderer {
        out: String::new(),
        dict,
        level: 0,
    };
    r.msg(msg);
    r.out
}

/// Render any value on its own.
pub fn render_data(data: &Data, dict: Option<&DataDictionary>) -> String {
    let mut r = Renderer {
        out: String::new(),
        dict,
        level: 0,
    };
    r.data(data);
    r.out
}

struct Renderer<'d> {
    out: String,
    dict: Option<&'d DataDictionary>,
    level: usize,
}

/// `name="value"` pairs for one element.
type Attrs = Vec<(&'static str, String)>;

impl<'d> Renderer<'d> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.level {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn element(&mut self, tag: &str, attrs: &Attrs, closed: bool) {
        let mut s = format!("<{}", tag);
        for (name, value) in attrs {
            let _ = write!(s, " {}=\"{}\"", name, escape(value));
        }
        s.push_str(if closed { "/>" } else { ">" });
        self.line(&s);
    }

    fn open(&mut self, tag: &str, attrs: &Attrs) {
        self.element(tag, attrs, false);
        self.level += 1;
    }

    fn close(&mut self, tag: &str) {
        self.level = self.level.saturating_sub(1);
        self.line(&format!("</{}>", tag));
    }

    // ------------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------------

    fn msg(&mut self, msg: &Msg) {
        let tag = msg_tag(msg);
        let mut attrs: Attrs = vec![
            ("domainType", domain::name(msg.domain_type()).to_string()),
            ("streamId", msg.stream_id().to_string()),
            ("containerType", msg.payload().data_type().name().to_string()),
        ];

        match msg {
            Msg::Request(m) => {
                push_flag(&mut attrs, "streaming", m.streaming);
                push_flag(&mut attrs, "noRefresh", m.no_refresh);
                push_flag(&mut attrs, "privateStream", m.private_stream);
                push_flag(&mut attrs, "pause", m.pause);
                if let Some(p) = m.priority {
                    attrs.push(("priorityClass", p.class.to_string()));
                    attrs.push(("priorityCount", p.count.to_string()));
                }
                if let Some(q) = &m.qos {
                    attrs.push(("qos", q.to_string()));
                }
                if let Some(q) = &m.worst_qos {
                    attrs.push(("worstQos", q.to_string()));
                }
            }
            Msg::Refresh(m) => {
                push_flag(&mut attrs, "solicited", m.solicited);
                push_flag(&mut attrs, "complete", m.complete);
                push_flag(&mut attrs, "clearCache", m.clear_cache);
                push_flag(&mut attrs, "doNotCache", m.do_not_cache);
                push_flag(&mut attrs, "privateStream", m.private_stream);
                push_state(&mut attrs, &m.state);
                attrs.push(("groupId", hex(&m.group_id)));
                push_opt(&mut attrs, "seqNum", m.seq_num);
                push_opt(&mut attrs, "partNum", m.part_num);
                if let Some(q) = &m.qos {
                    attrs.push(("qos", q.to_string()));
                }
                if let Some(p) = &m.perm_data {
                    attrs.push(("permData", hex(p)));
                }
                if let Some(info) = &m.post_user_info {
                    attrs.push(("postUserAddr", info.address.to_string()));
                    attrs.push(("postUserId", info.user_id.to_string()));
                }
            }
            Msg::Status(m) => {
                push_flag(&mut attrs, "clearCache", m.clear_cache);
                push_flag(&mut attrs, "privateStream", m.private_stream);
                if let Some(s) = &m.state {
                    push_state(&mut attrs, s);
                }
                if let Some(g) = &m.group_id {
                    attrs.push(("groupId", hex(g)));
                }
                if let Some(p) = &m.perm_data {
                    attrs.push(("permData", hex(p)));
                }
            }
            Msg::Update(m) => {
                attrs.push(("updateType", m.update_type.to_string()));
                push_flag(&mut attrs, "doNotCache", m.do_not_cache);
                push_flag(&mut attrs, "doNotConflate", m.do_not_conflate);
                push_flag(&mut attrs, "doNotRipple", m.do_not_ripple);
                push_flag(&mut attrs, "discardable", m.discardable);
                push_opt(&mut attrs, "seqNum", m.seq_num);
                if let Some(c) = m.conflation {
                    attrs.push(("conflationCount", c.count.to_string()));
                    attrs.push(("conflationTime", c.time.to_string()));
                }
                if let Some(p) = &m.perm_data {
                    attrs.push(("permData", hex(p)));
                }
                if let Some(info) = &m.post_user_info {
                    attrs.push(("postUserAddr", info.address.to_string()));
                    attrs.push(("postUserId", info.user_id.to_string()));
                }
            }
            Msg::Close(m) => {
                push_flag(&mut attrs, "ack", m.ack);
            }
            Msg::Ack(m) => {
                attrs.push(("ackId", m.ack_id.to_string()));
                if let Some(code) = m.nak_code {
                    attrs.push(("nakCode", code.name().to_string()));
                }
                if let Some(text) = &m.text {
                    attrs.push(("text", text.clone()));
                }
                push_opt(&mut attrs, "seqNum", m.seq_num);
            }
            Msg::Generic(m) => {
                push_flag(&mut attrs, "complete", m.complete);
                push_opt(&mut attrs, "seqNum", m.seq_num);
                push_opt(&mut attrs, "secondarySeqNum", m.secondary_seq_num);
                push_opt(&mut attrs, "partNum", m.part_num);
            }
            Msg::Post(m) => {
                push_flag(&mut attrs, "complete", m.complete);
                push_flag(&mut attrs, "ack", m.ack);
                attrs.push(("postUserAddr", m.post_user_info.address.to_string()));
                attrs.push(("postUserId", m.post_user_info.user_id.to_string()));
                push_opt(&mut attrs, "seqNum", m.seq_num);
                push_opt(&mut attrs, "postId", m.post_id);
                push_opt(&mut attrs, "partNum", m.part_num);
                push_opt(&mut attrs, "postUserRights", m.post_user_rights);
            }
        }

        self.open(tag, &attrs);
        if let Some(key) = msg.key() {
            self.key(key);
        }
        if let Some(ext) = msg.extended_header() {
            self.element("extendedHeader", &vec![("data", hex(ext))], true);
        }
        if !matches!(msg.payload(), Data::NoData) {
            self.open("dataBody", &Vec::new());
            self.data(msg.payload());
            self.close("dataBody");
        }
        self.close(tag);
    }

    fn key(&mut self, key: &MsgKey) {
        let mut attrs: Attrs = Vec::new();
        push_opt(&mut attrs, "serviceId", key.service_id);
        if let Some(name) = &key.name {
            attrs.push(("name", name.clone()));
        }
        push_opt(&mut attrs, "nameType", key.name_type);
        push_opt(&mut attrs, "filter", key.filter);
        push_opt(&mut attrs, "identifier", key.identifier);

        match &key.attrib {
            Some(attrib) => {
                attrs.push(("attribContainerType", attrib.data_type().name().to_string()));
                self.open("key", &attrs);
                self.open("attrib", &Vec::new());
                self.data(attrib);
                self.close("attrib");
                self.close("key");
            }
            None => self.element("key", &attrs, true),
        }
    }

    // ------------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------------

    fn data(&mut self, data: &Data) {
        match data {
            Data::NoData => {}
            Data::FieldList(fl) => {
                let mut attrs: Attrs = Vec::new();
                if let Some(info) = &fl.info {
                    attrs.push(("dictionaryId", info.dictionary_id.to_string()));
                    attrs.push(("fieldListNum", info.field_list_num.to_string()));
                }
                self.open("fieldList", &attrs);
                for entry in &fl.entries {
                    let def = self.dict.and_then(|d| d.entry(entry.field_id));
                    let mut attrs: Attrs = vec![("fieldId", entry.field_id.to_string())];
                    if let Some(def) = def {
                        attrs.push(("acronym", def.acronym.clone()));
                    }
                    self.entry("fieldEntry", attrs, &entry.load, Some(entry.field_id));
                }
                self.close("fieldList");
            }
            Data::ElementList(el) => {
                let mut attrs: Attrs = Vec::new();
                push_opt(&mut attrs, "elementListNum", el.info);
                self.open("elementList", &attrs);
                for entry in &el.entries {
                    self.entry("elementEntry", vec![("name", entry.name.clone())], &entry.load, None);
                }
                self.close("elementList");
            }
            Data::Map(map) => {
                let mut attrs: Attrs = vec![
                    ("keyPrimitiveType", map.key_type.name().to_string()),
                    ("containerType", map.container_type.name().to_string()),
                    ("countHint", map.total_count_hint.unwrap_or(0).to_string()),
                ];
                push_opt(&mut attrs, "keyFieldId", map.key_field_id);
                self.open("map", &attrs);
                self.summary(map.summary.as_deref());
                for entry in &map.entries {
                    let mut attrs: Attrs = vec![
                        ("action", entry.action.name().to_string()),
                        ("key", primitive_text(&entry.key, None, self.dict)),
                    ];
                    if let Some(p) = &entry.perm_data {
                        attrs.push(("permData", hex(p)));
                    }
                    self.container_entry("mapEntry", attrs, &entry.load);
                }
                self.close("map");
            }
            Data::Vector(v) => {
                let mut attrs: Attrs = vec![("containerType", v.container_type.name().to_string())];
                push_flag(&mut attrs, "sortable", v.supports_sorting);
                self.open("vector", &attrs);
                self.summary(v.summary.as_deref());
                for entry in &v.entries {
                    let mut attrs: Attrs = vec![
                        ("index", entry.index.to_string()),
                        ("action", entry.action.name().to_string()),
                    ];
                    if let Some(p) = &entry.perm_data {
                        attrs.push(("permData", hex(p)));
                    }
                    self.container_entry("vectorEntry", attrs, &entry.load);
                }
                self.close("vector");
            }
            Data::Series(s) => {
                let attrs: Attrs = vec![("containerType", s.container_type.name().to_string())];
                self.open("series", &attrs);
                self.summary(s.summary.as_deref());
                for load in &s.entries {
                    self.container_entry("seriesEntry", Vec::new(), load);
                }
                self.close("series");
            }
            Data::FilterList(f) => {
                let attrs: Attrs = vec![("containerType", f.container_type.name().to_string())];
                self.open("filterList", &attrs);
                for entry in &f.entries {
                    let mut attrs: Attrs = vec![
                        ("id", entry.id.to_string()),
                        ("action", entry.action.name().to_string()),
                    ];
                    if let Some(t) = entry.container_type {
                        attrs.push(("containerType", t.name().to_string()));
                    }
                    if let Some(p) = &entry.perm_data {
                        attrs.push(("permData", hex(p)));
                    }
                    self.container_entry("filterEntry", attrs, &entry.load);
                }
                self.close("filterList");
            }
            Data::Array(a) => {
                let attrs: Attrs = vec![
                    ("itemLength", a.item_length.to_string()),
                    ("primitiveType", a.primitive_type.name().to_string()),
                ];
                self.open("array", &attrs);
                for item in &a.entries {
                    let attrs: Attrs = vec![("data", primitive_text(item, None, self.dict))];
                    self.element("arrayEntry", &attrs, true);
                }
                self.close("array");
            }
            Data::Msg(m) => self.msg(m),
            Data::Opaque(b) | Data::AnsiPage(b) => {
                let tag = if matches!(data, Data::Opaque(_)) { "opaque" } else { "ansiPage" };
                self.element(tag, &vec![("data", hex(b))], true);
            }
            Data::Xml(s) => self.element("xml", &vec![("data", s.clone())], true),
            Data::Json(s) => self.element("json", &vec![("data", s.clone())], true),
            Data::Error(e) => {
                let attrs: Attrs = vec![
                    ("decodeError", e.code.name().to_string()),
                    ("raw", hex(&e.raw)),
                ];
                self.element("error", &attrs, true);
            }
            primitive => {
                let attrs: Attrs = vec![
                    ("dataType", primitive.data_type().name().to_string()),
                    ("data", primitive_text(primitive, None, self.dict)),
                ];
                self.element("primitive", &attrs, true);
            }
        }
    }

    fn summary(&mut self, summary: Option<&Data>) {
        if let Some(s) = summary {
            self.open("summaryData", &Vec::new());
            self.data(s);
            self.close("summaryData");
        }
    }

    /// Entry of a FieldList or ElementList: primitives inline, containers nested.
    fn entry(&mut self, tag: &str, mut attrs: Attrs, load: &Data, fid: Option<i16>) {
        match load {
            Data::Error(e) => {
                attrs.push(("decodeError", e.code.name().to_string()));
                attrs.push(("raw", hex(&e.raw)));
                self.element(tag, &attrs, true);
            }
            Data::NoData => {
                attrs.push(("dataType", "NO_DATA".to_string()));
                self.element(tag, &attrs, true);
            }
            other if other.data_type().is_primitive() && !matches!(other, Data::Array(_)) => {
                attrs.push(("dataType", other.data_type().name().to_string()));
                attrs.push(("data", primitive_text(other, fid, self.dict)));
                self.element(tag, &attrs, true);
            }
            other => {
                attrs.push(("dataType", other.data_type().name().to_string()));
                self.open(tag, &attrs);
                self.data(other);
                self.close(tag);
            }
        }
    }

    fn container_entry(&mut self, tag: &str, attrs: Attrs, load: &Data) {
        if matches!(load, Data::NoData) {
            self.element(tag, &attrs, true);
        } else {
            self.open(tag, &attrs);
            self.data(load);
            self.close(tag);
        }
    }
}

fn msg_tag(msg: &Msg) -> &'static str {
    match msg {
        Msg::Request(_) => "requestMsg",
        Msg::Refresh(_) => "refreshMsg",
        Msg::Status(_) => "statusMsg",
        Msg::Update(_) => "updateMsg",
        Msg::Close(_) => "closeMsg",
        Msg::Ack(_) => "ackMsg",
        Msg::Generic(_) => "genericMsg",
        Msg::Post(_) => "postMsg",
    }
}

fn push_flag(attrs: &mut Attrs, name: &'static str, set: bool) {
    if set {
        attrs.push((name, "true".to_string()));
    }
}

fn push_opt<T: ToString>(attrs: &mut Attrs, name: &'static str, v: Option<T>) {
    if let Some(v) = v {
        attrs.push((name, v.to_string()));
    }
}

fn push_state(attrs: &mut Attrs, state: &State) {
    attrs.push(("streamState", state.stream_state.name().to_string()));
    attrs.push(("dataState", state.data_state.name().to_string()));
    attrs.push(("code", state.code.name().to_string()));
    attrs.push(("text", state.text.clone()));
}

/// Text of a primitive value. Enums are shown with their display when
/// the field id resolves to an enum table.
pub fn primitive_text(data: &Data, fid: Option<i16>, dict: Option<&DataDictionary>) -> String {
    match data {
        Data::Blank(_) => "(blank data)".to_string(),
        Data::Int(v) => v.to_string(),
        Data::UInt(v) => v.to_string(),
        Data::Float(v) => v.to_string(),
        Data::Double(v) => v.to_string(),
        Data::Real(r) => r.to_string(),
        Data::Date(d) => d.to_string(),
        Data::Time(t) => t.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::Qos(q) => q.to_string(),
        Data::State(s) => s.to_string(),
        Data::Enum(v) => {
            let display = fid.and_then(|fid| dict?.enum_type(fid, *v));
            match display {
                Some(t) => format!("{} ({})", v, t.display_str().trim_end()),
                None => v.to_string(),
            }
        }
        Data::Buffer(b) => hex(b),
        Data::Ascii(s) | Data::Utf8(s) => s.clone(),
        Data::Rmtes(b) => String::from_utf8_lossy(b).into_owned(),
        other => other.data_type().name().to_string(),
    }
}

fn hex(b: &[u8]) -> String {
    let mut s = String::with_capacity(b.len() * 2);
    for byte in b {
        let _ = write!(s, "{:02X}", byte);
    }
    s
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse `NAME=value` (or `FID=value`) into a field entry typed by the
/// dictionary. An empty value gives a blank of the field's type.
pub fn parse_field_assignment(text: &str, dict: &DataDictionary) -> Result<FieldEntry, CodecError> {
    let (name, value) = text
        .split_once('=')
        .ok_or(CodecError::InvalidData("expected FIELD=VALUE"))?;
    let name = name.trim();
    let value = value.trim();

    let def = match name.parse::<i16>() {
        Ok(fid) => dict.entry(fid),
        Err(_) => dict.entry_by_name(name),
    }
    .ok_or_else(|| CodecError::UnknownField(name.to_string()))?;

    let load = parse_value(def.rwf_type, value, def.fid, dict)?;
    Ok(FieldEntry {
        field_id: def.fid,
        load,
    })
}

fn parse_value(t: DataType, value: &str, fid: i16, dict: &DataDictionary) -> Result<Data, CodecError> {
    if value.is_empty() {
        return Ok(Data::Blank(t));
    }
    let bad = || CodecError::InvalidData("value does not match field type");

    let data = match t {
        DataType::Int => Data::Int(value.parse().map_err(|_| bad())?),
        DataType::UInt => Data::UInt(value.parse().map_err(|_| bad())?),
        DataType::Float => Data::Float(value.parse().map_err(|_| bad())?),
        DataType::Double => Data::Double(value.parse().map_err(|_| bad())?),
        DataType::Real => Data::Real(parse_real(value).ok_or_else(bad)?),
        DataType::Enum => match value.parse::<u16>() {
            Ok(v) => Data::Enum(v),
            Err(_) => Data::Enum(dict.enum_value_by_display(fid, value).ok_or_else(bad)?),
        },
        DataType::Date => Data::Date(parse_date(value).ok_or_else(bad)?),
        DataType::Time => Data::Time(parse_time(value).ok_or_else(bad)?),
        DataType::DateTime => {
            let (d, t) = value
                .split_once(|c| c == 'T' || c == ' ')
                .ok_or_else(bad)?;
            let dt = DateTime::new(
                parse_date(d).ok_or_else(bad)?,
                parse_time(t).ok_or_else(bad)?,
            );
            Data::DateTime(dt)
        }
        DataType::Buffer => Data::Buffer(value.as_bytes().to_vec().into()),
        DataType::AsciiString => Data::Ascii(value.to_string()),
        DataType::Utf8String => Data::Utf8(value.to_string()),
        DataType::RmtesString => Data::Rmtes(value.as_bytes().to_vec().into()),
        other => return Err(CodecError::UnsupportedType(other, "text field value")),
    };
    Ok(data)
}

/// Decimal text to a Real with the exponent hint matching the number of
/// decimals given (`"12.50"` is `1250 * 10^-2`).
pub fn parse_real(text: &str) -> Option<Real> {
    match text {
        "Inf" | "+Inf" => return Some(Real::new(0, real_hint::INFINITY)),
        "-Inf" => return Some(Real::new(0, real_hint::NEG_INFINITY)),
        "NaN" => return Some(Real::new(0, real_hint::NOT_A_NUMBER)),
        _ => {}
    }

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let decimals = frac_part.len();
    if decimals > real_hint::EXPONENT0 as usize {
        return None;
    }

    let mut mantissa: i64 = 0;
    for c in int_part.chars().chain(frac_part.chars()) {
        mantissa = mantissa
            .checked_mul(10)?
            .checked_add(c.to_digit(10)? as i64)?;
    }
    if negative {
        mantissa = -mantissa;
    }
    Some(Real::new(mantissa, real_hint::EXPONENT0 - decimals as u8))
}

/// `YYYY-MM-DD`.
fn parse_date(text: &str) -> Option<Date> {
    let mut parts = text.splitn(3, '-');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    let date = Date::new(year, month, day);
    date.is_valid().then_some(date)
}

/// `HH:MM[:SS[.mmm]]`.
fn parse_time(text: &str) -> Option<Time> {
    let (hms, millis) = text.split_once('.').unwrap_or((text, ""));
    let mut parts = hms.splitn(3, ':');
    let hour = parts.next()?.parse().ok()?;
    let minute = parts.next()?.parse().ok()?;
    let second = match parts.next() {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    let millisecond = if millis.is_empty() { 0 } else { millis.parse().ok()? };
    let time = Time::new(hour, minute, second, millisecond, 0, 0);
    time.is_valid().then_some(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use omm_core::{FieldList, RefreshMsg};

    fn dict() -> DataDictionary {
        DataDictionary::embedded().unwrap()
    }

    #[test]
    fn parse_real_keeps_decimals() {
        assert_eq!(parse_real("12.50"), Some(Real::new(1250, real_hint::EXPONENT_2)));
        assert_eq!(parse_real("-3"), Some(Real::new(-3, real_hint::EXPONENT0)));
        assert_eq!(parse_real(".5"), Some(Real::new(5, real_hint::EXPONENT_1)));
        assert_eq!(parse_real("1e5"), None);
        assert_eq!(parse_real("-"), None);
    }

    #[test]
    fn assignment_by_acronym_and_fid() {
        let d = dict();
        let bid = parse_field_assignment("BID=12.5", &d).unwrap();
        assert_eq!(bid.field_id, 22);
        assert_eq!(bid.load, Data::Real(Real::new(125, real_hint::EXPONENT_1)));

        let by_fid = parse_field_assignment("22 = 1", &d).unwrap();
        assert_eq!(by_fid.field_id, 22);

        let blank = parse_field_assignment("ASK=", &d).unwrap();
        assert_eq!(blank.load, Data::Blank(DataType::Real));

        assert_eq!(
            parse_field_assignment("NOPE=1", &d),
            Err(CodecError::UnknownField("NOPE".to_string()))
        );
        assert!(parse_field_assignment("BID", &d).is_err());
        assert!(parse_field_assignment("BID=abc", &d).is_err());
    }

    #[test]
    fn enum_by_display() {
        let d = dict();
        let side = parse_field_assignment("ORDER_SIDE=ASK", &d).unwrap();
        assert_eq!(side.load, Data::Enum(2));
    }

    #[test]
    fn render_refresh_with_fields() {
        let d = dict();
        let msg: Msg = RefreshMsg {
            stream_id: 5,
            domain_type: domain::MARKET_PRICE,
            key: Some(MsgKey::named("TRI.N").with_service_id(1)),
            state: State::open_ok("All is well"),
            solicited: true,
            complete: true,
            payload: FieldList::new()
                .add(22, Real::new(1, real_hint::EXPONENT_1))
                .add(3428, Data::Enum(1))
                .into(),
            ..Default::default()
        }
        .into();

        let text = render_msg(&msg, Some(&d));
        assert!(text.starts_with("<refreshMsg domainType=\"MarketPrice\" streamId=\"5\""));
        assert!(text.contains("<key serviceId=\"1\" name=\"TRI.N\"/>"));
        assert!(text.contains("<fieldEntry fieldId=\"22\" acronym=\"BID\" dataType=\"REAL\" data=\"0.1\"/>"));
        assert!(text.contains("data=\"1 (BID)\""));
        assert!(text.trim_end().ends_with("</refreshMsg>"));
    }

    #[test]
    fn escapes_attribute_text() {
        assert_eq!(escape("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }
}
