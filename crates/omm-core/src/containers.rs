//! OMM payload values and containers.
//!
//! `Data` is the value held by every entry of every container, and the
//! payload of every message. Containers nest freely: a `Map` entry can
//! hold a `FieldList`, whose entries can hold an `OmmArray`, and so on.
//!
//! Presence of optional members is modelled with `Option`; entry order
//! is always preserved exactly as built or decoded.

use bytes::Bytes;

use crate::data_type::DataType;
use crate::messages::Msg;
use crate::primitives::{Date, DateTime, Qos, Real, State, Time};

/// Why an entry could not be turned into a typed value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DecodeErrorCode {
    /// FieldList entry whose field id is not in the dictionary (or no
    /// dictionary was supplied).
    FieldIdNotFound,
    /// Entry content shorter than its type requires.
    IncompleteData,
    /// Content that is not valid for its declared type.
    InvalidData,
    /// Declared type this codec does not know.
    UnsupportedDataType,
}

impl DecodeErrorCode {
    pub fn name(self) -> &'static str {
        match self {
            DecodeErrorCode::FieldIdNotFound => "FieldIdNotFound",
            DecodeErrorCode::IncompleteData => "IncompleteData",
            DecodeErrorCode::InvalidData => "InvalidData",
            DecodeErrorCode::UnsupportedDataType => "UnsupportedDataType",
        }
    }
}

/// An entry that failed to decode. The raw content bytes are kept so
/// the entry can still be re-encoded or inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub code: DecodeErrorCode,
    /// Type the entry claimed (`Unknown` when a field id had no definition).
    pub data_type: DataType,
    /// Type byte as received when it is not a known `DataType`.
    pub wire_type: Option<u8>,
    pub raw: Bytes,
}

/// Any OMM value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Data {
    /// Blank value of the given primitive type (zero-length on the wire).
    Blank(DataType),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Real(Real),
    Date(Date),
    Time(Time),
    DateTime(DateTime),
    Qos(Qos),
    State(State),
    Enum(u16),
    Buffer(Bytes),
    Ascii(String),
    Utf8(String),
    /// RMTES text is carried as raw bytes (it may contain escape sequences
    /// that are not valid UTF-8).
    Rmtes(Bytes),
    Array(OmmArray),

    #[default]
    NoData,
    Opaque(Bytes),
    Xml(String),
    Json(String),
    AnsiPage(Bytes),
    FieldList(FieldList),
    ElementList(ElementList),
    Map(Map),
    Vector(Vector),
    Series(Series),
    FilterList(FilterList),
    Msg(Box<Msg>),

    Error(DecodeError),
}

impl Data {
    pub fn data_type(&self) -> DataType {
        match self {
            Data::Blank(t) => *t,
            Data::Int(_) => DataType::Int,
            Data::UInt(_) => DataType::UInt,
            Data::Float(_) => DataType::Float,
            Data::Double(_) => DataType::Double,
            Data::Real(_) => DataType::Real,
            Data::Date(_) => DataType::Date,
            Data::Time(_) => DataType::Time,
            Data::DateTime(_) => DataType::DateTime,
            Data::Qos(_) => DataType::Qos,
            Data::State(_) => DataType::State,
            Data::Enum(_) => DataType::Enum,
            Data::Buffer(_) => DataType::Buffer,
            Data::Ascii(_) => DataType::AsciiString,
            Data::Utf8(_) => DataType::Utf8String,
            Data::Rmtes(_) => DataType::RmtesString,
            Data::Array(_) => DataType::Array,
            Data::NoData => DataType::NoData,
            Data::Opaque(_) => DataType::Opaque,
            Data::Xml(_) => DataType::Xml,
            Data::Json(_) => DataType::Json,
            Data::AnsiPage(_) => DataType::AnsiPage,
            Data::FieldList(_) => DataType::FieldList,
            Data::ElementList(_) => DataType::ElementList,
            Data::Map(_) => DataType::Map,
            Data::Vector(_) => DataType::Vector,
            Data::Series(_) => DataType::Series,
            Data::FilterList(_) => DataType::FilterList,
            Data::Msg(_) => DataType::Msg,
            Data::Error(_) => DataType::Unknown,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Data::Blank(_) => true,
            Data::Date(d) => d.is_blank(),
            Data::Time(t) => t.is_blank(),
            Data::DateTime(dt) => dt.is_blank(),
            _ => false,
        }
    }

    pub fn as_field_list(&self) -> Option<&FieldList> {
        match self {
            Data::FieldList(fl) => Some(fl),
            _ => None,
        }
    }

    pub fn as_element_list(&self) -> Option<&ElementList> {
        match self {
            Data::ElementList(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_msg(&self) -> Option<&Msg> {
        match self {
            Data::Msg(m) => Some(m),
            _ => None,
        }
    }
}

impl From<i64> for Data {
    fn from(v: i64) -> Self {
        Data::Int(v)
    }
}

impl From<u64> for Data {
    fn from(v: u64) -> Self {
        Data::UInt(v)
    }
}

impl From<f64> for Data {
    fn from(v: f64) -> Self {
        Data::Double(v)
    }
}

impl From<Real> for Data {
    fn from(v: Real) -> Self {
        Data::Real(v)
    }
}

impl From<&str> for Data {
    fn from(v: &str) -> Self {
        Data::Ascii(v.to_string())
    }
}

impl From<FieldList> for Data {
    fn from(v: FieldList) -> Self {
        Data::FieldList(v)
    }
}

impl From<ElementList> for Data {
    fn from(v: ElementList) -> Self {
        Data::ElementList(v)
    }
}

impl From<Map> for Data {
    fn from(v: Map) -> Self {
        Data::Map(v)
    }
}

impl From<Vector> for Data {
    fn from(v: Vector) -> Self {
        Data::Vector(v)
    }
}

impl From<Series> for Data {
    fn from(v: Series) -> Self {
        Data::Series(v)
    }
}

impl From<FilterList> for Data {
    fn from(v: FilterList) -> Self {
        Data::FilterList(v)
    }
}

impl From<OmmArray> for Data {
    fn from(v: OmmArray) -> Self {
        Data::Array(v)
    }
}

impl From<Msg> for Data {
    fn from(v: Msg) -> Self {
        Data::Msg(Box::new(v))
    }
}

// ============================================================================
// Set-defined data
// ============================================================================

/// Set-defined entries, kept as raw bytes.
///
/// Interpreting these needs the matching set definition database, which
/// is negotiated out of band; the bytes are preserved so a decoded
/// container re-encodes to the same wire image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetData {
    /// Zero when the container does not name a set id.
    pub set_id: u16,
    pub raw: Bytes,
}

// ============================================================================
// FieldList / ElementList
// ============================================================================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldListInfo {
    pub dictionary_id: u16,
    pub field_list_num: i16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub field_id: i16,
    pub load: Data,
}

/// Entries keyed by dictionary field id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldList {
    pub info: Option<FieldListInfo>,
    pub set_data: Option<SetData>,
    pub entries: Vec<FieldEntry>,
}

impl FieldList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(mut self, dictionary_id: u16, field_list_num: i16) -> Self {
        self.info = Some(FieldListInfo {
            dictionary_id,
            field_list_num,
        });
        self
    }

    pub fn add(mut self, field_id: i16, load: impl Into<Data>) -> Self {
        self.push(field_id, load);
        self
    }

    pub fn push(&mut self, field_id: i16, load: impl Into<Data>) {
        self.entries.push(FieldEntry {
            field_id,
            load: load.into(),
        });
    }

    /// First entry with this field id.
    pub fn get(&self, field_id: i16) -> Option<&Data> {
        self.entries
            .iter()
            .find(|e| e.field_id == field_id)
            .map(|e| &e.load)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementEntry {
    pub name: String,
    pub load: Data,
}

/// Entries keyed by name, each carrying its own type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementList {
    pub info: Option<u16>,
    pub set_data: Option<SetData>,
    pub entries: Vec<ElementEntry>,
}

impl ElementList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(mut self, element_list_num: u16) -> Self {
        self.info = Some(element_list_num);
        self
    }

    pub fn add(mut self, name: impl Into<String>, load: impl Into<Data>) -> Self {
        self.push(name, load);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, load: impl Into<Data>) {
        self.entries.push(ElementEntry {
            name: name.into(),
            load: load.into(),
        });
    }

    pub fn get(&self, name: &str) -> Option<&Data> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.load)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Map
// ============================================================================

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MapAction {
    Update = 1,
    Add = 2,
    Delete = 3,
}

impl MapAction {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(MapAction::Update),
            2 => Some(MapAction::Add),
            3 => Some(MapAction::Delete),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MapAction::Update => "Update",
            MapAction::Add => "Add",
            MapAction::Delete => "Delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub action: MapAction,
    /// Primitive key of type `Map::key_type`.
    pub key: Data,
    pub perm_data: Option<Bytes>,
    /// `NoData` for deletes.
    pub load: Data,
}

/// Primitive-keyed collection of containers.
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    pub key_type: DataType,
    pub key_field_id: Option<i16>,
    pub container_type: DataType,
    pub set_defs: Option<Bytes>,
    pub summary: Option<Box<Data>>,
    pub total_count_hint: Option<u32>,
    pub entries: Vec<MapEntry>,
}

impl Map {
    pub fn new(key_type: DataType, container_type: DataType) -> Self {
        Map {
            key_type,
            key_field_id: None,
            container_type,
            set_defs: None,
            summary: None,
            total_count_hint: None,
            entries: Vec::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<Data>) -> Self {
        self.summary = Some(Box::new(summary.into()));
        self
    }

    pub fn with_key_field_id(mut self, fid: i16) -> Self {
        self.key_field_id = Some(fid);
        self
    }

    pub fn with_total_count_hint(mut self, hint: u32) -> Self {
        self.total_count_hint = Some(hint);
        self
    }

    pub fn add(mut self, action: MapAction, key: impl Into<Data>, load: impl Into<Data>) -> Self {
        self.entries.push(MapEntry {
            action,
            key: key.into(),
            perm_data: None,
            load: load.into(),
        });
        self
    }

    pub fn add_entry(mut self, entry: MapEntry) -> Self {
        self.entries.push(entry);
        self
    }
}

// ============================================================================
// Vector
// ============================================================================

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VectorAction {
    Update = 1,
    Set = 2,
    Clear = 3,
    Insert = 4,
    Delete = 5,
}

impl VectorAction {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(VectorAction::Update),
            2 => Some(VectorAction::Set),
            3 => Some(VectorAction::Clear),
            4 => Some(VectorAction::Insert),
            5 => Some(VectorAction::Delete),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VectorAction::Update => "Update",
            VectorAction::Set => "Set",
            VectorAction::Clear => "Clear",
            VectorAction::Insert => "Insert",
            VectorAction::Delete => "Delete",
        }
    }

    /// Clear and Delete entries carry no payload.
    pub fn has_payload(self) -> bool {
        !matches!(self, VectorAction::Clear | VectorAction::Delete)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub index: u32,
    pub action: VectorAction,
    pub perm_data: Option<Bytes>,
    pub load: Data,
}

/// Index-addressed collection of containers.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    pub container_type: DataType,
    pub supports_sorting: bool,
    pub set_defs: Option<Bytes>,
    pub summary: Option<Box<Data>>,
    pub total_count_hint: Option<u32>,
    pub entries: Vec<VectorEntry>,
}

impl Vector {
    pub fn new(container_type: DataType) -> Self {
        Vector {
            container_type,
            supports_sorting: false,
            set_defs: None,
            summary: None,
            total_count_hint: None,
            entries: Vec::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<Data>) -> Self {
        self.summary = Some(Box::new(summary.into()));
        self
    }

    pub fn add(mut self, index: u32, action: VectorAction, load: impl Into<Data>) -> Self {
        self.entries.push(VectorEntry {
            index,
            action,
            perm_data: None,
            load: load.into(),
        });
        self
    }
}

// ============================================================================
// Series
// ============================================================================

/// Ordered, unkeyed sequence of containers of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub container_type: DataType,
    pub set_defs: Option<Bytes>,
    pub summary: Option<Box<Data>>,
    pub total_count_hint: Option<u32>,
    pub entries: Vec<Data>,
}

impl Series {
    pub fn new(container_type: DataType) -> Self {
        Series {
            container_type,
            set_defs: None,
            summary: None,
            total_count_hint: None,
            entries: Vec::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<Data>) -> Self {
        self.summary = Some(Box::new(summary.into()));
        self
    }

    pub fn add(mut self, load: impl Into<Data>) -> Self {
        self.entries.push(load.into());
        self
    }
}

// ============================================================================
// FilterList
// ============================================================================

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FilterAction {
    Update = 1,
    Set = 2,
    Clear = 3,
}

impl FilterAction {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(FilterAction::Update),
            2 => Some(FilterAction::Set),
            3 => Some(FilterAction::Clear),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterAction::Update => "Update",
            FilterAction::Set => "Set",
            FilterAction::Clear => "Clear",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterEntry {
    /// Filter id, 0..=31 in practice (one bit of a 32-bit filter mask).
    pub id: u8,
    pub action: FilterAction,
    /// Overrides `FilterList::container_type` for this entry.
    pub container_type: Option<DataType>,
    pub perm_data: Option<Bytes>,
    pub load: Data,
}

impl FilterEntry {
    /// Type this entry's payload is encoded as.
    pub fn effective_type(&self, list_type: DataType) -> DataType {
        self.container_type.unwrap_or(list_type)
    }
}

/// Small id-addressed collection, possibly of mixed container types.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterList {
    pub container_type: DataType,
    pub total_count_hint: Option<u8>,
    pub entries: Vec<FilterEntry>,
}

impl FilterList {
    pub fn new(container_type: DataType) -> Self {
        FilterList {
            container_type,
            total_count_hint: None,
            entries: Vec::new(),
        }
    }

    pub fn add(mut self, id: u8, action: FilterAction, load: impl Into<Data>) -> Self {
        self.entries.push(FilterEntry {
            id,
            action,
            container_type: None,
            perm_data: None,
            load: load.into(),
        });
        self
    }

    pub fn add_entry(mut self, entry: FilterEntry) -> Self {
        self.entries.push(entry);
        self
    }
}

// ============================================================================
// Array
// ============================================================================

/// Homogeneous list of primitives.
#[derive(Debug, Clone, PartialEq)]
pub struct OmmArray {
    pub primitive_type: DataType,
    /// Fixed width of every item, or 0 for length-prefixed items.
    pub item_length: u16,
    pub entries: Vec<Data>,
}

impl OmmArray {
    pub fn new(primitive_type: DataType) -> Self {
        OmmArray {
            primitive_type,
            item_length: 0,
            entries: Vec::new(),
        }
    }

    pub fn fixed_width(mut self, item_length: u16) -> Self {
        self.item_length = item_length;
        self
    }

    pub fn add(mut self, item: impl Into<Data>) -> Self {
        self.entries.push(item.into());
        self
    }
}
