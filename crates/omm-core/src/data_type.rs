//! Data type identifiers.
//!
//! Every value that can appear in an OMM payload is tagged with one of
//! these codes. Codes below 128 are primitives; codes from 128 upward are
//! containers (and `NoData`, which is the "empty container").

use std::fmt;

/// RWF data type code.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum DataType {
    #[default]
    Unknown = 0,
    Int = 3,
    UInt = 4,
    Float = 5,
    Double = 6,
    Real = 8,
    Date = 9,
    Time = 10,
    DateTime = 11,
    Qos = 12,
    State = 13,
    Enum = 14,
    Array = 15,
    Buffer = 16,
    AsciiString = 17,
    Utf8String = 18,
    RmtesString = 19,

    NoData = 128,
    Opaque = 130,
    Xml = 131,
    FieldList = 132,
    ElementList = 133,
    AnsiPage = 134,
    FilterList = 135,
    Vector = 136,
    Map = 137,
    Series = 138,
    Msg = 141,
    Json = 142,
}

impl DataType {
    /// First container code. Containers are sent on the wire as
    /// `code - CONTAINER_BASE` so they fit in the low 7 bits.
    pub const CONTAINER_BASE: u8 = 128;

    pub fn from_u8(v: u8) -> Option<Self> {
        let t = match v {
            0 => DataType::Unknown,
            3 => DataType::Int,
            4 => DataType::UInt,
            5 => DataType::Float,
            6 => DataType::Double,
            8 => DataType::Real,
            9 => DataType::Date,
            10 => DataType::Time,
            11 => DataType::DateTime,
            12 => DataType::Qos,
            13 => DataType::State,
            14 => DataType::Enum,
            15 => DataType::Array,
            16 => DataType::Buffer,
            17 => DataType::AsciiString,
            18 => DataType::Utf8String,
            19 => DataType::RmtesString,
            128 => DataType::NoData,
            130 => DataType::Opaque,
            131 => DataType::Xml,
            132 => DataType::FieldList,
            133 => DataType::ElementList,
            134 => DataType::AnsiPage,
            135 => DataType::FilterList,
            136 => DataType::Vector,
            137 => DataType::Map,
            138 => DataType::Series,
            141 => DataType::Msg,
            142 => DataType::Json,
            _ => return None,
        };
        Some(t)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Container code as it appears in a header byte (scaled by -128).
    pub fn to_container_byte(self) -> u8 {
        (self as u8).wrapping_sub(Self::CONTAINER_BASE)
    }

    /// Inverse of [`DataType::to_container_byte`].
    pub fn from_container_byte(v: u8) -> Option<Self> {
        Self::from_u8(v.wrapping_add(Self::CONTAINER_BASE)).filter(|t| t.is_container())
    }

    pub fn is_primitive(self) -> bool {
        let code = self as u8;
        code > 0 && code < Self::CONTAINER_BASE
    }

    pub fn is_container(self) -> bool {
        (self as u8) >= Self::CONTAINER_BASE
    }

    /// Upper-case name, as written in RDMFieldDictionary `RWF TYPE` columns.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Unknown => "UNKNOWN",
            DataType::Int => "INT",
            DataType::UInt => "UINT",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Real => "REAL",
            DataType::Date => "DATE",
            DataType::Time => "TIME",
            DataType::DateTime => "DATETIME",
            DataType::Qos => "QOS",
            DataType::State => "STATE",
            DataType::Enum => "ENUM",
            DataType::Array => "ARRAY",
            DataType::Buffer => "BUFFER",
            DataType::AsciiString => "ASCII_STRING",
            DataType::Utf8String => "UTF8_STRING",
            DataType::RmtesString => "RMTES_STRING",
            DataType::NoData => "NO_DATA",
            DataType::Opaque => "OPAQUE",
            DataType::Xml => "XML",
            DataType::FieldList => "FIELD_LIST",
            DataType::ElementList => "ELEMENT_LIST",
            DataType::AnsiPage => "ANSI_PAGE",
            DataType::FilterList => "FILTER_LIST",
            DataType::Vector => "VECTOR",
            DataType::Map => "MAP",
            DataType::Series => "SERIES",
            DataType::Msg => "MSG",
            DataType::Json => "JSON",
        }
    }

    /// Parse an `RWF TYPE` column, including the sized aliases
    /// (`UINT64`, `REAL64`, ...) dictionaries use.
    pub fn from_rwf_name(name: &str) -> Option<Self> {
        let t = match name {
            "INT" | "INT32" | "INT64" => DataType::Int,
            "UINT" | "UINT32" | "UINT64" => DataType::UInt,
            "REAL" | "REAL32" | "REAL64" => DataType::Real,
            "FLOAT" => DataType::Float,
            "DOUBLE" => DataType::Double,
            "DATE" => DataType::Date,
            "TIME" => DataType::Time,
            "DATETIME" | "DATE_TIME" => DataType::DateTime,
            "QOS" => DataType::Qos,
            "STATE" | "STATUS" => DataType::State,
            "ENUM" => DataType::Enum,
            "ARRAY" => DataType::Array,
            "BUFFER" => DataType::Buffer,
            "ASCII_STRING" => DataType::AsciiString,
            "UTF8_STRING" => DataType::Utf8String,
            "RMTES_STRING" => DataType::RmtesString,
            "VECTOR" => DataType::Vector,
            "MAP" => DataType::Map,
            "SERIES" => DataType::Series,
            "FIELD_LIST" => DataType::FieldList,
            "FILTER_LIST" => DataType::FilterList,
            "ELEMENT_LIST" | "ELEM_LIST" => DataType::ElementList,
            "XML" => DataType::Xml,
            "ANSI_PAGE" => DataType::AnsiPage,
            "OPAQUE" => DataType::Opaque,
            "MSG" => DataType::Msg,
            "JSON" => DataType::Json,
            _ => return None,
        };
        Some(t)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_byte_is_scaled() {
        assert_eq!(DataType::FieldList.to_container_byte(), 4);
        assert_eq!(DataType::NoData.to_container_byte(), 0);
        assert_eq!(DataType::from_container_byte(9), Some(DataType::Map));
        // 3 + 128 = 131 is XML, but 16 + 128 = 144 is nothing.
        assert_eq!(DataType::from_container_byte(16), None);
    }

    #[test]
    fn rwf_aliases_resolve() {
        assert_eq!(DataType::from_rwf_name("UINT64"), Some(DataType::UInt));
        assert_eq!(DataType::from_rwf_name("ELEM_LIST"), Some(DataType::ElementList));
        assert_eq!(DataType::from_rwf_name("STATUS"), Some(DataType::State));
        assert_eq!(DataType::from_rwf_name("NOPE"), None);
    }

    #[test]
    fn primitive_and_container_split() {
        assert!(DataType::Real.is_primitive());
        assert!(!DataType::Real.is_container());
        assert!(DataType::Map.is_container());
        assert!(!DataType::Unknown.is_primitive());
    }
}
