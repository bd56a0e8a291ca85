//! Dictionary domain payloads.
//!
//! A provider serves its dictionary as two `Series` of `ElementList`s:
//!
//! - field definitions (`RWFFld`): one ElementList per field with `NAME`,
//!   `FID`, `RIPPLETO`, `TYPE`, `LENGTH`, `RWFTYPE`, `RWFLEN`, and at
//!   `NORMAL` verbosity or above `ENUMLENGTH` and `LONGNAME`
//! - enum tables (`RWFEnum`): one ElementList per table with the `FIDS`,
//!   `VALUE` and `DISPLAY` arrays, plus `MEANING` at `VERBOSE`
//!
//! The series summary carries `Type`, `DictionaryId` and the version tags.

use bytes::Bytes;

use omm_core::{
    dictionary::dictionary_type, Data, DataDictionary, DataType, DictionaryEntry, ElementList,
    EnumType, MfeedType, OmmArray, Series,
};

use crate::error::CodecError;

/// How much of a dictionary a payload carries.
pub mod verbosity {
    /// Summary only.
    pub const INFO: u32 = 0x00;
    pub const MINIMAL: u32 = 0x03;
    pub const NORMAL: u32 = 0x07;
    pub const VERBOSE: u32 = 0x0F;
}

/// Item names the dictionary domain is requested with.
pub const FIELD_DICTIONARY_NAME: &str = "RWFFld";
pub const ENUM_DICTIONARY_NAME: &str = "RWFEnum";

// ============================================================================
// Field definitions
// ============================================================================

pub fn encode_field_dictionary(dict: &DataDictionary, verbosity: u32) -> Series {
    let summary = ElementList::new()
        .add("Type", dictionary_type::FIELD_DEFINITIONS)
        .add("DictionaryId", dict.info.dictionary_id as i64)
        .add("Version", dict.info.field_version.as_str());

    let mut series = Series::new(DataType::ElementList).with_summary(summary);
    if verbosity < verbosity::MINIMAL {
        return series;
    }

    for entry in dict.entries() {
        let mut el = ElementList::new()
            .add("NAME", entry.acronym.as_str())
            .add("FID", entry.fid as i64)
            .add("RIPPLETO", entry.ripple_to as i64)
            .add("TYPE", entry.field_type as i8 as i64)
            .add("LENGTH", entry.length as u64)
            .add("RWFTYPE", entry.rwf_type.as_u8() as u64)
            .add("RWFLEN", entry.rwf_length as u64);
        if verbosity >= verbosity::NORMAL {
            el.push("ENUMLENGTH", entry.enum_length as u64);
            el.push("LONGNAME", entry.dde_acronym.as_str());
        }
        series = series.add(el);
    }
    series
}

/// Add the field definitions of one refresh part to `dict`. On error
/// `dict` is unchanged.
pub fn decode_field_dictionary(series: &Series, dict: &mut DataDictionary) -> Result<(), CodecError> {
    let mut scratch = dict.clone();
    read_field_definitions(series, &mut scratch)?;
    *dict = scratch;
    Ok(())
}

fn read_field_definitions(series: &Series, dict: &mut DataDictionary) -> Result<(), CodecError> {
    if let Some(summary) = series.summary.as_deref().and_then(Data::as_element_list) {
        check_type(summary, dictionary_type::FIELD_DEFINITIONS)?;
        read_dictionary_id(summary, dict)?;
        if let Some(version) = string(summary, "Version")? {
            dict.info.field_version = version;
        }
    }

    for item in &series.entries {
        let el = item
            .as_element_list()
            .ok_or(CodecError::InvalidData("field definition is not an element list"))?;

        let rwf_code = required_int(el, "RWFTYPE")?;
        let rwf_type = u8::try_from(rwf_code)
            .ok()
            .and_then(DataType::from_u8)
            .ok_or(CodecError::InvalidData("RWFTYPE"))?;
        let field_type = i8::try_from(required_int(el, "TYPE")?)
            .ok()
            .and_then(MfeedType::from_i8)
            .ok_or(CodecError::InvalidData("TYPE"))?;

        let entry = DictionaryEntry {
            acronym: string(el, "NAME")?.ok_or(CodecError::InvalidData("missing NAME"))?,
            dde_acronym: string(el, "LONGNAME")?.unwrap_or_default(),
            fid: narrow(required_int(el, "FID")?, "FID")?,
            ripple_to: narrow(required_int(el, "RIPPLETO")?, "RIPPLETO")?,
            field_type,
            length: narrow(required_int(el, "LENGTH")?, "LENGTH")?,
            enum_length: narrow(int(el, "ENUMLENGTH")?.unwrap_or(0), "ENUMLENGTH")?,
            rwf_type,
            rwf_length: narrow(required_int(el, "RWFLEN")?, "RWFLEN")?,
        };
        dict.add_entry(entry)
            .map_err(|e| CodecError::Dictionary(e.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// Enum tables
// ============================================================================

pub fn encode_enum_type_dictionary(dict: &DataDictionary, verbosity: u32) -> Series {
    let summary = ElementList::new()
        .add("Type", dictionary_type::ENUM_TABLES)
        .add("DictionaryId", dict.info.dictionary_id as i64)
        .add("RT_Version", dict.info.enum_rt_version.as_str())
        .add("DT_Version", dict.info.enum_dt_version.as_str());

    let mut series = Series::new(DataType::ElementList).with_summary(summary);
    if verbosity < verbosity::MINIMAL {
        return series;
    }

    for table in dict.enum_tables() {
        let fids = table
            .fid_references
            .iter()
            .fold(OmmArray::new(DataType::Int).fixed_width(2), |a, fid| {
                a.add(*fid as i64)
            });
        let values = table
            .types
            .values()
            .fold(OmmArray::new(DataType::Enum), |a, t| a.add(Data::Enum(t.value)));
        let displays = table
            .types
            .values()
            .fold(OmmArray::new(DataType::RmtesString), |a, t| {
                a.add(Data::Rmtes(t.display.clone()))
            });

        let mut el = ElementList::new()
            .add("FIDS", fids)
            .add("VALUE", values)
            .add("DISPLAY", displays);
        if verbosity >= verbosity::VERBOSE {
            let meanings = table
                .types
                .values()
                .fold(OmmArray::new(DataType::AsciiString), |a, t| {
                    a.add(t.meaning.as_str())
                });
            el.push("MEANING", meanings);
        }
        series = series.add(el);
    }
    series
}

/// Add the enum tables of one refresh part to `dict`. On error `dict` is
/// unchanged.
pub fn decode_enum_type_dictionary(
    series: &Series,
    dict: &mut DataDictionary,
) -> Result<(), CodecError> {
    let mut scratch = dict.clone();
    read_enum_tables(series, &mut scratch)?;
    *dict = scratch;
    Ok(())
}

fn read_enum_tables(series: &Series, dict: &mut DataDictionary) -> Result<(), CodecError> {
    if let Some(summary) = series.summary.as_deref().and_then(Data::as_element_list) {
        check_type(summary, dictionary_type::ENUM_TABLES)?;
        read_dictionary_id(summary, dict)?;
        if let Some(v) = string(summary, "RT_Version")? {
            dict.info.enum_rt_version = v;
        }
        if let Some(v) = string(summary, "DT_Version")? {
            dict.info.enum_dt_version = v;
        }
    }

    for item in &series.entries {
        let el = item
            .as_element_list()
            .ok_or(CodecError::InvalidData("enum table is not an element list"))?;

        let references = array(el, "FIDS")?
            .iter()
            .map(|d| match d {
                Data::Int(fid) => {
                    let fid = narrow::<i16>(*fid, "FIDS")?;
                    let acronym = dict
                        .entry(fid)
                        .map(|e| e.acronym.clone())
                        .unwrap_or_default();
                    Ok((fid, acronym))
                }
                _ => Err(CodecError::InvalidData("FIDS")),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let values = array(el, "VALUE")?;
        let displays = array(el, "DISPLAY")?;
        let meanings = match el.get("MEANING") {
            Some(Data::Array(a)) => a.entries.as_slice(),
            _ => &[],
        };
        if values.len() != displays.len() {
            return Err(CodecError::InvalidData("VALUE and DISPLAY lengths differ"));
        }

        let mut types = Vec::with_capacity(values.len());
        for (i, (value, display)) in values.iter().zip(displays).enumerate() {
            let value = match value {
                Data::Enum(v) => *v,
                _ => return Err(CodecError::InvalidData("VALUE")),
            };
            let display = match display {
                Data::Rmtes(b) | Data::Buffer(b) => b.clone(),
                Data::Ascii(s) | Data::Utf8(s) => Bytes::from(s.clone()),
                Data::Blank(_) => Bytes::new(),
                _ => return Err(CodecError::InvalidData("DISPLAY")),
            };
            let meaning = match meanings.get(i) {
                Some(Data::Ascii(s)) | Some(Data::Utf8(s)) => s.clone(),
                _ => String::new(),
            };
            types.push(EnumType {
                value,
                display,
                meaning,
            });
        }

        dict.add_enum_table(references, types)
            .map_err(|e| CodecError::Dictionary(e.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// Element helpers
// ============================================================================

fn check_type(summary: &ElementList, expected: u64) -> Result<(), CodecError> {
    match int(summary, "Type")? {
        Some(t) if t as u64 != expected => Err(CodecError::Dictionary(format!(
            "Type {} is not dictionary type {}",
            t, expected
        ))),
        _ => Ok(()),
    }
}

fn read_dictionary_id(summary: &ElementList, dict: &mut DataDictionary) -> Result<(), CodecError> {
    if let Some(id) = int(summary, "DictionaryId")? {
        let id = narrow::<i32>(id, "DictionaryId")?;
        if id != 0 {
            dict.info.dictionary_id = id;
        }
    }
    Ok(())
}

fn int(el: &ElementList, name: &'static str) -> Result<Option<i64>, CodecError> {
    match el.get(name) {
        None | Some(Data::Blank(_)) => Ok(None),
        Some(Data::Int(v)) => Ok(Some(*v)),
        Some(Data::UInt(v)) => i64::try_from(*v)
            .map(Some)
            .map_err(|_| CodecError::InvalidData(name)),
        Some(_) => Err(CodecError::InvalidData(name)),
    }
}

fn required_int(el: &ElementList, name: &'static str) -> Result<i64, CodecError> {
    int(el, name)?.ok_or(CodecError::InvalidData(name))
}

fn narrow<T: TryFrom<i64>>(v: i64, name: &'static str) -> Result<T, CodecError> {
    T::try_from(v).map_err(|_| CodecError::InvalidData(name))
}

fn string(el: &ElementList, name: &'static str) -> Result<Option<String>, CodecError> {
    match el.get(name) {
        None | Some(Data::Blank(_)) => Ok(None),
        Some(Data::Ascii(s)) | Some(Data::Utf8(s)) => Ok(Some(s.clone())),
        Some(Data::Rmtes(b)) | Some(Data::Buffer(b)) => {
            Ok(Some(String::from_utf8_lossy(b).into_owned()))
        }
        Some(_) => Err(CodecError::InvalidData(name)),
    }
}

fn array<'a>(el: &'a ElementList, name: &'static str) -> Result<&'a [Data], CodecError> {
    match el.get(name) {
        Some(Data::Array(a)) => Ok(&a.entries),
        _ => Err(CodecError::InvalidData(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_verbosity_carries_summary_only() {
        let dict = DataDictionary::embedded().unwrap();
        let series = encode_field_dictionary(&dict, verbosity::INFO);
        assert!(series.entries.is_empty());
        let summary = series.summary.as_deref().and_then(Data::as_element_list).unwrap();
        assert_eq!(summary.get("Type"), Some(&Data::UInt(1)));
    }

    #[test]
    fn enum_series_rejected_as_field_dictionary() {
        let dict = DataDictionary::embedded().unwrap();
        let series = encode_enum_type_dictionary(&dict, verbosity::NORMAL);
        let mut target = DataDictionary::new();
        assert!(matches!(
            decode_field_dictionary(&series, &mut target),
            Err(CodecError::Dictionary(_))
        ));
    }

    #[test]
    fn in_memory_round_trip() {
        let dict = DataDictionary::embedded().unwrap();
        let mut copy = DataDictionary::new();
        decode_field_dictionary(&encode_field_dictionary(&dict, verbosity::NORMAL), &mut copy)
            .unwrap();
        decode_enum_type_dictionary(
            &encode_enum_type_dictionary(&dict, verbosity::VERBOSE),
            &mut copy,
        )
        .unwrap();
        assert_eq!(copy.diff(&dict), vec![]);
        assert_eq!(
            copy.enum_type(4, 1).map(|t| t.display_str()),
            dict.enum_type(4, 1).map(|t| t.display_str())
        );
    }

    #[test]
    fn rejected_enum_payload_leaves_tables_usable() {
        let dict = DataDictionary::embedded().unwrap();
        let series = encode_enum_type_dictionary(&dict, verbosity::VERBOSE);
        let mut copy = DataDictionary::new();
        decode_enum_type_dictionary(&series, &mut copy).unwrap();

        // Every fid is already referenced, so a second copy is refused.
        assert!(matches!(
            decode_enum_type_dictionary(&series, &mut copy),
            Err(CodecError::Dictionary(_))
        ));
        assert_eq!(copy.enum_tables().len(), dict.enum_tables().len());
        assert_eq!(copy.enum_type(4, 1), dict.enum_type(4, 1));
    }
}
