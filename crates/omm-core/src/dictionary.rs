//! Field dictionary and enumerated type tables.
//!
//! A FieldList only carries field ids; the dictionary says what type
//! each id has (and what an enum value means). Two text formats are
//! understood:
//!
//! - `RDMFieldDictionary`:
//!   `ACRONYM "DDE ACRONYM" FID RIPPLES_TO FIELD_TYPE LENGTH [( ENUM_LEN )] RWF_TYPE RWF_LEN`
//! - `enumtype.def`: one or more `ACRONYM FID` reference lines followed by
//!   `VALUE "DISPLAY" MEANING` (or `VALUE #HEX# MEANING`) lines.
//!
//! Both accept `!tag Name Value` metadata lines and `!` comments. The two
//! files can be loaded in either order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use bytes::Bytes;
use tracing::debug;

use crate::data_type::DataType;
use crate::error::OmmError;

pub const MIN_FID: i32 = -32768;
pub const MAX_FID: i32 = 32767;

/// Dictionary types, as sent in the `Type` tag and the payload summary.
pub mod dictionary_type {
    pub const FIELD_DEFINITIONS: u64 = 1;
    pub const ENUM_TABLES: u64 = 2;
}

const DEFAULT_VERSION: &str = "0.0.0";

/// Marketfeed field type (the `TYPE` column).
#[repr(i8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MfeedType {
    TimeSeconds = -1,
    Unknown = 0,
    Time = 1,
    Alphanumeric = 2,
    Enumerated = 3,
    Integer = 4,
    Date = 5,
    Price = 6,
    Binary = 7,
    Numeric = 8,
    None = 9,
    LongAlphanumeric = 10,
    Opaque = 11,
}

impl MfeedType {
    pub fn from_i8(v: i8) -> Option<Self> {
        let t = match v {
            -1 => MfeedType::TimeSeconds,
            0 => MfeedType::Unknown,
            1 => MfeedType::Time,
            2 => MfeedType::Alphanumeric,
            3 => MfeedType::Enumerated,
            4 => MfeedType::Integer,
            5 => MfeedType::Date,
            6 => MfeedType::Price,
            7 => MfeedType::Binary,
            8 => MfeedType::Numeric,
            9 => MfeedType::None,
            10 => MfeedType::LongAlphanumeric,
            11 => MfeedType::Opaque,
            _ => return None,
        };
        Some(t)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let t = match name {
            "INTEGER" => MfeedType::Integer,
            "ALPHANUMERIC" => MfeedType::Alphanumeric,
            "ENUMERATED" => MfeedType::Enumerated,
            "TIME_SECONDS" => MfeedType::TimeSeconds,
            "TIME" => MfeedType::Time,
            "PRICE" => MfeedType::Price,
            "DATE" => MfeedType::Date,
            "BINARY" => MfeedType::Binary,
            "NUMERIC" => MfeedType::Numeric,
            "NONE" => MfeedType::None,
            "LONG_ALPHANUMERIC" | "ALPHANUM_XTND" => MfeedType::LongAlphanumeric,
            "OPAQUE" => MfeedType::Opaque,
            _ => return None,
        };
        Some(t)
    }

    pub fn name(self) -> &'static str {
        match self {
            MfeedType::TimeSeconds => "TIME_SECONDS",
            MfeedType::Unknown => "UNKNOWN",
            MfeedType::Time => "TIME",
            MfeedType::Alphanumeric => "ALPHANUMERIC",
            MfeedType::Enumerated => "ENUMERATED",
            MfeedType::Integer => "INTEGER",
            MfeedType::Date => "DATE",
            MfeedType::Price => "PRICE",
            MfeedType::Binary => "BINARY",
            MfeedType::Numeric => "NUMERIC",
            MfeedType::None => "NONE",
            MfeedType::LongAlphanumeric => "LONG_ALPHANUMERIC",
            MfeedType::Opaque => "OPAQUE",
        }
    }
}

/// One field definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub acronym: String,
    pub dde_acronym: String,
    pub fid: i16,
    /// Field this one ripples into on update, 0 for none.
    pub ripple_to: i16,
    pub field_type: MfeedType,
    pub length: u16,
    pub enum_length: u8,
    pub rwf_type: DataType,
    pub rwf_length: u16,
}

/// One value of an enumerated type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub value: u16,
    /// Display bytes. Usually ASCII, but `#hex#` entries may hold anything.
    pub display: Bytes,
    pub meaning: String,
}

impl EnumType {
    pub fn display_str(&self) -> String {
        String::from_utf8_lossy(&self.display).into_owned()
    }
}

/// A value table shared by every field that references it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnumTypeTable {
    pub max_value: u16,
    pub types: BTreeMap<u16, EnumType>,
    pub fid_references: Vec<i16>,
}

impl EnumTypeTable {
    pub fn get(&self, value: u16) -> Option<&EnumType> {
        self.types.get(&value)
    }

    /// Display strings used by more than one value.
    pub fn duplicate_displays(&self) -> Vec<Bytes> {
        let mut seen = BTreeSet::new();
        let mut dups = BTreeSet::new();
        for t in self.types.values() {
            if !seen.insert(t.display.clone()) {
                dups.insert(t.display.clone());
            }
        }
        dups.into_iter().collect()
    }
}

/// `!tag` metadata from both files.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DictionaryInfo {
    pub dictionary_id: i32,

    pub field_filename: String,
    pub field_desc: String,
    pub field_version: String,
    pub field_build: String,
    pub field_date: String,

    pub enum_filename: String,
    pub enum_desc: String,
    pub enum_date: String,
    pub enum_rt_version: String,
    pub enum_dt_version: String,
}

/// One way two dictionaries disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictionaryDifference {
    FieldOnlyInLeft(i16),
    FieldOnlyInRight(i16),
    FieldChanged {
        left: Box<DictionaryEntry>,
        right: Box<DictionaryEntry>,
    },
    EnumTableOnlyInLeft(i16),
    EnumTableOnlyInRight(i16),
    EnumTableChanged(i16),
    InfoChanged {
        tag: &'static str,
        left: String,
        right: String,
    },
}

impl fmt::Display for DictionaryDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionaryDifference::FieldOnlyInLeft(fid) => write!(f, "Fid {} only in left", fid),
            DictionaryDifference::FieldOnlyInRight(fid) => write!(f, "Fid {} only in right", fid),
            DictionaryDifference::FieldChanged { left, right } => write!(
                f,
                "Fid {} differs: '{}' {} {}/{} vs '{}' {} {}/{}",
                left.fid,
                left.acronym,
                left.rwf_type,
                left.length,
                left.rwf_length,
                right.acronym,
                right.rwf_type,
                right.length,
                right.rwf_length
            ),
            DictionaryDifference::EnumTableOnlyInLeft(fid) => {
                write!(f, "Enum table for fid {} only in left", fid)
            }
            DictionaryDifference::EnumTableOnlyInRight(fid) => {
                write!(f, "Enum table for fid {} only in right", fid)
            }
            DictionaryDifference::EnumTableChanged(fid) => {
                write!(f, "Enum table for fid {} differs", fid)
            }
            DictionaryDifference::InfoChanged { tag, left, right } => {
                write!(f, "{} differs: \"{}\" vs \"{}\"", tag, left, right)
            }
        }
    }
}

/// Field definitions plus enum tables.
#[derive(Debug, Clone, Default)]
pub struct DataDictionary {
    pub info: DictionaryInfo,
    entries: BTreeMap<i16, DictionaryEntry>,
    by_name: HashMap<String, i16>,
    enum_tables: Vec<EnumTypeTable>,
    /// fid -> index into `enum_tables`.
    enum_refs: HashMap<i16, usize>,
    /// Acronyms named on enum reference lines, checked against field entries.
    enum_ref_acronyms: HashMap<i16, String>,
    fields_loaded: bool,
    enums_loaded: bool,
}

const EMBEDDED_FIELD_DICTIONARY: &str = include_str!("../data/RDMFieldDictionary");
const EMBEDDED_ENUM_DICTIONARY: &str = include_str!("../data/enumtype.def");

impl DataDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundled subset of the RDM dictionary covering the common
    /// MarketPrice fields.
    pub fn embedded() -> Result<Self, OmmError> {
        let mut dict = DataDictionary::new();
        dict.load_field_dictionary_str(EMBEDDED_FIELD_DICTIONARY)?;
        dict.load_enum_type_dictionary_str(EMBEDDED_ENUM_DICTIONARY)?;
        Ok(dict)
    }

    /// Load both files of a dictionary from disk.
    pub fn from_files(field_path: impl AsRef<Path>, enum_path: impl AsRef<Path>) -> Result<Self, OmmError> {
        let mut dict = DataDictionary::new();
        dict.load_field_dictionary(field_path)?;
        dict.load_enum_type_dictionary(enum_path)?;
        Ok(dict)
    }

    pub fn clear(&mut self) {
        *self = DataDictionary::default();
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    pub fn entry(&self, fid: i16) -> Option<&DictionaryEntry> {
        self.entries.get(&fid)
    }

    pub fn entry_by_name(&self, acronym: &str) -> Option<&DictionaryEntry> {
        self.by_name.get(acronym).and_then(|fid| self.entries.get(fid))
    }

    pub fn entries(&self) -> impl Iterator<Item = &DictionaryEntry> {
        self.entries.values()
    }

    pub fn enum_tables(&self) -> &[EnumTypeTable] {
        &self.enum_tables
    }

    pub fn enum_table(&self, fid: i16) -> Option<&EnumTypeTable> {
        self.enum_refs.get(&fid).and_then(|&i| self.enum_tables.get(i))
    }

    pub fn enum_type(&self, fid: i16, value: u16) -> Option<&EnumType> {
        self.enum_table(fid).and_then(|t| t.get(value))
    }

    /// Reverse lookup: enum value whose display matches `display`
    /// (trailing spaces ignored on both sides).
    pub fn enum_value_by_display(&self, fid: i16, display: &str) -> Option<u16> {
        let wanted = display.trim_end();
        self.enum_table(fid)?
            .types
            .values()
            .find(|t| t.display_str().trim_end() == wanted)
            .map(|t| t.value)
    }

    pub fn number_of_entries(&self) -> usize {
        self.entries.len()
    }

    pub fn min_fid(&self) -> Option<i16> {
        self.entries.keys().next().copied()
    }

    pub fn max_fid(&self) -> Option<i16> {
        self.entries.keys().next_back().copied()
    }

    pub fn is_field_dictionary_loaded(&self) -> bool {
        self.fields_loaded
    }

    pub fn is_enum_type_dictionary_loaded(&self) -> bool {
        self.enums_loaded
    }

    // ------------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------------

    /// Add one field definition (from a file line or a dictionary payload).
    pub fn add_entry(&mut self, entry: DictionaryEntry) -> Result<(), OmmError> {
        if entry.fid == 0 {
            return Err(OmmError::Dictionary("fid 0 is reserved.".into()));
        }
        if entry.rwf_type == DataType::Unknown {
            return Err(OmmError::Dictionary(format!(
                "Invalid rwfType for fid {}.",
                entry.fid
            )));
        }
        if self.entries.contains_key(&entry.fid) {
            return Err(OmmError::Dictionary(format!(
                "Duplicate definition for fid {}.",
                entry.fid
            )));
        }
        if let Some(ref_acronym) = self.enum_ref_acronyms.get(&entry.fid) {
            if !ref_acronym.is_empty() && *ref_acronym != entry.acronym {
                return Err(acronym_mismatch(&entry.acronym, ref_acronym));
            }
        }

        self.by_name.insert(entry.acronym.clone(), entry.fid);
        self.entries.insert(entry.fid, entry);
        self.fields_loaded = true;
        Ok(())
    }

    /// Add an enum table referenced by `references` (`(fid, acronym)`;
    /// the acronym may be empty when it is not known).
    pub fn add_enum_table(
        &mut self,
        references: Vec<(i16, String)>,
        types: Vec<EnumType>,
    ) -> Result<(), OmmError> {
        if references.is_empty() {
            return Err(OmmError::Dictionary(
                "No referencing FIDs found before enum table.".into(),
            ));
        }

        let mut table = EnumTypeTable::default();
        for t in types {
            if table.types.contains_key(&t.value) {
                return Err(OmmError::Dictionary(format!(
                    "Enum type table has Duplicate value: \"{}\"",
                    t.value
                )));
            }
            table.max_value = table.max_value.max(t.value);
            table.types.insert(t.value, t);
        }

        for (i, (fid, acronym)) in references.iter().enumerate() {
            let repeated = references[..i].iter().any(|(seen, _)| seen == fid);
            if repeated || self.enum_refs.contains_key(fid) {
                return Err(OmmError::Dictionary(format!(
                    "FieldId {} has duplicate Enum Table reference",
                    fid
                )));
            }
            if let Some(entry) = self.entries.get(fid) {
                if !acronym.is_empty() && entry.acronym != *acronym {
                    return Err(acronym_mismatch(&entry.acronym, acronym));
                }
            }
        }

        let index = self.enum_tables.len();
        for (fid, acronym) in references {
            self.enum_refs.insert(fid, index);
            self.enum_ref_acronyms.insert(fid, acronym);
            table.fid_references.push(fid);
        }

        self.enum_tables.push(table);
        self.enums_loaded = true;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // RDMFieldDictionary
    // ------------------------------------------------------------------------

    pub fn load_field_dictionary(&mut self, path: impl AsRef<Path>) -> Result<(), OmmError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| OmmError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.load_field_dictionary_str(&text)
    }

    /// Parse RDMFieldDictionary text. On error the dictionary is left as
    /// it was before the call.
    pub fn load_field_dictionary_str(&mut self, text: &str) -> Result<(), OmmError> {
        let mut scratch = self.clone();
        scratch.parse_field_dictionary(text)?;
        *self = scratch;
        Ok(())
    }

    fn parse_field_dictionary(&mut self, text: &str) -> Result<(), OmmError> {
        let mut ripples: Vec<(i16, String)> = Vec::new();
        let mut loaded = 0usize;

        for (idx, raw) in text.lines().enumerate() {
            let line_num = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(tag) = line.strip_prefix("!tag") {
                let (name, value) = split_tag(tag);
                self.field_tag(name, value)?;
                continue;
            }
            if line.starts_with('!') {
                continue;
            }

            let (entry, ripple) = parse_field_line(line, line_num)?;
            let fid = entry.fid;
            self.add_entry(entry).map_err(|e| match e {
                OmmError::Dictionary(msg) => {
                    OmmError::parse(line_num, msg.trim_end_matches('.').to_string())
                }
                other => other,
            })?;
            if let Some(acronym) = ripple {
                ripples.push((fid, acronym));
            }
            loaded += 1;
        }

        for (fid, acronym) in ripples {
            if let Some(&target) = self.by_name.get(&acronym) {
                if let Some(entry) = self.entries.get_mut(&fid) {
                    entry.ripple_to = target;
                }
            }
        }

        if self.info.field_version.is_empty() {
            self.info.field_version = DEFAULT_VERSION.to_string();
        }

        self.fields_loaded = true;
        debug!(
            entries = loaded,
            version = %self.info.field_version,
            "field dictionary loaded"
        );
        Ok(())
    }

    fn field_tag(&mut self, name: &str, value: &str) -> Result<(), OmmError> {
        match name {
            "Type" => {
                if value.parse::<u64>().ok() != Some(dictionary_type::FIELD_DEFINITIONS) {
                    return Err(OmmError::Dictionary(format!(
                        "Type '{}' indicates this is not a field definitions dictionary.",
                        value
                    )));
                }
            }
            "DictionaryId" => self.set_dictionary_id(value)?,
            "Version" => set_once(&mut self.info.field_version, value),
            "Filename" => set_once(&mut self.info.field_filename, value),
            "Desc" => set_once(&mut self.info.field_desc, value),
            "Build" => set_once(&mut self.info.field_build, value),
            "Date" => set_once(&mut self.info.field_date, value),
            _ => {}
        }
        Ok(())
    }

    fn set_dictionary_id(&mut self, value: &str) -> Result<(), OmmError> {
        let id: i32 = value
            .parse()
            .map_err(|_| OmmError::Dictionary(format!("Invalid DictionaryId '{}'.", value)))?;
        if id != 0 && self.info.dictionary_id != 0 && id != self.info.dictionary_id {
            return Err(OmmError::Dictionary(format!(
                "DictionaryId mismatch('{}' vs. previously found '{}').",
                id, self.info.dictionary_id
            )));
        }
        if id != 0 {
            self.info.dictionary_id = id;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // enumtype.def
    // ------------------------------------------------------------------------

    pub fn load_enum_type_dictionary(&mut self, path: impl AsRef<Path>) -> Result<(), OmmError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| OmmError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.load_enum_type_dictionary_str(&text)
    }

    /// Parse enumtype.def text. On error the dictionary is left as it was
    /// before the call.
    pub fn load_enum_type_dictionary_str(&mut self, text: &str) -> Result<(), OmmError> {
        let mut scratch = self.clone();
        scratch.parse_enum_type_dictionary(text)?;
        *self = scratch;
        Ok(())
    }

    fn parse_enum_type_dictionary(&mut self, text: &str) -> Result<(), OmmError> {
        let mut references: Vec<(i16, String)> = Vec::new();
        let mut values: Vec<EnumType> = Vec::new();
        let mut tables = 0usize;

        for (idx, raw) in text.lines().enumerate() {
            let line_num = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(tag) = line.strip_prefix("!tag") {
                let (name, value) = split_tag(tag);
                self.enum_tag(name, value)?;
                continue;
            }
            if line.starts_with('!') {
                continue;
            }
            if line.starts_with('"') {
                return Err(OmmError::parse(line_num, "Missing keyword"));
            }

            let mut cursor = Cursor::new(line);
            let first = cursor.token().unwrap_or_default();

            match first.parse::<i64>() {
                Ok(value) => {
                    if value < 0 {
                        return Err(OmmError::parse(line_num, "Enum value cannot be negative"));
                    }
                    let value = u16::try_from(value)
                        .map_err(|_| OmmError::parse(line_num, format!("Enum value {} too large", value)))?;
                    let display = parse_display(&mut cursor, line_num)?;
                    values.push(EnumType {
                        value,
                        display,
                        meaning: cursor.rest().to_string(),
                    });
                }
                Err(_) => {
                    // An acronym line after values starts the next table.
                    if !values.is_empty() {
                        self.finish_enum_table(&mut references, &mut values, Some(line_num))?;
                        tables += 1;
                    }
                    let fid = cursor
                        .token()
                        .and_then(|t| t.parse::<i32>().ok())
                        .filter(|f| (MIN_FID..=MAX_FID).contains(f))
                        .ok_or_else(|| OmmError::parse(line_num, "Missing FID"))?;
                    references.push((fid as i16, first.to_string()));
                }
            }
        }

        if values.is_empty() {
            return Err(OmmError::Dictionary("No EnumTable found.".into()));
        }
        self.finish_enum_table(&mut references, &mut values, None)?;
        tables += 1;

        debug!(tables, "enum type dictionary loaded");
        Ok(())
    }

    fn finish_enum_table(
        &mut self,
        references: &mut Vec<(i16, String)>,
        values: &mut Vec<EnumType>,
        line_num: Option<usize>,
    ) -> Result<(), OmmError> {
        let refs = std::mem::take(references);
        let types = std::mem::take(values);
        if refs.is_empty() {
            if let Some(line) = line_num {
                return Err(OmmError::parse(line, "No referencing FIDs found before enum table"));
            }
        }
        self.add_enum_table(refs, types)
    }

    fn enum_tag(&mut self, name: &str, value: &str) -> Result<(), OmmError> {
        match name {
            "Type" => {
                if value.parse::<u64>().ok() != Some(dictionary_type::ENUM_TABLES) {
                    return Err(OmmError::Dictionary(format!(
                        "Type '{}' indicates this is not a set of enum tables.",
                        value
                    )));
                }
            }
            "DictionaryId" => self.set_dictionary_id(value)?,
            "Filename" => set_once(&mut self.info.enum_filename, value),
            "Desc" => set_once(&mut self.info.enum_desc, value),
            "Date" => set_once(&mut self.info.enum_date, value),
            "RT_Version" => set_once(&mut self.info.enum_rt_version, value),
            "DT_Version" => set_once(&mut self.info.enum_dt_version, value),
            _ => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Compare
    // ------------------------------------------------------------------------

    /// Everything that differs between two dictionaries. File-only tags
    /// (Filename, Desc, Build, Date) are not compared since they do not
    /// travel in dictionary payloads.
    pub fn diff(&self, other: &DataDictionary) -> Vec<DictionaryDifference> {
        let mut out = Vec::new();

        let info_pairs: [(&'static str, String, String); 4] = [
            (
                "DictionaryId",
                self.info.dictionary_id.to_string(),
                other.info.dictionary_id.to_string(),
            ),
            ("Version", self.info.field_version.clone(), other.info.field_version.clone()),
            ("RT_Version", self.info.enum_rt_version.clone(), other.info.enum_rt_version.clone()),
            ("DT_Version", self.info.enum_dt_version.clone(), other.info.enum_dt_version.clone()),
        ];
        for (tag, left, right) in info_pairs {
            if left != right {
                out.push(DictionaryDifference::InfoChanged { tag, left, right });
            }
        }

        for (fid, left) in &self.entries {
            match other.entries.get(fid) {
                None => out.push(DictionaryDifference::FieldOnlyInLeft(*fid)),
                Some(right) if right != left => out.push(DictionaryDifference::FieldChanged {
                    left: Box::new(left.clone()),
                    right: Box::new(right.clone()),
                }),
                Some(_) => {}
            }
        }
        for fid in other.entries.keys() {
            if !self.entries.contains_key(fid) {
                out.push(DictionaryDifference::FieldOnlyInRight(*fid));
            }
        }

        let fids: BTreeSet<i16> = self
            .enum_refs
            .keys()
            .chain(other.enum_refs.keys())
            .copied()
            .collect();
        for fid in fids {
            match (self.enum_table(fid), other.enum_table(fid)) {
                (Some(_), None) => out.push(DictionaryDifference::EnumTableOnlyInLeft(fid)),
                (None, Some(_)) => out.push(DictionaryDifference::EnumTableOnlyInRight(fid)),
                (Some(l), Some(r)) if l.types != r.types => {
                    out.push(DictionaryDifference::EnumTableChanged(fid))
                }
                _ => {}
            }
        }

        out
    }
}

impl PartialEq for DataDictionary {
    fn eq(&self, other: &Self) -> bool {
        self.diff(other).is_empty()
    }
}

impl fmt::Display for DataDictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Data Dictionary Dump: MinFid={} MaxFid={} NumEntries {}\n",
            self.min_fid().unwrap_or(0),
            self.max_fid().unwrap_or(0),
            self.number_of_entries()
        )?;
        writeln!(f, "Tags:\n  DictionaryId=\"{}\"\n", self.info.dictionary_id)?;
        writeln!(f, "  [Field Dictionary Tags]")?;
        writeln!(f, "      Filename=\"{}\"", self.info.field_filename)?;
        writeln!(f, "          Desc=\"{}\"", self.info.field_desc)?;
        writeln!(f, "       Version=\"{}\"", self.info.field_version)?;
        writeln!(f, "         Build=\"{}\"", self.info.field_build)?;
        writeln!(f, "          Date=\"{}\"\n", self.info.field_date)?;
        writeln!(f, "  [Enum Type Dictionary Tags]")?;
        writeln!(f, "      Filename=\"{}\"", self.info.enum_filename)?;
        writeln!(f, "          Desc=\"{}\"", self.info.enum_desc)?;
        writeln!(f, "    RT_Version=\"{}\"", self.info.enum_rt_version)?;
        writeln!(f, "    DT_Version=\"{}\"", self.info.enum_dt_version)?;
        writeln!(f, "          Date=\"{}\"\n", self.info.enum_date)?;

        writeln!(f, "Field Dictionary:")?;
        for e in self.entries.values() {
            writeln!(
                f,
                "  Fid={} '{}' '{}' Type={} RippleTo={} Len={} EnumLen={} RwfType={} RwfLen={}",
                e.fid,
                e.acronym,
                e.dde_acronym,
                e.field_type as i8,
                e.ripple_to,
                e.length,
                e.enum_length,
                e.rwf_type.as_u8(),
                e.rwf_length
            )?;
        }

        writeln!(f, "\nEnum Type Tables:")?;
        for table in &self.enum_tables {
            for fid in &table.fid_references {
                writeln!(f, "(Referenced by Fid {})", fid)?;
            }
            for t in table.types.values() {
                writeln!(
                    f,
                    "value={} display=\"{}\" meaning=\"{}\"",
                    t.value,
                    t.display_str(),
                    t.meaning
                )?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ============================================================================
// Line parsing helpers
// ============================================================================

fn acronym_mismatch(field: &str, reference: &str) -> OmmError {
    OmmError::Dictionary(format!(
        "Acronym mismatch \"{}\" and \"{}\" between Field Dictionary and Enum Type Dictionary",
        field, reference
    ))
}

fn set_once(slot: &mut String, value: &str) {
    if slot.is_empty() {
        *slot = value.to_string();
    }
}

/// Split the part of a `!tag` line after `!tag` into name and value.
fn split_tag(rest: &str) -> (&str, &str) {
    let rest = rest.trim_start();
    match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], rest[pos..].trim()),
        None => (rest, ""),
    }
}

/// Whitespace tokenizer over one dictionary line.
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Cursor { rest: line }
    }

    fn token(&mut self) -> Option<&'a str> {
        let s = self.rest.trim_start();
        if s.is_empty() {
            self.rest = s;
            return None;
        }
        let end = s.find(char::is_whitespace).unwrap_or(s.len());
        self.rest = &s[end..];
        Some(&s[..end])
    }

    fn peek_char(&self) -> Option<char> {
        self.rest.trim_start().chars().next()
    }

    /// Text between `delim` characters, e.g. `"DDE NAME"` or `#1B25#`.
    fn delimited(&mut self, delim: char) -> Option<&'a str> {
        let s = self.rest.trim_start();
        let inner = s.strip_prefix(delim)?;
        let end = inner.find(delim)?;
        self.rest = &inner[end + 1..];
        Some(&inner[..end])
    }

    fn rest(&self) -> &'a str {
        self.rest.trim()
    }
}

fn parse_field_line(line: &str, line_num: usize) -> Result<(DictionaryEntry, Option<String>), OmmError> {
    let mut c = Cursor::new(line);

    let acronym = c
        .token()
        .ok_or_else(|| OmmError::parse(line_num, "Cannot find Acronym"))?;
    let dde_acronym = c
        .delimited('"')
        .ok_or_else(|| OmmError::parse(line_num, "Cannot find DDE Acronym"))?;

    let fid_tok = c
        .token()
        .ok_or_else(|| OmmError::parse(line_num, "Cannot find Fid"))?;
    let fid: i32 = fid_tok
        .parse()
        .map_err(|_| OmmError::parse(line_num, format!("Illegal fid number {}", fid_tok)))?;
    if !(MIN_FID..=MAX_FID).contains(&fid) {
        return Err(OmmError::parse(line_num, format!("Illegal fid number {}", fid)));
    }

    let ripples = c
        .token()
        .ok_or_else(|| OmmError::parse(line_num, "Cannot find Ripples To"))?;
    let ripple = (ripples != "NULL").then(|| ripples.to_string());

    let type_tok = c.token().unwrap_or_default();
    let field_type = MfeedType::from_name(type_tok)
        .ok_or_else(|| OmmError::parse(line_num, format!("Unknown Field Type '{}'", type_tok)))?;

    let length: u16 = c
        .token()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| OmmError::parse(line_num, "Cannot find Length"))?;

    let mut enum_length = 0u8;
    if c.peek_char() == Some('(') {
        let mut inner = String::new();
        while let Some(tok) = c.token() {
            inner.push_str(tok);
            if tok.ends_with(')') {
                break;
            }
        }
        enum_length = inner
            .trim_start_matches('(')
            .trim_end_matches(')')
            .parse()
            .map_err(|_| OmmError::parse(line_num, "Cannot find EnumLen"))?;
    }

    let rwf_tok = c.token().unwrap_or_default();
    let rwf_type = DataType::from_rwf_name(rwf_tok)
        .ok_or_else(|| OmmError::parse(line_num, format!("Illegal Rwf Type '{}'", rwf_tok)))?;

    let rwf_length: u16 = c
        .token()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| OmmError::parse(line_num, "Cannot find Rwf Length"))?;

    let entry = DictionaryEntry {
        acronym: acronym.to_string(),
        dde_acronym: dde_acronym.to_string(),
        fid: fid as i16,
        ripple_to: 0,
        field_type,
        length,
        enum_length,
        rwf_type,
        rwf_length,
    };
    Ok((entry, ripple))
}

fn parse_display(c: &mut Cursor<'_>, line_num: usize) -> Result<Bytes, OmmError> {
    match c.peek_char() {
        Some('"') => {
            let display = c
                .delimited('"')
                .ok_or_else(|| OmmError::parse(line_num, "Missing DISPLAY"))?;
            if display.is_empty() {
                return Err(OmmError::parse(line_num, "Missing DISPLAY"));
            }
            Ok(Bytes::copy_from_slice(display.as_bytes()))
        }
        Some('#') => {
            let hex = c
                .delimited('#')
                .ok_or_else(|| OmmError::parse(line_num, "Invalid hexadecimal input"))?;
            if hex.len() % 2 != 0 {
                return Err(OmmError::parse(line_num, "Odd-length hexadecimal input"));
            }
            decode_hex(hex)
                .map(Bytes::from)
                .ok_or_else(|| OmmError::parse(line_num, "Invalid hexadecimal input"))
        }
        _ => Err(OmmError::parse(line_num, "Missing DISPLAY")),
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(s, 16).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &str = r#"
!tag Filename  RWF.DAT
!tag Desc      test fields
!tag Type      1
!tag Version   4.20.29
!tag DictionaryId 1
!
! ACRONYM    DDE ACRONYM          FID  RIPPLES TO  FIELD TYPE     LENGTH  RWF TYPE   RWF LEN
! -------    -----------          ---  ----------  ----------     ------  --------   -------
PROD_PERM  "PERMISSION"             1  NULL        INTEGER             5  UINT64           2
RDN_EXCHID "IDN EXCHANGE ID"        4  NULL        ENUMERATED    3 ( 3 )  ENUM             1
TRDPRC_1   "LAST"                   6  TRDPRC_2    PRICE              17  REAL64           7
TRDPRC_2   "LAST 1"                 7  NULL        PRICE              17  REAL64           7
"#;

    const ENUMS: &str = r#"
!tag Filename  ENUMTYPE.001
!tag RT_Version 4.20.29
!tag DT_Version 17.11
!
RDN_EXCHID    4
!
! VALUE      DISPLAY   MEANING
     0       "   "     undefined
     1       "ASE"     NYSE AMEX
     2       #4E59#    New York Stock Exchange
"#;

    #[test]
    fn loads_fields_and_resolves_ripples() {
        let mut dict = DataDictionary::new();
        dict.load_field_dictionary_str(FIELDS).unwrap();

        assert_eq!(dict.number_of_entries(), 4);
        assert_eq!(dict.info.field_version, "4.20.29");
        assert_eq!(dict.info.dictionary_id, 1);

        let last = dict.entry(6).unwrap();
        assert_eq!(last.dde_acronym, "LAST");
        assert_eq!(last.ripple_to, 7);
        assert_eq!(last.rwf_type, DataType::Real);

        let exch = dict.entry_by_name("RDN_EXCHID").unwrap();
        assert_eq!(exch.enum_length, 3);
        assert_eq!(exch.field_type, MfeedType::Enumerated);
    }

    #[test]
    fn loads_enum_tables_with_hex_display() {
        let mut dict = DataDictionary::new();
        dict.load_field_dictionary_str(FIELDS).unwrap();
        dict.load_enum_type_dictionary_str(ENUMS).unwrap();

        assert_eq!(dict.enum_type(4, 1).unwrap().display_str(), "ASE");
        assert_eq!(&dict.enum_type(4, 2).unwrap().display[..], b"NY");
        assert_eq!(dict.enum_value_by_display(4, "ASE"), Some(1));
        assert_eq!(dict.enum_table(4).unwrap().max_value, 2);
        assert_eq!(dict.info.enum_dt_version, "17.11");
    }

    #[test]
    fn enum_tables_may_load_first() {
        let mut dict = DataDictionary::new();
        dict.load_enum_type_dictionary_str(ENUMS).unwrap();
        dict.load_field_dictionary_str(FIELDS).unwrap();
        assert_eq!(dict.enum_type(4, 1).unwrap().meaning, "NYSE AMEX");
    }

    #[test]
    fn duplicate_fid_is_rejected_with_line() {
        let text = format!("{}PROD_PERM2 \"X\" 1 NULL INTEGER 5 UINT64 2\n", FIELDS);
        let err = DataDictionary::new().load_field_dictionary_str(&text).unwrap_err();
        assert!(err.to_string().contains("Duplicate definition for fid 1"), "{}", err);
    }

    #[test]
    fn wrong_type_tag_is_rejected() {
        let err = DataDictionary::new()
            .load_field_dictionary_str("!tag Type 2\n")
            .unwrap_err();
        assert!(err.to_string().contains("not a field definitions dictionary"));
    }

    #[test]
    fn enum_errors() {
        let no_refs = "  0  \"A\" a\n";
        let err = DataDictionary::new().load_enum_type_dictionary_str(no_refs).unwrap_err();
        assert!(err.to_string().contains("No referencing FIDs"));

        let empty = "!tag Type 2\n";
        let err = DataDictionary::new().load_enum_type_dictionary_str(empty).unwrap_err();
        assert!(err.to_string().contains("No EnumTable found"));

        let dup = "X 4\n 1 \"A\" a\n 1 \"B\" b\n";
        let err = DataDictionary::new().load_enum_type_dictionary_str(dup).unwrap_err();
        assert!(err.to_string().contains("Duplicate value"));

        let odd = "X 4\n 1 #ABC# a\n";
        let err = DataDictionary::new().load_enum_type_dictionary_str(odd).unwrap_err();
        assert!(err.to_string().contains("Odd-length"));
    }

    #[test]
    fn acronym_mismatch_between_files() {
        let mut dict = DataDictionary::new();
        dict.load_field_dictionary_str(FIELDS).unwrap();
        let err = dict
            .load_enum_type_dictionary_str("WRONG_NAME 4\n 1 \"A\" a\n")
            .unwrap_err();
        assert!(err.to_string().contains("Acronym mismatch"));
    }

    #[test]
    fn rejected_enum_table_leaves_no_references() {
        let mut dict = DataDictionary::new();
        let err = dict
            .load_enum_type_dictionary_str("X 4\nY 4\n 1 \"A\" a\n")
            .unwrap_err();
        assert!(err.to_string().contains("duplicate Enum Table reference"));
        assert!(dict.enum_table(4).is_none());
        assert!(dict.enum_type(4, 1).is_none());

        // Second table fails on a fid the first one already claimed.
        let err = dict
            .add_enum_table(vec![(5, String::new()), (5, String::new())], Vec::new())
            .unwrap_err();
        assert!(err.to_string().contains("FieldId 5"));
        assert!(dict.enum_table(5).is_none());
        assert!(dict.enum_tables().is_empty());

        dict.add_enum_table(vec![(4, "X".into())], Vec::new()).unwrap();
        let err = dict
            .add_enum_table(vec![(6, "Z".into()), (4, "X".into())], Vec::new())
            .unwrap_err();
        assert!(err.to_string().contains("FieldId 4"));
        assert!(dict.enum_table(6).is_none());
        assert_eq!(dict.enum_tables().len(), 1);
        assert!(dict.diff(&dict.clone()).is_empty());
    }

    #[test]
    fn diff_reports_changes() {
        let mut a = DataDictionary::new();
        a.load_field_dictionary_str(FIELDS).unwrap();
        let mut b = a.clone();
        assert_eq!(a, b);

        b.entries.get_mut(&7).unwrap().rwf_length = 8;
        b.entries.remove(&1);
        let diffs = a.diff(&b);
        assert!(diffs.contains(&DictionaryDifference::FieldOnlyInLeft(1)));
        assert!(diffs
            .iter()
            .any(|d| matches!(d, DictionaryDifference::FieldChanged { left, .. } if left.fid == 7)));
        assert_ne!(a, b);
    }

    #[test]
    fn duplicate_displays_are_reported() {
        let mut dict = DataDictionary::new();
        dict.load_enum_type_dictionary_str("X 4\n 1 \"A\" a\n 2 \"A\" b\n 3 \"C\" c\n")
            .unwrap();
        let dups = dict.enum_table(4).unwrap().duplicate_displays();
        assert_eq!(dups, vec![Bytes::from_static(b"A")]);
    }

    #[test]
    fn embedded_dictionary_loads() {
        let dict = DataDictionary::embedded().unwrap();
        assert_eq!(dict.entry(22).map(|e| e.acronym.as_str()), Some("BID"));
        assert!(dict.enum_table(4).is_some());
    }
}
