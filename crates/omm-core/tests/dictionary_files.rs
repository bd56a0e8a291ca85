// crates/omm-core/tests/dictionary_files.rs
use std::fs;

use omm_core::{DataDictionary, DataType, DictionaryDifference, MfeedType};

const FIELDS: &str = include_str!("data/RDMFieldDictionaryBoundary");
const ENUMS: &str = include_str!("data/enumtypeBoundary.def");

fn boundary_dictionary() -> DataDictionary {
    let mut dict = DataDictionary::new();
    dict.load_field_dictionary_str(FIELDS)
        .expect("boundary field dictionary should load");
    dict.load_enum_type_dictionary_str(ENUMS)
        .expect("boundary enum dictionary should load");
    dict
}

#[test]
fn boundary_field_dictionary_contents() {
    let dict = boundary_dictionary();

    assert_eq!(dict.number_of_entries(), 8);
    assert_eq!(dict.max_fid(), Some(32767));
    assert_eq!(dict.min_fid(), Some(-32768));

    assert_eq!(dict.info.field_filename, "RWF.DAT");
    assert_eq!(dict.info.field_desc, "RDF-D RWF field set");
    assert_eq!(dict.info.field_version, "4.10.11");
    assert_eq!(dict.info.field_build, "1");
    assert_eq!(dict.info.field_date, "01-Jun-2012");

    let perm = dict.entry(1).unwrap();
    assert_eq!(perm.acronym, "PROD_PERM");
    assert_eq!(perm.dde_acronym, "PERMISSION");
    assert_eq!(perm.ripple_to, 0);
    assert_eq!(perm.field_type, MfeedType::Integer);
    assert_eq!(perm.length, 5);
    assert_eq!(perm.enum_length, 0);
    assert_eq!(perm.rwf_type, DataType::UInt);
    assert_eq!(perm.rwf_length, 2);

    let max = dict.entry(32767).unwrap();
    assert_eq!(max.acronym, "MAX_FID");
    assert_eq!(max.field_type, MfeedType::Enumerated);
    assert_eq!(max.enum_length, 3);
    assert_eq!(max.rwf_type, DataType::Enum);

    let min = dict.entry(-32768).unwrap();
    assert_eq!(min.acronym, "MIN_FID");
    assert_eq!(min.rwf_length, 1);

    let last = dict.entry(6).unwrap();
    assert_eq!(last.dde_acronym, "LAST");
    assert_eq!(last.ripple_to, 7);
    assert_eq!(last.field_type, MfeedType::Price);
    assert_eq!(last.length, 17);
    assert_eq!(last.rwf_type, DataType::Real);
    assert_eq!(last.rwf_length, 7);

    assert_eq!(dict.entry(18).unwrap().field_type, MfeedType::TimeSeconds);
}

#[test]
fn boundary_enum_tables_are_shared_by_all_references() {
    let dict = boundary_dictionary();

    assert_eq!(dict.info.enum_rt_version, "4.10.11");
    assert_eq!(dict.info.enum_dt_version, "12.11");
    assert_eq!(dict.enum_tables().len(), 1);

    let table = dict.enum_table(-32768).unwrap();
    assert_eq!(table.fid_references, vec![-32768, 4, 32767]);
    assert_eq!(table.max_value, 65535);

    assert_eq!(dict.enum_type(32767, 65535).unwrap().meaning, "largest enum value");
    assert_eq!(dict.enum_type(4, 1).unwrap().display_str(), "ASE");
    assert!(dict.enum_type(4, 2).is_none());
}

#[test]
fn loads_from_disk_and_compares_equal() {
    let dir = tempfile::tempdir().unwrap();
    let field_path = dir.path().join("RDMFieldDictionary");
    let enum_path = dir.path().join("enumtype.def");
    fs::write(&field_path, FIELDS).unwrap();
    fs::write(&enum_path, ENUMS).unwrap();

    let from_disk = DataDictionary::from_files(&field_path, &enum_path).unwrap();
    assert_eq!(from_disk, boundary_dictionary());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DataDictionary::new()
        .load_field_dictionary(dir.path().join("xyz"))
        .unwrap_err();
    assert!(err.to_string().starts_with("Can't open file"));
}

#[test]
fn compare_against_embedded_lists_differences() {
    let boundary = boundary_dictionary();
    let embedded = DataDictionary::embedded().unwrap();

    let diffs = boundary.diff(&embedded);
    assert!(diffs.contains(&DictionaryDifference::FieldOnlyInLeft(32767)));
    assert!(diffs.contains(&DictionaryDifference::FieldOnlyInRight(22)));
    assert!(diffs
        .iter()
        .any(|d| matches!(d, DictionaryDifference::InfoChanged { tag: "Version", .. })));
}

#[test]
fn dump_lists_fields_and_tables() {
    let dump = boundary_dictionary().to_string();
    assert!(dump.starts_with("Data Dictionary Dump: MinFid=-32768 MaxFid=32767 NumEntries 8"));
    assert!(dump.contains("Fid=6 'TRDPRC_1' 'LAST'"));
    assert!(dump.contains("(Referenced by Fid 4)"));
    assert!(dump.contains("value=1 display=\"ASE\" meaning=\"NYSE AMEX\""));
}

#[test]
fn failed_enum_file_keeps_the_previous_tables() {
    let mut dict = boundary_dictionary();
    let before = dict.clone();

    // The first table is fine, the second repeats a value.
    let bad = "PROD_PERM 1\n 1 \"P\" perm\nX 9\n 1 \"A\" a\n 1 \"B\" b\n";
    let err = dict.load_enum_type_dictionary_str(bad).unwrap_err();
    assert!(err.to_string().contains("Duplicate value"), "{}", err);

    assert!(dict.enum_table(1).is_none());
    assert!(dict.enum_table(9).is_none());
    assert_eq!(dict.enum_tables().len(), 1);
    assert_eq!(dict, before);
}

#[test]
fn failed_field_file_keeps_the_previous_entries() {
    let mut dict = DataDictionary::new();
    let bad = "BID \"BID\" 22 NULL PRICE 17 REAL64 7\nBID2 \"BID\" 22 NULL PRICE 17 REAL64 7\n";
    assert!(dict.load_field_dictionary_str(bad).is_err());

    assert_eq!(dict.number_of_entries(), 0);
    assert!(dict.entry_by_name("BID").is_none());
    assert!(!dict.is_field_dictionary_loaded());

    dict.load_field_dictionary_str(FIELDS).unwrap();
    assert_eq!(dict.number_of_entries(), 8);
    assert!(dict.is_field_dictionary_loaded());
}
