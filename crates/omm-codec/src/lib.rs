//! omm-codec
//!
//! RWF wire encoding/decoding for OMM messages.
//!
//! This crate turns `omm_core::Msg` and `omm_core::Data` values into
//! bytes and back again.
//!
//! - [`wire_types`]       : flag bits, length encodings, bounds-checked reader
//! - [`primitive_codec`]  : Int/UInt/Real/Date/Time/Qos/State/... content
//! - [`container_codec`]  : FieldList, ElementList, Map, Vector, Series,
//!                          FilterList, Array
//! - [`msg_codec`]        : the eight message classes
//! - [`dictionary_codec`] : dictionaries as Dictionary domain payloads
//! - [`text_codec`]       : readable rendering and `FIELD=value` parsing
//! - [`framing`]          : u32 length-prefixed frames for byte streams

pub mod wire_types;
pub mod error;
pub mod primitive_codec;
pub mod container_codec;
pub mod msg_codec;
pub mod dictionary_codec;
pub mod text_codec;
pub mod framing;

pub use error::CodecError;

pub use container_codec::{
    decode_data,
    encode_data,
};

pub use msg_codec::{
    decode_msg,
    encode_msg,
    extract_msg_class,
    extract_stream_id,
    reencode_with_stream_id,
};

pub use dictionary_codec::{
    decode_enum_type_dictionary,
    decode_field_dictionary,
    encode_enum_type_dictionary,
    encode_field_dictionary,
    verbosity,
    ENUM_DICTIONARY_NAME,
    FIELD_DICTIONARY_NAME,
};

pub use framing::{
    encode_frame,
    split_all_frames,
    split_frame,
};

pub use text_codec::{
    parse_field_assignment,
    render_data,
    render_msg,
};
