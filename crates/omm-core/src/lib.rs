//! omm-core
//!
//! Transport-agnostic OMM data model:
//! - data type codes
//! - primitives (Real, Date/Time, Qos, State)
//! - containers (FieldList, ElementList, Map, Vector, Series, FilterList, Array)
//! - the eight message classes
//! - field dictionary and enum type tables

pub mod data_type;
pub mod primitives;
pub mod containers;
pub mod messages;
pub mod dictionary;
pub mod error;

pub use data_type::DataType;

pub use primitives::{
    real_hint,
    DataState,
    Date,
    DateTime,
    Qos,
    QosRate,
    QosTimeliness,
    Real,
    State,
    StateCode,
    StreamState,
    Time,
};

pub use containers::{
    Data,
    DecodeError,
    DecodeErrorCode,
    ElementEntry,
    ElementList,
    FieldEntry,
    FieldList,
    FieldListInfo,
    FilterAction,
    FilterEntry,
    FilterList,
    Map,
    MapAction,
    MapEntry,
    OmmArray,
    Series,
    SetData,
    Vector,
    VectorAction,
    VectorEntry,
};

pub use messages::{
    domain,
    AckMsg,
    CloseMsg,
    ConflationInfo,
    GenericMsg,
    Msg,
    MsgClass,
    MsgKey,
    NakCode,
    PostMsg,
    PostUserInfo,
    Priority,
    RefreshMsg,
    RequestMsg,
    StatusMsg,
    UpdateMsg,
};

pub use dictionary::{
    DataDictionary,
    DictionaryDifference,
    DictionaryEntry,
    DictionaryInfo,
    EnumType,
    EnumTypeTable,
    MfeedType,
};
pub use error::OmmError;

pub use bytes::Bytes;
