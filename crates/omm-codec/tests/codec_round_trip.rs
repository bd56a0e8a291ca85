// crates/omm-codec/tests/codec_round_trip.rs
use bytes::{Bytes, BytesMut};

use omm_codec::{
    decode_enum_type_dictionary, decode_field_dictionary, decode_msg, encode_enum_type_dictionary,
    encode_field_dictionary, encode_msg, extract_msg_class, extract_stream_id, render_msg,
    reencode_with_stream_id, verbosity,
};
use omm_core::{
    domain, real_hint, AckMsg, CloseMsg, ConflationInfo, Data, DataDictionary, DataState,
    DataType, Date, DateTime, DecodeErrorCode, ElementList, FieldList, FilterAction, FilterList,
    GenericMsg, Map, MapAction, Msg, MsgClass, MsgKey, NakCode, OmmArray, PostMsg, PostUserInfo,
    Priority, Qos, QosRate, QosTimeliness, Real, RefreshMsg, RequestMsg, Series, State, StateCode,
    StatusMsg, StreamState, Time, UpdateMsg, Vector, VectorAction,
};

const FIELD_DICTIONARY: &str = include_str!("data/RDMFieldDictionaryAllTypes");
const ENUM_DICTIONARY: &str = include_str!("data/enumtypeAllTypes.def");

fn all_types_dictionary() -> DataDictionary {
    let mut dict = DataDictionary::new();
    dict.load_field_dictionary_str(FIELD_DICTIONARY).unwrap();
    dict.load_enum_type_dictionary_str(ENUM_DICTIONARY).unwrap();
    dict
}

fn encode(msg: &Msg) -> Bytes {
    let mut out = BytesMut::new();
    encode_msg(msg, &mut out).unwrap();
    out.freeze()
}

fn sample_key() -> MsgKey {
    MsgKey::named("TRI.N")
        .with_service_id(300)
        .with_name_type(1)
        .with_filter(0x0F)
        .with_identifier(-9)
        .with_attrib(ElementList::new().add("ApplicationId", "256"))
}

fn delayed_qos() -> Qos {
    let mut q = Qos::new(QosTimeliness::Delayed, QosRate::JitConflated);
    q.time_info = 15;
    q
}

fn every_type_field_list() -> FieldList {
    let nested_update: Msg = UpdateMsg {
        stream_id: 9,
        domain_type: domain::MARKET_PRICE,
        payload: FieldList::new().add(5, Real::new(-42, real_hint::EXPONENT_1)).into(),
        ..Default::default()
    }
    .into();

    FieldList::new()
        .with_info(7, 12)
        .add(1, -1_234_567i64)
        .add(2, u64::MAX)
        .add(3, Data::Float(1.5))
        .add(4, -2.25f64)
        .add(5, Real::new(399_025, real_hint::EXPONENT_4))
        .add(6, Data::Blank(DataType::Real))
        .add(7, Data::Date(Date::new(2012, 6, 1)))
        .add(8, Data::Time(Time::new(10, 11, 12, 13, 14, 15)))
        .add(
            9,
            Data::DateTime(DateTime::new(Date::new(1999, 12, 31), Time::hms(23, 59, 59))),
        )
        .add(10, Data::Qos(delayed_qos()))
        .add(
            11,
            Data::State(
                State::new(StreamState::ClosedRecover, DataState::Suspect)
                    .with_code(StateCode::TIMEOUT)
                    .with_text("timed out"),
            ),
        )
        .add(12, Data::Enum(3))
        .add(
            13,
            OmmArray::new(DataType::Int).fixed_width(2).add(-1i64).add(300i64),
        )
        .add(14, Data::Buffer(Bytes::from_static(&[0x00, 0xFF, 0x10])))
        .add(15, "IBM.N")
        .add(16, Data::Utf8("héllo".to_string()))
        .add(17, Data::Rmtes(Bytes::from_static(b"\x1b\x25\x30abc")))
        .add(18, ElementList::new().add("Depth", 3u64).add("Empty", Data::NoData))
        .add(
            19,
            Map::new(DataType::AsciiString, DataType::FieldList)
                .with_key_field_id(15)
                .with_total_count_hint(2)
                .with_summary(FieldList::new().add(1, 5i64))
                .add(MapAction::Add, "A", FieldList::new().add(2, 10u64))
                .add(MapAction::Delete, "B", Data::NoData),
        )
        .add(
            20,
            Vector::new(DataType::ElementList)
                .add(0, VectorAction::Set, ElementList::new().add("x", 1i64))
                .add(4, VectorAction::Clear, Data::NoData),
        )
        .add(
            21,
            Series::new(DataType::ElementList)
                .add(ElementList::new().add("row", 1u64))
                .add(ElementList::new().add("row", 2u64)),
        )
        .add(
            22,
            FilterList::new(DataType::ElementList)
                .add(1, FilterAction::Set, ElementList::new().add("Name", "DIRECT_FEED")),
        )
        .add(23, Data::Opaque(Bytes::from_static(b"\x01\x02\x03")))
        .add(24, Data::Xml("<a b=\"1\"/>".to_string()))
        .add(25, Data::Json("{\"k\":[1,2]}".to_string()))
        .add(26, Data::AnsiPage(Bytes::from_static(b"\x1b[2J")))
        .add(27, nested_update)
        .add(28, FieldList::new().add(12, Data::Enum(1)))
        .add(-5, 0i64)
}

#[test]
fn every_rwf_type_survives_a_refresh() {
    let dict = all_types_dictionary();
    let msg: Msg = RefreshMsg {
        stream_id: 5,
        domain_type: domain::MARKET_PRICE,
        key: Some(MsgKey::named("TRI.N").with_service_id(1)),
        state: State::open_ok("All is well"),
        group_id: Bytes::from_static(&[0, 1]),
        solicited: true,
        complete: true,
        payload: every_type_field_list().into(),
        ..Default::default()
    }
    .into();

    let bytes = encode(&msg);
    let decoded = decode_msg(&bytes, Some(&dict)).unwrap();
    assert_eq!(decoded, msg);

    // Re-encoding the decoded form is byte-identical.
    assert_eq!(encode(&decoded), bytes);
}

#[test]
fn without_dictionary_fields_stay_raw() {
    let msg: Msg = UpdateMsg {
        stream_id: 2,
        domain_type: domain::MARKET_PRICE,
        payload: FieldList::new().add(1, 7i64).add(15, "X").into(),
        ..Default::default()
    }
    .into();
    let bytes = encode(&msg);

    let decoded = decode_msg(&bytes, None).unwrap();
    let fields = decoded.payload().as_field_list().unwrap();
    assert_eq!(fields.len(), 2);
    for entry in &fields.entries {
        match &entry.load {
            Data::Error(e) => assert_eq!(e.code, DecodeErrorCode::FieldIdNotFound),
            other => panic!("expected a raw entry, got {:?}", other),
        }
    }
    assert_eq!(encode(&decoded), bytes);

    // Decoding the same bytes with a dictionary types them.
    let dict = all_types_dictionary();
    assert_eq!(decode_msg(&bytes, Some(&dict)).unwrap(), msg);
}

#[test]
fn every_message_class_round_trips() {
    let payload: Data = ElementList::new().add("Text", "payload").into();
    let messages: Vec<Msg> = vec![
        RequestMsg {
            stream_id: 3,
            domain_type: domain::MARKET_BY_ORDER,
            key: sample_key(),
            priority: Some(Priority { class: 2, count: 300 }),
            qos: Some(Qos::realtime_tick_by_tick()),
            worst_qos: Some(delayed_qos()),
            extended_header: Some(Bytes::from_static(b"ext")),
            streaming: true,
            msg_key_in_updates: true,
            conf_info_in_updates: true,
            private_stream: true,
            pause: true,
            qualified_stream: true,
            has_view: true,
            has_batch: true,
            payload: payload.clone(),
            ..Default::default()
        }
        .into(),
        RefreshMsg {
            stream_id: -4,
            domain_type: domain::MARKET_PRICE,
            key: Some(sample_key()),
            state: State::open_ok("ok"),
            group_id: Bytes::from_static(&[0, 5]),
            seq_num: Some(77),
            perm_data: Some(Bytes::from_static(&[0x03, 0x01, 0x2C])),
            qos: Some(Qos::realtime_tick_by_tick()),
            part_num: Some(300),
            post_user_info: Some(PostUserInfo {
                address: 0x7F00_0001,
                user_id: 42,
            }),
            extended_header: Some(Bytes::from_static(b"e")),
            solicited: true,
            complete: true,
            clear_cache: true,
            do_not_cache: true,
            private_stream: true,
            qualified_stream: true,
            request_key: true,
            payload: payload.clone(),
        }
        .into(),
        StatusMsg {
            stream_id: 6,
            domain_type: domain::LOGIN,
            key: Some(MsgKey::named("user")),
            state: Some(State::new(StreamState::Closed, DataState::Suspect).with_text("bye")),
            group_id: Some(Bytes::from_static(&[1])),
            perm_data: Some(Bytes::from_static(&[9])),
            post_user_info: Some(PostUserInfo {
                address: 1,
                user_id: 2,
            }),
            extended_header: Some(Bytes::from_static(b"s")),
            clear_cache: true,
            private_stream: true,
            qualified_stream: true,
            request_key: true,
            payload: Data::NoData,
        }
        .into(),
        UpdateMsg {
            stream_id: 7,
            domain_type: domain::MARKET_PRICE,
            update_type: 1,
            key: Some(MsgKey::named("IBM.N")),
            seq_num: Some(u32::MAX),
            conflation: Some(ConflationInfo { count: 200, time: 500 }),
            perm_data: Some(Bytes::from_static(&[1, 2])),
            post_user_info: Some(PostUserInfo {
                address: 3,
                user_id: 4,
            }),
            extended_header: Some(Bytes::from_static(b"u")),
            do_not_cache: true,
            do_not_conflate: true,
            do_not_ripple: true,
            discardable: true,
            payload: payload.clone(),
        }
        .into(),
        CloseMsg {
            stream_id: 8,
            domain_type: domain::MARKET_PRICE,
            extended_header: Some(Bytes::from_static(b"c")),
            ack: true,
            batch: true,
            payload: Data::NoData,
        }
        .into(),
        AckMsg {
            stream_id: 9,
            domain_type: domain::MARKET_PRICE,
            ack_id: 1234,
            nak_code: Some(NakCode::SYMBOL_UNKNOWN),
            text: Some("no such item".to_string()),
            seq_num: Some(5),
            key: Some(MsgKey::named("NOPE")),
            extended_header: Some(Bytes::from_static(b"a")),
            private_stream: true,
            qualified_stream: true,
            payload: Data::NoData,
        }
        .into(),
        GenericMsg {
            stream_id: 10,
            domain_type: 128,
            key: Some(MsgKey::named("gen").with_filter(3)),
            seq_num: Some(1),
            secondary_seq_num: Some(2),
            perm_data: Some(Bytes::from_static(&[7])),
            part_num: Some(4),
            extended_header: Some(Bytes::from_static(b"g")),
            complete: true,
            provider_driven: true,
            payload: payload.clone(),
        }
        .into(),
        PostMsg {
            stream_id: 11,
            domain_type: domain::MARKET_PRICE,
            post_user_info: PostUserInfo {
                address: 0x0A00_0001,
                user_id: 99,
            },
            key: Some(MsgKey::named("TRI.N").with_service_id(1)),
            seq_num: Some(3),
            post_id: Some(17),
            perm_data: Some(Bytes::from_static(&[5])),
            part_num: Some(0),
            post_user_rights: Some(7),
            extended_header: Some(Bytes::from_static(b"p")),
            complete: true,
            ack: true,
            payload: Data::Msg(Box::new(
                UpdateMsg {
                    stream_id: 0,
                    domain_type: domain::MARKET_PRICE,
                    payload: payload.clone(),
                    ..Default::default()
                }
                .into(),
            )),
        }
        .into(),
    ];

    for msg in messages {
        let bytes = encode(&msg);
        assert_eq!(extract_msg_class(&bytes).unwrap(), msg.class());
        assert_eq!(extract_stream_id(&bytes).unwrap(), msg.stream_id());
        assert_eq!(decode_msg(&bytes, None).unwrap(), msg, "{}", msg.class_name());
    }
}

#[test]
fn dictionary_survives_the_dictionary_domain() {
    let dict = all_types_dictionary();

    let field_refresh: Msg = RefreshMsg {
        stream_id: 3,
        domain_type: domain::DICTIONARY,
        key: Some(MsgKey::named("RWFFld").with_filter(verbosity::NORMAL)),
        state: State::open_ok(""),
        complete: true,
        payload: encode_field_dictionary(&dict, verbosity::NORMAL).into(),
        ..Default::default()
    }
    .into();
    let enum_refresh: Msg = RefreshMsg {
        stream_id: 4,
        domain_type: domain::DICTIONARY,
        key: Some(MsgKey::named("RWFEnum").with_filter(verbosity::VERBOSE)),
        state: State::open_ok(""),
        complete: true,
        payload: encode_enum_type_dictionary(&dict, verbosity::VERBOSE).into(),
        ..Default::default()
    }
    .into();

    let mut received = DataDictionary::new();
    for msg in [&field_refresh, &enum_refresh] {
        let decoded = decode_msg(&encode(msg), None).unwrap();
        let series = match decoded.payload() {
            Data::Series(s) => s.clone(),
            other => panic!("expected a series, got {:?}", other),
        };
        match decoded.item_name() {
            Some("RWFFld") => decode_field_dictionary(&series, &mut received).unwrap(),
            Some("RWFEnum") => decode_enum_type_dictionary(&series, &mut received).unwrap(),
            other => panic!("unexpected item {:?}", other),
        }
    }

    let differences = received.diff(&dict);
    assert!(differences.is_empty(), "{:?}", differences);
    assert_eq!(received.info.dictionary_id, 7);
    assert_eq!(
        received.enum_type(12, 3).unwrap().display,
        Bytes::from_static(&[0x7F, 0x80])
    );
    assert_eq!(received.entry(5).unwrap().ripple_to, 6);
}

#[test]
fn reencode_moves_a_message_to_another_stream() {
    let msg: Msg = UpdateMsg {
        stream_id: 1,
        domain_type: domain::MARKET_PRICE,
        payload: FieldList::new().add(5, Real::new(1, real_hint::EXPONENT0)).into(),
        ..Default::default()
    }
    .into();
    let bytes = encode(&msg);
    let moved = reencode_with_stream_id(&bytes, 1000).unwrap();

    assert_eq!(moved.len(), bytes.len());
    assert_eq!(extract_msg_class(&moved).unwrap(), MsgClass::Update);
    assert_eq!(extract_stream_id(&moved).unwrap(), 1000);

    let dict = all_types_dictionary();
    let mut expected = msg;
    expected.set_stream_id(1000);
    assert_eq!(decode_msg(&moved, Some(&dict)).unwrap(), expected);
}

#[test]
fn rendering_names_fields_and_enums() {
    let dict = all_types_dictionary();
    let msg: Msg = UpdateMsg {
        stream_id: 5,
        domain_type: domain::MARKET_PRICE,
        payload: FieldList::new()
            .add(5, Real::new(1, real_hint::EXPONENT_1))
            .add(12, Data::Enum(1))
            .into(),
        ..Default::default()
    }
    .into();
    let decoded = decode_msg(&encode(&msg), Some(&dict)).unwrap();
    let text = render_msg(&decoded, Some(&dict));

    assert!(text.contains(
        "<fieldEntry fieldId=\"5\" acronym=\"T_REAL\" dataType=\"REAL\" data=\"0.1\"/>"
    ));
    assert!(text.contains("acronym=\"T_ENUM\" dataType=\"ENUM\" data=\"1 (UP)\""));
}
