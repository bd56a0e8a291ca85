// crates/omm-consumer/src/commands.rs

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use omm_codec::{decode_msg, parse_field_assignment, split_all_frames};
use omm_core::{
    domain, Data, DataDictionary, DictionaryDifference, FieldList, Msg, MsgKey, PostMsg,
    PostUserInfo, RequestMsg, StreamState, UpdateMsg,
};

use crate::error::ConsumerError;
use crate::network::{OmmConnection, LOGIN_STREAM_ID};
use crate::output::Printer;
use crate::types::{ConsumerConfig, OutputFormat};

// ============================================================================
// Sessions
// ============================================================================

/// Dictionary from the configured files, or the embedded one.
pub fn local_dictionary(config: &ConsumerConfig) -> Result<DataDictionary> {
    match config.dictionary_files() {
        Some((field, enums)) => DataDictionary::from_files(field, enums)
            .with_context(|| format!("loading {} / {}", field.display(), enums.display())),
        None => DataDictionary::embedded().context("loading embedded dictionary"),
    }
}

/// Connect, log in and get a dictionary: local files when configured,
/// otherwise downloaded from the provider.
async fn open_session(config: &ConsumerConfig) -> Result<OmmConnection> {
    let mut conn = OmmConnection::connect(&config.server_addr).await?;
    conn.login(&config.login_name).await?;

    let dictionary = match config.dictionary_files() {
        Some(_) => local_dictionary(config)?,
        None => conn.download_dictionary(config.service_id).await?,
    };
    conn.set_dictionary(Arc::new(dictionary));
    Ok(conn)
}

fn printer_for(conn: &OmmConnection, format: OutputFormat) -> Printer {
    Printer::new(format, conn.dictionary().cloned())
}

// ============================================================================
// Message builders
// ============================================================================

pub fn item_request(
    stream_id: i32,
    name: &str,
    service_id: u16,
    domain_type: u8,
    streaming: bool,
) -> RequestMsg {
    RequestMsg {
        stream_id,
        domain_type,
        key: MsgKey::named(name).with_service_id(service_id).with_name_type(1),
        streaming,
        ..Default::default()
    }
}

/// Parse `FIELD=value` arguments into one FieldList, in argument order.
pub fn parse_assignments(args: &[String], dict: &DataDictionary) -> Result<FieldList> {
    let mut fields = FieldList::new();
    for arg in args {
        let entry =
            parse_field_assignment(arg, dict).with_context(|| format!("parsing '{}'", arg))?;
        fields.entries.push(entry);
    }
    Ok(fields)
}

/// Off-stream post on the login stream, asking for an ack.
pub fn item_post(
    name: &str,
    service_id: u16,
    fields: FieldList,
    post_id: u32,
    post_user_info: PostUserInfo,
) -> PostMsg {
    PostMsg {
        stream_id: LOGIN_STREAM_ID,
        domain_type: domain::MARKET_PRICE,
        post_user_info,
        key: Some(MsgKey::named(name).with_service_id(service_id)),
        seq_num: Some(post_id),
        post_id: Some(post_id),
        complete: true,
        ack: true,
        payload: Data::Msg(Box::new(
            UpdateMsg {
                domain_type: domain::MARKET_PRICE,
                payload: fields.into(),
                ..Default::default()
            }
            .into(),
        )),
        ..Default::default()
    }
}

// ============================================================================
// Online commands
// ============================================================================

pub async fn snapshot(
    config: &ConsumerConfig,
    item: &str,
    domain_type: u8,
    format: OutputFormat,
) -> Result<ExitCode> {
    let mut conn = open_session(config).await?;
    let printer = printer_for(&conn, format);

    let stream_id = conn.next_stream_id();
    let req = item_request(stream_id, item, config.service_id, domain_type, false);
    conn.send(&req.into()).await?;

    loop {
        let msg = conn.expect_msg().await?;
        if msg.stream_id() != stream_id {
            debug!("Ignoring {} on stream {}", msg.class_name(), msg.stream_id());
            continue;
        }
        printer.print(&msg);

        match &msg {
            Msg::Refresh(refresh) if refresh.complete => return Ok(ExitCode::SUCCESS),
            Msg::Refresh(_) | Msg::Update(_) => {}
            Msg::Status(status) => {
                let closed = status
                    .state
                    .as_ref()
                    .map(|s| s.stream_state != StreamState::Open)
                    .unwrap_or(false);
                if closed {
                    return Ok(ExitCode::FAILURE);
                }
            }
            _ => return Err(ConsumerError::unexpected(&msg).into()),
        }
    }
}

/// Print everything received on the item streams until Ctrl-C, until all
/// streams are closed, or until `limit` messages have been printed.
pub async fn stream(
    config: &ConsumerConfig,
    items: &[String],
    domain_type: u8,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<ExitCode> {
    let mut conn = open_session(config).await?;
    let printer = printer_for(&conn, format);

    let mut open: IndexMap<i32, String> = IndexMap::new();
    for item in items {
        let stream_id = conn.next_stream_id();
        let req = item_request(stream_id, item, config.service_id, domain_type, true);
        conn.send(&req.into()).await?;
        open.insert(stream_id, item.clone());
    }
    info!("Opened {} item streams", open.len());

    let messages = conn.into_messages();
    tokio::pin!(messages);
    let mut printed = 0usize;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing");
                return Ok(ExitCode::SUCCESS);
            }
            next = messages.next() => {
                let msg = match next {
                    Some(msg) => msg?,
                    None => return Err(ConsumerError::ConnectionClosed(config.server_addr.clone()).into()),
                };
                if !open.contains_key(&msg.stream_id()) {
                    debug!("Ignoring {} on stream {}", msg.class_name(), msg.stream_id());
                    continue;
                }
                printer.print(&msg);
                printed += 1;

                if let Msg::Status(status) = &msg {
                    let closed = status
                        .state
                        .as_ref()
                        .map(|s| s.stream_state != StreamState::Open)
                        .unwrap_or(false);
                    if closed {
                        if let Some(item) = open.shift_remove(&msg.stream_id()) {
                            warn!("Stream for '{}' closed", item);
                        }
                        if open.is_empty() {
                            return Ok(ExitCode::FAILURE);
                        }
                    }
                }

                if limit.map(|n| printed >= n).unwrap_or(false) {
                    return Ok(ExitCode::SUCCESS);
                }
            }
        }
    }
}

pub async fn post(
    config: &ConsumerConfig,
    item: &str,
    assignments: &[String],
    format: OutputFormat,
) -> Result<ExitCode> {
    let mut conn = open_session(config).await?;
    let printer = printer_for(&conn, format);

    let fields = match conn.dictionary() {
        Some(dict) => parse_assignments(assignments, dict)?,
        None => parse_assignments(assignments, &local_dictionary(config)?)?,
    };
    let user = PostUserInfo {
        address: conn.local_address(),
        user_id: std::process::id(),
    };
    let post = item_post(item, config.service_id, fields, 1, user);
    conn.send(&post.into()).await?;

    loop {
        match conn.expect_msg().await? {
            Msg::Ack(ack) if ack.stream_id == LOGIN_STREAM_ID => {
                let nakked = ack.nak_code.is_some();
                printer.print(&ack.into());
                return Ok(if nakked {
                    ExitCode::FAILURE
                } else {
                    ExitCode::SUCCESS
                });
            }
            other => debug!("Ignoring {} while waiting for ack", other.class_name()),
        }
    }
}

// ============================================================================
// Offline commands
// ============================================================================

/// Decode every frame of a capture.
pub fn decode_frames(data: &[u8], dict: &DataDictionary) -> Result<Vec<Msg>> {
    let frames = split_all_frames(data).context("splitting frames")?;
    frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            decode_msg(frame, Some(dict)).with_context(|| format!("decoding frame {}", i + 1))
        })
        .collect()
}

pub fn decode_file(config: &ConsumerConfig, path: &Path, format: OutputFormat) -> Result<ExitCode> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let dict = Arc::new(local_dictionary(config)?);
    let printer = Printer::new(format, Some(dict.clone()));

    let msgs = decode_frames(&data, &dict)?;
    for msg in &msgs {
        printer.print(msg);
    }
    info!("Decoded {} messages from {}", msgs.len(), path.display());
    Ok(ExitCode::SUCCESS)
}

pub fn compare_dictionaries(
    a_field: &Path,
    a_enum: &Path,
    b_field: &Path,
    b_enum: &Path,
) -> Result<Vec<DictionaryDifference>> {
    let a = DataDictionary::from_files(a_field, a_enum)
        .with_context(|| format!("loading {}", a_field.display()))?;
    let b = DataDictionary::from_files(b_field, b_enum)
        .with_context(|| format!("loading {}", b_field.display()))?;
    Ok(a.diff(&b))
}

pub fn dict_compare(
    a_field: &Path,
    a_enum: &Path,
    b_field: &Path,
    b_enum: &Path,
    format: OutputFormat,
) -> Result<ExitCode> {
    let differences = compare_dictionaries(a_field, a_enum, b_field, b_enum)?;

    match format {
        OutputFormat::Text => {
            for d in &differences {
                println!("{}", d);
            }
            println!("{} differences", differences.len());
        }
        OutputFormat::Json => {
            let lines: Vec<String> = differences.iter().map(|d| d.to_string()).collect();
            println!("{}", serde_json::to_string_pretty(&lines)?);
        }
    }

    Ok(if differences.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use omm_codec::encode_frame;
    use omm_core::{real_hint, CloseMsg, Real};

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn assignments_follow_the_dictionary() {
        let dict = DataDictionary::embedded().unwrap();
        let fields =
            parse_assignments(&args(&["BID=39.90", "ORDER_SIDE=ASK", "ASK="]), &dict).unwrap();
        assert_eq!(fields.get(22), Some(&Data::Real(Real::new(3990, real_hint::EXPONENT_2))));
        assert_eq!(fields.get(3428), Some(&Data::Enum(2)));
        assert!(fields.get(25).unwrap().is_blank());

        assert!(parse_assignments(&args(&["NOT_A_FIELD=1"]), &dict).is_err());
    }

    #[test]
    fn post_wraps_an_update() {
        let fields = FieldList::new().add(22, Real::new(1, real_hint::EXPONENT0));
        let post = item_post("TRI.N", 1, fields.clone(), 7, PostUserInfo::default());
        assert!(post.ack);
        assert_eq!(post.post_id, Some(7));
        assert_eq!(post.stream_id, LOGIN_STREAM_ID);
        match &post.payload {
            Data::Msg(inner) => assert_eq!(inner.payload(), &Data::FieldList(fields)),
            other => panic!("expected a nested update, got {:?}", other),
        }
    }

    #[test]
    fn captured_frames_decode_in_order() {
        let dict = DataDictionary::embedded().unwrap();
        let mut data = BytesMut::new();
        for stream_id in [2, 3] {
            let msg: Msg = item_request(stream_id, "TRI.N", 1, domain::MARKET_PRICE, true).into();
            encode_frame(&msg, &mut data).unwrap();
        }
        let close: Msg = CloseMsg {
            stream_id: 2,
            domain_type: domain::MARKET_PRICE,
            ..Default::default()
        }
        .into();
        encode_frame(&close, &mut data).unwrap();

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &data).unwrap();
        let read = std::fs::read(file.path()).unwrap();

        let msgs = decode_frames(&read, &dict).unwrap();
        let summary: Vec<(&str, i32)> = msgs.iter().map(|m| (m.class_name(), m.stream_id())).collect();
        assert_eq!(summary, vec![("ReqMsg", 2), ("ReqMsg", 3), ("CloseMsg", 2)]);

        assert!(decode_frames(&read[..read.len() - 1], &dict).is_err());
    }

    #[test]
    fn dictionary_files_are_compared() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, text: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, text).unwrap();
            path
        };
        let enums = write("enumtype.def", "ORDER_SIDE 3428\n 1 \"BID\" bid\n 2 \"ASK\" ask\n");
        let a = write(
            "a",
            "BID \"BID\" 22 NULL PRICE 17 REAL64 7\nASK \"ASK\" 25 NULL PRICE 17 REAL64 7\n",
        );
        let b = write("b", "BID \"BID\" 22 NULL PRICE 17 REAL64 7\n");

        assert!(compare_dictionaries(&a, &enums, &a, &enums).unwrap().is_empty());
        assert_eq!(
            compare_dictionaries(&a, &enums, &b, &enums).unwrap(),
            vec![DictionaryDifference::FieldOnlyInLeft(25)]
        );
    }
}
