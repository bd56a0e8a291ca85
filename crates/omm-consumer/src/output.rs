// crates/omm-consumer/src/output.rs

use std::sync::Arc;

use chrono::{DateTime, Local};
use serde_json::{json, Map, Value};

use omm_codec::render_msg;
use omm_codec::text_codec::primitive_text;
use omm_core::{domain, Data, DataDictionary, Msg, State};

use crate::types::OutputFormat;

/// Prints received messages in the chosen format.
pub struct Printer {
    format: OutputFormat,
    dictionary: Option<Arc<DataDictionary>>,
}

impl Printer {
    pub fn new(format: OutputFormat, dictionary: Option<Arc<DataDictionary>>) -> Self {
        Self { format, dictionary }
    }

    pub fn format_msg(&self, msg: &Msg, received: DateTime<Local>) -> String {
        let dict = self.dictionary.as_deref();
        match self.format {
            OutputFormat::Text => format!(
                "[{}]\n{}",
                received.format("%H:%M:%S%.3f"),
                render_msg(msg, dict)
            ),
            OutputFormat::Json => msg_json(msg, dict, received).to_string(),
        }
    }

    pub fn print(&self, msg: &Msg) {
        println!("{}", self.format_msg(msg, Local::now()));
    }
}

fn msg_json(msg: &Msg, dict: Option<&DataDictionary>, received: DateTime<Local>) -> Value {
    let mut obj = Map::new();
    obj.insert("received".into(), json!(received.to_rfc3339()));
    obj.insert("class".into(), json!(msg.class_name()));
    obj.insert("streamId".into(), json!(msg.stream_id()));
    obj.insert("domain".into(), json!(domain::name(msg.domain_type())));
    if let Some(name) = msg.item_name() {
        obj.insert("item".into(), json!(name));
    }
    if let Some(state) = msg_state(msg) {
        obj.insert("state".into(), json!(state.to_string()));
    }
    if let Msg::Ack(ack) = msg {
        obj.insert("ackId".into(), json!(ack.ack_id));
        if let Some(code) = ack.nak_code {
            obj.insert("nakCode".into(), json!(code.name()));
        }
        if let Some(text) = &ack.text {
            obj.insert("text".into(), json!(text));
        }
    }

    match msg.payload() {
        Data::FieldList(fields) => {
            let mut out = Map::new();
            for entry in &fields.entries {
                let name = dict
                    .and_then(|d| d.entry(entry.field_id))
                    .map(|def| def.acronym.clone())
                    .unwrap_or_else(|| entry.field_id.to_string());
                let value = primitive_text(&entry.load, Some(entry.field_id), dict);
                out.insert(name, Value::String(value));
            }
            obj.insert("fields".into(), Value::Object(out));
        }
        Data::NoData => {}
        other => {
            obj.insert("payload".into(), json!(other.data_type().name()));
        }
    }

    Value::Object(obj)
}

fn msg_state(msg: &Msg) -> Option<&State> {
    match msg {
        Msg::Refresh(m) => Some(&m.state),
        Msg::Status(m) => m.state.as_ref(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use omm_core::{real_hint, AckMsg, FieldList, MsgKey, NakCode, Real, RefreshMsg};

    fn received() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    fn refresh() -> Msg {
        RefreshMsg {
            stream_id: 5,
            domain_type: domain::MARKET_PRICE,
            key: Some(MsgKey::named("TRI.N").with_service_id(1)),
            state: State::open_ok("All is well"),
            solicited: true,
            complete: true,
            payload: FieldList::new()
                .add(22, Real::new(3990, real_hint::EXPONENT_2))
                .add(3428, Data::Enum(2))
                .into(),
            ..Default::default()
        }
        .into()
    }

    #[test]
    fn json_names_fields_from_the_dictionary() {
        let dict = Arc::new(DataDictionary::embedded().unwrap());
        let printer = Printer::new(OutputFormat::Json, Some(dict));
        let line = printer.format_msg(&refresh(), received());

        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["class"], "RefreshMsg");
        assert_eq!(value["streamId"], 5);
        assert_eq!(value["domain"], "MarketPrice");
        assert_eq!(value["item"], "TRI.N");
        assert_eq!(value["fields"]["BID"], "39.90");
        assert_eq!(value["fields"]["ORDER_SIDE"], "2 (ASK)");
    }

    #[test]
    fn json_without_dictionary_uses_field_ids() {
        let printer = Printer::new(OutputFormat::Json, None);
        let value: Value = serde_json::from_str(&printer.format_msg(&refresh(), received())).unwrap();
        assert_eq!(value["fields"]["22"], "39.90");
        assert_eq!(value["fields"]["3428"], "2");
    }

    #[test]
    fn json_carries_nak_details() {
        let nak: Msg = AckMsg {
            stream_id: 1,
            domain_type: domain::MARKET_PRICE,
            ack_id: 9,
            nak_code: Some(NakCode::SYMBOL_UNKNOWN),
            text: Some("No item to post to".to_string()),
            ..Default::default()
        }
        .into();
        let printer = Printer::new(OutputFormat::Json, None);
        let value: Value = serde_json::from_str(&printer.format_msg(&nak, received())).unwrap();
        assert_eq!(value["ackId"], 9);
        assert_eq!(value["text"], "No item to post to");
        assert!(value["nakCode"].is_string());
    }

    #[test]
    fn text_starts_with_the_timestamp() {
        let printer = Printer::new(OutputFormat::Text, None);
        let text = printer.format_msg(&refresh(), received());
        assert!(text.starts_with("[09:30:00.000]\n<refreshMsg"));
    }
}
