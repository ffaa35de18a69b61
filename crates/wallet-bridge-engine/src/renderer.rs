//! Human-readable rendering of queued requests
//!
//! Rendering never fails: missing or malformed params render as empty or raw
//! values so the user still sees what the dApp sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};
use wallet_bridge_core::types::{decode_hex, is_hex_string, parse_quantity};

use crate::request::JsonRpcRequest;

/// One labelled line of a rendered request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderField {
    pub label: String,
    pub value: String,
}

impl RenderField {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Ordered fields describing `request`
pub fn render_request(request: &JsonRpcRequest) -> Vec<RenderField> {
    let mut fields = vec![RenderField::new("Method", request.method.as_str())];
    let first = request.param(0);

    match request.method.as_str() {
        "eth_sendTransaction" | "eth_signTransaction" => {
            let field = |name: &str| first.and_then(|tx| tx.get(name));
            let present = |name: &str| {
                field(name).filter(|v| match v {
                    Value::Null => false,
                    Value::String(s) => !s.is_empty(),
                    _ => true,
                })
            };
            let gas = present("gas").or_else(|| present("gasLimit"));
            fields.extend([
                RenderField::new("From", text(field("from"))),
                RenderField::new("To", text(field("to"))),
                RenderField::new("Gas Limit", quantity(gas)),
                RenderField::new("Gas Price", quantity(field("gasPrice"))),
                RenderField::new("Nonce", quantity(field("nonce"))),
                RenderField::new("Value", quantity(field("value"))),
                RenderField::new("Data", text(field("data"))),
            ]);
        }
        "eth_sign" => {
            fields.push(RenderField::new("Address", text(first)));
            fields.push(RenderField::new("Message", text(request.param(1))));
        }
        "personal_sign" => {
            fields.push(RenderField::new("Address", text(request.param(1))));
            fields.push(RenderField::new("Message", utf8_if_possible(first)));
        }
        "cfx_sendTransaction" => {
            let mut tx = first.cloned().unwrap_or(Value::Null);
            if let Some(obj) = tx.as_object_mut()
                && let Some(value) = obj.get("value")
            {
                let decimal = quantity_value(value);
                obj.insert("value".into(), decimal);
            }
            fields.push(RenderField::new("params", pretty_json(&tx)));
        }
        _ => {
            fields.push(RenderField::new("params", pretty_json(&Value::Array(request.params.clone()))));
        }
    }

    fields
}

/// JSON with a 4-space indent
pub fn pretty_json(value: &Value) -> String {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    if value.serialize(&mut serializer).is_err() {
        return value.to_string();
    }
    String::from_utf8(out).unwrap_or_else(|_| value.to_string())
}

/// Hex-decode to UTF-8 text when the value is valid hex of valid UTF-8
pub fn hex_to_utf8_if_possible(value: &str) -> String {
    if is_hex_string(value)
        && let Ok(bytes) = decode_hex(value)
        && let Ok(text) = String::from_utf8(bytes)
    {
        return text;
    }
    value.to_string()
}

fn utf8_if_possible(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => hex_to_utf8_if_possible(s),
        other => text(other),
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Quantity shown in decimal; unparseable input is shown as sent
fn quantity(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => parse_quantity(s)
            .map(|q| q.to_string())
            .unwrap_or_else(|_| s.clone()),
        Some(other) => text(Some(other)),
    }
}

/// Quantity as a JSON number when it fits, else a decimal string
fn quantity_value(value: &Value) -> Value {
    let Value::String(s) = value else {
        return value.clone();
    };
    match parse_quantity(s) {
        Ok(q) => match u64::try_from(q) {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(q.to_string()),
        },
        Err(_) => value.clone(),
    }
}
