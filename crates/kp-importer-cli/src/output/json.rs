use std::io;

use kp_importer_client::{ClientError, SuccessEnvelope};
use serde::Serialize;
use serde_json::Value;

/// The one object every invocation prints.
#[derive(Debug, Serialize)]
struct ResultPayload<'a> {
    success: bool,
    message: &'a str,
    message_detail: String,
}

pub fn render_success_json(success: &SuccessEnvelope) -> io::Result<String> {
    let message = success.data_str("message").unwrap_or("");
    let message_detail = match success.data_str("message_detail") {
        Some(detail) => detail.to_string(),
        None => init_detail(&success.data),
    };
    serialize_json(&ResultPayload {
        success: true,
        message,
        message_detail,
    })
}

pub fn render_error_json(error: &ClientError) -> io::Result<String> {
    let mut message_detail = error.code.clone();
    if !error.recovery_steps.is_empty() {
        message_detail.push_str(": ");
        message_detail.push_str(&error.recovery_steps.join(" "));
    }
    serialize_json(&ResultPayload {
        success: false,
        message: &error.message,
        message_detail,
    })
}

fn init_detail(data: &Value) -> String {
    let db_path = data.get("db_path").and_then(Value::as_str).unwrap_or("");
    match data.get("schema_version").and_then(Value::as_i64) {
        Some(version) => format!("db_path={db_path} schema_version={version}"),
        None => String::new(),
    }
}

fn serialize_json<T>(value: &T) -> io::Result<String>
where
    T: Serialize,
{
    serde_json::to_string(value).map_err(io::Error::other)
}
