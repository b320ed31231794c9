//! Forward request validation
//!
//! Checks run in a fixed order and the first violation is reported, so a
//! client always sees the same message for the same body.

use std::path::{Path, PathBuf};

use relay_protocol::{ForwardRequest, SendKind};
use serde_json::Value;

pub const INVALID_JSON: &str = "Invalid JSON";
pub const MISSING_GROUP_ID: &str = "groupId not provided";
pub const INVALID_GROUP_ID: &str = "groupId must be a string";
pub const MISSING_MESSAGE: &str = "message not provided";
pub const INVALID_KIND: &str = "Invalid tipo (must be 1 for checkpoint or 2 for alert)";
pub const MISSING_IMAGE_PATH: &str = "imagePath not provided for checkpoint";

fn non_empty_str<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn group_id(body: &Value) -> Result<&str, &'static str> {
    match body.get("groupId") {
        None | Some(Value::Null) => Err(MISSING_GROUP_ID),
        Some(Value::String(s)) if s.is_empty() => Err(MISSING_GROUP_ID),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(INVALID_GROUP_ID),
    }
}

/// `tipo` is numeric; `1.0` is as good as `1`
fn kind(body: &Value) -> Option<SendKind> {
    let tipo = body.get("tipo").and_then(Value::as_f64)?;
    if tipo.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&tipo) {
        return None;
    }
    SendKind::try_from(tipo as u8).ok()
}

/// Parse and validate a POST body
///
/// `imagePath` is ignored for alerts and must name an existing file for
/// checkpoints.
pub fn validate(body: &[u8]) -> Result<ForwardRequest, String> {
    let body: Value = serde_json::from_slice(body).map_err(|_| INVALID_JSON.to_string())?;

    let group_id = group_id(&body)?;
    let message = non_empty_str(&body, "message").ok_or(MISSING_MESSAGE)?;
    let kind = kind(&body).ok_or(INVALID_KIND)?;

    match kind {
        SendKind::Alert => Ok(ForwardRequest::alert(group_id, message)),
        SendKind::Checkpoint => {
            let image_path = non_empty_str(&body, "imagePath").ok_or(MISSING_IMAGE_PATH)?;
            if !Path::new(image_path).exists() {
                return Err(format!("Image not found: {}", image_path));
            }
            Ok(ForwardRequest::checkpoint(
                group_id,
                message,
                PathBuf::from(image_path),
            ))
        }
    }
}
