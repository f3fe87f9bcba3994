use actix_web::web::Bytes;
use serde::Serialize;
use serde_json::json;

use crate::errors::AppError;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Serializes `value` as one newline-terminated JSON line
pub fn ndjson_line<T: Serialize>(value: &T) -> Result<Bytes, AppError> {
    let mut line = serde_json::to_vec(value)
        .map_err(|e| AppError::InternalError(format!("Failed to serialize event: {}", e)))?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// The terminal line sent when a stream fails after the response has started
pub fn error_line(err: &AppError) -> Bytes {
    let mut line = json!({ "type": "error", "message": err.to_string() }).to_string();
    line.push('\n');
    Bytes::from(line)
}
