//! Output file naming and the successful DOCX response

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use docx_engine::{DOCX_EXTENSION, DOCX_MIME_TYPE};
use serde_json::Value;

use crate::error::ServerError;

/// File stem used when neither the request nor the data names the output
pub const DEFAULT_FILE_STEM: &str = "Filled";

/// Characters that are not allowed in the download name
const FORBIDDEN: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Pick the download name: `outputName`, then `data.FileName`, then the
/// default. Candidates that are empty after sanitizing fall through.
pub fn resolve_file_name(output_name: Option<&str>, data: &Value) -> String {
    let from_data = data.get("FileName").and_then(|value| match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    let stem = output_name
        .map(str::to_string)
        .into_iter()
        .chain(from_data)
        .map(|candidate| sanitize_file_name(&candidate))
        .find(|candidate| !candidate.is_empty())
        .unwrap_or_else(|| DEFAULT_FILE_STEM.to_string());

    with_extension(stem)
}

/// Strip path separators, quotes, wildcard and control characters
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !FORBIDDEN.contains(c) && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

fn with_extension(stem: String) -> String {
    let suffix = format!(".{}", DOCX_EXTENSION);
    if stem.len() > suffix.len() && stem.to_ascii_lowercase().ends_with(&suffix) {
        stem
    } else {
        stem + &suffix
    }
}

/// `Content-Disposition` value for an attachment
///
/// Non-ASCII names get an ASCII fallback plus an RFC 5987 `filename*`.
pub fn content_disposition(file_name: &str) -> String {
    if file_name.is_ascii() {
        return format!("attachment; filename=\"{}\"", file_name);
    }

    let fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}

/// Binary DOCX response with an attachment disposition
pub fn document_response(document: Vec<u8>, file_name: &str) -> Result<Response, ServerError> {
    let disposition = HeaderValue::from_str(&content_disposition(file_name))
        .map_err(|e| ServerError::Internal(format!("Invalid Content-Disposition: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(DOCX_MIME_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document,
    )
        .into_response())
}
