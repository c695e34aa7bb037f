use kianda_http::HttpError;

/// Render an [`HttpError`] as `"<context>: <message>"`, safe for logs and
/// error values.
///
/// Nothing the server sent is echoed: response bodies are dropped and JSON
/// errors keep only their position, since serde quotes the offending value
/// (possibly a token) in its message.
#[must_use]
pub fn format_http_error(e: &HttpError, context: &str) -> String {
    let detail = match e {
        HttpError::HttpStatus { status, .. } => format!("HTTP {status}"),
        HttpError::Json(err) => format!(
            "malformed JSON ({} error at line {}, column {})",
            json_category(err),
            err.line(),
            err.column()
        ),
        HttpError::Auth(_) => "request failed".to_owned(),
        other => other.to_string(),
    };
    format!("{context}: {detail}")
}

fn json_category(err: &serde_json::Error) -> &'static str {
    match err.classify() {
        serde_json::error::Category::Io => "I/O",
        serde_json::error::Category::Syntax => "syntax",
        serde_json::error::Category::Data => "data",
        serde_json::error::Category::Eof => "truncated input",
    }
}
