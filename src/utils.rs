use chrono::{DateTime, Utc};
use serde::Serialize;

/// Cut `text` to at most `max_chars` characters for log output.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

/// Error response helper
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_for_log("a longer piece of text", 8), "a longer…");
        assert_eq!(truncate_for_log("°C°C°C", 2), "°C…");
    }

    #[test]
    fn test_error_response_fields() {
        let body = ErrorResponse::new("location must not be empty", "EMPTY_LOCATION");
        assert_eq!(body.code, "EMPTY_LOCATION");
        assert_eq!(body.error, "location must not be empty");
    }
}
