use serde::{Deserialize, Serialize};

/// Body of `POST /language/translate/v2`
#[derive(Debug, Clone, Serialize)]
pub struct GoogleTranslateRequest<'a> {
    pub q: Vec<&'a str>,
    pub source: &'a str,
    pub target: &'a str,
    pub format: &'a str,
    pub model: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTranslateResponse {
    pub data: GoogleTranslateData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTranslateData {
    #[serde(default)]
    pub translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleTranslation {
    #[serde(default)]
    pub translated_text: String,
    pub detected_source_language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorBody {
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    pub status: Option<String>,
}

impl GoogleErrorResponse {
    /// `message` plus the RPC status when present, e.g. `Daily Limit Exceeded (RESOURCE_EXHAUSTED)`
    pub fn parse_message(body: &str) -> Option<String> {
        let parsed: GoogleErrorResponse = serde_json::from_str(body).ok()?;
        let message = parsed.error.message.trim().to_string();
        match parsed.error.status {
            Some(status) if !message.is_empty() => Some(format!("{} ({})", message, status)),
            Some(status) => Some(status),
            None if !message.is_empty() => Some(message),
            None => None,
        }
    }
}
