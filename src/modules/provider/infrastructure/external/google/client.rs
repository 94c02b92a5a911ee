use crate::modules::jobs::domain::TextFormat;
use crate::modules::provider::infrastructure::http_client::{RateLimitClient, RetryPolicy};
use crate::modules::provider::traits::{ProviderError, TranslationProvider};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::LogContext;
use async_trait::async_trait;
use std::collections::HashMap;

use super::dto::{GoogleErrorResponse, GoogleTranslateRequest, GoogleTranslateResponse};

/// Strings per v2 request
pub const MAX_STRINGS_PER_REQUEST: usize = 100;
/// Characters per v2 request, well under the documented ~5k recommendation
pub const MAX_CHARS_PER_REQUEST: usize = 4500;

/// Google Cloud Translation v2 (REST, API key auth)
pub struct GoogleTranslateProvider {
    http: RateLimitClient,
    endpoint: String,
    api_key: String,
}

impl GoogleTranslateProvider {
    pub fn new(api_key: &str, endpoint: &str) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError(
                "GOOGLE_TRANSLATE_API_KEY is required for the google provider".to_string(),
            ));
        }

        Ok(Self {
            http: RateLimitClient::for_google(GoogleErrorResponse::parse_message)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.http = self.http.with_retry_policy(retry_policy);
        self
    }

    fn request_url(&self) -> String {
        format!(
            "{}?key={}",
            self.endpoint,
            urlencoding::encode(&self.api_key)
        )
    }

    async fn translate_chunk(
        &self,
        chunk: &[&str],
        target_language: &str,
        source_language: &str,
        format: TextFormat,
    ) -> Result<Vec<String>, ProviderError> {
        let request = GoogleTranslateRequest {
            q: chunk.to_vec(),
            source: source_language,
            target: target_language,
            format: format.as_str(),
            model: "nmt",
        };

        let response: GoogleTranslateResponse =
            self.http.post_json(&self.request_url(), &request).await?;

        if response.data.translations.len() != chunk.len() {
            return Err(ProviderError::MalformedResponse(format!(
                "expected {} translations, got {}",
                chunk.len(),
                response.data.translations.len()
            )));
        }

        Ok(response
            .data
            .translations
            .into_iter()
            .map(|t| t.translated_text)
            .collect())
    }
}

/// Unique strings in first-seen order, plus the unique index of every input.
pub(crate) fn dedupe(texts: &[String]) -> (Vec<&str>, Vec<usize>) {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut unique = Vec::new();
    let mut index_map = Vec::with_capacity(texts.len());

    for text in texts {
        let index = *positions.entry(text.as_str()).or_insert_with(|| {
            unique.push(text.as_str());
            unique.len() - 1
        });
        index_map.push(index);
    }
    (unique, index_map)
}

/// Split into request-sized chunks by string count and character count.
/// A single oversized string still gets a chunk of its own.
pub(crate) fn chunk_texts<'a>(texts: &[&'a str]) -> Vec<Vec<&'a str>> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut chars = 0;

    for &text in texts {
        let len = text.chars().count();
        if !current.is_empty()
            && (current.len() >= MAX_STRINGS_PER_REQUEST || chars + len > MAX_CHARS_PER_REQUEST)
        {
            chunks.push(std::mem::take(&mut current));
            chars = 0;
        }
        current.push(text);
        chars += len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl TranslationProvider for GoogleTranslateProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn translate(
        &self,
        texts: &[String],
        target_language: &str,
        source_language: &str,
        format: TextFormat,
    ) -> Result<Vec<String>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let (unique, index_map) = dedupe(texts);
        let chunks = chunk_texts(&unique);
        let group = format!("{}>{}", source_language, target_language);

        let mut translated: Vec<String> = Vec::with_capacity(unique.len());
        for chunk in &chunks {
            let start = std::time::Instant::now();
            LogContext::provider_call(self.name(), &group, chunk.len(), None);

            let mut result = self
                .translate_chunk(chunk, target_language, source_language, format)
                .await?;
            translated.append(&mut result);

            LogContext::provider_call(
                self.name(),
                &group,
                chunk.len(),
                Some(start.elapsed().as_millis() as u64),
            );
        }

        // Chunks cover `unique` in order, so positions line up.
        Ok(index_map
            .into_iter()
            .map(|i| translated[i].clone())
            .collect())
    }
}
