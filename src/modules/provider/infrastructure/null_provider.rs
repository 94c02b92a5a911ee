use crate::log_debug;
use crate::modules::jobs::domain::TextFormat;
use crate::modules::provider::traits::{ProviderError, TranslationProvider};
use async_trait::async_trait;

/// Never calls an external API.
///
/// Echoes the input; in prefix mode non-empty strings become `[<target>] text`
/// so smoke-test output is easy to spot.
#[derive(Debug, Clone, Default)]
pub struct NullTranslationProvider {
    prefix_mode: bool,
}

impl NullTranslationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix() -> Self {
        Self { prefix_mode: true }
    }

    pub fn prefix_mode(&self) -> bool {
        self.prefix_mode
    }
}

#[async_trait]
impl TranslationProvider for NullTranslationProvider {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn translate(
        &self,
        texts: &[String],
        target_language: &str,
        _source_language: &str,
        _format: TextFormat,
    ) -> Result<Vec<String>, ProviderError> {
        log_debug!(
            "provider.null texts={} target={} prefix={}",
            texts.len(),
            target_language,
            self.prefix_mode
        );

        Ok(texts
            .iter()
            .map(|text| {
                if self.prefix_mode && !text.is_empty() {
                    format!("[{}] {}", target_language, text)
                } else {
                    text.clone()
                }
            })
            .collect())
    }
}
