use crate::modules::provider::infrastructure::{GoogleTranslateProvider, NullTranslationProvider};
use crate::modules::provider::traits::TranslationProvider;
use crate::shared::config::AppConfig;
use crate::shared::errors::AppResult;
use crate::{log_info, log_warn};
use std::sync::Arc;

/// The closed set of translation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    /// Echo translator; `prefix` marks output with the target language.
    Null { prefix: bool },
}

impl ProviderKind {
    pub fn key(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Null { .. } => "null",
        }
    }
}

/// Pick the backend once at startup.
///
/// - auto-MT disabled: null
/// - `local`/`dev`: google only when explicitly requested, otherwise null
/// - anywhere else: the configured provider, defaulting to google
///
/// Unknown provider keys fall back to null.
pub fn select_provider_kind(config: &AppConfig) -> ProviderKind {
    if !config.provider.auto_mt_enabled {
        return ProviderKind::Null { prefix: false };
    }

    let requested = match (config.is_local(), config.provider.provider.as_deref()) {
        (true, Some("google")) => "google",
        (true, _) => "null",
        (false, Some(key)) => key,
        (false, None) => "google",
    };

    match requested {
        "google" => ProviderKind::Google,
        "null" => ProviderKind::Null { prefix: false },
        other => {
            log_warn!("provider.select.unknown key={} fallback=null", other);
            ProviderKind::Null { prefix: false }
        }
    }
}

/// Build the selected provider. `--fake` runs always get the prefixing null provider.
pub fn build_provider(config: &AppConfig, fake: bool) -> AppResult<Arc<dyn TranslationProvider>> {
    let kind = if fake {
        ProviderKind::Null { prefix: true }
    } else {
        select_provider_kind(config)
    };

    log_info!(
        "provider.select env={} provider={} fake={}",
        config.environment,
        kind.key(),
        fake
    );

    Ok(match kind {
        ProviderKind::Google => {
            let api_key = config.provider.google_api_key.as_deref().unwrap_or_default();
            Arc::new(GoogleTranslateProvider::new(
                api_key,
                &config.provider.google_endpoint,
            )?)
        }
        ProviderKind::Null { prefix: true } => Arc::new(NullTranslationProvider::with_prefix()),
        ProviderKind::Null { prefix: false } => Arc::new(NullTranslationProvider::new()),
    })
}
