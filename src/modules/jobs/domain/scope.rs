use super::entities::TranslationJob;
use crate::log_warn;
use crate::shared::config::ScopeArgs;

/// Restricts which jobs a run may claim. `None` means "no restriction on that dimension".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFilters {
    pub target_language: Option<String>,
    pub client_code: Option<String>,
    pub resource_type: Option<String>,
    pub subject: Option<String>,
    pub variant: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ScopeFilters {
    /// Build from `key => value` pairs.
    ///
    /// Accepts both the short CLI names (`lang`, `client`, `type`) and the column names.
    /// Empty values are dropped; unknown keys are logged and ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filters = Self::default();
        for (key, value) in pairs {
            let value = non_empty(Some(value.as_ref()));
            match key.as_ref() {
                "lang" | "language" | "target_language" => filters.target_language = value,
                "client" | "client_code" => filters.client_code = value,
                "type" | "resource_type" => filters.resource_type = value,
                "subject" => filters.subject = value,
                "variant" => filters.variant = value,
                other => log_warn!("tqp.scope.ignored key={}", other),
            }
        }
        filters
    }

    pub fn is_empty(&self) -> bool {
        self.target_language.is_none()
            && self.client_code.is_none()
            && self.resource_type.is_none()
            && self.subject.is_none()
            && self.variant.is_none()
    }

    pub fn matches(&self, job: &TranslationJob) -> bool {
        fn eq(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map_or(true, |f| f == value)
        }

        eq(&self.target_language, &job.target_language)
            && eq(&self.client_code, &job.scope.client_code)
            && eq(&self.resource_type, &job.scope.resource_type)
            && eq(&self.subject, &job.scope.subject)
            && eq(&self.variant, &job.scope.variant)
    }
}

impl From<&ScopeArgs> for ScopeFilters {
    fn from(args: &ScopeArgs) -> Self {
        Self {
            target_language: non_empty(args.target_language.as_deref()),
            client_code: non_empty(args.client_code.as_deref()),
            resource_type: non_empty(args.resource_type.as_deref()),
            subject: non_empty(args.subject.as_deref()),
            variant: non_empty(args.variant.as_deref()),
        }
    }
}

impl std::fmt::Display for ScopeFilters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("*");
        }
        let parts = [
            ("lang", &self.target_language),
            ("client", &self.client_code),
            ("type", &self.resource_type),
            ("subject", &self.subject),
            ("variant", &self.variant),
        ];
        let rendered: Vec<String> = parts
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| format!("{}={}", k, v)))
            .collect();
        f.write_str(&rendered.join(","))
    }
}
