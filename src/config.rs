use crate::error::{KpiError, Result};
use crate::filter::default_retention_cutoff;
use chrono::{DateTime, Utc};

pub const URL_VARS: [&str; 2] = ["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"];
pub const ANON_KEY_VARS: [&str; 2] = ["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"];
pub const RETENTION_CUTOFF_VAR: &str = "KPI_RETENTION_CUTOFF";

/// Connection settings for the hosted backend.
///
/// Missing credentials are not an error: the backend client degrades to empty
/// row sets and [`BackendConfig::config_error`] explains what is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub retention_cutoff: DateTime<Utc>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            retention_cutoff: default_retention_cutoff(),
        }
    }
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            anon_key: Some(anon_key.into()),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable lookup, first non-empty name wins.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(*name))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        let retention_cutoff = match first(&[RETENTION_CUTOFF_VAR][..]) {
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    KpiError::Config(format!(
                        "{} must be an RFC 3339 instant, got '{}': {}",
                        RETENTION_CUTOFF_VAR, raw, e
                    ))
                })?,
            None => default_retention_cutoff(),
        };

        Ok(Self {
            url: first(&URL_VARS[..]),
            anon_key: first(&ANON_KEY_VARS[..]),
            retention_cutoff,
        })
    }

    pub fn with_retention_cutoff(mut self, cutoff: DateTime<Utc>) -> Self {
        self.retention_cutoff = cutoff;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.config_error().is_none()
    }

    /// Diagnostic to show when credentials are missing.
    pub fn config_error(&self) -> Option<String> {
        let has_url = self.url.as_deref().is_some_and(|v| !v.trim().is_empty());
        let has_key = self
            .anon_key
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty());

        match (has_url, has_key) {
            (true, true) => None,
            (false, false) => Some(
                "Backend: URL and ANON KEY are not configured. Check the environment variables."
                    .to_string(),
            ),
            (false, true) => Some(format!(
                "Backend: URL is not configured. Set {}.",
                URL_VARS[0]
            )),
            (true, false) => Some(format!(
                "Backend: ANON KEY is not configured. Set {}.",
                ANON_KEY_VARS[0]
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_missing_configuration_is_not_fatal() {
        let config = BackendConfig::from_lookup(lookup(&[])).unwrap();
        assert!(!config.is_configured());
        assert!(config.config_error().unwrap().contains("URL and ANON KEY"));
        assert_eq!(config.retention_cutoff, default_retention_cutoff());
    }

    #[test]
    fn test_partial_configuration_messages() {
        let config = BackendConfig::from_lookup(lookup(&[("SUPABASE_URL", "https://x.supabase.co")]))
            .unwrap();
        assert!(config.config_error().unwrap().contains("ANON KEY"));

        let config =
            BackendConfig::from_lookup(lookup(&[("NEXT_PUBLIC_SUPABASE_ANON_KEY", "anon")])).unwrap();
        assert_eq!(config.anon_key.as_deref(), Some("anon"));
        assert!(config.config_error().unwrap().contains("URL is not configured"));
    }

    #[test]
    fn test_prefixed_names_are_fallbacks() {
        let config = BackendConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", "  "),
            ("NEXT_PUBLIC_SUPABASE_URL", "https://fallback.supabase.co"),
            ("SUPABASE_ANON_KEY", "primary"),
            ("NEXT_PUBLIC_SUPABASE_ANON_KEY", "secondary"),
        ]))
        .unwrap();
        assert_eq!(config.url.as_deref(), Some("https://fallback.supabase.co"));
        assert_eq!(config.anon_key.as_deref(), Some("primary"));
        assert!(config.is_configured());
    }

    #[test]
    fn test_retention_cutoff_override() {
        let config = BackendConfig::from_lookup(lookup(&[(
            RETENTION_CUTOFF_VAR,
            "2025-11-01T00:00:00-03:00",
        )]))
        .unwrap();
        assert_eq!(
            config.retention_cutoff,
            Utc.with_ymd_and_hms(2025, 11, 1, 3, 0, 0).unwrap()
        );

        let err = BackendConfig::from_lookup(lookup(&[(RETENTION_CUTOFF_VAR, "ontem")]));
        assert!(matches!(err, Err(KpiError::Config(_))));
    }
}
