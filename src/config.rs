//! Configuration loaded from environment variables.
//!
//! The service is configured entirely through the environment (plus an
//! optional `.env` file loaded at startup). Vision credentials and store
//! credentials are both optional: without the former the vision stage is
//! skipped, without the latter results are returned but not persisted.

use anyhow::Context;

/// Default maximum upload size in bytes (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Default HTTP bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8050;

/// Default Gemini model used for the vision extraction stage.
pub const DEFAULT_VISION_MODEL: &str = "gemini-1.5-flash";

/// Runtime settings for the service.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP bind address.
    pub host: String,
    /// HTTP port.
    pub port: u16,
    /// API key for the vision model. `None` disables the vision stage.
    pub vision_api_key: Option<String>,
    /// Vision model name.
    pub vision_model: String,
    /// Language code for the local OCR engine (e.g. "eng", "fra").
    pub ocr_lang: String,
    /// Supabase project URL. `None` disables persistence.
    pub supabase_url: Option<String>,
    /// Supabase service key.
    pub supabase_key: Option<String>,
    /// Maximum accepted upload size in bytes.
    pub max_file_size: usize,
    /// Allowed CORS origins: `*` or a comma-separated list.
    pub cors_origins: String,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup (testable seam).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = match lookup("API_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("invalid API_PORT: {raw}"))?,
            None => DEFAULT_PORT,
        };

        let max_file_size = match lookup("MAX_FILE_SIZE") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("invalid MAX_FILE_SIZE: {raw}"))?,
            None => DEFAULT_MAX_FILE_SIZE,
        };

        // GEMINI_API_KEY is canonical; OPENAI_API_KEY is accepted as a
        // legacy alias from earlier deployments.
        let vision_api_key = lookup("GEMINI_API_KEY")
            .or_else(|| lookup("OPENAI_API_KEY"))
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            host: lookup("API_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            vision_api_key,
            vision_model: lookup("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            ocr_lang: lookup("OCR_LANG").unwrap_or_else(|| "eng".to_string()),
            supabase_url: lookup("SUPABASE_URL").filter(|url| !url.trim().is_empty()),
            supabase_key: lookup("SUPABASE_KEY").filter(|key| !key.trim().is_empty()),
            max_file_size,
            cors_origins: lookup("CORS_ORIGINS").unwrap_or_else(|| "*".to_string()),
        })
    }

    /// Whether the vision stage can be attempted at all.
    pub fn vision_configured(&self) -> bool {
        self.vision_api_key.is_some()
    }

    /// Whether results will be persisted to the external store.
    pub fn store_configured(&self) -> bool {
        self.supabase_url.is_some() && self.supabase_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.host, DEFAULT_HOST);
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(settings.ocr_lang, "eng");
        assert_eq!(settings.cors_origins, "*");
        assert!(!settings.vision_configured());
        assert!(!settings.store_configured());
    }

    #[test]
    fn test_vision_key_aliases() {
        let settings = settings_from(&[("GEMINI_API_KEY", "abc")]).unwrap();
        assert!(settings.vision_configured());

        let settings = settings_from(&[("OPENAI_API_KEY", "xyz")]).unwrap();
        assert_eq!(settings.vision_api_key.as_deref(), Some("xyz"));

        // Blank keys do not count as configured
        let settings = settings_from(&[("GEMINI_API_KEY", "  ")]).unwrap();
        assert!(!settings.vision_configured());
    }

    #[test]
    fn test_store_requires_both_credentials() {
        let settings = settings_from(&[("SUPABASE_URL", "https://x.supabase.co")]).unwrap();
        assert!(!settings.store_configured());

        let settings = settings_from(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_KEY", "service-key"),
        ])
        .unwrap();
        assert!(settings.store_configured());
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(settings_from(&[("API_PORT", "not-a-port")]).is_err());
        assert!(settings_from(&[("MAX_FILE_SIZE", "-1")]).is_err());
    }
}
