use std::time::Duration;

use crate::error::{ReportError, ReportResult};

pub const DEFAULT_VISION_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CAPTION_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub vision_api_url: String,
    pub vision_api_key: Option<String>,
    pub vision_model: String,
    pub caption_delay: Duration,
}

impl AppConfig {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> ReportResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ReportResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let caption_delay_ms = match non_empty("CAPTION_DELAY_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ReportError::Config(format!("CAPTION_DELAY_MS must be a whole number, got '{raw}'"))
            })?,
            None => DEFAULT_CAPTION_DELAY_MS,
        };

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            vision_api_url: non_empty("VISION_API_URL")
                .unwrap_or_else(|| DEFAULT_VISION_API_URL.to_string()),
            vision_api_key: non_empty("VISION_API_KEY"),
            vision_model: non_empty("VISION_MODEL")
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            caption_delay: Duration::from_millis(caption_delay_ms),
        })
    }

    pub fn database_url(&self) -> ReportResult<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            ReportError::Config("DATABASE_URL must be set to reach the report store".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ReportResult<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.vision_api_url, DEFAULT_VISION_API_URL);
        assert_eq!(config.vision_model, DEFAULT_VISION_MODEL);
        assert_eq!(config.caption_delay, Duration::from_millis(1000));
        assert!(config.vision_api_key.is_none());
        assert!(matches!(config.database_url(), Err(ReportError::Config(_))));
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/reports"),
            ("VISION_API_KEY", "sk-test"),
            ("CAPTION_DELAY_MS", "0"),
            ("VISION_MODEL", " "),
        ])
        .unwrap();
        assert_eq!(config.database_url().unwrap(), "postgres://localhost/reports");
        assert_eq!(config.vision_api_key.as_deref(), Some("sk-test"));
        assert!(config.caption_delay.is_zero());
        assert_eq!(config.vision_model, DEFAULT_VISION_MODEL);
    }

    #[test]
    fn rejects_bad_delay() {
        assert!(matches!(
            config(&[("CAPTION_DELAY_MS", "soon")]),
            Err(ReportError::Config(_))
        ));
    }
}
