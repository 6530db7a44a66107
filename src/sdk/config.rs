use crate::sdk::llm::GEMINI_BASE_URL;
use crate::sdk::narrative::DEFAULT_DEBOUNCE;
use crate::sdk::routing::provider::PUBLIC_OSRM_URL;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub osrm_base_url: String,
    pub state_file: PathBuf,
    pub leg_cache_file: PathBuf,
    pub narrative_debounce: Duration,
}

impl DispatchConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let narrative_debounce = match get("NARRATIVE_DEBOUNCE_MS") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse()
                    .with_context(|| format!("NARRATIVE_DEBOUNCE_MS is not a number: {}", raw))?,
            ),
            None => DEFAULT_DEBOUNCE,
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            osrm_base_url: get("OSRM_BASE_URL").unwrap_or_else(|| PUBLIC_OSRM_URL.to_string()),
            state_file: get("DISPATCH_STATE_FILE")
                .unwrap_or_else(|| "dispatch_state.json".to_string())
                .into(),
            leg_cache_file: get("LEG_CACHE_FILE")
                .unwrap_or_else(|| "leg_cache.json".to_string())
                .into(),
            narrative_debounce,
        })
    }

    pub fn require_gemini_key(&self) -> Result<&str> {
        self.gemini_api_key
            .as_deref()
            .context("GEMINI_API_KEY is not set (add it to the environment or .env)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<DispatchConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DispatchConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.osrm_base_url, PUBLIC_OSRM_URL);
        assert_eq!(cfg.gemini_model, DEFAULT_MODEL);
        assert_eq!(cfg.gemini_base_url, GEMINI_BASE_URL);
        assert_eq!(cfg.narrative_debounce, Duration::from_millis(1500));
        assert_eq!(cfg.state_file, PathBuf::from("dispatch_state.json"));
        assert!(cfg.require_gemini_key().is_err());
    }

    #[test]
    fn values_are_read_from_env() {
        let cfg = config(&[
            ("GEMINI_API_KEY", "secret"),
            ("OSRM_BASE_URL", "http://localhost:5000"),
            ("GEMINI_BASE_URL", "http://localhost:8080/v1beta"),
            ("NARRATIVE_DEBOUNCE_MS", " 250 "),
            ("LEG_CACHE_FILE", "/tmp/legs.json"),
        ])
        .unwrap();
        assert_eq!(cfg.require_gemini_key().unwrap(), "secret");
        assert_eq!(cfg.osrm_base_url, "http://localhost:5000");
        assert_eq!(cfg.gemini_base_url, "http://localhost:8080/v1beta");
        assert_eq!(cfg.narrative_debounce, Duration::from_millis(250));
        assert_eq!(cfg.leg_cache_file, PathBuf::from("/tmp/legs.json"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        assert!(config(&[("GEMINI_API_KEY", "  ")]).unwrap().gemini_api_key.is_none());
    }

    #[test]
    fn bad_debounce_is_an_error() {
        assert!(config(&[("NARRATIVE_DEBOUNCE_MS", "soon")]).is_err());
    }
}
