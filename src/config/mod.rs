// src/config/mod.rs
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::reasoning::gemini::DEFAULT_BASE_URL;

const ENV_CONFIG_PATH: &str = "ETL_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/etl.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// "ENV" (or empty) means: read from GEMINI_API_KEY / API_KEY
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: "ENV".to_string(),
            model: "gemini-2.5-flash".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub reasoning_secs: u64,
    pub feed_secs: u64,
    pub webhook_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            reasoning_secs: 60,
            feed_secs: 15,
            webhook_secs: 10,
        }
    }
}

impl Timeouts {
    pub fn reasoning(&self) -> Duration {
        Duration::from_secs(self.reasoning_secs)
    }
    pub fn feed(&self) -> Duration {
        Duration::from_secs(self.feed_secs)
    }
    pub fn webhook(&self) -> Duration {
        Duration::from_secs(self.webhook_secs)
    }
}

/// Optional replacements for the built-in system instruction / user prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptOverrides {
    pub system_instruction: Option<String>,
    pub user_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gemini: GeminiConfig,
    /// Messaging webhook; `None` turns publishing into a logged no-op.
    pub webhook_url: Option<String>,
    /// JSON state document (sources + schedule).
    pub db_path: PathBuf,
    pub timeouts: Timeouts,
    pub prompts: PromptOverrides,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            webhook_url: None,
            db_path: PathBuf::from("db.json"),
            timeouts: Timeouts::default(),
            prompts: PromptOverrides::default(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML file, then apply environment overrides.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig =
            toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
        Ok(cfg.with_env_overrides())
    }

    /// Resolution order:
    /// 1) $ETL_CONFIG_PATH (must exist)
    /// 2) config/etl.toml
    /// 3) built-in defaults
    ///
    /// Environment overrides are applied in every case.
    pub fn load() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from_file(&default_path);
        }
        Ok(Self::default().with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        let key = self.gemini.api_key.trim();
        if key.is_empty() || key.eq_ignore_ascii_case("env") {
            self.gemini.api_key = env::var("GEMINI_API_KEY")
                .or_else(|_| env::var("API_KEY"))
                .unwrap_or_default();
        }
        if let Ok(model) = env::var("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                self.gemini.model = model.trim().to_string();
            }
        }
        if let Ok(url) = env::var("SLACK_WEBHOOK_URL").or_else(|_| env::var("WEBHOOK_URL")) {
            self.webhook_url = Some(url);
        }
        if let Ok(p) = env::var("ETL_DB_PATH") {
            self.db_path = PathBuf::from(p);
        }

        self.webhook_url = self
            .webhook_url
            .take()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        // Zero would mean "time out immediately"
        let defaults = Timeouts::default();
        if self.timeouts.reasoning_secs == 0 {
            self.timeouts.reasoning_secs = defaults.reasoning_secs;
        }
        if self.timeouts.feed_secs == 0 {
            self.timeouts.feed_secs = defaults.feed_secs;
        }
        if self.timeouts.webhook_secs == 0 {
            self.timeouts.webhook_secs = defaults.webhook_secs;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_KEYS: [&str; 7] = [
        ENV_CONFIG_PATH,
        "GEMINI_API_KEY",
        "API_KEY",
        "GEMINI_MODEL",
        "SLACK_WEBHOOK_URL",
        "WEBHOOK_URL",
        "ETL_DB_PATH",
    ];

    fn clear_env() {
        for k in ENV_KEYS {
            env::remove_var(k);
        }
    }

    #[serial_test::serial]
    #[test]
    fn file_values_and_env_key_resolution() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("etl.toml");
        fs::write(
            &p,
            r#"
webhook_url = "  "
db_path = "state/db.json"

[gemini]
api_key = "ENV"
model = "gemini-test"

[timeouts]
reasoning_secs = 0
feed_secs = 3
"#,
        )
        .unwrap();
        env::set_var("GEMINI_API_KEY", "k-123");

        let cfg = AppConfig::load_from_file(&p).unwrap();
        assert_eq!(cfg.gemini.api_key, "k-123");
        assert_eq!(cfg.gemini.model, "gemini-test");
        assert_eq!(cfg.webhook_url, None, "blank webhook is treated as unset");
        assert_eq!(cfg.db_path, PathBuf::from("state/db.json"));
        assert_eq!(cfg.timeouts.reasoning_secs, 60);
        assert_eq!(cfg.timeouts.feed_secs, 3);
        assert_eq!(cfg.timeouts.webhook_secs, 10);
        clear_env();
    }

    #[serial_test::serial]
    #[test]
    fn env_path_must_exist_and_env_overrides_apply() {
        clear_env();
        env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
        assert!(AppConfig::load().is_err());

        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("etl.toml");
        fs::write(&p, "webhook_url = \"https://from-file\"\n").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var("SLACK_WEBHOOK_URL", "https://hooks.example/abc");
        env::set_var("ETL_DB_PATH", "/tmp/x.json");

        let cfg = AppConfig::load().unwrap();
        assert_eq!(cfg.webhook_url.as_deref(), Some("https://hooks.example/abc"));
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/x.json"));
        assert!(cfg.gemini.api_key.is_empty());
        clear_env();
    }
}
