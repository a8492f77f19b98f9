//! Configuration loader and validator for the marketplace alert bot.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub app: App,
    pub telegram: Telegram,
    pub marketplace: Marketplace,
}

/// Scheduling and worker knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct App {
    /// How often the scheduler looks for due alerts, in seconds.
    pub tick_interval_secs: u64,
    /// Jitter window bounds for the next run of an alert, in seconds.
    pub jitter_min_secs: u64,
    pub jitter_max_secs: u64,
    /// Delay before a freshly registered alert runs for the first time.
    pub initial_delay_secs: u64,
    /// Alert lifetime from registration.
    pub expiry_days: i64,
    /// Upper bound on concurrently running scrape tasks.
    pub max_concurrent_scrapes: usize,
    /// Hard timeout around a single page render call.
    pub fetch_timeout_secs: u64,
    /// An alert stuck `ongoing` longer than this is reclaimed as due.
    pub max_runner_duration_secs: i64,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Telegram {
    pub bot_token: String,
}

/// Marketplace endpoints: the search site itself and the headless render
/// service used to load its JS-driven result pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Marketplace {
    pub base_url: String,
    pub render_url: String,
    pub render_token: Option<String>,
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.tick_interval_secs == 0 {
        return Err(ConfigError::Invalid("app.tick_interval_secs must be > 0"));
    }
    if cfg.app.jitter_min_secs == 0 {
        return Err(ConfigError::Invalid("app.jitter_min_secs must be > 0"));
    }
    if cfg.app.jitter_max_secs < cfg.app.jitter_min_secs {
        return Err(ConfigError::Invalid(
            "app.jitter_max_secs must be >= app.jitter_min_secs",
        ));
    }
    if cfg.app.expiry_days <= 0 {
        return Err(ConfigError::Invalid("app.expiry_days must be > 0"));
    }
    if cfg.app.max_concurrent_scrapes == 0 {
        return Err(ConfigError::Invalid(
            "app.max_concurrent_scrapes must be > 0",
        ));
    }
    if cfg.app.fetch_timeout_secs == 0 {
        return Err(ConfigError::Invalid("app.fetch_timeout_secs must be > 0"));
    }
    if cfg.app.max_runner_duration_secs <= 0 {
        return Err(ConfigError::Invalid(
            "app.max_runner_duration_secs must be > 0",
        ));
    }

    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token must be non-empty"));
    }

    if cfg.marketplace.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "marketplace.base_url must be non-empty",
        ));
    }
    if cfg.marketplace.render_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "marketplace.render_url must be non-empty",
        ));
    }

    Ok(())
}

/// Example YAML config, also used by tests.
pub fn example() -> &'static str {
    r#"app:
  tick_interval_secs: 90
  jitter_min_secs: 150
  jitter_max_secs: 600
  initial_delay_secs: 180
  expiry_days: 30
  max_concurrent_scrapes: 4
  fetch_timeout_secs: 90
  max_runner_duration_secs: 900

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"

marketplace:
  base_url: "https://www.carousell.sg"
  render_url: "http://localhost:3000"
  render_token: null
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.app.tick_interval_secs, 90);
        assert_eq!(cfg.app.jitter_min_secs, 150);
        assert_eq!(cfg.app.jitter_max_secs, 600);
    }

    #[test]
    fn invalid_bot_token() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.telegram.bot_token = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("telegram.bot_token")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_jitter_window() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.jitter_max_secs = cfg.app.jitter_min_secs - 1;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.jitter_min_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_marketplace_urls() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.marketplace.base_url = " ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("base_url")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.marketplace.render_url = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        let mut f = fs::File::create(&p).unwrap();
        f.write_all(example().as_bytes()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.marketplace.base_url, "https://www.carousell.sg");
    }
}
