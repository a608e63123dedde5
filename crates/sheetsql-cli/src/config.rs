use serde::Deserialize;
use sheetsql_session::SessionConfig;
use std::path::Path;
use tracing::Level;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.log_level()?;
        self.session.validate()?;
        Ok(())
    }

    pub fn log_level(&self) -> anyhow::Result<Level> {
        self.logging
            .level
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown log level {}", self.logging.level))
    }
}
