use std::fs;
use std::path::Path;

use anyhow::Context;
use kru::ConnectionParameters;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub username: String,
    pub tick_rate: u32,
    pub connection: ConnectionParameters,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: "player".to_string(),
            tick_rate: 30,
            connection: ConnectionParameters::default(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = ClientConfig::parse(
            r#"
            username = "kitten"

            [connection]
            host = "play.example.net"
            "#,
        )
        .unwrap();

        assert_eq!(config.username, "kitten");
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.connection.host, "play.example.net");
        assert_eq!(config.connection.port, kru::DEFAULT_PORT);
    }

    #[test]
    fn test_rejects_bad_types() {
        assert!(ClientConfig::parse("tick_rate = \"fast\"").is_err());
    }
}
