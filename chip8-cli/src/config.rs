//! Application configuration, loaded from YAML.
use std::time::Duration;

use chip8::{prelude::*, Hz};
use serde::Deserialize;

use crate::{error::AppError, inputmap::InputDef};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Instructions executed per second.
    pub clock_frequency: Option<u64>,
    /// How long a key counts as held after the terminal last reported it.
    pub key_hold_ms: u64,
    /// Fixed seed for the `RND` instruction.
    pub seed: Option<u64>,
    /// Key mapping. The conventional QWERTY layout is used when absent.
    pub keys: Option<Vec<InputDef>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            clock_frequency: None,
            key_hold_ms: 150,
            seed: None,
            keys: None,
        }
    }
}

impl AppConfig {
    pub fn from_file(filepath: &str) -> Result<Self, AppError> {
        let file = std::fs::File::open(filepath)?;
        let config: AppConfig = serde_yaml::from_reader(file)?;
        log::debug!("loaded config from {filepath}: {config:?}");
        Ok(config)
    }

    pub fn key_hold(&self) -> Duration {
        Duration::from_millis(self.key_hold_ms)
    }

    /// Virtual machine configuration, with the display sized after the screen.
    pub fn chip8_conf(&self, screen: &impl Screen) -> Chip8Conf {
        Chip8Conf {
            clock_frequency: self.clock_frequency.map(Hz),
            seed: self.seed,
            ..Default::default()
        }
        .with_screen(screen)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config: AppConfig = serde_yaml::from_str("clock_frequency: 700\n").unwrap();
        assert_eq!(config.clock_frequency, Some(700));
        assert_eq!(config.key_hold(), Duration::from_millis(150));
        assert!(config.keys.is_none());
    }

    #[test]
    fn test_bundled_config() {
        let config: AppConfig = serde_yaml::from_str(include_str!("../config.yaml")).unwrap();
        let keys = config.keys.unwrap();
        assert_eq!(keys.iter().filter(|def| def.chip8.is_some()).count(), 16);
        assert!(keys.iter().any(|def| def.action.as_deref() == Some("exit")));
    }
}
