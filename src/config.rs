use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bus::DEFAULT_ADDRESS;
use crate::poller::PollSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub i2c: I2cConfig,
    pub polling: PollSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct I2cConfig {
    /// i2c-dev character device of the bus the peripheral sits on.
    pub device: String,
    /// 7-bit peripheral address.
    pub address: u8,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            device: "/dev/i2c-1".to_string(),
            address: DEFAULT_ADDRESS,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("polling.interval_ms must be greater than zero")]
    ZeroInterval,

    #[error("polling.failure_threshold must be greater than zero")]
    ZeroFailureThreshold,

    #[error("i2c.address 0x{0:02x} is not a 7-bit address")]
    InvalidAddress(u8),

    #[error("i2c.device must not be empty")]
    EmptyDevice,
}

impl Config {
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.i2c.device.is_empty() {
            return Err(ConfigError::EmptyDevice);
        }
        if self.i2c.address > 0x7f {
            return Err(ConfigError::InvalidAddress(self.i2c.address));
        }
        if self.polling.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.polling.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.i2c.device, "/dev/i2c-1");
        assert_eq!(config.i2c.address, 0x52);
        assert_eq!(config.polling.interval_ms, 50);
        assert_eq!(config.polling.failure_threshold, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full() {
        let yaml = "
i2c:
  device: /dev/i2c-2
  address: 0x53
polling:
  interval_ms: 20
  failure_threshold: 5
";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.i2c.device, "/dev/i2c-2");
        assert_eq!(config.i2c.address, 0x53);
        assert_eq!(config.polling.interval_ms, 20);
        assert_eq!(config.polling.failure_threshold, 5);
    }

    #[test]
    fn test_partial_uses_defaults() {
        let config = Config::from_yaml("polling:\n  interval_ms: 100\n").unwrap();
        assert_eq!(config.i2c.address, 0x52);
        assert_eq!(config.polling.interval_ms, 100);
        assert_eq!(config.polling.failure_threshold, 3);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.polling.interval_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));

        let mut config = Config::default();
        config.polling.failure_threshold = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroFailureThreshold));

        let mut config = Config::default();
        config.i2c.address = 0xa4;
        assert_eq!(config.validate(), Err(ConfigError::InvalidAddress(0xa4)));
    }
}
