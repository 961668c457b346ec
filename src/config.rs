use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_ORIGIN: &str = "https://api.cloudinary.com";
pub const DEFAULT_DELIVERY_ORIGIN: &str = "https://res.cloudinary.com";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings read from the environment.
///
/// Credentials stay optional here so the proxy can start without them and
/// report a configuration error per request instead of refusing to boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_origin: String,
    pub delivery_origin: String,
    /// `None` keeps requests unbounded.
    pub fetch_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let fetch_timeout = match non_empty("GALLERY_FETCH_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    name: "GALLERY_FETCH_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            cloud_name: non_empty("CLOUDINARY_CLOUD_NAME"),
            api_key: non_empty("CLOUDINARY_API_KEY"),
            api_secret: non_empty("CLOUDINARY_API_SECRET"),
            api_origin: non_empty("GALLERY_API_ORIGIN")
                .unwrap_or_else(|| DEFAULT_API_ORIGIN.to_string()),
            delivery_origin: non_empty("GALLERY_DELIVERY_ORIGIN")
                .unwrap_or_else(|| DEFAULT_DELIVERY_ORIGIN.to_string()),
            fetch_timeout,
        })
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        Ok(Credentials {
            cloud_name: self
                .cloud_name
                .clone()
                .ok_or(ConfigError::Missing("CLOUDINARY_CLOUD_NAME"))?,
            api_key: self
                .api_key
                .clone()
                .ok_or(ConfigError::Missing("CLOUDINARY_API_KEY"))?,
            api_secret: self
                .api_secret
                .clone()
                .ok_or(ConfigError::Missing("CLOUDINARY_API_SECRET"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.api_origin, DEFAULT_API_ORIGIN);
        assert_eq!(config.delivery_origin, DEFAULT_DELIVERY_ORIGIN);
        assert!(config.fetch_timeout.is_none());
        assert_eq!(
            config.credentials().unwrap_err(),
            ConfigError::Missing("CLOUDINARY_CLOUD_NAME")
        );
    }

    #[test]
    fn test_missing_secret_is_reported_by_name() {
        let config = config_from(&[
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "key"),
            ("CLOUDINARY_API_SECRET", "  "),
        ])
        .unwrap();
        assert_eq!(
            config.credentials().unwrap_err(),
            ConfigError::Missing("CLOUDINARY_API_SECRET")
        );
    }

    #[test]
    fn test_full_configuration() {
        let config = config_from(&[
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "key"),
            ("CLOUDINARY_API_SECRET", "secret"),
            ("GALLERY_FETCH_TIMEOUT_SECS", "30"),
            ("GALLERY_DELIVERY_ORIGIN", "http://localhost:9000"),
        ])
        .unwrap();
        let creds = config.credentials().unwrap();
        assert_eq!(creds.cloud_name, "demo");
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.delivery_origin, "http://localhost:9000");
    }

    #[test]
    fn test_invalid_timeout() {
        let err = config_from(&[("GALLERY_FETCH_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
