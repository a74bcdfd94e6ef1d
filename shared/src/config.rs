use crate::{Error, Result};
use tracing::warn;

/// Settings for connecting the cache layer to its backing store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub connection_string: String,
    pub scan_page_size: usize,
}

impl Config {
    pub const DEFAULT_CONNECTION_STRING: &str = "redis://127.0.0.1:6379";
    pub const DEFAULT_SCAN_PAGE_SIZE: usize = 250;

    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            scan_page_size: Self::DEFAULT_SCAN_PAGE_SIZE,
        }
    }

    pub fn with_scan_page_size(mut self, scan_page_size: usize) -> Self {
        self.scan_page_size = scan_page_size;
        self
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable source; `from_env` passes the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let connection_string = lookup("CACHE_CONNECTION_STRING").unwrap_or_else(|| {
            warn!(
                "CACHE_CONNECTION_STRING not set, using default '{}'",
                Self::DEFAULT_CONNECTION_STRING
            );
            Self::DEFAULT_CONNECTION_STRING.to_string()
        });

        let scan_page_size = match lookup("CACHE_SCAN_PAGE_SIZE") {
            Some(raw) => raw.trim().parse::<usize>().unwrap_or_else(|_| {
                warn!(
                    "CACHE_SCAN_PAGE_SIZE '{}' is not a number, using {}",
                    raw,
                    Self::DEFAULT_SCAN_PAGE_SIZE
                );
                Self::DEFAULT_SCAN_PAGE_SIZE
            }),
            None => Self::DEFAULT_SCAN_PAGE_SIZE,
        };

        Self {
            connection_string,
            scan_page_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(Error::Config("connection string must not be blank".to_string()));
        }
        if self.scan_page_size == 0 {
            return Err(Error::Config("scan page size must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CONNECTION_STRING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[]));
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reads_all_variables() {
        let config = Config::from_lookup(lookup_from(&[
            ("CACHE_CONNECTION_STRING", "redis://cache:6380"),
            ("CACHE_SCAN_PAGE_SIZE", "1000"),
        ]));

        assert_eq!(config.connection_string, "redis://cache:6380");
        assert_eq!(config.scan_page_size, 1000);
    }

    #[test]
    fn test_unparsable_page_size_falls_back() {
        let config = Config::from_lookup(lookup_from(&[("CACHE_SCAN_PAGE_SIZE", "lots")]));

        assert_eq!(config.scan_page_size, Config::DEFAULT_SCAN_PAGE_SIZE);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(matches!(
            Config::new("  ").validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::default().with_scan_page_size(0).validate(),
            Err(Error::Config(_))
        ));
    }
}
