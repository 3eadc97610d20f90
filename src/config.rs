//! Engine Configuration
//!
//! Every section has working defaults, may be loaded from a YAML file, and is
//! finally overridden by CLI flags / environment variables in `main.rs`.

use crate::api::ApiServerConfig;
use crate::cache::TtlPolicy;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Geocode Provider
// =============================================================================

/// Configuration for the geocode provider client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    /// Provider base URL
    pub base_url: String,
    /// Account name sent with every request
    pub username: String,
    /// Language of returned place names
    pub lang: String,
    /// Outbound request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum divisions requested per country
    pub division_max_rows: u32,
    /// Maximum cities requested per division
    pub city_max_rows: u32,
    /// Feature codes matched by city queries
    pub city_feature_codes: Vec<String>,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api.geonames.org".to_string(),
            username: String::new(),
            lang: "es".to_string(),
            timeout_secs: 10,
            division_max_rows: 500,
            city_max_rows: 1000,
            // Capitals are PPLC, not PPL
            city_feature_codes: vec!["PPL".to_string(), "PPLC".to_string()],
        }
    }
}

impl GeocodeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Per-class cache lifetimes in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub country_list_ttl_secs: u64,
    pub division_ttl_secs: u64,
    pub city_ttl_secs: u64,
    pub aggregate_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let policy = TtlPolicy::default();
        Self {
            country_list_ttl_secs: policy.country_list.as_secs(),
            division_ttl_secs: policy.divisions.as_secs(),
            city_ttl_secs: policy.cities.as_secs(),
            aggregate_ttl_secs: policy.aggregate.as_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy {
            country_list: Duration::from_secs(self.country_list_ttl_secs),
            divisions: Duration::from_secs(self.division_ttl_secs),
            cities: Duration::from_secs(self.city_ttl_secs),
            aggregate: Duration::from_secs(self.aggregate_ttl_secs),
        }
    }
}

// =============================================================================
// Typeahead
// =============================================================================

/// Result size limits for the typeahead queries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeaheadConfig {
    pub country_limit: usize,
    pub division_limit: Option<usize>,
    pub city_limit: Option<usize>,
}

impl Default for TypeaheadConfig {
    fn default() -> Self {
        Self {
            country_limit: 50,
            division_limit: None,
            city_limit: None,
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub geocode: GeocodeConfig,
    pub cache: CacheConfig,
    pub typeahead: TypeaheadConfig,
    pub api: ApiServerConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the engine misbehave
    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.geocode.base_url).map_err(|e| {
            Error::Configuration(format!("invalid geocode base_url {}: {}", self.geocode.base_url, e))
        })?;

        if self.geocode.timeout_secs == 0 {
            return Err(Error::Configuration("geocode timeout_secs must be positive".into()));
        }
        if self.geocode.lang.trim().is_empty() {
            return Err(Error::Configuration("geocode lang must not be empty".into()));
        }
        if self.geocode.city_feature_codes.is_empty() {
            return Err(Error::Configuration(
                "geocode city_feature_codes must list at least one code".into(),
            ));
        }
        if self.typeahead.country_limit == 0 {
            return Err(Error::Configuration("typeahead country_limit must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.geocode.timeout(), Duration::from_secs(10));
        assert_eq!(config.geocode.city_feature_codes, vec!["PPL", "PPLC"]);
        assert_eq!(config.typeahead.country_limit, 50);
        assert_eq!(config.typeahead.division_limit, None);
        assert_eq!(config.cache.ttl_policy(), TtlPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml_str(
            "geocode:\n  username: acme\n  lang: en\ncache:\n  city_ttl_secs: 60\n",
        )
        .unwrap();

        assert_eq!(config.geocode.username, "acme");
        assert_eq!(config.geocode.lang, "en");
        assert_eq!(config.geocode.division_max_rows, 500);
        assert_eq!(config.cache.ttl_policy().cities, Duration::from_secs(60));
        assert_eq!(config.cache.country_list_ttl_secs, 86_400);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "typeahead:\n  country_limit: 20\n  city_limit: 100").unwrap();

        let config = EngineConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.typeahead.country_limit, 20);
        assert_eq!(config.typeahead.city_limit, Some(100));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert_matches!(
            EngineConfig::from_yaml_str("geocode:\n  timeout_secs: 0\n"),
            Err(Error::Configuration(_))
        );
        assert_matches!(
            EngineConfig::from_yaml_str("geocode:\n  base_url: not a url\n"),
            Err(Error::Configuration(_))
        );
        assert_matches!(
            EngineConfig::from_yaml_str("typeahead: [1, 2]\n"),
            Err(Error::YamlParse(_))
        );
    }
}
