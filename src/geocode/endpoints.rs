//! Geocode Provider Endpoints
//!
//! Builds the three directory URLs. The provider cannot filter by name, so
//! every URL asks for the full child list of one parent.

use crate::config::GeocodeConfig;
use crate::domain::ports::ExternalId;

/// Feature code of first-level administrative divisions
pub const DIVISION_FEATURE_CODE: &str = "ADM1";

/// URL builder for the provider's REST endpoints
#[derive(Debug, Clone)]
pub struct GeocodeEndpoints {
    base_url: String,
    username: String,
    lang: String,
    division_max_rows: u32,
    city_max_rows: u32,
    city_feature_codes: Vec<String>,
}

impl GeocodeEndpoints {
    pub fn new(config: &GeocodeConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            lang: config.lang.clone(),
            division_max_rows: config.division_max_rows,
            city_max_rows: config.city_max_rows,
            city_feature_codes: config.city_feature_codes.clone(),
        }
    }

    /// Language names are requested in, also part of every cache key
    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// Full country list
    pub fn countries_url(&self) -> String {
        format!(
            "{}/countryInfoJSON?{}",
            self.base_url,
            self.account_params()
        )
    }

    /// First-level divisions of one country
    pub fn divisions_url(&self, country_id: ExternalId) -> String {
        format!(
            "{}/childrenJSON?geonameId={}&{}&featureCode={}&maxRows={}",
            self.base_url,
            country_id,
            self.account_params(),
            DIVISION_FEATURE_CODE,
            self.division_max_rows
        )
    }

    /// Populated places of one division, capitals included
    pub fn cities_url(&self, division_id: ExternalId) -> String {
        let feature_codes: String = self
            .city_feature_codes
            .iter()
            .map(|code| format!("&featureCode={}", urlencoding::encode(code)))
            .collect();

        format!(
            "{}/childrenJSON?geonameId={}&{}{}&maxRows={}",
            self.base_url,
            division_id,
            self.account_params(),
            feature_codes,
            self.city_max_rows
        )
    }

    fn account_params(&self) -> String {
        format!(
            "username={}&lang={}",
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.lang)
        )
    }
}
