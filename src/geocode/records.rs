//! Provider Record Decoding
//!
//! Turns raw provider records into [`Suggestion`]s. Decoding is partial:
//! a malformed record is dropped with a warning and the rest are kept.

use crate::domain::ports::{ExternalId, PlaceKind, Suggestion};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Identifier as sent by the provider, a number or a numeric string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn value(&self) -> Option<ExternalId> {
        match self {
            RawId::Number(n) => Some(*n),
            RawId::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCountry {
    #[serde(rename = "geonameId")]
    geoname_id: RawId,
    #[serde(rename = "countryName")]
    country_name: String,
    #[serde(rename = "countryCode")]
    country_code: String,
}

#[derive(Debug, Deserialize)]
struct RawDivision {
    #[serde(rename = "geonameId")]
    geoname_id: RawId,
    name: String,
    #[serde(rename = "adminCode1")]
    admin_code1: Option<String>,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
    #[serde(rename = "adminCodes1")]
    admin_codes1: Option<RawAdminCodes>,
}

#[derive(Debug, Deserialize)]
struct RawAdminCodes {
    #[serde(rename = "ISO3166_2")]
    iso3166_2: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCity {
    #[serde(rename = "geonameId")]
    geoname_id: RawId,
    name: String,
}

/// Decode a record list of the given level
pub fn decode(kind: PlaceKind, raw: &[Value]) -> Vec<Suggestion> {
    raw.iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let decoded = match kind {
                PlaceKind::Country => decode_country(record),
                PlaceKind::Division => decode_division(record),
                PlaceKind::City => decode_city(record),
            };
            if let Err(reason) = &decoded {
                warn!(kind = %kind, index, reason = %reason, "Dropping malformed provider record");
            }
            decoded.ok()
        })
        .collect()
}

fn decode_country(record: &Value) -> Result<Suggestion, String> {
    let raw = RawCountry::deserialize(record).map_err(|e| e.to_string())?;
    let id = raw.geoname_id.value().ok_or("non-numeric geonameId")?;
    let name = non_empty(&raw.country_name).ok_or("empty countryName")?;
    let code = non_empty(&raw.country_code).ok_or("empty countryCode")?;
    Ok(Suggestion::coded(id, name, code.to_uppercase()))
}

fn decode_division(record: &Value) -> Result<Suggestion, String> {
    let raw = RawDivision::deserialize(record).map_err(|e| e.to_string())?;
    let id = raw.geoname_id.value().ok_or("non-numeric geonameId")?;
    let name = non_empty(&raw.name).ok_or("empty name")?;
    let code = division_code(&raw).ok_or("missing division code")?;
    Ok(Suggestion::coded(id, name, code))
}

fn decode_city(record: &Value) -> Result<Suggestion, String> {
    let raw = RawCity::deserialize(record).map_err(|e| e.to_string())?;
    let id = raw.geoname_id.value().ok_or("non-numeric geonameId")?;
    let name = non_empty(&raw.name).ok_or("empty name")?;
    Ok(Suggestion::named(id, name))
}

/// Division code, `CO-CUN` style when the ISO 3166-2 suffix is known
///
/// Division codes are unique across all countries. Without the ISO suffix
/// the `adminCode1` is used, still prefixed by the country (`CO-02`) so
/// that numeric codes shared by many countries do not collide. A bare
/// `adminCode1` is the last resort.
fn division_code(raw: &RawDivision) -> Option<String> {
    let iso_suffix = raw
        .admin_codes1
        .as_ref()
        .and_then(|codes| codes.iso3166_2.as_deref())
        .and_then(non_empty);
    let admin_code = raw.admin_code1.as_deref().and_then(non_empty);
    let country = raw.country_code.as_deref().and_then(non_empty);

    let suffix = iso_suffix.or(admin_code)?.to_uppercase();
    Some(match country {
        Some(country) => format!("{}-{}", country.to_uppercase(), suffix),
        None => suffix,
    })
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
