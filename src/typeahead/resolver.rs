//! Typeahead Resolver
//!
//! Cache-first lookups for the three hierarchy levels. A miss goes to the
//! provider, the decoded list is written back when non-empty, and the typed
//! text is applied locally.

use crate::cache::{aggregate_keys, CacheKey, TieredCache};
use crate::config::TypeaheadConfig;
use crate::domain::ports::{ExternalId, GeocodeDirectoryRef, PlaceKind, Suggestion, TenantId};
use crate::geocode::{decode, GeocodeEndpoints};
use crate::typeahead::filter::filter_and_sort;
use tracing::{debug, info};

/// Orchestrates the geocode directory and the tiered cache
pub struct TypeaheadResolver {
    directory: GeocodeDirectoryRef,
    cache: TieredCache,
    endpoints: GeocodeEndpoints,
    config: TypeaheadConfig,
}

impl TypeaheadResolver {
    pub fn new(
        directory: GeocodeDirectoryRef,
        cache: TieredCache,
        endpoints: GeocodeEndpoints,
        config: TypeaheadConfig,
    ) -> Self {
        Self {
            directory,
            cache,
            endpoints,
            config,
        }
    }

    pub fn cache(&self) -> &TieredCache {
        &self.cache
    }

    /// Countries whose name contains `query`, at most `country_limit`
    pub async fn search_countries(&self, query: &str) -> Vec<Suggestion> {
        let key = CacheKey::countries(self.endpoints.lang());
        let url = self.endpoints.countries_url();
        let records = self.load(PlaceKind::Country, &key, &url).await;
        filter_and_sort(records, query, Some(self.config.country_limit))
    }

    /// Divisions of one country; no country means no results and no call
    pub async fn search_divisions(&self, country_id: Option<ExternalId>, query: &str) -> Vec<Suggestion> {
        let Some(country_id) = country_id else {
            debug!("Division search without a country, returning no results");
            return Vec::new();
        };

        let key = CacheKey::divisions(country_id, self.endpoints.lang());
        let url = self.endpoints.divisions_url(country_id);
        let records = self.load(PlaceKind::Division, &key, &url).await;
        filter_and_sort(records, query, self.config.division_limit)
    }

    /// Cities of one division, capitals included
    pub async fn search_cities(&self, division_id: Option<ExternalId>, query: &str) -> Vec<Suggestion> {
        let Some(division_id) = division_id else {
            debug!("City search without a division, returning no results");
            return Vec::new();
        };

        let key = CacheKey::cities(division_id, self.endpoints.lang());
        let url = self.endpoints.cities_url(division_id);
        let records = self.load(PlaceKind::City, &key, &url).await;
        filter_and_sort(records, query, self.config.city_limit)
    }

    /// Clear the country list, and the aggregates of `tenant_id` if given
    ///
    /// Division and city lists are keyed by parent id and are left to
    /// expire. Returns how many keys were present.
    pub async fn invalidate_cache(&self, tenant_id: Option<TenantId>) -> u64 {
        let mut keys = vec![CacheKey::countries(self.endpoints.lang())];
        if let Some(tenant_id) = tenant_id {
            keys.extend(aggregate_keys(tenant_id));
        }

        let removed = self.cache.invalidate(&keys).await;
        info!(removed, tenant = ?tenant_id, "Geocode cache invalidated");
        removed
    }

    async fn load(&self, kind: PlaceKind, key: &CacheKey, url: &str) -> Vec<Suggestion> {
        if let Some(cached) = self.cache.get::<Vec<Suggestion>>(key).await {
            return cached;
        }

        let raw = self.directory.fetch(url).await;
        let records = decode(kind, &raw);
        debug!(kind = %kind, key = %key, fetched = raw.len(), decoded = records.len(), "Loaded from provider");

        self.cache.put_records(key, &records).await;
        records
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlPolicy;
    use crate::config::GeocodeConfig;
    use crate::domain::ports::GeocodeDirectory;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::Arc;

    /// Directory fake answering by endpoint and counting calls
    #[derive(Default)]
    struct ScriptedDirectory {
        countries: Mutex<Vec<Value>>,
        divisions: Mutex<Vec<Value>>,
        cities: Mutex<Vec<Value>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedDirectory {
        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl GeocodeDirectory for ScriptedDirectory {
        async fn fetch(&self, url: &str) -> Vec<Value> {
            self.calls.lock().push(url.to_string());
            if url.contains("countryInfoJSON") {
                self.countries.lock().clone()
            } else if url.contains("featureCode=ADM1") {
                self.divisions.lock().clone()
            } else {
                self.cities.lock().clone()
            }
        }
    }

    fn resolver(directory: Arc<ScriptedDirectory>) -> TypeaheadResolver {
        TypeaheadResolver::new(
            directory,
            TieredCache::in_memory(TtlPolicy::default()),
            GeocodeEndpoints::new(&GeocodeConfig::default()),
            TypeaheadConfig::default(),
        )
    }

    fn country_fixture() -> Vec<Value> {
        vec![
            json!({"geonameId": 3686110, "countryName": "Colombia", "countryCode": "CO"}),
            json!({"geonameId": 3923057, "countryName": "Bolivia", "countryCode": "BO"}),
            json!({"geonameId": 3469034, "countryName": "Brazil", "countryCode": "BR"}),
        ]
    }

    #[tokio::test]
    async fn test_country_search_filters_and_sorts() {
        let directory = Arc::new(ScriptedDirectory::default());
        *directory.countries.lock() = country_fixture();
        let resolver = resolver(directory.clone());

        let result = resolver.search_countries("ia").await;
        assert_eq!(
            result,
            vec![
                Suggestion::coded(3923057, "Bolivia", "BO"),
                Suggestion::coded(3686110, "Colombia", "CO"),
            ]
        );
    }

    #[tokio::test]
    async fn test_repeat_query_is_served_from_cache() {
        let directory = Arc::new(ScriptedDirectory::default());
        *directory.countries.lock() = country_fixture();
        let resolver = resolver(directory.clone());

        resolver.search_countries("bo").await;
        resolver.search_countries("bra").await;
        resolver.search_countries("").await;

        assert_eq!(directory.call_count(), 1);
        assert_eq!(resolver.cache().stats().hits, 2);
    }

    #[tokio::test]
    async fn test_empty_upstream_is_not_cached() {
        let directory = Arc::new(ScriptedDirectory::default());
        let resolver = resolver(directory.clone());

        assert!(resolver.search_countries("ia").await.is_empty());
        assert_eq!(resolver.cache().stats().writes, 0);

        // provider recovers
        *directory.countries.lock() = country_fixture();
        assert_eq!(resolver.search_countries("ia").await.len(), 2);
        assert_eq!(directory.call_count(), 2);
    }

    #[tokio::test]
    async fn test_country_results_are_capped() {
        let directory = Arc::new(ScriptedDirectory::default());
        *directory.countries.lock() = (0..80)
            .map(|i| json!({"geonameId": i + 1, "countryName": format!("Country {:02}", i), "countryCode": format!("C{}", i)}))
            .collect();
        let resolver = resolver(directory);

        let result = resolver.search_countries("country").await;
        assert_eq!(result.len(), 50);
        assert_eq!(result[0].name, "Country 00");
    }

    #[tokio::test]
    async fn test_missing_parent_skips_the_provider() {
        let directory = Arc::new(ScriptedDirectory::default());
        let resolver = resolver(directory.clone());

        assert!(resolver.search_divisions(None, "cun").await.is_empty());
        assert!(resolver.search_cities(None, "bog").await.is_empty());
        assert_eq!(directory.call_count(), 0);
    }

    #[tokio::test]
    async fn test_division_search_is_keyed_by_country() {
        let directory = Arc::new(ScriptedDirectory::default());
        *directory.divisions.lock() = vec![
            json!({"geonameId": 3686210, "name": "Cundinamarca", "adminCode1": "33", "countryCode": "CO", "adminCodes1": {"ISO3166_2": "CUN"}}),
            json!({"geonameId": 3689815, "name": "Antioquia", "adminCode1": "02", "countryCode": "CO", "adminCodes1": {"ISO3166_2": "ANT"}}),
        ];
        let resolver = resolver(directory.clone());

        let result = resolver.search_divisions(Some(3686110), "").await;
        assert_eq!(
            result,
            vec![
                Suggestion::coded(3689815, "Antioquia", "CO-ANT"),
                Suggestion::coded(3686210, "Cundinamarca", "CO-CUN"),
            ]
        );

        resolver.search_divisions(Some(3686110), "cun").await;
        resolver.search_divisions(Some(3923057), "cun").await;
        assert_eq!(directory.call_count(), 2);
        assert!(directory.calls.lock()[1].contains("geonameId=3923057"));
    }

    #[tokio::test]
    async fn test_city_search_includes_capitals() {
        let directory = Arc::new(ScriptedDirectory::default());
        *directory.cities.lock() = vec![
            json!({"geonameId": 3688689, "name": "Bogotá", "fcode": "PPLC"}),
            json!({"geonameId": 3687925, "name": "Chía", "fcode": "PPL"}),
        ];
        let resolver = resolver(directory.clone());

        let result = resolver.search_cities(Some(3686210), "bog").await;
        assert_eq!(result, vec![Suggestion::named(3688689, "Bogotá")]);

        let calls = directory.calls.lock();
        assert!(calls[0].contains("featureCode=PPL&featureCode=PPLC"));
    }

    #[tokio::test]
    async fn test_invalidate_clears_country_list_and_aggregates() {
        let directory = Arc::new(ScriptedDirectory::default());
        *directory.countries.lock() = country_fixture();
        let resolver = resolver(directory.clone());

        resolver.search_countries("").await;
        resolver.cache().put(&CacheKey::location_summary(TenantId(1)), &1u8).await;
        resolver.cache().put(&CacheKey::location_summary(TenantId(2)), &1u8).await;
        resolver
            .cache()
            .put_records(&CacheKey::divisions(3686110, "es"), &[Suggestion::named(1, "x")])
            .await;

        assert_eq!(resolver.invalidate_cache(Some(TenantId(1))).await, 2);
        assert!(resolver
            .cache()
            .get::<u8>(&CacheKey::location_summary(TenantId(2)))
            .await
            .is_some());
        assert!(resolver
            .cache()
            .get::<Vec<Suggestion>>(&CacheKey::divisions(3686110, "es"))
            .await
            .is_some());

        resolver.search_countries("").await;
        assert_eq!(directory.call_count(), 2);
        assert_eq!(resolver.invalidate_cache(None).await, 1);
    }

    #[tokio::test]
    async fn test_rate_limited_provider_yields_empty_uncached_result() {
        use crate::geocode::GeocodeClient;
        use axum::{http::StatusCode, routing::get, Router};
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new().route(
            "/countryInfoJSON",
            get({
                let hits = hits.clone();
                move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                    async { StatusCode::TOO_MANY_REQUESTS }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let config = GeocodeConfig {
            base_url: format!("http://{}", addr),
            ..GeocodeConfig::default()
        };
        let client = GeocodeClient::with_timeout(Duration::from_secs(2)).unwrap();
        let counters = client.counters();
        let resolver = TypeaheadResolver::new(
            Arc::new(client),
            TieredCache::in_memory(TtlPolicy::default()),
            GeocodeEndpoints::new(&config),
            TypeaheadConfig::default(),
        );

        assert!(resolver.search_countries("ia").await.is_empty());
        assert!(resolver.search_countries("ia").await.is_empty());

        assert_eq!(resolver.cache().stats().writes, 0);
        assert_eq!(resolver.cache().stats().skipped_empty, 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(counters.snapshot().rate_limited, 2);
    }
}
