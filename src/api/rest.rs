//! REST API Handlers
//!
//! Typeahead endpoints for the three hierarchy levels, the entity save path,
//! the location summary and the admin cache invalidation.

use crate::domain::ports::{
    BusinessEntity, EntityId, ExternalId, LocationSelection, Suggestion, TenantId,
};
use crate::entity::{EntityDraft, EntityService};
use crate::error::Error;
use crate::typeahead::TypeaheadResolver;
use axum::{
    extract::{rejection::JsonRejection, Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

/// Header carrying the active tenant id
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Message sent for any save that failed after validation
const SAVE_FAILED_MESSAGE: &str = "The record could not be saved, please try again";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Country typeahead query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryQuery {
    #[serde(default)]
    pub q: String,
}

/// Division typeahead query
///
/// The id stays a string so a blank or garbled value reads as "no country"
/// instead of a rejected request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DivisionQuery {
    #[serde(default)]
    pub country_id: Option<String>,
    #[serde(default)]
    pub q: String,
}

/// City typeahead query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CityQuery {
    #[serde(default)]
    pub division_id: Option<String>,
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub identifier: String,
}

/// Entity create/update body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveEntityRequest {
    pub entity: EntityDraft,
    #[serde(default)]
    pub location: LocationSelection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyIdentifierResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub removed_keys: u64,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiErrorResponse {
    fn respond(status: StatusCode, error: &str, message: impl Into<String>, field: Option<&str>) -> Response {
        (
            status,
            Json(ApiErrorResponse {
                error: error.into(),
                message: message.into(),
                field: field.map(str::to_string),
            }),
        )
            .into_response()
    }
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    resolver: Arc<TypeaheadResolver>,
    entities: Arc<EntityService>,
}

impl RestRouter {
    pub fn new(resolver: Arc<TypeaheadResolver>, entities: Arc<EntityService>) -> Self {
        Self { resolver, entities }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            resolver: self.resolver,
            entities: self.entities,
        };

        Router::new()
            // Typeahead endpoints
            .route("/api/geocode/countries", get(search_countries))
            .route("/api/geocode/divisions", get(search_divisions))
            .route("/api/geocode/cities", get(search_cities))
            .route("/api/geocode/cache/invalidate", post(invalidate_cache))
            // Entity endpoints
            .route("/api/entities", post(create_entity))
            .route("/api/entities/verify", get(verify_identifier))
            .route("/api/entities/:id", put(update_entity))
            // Aggregates
            .route("/api/locations/summary", get(location_summary))
            // Health endpoints
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    resolver: Arc<TypeaheadResolver>,
    entities: Arc<EntityService>,
}

// =============================================================================
// Typeahead Handlers
// =============================================================================

async fn search_countries(
    State(state): State<AppState>,
    Query(query): Query<CountryQuery>,
) -> Json<Vec<Suggestion>> {
    Json(state.resolver.search_countries(&query.q).await)
}

async fn search_divisions(
    State(state): State<AppState>,
    Query(query): Query<DivisionQuery>,
) -> Json<Vec<Suggestion>> {
    let country_id = parse_external_id(query.country_id.as_deref());
    Json(state.resolver.search_divisions(country_id, &query.q).await)
}

async fn search_cities(
    State(state): State<AppState>,
    Query(query): Query<CityQuery>,
) -> Json<Vec<Suggestion>> {
    let division_id = parse_external_id(query.division_id.as_deref());
    Json(state.resolver.search_cities(division_id, &query.q).await)
}

/// Clear the country list, plus the calling tenant's aggregates when a
/// tenant header is sent
async fn invalidate_cache(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let tenant_id = tenant_from_headers(&headers).ok();
    let removed_keys = state.resolver.invalidate_cache(tenant_id).await;
    (StatusCode::OK, Json(InvalidateResponse { removed_keys }))
}

// =============================================================================
// Entity Handlers
// =============================================================================

async fn create_entity(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Json<SaveEntityRequest>, JsonRejection>,
) -> Response {
    let tenant_id = match tenant_from_headers(&headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };

    match state
        .entities
        .create(tenant_id, request.entity, &request.location)
        .await
    {
        Ok(entity) => (StatusCode::CREATED, Json(entity)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn update_entity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    body: std::result::Result<Json<SaveEntityRequest>, JsonRejection>,
) -> Response {
    let tenant_id = match tenant_from_headers(&headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };

    match state
        .entities
        .update(tenant_id, EntityId(id), request.entity, &request.location)
        .await
    {
        Ok(entity) => (StatusCode::OK, Json::<BusinessEntity>(entity)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Live "already registered" check, never cached
async fn verify_identifier(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let tenant_id = match tenant_from_headers(&headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };

    let name = state.entities.verify_identifier(tenant_id, &query.identifier);
    (
        StatusCode::OK,
        Json(VerifyIdentifierResponse {
            exists: name.is_some(),
            name,
        }),
    )
        .into_response()
}

async fn location_summary(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let tenant_id = match tenant_from_headers(&headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };
    (StatusCode::OK, Json(state.entities.location_summary(tenant_id).await)).into_response()
}

// =============================================================================
// Health Handlers
// =============================================================================

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_check() -> impl IntoResponse {
    (StatusCode::OK, "Ready")
}

// =============================================================================
// Utility Functions
// =============================================================================

fn parse_external_id(raw: Option<&str>) -> Option<ExternalId> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

fn tenant_from_headers(headers: &HeaderMap) -> std::result::Result<TenantId, Response> {
    let raw = headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    match raw.and_then(|v| v.parse::<u64>().ok()) {
        Some(id) => Ok(TenantId(id)),
        None => {
            debug!(header = ?raw, "Rejecting request without a valid tenant");
            Err(ApiErrorResponse::respond(
                StatusCode::BAD_REQUEST,
                "missing_tenant",
                format!("Header {} must carry a numeric tenant id", TENANT_HEADER),
                None,
            ))
        }
    }
}

/// Map a save-path error onto the wire
fn error_response(err: Error) -> Response {
    if err.is_validation() {
        warn!("Save rejected: {}", err);
        return ApiErrorResponse::respond(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_failed",
            err.to_string(),
            err.field(),
        );
    }

    match err {
        Error::RecordNotFound { .. } => {
            ApiErrorResponse::respond(StatusCode::NOT_FOUND, "not_found", err.to_string(), None)
        }
        other => {
            error!(error = %other, "Save failed");
            ApiErrorResponse::respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "save_failed",
                SAVE_FAILED_MESSAGE,
                None,
            )
        }
    }
}

/// Body that could not be read as a save request
fn rejection_response(rejection: JsonRejection) -> Response {
    debug!(error = %rejection.body_text(), "Rejecting unreadable request body");
    ApiErrorResponse::respond(rejection.status(), "invalid_body", rejection.body_text(), None)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{TieredCache, TtlPolicy};
    use crate::config::{GeocodeConfig, TypeaheadConfig};
    use crate::domain::ports::GeocodeDirectory;
    use crate::geocode::GeocodeEndpoints;
    use crate::hierarchy::MemoryRecordStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct FixtureDirectory;

    #[async_trait]
    impl GeocodeDirectory for FixtureDirectory {
        async fn fetch(&self, url: &str) -> Vec<Value> {
            if url.contains("countryInfoJSON") {
                vec![
                    json!({"geonameId": 3686110, "countryName": "Colombia", "countryCode": "CO"}),
                    json!({"geonameId": 3923057, "countryName": "Bolivia", "countryCode": "BO"}),
                    json!({"geonameId": 3469034, "countryName": "Brazil", "countryCode": "BR"}),
                ]
            } else {
                Vec::new()
            }
        }
    }

    fn app() -> Router {
        let cache = TieredCache::in_memory(TtlPolicy::default());
        let resolver = TypeaheadResolver::new(
            Arc::new(FixtureDirectory),
            cache.clone(),
            GeocodeEndpoints::new(&GeocodeConfig::default()),
            TypeaheadConfig::default(),
        );
        let entities = EntityService::new(Arc::new(MemoryRecordStore::new()), cache);
        RestRouter::new(Arc::new(resolver), Arc::new(entities)).build()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(TENANT_HEADER, "1")
            .body(Body::empty())
            .unwrap()
    }

    fn save(method: &str, uri: &str, tenant: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(tenant) = tenant {
            builder = builder.header(TENANT_HEADER, tenant);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn bogota() -> Value {
        json!({
            "country_external_id": 3686110, "country_name": "Colombia", "country_code": "CO",
            "division_external_id": 3686210, "division_name": "Cundinamarca", "division_code": "CO-CUN",
            "city_external_id": 3688689, "city_name": "Bogotá"
        })
    }

    #[tokio::test]
    async fn test_country_typeahead() {
        let app = app();
        let (status, body) = send(&app, get("/api/geocode/countries?q=IA")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {"id": 3923057, "name": "Bolivia", "code": "BO"},
                {"id": 3686110, "name": "Colombia", "code": "CO"}
            ])
        );
    }

    #[tokio::test]
    async fn test_typeahead_without_parent_is_empty_list() {
        let app = app();
        let (status, body) = send(&app, get("/api/geocode/divisions?country_id=&q=cun")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, body) = send(&app, get("/api/geocode/cities?division_id=abc")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_create_requires_tenant() {
        let app = app();
        let request = save(
            "POST",
            "/api/entities",
            None,
            json!({"entity": {"kind": "warehouse", "name": "Central"}, "location": bogota()}),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing_tenant");
    }

    #[tokio::test]
    async fn test_create_and_update_entity() {
        let app = app();
        let request = save(
            "POST",
            "/api/entities",
            Some("1"),
            json!({"entity": {"kind": "company", "name": "acme"}, "location": bogota()}),
        );
        let (status, created) = send(&app, request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "Acme");
        assert!(created["city"].is_object());

        let id = created["id"].as_u64().unwrap();
        let request = save(
            "PUT",
            &format!("/api/entities/{}", id),
            Some("1"),
            json!({"entity": {"kind": "company", "name": "acme holding"}}),
        );
        let (status, updated) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["city"], created["city"]);

        let request = save(
            "PUT",
            &format!("/api/entities/{}", id),
            Some("2"),
            json!({"entity": {"kind": "company", "name": "acme"}}),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_validation_errors_carry_field() {
        let app = app();
        let request = save(
            "POST",
            "/api/entities",
            Some("1"),
            json!({"entity": {"kind": "warehouse", "name": "Central"}}),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["field"], "city_external_id");

        let counterparty = json!({"entity": {"kind": "counterparty", "name": "Acme", "identifier": "900123"}});
        let (status, _) = send(&app, save("POST", "/api/entities", Some("1"), counterparty.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, save("POST", "/api/entities", Some("1"), counterparty)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["field"], "identifier");
    }

    #[tokio::test]
    async fn test_verify_identifier() {
        let app = app();
        let counterparty = json!({"entity": {"kind": "counterparty", "name": "acme", "identifier": "900123"}});
        send(&app, save("POST", "/api/entities", Some("1"), counterparty)).await;

        let (_, body) = send(&app, get("/api/entities/verify?identifier=900123")).await;
        assert_eq!(body, json!({"exists": true, "name": "Acme"}));

        let (_, body) = send(&app, get("/api/entities/verify?identifier=111")).await;
        assert_eq!(body, json!({"exists": false}));
    }

    #[tokio::test]
    async fn test_summary_and_invalidation() {
        let app = app();
        send(
            &app,
            save(
                "POST",
                "/api/entities",
                Some("1"),
                json!({"entity": {"kind": "warehouse", "name": "Central"}, "location": bogota()}),
            ),
        )
        .await;

        let (status, body) = send(&app, get("/api/locations/summary")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cities"], 1);
        assert_eq!(body["topCountries"][0]["name"], "Colombia");

        send(&app, get("/api/geocode/countries")).await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/geocode/cache/invalidate")
            .header(TENANT_HEADER, "1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removedKeys"], 2);
    }

    #[tokio::test]
    async fn test_summary_is_scoped_to_the_tenant() {
        let app = app();
        let counterparty = json!({
            "entity": {"kind": "counterparty", "name": "Acme", "identifier": "900123"},
            "location": bogota()
        });
        let (status, _) = send(&app, save("POST", "/api/entities", Some("1"), counterparty)).await;
        assert_eq!(status, StatusCode::CREATED);

        let request = Request::builder()
            .uri("/api/locations/summary")
            .header(TENANT_HEADER, "2")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["locatedEntities"], 0);
        assert_eq!(body["topCountries"], json!([]));

        let request = Request::builder()
            .uri("/api/locations/summary")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing_tenant");
    }

    #[tokio::test]
    async fn test_location_ids_may_be_strings() {
        let app = app();
        let location = json!({
            "country_external_id": "3686110", "country_name": "Colombia", "country_code": "CO",
            "division_external_id": "3686210", "division_name": "Cundinamarca", "division_code": "CO-CUN",
            "city_external_id": " 3688689 ", "city_name": "Bogotá"
        });
        let request = save(
            "POST",
            "/api/entities",
            Some("1"),
            json!({"entity": {"kind": "company", "name": "acme"}, "location": location}),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["city"]["external_id"], 3688689);
    }

    #[tokio::test]
    async fn test_blank_city_id_means_no_location() {
        let app = app();
        let location = json!({"country_external_id": "", "city_external_id": "", "city_name": ""});

        let counterparty = json!({
            "entity": {"kind": "counterparty", "name": "Acme", "identifier": "900123"},
            "location": location.clone()
        });
        let (status, body) = send(&app, save("POST", "/api/entities", Some("1"), counterparty)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["city"].is_null());

        let warehouse = json!({"entity": {"kind": "warehouse", "name": "Central"}, "location": location});
        let (status, body) = send(&app, save("POST", "/api/entities", Some("1"), warehouse)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["field"], "city_external_id");
    }

    #[tokio::test]
    async fn test_unreadable_body_is_json_error() {
        let app = app();
        let request = save(
            "POST",
            "/api/entities",
            Some("1"),
            json!({"entity": {"kind": "company", "name": "acme"}, "location": {"city_external_id": "bogota"}}),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_body");
    }

    #[tokio::test]
    async fn test_save_failure_message_is_generic() {
        let app = app();
        let first = json!({"entity": {"kind": "warehouse", "name": "Central"}, "location": bogota()});
        send(&app, save("POST", "/api/entities", Some("1"), first)).await;

        let mut clash = bogota();
        clash["division_code"] = json!("CO-ANT");
        clash["division_name"] = json!("Antioquia");
        let second = json!({"entity": {"kind": "warehouse", "name": "Norte"}, "location": clash});
        let (status, body) = send(&app, save("POST", "/api/entities", Some("1"), second)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "save_failed");
        assert_eq!(body["message"], SAVE_FAILED_MESSAGE);
        assert!(!body.to_string().contains("division.external_id"));
    }

    #[test]
    fn test_parse_external_id() {
        assert_eq!(parse_external_id(Some(" 3686110 ")), Some(3686110));
        assert_eq!(parse_external_id(Some("")), None);
        assert_eq!(parse_external_id(Some("-4")), None);
        assert_eq!(parse_external_id(None), None);
    }
}
