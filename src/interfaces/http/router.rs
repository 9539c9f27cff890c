//! API Router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::application::{LotService, ReservationService, SharedEventBus};
use crate::domain::{Availability, AvailabilityLevel, RepositoryProvider, SpotStatus};
use crate::infrastructure::crypto::jwt::JwtConfig;
use crate::interfaces::http::common::ApiResponse;
use crate::interfaces::http::middleware::{auth_middleware, AuthState};
use crate::interfaces::http::modules::{bookings, health, locations, metrics, request_id};
use crate::interfaces::ws::{self, LiveState};

/// Everything the HTTP layer needs from the running service
#[derive(Clone)]
pub struct ApiServices {
    pub repos: Arc<dyn RepositoryProvider>,
    pub lots: Arc<LotService>,
    pub reservations: Arc<ReservationService>,
    pub event_bus: SharedEventBus,
    pub jwt_config: JwtConfig,
    pub prometheus: PrometheusHandle,
}

/// Unified state for the protected `/api/v1` routes.
/// Axum extracts the specific handler state via `FromRef`.
#[derive(Clone)]
pub struct ApiState {
    pub lots: Arc<LotService>,
    pub reservations: Arc<ReservationService>,
    pub event_bus: SharedEventBus,
}

impl FromRef<ApiState> for locations::LocationAppState {
    fn from_ref(s: &ApiState) -> Self {
        locations::LocationAppState {
            lots: Arc::clone(&s.lots),
            reservations: Arc::clone(&s.reservations),
        }
    }
}

impl FromRef<ApiState> for LiveState {
    fn from_ref(s: &ApiState) -> Self {
        LiveState {
            event_bus: s.event_bus.clone(),
            lots: Arc::clone(&s.lots),
        }
    }
}

/// Security scheme modifier for OpenAPI
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token from the identity provider; `sub` is the user id"))
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        locations::list_locations,
        locations::get_lot,
        locations::get_spot,
        locations::book_spot,
        locations::cancel_booking,
        bookings::list_my_bookings,
        ws::live::live_updates_handler,
    ),
    components(
        schemas(
            ApiResponse<String>,
            Availability,
            AvailabilityLevel,
            SpotStatus,
            locations::LocationDto,
            locations::SpotDto,
            locations::LotDto,
            bookings::BookingDto,
            health::HealthResponse,
            health::ComponentHealth,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Locations", description = "Parking locations, lot grids and spot state"),
        (name = "Bookings", description = "Book and cancel spots; list your bookings"),
        (name = "Live Updates", description = "Per-location WebSocket stream of committed changes"),
    ),
    info(
        title = "ParkEasy Reservation API",
        version = "1.0.0",
        description = "Browse parking locations and reserve individual spots",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Create the API router with all routes
pub fn create_api_router(services: ApiServices) -> Router {
    let auth_state = AuthState {
        jwt_config: services.jwt_config.clone(),
    };

    let api_state = ApiState {
        lots: services.lots.clone(),
        reservations: services.reservations.clone(),
        event_bus: services.event_bus.clone(),
    };

    let api_routes = Router::new()
        .route("/locations", get(locations::list_locations))
        .route("/locations/{location_id}", get(locations::get_lot))
        .route(
            "/locations/{location_id}/spots/{spot_number}",
            get(locations::get_spot),
        )
        .route(
            "/locations/{location_id}/spots/{spot_number}/booking",
            post(locations::book_spot).delete(locations::cancel_booking),
        )
        .route(
            "/locations/{location_id}/live",
            get(ws::live_updates_handler),
        )
        .route("/bookings", get(bookings::list_my_bookings))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
        .with_state(api_state);

    let health_state = health::HealthState {
        repos: services.repos.clone(),
        event_bus: services.event_bus.clone(),
        started_at: Arc::new(Instant::now()),
    };
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .with_state(health_state);

    let metrics_routes = Router::new()
        .route("/metrics", get(metrics::prometheus_metrics))
        .with_state(metrics::MetricsState {
            handle: services.prometheus.clone(),
        });

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(health_routes)
        .merge(metrics_routes)
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics::http_metrics_middleware))
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::Duration;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::application::create_event_bus;
    use crate::application::services::fixtures::seeded_memory;
    use crate::infrastructure::crypto::jwt::sign_token;
    use crate::infrastructure::storage::InMemoryRepositoryProvider;

    fn jwt() -> JwtConfig {
        JwtConfig {
            secret: "router-test-secret".into(),
            issuer: None,
        }
    }

    fn token(user: &str) -> String {
        sign_token(user, &jwt(), Duration::minutes(5))
    }

    async fn app() -> (Router, Arc<InMemoryRepositoryProvider>) {
        let (app, repos, _) = app_with_bus().await;
        (app, repos)
    }

    async fn app_with_bus() -> (Router, Arc<InMemoryRepositoryProvider>, SharedEventBus) {
        let repos = seeded_memory().await;
        let event_bus = create_event_bus(16);
        let services = ApiServices {
            repos: repos.clone(),
            lots: Arc::new(LotService::new(repos.clone())),
            reservations: Arc::new(ReservationService::new(repos.clone(), event_bus.clone())),
            event_bus: event_bus.clone(),
            jwt_config: jwt(),
            prometheus: PrometheusBuilder::new().build_recorder().handle(),
        };
        (create_api_router(services), repos, event_bus)
    }

    async fn call(app: &Router, method: &str, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
        }
        let response = app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (app, _) = app().await;
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["locations"], 2);
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let (app, _) = app().await;
        let (status, body) = call(&app, "GET", "/api/v1/locations", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/locations")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_locations() {
        let (app, _) = app().await;
        let (status, body) = call(&app, "GET", "/api/v1/locations", Some("alice")).await;
        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["name"], "Downtown Mall");
        assert_eq!(data[0]["availability"]["available"], 50);
        assert_eq!(data[0]["level"], "high");
        assert_eq!(data[0]["bookable"], true);
    }

    #[tokio::test]
    async fn test_lot_shows_viewer_statuses() {
        let (app, _) = app().await;
        call(&app, "POST", "/api/v1/locations/1/spots/3/booking", Some("bob")).await;
        call(&app, "POST", "/api/v1/locations/1/spots/4/booking", Some("alice")).await;

        let (status, body) =
            call(&app, "GET", "/api/v1/locations/1?selected=47", Some("alice")).await;
        assert_eq!(status, StatusCode::OK);
        let spots = body["data"]["spots"].as_array().unwrap();
        assert_eq!(spots.len(), 50);
        assert_eq!(spots[2]["status"], "occupied");
        assert!(spots[2]["booking_start"].is_null());
        assert_eq!(spots[3]["status"], "mine");
        assert_eq!(spots[46]["status"], "selected");
        assert_eq!(spots[46]["row"], 4);
        assert_eq!(spots[46]["column"], 6);
        assert_eq!(body["data"]["location"]["availability"]["available"], 48);
    }

    #[tokio::test]
    async fn test_unselectable_selection_is_dropped() {
        let (app, _) = app().await;
        let (booked, _) =
            call(&app, "POST", "/api/v1/locations/1/spots/12/booking", Some("bob")).await;
        assert_eq!(booked, StatusCode::CREATED);

        for uri in ["/api/v1/locations/1?selected=999", "/api/v1/locations/1?selected=12"] {
            let (status, body) = call(&app, "GET", uri, Some("alice")).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            assert!(body["data"]["selected"].is_null(), "{}", uri);
            let spots = body["data"]["spots"].as_array().unwrap();
            assert!(spots.iter().all(|s| s["status"] != "selected"), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_invalid_selection_is_422() {
        let (app, _) = app().await;
        let (status, _) = call(&app, "GET", "/api/v1/locations/1?selected=0", Some("alice")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_booking_lifecycle_status_codes() {
        let (app, _) = app().await;
        let path = "/api/v1/locations/2/spots/10/booking";

        let (status, body) = call(&app, "POST", path, Some("alice")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "mine");

        let (status, body) = call(&app, "POST", path, Some("bob")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("refresh"));

        let (status, _) = call(&app, "DELETE", path, Some("bob")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(&app, "GET", "/api/v1/bookings", Some("alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["spot_number"], 10);

        let (status, body) = call(&app, "DELETE", path, Some("alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "available");

        let (_, body) = call(&app, "GET", "/api/v1/bookings", Some("alice")).await;
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_resources_are_404() {
        let (app, _) = app().await;
        let (status, _) = call(&app, "GET", "/api/v1/locations/9", Some("alice")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "GET", "/api/v1/locations/1/spots/51", Some("alice")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) =
            call(&app, "POST", "/api/v1/locations/9/spots/1/booking", Some("alice")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_transient_store_failure_is_503_with_retry_after() {
        let (app, repos) = app().await;
        repos.spot_store().fail_next_reads(10);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/locations/1")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token("alice")))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let (app, _) = app().await;
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }
    async fn serve(app: &Router) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = app.clone();
        tokio::spawn(async move { axum::serve(listener, server).await.unwrap() });
        addr
    }

    async fn next_json<S>(socket: &mut S) -> Value
    where
        S: futures_util::Stream<
                Item = Result<
                    tokio_tungstenite::tungstenite::Message,
                    tokio_tungstenite::tungstenite::Error,
                >,
            > + Unpin,
    {
        use futures_util::StreamExt;
        use tokio_tungstenite::tungstenite::Message;

        loop {
            let frame = tokio::time::timeout(std::time::Duration::from_secs(2), socket.next())
                .await
                .expect("no frame in time")
                .expect("stream ended")
                .unwrap();
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_live_updates_stream_committed_bookings() {
        let (app, _) = app().await;
        let addr = serve(&app).await;

        let url = format!(
            "ws://{}/api/v1/locations/1/live?access_token={}",
            addr,
            token("alice")
        );
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        let welcome = next_json(&mut socket).await;
        assert_eq!(welcome["type"], "connected");
        assert_eq!(welcome["availability"]["available"], 50);

        // Location 2 traffic never reaches a location 1 viewer.
        call(&app, "POST", "/api/v1/locations/2/spots/1/booking", Some("bob")).await;
        call(&app, "POST", "/api/v1/locations/1/spots/5/booking", Some("bob")).await;

        let event = next_json(&mut socket).await;
        assert_eq!(event["type"], "SpotBooked");
        assert_eq!(event["data"]["location_id"], 1);
        assert_eq!(event["data"]["spot_number"], 5);
    }

    #[tokio::test]
    async fn test_live_viewer_sees_commits_made_while_connecting() {
        let (app, repos, bus) = app_with_bus().await;
        let addr = serve(&app).await;
        repos
            .spot_store()
            .set_read_latency(std::time::Duration::from_millis(400));

        let url = format!(
            "ws://{}/api/v1/locations/1/live?access_token={}",
            addr,
            token("alice")
        );
        let connecting = tokio::spawn(tokio_tungstenite::connect_async(url));

        // The viewer is registered while its availability read is still in flight.
        tokio::time::timeout(std::time::Duration::from_millis(300), async {
            while bus.subscriber_count(1) == 0 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("viewer subscribed only after reading availability");

        let (status, _) =
            call(&app, "POST", "/api/v1/locations/1/spots/5/booking", Some("bob")).await;
        assert_eq!(status, StatusCode::CREATED);

        let (mut socket, _) = connecting.await.unwrap().unwrap();
        let welcome = next_json(&mut socket).await;
        assert_eq!(welcome["type"], "connected");
        let shown = welcome["availability"]["available"].as_u64().unwrap();
        assert!(shown == 49 || shown == 50);

        let event = next_json(&mut socket).await;
        assert_eq!(event["type"], "SpotBooked");
        assert_eq!(event["data"]["spot_number"], 5);
    }

    #[tokio::test]
    async fn test_live_updates_refuse_bad_requests() {
        use tokio_tungstenite::tungstenite::Error as WsError;

        let (app, _, bus) = app_with_bus().await;
        let addr = serve(&app).await;

        let unknown = format!(
            "ws://{}/api/v1/locations/99/live?access_token={}",
            addr,
            token("alice")
        );
        match tokio_tungstenite::connect_async(unknown).await {
            Err(WsError::Http(response)) => assert_eq!(response.status(), StatusCode::NOT_FOUND),
            other => panic!("expected 404, got {:?}", other.map(|_| ())),
        }
        assert_eq!(bus.subscriber_count(99), 0);
        assert!(bus.watched_locations().is_empty());

        let anonymous = format!("ws://{}/api/v1/locations/1/live", addr);
        match tokio_tungstenite::connect_async(anonymous).await {
            Err(WsError::Http(response)) => {
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED)
            }
            other => panic!("expected 401, got {:?}", other.map(|_| ())),
        }
    }
}
