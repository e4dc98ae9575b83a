//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, flush_handler, get_handler, health_handler, invalidate_handler, set_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /set` - Store a key-value pair
/// - `GET /get/:key` - Retrieve a value by key
/// - `DELETE /del/:key` - Delete a key
/// - `POST /invalidate/:key` - Drop the cached copy of a key
/// - `POST /flush` - Flush dirty entries now
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/invalidate/:key", post(invalidate_handler))
        .route("/flush", post(flush_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let state = AppState::from_config(&Config::default()).unwrap();
        create_router(state)
    }

    async fn status_of(app: &Router, method: &str, uri: &str, body: Option<&str>) -> StatusCode {
        let mut request = Request::builder().method(method).uri(uri);
        if body.is_some() {
            request = request.header("content-type", "application/json");
        }
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);

        app.clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_every_endpoint_is_routed() {
        let app = create_test_app();
        let cases = [
            ("PUT", "/set", Some(r#"{"key":"k","value":"v"}"#), StatusCode::OK),
            ("GET", "/get/k", None, StatusCode::OK),
            ("GET", "/get/absent", None, StatusCode::NOT_FOUND),
            ("POST", "/invalidate/k", None, StatusCode::OK),
            ("DELETE", "/del/k", None, StatusCode::OK),
            ("POST", "/flush", None, StatusCode::OK),
            ("GET", "/stats", None, StatusCode::OK),
            ("GET", "/health", None, StatusCode::OK),
        ];

        for (method, uri, body, expected) in cases {
            assert_eq!(
                status_of(&app, method, uri, body).await,
                expected,
                "{} {}",
                method,
                uri
            );
        }
    }

    #[tokio::test]
    async fn test_wrong_method_is_rejected() {
        let app = create_test_app();

        let cases = [
            ("GET", "/set"),
            ("GET", "/flush"),
            ("POST", "/get/k"),
            ("GET", "/invalidate/k"),
        ];
        for (method, uri) in cases {
            assert_eq!(
                status_of(&app, method, uri, None).await,
                StatusCode::METHOD_NOT_ALLOWED,
                "{} {}",
                method,
                uri
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let app = create_test_app();
        assert_eq!(status_of(&app, "GET", "/keys", None).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }
}
