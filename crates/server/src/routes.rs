use std::sync::Arc;

use axum::{routing::get, Json, Router};
use service::RecordStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;

use crate::metrics;

pub mod food;

#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<dyn RecordStore>,
}

pub async fn health() -> Json<Health> {
    Json(Health::ok())
}

async fn metrics_text() -> (axum::http::StatusCode, String) {
    metrics::encode_metrics()
}

/// Build the full application router: the food collection plus health and metrics.
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text));

    let api = Router::new()
        .route(
            "/api/food",
            get(food::list)
                .post(food::create)
                .put(food::replace)
                .patch(food::update)
                .delete(food::remove)
                .fallback(food::method_not_allowed),
        )
        .with_state(state);

    public
        .merge(api)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                // 5xx responses
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use service::storage::memory::MemoryBackend;
    use service::store::SnapshotStore;
    use service::ids::SequentialIds;
    use tower::ServiceExt;

    fn app() -> Router {
        let store = SnapshotStore::new(MemoryBackend::default(), Arc::new(SequentialIds));
        build_router(ServerState { store: Arc::new(store) }, CorsLayer::very_permissive())
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let resp = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn unsupported_methods_get_the_failure_envelope() {
        let req = Request::builder()
            .method("TRACE")
            .uri("/api/food")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = body_json(resp).await;
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "method TRACE not allowed");
    }

    #[tokio::test]
    async fn unreadable_number_filters_list_nothing() {
        for uri in ["/api/food?amount=abc", "/api/food?price=NaN"] {
            let resp = app().oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{uri}");
            assert_eq!(body_json(resp).await, json!([]), "{uri}");
        }
    }

    #[tokio::test]
    async fn create_on_an_empty_store_returns_the_item() {
        let req = Request::post("/api/food")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"product": "rice", "amount": 5, "price": 100, "shop": "A", "todate": "2025-01-01"}).to_string(),
            ))
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({"success": true, "item": {"id": 1, "product": "rice", "amount": 5, "price": 100, "shop": "A", "todate": "2025-01-01"}})
        );
    }
}
