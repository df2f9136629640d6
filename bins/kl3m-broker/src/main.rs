//! Sample Broker: an HTTP service mediating between training-sample
//! producers and consumer trainers. Ported from
//! `kl3m_data/api/broker.py`.

mod sampling;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};

use kl3m_core::{BrokerPreconditionFailed, KlError, QueueStore};
use kl3m_store::RedisQueueStore;

#[derive(Parser, Debug)]
#[command(about = "HTTP sample broker for kl3m training queues")]
struct Args {
    #[arg(long, env = "KL3M_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Hard cap on a single batch request, regardless of what the client
    /// asks for.
    #[arg(long, default_value_t = 16384)]
    max_batch_size: usize,
}

struct AppState {
    store: Arc<dyn QueueStore>,
    max_batch_size: usize,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    batch_size: usize,
    #[serde(default)]
    weights: Option<HashMap<String, f64>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

struct ApiError(KlError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            KlError::BrokerPreconditionFailed(BrokerPreconditionFailed::NoQueuesAvailable) => {
                (StatusCode::SERVICE_UNAVAILABLE, "No sample queues available".to_string())
            }
            KlError::BrokerPreconditionFailed(BrokerPreconditionFailed::InsufficientData) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Not enough data available".to_string())
            }
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

impl From<KlError> for ApiError {
    fn from(e: KlError) -> Self {
        Self(e)
    }
}

async fn post_batch(
    State(state): State<Arc<AppState>>,
    Path(task): Path<String>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    if req.batch_size == 0 || req.batch_size > state.max_batch_size {
        return Err(ApiError(KlError::Other(anyhow::anyhow!(
            "batch_size must be in [1, {}]",
            state.max_batch_size
        ))));
    }

    let batch = match req.weights {
        Some(weights) => sampling::sample_weighted(state.store.clone(), &task, req.batch_size, &weights).await?,
        None => sampling::sample_uniform(state.store.clone(), &task, req.batch_size).await?,
    };

    Ok(Json(batch))
}

async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<sampling::QueueStatus>, ApiError> {
    let status = sampling::queue_status(state.store.as_ref()).await?;
    Ok(Json(status))
}

async fn get_random_source(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let record = sampling::sample_random_source(state.store.clone()).await?;
    Ok(Json(record))
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/batch/:task", post(post_batch))
        .route("/status", get(get_status))
        .route("/source/random", get(get_random_source))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let queue_store = RedisQueueStore::connect(&args.redis_url).await?;
    let state = Arc::new(AppState {
        store: Arc::new(queue_store),
        max_batch_size: args.max_batch_size,
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    tracing::info!(addr = %args.listen, "sample broker listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use kl3m_store::MemoryQueueStore;
    use tower::ServiceExt;

    fn router_with_store(store: MemoryQueueStore) -> Router {
        let state = Arc::new(AppState {
            store: Arc::new(store),
            max_batch_size: 16384,
        });
        build_router(state)
    }

    #[tokio::test]
    async fn status_endpoint_returns_empty_object_with_no_queues() {
        let app = router_with_store(MemoryQueueStore::new());
        let response = app
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn batch_endpoint_rejects_out_of_range_batch_size() {
        let app = router_with_store(MemoryQueueStore::new());
        let body = serde_json::to_vec(&serde_json::json!({ "batch_size": 0 })).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/batch/mlm")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn batch_endpoint_returns_service_unavailable_when_no_queues_exist() {
        let app = router_with_store(MemoryQueueStore::new());
        let body = serde_json::to_vec(&serde_json::json!({ "batch_size": 4 })).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/batch/mlm")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
