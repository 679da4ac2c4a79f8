use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse, GraphQLSubscription};
use axum::{
    Json, Router,
    extract::State,
    http::{self, HeaderName, HeaderValue, Method},
    response::{Html, IntoResponse},
    routing::get,
};
use products_hr::{DirectoryModel, Phase};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{config::AppConfig, graphql::SchemaType};

const GRAPHQL_PATH: &str = "/graphql";
const GRAPHQL_WS_PATH: &str = "/graphql/ws";

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<DirectoryModel>,
    pub schema: SchemaType,
    pub config: Arc<AppConfig>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "directory server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route(GRAPHQL_PATH, get(graphiql_handler).post(graphql_handler))
        .route_service(GRAPHQL_WS_PATH, GraphQLSubscription::new(state.schema.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

async fn graphql_handler(
    State(state): State<AppState>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    state.schema.execute(request.into_inner()).await.into()
}

async fn graphiql_handler() -> impl IntoResponse {
    Html(
        GraphiQLSource::build()
            .endpoint(GRAPHQL_PATH)
            .subscription_endpoint(GRAPHQL_WS_PATH)
            .finish(),
    )
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let phase = state.model.phase();
    Json(HealthResponse {
        ok: !matches!(phase, Phase::FetchFailed | Phase::ReadFailed)
            || !state.model.store().is_empty().await,
        employees: state.model.store().len().await,
        cached: state.model.is_data_cached(),
        phase: format!("{phase:?}"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    employees: usize,
    cached: bool,
    phase: String,
    version: &'static str,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::{GraphqlData, build_schema};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use products_hr::{DirectoryConfig, Employee, NoContacts, UpdateOrigin};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = DirectoryConfig::new(Vec::new()).with_cache(None);
        let model = Arc::new(DirectoryModel::new(config.clone(), Arc::new(NoContacts)));
        let schema = build_schema(GraphqlData {
            model: Arc::clone(&model),
            address_book: None,
        });
        AppState {
            model,
            schema,
            config: Arc::new(AppConfig {
                directory: config,
                contacts_file: None,
                cors_allowed_origins: Vec::new(),
            }),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_roster_state() {
        let state = test_state();
        state
            .model
            .store()
            .replace(vec![Employee::new("Kati", "Karu")], UpdateOrigin::Cache)
            .await;
        let response = build_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = body_json(response).await;
        assert_eq!(body["ok"], json!(true));
        assert_eq!(body["employees"], json!(1));
        assert_eq!(body["cached"], json!(false));
        assert_eq!(body["phase"], json!("Idle"));
    }

    #[tokio::test]
    async fn graphql_post_executes_queries() {
        let request = Request::post(GRAPHQL_PATH)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"query": "{ health { ok } }"}).to_string()))
            .unwrap();
        let response = build_router(test_state()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["health"]["ok"], json!(true));
    }

    #[tokio::test]
    async fn graphiql_is_served_on_get() {
        let response = build_router(test_state())
            .oneshot(Request::get(GRAPHQL_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8_lossy(&bytes);
        assert!(html.contains(GRAPHQL_WS_PATH));
    }
}
