//! Bulwark Bridge
//!
//! 호스트 저장소의 연산 hook을 HTTP로 받아 권한을 검사합니다.
//! `/hooks/*`, `/scanners/*`, `/permissions/check`, `/admin/*` 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod admin;
mod auth;
mod config;
mod error;
mod handlers;
mod middleware;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "bwk_bridge=debug,bwk_core=debug,bwk::audit=info,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!("Starting Bridge with config: {:?}", config);
    if config.disable_auth {
        tracing::warn!("Host authentication is disabled (BWK_DISABLE_AUTH)");
    } else if config.api_keys.is_empty() {
        tracing::warn!("No BWK_API_KEYS configured, every guarded request will be rejected");
    }

    // 앱 상태 초기화
    let state = AppState::new(&config).await?;
    let state = Arc::new(state);
    state.spawn_scanner_sweeper();

    // 라우터 구성
    let app = create_router(state);

    // 서버 시작
    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!("Bridge listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// 라우터 생성
fn create_router(state: Arc<AppState>) -> Router {
    let guarded = Router::new()
        // Data hooks
        .route("/hooks/read", post(handlers::hooks::read))
        .route("/hooks/write", post(handlers::hooks::write))
        .route("/hooks/read-write", post(handlers::hooks::read_write))
        // Admin hooks
        .route("/hooks/schema", post(handlers::hooks::schema))
        .route("/hooks/cluster", post(handlers::hooks::cluster))
        .route("/hooks/open", post(handlers::hooks::open))
        .route("/hooks/table-descriptors", post(handlers::hooks::table_descriptors))
        // Scanners
        .route("/scanners/open", post(handlers::scanners::open))
        .route("/scanners/:id/next", post(handlers::scanners::next))
        .route("/scanners/:id/close", post(handlers::scanners::close))
        // Permissions
        .route("/permissions/check", post(handlers::permissions::check))
        .route("/admin/grant", post(handlers::grants::grant))
        .route("/admin/revoke", post(handlers::grants::revoke))
        // identity 헤더는 호스트 인증 뒤에만 읽음
        .layer(from_fn(middleware::call_identity))
        .layer(from_fn_with_state(state.clone(), auth::host_auth));

    Router::new()
        .merge(guarded)
        // Health check
        .route("/health", get(handlers::health::health_check))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(middleware::request_id))
        // State
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    use super::*;
    use crate::state::tests::test_state;

    fn shutdown_request(api_key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/hooks/cluster")
            .header("content-type", "application/json")
            .header(middleware::USER_HEADER, "root");
        if let Some(key) = api_key {
            builder = builder.header(auth::API_KEY_HEADER, key);
        }
        builder
            .body(Body::from(r#"{"operation":"shutdown"}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn test_identity_header_without_host_key_is_rejected() {
        let (state, _) = test_state();
        let app = create_router(state);

        // super-user 이름을 주장해도 호스트 key 없이는 통과하지 못함
        let response = app.oneshot(shutdown_request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        assert_eq!(body["error"]["message"], "No valid credentials provided");
    }

    #[tokio::test]
    async fn test_wrong_host_key_is_rejected() {
        let (state, _) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(shutdown_request(Some("regionserver:guess")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_host_key_reaches_guard() {
        let (state, _) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(shutdown_request(Some("regionserver:s3cret")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_does_not_require_host_key() {
        let (state, _) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }
}
