//! Router-level tests for the query relay, with wiremock standing in for the daemon.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use hmsconsole_common::{DaemonReply, DatabaseDescriptor};
use hmsconsole_config::DaemonConfig;
use hmsconsole_web::{
    proxy::QueryProxy,
    router::build_router,
    state::AppState,
    supervisor::DaemonSupervisor,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(endpoint: String, timeout: Duration, static_dir: &std::path::Path) -> Router {
    let proxy = QueryProxy::new(endpoint, timeout).unwrap();
    let supervisor = Arc::new(DaemonSupervisor::new(DaemonConfig::default()));
    build_router(AppState::new(proxy, supervisor), static_dir)
}

fn daemon_app(server: &MockServer) -> Router {
    app(format!("{}/query", server.uri()), Duration::from_secs(5), std::path::Path::new("static"))
}

async fn post_query(app: &Router, query: &str) -> (StatusCode, Value) {
    let request = Request::post("/query")
        .header("content-type", "text/plain")
        .body(Body::from(query.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_create_then_list_databases() {
    let daemon = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_string("CREATE DATABASE shop;"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&daemon)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_string("\\dc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "databases": [{"name": "shop", "tables": []}]
        })))
        .expect(1)
        .mount(&daemon)
        .await;

    let app = daemon_app(&daemon);

    let (status, body) = post_query(&app, "CREATE DATABASE shop;").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "success"}));

    let (status, body) = post_query(&app, "\\dc").await;
    assert_eq!(status, StatusCode::OK);
    let DaemonReply::Listing(databases) = DaemonReply::from_value(body) else {
        panic!("expected a database listing");
    };
    let shops: Vec<&DatabaseDescriptor> = databases.iter().filter(|d| d.name == "shop").collect();
    assert_eq!(shops, vec![&DatabaseDescriptor { name: "shop".into(), tables: vec![] }]);
}

#[tokio::test]
async fn test_daemon_query_error_passes_through() {
    let daemon = MockServer::start().await;
    let reply = json!({"status": "error", "message": "Table missing_table does not exist"});
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply.clone()))
        .mount(&daemon)
        .await;

    let (status, body) = post_query(&daemon_app(&daemon), "SELECT * FROM missing_table;").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, reply);
}

#[tokio::test]
async fn test_daemon_status_code_is_relayed() {
    let daemon = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"status": "error", "message": "syntax"})),
        )
        .mount(&daemon)
        .await;

    let (status, body) = post_query(&daemon_app(&daemon), "SELEKT;").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "syntax");
}

#[tokio::test]
async fn test_unreachable_daemon_is_500_with_message() {
    // Grab a free port and release it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = app(
        format!("http://{addr}/query"),
        Duration::from_secs(2),
        std::path::Path::new("static"),
    );
    let (status, body) = post_query(&app, "\\dc").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().starts_with("Daemon unreachable"));
}

#[tokio::test]
async fn test_non_json_reply_is_500() {
    let daemon = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&daemon)
        .await;

    let (status, body) = post_query(&daemon_app(&daemon), "\\dt").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("not JSON"));
}

#[tokio::test]
async fn test_hung_daemon_times_out() {
    let daemon = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "success"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&daemon)
        .await;

    let app = app(
        format!("{}/query", daemon.uri()),
        Duration::from_millis(200),
        std::path::Path::new("static"),
    );
    let (status, body) = post_query(&app, "SELECT * FROM t;").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["message"].as_str().unwrap().contains("did not answer"));
}

#[tokio::test]
async fn test_health_reports_daemon_state() {
    let daemon = MockServer::start().await;
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let response = daemon_app(&daemon).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"status": "ok", "daemon": "stopped"}));
}

#[tokio::test]
async fn test_static_assets_are_served() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>console</h1>").unwrap();
    let app = app("http://127.0.0.1:9/query".into(), Duration::from_secs(1), dir.path());

    let response = app
        .oneshot(Request::get("/index.html").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"<h1>console</h1>");
}
