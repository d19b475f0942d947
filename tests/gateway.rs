//! End-to-end tests for the main gateway listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::redirect::Policy;
use reqwest::StatusCode;
use web_gateway::auth::token::{seal, SessionKey, Token};
use web_gateway::auth::verifier::MAX_FUTURE_SECS;
use web_gateway::config::GatewayConfig;
use web_gateway::http::{Forwarder, GatewayServer};

mod common;

const SECRET: [u8; 32] = [7u8; 32];

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn session_cookie(expires_at: i64) -> String {
    let token = Token {
        id: "sess-1".to_string(),
        expires_at,
    };
    format!("token={}", seal(&SessionKey::from_bytes(SECRET), &token))
}

fn valid_cookie() -> String {
    session_cookie(unix_now() + 3600)
}

fn base_config(backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backend.internal_addr = backend.to_string();
    config.session.secret = Some(SECRET);
    config.session.strict = true;
    config
}

async fn start_gateway(config: GatewayConfig) -> SocketAddr {
    let config = Arc::new(config);
    let forwarder = Arc::new(Forwarder::new(&config));
    let server = GatewayServer::new(config, forwarder);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    addr
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_get_forwarded_with_valid_cookie() {
    let (backend_addr, backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .get(format!("http://{gateway}/host"))
        .header("Cookie", valid_cookie())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("server").is_none());
    assert_eq!(res.headers().get("x-upstream-extra").unwrap(), "1");
    assert_eq!(res.text().await.unwrap(), "hit GET /host");

    let seen = backend.find("GET", "/host").unwrap();
    assert_eq!(seen.query, None);
    assert!(seen.header("cookie").unwrap().contains("token="));
    assert_eq!(seen.header("gw-forwarded-for").unwrap(), "127.0.0.1");
    assert!(seen
        .header("gw-forwarded-url")
        .unwrap()
        .starts_with("http://127.0.0.1"));
}

#[tokio::test]
async fn test_put_json_canonicalized() {
    let (backend_addr, backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .put(format!("http://{gateway}/host/abc123"))
        .header("Cookie", valid_cookie())
        .header("Content-Type", "application/json")
        .body(r#"{"name":"x","evil":"dropped"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);

    let seen = backend.find("PUT", "/host/abc123").unwrap();
    assert_eq!(seen.header("content-type").unwrap(), "application/json");
    let body = seen.body_str();
    assert!(body.contains(r#""name":"x""#));
    assert!(body.contains(r#""public_address":"""#), "defaults filled: {body}");
    assert!(!body.contains("evil"));
}

#[tokio::test]
async fn test_missing_token_strict() {
    let (backend_addr, backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .get(format!("http://{gateway}/state"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.text().await.unwrap().contains("missing token"));

    // The backend never saw the protected route, but the best-effort
    // session termination arrives shortly after.
    assert!(backend.find("GET", "/state").is_none());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(backend.find("DELETE", "/auth/session").is_some());
}

#[tokio::test]
async fn test_root_redirects_to_login() {
    let (backend_addr, _backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .get(format!("http://{gateway}/"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers().get("location").unwrap(), "/login");
}

#[tokio::test]
async fn test_expired_token() {
    let (backend_addr, backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .get(format!("http://{gateway}/host"))
        .header("Cookie", session_cookie(unix_now() - 1))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.text().await.unwrap().contains("expired"));

    tokio::time::sleep(Duration::from_millis(300)).await;
    let end = backend.find("DELETE", "/auth/session").unwrap();
    assert!(end.header("cookie").unwrap().contains("token="));
}

#[tokio::test]
async fn test_future_dated_token() {
    let (backend_addr, _backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .get(format!("http://{gateway}/host"))
        .header("Cookie", session_cookie(unix_now() + MAX_FUTURE_SECS + 600))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.text().await.unwrap().contains("future-dated"));
}

#[tokio::test]
async fn test_garbage_token() {
    let (backend_addr, _backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .get(format!("http://{gateway}/host"))
        .header("Cookie", "token=@@not-a-token@@")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.text().await.unwrap().contains("decode failure"));
}

#[tokio::test]
async fn test_permissive_mode_forwards_without_cookie() {
    let (backend_addr, backend) = common::start_backend().await;
    let mut config = base_config(backend_addr);
    config.session.strict = false;
    let gateway = start_gateway(config).await;

    let res = client()
        .get(format!("http://{gateway}/host"))
        .header("Auth-Token", "api-key-1")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let seen = backend.find("GET", "/host").unwrap();
    assert_eq!(seen.header("auth-token").unwrap(), "api-key-1");
}

#[tokio::test]
async fn test_header_allow_list() {
    let (backend_addr, backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .get(format!("http://{gateway}/host"))
        .header("Cookie", valid_cookie())
        .header("Csrf-Token", "csrf-1")
        .header("X-Injected", "evil")
        .header("Authorization", "Bearer sneaky")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let seen = backend.find("GET", "/host").unwrap();
    assert_eq!(seen.header("csrf-token").unwrap(), "csrf-1");
    assert!(seen.header("x-injected").is_none());
    assert!(seen.header("authorization").is_none());
}

#[tokio::test]
async fn test_traversal_neutralized() {
    let (backend_addr, backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .get(format!("http://{gateway}/host/..%2F..%2Fsecret"))
        .header("Cookie", valid_cookie())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(backend.find("GET", "/host/secret").is_some());
    for seen in backend.requests() {
        assert!(!seen.path.contains(".."));
    }
}

#[tokio::test]
async fn test_oversized_body_rejected_before_forwarding() {
    let (backend_addr, backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .put(format!("http://{gateway}/host/abc123"))
        .header("Cookie", valid_cookie())
        .header("Content-Type", "application/json")
        .body("x".repeat(60_000))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(backend.find("PUT", "/host/abc123").is_none());
}

#[tokio::test]
async fn test_wrong_content_type() {
    let (backend_addr, backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .put(format!("http://{gateway}/host/abc123"))
        .header("Cookie", valid_cookie())
        .header("Content-Type", "text/plain")
        .body(r#"{"name":"x"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(backend.find("PUT", "/host/abc123").is_none());
}

#[tokio::test]
async fn test_unmatched_route_404() {
    let (backend_addr, backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .get(format!("http://{gateway}/not/a/route"))
        .header("Cookie", valid_cookie())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_backend_status_passthrough() {
    let (backend_addr, _backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .get(format!("http://{gateway}/status"))
        .header("Cookie", valid_cookie())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(res.text().await.unwrap(), "hit GET /status");
}

#[tokio::test]
async fn test_query_allow_list() {
    let (backend_addr, backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .get(format!("http://{gateway}/host?page=2&evil=x"))
        .header("Cookie", valid_cookie())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let seen = backend.find("GET", "/host").unwrap();
    assert_eq!(seen.query.as_deref(), Some("page=2"));
}

#[tokio::test]
async fn test_raw_query_passthrough() {
    let (backend_addr, backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .get(format!(
            "http://{gateway}/sso/callback?code=a&state=b%2Fc"
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let seen = backend.find("GET", "/sso/callback").unwrap();
    assert_eq!(seen.query.as_deref(), Some("code=a&state=b%2Fc"));
}

#[tokio::test]
async fn test_robots_served_locally() {
    let (backend_addr, backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .get(format!("http://{gateway}/robots.txt"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await.unwrap().contains("Disallow: /"));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_https_enforced_behind_proxy() {
    let (backend_addr, backend) = common::start_backend().await;
    let mut config = base_config(backend_addr);
    config.proxy.proto_header = Some("X-Forwarded-Proto".to_string());
    let gateway = start_gateway(config).await;

    let res = client()
        .get(format!("http://{gateway}/host"))
        .header("Cookie", valid_cookie())
        .header("X-Forwarded-Proto", "http")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        res.headers().get("location").unwrap(),
        "https://127.0.0.1/host"
    );
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_link_state_literal_route() {
    let (backend_addr, backend) = common::start_backend().await;
    let gateway = start_gateway(base_config(backend_addr)).await;

    let res = client()
        .put(format!("http://{gateway}/link/state"))
        .header("Content-Type", "application/json")
        .body(r#"{"version":"1.2.0","status":{"h1":"online"}}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let seen = backend.find("PUT", "/link/state").unwrap();
    let body = seen.body_str();
    assert!(body.contains(r#""version":"1.2.0""#));
    assert!(body.contains(r#""h1":"online""#));
}
