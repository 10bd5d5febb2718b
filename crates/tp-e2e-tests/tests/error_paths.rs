//! E2E tests for transport failures, retries, deadlines and concurrency.

mod helpers;

use std::time::Duration;

use helpers::TestBackend;
use tp_ai_service::{AiError, AiService, ErrorKind, ServiceConfig};
use tp_protocol::{ActionType, FailureCategory};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

/// Two 503s then success: the call succeeds on the third attempt.
#[tokio::test]
async fn e2e_upstream_errors_are_retried() {
    let backend = TestBackend::start().await;
    backend.fail_next(503, 2).await;
    backend
        .reply_with(r#"{"action":"click","target":"Login button"}"#)
        .await;

    let action = backend
        .service()
        .parse_command("click on Login button")
        .await
        .unwrap();

    assert_eq!(action.action_type, ActionType::Click);
    assert_eq!(backend.request_count().await, 3);
}

/// Rate limiting is retried too.
#[tokio::test]
async fn e2e_rate_limit_is_retried() {
    let backend = TestBackend::start().await;
    backend.fail_next(429, 1).await;
    backend
        .reply_with(r#"{"category":"environment","explanation":"server down"}"#)
        .await;

    let report = backend
        .service()
        .diagnose("502 Bad Gateway", None)
        .await
        .unwrap();

    assert_eq!(report.category, FailureCategory::Environment);
    assert_eq!(backend.request_count().await, 2);
}

/// Persistent 5xx surfaces as `Upstream` after exactly three attempts.
#[tokio::test]
async fn e2e_upstream_retries_exhausted() {
    let backend = TestBackend::start().await;
    backend.fail_next(500, 10).await;

    let err = backend
        .service()
        .parse_command("click on Login button")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert_eq!(backend.request_count().await, 3);
}

/// A rejected credential fails once, immediately, with `Auth`.
#[tokio::test]
async fn e2e_auth_error_not_retried() {
    let backend = TestBackend::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(header("authorization", "Bearer wrong-key"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&backend.server)
        .await;

    let err = backend
        .service_with_key("wrong-key")
        .diagnose("Element not found: Login button", None)
        .await
        .unwrap_err();

    assert_eq!(err, AiError::Auth { status: 401 });
    assert_eq!(backend.request_count().await, 1);
}

/// Blank inputs fail with `InvalidInput` and never touch the network.
#[tokio::test]
async fn e2e_blank_input_makes_no_request() {
    let backend = TestBackend::start().await;
    backend.reply_with("{}").await;
    let service = backend.service();

    let err = service.parse_command("   ").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = service.diagnose("", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert_eq!(backend.request_count().await, 0);
}

/// A hung backend is cut off by the deadline, retried, then reported.
#[tokio::test]
async fn e2e_hung_backend_times_out() {
    let backend = TestBackend::start().await;
    backend.stall(Duration::from_secs(10)).await;

    let mut config = backend.config(None);
    config.timeout_secs = 1;
    config.retry.max_attempts = 2;
    let service = AiService::new(config).unwrap();

    let started = std::time::Instant::now();
    let err = service.parse_command("click on Login button").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(backend.request_count().await, 2);
}

/// Nothing listening: `Connection`, no retry.
#[tokio::test]
async fn e2e_unreachable_backend() {
    let config = ServiceConfig::new("http://127.0.0.1:9", "llama3.2", None);
    let service = AiService::new(config).unwrap();

    let err = service
        .parse_command("click on Login button")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(!err.is_retryable());
}

/// Dropping a pending call releases it; the service keeps working.
#[tokio::test]
async fn e2e_abandoned_call_does_not_poison_service() {
    let backend = TestBackend::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(helpers::ollama_response(r#"{"action":"wait","target":"page"}"#))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&backend.server)
        .await;
    let service = backend.service();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), service.parse_command("wait")).await;
    assert!(abandoned.is_err(), "caller-side timeout should fire first");

    let action = service.parse_command("wait").await.unwrap();
    assert_eq!(action.action_type, ActionType::Wait);
}

/// Many concurrent calls against one shared service all succeed.
#[tokio::test]
async fn e2e_concurrent_calls_share_service() {
    let backend = TestBackend::start().await;
    backend
        .reply_with(r#"{"action":"click","target":"Login button","category":"timing","explanation":"slow"}"#)
        .await;
    let service = backend.service();

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                service
                    .parse_command("click on Login button")
                    .await
                    .map(|a| a.action_type == ActionType::Click)
            } else {
                service
                    .diagnose("Timed out", None)
                    .await
                    .map(|r| r.category == FailureCategory::Timing)
            }
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }
    assert_eq!(backend.request_count().await, 8);
}
