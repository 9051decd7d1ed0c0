//! Integration tests for the resilient fetcher against a mock server

use crate::common::RecordingPacer;
use press_harvest::config::{NetworkConfig, RetryConfig};
use press_harvest::crawler::{build_http_client, FetchOptions, ResilientFetcher, RetryPolicy};
use press_harvest::FetchError;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(retry: RetryConfig) -> (ResilientFetcher, Arc<RecordingPacer>) {
    fetcher_with(&NetworkConfig::default(), retry)
}

fn fetcher_with(network: &NetworkConfig, retry: RetryConfig) -> (ResilientFetcher, Arc<RecordingPacer>) {
    let pacer = Arc::new(RecordingPacer::default());
    let client = build_http_client(network).unwrap();
    let fetcher = ResilientFetcher::new(client, RetryPolicy::from_config(&retry), pacer.clone());
    (fetcher, pacer)
}

fn no_jitter() -> RetryConfig {
    RetryConfig {
        jitter_max: 0.0,
        ..Default::default()
    }
}

fn options() -> FetchOptions {
    FetchOptions::new(Duration::from_secs(5))
}

#[tokio::test]
async fn test_server_errors_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, pacer) = fetcher(no_jitter());
    let document = fetcher
        .fetch(&format!("{}/flaky", server.uri()), options())
        .await
        .unwrap();

    assert_eq!(document.status, 200);
    assert_eq!(document.text(), "finally");
    assert_eq!(
        pacer.pauses(),
        vec![
            Duration::from_secs_f64(3.5),
            Duration::from_secs_f64(7.0),
            Duration::from_secs_f64(14.0)
        ]
    );
    assert_eq!(pacer.total(), Duration::from_secs_f64(24.5));
}

#[tokio::test]
async fn test_not_found_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, pacer) = fetcher(no_jitter());
    let result = fetcher
        .fetch(&format!("{}/gone", server.uri()), options())
        .await;

    match result {
        Err(FetchError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected status error, got {:?}", other),
    }
    assert!(pacer.pauses().is_empty());
}

#[tokio::test]
async fn test_rate_limit_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let (fetcher, pacer) = fetcher(no_jitter());
    let result = fetcher
        .fetch(&format!("{}/busy", server.uri()), options())
        .await;

    match result {
        Err(err @ FetchError::RetriesExhausted { .. }) => {
            assert!(err.is_transient());
            if let FetchError::RetriesExhausted { attempts, last, .. } = err {
                assert_eq!(attempts, 4);
                assert_eq!(last, "HTTP 429");
            }
        }
        other => panic!("expected exhausted retries, got {:?}", other),
    }
    // No wait after the final attempt
    assert_eq!(pacer.pauses().len(), 3);
}

#[tokio::test]
async fn test_timeout_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(2)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_string("on time"))
        .mount(&server)
        .await;

    let (fetcher, pacer) = fetcher(no_jitter());
    let document = fetcher
        .fetch(
            &format!("{}/slow", server.uri()),
            FetchOptions::new(Duration::from_millis(200)),
        )
        .await
        .unwrap();

    assert_eq!(document.text(), "on time");
    assert_eq!(pacer.pauses(), vec![Duration::from_secs_f64(3.5)]);
}

#[tokio::test]
async fn test_polite_fetch_waits_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let (fetcher, pacer) = fetcher(no_jitter());
    fetcher
        .fetch(&format!("{}/listing", server.uri()), options().polite(true))
        .await
        .unwrap();

    let pauses = pacer.pauses();
    assert_eq!(pauses.len(), 1);
    assert!(pauses[0] >= Duration::from_secs_f64(3.5));
    assert!(pauses[0] <= Duration::from_secs_f64(10.0));
}

#[tokio::test]
async fn test_requests_carry_user_agent() {
    let server = MockServer::start().await;
    let network = NetworkConfig {
        user_agent: "press-harvest-test/1.0".to_string(),
        ..Default::default()
    };
    Mock::given(method("GET"))
        .and(path("/ua"))
        .and(header("user-agent", network.user_agent.as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, _pacer) = fetcher_with(&network, no_jitter());
    let document = fetcher
        .fetch(&format!("{}/ua", server.uri()), options())
        .await
        .unwrap();
    assert_eq!(document.status, 200);
}
