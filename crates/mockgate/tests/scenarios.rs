//! End-to-end scenarios through the tower layer and the `stub` wrapper.

use bytes::Bytes;
use futures::future::join_all;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use mockgate::{
    stub, stub_with, Fixture, MatchStrategy, MockClient, MockConfig, MockError, MockLayer,
    MockService, Offline, ResponseCode, ResponseSpec, ResponseStrategy, ScopeKey, ScopeRegistry,
    UnmatchedPolicy,
};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::{service_fn, Layer, ServiceExt};

const A: &str = "https://x.test/a";
const B: &str = "https://x.test/b";

fn registry() -> Arc<ScopeRegistry> {
    mockgate::init_test_tracing();
    Arc::new(ScopeRegistry::default())
}

fn lenient_registry() -> Arc<ScopeRegistry> {
    mockgate::init_test_tracing();
    Arc::new(ScopeRegistry::new(
        MockConfig::default().with_unmatched_policy(UnmatchedPolicy::Error),
    ))
}

#[tokio::test]
async fn test_scenario_a_single_exact_empty() {
    let registry = registry();

    let report = stub(
        &registry,
        ResponseStrategy::single(
            MatchStrategy::exact(A),
            ResponseSpec::Empty(ResponseCode::NotFound),
        ),
        |client| async move {
            let response = client.get(A).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert!(response.body().is_empty());
        },
    )
    .await;

    assert_eq!(report.total_executed, 1);
    report.assert_all_matched();
}

#[tokio::test]
async fn test_scenario_b_group_of_exact_rules() {
    let registry = registry();

    let report = stub(
        &registry,
        ResponseStrategy::group([
            (MatchStrategy::exact(A), ResponseSpec::Empty(ResponseCode::Ok)),
            (
                MatchStrategy::exact(B),
                ResponseSpec::Empty(ResponseCode::NotFound),
            ),
        ]),
        |client| async move {
            assert_eq!(client.get(A).await.unwrap().status(), StatusCode::OK);
            assert_eq!(client.get(B).await.unwrap().status(), StatusCode::NOT_FOUND);
        },
    )
    .await;

    assert_eq!(report.requests.len(), 2);
    assert_eq!(report.total_executed, 2);
    assert_eq!(report.executions(&MatchStrategy::exact(A)), 1);
    assert_eq!(report.executions(&MatchStrategy::exact(B)), 1);
}

#[tokio::test]
async fn test_scenario_c_payload_bytes_are_exact() {
    let registry = registry();

    stub(
        &registry,
        ResponseStrategy::single(
            MatchStrategy::exact(A),
            ResponseSpec::payload(ResponseCode::Accepted, "test"),
        ),
        |client| async move {
            let response = client.get(A).await.unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
            assert_eq!(response.body(), &Bytes::from_static(b"test"));
        },
    )
    .await;
}

#[tokio::test]
async fn test_scenario_d_pattern_failure() {
    let registry = registry();

    let report = stub(
        &registry,
        ResponseStrategy::single(
            MatchStrategy::pattern(r"https:\/\/sample\.com\/product\/\d+"),
            ResponseSpec::failure("com.example", -1001),
        ),
        |client| async move {
            let error = client.get("https://sample.com/product/1").await.unwrap_err();
            assert_eq!(error.code(), Some(-1001));
        },
    )
    .await;

    assert_eq!(report.total_executed, 1);
}

#[tokio::test]
async fn test_overlapping_group_counts_every_matching_rule() {
    let registry = registry();
    let exact = MatchStrategy::exact(A);
    let pattern = MatchStrategy::pattern(r"x\.test/");

    let report = stub(
        &registry,
        ResponseStrategy::group([
            (exact.clone(), ResponseSpec::Empty(ResponseCode::Created)),
            (pattern.clone(), ResponseSpec::Empty(ResponseCode::Accepted)),
        ]),
        |client| async move {
            // First registered rule answers
            assert_eq!(client.get(A).await.unwrap().status(), StatusCode::CREATED);
            assert_eq!(client.get(B).await.unwrap().status(), StatusCode::ACCEPTED);
        },
    )
    .await;

    assert_eq!(report.requests.len(), 2);
    assert_eq!(report.executions(&exact), 1);
    assert_eq!(report.executions(&pattern), 2);
    assert_eq!(report.total_executed, 3);
}

#[tokio::test]
async fn test_requests_are_reported_in_issue_order() {
    let registry = registry();
    let urls = [
        "https://x.test/1",
        "https://x.test/2?q=a",
        "https://x.test/3",
    ];

    let report = stub(
        &registry,
        ResponseStrategy::single(
            MatchStrategy::pattern(r"x\.test/\d"),
            ResponseSpec::Empty(ResponseCode::NoContent),
        ),
        |client| async move {
            for url in urls {
                client.get(url).await.unwrap();
            }
        },
    )
    .await;

    let seen: Vec<&str> = report.requests.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(seen, urls);
    assert!(report
        .requests
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
}

#[tokio::test]
async fn test_concurrent_requests_are_all_counted() {
    let registry = registry();
    let rule = MatchStrategy::pattern(r"x\.test/item/\d+");

    let report = stub(
        &registry,
        ResponseStrategy::single(rule.clone(), ResponseSpec::Empty(ResponseCode::Ok)),
        |client| async move {
            let requests = (0..32).map(|i| {
                let client = client.clone();
                async move { client.get(&format!("https://x.test/item/{i}")).await }
            });
            for result in join_all(requests).await {
                assert_eq!(result.unwrap().status(), StatusCode::OK);
            }
        },
    )
    .await;

    assert_eq!(report.requests.len(), 32);
    assert_eq!(report.executions(&rule), 32);
    assert_eq!(report.total_executed, 32);
}

#[tokio::test]
async fn test_concurrent_scopes_do_not_share_state() {
    let registry = registry();

    let first = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            stub(
                &registry,
                ResponseStrategy::single(
                    MatchStrategy::exact(A),
                    ResponseSpec::Empty(ResponseCode::Ok),
                ),
                |client| async move {
                    for _ in 0..5 {
                        client.get(A).await.unwrap();
                    }
                },
            )
            .await
        })
    };
    let second = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            stub(
                &registry,
                ResponseStrategy::single(
                    MatchStrategy::exact(A),
                    ResponseSpec::Empty(ResponseCode::NotFound),
                ),
                |client| async move {
                    let response = client.get(A).await.unwrap();
                    assert_eq!(response.status(), StatusCode::NOT_FOUND);
                },
            )
            .await
        })
    };

    let (first, second) = (first.await.unwrap(), second.await.unwrap());
    assert_eq!(first.requests.len(), 5);
    assert_eq!(second.requests.len(), 1);
    assert_eq!(registry.active_scopes(), 0);
}

#[tokio::test]
async fn test_invalid_pattern_does_not_break_the_group() {
    let registry = registry();
    let broken = MatchStrategy::pattern("(unclosed");

    let report = stub(
        &registry,
        ResponseStrategy::group([
            (broken.clone(), ResponseSpec::Empty(ResponseCode::Ok)),
            (
                MatchStrategy::exact(A),
                ResponseSpec::Empty(ResponseCode::Forbidden),
            ),
        ]),
        |client| async move {
            assert_eq!(client.get(A).await.unwrap().status(), StatusCode::FORBIDDEN);
        },
    )
    .await;

    assert_eq!(report.executions(&broken), 0);
    assert_eq!(report.total_executed, 1);
}

#[tokio::test]
async fn test_unmatched_request_fails_fast_without_passthrough() {
    let registry = lenient_registry();

    let report = stub(
        &registry,
        ResponseStrategy::single(
            MatchStrategy::exact(A),
            ResponseSpec::Empty(ResponseCode::Ok),
        ),
        |client| async move {
            let error = client.get(B).await.unwrap_err();
            assert!(matches!(error, MockError::Unmatched { ref url, .. } if url == B));
        },
    )
    .await;

    assert_eq!(report.requests.len(), 1);
    assert_eq!(report.total_executed, 0);
    assert_eq!(report.unmatched.len(), 1);
}

#[tokio::test]
async fn test_unmatched_pattern_rule_fails_fast_without_passthrough() {
    let registry = lenient_registry();
    let reached = Arc::new(AtomicUsize::new(0));
    let inner = {
        let reached = Arc::clone(&reached);
        service_fn(move |_request: Request<Full<Bytes>>| {
            reached.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(b"real")))) }
        })
    };
    let product = MatchStrategy::pattern(r"sample\.com/product/\d+");

    let report = stub_with(
        &registry,
        inner,
        ResponseStrategy::single(product.clone(), ResponseSpec::Empty(ResponseCode::Ok)),
        |client| async move {
            let error = client
                .get("https://sample.com/product/abc")
                .await
                .unwrap_err();
            assert!(matches!(
                error,
                MockError::Unmatched { ref url, .. } if url == "https://sample.com/product/abc"
            ));
        },
    )
    .await;

    assert_eq!(reached.load(Ordering::SeqCst), 0);
    assert_eq!(report.unmatched.len(), 1);
    assert_eq!(report.executions(&product), 0);
    assert_eq!(report.requests.len(), 1);
}

#[tokio::test]
#[should_panic(expected = "no mock registered for GET https://x.test/b")]
async fn test_unmatched_request_panics_by_default() {
    let registry = registry();

    stub(
        &registry,
        ResponseStrategy::single(
            MatchStrategy::exact(A),
            ResponseSpec::Empty(ResponseCode::Ok),
        ),
        |client| async move {
            let _ = client.get(B).await;
        },
    )
    .await;
}

#[tokio::test]
#[should_panic(expected = "1 request(s) had no matching mock")]
async fn test_assert_all_matched_reports_misses() {
    let registry = lenient_registry();

    let report = stub(
        &registry,
        ResponseStrategy::single(
            MatchStrategy::exact(A),
            ResponseSpec::Empty(ResponseCode::Ok),
        ),
        |client| async move {
            client.get(A).await.unwrap();
            let _ = client.get(B).await;
        },
    )
    .await;

    report.assert_all_matched();
}

#[tokio::test]
async fn test_close_is_idempotent_and_stops_interception() {
    let registry = registry();
    let handle = registry.open_scope(ResponseStrategy::single(
        MatchStrategy::exact(A),
        ResponseSpec::Empty(ResponseCode::Ok),
    ));
    let client = MockClient::for_scope(&registry, Offline, &handle);

    client.get(A).await.unwrap();
    let closed = registry.close(handle.key());
    assert_eq!(closed.map(|report| report.total_executed), Some(1));
    assert!(registry.close(handle.key()).is_none());
    registry.close_scope(&handle);

    // Behaves like an unregistered key: passes through to the inner service
    let error = client.get(A).await.unwrap_err();
    assert!(matches!(error, MockError::Offline { .. }));
    assert_eq!(registry.report(&handle).requests.len(), 1);
}

#[tokio::test]
async fn test_registries_are_isolated() {
    let first = registry();
    let second = registry();
    let key = ScopeKey::new("shared-key");

    let handle = first.open(
        key.clone(),
        ResponseStrategy::single(
            MatchStrategy::exact(A),
            ResponseSpec::Empty(ResponseCode::Ok),
        ),
    );
    let client = MockClient::new(MockService::new(Arc::clone(&second), Offline), key);

    assert!(matches!(
        client.get(A).await.unwrap_err(),
        MockError::Offline { .. }
    ));
    assert!(handle.report().requests.is_empty());
}

#[tokio::test]
async fn test_unkeyed_traffic_reaches_the_inner_service() {
    let registry = registry();
    registry.open(
        "scope",
        ResponseStrategy::single(
            MatchStrategy::exact(A),
            ResponseSpec::Empty(ResponseCode::NotFound),
        ),
    );
    let inner = service_fn(|_request: Request<Full<Bytes>>| async {
        Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(b"real"))))
    });
    let service = MockLayer::new(Arc::clone(&registry)).layer(inner);

    let response = service
        .oneshot(Request::get(A).body(Bytes::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, Bytes::from_static(b"real"));
}

#[tokio::test]
async fn test_custom_header_and_body_recording_config() {
    mockgate::init_test_tracing();
    let registry = Arc::new(ScopeRegistry::new(
        MockConfig::default()
            .with_header("x-test-scope")
            .with_record_bodies(false),
    ));

    let report = stub_with(
        &registry,
        Offline,
        ResponseStrategy::single(
            MatchStrategy::exact(A),
            ResponseSpec::Empty(ResponseCode::Created),
        ),
        |client| async move {
            client.post(A, "secret").await.unwrap();
        },
    )
    .await;

    let request = &report.requests[0];
    assert!(request.header("x-test-scope").is_some());
    assert!(request.header("mockgate-id").is_none());
    assert_eq!(request.body, None);
}

#[tokio::test]
async fn test_fixture_driven_scope() {
    let fixture = Fixture::from_file(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/catalog.yaml"
    ))
    .unwrap();
    let registry = registry();

    let report = stub(&registry, fixture.into_strategy(), |client| async move {
        let catalog = client.get("https://shop.test/catalog").await.unwrap();
        assert_eq!(catalog.status(), StatusCode::OK);
        assert_eq!(catalog.body(), &Bytes::from_static(b"{\"products\":[1,2]}"));

        let product = client.get("https://shop.test/product/7").await.unwrap();
        assert_eq!(product.status(), StatusCode::ACCEPTED);
        assert_eq!(product.body(), &Bytes::from_static(b"test"));

        let error = client.post("https://shop.test/checkout", "{}").await.unwrap_err();
        let failure = error.failure().unwrap();
        assert_eq!(failure.code, -1009);
        assert_eq!(failure.domain, "com.example.shop");
        assert_eq!(failure.message.as_deref(), Some("offline"));
    })
    .await;

    assert_eq!(report.requests.len(), 3);
    assert_eq!(report.total_executed, 3);
}
