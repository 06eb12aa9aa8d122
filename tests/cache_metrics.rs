use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use metrics::Unit;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use time::Duration;
use time::macros::datetime;
use tower::ServiceExt;

use scaffold::application::demo::{CreateDemoCommand, DemoService};
use scaffold::application::identity::IdentityService;
use scaffold::cache::{CacheConfig, EntityCache};
use scaffold::domain::clock::ManualClock;
use scaffold::infra::http::{self, ApiState};
use scaffold::infra::memory::MemoryRepositories;
use scaffold::infra::telemetry;

#[tokio::test]
async fn cache_and_http_paths_emit_expected_counters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debugging recorder should install once per test binary");
    telemetry::describe_metrics();

    let clock = Arc::new(ManualClock::new(datetime!(2024-06-01 12:00:00 UTC)));
    let repos = Arc::new(MemoryRepositories::new());
    let cache = Arc::new(EntityCache::new(&CacheConfig::default(), clock.clone()));
    let demo = Arc::new(DemoService::new(
        repos.clone(),
        repos,
        clock.clone(),
        cache,
        100,
    ));
    let record = demo
        .create(CreateDemoCommand {
            name: Some("Alice".into()),
            age: None,
        })
        .await
        .expect("create");

    // miss, hit, then expired + miss after the TTL.
    demo.find_cached(record.id()).await.expect("miss");
    demo.find_cached(record.id()).await.expect("hit");
    clock.advance(Duration::seconds(181));
    demo.find_cached(record.id()).await.expect("expired");

    let app = http::build_router(ApiState {
        demo,
        identity: Arc::new(IdentityService::new(
            "demo",
            Duration::days(1),
            clock.clone(),
        )),
        cookie_key: http::signing_key(None),
        production: false,
    });
    for (uri, expected) in [
        ("/health", StatusCode::NO_CONTENT),
        ("/api/demo/identity", StatusCode::UNAUTHORIZED),
    ] {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request should build");
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        assert_eq!(response.status(), expected);
    }

    let mut counters: HashMap<String, u64> = HashMap::new();
    let mut units: HashMap<String, Option<Unit>> = HashMap::new();
    for (composite_key, unit, _, value) in snapshotter.snapshot().into_vec() {
        let key = composite_key.key();
        let mut name = key.name().to_string();
        for label in key.labels() {
            name.push_str(&format!("[{}={}]", label.key(), label.value()));
        }
        if let DebugValue::Counter(count) = value {
            units.insert(name.clone(), unit);
            counters.insert(name, count);
        }
    }

    assert_eq!(counters.get("scaffold_cache_miss_total"), Some(&2));
    assert_eq!(counters.get("scaffold_cache_hit_total"), Some(&1));
    assert_eq!(counters.get("scaffold_cache_expired_total"), Some(&1));
    assert_eq!(
        counters.get("scaffold_http_responses_total[class=2xx]"),
        Some(&1)
    );
    assert_eq!(
        counters.get("scaffold_http_responses_total[class=4xx]"),
        Some(&1)
    );
    assert_eq!(
        units.get("scaffold_cache_hit_total"),
        Some(&Some(Unit::Count))
    );
}
