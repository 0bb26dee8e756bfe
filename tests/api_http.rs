// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /youtube/{channel_id} (headers + filtered body)
// - upstream failure → 404 "Not found"
// - unknown routes → 404 "Not found"

mod common;

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt as _; // for `oneshot`

use common::{titles, MockResolver, StaticFetcher, FIXTURE_FEED};
use feed_enricher::cache::MemoryStore;
use feed_enricher::{api, AppState, Enricher, FeedPipeline, FilterPolicy};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn test_router(fetcher: StaticFetcher, resolver: MockResolver) -> Router {
    let enricher = Enricher::new(Arc::new(MemoryStore::new()), Arc::new(resolver));
    let pipeline = FeedPipeline::new(Arc::new(fetcher), enricher, FilterPolicy::default());
    api::router(AppState::new(pipeline, 3600))
}

fn fixture_router() -> Router {
    test_router(
        StaticFetcher::ok(FIXTURE_FEED),
        MockResolver::with(&[("LongVideo01", 1234), ("ShortClip01", 41)]),
    )
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    String::from_utf8(bytes).expect("utf8")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let resp = fixture_router().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");
    assert_eq!(body_text(resp).await.trim(), "ok");
}

#[tokio::test]
async fn channel_feed_is_filtered_with_cache_headers() {
    let resp = fixture_router()
        .oneshot(get("/youtube/UCfixture000000000000000"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let headers = resp.headers().clone();
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "application/atom+xml; charset=UTF-8",
        "upstream content type is echoed"
    );
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=3600"
    );

    let body = body_text(resp).await;
    assert!(body.starts_with("<?xml"), "prolog survives");
    assert_eq!(
        titles(&body),
        vec![
            "A proper long-form video",
            "Premiere, duration not published yet",
            "Community post without a video",
        ]
    );
}

#[tokio::test]
async fn missing_upstream_content_type_defaults_to_text_xml() {
    let mut fetcher = StaticFetcher::ok(common::atom_feed(&[(None, "only")]));
    fetcher.content_type = None;
    let resp = test_router(fetcher, MockResolver::default())
        .oneshot(get("/youtube/UCx"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "text/xml");
}

#[tokio::test]
async fn upstream_failure_maps_to_plain_404() {
    let resp = test_router(StaticFetcher::failing(500), MockResolver::default())
        .oneshot(get("/youtube/UCgone"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    assert_eq!(body_text(resp).await, "Not found");
}

#[tokio::test]
async fn resolver_outage_still_serves_the_feed() {
    let resolver = MockResolver::default().failing_for(&["LongVideo01"]);
    let resp = test_router(StaticFetcher::ok(FIXTURE_FEED), resolver)
        .oneshot(get("/youtube/UCfixture000000000000000"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // the whole chunk failed, so nothing is known and nothing is dropped
    assert_eq!(titles(&body_text(resp).await).len(), 4);
}

#[tokio::test]
async fn unknown_routes_are_404() {
    for uri in ["/", "/youtube", "/vimeo/abc", "/youtube/a/b"] {
        let resp = fixture_router().oneshot(get(uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body_text(resp).await, "Not found", "{uri}");
    }
}
