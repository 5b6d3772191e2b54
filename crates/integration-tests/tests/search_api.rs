//! End to end: crawl a scripted network, then hit the search API over
//! the same in-memory backends.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use api_adapters::handlers::{router, ApiState, ProviderInfo};
use api_adapters::metrics::Metrics;
use domains::models::PeerId;
use integration_tests::{
    detail, pipeline, profile, summary, FixedRates, MemoryIndex, MemoryPeerStore, ScriptedGateway,
};

fn peer(id: &str) -> PeerId {
    PeerId::from(id)
}

async fn crawled_backends() -> (Arc<MemoryPeerStore>, Arc<MemoryIndex>) {
    let gateway = ScriptedGateway {
        connected: vec![peer("QmVendor")],
        profiles: HashMap::from([(peer("QmVendor"), profile("Walnut Works"))]),
        indexes: HashMap::from([(
            peer("QmVendor"),
            vec![summary("QmPlane", "Walnut plane"), summary("QmChisel", "Paring chisel")],
        )]),
        details: HashMap::from([
            ((peer("QmVendor"), "QmPlane".to_owned()), detail("USD", 1_000)),
            ((peer("QmVendor"), "QmChisel".to_owned()), detail("USD", 2_500)),
        ]),
        ..ScriptedGateway::default()
    };
    let (discovery, ingest, store, index) = pipeline(
        Arc::new(gateway),
        Arc::new(FixedRates::new(&[("USD", 0.00005)])),
    );
    discovery.connected_pass().await;
    ingest.fresh_pass().await;
    (store, index)
}

fn api(store: Arc<MemoryPeerStore>, index: Arc<MemoryIndex>) -> axum::Router {
    router(ApiState {
        index,
        store,
        provider: Arc::new(ProviderInfo {
            name: "Souk Search".into(),
            logo_url: "https://souk.example/logo.png".into(),
            listings_url: "https://souk.example/".into(),
            reports_url: "https://souk.example/reports".into(),
        }),
        metrics: Arc::new(Metrics::new()),
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn test_crawled_listings_are_searchable() {
    let (store, index) = crawled_backends().await;
    let app = api(store, index);

    let response = app
        .oneshot(
            Request::get("/?q=walnut&ps=10")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["results"]["total"], 1);
    let first = &body["results"]["results"][0];
    assert_eq!(first["data"]["title"], "Walnut plane");
    assert_eq!(first["relationships"]["vendor"]["data"]["name"], "Walnut Works");
}

#[tokio::test]
async fn test_price_sort_orders_satoshi_prices() {
    let (store, index) = crawled_backends().await;
    let app = api(store, index);

    let response = app
        .oneshot(
            Request::get("/?ps=10&sortBy=price-desc")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let body = body_json(response).await;

    let results = body["results"]["results"].as_array().expect("results");
    assert_eq!(results.len(), 2);
    // 2500 cents beats 1000 cents once both are satoshis.
    assert_eq!(results[0]["data"]["title"], "Paring chisel");
    assert_eq!(results[1]["data"]["title"], "Walnut plane");
}

#[tokio::test]
async fn test_report_lands_in_the_store() {
    let (store, index) = crawled_backends().await;
    let app = api(store.clone(), index);

    let response = app
        .oneshot(
            Request::post("/reports")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"peerId": "QmVendor", "slug": "walnut-plane", "reason": "counterfeit"})
                        .to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::CREATED);
    let reports = store.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].peer_id, peer("QmVendor"));
    assert_eq!(reports[0].reason, "counterfeit");
}

#[tokio::test]
async fn test_stats_reflect_the_crawl() {
    let (store, index) = crawled_backends().await;
    let app = api(store, index);

    let response = app
        .oneshot(Request::get("/stats").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let body = body_json(response).await;

    assert_eq!(body["peers"], 1);
    assert_eq!(body["listings"], 2);
}
