//! # Souk node gateway
//!
//! HTTP adapter over the local node's REST API. Every call funnels
//! through [`NodeGateway::call`], which holds a semaphore permit for
//! the duration of the request and classifies the outcome into exactly
//! one [`GatewayError`] variant or a decoded JSON body.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use domains::error::{GatewayError, GatewayResult};
use domains::models::{ListingDetail, ListingSummary, NodeInfo, PeerId, PeerProfile};
use domains::ports::PeerGateway;

/// Connection settings for the local node, resolved by the binary.
#[derive(Debug, Clone)]
pub struct NodeGatewayConfig {
    pub base_url: String,
    pub username: String,
    pub password: SecretString,
    pub timeout: Duration,
}

pub struct NodeGateway {
    http: reqwest::Client,
    base: String,
    username: String,
    password: SecretString,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl NodeGateway {
    pub fn new(http: reqwest::Client, config: NodeGatewayConfig, permits: Arc<Semaphore>) -> Self {
        Self {
            http,
            base: config.base_url.trim_end_matches('/').to_owned(),
            username: config.username,
            password: config.password,
            timeout: config.timeout,
            permits,
        }
    }

    /// Probes the peers endpoint until the node answers, sleeping a
    /// uniform 1-5s between attempts. Returns whether it ever answered.
    pub async fn wait_until_reachable(&self, attempts: u32) -> bool {
        for attempt in 1..=attempts {
            match self.call("/net/peers").await {
                Ok(_) => {
                    info!(attempt, "node gateway reachable");
                    return true;
                }
                Err(e) => warn!(attempt, error = %e, "node gateway not reachable"),
            }
            if attempt < attempts {
                tokio::time::sleep(probe_jitter()).await;
            }
        }
        false
    }

    async fn call(&self, path: &str) -> GatewayResult<Value> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GatewayError::Transport("request limiter closed".into()))?;

        let url = format!("{}{}", self.base, path);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify)?;

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Malformed(e.to_string())
            }
        })?;

        // The node wraps errors in a failure envelope instead of using
        // HTTP status codes.
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            let reason = body
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unspecified")
                .to_owned();
            return Err(GatewayError::Application(reason));
        }

        Ok(body)
    }

    async fn peer_list_leg(&self, path: &str) -> Vec<PeerId> {
        match self.call(path).await {
            Ok(body) => peer_list(body),
            Err(e) => {
                debug!(path, error = %e, "peer list leg failed");
                Vec::new()
            }
        }
    }
}

fn classify(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

fn probe_jitter() -> Duration {
    Duration::from_millis(rand::rng().random_range(1_000..=5_000))
}

/// Anything that is not an array of strings normalizes to empty;
/// non-string entries are dropped.
fn peer_list(body: Value) -> Vec<PeerId> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(id) => Some(PeerId::new(id)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn union(legs: Vec<Vec<PeerId>>) -> Vec<PeerId> {
    let mut peers = std::collections::BTreeSet::new();
    for leg in legs {
        peers.extend(leg);
    }
    peers.into_iter().collect()
}

#[async_trait]
impl PeerGateway for NodeGateway {
    async fn connected_peers(&self) -> GatewayResult<Vec<PeerId>> {
        Ok(peer_list(self.call("/net/peers").await?))
    }

    async fn follow_peers(&self) -> GatewayResult<Vec<PeerId>> {
        let (followers, following) = tokio::join!(
            self.peer_list_leg("/net/followers"),
            self.peer_list_leg("/net/following"),
        );
        Ok(union(vec![followers, following]))
    }

    async fn neighbors_of(&self, peer: &PeerId) -> GatewayResult<Vec<PeerId>> {
        let closest_path = format!("/net/closestpeers/{peer}");
        let following_path = format!("/net/following/{peer}");
        let followers_path = format!("/net/followers/{peer}");
        let (closest, following, followers) = tokio::join!(
            self.peer_list_leg(&closest_path),
            self.peer_list_leg(&following_path),
            self.peer_list_leg(&followers_path),
        );
        Ok(union(vec![closest, following, followers]))
    }

    async fn peer_online(&self, peer: &PeerId) -> bool {
        match self.call(&format!("/net/status/{peer}")).await {
            Ok(body) => body.get("status").and_then(Value::as_str) == Some("online"),
            Err(e) => {
                debug!(peer = %peer, error = %e, "status probe failed");
                false
            }
        }
    }

    async fn fetch_profile(&self, peer: &PeerId) -> GatewayResult<PeerProfile> {
        let body = self.call(&format!("/market/profile/{peer}")).await?;
        serde_json::from_value(body).map_err(|e| GatewayError::Malformed(e.to_string()))
    }

    async fn listing_index(&self, peer: &PeerId) -> GatewayResult<Vec<ListingSummary>> {
        let body = self.call(&format!("/market/listings/{peer}")).await?;
        let Value::Array(items) = body else {
            return Err(GatewayError::Malformed("listing index is not an array".into()));
        };

        let mut summaries = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<ListingSummary>(item) {
                Ok(summary) => summaries.push(summary),
                Err(e) => debug!(peer = %peer, error = %e, "dropping undecodable listing summary"),
            }
        }
        Ok(summaries)
    }

    async fn listing_detail(&self, peer: &PeerId, hash: &str) -> GatewayResult<ListingDetail> {
        let mut body = self.call(&format!("/market/listing/{peer}/{hash}")).await?;
        let listing = body
            .get_mut("listing")
            .map(Value::take)
            .ok_or_else(|| GatewayError::Malformed("missing listing envelope".into()))?;
        serde_json::from_value(listing).map_err(|e| GatewayError::Malformed(e.to_string()))
    }

    async fn node_config(&self) -> GatewayResult<NodeInfo> {
        let body = self.call("/net/config").await?;
        serde_json::from_value(body).map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::Mutex;

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test app");
        });
        format!("http://{addr}")
    }

    fn gateway(base_url: String, timeout_ms: u64) -> NodeGateway {
        NodeGateway::new(
            reqwest::Client::new(),
            NodeGatewayConfig {
                base_url,
                username: "souk".into(),
                password: SecretString::from("hunter2"),
                timeout: Duration::from_millis(timeout_ms),
            },
            Arc::new(Semaphore::new(4)),
        )
    }

    #[tokio::test]
    async fn test_connected_peers_drops_non_string_entries() {
        let app = Router::new().route(
            "/net/peers",
            get(|| async { Json(json!(["QmA", "QmB", 7, {"nested": true}])) }),
        );
        let gw = gateway(spawn_server(app).await, 1_000);

        let peers = gw.connected_peers().await.expect("peer list");
        assert_eq!(peers, vec![PeerId::from("QmA"), PeerId::from("QmB")]);
    }

    #[tokio::test]
    async fn test_failure_envelope_is_application_error() {
        let app = Router::new().route(
            "/net/peers",
            get(|| async { Json(json!({"success": false, "reason": "peers unavailable"})) }),
        );
        let gw = gateway(spawn_server(app).await, 1_000);

        let err = gw.connected_peers().await.expect_err("must classify");
        assert_eq!(err, GatewayError::Application("peers unavailable".into()));
    }

    #[tokio::test]
    async fn test_slow_node_is_timeout() {
        let app = Router::new().route(
            "/net/peers",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!([]))
            }),
        );
        let gw = gateway(spawn_server(app).await, 100);

        let err = gw.connected_peers().await.expect_err("must classify");
        assert_eq!(err, GatewayError::Timeout);
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let gw = gateway(format!("http://{addr}"), 1_000);
        let err = gw.connected_peers().await.expect_err("must classify");
        assert!(matches!(err, GatewayError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_credentials_ride_every_request() {
        let seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let app = Router::new()
            .route(
                "/net/peers",
                get(
                    |State(seen): State<Arc<Mutex<Option<String>>>>, headers: HeaderMap| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_owned);
                        *seen.lock().expect("lock") = auth;
                        Json(json!([]))
                    },
                ),
            )
            .with_state(seen.clone());
        let gw = gateway(spawn_server(app).await, 1_000);

        gw.connected_peers().await.expect("peer list");
        let auth = seen.lock().expect("lock").clone().expect("header present");
        assert!(auth.starts_with("Basic "), "got {auth}");
    }

    #[tokio::test]
    async fn test_profile_decode_and_malformed_body() {
        let app = Router::new()
            .route(
                "/market/profile/QmGood",
                get(|| async {
                    Json(json!({"name": "Walnut Works", "avatarHashes": {"tiny": "QmT"}, "about": "hand tools"}))
                }),
            )
            .route("/market/profile/QmBad", get(|| async { Json(json!(["not", "a", "profile"])) }));
        let gw = gateway(spawn_server(app).await, 1_000);

        let profile = gw.fetch_profile(&PeerId::from("QmGood")).await.expect("profile");
        assert_eq!(profile.name, "Walnut Works");
        assert_eq!(profile.extra["about"], "hand tools");

        let err = gw.fetch_profile(&PeerId::from("QmBad")).await.expect_err("must classify");
        assert!(matches!(err, GatewayError::Malformed(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_listing_index_drops_undecodable_entries() {
        let app = Router::new().route(
            "/market/listings/QmPeer",
            get(|| async {
                Json(json!([
                    {"hash": "QmL1", "title": "ok"},
                    {"title": "no hash, no identity"},
                ]))
            }),
        );
        let gw = gateway(spawn_server(app).await, 1_000);

        let summaries = gw.listing_index(&PeerId::from("QmPeer")).await.expect("index");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].hash, "QmL1");
    }

    #[tokio::test]
    async fn test_listing_detail_unwraps_envelope() {
        let app = Router::new()
            .route(
                "/market/listing/QmPeer/QmL1",
                get(|| async {
                    Json(json!({"listing": {
                        "moderators": ["QmMod"],
                        "item": {"condition": "New", "price": 1000},
                        "metadata": {"pricingCurrency": "USD"}
                    }}))
                }),
            )
            .route(
                "/market/listing/QmPeer/QmNaked",
                get(|| async { Json(json!({"item": {"price": 1}})) }),
            );
        let gw = gateway(spawn_server(app).await, 1_000);

        let detail = gw
            .listing_detail(&PeerId::from("QmPeer"), "QmL1")
            .await
            .expect("detail");
        assert_eq!(detail.item.condition, "New");
        assert_eq!(detail.metadata.pricing_currency, "USD");

        let err = gw
            .listing_detail(&PeerId::from("QmPeer"), "QmNaked")
            .await
            .expect_err("must classify");
        assert!(matches!(err, GatewayError::Malformed(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_peer_online_requires_online_status() {
        let app = Router::new()
            .route("/net/status/QmUp", get(|| async { Json(json!({"status": "online"})) }))
            .route("/net/status/QmDown", get(|| async { Json(json!({"status": "offline"})) }));
        let gw = gateway(spawn_server(app).await, 1_000);

        assert!(gw.peer_online(&PeerId::from("QmUp")).await);
        assert!(!gw.peer_online(&PeerId::from("QmDown")).await);
        // Unknown peer routes to a 404 HTML body, which is not online.
        assert!(!gw.peer_online(&PeerId::from("QmGone")).await);
    }

    #[tokio::test]
    async fn test_neighbors_union_dedups_across_legs() {
        let app = Router::new()
            .route("/net/closestpeers/QmSeed", get(|| async { Json(json!(["QmA", "QmB"])) }))
            .route("/net/following/QmSeed", get(|| async { Json(json!(["QmB", "QmC"])) }))
            .route(
                "/net/followers/QmSeed",
                get(|| async { Json(json!({"success": false, "reason": "boom"})) }),
            );
        let gw = gateway(spawn_server(app).await, 1_000);

        let peers = gw.neighbors_of(&PeerId::from("QmSeed")).await.expect("union");
        assert_eq!(
            peers,
            vec![PeerId::from("QmA"), PeerId::from("QmB"), PeerId::from("QmC")]
        );
    }

    #[tokio::test]
    async fn test_node_config_reads_identity() {
        let app = Router::new().route(
            "/net/config",
            get(|| async { Json(json!({"peerId": "QmSelf", "testnet": false})) }),
        );
        let gw = gateway(spawn_server(app).await, 1_000);

        let info = gw.node_config().await.expect("config");
        assert_eq!(info.peer_id, "QmSelf");
    }

    #[tokio::test]
    async fn test_bootstrap_probe_reports_unreachable_node() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let gw = gateway(format!("http://{addr}"), 200);
        assert!(!gw.wait_until_reachable(1).await);
    }

    #[tokio::test]
    async fn test_bootstrap_probe_succeeds_immediately() {
        let app = Router::new().route("/net/peers", get(|| async { Json(json!([])) }));
        let gw = gateway(spawn_server(app).await, 1_000);
        assert!(gw.wait_until_reachable(3).await);
    }
}
