//! # BTC rate source
//!
//! Thin client for the public conversion endpoint. The endpoint speaks
//! plain text, so the adapter's whole job is classifying transport
//! failures and refusing bodies that do not parse as a float.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use domains::error::{RateError, RateResult};
use domains::ports::RateSource;

#[derive(Debug, Clone)]
pub struct RateSourceConfig {
    pub base_url: String,
    pub timeout: Duration,
}

pub struct BlockchainRateSource {
    http: reqwest::Client,
    base: String,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl BlockchainRateSource {
    pub fn new(http: reqwest::Client, config: RateSourceConfig, permits: Arc<Semaphore>) -> Self {
        Self {
            http,
            base: config.base_url.trim_end_matches('/').to_owned(),
            timeout: config.timeout,
            permits,
        }
    }
}

#[async_trait]
impl RateSource for BlockchainRateSource {
    async fn to_btc(&self, currency: &str, amount: f64) -> RateResult<f64> {
        // BTC is the unit of account, no conversion and no permit.
        if currency.eq_ignore_ascii_case("BTC") {
            return Ok(amount);
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RateError::Transport("request limiter closed".into()))?;

        let url = format!("{}/tobtc?currency={}&value={}", self.base, currency, amount);
        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RateError::Timeout
                } else {
                    RateError::Transport(e.to_string())
                }
            })?;

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                RateError::Timeout
            } else {
                RateError::Transport(e.to_string())
            }
        })?;

        body.trim().parse::<f64>().map_err(|_| {
            let snippet: String = body.chars().take(80).collect();
            RateError::Malformed(snippet)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;
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

    fn source(base_url: String) -> BlockchainRateSource {
        BlockchainRateSource::new(
            reqwest::Client::new(),
            RateSourceConfig {
                base_url,
                timeout: Duration::from_millis(1_000),
            },
            Arc::new(Semaphore::new(4)),
        )
    }

    #[tokio::test]
    async fn test_btc_is_identity_without_network() {
        // Unroutable base proves no request leaves the process.
        let src = source("http://127.0.0.1:1".into());
        let rate = src.to_btc("btc", 0.25).await.expect("identity");
        assert_eq!(rate, 0.25);
    }

    #[tokio::test]
    async fn test_converts_plain_text_float() {
        let app = Router::new().route("/tobtc", get(|| async { "0.00005\n" }));
        let src = source(spawn_server(app).await);

        let rate = src.to_btc("USD", 10.0).await.expect("rate");
        assert_eq!(rate, 0.00005);
    }

    #[tokio::test]
    async fn test_non_numeric_body_is_malformed() {
        let app = Router::new().route("/tobtc", get(|| async { "Invalid currency: XXX" }));
        let src = source(spawn_server(app).await);

        let err = src.to_btc("XXX", 10.0).await.expect_err("must classify");
        assert_eq!(err, RateError::Malformed("Invalid currency: XXX".into()));
    }

    #[tokio::test]
    async fn test_sends_currency_and_value_params() {
        let seen: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));
        let app = Router::new()
            .route(
                "/tobtc",
                get(
                    |State(seen): State<Arc<Mutex<HashMap<String, String>>>>,
                     Query(params): Query<HashMap<String, String>>| async move {
                        *seen.lock().expect("lock") = params;
                        "0.001"
                    },
                ),
            )
            .with_state(seen.clone());
        let src = source(spawn_server(app).await);

        src.to_btc("EUR", 12.5).await.expect("rate");
        let params = seen.lock().expect("lock").clone();
        assert_eq!(params.get("currency").map(String::as_str), Some("EUR"));
        assert_eq!(params.get("value").map(String::as_str), Some("12.5"));
    }
}
