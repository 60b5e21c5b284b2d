//! HTTP push gateway client.
//!
//! Speaks a JSON batch-send API: the token set is split into chunks of
//! `batch_size` and the chunks are sent concurrently with bounded
//! parallelism. The transport answers with a per-token status list.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};

use crate::config::DeliveryConfig;
use crate::payload::NotificationPayload;

use super::{DeliveryErrorKind, DeliveryGateway, GatewayError, GatewayResponse, TokenOutcome};

/// Maximum number of chunk requests in flight at once.
const MAX_CONCURRENT_BATCHES: usize = 8;

#[derive(Serialize)]
struct BatchSendRequest<'a> {
    tokens: &'a [String],
    notification: Notification<'a>,
    data: &'a std::collections::BTreeMap<String, String>,
}

#[derive(Serialize)]
struct Notification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct BatchSendResponse {
    results: Vec<TokenResult>,
}

#[derive(Deserialize)]
struct TokenResult {
    token: String,
    status: String,
}

/// Push transport client over HTTP.
pub struct HttpPushGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    batch_size: usize,
}

impl HttpPushGateway {
    pub fn new(config: &DeliveryConfig) -> Result<Self, GatewayError> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            GatewayError::Misconfigured("http backend requires delivery.endpoint".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Misconfigured(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            batch_size: config.batch_size.max(1),
        })
    }

    async fn send_chunk(
        &self,
        chunk: &[String],
        payload: &NotificationPayload,
    ) -> Result<Vec<TokenResult>, GatewayError> {
        let request = BatchSendRequest {
            tokens: chunk,
            notification: Notification {
                title: &payload.title,
                body: &payload.body,
            },
            data: &payload.data,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::TransportUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::TransportUnavailable(format!(
                "gateway answered {}",
                response.status()
            )));
        }

        let body: BatchSendResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(body.results)
    }

    fn classify(status: &str) -> TokenOutcome {
        match status {
            "delivered" | "ok" => TokenOutcome::Delivered,
            "invalid_token" | "unregistered" => TokenOutcome::Failed {
                kind: DeliveryErrorKind::PermanentInvalidToken,
            },
            _ => TokenOutcome::Failed {
                kind: DeliveryErrorKind::Transient,
            },
        }
    }
}

#[async_trait]
impl DeliveryGateway for HttpPushGateway {
    #[tracing::instrument(
        name = "gateway.send_batch",
        skip(self, tokens, payload),
        fields(token_count = tokens.len())
    )]
    async fn send_batch(
        &self,
        tokens: &BTreeSet<String>,
        payload: &NotificationPayload,
    ) -> Result<GatewayResponse, GatewayError> {
        let all: Vec<String> = tokens.iter().cloned().collect();
        let mut response = GatewayResponse::default();

        let total_chunks = all.chunks(self.batch_size).len();
        let mut futures = FuturesUnordered::new();
        let mut chunks = all.chunks(self.batch_size);
        let mut in_flight = 0usize;
        let mut failed_chunks = 0usize;
        let mut non_outage_failure = false;
        let mut first_outage: Option<String> = None;

        loop {
            while in_flight < MAX_CONCURRENT_BATCHES {
                match chunks.next() {
                    Some(chunk) => {
                        futures.push(async move { (chunk, self.send_chunk(chunk, payload).await) });
                        in_flight += 1;
                    }
                    None => break,
                }
            }

            match futures.next().await {
                Some((chunk, result)) => {
                    in_flight -= 1;
                    match result {
                        Ok(results) => {
                            for entry in results {
                                response
                                    .outcomes
                                    .insert(entry.token, Self::classify(&entry.status));
                            }
                        }
                        // A failed chunk must not discard outcomes from chunks
                        // the transport really handled; its tokens fail
                        // individually and the remaining chunks keep going
                        Err(e) => {
                            failed_chunks += 1;
                            let kind = match &e {
                                GatewayError::TransportUnavailable(reason) => {
                                    if first_outage.is_none() {
                                        first_outage = Some(reason.clone());
                                    }
                                    DeliveryErrorKind::TransportUnavailable
                                }
                                _ => {
                                    non_outage_failure = true;
                                    DeliveryErrorKind::Transient
                                }
                            };
                            tracing::warn!(
                                chunk_size = chunk.len(),
                                error = %e,
                                "Batch chunk failed, tokens marked failed"
                            );
                            for token in chunk {
                                response
                                    .outcomes
                                    .insert(token.clone(), TokenOutcome::Failed { kind });
                            }
                        }
                    }
                }
                None => break,
            }
        }

        // Every chunk unreachable means the transport as a whole is down;
        // only then does the call carry no usable per-token information
        if failed_chunks == total_chunks && !non_outage_failure {
            if let Some(reason) = first_outage {
                return Err(GatewayError::TransportUnavailable(reason));
            }
        }

        // Tokens the transport did not report back are treated as transient
        // failures rather than silently dropped.
        for token in tokens {
            response
                .outcomes
                .entry(token.clone())
                .or_insert(TokenOutcome::Failed {
                    kind: DeliveryErrorKind::Transient,
                });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(HttpPushGateway::classify("delivered"), TokenOutcome::Delivered);
        assert_eq!(HttpPushGateway::classify("ok"), TokenOutcome::Delivered);
        assert_eq!(
            HttpPushGateway::classify("invalid_token"),
            TokenOutcome::Failed {
                kind: DeliveryErrorKind::PermanentInvalidToken
            }
        );
        assert_eq!(
            HttpPushGateway::classify("throttled"),
            TokenOutcome::Failed {
                kind: DeliveryErrorKind::Transient
            }
        );
    }

    #[test]
    fn test_requires_endpoint() {
        let config = DeliveryConfig {
            backend: "http".to_string(),
            endpoint: None,
            ..Default::default()
        };
        assert!(matches!(
            HttpPushGateway::new(&config),
            Err(GatewayError::Misconfigured(_))
        ));
    }

    /// Stub transport that answers 502 for any chunk containing a token
    /// starting with "down-" and delivers everything else.
    async fn spawn_stub_transport() -> String {
        use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
        use serde_json::json;

        let app = Router::new().route(
            "/send",
            post(|Json(request): Json<serde_json::Value>| async move {
                let requested: Vec<String> = request["tokens"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|t| t.as_str().unwrap().to_string())
                    .collect();

                if requested.iter().any(|t| t.starts_with("down-")) {
                    return StatusCode::BAD_GATEWAY.into_response();
                }

                let results: Vec<serde_json::Value> = requested
                    .iter()
                    .map(|t| json!({"token": t, "status": "delivered"}))
                    .collect();
                Json(json!({ "results": results })).into_response()
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/send")
    }

    fn gateway_for(endpoint: String, batch_size: usize) -> HttpPushGateway {
        HttpPushGateway::new(&DeliveryConfig {
            backend: "http".to_string(),
            endpoint: Some(endpoint),
            batch_size,
            ..Default::default()
        })
        .unwrap()
    }

    fn test_payload() -> NotificationPayload {
        crate::payload::build(&crate::event::OrderEvent::OrderCreated {
            order_id: "abcd1234".to_string(),
            store_id: "S1".to_string(),
        })
    }

    #[tokio::test]
    async fn test_failed_chunk_keeps_delivered_outcomes_from_other_chunks() {
        let endpoint = spawn_stub_transport().await;
        // batch_size 1 puts each token in its own chunk
        let gateway = gateway_for(endpoint, 1);

        let tokens: BTreeSet<String> = ["alive-T1".to_string(), "down-T2".to_string()].into();
        let response = gateway.send_batch(&tokens, &test_payload()).await.unwrap();

        assert_eq!(response.outcomes["alive-T1"], TokenOutcome::Delivered);
        assert_eq!(
            response.outcomes["down-T2"],
            TokenOutcome::Failed {
                kind: DeliveryErrorKind::TransportUnavailable
            }
        );
    }

    #[tokio::test]
    async fn test_all_chunks_unreachable_surfaces_transport_outage() {
        let endpoint = spawn_stub_transport().await;
        let gateway = gateway_for(endpoint, 1);

        let tokens: BTreeSet<String> = ["down-T1".to_string(), "down-T2".to_string()].into();
        let result = gateway.send_batch(&tokens, &test_payload()).await;

        assert!(matches!(result, Err(GatewayError::TransportUnavailable(_))));
    }
}
