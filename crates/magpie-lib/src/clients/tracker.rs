//! Metrics client for the Heron Tracker REST API

use super::{MetricSample, MetricsClient, TimelineQuery};
use crate::config::MetricsClientConfig;
use crate::error::ClientError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

const SERVICE: &str = "metrics";

/// Envelope returned by every Tracker endpoint
#[derive(Debug, Deserialize)]
struct TrackerResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Option<TimelineResult>,
}

#[derive(Debug, Deserialize)]
struct TimelineResult {
    /// metric name -> instance -> epoch seconds -> value
    #[serde(default)]
    timeline: BTreeMap<String, BTreeMap<String, BTreeMap<String, Value>>>,
}

/// Metrics client reading metric timelines from the Heron Tracker
pub struct TrackerMetricsClient {
    client: Client,
    base_url: Url,
}

impl TrackerMetricsClient {
    pub fn new(config: &MetricsClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create tracker HTTP client")?;

        let base_url = super::base_url(&config.url).context("Invalid tracker URL")?;

        Ok(Self { client, base_url })
    }

    fn decode_error(message: impl Into<String>) -> ClientError {
        ClientError::Decode {
            service: SERVICE,
            message: message.into(),
        }
    }
}

#[async_trait]
impl MetricsClient for TrackerMetricsClient {
    async fn timeline(&self, query: &TimelineQuery<'_>) -> Result<Vec<MetricSample>, ClientError> {
        let url = self
            .base_url
            .join("topologies/metricstimeline")
            .map_err(|e| Self::decode_error(e.to_string()))?;

        let params = [
            ("cluster", query.topology.cluster.clone()),
            ("environ", query.topology.environ.clone()),
            ("topology", query.topology.topology_id.clone()),
            ("component", query.component.to_string()),
            ("metricname", query.metric.to_string()),
            ("starttime", query.start.timestamp().to_string()),
            ("endtime", query.end.timestamp().to_string()),
        ];

        debug!(
            topology = %query.topology,
            component = query.component,
            metric = query.metric,
            "Requesting metrics timeline"
        );

        let response = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let payload: TrackerResponse = response
            .json()
            .await
            .map_err(|e| Self::decode_error(e.to_string()))?;

        if payload.status != "success" {
            return Err(Self::decode_error(format!(
                "tracker reported '{}': {}",
                payload.status, payload.message
            )));
        }

        let timeline = payload
            .result
            .map(|r| r.timeline)
            .unwrap_or_default();

        let mut samples = Vec::new();
        if let Some(instances) = timeline.get(query.metric) {
            for (instance, points) in instances {
                for (ts, raw) in points {
                    let timestamp = ts
                        .parse::<i64>()
                        .map_err(|_| Self::decode_error(format!("bad timestamp '{}'", ts)))?;
                    let value = match raw {
                        Value::Number(n) => n.as_f64(),
                        Value::String(s) => s.parse::<f64>().ok(),
                        _ => None,
                    }
                    .ok_or_else(|| Self::decode_error(format!("bad metric value {}", raw)))?;

                    samples.push(MetricSample {
                        instance: instance.clone(),
                        timestamp,
                        value,
                    });
                }
            }
        }

        samples.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.instance.cmp(&b.instance))
        });

        Ok(samples)
    }
}
