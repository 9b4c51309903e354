//! Gremlin server client using the HTTP script endpoint
//!
//! Scripts are sent with bindings rather than interpolated values and the
//! GraphSON v3 response is unwrapped into plain JSON.

use super::GraphClient;
use crate::config::GraphClientConfig;
use crate::error::ClientError;
use crate::models::TopologyRef;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

const SERVICE: &str = "graph";

const SPOUTS_SCRIPT: &str = "g.V().has('topology_id', topology_id).has('cluster', cluster)\
    .has('environ', environ).hasLabel('spout').values('component').dedup()";

const PARALLELISM_SCRIPT: &str = "g.V().has('topology_id', topology_id).has('cluster', cluster)\
    .has('environ', environ).hasLabel('spout', 'bolt').groupCount().by('component')";

/// Graph client backed by a Gremlin server
pub struct GremlinHttpClient {
    client: Client,
    endpoint: Url,
}

impl GremlinHttpClient {
    pub fn new(config: &GraphClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create graph HTTP client")?;

        let endpoint = Url::parse(&config.url).context("Invalid graph client URL")?;

        Ok(Self { client, endpoint })
    }

    /// Run a script and return the unwrapped `result.data` value
    async fn submit(&self, script: &str, topology: &TopologyRef) -> Result<Value, ClientError> {
        let body = json!({
            "gremlin": script,
            "bindings": {
                "topology_id": topology.topology_id,
                "cluster": topology.cluster,
                "environ": topology.environ,
            }
        });

        debug!(topology = %topology, "Submitting gremlin script");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
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

        let payload: Value = response.json().await.map_err(|e| ClientError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })?;

        payload
            .pointer("/result/data")
            .map(untype_graphson)
            .ok_or_else(|| ClientError::Decode {
                service: SERVICE,
                message: "response has no result.data".to_string(),
            })
    }
}

#[async_trait]
impl GraphClient for GremlinHttpClient {
    async fn component_parallelism(
        &self,
        topology: &TopologyRef,
    ) -> Result<BTreeMap<String, u32>, ClientError> {
        let data = self.submit(PARALLELISM_SCRIPT, topology).await?;

        // groupCount() yields a single map wrapped in the result list
        let counts = match data {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            other => other,
        };

        let counts = counts.as_object().ok_or_else(|| ClientError::Decode {
            service: SERVICE,
            message: format!("expected a component map, got {}", counts),
        })?;

        let mut parallelism = BTreeMap::new();
        for (component, count) in counts {
            let count = count.as_u64().ok_or_else(|| ClientError::Decode {
                service: SERVICE,
                message: format!("non-integer instance count for '{}'", component),
            })?;
            let count = u32::try_from(count).map_err(|_| ClientError::Decode {
                service: SERVICE,
                message: format!("instance count {} for '{}' is out of range", count, component),
            })?;
            parallelism.insert(component.clone(), count);
        }

        if parallelism.is_empty() {
            return Err(ClientError::NotFound {
                service: SERVICE,
                what: format!("topology {}", topology),
            });
        }

        Ok(parallelism)
    }

    async fn spouts(&self, topology: &TopologyRef) -> Result<Vec<String>, ClientError> {
        let data = self.submit(SPOUTS_SCRIPT, topology).await?;

        let spouts: Vec<String> = match data {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Value::String(single) => vec![single],
            _ => Vec::new(),
        };

        if spouts.is_empty() {
            return Err(ClientError::NotFound {
                service: SERVICE,
                what: format!("spouts of topology {}", topology),
            });
        }

        Ok(spouts)
    }
}

/// Strip GraphSON v3 type wrappers, e.g. `{"@type": "g:Int64", "@value": 3}` becomes `3`
pub fn untype_graphson(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(untype_graphson).collect()),
        Value::Object(obj) => match (obj.get("@type").and_then(Value::as_str), obj.get("@value")) {
            (Some("g:List" | "g:Set"), Some(Value::Array(items))) => {
                Value::Array(items.iter().map(untype_graphson).collect())
            }
            (Some("g:Map"), Some(Value::Array(pairs))) => {
                let mut map = Map::new();
                for pair in pairs.chunks(2) {
                    if let [key, val] = pair {
                        let key = match untype_graphson(key) {
                            Value::String(s) => s,
                            other => other.to_string(),
                        };
                        map.insert(key, untype_graphson(val));
                    }
                }
                Value::Object(map)
            }
            (Some(_), Some(inner)) => untype_graphson(inner),
            _ => Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), untype_graphson(v)))
                    .collect(),
            ),
        },
        other => other.clone(),
    }
}
