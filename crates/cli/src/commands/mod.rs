//! Heron modelling commands

pub mod topology;
pub mod traffic;

use serde_json::Value;
use tracing::error;

use crate::output::{
    is_error_envelope, print_json, print_warning, render_errors, render_prediction, OutputFormat,
};

/// Topology a prediction is requested for
#[derive(Debug, Clone)]
pub struct Target {
    pub topology_id: String,
    pub cluster: String,
    pub environ: String,
    pub model: Option<String>,
}

impl Target {
    /// Query parameters; the topology id is left out when it travels in the path
    fn params(&self, with_topology_id: bool) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if with_topology_id {
            params.push(("topology_id".to_string(), self.topology_id.clone()));
        }
        params.push(("cluster".to_string(), self.cluster.clone()));
        params.push(("environ".to_string(), self.environ.clone()));
        if let Some(model) = &self.model {
            params.push(("model".to_string(), model.clone()));
        }
        params
    }
}

fn show_prediction(body: &Value, failure: &str, format: OutputFormat) {
    if let OutputFormat::Json = format {
        print_json(body);
        return;
    }

    if is_error_envelope(body) {
        error!("{}", failure);
        println!("The following errors were reported by the Magpie server:");
        print!("{}", render_errors(&body["errors"]));
        return;
    }

    if body.as_object().map_or(true, |models| models.is_empty()) {
        print_warning("The server returned no model results");
        return;
    }

    print!("{}", render_prediction(body));
}
