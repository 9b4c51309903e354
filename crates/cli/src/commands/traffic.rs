//! Traffic modelling commands for Heron topologies

use tracing::debug;

use super::{show_prediction, Target};
use crate::client::{ApiClient, Result};
use crate::output::{print_json, render_model_info, OutputFormat};

/// List the configured traffic models
pub async fn model_info(client: &ApiClient, format: OutputFormat) -> Result<()> {
    debug!("Requesting traffic model information");

    let models = client.model_info("model/traffic/heron/model_info").await?;

    match format {
        OutputFormat::Json => print_json(&models),
        OutputFormat::Table => println!(
            "{}",
            render_model_info("Available Traffic Models for Apache Heron Topologies:", &models)
        ),
    }
    Ok(())
}

/// Predict incoming traffic for a topology
pub async fn prediction(
    client: &ApiClient,
    target: &Target,
    source_hours: f64,
    future_mins: f64,
    format: OutputFormat,
) -> Result<()> {
    debug!(
        topology = %target.topology_id,
        cluster = %target.cluster,
        environ = %target.environ,
        model = target.model.as_deref().unwrap_or("all"),
        source_hours,
        future_mins,
        "Predicting traffic levels"
    );

    let mut params = target.params(true);
    params.push(("source_hours".to_string(), source_hours.to_string()));
    params.push(("future_mins".to_string(), future_mins.to_string()));

    let body = client.prediction("model/traffic/heron", &params).await?;
    show_prediction(&body, "Traffic prediction failed", format);
    Ok(())
}
