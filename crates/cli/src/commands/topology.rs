//! Topology performance modelling commands for Heron

use tracing::debug;

use super::{show_prediction, Target};
use crate::client::{ApiClient, Result};
use crate::output::{print_json, render_model_info, OutputFormat};

/// List the configured topology performance models
pub async fn model_info(client: &ApiClient, format: OutputFormat) -> Result<()> {
    debug!("Requesting topology performance model information");

    let models = client.model_info("model/topology/heron/model_info").await?;

    match format {
        OutputFormat::Json => print_json(&models),
        OutputFormat::Table => println!(
            "{}",
            render_model_info("Available performance models for Apache Heron topologies:", &models)
        ),
    }
    Ok(())
}

/// Parse a `component=N` parallelism override
pub fn parse_parallelism(raw: &str) -> std::result::Result<(String, u32), String> {
    let (component, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected component=N, got '{}'", raw))?;
    let component = component.trim();
    if component.is_empty() {
        return Err(format!("missing component name in '{}'", raw));
    }
    let parallelism = value
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| format!("parallelism for '{}' must be a positive integer", component))?;
    Ok((component.to_string(), parallelism))
}

/// Model the performance of the running topology, or of a proposed
/// packing plan when `proposed` is set
pub async fn prediction(
    client: &ApiClient,
    target: &Target,
    source_hours: Option<f64>,
    proposed: bool,
    parallelism: &[(String, u32)],
    format: OutputFormat,
) -> Result<()> {
    debug!(
        topology = %target.topology_id,
        cluster = %target.cluster,
        environ = %target.environ,
        model = target.model.as_deref().unwrap_or("all"),
        proposed,
        overrides = parallelism.len(),
        "Predicting topology performance"
    );

    let (path, mut params) = if proposed {
        (
            format!("model/topology/heron/proposed/{}", target.topology_id),
            target.params(false),
        )
    } else {
        ("model/topology/heron/current".to_string(), target.params(true))
    };

    if let Some(hours) = source_hours {
        params.push(("source_hours".to_string(), hours.to_string()));
    }
    for (component, value) in parallelism {
        params.push((format!("parallelism.{}", component), value.to_string()));
    }

    let body = client.prediction(&path, &params).await?;
    show_prediction(&body, "Topology performance prediction failed", format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parallelism() {
        assert_eq!(parse_parallelism("splitter=4"), Ok(("splitter".to_string(), 4)));
        assert_eq!(parse_parallelism(" count = 2 "), Ok(("count".to_string(), 2)));
    }

    #[test]
    fn test_parse_parallelism_rejects_bad_input() {
        assert!(parse_parallelism("splitter").is_err());
        assert!(parse_parallelism("=4").is_err());
        assert!(parse_parallelism("splitter=0").is_err());
        assert!(parse_parallelism("splitter=many").is_err());
    }
}
