use colored::Colorize;
use graphload_core::EndpointConfig;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

pub fn run(config: &CliConfig) -> CliResult<()> {
    let schema = config.input.schema();
    if schema.num_fields() == 0 {
        return Err(CliError::Config(format!(
            "{}: the [input] section declares no fields",
            config.path.display()
        )));
    }

    let load = &config.load;
    let mut referenced: Vec<(&str, &str)> = Vec::new();
    for tag in &load.tags {
        referenced.extend(endpoint_fields(&tag.vertex).map(|f| (tag.name.as_str(), f)));
        referenced.extend(tag.fields.iter().map(|f| (tag.name.as_str(), f.as_str())));
    }
    for edge in &load.edges {
        referenced.extend(endpoint_fields(&edge.source).map(|f| (edge.name.as_str(), f)));
        referenced.extend(endpoint_fields(&edge.target).map(|f| (edge.name.as_str(), f)));
        referenced.extend(edge.rank_field.iter().map(|f| (edge.name.as_str(), f.as_str())));
        referenced.extend(edge.fields.iter().map(|f| (edge.name.as_str(), f.as_str())));
    }
    for (entity, field) in referenced {
        // Empty names mark skipped property slots.
        if !field.is_empty() && schema.field_by_name(field).is_none() {
            return Err(CliError::Config(format!(
                "{entity}: field '{field}' is not declared in [input]"
            )));
        }
    }

    println!("{} {}", "valid".green().bold(), config.path.display());
    println!(
        "  batch_size {}, max_inflight {}, {} permits/s",
        load.batch_size, load.max_inflight, load.rate_limit.permits_per_sec
    );
    for tag in &load.tags {
        println!(
            "  tag  {} ({}, {} partitions)",
            tag.name, tag.category, tag.partitions
        );
    }
    for edge in &load.edges {
        println!(
            "  edge {} ({}, {} partitions)",
            edge.name, edge.category, edge.partitions
        );
    }
    Ok(())
}

fn endpoint_fields(endpoint: &EndpointConfig) -> impl Iterator<Item = &str> {
    let fields: Vec<&str> = match &endpoint.spatial {
        Some(s) => vec![s.latitude.as_str(), s.longitude.as_str()],
        None => vec![endpoint.field.as_str()],
    };
    fields.into_iter()
}
