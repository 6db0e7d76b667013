//! Saved project files: dataset, chart id, mapping and visual options in one JSON document.

use crate::chart::{ChartDescriptor, ChartRegistry};
use crate::data::{Column, Dataset, Value};
use crate::error::ProjectError;
use crate::mapping::{Mapping, MappingEntry};
use crate::options::{rehydrate, VisualOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub const PROJECT_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
struct ProjectDataset {
    columns: Vec<Column>,
    rows: Vec<BTreeMap<String, Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectFile<'a> {
    version: &'a str,
    chart: &'a str,
    dataset: ProjectDataset,
    mapping: &'a Mapping,
    visual_options: &'a VisualOptions,
}

/// A fully decoded project, ready to replace the pipeline's inputs in one step.
#[derive(Debug, Clone)]
pub struct Project {
    pub chart: Arc<ChartDescriptor>,
    pub dataset: Dataset,
    pub mapping: Mapping,
    pub options: VisualOptions,
}

/// Serialize the pipeline inputs as a project document
pub fn save(chart: &ChartDescriptor, dataset: &Dataset, mapping: &Mapping, options: &VisualOptions) -> serde_json::Result<String> {
    let rows = dataset
        .rows()
        .iter()
        .map(|row| {
            dataset
                .columns()
                .iter()
                .zip(row)
                .map(|(c, v)| (c.name.clone(), v.clone()))
                .collect()
        })
        .collect();

    let file = ProjectFile {
        version: PROJECT_VERSION,
        chart: chart.id(),
        dataset: ProjectDataset {
            columns: dataset.columns().to_vec(),
            rows,
        },
        mapping,
        visual_options: options,
    };
    serde_json::to_string_pretty(&file)
}

/// Decode a project document against the registered charts
pub fn load(json: &str, registry: &ChartRegistry) -> Result<Project, ProjectError> {
    let doc: Json = serde_json::from_str(json)?;
    let obj = doc
        .as_object()
        .ok_or_else(|| ProjectError::Invalid("expected a JSON object".to_string()))?;

    // 1. Version gate
    let version = obj
        .get("version")
        .and_then(Json::as_str)
        .ok_or(ProjectError::InvalidVersion)?;
    if version != PROJECT_VERSION {
        return Err(ProjectError::UnsupportedVersion(version.to_string()));
    }

    // 2. Chart
    let chart_id = obj
        .get("chart")
        .and_then(Json::as_str)
        .ok_or_else(|| ProjectError::Invalid("missing chart id".to_string()))?;
    let chart = registry
        .get(chart_id)
        .ok_or_else(|| ProjectError::UnknownChart(chart_id.to_string()))?;

    // 3. Dataset
    let raw_dataset: ProjectDataset = field(obj, "dataset")?
        .ok_or_else(|| ProjectError::Invalid("missing dataset".to_string()))?;
    let rows = raw_dataset
        .rows
        .into_iter()
        .map(|mut row| {
            raw_dataset
                .columns
                .iter()
                .map(|c| row.remove(&c.name).unwrap_or_default())
                .collect()
        })
        .collect();
    let dataset = Dataset::new(raw_dataset.columns, rows).map_err(|e| ProjectError::Invalid(e.to_string()))?;

    // 4. Mapping, re-bound so derived flags match the dataset
    let saved_mapping: Mapping = field(obj, "mapping")?.unwrap_or_default();
    let mut mapping = Mapping::new();
    for (dim_id, entry) in saved_mapping.iter() {
        let dimension = chart
            .dimension(dim_id)
            .ok_or_else(|| ProjectError::Invalid(format!("chart '{}' has no dimension '{}'", chart.id(), dim_id)))?;
        mapping.insert(dim_id, MappingEntry::bind(dimension, &entry.ids, &dataset));
    }

    // 5. Visual options
    let saved_options: VisualOptions = field(obj, "visualOptions")?.unwrap_or_default();
    let options = rehydrate(chart.schema(), &saved_options);

    info!(chart = %chart.id(), rows = dataset.len(), "Project decoded");
    Ok(Project {
        chart,
        dataset,
        mapping,
        options,
    })
}

fn field<T: serde::de::DeserializeOwned>(
    obj: &serde_json::Map<String, Json>,
    key: &str,
) -> Result<Option<T>, ProjectError> {
    match obj.get(key) {
        None | Some(Json::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| ProjectError::Invalid(format!("{}: {}", key, e))),
    }
}
