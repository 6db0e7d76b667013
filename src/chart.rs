//! Chart plugin contract and the registry of known charts.
//!
//! A chart declares its dimensions and visual options, reshapes a dataset into its own
//! data type, and renders that data onto a [`Surface`]. The pipeline only talks to
//! charts through [`ChartDescriptor`], which erases the plugin's data type.

use crate::data::{DataType, Dataset};
use crate::mapping::Mapping;
use crate::options::{OptionsSchema, VisualOptions};
use crate::surface::Surface;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;

/// A typed slot that dataset columns can be mapped onto.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub id: String,
    pub name: String,
    pub accepted: Vec<DataType>,
    pub required: bool,
    pub multiple: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_values: Option<usize>,
    /// Hint that rows sharing the other dimensions are summed on this one.
    pub aggregated: bool,
}

impl Dimension {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            accepted: Vec::new(),
            required: false,
            multiple: false,
            min_values: None,
            aggregated: false,
        }
    }

    pub fn accepts(mut self, types: &[DataType]) -> Self {
        self.accepted = types.to_vec();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn min_values(mut self, n: usize) -> Self {
        self.min_values = Some(n);
        self
    }

    pub fn aggregated(mut self) -> Self {
        self.aggregated = true;
        self
    }

    pub fn accepts_type(&self, data_type: DataType) -> bool {
        self.accepted.contains(&data_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
    pub categories: Vec<String>,
}

/// Outcome of a reshape: either chart data or an explicit "nothing to draw".
#[derive(Debug, Clone, PartialEq)]
pub enum Reshaped<T> {
    Nothing,
    Ready(T),
}

/// Read-only inputs handed to a render call alongside the reshaped data.
pub struct RenderContext<'a> {
    pub options: &'a VisualOptions,
    pub mapping: &'a Mapping,
    pub dataset: &'a Dataset,
}

pub trait ChartPlugin {
    type Data: 'static;

    fn metadata(&self) -> ChartMetadata;

    /// Ordered dimension declarations; ids are unique.
    fn dimensions(&self) -> Vec<Dimension>;

    /// Chart specific options. The shared artboard options are added by the descriptor.
    fn visual_options(&self) -> OptionsSchema;

    fn map_data(
        &self,
        dataset: &Dataset,
        mapping: &Mapping,
        dimensions: &[Dimension],
    ) -> Result<Reshaped<Self::Data>>;

    /// Draw `data` onto an already cleared surface.
    fn render(&self, surface: &mut dyn Surface, data: &Self::Data, ctx: &RenderContext<'_>) -> Result<()>;
}

/// Reshaped data of an unknown chart, owned by the pipeline for one render cycle.
pub type ErasedData = Box<dyn Any>;

trait ErasedPlugin {
    fn map_data(&self, dataset: &Dataset, mapping: &Mapping, dimensions: &[Dimension]) -> Result<Reshaped<ErasedData>>;
    fn render(&self, surface: &mut dyn Surface, data: &dyn Any, ctx: &RenderContext<'_>) -> Result<()>;
}

struct Erased<P>(P);

impl<P: ChartPlugin> ErasedPlugin for Erased<P> {
    fn map_data(&self, dataset: &Dataset, mapping: &Mapping, dimensions: &[Dimension]) -> Result<Reshaped<ErasedData>> {
        Ok(match self.0.map_data(dataset, mapping, dimensions)? {
            Reshaped::Nothing => Reshaped::Nothing,
            Reshaped::Ready(data) => Reshaped::Ready(Box::new(data)),
        })
    }

    fn render(&self, surface: &mut dyn Surface, data: &dyn Any, ctx: &RenderContext<'_>) -> Result<()> {
        let data = data
            .downcast_ref::<P::Data>()
            .ok_or_else(|| anyhow!("Reshaped data does not belong to chart '{}'", self.0.metadata().id))?;
        self.0.render(surface, data, ctx)
    }
}

/// Immutable, registered chart: metadata, dimensions and full options schema resolved once.
pub struct ChartDescriptor {
    metadata: ChartMetadata,
    dimensions: Vec<Dimension>,
    schema: OptionsSchema,
    plugin: Box<dyn ErasedPlugin>,
}

impl ChartDescriptor {
    pub fn new<P: ChartPlugin + 'static>(plugin: P) -> Self {
        let metadata = plugin.metadata();
        let dimensions = plugin.dimensions();
        let schema = OptionsSchema::artboard().extend(plugin.visual_options());
        Self {
            metadata,
            dimensions,
            schema,
            plugin: Box::new(Erased(plugin)),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn metadata(&self) -> &ChartMetadata {
        &self.metadata
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, id: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.id == id)
    }

    pub fn schema(&self) -> &OptionsSchema {
        &self.schema
    }

    pub fn reshape(&self, dataset: &Dataset, mapping: &Mapping) -> Result<Reshaped<ErasedData>> {
        self.plugin.map_data(dataset, mapping, &self.dimensions)
    }

    pub fn render(&self, surface: &mut dyn Surface, data: &dyn Any, ctx: &RenderContext<'_>) -> Result<()> {
        self.plugin.render(surface, data, ctx)
    }
}

impl std::fmt::Debug for ChartDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartDescriptor")
            .field("id", &self.metadata.id)
            .field("dimensions", &self.dimensions.len())
            .finish()
    }
}

/// Charts available to the pipeline, in registration order.
#[derive(Debug, Default, Clone)]
pub struct ChartRegistry {
    charts: Vec<Arc<ChartDescriptor>>,
}

impl ChartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in histogram, mosaic and spiral charts
    pub fn builtin() -> Self {
        let charts = vec![
            Arc::new(ChartDescriptor::new(crate::charts::Histogram)),
            Arc::new(ChartDescriptor::new(crate::charts::Mosaic)),
            Arc::new(ChartDescriptor::new(crate::charts::Spiral)),
        ];
        Self { charts }
    }

    pub fn register(&mut self, chart: ChartDescriptor) -> Result<()> {
        if self.get(chart.id()).is_some() {
            anyhow::bail!("Chart '{}' is already registered", chart.id());
        }
        self.charts.push(Arc::new(chart));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<ChartDescriptor>> {
        self.charts.iter().find(|c| c.id() == id).cloned()
    }

    pub fn first(&self) -> Option<Arc<ChartDescriptor>> {
        self.charts.first().cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ChartDescriptor>> {
        self.charts.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.charts.iter().map(|c| c.id().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = ChartRegistry::builtin();
        assert_eq!(
            registry.ids(),
            vec!["rawchart.histogram", "rawchart.mosaic", "rawchart.spiral"]
        );
        assert!(registry.get("rawchart.spiral").is_some());
        assert!(registry.get("nope").is_none());
        assert_eq!(registry.first().unwrap().id(), "rawchart.histogram");
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = ChartRegistry::builtin();
        let err = registry
            .register(ChartDescriptor::new(crate::charts::Mosaic))
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_descriptor_schema_includes_artboard() {
        let registry = ChartRegistry::builtin();
        let chart = registry.get("rawchart.histogram").unwrap();
        assert!(chart.schema().get("width").is_some());
        assert!(chart.schema().get("bins").is_some());
    }

    #[test]
    fn test_dimension_builder() {
        let dim = Dimension::new("value", "Value")
            .accepts(&[DataType::Number])
            .required()
            .multiple()
            .min_values(2);
        assert!(dim.accepts_type(DataType::Number));
        assert!(!dim.accepts_type(DataType::String));
        assert_eq!(dim.min_values, Some(2));
    }
}
