// Library exports for rawchart

pub mod csv_reader;
pub mod data;
pub mod graph;
pub mod palette;
pub mod parser;

// Chart model
pub mod chart;
pub mod charts;
pub mod mapping;
pub mod options;
pub mod validate;

// Drawing
pub mod curve;
pub mod scale;
pub mod surface;
pub mod transform;

// Orchestration
pub mod config;
pub mod debounce;
pub mod error;
pub mod messages;
pub mod pipeline;
pub mod project;

pub use chart::{ChartDescriptor, ChartPlugin, ChartRegistry};
pub use config::{Config, ExportOptions, OutputFormat, PipelineConfig};
pub use data::{DataType, Dataset, Value};
pub use pipeline::{Pipeline, PipelineState};
