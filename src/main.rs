use anyhow::{Context, Result};
use clap::Parser;
use rawchart::chart::ChartRegistry;
use rawchart::config::{Config, OutputFormat};
use rawchart::data::Dataset;
use rawchart::messages::{self, NoticeLevel};
use rawchart::options::OptionValue;
use rawchart::pipeline::{Pipeline, PipelineState};
use rawchart::{csv_reader, parser};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rawchart")]
#[command(about = "Map tabular data onto chart dimensions and render PNG or SVG", long_about = None)]
struct Args {
    /// CSV file to chart (reads stdin when omitted)
    input: Option<PathBuf>,

    /// Read the input as a JSON array of objects instead of CSV
    #[arg(long)]
    json: bool,

    /// Chart id, e.g. 'rawchart.histogram' or just 'histogram'
    #[arg(long, short)]
    chart: Option<String>,

    /// Mapping DSL (e.g., 'date: day, value: [sales, "net profit"], series: city')
    #[arg(long, short)]
    map: Option<String>,

    /// Visual options DSL (e.g., 'bins: 10, color: "#ff0000"')
    #[arg(long, short)]
    set: Option<String>,

    /// Load a saved project instead of reading data
    #[arg(long, conflicts_with_all = ["input", "json"])]
    project: Option<PathBuf>,

    /// Save the resulting project to this file
    #[arg(long)]
    save_project: Option<PathBuf>,

    /// Output format (defaults to the config file, then png)
    #[arg(long, short, value_enum)]
    format: Option<OutputFormat>,

    /// Output file (defaults to stdout)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// List the available charts and their dimensions
    #[arg(long)]
    list_charts: bool,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn list_charts(registry: &ChartRegistry) {
    for chart in registry.iter() {
        let meta = chart.metadata();
        println!("{}  {}", meta.id, meta.name);
        for dim in chart.dimensions() {
            let mut flags = Vec::new();
            if dim.required {
                flags.push("required");
            }
            if dim.multiple {
                flags.push("multiple");
            }
            println!("    {:<10} {}", dim.id, flags.join(", "));
        }
    }
}

/// Accept both full ids and the short name after the `rawchart.` prefix
fn resolve_chart_id(registry: &ChartRegistry, id: &str) -> String {
    if registry.get(id).is_none() {
        let prefixed = format!("rawchart.{}", id);
        if registry.get(&prefixed).is_some() {
            return prefixed;
        }
    }
    id.to_string()
}

fn read_dataset(input: Option<&Path>, json: bool) -> Result<Dataset> {
    if json {
        let text = match input {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read '{}'", path.display()))?,
            None => {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read JSON from stdin")?;
                buf
            }
        };
        let value: serde_json::Value = serde_json::from_str(&text).context("Failed to parse JSON input")?;
        return Dataset::from_json(&value);
    }

    let csv_data = match input {
        Some(path) => csv_reader::read_csv_from_path(path)?,
        None => csv_reader::read_csv_from_stdin().context("Failed to read CSV from stdin")?,
    };
    csv_data.into_dataset()
}

fn write_output(bytes: &[u8], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write '{}'", path.display())),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(bytes).context("Failed to write chart to stdout")?;
            handle.flush().context("Failed to flush stdout")
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let registry = ChartRegistry::builtin();
    if args.list_charts {
        list_charts(&registry);
        return Ok(());
    }

    let mut pipeline = Pipeline::new(registry, &config.pipeline);

    // 1. Inputs: either a whole project, or data plus a chart
    if let Some(path) = &args.project {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read project '{}'", path.display()))?;
        if let Err(err) = pipeline.load_project(&json) {
            eprintln!("{}", messages::project_notice(&err));
            std::process::exit(1);
        }
        if let Some(id) = &args.chart {
            let id = resolve_chart_id(pipeline.registry(), id);
            if pipeline.chart().map(|c| c.id()) != Some(id.as_str()) {
                pipeline.set_chart(&id)?;
            }
        }
    } else {
        let dataset = read_dataset(args.input.as_deref(), args.json)?;
        info!(rows = dataset.len(), columns = dataset.columns().len(), "Dataset loaded");
        pipeline.set_dataset(dataset);

        let id = match &args.chart {
            Some(id) => resolve_chart_id(pipeline.registry(), id),
            None => pipeline
                .registry()
                .first()
                .map(|c| c.id().to_string())
                .context("No charts are registered")?,
        };
        pipeline.set_chart(&id)?;
    }

    // 2. Mapping
    if let Some(dsl) = &args.map {
        for binding in parser::parse_mapping(dsl)? {
            pipeline
                .bind(&binding.dimension, &binding.columns)
                .with_context(|| format!("Failed to map dimension '{}'", binding.dimension))?;
        }
    }

    // 3. Visual options: export size from the config first, then --set
    if let Some(width) = config.export.width {
        pipeline.set_option("width", OptionValue::Number(width as f64))?;
    }
    if let Some(height) = config.export.height {
        pipeline.set_option("height", OptionValue::Number(height as f64))?;
    }
    if let Some(dsl) = &args.set {
        for (id, value) in parser::parse_options(dsl)? {
            pipeline
                .set_option(&id, value)
                .with_context(|| format!("Invalid value for option '{}'", id))?;
        }
    }
    pipeline.flush();

    if let Some(path) = &args.save_project {
        let json = pipeline.export_project()?;
        std::fs::write(path, json).with_context(|| format!("Failed to write project '{}'", path.display()))?;
        info!(path = %path.display(), "Project saved");
    }

    if let Some(notice) = pipeline.notice() {
        let prefix = match notice.level {
            NoticeLevel::Secondary => "Note",
            NoticeLevel::Danger => "Error",
        };
        eprintln!("{}: {}", prefix, notice);
    }

    // 4. Export
    match pipeline.state() {
        PipelineState::Rendered => {
            let format = args.format.unwrap_or(config.export.format);
            let bytes = pipeline.export(format)?;
            write_output(&bytes, args.output.as_deref())?;
        }
        PipelineState::Invalid(_) | PipelineState::RenderFailed(_) => std::process::exit(1),
        _ => {
            if args.save_project.is_none() {
                eprintln!("Nothing to render");
            }
        }
    }

    Ok(())
}
