use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

/// Export size and format. Width and height override the chart's artboard options when set.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ExportOptions {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    200
}

impl PipelineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Contents of a `--config` file
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub export: ExportOptions,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse config JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.pipeline.debounce(), Duration::from_millis(200));
        assert_eq!(config.export.format, OutputFormat::Png);
        assert_eq!(config.export.width, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"pipeline": {{"debounce_ms": 50}}, "export": {{"width": 400, "type": "svg"}}}}"#
        )
        .unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.pipeline.debounce_ms, 50);
        assert_eq!(config.export.width, Some(400));
        assert_eq!(config.export.format, OutputFormat::Svg);
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(Config::from_json_str("{not json").is_err());
    }
}
