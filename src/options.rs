//! Visual options: per-chart schema, concrete values and the resolver that fills them.

use crate::data::Dataset;
use crate::mapping::Mapping;
use crate::palette::{parse_color, ColorScale};
use crate::transform::distinct_keys;
use anyhow::{anyhow, Result};
use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptionKind {
    Number,
    Text,
    Boolean,
    Color,
    ColorScale,
}

/// Concrete value of one visual option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Number(f64),
    Text(String),
    ColorScale(ColorScale),
}

impl OptionValue {
    /// Whether this value can stand for an option of `kind`
    pub fn fits(&self, kind: OptionKind) -> bool {
        match (self, kind) {
            (OptionValue::Number(n), OptionKind::Number) => n.is_finite(),
            (OptionValue::Text(_), OptionKind::Text) => true,
            (OptionValue::Bool(_), OptionKind::Boolean) => true,
            (OptionValue::Text(s), OptionKind::Color) => parse_color(s).is_some(),
            (OptionValue::ColorScale(_), OptionKind::ColorScale) => true,
            _ => false,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, OptionValue::ColorScale(_))
    }
}

impl From<f64> for OptionValue {
    fn from(n: f64) -> Self {
        OptionValue::Number(n)
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Text(s.to_string())
    }
}

impl From<ColorScale> for OptionValue {
    fn from(scale: ColorScale) -> Self {
        OptionValue::ColorScale(scale)
    }
}

/// Declaration of one option: kind, label, default and UI grouping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSpec {
    pub id: String,
    pub kind: OptionKind,
    pub label: String,
    pub default: OptionValue,
    pub group: String,
    /// Closed set of accepted text values; empty means free text.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    /// Dimension whose mapped column drives a derived default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    /// Inclusive bounds of a number option
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
}

impl OptionSpec {
    fn new(id: &str, kind: OptionKind, label: &str, default: OptionValue) -> Self {
        Self {
            id: id.to_string(),
            kind,
            label: label.to_string(),
            default,
            group: "chart".to_string(),
            choices: Vec::new(),
            dimension: None,
            range: None,
        }
    }

    pub fn number(id: &str, label: &str, default: f64) -> Self {
        Self::new(id, OptionKind::Number, label, default.into())
    }

    pub fn text(id: &str, label: &str, default: &str) -> Self {
        Self::new(id, OptionKind::Text, label, default.into())
    }

    pub fn boolean(id: &str, label: &str, default: bool) -> Self {
        Self::new(id, OptionKind::Boolean, label, default.into())
    }

    pub fn color(id: &str, label: &str, default: &str) -> Self {
        Self::new(id, OptionKind::Color, label, default.into())
    }

    /// Color scale whose domain follows the column mapped to `dimension`
    pub fn color_scale(id: &str, label: &str, default: ColorScale, dimension: &str) -> Self {
        let mut spec = Self::new(id, OptionKind::ColorScale, label, default.into());
        spec.dimension = Some(dimension.to_string());
        spec
    }

    pub fn group(mut self, group: &str) -> Self {
        self.group = group.to_string();
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn choices(mut self, choices: &[&str]) -> Self {
        self.choices = choices.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Check a candidate value against kind and choices
    pub fn check(&self, value: &OptionValue) -> Result<()> {
        if !value.fits(self.kind) {
            anyhow::bail!("Option '{}' expects a {:?} value, got {:?}", self.id, self.kind, value);
        }
        if let (OptionValue::Number(n), Some((min, max))) = (value, self.range) {
            if *n < min || *n > max {
                anyhow::bail!("Option '{}' must be between {} and {}, got {}", self.id, min, max, n);
            }
        }
        if let OptionValue::Text(s) = value {
            if !self.choices.is_empty() && !self.choices.contains(s) {
                anyhow::bail!(
                    "Option '{}' must be one of {}, got '{}'",
                    self.id,
                    self.choices.join(", "),
                    s
                );
            }
        }
        Ok(())
    }
}

/// Ordered option declarations of one chart.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct OptionsSchema {
    specs: Vec<OptionSpec>,
}

impl OptionsSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options every chart shares: artboard size and background
    pub fn artboard() -> Self {
        Self::new()
            .with(OptionSpec::number("width", "Width", 805.0).group("artboard"))
            .with(OptionSpec::number("height", "Height", 600.0).group("artboard"))
            .with(OptionSpec::color("background", "Background", "#FFFFFF").group("artboard"))
    }

    pub fn with(mut self, spec: OptionSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Append another schema; later duplicates of an id are ignored
    pub fn extend(mut self, other: OptionsSchema) -> Self {
        for spec in other.specs {
            if self.get(&spec.id).is_none() {
                self.specs.push(spec);
            }
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&OptionSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Validate a single value before it is applied
    pub fn check(&self, id: &str, value: &OptionValue) -> Result<()> {
        self.get(id)
            .ok_or_else(|| anyhow!("Unknown visual option '{}'", id))?
            .check(value)
    }
}

/// Option id to concrete value. Every schema key is present once resolved.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisualOptions(BTreeMap<String, OptionValue>);

impl VisualOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&OptionValue> {
        self.0.get(id)
    }

    pub fn set(&mut self, id: &str, value: OptionValue) {
        self.0.insert(id.to_string(), value);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.0.iter()
    }

    fn require(&self, id: &str) -> Result<&OptionValue> {
        self.get(id).ok_or_else(|| anyhow!("Visual option '{}' is not set", id))
    }

    pub fn number(&self, id: &str) -> Result<f64> {
        match self.require(id)? {
            OptionValue::Number(n) => Ok(*n),
            other => Err(anyhow!("Visual option '{}' is not a number: {:?}", id, other)),
        }
    }

    pub fn text(&self, id: &str) -> Result<&str> {
        match self.require(id)? {
            OptionValue::Text(s) => Ok(s),
            other => Err(anyhow!("Visual option '{}' is not text: {:?}", id, other)),
        }
    }

    pub fn boolean(&self, id: &str) -> Result<bool> {
        match self.require(id)? {
            OptionValue::Bool(b) => Ok(*b),
            other => Err(anyhow!("Visual option '{}' is not a boolean: {:?}", id, other)),
        }
    }

    pub fn color(&self, id: &str) -> Result<RGBColor> {
        let s = self.text(id)?;
        parse_color(s).ok_or_else(|| anyhow!("Visual option '{}' is not a valid color: '{}'", id, s))
    }

    pub fn color_scale(&self, id: &str) -> Result<&ColorScale> {
        match self.require(id)? {
            OptionValue::ColorScale(scale) => Ok(scale),
            other => Err(anyhow!("Visual option '{}' is not a color scale: {:?}", id, other)),
        }
    }
}

/// Every schema key set to its declared default
pub fn resolve_defaults(schema: &OptionsSchema) -> VisualOptions {
    let mut options = VisualOptions::new();
    for spec in schema.iter() {
        options.set(&spec.id, spec.default.clone());
    }
    options
}

/// Defaults with dataset-dependent rules evaluated against the current mapping
pub fn resolve_defaults_for(schema: &OptionsSchema, dataset: &Dataset, mapping: &Mapping) -> VisualOptions {
    let mut options = resolve_defaults(schema);
    refresh_derived(schema, &mut options, dataset, mapping);
    options
}

/// Restore a saved options value against the schema.
///
/// Missing keys and values of the wrong kind fall back to the default, keys the schema
/// does not know are dropped, and structured values are marked as loaded.
pub fn rehydrate(schema: &OptionsSchema, saved: &VisualOptions) -> VisualOptions {
    for id in saved.0.keys() {
        if schema.get(id).is_none() {
            warn!(option = %id, "Dropping unknown visual option");
        }
    }

    let mut options = VisualOptions::new();
    for spec in schema.iter() {
        let value = match saved.get(&spec.id) {
            Some(v) if spec.check(v).is_ok() => v.clone(),
            Some(v) => {
                warn!(option = %spec.id, value = ?v, "Saved value does not fit option, using default");
                spec.default.clone()
            }
            None => spec.default.clone(),
        };
        let value = match value {
            OptionValue::ColorScale(mut scale) => {
                scale.loaded = true;
                OptionValue::ColorScale(scale)
            }
            other => other,
        };
        options.set(&spec.id, value);
    }
    options
}

/// Recompute derived color scale domains from the column mapped to their dimension.
/// Scales carrying the loaded marker keep their domain.
pub fn refresh_derived(schema: &OptionsSchema, options: &mut VisualOptions, dataset: &Dataset, mapping: &Mapping) {
    for spec in schema.iter() {
        let Some(dimension) = &spec.dimension else {
            continue;
        };
        let Some(OptionValue::ColorScale(scale)) = options.0.get_mut(&spec.id) else {
            continue;
        };
        if scale.loaded {
            continue;
        }
        scale.domain = mapping
            .column(dimension)
            .map(|column| distinct_keys(dataset, column))
            .unwrap_or_default();
    }
}
