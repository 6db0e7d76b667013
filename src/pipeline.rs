//! Pipeline orchestrator: owns the inputs and the drawing surface and recomputes the
//! chart whenever the chart, dataset, mapping or (debounced) visual options change.

use crate::chart::{ChartDescriptor, ChartRegistry, RenderContext, Reshaped};
use crate::config::{OutputFormat, PipelineConfig};
use crate::data::Dataset;
use crate::debounce::{Clock, Debouncer, SystemClock};
use crate::error::{ProjectError, ValidationError};
use crate::mapping::{Mapping, MappingEntry};
use crate::messages::{self, Notice};
use crate::options::{refresh_derived, resolve_defaults_for, OptionValue, VisualOptions};
use crate::project;
use crate::surface::{Scene, Surface};
use crate::validate::validate;
use anyhow::{anyhow, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    /// No chart, no rows, or nothing to draw. The surface is empty.
    Empty,
    Validating,
    Invalid(ValidationError),
    Reshaping,
    Rendered,
    RenderFailed(String),
}

pub struct Pipeline<S = Scene, C = SystemClock> {
    registry: ChartRegistry,
    chart: Option<Arc<ChartDescriptor>>,
    dataset: Option<Dataset>,
    mapping: Mapping,
    options: VisualOptions,
    pending: Debouncer<VisualOptions>,
    surface: S,
    clock: C,
    state: PipelineState,
    render_cycles: usize,
}

impl Pipeline {
    pub fn new(registry: ChartRegistry, config: &PipelineConfig) -> Self {
        Self::with_parts(registry, config, Scene::default(), SystemClock)
    }
}

impl<S: Surface, C: Clock> Pipeline<S, C> {
    pub fn with_parts(registry: ChartRegistry, config: &PipelineConfig, surface: S, clock: C) -> Self {
        Self {
            registry,
            chart: None,
            dataset: None,
            mapping: Mapping::new(),
            options: VisualOptions::new(),
            pending: Debouncer::new(config.debounce()),
            surface,
            clock,
            state: PipelineState::Empty,
            render_cycles: 0,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Inline message for the current state, if any
    pub fn notice(&self) -> Option<Notice> {
        messages::notice(&self.state)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn registry(&self) -> &ChartRegistry {
        &self.registry
    }

    pub fn chart(&self) -> Option<&Arc<ChartDescriptor>> {
        self.chart.as_ref()
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Options applied by the last recompute; pending edits are not included
    pub fn options(&self) -> &VisualOptions {
        &self.options
    }

    pub fn has_pending_options(&self) -> bool {
        self.pending.is_pending()
    }

    /// Number of reshape/render attempts so far
    pub fn render_cycles(&self) -> usize {
        self.render_cycles
    }

    /// Switch chart: the mapping is reset and options go back to the chart's defaults.
    pub fn set_chart(&mut self, id: &str) -> Result<()> {
        let chart = self
            .registry
            .get(id)
            .ok_or_else(|| anyhow!("Unknown chart '{}' (available: {})", id, self.registry.ids().join(", ")))?;
        debug!(chart = %id, "Active chart changed, resetting mapping");
        self.pending.cancel();
        self.mapping = Mapping::new();
        self.options = self.default_options(&chart);
        self.chart = Some(chart);
        self.recompute();
        Ok(())
    }

    /// Replace the dataset. The mapping survives only if the ordered column names are unchanged.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        let same_columns = self
            .dataset
            .as_ref()
            .is_some_and(|old| old.column_names() == dataset.column_names());

        if same_columns {
            self.mapping = self.rebind(&self.mapping, &dataset);
        } else if !self.mapping.is_empty() {
            debug!("Dataset columns changed, resetting mapping");
            self.mapping = Mapping::new();
        }

        self.dataset = Some(dataset);
        self.refresh_options();
        self.recompute();
    }

    /// Replace the whole mapping. Keys must name dimensions of the active chart.
    pub fn set_mapping(&mut self, mapping: Mapping) -> Result<()> {
        let chart = self.active_chart()?;
        if let Some(key) = mapping.keys().find(|k| chart.dimension(k).is_none()) {
            anyhow::bail!("Chart '{}' has no dimension '{}'", chart.id(), key);
        }
        self.mapping = mapping;
        self.refresh_options();
        self.recompute();
        Ok(())
    }

    /// Bind dataset columns to one dimension. An empty column list removes the binding.
    pub fn bind(&mut self, dimension: &str, columns: &[String]) -> Result<()> {
        let chart = self.active_chart()?;
        let dim = chart
            .dimension(dimension)
            .ok_or_else(|| anyhow!("Chart '{}' has no dimension '{}'", chart.id(), dimension))?;
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| anyhow!("Load a dataset before mapping columns"))?;

        if columns.is_empty() {
            self.mapping.remove(dimension);
        } else {
            let entry = MappingEntry::bind(dim, columns, dataset);
            self.mapping.insert(dimension, entry);
        }
        self.refresh_options();
        self.recompute();
        Ok(())
    }

    /// Edit one visual option. The recompute is debounced; see [`Pipeline::tick`].
    pub fn set_option(&mut self, id: &str, value: OptionValue) -> Result<()> {
        let chart = self.active_chart()?;
        chart.schema().check(id, &value)?;

        // Only the edits are queued; they land on whatever the options are when the timer fires
        let mut edits = self.pending.cancel().unwrap_or_default();
        edits.set(id, value);
        self.pending.schedule(edits, self.clock.now());
        Ok(())
    }

    /// Apply pending option edits whose debounce delay has elapsed. Returns true if a recompute ran.
    pub fn tick(&mut self) -> bool {
        match self.pending.poll(self.clock.now()) {
            Some(edits) => {
                self.apply_edits(edits);
                true
            }
            None => false,
        }
    }

    /// Apply pending option edits immediately
    pub fn flush(&mut self) -> bool {
        match self.pending.flush() {
            Some(edits) => {
                self.apply_edits(edits);
                true
            }
            None => false,
        }
    }

    /// Replace every input from a project document. Nothing changes unless the whole document decodes.
    pub fn load_project(&mut self, json: &str) -> Result<(), ProjectError> {
        let project = project::load(json, &self.registry)?;
        info!(chart = %project.chart.id(), "Project loaded");
        self.pending.cancel();
        self.chart = Some(project.chart);
        self.dataset = Some(project.dataset);
        self.mapping = project.mapping;
        self.options = project.options;
        self.refresh_options();
        self.recompute();
        Ok(())
    }

    pub fn export_project(&self) -> Result<String> {
        let chart = self.active_chart()?;
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| anyhow!("There is no dataset to save"))?;
        Ok(project::save(&chart, dataset, &self.mapping, &self.options)?)
    }

    /// Serialize the rendered surface. Only available in the `Rendered` state.
    pub fn export(&self, format: OutputFormat) -> Result<Vec<u8>> {
        if self.state != PipelineState::Rendered {
            anyhow::bail!("Nothing to export: the chart is not rendered ({:?})", self.state);
        }
        let bytes = match format {
            OutputFormat::Svg => self.surface.export_vector()?.into_bytes(),
            OutputFormat::Png => self.surface.export_image()?,
        };
        info!(format = ?format, bytes = bytes.len(), "Exported chart");
        Ok(bytes)
    }

    fn active_chart(&self) -> Result<Arc<ChartDescriptor>> {
        self.chart.clone().ok_or_else(|| anyhow!("No chart selected"))
    }

    fn default_options(&self, chart: &ChartDescriptor) -> VisualOptions {
        match &self.dataset {
            Some(dataset) => resolve_defaults_for(chart.schema(), dataset, &self.mapping),
            None => crate::options::resolve_defaults(chart.schema()),
        }
    }

    fn apply_edits(&mut self, edits: VisualOptions) {
        for (id, value) in edits.iter() {
            self.options.set(id, value.clone());
        }
        self.refresh_options();
        self.recompute();
    }

    fn refresh_options(&mut self) {
        if let (Some(chart), Some(dataset)) = (&self.chart, &self.dataset) {
            refresh_derived(chart.schema(), &mut self.options, dataset, &self.mapping);
        }
    }

    fn rebind(&self, mapping: &Mapping, dataset: &Dataset) -> Mapping {
        let Some(chart) = &self.chart else {
            return mapping.clone();
        };
        let mut rebound = Mapping::new();
        for (dim_id, entry) in mapping.iter() {
            match chart.dimension(dim_id) {
                Some(dim) => rebound.insert(dim_id, MappingEntry::bind(dim, &entry.ids, dataset)),
                None => rebound.insert(dim_id, entry.clone()),
            }
        }
        rebound
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = ?self.state, to = ?next, "Pipeline transition");
        self.state = next;
    }

    fn fail(&mut self, message: String) {
        self.surface.clear();
        let message = if message.trim().is_empty() {
            "Unknown render error".to_string()
        } else {
            message
        };
        warn!(error = %message, "Chart render failed");
        self.transition(PipelineState::RenderFailed(message));
    }

    fn recompute(&mut self) {
        self.surface.clear();
        self.transition(PipelineState::Validating);

        let Some(chart) = self.chart.clone() else {
            self.transition(PipelineState::Empty);
            return;
        };

        if let Err(err) = validate(&chart, &self.mapping) {
            debug!(chart = %chart.id(), reason = %err, "Mapping not ready");
            self.transition(PipelineState::Invalid(err));
            return;
        }

        if !self.dataset.as_ref().is_some_and(|d| !d.is_empty()) {
            self.transition(PipelineState::Empty);
            return;
        }

        self.transition(PipelineState::Reshaping);
        self.render_cycles += 1;

        let surface = &mut self.surface;
        let dataset = &self.dataset;
        let mapping = &self.mapping;
        let options = &self.options;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<bool> {
            let Some(dataset) = dataset.as_ref() else {
                return Ok(false);
            };
            let data = match chart.reshape(dataset, mapping)? {
                Reshaped::Nothing => return Ok(false),
                Reshaped::Ready(data) => data,
            };
            let width = options.number("width")?.max(0.0).round() as u32;
            let height = options.number("height")?.max(0.0).round() as u32;
            surface.set_size(width, height);
            let ctx = RenderContext {
                options,
                mapping,
                dataset,
            };
            chart.render(surface, &*data, &ctx)?;
            Ok(true)
        }));

        match outcome {
            Ok(Ok(true)) => {
                info!(chart = %chart.id(), elements = self.surface.elements().len(), "Chart rendered");
                self.transition(PipelineState::Rendered);
            }
            Ok(Ok(false)) => {
                self.surface.clear();
                debug!(chart = %chart.id(), "Nothing to render");
                self.transition(PipelineState::Empty);
            }
            Ok(Err(err)) => self.fail(err.to_string()),
            Err(payload) => self.fail(panic_message(payload.as_ref())),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Chart renderer panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartMetadata, ChartPlugin, Dimension};
    use crate::data::DataType;
    use crate::debounce::ManualClock;
    use crate::options::OptionsSchema;
    use crate::surface::VisualElement;
    use std::time::Duration;

    fn dataset(rows: &[(&str, &str)]) -> Dataset {
        Dataset::from_raw(
            vec!["score".into(), "team".into()],
            rows.iter().map(|(a, b)| vec![a.to_string(), b.to_string()]).collect(),
        )
        .unwrap()
    }

    fn scores() -> Dataset {
        dataset(&[
            ("1", "a"),
            ("2", "a"),
            ("3", "b"),
            ("4", "b"),
            ("5", "c"),
            ("6", "c"),
            ("7", "a"),
            ("8", "b"),
            ("9", "c"),
            ("10", "a"),
        ])
    }

    fn pipeline(clock: &ManualClock) -> Pipeline<Scene, ManualClock> {
        Pipeline::with_parts(
            ChartRegistry::builtin(),
            &PipelineConfig::default(),
            Scene::default(),
            clock.clone(),
        )
    }

    fn histogram(clock: &ManualClock) -> Pipeline<Scene, ManualClock> {
        let mut p = pipeline(clock);
        p.set_chart("rawchart.histogram").unwrap();
        p.set_dataset(scores());
        p.bind("value", &["score".to_string()]).unwrap();
        p
    }

    #[test]
    fn test_starts_empty() {
        let mut p = pipeline(&ManualClock::new());
        assert_eq!(p.state(), &PipelineState::Empty);
        p.set_dataset(scores());
        assert_eq!(p.state(), &PipelineState::Empty);
        assert!(p.export(OutputFormat::Svg).is_err());
    }

    #[test]
    fn test_renders_once_mapped() {
        let p = histogram(&ManualClock::new());
        assert_eq!(p.state(), &PipelineState::Rendered);
        assert!(!p.surface().is_empty());
        assert_eq!(p.surface().size(), (805, 600));
        assert!(p.notice().is_none());
        let svg = String::from_utf8(p.export(OutputFormat::Svg).unwrap()).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_invalid_mapping_clears_surface() {
        let clock = ManualClock::new();
        let mut p = histogram(&clock);
        p.bind("value", &["team".to_string()]).unwrap();
        assert!(matches!(
            p.state(),
            PipelineState::Invalid(ValidationError::TypeMismatch { .. })
        ));
        assert!(p.surface().is_empty());

        p.bind("value", &[]).unwrap();
        assert_eq!(
            p.state(),
            &PipelineState::Invalid(ValidationError::MissingRequiredDimension(vec!["value".into()]))
        );
    }

    #[test]
    fn test_chart_change_resets_mapping() {
        let mut p = histogram(&ManualClock::new());
        assert!(!p.mapping().is_empty());
        p.set_chart("rawchart.mosaic").unwrap();
        assert!(p.mapping().is_empty());
        assert!(matches!(p.state(), PipelineState::Invalid(_)));
        assert!(p.options().contains("showLabels"));
    }

    #[test]
    fn test_column_change_resets_mapping() {
        let mut p = histogram(&ManualClock::new());

        // same columns, new values
        p.set_dataset(dataset(&[("3", "x"), ("4", "y")]));
        assert_eq!(p.mapping().columns("value"), vec!["score"]);
        assert_eq!(p.state(), &PipelineState::Rendered);

        // same names, different order
        let reordered = Dataset::from_raw(
            vec!["team".into(), "score".into()],
            vec![vec!["x".into(), "3".into()]],
        )
        .unwrap();
        p.set_dataset(reordered);
        assert!(p.mapping().is_empty());
    }

    #[test]
    fn test_option_burst_renders_once_with_last_value() {
        let clock = ManualClock::new();
        let mut p = histogram(&clock);
        let before = p.render_cycles();

        for bins in [5.0, 6.0, 7.0] {
            p.set_option("bins", OptionValue::Number(bins)).unwrap();
            clock.advance(Duration::from_millis(50));
            assert!(!p.tick());
        }
        assert_eq!(p.render_cycles(), before);
        assert_eq!(p.options().number("bins").unwrap(), 20.0);

        clock.advance(Duration::from_millis(200));
        assert!(p.tick());
        assert!(!p.tick());
        assert_eq!(p.render_cycles(), before + 1);
        assert_eq!(p.options().number("bins").unwrap(), 7.0);
    }

    #[test]
    fn test_set_option_rejects_bad_values() {
        let mut p = histogram(&ManualClock::new());
        assert!(p.set_option("bins", OptionValue::Text("x".into())).is_err());
        assert!(p.set_option("nope", OptionValue::Number(1.0)).is_err());
        assert!(p.set_option("bins", OptionValue::Number(1e15)).is_err());
        assert!(!p.has_pending_options());
    }

    #[test]
    fn test_pending_edit_keeps_domain_from_later_binding() {
        let clock = ManualClock::new();
        let mut p = pipeline(&clock);
        p.set_chart("rawchart.mosaic").unwrap();
        p.set_dataset(scores());
        p.bind("column", &["team".to_string()]).unwrap();
        p.bind("row", &["team".to_string()]).unwrap();
        p.bind("size", &["score".to_string()]).unwrap();

        p.set_option("padding", OptionValue::Number(4.0)).unwrap();
        p.bind("color", &["team".to_string()]).unwrap();
        assert_eq!(p.options().color_scale("color").unwrap().domain, vec!["a", "b", "c"]);

        clock.advance(Duration::from_millis(250));
        assert!(p.tick());
        assert_eq!(p.options().number("padding").unwrap(), 4.0);
        assert_eq!(p.options().color_scale("color").unwrap().domain, vec!["a", "b", "c"]);
        assert_eq!(p.state(), &PipelineState::Rendered);
    }

    #[test]
    fn test_mapping_change_is_not_debounced() {
        let clock = ManualClock::new();
        let mut p = histogram(&clock);
        let before = p.render_cycles();
        p.bind("value", &["score".to_string()]).unwrap();
        assert_eq!(p.render_cycles(), before + 1);
    }

    #[test]
    fn test_render_error_reaches_render_failed() {
        let clock = ManualClock::new();
        let mut p = histogram(&clock);
        p.set_option("marginTop", OptionValue::Number(400.0)).unwrap();
        p.set_option("marginBottom", OptionValue::Number(400.0)).unwrap();
        assert!(p.flush());
        match p.state() {
            PipelineState::RenderFailed(msg) => assert!(msg.contains("Paddings are too high")),
            other => panic!("unexpected state {:?}", other),
        }
        assert!(p.surface().is_empty());
        let notice = p.notice().unwrap();
        assert!(notice.text.starts_with("Chart error: "));
    }

    struct Exploding {
        panic: bool,
    }

    impl ChartPlugin for Exploding {
        type Data = usize;

        fn metadata(&self) -> ChartMetadata {
            ChartMetadata {
                id: if self.panic { "test.panic".into() } else { "test.error".into() },
                name: "Exploding".into(),
                description: String::new(),
                categories: Vec::new(),
            }
        }

        fn dimensions(&self) -> Vec<Dimension> {
            vec![Dimension::new("value", "Value").accepts(&[DataType::Number]).required()]
        }

        fn visual_options(&self) -> OptionsSchema {
            OptionsSchema::new()
        }

        fn map_data(&self, dataset: &Dataset, _: &Mapping, _: &[Dimension]) -> Result<Reshaped<usize>> {
            Ok(Reshaped::Ready(dataset.len()))
        }

        fn render(&self, surface: &mut dyn Surface, _: &usize, _: &RenderContext<'_>) -> Result<()> {
            surface.append(VisualElement::text((0.0, 0.0), "partial", 10.0));
            if self.panic {
                panic!("renderer exploded");
            }
            anyhow::bail!("renderer failed")
        }
    }

    #[test]
    fn test_throwing_render_leaves_surface_empty() {
        for panic in [false, true] {
            let mut registry = ChartRegistry::builtin();
            registry.register(ChartDescriptor::new(Exploding { panic })).unwrap();
            let mut p = Pipeline::with_parts(registry, &PipelineConfig::default(), Scene::default(), ManualClock::new());
            p.set_chart(if panic { "test.panic" } else { "test.error" }).unwrap();
            p.set_dataset(scores());
            p.bind("value", &["score".to_string()]).unwrap();

            match p.state() {
                PipelineState::RenderFailed(msg) => assert!(!msg.is_empty()),
                other => panic!("unexpected state {:?}", other),
            }
            assert!(p.surface().is_empty());
            assert!(p.export(OutputFormat::Png).is_err());
        }
    }

    #[test]
    fn test_empty_dataset_is_empty_state() {
        let mut p = histogram(&ManualClock::new());
        let empty = Dataset::new(p.dataset().unwrap().columns().to_vec(), Vec::new()).unwrap();
        p.set_dataset(empty);
        assert_eq!(p.state(), &PipelineState::Empty);
        assert!(p.surface().is_empty());
    }

    #[test]
    fn test_project_round_trip_through_pipeline() {
        let clock = ManualClock::new();
        let mut p = histogram(&clock);
        p.set_option("bins", OptionValue::Number(4.0)).unwrap();
        p.flush();
        let json = p.export_project().unwrap();

        let mut other = pipeline(&clock);
        other.load_project(&json).unwrap();
        assert_eq!(other.state(), &PipelineState::Rendered);
        assert_eq!(other.mapping(), p.mapping());
        assert_eq!(other.options(), p.options());
    }

    #[test]
    fn test_failed_project_load_changes_nothing() {
        let mut p = histogram(&ManualClock::new());
        let before = p.mapping().clone();
        let err = p
            .load_project(r#"{"version": "1.0", "chart": "rawchart.pie"}"#)
            .unwrap_err();
        assert!(matches!(err, ProjectError::UnknownChart(_)));
        assert_eq!(p.mapping(), &before);
        assert_eq!(p.state(), &PipelineState::Rendered);
    }
}
