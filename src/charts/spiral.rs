use super::{background, PADDINGS_TOO_HIGH};
use crate::chart::{ChartMetadata, ChartPlugin, Dimension, RenderContext, Reshaped};
use crate::curve::catmull_rom;
use crate::data::{DataType, Dataset};
use crate::mapping::Mapping;
use crate::options::{OptionSpec, OptionsSchema, VisualOptions};
use crate::palette::{parse_color, ColorScale, OrdinalPalette, ScaleType, FALLBACK};
use crate::scale::{format_tick, LinearScale};
use crate::surface::{Anchor, Stroke, Surface, VisualElement};
use crate::transform::{calculate_grid_dimensions, GroupKey};
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use plotters::style::RGBColor;
use std::collections::BTreeMap;
use std::f64::consts::TAU;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const GRID_PADDING: f64 = 10.0;
// Inner margins of one small multiple: top, right, bottom, left
const CELL_MARGIN: (f64, f64, f64, f64) = (30.0, 20.0, 20.0, 20.0);
const SINGLE_MARGIN: f64 = 50.0;
const CURVE_SAMPLES: usize = 8;
const GRID_COLOR: RGBColor = RGBColor(204, 204, 204);
const LABEL_COLOR: RGBColor = RGBColor(102, 102, 102);

/// Time series wrapped around the calendar year
pub struct Spiral;

#[derive(Debug, Clone, PartialEq)]
pub struct SpiralPoint {
    pub date: NaiveDate,
    /// One slot per value column, `None` when the column had no number for this date
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpiralSeries {
    pub name: String,
    /// Ascending by date
    pub points: Vec<SpiralPoint>,
}

impl SpiralSeries {
    pub fn total(&self) -> f64 {
        self.points.iter().flat_map(|p| p.values.iter().flatten()).sum()
    }

    /// Largest value across every value column, `None` when nothing is positive
    pub fn max(&self) -> Option<f64> {
        self.points
            .iter()
            .flat_map(|p| p.values.iter().flatten().copied())
            .filter(|v| v.is_finite() && *v > 0.0)
            .max_by(f64::total_cmp)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpiralData {
    pub value_columns: Vec<String>,
    pub series: Vec<SpiralSeries>,
    /// True when a series dimension is mapped and one chart is drawn per series
    pub by_series: bool,
    pub max_value: f64,
}

/// Angle of a date inside its year, clockwise from twelve o'clock
pub fn date_angle(date: NaiveDate) -> f64 {
    date.ordinal0() as f64 / 366.0 * TAU
}

fn project(angle: f64, radius: f64) -> (f64, f64) {
    (radius * angle.sin(), -radius * angle.cos())
}

fn month_angle(month: u32) -> Option<f64> {
    NaiveDate::from_ymd_opt(2021, month, 1).map(date_angle)
}

impl ChartPlugin for Spiral {
    type Data = SpiralData;

    fn metadata(&self) -> ChartMetadata {
        ChartMetadata {
            id: "rawchart.spiral".to_string(),
            name: "Radial time series".to_string(),
            description: "Values plotted around the calendar year, one small multiple per series.".to_string(),
            categories: vec!["time series".to_string()],
        }
    }

    fn dimensions(&self) -> Vec<Dimension> {
        vec![
            Dimension::new("date", "Date").accepts(&[DataType::Date]).required(),
            Dimension::new("value", "Value")
                .accepts(&[DataType::Number])
                .required()
                .multiple(),
            Dimension::new("series", "Series").accepts(&[DataType::String, DataType::Number, DataType::Date]),
        ]
    }

    fn visual_options(&self) -> OptionsSchema {
        OptionsSchema::new()
            .with(OptionSpec::number("maxRadius", "Max radius", 400.0))
            .with(OptionSpec::number("strokeWidth", "Stroke width", 2.0))
            .with(OptionSpec::color_scale(
                "color",
                "Color scale",
                ColorScale::new(ScaleType::Ordinal, "interpolateSpectral"),
                "series",
            ))
            .with(OptionSpec::number("columnsNumber", "Number of columns", 3.0).group("series"))
            .with(
                OptionSpec::text("sortSeriesBy", "Sort series by", "name")
                    .choices(&["name", "totalDescending", "totalAscending"])
                    .group("series"),
            )
            .with(OptionSpec::boolean("showSeriesLabels", "Show series titles", true).group("series"))
    }

    fn map_data(&self, dataset: &Dataset, mapping: &Mapping, _dimensions: &[Dimension]) -> Result<Reshaped<SpiralData>> {
        let Some(date_idx) = mapping.column("date").and_then(|c| dataset.column_index(c)) else {
            return Ok(Reshaped::Nothing);
        };
        let value_columns: Vec<String> = mapping
            .columns("value")
            .into_iter()
            .filter(|c| dataset.column_index(c).is_some())
            .map(str::to_string)
            .collect();
        let value_idx: Vec<usize> = value_columns.iter().filter_map(|c| dataset.column_index(c)).collect();
        if value_idx.is_empty() {
            return Ok(Reshaped::Nothing);
        }
        let series_idx = mapping.column("series").and_then(|c| dataset.column_index(c));

        // 1. Rollup series -> date, first valid number per value column
        let mut groups: BTreeMap<GroupKey, BTreeMap<NaiveDate, Vec<Option<f64>>>> = BTreeMap::new();
        for row in dataset.rows() {
            let Some(date) = row[date_idx].as_date() else {
                continue;
            };
            let series = match series_idx {
                Some(i) if row[i].is_null() => continue,
                Some(i) => row[i].clone(),
                None => crate::data::Value::Null,
            };
            let slots = groups
                .entry(GroupKey(series))
                .or_default()
                .entry(date)
                .or_insert_with(|| vec![None; value_idx.len()]);
            for (slot, &i) in slots.iter_mut().zip(&value_idx) {
                if slot.is_none() {
                    *slot = row[i].as_f64();
                }
            }
        }

        let series: Vec<SpiralSeries> = groups
            .into_iter()
            .map(|(key, dates)| SpiralSeries {
                name: key.label(),
                points: dates
                    .into_iter()
                    .map(|(date, values)| SpiralPoint { date, values })
                    .collect(),
            })
            .collect();

        // 2. Radius extent, always from zero
        let max_value = series
            .iter()
            .flat_map(|s| s.points.iter().flat_map(|p| p.values.iter().flatten()))
            .fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        if !max_value.is_finite() || max_value <= 0.0 {
            return Ok(Reshaped::Nothing);
        }

        Ok(Reshaped::Ready(SpiralData {
            value_columns,
            series,
            by_series: series_idx.is_some(),
            max_value,
        }))
    }

    fn render(&self, surface: &mut dyn Surface, data: &SpiralData, ctx: &RenderContext<'_>) -> Result<()> {
        let options = ctx.options;
        surface.append(background(options)?);
        if data.by_series {
            render_grid(surface, data, options)
        } else {
            render_single(surface, data, options)
        }
    }
}

/// Catmull-Rom path of one value column, or `None` with fewer than two points
fn series_path(series: &SpiralSeries, column: usize, radius: &LinearScale, stroke: Stroke) -> Option<VisualElement> {
    let points: Vec<(f64, f64)> = series
        .points
        .iter()
        .filter_map(|p| p.values.get(column).copied().flatten().map(|v| (p.date, v)))
        .map(|(date, v)| project(date_angle(date), radius.apply(v)))
        .collect();
    if points.len() < 2 {
        return None;
    }
    Some(VisualElement::Path {
        points: catmull_rom(&points, 0.5, CURVE_SAMPLES),
        stroke,
    })
}

/// Dashed value rings and month spokes around the origin
fn radial_grid(radius: &LinearScale, ticks: usize, months: &[u32], with_values: bool) -> Vec<VisualElement> {
    let outer = radius.range.1;
    let mut out = Vec::new();
    for value in radius.ticks(ticks).into_iter().filter(|v| *v > 0.0) {
        let r = radius.apply(value);
        out.push(VisualElement::Circle {
            center: (0.0, 0.0),
            radius: r,
            stroke: Stroke::new(GRID_COLOR, 1.0),
            dashed: true,
        });
        if with_values {
            out.push(VisualElement::Text {
                position: (3.0, -r),
                content: format_tick(value),
                size: 9.0,
                color: LABEL_COLOR,
                anchor: Anchor::Start,
                bold: false,
            });
        }
    }
    for &month in months {
        let Some(angle) = month_angle(month) else {
            continue;
        };
        out.push(VisualElement::Line {
            from: (0.0, 0.0),
            to: project(angle, outer),
            stroke: Stroke::new(GRID_COLOR, 1.0),
        });
        out.push(VisualElement::Text {
            position: project(angle, outer + 12.0),
            content: MONTHS[(month - 1) as usize].to_string(),
            size: 10.0,
            color: LABEL_COLOR,
            anchor: Anchor::Middle,
            bold: false,
        });
    }
    out
}

fn sort_series<'a>(series: &'a [SpiralSeries], order: &str) -> Vec<&'a SpiralSeries> {
    let mut sorted: Vec<&SpiralSeries> = series.iter().collect();
    match order {
        "totalDescending" => sorted.sort_by(|a, b| b.total().total_cmp(&a.total())),
        "totalAscending" => sorted.sort_by(|a, b| a.total().total_cmp(&b.total())),
        _ => {}
    }
    sorted
}

/// Stroke per value column: steelblue for a lone column, category10 otherwise
fn value_colors(columns: &[String]) -> Vec<RGBColor> {
    if columns.len() == 1 {
        return vec![parse_color("steelblue").unwrap_or(FALLBACK)];
    }
    let assigned = OrdinalPalette::category10().assign_colors(columns);
    columns
        .iter()
        .map(|c| assigned.get(c).copied().unwrap_or(FALLBACK))
        .collect()
}

fn render_grid(surface: &mut dyn Surface, data: &SpiralData, options: &VisualOptions) -> Result<()> {
    let width = options.number("width")?;
    let height = options.number("height")?;
    let max_radius = options.number("maxRadius")?;
    let stroke_width = options.number("strokeWidth")?;
    let show_labels = options.boolean("showSeriesLabels")?;
    let ncol = options.number("columnsNumber")?.round().max(1.0) as usize;
    let order = options.text("sortSeriesBy")?;

    let names: Vec<String> = data.series.iter().map(|s| s.name.clone()).collect();
    let titles = options.color_scale("color")?.resolve(&names);
    let colors = value_colors(&data.value_columns);

    let (rows, cols) = calculate_grid_dimensions(data.series.len(), ncol);
    if rows == 0 {
        return Ok(());
    }
    let cell_width = (width - GRID_PADDING * (cols - 1) as f64) / cols as f64;
    let cell_height = (height - GRID_PADDING * (rows - 1) as f64) / rows as f64;
    let (mt, mr, mb, ml) = CELL_MARGIN;
    let radius = max_radius
        .min((cell_width - ml - mr) / 2.0)
        .min((cell_height - mt - mb) / 2.0);
    if radius <= 0.0 {
        anyhow::bail!(PADDINGS_TOO_HIGH);
    }

    for (i, series) in sort_series(&data.series, order).into_iter().enumerate() {
        let (row, col) = (i / cols, i % cols);
        let origin_x = col as f64 * (cell_width + GRID_PADDING) + ml + (cell_width - ml - mr) / 2.0;
        let origin_y = row as f64 * (cell_height + GRID_PADDING) + mt + (cell_height - mt - mb) / 2.0;

        // Each small multiple is scaled to its own maximum
        let scale = LinearScale::new((0.0, series.max().unwrap_or(data.max_value)), (0.0, radius));
        let mut children = radial_grid(&scale, 3, &[1, 4, 7, 10], false);
        for (column, color) in colors.iter().enumerate() {
            children.extend(series_path(series, column, &scale, Stroke::new(*color, stroke_width)));
        }
        if show_labels {
            children.push(VisualElement::Text {
                position: (0.0, -radius - mt / 2.0 - 4.0),
                content: series.name.clone(),
                size: 12.0,
                color: titles.color(&series.name),
                anchor: Anchor::Middle,
                bold: true,
            });
        }
        surface.append(VisualElement::Group {
            translate: (origin_x, origin_y),
            children,
        });
    }
    Ok(())
}

fn render_single(surface: &mut dyn Surface, data: &SpiralData, options: &VisualOptions) -> Result<()> {
    let width = options.number("width")?;
    let height = options.number("height")?;
    let max_radius = options.number("maxRadius")?;
    let stroke_width = options.number("strokeWidth")?;

    let radius = max_radius.min(width.min(height) / 2.0 - SINGLE_MARGIN);
    if radius <= 0.0 {
        anyhow::bail!(PADDINGS_TOO_HIGH);
    }
    let scale = LinearScale::new((0.0, data.max_value), (0.0, radius));

    let colors = value_colors(&data.value_columns);
    let months: Vec<u32> = (1..=12).collect();
    let mut children = radial_grid(&scale, 5, &months, true);
    for series in &data.series {
        for (column, color) in colors.iter().enumerate() {
            children.extend(series_path(series, column, &scale, Stroke::new(*color, stroke_width)));
        }
    }
    surface.append(VisualElement::Group {
        translate: (width / 2.0, height / 2.0),
        children,
    });
    Ok(())
}
