use super::{background, bottom_axis, left_axis, margin_options, Frame};
use crate::chart::{ChartMetadata, ChartPlugin, Dimension, RenderContext, Reshaped};
use crate::data::{DataType, Dataset};
use crate::mapping::Mapping;
use crate::options::{OptionSpec, OptionsSchema};
use crate::scale::{format_tick, nice_domain, LinearScale};
use crate::surface::{Surface, VisualElement};
use anyhow::Result;

/// Upper bound on the number of bins
pub const MAX_BINS: usize = 1000;

/// Distribution of one numeric column in equal-width bins
pub struct Histogram;

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramData {
    pub values: Vec<f64>,
    /// Niced extent of `values`
    pub domain: (f64, f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub x0: f64,
    pub x1: f64,
    pub count: usize,
}

/// Count `values` into `bins` equal-width bins over `domain`.
///
/// Bins are left-inclusive and right-exclusive, except the last which also holds `domain.1`.
/// `bins` is clamped to `1..=MAX_BINS`.
/// Values outside the domain are not counted.
pub fn bucket(values: &[f64], domain: (f64, f64), bins: usize) -> Vec<Bin> {
    let n = bins.clamp(1, MAX_BINS);
    let (lo, hi) = domain;
    let step = (hi - lo) / n as f64;
    let mut out: Vec<Bin> = (0..n)
        .map(|i| Bin {
            x0: lo + step * i as f64,
            x1: if i + 1 == n { hi } else { lo + step * (i + 1) as f64 },
            count: 0,
        })
        .collect();

    if step <= 0.0 {
        return out;
    }

    for &v in values {
        if v < lo || v > hi {
            continue;
        }
        let idx = (((v - lo) / step).floor() as usize).min(n - 1);
        out[idx].count += 1;
    }
    out
}

impl ChartPlugin for Histogram {
    type Data = HistogramData;

    fn metadata(&self) -> ChartMetadata {
        ChartMetadata {
            id: "rawchart.histogram".to_string(),
            name: "Histogram".to_string(),
            description: "Distribution of a numeric variable, counted in equal-width bins.".to_string(),
            categories: vec!["distributions".to_string()],
        }
    }

    fn dimensions(&self) -> Vec<Dimension> {
        vec![Dimension::new("value", "Value").accepts(&[DataType::Number]).required()]
    }

    fn visual_options(&self) -> OptionsSchema {
        margin_options(20.0, 20.0, 40.0, 40.0)
            .with(OptionSpec::color("color", "Bar color", "#69b3a2"))
            .with(OptionSpec::number("bins", "Number of bins", 20.0).range(1.0, MAX_BINS as f64))
            .with(OptionSpec::number("padding", "Padding between bars", 1.0))
    }

    fn map_data(&self, dataset: &Dataset, mapping: &Mapping, _dimensions: &[Dimension]) -> Result<Reshaped<HistogramData>> {
        let Some(column) = mapping.column("value") else {
            return Ok(Reshaped::Nothing);
        };
        let Some(idx) = dataset.column_index(column) else {
            return Ok(Reshaped::Nothing);
        };

        let values: Vec<f64> = dataset.rows().iter().filter_map(|row| row[idx].as_f64()).collect();
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if values.is_empty() || min == max {
            return Ok(Reshaped::Nothing);
        }

        Ok(Reshaped::Ready(HistogramData {
            domain: nice_domain(min, max, 10),
            values,
        }))
    }

    fn render(&self, surface: &mut dyn Surface, data: &HistogramData, ctx: &RenderContext<'_>) -> Result<()> {
        let options = ctx.options;
        let frame = Frame::from_options(options)?;
        let color = options.color("color")?;
        let bins = options.number("bins")?.round().clamp(1.0, MAX_BINS as f64) as usize;
        let padding = options.number("padding")?.max(0.0);

        let bins = bucket(&data.values, data.domain, bins);
        let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0) as f64;

        let x = LinearScale::new(data.domain, (0.0, frame.chart_width));
        let y = LinearScale::new((0.0, max_count), (frame.chart_height, 0.0)).nice(10);

        let mut children = Vec::with_capacity(bins.len() + 2);
        for bin in &bins {
            let x0 = x.apply(bin.x0);
            let top = y.apply(bin.count as f64);
            children.push(VisualElement::Rect {
                x: x0,
                y: top,
                width: (x.apply(bin.x1) - x0 - padding).max(0.0),
                height: frame.chart_height - top,
                fill: color,
                stroke: None,
                title: Some(format!(
                    "{} to {}: {}",
                    format_tick(bin.x0),
                    format_tick(bin.x1),
                    bin.count
                )),
            });
        }
        children.push(bottom_axis(&x, frame.chart_height, 10, format_tick));
        children.push(left_axis(&y, 10, format_tick));

        surface.append(background(options)?);
        surface.append(VisualElement::Group {
            translate: (frame.left, frame.top),
            children,
        });
        Ok(())
    }
}
