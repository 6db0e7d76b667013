//! Built-in chart plugins and the drawing helpers they share.

mod histogram;
mod mosaic;
mod spiral;

pub use histogram::{bucket, Bin, Histogram, HistogramData};
pub use mosaic::{layout as mosaic_layout, ColumnLayout, Mosaic, MosaicColumn, MosaicData, MosaicSegment, Tile};
pub use spiral::{date_angle, Spiral, SpiralData, SpiralPoint, SpiralSeries};

use crate::options::{OptionSpec, OptionsSchema, VisualOptions};
use crate::scale::LinearScale;
use crate::surface::{Anchor, Stroke, VisualElement};
use anyhow::Result;
use plotters::style::RGBColor;

pub(crate) const PADDINGS_TOO_HIGH: &str = "Paddings are too high, decrease them in the \"chart\" options panel";

const AXIS_COLOR: RGBColor = RGBColor(0, 0, 0);
const TICK_SIZE: f64 = 6.0;
const LABEL_SIZE: f64 = 10.0;

/// Margin options shared by the cartesian charts
pub(crate) fn margin_options(top: f64, right: f64, bottom: f64, left: f64) -> OptionsSchema {
    OptionsSchema::new()
        .with(OptionSpec::number("marginTop", "Margin (top)", top))
        .with(OptionSpec::number("marginRight", "Margin (right)", right))
        .with(OptionSpec::number("marginBottom", "Margin (bottom)", bottom))
        .with(OptionSpec::number("marginLeft", "Margin (left)", left))
}

/// Artboard and inner plotting area resolved from the options.
pub(crate) struct Frame {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
    pub chart_width: f64,
    pub chart_height: f64,
}

impl Frame {
    pub fn from_options(options: &VisualOptions) -> Result<Self> {
        let width = options.number("width")?;
        let height = options.number("height")?;
        let top = options.number("marginTop")?;
        let right = options.number("marginRight")?;
        let bottom = options.number("marginBottom")?;
        let left = options.number("marginLeft")?;

        let chart_width = width - left - right;
        let chart_height = height - top - bottom;
        if chart_width <= 0.0 || chart_height <= 0.0 {
            anyhow::bail!(PADDINGS_TOO_HIGH);
        }

        Ok(Self {
            width,
            height,
            left,
            top,
            chart_width,
            chart_height,
        })
    }
}

/// Full-artboard rectangle in the background color
pub(crate) fn background(options: &VisualOptions) -> Result<VisualElement> {
    Ok(VisualElement::Rect {
        x: 0.0,
        y: 0.0,
        width: options.number("width")?,
        height: options.number("height")?,
        fill: options.color("background")?,
        stroke: None,
        title: None,
    })
}

fn label(position: (f64, f64), content: String, anchor: Anchor) -> VisualElement {
    VisualElement::Text {
        position,
        content,
        size: LABEL_SIZE,
        color: AXIS_COLOR,
        anchor,
        bold: false,
    }
}

/// Horizontal axis at `y` with ticks below the line
pub(crate) fn bottom_axis(scale: &LinearScale, y: f64, count: usize, format: impl Fn(f64) -> String) -> VisualElement {
    let stroke = Stroke::new(AXIS_COLOR, 1.0);
    let mut children = vec![VisualElement::Line {
        from: (scale.range.0, y),
        to: (scale.range.1, y),
        stroke,
    }];
    for tick in scale.ticks(count) {
        let x = scale.apply(tick);
        children.push(VisualElement::Line {
            from: (x, y),
            to: (x, y + TICK_SIZE),
            stroke,
        });
        children.push(label((x, y + TICK_SIZE + 8.0), format(tick), Anchor::Middle));
    }
    VisualElement::Group {
        translate: (0.0, 0.0),
        children,
    }
}

/// Vertical axis at x = 0 with ticks to the left
pub(crate) fn left_axis(scale: &LinearScale, count: usize, format: impl Fn(f64) -> String) -> VisualElement {
    let stroke = Stroke::new(AXIS_COLOR, 1.0);
    let mut children = vec![VisualElement::Line {
        from: (0.0, scale.range.0),
        to: (0.0, scale.range.1),
        stroke,
    }];
    for tick in scale.ticks(count) {
        let y = scale.apply(tick);
        children.push(VisualElement::Line {
            from: (-TICK_SIZE, y),
            to: (0.0, y),
            stroke,
        });
        children.push(label((-TICK_SIZE - 3.0, y), format(tick), Anchor::End));
    }
    VisualElement::Group {
        translate: (0.0, 0.0),
        children,
    }
}
