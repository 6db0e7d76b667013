use super::{background, left_axis, margin_options, Frame};
use crate::chart::{ChartMetadata, ChartPlugin, Dimension, RenderContext, Reshaped};
use crate::data::{DataType, Dataset};
use crate::mapping::Mapping;
use crate::options::{OptionSpec, OptionsSchema};
use crate::palette::{ColorScale, ScaleType};
use crate::scale::{format_tick, LinearScale};
use crate::surface::{Anchor, Stroke, Surface, VisualElement};
use crate::transform::GroupKey;
use anyhow::Result;
use plotters::style::RGBColor;
use std::collections::BTreeMap;
use tracing::debug;

const MIN_LABEL_WIDTH: f64 = 20.0;

/// Two-level proportional stacked layout (Marimekko)
pub struct Mosaic;

#[derive(Debug, Clone, PartialEq)]
pub struct MosaicSegment {
    pub row: String,
    pub value: f64,
    /// Fraction of the column total
    pub share: f64,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MosaicColumn {
    pub key: String,
    pub total: f64,
    /// Fraction of the grand total
    pub proportion: f64,
    pub segments: Vec<MosaicSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MosaicData {
    pub columns: Vec<MosaicColumn>,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub x: f64,
    pub width: f64,
    pub segments: Vec<Tile>,
}

/// Place columns left to right and stack their segments upward from `height`.
///
/// Widths are proportional to column totals and heights to segment shares, after
/// reserving `gap` between neighbours.
pub fn layout(data: &MosaicData, width: f64, height: f64, gap: f64) -> Vec<ColumnLayout> {
    let gap = gap.max(0.0);
    let usable_width = (width - gap * data.columns.len().saturating_sub(1) as f64).max(0.0);

    let mut x = 0.0;
    let mut out = Vec::with_capacity(data.columns.len());
    for column in &data.columns {
        let col_width = column.proportion * usable_width;
        let usable_height = (height - gap * column.segments.len().saturating_sub(1) as f64).max(0.0);

        let mut bottom = height;
        let mut segments = Vec::with_capacity(column.segments.len());
        for segment in &column.segments {
            let seg_height = segment.share * usable_height;
            segments.push(Tile {
                x,
                y: bottom - seg_height,
                width: col_width,
                height: seg_height,
            });
            bottom -= seg_height + gap;
        }

        out.push(ColumnLayout {
            x,
            width: col_width,
            segments,
        });
        x += col_width + gap;
    }
    out
}

#[derive(Default)]
struct Accumulator {
    value: f64,
    color: Option<String>,
}

impl ChartPlugin for Mosaic {
    type Data = MosaicData;

    fn metadata(&self) -> ChartMetadata {
        ChartMetadata {
            id: "rawchart.mosaic".to_string(),
            name: "Mosaic plot".to_string(),
            description: "Columns sized by their total, split into segments by each row's share.".to_string(),
            categories: vec!["proportions".to_string(), "hierarchies".to_string()],
        }
    }

    fn dimensions(&self) -> Vec<Dimension> {
        let categorical = [DataType::Number, DataType::Date, DataType::String];
        vec![
            Dimension::new("column", "Columns").accepts(&categorical).required(),
            Dimension::new("row", "Rows").accepts(&categorical).required(),
            Dimension::new("size", "Size").accepts(&[DataType::Number]).required().aggregated(),
            Dimension::new("color", "Color").accepts(&categorical),
        ]
    }

    fn visual_options(&self) -> OptionsSchema {
        margin_options(20.0, 20.0, 20.0, 40.0)
            .with(OptionSpec::number("padding", "Padding", 2.0))
            .with(OptionSpec::boolean("showLabels", "Show labels", true))
            .with(OptionSpec::color_scale(
                "color",
                "Color scale",
                ColorScale::new(ScaleType::Ordinal, "interpolateSpectral"),
                "color",
            ))
    }

    fn map_data(&self, dataset: &Dataset, mapping: &Mapping, _dimensions: &[Dimension]) -> Result<Reshaped<MosaicData>> {
        let (Some(column), Some(row), Some(size)) = (
            mapping.column("column").and_then(|c| dataset.column_index(c)),
            mapping.column("row").and_then(|c| dataset.column_index(c)),
            mapping.column("size").and_then(|c| dataset.column_index(c)),
        ) else {
            return Ok(Reshaped::Nothing);
        };
        let color = mapping.column("color").and_then(|c| dataset.column_index(c));

        // 1. Rollup column -> row, summing size and keeping the first color
        let mut groups: BTreeMap<GroupKey, BTreeMap<GroupKey, Accumulator>> = BTreeMap::new();
        let mut skipped = 0usize;
        for r in dataset.rows() {
            let (col_key, row_key) = (&r[column], &r[row]);
            let value = r[size].as_f64().filter(|v| *v >= 0.0);
            let Some(value) = value.filter(|_| !col_key.is_null() && !row_key.is_null()) else {
                skipped += 1;
                continue;
            };
            let acc = groups
                .entry(GroupKey(col_key.clone()))
                .or_default()
                .entry(GroupKey(row_key.clone()))
                .or_default();
            acc.value += value;
            if acc.color.is_none() {
                acc.color = color.map(|c| &r[c]).filter(|v| !v.is_null()).map(|v| v.key());
            }
        }
        if skipped > 0 {
            debug!(skipped, "Rows without a usable size or key left out of the mosaic");
        }

        // 2. Shares and proportions
        let total: f64 = groups.values().flat_map(|rows| rows.values()).map(|a| a.value).sum();
        if total <= 0.0 {
            return Ok(Reshaped::Nothing);
        }

        let columns = groups
            .into_iter()
            .filter_map(|(key, rows)| {
                let col_total: f64 = rows.values().map(|a| a.value).sum();
                if col_total <= 0.0 {
                    return None;
                }
                let segments = rows
                    .into_iter()
                    .map(|(row_key, acc)| MosaicSegment {
                        row: row_key.label(),
                        share: acc.value / col_total,
                        value: acc.value,
                        color: acc.color,
                    })
                    .collect();
                Some(MosaicColumn {
                    key: key.label(),
                    total: col_total,
                    proportion: col_total / total,
                    segments,
                })
            })
            .collect();

        Ok(Reshaped::Ready(MosaicData { columns, total }))
    }

    fn render(&self, surface: &mut dyn Surface, data: &MosaicData, ctx: &RenderContext<'_>) -> Result<()> {
        let options = ctx.options;
        let frame = Frame::from_options(options)?;
        let gap = options.number("padding")?;
        let show_labels = options.boolean("showLabels")?;

        // Without a mapped color, segments are colored by their row key
        let keys: Vec<String> = data
            .columns
            .iter()
            .flat_map(|c| c.segments.iter())
            .map(|s| s.color.clone().unwrap_or_else(|| s.row.clone()))
            .collect();
        let colors = options.color_scale("color")?.resolve(&keys);

        let tiles = layout(data, frame.chart_width, frame.chart_height, gap);
        let mut children = Vec::new();
        for (column, placed) in data.columns.iter().zip(&tiles) {
            for (segment, tile) in column.segments.iter().zip(&placed.segments) {
                let fill = colors.color(segment.color.as_deref().unwrap_or(&segment.row));
                children.push(VisualElement::Rect {
                    x: tile.x,
                    y: tile.y,
                    width: tile.width,
                    height: tile.height,
                    fill,
                    stroke: Some(Stroke::new(RGBColor(255, 255, 255), 0.5)),
                    title: Some(format!(
                        "{} / {}: {} ({:.1}%)",
                        column.key,
                        segment.row,
                        format_tick(segment.value),
                        segment.share * 100.0
                    )),
                });
            }

            if show_labels && placed.width >= MIN_LABEL_WIDTH {
                children.push(VisualElement::Text {
                    position: (placed.x + placed.width / 2.0, -8.0),
                    content: column.key.clone(),
                    size: 10.0,
                    color: RGBColor(0, 0, 0),
                    anchor: Anchor::Middle,
                    bold: true,
                });
            }
        }

        let y = LinearScale::new((0.0, 1.0), (frame.chart_height, 0.0));
        children.push(left_axis(&y, 5, |t| format!("{}%", format_tick(t * 100.0))));

        surface.append(background(options)?);
        surface.append(VisualElement::Group {
            translate: (frame.left, frame.top),
            children,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::test_support::{chart, dataset, mapping};
    use crate::options::resolve_defaults_for;
    use crate::surface::Scene;

    fn sales() -> (Dataset, Mapping) {
        let ds = dataset(
            &["region", "product", "amount", "kind"],
            &[
                &["north", "tea", "30", "drink"],
                &["north", "cake", "10", "food"],
                &["south", "tea", "20", "drink"],
                &["south", "tea", "20", "drink"],
                &["south", "cake", "n/a", "food"],
                &["east", "cake", "0", "food"],
            ],
        );
        let chart = chart("rawchart.mosaic");
        let mapping = mapping(
            &chart,
            &ds,
            &[
                ("column", &["region"]),
                ("row", &["product"]),
                ("size", &["amount"]),
                ("color", &["kind"]),
            ],
        );
        (ds, mapping)
    }

    fn reshape(ds: &Dataset, mapping: &Mapping) -> MosaicData {
        match Mosaic.map_data(ds, mapping, &[]).unwrap() {
            Reshaped::Ready(d) => d,
            Reshaped::Nothing => panic!("expected data"),
        }
    }

    #[test]
    fn test_rollup_sorted_and_summed() {
        let (ds, mapping) = sales();
        let data = reshape(&ds, &mapping);
        // "east" totals zero and is dropped
        let keys: Vec<&str> = data.columns.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["north", "south"]);
        assert_eq!(data.total, 80.0);

        let south = &data.columns[1];
        assert_eq!(south.total, 40.0);
        assert_eq!(south.segments.len(), 1);
        assert_eq!(south.segments[0].row, "tea");
        assert_eq!(south.segments[0].color.as_deref(), Some("drink"));

        let north = &data.columns[0];
        let rows: Vec<&str> = north.segments.iter().map(|s| s.row.as_str()).collect();
        assert_eq!(rows, vec!["cake", "tea"]);
    }

    #[test]
    fn test_shares_sum_to_one_and_widths_proportional() {
        let (ds, mapping) = sales();
        let data = reshape(&ds, &mapping);
        for column in &data.columns {
            let shares: f64 = column.segments.iter().map(|s| s.share).sum();
            assert!((shares - 1.0).abs() < 1e-9);
        }

        let tiles = layout(&data, 100.0, 50.0, 0.0);
        for (column, placed) in data.columns.iter().zip(&tiles) {
            assert!((placed.width / 100.0 - column.total / data.total).abs() < 1e-9);
        }
    }

    #[test]
    fn test_layout_stacks_from_bottom_with_gap() {
        let (ds, mapping) = sales();
        let data = reshape(&ds, &mapping);
        let tiles = layout(&data, 102.0, 52.0, 2.0);

        // two columns share 100px after one gap
        assert!((tiles[0].width - 50.0).abs() < 1e-9);
        assert!((tiles[1].x - 52.0).abs() < 1e-9);

        let north = &tiles[0].segments;
        // cake (10/40) at the bottom, tea (30/40) above it, 2px apart
        assert!((north[0].y + north[0].height - 52.0).abs() < 1e-9);
        assert!((north[0].height - 12.5).abs() < 1e-9);
        assert!((north[1].y + north[1].height + 2.0 - north[0].y).abs() < 1e-9);
        assert!(north[1].y >= -1e-9);
    }

    #[test]
    fn test_zero_total_is_nothing() {
        let ds = dataset(&["c", "r", "s"], &[&["a", "x", "0"], &["b", "y", ""]]);
        let chart = chart("rawchart.mosaic");
        let mapping = mapping(&chart, &ds, &[("column", &["c"]), ("row", &["r"]), ("size", &["s"])]);
        assert_eq!(Mosaic.map_data(&ds, &mapping, &[]).unwrap(), Reshaped::Nothing);
    }

    #[test]
    fn test_unmapped_color_falls_back_to_row_key() {
        let (ds, _) = sales();
        let chart = chart("rawchart.mosaic");
        let mapping = mapping(&chart, &ds, &[("column", &["region"]), ("row", &["product"]), ("size", &["amount"])]);
        let data = reshape(&ds, &mapping);
        let options = resolve_defaults_for(chart.schema(), &ds, &mapping);

        let mut scene = Scene::default();
        let ctx = RenderContext {
            options: &options,
            mapping: &mapping,
            dataset: &ds,
        };
        Mosaic.render(&mut scene, &data, &ctx).unwrap();
        let VisualElement::Group { children, .. } = &scene.elements()[1] else {
            panic!("expected chart group");
        };
        let fills: Vec<(String, RGBColor)> = children
            .iter()
            .filter_map(|c| match c {
                VisualElement::Rect { fill, title: Some(t), .. } => Some((t.clone(), *fill)),
                _ => None,
            })
            .collect();
        let fill_of = |prefix: &str| fills.iter().find(|(t, _)| t.starts_with(prefix)).map(|(_, f)| *f).unwrap();

        // same row key, same color; different rows, different colors
        assert_eq!(fill_of("north / tea"), fill_of("south / tea"));
        assert_ne!(fill_of("north / tea"), fill_of("north / cake"));
        assert!(fills.iter().all(|(_, f)| *f != crate::palette::FALLBACK));
    }

    #[test]
    fn test_render_hides_narrow_labels() {
        let (ds, mapping) = sales();
        let chart = chart("rawchart.mosaic");
        let data = reshape(&ds, &mapping);
        let mut options = resolve_defaults_for(chart.schema(), &ds, &mapping);
        assert_eq!(options.color_scale("color").unwrap().domain, vec!["drink", "food"]);

        let render = |options: &crate::options::VisualOptions| {
            let mut scene = Scene::default();
            let ctx = RenderContext {
                options,
                mapping: &mapping,
                dataset: &ds,
            };
            Mosaic.render(&mut scene, &data, &ctx).unwrap();
            let VisualElement::Group { children, .. } = &scene.elements()[1] else {
                panic!("expected chart group");
            };
            children
                .iter()
                .filter(|c| matches!(c, VisualElement::Text { .. }))
                .count()
        };

        assert_eq!(render(&options), 2);
        // 805 - 40 - 735 leaves 30px, 14px per column after the gap
        options.set("marginRight", 735.0.into());
        assert_eq!(render(&options), 0);
    }
}
