use crate::surface::{Anchor, Stroke, Surface, VisualElement};
use anyhow::{anyhow, Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::TAU;
use tracing::warn;

const CIRCLE_SEGMENTS: usize = 72;

/// Serialize the surface as an SVG document
pub fn render_svg(surface: &dyn Surface) -> Result<String> {
    let size = checked_size(surface)?;
    let mut out = String::new();
    {
        let root = SVGBackend::with_string(&mut out, size).into_drawing_area();
        draw_elements(&root, surface.elements(), (0.0, 0.0))
            .map_err(|e| anyhow!("Failed to draw scene: {}", e))?;
        root.present().context("Failed to present drawing")?;
    }
    Ok(out)
}

/// Rasterize the surface on a white background and encode it as PNG
pub fn render_png(surface: &dyn Surface) -> Result<Vec<u8>> {
    let (width, height) = checked_size(surface)?;
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).context("Failed to fill background")?;
        draw_elements(&root, surface.elements(), (0.0, 0.0))
            .map_err(|e| anyhow!("Failed to draw scene: {}", e))?;
        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }

    Ok(png_bytes)
}

fn checked_size(surface: &dyn Surface) -> Result<(u32, u32)> {
    let (width, height) = surface.size();
    if width == 0 || height == 0 {
        anyhow::bail!("Cannot export a {}x{} surface", width, height);
    }
    Ok((width, height))
}

fn px(x: f64, y: f64) -> (i32, i32) {
    (x.round() as i32, y.round() as i32)
}

fn stroke_style(stroke: &Stroke) -> ShapeStyle {
    let width = stroke.width.round().max(1.0) as u32;
    stroke.color.mix(stroke.opacity).stroke_width(width)
}

fn circle_points(center: (f64, f64), radius: f64) -> Vec<(i32, i32)> {
    (0..=CIRCLE_SEGMENTS)
        .map(|i| {
            let a = TAU * i as f64 / CIRCLE_SEGMENTS as f64;
            px(center.0 + radius * a.cos(), center.1 + radius * a.sin())
        })
        .collect()
}

fn draw_elements<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    elements: &[VisualElement],
    offset: (f64, f64),
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let (ox, oy) = offset;
    for element in elements {
        match element {
            VisualElement::Rect {
                x,
                y,
                width,
                height,
                fill,
                stroke,
                ..
            } => {
                let tl = px(x + ox, y + oy);
                let br = px(x + width + ox, y + height + oy);
                root.draw(&Rectangle::new([tl, br], fill.filled()))?;
                if let Some(stroke) = stroke {
                    root.draw(&Rectangle::new([tl, br], stroke_style(stroke)))?;
                }
            }
            VisualElement::Path { points, stroke } => {
                let points: Vec<(i32, i32)> = points.iter().map(|&(x, y)| px(x + ox, y + oy)).collect();
                root.draw(&PathElement::new(points, stroke_style(stroke)))?;
            }
            VisualElement::Line { from, to, stroke } => {
                let points = vec![px(from.0 + ox, from.1 + oy), px(to.0 + ox, to.1 + oy)];
                root.draw(&PathElement::new(points, stroke_style(stroke)))?;
            }
            VisualElement::Circle {
                center,
                radius,
                stroke,
                dashed,
            } => {
                let points = circle_points((center.0 + ox, center.1 + oy), *radius);
                if *dashed {
                    for (i, segment) in points.windows(2).enumerate() {
                        if i % 2 == 0 {
                            root.draw(&PathElement::new(segment.to_vec(), stroke_style(stroke)))?;
                        }
                    }
                } else {
                    root.draw(&PathElement::new(points, stroke_style(stroke)))?;
                }
            }
            VisualElement::Text {
                position,
                content,
                size,
                color,
                anchor,
                bold,
            } => {
                let h_pos = match anchor {
                    Anchor::Start => HPos::Left,
                    Anchor::Middle => HPos::Center,
                    Anchor::End => HPos::Right,
                };
                let font = if *bold {
                    ("sans-serif", *size, FontStyle::Bold).into_font()
                } else {
                    ("sans-serif", *size).into_font()
                };
                let style = font.color(color).pos(Pos::new(h_pos, VPos::Center));
                let text = Text::new(content.clone(), px(position.0 + ox, position.1 + oy), style);
                // Raster backends need system fonts; a missing font drops the label, not the chart.
                if let Err(e) = root.draw(&text) {
                    warn!(label = %content, error = %e, "Skipping text element");
                }
            }
            VisualElement::Group {
                translate,
                children,
            } => {
                draw_elements(root, children, (ox + translate.0, oy + translate.1))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Scene;
    use plotters::style::RGBColor;

    fn rect_scene() -> Scene {
        let mut scene = Scene::new(40, 30);
        scene.append(VisualElement::Group {
            translate: (5.0, 5.0),
            children: vec![VisualElement::Rect {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                fill: RGBColor(255, 0, 0),
                stroke: Some(Stroke::new(RGBColor(255, 255, 255), 0.5)),
                title: None,
            }],
        });
        scene.append(VisualElement::Circle {
            center: (20.0, 15.0),
            radius: 8.0,
            stroke: Stroke::new(RGBColor(204, 204, 204), 1.0),
            dashed: true,
        });
        scene
    }

    #[test]
    fn test_render_png_magic() {
        let png = render_png(&rect_scene()).unwrap();
        assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[test]
    fn test_render_svg_document() {
        let mut scene = rect_scene();
        scene.append(VisualElement::text((20.0, 25.0), "label", 10.0));
        let svg = render_svg(&scene).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("label"));
    }

    #[test]
    fn test_zero_size_rejected() {
        let scene = Scene::new(0, 10);
        assert!(render_png(&scene).is_err());
        assert!(render_svg(&scene).is_err());
    }
}
