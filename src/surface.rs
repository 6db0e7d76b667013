//! Drawing surface the pipeline owns and chart renderers draw into.
//!
//! Elements are plain drawing commands in pixel space; the export backend in
//! [`crate::graph`] executes them blindly.

use plotters::style::RGBColor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: RGBColor,
    pub width: f64,
    pub opacity: f64,
}

impl Stroke {
    pub fn new(color: RGBColor, width: f64) -> Self {
        Self {
            color,
            width,
            opacity: 1.0,
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisualElement {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: RGBColor,
        stroke: Option<Stroke>,
        title: Option<String>,
    },
    Path {
        points: Vec<(f64, f64)>,
        stroke: Stroke,
    },
    Line {
        from: (f64, f64),
        to: (f64, f64),
        stroke: Stroke,
    },
    Circle {
        center: (f64, f64),
        radius: f64,
        stroke: Stroke,
        dashed: bool,
    },
    Text {
        position: (f64, f64),
        content: String,
        size: f64,
        color: RGBColor,
        anchor: Anchor,
        bold: bool,
    },
    /// Children positioned relative to `translate`.
    Group {
        translate: (f64, f64),
        children: Vec<VisualElement>,
    },
}

impl VisualElement {
    pub fn text(position: (f64, f64), content: impl Into<String>, size: f64) -> Self {
        VisualElement::Text {
            position,
            content: content.into(),
            size,
            color: RGBColor(0, 0, 0),
            anchor: Anchor::Middle,
            bold: false,
        }
    }

    /// Number of leaf elements, descending into groups.
    pub fn leaf_count(&self) -> usize {
        match self {
            VisualElement::Group { children, .. } => children.iter().map(|c| c.leaf_count()).sum(),
            _ => 1,
        }
    }
}

/// Minimal mutable output target.
///
/// Only the pipeline clears it; only the active render call appends to it.
pub trait Surface {
    fn clear(&mut self);
    fn append(&mut self, element: VisualElement);
    fn set_size(&mut self, width: u32, height: u32);
    fn size(&self) -> (u32, u32);
    fn elements(&self) -> &[VisualElement];

    fn is_empty(&self) -> bool {
        self.elements().is_empty()
    }

    /// Rasterize as PNG bytes
    fn export_image(&self) -> anyhow::Result<Vec<u8>>
    where
        Self: Sized,
    {
        crate::graph::render_png(self)
    }

    /// Serialize as an SVG document
    fn export_vector(&self) -> anyhow::Result<String>
    where
        Self: Sized,
    {
        crate::graph::render_svg(self)
    }
}

/// In-memory surface holding a flat list of top-level elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    width: u32,
    height: u32,
    elements: Vec<VisualElement>,
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            elements: Vec::new(),
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(805, 600)
    }
}

impl Surface for Scene {
    fn clear(&mut self) {
        self.elements.clear();
    }

    fn append(&mut self, element: VisualElement) {
        self.elements.push(element);
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn elements(&self) -> &[VisualElement] {
        &self.elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_clear_and_append() {
        let mut scene = Scene::new(100, 50);
        assert!(scene.is_empty());
        scene.append(VisualElement::text((1.0, 2.0), "hi", 10.0));
        scene.append(VisualElement::Group {
            translate: (0.0, 0.0),
            children: vec![
                VisualElement::text((0.0, 0.0), "a", 10.0),
                VisualElement::text((0.0, 0.0), "b", 10.0),
            ],
        });
        assert_eq!(scene.elements().len(), 2);
        assert_eq!(scene.elements()[1].leaf_count(), 2);
        scene.clear();
        assert!(scene.is_empty());
        assert_eq!(scene.size(), (100, 50));
    }

    #[test]
    fn test_scene_exports() {
        let mut scene = Scene::new(40, 30);
        scene.append(VisualElement::Line {
            from: (0.0, 0.0),
            to: (40.0, 30.0),
            stroke: Stroke::new(RGBColor(0, 0, 0), 1.0),
        });
        assert!(scene.export_vector().unwrap().contains("<svg"));
        assert!(scene.export_image().unwrap().starts_with(&[137, 80, 78, 71]));
    }
}
