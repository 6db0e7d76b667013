//! Colors: parsing, ordinal schemes, continuous interpolators and the color-scale option value.

use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const fn hex(v: u32) -> RGBColor {
    RGBColor((v >> 16) as u8, ((v >> 8) & 0xff) as u8, (v & 0xff) as u8)
}

pub const CATEGORY10: [RGBColor; 10] = [
    hex(0x1f77b4), hex(0xff7f0e), hex(0x2ca02c), hex(0xd62728), hex(0x9467bd),
    hex(0x8c564b), hex(0xe377c2), hex(0x7f7f7f), hex(0xbcbd22), hex(0x17becf),
];
const TABLEAU10: [RGBColor; 10] = [
    hex(0x4e79a7), hex(0xf28e2c), hex(0xe15759), hex(0x76b7b2), hex(0x59a14f),
    hex(0xedc949), hex(0xaf7aa1), hex(0xff9da7), hex(0x9c755f), hex(0xbab0ab),
];
const SET1: [RGBColor; 9] = [
    hex(0xe41a1c), hex(0x377eb8), hex(0x4daf4a), hex(0x984ea3), hex(0xff7f00),
    hex(0xffff33), hex(0xa65628), hex(0xf781bf), hex(0x999999),
];
const SET2: [RGBColor; 8] = [
    hex(0x66c2a5), hex(0xfc8d62), hex(0x8da0cb), hex(0xe78ac3),
    hex(0xa6d854), hex(0xffd92f), hex(0xe5c494), hex(0xb3b3b3),
];
const SET3: [RGBColor; 12] = [
    hex(0x8dd3c7), hex(0xffffb3), hex(0xbebada), hex(0xfb8072), hex(0x80b1d3), hex(0xfdb462),
    hex(0xb3de69), hex(0xfccde5), hex(0xd9d9d9), hex(0xbc80bd), hex(0xccebc5), hex(0xffed6f),
];
const DARK2: [RGBColor; 8] = [
    hex(0x1b9e77), hex(0xd95f02), hex(0x7570b3), hex(0xe7298a),
    hex(0x66a61e), hex(0xe6ab02), hex(0xa6761d), hex(0x666666),
];
const ACCENT: [RGBColor; 8] = [
    hex(0x7fc97f), hex(0xbeaed4), hex(0xfdc086), hex(0xffff99),
    hex(0x386cb0), hex(0xf0027f), hex(0xbf5b17), hex(0x666666),
];
const PAIRED: [RGBColor; 12] = [
    hex(0xa6cee3), hex(0x1f78b4), hex(0xb2df8a), hex(0x33a02c), hex(0xfb9a99), hex(0xe31a1c),
    hex(0xfdbf6f), hex(0xff7f00), hex(0xcab2d6), hex(0x6a3d9a), hex(0xffff99), hex(0xb15928),
];
const PASTEL1: [RGBColor; 9] = [
    hex(0xfbb4ae), hex(0xb3cde3), hex(0xccebc5), hex(0xdecbe4), hex(0xfed9a6),
    hex(0xffffcc), hex(0xe5d8bd), hex(0xfddaec), hex(0xf2f2f2),
];
const PASTEL2: [RGBColor; 8] = [
    hex(0xb3e2cd), hex(0xfdcdac), hex(0xcbd5e8), hex(0xf4cae4),
    hex(0xe6f5c9), hex(0xfff2ae), hex(0xf1e2cc), hex(0xcccccc),
];

// Interpolator stops (ColorBrewer / matplotlib), sampled evenly on [0, 1].
const SPECTRAL: [RGBColor; 11] = [
    hex(0x9e0142), hex(0xd53e4f), hex(0xf46d43), hex(0xfdae61), hex(0xfee08b), hex(0xffffbf),
    hex(0xe6f598), hex(0xabdda4), hex(0x66c2a5), hex(0x3288bd), hex(0x5e4fa2),
];
const VIRIDIS: [RGBColor; 10] = [
    hex(0x440154), hex(0x482878), hex(0x3e4989), hex(0x31688e), hex(0x26828e),
    hex(0x1f9e89), hex(0x35b779), hex(0x6ece58), hex(0xb5de2b), hex(0xfde725),
];
const CIVIDIS: [RGBColor; 10] = [
    hex(0x00224e), hex(0x123570), hex(0x3b496c), hex(0x575d6d), hex(0x707173),
    hex(0x8a8678), hex(0xa59c74), hex(0xc3b369), hex(0xe1cc55), hex(0xfee838),
];
const BLUES: [RGBColor; 9] = [
    hex(0xf7fbff), hex(0xdeebf7), hex(0xc6dbef), hex(0x9ecae1), hex(0x6baed6),
    hex(0x4292c6), hex(0x2171b5), hex(0x08519c), hex(0x08306b),
];
const GREENS: [RGBColor; 9] = [
    hex(0xf7fcf5), hex(0xe5f5e0), hex(0xc7e9c0), hex(0xa1d99b), hex(0x74c476),
    hex(0x41ab5d), hex(0x238b45), hex(0x006d2c), hex(0x00441b),
];
const REDS: [RGBColor; 9] = [
    hex(0xfff5f0), hex(0xfee0d2), hex(0xfcbba1), hex(0xfc9272), hex(0xfb6a4a),
    hex(0xef3b2c), hex(0xcb181d), hex(0xa50f15), hex(0x67000d),
];
const ORANGES: [RGBColor; 9] = [
    hex(0xfff5eb), hex(0xfee6ce), hex(0xfdd0a2), hex(0xfdae6b), hex(0xfd8d3c),
    hex(0xf16913), hex(0xd94801), hex(0xa63603), hex(0x7f2704),
];
const PURPLES: [RGBColor; 9] = [
    hex(0xfcfbfd), hex(0xefedf5), hex(0xdadaeb), hex(0xbcbddc), hex(0x9e9ac8),
    hex(0x807dba), hex(0x6a51a3), hex(0x54278f), hex(0x3f007d),
];
const GREYS: [RGBColor; 9] = [
    hex(0xffffff), hex(0xf0f0f0), hex(0xd9d9d9), hex(0xbdbdbd), hex(0x969696),
    hex(0x737373), hex(0x525252), hex(0x252525), hex(0x000000),
];
const RDYLBU: [RGBColor; 11] = [
    hex(0xa50026), hex(0xd73027), hex(0xf46d43), hex(0xfdae61), hex(0xfee090), hex(0xffffbf),
    hex(0xe0f3f8), hex(0xabd9e9), hex(0x74add1), hex(0x4575b4), hex(0x313695),
];
const RDYLGN: [RGBColor; 11] = [
    hex(0xa50026), hex(0xd73027), hex(0xf46d43), hex(0xfdae61), hex(0xfee08b), hex(0xffffbf),
    hex(0xd9ef8b), hex(0xa6d96a), hex(0x66bd63), hex(0x1a9850), hex(0x006837),
];
const RDBU: [RGBColor; 11] = [
    hex(0x67001f), hex(0xb2182b), hex(0xd6604d), hex(0xf4a582), hex(0xfddbc7), hex(0xf7f7f7),
    hex(0xd1e5f0), hex(0x92c5de), hex(0x4393c3), hex(0x2166ac), hex(0x053061),
];
const YLORRD: [RGBColor; 9] = [
    hex(0xffffcc), hex(0xffeda0), hex(0xfed976), hex(0xfeb24c), hex(0xfd8d3c),
    hex(0xfc4e2a), hex(0xe31a1c), hex(0xbd0026), hex(0x800026),
];
const YLGNBU: [RGBColor; 9] = [
    hex(0xffffd9), hex(0xedf8b1), hex(0xc7e9b4), hex(0x7fcdbb), hex(0x41b6c4),
    hex(0x1d91c0), hex(0x225ea8), hex(0x253494), hex(0x081d58),
];
const BUGN: [RGBColor; 9] = [
    hex(0xf7fcfd), hex(0xe5f5f9), hex(0xccece6), hex(0x99d8c9), hex(0x66c2a4),
    hex(0x41ae76), hex(0x238b45), hex(0x006d2c), hex(0x00441b),
];
const BUPU: [RGBColor; 9] = [
    hex(0xf7fcfd), hex(0xe0ecf4), hex(0xbfd3e6), hex(0x9ebcda), hex(0x8c96c6),
    hex(0x8c6bb1), hex(0x88419d), hex(0x810f7c), hex(0x4d004b),
];
const GNBU: [RGBColor; 9] = [
    hex(0xf7fcf0), hex(0xe0f3db), hex(0xccebc5), hex(0xa8ddb5), hex(0x7bccc4),
    hex(0x4eb3d3), hex(0x2b8cbe), hex(0x0868ac), hex(0x084081),
];
const ORRD: [RGBColor; 9] = [
    hex(0xfff7ec), hex(0xfee8c8), hex(0xfdd49e), hex(0xfdbb84), hex(0xfc8d59),
    hex(0xef6548), hex(0xd7301f), hex(0xb30000), hex(0x7f0000),
];
const PUBU: [RGBColor; 9] = [
    hex(0xfff7fb), hex(0xece7f2), hex(0xd0d1e6), hex(0xa6bddb), hex(0x74a9cf),
    hex(0x3690c0), hex(0x0570b0), hex(0x045a8d), hex(0x023858),
];
const PURD: [RGBColor; 9] = [
    hex(0xf7f4f9), hex(0xe7e1ef), hex(0xd4b9da), hex(0xc994c7), hex(0xdf65b0),
    hex(0xe7298a), hex(0xce1256), hex(0x980043), hex(0x67001f),
];
const RDPU: [RGBColor; 9] = [
    hex(0xfff7f3), hex(0xfde0dd), hex(0xfcc5c0), hex(0xfa9fb5), hex(0xf768a1),
    hex(0xdd3497), hex(0xae017e), hex(0x7a0177), hex(0x49006a),
];
const YLGN: [RGBColor; 9] = [
    hex(0xffffe5), hex(0xf7fcb9), hex(0xd9f0a3), hex(0xaddd8e), hex(0x78c679),
    hex(0x41ab5d), hex(0x238443), hex(0x006837), hex(0x004529),
];
const PRGN: [RGBColor; 11] = [
    hex(0x40004b), hex(0x762a83), hex(0x9970ab), hex(0xc2a5cf), hex(0xe7d4e8), hex(0xf7f7f7),
    hex(0xd9f0d3), hex(0xa6dba0), hex(0x5aae61), hex(0x1b7837), hex(0x00441b),
];
const PUOR: [RGBColor; 11] = [
    hex(0x7f3b08), hex(0xb35806), hex(0xe08214), hex(0xfdb863), hex(0xfee0b6), hex(0xf7f7f7),
    hex(0xd8daeb), hex(0xb2abd2), hex(0x8073ac), hex(0x542788), hex(0x2d004b),
];
const RDGY: [RGBColor; 11] = [
    hex(0x67001f), hex(0xb2182b), hex(0xd6604d), hex(0xf4a582), hex(0xfddbc7), hex(0xffffff),
    hex(0xe0e0e0), hex(0xbababa), hex(0x878787), hex(0x4d4d4d), hex(0x1a1a1a),
];

/// Color used for keys a scale cannot place.
pub const FALLBACK: RGBColor = hex(0x666666);

fn normalize(name: &str, prefix: &str) -> Option<String> {
    let lower = name.trim().to_ascii_lowercase();
    lower.strip_prefix(prefix).map(str::to_string)
}

/// Look up an ordinal scheme by its `scheme*` name, e.g. `schemeCategory10`.
pub fn scheme(name: &str) -> Option<&'static [RGBColor]> {
    let colors: &'static [RGBColor] = match normalize(name, "scheme")?.as_str() {
        "category10" => &CATEGORY10,
        "tableau10" => &TABLEAU10,
        "set1" => &SET1,
        "set2" => &SET2,
        "set3" => &SET3,
        "dark2" => &DARK2,
        "accent" => &ACCENT,
        "paired" => &PAIRED,
        "pastel1" => &PASTEL1,
        "pastel2" => &PASTEL2,
        _ => return None,
    };
    Some(colors)
}

/// Continuous color ramp built from evenly spaced stops.
#[derive(Debug, Clone, Copy)]
pub struct Interpolator {
    stops: &'static [RGBColor],
}

impl Interpolator {
    /// Look up an interpolator by its `interpolate*` name, e.g. `interpolateSpectral`.
    pub fn named(name: &str) -> Option<Self> {
        let stops: &'static [RGBColor] = match normalize(name, "interpolate")?.as_str() {
            "spectral" => &SPECTRAL,
            "viridis" => &VIRIDIS,
            "cividis" => &CIVIDIS,
            "blues" => &BLUES,
            "greens" => &GREENS,
            "reds" => &REDS,
            "oranges" => &ORANGES,
            "purples" => &PURPLES,
            "greys" => &GREYS,
            "rdylbu" => &RDYLBU,
            "rdylgn" => &RDYLGN,
            "rdbu" => &RDBU,
            "ylorrd" => &YLORRD,
            "ylgnbu" => &YLGNBU,
            "bugn" => &BUGN,
            "bupu" => &BUPU,
            "gnbu" => &GNBU,
            "orrd" => &ORRD,
            "pubu" => &PUBU,
            "purd" => &PURD,
            "rdpu" => &RDPU,
            "ylgn" => &YLGN,
            "prgn" => &PRGN,
            "puor" => &PUOR,
            "rdgy" => &RDGY,
            _ => return None,
        };
        Some(Self { stops })
    }

    /// Color at `t` in [0, 1]; values outside are clamped.
    pub fn at(&self, t: f64) -> RGBColor {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let last = self.stops.len() - 1;
        let pos = t * last as f64;
        let i = (pos.floor() as usize).min(last.saturating_sub(1));
        let frac = pos - i as f64;
        let (a, b) = (self.stops[i], self.stops[(i + 1).min(last)]);
        let lerp = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
        RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
    }

    /// `n` evenly spaced samples, like d3.quantize.
    pub fn quantize(&self, n: usize) -> Vec<RGBColor> {
        match n {
            0 => Vec::new(),
            1 => vec![self.at(0.5)],
            _ => (0..n).map(|i| self.at(i as f64 / (n - 1) as f64)).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScaleType {
    #[default]
    Ordinal,
    Sequential,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Value of a `colorScale` visual option.
///
/// `loaded` is set when the value came from a saved project; a loaded scale keeps its
/// domain instead of re-deriving it from the current dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorScale {
    pub scale_type: ScaleType,
    pub interpolator: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<String>,
    #[serde(rename = "__loaded", default, skip_serializing_if = "is_false")]
    pub loaded: bool,
}

impl ColorScale {
    pub fn new(scale_type: ScaleType, interpolator: &str) -> Self {
        Self {
            scale_type,
            interpolator: interpolator.to_string(),
            domain: Vec::new(),
            loaded: false,
        }
    }

    /// Assign a color to every key. The stored domain comes first, unseen keys are appended.
    pub fn resolve(&self, keys: &[String]) -> ResolvedColorScale {
        let mut domain = self.domain.clone();
        for k in keys {
            if !domain.contains(k) {
                domain.push(k.clone());
            }
        }

        let colors = match self.scale_type {
            ScaleType::Sequential => self.sequential_colors(&domain),
            ScaleType::Ordinal => self.ordinal_colors(domain.len()),
        };

        ResolvedColorScale {
            colors: domain.into_iter().zip(colors).collect(),
        }
    }

    fn ordinal_colors(&self, n: usize) -> Vec<RGBColor> {
        if let Some(colors) = scheme(&self.interpolator) {
            return (0..n).map(|i| colors[i % colors.len()]).collect();
        }
        match Interpolator::named(&self.interpolator) {
            Some(interp) => interp.quantize(n),
            None => OrdinalPalette::category10().take(n),
        }
    }

    fn sequential_colors(&self, domain: &[String]) -> Vec<RGBColor> {
        let Some(interp) = Interpolator::named(&self.interpolator) else {
            return self.ordinal_colors(domain.len());
        };
        let numbers: Vec<Option<f64>> = domain.iter().map(|k| k.trim().parse::<f64>().ok()).collect();
        let (min, max) = numbers
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        numbers
            .into_iter()
            .map(|n| match n {
                Some(v) if max > min => interp.at((v - min) / (max - min)),
                Some(_) => interp.at(0.5),
                None => FALLBACK,
            })
            .collect()
    }
}

/// Key to color lookup produced by [`ColorScale::resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedColorScale {
    colors: HashMap<String, RGBColor>,
}

impl ResolvedColorScale {
    pub fn color(&self, key: &str) -> RGBColor {
        self.colors.get(key).copied().unwrap_or(FALLBACK)
    }
}

/// Cycling list of categorical colors.
#[derive(Debug, Clone)]
pub struct OrdinalPalette {
    colors: Vec<RGBColor>,
}

impl OrdinalPalette {
    pub fn category10() -> Self {
        Self {
            colors: CATEGORY10.to_vec(),
        }
    }

    pub fn take(&self, n: usize) -> Vec<RGBColor> {
        (0..n).map(|i| self.colors[i % self.colors.len()]).collect()
    }

    /// Assign colors to already sorted keys.
    pub fn assign_colors(&self, keys: &[String]) -> HashMap<String, RGBColor> {
        keys.iter().cloned().zip(self.take(keys.len())).collect()
    }
}

/// Parse a color string into RGBColor, supporting hex (#RRGGBB, #RGB) and named colors
pub fn parse_color(color_str: &str) -> Option<RGBColor> {
    let color_str = color_str.trim();

    if color_str.starts_with('#') {
        return parse_hex_color(color_str);
    }

    match color_str.to_lowercase().as_str() {
        "white" => Some(RGBColor(255, 255, 255)),
        "black" => Some(RGBColor(0, 0, 0)),
        "red" => Some(RGBColor(255, 0, 0)),
        "green" => Some(RGBColor(0, 128, 0)),
        "blue" => Some(RGBColor(0, 0, 255)),
        "steelblue" => Some(RGBColor(70, 130, 180)),
        "yellow" => Some(RGBColor(255, 255, 0)),
        "orange" => Some(RGBColor(255, 165, 0)),
        "purple" => Some(RGBColor(128, 0, 128)),
        "gray" | "grey" => Some(RGBColor(128, 128, 128)),
        "lightgray" | "lightgrey" => Some(RGBColor(192, 192, 192)),
        _ => None,
    }
}

fn parse_hex_color(hex: &str) -> Option<RGBColor> {
    let hex = hex.trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(RGBColor(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
            Some(RGBColor(r, g, b))
        }
        _ => None,
    }
}

pub fn to_hex(color: RGBColor) -> String {
    format!("#{:02x}{:02x}{:02x}", color.0, color.1, color.2)
}
