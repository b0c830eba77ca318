use plotters::style::RGBColor;

use crate::error::PlotError;

pub const DEFAULT_COLOR: RGBColor = RGBColor(0x1f, 0x77, 0xb4);

const DEEP: &[&str] = &[
    "#4C72B0", "#DD8452", "#55A868", "#C44E52", "#8172B3", "#937860", "#DA8BC3", "#8C8C8C",
    "#CCB974", "#64B5CD",
];
const MUTED: &[&str] = &[
    "#4878D0", "#EE854A", "#6ACC64", "#D65F5F", "#956CB4", "#8C613C", "#DC7EC0", "#797979",
    "#D5BB67", "#82C6E2",
];
const PASTEL: &[&str] = &[
    "#A1C9F4", "#FFB482", "#8DE5A1", "#FF9F9B", "#D0BBFF", "#DEBB9B", "#FAB0E4", "#CFCFCF",
    "#FFFEA3", "#B9F2F0",
];
const BRIGHT: &[&str] = &[
    "#023EFF", "#FF7C00", "#1AC938", "#E8000B", "#8B2BE2", "#9F4800", "#F14CC1", "#A3A3A3",
    "#FFC400", "#00D7FF",
];
const DARK: &[&str] = &[
    "#001C7F", "#B1400D", "#12711C", "#8C0800", "#591E71", "#592F0D", "#A23582", "#3C3C3C",
    "#B8850A", "#006374",
];
const COLORBLIND: &[&str] = &[
    "#0173B2", "#DE8F05", "#029E73", "#D55E00", "#CC78BC", "#CA9161", "#FBAFE4", "#949494",
    "#ECE133", "#56B4E9",
];
const TAB10: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];
const SET1: &[&str] = &[
    "#e41a1c", "#377eb8", "#4daf4a", "#984ea3", "#ff7f00", "#ffff33", "#a65628", "#f781bf",
    "#999999",
];
const SET2: &[&str] = &[
    "#66c2a5", "#fc8d62", "#8da0cb", "#e78ac3", "#a6d854", "#ffd92f", "#e5c494", "#b3b3b3",
];

const QUALITATIVE: &[(&str, &[&str])] = &[
    ("deep", DEEP),
    ("muted", MUTED),
    ("pastel", PASTEL),
    ("bright", BRIGHT),
    ("dark", DARK),
    ("colorblind", COLORBLIND),
    ("tab10", TAB10),
    ("set1", SET1),
    ("set2", SET2),
];

// Colormaps as evenly spaced control points.
const COLORMAPS: &[(&str, &[&str])] = &[
    (
        "viridis",
        &[
            "#440154", "#482878", "#3e4989", "#31688e", "#26828e", "#1f9e89", "#35b779",
            "#6ece58", "#b5de2b", "#fde725",
        ],
    ),
    (
        "magma",
        &[
            "#000004", "#1c1044", "#4f127b", "#812581", "#b5367a", "#e55064", "#fb8761",
            "#fec287", "#fcfdbf",
        ],
    ),
    (
        "plasma",
        &[
            "#0d0887", "#4c02a1", "#7e03a8", "#a92395", "#cc4778", "#e56b5d", "#f89441",
            "#fdc328", "#f0f921",
        ],
    ),
    (
        "inferno",
        &[
            "#000004", "#1f0c48", "#550f6d", "#88226a", "#ba3655", "#e35933", "#f98e09",
            "#f8c932", "#fcffa4",
        ],
    ),
    (
        "cividis",
        &[
            "#00224e", "#123570", "#3b496c", "#575d6d", "#707173", "#8a8779", "#a69d75",
            "#c4b56c", "#e4cf5b", "#fee838",
        ],
    ),
    (
        "rocket",
        &["#03051a", "#4c1d4b", "#a11a5b", "#e83f3f", "#f69c73", "#faebdd"],
    ),
    ("mako", &["#0b0405", "#3e356b", "#357ba3", "#49c1ad", "#def5e5"]),
    ("flare", &["#edb081", "#e4794e", "#c9434d", "#993a5b", "#4b2362"]),
    ("crest", &["#a5cd90", "#4fa08b", "#2a7488", "#2c4d7e", "#2c3172"]),
    (
        "coolwarm",
        &[
            "#3b4cc0", "#7396f5", "#b0cbfc", "#dddcdc", "#f6bfa6", "#ea7b60", "#b40426",
        ],
    ),
    (
        "spectral",
        &[
            "#9e0142", "#d53e4f", "#f46d43", "#fdae61", "#fee08b", "#ffffbf", "#e6f598",
            "#abdda4", "#66c2a5", "#3288bd", "#5e4fa2",
        ],
    ),
    (
        "ylorrd",
        &[
            "#ffffcc", "#ffeda0", "#fed976", "#feb24c", "#fd8d3c", "#fc4e2a", "#e31a1c",
            "#bd0026", "#800026",
        ],
    ),
    (
        "blues",
        &[
            "#f7fbff", "#deebf7", "#c6dbef", "#9ecae1", "#6baed6", "#4292c6", "#2171b5",
            "#08519c", "#08306b",
        ],
    ),
    (
        "greens",
        &[
            "#f7fcf5", "#e5f5e0", "#c7e9c0", "#a1d99b", "#74c476", "#41ab5d", "#238b45",
            "#006d2c", "#00441b",
        ],
    ),
    (
        "reds",
        &[
            "#fff5f0", "#fee0d2", "#fcbba1", "#fc9272", "#fb6a4a", "#ef3b2c", "#cb181d",
            "#a50f15", "#67000d",
        ],
    ),
    ("greys", &["#ffffff", "#000000"]),
    (
        "rdbu",
        &[
            "#67001f", "#b2182b", "#d6604d", "#f4a582", "#fddbc7", "#f7f7f7", "#d1e5f0",
            "#92c5de", "#4393c3", "#2166ac", "#053061",
        ],
    ),
];

/// Parse a color name: `#RRGGBB`, `#RGB`, named colors, `grayN`, single
/// letter shorthands and cycle references `C0`..`C9`.
pub fn parse_color(color_str: &str) -> Option<RGBColor> {
    let color_str = color_str.trim();

    if color_str.starts_with('#') {
        return parse_hex_color(color_str);
    }

    match color_str.to_lowercase().as_str() {
        "white" | "w" => Some(RGBColor(255, 255, 255)),
        "black" | "k" => Some(RGBColor(0, 0, 0)),
        "red" | "r" => Some(RGBColor(255, 0, 0)),
        "green" | "g" => Some(RGBColor(0, 128, 0)),
        "blue" | "b" => Some(RGBColor(0, 0, 255)),
        "yellow" | "y" => Some(RGBColor(255, 255, 0)),
        "cyan" | "c" => Some(RGBColor(0, 255, 255)),
        "magenta" | "m" => Some(RGBColor(255, 0, 255)),
        "orange" => Some(RGBColor(255, 165, 0)),
        "purple" => Some(RGBColor(128, 0, 128)),
        "pink" => Some(RGBColor(255, 192, 203)),
        "brown" => Some(RGBColor(139, 69, 19)),
        "navy" => Some(RGBColor(0, 0, 128)),
        "teal" => Some(RGBColor(0, 128, 128)),
        "gray" | "grey" => Some(RGBColor(128, 128, 128)),
        "darkgray" | "darkgrey" => Some(RGBColor(64, 64, 64)),
        "lightgray" | "lightgrey" => Some(RGBColor(192, 192, 192)),
        s if s.len() == 2 && s.starts_with('c') => {
            let idx = s[1..].parse::<usize>().ok()?;
            TAB10.get(idx).and_then(|hex| parse_hex_color(hex))
        }
        s if s.starts_with("gray") || s.starts_with("grey") => {
            let n = s[4..].parse::<u8>().ok().filter(|n| *n <= 100)?;
            let v = (n as f64 * 2.55).round() as u8;
            Some(RGBColor(v, v, v))
        }
        _ => None,
    }
}

/// Parse hex color (#RRGGBB or #RGB)
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

fn hex_list(list: &[&str]) -> Vec<RGBColor> {
    list.iter().filter_map(|h| parse_hex_color(h)).collect()
}

/// Continuous color ramp through evenly spaced stops.
#[derive(Debug, Clone, PartialEq)]
pub struct Colormap {
    stops: Vec<RGBColor>,
}

impl Colormap {
    pub fn from_stops(stops: Vec<RGBColor>) -> Self {
        Self { stops }
    }

    /// Look up a named colormap; a `_r` suffix reverses it.
    pub fn by_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_lowercase();
        let (base, reversed) = match lower.strip_suffix("_r") {
            Some(base) => (base.to_string(), true),
            None => (lower, false),
        };
        let (_, stops) = COLORMAPS.iter().find(|(n, _)| *n == base)?;
        let mut stops = hex_list(stops);
        if reversed {
            stops.reverse();
        }
        Some(Self { stops })
    }

    /// Color at position `t` in [0, 1]; values outside are clamped.
    pub fn at(&self, t: f64) -> RGBColor {
        match self.stops.len() {
            0 => DEFAULT_COLOR,
            1 => self.stops[0],
            n => {
                let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
                let pos = t * (n - 1) as f64;
                let idx = (pos.floor() as usize).min(n - 2);
                blend(self.stops[idx], self.stops[idx + 1], pos - idx as f64)
            }
        }
    }

    /// `n` colors sampled from the interior of the ramp.
    pub fn sample(&self, n: usize) -> Vec<RGBColor> {
        (0..n)
            .map(|i| self.at((i + 1) as f64 / (n + 1) as f64))
            .collect()
    }
}

/// A resolved `palette` option.
#[derive(Debug, Clone, PartialEq)]
pub enum Palette {
    Qualitative(Vec<RGBColor>),
    Continuous(Colormap),
}

impl Palette {
    /// Resolve a palette name, a colormap name, or a comma separated list of
    /// colors. `None` picks the default for the kind of variable mapped.
    pub fn resolve(name: Option<&str>, numeric: bool) -> Result<Self, PlotError> {
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name,
            None if numeric => "rocket_r",
            None => "deep",
        };

        let lower = name.to_lowercase();
        if let Some((_, colors)) = QUALITATIVE.iter().find(|(n, _)| *n == lower) {
            return Ok(Palette::Qualitative(hex_list(colors)));
        }
        if let Some(cmap) = Colormap::by_name(name) {
            return Ok(Palette::Continuous(cmap));
        }
        if name.contains(',') {
            let colors: Option<Vec<RGBColor>> = name.split(',').map(parse_color).collect();
            if let Some(colors) = colors.filter(|c| !c.is_empty()) {
                return Ok(Palette::Qualitative(colors));
            }
        }
        if let Some(color) = parse_color(name) {
            return Ok(Palette::Continuous(Colormap::from_stops(vec![
                blend(color, RGBColor(255, 255, 255), 0.85),
                color,
            ])));
        }
        Err(PlotError::invalid(
            "palette",
            format!("'{}' is not a valid palette name", name),
        ))
    }

    /// `n` distinct colors, cycling qualitative palettes.
    pub fn colors(&self, n: usize) -> Vec<RGBColor> {
        match self {
            Palette::Qualitative(colors) if !colors.is_empty() => {
                (0..n).map(|i| colors[i % colors.len()]).collect()
            }
            Palette::Qualitative(_) => vec![DEFAULT_COLOR; n],
            Palette::Continuous(cmap) => cmap.sample(n),
        }
    }

    /// Continuous view of the palette for numeric mappings.
    pub fn colormap(&self) -> Colormap {
        match self {
            Palette::Qualitative(colors) => Colormap::from_stops(colors.clone()),
            Palette::Continuous(cmap) => cmap.clone(),
        }
    }
}

/// Resolve a `cmap` option for matrix charts.
pub fn colormap(name: &str) -> Result<Colormap, PlotError> {
    Colormap::by_name(name)
        .ok_or_else(|| PlotError::invalid("cmap", format!("'{}' is not a known colormap", name)))
}

pub fn blend(a: RGBColor, b: RGBColor, t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Scale the HLS saturation of a color by `prop`.
pub fn desaturate(color: RGBColor, prop: f64) -> RGBColor {
    let (h, l, s) = rgb_to_hls(color);
    hls_to_rgb(h, l, (s * prop.clamp(0.0, 1.0)).min(1.0))
}

/// Black or white, whichever reads better on `background`.
pub fn contrasting_text(background: RGBColor) -> RGBColor {
    let lum = 0.299 * background.0 as f64 + 0.587 * background.1 as f64 + 0.114 * background.2 as f64;
    if lum > 140.0 {
        RGBColor(0, 0, 0)
    } else {
        RGBColor(255, 255, 255)
    }
}

fn rgb_to_hls(c: RGBColor) -> (f64, f64, f64) {
    let r = c.0 as f64 / 255.0;
    let g = c.1 as f64 / 255.0;
    let b = c.2 as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if (max - min).abs() < f64::EPSILON {
        return (0.0, l, 0.0);
    }
    let d = max - min;
    let s = if l <= 0.5 { d / (max + min) } else { d / (2.0 - max - min) };
    let sector = if max == r {
        ((g - b) / d).rem_euclid(6.0)
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    let h = sector / 6.0;
    (h, l, s)
}

fn hls_to_rgb(h: f64, l: f64, s: f64) -> RGBColor {
    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return RGBColor(v, v, v);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let channel = |t: f64| {
        let t = t.rem_euclid(1.0);
        let v = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };
    RGBColor(channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_and_names() {
        assert_eq!(parse_color("#1f77b4"), Some(RGBColor(0x1f, 0x77, 0xb4)));
        assert_eq!(parse_color("#fff"), Some(RGBColor(255, 255, 255)));
        assert_eq!(parse_color("Gray50"), Some(RGBColor(128, 128, 128)));
        assert_eq!(parse_color("C1"), Some(RGBColor(0xff, 0x7f, 0x0e)));
        assert_eq!(parse_color("#zzzzzz"), None);
        assert_eq!(parse_color("notacolor"), None);
    }

    #[test]
    fn test_colormap_endpoints() {
        let cmap = Colormap::by_name("Blues").unwrap();
        assert_eq!(cmap.at(0.0), RGBColor(0xf7, 0xfb, 0xff));
        assert_eq!(cmap.at(1.0), RGBColor(0x08, 0x30, 0x6b));
        let reversed = Colormap::by_name("blues_r").unwrap();
        assert_eq!(reversed.at(0.0), RGBColor(0x08, 0x30, 0x6b));
    }

    #[test]
    fn test_palette_resolution() {
        let deep = Palette::resolve(None, false).unwrap();
        assert_eq!(deep.colors(11)[10], deep.colors(1)[0]);
        assert!(matches!(
            Palette::resolve(Some("viridis"), false).unwrap(),
            Palette::Continuous(_)
        ));
        let listed = Palette::resolve(Some("red,blue"), false).unwrap();
        assert_eq!(
            listed.colors(2),
            vec![RGBColor(255, 0, 0), RGBColor(0, 0, 255)]
        );
        assert!(Palette::resolve(Some("not-a-palette"), false).is_err());
    }

    #[test]
    fn test_desaturate_gray_is_noop() {
        let gray = RGBColor(128, 128, 128);
        assert_eq!(desaturate(gray, 0.5), gray);
        let red = desaturate(RGBColor(255, 0, 0), 0.0);
        assert_eq!(red.0, red.1);
    }
}
