use std::collections::HashMap;

use anyhow::{Context, Result};
use plotters::style::RGBColor;
use tracing::warn;

use super::relational::{area_to_radius, points_to_px};
use super::*;
use crate::ir::{DrawCommand, FillStyle, LineStyle, PointStyle};
use crate::stats::{self, BwMethod, KDepth};

const LINE_GRAY: RGBColor = RGBColor(0x3f, 0x3f, 0x3f);
const WHITE: RGBColor = RGBColor(255, 255, 255);
const DEFAULT_LINE_WIDTH: f64 = 1.25;

// =============================================================================
// Layout: which variable is categorical and where each level sits
// =============================================================================

/// Categorical axis of a categorical chart and the value variable drawn
/// against it.
struct CatLayout<'a> {
    cat: Option<&'a Column>,
    levels: Vec<String>,
    index: HashMap<String, usize>,
    positions: Vec<f64>,
    /// Distance between neighbouring categories, in axis units.
    spacing: f64,
    value: Option<&'a Column>,
    horizontal: bool,
    transform: AxisTransform,
    native: bool,
}

impl<'a> CatLayout<'a> {
    fn from_kwargs(kw: &Kwargs<'a>, needs_value: bool) -> Result<Self, PlotError> {
        let x = kw.column("x")?;
        let y = kw.column("y")?;
        let mut horizontal = match kw.text("orient") {
            Some("h") | Some("y") => true,
            Some("v") | Some("x") => false,
            Some(other) => {
                return Err(PlotError::invalid(
                    "orient",
                    format!("'{}' is not one of v, h, x, y", other),
                ))
            }
            None => match (x, y) {
                (Some(x), Some(y)) => x.is_continuous() && !y.is_continuous(),
                (None, Some(_)) => true,
                _ => false,
            },
        };
        let (mut cat, mut value) = if horizontal { (y, x) } else { (x, y) };
        if needs_value && value.is_none() {
            // A single variable is drawn as one distribution along its own axis.
            value = cat.take();
            horizontal = x.is_some();
        }
        if needs_value {
            let Some(v) = value else {
                return Err(PlotError::invalid("y", "a column must be selected"));
            };
            v.numeric()?;
        } else if cat.is_none() {
            return Err(PlotError::invalid(
                if horizontal { "y" } else { "x" },
                "a column must be selected",
            ));
        }

        let (levels, positions, native) = match cat {
            Some(c) => {
                let levels = levels_of(c, kw.list("order"));
                let native = kw.flag("native_scale", false) && c.is_numeric();
                let positions = if native {
                    levels
                        .iter()
                        .enumerate()
                        .map(|(i, l)| l.parse::<f64>().unwrap_or(i as f64))
                        .collect()
                } else {
                    (0..levels.len()).map(|i| i as f64).collect()
                };
                (levels, positions, native)
            }
            None => (vec![String::new()], vec![0.0], false),
        };
        let spacing = if native { min_spacing(&positions) } else { 1.0 };
        Ok(Self {
            cat,
            index: levels
                .iter()
                .enumerate()
                .map(|(i, l)| (l.clone(), i))
                .collect(),
            levels,
            positions,
            spacing,
            value,
            horizontal,
            transform: AxisTransform { log: kw.log_scale() },
            native,
        })
    }

    fn category(&self, row: usize) -> Option<usize> {
        match self.cat {
            None => Some(0),
            Some(c) => c.label(row).and_then(|l| self.index.get(&l).copied()),
        }
    }

    fn value_at(&self, row: usize) -> Result<Option<f64>, PlotError> {
        match self.value.and_then(|c| c.value(row).map(|v| (c, v))) {
            Some((c, v)) => self.transform.apply(v, c.name()).map(Some),
            None => Ok(None),
        }
    }

    /// Map (category position, value) onto (x, y).
    fn point(&self, pos: f64, value: f64) -> (f64, f64) {
        if self.horizontal {
            (value, pos)
        } else {
            (pos, value)
        }
    }

    fn rect(&self, (pos_lo, pos_hi): (f64, f64), (v_lo, v_hi): (f64, f64), style: FillStyle) -> DrawCommand {
        let (tl, br) = if self.horizontal {
            ((v_lo, pos_hi), (v_hi, pos_lo))
        } else {
            ((pos_lo, v_hi), (pos_hi, v_lo))
        };
        DrawCommand::Rect { tl, br, style }
    }

    /// Rows grouped by category, then by hue level.
    fn cells(&self, hue: Option<&HueMap>, rows: &[usize]) -> Vec<Vec<Vec<usize>>> {
        let n_hue = hue.map_or(1, |h| h.levels.len());
        let mut cells = vec![vec![Vec::new(); n_hue]; self.levels.len()];
        for &row in rows {
            let Some(ci) = self.category(row) else { continue };
            let hj = match hue {
                Some(h) => match h.level(row) {
                    Some(j) => j,
                    None => continue,
                },
                None => 0,
            };
            cells[ci][hj].push(row);
        }
        cells
    }

    fn values(&self, rows: &[usize]) -> Result<Vec<f64>, PlotError> {
        let mut out = Vec::with_capacity(rows.len());
        for &row in rows {
            if let Some(v) = self.value_at(row)? {
                out.push(v);
            }
        }
        Ok(out)
    }

    /// Panel with the categorical axis and a value axis labelled
    /// `value_label` (defaults to the value column's name).
    fn panel(&self, value_label: Option<&str>, sticky_zero: bool) -> PanelScene {
        let cat_axis = match self.cat {
            Some(c) if self.native => axis_for(c, Some(c.name().to_string())),
            Some(c) => Axis::categorical(Some(c.name().to_string()), self.levels.clone()),
            None => Axis::categorical(None, vec![String::new()]),
        };
        let label = value_label
            .map(str::to_string)
            .or_else(|| self.value.map(|c| c.name().to_string()));
        let mut value_axis = match self.value {
            Some(c) if value_label.is_none() => axis_for(c, label),
            _ => Axis::continuous(label),
        }
        .with_log(self.transform.log);
        if sticky_zero && !self.transform.log {
            value_axis = value_axis.with_sticky_zero();
        }
        if self.horizontal {
            PanelScene::new(value_axis, cat_axis)
        } else {
            PanelScene::new(cat_axis, value_axis)
        }
    }
}

/// Smallest gap between distinct positions; one unit for a single level.
fn min_spacing(positions: &[f64]) -> f64 {
    let mut sorted = positions.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let gap = sorted
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d > 0.0)
        .fold(f64::INFINITY, f64::min);
    if gap.is_finite() {
        gap
    } else {
        1.0
    }
}

/// Horizontal placement of hue levels inside one category.
#[derive(Debug, Clone, Copy)]
struct Slots {
    n: usize,
    dodge: bool,
    width: f64,
    gap: f64,
}

impl Slots {
    fn new(layout: &CatLayout, n: usize, dodge: bool, width: f64, gap: f64) -> Self {
        Self {
            n: n.max(1),
            dodge,
            width: width * layout.spacing,
            gap: gap.clamp(0.0, 0.95),
        }
    }

    fn center(&self, pos: f64, j: usize) -> f64 {
        if self.dodge {
            let slot = self.width / self.n as f64;
            pos - self.width / 2.0 + slot * (j as f64 + 0.5)
        } else {
            pos
        }
    }

    fn half_width(&self) -> f64 {
        let full = if self.dodge {
            self.width / self.n as f64
        } else {
            self.width
        };
        full * (1.0 - self.gap) / 2.0
    }

    fn span(&self, pos: f64, j: usize) -> (f64, f64) {
        let c = self.center(pos, j);
        let h = self.half_width();
        (c - h, c + h)
    }
}

/// Dodge option: a boolean, or `auto`/`True`/`False` text.
fn dodge_flag(kw: &Kwargs, hue: Option<&HueMap>, layout: &CatLayout, auto_default: bool) -> bool {
    let auto = || {
        auto_default
            && match (hue, layout.cat) {
                (Some(h), Some(c)) => h.column.name() != c.name(),
                (Some(_), None) => true,
                _ => false,
            }
    };
    match kw.get("dodge") {
        ParamValue::Bool(b) => *b && hue.is_some(),
        ParamValue::Text(t) => match t.to_ascii_lowercase().as_str() {
            "true" => hue.is_some(),
            "false" => false,
            _ => auto(),
        },
        _ => auto(),
    }
}

fn group_color(hue: Option<&HueMap>, base: RGBColor, j: usize) -> RGBColor {
    hue.map_or(base, |h| h.colors[j])
}

fn patch_legend(panel: &mut PanelScene, hue: Option<&HueMap>, saturation: f64) {
    let Some(h) = hue else { return };
    let mut legend = LegendBuilder::default();
    legend.section(
        h.column.name(),
        h.levels
            .iter()
            .zip(&h.colors)
            .map(|(l, c)| entry(l.clone(), Swatch::Patch(palette::desaturate(*c, saturation))))
            .collect(),
    );
    legend.apply(panel);
}

fn marker_legend(panel: &mut PanelScene, hue: Option<&HueMap>, radius: f64) {
    let Some(h) = hue else { return };
    let mut legend = LegendBuilder::default();
    legend.section(
        h.column.name(),
        h.levels
            .iter()
            .zip(&h.colors)
            .map(|(l, c)| entry(l.clone(), Swatch::Marker(PointStyle::new(*c, radius))))
            .collect(),
    );
    legend.apply(panel);
}

fn line_width(kw: &Kwargs) -> f64 {
    points_to_px(kw.float("linewidth").filter(|w| *w > 0.0).unwrap_or(DEFAULT_LINE_WIDTH))
}

// =============================================================================
// Strip and swarm
// =============================================================================

pub fn strip(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = strip_panel(kw, &all_rows(kw.dataset())).context("Failed to build strip plot")?;
    Ok(single_panel(kw, panel))
}

pub fn swarm(kw: &Kwargs) -> Result<SceneGraph> {
    let axis_px = (kw.width as f64 * 0.8, kw.height as f64 * 0.8);
    let panel = swarm_panel(kw, &all_rows(kw.dataset()), axis_px).context("Failed to build swarm plot")?;
    Ok(single_panel(kw, panel))
}

fn point_style(kw: &Kwargs, color: RGBColor, default_edge: &str) -> Result<PointStyle, PlotError> {
    let size = kw.float_or("size", 5.0).max(0.5);
    let mut style = PointStyle::new(color, points_to_px(size) / 2.0);
    let edge_width = kw.float_or("linewidth", 0.0);
    if edge_width > 0.0 {
        let edge_name = kw.text_or("edgecolor", default_edge);
        let edge = palette::parse_color(edge_name)
            .ok_or_else(|| PlotError::invalid("edgecolor", format!("unrecognized color '{}'", edge_name)))?;
        style.edge = Some((edge, points_to_px(edge_width)));
    }
    Ok(style)
}

fn strip_panel(kw: &Kwargs, rows: &[usize]) -> Result<PanelScene, PlotError> {
    let layout = CatLayout::from_kwargs(kw, true)?;
    let hue = HueMap::from_kwargs(kw, true)?;
    let base = kw.color("color")?;
    let dodge = dodge_flag(kw, hue.as_ref(), &layout, false);
    let n_hue = hue.as_ref().map_or(1, |h| h.levels.len());
    let slots = Slots::new(&layout, n_hue, dodge, 0.8, 0.0);
    let mut jitter = kw.float_or("jitter", 0.1).max(0.0) * layout.spacing;
    if dodge {
        jitter /= n_hue as f64;
    }

    let mut rng = stats::rng();
    let mut panel = layout.panel(None, false);
    let cells = layout.cells(hue.as_ref(), rows);
    let mut radius = 0.0;
    for (ci, by_hue) in cells.iter().enumerate() {
        for (j, members) in by_hue.iter().enumerate() {
            let values = layout.values(members)?;
            if values.is_empty() {
                continue;
            }
            let center = slots.center(layout.positions[ci], j);
            let offsets = stats::jitter(values.len(), jitter, &mut rng);
            let style = point_style(kw, group_color(hue.as_ref(), base, j), "gray")?;
            radius = style.size;
            panel.push(DrawCommand::Points {
                points: values
                    .iter()
                    .zip(&offsets)
                    .map(|(v, o)| layout.point(center + o, *v))
                    .collect(),
                style,
            });
        }
    }
    marker_legend(&mut panel, hue.as_ref(), radius.max(3.0));
    Ok(panel)
}

fn swarm_panel(kw: &Kwargs, rows: &[usize], axis_px: (f64, f64)) -> Result<PanelScene, PlotError> {
    let layout = CatLayout::from_kwargs(kw, true)?;
    let hue = HueMap::from_kwargs(kw, true)?;
    let base = kw.color("color")?;
    let dodge = dodge_flag(kw, hue.as_ref(), &layout, false);
    let n_hue = hue.as_ref().map_or(1, |h| h.levels.len());
    let slots = Slots::new(&layout, n_hue, dodge, 0.8, 0.0);

    let cells = layout.cells(hue.as_ref(), rows);
    let mut all = scale::MinMax::default();
    for members in cells.iter().flatten() {
        for v in layout.values(members)? {
            all.include(v);
        }
    }
    let (lo, hi) = if all.is_empty() {
        (0.0, 1.0)
    } else {
        scale::pad_range(all.min, all.max)
    };
    let (cat_px, value_px) = if layout.horizontal {
        (axis_px.1, axis_px.0)
    } else {
        axis_px
    };
    let cat_span = layout.levels.len() as f64 * layout.spacing;
    let probe = point_style(kw, base, "#00FFAA")?;
    let diameter_px = probe.size * 2.0 + 1.0;
    let d_val = diameter_px * (hi - lo) / value_px.max(1.0);
    let d_cat = diameter_px * cat_span / cat_px.max(1.0);

    let mut panel = layout.panel(None, false);
    let mut overflow = false;
    for (ci, by_hue) in cells.iter().enumerate() {
        for (j, members) in by_hue.iter().enumerate() {
            let values = layout.values(members)?;
            if values.is_empty() {
                continue;
            }
            let center = slots.center(layout.positions[ci], j);
            let limit = slots.half_width();
            let offsets = beeswarm(&values, d_val, d_cat);
            overflow |= offsets.iter().any(|o| o.abs() > limit);
            panel.push(DrawCommand::Points {
                points: values
                    .iter()
                    .zip(&offsets)
                    .map(|(v, o)| layout.point(center + o.clamp(-limit, limit), *v))
                    .collect(),
                style: point_style(kw, group_color(hue.as_ref(), base, j), "#00FFAA")?,
            });
        }
    }
    if overflow {
        warn!("some points could not be placed in the swarm and were squeezed to its edge");
    }
    marker_legend(&mut panel, hue.as_ref(), probe.size.max(3.0));
    Ok(panel)
}

/// Beeswarm offsets (in category units) that keep markers of diameter
/// `d_val` along the value axis and `d_cat` across it from overlapping.
/// Points are placed in value order at the free offset closest to the
/// center.
pub fn beeswarm(values: &[f64], d_val: f64, d_cat: f64) -> Vec<f64> {
    let mut offsets = vec![0.0; values.len()];
    if d_val <= 0.0 || d_cat <= 0.0 {
        return offsets;
    }
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));

    // Normalised so the marker diameter is one in both directions.
    let mut placed: Vec<(f64, f64)> = Vec::with_capacity(values.len());
    for i in order {
        let v = values[i] / d_val;
        let neighbors: Vec<(f64, f64)> = placed
            .iter()
            .rev()
            .take_while(|(pv, _)| v - pv < 1.0)
            .copied()
            .collect();
        let mut candidates = vec![0.0];
        for (pv, po) in &neighbors {
            let dx = (1.0 - (pv - v).powi(2)).max(0.0).sqrt();
            candidates.push(po + dx);
            candidates.push(po - dx);
        }
        candidates.sort_by(|a: &f64, b: &f64| a.abs().total_cmp(&b.abs()));
        let chosen = candidates
            .into_iter()
            .find(|c| {
                neighbors
                    .iter()
                    .all(|(pv, po)| (pv - v).powi(2) + (po - c).powi(2) >= 1.0 - 1e-9)
            })
            .unwrap_or(0.0);
        placed.push((v, chosen));
        offsets[i] = chosen * d_cat;
    }
    offsets
}

// =============================================================================
// Box, violin, boxen
// =============================================================================

pub fn boxplot(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = box_panel(kw, &all_rows(kw.dataset())).context("Failed to build box plot")?;
    Ok(single_panel(kw, panel))
}

/// Face and line colors for a filled or outlined element.
fn element_colors(color: RGBColor, saturation: f64, fill: bool) -> (Option<RGBColor>, RGBColor) {
    let face = palette::desaturate(color, saturation);
    if fill {
        (Some(face), LINE_GRAY)
    } else {
        (None, face)
    }
}

fn box_panel(kw: &Kwargs, rows: &[usize]) -> Result<PanelScene, PlotError> {
    let layout = CatLayout::from_kwargs(kw, true)?;
    let hue = HueMap::from_kwargs(kw, true)?;
    let base = kw.color("color")?;
    let saturation = kw.float_or("saturation", 0.75);
    let fill = kw.flag("fill", true);
    let whis = kw.float_or("whis", 1.5).max(0.0);
    let lw = line_width(kw);
    let flier_radius = points_to_px(kw.float("fliersize").unwrap_or(5.0)) / 2.0;
    let dodge = dodge_flag(kw, hue.as_ref(), &layout, true);
    let n_hue = hue.as_ref().map_or(1, |h| h.levels.len());
    let slots = Slots::new(&layout, n_hue, dodge, kw.float_or("width", 0.8), kw.float_or("gap", 0.0));

    let mut panel = layout.panel(None, false);
    for (ci, by_hue) in layout.cells(hue.as_ref(), rows).iter().enumerate() {
        for (j, members) in by_hue.iter().enumerate() {
            let values = layout.values(members)?;
            let Some(b) = stats::box_stats(&values, whis) else { continue };
            let (face, line) = element_colors(group_color(hue.as_ref(), base, j), saturation, fill);
            let (lo, hi) = slots.span(layout.positions[ci], j);
            let center = (lo + hi) / 2.0;
            let style = FillStyle {
                fill: face,
                edge: Some((line, lw)),
                alpha: 1.0,
            };
            panel.push(layout.rect((lo, hi), (b.q1, b.q3), style));
            let cap = (hi - lo) / 4.0;
            panel.push(DrawCommand::Segments {
                segments: vec![
                    [layout.point(lo, b.median), layout.point(hi, b.median)],
                    [layout.point(center, b.q1), layout.point(center, b.whisker_lo)],
                    [layout.point(center, b.q3), layout.point(center, b.whisker_hi)],
                    [layout.point(center - cap, b.whisker_lo), layout.point(center + cap, b.whisker_lo)],
                    [layout.point(center - cap, b.whisker_hi), layout.point(center + cap, b.whisker_hi)],
                ],
                style: LineStyle::solid(line, lw),
            });
            if !b.outliers.is_empty() {
                let mut flier = PointStyle::new(line, flier_radius);
                flier.marker = Marker::Diamond;
                panel.push(DrawCommand::Points {
                    points: b.outliers.iter().map(|v| layout.point(center, *v)).collect(),
                    style: flier,
                });
            }
        }
    }
    patch_legend(&mut panel, hue.as_ref(), saturation);
    Ok(panel)
}

pub fn violin(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = violin_panel(kw, &all_rows(kw.dataset())).context("Failed to build violin plot")?;
    Ok(single_panel(kw, panel))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DensityNorm {
    Area,
    Count,
    Width,
}

/// One fitted violin before scaling: grid, density, raw values.
struct ViolinFit {
    ci: usize,
    j: usize,
    grid: Vec<f64>,
    density: Vec<f64>,
    values: Vec<f64>,
}

fn violin_panel(kw: &Kwargs, rows: &[usize]) -> Result<PanelScene, PlotError> {
    let layout = CatLayout::from_kwargs(kw, true)?;
    let hue = HueMap::from_kwargs(kw, true)?;
    let base = kw.color("color")?;
    let saturation = kw.float_or("saturation", 0.75);
    let fill = kw.flag("fill", true);
    let lw = line_width(kw);
    let n_hue = hue.as_ref().map_or(1, |h| h.levels.len());
    let split = kw.flag("split", false) && n_hue == 2;
    let dodge = dodge_flag(kw, hue.as_ref(), &layout, true) && !split;
    let slots = Slots::new(&layout, n_hue, dodge, kw.float_or("width", 0.8), kw.float_or("gap", 0.0));
    let cut = kw.float_or("cut", 2.0).max(0.0);
    let gridsize = kw.count_or("gridsize", 100).clamp(2, 2000);
    let bw_method = BwMethod::parse(kw.text_or("bw_method", "scott"))?;
    let bw_adjust = kw.float_or("bw_adjust", 1.0).max(1e-3);
    let common_norm = kw.flag("common_norm", false);
    let norm = match kw.text_or("density_norm", "area") {
        "area" => DensityNorm::Area,
        "count" => DensityNorm::Count,
        "width" => DensityNorm::Width,
        other => {
            return Err(PlotError::invalid(
                "density_norm",
                format!("'{}' is not area, count or width", other),
            ))
        }
    };
    let inner = kw.text("inner").unwrap_or("none");

    let mut fits = Vec::new();
    for (ci, by_hue) in layout.cells(hue.as_ref(), rows).iter().enumerate() {
        for (j, members) in by_hue.iter().enumerate() {
            let values = layout.values(members)?;
            if values.is_empty() {
                continue;
            }
            let (grid, density) = match stats::bandwidth(&values, bw_method, bw_adjust) {
                Some(bw) => {
                    let grid = stats::kde_support(&values, bw, cut, gridsize, None);
                    let density = stats::kde_eval(&values, bw, &grid);
                    (grid, density)
                }
                // No spread: a flat line at the single value.
                None => (vec![values[0]], vec![1.0]),
            };
            fits.push(ViolinFit {
                ci,
                j,
                grid,
                density,
                values,
            });
        }
    }

    // Scale densities to half-widths.
    let scaled = |f: &ViolinFit| -> Vec<f64> {
        match norm {
            DensityNorm::Count => f.density.iter().map(|d| d * f.values.len() as f64).collect(),
            _ => f.density.clone(),
        }
    };
    let peak = |f: &ViolinFit| scaled(f).into_iter().fold(0.0, f64::max);
    let mut group_peak: HashMap<usize, f64> = HashMap::new();
    for f in &fits {
        let key = if common_norm { 0 } else { f.j };
        let entry = group_peak.entry(key).or_insert(0.0);
        *entry = entry.max(peak(f));
    }

    let mut panel = layout.panel(None, false);
    for f in &fits {
        let (lo, hi) = slots.span(layout.positions[f.ci], f.j);
        let center = (lo + hi) / 2.0;
        let half = (hi - lo) / 2.0;
        let widths = scaled(f);
        let max = match norm {
            DensityNorm::Width => peak(f),
            _ => group_peak[&(if common_norm { 0 } else { f.j })],
        };
        let max = if max > 0.0 { max } else { 1.0 };
        let (face, line) = element_colors(group_color(hue.as_ref(), base, f.j), saturation, fill);
        let style = FillStyle {
            fill: face,
            edge: Some((line, lw)),
            alpha: 1.0,
        };
        // Split violins draw each hue level on its own side.
        let (left, right) = match (split, f.j) {
            (true, 0) => (true, false),
            (true, _) => (false, true),
            _ => (true, true),
        };

        if f.grid.len() == 1 {
            let v = f.grid[0];
            panel.push(DrawCommand::Segments {
                segments: vec![[layout.point(center - half, v), layout.point(center + half, v)]],
                style: LineStyle::solid(line, lw),
            });
            continue;
        }
        let mut outline: Vec<(f64, f64)> = Vec::with_capacity(f.grid.len() * 2);
        for (g, w) in f.grid.iter().zip(&widths) {
            let offset = if right { w / max * half } else { 0.0 };
            outline.push(layout.point(center + offset, *g));
        }
        for (g, w) in f.grid.iter().zip(&widths).rev() {
            let offset = if left { w / max * half } else { 0.0 };
            outline.push(layout.point(center - offset, *g));
        }
        panel.push(DrawCommand::Polygon {
            points: outline,
            style,
        });

        let sorted = stats::sorted(&f.values);
        let quartiles = [0.25, 0.5, 0.75].map(|p| stats::percentile(&sorted, p));
        let width_at = |v: f64| {
            let k = f.grid.partition_point(|g| *g < v).min(widths.len() - 1);
            widths[k] / max * half
        };
        match inner {
            "box" => {
                let whisker = stats::box_stats(&f.values, 1.5);
                let bar = half * 0.08;
                if let Some(b) = whisker {
                    panel.push(DrawCommand::Segments {
                        segments: vec![[layout.point(center, b.whisker_lo), layout.point(center, b.whisker_hi)]],
                        style: LineStyle::solid(LINE_GRAY, lw),
                    });
                }
                panel.push(layout.rect(
                    (center - bar, center + bar),
                    (quartiles[0], quartiles[2]),
                    FillStyle::filled(LINE_GRAY),
                ));
                panel.push(DrawCommand::Points {
                    points: vec![layout.point(center, quartiles[1])],
                    style: PointStyle::new(WHITE, 3.0),
                });
            }
            "quart" | "quartile" => {
                let segments = quartiles
                    .iter()
                    .map(|q| {
                        let w = width_at(*q);
                        let l = if left { w } else { 0.0 };
                        let r = if right { w } else { 0.0 };
                        [layout.point(center - l, *q), layout.point(center + r, *q)]
                    })
                    .collect();
                let mut style = LineStyle::solid(line, lw);
                style.dash = Dash::Dashed;
                panel.push(DrawCommand::Segments { segments, style });
            }
            "point" => {
                panel.push(DrawCommand::Points {
                    points: f.values.iter().map(|v| layout.point(center, *v)).collect(),
                    style: PointStyle::new(line, 2.0),
                });
            }
            "stick" => {
                let segments = f
                    .values
                    .iter()
                    .map(|v| {
                        let w = width_at(*v);
                        let l = if left { w } else { 0.0 };
                        let r = if right { w } else { 0.0 };
                        [layout.point(center - l, *v), layout.point(center + r, *v)]
                    })
                    .collect();
                panel.push(DrawCommand::Segments {
                    segments,
                    style: LineStyle::solid(line, 1.0),
                });
            }
            "none" => {}
            other => {
                return Err(PlotError::invalid(
                    "inner",
                    format!("'{}' is not box, quart, point or stick", other),
                ))
            }
        }
    }
    patch_legend(&mut panel, hue.as_ref(), saturation);
    Ok(panel)
}

pub fn boxen(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = boxen_panel(kw, &all_rows(kw.dataset())).context("Failed to build boxen plot")?;
    Ok(single_panel(kw, panel))
}

fn k_depth(kw: &Kwargs) -> Result<KDepth, PlotError> {
    match kw.get("k_depth") {
        ParamValue::Int(k) if *k > 0 => Ok(KDepth::Fixed(*k as usize)),
        _ => match kw.text_or("k_depth", "tukey") {
            "tukey" => Ok(KDepth::Tukey),
            "proportion" => Ok(KDepth::Proportion(kw.float_or("outlier_prop", 0.007))),
            "trustworthy" => Ok(KDepth::Trustworthy(kw.float_or("trust_alpha", 0.05))),
            "full" => Ok(KDepth::Full),
            other => Err(PlotError::invalid(
                "k_depth",
                format!("'{}' is not tukey, proportion, trustworthy or full", other),
            )),
        },
    }
}

fn boxen_panel(kw: &Kwargs, rows: &[usize]) -> Result<PanelScene, PlotError> {
    let layout = CatLayout::from_kwargs(kw, true)?;
    let hue = HueMap::from_kwargs(kw, true)?;
    let base = kw.color("color")?;
    let saturation = kw.float_or("saturation", 0.75);
    let fill = kw.flag("fill", true);
    let lw = line_width(kw);
    let linecolor = match kw.text("linecolor") {
        Some(name) => palette::parse_color(name)
            .ok_or_else(|| PlotError::invalid("linecolor", format!("unrecognized color '{}'", name)))?,
        None => LINE_GRAY,
    };
    let rule = k_depth(kw)?;
    let width_method = kw.text_or("width_method", "exponential");
    if !matches!(width_method, "exponential" | "linear" | "area") {
        return Err(PlotError::invalid(
            "width_method",
            format!("'{}' is not exponential, linear or area", width_method),
        ));
    }
    let showfliers = kw.flag("showfliers", true);
    let dodge = dodge_flag(kw, hue.as_ref(), &layout, true);
    let n_hue = hue.as_ref().map_or(1, |h| h.levels.len());
    let slots = Slots::new(&layout, n_hue, dodge, kw.float_or("width", 0.8), kw.float_or("gap", 0.0));

    let mut panel = layout.panel(None, false);
    for (ci, by_hue) in layout.cells(hue.as_ref(), rows).iter().enumerate() {
        for (j, members) in by_hue.iter().enumerate() {
            let sorted = stats::sorted(&layout.values(members)?);
            if sorted.is_empty() {
                continue;
            }
            let k = stats::letter_value_depth(sorted.len(), rule);
            let boxes = stats::letter_values(&sorted, k);
            let (lo, hi) = slots.span(layout.positions[ci], j);
            let center = (lo + hi) / 2.0;
            let half = (hi - lo) / 2.0;
            let color = palette::desaturate(group_color(hue.as_ref(), base, j), saturation);

            // Outermost first so inner boxes draw on top.
            for (i, (b_lo, b_hi)) in boxes.iter().enumerate().rev() {
                let frac = match width_method {
                    "linear" => 1.0 - i as f64 / k as f64,
                    "area" => 0.5f64.powi(i as i32).sqrt(),
                    _ => 0.5f64.powi(i as i32),
                };
                let shade = palette::blend(color, WHITE, 0.75 * i as f64 / k.max(1) as f64);
                let style = if fill {
                    FillStyle::filled(shade).with_edge(linecolor, lw * 0.5)
                } else {
                    FillStyle::outline(shade, lw)
                };
                panel.push(layout.rect(
                    (center - half * frac, center + half * frac),
                    (*b_lo, *b_hi),
                    style,
                ));
            }
            let median = stats::percentile(&sorted, 0.5);
            panel.push(DrawCommand::Segments {
                segments: vec![[layout.point(center - half, median), layout.point(center + half, median)]],
                style: LineStyle::solid(linecolor, lw),
            });
            if showfliers {
                if let Some(&(outer_lo, outer_hi)) = boxes.last() {
                    let fliers: Vec<(f64, f64)> = sorted
                        .iter()
                        .filter(|v| **v < outer_lo || **v > outer_hi)
                        .map(|v| layout.point(center, *v))
                        .collect();
                    if !fliers.is_empty() {
                        let mut style = PointStyle::new(color, 2.5);
                        style.marker = Marker::Diamond;
                        panel.push(DrawCommand::Points { points: fliers, style });
                    }
                }
            }
        }
    }
    patch_legend(&mut panel, hue.as_ref(), saturation);
    Ok(panel)
}

// =============================================================================
// Point, bar, count
// =============================================================================

/// Estimate and error interval of one category/hue cell.
struct Aggregate {
    ci: usize,
    j: usize,
    estimate: f64,
    interval: Option<(f64, f64)>,
}

fn aggregate_cells(kw: &Kwargs, layout: &CatLayout, hue: Option<&HueMap>, rows: &[usize]) -> Result<Vec<Aggregate>, PlotError> {
    let estimator = kw.estimator()?.unwrap_or(stats::Estimator::Mean);
    let errorbar = kw.errorbar()?;
    let n_boot = kw.count_or("n_boot", 1000);
    let mut rng = stats::rng();
    let mut out = Vec::new();
    for (ci, by_hue) in layout.cells(hue, rows).iter().enumerate() {
        for (j, members) in by_hue.iter().enumerate() {
            // Aggregate in data space, then map onto the axis.
            let raw: Vec<f64> = members
                .iter()
                .filter_map(|&r| layout.value.and_then(|c| c.value(r)))
                .collect();
            if raw.is_empty() {
                continue;
            }
            let estimate = estimator.apply(&raw);
            let interval = match errorbar {
                Some(eb) => eb.interval(&raw, estimator, n_boot, &mut rng),
                None => None,
            };
            let to_axis = |v: f64| -> Result<f64, PlotError> {
                let name = layout.value.map_or("y", |c| c.name());
                layout.transform.apply(v, name)
            };
            out.push(Aggregate {
                ci,
                j,
                estimate: to_axis(estimate)?,
                interval: match interval {
                    Some((lo, hi)) => Some((to_axis(lo)?, to_axis(hi)?)),
                    None => None,
                },
            });
        }
    }
    Ok(out)
}

fn errorbar_segments(layout: &CatLayout, center: f64, (lo, hi): (f64, f64), capsize: f64) -> Vec<[(f64, f64); 2]> {
    let mut segments = vec![[layout.point(center, lo), layout.point(center, hi)]];
    if capsize > 0.0 {
        let c = capsize / 2.0;
        segments.push([layout.point(center - c, lo), layout.point(center + c, lo)]);
        segments.push([layout.point(center - c, hi), layout.point(center + c, hi)]);
    }
    segments
}

pub fn point(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = point_panel(kw, &all_rows(kw.dataset())).context("Failed to build point plot")?;
    Ok(single_panel(kw, panel))
}

fn point_panel(kw: &Kwargs, rows: &[usize]) -> Result<PanelScene, PlotError> {
    let layout = CatLayout::from_kwargs(kw, true)?;
    let hue = HueMap::from_kwargs(kw, true)?;
    let base = kw.color("color")?;
    let n_hue = hue.as_ref().map_or(1, |h| h.levels.len());
    let dodge = dodge_flag(kw, hue.as_ref(), &layout, false);
    let slots = Slots::new(&layout, n_hue, dodge, 0.4, 0.0);
    let capsize = kw.float_or("capsize", 0.0) * layout.spacing;
    let cells = aggregate_cells(kw, &layout, hue.as_ref(), rows)?;

    let mut panel = layout.panel(None, false);
    for j in 0..n_hue {
        let color = group_color(hue.as_ref(), base, j);
        let mine: Vec<&Aggregate> = cells.iter().filter(|a| a.j == j).collect();
        if mine.is_empty() {
            continue;
        }
        let centers: Vec<f64> = mine.iter().map(|a| slots.center(layout.positions[a.ci], j)).collect();
        let segments: Vec<[(f64, f64); 2]> = mine
            .iter()
            .zip(&centers)
            .filter_map(|(a, c)| a.interval.map(|iv| errorbar_segments(&layout, *c, iv, capsize)))
            .flatten()
            .collect();
        if !segments.is_empty() {
            panel.push(DrawCommand::Segments {
                segments,
                style: LineStyle::solid(color, points_to_px(1.5)),
            });
        }
        let points: Vec<(f64, f64)> = mine
            .iter()
            .zip(&centers)
            .map(|(a, c)| layout.point(*c, a.estimate))
            .collect();
        panel.push(DrawCommand::Line {
            points: points.clone(),
            style: LineStyle::solid(color, points_to_px(1.5)),
        });
        panel.push(DrawCommand::Points {
            points,
            style: PointStyle::new(color, area_to_radius(50.0)),
        });
    }
    marker_legend(&mut panel, hue.as_ref(), area_to_radius(50.0));
    Ok(panel)
}

pub fn bar(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = bar_panel(kw, &all_rows(kw.dataset())).context("Failed to build bar plot")?;
    Ok(single_panel(kw, panel))
}

/// Bar floor on the value axis: zero, or the decade below the smallest
/// bar on a log axis.
fn bar_floor(layout: &CatLayout, tops: impl Iterator<Item = f64>) -> f64 {
    if layout.transform.log {
        tops.fold(f64::INFINITY, f64::min).floor().min(0.0).max(-300.0)
    } else {
        0.0
    }
}

fn bar_panel(kw: &Kwargs, rows: &[usize]) -> Result<PanelScene, PlotError> {
    let layout = CatLayout::from_kwargs(kw, true)?;
    let hue = HueMap::from_kwargs(kw, true)?;
    let base = kw.color("color")?;
    let saturation = kw.float_or("saturation", 0.75);
    let fill = kw.flag("fill", true);
    let n_hue = hue.as_ref().map_or(1, |h| h.levels.len());
    let dodge = dodge_flag(kw, hue.as_ref(), &layout, true);
    let slots = Slots::new(&layout, n_hue, dodge, kw.float_or("width", 0.8), 0.0);
    let capsize = kw.float_or("capsize", 0.0) * layout.spacing;
    let cells = aggregate_cells(kw, &layout, hue.as_ref(), rows)?;
    let floor = bar_floor(&layout, cells.iter().map(|a| a.estimate));

    let mut panel = layout.panel(None, true);
    let mut segments = Vec::new();
    for a in &cells {
        let (lo, hi) = slots.span(layout.positions[a.ci], a.j);
        let (face, line) = element_colors(group_color(hue.as_ref(), base, a.j), saturation, fill);
        let style = match face {
            Some(face) => FillStyle::filled(face),
            None => FillStyle::outline(line, points_to_px(1.5)),
        };
        panel.push(layout.rect((lo, hi), (floor.min(a.estimate), floor.max(a.estimate)), style));
        if let Some(iv) = a.interval {
            segments.extend(errorbar_segments(&layout, (lo + hi) / 2.0, iv, capsize));
        }
    }
    if !segments.is_empty() {
        panel.push(DrawCommand::Segments {
            segments,
            style: LineStyle::solid(LINE_GRAY, points_to_px(1.5)),
        });
    }
    patch_legend(&mut panel, hue.as_ref(), saturation);
    Ok(panel)
}

pub fn count(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = count_panel(kw, &all_rows(kw.dataset())).context("Failed to build count plot")?;
    Ok(single_panel(kw, panel))
}

fn count_panel(kw: &Kwargs, rows: &[usize]) -> Result<PanelScene, PlotError> {
    let layout = CatLayout::from_kwargs(kw, false)?;
    let hue = HueMap::from_kwargs(kw, true)?;
    let base = kw.color("color")?;
    let saturation = kw.float_or("saturation", 0.75);
    let fill = kw.flag("fill", true);
    let n_hue = hue.as_ref().map_or(1, |h| h.levels.len());
    let dodge = dodge_flag(kw, hue.as_ref(), &layout, true);
    let slots = Slots::new(&layout, n_hue, dodge, kw.float_or("width", 0.8), 0.0);
    let (label, scale_by) = match kw.text_or("stat", "count") {
        "count" => ("count", None),
        "percent" => ("percent", Some(100.0)),
        "proportion" | "probability" => ("proportion", Some(1.0)),
        other => {
            return Err(PlotError::invalid(
                "stat",
                format!("'{}' is not count, percent or proportion", other),
            ))
        }
    };

    let cells = layout.cells(hue.as_ref(), rows);
    let total: usize = cells.iter().flatten().map(Vec::len).sum();
    let mut heights = Vec::new();
    for (ci, by_hue) in cells.iter().enumerate() {
        for (j, members) in by_hue.iter().enumerate() {
            if members.is_empty() {
                continue;
            }
            let n = members.len() as f64;
            let h = match scale_by {
                Some(s) => s * n / total as f64,
                None => n,
            };
            heights.push((ci, j, layout.transform.apply(h, label)?));
        }
    }
    let floor = bar_floor(&layout, heights.iter().map(|h| h.2));

    let mut panel = layout.panel(Some(label), true);
    for (ci, j, h) in heights {
        let (lo, hi) = slots.span(layout.positions[ci], j);
        let (face, line) = element_colors(group_color(hue.as_ref(), base, j), saturation, fill);
        let style = match face {
            Some(face) => FillStyle::filled(face),
            None => FillStyle::outline(line, points_to_px(1.5)),
        };
        panel.push(layout.rect((lo, hi), (floor, h), style));
    }
    patch_legend(&mut panel, hue.as_ref(), saturation);
    Ok(panel)
}

// =============================================================================
// catplot
// =============================================================================

pub fn catplot(kw: &Kwargs) -> Result<SceneGraph> {
    let kind = kw.text_or("kind", "strip");
    let spec = FacetSpec::from_kwargs(kw)?;
    let mut scene = facet_figure(kw, spec.grid());
    let (grid_rows, grid_cols) = spec.grid();
    let axis_px = (
        scene.width as f64 / grid_cols as f64 * 0.8,
        scene.height as f64 / grid_rows as f64 * 0.8,
    );
    let mut panels = Vec::new();
    for facet in spec.facets(&all_rows(kw.dataset())) {
        let rows = &facet.rows;
        let panel = match kind {
            "strip" => strip_panel(kw, rows),
            "swarm" => swarm_panel(kw, rows, axis_px),
            "box" => box_panel(kw, rows),
            "violin" => violin_panel(kw, rows),
            "boxen" => boxen_panel(kw, rows),
            "point" => point_panel(kw, rows),
            "bar" => bar_panel(kw, rows),
            "count" => count_panel(kw, rows),
            other => {
                return Err(PlotError::invalid("kind", format!("'{}' is not a categorical plot kind", other)).into())
            }
        }
        .with_context(|| format!("Failed to draw {} facet", kind))?;
        panels.push((facet, panel));
    }
    place_facets(&mut scene, panels);
    gather_legend(&mut scene);
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamRecord;

    fn make_dataset() -> Dataset {
        let days = ["Thu", "Fri", "Sat"];
        let mut rows = Vec::new();
        for i in 0..30 {
            let day = days[i % 3];
            let smoker = if i % 2 == 0 { "Yes" } else { "No" };
            let total = 10.0 + (i as f64 * 1.7) % 13.0 + (i % 3) as f64 * 4.0;
            rows.push(vec![day.to_string(), format!("{:.2}", total), smoker.to_string()]);
        }
        Dataset::from_rows(vec!["day".into(), "total".into(), "smoker".into()], rows)
    }

    fn record() -> ParamRecord {
        ParamRecord::new().with("x", "day").with("y", "total")
    }

    #[test]
    fn test_orientation_inferred_from_types() {
        let ds = make_dataset();
        let rec = ParamRecord::new().with("x", "total").with("y", "day");
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        let layout = CatLayout::from_kwargs(&kw, true).unwrap();
        assert!(layout.horizontal);
        assert_eq!(layout.levels, vec!["Thu", "Fri", "Sat"]);

        let rec = record();
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        assert!(!CatLayout::from_kwargs(&kw, true).unwrap().horizontal);
    }

    #[test]
    fn test_value_must_be_numeric() {
        let ds = make_dataset();
        let rec = ParamRecord::new().with("x", "day").with("y", "smoker");
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        let err = boxplot(&kw).unwrap_err();
        assert!(matches!(err.downcast_ref::<PlotError>(), Some(PlotError::NotNumeric(_))));
    }

    #[test]
    fn test_strip_is_deterministic() {
        let ds = make_dataset();
        let rec = record().with("jitter", 0.3);
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        assert_eq!(strip(&kw).unwrap(), strip(&kw).unwrap());
    }

    #[test]
    fn test_beeswarm_separates_ties() {
        let offsets = beeswarm(&[1.0, 1.0, 1.0], 0.1, 0.1);
        assert_eq!(offsets[0], 0.0);
        assert!((offsets[1] - 0.1).abs() < 1e-12);
        assert!((offsets[2] + 0.1).abs() < 1e-12);
        let spread = beeswarm(&[0.0, 10.0], 0.1, 0.1);
        assert_eq!(spread, vec![0.0, 0.0]);
    }

    #[test]
    fn test_box_dodges_hue() {
        let ds = make_dataset();
        let rec = record().with("hue", "smoker").with("dodge", "auto");
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        let scene = boxplot(&kw).unwrap();
        let boxes: Vec<(f64, f64)> = scene.panels[0]
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Rect { tl, br, .. } => Some((tl.0, br.0)),
                _ => None,
            })
            .collect();
        assert_eq!(boxes.len(), 6);
        assert!((boxes[0].0 + 0.4).abs() < 1e-9);
        assert!((boxes[0].1 - 0.0).abs() < 1e-9);
        assert_eq!(scene.panels[0].legend.len(), 2);
    }

    #[test]
    fn test_count_bars_match_rows() {
        let ds = make_dataset();
        let rec = ParamRecord::new().with("x", "day").with("orient", "v");
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        let scene = count(&kw).unwrap();
        let tops: Vec<f64> = scene.panels[0]
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Rect { tl, .. } => Some(tl.1),
                _ => None,
            })
            .collect();
        assert_eq!(tops, vec![10.0, 10.0, 10.0]);
        assert!(scene.panels[0].y.sticky_zero);
    }

    #[test]
    fn test_bar_estimates_mean() {
        let ds = Dataset::from_rows(
            vec!["g".into(), "v".into()],
            vec![
                vec!["a".into(), "1".into()],
                vec!["a".into(), "3".into()],
                vec!["b".into(), "10".into()],
            ],
        );
        let rec = ParamRecord::new()
            .with("x", "g")
            .with("y", "v")
            .with("estimator", "mean")
            .with("errorbar", "sd");
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        let scene = bar(&kw).unwrap();
        let tops: Vec<f64> = scene.panels[0]
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Rect { tl, .. } => Some(tl.1),
                _ => None,
            })
            .collect();
        assert_eq!(tops, vec![2.0, 10.0]);
    }

    #[test]
    fn test_violin_inner_validated() {
        let ds = make_dataset();
        let rec = record().with("inner", "ribbon");
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        assert!(violin(&kw).is_err());
        let rec = record().with("inner", "quart");
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        assert_eq!(violin(&kw).unwrap().panels[0].commands.len(), 6);
    }

    #[test]
    fn test_catplot_kinds_share_axes() {
        let ds = make_dataset();
        for kind in ["strip", "swarm", "box", "violin", "boxen", "point", "bar", "count"] {
            let rec = record()
                .with("kind", kind)
                .with("col", "smoker")
                .with("height", 3.0)
                .with("aspect", 1.0);
            let kw = Kwargs::new(&rec, &ds, 800, 600);
            let scene = catplot(&kw).unwrap();
            assert_eq!(scene.panels.len(), 2, "{}", kind);
            assert_eq!(scene.width, 600);
        }
    }
}
