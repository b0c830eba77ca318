use anyhow::{Context, Result};
use plotters::style::RGBColor;
use tracing::warn;

use super::*;
use crate::ir::{DrawCommand, FillStyle, LineStyle};
use crate::stats::{self, Bins, BwMethod};

const WHITE: RGBColor = RGBColor(255, 255, 255);
const RUG_HEIGHT: f64 = 0.025;
const MAX_GRID_2D: usize = 100;

/// Observations of one hue level (or of the whole column).
struct Group {
    label: Option<String>,
    color: RGBColor,
    values: Vec<f64>,
}

fn value_groups(
    column: &Column,
    hue: Option<&HueMap>,
    base: RGBColor,
    rows: &[usize],
    transform: AxisTransform,
) -> Result<Vec<Group>, PlotError> {
    column.numeric()?;
    let mut out = Vec::new();
    match hue {
        None => out.push(Group {
            label: None,
            color: base,
            values: numeric_values(column, rows, transform)?,
        }),
        Some(h) => {
            for (i, level) in h.levels.iter().enumerate() {
                let members: Vec<usize> = rows
                    .iter()
                    .copied()
                    .filter(|&r| h.level(r) == Some(i))
                    .collect();
                out.push(Group {
                    label: Some(level.clone()),
                    color: h.colors[i],
                    values: numeric_values(column, &members, transform)?,
                });
            }
        }
    }
    Ok(out)
}

/// Paired observations of one hue level.
struct PairGroup {
    color: RGBColor,
    xs: Vec<f64>,
    ys: Vec<f64>,
}

fn pair_groups(
    x: &Column,
    y: &Column,
    hue: Option<&HueMap>,
    base: RGBColor,
    rows: &[usize],
    transform: AxisTransform,
) -> Result<Vec<PairGroup>, PlotError> {
    x.numeric()?;
    y.numeric()?;
    let n_groups = hue.map_or(1, |h| h.levels.len());
    let mut groups: Vec<PairGroup> = (0..n_groups)
        .map(|i| PairGroup {
            color: hue.map_or(base, |h| h.colors[i]),
            xs: Vec::new(),
            ys: Vec::new(),
        })
        .collect();
    for &row in rows {
        let (Some(vx), Some(vy)) = (x.value(row), y.value(row)) else {
            continue;
        };
        let slot = match hue {
            Some(h) => match h.level(row) {
                Some(i) => i,
                None => continue,
            },
            None => 0,
        };
        groups[slot].xs.push(transform.apply(vx, x.name())?);
        groups[slot].ys.push(transform.apply(vy, y.name())?);
    }
    Ok(groups)
}

fn hue_legend(panel: &mut PanelScene, kw: &Kwargs, hue: Option<&HueMap>, as_line: bool) {
    let Some(h) = hue else { return };
    let mut legend = LegendBuilder::default();
    let entries = h
        .legend_items(kw.legend())
        .into_iter()
        .map(|(label, color)| {
            let swatch = if as_line {
                Swatch::Line(LineStyle::solid(color, 2.0))
            } else {
                Swatch::Patch(color)
            };
            entry(label, swatch)
        })
        .collect();
    legend.section(h.column.name(), entries);
    legend.apply(panel);
}

fn no_data(column: &Column) -> PlotError {
    PlotError::InsufficientData(format!("column `{}` has no numeric values to plot", column.name()))
}

// =============================================================================
// Histogram
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistStat {
    Count,
    Frequency,
    Probability,
    Percent,
    Density,
}

impl HistStat {
    fn parse(name: &str) -> Result<Self, PlotError> {
        match name {
            "count" => Ok(HistStat::Count),
            "frequency" => Ok(HistStat::Frequency),
            "probability" | "proportion" => Ok(HistStat::Probability),
            "percent" => Ok(HistStat::Percent),
            "density" => Ok(HistStat::Density),
            other => Err(PlotError::invalid("stat", format!("unknown histogram statistic '{}'", other))),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            HistStat::Count => "Count",
            HistStat::Frequency => "Frequency",
            HistStat::Probability => "Probability",
            HistStat::Percent => "Percent",
            HistStat::Density => "Density",
        }
    }

    /// Bar height for `count` observations in a bin of `width`.
    fn height(&self, count: f64, width: f64, total: f64) -> f64 {
        match self {
            HistStat::Count => count,
            HistStat::Frequency => count / width,
            HistStat::Probability => count / total,
            HistStat::Percent => 100.0 * count / total,
            HistStat::Density => count / (total * width),
        }
    }

    /// Running value after accumulating `count` observations.
    fn cumulative(&self, count: f64, total: f64) -> f64 {
        match self {
            HistStat::Count | HistStat::Frequency => count,
            HistStat::Probability | HistStat::Density => count / total,
            HistStat::Percent => 100.0 * count / total,
        }
    }

    /// Factor taking a unit-area density of `n` observations to this scale.
    fn density_scale(&self, n: f64, total: f64, binwidth: f64, cumulative: bool) -> f64 {
        let per_bin = if cumulative { 1.0 } else { binwidth };
        match self {
            HistStat::Count => n * per_bin,
            HistStat::Frequency => n,
            HistStat::Probability => n / total * per_bin,
            HistStat::Percent => 100.0 * n / total * per_bin,
            HistStat::Density => n / total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Multiple {
    Layer,
    Dodge,
    Stack,
    Fill,
}

impl Multiple {
    fn parse(name: &str, allow_dodge: bool) -> Result<Self, PlotError> {
        match name {
            "layer" => Ok(Multiple::Layer),
            "dodge" if allow_dodge => Ok(Multiple::Dodge),
            "stack" => Ok(Multiple::Stack),
            "fill" => Ok(Multiple::Fill),
            other => Err(PlotError::invalid("multiple", format!("'{}' is not supported here", other))),
        }
    }

    /// Offsets each layer so layers pile up (stack) or fill the unit
    /// interval (fill).
    fn bottoms(&self, heights: &mut [Vec<f64>]) -> Vec<Vec<f64>> {
        let mut bottoms: Vec<Vec<f64>> = heights.iter().map(|h| vec![0.0; h.len()]).collect();
        if !matches!(self, Multiple::Stack | Multiple::Fill) {
            return bottoms;
        }
        // Stacked layers share one grid.
        let n = heights.first().map_or(0, Vec::len);
        if *self == Multiple::Fill {
            for k in 0..n {
                let sum: f64 = heights.iter().map(|h| h[k]).sum();
                if sum > 0.0 {
                    for layer in heights.iter_mut() {
                        layer[k] /= sum;
                    }
                }
            }
        }
        for i in 1..heights.len() {
            for k in 0..n {
                bottoms[i][k] = bottoms[i - 1][k] + heights[i - 1][k];
            }
        }
        bottoms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Bars,
    Step,
    Poly,
}

impl Element {
    fn parse(name: &str) -> Result<Self, PlotError> {
        match name {
            "bars" => Ok(Element::Bars),
            "step" => Ok(Element::Step),
            "poly" => Ok(Element::Poly),
            other => Err(PlotError::invalid("element", format!("unknown element '{}'", other))),
        }
    }
}

pub fn histogram(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = histogram_panel(kw, &all_rows(kw.dataset())).context("Failed to build histogram")?;
    Ok(single_panel(kw, panel))
}

pub(crate) fn histogram_panel(kw: &Kwargs, rows: &[usize]) -> Result<PanelScene, PlotError> {
    let x = kw.required_column("x")?;
    let transform = AxisTransform { log: kw.log_scale() };
    let hue = HueMap::from_kwargs(kw, false)?;
    let base = kw.color("color")?;
    let bins = Bins::parse(kw.text_or("bins", "auto"))?;
    let binwidth = kw.float("binwidth");
    let discrete = kw.flag("discrete", false);
    if let Some(y) = kw.column("y")? {
        return histogram_2d(kw, x, y, hue.as_ref(), base, rows, transform, (bins, binwidth, discrete));
    }

    let stat = HistStat::parse(kw.text_or("stat", "count"))?;
    let multiple = Multiple::parse(kw.text_or("multiple", "layer"), true)?;
    let element = Element::parse(kw.text_or("element", "bars"))?;
    let cumulative = kw.flag("cumulative", false);
    let common_norm = kw.flag("common_norm", true);
    let common_bins = kw.flag("common_bins", true) || multiple != Multiple::Layer;
    let fill = kw.flag("fill", true);
    let shrink = kw.float_or("shrink", 1.0).clamp(0.01, 1.0);
    let show_kde = kw.flag("kde", false);

    let groups: Vec<Group> = value_groups(x, hue.as_ref(), base, rows, transform)?
        .into_iter()
        .filter(|g| !g.values.is_empty())
        .collect();
    let all: Vec<f64> = groups.iter().flat_map(|g| g.values.iter().copied()).collect();
    if all.is_empty() {
        return Err(no_data(x));
    }
    let total = all.len() as f64;
    let shared_edges = stats::bin_edges(&all, bins, binwidth, discrete);

    let mut layers: Vec<(Vec<f64>, Vec<f64>)> = Vec::with_capacity(groups.len());
    for group in &groups {
        let edges = if common_bins {
            shared_edges.clone()
        } else {
            stats::bin_edges(&group.values, bins, binwidth, discrete)
        };
        let counts = stats::histogram(&group.values, &edges);
        let norm = if common_norm { total } else { group.values.len() as f64 };
        let heights = if cumulative {
            let mut acc = 0.0;
            counts
                .iter()
                .map(|c| {
                    acc += c;
                    stat.cumulative(acc, norm)
                })
                .collect()
        } else {
            counts
                .iter()
                .zip(edges.windows(2))
                .map(|(c, e)| stat.height(*c, e[1] - e[0], norm))
                .collect()
        };
        layers.push((edges, heights));
    }
    let mut heights: Vec<Vec<f64>> = layers.iter().map(|(_, h)| h.clone()).collect();
    let bottoms = multiple.bottoms(&mut heights);

    let y_label = if multiple == Multiple::Fill { "Proportion" } else { stat.label() };
    let mut panel = PanelScene::new(
        axis_for(x, Some(x.name().to_string())).with_log(transform.log),
        Axis::continuous(Some(y_label.to_string())).with_sticky_zero(),
    );
    let n_layers = layers.len();
    let alpha = if n_layers > 1 && multiple == Multiple::Layer { 0.5 } else { 0.75 };

    for (i, ((edges, _), group)) in layers.iter().zip(&groups).enumerate() {
        let tops: Vec<f64> = heights[i].iter().zip(&bottoms[i]).map(|(h, b)| h + b).collect();
        match element {
            Element::Bars => {
                for k in 0..tops.len() {
                    if heights[i][k] <= 0.0 {
                        continue;
                    }
                    let (mut left, mut right) = (edges[k], edges[k + 1]);
                    if multiple == Multiple::Dodge {
                        let w = (right - left) / n_layers as f64;
                        left += w * i as f64;
                        right = left + w;
                    }
                    let center = (left + right) / 2.0;
                    let half = (right - left) * shrink / 2.0;
                    let style = if fill {
                        FillStyle::filled(group.color).with_alpha(alpha).with_edge(WHITE, 0.75)
                    } else {
                        FillStyle::outline(group.color, 1.5)
                    };
                    panel.push(DrawCommand::Rect {
                        tl: (center - half, tops[k]),
                        br: (center + half, bottoms[i][k]),
                        style,
                    });
                }
            }
            Element::Step | Element::Poly => {
                let (outline, floor) = if element == Element::Step {
                    step_outline(edges, &tops, &bottoms[i])
                } else {
                    poly_outline(edges, &tops, &bottoms[i])
                };
                if fill {
                    let mut area = outline.clone();
                    area.extend(floor.into_iter().rev());
                    panel.push(DrawCommand::Polygon {
                        points: area,
                        style: FillStyle::filled(group.color).with_alpha(alpha * 0.5),
                    });
                }
                panel.push(DrawCommand::Line {
                    points: outline,
                    style: LineStyle::solid(group.color, 1.5),
                });
            }
        }

        if show_kde && matches!(multiple, Multiple::Layer | Multiple::Dodge) {
            let Some(bw) = stats::bandwidth(&group.values, BwMethod::Scott, 1.0) else {
                warn!(group = ?group.label, "skipping KDE overlay: no spread in data");
                continue;
            };
            let grid = stats::kde_support(&group.values, bw, 3.0, 200, None);
            let density = stats::kde_eval(&group.values, bw, &grid);
            let curve = if cumulative {
                stats::cumulative_trapezoid(&grid, &density)
            } else {
                density
            };
            let mean_width = (edges[edges.len() - 1] - edges[0]) / (edges.len() - 1).max(1) as f64;
            let norm = if common_norm { total } else { group.values.len() as f64 };
            let factor = stat.density_scale(group.values.len() as f64, norm, mean_width, cumulative);
            panel.push(DrawCommand::Line {
                points: grid.iter().zip(&curve).map(|(g, d)| (*g, d * factor)).collect(),
                style: LineStyle::solid(group.color, 2.0),
            });
        }
    }

    hue_legend(&mut panel, kw, hue.as_ref(), false);
    Ok(panel)
}

/// Outline of a step histogram and the matching floor, left to right.
fn step_outline(edges: &[f64], tops: &[f64], bottoms: &[f64]) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    let mut outline = Vec::with_capacity(tops.len() * 2 + 2);
    let mut floor = Vec::with_capacity(tops.len() * 2);
    for k in 0..tops.len() {
        if k == 0 {
            outline.push((edges[0], bottoms[0]));
        }
        outline.push((edges[k], tops[k]));
        outline.push((edges[k + 1], tops[k]));
        floor.push((edges[k], bottoms[k]));
        floor.push((edges[k + 1], bottoms[k]));
    }
    if let (Some(&last_edge), Some(&last_bottom)) = (edges.last(), bottoms.last()) {
        outline.push((last_edge, last_bottom));
    }
    (outline, floor)
}

/// Polyline through bin centers and its floor.
fn poly_outline(edges: &[f64], tops: &[f64], bottoms: &[f64]) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    let centers = edges.windows(2).map(|e| (e[0] + e[1]) / 2.0);
    let outline = centers.clone().zip(tops).map(|(c, t)| (c, *t)).collect();
    let floor = centers.zip(bottoms).map(|(c, b)| (c, *b)).collect();
    (outline, floor)
}

fn bin_index(edges: &[f64], v: f64) -> Option<usize> {
    let n = edges.len().checked_sub(1)?;
    if n == 0 || v < edges[0] || v > edges[n] {
        return None;
    }
    Some(edges.partition_point(|e| *e <= v).saturating_sub(1).min(n - 1))
}

#[allow(clippy::too_many_arguments)]
fn histogram_2d(
    kw: &Kwargs,
    x: &Column,
    y: &Column,
    hue: Option<&HueMap>,
    base: RGBColor,
    rows: &[usize],
    transform: AxisTransform,
    (bins, binwidth, discrete): (Bins, Option<f64>, bool),
) -> Result<PanelScene, PlotError> {
    let groups = pair_groups(x, y, hue, base, rows, transform)?;
    let all_x: Vec<f64> = groups.iter().flat_map(|g| g.xs.iter().copied()).collect();
    let all_y: Vec<f64> = groups.iter().flat_map(|g| g.ys.iter().copied()).collect();
    if all_x.is_empty() {
        return Err(no_data(x));
    }
    let x_edges = stats::bin_edges(&all_x, bins, binwidth, discrete);
    let y_edges = stats::bin_edges(&all_y, bins, binwidth, discrete);

    let mut panel = PanelScene::new(
        axis_for(x, Some(x.name().to_string())).with_log(transform.log),
        axis_for(y, Some(y.name().to_string())).with_log(transform.log),
    );
    let alpha = if groups.len() > 1 { 0.6 } else { 1.0 };
    for group in &groups {
        let mut counts = vec![vec![0.0; x_edges.len() - 1]; y_edges.len() - 1];
        for (vx, vy) in group.xs.iter().zip(&group.ys) {
            if let (Some(i), Some(j)) = (bin_index(&x_edges, *vx), bin_index(&y_edges, *vy)) {
                counts[j][i] += 1.0;
            }
        }
        let max = counts.iter().flatten().copied().fold(0.0, f64::max);
        if max <= 0.0 {
            continue;
        }
        for (j, row) in counts.iter().enumerate() {
            for (i, c) in row.iter().enumerate() {
                if *c <= 0.0 {
                    continue;
                }
                let shade = palette::blend(WHITE, group.color, 0.15 + 0.85 * c / max);
                panel.push(DrawCommand::Rect {
                    tl: (x_edges[i], y_edges[j + 1]),
                    br: (x_edges[i + 1], y_edges[j]),
                    style: FillStyle::filled(shade).with_alpha(alpha),
                });
            }
        }
    }
    hue_legend(&mut panel, kw, hue, false);
    Ok(panel)
}

// =============================================================================
// KDE
// =============================================================================

pub fn kde(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = kde_panel(kw, &all_rows(kw.dataset())).context("Failed to build KDE plot")?;
    Ok(single_panel(kw, panel))
}

struct KdeOptions {
    bw_method: BwMethod,
    bw_adjust: f64,
    gridsize: usize,
    cut: f64,
}

impl KdeOptions {
    fn from_kwargs(kw: &Kwargs) -> Result<Self, PlotError> {
        let bw_adjust = kw.float_or("bw_adjust", 1.0);
        if bw_adjust <= 0.0 {
            return Err(PlotError::invalid("bw_adjust", "must be positive"));
        }
        Ok(Self {
            bw_method: BwMethod::parse(kw.text_or("bw_method", "scott"))?,
            bw_adjust,
            gridsize: kw.count_or("gridsize", 200).clamp(2, 2000),
            cut: kw.float_or("cut", 3.0).max(0.0),
        })
    }
}

pub(crate) fn kde_panel(kw: &Kwargs, rows: &[usize]) -> Result<PanelScene, PlotError> {
    let x = kw.required_column("x")?;
    let transform = AxisTransform { log: kw.log_scale() };
    let hue = HueMap::from_kwargs(kw, false)?;
    let base = kw.color("color")?;
    let opts = KdeOptions::from_kwargs(kw)?;
    if let Some(y) = kw.column("y")? {
        return kde_2d(kw, x, y, hue.as_ref(), base, rows, transform, &opts);
    }

    let multiple = Multiple::parse(kw.text_or("multiple", "layer"), false)?;
    let common_grid = kw.flag("common_grid", false) || multiple != Multiple::Layer;
    let common_norm = kw.flag("common_norm", true);
    let cumulative = kw.flag("cumulative", false);
    let fill = kw.flag("fill", false) || multiple != Multiple::Layer;

    let groups = value_groups(x, hue.as_ref(), base, rows, transform)?;
    let total: usize = groups.iter().map(|g| g.values.len()).sum();
    if total == 0 {
        return Err(no_data(x));
    }

    let mut fitted: Vec<(&Group, f64)> = Vec::new();
    for group in &groups {
        match stats::bandwidth(&group.values, opts.bw_method, opts.bw_adjust) {
            Some(bw) => fitted.push((group, bw)),
            None if group.values.is_empty() => {}
            None => warn!(group = ?group.label, "dataset has zero variance; skipping density estimate"),
        }
    }
    if fitted.is_empty() {
        return Err(PlotError::InsufficientData(format!(
            "kernel density estimate of `{}` needs at least two distinct values",
            x.name()
        )));
    }

    let shared_grid = if common_grid {
        let mut mm = scale::MinMax::default();
        for (group, bw) in &fitted {
            let support = stats::kde_support(&group.values, *bw, opts.cut, 2, None);
            mm.include(support[0]);
            mm.include(support[1]);
        }
        Some(stats::linspace(mm.min, mm.max, opts.gridsize))
    } else {
        None
    };

    let mut grids = Vec::with_capacity(fitted.len());
    let mut curves = Vec::with_capacity(fitted.len());
    for (group, bw) in &fitted {
        let grid = match &shared_grid {
            Some(grid) => grid.clone(),
            None => stats::kde_support(&group.values, *bw, opts.cut, opts.gridsize, None),
        };
        let scale_by = if common_norm {
            group.values.len() as f64 / total as f64
        } else {
            1.0
        };
        let mut density: Vec<f64> = stats::kde_eval(&group.values, *bw, &grid)
            .into_iter()
            .map(|d| d * scale_by)
            .collect();
        if cumulative {
            density = stats::cumulative_trapezoid(&grid, &density);
        }
        grids.push(grid);
        curves.push(density);
    }
    let bottoms = multiple.bottoms(&mut curves);

    let y_label = if cumulative { "Cumulative density" } else { "Density" };
    let mut panel = PanelScene::new(
        axis_for(x, Some(x.name().to_string())).with_log(transform.log),
        Axis::continuous(Some(y_label.to_string())).with_sticky_zero(),
    );
    let alpha = if multiple == Multiple::Layer { 0.25 } else { 0.75 };
    for (i, (group, _)) in fitted.iter().enumerate() {
        let top: Vec<(f64, f64)> = grids[i]
            .iter()
            .zip(curves[i].iter().zip(&bottoms[i]))
            .map(|(g, (d, b))| (*g, d + b))
            .collect();
        if fill {
            let mut area = top.clone();
            area.extend(grids[i].iter().zip(&bottoms[i]).rev().map(|(g, b)| (*g, *b)));
            panel.push(DrawCommand::Polygon {
                points: area,
                style: FillStyle::filled(group.color).with_alpha(alpha),
            });
        }
        panel.push(DrawCommand::Line {
            points: top,
            style: LineStyle::solid(group.color, 2.0),
        });
    }
    hue_legend(&mut panel, kw, hue.as_ref(), !fill);
    Ok(panel)
}

#[allow(clippy::too_many_arguments)]
fn kde_2d(
    kw: &Kwargs,
    x: &Column,
    y: &Column,
    hue: Option<&HueMap>,
    base: RGBColor,
    rows: &[usize],
    transform: AxisTransform,
    opts: &KdeOptions,
) -> Result<PanelScene, PlotError> {
    let n_levels = kw.count_or("levels", 10);
    let fill = kw.flag("fill", false);
    let gridsize = opts.gridsize.min(MAX_GRID_2D);
    let groups = pair_groups(x, y, hue, base, rows, transform)?;

    let mut panel = PanelScene::new(
        axis_for(x, Some(x.name().to_string())).with_log(transform.log),
        axis_for(y, Some(y.name().to_string())).with_log(transform.log),
    );
    let mut drawn = 0;
    for group in &groups {
        let bws = (
            stats::bandwidth(&group.xs, opts.bw_method, opts.bw_adjust),
            stats::bandwidth(&group.ys, opts.bw_method, opts.bw_adjust),
        );
        let (Some(bwx), Some(bwy)) = bws else {
            if !group.xs.is_empty() {
                warn!("dataset has zero variance; skipping bivariate density estimate");
            }
            continue;
        };
        let gx = stats::kde_support(&group.xs, bwx, opts.cut, gridsize, None);
        let gy = stats::kde_support(&group.ys, bwy, opts.cut, gridsize, None);
        let field = stats::kde2d(&group.xs, &group.ys, (bwx, bwy), &gx, &gy);
        let levels = stats::iso_proportion_levels(&field, n_levels, 0.05);
        let shade = |li: usize| {
            let t = if levels.len() > 1 {
                li as f64 / (levels.len() - 1) as f64
            } else {
                1.0
            };
            palette::blend(WHITE, group.color, 0.25 + 0.75 * t)
        };

        if fill && !levels.is_empty() {
            let dx = (gx[1] - gx[0]) / 2.0;
            let dy = (gy[1] - gy[0]) / 2.0;
            for (j, row) in field.iter().enumerate() {
                for (i, value) in row.iter().enumerate() {
                    let band = levels.partition_point(|l| l <= value);
                    if band == 0 {
                        continue;
                    }
                    panel.push(DrawCommand::Rect {
                        tl: (gx[i] - dx, gy[j] + dy),
                        br: (gx[i] + dx, gy[j] - dy),
                        style: FillStyle::filled(shade(band - 1)).with_alpha(if hue.is_some() { 0.6 } else { 1.0 }),
                    });
                }
            }
        } else {
            for (li, level) in levels.iter().enumerate() {
                let segments = stats::contour_segments(&field, &gx, &gy, *level);
                if segments.is_empty() {
                    continue;
                }
                panel.push(DrawCommand::Segments {
                    segments,
                    style: LineStyle::solid(shade(li), 1.5),
                });
            }
        }
        drawn += 1;
    }
    if drawn == 0 {
        return Err(PlotError::InsufficientData(
            "bivariate density estimate needs at least two distinct values on each axis".into(),
        ));
    }
    hue_legend(&mut panel, kw, hue, !fill);
    Ok(panel)
}

// =============================================================================
// ECDF
// =============================================================================

pub fn ecdf(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = ecdf_panel(kw, &all_rows(kw.dataset())).context("Failed to build ECDF plot")?;
    Ok(single_panel(kw, panel))
}

pub(crate) fn ecdf_panel(kw: &Kwargs, rows: &[usize]) -> Result<PanelScene, PlotError> {
    let x = kw.required_column("x")?;
    if kw.column("y")?.is_some() {
        return Err(PlotError::invalid("y", "bivariate ECDF plots are not implemented"));
    }
    let transform = AxisTransform { log: kw.log_scale() };
    let hue = HueMap::from_kwargs(kw, false)?;
    let base = kw.color("color")?;
    let complementary = kw.flag("complementary", false);
    let (label, unit) = match kw.text_or("stat", "proportion") {
        "proportion" => ("Proportion", None),
        "percent" => ("Percent", Some(100.0)),
        "count" => ("Count", None),
        other => {
            return Err(PlotError::invalid("stat", format!("unknown ECDF statistic '{}'", other)))
        }
    };

    let groups = value_groups(x, hue.as_ref(), base, rows, transform)?;
    if groups.iter().all(|g| g.values.is_empty()) {
        return Err(no_data(x));
    }
    let mut panel = PanelScene::new(
        axis_for(x, Some(x.name().to_string())).with_log(transform.log),
        Axis::continuous(Some(label.to_string())).with_sticky_zero(),
    );
    for group in groups.iter().filter(|g| !g.values.is_empty()) {
        let (xs, ps) = stats::ecdf(&group.values);
        let top = match (label, unit) {
            ("Count", _) => xs.len() as f64,
            (_, Some(scale_to)) => scale_to,
            _ => 1.0,
        };
        let value = |p: f64| {
            let p = if complementary { 1.0 - p } else { p };
            p * top
        };
        let mut points = Vec::with_capacity(xs.len() * 2 + 1);
        points.push((xs[0], value(0.0)));
        let mut previous = 0.0;
        for (vx, p) in xs.iter().zip(&ps) {
            points.push((*vx, value(previous)));
            points.push((*vx, value(*p)));
            previous = *p;
        }
        panel.push(DrawCommand::Line {
            points,
            style: LineStyle::solid(group.color, 2.0),
        });
    }
    hue_legend(&mut panel, kw, hue.as_ref(), true);
    Ok(panel)
}

// =============================================================================
// Rug
// =============================================================================

pub fn rug(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = rug_panel(kw, &all_rows(kw.dataset())).context("Failed to build rug plot")?;
    Ok(single_panel(kw, panel))
}

fn rug_panel(kw: &Kwargs, rows: &[usize]) -> Result<PanelScene, PlotError> {
    let x = kw.required_column("x")?;
    let y = kw.column("y")?;
    let hue = HueMap::from_kwargs(kw, false)?;
    let base = kw.color("color")?;
    let height = kw.float_or("height", RUG_HEIGHT).clamp(0.0, 1.0);
    let expand = kw.flag("expand_margins", true);

    let x_groups = value_groups(x, hue.as_ref(), base, rows, AxisTransform::LINEAR)?;
    let x_mm = scale::MinMax::of(x_groups.iter().flat_map(|g| g.values.iter().copied()));
    if x_mm.is_empty() {
        return Err(no_data(x));
    }
    let (x_lo, x_hi) = scale::pad_range(x_mm.min, x_mm.max);

    let y_groups = match y {
        Some(y) => Some(value_groups(y, hue.as_ref(), base, rows, AxisTransform::LINEAR)?),
        None => None,
    };
    let (y_lo, y_hi) = match &y_groups {
        Some(groups) => {
            let mm = scale::MinMax::of(groups.iter().flat_map(|g| g.values.iter().copied()));
            if mm.is_empty() {
                (0.0, 1.0)
            } else {
                scale::pad_range(mm.min, mm.max)
            }
        }
        None => (0.0, 1.0),
    };

    let y_span = y_hi - y_lo;
    let x_span = x_hi - x_lo;
    let (y_floor, y_tick) = rug_band(y_lo, y_span, height, expand);
    let (x_floor, x_tick) = rug_band(x_lo, x_span, height, expand);
    let y_axis = match y {
        Some(col) => axis_for(col, Some(col.name().to_string())),
        None => Axis::continuous(None),
    };
    let mut panel = PanelScene::new(
        axis_for(x, Some(x.name().to_string())).with_limits(if y.is_some() {
            (x_floor.min(x_lo), x_hi)
        } else {
            (x_lo, x_hi)
        }),
        y_axis.with_limits((y_floor.min(y_lo), y_hi)),
    );
    for group in &x_groups {
        push_rug(&mut panel, &group.values, true, (y_floor, y_tick), group.color);
    }
    if let Some(groups) = &y_groups {
        for group in groups {
            push_rug(&mut panel, &group.values, false, (x_floor, x_tick), group.color);
        }
    }
    hue_legend(&mut panel, kw, hue.as_ref(), true);
    Ok(panel)
}

/// Start and length of the rug ticks below (or left of) an axis range
/// starting at `lo`.
fn rug_band(lo: f64, span: f64, height: f64, expand: bool) -> (f64, f64) {
    let length = span * height;
    if expand {
        (lo - length, length)
    } else {
        (lo, length)
    }
}

fn push_rug(panel: &mut PanelScene, values: &[f64], along_x: bool, (start, length): (f64, f64), color: RGBColor) {
    if values.is_empty() {
        return;
    }
    let segments = values
        .iter()
        .map(|v| {
            if along_x {
                [(*v, start), (*v, start + length)]
            } else {
                [(start, *v), (start + length, *v)]
            }
        })
        .collect();
    panel.push(DrawCommand::Segments {
        segments,
        style: LineStyle::solid(color, 1.0),
    });
}

/// Rug ticks hung below the content already in `panel`.
fn add_rug(panel: &mut PanelScene, kw: &Kwargs, rows: &[usize], transform: AxisTransform) -> Result<(), PlotError> {
    let x = kw.required_column("x")?;
    let hue = HueMap::from_kwargs(kw, false)?;
    let base = kw.color("color")?;
    let mut y_mm = scale::MinMax::default();
    let mut x_mm = scale::MinMax::default();
    for command in &panel.commands {
        for (px, py) in command.coords() {
            x_mm.include(px);
            y_mm.include(py);
        }
    }
    if y_mm.is_empty() {
        return Ok(());
    }
    let y_lo = if panel.y.sticky_zero { y_mm.min.min(0.0) } else { y_mm.min };
    let length = (y_mm.max - y_lo).max(f64::EPSILON) * RUG_HEIGHT;
    for group in value_groups(x, hue.as_ref(), base, rows, transform)? {
        push_rug(panel, &group.values, true, (y_lo - length, length), group.color);
    }
    if let Some(y) = kw.column("y")? {
        let x_lo = x_mm.min;
        let length = (x_mm.max - x_lo).max(f64::EPSILON) * RUG_HEIGHT;
        for group in value_groups(y, hue.as_ref(), base, rows, transform)? {
            push_rug(panel, &group.values, false, (x_lo - length, length), group.color);
        }
    }
    Ok(())
}

// =============================================================================
// displot
// =============================================================================

pub fn displot(kw: &Kwargs) -> Result<SceneGraph> {
    let kind = kw.text_or("kind", "hist");
    let build: fn(&Kwargs, &[usize]) -> Result<PanelScene, PlotError> = match kind {
        "hist" => histogram_panel,
        "kde" => kde_panel,
        "ecdf" => ecdf_panel,
        other => {
            return Err(PlotError::invalid("kind", format!("'{}' is not hist, kde or ecdf", other)).into())
        }
    };
    let with_rug = kw.flag("rug", false);
    let transform = AxisTransform { log: kw.log_scale() };

    let x = kw.required_column("x")?;

    let spec = FacetSpec::from_kwargs(kw)?;
    let mut scene = facet_figure(kw, spec.grid());
    let facets = spec.facets(&all_rows(kw.dataset()));
    let many = facets.len() > 1;
    let mut panels = Vec::new();
    for facet in facets {
        let mut panel = match build(kw, &facet.rows) {
            Ok(panel) => panel,
            Err(PlotError::InsufficientData(reason)) if many => {
                warn!(facet = ?facet.title, %reason, "leaving facet empty");
                PanelScene::new(
                    axis_for(x, Some(x.name().to_string())).with_log(transform.log),
                    Axis::continuous(None),
                )
            }
            Err(err) => return Err(err).context(format!("Failed to draw {} facet", kind)),
        };
        if with_rug {
            add_rug(&mut panel, kw, &facet.rows, transform)?;
        }
        panels.push((facet, panel));
    }
    place_facets(&mut scene, panels);
    gather_legend(&mut scene);
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamRecord, ParamValue};

    fn make_dataset() -> Dataset {
        let mut rows = Vec::new();
        for i in 0..40 {
            let group = if i % 2 == 0 { "a" } else { "b" };
            let value = (i as f64 * 0.37).sin() * 5.0 + i as f64 / 4.0;
            let other = (i as f64 * 0.91).cos() * 3.0 + i as f64 / 8.0;
            rows.push(vec![format!("{:.3}", value), format!("{:.3}", other), group.to_string()]);
        }
        Dataset::from_rows(vec!["v".into(), "w".into(), "g".into()], rows)
    }

    fn rects(panel: &PanelScene) -> Vec<(f64, f64, f64, f64)> {
        panel
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Rect { tl, br, .. } => Some((tl.0, tl.1, br.0, br.1)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_histogram_counts_sum_to_rows() {
        let ds = make_dataset();
        let record = ParamRecord::new().with("x", "v").with("bins", "8");
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let scene = histogram(&kw).unwrap();
        let total: f64 = rects(&scene.panels[0]).iter().map(|r| r.1 - r.3).sum();
        assert_eq!(total, 40.0);
    }

    #[test]
    fn test_histogram_density_integrates_to_one() {
        let ds = make_dataset();
        let record = ParamRecord::new()
            .with("x", "v")
            .with("stat", "density")
            .with("bins", "10");
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let scene = histogram(&kw).unwrap();
        let area: f64 = rects(&scene.panels[0])
            .iter()
            .map(|r| (r.2 - r.0) * (r.1 - r.3))
            .sum();
        assert!((area - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_fill_stacks_to_one() {
        let ds = make_dataset();
        let record = ParamRecord::new()
            .with("x", "v")
            .with("hue", "g")
            .with("multiple", "fill")
            .with("bins", "5");
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let scene = histogram(&kw).unwrap();
        let tallest = rects(&scene.panels[0])
            .iter()
            .map(|r| r.1)
            .fold(0.0, f64::max);
        assert!((tallest - 1.0).abs() < 1e-9);
        assert_eq!(scene.panels[0].legend.len(), 2);
    }

    #[test]
    fn test_histogram_rejects_text_column() {
        let ds = make_dataset();
        let record = ParamRecord::new().with("x", "g");
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let err = histogram(&kw).unwrap_err();
        assert!(matches!(err.downcast_ref::<PlotError>(), Some(PlotError::NotNumeric(_))));
    }

    #[test]
    fn test_kde_common_norm_splits_mass() {
        let ds = make_dataset();
        let record = ParamRecord::new()
            .with("x", "v")
            .with("hue", "g")
            .with("cumulative", true)
            .with("cut", 6.0);
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let scene = kde(&kw).unwrap();
        for command in &scene.panels[0].commands {
            if let DrawCommand::Line { points, .. } = command {
                let end = points.last().unwrap().1;
                assert!((end - 0.5).abs() < 0.01, "ends at {}", end);
            }
        }
    }

    #[test]
    fn test_kde_constant_data_is_insufficient() {
        let ds = Dataset::from_rows(
            vec!["c".into()],
            vec![vec!["2".into()], vec!["2".into()], vec!["2".into()]],
        );
        let record = ParamRecord::new().with("x", "c");
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let err = kde(&kw).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlotError>(),
            Some(PlotError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_bivariate_kde_draws_contours() {
        let ds = make_dataset();
        let record = ParamRecord::new()
            .with("x", "v")
            .with("y", "w")
            .with("levels", 4i64)
            .with("gridsize", 40i64);
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let scene = kde(&kw).unwrap();
        assert!(scene.panels[0]
            .commands
            .iter()
            .all(|c| matches!(c, DrawCommand::Segments { .. })));
        assert!(!scene.panels[0].commands.is_empty());
    }

    #[test]
    fn test_ecdf_complementary_and_bivariate() {
        let ds = make_dataset();
        let record = ParamRecord::new().with("x", "v").with("complementary", true);
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let scene = ecdf(&kw).unwrap();
        let DrawCommand::Line { points, .. } = &scene.panels[0].commands[0] else {
            panic!("expected a line");
        };
        assert_eq!(points.first().unwrap().1, 1.0);
        assert!(points.last().unwrap().1.abs() < 1e-12);

        let record = ParamRecord::new().with("x", "v").with("y", "w");
        let kw = Kwargs::new(&record, &ds, 800, 600);
        assert!(ecdf(&kw).is_err());
    }

    #[test]
    fn test_rug_ticks_in_margin() {
        let ds = make_dataset();
        let record = ParamRecord::new()
            .with("x", "v")
            .with("height", 0.1)
            .with("expand_margins", true);
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let scene = rug(&kw).unwrap();
        let panel = &scene.panels[0];
        let DrawCommand::Segments { segments, .. } = &panel.commands[0] else {
            panic!("expected segments");
        };
        assert_eq!(segments.len(), 40);
        assert!((segments[0][0].1 + 0.1).abs() < 1e-12);
        assert_eq!(panel.y.limits, Some((-0.1, 1.0)));
    }

    #[test]
    fn test_displot_facets_with_rug() {
        let ds = make_dataset();
        let record = ParamRecord::new()
            .with("x", "v")
            .with("kind", "kde")
            .with("col", "g")
            .with("rug", true)
            .with("height", 4.0)
            .with("aspect", 1.0)
            .with("legend", ParamValue::Bool(true));
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let scene = displot(&kw).unwrap();
        assert_eq!(scene.panels.len(), 2);
        assert_eq!((scene.width, scene.height), (800, 400));
        assert!(scene.panels.iter().all(|p| p
            .commands
            .iter()
            .any(|c| matches!(c, DrawCommand::Segments { .. }))));
    }
}
