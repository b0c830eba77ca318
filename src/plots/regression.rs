use anyhow::{Context, Result};
use plotters::style::RGBColor;
use tracing::warn;

use super::relational::{area_to_radius, points_to_px};
use super::*;
use crate::ir::{DrawCommand, FillStyle, LineStyle, PointStyle};
use crate::stats;

const GRID_POINTS: usize = 100;
const SCATTER_AREA: f64 = 36.0;
const LOWESS_FRAC: f64 = 2.0 / 3.0;
const ZERO_LINE_GRAY: RGBColor = RGBColor(0x80, 0x80, 0x80);

// =============================================================================
// Fit options
// =============================================================================

/// Which model the fitted line comes from; at most one non-default choice.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Model {
    Poly(usize),
    Logistic,
    Lowess,
    Robust,
    LogX,
}

impl Model {
    fn from_kwargs(kw: &Kwargs) -> Result<Self, PlotError> {
        let order = kw.count_or("order", 1).max(1);
        let mut chosen = Vec::new();
        if order > 1 {
            chosen.push(Model::Poly(order));
        }
        for (key, model) in [
            ("logistic", Model::Logistic),
            ("lowess", Model::Lowess),
            ("robust", Model::Robust),
            ("logx", Model::LogX),
        ] {
            if kw.flag(key, false) {
                chosen.push(model);
            }
        }
        match chosen.as_slice() {
            [] => Ok(Model::Poly(1)),
            [one] => Ok(*one),
            _ => Err(PlotError::invalid(
                "order",
                "order, logistic, lowess, robust and logx are mutually exclusive",
            )),
        }
    }

    /// Evaluate the fitted model on `grid`; lowess supplies its own grid.
    fn predict(&self, x: &[f64], y: &[f64], grid: &[f64]) -> Option<(Vec<f64>, Vec<f64>)> {
        let on_grid = |f: &dyn Fn(f64) -> f64| grid.iter().map(|g| f(*g)).collect::<Vec<_>>();
        match self {
            Model::Poly(order) => {
                let c = stats::polyfit(x, y, *order, None)?;
                Some((grid.to_vec(), on_grid(&|g| stats::polyval(&c, g))))
            }
            Model::Robust => {
                let c = stats::robust_fit(x, y)?;
                Some((grid.to_vec(), on_grid(&|g| stats::polyval(&c, g))))
            }
            Model::Logistic => {
                let b = stats::logistic_fit(x, y)?;
                Some((grid.to_vec(), on_grid(&|g| stats::sigmoid(b[0] + b[1] * g))))
            }
            Model::LogX => {
                let lx: Vec<f64> = x.iter().map(|v| v.ln()).collect();
                let c = stats::polyfit(&lx, y, 1, None)?;
                Some((grid.to_vec(), on_grid(&|g| stats::polyval(&c, g.ln()))))
            }
            Model::Lowess => {
                let (xs, fitted) = stats::lowess(x, y, LOWESS_FRAC, 3);
                Some((xs, fitted))
            }
        }
    }

    fn bootstraps(&self) -> bool {
        !matches!(self, Model::Lowess)
    }
}

struct RegOptions {
    fit: bool,
    model: Model,
    ci: Option<f64>,
    n_boot: usize,
    truncate: bool,
    scatter: bool,
    x_jitter: f64,
    y_jitter: f64,
    x_estimator: Option<stats::Estimator>,
    x_bins: Option<usize>,
    dropna: bool,
}

impl RegOptions {
    fn from_kwargs(kw: &Kwargs) -> Result<Self, PlotError> {
        let x_bins = kw.get("x_bins").as_i64().filter(|n| *n > 0).map(|n| n as usize);
        let mut x_estimator = kw.estimator_for("x_estimator")?;
        if x_bins.is_some() && x_estimator.is_none() {
            x_estimator = Some(stats::Estimator::Mean);
        }
        Ok(Self {
            fit: kw.flag("fit_reg", true),
            model: Model::from_kwargs(kw)?,
            ci: kw.float("ci").filter(|c| *c > 0.0 && *c <= 100.0),
            n_boot: kw.count_or("n_boot", 1000).max(1),
            truncate: kw.flag("truncate", true),
            scatter: kw.flag("scatter", true),
            x_jitter: kw.float_or("x_jitter", 0.0).max(0.0),
            y_jitter: kw.float_or("y_jitter", 0.0).max(0.0),
            x_estimator,
            x_bins,
            dropna: kw.flag("dropna", true),
        })
    }
}

// =============================================================================
// Layers
// =============================================================================

/// Paired numeric observations of one regression layer.
struct Observations {
    x: Vec<f64>,
    y: Vec<f64>,
    missing: usize,
}

fn observations(x: &Column, y: &Column, rows: &[usize]) -> Result<Observations, PlotError> {
    x.numeric()?;
    y.numeric()?;
    let mut obs = Observations {
        x: Vec::new(),
        y: Vec::new(),
        missing: 0,
    };
    for &row in rows {
        match (x.value(row), y.value(row)) {
            (Some(a), Some(b)) => {
                obs.x.push(a);
                obs.y.push(b);
            }
            _ => obs.missing += 1,
        }
    }
    Ok(obs)
}

/// Bin centers spread evenly over the data; each x snaps to the nearest.
fn bin_x(x: &[f64], bins: usize) -> Vec<f64> {
    let mm = scale::MinMax::of(x.iter().copied());
    if mm.is_empty() {
        return Vec::new();
    }
    let centers = if bins <= 1 || mm.max <= mm.min {
        vec![(mm.min + mm.max) / 2.0]
    } else {
        stats::linspace(mm.min, mm.max, bins)
    };
    x.iter()
        .map(|v| {
            centers
                .iter()
                .copied()
                .min_by(|a, b| (a - v).abs().total_cmp(&(b - v).abs()))
                .unwrap_or(*v)
        })
        .collect()
}

/// Draw one regression layer (scatter plus fit) onto `panel`.
fn regression_layer(
    panel: &mut PanelScene,
    opts: &RegOptions,
    obs: &Observations,
    color: RGBColor,
    marker: Marker,
) -> Result<(), PlotError> {
    let mut rng = stats::rng();
    let radius = area_to_radius(SCATTER_AREA);
    if opts.scatter && !obs.x.is_empty() {
        match opts.x_estimator {
            Some(estimator) => {
                let xs = match opts.x_bins {
                    Some(bins) => bin_x(&obs.x, bins),
                    None => obs.x.clone(),
                };
                let mut levels: Vec<f64> = xs.clone();
                levels.sort_by(|a, b| a.total_cmp(b));
                levels.dedup();
                let mut points = Vec::new();
                let mut segments = Vec::new();
                for level in levels {
                    let ys: Vec<f64> = xs
                        .iter()
                        .zip(&obs.y)
                        .filter(|(x, _)| **x == level)
                        .map(|(_, y)| *y)
                        .collect();
                    points.push((level, estimator.apply(&ys)));
                    if let Some(ci) = opts.ci {
                        let interval = stats::ErrorBar::Ci(ci).interval(&ys, estimator, opts.n_boot, &mut rng);
                        if let Some((lo, hi)) = interval {
                            segments.push([(level, lo), (level, hi)]);
                        }
                    }
                }
                if !segments.is_empty() {
                    panel.push(DrawCommand::Segments {
                        segments,
                        style: LineStyle::solid(color, points_to_px(1.5)),
                    });
                }
                let mut style = PointStyle::new(color, radius);
                style.marker = marker;
                panel.push(DrawCommand::Points { points, style });
            }
            None => {
                let jx = stats::jitter(obs.x.len(), opts.x_jitter, &mut rng);
                let jy = stats::jitter(obs.y.len(), opts.y_jitter, &mut rng);
                let mut style = PointStyle::new(color, radius);
                style.marker = marker;
                style.alpha = 0.8;
                panel.push(DrawCommand::Points {
                    points: obs
                        .x
                        .iter()
                        .zip(&obs.y)
                        .zip(jx.iter().zip(&jy))
                        .map(|((x, y), (dx, dy))| (x + dx, y + dy))
                        .collect(),
                    style,
                });
            }
        }
    }

    if !opts.fit {
        return Ok(());
    }
    if obs.missing > 0 && !opts.dropna {
        warn!(missing = obs.missing, "missing values present and dropna is off; skipping the fit");
        return Ok(());
    }
    if opts.model == Model::Logistic && obs.y.iter().any(|v| !(0.0..=1.0).contains(v)) {
        return Err(PlotError::invalid("logistic", "the y variable must lie in [0, 1]"));
    }
    if opts.model == Model::LogX && obs.x.iter().any(|v| *v <= 0.0) {
        return Err(PlotError::invalid("logx", "the x variable must be positive"));
    }

    let mm = scale::MinMax::of(obs.x.iter().copied());
    if mm.is_empty() {
        return Ok(());
    }
    let (lo, hi) = if opts.truncate {
        (mm.min, mm.max)
    } else {
        scale::pad_range(mm.min, mm.max)
    };
    let lo = if opts.model == Model::LogX { lo.max(mm.min) } else { lo };
    let grid = stats::linspace(lo, hi, GRID_POINTS);
    let Some((gx, gy)) = opts.model.predict(&obs.x, &obs.y, &grid) else {
        warn!("regression could not be fitted; drawing the scatter only");
        return Ok(());
    };

    if let Some(ci) = opts.ci.filter(|_| opts.model.bootstraps()) {
        let n = obs.x.len();
        let mut boots: Vec<Vec<f64>> = vec![Vec::with_capacity(opts.n_boot); gx.len()];
        for _ in 0..opts.n_boot {
            let idx = stats::resample_indices(n, &mut rng);
            let bx: Vec<f64> = idx.iter().map(|&i| obs.x[i]).collect();
            let by: Vec<f64> = idx.iter().map(|&i| obs.y[i]).collect();
            if let Some((_, fitted)) = opts.model.predict(&bx, &by, &gx) {
                for (slot, v) in boots.iter_mut().zip(fitted) {
                    if v.is_finite() {
                        slot.push(v);
                    }
                }
            }
        }
        let alpha = (100.0 - ci) / 200.0;
        let bands: Vec<(f64, f64)> = boots
            .iter()
            .map(|b| {
                let s = stats::sorted(b);
                (stats::percentile(&s, alpha), stats::percentile(&s, 1.0 - alpha))
            })
            .collect();
        if boots.iter().all(|b| !b.is_empty()) {
            let mut outline: Vec<(f64, f64)> = gx.iter().zip(&bands).map(|(x, b)| (*x, b.1)).collect();
            outline.extend(gx.iter().zip(&bands).rev().map(|(x, b)| (*x, b.0)));
            panel.push(DrawCommand::Polygon {
                points: outline,
                style: FillStyle::filled(color).with_alpha(0.15),
            });
        }
    }
    panel.push(DrawCommand::Line {
        points: gx.into_iter().zip(gy).collect(),
        style: LineStyle::solid(color, points_to_px(2.0)),
    });
    Ok(())
}

// =============================================================================
// regplot, lmplot
// =============================================================================

pub fn regplot(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = regplot_panel(kw).context("Failed to build regression plot")?;
    Ok(single_panel(kw, panel))
}

fn regplot_panel(kw: &Kwargs) -> Result<PanelScene, PlotError> {
    let x = kw.required_column("x")?;
    let y = kw.required_column("y")?;
    let opts = RegOptions::from_kwargs(kw)?;
    let color = kw.color("color")?;
    let marker = Marker::from_code(kw.text_or("marker", "o")).unwrap_or(Marker::Circle);
    let obs = observations(x, y, &all_rows(kw.dataset()))?;
    let mut panel = PanelScene::new(
        axis_for(x, Some(x.name().to_string())),
        axis_for(y, Some(y.name().to_string())),
    );
    regression_layer(&mut panel, &opts, &obs, color, marker)?;
    Ok(panel)
}

/// Marker codes separated by commas or spaces, cycled over hue levels.
fn marker_cycle(text: &str) -> Vec<Marker> {
    let markers: Vec<Marker> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(Marker::from_code)
        .collect();
    if markers.is_empty() {
        vec![Marker::Circle]
    } else {
        markers
    }
}

pub fn lmplot(kw: &Kwargs) -> Result<SceneGraph> {
    let x = kw.required_column("x")?;
    let y = kw.required_column("y")?;
    let opts = RegOptions::from_kwargs(kw)?;
    let hue = HueMap::from_kwargs(kw, true)?;
    let base = kw.color("color")?;
    let markers = marker_cycle(kw.text_or("markers", "o"));
    let spec = FacetSpec::from_kwargs(kw)?;
    let mut scene = facet_figure(kw, spec.grid());

    let mut panels = Vec::new();
    for facet in spec.facets(&all_rows(kw.dataset())) {
        let mut panel = PanelScene::new(
            axis_for(x, Some(x.name().to_string())),
            axis_for(y, Some(y.name().to_string())),
        );
        let layers: Vec<(Vec<usize>, RGBColor, Marker)> = match &hue {
            Some(h) => (0..h.levels.len())
                .map(|j| {
                    let rows = facet.rows.iter().copied().filter(|&r| h.level(r) == Some(j)).collect();
                    (rows, h.colors[j], markers[j % markers.len()])
                })
                .collect(),
            None => vec![(facet.rows.clone(), base, markers[0])],
        };
        for (rows, color, marker) in layers {
            let obs = observations(x, y, &rows)?;
            regression_layer(&mut panel, &opts, &obs, color, marker)
                .with_context(|| format!("Failed to fit facet {}", facet.title.as_deref().unwrap_or("")))?;
        }
        if let Some(h) = &hue {
            if kw.legend() != LegendMode::Off {
                let mut legend = LegendBuilder::default();
                legend.section(
                    h.column.name(),
                    h.levels
                        .iter()
                        .enumerate()
                        .map(|(j, l)| {
                            let mut style = PointStyle::new(h.colors[j], area_to_radius(SCATTER_AREA));
                            style.marker = markers[j % markers.len()];
                            entry(l.clone(), Swatch::Marker(style))
                        })
                        .collect(),
                );
                legend.apply(&mut panel);
            }
        }
        panels.push((facet, panel));
    }
    place_facets(&mut scene, panels);
    gather_legend(&mut scene);
    Ok(scene)
}

// =============================================================================
// residplot
// =============================================================================

pub fn residplot(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = residplot_panel(kw).context("Failed to build residual plot")?;
    Ok(single_panel(kw, panel))
}

fn partial_columns<'a>(kw: &Kwargs<'a>, key: &str) -> Result<Vec<&'a Column>, PlotError> {
    let names = kw.list(key).unwrap_or(&[]);
    names
        .iter()
        .map(|name| {
            let column = kw.dataset().require(name)?;
            column.numeric()?;
            Ok(column)
        })
        .collect()
}

fn residplot_panel(kw: &Kwargs) -> Result<PanelScene, PlotError> {
    let x = kw.required_column("x")?;
    let y = kw.required_column("y")?;
    x.numeric()?;
    y.numeric()?;
    let x_partial = partial_columns(kw, "x_partial")?;
    let y_partial = partial_columns(kw, "y_partial")?;
    let color = kw.color("color")?;
    let order = kw.count_or("order", 1).max(1);
    let robust = kw.flag("robust", false);
    if robust && order > 1 {
        return Err(PlotError::invalid("robust", "robust fits are linear; set order to 1"));
    }

    let mut columns = vec![x, y];
    columns.extend(&x_partial);
    columns.extend(&y_partial);
    let all = all_rows(kw.dataset());
    let rows = complete_rows(&columns, &all);
    if rows.len() < all.len() && !kw.flag("dropna", true) {
        return Err(PlotError::invalid("dropna", "missing values present; enable dropna"));
    }
    let values = |c: &Column| -> Vec<f64> { rows.iter().filter_map(|&r| c.value(r)).collect() };
    let mut xs = values(x);
    let mut ys = values(y);
    let partial_out = |target: &mut Vec<f64>, partials: &[&Column], key: &str| -> Result<(), PlotError> {
        if partials.is_empty() {
            return Ok(());
        }
        let covariates: Vec<Vec<f64>> = partials.iter().map(|c| values(*c)).collect();
        *target = stats::residualize(target, &covariates)
            .ok_or_else(|| PlotError::InsufficientData(format!("{}: partial regression is singular", key)))?;
        Ok(())
    };
    partial_out(&mut xs, &x_partial, "x_partial")?;
    partial_out(&mut ys, &y_partial, "y_partial")?;

    let coeffs = if robust {
        stats::robust_fit(&xs, &ys)
    } else {
        stats::polyfit(&xs, &ys, order, None)
    }
    .ok_or_else(|| PlotError::InsufficientData(format!("{}: too few points for the fit", y.name())))?;
    let residuals: Vec<f64> = xs
        .iter()
        .zip(&ys)
        .map(|(a, b)| b - stats::polyval(&coeffs, *a))
        .collect();

    let mut panel = PanelScene::new(
        Axis::continuous(Some(x.name().to_string())),
        Axis::continuous(Some(format!("{} residuals", y.name()))),
    );
    let mm = scale::MinMax::of(xs.iter().copied());
    if !mm.is_empty() {
        let mut style = LineStyle::solid(ZERO_LINE_GRAY, 1.0);
        style.dash = Dash::Dashed;
        panel.push(DrawCommand::Line {
            points: vec![(mm.min, 0.0), (mm.max, 0.0)],
            style,
        });
    }
    let mut style = PointStyle::new(color, area_to_radius(SCATTER_AREA));
    style.alpha = 0.8;
    panel.push(DrawCommand::Points {
        points: xs.iter().copied().zip(residuals.iter().copied()).collect(),
        style,
    });
    if kw.flag("lowess", false) {
        let (lx, ly) = stats::lowess(&xs, &residuals, LOWESS_FRAC, 3);
        panel.push(DrawCommand::Line {
            points: lx.into_iter().zip(ly).collect(),
            style: LineStyle::solid(palette::blend(color, RGBColor(0, 0, 0), 0.3), points_to_px(1.5)),
        });
    }
    Ok(panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamRecord;

    fn linear_dataset() -> Dataset {
        let rows = (0..12)
            .map(|i| {
                let x = i as f64;
                let group = if i % 2 == 0 { "a" } else { "b" };
                let z = (i % 4) as f64;
                vec![
                    format!("{}", x),
                    format!("{}", 2.0 * x + 1.0 + 0.5 * z),
                    group.to_string(),
                    format!("{}", z),
                ]
            })
            .collect();
        Dataset::from_rows(vec!["x".into(), "y".into(), "g".into(), "z".into()], rows)
    }

    fn lines(scene: &SceneGraph) -> Vec<&Vec<(f64, f64)>> {
        scene
            .panels
            .iter()
            .flat_map(|p| &p.commands)
            .filter_map(|c| match c {
                DrawCommand::Line { points, .. } => Some(points),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_regplot_fits_line_with_band() {
        let ds = linear_dataset();
        let rec = ParamRecord::new()
            .with("x", "x")
            .with("y", "y")
            .with("ci", 95i64)
            .with("n_boot", 50i64);
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        let scene = regplot(&kw).unwrap();
        let fit = lines(&scene);
        assert_eq!(fit.len(), 1);
        assert_eq!(fit[0].len(), GRID_POINTS);
        assert_eq!(fit[0][0].0, 0.0);
        assert_eq!(fit[0][GRID_POINTS - 1].0, 11.0);
        assert!(scene.panels[0]
            .commands
            .iter()
            .any(|c| matches!(c, DrawCommand::Polygon { .. })));
    }

    #[test]
    fn test_exclusive_models_rejected() {
        let ds = linear_dataset();
        let rec = ParamRecord::new()
            .with("x", "x")
            .with("y", "y")
            .with("lowess", true)
            .with("robust", true);
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        let err = regplot(&kw).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlotError>(),
            Some(PlotError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_x_bins_aggregate_points() {
        let ds = linear_dataset();
        let rec = ParamRecord::new()
            .with("x", "x")
            .with("y", "y")
            .with("x_bins", 3i64)
            .with("fit_reg", false);
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        let scene = regplot(&kw).unwrap();
        let points = scene.panels[0]
            .commands
            .iter()
            .find_map(|c| match c {
                DrawCommand::Points { points, .. } => Some(points.len()),
                _ => None,
            })
            .unwrap();
        assert_eq!(points, 3);
    }

    #[test]
    fn test_logistic_needs_unit_response() {
        let ds = linear_dataset();
        let rec = ParamRecord::new()
            .with("x", "x")
            .with("y", "y")
            .with("logistic", true);
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        assert!(regplot(&kw).is_err());
    }

    #[test]
    fn test_lmplot_hue_facets() {
        let ds = linear_dataset();
        let rec = ParamRecord::new()
            .with("x", "x")
            .with("y", "y")
            .with("hue", "g")
            .with("markers", "o,x")
            .with("col", "g")
            .with("height", 4.0)
            .with("aspect", 1.0);
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        let scene = lmplot(&kw).unwrap();
        assert_eq!(scene.panels.len(), 2);
        assert_eq!((scene.width, scene.height), (800, 400));
        assert!(scene.panels[0].legend.is_empty());
        assert_eq!(scene.panels[1].legend.len(), 2);
    }

    #[test]
    fn test_residplot_partial_removes_trend() {
        let ds = linear_dataset();
        let rec = ParamRecord::new()
            .with("x", "x")
            .with("y", "y")
            .with("x_partial", ParamValue::List(vec!["z".into()]))
            .with("y_partial", ParamValue::List(vec!["z".into()]));
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        let scene = residplot(&kw).unwrap();
        let residuals = scene.panels[0]
            .commands
            .iter()
            .find_map(|c| match c {
                DrawCommand::Points { points, .. } => Some(points.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(residuals.len(), 12);
        assert!(residuals.iter().all(|(_, r)| r.abs() < 1e-6));
    }
}
