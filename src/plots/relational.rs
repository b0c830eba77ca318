use std::collections::HashMap;

use anyhow::{Context, Result};
use plotters::style::RGBColor;

use super::*;
use crate::ir::{DrawCommand, FillStyle, LineStyle, PointStyle};
use crate::stats;

const DEFAULT_POINT_AREA: f64 = 36.0;
const DEFAULT_LINE_WIDTH: f64 = 1.5;
const LEGEND_GRAY: RGBColor = RGBColor(0x55, 0x55, 0x55);

/// Marker area in square points to a radius in pixels.
pub fn area_to_radius(area: f64) -> f64 {
    area.max(0.0).sqrt() / 2.0 * DPI / 72.0
}

pub fn points_to_px(width: f64) -> f64 {
    width * DPI / 72.0
}

pub fn scatter(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = scatter_panel(kw, &all_rows(kw.dataset()))?;
    Ok(single_panel(kw, panel))
}

pub fn line(kw: &Kwargs) -> Result<SceneGraph> {
    let panel = line_panel(kw, &all_rows(kw.dataset()))?;
    Ok(single_panel(kw, panel))
}

pub fn relplot(kw: &Kwargs) -> Result<SceneGraph> {
    let line_kind = match kw.text_or("kind", "scatter") {
        "scatter" => false,
        "line" => true,
        other => {
            return Err(PlotError::invalid("kind", format!("'{}' is not scatter or line", other)).into())
        }
    };
    let spec = FacetSpec::from_kwargs(kw)?;
    let mut scene = facet_figure(kw, spec.grid());
    let mut panels = Vec::new();
    for facet in spec.facets(&all_rows(kw.dataset())) {
        let panel = if line_kind {
            line_panel(kw, &facet.rows)
        } else {
            scatter_panel(kw, &facet.rows)
        }
        .with_context(|| format!("Failed to draw facet {}", facet.title.as_deref().unwrap_or("")))?;
        panels.push((facet, panel));
    }
    place_facets(&mut scene, panels);
    gather_legend(&mut scene);
    Ok(scene)
}

/// Point batches keyed by their drawing style, in first-seen order.
#[derive(Default)]
struct Batches {
    keys: HashMap<(u8, u8, u8, u64, usize), usize>,
    batches: Vec<(PointStyle, Vec<(f64, f64)>)>,
}

impl Batches {
    fn push(&mut self, style: PointStyle, point: (f64, f64)) {
        let marker = Marker::CYCLE
            .iter()
            .position(|m| *m == style.marker)
            .unwrap_or(0);
        let key = (style.color.0, style.color.1, style.color.2, style.size.to_bits(), marker);
        let idx = *self.keys.entry(key).or_insert_with(|| {
            self.batches.push((style, Vec::new()));
            self.batches.len() - 1
        });
        self.batches[idx].1.push(point);
    }

    fn into_commands(self) -> impl Iterator<Item = DrawCommand> {
        self.batches
            .into_iter()
            .map(|(style, points)| DrawCommand::Points { points, style })
    }
}

pub(crate) fn scatter_panel(kw: &Kwargs, rows: &[usize]) -> Result<PanelScene, PlotError> {
    let x = kw.required_column("x")?;
    let y = kw.required_column("y")?;
    let xp = Positioner::new(x, false);
    let yp = Positioner::new(y, false);
    let hue = HueMap::from_kwargs(kw, false)?;
    let sizes = SizeMap::from_kwargs(kw, (10.0, 100.0))?;
    let style = StyleMap::from_kwargs(kw)?;

    let mut panel = PanelScene::new(xp.axis(), yp.axis());
    let mut batches = Batches::default();
    for &row in rows {
        let (Some(px), Some(py)) = (xp.position(row), yp.position(row)) else {
            continue;
        };
        let color = match &hue {
            Some(h) => match h.color(row) {
                Some(c) => c,
                None => continue,
            },
            None => palette::DEFAULT_COLOR,
        };
        let area = match &sizes {
            Some(s) => match s.size(row) {
                Some(a) => a,
                None => continue,
            },
            None => DEFAULT_POINT_AREA,
        };
        let marker = match &style {
            Some(s) => match s.level(row) {
                Some(level) => s.marker(level),
                None => continue,
            },
            None => Marker::Circle,
        };
        let mut point = PointStyle::new(color, area_to_radius(area));
        point.marker = marker;
        point.edge = Some((RGBColor(255, 255, 255), 0.75));
        batches.push(point, (px, py));
    }
    for command in batches.into_commands() {
        panel.push(command);
    }

    let mode = kw.legend();
    let mut legend = LegendBuilder::default();
    if let Some(h) = &hue {
        let entries = h
            .legend_items(mode)
            .into_iter()
            .map(|(label, color)| {
                entry(label, Swatch::Marker(PointStyle::new(color, area_to_radius(DEFAULT_POINT_AREA))))
            })
            .collect();
        legend.section(h.column.name(), entries);
    }
    if let Some(s) = &sizes {
        let entries = s
            .legend_items(mode)
            .into_iter()
            .map(|(label, area)| entry(label, Swatch::Marker(PointStyle::new(LEGEND_GRAY, area_to_radius(area)))))
            .collect();
        legend.section(s.column.name(), entries);
    }
    if let Some(s) = &style {
        if mode != LegendMode::Off {
            let entries = s
                .levels
                .iter()
                .enumerate()
                .map(|(i, label)| {
                    let mut point = PointStyle::new(LEGEND_GRAY, area_to_radius(DEFAULT_POINT_AREA));
                    point.marker = s.marker(i);
                    entry(label.clone(), Swatch::Marker(point))
                })
                .collect();
            legend.section(s.column.name(), entries);
        }
    }
    legend.apply(&mut panel);
    Ok(panel)
}

/// Group key of a line: hue, size and style level.
type LineKey = (Option<usize>, Option<usize>, Option<usize>);

pub(crate) fn line_panel(kw: &Kwargs, rows: &[usize]) -> Result<PanelScene, PlotError> {
    let x = kw.required_column("x")?;
    let y = kw.required_column("y")?;
    let xp = Positioner::new(x, false);
    let yp = Positioner::new(y, false);
    y.numeric()?;
    let hue = HueMap::from_kwargs(kw, false)?;
    let sizes = SizeMap::from_kwargs(kw, (1.0, 5.0))?;
    let style = StyleMap::from_kwargs(kw)?;
    let units = kw.column("units")?;
    let estimator = kw.estimator()?;
    let errorbar = kw.errorbar()?;
    let n_boot = kw.count_or("n_boot", 1000);
    let sort = kw.flag("sort", true);
    let bars = match kw.text_or("err_style", "band") {
        "band" => false,
        "bars" => true,
        other => return Err(PlotError::invalid("err_style", format!("'{}' is not band or bars", other))),
    };
    if units.is_some() && estimator.is_some() {
        return Err(PlotError::invalid(
            "units",
            "estimator must be None when specifying units",
        ));
    }

    // Rows per line, in first-seen order, split further by sampling unit.
    let mut order: Vec<(LineKey, Option<String>)> = Vec::new();
    let mut groups: HashMap<(LineKey, Option<String>), Vec<(f64, f64)>> = HashMap::new();
    for &row in rows {
        let (Some(px), Some(py)) = (xp.position(row), yp.position(row)) else {
            continue;
        };
        let h = match &hue {
            Some(m) => match m.level(row) {
                Some(l) => Some(l),
                None => continue,
            },
            None => None,
        };
        let s = match &sizes {
            Some(m) => match m.level(row) {
                Some(l) => Some(l),
                None => continue,
            },
            None => None,
        };
        let st = match &style {
            Some(m) => match m.level(row) {
                Some(l) => Some(l),
                None => continue,
            },
            None => None,
        };
        let unit = match units {
            Some(u) => match u.label(row) {
                Some(label) => Some(label),
                None => continue,
            },
            None => None,
        };
        let key = ((h, s, st), unit);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push((px, py));
    }

    let mut panel = PanelScene::new(xp.axis(), yp.axis());
    let mut rng = stats::rng();
    for key in &order {
        let Some(points) = groups.get(key) else { continue };
        let ((h, s, st), _) = key;
        let color = h
            .and_then(|l| hue.as_ref().map(|m| m.colors[l]))
            .unwrap_or(palette::DEFAULT_COLOR);
        let width = s
            .and_then(|l| sizes.as_ref().map(|m| m.sizes[l]))
            .unwrap_or(DEFAULT_LINE_WIDTH);
        let mut line_style = LineStyle::solid(color, points_to_px(width));
        let mut marker = None;
        if let (Some(level), Some(m)) = (st, &style) {
            line_style.dash = m.dash(*level);
            if m.use_markers {
                marker = Some(m.marker(*level));
            }
        }

        let (vertices, intervals) = match estimator {
            Some(est) => aggregate(points, est, errorbar, n_boot, &mut rng),
            None => {
                let mut raw = points.clone();
                if sort {
                    raw.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
                }
                (raw, Vec::new())
            }
        };

        if !intervals.is_empty() {
            if bars {
                panel.push(DrawCommand::Segments {
                    segments: intervals.iter().map(|&(px, lo, hi)| [(px, lo), (px, hi)]).collect(),
                    style: LineStyle::solid(color, line_style.width),
                });
            } else {
                let mut band: Vec<(f64, f64)> = intervals.iter().map(|&(px, lo, _)| (px, lo)).collect();
                band.extend(intervals.iter().rev().map(|&(px, _, hi)| (px, hi)));
                panel.push(DrawCommand::Polygon {
                    points: band,
                    style: FillStyle::filled(color).with_alpha(0.2),
                });
            }
        }
        if let Some(marker) = marker {
            let mut point = PointStyle::new(color, 3.0);
            point.marker = marker;
            panel.push(DrawCommand::Points {
                points: vertices.clone(),
                style: point,
            });
        }
        panel.push(DrawCommand::Line {
            points: vertices,
            style: line_style,
        });
    }

    let mode = kw.legend();
    let mut legend = LegendBuilder::default();
    if let Some(h) = &hue {
        let entries = h
            .legend_items(mode)
            .into_iter()
            .map(|(label, color)| entry(label, Swatch::Line(LineStyle::solid(color, 2.0))))
            .collect();
        legend.section(h.column.name(), entries);
    }
    if let Some(s) = &sizes {
        let entries = s
            .legend_items(mode)
            .into_iter()
            .map(|(label, w)| entry(label, Swatch::Line(LineStyle::solid(LEGEND_GRAY, points_to_px(w)))))
            .collect();
        legend.section(s.column.name(), entries);
    }
    if let Some(s) = &style {
        if mode != LegendMode::Off {
            let entries = s
                .levels
                .iter()
                .enumerate()
                .map(|(i, label)| {
                    let mut line = LineStyle::solid(LEGEND_GRAY, 2.0);
                    line.dash = s.dash(i);
                    entry(label.clone(), Swatch::Line(line))
                })
                .collect();
            legend.section(s.column.name(), entries);
        }
    }
    legend.apply(&mut panel);
    Ok(panel)
}

/// Estimate y at each distinct x, with optional error intervals
/// `(x, lo, hi)`.
fn aggregate(
    points: &[(f64, f64)],
    estimator: stats::Estimator,
    errorbar: Option<stats::ErrorBar>,
    n_boot: usize,
    rng: &mut rand::rngs::StdRng,
) -> (Vec<(f64, f64)>, Vec<(f64, f64, f64)>) {
    let mut by_x: Vec<(f64, Vec<f64>)> = Vec::new();
    let mut sorted_points = points.to_vec();
    sorted_points.sort_by(|a, b| a.0.total_cmp(&b.0));
    for (px, py) in sorted_points {
        match by_x.last_mut() {
            Some((last, ys)) if *last == px => ys.push(py),
            _ => by_x.push((px, vec![py])),
        }
    }
    let mut vertices = Vec::with_capacity(by_x.len());
    let mut intervals = Vec::new();
    for (px, ys) in &by_x {
        vertices.push((*px, estimator.apply(ys)));
        if let Some(eb) = errorbar {
            if let Some((lo, hi)) = eb.interval(ys, estimator, n_boot, rng) {
                intervals.push((*px, lo, hi));
            }
        }
    }
    (vertices, intervals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamRecord, ParamValue};

    fn make_dataset() -> Dataset {
        let mut rows = Vec::new();
        for (i, group) in ["a", "b"].iter().enumerate() {
            for x in 0..5 {
                for rep in 0..3 {
                    rows.push(vec![
                        x.to_string(),
                        (x * 2 + rep + i as i32 * 10).to_string(),
                        group.to_string(),
                        format!("u{}", rep),
                    ]);
                }
            }
        }
        Dataset::from_rows(
            vec!["time".into(), "signal".into(), "group".into(), "unit".into()],
            rows,
        )
    }

    fn make_record() -> ParamRecord {
        ParamRecord::new().with("x", "time").with("y", "signal")
    }

    #[test]
    fn test_scatter_batches_by_hue() {
        let ds = make_dataset();
        let record = make_record().with("hue", "group").with("palette", "deep");
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let scene = scatter(&kw).unwrap();
        let panel = &scene.panels[0];
        assert_eq!(panel.commands.len(), 2);
        assert_eq!(panel.legend.len(), 2);
        assert_eq!(panel.legend_title.as_deref(), Some("group"));
    }

    #[test]
    fn test_scatter_missing_axis_column() {
        let ds = make_dataset();
        let record = ParamRecord::new().with("x", "time").with("y", "height");
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let err = scatter(&kw).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlotError>(),
            Some(PlotError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_line_aggregates_with_band() {
        let ds = make_dataset();
        let record = make_record()
            .with("estimator", "mean")
            .with("errorbar", "sd")
            .with("err_style", "band");
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let scene = line(&kw).unwrap();
        let panel = &scene.panels[0];
        let line = panel
            .commands
            .iter()
            .find_map(|c| match c {
                DrawCommand::Line { points, .. } => Some(points),
                _ => None,
            })
            .unwrap();
        assert_eq!(line.len(), 5);
        assert!(panel
            .commands
            .iter()
            .any(|c| matches!(c, DrawCommand::Polygon { .. })));
    }

    #[test]
    fn test_units_with_estimator_is_error() {
        let ds = make_dataset();
        let record = make_record()
            .with("units", "unit")
            .with("estimator", "mean");
        let kw = Kwargs::new(&record, &ds, 800, 600);
        assert!(line(&kw).is_err());

        let record = make_record()
            .with("units", "unit")
            .with("estimator", ParamValue::Null);
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let scene = line(&kw).unwrap();
        assert_eq!(scene.panels[0].commands.len(), 3);
    }

    #[test]
    fn test_relplot_facets_share_axes() {
        let ds = make_dataset();
        let record = make_record()
            .with("kind", "line")
            .with("col", "group")
            .with("estimator", "mean")
            .with("height", 3.0)
            .with("aspect", 1.5);
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let scene = relplot(&kw).unwrap();
        assert_eq!(scene.panels.len(), 2);
        assert_eq!(scene.width, 900);
        assert_eq!(scene.height, 300);
        assert!(scene.panels.iter().all(|p| p.share_group == Some(0)));
        assert_eq!(scene.panels[1].title.as_deref(), Some("group = b"));
    }
}
