use std::collections::HashMap;

use crate::error::PlotError;
use crate::ir::{Axis, AxisKind, PanelScene, SceneGraph};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl Default for MinMax {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl MinMax {
    pub fn include(&mut self, v: f64) {
        if v.is_finite() {
            if v < self.min {
                self.min = v;
            }
            if v > self.max {
                self.max = v;
            }
        }
    }

    pub fn merge(&mut self, other: &MinMax) {
        self.include(other.min);
        self.include(other.max);
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn of<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut mm = MinMax::default();
        for v in values {
            mm.include(v);
        }
        mm
    }
}

/// Fit the drawing range of every panel axis to the commands it holds.
/// Panels sharing a `share_group` get the union of their extents.
pub fn fit_axes(scene: &mut SceneGraph) {
    let extents: Vec<(MinMax, MinMax)> = scene.panels.iter().map(panel_extent).collect();

    let mut shared: HashMap<usize, (MinMax, MinMax)> = HashMap::new();
    for (panel, (x, y)) in scene.panels.iter().zip(&extents) {
        if let Some(group) = panel.share_group {
            let entry = shared.entry(group).or_default();
            entry.0.merge(x);
            entry.1.merge(y);
        }
    }

    for (panel, (x_local, y_local)) in scene.panels.iter_mut().zip(extents) {
        let (x_mm, y_mm) = match panel.share_group.and_then(|g| shared.get(&g)) {
            Some(&(x, y)) => (x, y),
            None => (x_local, y_local),
        };
        panel.x.range = resolve_range(&panel.x, x_mm);
        panel.y.range = resolve_range(&panel.y, y_mm);
    }
}

fn panel_extent(panel: &PanelScene) -> (MinMax, MinMax) {
    let mut x = MinMax::default();
    let mut y = MinMax::default();
    for command in &panel.commands {
        for (px, py) in command.coords() {
            x.include(px);
            y.include(py);
        }
    }
    (x, y)
}

fn resolve_range(axis: &Axis, mm: MinMax) -> (f64, f64) {
    if let Some((lo, hi)) = axis.limits {
        return if axis.log {
            (lo.max(f64::MIN_POSITIVE).log10(), hi.max(f64::MIN_POSITIVE).log10())
        } else {
            (lo, hi)
        };
    }

    if let AxisKind::Categorical(levels) = &axis.kind {
        let (lo, hi) = categorical_range(levels.len());
        if mm.is_empty() {
            return (lo, hi);
        }
        return (lo.min(mm.min - 0.5), hi.max(mm.max + 0.5));
    }

    if mm.is_empty() {
        return (0.0, 1.0);
    }

    let (mut min, mut max) = (mm.min, mm.max);
    if axis.sticky_zero {
        min = min.min(0.0);
        max = max.max(0.0);
    }
    let (mut lo, mut hi) = pad_range(min, max);
    if axis.sticky_zero {
        if min >= 0.0 {
            lo = 0.0;
        }
        if max <= 0.0 {
            hi = 0.0;
        }
        if lo == hi {
            hi = lo + 1.0;
        }
    }
    (lo, hi)
}

pub fn pad_range(min: f64, max: f64) -> (f64, f64) {
    if min == max {
        (min - 1.0, max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding, max + padding)
    }
}

pub fn categorical_range(n: usize) -> (f64, f64) {
    (-0.5, n.max(1) as f64 - 0.5)
}

/// Rows and columns of a facet grid. With `col_wrap`, columns wrap after
/// that many panels.
pub fn grid_dimensions(n_panels: usize, col_wrap: Option<usize>) -> (usize, usize) {
    if n_panels == 0 {
        return (1, 1);
    }
    if let Some(cols) = col_wrap.filter(|c| *c > 0) {
        let cols = cols.min(n_panels);
        let rows = (n_panels as f64 / cols as f64).ceil() as usize;
        return (rows, cols);
    }
    (1, n_panels)
}

/// Map a data value onto a log10 axis; non-positive values cannot be drawn.
pub fn to_log(value: f64, key: &str) -> Result<f64, PlotError> {
    if value > 0.0 {
        Ok(value.log10())
    } else {
        Err(PlotError::invalid(
            key,
            format!("log scale requires positive values, found {}", value),
        ))
    }
}

/// Axis transform applied to data before it enters the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisTransform {
    pub log: bool,
}

impl AxisTransform {
    pub const LINEAR: AxisTransform = AxisTransform { log: false };

    pub fn apply(&self, value: f64, key: &str) -> Result<f64, PlotError> {
        if self.log {
            to_log(value, key)
        } else {
            Ok(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DrawCommand, FillStyle, LineStyle, PanelScene};
    use plotters::style::RGBColor;

    fn line_panel(points: Vec<(f64, f64)>) -> PanelScene {
        let mut panel = PanelScene::new(Axis::continuous(None), Axis::continuous(None));
        panel.push(DrawCommand::Line {
            points,
            style: LineStyle::solid(RGBColor(0, 0, 0), 1.0),
        });
        panel
    }

    #[test]
    fn test_scale_continuous() {
        let mut scene = SceneGraph::new(800, 600);
        scene.panels.push(line_panel(vec![(0.0, 0.0), (10.0, 100.0)]));
        fit_axes(&mut scene);
        let panel = &scene.panels[0];
        assert!(panel.x.range.0 < 0.0);
        assert!(panel.x.range.1 > 10.0);
    }

    #[test]
    fn test_scale_single_point() {
        let mut scene = SceneGraph::new(800, 600);
        scene.panels.push(line_panel(vec![(5.0, 5.0)]));
        fit_axes(&mut scene);
        assert_eq!(scene.panels[0].x.range, (4.0, 6.0));
    }

    #[test]
    fn test_scale_categorical() {
        let mut scene = SceneGraph::new(800, 600);
        let mut panel = line_panel(vec![(0.0, 1.0), (1.0, 2.0)]);
        panel.x = Axis::categorical(None, vec!["A".into(), "B".into()]);
        scene.panels.push(panel);
        fit_axes(&mut scene);
        assert_eq!(scene.panels[0].x.range, (-0.5, 1.5));
    }

    #[test]
    fn test_sticky_zero_for_bars() {
        let mut scene = SceneGraph::new(800, 600);
        let mut panel = PanelScene::new(
            Axis::continuous(None),
            Axis::continuous(None).with_sticky_zero(),
        );
        panel.push(DrawCommand::Rect {
            tl: (0.0, 8.0),
            br: (1.0, 0.0),
            style: FillStyle::filled(RGBColor(0, 0, 0)),
        });
        scene.panels.push(panel);
        fit_axes(&mut scene);
        let (lo, hi) = scene.panels[0].y.range;
        assert_eq!(lo, 0.0);
        assert!(hi > 8.0);
    }

    #[test]
    fn test_shared_groups() {
        let mut scene = SceneGraph::new(800, 600);
        let mut a = line_panel(vec![(0.0, 0.0), (1.0, 1.0)]);
        let mut b = line_panel(vec![(5.0, 10.0), (6.0, 20.0)]);
        a.share_group = Some(0);
        b.share_group = Some(0);
        scene.panels.push(a);
        scene.panels.push(b);
        fit_axes(&mut scene);
        assert_eq!(scene.panels[0].y.range, scene.panels[1].y.range);
        assert!(scene.panels[0].y.range.1 > 20.0);
    }

    #[test]
    fn test_grid_dimensions() {
        assert_eq!(grid_dimensions(5, Some(3)), (2, 3));
        assert_eq!(grid_dimensions(2, Some(3)), (1, 2));
        assert_eq!(grid_dimensions(4, None), (1, 4));
    }

    #[test]
    fn test_to_log_rejects_non_positive() {
        assert_eq!(to_log(100.0, "log_scale").unwrap(), 2.0);
        assert!(to_log(0.0, "log_scale").is_err());
    }
}
