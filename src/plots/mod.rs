//! Plotting functions. Each one reads its keyword record against the
//! dataset and returns a [`SceneGraph`] in data coordinates; axis ranges are
//! fitted afterwards by [`crate::scale::fit_axes`].

pub mod categorical;
pub mod distribution;
pub mod matrix;
pub mod regression;
pub mod relational;

use std::collections::HashMap;

use plotters::style::RGBColor;

use crate::data::{Column, ColumnKind, Dataset};
use crate::error::PlotError;
use crate::ir::{
    Axis, AxisKind, Bounds, Dash, LegendEntry, Marker, PanelScene, SceneGraph, Swatch,
};
use crate::palette::{self, Colormap, Palette};
use crate::params::{ParamRecord, ParamValue};
use crate::scale::{self, AxisTransform};
use crate::stats::{ErrorBar, Estimator};

/// Pixels per inch for figure-level sizes.
pub const DPI: f64 = 100.0;
const MAX_FIGURE_PX: f64 = 6000.0;

// =============================================================================
// Keyword access
// =============================================================================

/// Typed view of a keyword record against the dataset it refers to.
pub struct Kwargs<'a> {
    record: &'a ParamRecord,
    dataset: &'a Dataset,
    pub width: u32,
    pub height: u32,
}

impl<'a> Kwargs<'a> {
    pub fn new(record: &'a ParamRecord, dataset: &'a Dataset, width: u32, height: u32) -> Self {
        Self {
            record,
            dataset,
            width,
            height,
        }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn get(&self, key: &str) -> &'a ParamValue {
        self.record.get(key)
    }

    /// Column named by `key`, `None` when the key is Null.
    pub fn column(&self, key: &str) -> Result<Option<&'a Column>, PlotError> {
        match self.record.get(key) {
            ParamValue::Null => Ok(None),
            ParamValue::Text(name) if name.is_empty() => Ok(None),
            ParamValue::Text(name) => self.dataset.require(name).map(Some),
            other => Err(PlotError::invalid(
                key,
                format!("expected a column name, got {}", other),
            )),
        }
    }

    pub fn required_column(&self, key: &str) -> Result<&'a Column, PlotError> {
        self.column(key)?
            .ok_or_else(|| PlotError::invalid(key, "a column must be selected"))
    }

    pub fn text(&self, key: &str) -> Option<&'a str> {
        self.record.get(key).as_str().filter(|t| !t.is_empty())
    }

    pub fn text_or(&self, key: &str, default: &'a str) -> &'a str {
        self.text(key).unwrap_or(default)
    }

    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.record.get(key).as_bool().unwrap_or(default)
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        self.record.get(key).as_f64().filter(|v| v.is_finite())
    }

    pub fn float_or(&self, key: &str, default: f64) -> f64 {
        self.float(key).unwrap_or(default)
    }

    pub fn count_or(&self, key: &str, default: usize) -> usize {
        match self.record.get(key).as_i64() {
            Some(n) if n > 0 => n as usize,
            _ => default,
        }
    }

    pub fn pair(&self, key: &str) -> Option<(f64, f64)> {
        self.record.get(key).as_pair()
    }

    pub fn list(&self, key: &str) -> Option<&'a [String]> {
        self.record.get(key).as_list().filter(|l| !l.is_empty())
    }

    /// Color option; Null means the default blue.
    pub fn color(&self, key: &str) -> Result<RGBColor, PlotError> {
        match self.text(key) {
            None => Ok(palette::DEFAULT_COLOR),
            Some(text) => palette::parse_color(text)
                .ok_or_else(|| PlotError::invalid(key, format!("unrecognized color '{}'", text))),
        }
    }

    pub fn legend(&self) -> LegendMode {
        LegendMode::from_value(self.record.get("legend"))
    }

    pub fn log_scale(&self) -> bool {
        self.flag("log_scale", false)
    }

    pub fn estimator(&self) -> Result<Option<Estimator>, PlotError> {
        self.estimator_for("estimator")
    }

    pub fn estimator_for(&self, key: &str) -> Result<Option<Estimator>, PlotError> {
        self.text(key).map(Estimator::parse).transpose()
    }

    pub fn errorbar(&self) -> Result<Option<ErrorBar>, PlotError> {
        let level = self.float("errorbar_level");
        self.text("errorbar")
            .map(|name| ErrorBar::parse(name, level))
            .transpose()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendMode {
    Auto,
    Brief,
    Full,
    Off,
}

impl LegendMode {
    pub fn from_value(value: &ParamValue) -> Self {
        match value {
            ParamValue::Bool(false) => LegendMode::Off,
            ParamValue::Text(t) => match t.to_ascii_lowercase().as_str() {
                "brief" => LegendMode::Brief,
                "full" => LegendMode::Full,
                "false" | "off" | "none" => LegendMode::Off,
                _ => LegendMode::Auto,
            },
            _ => LegendMode::Auto,
        }
    }
}

// =============================================================================
// Semantic mappings
// =============================================================================

/// Levels of a grouping column, honoring an explicit order when given.
pub fn levels_of(column: &Column, order: Option<&[String]>) -> Vec<String> {
    match order {
        Some(order) => order.to_vec(),
        None => column.categorical_order(),
    }
}

fn level_index(levels: &[String]) -> HashMap<String, usize> {
    levels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.clone(), i))
        .collect()
}

fn normalize(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if hi > lo {
        (value - lo) / (hi - lo)
    } else {
        0.5
    }
}

/// Hue mapping: levels with one color each, plus a colormap when a numeric
/// column is mapped continuously.
pub struct HueMap<'a> {
    pub column: &'a Column,
    pub levels: Vec<String>,
    pub colors: Vec<RGBColor>,
    continuous: Option<(Colormap, (f64, f64))>,
    index: HashMap<String, usize>,
}

impl<'a> HueMap<'a> {
    /// Build from the `hue`, `palette`, `hue_order` and `hue_norm` keys.
    /// Categorical charts pass `force_categorical` so numeric hues still
    /// get discrete levels.
    pub fn from_kwargs(kw: &Kwargs<'a>, force_categorical: bool) -> Result<Option<Self>, PlotError> {
        let Some(column) = kw.column("hue")? else {
            return Ok(None);
        };
        let levels = levels_of(column, kw.list("hue_order"));
        let numeric = column.is_numeric() && !force_categorical && kw.list("hue_order").is_none();
        let palette = Palette::resolve(kw.text("palette"), numeric)?;

        let (colors, continuous) = if numeric {
            let values: Vec<f64> = column.numeric()?.iter().flatten().copied().collect();
            let mm = scale::MinMax::of(values);
            let norm = kw.pair("hue_norm").unwrap_or((mm.min, mm.max));
            let cmap = palette.colormap();
            let colors = levels
                .iter()
                .map(|l| cmap.at(normalize(l.parse::<f64>().unwrap_or(norm.0), norm)))
                .collect();
            (colors, Some((cmap, norm)))
        } else {
            (palette.colors(levels.len()), None)
        };

        Ok(Some(Self {
            column,
            index: level_index(&levels),
            levels,
            colors,
            continuous,
        }))
    }

    pub fn level(&self, row: usize) -> Option<usize> {
        self.column
            .label(row)
            .and_then(|label| self.index.get(&label).copied())
    }

    pub fn color(&self, row: usize) -> Option<RGBColor> {
        match &self.continuous {
            Some((cmap, norm)) => self.column.value(row).map(|v| cmap.at(normalize(v, *norm))),
            None => self.level(row).map(|i| self.colors[i]),
        }
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous.is_some()
    }

    /// Legend labels and colors; numeric hues get a few representative
    /// values unless every level was asked for.
    pub fn legend_items(&self, mode: LegendMode) -> Vec<(String, RGBColor)> {
        if mode == LegendMode::Off {
            return Vec::new();
        }
        if let Some((cmap, norm)) = &self.continuous {
            if mode != LegendMode::Full && self.levels.len() > 6 {
                return brief_ticks(norm.0, norm.1)
                    .into_iter()
                    .map(|v| (crate::data::format_number(v), cmap.at(normalize(v, *norm))))
                    .collect();
            }
        }
        self.levels.iter().cloned().zip(self.colors.iter().copied()).collect()
    }
}

/// Round values spanning `[lo, hi]` for brief legends.
pub fn brief_ticks(lo: f64, hi: f64) -> Vec<f64> {
    if !(hi > lo) {
        return vec![lo];
    }
    let raw = (hi - lo) / 4.0;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(raw);
    let start = (lo / step).ceil() * step;
    let mut ticks = Vec::new();
    let mut v = start;
    while v <= hi + step * 1e-9 {
        ticks.push(if v.abs() < step * 1e-9 { 0.0 } else { v });
        v += step;
    }
    ticks
}

/// Size mapping onto a `(min, max)` output range.
pub struct SizeMap<'a> {
    pub column: &'a Column,
    pub levels: Vec<String>,
    pub sizes: Vec<f64>,
    range: (f64, f64),
    continuous: Option<(f64, f64)>,
    index: HashMap<String, usize>,
}

impl<'a> SizeMap<'a> {
    pub fn from_kwargs(kw: &Kwargs<'a>, fallback: (f64, f64)) -> Result<Option<Self>, PlotError> {
        let Some(column) = kw.column("size")? else {
            return Ok(None);
        };
        let range = kw.pair("sizes").unwrap_or(fallback);
        let levels = levels_of(column, kw.list("size_order"));
        let continuous = if column.is_numeric() && kw.list("size_order").is_none() {
            let mm = scale::MinMax::of(column.numeric()?.iter().flatten().copied());
            Some(kw.pair("size_norm").unwrap_or((mm.min, mm.max)))
        } else {
            None
        };
        let sizes = match continuous {
            Some(norm) => levels
                .iter()
                .map(|l| {
                    let t = normalize(l.parse::<f64>().unwrap_or(norm.0), norm).clamp(0.0, 1.0);
                    range.0 + t * (range.1 - range.0)
                })
                .collect(),
            None => {
                // Larger sizes go to earlier levels.
                let n = levels.len();
                (0..n)
                    .map(|i| {
                        if n < 2 {
                            range.1
                        } else {
                            range.1 - (range.1 - range.0) * i as f64 / (n - 1) as f64
                        }
                    })
                    .collect()
            }
        };
        Ok(Some(Self {
            column,
            index: level_index(&levels),
            levels,
            sizes,
            range,
            continuous,
        }))
    }

    pub fn level(&self, row: usize) -> Option<usize> {
        self.column
            .label(row)
            .and_then(|label| self.index.get(&label).copied())
    }

    pub fn size(&self, row: usize) -> Option<f64> {
        match self.continuous {
            Some(norm) => self.column.value(row).map(|v| {
                let t = normalize(v, norm).clamp(0.0, 1.0);
                self.range.0 + t * (self.range.1 - self.range.0)
            }),
            None => self.level(row).map(|i| self.sizes[i]),
        }
    }

    pub fn legend_items(&self, mode: LegendMode) -> Vec<(String, f64)> {
        if mode == LegendMode::Off {
            return Vec::new();
        }
        if let Some(norm) = self.continuous {
            if mode != LegendMode::Full && self.levels.len() > 6 {
                return brief_ticks(norm.0, norm.1)
                    .into_iter()
                    .map(|v| {
                        let t = normalize(v, norm).clamp(0.0, 1.0);
                        (
                            crate::data::format_number(v),
                            self.range.0 + t * (self.range.1 - self.range.0),
                        )
                    })
                    .collect();
            }
        }
        self.levels.iter().cloned().zip(self.sizes.iter().copied()).collect()
    }
}

/// Style mapping onto markers and dash patterns.
pub struct StyleMap<'a> {
    pub column: &'a Column,
    pub levels: Vec<String>,
    pub use_markers: bool,
    pub use_dashes: bool,
    index: HashMap<String, usize>,
}

impl<'a> StyleMap<'a> {
    pub fn from_kwargs(kw: &Kwargs<'a>) -> Result<Option<Self>, PlotError> {
        let Some(column) = kw.column("style")? else {
            return Ok(None);
        };
        let levels = levels_of(column, kw.list("style_order"));
        Ok(Some(Self {
            column,
            index: level_index(&levels),
            levels,
            use_markers: kw.flag("markers", true),
            use_dashes: kw.flag("dashes", true),
        }))
    }

    pub fn level(&self, row: usize) -> Option<usize> {
        self.column
            .label(row)
            .and_then(|label| self.index.get(&label).copied())
    }

    pub fn marker(&self, level: usize) -> Marker {
        if self.use_markers {
            Marker::CYCLE[level % Marker::CYCLE.len()]
        } else {
            Marker::Circle
        }
    }

    pub fn dash(&self, level: usize) -> Dash {
        if self.use_dashes {
            Dash::CYCLE[level % Dash::CYCLE.len()]
        } else {
            Dash::Solid
        }
    }
}

/// Collects legend sections and writes them onto a panel.
#[derive(Default)]
pub struct LegendBuilder {
    sections: Vec<(String, Vec<LegendEntry>)>,
}

impl LegendBuilder {
    pub fn section(&mut self, title: &str, entries: Vec<LegendEntry>) {
        if !entries.is_empty() {
            self.sections.push((title.to_string(), entries));
        }
    }

    pub fn apply(self, panel: &mut PanelScene) {
        match self.sections.len() {
            0 => {}
            1 => {
                let (title, entries) = self.sections.into_iter().next().unwrap_or_default();
                panel.legend_title = Some(title);
                panel.legend = entries;
            }
            _ => {
                for (title, entries) in self.sections {
                    panel.legend.push(LegendEntry {
                        label: title,
                        swatch: Swatch::Heading,
                    });
                    panel.legend.extend(entries);
                }
            }
        }
    }
}

pub fn entry(label: impl Into<String>, swatch: Swatch) -> LegendEntry {
    LegendEntry {
        label: label.into(),
        swatch,
    }
}

// =============================================================================
// Axes and positions
// =============================================================================

/// How a column is placed along an axis.
pub enum Positioner<'a> {
    Continuous {
        column: &'a Column,
        transform: AxisTransform,
    },
    Categorical {
        column: &'a Column,
        levels: Vec<String>,
        index: HashMap<String, usize>,
    },
}

impl<'a> Positioner<'a> {
    pub fn new(column: &'a Column, log: bool) -> Self {
        if column.is_continuous() {
            Positioner::Continuous {
                column,
                transform: AxisTransform { log },
            }
        } else {
            Self::categorical(column, None)
        }
    }

    pub fn categorical(column: &'a Column, order: Option<&[String]>) -> Self {
        let levels = levels_of(column, order);
        Positioner::Categorical {
            column,
            index: level_index(&levels),
            levels,
        }
    }

    /// Axis coordinate of a row, `None` for missing or undrawable values.
    pub fn position(&self, row: usize) -> Option<f64> {
        match self {
            Positioner::Continuous { column, transform } => column
                .value(row)
                .and_then(|v| transform.apply(v, column.name()).ok()),
            Positioner::Categorical { column, index, .. } => column
                .label(row)
                .and_then(|l| index.get(&l).map(|i| *i as f64)),
        }
    }

    pub fn axis(&self) -> Axis {
        match self {
            Positioner::Continuous { column, transform } => {
                axis_for(column, Some(column.name().to_string())).with_log(transform.log)
            }
            Positioner::Categorical { column, levels, .. } => {
                Axis::categorical(Some(column.name().to_string()), levels.clone())
            }
        }
    }
}

/// Continuous axis labelled by a column; datetime columns get date ticks.
pub fn axis_for(column: &Column, label: Option<String>) -> Axis {
    let mut axis = Axis::continuous(label);
    if column.kind() == ColumnKind::Datetime {
        axis.kind = AxisKind::Datetime;
    }
    axis
}

/// Rows where every listed column has a value.
pub fn complete_rows(columns: &[&Column], rows: &[usize]) -> Vec<usize> {
    rows.iter()
        .copied()
        .filter(|&r| columns.iter().all(|c| !c.is_missing(r)))
        .collect()
}

pub fn all_rows(dataset: &Dataset) -> Vec<usize> {
    (0..dataset.n_rows()).collect()
}

/// Numeric values of `column` at `rows`, transformed and finite.
pub fn numeric_values(
    column: &Column,
    rows: &[usize],
    transform: AxisTransform,
) -> Result<Vec<f64>, PlotError> {
    column.numeric()?;
    let mut out = Vec::with_capacity(rows.len());
    for &row in rows {
        if let Some(v) = column.value(row) {
            out.push(transform.apply(v, column.name())?);
        }
    }
    Ok(out)
}

// =============================================================================
// Faceting
// =============================================================================

pub struct Facet {
    pub title: Option<String>,
    pub rows: Vec<usize>,
    pub bounds: Bounds,
}

/// Row and column faceting variables with their level orders.
pub struct FacetSpec<'a> {
    row: Option<(&'a Column, Vec<String>)>,
    col: Option<(&'a Column, Vec<String>)>,
    col_wrap: Option<usize>,
}

impl<'a> FacetSpec<'a> {
    pub fn from_kwargs(kw: &Kwargs<'a>) -> Result<Self, PlotError> {
        let row = kw
            .column("row")?
            .map(|c| (c, levels_of(c, kw.list("row_order"))));
        let col = kw
            .column("col")?
            .map(|c| (c, levels_of(c, kw.list("col_order"))));
        let col_wrap = match (&row, &col) {
            (None, Some(_)) => kw.get("col_wrap").as_i64().filter(|n| *n > 0).map(|n| n as usize),
            _ => None,
        };
        Ok(Self { row, col, col_wrap })
    }

    /// Grid shape as (rows, columns).
    pub fn grid(&self) -> (usize, usize) {
        let n_row = self.row.as_ref().map_or(1, |(_, l)| l.len().max(1));
        let n_col = self.col.as_ref().map_or(1, |(_, l)| l.len().max(1));
        match (&self.row, &self.col) {
            (None, Some(_)) => scale::grid_dimensions(n_col, self.col_wrap),
            _ => (n_row, n_col),
        }
    }

    /// One facet per level combination, in grid order.
    pub fn facets(&self, rows: &[usize]) -> Vec<Facet> {
        let row_levels: Vec<Option<&String>> = match &self.row {
            Some((_, levels)) => levels.iter().map(Some).collect(),
            None => vec![None],
        };
        let col_levels: Vec<Option<&String>> = match &self.col {
            Some((_, levels)) => levels.iter().map(Some).collect(),
            None => vec![None],
        };
        let (grid_rows, grid_cols) = self.grid();
        let (cell_w, cell_h) = (1.0 / grid_cols as f64, 1.0 / grid_rows as f64);

        let mut facets = Vec::new();
        for (ri, row_level) in row_levels.iter().enumerate() {
            for (ci, col_level) in col_levels.iter().enumerate() {
                let slot = ri * col_levels.len() + ci;
                let (gr, gc) = if self.row.is_none() {
                    (slot / grid_cols, slot % grid_cols)
                } else {
                    (ri, ci)
                };
                let members = rows
                    .iter()
                    .copied()
                    .filter(|&r| {
                        matches_level(self.row.as_ref().map(|(c, _)| *c), *row_level, r)
                            && matches_level(self.col.as_ref().map(|(c, _)| *c), *col_level, r)
                    })
                    .collect();
                let mut parts = Vec::new();
                if let (Some((c, _)), Some(level)) = (&self.row, row_level) {
                    parts.push(format!("{} = {}", c.name(), level));
                }
                if let (Some((c, _)), Some(level)) = (&self.col, col_level) {
                    parts.push(format!("{} = {}", c.name(), level));
                }
                facets.push(Facet {
                    title: if parts.is_empty() {
                        None
                    } else {
                        Some(parts.join(" | "))
                    },
                    rows: members,
                    bounds: Bounds::new(gc as f64 * cell_w, gr as f64 * cell_h, cell_w, cell_h),
                });
            }
        }
        facets
    }
}

fn matches_level(column: Option<&Column>, level: Option<&String>, row: usize) -> bool {
    match (column, level) {
        (Some(column), Some(level)) => column.label(row).as_deref() == Some(level.as_str()),
        _ => true,
    }
}

/// Figure size of a facet grid from per-facet height and aspect in inches.
pub fn facet_figure(kw: &Kwargs, grid: (usize, usize)) -> SceneGraph {
    let height = kw.float_or("height", 5.0).max(0.5);
    let aspect = kw.float_or("aspect", 1.0).max(0.05);
    let w = (grid.1 as f64 * height * aspect * DPI).clamp(100.0, MAX_FIGURE_PX);
    let h = (grid.0 as f64 * height * DPI).clamp(100.0, MAX_FIGURE_PX);
    SceneGraph::new(w.round() as u32, h.round() as u32)
}

/// Lay facet panels out and share their axes.
pub fn place_facets(scene: &mut SceneGraph, panels: Vec<(Facet, PanelScene)>) {
    for (facet, mut panel) in panels {
        panel.bounds = facet.bounds;
        if facet.title.is_some() {
            panel.title = facet.title;
        }
        panel.share_group = Some(0);
        scene.panels.push(panel);
    }
}

/// Move legends onto the last panel of a faceted figure.
pub fn gather_legend(scene: &mut SceneGraph) {
    let mut title = None;
    let mut entries = Vec::new();
    for panel in scene.panels.iter_mut() {
        if !panel.legend.is_empty() && entries.is_empty() {
            title = panel.legend_title.take();
            entries = std::mem::take(&mut panel.legend);
        } else {
            panel.legend.clear();
            panel.legend_title = None;
        }
    }
    if let Some(last) = scene.panels.last_mut() {
        last.legend_title = title;
        last.legend = entries;
    }
}

/// Single-panel figure at the requested render size.
pub fn single_panel(kw: &Kwargs, panel: PanelScene) -> SceneGraph {
    let mut scene = SceneGraph::new(kw.width, kw.height);
    scene.panels.push(panel);
    scene
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_dataset() -> Dataset {
        Dataset::from_rows(
            vec!["x".into(), "g".into(), "v".into()],
            vec![
                vec!["1".into(), "a".into(), "10".into()],
                vec!["2".into(), "b".into(), "20".into()],
                vec!["3".into(), "a".into(), "30".into()],
                vec!["4".into(), "c".into(), "".into()],
            ],
        )
    }

    #[test]
    fn test_missing_column_is_plot_error() {
        let ds = make_dataset();
        let record = ParamRecord::new().with("x", "nope");
        let kw = Kwargs::new(&record, &ds, 800, 600);
        assert!(matches!(
            kw.column("x"),
            Err(PlotError::MissingColumn(name)) if name == "nope"
        ));
        assert!(kw.column("y").unwrap().is_none());
    }

    #[test]
    fn test_hue_map_categorical_levels() {
        let ds = make_dataset();
        let record = ParamRecord::new().with("hue", "g").with("palette", "deep");
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let hue = HueMap::from_kwargs(&kw, false).unwrap().unwrap();
        assert_eq!(hue.levels, vec!["a", "b", "c"]);
        assert_eq!(hue.level(2), Some(0));
        assert_eq!(hue.color(0), hue.color(2));
        assert_ne!(hue.color(0), hue.color(1));
    }

    #[test]
    fn test_hue_order_restricts_levels() {
        let ds = make_dataset();
        let record = ParamRecord::new()
            .with("hue", "g")
            .with("hue_order", ParamValue::List(vec!["b".into()]));
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let hue = HueMap::from_kwargs(&kw, false).unwrap().unwrap();
        assert_eq!(hue.level(1), Some(0));
        assert_eq!(hue.level(0), None);
    }

    #[test]
    fn test_numeric_hue_is_continuous() {
        let ds = make_dataset();
        let record = ParamRecord::new().with("hue", "v");
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let hue = HueMap::from_kwargs(&kw, false).unwrap().unwrap();
        assert!(hue.is_continuous());
        assert!(hue.color(3).is_none());
        let forced = HueMap::from_kwargs(&kw, true).unwrap().unwrap();
        assert!(!forced.is_continuous());
    }

    #[test]
    fn test_size_map_range() {
        let ds = make_dataset();
        let record = ParamRecord::new()
            .with("size", "v")
            .with("sizes", ParamValue::Pair(10.0, 100.0));
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let sizes = SizeMap::from_kwargs(&kw, (1.0, 5.0)).unwrap().unwrap();
        assert_eq!(sizes.size(0), Some(10.0));
        assert_eq!(sizes.size(2), Some(100.0));
    }

    #[test]
    fn test_facets_wrap() {
        let ds = make_dataset();
        let record = ParamRecord::new().with("col", "g").with("col_wrap", 2i64);
        let kw = Kwargs::new(&record, &ds, 800, 600);
        let spec = FacetSpec::from_kwargs(&kw).unwrap();
        assert_eq!(spec.grid(), (2, 2));
        let facets = spec.facets(&all_rows(&ds));
        assert_eq!(facets.len(), 3);
        assert_eq!(facets[0].rows, vec![0, 2]);
        assert_eq!(facets[2].title.as_deref(), Some("g = c"));
        assert_eq!(facets[2].bounds.top, 0.5);
    }

    #[test]
    fn test_brief_ticks() {
        assert_eq!(brief_ticks(0.0, 100.0), vec![0.0, 25.0, 50.0, 75.0, 100.0]);
        assert_eq!(brief_ticks(3.0, 3.0), vec![3.0]);
    }

    #[test]
    fn test_legend_mode() {
        assert_eq!(LegendMode::from_value(&ParamValue::Bool(false)), LegendMode::Off);
        assert_eq!(LegendMode::from_value(&ParamValue::text("full")), LegendMode::Full);
        assert_eq!(LegendMode::from_value(&ParamValue::Null), LegendMode::Auto);
    }
}
