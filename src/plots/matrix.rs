use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::relational::points_to_px;
use super::*;
use crate::cluster::{self, Dendrogram};
use crate::ir::{DrawCommand, FillStyle, LineStyle, TextStyle};
use crate::stats;

const HEATMAP_SIZE: (u32, u32) = (1000, 800);
const COLORBAR_STEPS: usize = 64;
const DENDROGRAM_COLOR: RGBColor = RGBColor(0x33, 0x33, 0x33);

// =============================================================================
// Matrix data
// =============================================================================

/// A labelled numeric table; NaN marks an empty cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: Vec<String>,
    pub cols: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl Matrix {
    fn n_rows(&self) -> usize {
        self.rows.len()
    }

    fn n_cols(&self) -> usize {
        self.cols.len()
    }

    fn finite(&self) -> Vec<f64> {
        self.values
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .collect()
    }

    fn transpose(&self) -> Matrix {
        Matrix {
            rows: self.cols.clone(),
            cols: self.rows.clone(),
            values: (0..self.n_cols())
                .map(|j| self.values.iter().map(|row| row[j]).collect())
                .collect(),
        }
    }

    fn reorder(&self, row_order: &[usize], col_order: &[usize]) -> Matrix {
        Matrix {
            rows: row_order.iter().map(|&i| self.rows[i].clone()).collect(),
            cols: col_order.iter().map(|&j| self.cols[j].clone()).collect(),
            values: row_order
                .iter()
                .map(|&i| col_order.iter().map(|&j| self.values[i][j]).collect())
                .collect(),
        }
    }
}

fn numeric_columns(dataset: &Dataset) -> Result<Vec<&Column>, PlotError> {
    let columns = dataset.numeric_columns();
    if columns.len() < 2 {
        return Err(PlotError::InsufficientData(
            "at least 2 numeric columns are needed for a matrix plot".to_string(),
        ));
    }
    Ok(columns)
}

/// Pearson correlation over pairwise-complete rows.
fn pearson(a: &Column, b: &Column, n_rows: usize) -> f64 {
    let pairs: Vec<(f64, f64)> = (0..n_rows)
        .filter_map(|r| Some((a.value(r)?, b.value(r)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let ma = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mb = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut cov, mut va, mut vb) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    if va <= 0.0 || vb <= 0.0 {
        return f64::NAN;
    }
    cov / (va * vb).sqrt()
}

/// Correlation matrix of every numeric column.
pub fn correlation_matrix(dataset: &Dataset) -> Result<Matrix, PlotError> {
    let columns = numeric_columns(dataset)?;
    let names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();
    let n_rows = dataset.n_rows();
    let values = columns
        .iter()
        .map(|a| columns.iter().map(|b| pearson(a, b, n_rows)).collect())
        .collect();
    Ok(Matrix {
        rows: names.clone(),
        cols: names,
        values,
    })
}

/// Row counts of each (y, x) level pair; absent pairs count zero.
pub fn pivot_counts(x: &Column, y: &Column, n_rows: usize) -> Matrix {
    let cols = x.sorted_levels();
    let rows = y.sorted_levels();
    let col_index: HashMap<&str, usize> = cols.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();
    let row_index: HashMap<&str, usize> = rows.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();
    let mut values = vec![vec![0.0; cols.len()]; rows.len()];
    for r in 0..n_rows {
        let (Some(xl), Some(yl)) = (x.label(r), y.label(r)) else { continue };
        if let (Some(&j), Some(&i)) = (col_index.get(xl.as_str()), row_index.get(yl.as_str())) {
            values[i][j] += 1.0;
        }
    }
    Matrix { rows, cols, values }
}

/// The numeric columns as a raw observation matrix, dropping incomplete rows.
fn observation_matrix(dataset: &Dataset) -> Result<Matrix, PlotError> {
    let columns = numeric_columns(dataset)?;
    let mut rows = Vec::new();
    let mut values = Vec::new();
    for r in 0..dataset.n_rows() {
        let row: Option<Vec<f64>> = columns.iter().map(|c| c.value(r)).collect();
        match row {
            Some(row) => {
                rows.push(r.to_string());
                values.push(row);
            }
            None => continue,
        }
    }
    let dropped = dataset.n_rows() - rows.len();
    if dropped > 0 {
        warn!(dropped, "rows with missing values left out of the clustered matrix");
    }
    if rows.len() < 2 {
        return Err(PlotError::InsufficientData(
            "fewer than 2 complete rows to cluster".to_string(),
        ));
    }
    Ok(Matrix {
        rows,
        cols: columns.iter().map(|c| c.name().to_string()).collect(),
        values,
    })
}

/// Which matrix axis a normalisation runs along.
fn norm_axis(kw: &Kwargs, key: &str) -> Result<Option<usize>, PlotError> {
    match kw.get(key) {
        ParamValue::Null => Ok(None),
        ParamValue::Int(0) => Ok(Some(0)),
        ParamValue::Int(1) => Ok(Some(1)),
        ParamValue::Text(t) if t == "0" || t == "1" => Ok(t.parse().ok()),
        other => Err(PlotError::invalid(key, format!("'{}' is not 0, 1 or None", other))),
    }
}

/// Standardise each row (axis 0) or column (axis 1) in place.
fn normalize_matrix(m: &mut Matrix, axis: usize, apply: impl Fn(&[f64]) -> Vec<f64>) {
    if axis == 0 {
        for row in m.values.iter_mut() {
            *row = apply(row);
        }
    } else {
        let t = m.transpose();
        let cols: Vec<Vec<f64>> = t.values.iter().map(|c| apply(c)).collect();
        for (i, row) in m.values.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = cols[j][i];
            }
        }
    }
}

fn z_score(values: &[f64]) -> Vec<f64> {
    let mean = stats::mean(values);
    let sd = stats::std_dev(values);
    values
        .iter()
        .map(|v| if sd > 0.0 { (v - mean) / sd } else { 0.0 })
        .collect()
}

fn standard_scale(values: &[f64]) -> Vec<f64> {
    let mm = scale::MinMax::of(values.iter().copied());
    let span = mm.max - mm.min;
    values
        .iter()
        .map(|v| if span > 0.0 { (v - mm.min) / span } else { 0.0 })
        .collect()
}

// =============================================================================
// Color range and annotations
// =============================================================================

/// Colormap limits from the data, `robust` quantiles, explicit bounds and a
/// center that makes the range symmetric.
fn color_limits(kw: &Kwargs, data: &[f64]) -> (f64, f64) {
    let sorted = stats::sorted(data);
    let (lo, hi) = if kw.flag("robust", false) {
        (stats::percentile(&sorted, 0.02), stats::percentile(&sorted, 0.98))
    } else {
        (
            sorted.first().copied().unwrap_or(0.0),
            sorted.last().copied().unwrap_or(1.0),
        )
    };
    let mut vmin = kw.float("vmin").unwrap_or(lo);
    let mut vmax = kw.float("vmax").unwrap_or(hi);
    if let Some(center) = kw.float("center") {
        let half = (vmax - center).abs().max((center - vmin).abs());
        vmin = center - half;
        vmax = center + half;
    }
    if !vmin.is_finite() || !vmax.is_finite() {
        (0.0, 1.0)
    } else if vmax <= vmin {
        (vmin - 0.5, vmin + 0.5)
    } else {
        (vmin, vmax)
    }
}

fn strip_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

/// `%g`-style general format with `precision` significant digits.
fn format_general(value: f64, precision: usize) -> String {
    let p = precision.max(1);
    if value == 0.0 {
        return "0".to_string();
    }
    let sci = format!("{:.*e}", p - 1, value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= p as i32 {
        format!(
            "{}e{}{:02}",
            strip_zeros(mantissa),
            if exp < 0 { '-' } else { '+' },
            exp.abs()
        )
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        strip_zeros(&format!("{:.*}", decimals, value))
    }
}

/// Format a cell value with a format string such as `.2g`, `.1f`, `d` or `.0%`.
pub fn format_annotation(value: f64, fmt: &str) -> Result<String, PlotError> {
    if !value.is_finite() {
        return Ok(String::new());
    }
    let spec = fmt.trim().trim_start_matches(':');
    let bad = || PlotError::invalid("fmt", format!("'{}' is not a supported number format", fmt));
    let (precision, kind) = match spec.char_indices().last() {
        None => (None, 'g'),
        Some((idx, kind)) => {
            let head = &spec[..idx];
            let precision = match head.strip_prefix('.') {
                Some(digits) => Some(digits.parse::<usize>().map_err(|_| bad())?),
                None if head.is_empty() => None,
                None => return Err(bad()),
            };
            (precision, kind)
        }
    };
    match kind {
        'f' | 'F' => Ok(format!("{:.*}", precision.unwrap_or(6), value)),
        'e' | 'E' => {
            let text = format!("{:.*e}", precision.unwrap_or(6), value);
            let (mantissa, exp) = text.split_once('e').unwrap_or((text.as_str(), "0"));
            let exp: i32 = exp.parse().unwrap_or(0);
            Ok(format!(
                "{}e{}{:02}",
                mantissa,
                if exp < 0 { '-' } else { '+' },
                exp.abs()
            ))
        }
        'g' | 'G' => Ok(format_general(value, precision.unwrap_or(6))),
        '%' => Ok(format!("{:.*}%", precision.unwrap_or(6), value * 100.0)),
        'd' if value.fract() == 0.0 && precision.is_none() => Ok(format!("{}", value as i64)),
        'd' => Err(PlotError::invalid("fmt", "'d' needs integer cell values")),
        _ => Err(bad()),
    }
}

// =============================================================================
// Panels
// =============================================================================

/// Cells of `m` drawn with row 0 at the top.
fn matrix_panel(kw: &Kwargs, m: &Matrix, cmap: &Colormap, (vmin, vmax): (f64, f64)) -> Result<PanelScene, PlotError> {
    let n_rows = m.n_rows();
    let x_levels = if kw.flag("xticklabels", true) {
        m.cols.clone()
    } else {
        vec![String::new(); m.n_cols()]
    };
    let y_levels: Vec<String> = if kw.flag("yticklabels", true) {
        m.rows.iter().rev().cloned().collect()
    } else {
        vec![String::new(); n_rows]
    };
    let mut panel = PanelScene::new(
        Axis::categorical(None, x_levels),
        Axis::categorical(None, y_levels),
    );

    let linewidth = kw.float_or("linewidths", 0.0);
    let edge = if linewidth > 0.0 {
        let name = kw.text_or("linecolor", "white");
        let color = palette::parse_color(name)
            .ok_or_else(|| PlotError::invalid("linecolor", format!("unrecognized color '{}'", name)))?;
        Some((color, points_to_px(linewidth)))
    } else {
        None
    };
    let annot = kw.flag("annot", false);
    let fmt = kw.text_or("fmt", ".2g");
    let text_size = points_to_px(kw.float_or("annot_size", 10.0));

    for (i, row) in m.values.iter().enumerate() {
        let y = (n_rows - 1 - i) as f64;
        for (j, value) in row.iter().enumerate() {
            if !value.is_finite() {
                continue;
            }
            let x = j as f64;
            let color = cmap.at((value - vmin) / (vmax - vmin));
            panel.push(DrawCommand::Rect {
                tl: (x - 0.5, y + 0.5),
                br: (x + 0.5, y - 0.5),
                style: FillStyle {
                    fill: Some(color),
                    edge,
                    alpha: 1.0,
                },
            });
            if annot {
                panel.push(DrawCommand::Text {
                    pos: (x, y),
                    text: format_annotation(*value, fmt)?,
                    style: TextStyle {
                        color: palette::contrasting_text(color),
                        size: text_size,
                    },
                });
            }
        }
    }
    Ok(panel)
}

/// Vertical color scale as a narrow panel of stacked bands.
fn colorbar_panel(cmap: &Colormap, (vmin, vmax): (f64, f64), bounds: Bounds) -> PanelScene {
    let mut panel = PanelScene::new(
        Axis::hidden().with_limits((0.0, 1.0)),
        Axis::continuous(None).with_limits((vmin, vmax)),
    );
    panel.bounds = bounds;
    let step = (vmax - vmin) / COLORBAR_STEPS as f64;
    for k in 0..COLORBAR_STEPS {
        let lo = vmin + step * k as f64;
        panel.push(DrawCommand::Rect {
            tl: (0.0, lo + step),
            br: (1.0, lo),
            style: FillStyle::filled(cmap.at((k as f64 + 0.5) / COLORBAR_STEPS as f64)),
        });
    }
    panel
}

pub fn heatmap(kw: &Kwargs) -> Result<SceneGraph> {
    let dataset = kw.dataset();
    let (m, x_label, y_label) = if kw.flag("use_corr", true) {
        (correlation_matrix(dataset)?, None, None)
    } else {
        let x = kw.required_column("x")?;
        let y = kw.required_column("y")?;
        (
            pivot_counts(x, y, dataset.n_rows()),
            Some(x.name().to_string()),
            Some(y.name().to_string()),
        )
    };
    if m.n_rows() == 0 || m.n_cols() == 0 {
        return Err(PlotError::InsufficientData("the matrix has no cells".to_string()).into());
    }
    let cmap = palette::colormap(kw.text_or("cmap", "coolwarm"))?;
    let limits = color_limits(kw, &m.finite());
    let mut panel = matrix_panel(kw, &m, &cmap, limits).context("Failed to build heatmap")?;
    panel.x.label = x_label;
    panel.y.label = y_label;

    let (width, height) = HEATMAP_SIZE;
    let cbar = kw.flag("cbar", true);
    let mut area = Bounds::new(0.0, 0.0, if cbar { 0.86 } else { 1.0 }, 1.0);
    if kw.flag("square", true) {
        // Shrink one side so cells come out square in pixels.
        let cell = (area.width * width as f64 / m.n_cols() as f64).min(height as f64 / m.n_rows() as f64);
        area.width = cell * m.n_cols() as f64 / width as f64;
        area.height = cell * m.n_rows() as f64 / height as f64;
        area.top = (1.0 - area.height) / 2.0;
    }
    panel.bounds = area;

    let mut scene = SceneGraph::new(width, height);
    scene.panels.push(panel);
    if cbar {
        scene.panels.push(colorbar_panel(&cmap, limits, Bounds::new(0.88, 0.1, 0.07, 0.8)));
    }
    debug!(rows = m.n_rows(), cols = m.n_cols(), "heatmap matrix built");
    Ok(scene)
}

/// Dendrogram links as segments; `horizontal` puts leaves along y with the
/// root on the left.
fn dendrogram_panel(tree: &Dendrogram, horizontal: bool, bounds: Bounds) -> PanelScene {
    let n = tree.n_leaves as f64;
    let top = tree.max_height().max(f64::MIN_POSITIVE);
    let mut segments = Vec::new();
    for link in tree.links() {
        let pts: Vec<(f64, f64)> = link
            .iter()
            .map(|&(p, h)| if horizontal { (-h, n - p) } else { (p, h) })
            .collect();
        for pair in pts.windows(2) {
            segments.push([pair[0], pair[1]]);
        }
    }
    let (x, y) = if horizontal {
        (
            Axis::hidden().with_limits((-top, 0.0)),
            Axis::hidden().with_limits((0.0, n)),
        )
    } else {
        (
            Axis::hidden().with_limits((0.0, n)),
            Axis::hidden().with_limits((0.0, top)),
        )
    };
    let mut panel = PanelScene::new(x, y);
    panel.bounds = bounds;
    if !segments.is_empty() {
        panel.push(DrawCommand::Segments {
            segments,
            style: LineStyle::solid(DENDROGRAM_COLOR, 1.0),
        });
    }
    panel
}

pub fn clustermap(kw: &Kwargs) -> Result<SceneGraph> {
    let dataset = kw.dataset();
    let mut m = if kw.flag("use_corr", true) {
        correlation_matrix(dataset)?
    } else {
        observation_matrix(dataset)?
    };
    let z_axis = norm_axis(kw, "z_score")?;
    let scale_axis = norm_axis(kw, "standard_scale")?;
    match (z_axis, scale_axis) {
        (Some(_), Some(_)) => {
            return Err(PlotError::invalid(
                "z_score",
                "cannot perform both z-scoring and standard-scaling on the data",
            )
            .into())
        }
        (Some(axis), None) => normalize_matrix(&mut m, axis, z_score),
        (None, Some(axis)) => normalize_matrix(&mut m, axis, standard_scale),
        (None, None) => {}
    }
    if m.values.iter().flatten().any(|v| !v.is_finite()) {
        return Err(PlotError::InsufficientData(
            "the matrix has undefined cells (constant columns?) and cannot be clustered".to_string(),
        )
        .into());
    }

    let method = cluster::Method::parse(kw.text_or("method", "average"))?;
    let metric = cluster::Metric::parse(kw.text_or("metric", "euclidean"))?;
    let row_tree = if kw.flag("row_cluster", true) {
        Some(cluster::linkage(&m.values, method, metric).context("Failed to cluster rows")?)
    } else {
        None
    };
    let col_tree = if kw.flag("col_cluster", true) {
        Some(cluster::linkage(&m.transpose().values, method, metric).context("Failed to cluster columns")?)
    } else {
        None
    };
    let row_order = row_tree.as_ref().map_or_else(|| (0..m.n_rows()).collect(), Dendrogram::order);
    let col_order = col_tree.as_ref().map_or_else(|| (0..m.n_cols()).collect(), Dendrogram::order);
    let ordered = m.reorder(&row_order, &col_order);

    let cmap = palette::colormap(kw.text_or("cmap", "coolwarm"))?;
    let limits = color_limits(kw, &ordered.finite());
    let mut heat = matrix_panel(kw, &ordered, &cmap, limits).context("Failed to build clustered heatmap")?;
    heat.bounds = Bounds::new(0.2, 0.2, 0.68, 0.78);

    let side = (kw.count_or("figsize", 10).clamp(1, 60) as f64 * DPI).round() as u32;
    let mut scene = SceneGraph::new(side, side);
    if let Some(tree) = &row_tree {
        scene.panels.push(dendrogram_panel(tree, true, Bounds::new(0.0, 0.2, 0.2, 0.78)));
    }
    if let Some(tree) = &col_tree {
        scene.panels.push(dendrogram_panel(tree, false, Bounds::new(0.2, 0.0, 0.68, 0.2)));
    }
    scene.panels.push(heat);
    if kw.flag("cbar", true) {
        scene.panels.push(colorbar_panel(&cmap, limits, Bounds::new(0.02, 0.02, 0.05, 0.16)));
    }
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamRecord;

    fn make_dataset() -> Dataset {
        let rows = (0..8)
            .map(|i| {
                let a = i as f64;
                vec![
                    format!("{}", a),
                    format!("{}", 2.0 * a + 1.0),
                    format!("{}", (8 - i) as f64 + (i % 3) as f64),
                    if i % 2 == 0 { "x".into() } else { "y".into() },
                ]
            })
            .collect();
        Dataset::from_rows(vec!["a".into(), "b".into(), "c".into(), "g".into()], rows)
    }

    #[test]
    fn test_correlation_matrix() {
        let m = correlation_matrix(&make_dataset()).unwrap();
        assert_eq!(m.rows, vec!["a", "b", "c"]);
        assert!((m.values[0][1] - 1.0).abs() < 1e-12);
        assert!((m.values[2][2] - 1.0).abs() < 1e-12);
        assert!(m.values[0][2] < 0.0);
    }

    #[test]
    fn test_pivot_counts() {
        let ds = make_dataset();
        let g = ds.column("g").unwrap();
        let m = pivot_counts(g, g, ds.n_rows());
        assert_eq!(m.values, vec![vec![4.0, 0.0], vec![0.0, 4.0]]);
    }

    #[test]
    fn test_format_annotation() {
        assert_eq!(format_annotation(0.8567, ".2g").unwrap(), "0.86");
        assert_eq!(format_annotation(1.0, ".2g").unwrap(), "1");
        assert_eq!(format_annotation(12345.0, ".2g").unwrap(), "1.2e+04");
        assert_eq!(format_annotation(3.14159, ".1f").unwrap(), "3.1");
        assert_eq!(format_annotation(4.0, "d").unwrap(), "4");
        assert_eq!(format_annotation(0.25, ".0%").unwrap(), "25%");
        assert!(format_annotation(0.5, "d").is_err());
        assert!(format_annotation(0.5, "q").is_err());
    }

    #[test]
    fn test_center_makes_range_symmetric() {
        let ds = make_dataset();
        let rec = ParamRecord::new().with("center", 0.0);
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        assert_eq!(color_limits(&kw, &[-0.2, 1.0]), (-1.0, 1.0));
    }

    #[test]
    fn test_robust_limits_without_finite_cells() {
        let ds = Dataset::from_rows(
            vec!["a".into(), "b".into(), "c".into()],
            (0..6)
                .map(|_| vec!["5".into(), "5".into(), "x".into()])
                .collect(),
        );
        let rec = ParamRecord::new().with("robust", true);
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        assert_eq!(color_limits(&kw, &[f64::NAN, f64::NAN]), (0.0, 1.0));

        let figure = crate::invoker::invoke(
            crate::chart::ChartKind::Heatmap,
            &rec,
            &ds,
            &crate::RenderOptions::default(),
        )
        .unwrap();
        assert!(!figure.bytes.is_empty());
    }

    #[test]
    fn test_heatmap_cells_and_colorbar() {
        let ds = make_dataset();
        let rec = ParamRecord::new().with("annot", true);
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        let scene = heatmap(&kw).unwrap();
        assert_eq!((scene.width, scene.height), HEATMAP_SIZE);
        assert_eq!(scene.panels.len(), 2);
        let texts = scene.panels[0]
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Text { .. }))
            .count();
        assert_eq!(texts, 9);
    }

    #[test]
    fn test_heatmap_needs_two_numeric_columns() {
        let ds = Dataset::from_rows(
            vec!["a".into(), "g".into()],
            vec![vec!["1".into(), "x".into()], vec!["2".into(), "y".into()]],
        );
        let rec = ParamRecord::new();
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        let err = heatmap(&kw).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlotError>(),
            Some(PlotError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_clustermap_rejects_double_normalisation() {
        let ds = make_dataset();
        let rec = ParamRecord::new()
            .with("z_score", 0i64)
            .with("standard_scale", 1i64);
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        assert!(clustermap(&kw).is_err());
    }

    #[test]
    fn test_clustermap_layout() {
        let ds = make_dataset();
        let rec = ParamRecord::new()
            .with("use_corr", false)
            .with("standard_scale", 1i64)
            .with("figsize", 8i64);
        let kw = Kwargs::new(&rec, &ds, 800, 600);
        let scene = clustermap(&kw).unwrap();
        assert_eq!((scene.width, scene.height), (800, 800));
        // Two dendrograms, the heatmap and the colorbar.
        assert_eq!(scene.panels.len(), 4);
        let cells = scene.panels[2]
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Rect { .. }))
            .count();
        assert_eq!(cells, 24);
    }
}
