use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cache::Figure;
use crate::chart::ChartKind;
use crate::data::Dataset;
use crate::error::PlotError;
use crate::ir::SceneGraph;
use crate::params::{ParamRecord, ParamValue};
use crate::plots::{categorical, distribution, matrix, regression, relational, Kwargs};
use crate::{graph, scale, RenderOptions};

/// Record keys whose values name dataset columns.
const COLUMN_KEYS: &[&str] = &[
    "x", "y", "hue", "size", "style", "units", "row", "col", "x_partial", "y_partial",
];

/// Check that every column the record names exists in the dataset.
pub fn validate_columns(record: &ParamRecord, dataset: &Dataset) -> Result<(), PlotError> {
    for key in COLUMN_KEYS {
        match record.get(key) {
            ParamValue::Text(name) => {
                dataset.require(name)?;
            }
            ParamValue::List(names) => {
                for name in names {
                    dataset.require(name)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn dispatch(kind: ChartKind, kw: &Kwargs) -> Result<SceneGraph> {
    use ChartKind::*;
    match kind {
        Scatter => relational::scatter(kw),
        Line => relational::line(kw),
        Relplot => relational::relplot(kw),
        Histogram => distribution::histogram(kw),
        Kde => distribution::kde(kw),
        Ecdf => distribution::ecdf(kw),
        Displot => distribution::displot(kw),
        Rug => distribution::rug(kw),
        Strip => categorical::strip(kw),
        Swarm => categorical::swarm(kw),
        Box => categorical::boxplot(kw),
        Violin => categorical::violin(kw),
        Boxen => categorical::boxen(kw),
        Point => categorical::point(kw),
        Bar => categorical::bar(kw),
        Count => categorical::count(kw),
        Catplot => categorical::catplot(kw),
        Lmplot => regression::lmplot(kw),
        Regplot => regression::regplot(kw),
        Residplot => regression::residplot(kw),
        Heatmap => matrix::heatmap(kw),
        Clustermap => matrix::clustermap(kw),
    }
}

/// Typed errors raised inside the plotting layer survive; anything else is
/// reported as a render failure with its context chain.
fn to_plot_error(err: anyhow::Error) -> PlotError {
    match err.downcast::<PlotError>() {
        Ok(plot) => plot,
        Err(other) => PlotError::Render(format!("{:#}", other)),
    }
}

/// Validate the record and build the chart's scene with fitted axes.
pub fn build_scene(
    kind: ChartKind,
    record: &ParamRecord,
    dataset: &Dataset,
    options: &RenderOptions,
) -> Result<SceneGraph, PlotError> {
    validate_columns(record, dataset)?;
    debug!(
        chart = %kind,
        function = kind.function_name(),
        figure_level = kind.is_figure_level(),
        "dispatching"
    );
    let kw = Kwargs::new(record, dataset, options.width, options.height);
    let mut scene = dispatch(kind, &kw).map_err(to_plot_error)?;
    scale::fit_axes(&mut scene);
    Ok(scene)
}

/// Build and encode a figure. On failure nothing is produced.
pub fn invoke(
    kind: ChartKind,
    record: &ParamRecord,
    dataset: &Dataset,
    options: &RenderOptions,
) -> Result<Figure, PlotError> {
    let started = Instant::now();
    let result = build_scene(kind, record, dataset, options).and_then(|scene| {
        let bytes = graph::render(&scene, &options.format).map_err(to_plot_error)?;
        Ok(Figure {
            kind,
            format: options.format.clone(),
            width: scene.width,
            height: scene.height,
            scene,
            bytes,
        })
    });

    match &result {
        Ok(figure) => info!(
            chart = %kind,
            width = figure.width,
            height = figure.height,
            commands = figure.scene.command_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rendered figure"
        ),
        Err(err) => warn!(chart = %kind, error = %err, "plot failed"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        let rows = (0..12)
            .map(|i| {
                vec![
                    if i % 2 == 0 { "Thu" } else { "Fri" }.to_string(),
                    format!("{}", 10 + i),
                    format!("{}", (i * 7) % 5),
                ]
            })
            .collect();
        Dataset::from_rows(vec!["day".into(), "total".into(), "tip".into()], rows)
    }

    #[test]
    fn test_missing_column_is_reported() {
        let ds = dataset();
        let record = ParamRecord::new().with("x", "nope").with("y", "total");
        let err = build_scene(ChartKind::Scatter, &record, &ds, &RenderOptions::default()).unwrap_err();
        assert!(matches!(err, PlotError::MissingColumn(name) if name == "nope"));
    }

    #[test]
    fn test_missing_partial_column() {
        let ds = dataset();
        let record = ParamRecord::new()
            .with("x", "total")
            .with("y", "tip")
            .with("x_partial", ParamValue::List(vec!["absent".into()]));
        assert!(matches!(
            validate_columns(&record, &ds),
            Err(PlotError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_scene_is_deterministic() {
        let ds = dataset();
        let record = ParamRecord::new()
            .with("x", "day")
            .with("y", "total")
            .with("jitter", 0.3);
        let options = RenderOptions::default();
        let a = build_scene(ChartKind::Strip, &record, &ds, &options).unwrap();
        let b = build_scene(ChartKind::Strip, &record, &ds, &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invoke_encodes_png() {
        let ds = dataset();
        let record = ParamRecord::new().with("x", "total").with("y", "tip");
        let figure = invoke(ChartKind::Scatter, &record, &ds, &RenderOptions::default()).unwrap();
        assert_eq!(&figure.bytes[1..4], b"PNG");
        assert_eq!((figure.width, figure.height), (800, 600));
        assert_eq!(figure.kind, ChartKind::Scatter);
    }

    #[test]
    fn test_typed_errors_survive_dispatch() {
        let ds = dataset();
        let record = ParamRecord::new().with("x", "total").with("y", "day");
        let err = build_scene(ChartKind::Regplot, &record, &ds, &RenderOptions::default()).unwrap_err();
        assert!(matches!(err, PlotError::NotNumeric(_)));
    }
}
