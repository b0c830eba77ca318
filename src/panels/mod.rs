//! Parameter panels: the ordered widget list each chart offers and the
//! assembly of resolved widget values into the keyword record handed to the
//! plotting layer.

mod categorical;
mod distribution;
mod matrix;
mod regression;
mod relational;

use crate::chart::ChartKind;
use crate::data::Dataset;
use crate::params::{ParamRecord, ParamValue};
use crate::widgets::{self, Condition, Inputs, Resolved, Widget};

pub const LEGEND_OPTIONS: &[&str] = &["auto", "brief", "full", "False"];
pub const ESTIMATORS: &[&str] = &["mean", "median", "sum", "min", "max", "count"];
pub const ERRORBARS: &[&str] = &["ci", "pi", "se", "sd", "None"];
pub const DODGE_OPTIONS: &[&str] = &["auto", "True", "False"];
pub const ORIENTATIONS: &[&str] = &["v", "h", "x", "y"];

/// Widgets for a chart in declaration order.
pub fn widgets(kind: ChartKind) -> Vec<Widget> {
    use ChartKind::*;
    match kind {
        Scatter => relational::scatter(),
        Line => relational::line(),
        Relplot => relational::relplot(),
        Histogram => distribution::histogram(),
        Kde => distribution::kde(),
        Ecdf => distribution::ecdf(),
        Displot => distribution::displot(),
        Rug => distribution::rug(),
        Strip => categorical::strip(),
        Swarm => categorical::swarm(),
        Box => categorical::boxplot(),
        Violin => categorical::violin(),
        Boxen => categorical::boxen(),
        Point => categorical::point(),
        Bar => categorical::bar(),
        Count => categorical::count(),
        Catplot => categorical::catplot(),
        Lmplot => regression::lmplot(),
        Regplot => regression::regplot(),
        Residplot => regression::residplot(),
        Heatmap => matrix::heatmap(),
        Clustermap => matrix::clustermap(),
    }
}

/// Turn resolved widget values into the chart's keyword record.
pub fn assemble(kind: ChartKind, r: &Resolved) -> ParamRecord {
    use ChartKind::*;
    match kind {
        Scatter => relational::assemble_scatter(r),
        Line => relational::assemble_line(r),
        Relplot => relational::assemble_relplot(r),
        Histogram => distribution::assemble_histogram(r),
        Kde => distribution::assemble_kde(r),
        Ecdf => distribution::assemble_ecdf(r),
        Displot => distribution::assemble_displot(r),
        Rug => distribution::assemble_rug(r),
        Strip => categorical::assemble_strip(r),
        Swarm => categorical::assemble_swarm(r),
        Box => categorical::assemble_box(r),
        Violin => categorical::assemble_violin(r),
        Boxen => categorical::assemble_boxen(r),
        Point => categorical::assemble_point(r),
        Bar => categorical::assemble_bar(r),
        Count => categorical::assemble_count(r),
        Catplot => categorical::assemble_catplot(r),
        Lmplot => regression::assemble_lmplot(r),
        Regplot => regression::assemble_regplot(r),
        Residplot => regression::assemble_residplot(r),
        Heatmap => matrix::assemble_heatmap(r),
        Clustermap => matrix::assemble_clustermap(r),
    }
}

pub fn find_widget(kind: ChartKind, key: &str) -> Option<Widget> {
    widgets(kind).into_iter().find(|w| w.key == key)
}

/// Resolve a chart's panel against the dataset and assemble its record.
pub fn build_record(kind: ChartKind, inputs: &Inputs, dataset: &Dataset) -> (Resolved, ParamRecord) {
    let resolved = widgets::resolve(&widgets(kind), inputs, dataset);
    let record = assemble(kind, &resolved);
    (resolved, record)
}

// =============================================================================
// Shared widget blocks
// =============================================================================

fn axes() -> Vec<Widget> {
    vec![
        Widget::column("x", "X-axis variable", 0),
        Widget::column("y", "Y-axis variable", 1),
    ]
}

/// X column plus an optional Y, as the distribution charts take them.
fn univariate_axes() -> Vec<Widget> {
    vec![
        Widget::column("x", "X-axis variable", 0),
        Widget::optional_column("y", "Y-axis variable (optional)"),
    ]
}

fn hue_block() -> Vec<Widget> {
    let on = || Condition::Toggle("use_hue");
    vec![
        Widget::checkbox("use_hue", "Use hue grouping", false),
        Widget::column("hue", "Hue variable", 2).when(on()),
        Widget::text("palette", "Color palette", "viridis").when(on()),
        Widget::levels("hue_order", "Hue order", "hue").when(on()),
        Widget::text("hue_norm", "Hue normalization", "").when(on()),
    ]
}

fn size_block(default_range: &'static str) -> Vec<Widget> {
    let on = || Condition::Toggle("use_size");
    vec![
        Widget::checkbox("use_size", "Use size grouping", false),
        Widget::column("size", "Size variable", 3).when(on()),
        Widget::text("sizes", "Size range", default_range).when(on()),
        Widget::levels("size_order", "Size order", "size").when(on()),
        Widget::text("size_norm", "Size normalization", "").when(on()),
    ]
}

fn style_block(with_dashes: bool) -> Vec<Widget> {
    let on = || Condition::Toggle("use_style");
    let mut block = vec![
        Widget::checkbox("use_style", "Use style grouping", false),
        Widget::column("style", "Style variable", 4).when(on()),
        Widget::checkbox("markers", "Use markers", true).when(on()),
    ];
    if with_dashes {
        block.push(Widget::checkbox("dashes", "Use dashed lines", true).when(on()));
    }
    block.push(Widget::levels("style_order", "Style order", "style").when(on()));
    block
}

fn facet_block() -> Vec<Widget> {
    let on = || Condition::Toggle("use_facets");
    vec![
        Widget::checkbox("use_facets", "Use faceting", false),
        Widget::optional_column("row", "Row faceting variable").when(on()),
        Widget::optional_column("col", "Column faceting variable").when(on()),
        Widget::int_number("col_wrap", "Columns per row", 1, 100, Some(3))
            .when(Condition::All(vec![on(), Condition::IsSet("col")])),
        Widget::levels("row_order", "Row order", "row")
            .when(Condition::All(vec![on(), Condition::IsSet("row")])),
        Widget::levels("col_order", "Column order", "col")
            .when(Condition::All(vec![on(), Condition::IsSet("col")])),
    ]
}

fn size_params() -> Vec<Widget> {
    vec![
        Widget::number("height", "Facet height (inches)", 1.0, 50.0, Some(5.0)),
        Widget::number("aspect", "Facet aspect ratio", 0.1, 10.0, Some(1.0)),
    ]
}

fn estimator_block(with_none: bool) -> Vec<Widget> {
    const WITH_NONE: &[&str] = &["mean", "median", "sum", "min", "max", "count", "None"];
    let estimators = if with_none { WITH_NONE } else { ESTIMATORS };
    vec![
        Widget::choice("estimator", "Estimator", estimators, 0),
        Widget::choice("errorbar", "Error bar method", ERRORBARS, 0),
        Widget::int_slider("errorbar_level", "Confidence level", 1, 99, 95)
            .when(Condition::OneOf("errorbar", &["ci", "pi"])),
        Widget::int_number("n_boot", "Bootstrap samples", 1, 100_000, Some(1000)),
    ]
}

fn log_and_color() -> Vec<Widget> {
    vec![
        Widget::checkbox("log_scale", "Log scale", false),
        Widget::color("color", "Base color", "#1f77b4"),
    ]
}

// =============================================================================
// Shared assembly
// =============================================================================

/// A free-text range, or Null when it does not parse.
fn range_value(r: &Resolved, key: &str) -> ParamValue {
    match r.text(key).and_then(widgets::parse_range) {
        Some((lo, hi)) => ParamValue::Pair(lo, hi),
        None => ParamValue::Null,
    }
}

/// Value of `key` when `toggle` is on, Null otherwise.
fn gated(r: &Resolved, toggle: &str, key: &str) -> ParamValue {
    if r.toggle(toggle) {
        r.get(key).clone()
    } else {
        ParamValue::Null
    }
}

fn put(record: &mut ParamRecord, r: &Resolved, keys: &[&str]) {
    for key in keys {
        record.insert(key, r.get(key).clone());
    }
}

fn put_axes(record: &mut ParamRecord, r: &Resolved) {
    put(record, r, &["x", "y"]);
}

fn put_hue(record: &mut ParamRecord, r: &Resolved) {
    record.insert("hue", gated(r, "use_hue", "hue"));
    record.insert("palette", gated(r, "use_hue", "palette"));
    record.insert("hue_order", r.non_empty_list("hue_order"));
    record.insert("hue_norm", range_value(r, "hue_norm"));
}

fn put_size(record: &mut ParamRecord, r: &Resolved, fallback: (f64, f64)) {
    record.insert("size", gated(r, "use_size", "size"));
    let sizes = if r.toggle("use_size") {
        let (lo, hi) = widgets::parse_size_range(r.text("sizes").unwrap_or(""), fallback);
        ParamValue::Pair(lo, hi)
    } else {
        ParamValue::Null
    };
    record.insert("sizes", sizes);
    record.insert("size_order", r.non_empty_list("size_order"));
    record.insert("size_norm", range_value(r, "size_norm"));
}

fn put_style(record: &mut ParamRecord, r: &Resolved, unstyled_markers: ParamValue) {
    let on = r.toggle("use_style");
    record.insert("style", gated(r, "use_style", "style"));
    record.insert(
        "markers",
        if on { r.get("markers").clone() } else { unstyled_markers },
    );
    record.insert("style_order", r.non_empty_list("style_order"));
}

fn put_facets(record: &mut ParamRecord, r: &Resolved) {
    record.insert("row", gated(r, "use_facets", "row"));
    record.insert("col", gated(r, "use_facets", "col"));
    record.insert("col_wrap", r.get("col_wrap").clone());
    record.insert("row_order", r.non_empty_list("row_order"));
    record.insert("col_order", r.non_empty_list("col_order"));
}

fn put_estimator(record: &mut ParamRecord, r: &Resolved) {
    put(record, r, &["estimator", "errorbar", "errorbar_level", "n_boot"]);
}

/// Dodge is only forwarded when hue grouping is on.
fn put_dodge(record: &mut ParamRecord, r: &Resolved) {
    record.insert("dodge", gated(r, "use_hue", "dodge"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    fn make_dataset() -> Dataset {
        Dataset::from_rows(
            vec![
                "bill".into(),
                "flipper".into(),
                "species".into(),
                "mass".into(),
                "sex".into(),
            ],
            vec![
                vec!["39.1".into(), "181".into(), "Adelie".into(), "3750".into(), "M".into()],
                vec!["46.5".into(), "210".into(), "Gentoo".into(), "4800".into(), "F".into()],
                vec!["49.0".into(), "195".into(), "Chinstrap".into(), "3900".into(), "M".into()],
            ],
        )
    }

    #[test]
    fn test_every_chart_has_a_panel() {
        let ds = make_dataset();
        for kind in ChartKind::all() {
            let list = widgets(kind);
            assert!(!list.is_empty(), "{} has no widgets", kind);
            let (_, record) = build_record(kind, &Inputs::new(), &ds);
            assert!(!record.is_empty(), "{} assembled nothing", kind);
        }
    }

    #[test]
    fn test_widget_keys_unique() {
        for kind in ChartKind::all() {
            let list = widgets(kind);
            for (i, w) in list.iter().enumerate() {
                assert!(
                    list[i + 1..].iter().all(|o| o.key != w.key),
                    "duplicate key {} in {}",
                    w.key,
                    kind
                );
            }
        }
    }

    #[test]
    fn test_scatter_defaults() {
        let ds = make_dataset();
        let (_, record) = build_record(ChartKind::Scatter, &Inputs::new(), &ds);
        assert_eq!(record.get("x"), &ParamValue::text("bill"));
        assert_eq!(record.get("y"), &ParamValue::text("flipper"));
        assert!(record.get("hue").is_null());
        assert!(record.get("palette").is_null());
        assert_eq!(record.get("markers"), &ParamValue::Bool(true));
        assert_eq!(record.get("legend"), &ParamValue::text("auto"));
    }

    #[test]
    fn test_hue_toggle_reveals_options() {
        let ds = make_dataset();
        let mut inputs = Inputs::new();
        inputs.insert("hue_order".into(), ParamValue::List(vec!["Gentoo".into()]));
        let (resolved, record) = build_record(ChartKind::Scatter, &inputs, &ds);
        assert!(!resolved.is_visible("hue_order"));
        assert!(record.get("hue_order").is_null());

        inputs.insert("use_hue".into(), ParamValue::Bool(true));
        let (resolved, record) = build_record(ChartKind::Scatter, &inputs, &ds);
        assert!(resolved.is_visible("hue_order"));
        assert_eq!(record.get("hue"), &ParamValue::text("species"));
        assert_eq!(record.get("palette"), &ParamValue::text("viridis"));
        assert_eq!(
            record.get("hue_order"),
            &ParamValue::List(vec!["Gentoo".into()])
        );
    }

    #[test]
    fn test_malformed_norm_means_no_constraint() {
        let ds = make_dataset();
        let mut inputs = Inputs::new();
        inputs.insert("use_hue".into(), ParamValue::Bool(true));
        inputs.insert("hue_norm".into(), ParamValue::text("abc"));
        let (_, record) = build_record(ChartKind::Scatter, &inputs, &ds);
        assert!(record.get("hue_norm").is_null());

        inputs.insert("hue_norm".into(), ParamValue::text("0,100"));
        let (_, record) = build_record(ChartKind::Scatter, &inputs, &ds);
        assert_eq!(record.get("hue_norm"), &ParamValue::Pair(0.0, 100.0));
    }

    #[test]
    fn test_size_range_falls_back_per_chart() {
        let ds = make_dataset();
        let mut inputs = Inputs::new();
        inputs.insert("use_size".into(), ParamValue::Bool(true));
        inputs.insert("sizes".into(), ParamValue::text("big"));
        let (_, scatter) = build_record(ChartKind::Scatter, &inputs, &ds);
        assert_eq!(scatter.get("sizes"), &ParamValue::Pair(10.0, 100.0));
        let (_, line) = build_record(ChartKind::Line, &inputs, &ds);
        assert_eq!(line.get("sizes"), &ParamValue::Pair(1.0, 5.0));
    }

    #[test]
    fn test_find_widget() {
        assert!(find_widget(ChartKind::Violin, "inner").is_some());
        assert!(find_widget(ChartKind::Scatter, "inner").is_none());
    }
}
