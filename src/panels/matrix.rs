use super::*;

const CMAPS: &[&str] = &["viridis", "coolwarm", "Spectral", "YlOrRd", "Blues"];
const AXIS_CHOICE: &[&str] = &["None", "0", "1"];

fn color_block() -> Vec<Widget> {
    vec![
        Widget::choice("cmap", "Colormap", CMAPS, 1),
        Widget::number("center", "Center value", -1e12, 1e12, None),
        Widget::checkbox("robust", "Robust scaling", false),
    ]
}

fn annot_block() -> Vec<Widget> {
    let on = || Condition::Toggle("annot");
    vec![
        Widget::checkbox("annot", "Show values", false),
        Widget::text("fmt", "Value format", ".2g").when(on()),
        Widget::int_slider("annot_size", "Annotation size", 6, 20, 10).when(on()),
    ]
}

pub fn heatmap() -> Vec<Widget> {
    let pivot = || Condition::NotToggle("use_corr");
    let mut w = vec![
        Widget::checkbox("use_corr", "Use correlation matrix", true),
        Widget::column("x", "X-axis variable", 0).when(pivot()),
        Widget::column("y", "Y-axis variable", 1).when(pivot()),
    ];
    w.extend(color_block());
    w.extend([
        Widget::number("vmin", "Minimum value", -1e12, 1e12, None),
        Widget::number("vmax", "Maximum value", -1e12, 1e12, None),
    ]);
    w.extend(annot_block());
    w.extend([
        Widget::slider("linewidths", "Grid line width", 0.0, 2.0, Some(0.5)),
        Widget::color("linecolor", "Grid line color", "#ffffff"),
        Widget::checkbox("square", "Square cells", true),
        Widget::checkbox("cbar", "Show colorbar", true),
        Widget::checkbox("xticklabels", "Show x-tick labels", true),
        Widget::checkbox("yticklabels", "Show y-tick labels", true),
    ]);
    w
}

pub fn clustermap() -> Vec<Widget> {
    let mut w = vec![
        Widget::checkbox("use_corr", "Use correlation matrix", true),
        Widget::checkbox("row_cluster", "Cluster rows", true),
        Widget::checkbox("col_cluster", "Cluster columns", true),
        Widget::choice(
            "method",
            "Linkage method",
            &["average", "single", "complete", "ward"],
            0,
        ),
        Widget::choice(
            "metric",
            "Distance metric",
            &["euclidean", "correlation", "cityblock", "cosine"],
            0,
        ),
        Widget::choice("z_score", "Z-score normalization", AXIS_CHOICE, 0),
        Widget::choice("standard_scale", "Standard scaling", AXIS_CHOICE, 0),
    ];
    w.extend(color_block());
    w.extend(annot_block());
    w.extend([
        Widget::int_slider("figsize", "Figure size", 5, 20, 10),
        Widget::slider("linewidths", "Grid line width", 0.0, 2.0, Some(0.5)),
        Widget::color("linecolor", "Grid line color", "#ffffff"),
        Widget::checkbox("cbar", "Show colorbar", true),
    ]);
    w
}

fn put_annot(record: &mut ParamRecord, r: &Resolved) {
    let annot = r.toggle("annot");
    record.insert("annot", annot);
    let fmt = match r.text("fmt") {
        Some(fmt) if annot => fmt.to_string(),
        _ => ".2g".to_string(),
    };
    record.insert("fmt", fmt);
    put(record, r, &["annot_size"]);
}

pub fn assemble_heatmap(r: &Resolved) -> ParamRecord {
    let mut record = ParamRecord::new();
    put(&mut record, r, &["use_corr", "x", "y", "cmap", "center", "robust", "vmin", "vmax"]);
    put_annot(&mut record, r);
    put(
        &mut record,
        r,
        &["linewidths", "linecolor", "square", "cbar", "xticklabels", "yticklabels"],
    );
    record
}

pub fn assemble_clustermap(r: &Resolved) -> ParamRecord {
    let mut record = ParamRecord::new();
    put(
        &mut record,
        r,
        &[
            "use_corr",
            "row_cluster",
            "col_cluster",
            "method",
            "metric",
            "z_score",
            "standard_scale",
            "cmap",
            "center",
            "robust",
        ],
    );
    put_annot(&mut record, r);
    put(&mut record, r, &["figsize", "linewidths", "linecolor", "cbar"]);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartKind;

    fn make_dataset() -> Dataset {
        Dataset::from_rows(
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                vec!["1".into(), "2".into(), "3".into()],
                vec!["2".into(), "5".into(), "1".into()],
            ],
        )
    }

    #[test]
    fn test_heatmap_defaults() {
        let ds = make_dataset();
        let (resolved, record) = build_record(ChartKind::Heatmap, &Inputs::new(), &ds);
        assert!(!resolved.is_visible("x"));
        assert_eq!(record.get("cmap"), &ParamValue::text("coolwarm"));
        assert_eq!(record.get("fmt"), &ParamValue::text(".2g"));
        assert!(record.get("annot_size").is_null());
        assert!(record.get("center").is_null());
    }

    #[test]
    fn test_pivot_reveals_axes() {
        let ds = make_dataset();
        let mut inputs = Inputs::new();
        inputs.insert("use_corr".into(), ParamValue::Bool(false));
        let (_, record) = build_record(ChartKind::Heatmap, &inputs, &ds);
        assert_eq!(record.get("x"), &ParamValue::text("a"));
        assert_eq!(record.get("y"), &ParamValue::text("b"));
    }

    #[test]
    fn test_clustermap_axis_choices() {
        let ds = make_dataset();
        let (_, record) = build_record(ChartKind::Clustermap, &Inputs::new(), &ds);
        assert!(record.get("z_score").is_null());
        let mut inputs = Inputs::new();
        inputs.insert("z_score".into(), ParamValue::Int(1));
        let (_, record) = build_record(ChartKind::Clustermap, &inputs, &ds);
        assert_eq!(record.get("z_score"), &ParamValue::Int(1));
        assert_eq!(record.get("figsize"), &ParamValue::Int(10));
    }
}
