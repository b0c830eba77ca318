use super::*;

const X_ESTIMATORS: &[&str] = &["None", "mean", "median"];

fn scatter_block(with_marker: bool) -> Vec<Widget> {
    let on = || Condition::Toggle("scatter");
    let mut block = vec![
        Widget::checkbox("scatter", "Show scatterplot", true),
        Widget::slider("x_jitter", "X-axis jitter", 0.0, 1.0, Some(0.0)).when(on()),
        Widget::slider("y_jitter", "Y-axis jitter", 0.0, 1.0, Some(0.0)).when(on()),
        Widget::choice("x_estimator", "X-estimator", X_ESTIMATORS, 0).when(on()),
        Widget::int_number("x_bins", "X-bins", 0, 1000, Some(0)).when(on()),
    ];
    if with_marker {
        block.push(Widget::text("marker", "Marker style", "o").when(on()));
        block.push(Widget::color("color", "Base color", "#1f77b4").when(on()));
    }
    block
}

fn fit_block(with_boot: bool) -> Vec<Widget> {
    let on = || Condition::Toggle("fit_reg");
    let mut block = vec![
        Widget::checkbox("fit_reg", "Fit regression", true),
        Widget::int_slider("ci", "Confidence interval", 0, 100, 95).when(on()),
    ];
    if with_boot {
        block.push(Widget::int_number("n_boot", "Bootstrap samples", 1, 100_000, Some(1000)).when(on()));
    }
    block.extend([
        Widget::int_number("order", "Polynomial order", 1, 10, Some(1)).when(on()),
        Widget::checkbox("logistic", "Logistic regression", false).when(on()),
        Widget::checkbox("lowess", "LOWESS regression", false).when(on()),
        Widget::checkbox("robust", "Robust regression", false).when(on()),
        Widget::checkbox("logx", "Log-x regression", false).when(on()),
        Widget::checkbox("truncate", "Truncate regression", true).when(on()),
    ]);
    block
}

pub fn lmplot() -> Vec<Widget> {
    let hue = || Condition::Toggle("use_hue");
    let col = || Condition::Toggle("use_col");
    let row = || Condition::All(vec![Condition::Toggle("use_row"), Condition::NotToggle("use_col")]);
    let mut w = axes();
    w.extend([
        Widget::checkbox("use_hue", "Use hue grouping", false),
        Widget::column("hue", "Hue variable", 2).when(hue()),
        Widget::text("palette", "Color palette", "viridis").when(hue()),
        Widget::levels("hue_order", "Hue order", "hue").when(hue()),
        Widget::text("markers", "Markers", "o").when(hue()),
        Widget::checkbox("use_col", "Use column faceting", false),
        Widget::column("col", "Column variable", 0).when(col()),
        Widget::int_number("col_wrap", "Columns per row", 1, 100, None).when(col()),
        Widget::levels("col_order", "Column order", "col").when(col()),
        Widget::checkbox("use_row", "Use row faceting", false),
        Widget::column("row", "Row variable", 0).when(row()),
        Widget::levels("row_order", "Row order", "row").when(row()),
    ]);
    w.extend(fit_block(false));
    w.extend(scatter_block(false));
    w.extend([
        Widget::number("height", "Facet height", 1.0, 50.0, Some(5.0)),
        Widget::number("aspect", "Aspect ratio", 0.1, 10.0, Some(1.0)),
        Widget::checkbox("legend", "Show legend", true),
    ]);
    w
}

pub fn regplot() -> Vec<Widget> {
    let mut w = axes();
    w.extend(scatter_block(true));
    w.extend(fit_block(true));
    w.push(Widget::checkbox("dropna", "Drop NA values", true).when(Condition::Toggle("fit_reg")));
    w
}

pub fn residplot() -> Vec<Widget> {
    let mut w = axes();
    w.extend([
        Widget::checkbox("lowess", "LOWESS smoother", false),
        Widget::int_number("order", "Polynomial order", 1, 10, Some(1)),
        Widget::checkbox("robust", "Robust regression", false),
        Widget::checkbox("dropna", "Drop NA values", true),
        Widget::color("color", "Plot color", "#1f77b4"),
        Widget::checkbox("use_x_partial", "Use x-partial", false),
        Widget::columns("x_partial", "X-partial variables").when(Condition::Toggle("use_x_partial")),
        Widget::checkbox("use_y_partial", "Use y-partial", false),
        Widget::columns("y_partial", "Y-partial variables").when(Condition::Toggle("use_y_partial")),
    ]);
    w
}

/// Fit options, with the neutral values used when fitting is off.
fn put_fit(record: &mut ParamRecord, r: &Resolved) {
    let fit = r.toggle("fit_reg");
    record.insert("fit_reg", fit);
    put(record, r, &["ci", "order"]);
    for key in ["logistic", "lowess", "robust", "logx"] {
        record.insert(key, fit && r.toggle(key));
    }
    record.insert("truncate", if fit { r.toggle("truncate") } else { true });
}

fn put_scatter(record: &mut ParamRecord, r: &Resolved) {
    record.insert("scatter", r.toggle("scatter"));
    put(record, r, &["x_jitter", "y_jitter", "x_estimator"]);
    let bins = match r.get("x_bins").as_i64() {
        Some(n) if n > 0 => ParamValue::Int(n),
        _ => ParamValue::Null,
    };
    record.insert("x_bins", bins);
}

pub fn assemble_lmplot(r: &Resolved) -> ParamRecord {
    let mut record = ParamRecord::new();
    put_axes(&mut record, r);
    record.insert("hue", gated(r, "use_hue", "hue"));
    record.insert("palette", gated(r, "use_hue", "palette"));
    record.insert("hue_order", r.non_empty_list("hue_order"));
    record.insert(
        "markers",
        r.text("markers").map(ParamValue::text).unwrap_or_else(|| ParamValue::text("o")),
    );
    record.insert("col", gated(r, "use_col", "col"));
    put(&mut record, r, &["col_wrap"]);
    record.insert("col_order", r.non_empty_list("col_order"));
    // Row faceting only applies when column faceting is off.
    record.insert("row", r.get("row").clone());
    record.insert("row_order", r.non_empty_list("row_order"));
    put_fit(&mut record, r);
    put_scatter(&mut record, r);
    put(&mut record, r, &["height", "aspect", "legend"]);
    record
}

pub fn assemble_regplot(r: &Resolved) -> ParamRecord {
    let mut record = ParamRecord::new();
    put_axes(&mut record, r);
    put_scatter(&mut record, r);
    put(&mut record, r, &["marker", "color"]);
    put_fit(&mut record, r);
    put(&mut record, r, &["n_boot"]);
    record.insert("dropna", r.get("dropna").as_bool().unwrap_or(true));
    record
}

pub fn assemble_residplot(r: &Resolved) -> ParamRecord {
    let mut record = ParamRecord::new();
    put_axes(&mut record, r);
    record.insert("x_partial", r.non_empty_list("x_partial"));
    record.insert("y_partial", r.non_empty_list("y_partial"));
    put(
        &mut record,
        r,
        &["lowess", "order", "robust", "dropna", "color"],
    );
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartKind;

    fn make_dataset() -> Dataset {
        Dataset::from_rows(
            vec!["total".into(), "tip".into(), "day".into()],
            vec![
                vec!["10".into(), "1.5".into(), "Thu".into()],
                vec!["20".into(), "3".into(), "Fri".into()],
            ],
        )
    }

    #[test]
    fn test_row_facet_hidden_by_col_facet() {
        let ds = make_dataset();
        let mut inputs = Inputs::new();
        inputs.insert("use_row".into(), ParamValue::Bool(true));
        inputs.insert("row".into(), ParamValue::text("day"));
        let (_, record) = build_record(ChartKind::Lmplot, &inputs, &ds);
        assert_eq!(record.get("row"), &ParamValue::text("day"));

        inputs.insert("use_col".into(), ParamValue::Bool(true));
        let (resolved, record) = build_record(ChartKind::Lmplot, &inputs, &ds);
        assert!(!resolved.is_visible("row"));
        assert!(record.get("row").is_null());
        assert_eq!(record.get("col"), &ParamValue::text("total"));
    }

    #[test]
    fn test_fit_off_neutralizes_options() {
        let ds = make_dataset();
        let mut inputs = Inputs::new();
        inputs.insert("fit_reg".into(), ParamValue::Bool(false));
        inputs.insert("lowess".into(), ParamValue::Bool(true));
        let (_, record) = build_record(ChartKind::Regplot, &inputs, &ds);
        assert_eq!(record.get("lowess"), &ParamValue::Bool(false));
        assert_eq!(record.get("truncate"), &ParamValue::Bool(true));
        assert!(record.get("ci").is_null());
    }

    #[test]
    fn test_zero_bins_means_none() {
        let ds = make_dataset();
        let (_, record) = build_record(ChartKind::Regplot, &Inputs::new(), &ds);
        assert!(record.get("x_bins").is_null());
        assert!(record.get("x_estimator").is_null());
        assert_eq!(record.get("marker"), &ParamValue::text("o"));
    }

    #[test]
    fn test_partials_gated() {
        let ds = make_dataset();
        let mut inputs = Inputs::new();
        inputs.insert("x_partial".into(), ParamValue::List(vec!["day".into()]));
        let (_, record) = build_record(ChartKind::Residplot, &inputs, &ds);
        assert!(record.get("x_partial").is_null());
        inputs.insert("use_x_partial".into(), ParamValue::Bool(true));
        let (_, record) = build_record(ChartKind::Residplot, &inputs, &ds);
        assert_eq!(record.get("x_partial"), &ParamValue::List(vec!["day".into()]));
    }
}
