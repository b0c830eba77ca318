use super::*;

pub fn histogram() -> Vec<Widget> {
    let mut w = univariate_axes();
    w.extend(hue_block());
    w.extend([
        Widget::choice(
            "stat",
            "Statistic",
            &["count", "frequency", "probability", "percent", "density"],
            0,
        ),
        Widget::text("bins", "Number of bins", "auto"),
        Widget::number("binwidth", "Bin width (0 for auto)", 0.0, 1e12, Some(0.0)),
        Widget::checkbox("discrete", "Discrete bins", false),
        Widget::checkbox("cumulative", "Cumulative", false),
        Widget::checkbox("common_bins", "Common bins", true),
        Widget::checkbox("common_norm", "Common normalization", true),
        Widget::choice("multiple", "Multiple", &["layer", "dodge", "stack", "fill"], 0),
        Widget::choice("element", "Element", &["bars", "step", "poly"], 0),
        Widget::checkbox("fill", "Fill", true),
        Widget::slider("shrink", "Shrink", 0.1, 1.0, Some(1.0)),
        Widget::checkbox("kde", "Show KDE", false),
        Widget::checkbox("log_scale", "Log scale", false),
        Widget::checkbox("legend", "Show legend", true),
        Widget::color("color", "Base color", "#1f77b4"),
    ]);
    w
}

pub fn kde() -> Vec<Widget> {
    let mut w = univariate_axes();
    w.extend(hue_block());
    w.extend([
        Widget::checkbox("fill", "Fill", false),
        Widget::choice("multiple", "Multiple", &["layer", "stack", "fill"], 0),
        Widget::checkbox("common_norm", "Common normalization", true),
        Widget::checkbox("common_grid", "Common grid", false),
        Widget::checkbox("cumulative", "Cumulative", false),
        Widget::choice("bw_method", "Bandwidth method", &["scott", "silverman"], 0),
        Widget::slider("bw_adjust", "Bandwidth adjust", 0.1, 5.0, Some(1.0)),
        Widget::int_number("levels", "Contour levels", 1, 100, Some(10)),
        Widget::int_number("gridsize", "Grid size", 10, 2000, Some(200)),
        Widget::number("cut", "Cut", 0.0, 10.0, Some(3.0)),
        Widget::checkbox("log_scale", "Log scale", false),
        Widget::checkbox("legend", "Show legend", true),
        Widget::color("color", "Base color", "#1f77b4"),
    ]);
    w
}

pub fn ecdf() -> Vec<Widget> {
    let mut w = univariate_axes();
    w.extend(hue_block());
    w.extend([
        Widget::choice("stat", "Statistic", &["proportion", "percent", "count"], 0),
        Widget::checkbox("complementary", "Complementary", false),
        Widget::checkbox("log_scale", "Log scale", false),
        Widget::checkbox("legend", "Show legend", true),
        Widget::color("color", "Base color", "#1f77b4"),
    ]);
    w
}

pub fn displot() -> Vec<Widget> {
    let mut w = univariate_axes();
    w.push(Widget::radio("kind", "Plot kind", &["hist", "kde", "ecdf"], 0));
    w.extend(hue_block());
    w.extend(facet_block());
    w.extend([
        Widget::checkbox("rug", "Add rug", false),
        Widget::checkbox("log_scale", "Log scale", false),
    ]);
    w.extend(size_params());
    w.extend([
        Widget::checkbox("legend", "Show legend", true),
        Widget::color("color", "Base color", "#1f77b4"),
    ]);
    w
}

pub fn rug() -> Vec<Widget> {
    let mut w = univariate_axes();
    w.extend(hue_block());
    w.extend([
        Widget::slider("height", "Rug height", 0.001, 1.0, Some(0.025)),
        Widget::checkbox("expand_margins", "Expand margins", true),
        Widget::checkbox("legend", "Show legend", true),
        Widget::color("color", "Base color", "#1f77b4"),
    ]);
    w
}

/// Leading record shared by every distribution chart.
fn base(r: &Resolved) -> ParamRecord {
    let mut record = ParamRecord::new();
    put_axes(&mut record, r);
    put_hue(&mut record, r);
    record
}

pub fn assemble_histogram(r: &Resolved) -> ParamRecord {
    let mut record = base(r);
    put(&mut record, r, &["stat", "bins"]);
    let binwidth = match r.get("binwidth").as_f64() {
        Some(w) if w > 0.0 => ParamValue::Float(w),
        _ => ParamValue::Null,
    };
    record.insert("binwidth", binwidth);
    put(
        &mut record,
        r,
        &[
            "discrete",
            "cumulative",
            "common_bins",
            "common_norm",
            "multiple",
            "element",
            "fill",
            "shrink",
            "kde",
            "log_scale",
            "legend",
            "color",
        ],
    );
    record
}

pub fn assemble_kde(r: &Resolved) -> ParamRecord {
    let mut record = base(r);
    put(
        &mut record,
        r,
        &[
            "fill",
            "multiple",
            "common_norm",
            "common_grid",
            "cumulative",
            "bw_method",
            "bw_adjust",
            "levels",
            "gridsize",
            "cut",
            "log_scale",
            "legend",
            "color",
        ],
    );
    record
}

pub fn assemble_ecdf(r: &Resolved) -> ParamRecord {
    let mut record = base(r);
    put(
        &mut record,
        r,
        &["stat", "complementary", "log_scale", "legend", "color"],
    );
    record
}

pub fn assemble_displot(r: &Resolved) -> ParamRecord {
    let mut record = base(r);
    put(&mut record, r, &["kind"]);
    put_facets(&mut record, r);
    put(
        &mut record,
        r,
        &["rug", "log_scale", "legend", "color", "height", "aspect"],
    );
    record
}

pub fn assemble_rug(r: &Resolved) -> ParamRecord {
    let mut record = base(r);
    put(
        &mut record,
        r,
        &["height", "expand_margins", "legend", "color"],
    );
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartKind;

    fn make_dataset() -> Dataset {
        Dataset::from_rows(
            vec!["value".into(), "group".into()],
            vec![
                vec!["1".into(), "a".into()],
                vec!["2".into(), "b".into()],
            ],
        )
    }

    #[test]
    fn test_zero_binwidth_is_auto() {
        let ds = make_dataset();
        let (_, record) = build_record(ChartKind::Histogram, &Inputs::new(), &ds);
        assert!(record.get("binwidth").is_null());
        assert_eq!(record.get("bins"), &ParamValue::text("auto"));

        let mut inputs = Inputs::new();
        inputs.insert("binwidth".into(), ParamValue::Float(0.5));
        let (_, record) = build_record(ChartKind::Histogram, &inputs, &ds);
        assert_eq!(record.get("binwidth"), &ParamValue::Float(0.5));
    }

    #[test]
    fn test_optional_y_defaults_to_none() {
        let ds = make_dataset();
        let (_, record) = build_record(ChartKind::Kde, &Inputs::new(), &ds);
        assert_eq!(record.get("x"), &ParamValue::text("value"));
        assert!(record.get("y").is_null());
    }

    #[test]
    fn test_facet_order_needs_facet_variable() {
        let ds = make_dataset();
        let mut inputs = Inputs::new();
        inputs.insert("use_facets".into(), ParamValue::Bool(true));
        let (resolved, _) = build_record(ChartKind::Displot, &inputs, &ds);
        assert!(resolved.is_visible("col"));
        assert!(!resolved.is_visible("col_wrap"));

        inputs.insert("col".into(), ParamValue::text("group"));
        let (resolved, record) = build_record(ChartKind::Displot, &inputs, &ds);
        assert!(resolved.is_visible("col_wrap"));
        assert_eq!(record.get("col_wrap"), &ParamValue::Int(3));
        assert_eq!(record.get("col"), &ParamValue::text("group"));
    }
}
