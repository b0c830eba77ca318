use super::*;

const CATPLOT_KINDS: &[&str] = &[
    "strip", "swarm", "box", "violin", "boxen", "point", "bar", "count",
];

fn hue_dodge_toggle() -> Widget {
    Widget::checkbox("dodge", "Dodge hue levels", false).when(Condition::Toggle("use_hue"))
}

fn hue_dodge_choice() -> Widget {
    Widget::choice("dodge", "Dodge hue levels", DODGE_OPTIONS, 0).when(Condition::Toggle("use_hue"))
}

pub fn strip() -> Vec<Widget> {
    let mut w = axes();
    w.extend(hue_block());
    w.extend([
        Widget::slider("jitter", "Jitter amount", 0.0, 1.0, Some(0.4)),
        hue_dodge_toggle(),
        Widget::int_slider("size", "Marker size", 1, 20, 5),
        Widget::int_slider("linewidth", "Edge line width", 0, 5, 0),
        Widget::color("edgecolor", "Edge color", "gray"),
    ]);
    w.extend(log_and_color());
    w
}

pub fn swarm() -> Vec<Widget> {
    let mut w = axes();
    w.extend(hue_block());
    w.extend([
        hue_dodge_toggle(),
        Widget::int_slider("size", "Marker size", 1, 20, 5),
        Widget::int_slider("linewidth", "Edge line width", 0, 5, 0),
        Widget::color("edgecolor", "Edge color", "#00FFAA"),
    ]);
    w.extend(log_and_color());
    w
}

pub fn boxplot() -> Vec<Widget> {
    let mut w = axes();
    w.extend(hue_block());
    w.extend([
        Widget::slider("saturation", "Saturation", 0.0, 1.0, Some(0.75)),
        Widget::checkbox("fill", "Fill boxes", true),
        hue_dodge_choice(),
        Widget::slider("width", "Width", 0.1, 1.0, Some(0.8)),
        Widget::slider("gap", "Gap", 0.0, 1.0, Some(0.0)),
        Widget::slider("whis", "Whisker length", 0.0, 5.0, Some(1.5)),
        Widget::slider("linewidth", "Line width", 0.0, 5.0, None),
        Widget::slider("fliersize", "Outlier size", 0.0, 10.0, None),
    ]);
    w.extend(log_and_color());
    w
}

pub fn violin() -> Vec<Widget> {
    let mut w = axes();
    w.extend(hue_block());
    w.extend([
        Widget::slider("saturation", "Saturation", 0.0, 1.0, Some(0.75)),
        Widget::checkbox("fill", "Fill violins", true),
        Widget::choice(
            "inner",
            "Inner plot",
            &["box", "quart", "point", "stick", "None"],
            0,
        ),
        Widget::checkbox("split", "Split violins", false).when(Condition::Toggle("use_hue")),
        Widget::slider("width", "Width", 0.1, 1.0, Some(0.8)),
        hue_dodge_choice(),
        Widget::slider("gap", "Gap", 0.0, 1.0, Some(0.0)),
        Widget::slider("linewidth", "Line width", 0.0, 5.0, None),
        Widget::slider("cut", "Cut", 0.0, 5.0, Some(2.0)),
        Widget::int_number("gridsize", "Grid size", 10, 2000, Some(100)),
        Widget::choice("bw_method", "Bandwidth method", &["scott", "silverman"], 0),
        Widget::slider("bw_adjust", "Bandwidth adjust", 0.1, 5.0, Some(1.0)),
        Widget::choice("density_norm", "Density norm", &["area", "count", "width"], 0),
        Widget::checkbox("common_norm", "Common norm", false),
    ]);
    w.extend(log_and_color());
    w
}

pub fn boxen() -> Vec<Widget> {
    let mut w = axes();
    w.push(Widget::choice("orient", "Orientation", ORIENTATIONS, 0));
    w.extend(hue_block());
    w.extend([
        Widget::choice("dodge", "Dodge", DODGE_OPTIONS, 0).when(Condition::Toggle("use_hue")),
        Widget::slider("saturation", "Color saturation", 0.0, 1.0, Some(0.75))
            .when(Condition::Toggle("use_hue")),
        Widget::levels("order", "Category order", "x"),
        Widget::checkbox("fill", "Fill boxes", true),
        Widget::slider("width", "Element width", 0.1, 2.0, Some(0.8)),
        Widget::slider("gap", "Gap between elements", 0.0, 1.0, Some(0.0)),
        Widget::slider("linewidth", "Line width", 0.5, 5.0, Some(1.5)),
        Widget::color("linecolor", "Line color", "#333333"),
        Widget::choice(
            "width_method",
            "Width method",
            &["exponential", "linear", "area"],
            0,
        ),
        Widget::choice(
            "k_depth",
            "Depth method",
            &["tukey", "proportion", "trustworthy", "full"],
            0,
        ),
        Widget::checkbox("showfliers", "Show outliers", true),
        Widget::slider("outlier_prop", "Outlier proportion", 0.001, 0.1, Some(0.007)),
        Widget::slider("trust_alpha", "Trust alpha", 0.01, 0.5, Some(0.05)),
        Widget::checkbox("log_scale", "Log scale", false),
        Widget::checkbox("native_scale", "Native scale", false),
        Widget::color("color", "Base color", "#1f77b4"),
    ]);
    w
}

pub fn point() -> Vec<Widget> {
    let mut w = axes();
    w.extend(hue_block());
    w.extend(estimator_block(false));
    w.extend([
        hue_dodge_toggle(),
        Widget::slider("capsize", "Error bar cap size", 0.0, 0.5, Some(0.0)),
    ]);
    w.extend(log_and_color());
    w
}

pub fn bar() -> Vec<Widget> {
    let mut w = axes();
    w.extend(hue_block());
    w.extend(estimator_block(false));
    w.extend([
        hue_dodge_choice(),
        Widget::slider("capsize", "Error bar cap size", 0.0, 0.5, Some(0.0)),
        Widget::slider("width", "Bar width", 0.1, 1.0, Some(0.8)),
        Widget::slider("saturation", "Color saturation", 0.0, 1.0, Some(0.75)),
        Widget::checkbox("fill", "Fill bars", true),
    ]);
    w.extend(log_and_color());
    w
}

pub fn count() -> Vec<Widget> {
    let mut w = axes();
    w.push(Widget::choice("orient", "Orientation", ORIENTATIONS, 0));
    w.extend(hue_block());
    w.extend([
        Widget::choice("dodge", "Dodge", DODGE_OPTIONS, 0).when(Condition::Toggle("use_hue")),
        Widget::levels("order", "Category order", "x"),
        Widget::choice(
            "stat",
            "Statistic",
            &["count", "percent", "proportion", "probability"],
            0,
        ),
        Widget::slider("width", "Bar width", 0.1, 1.0, Some(0.8)),
        Widget::slider("saturation", "Color saturation", 0.0, 1.0, Some(0.75)),
        Widget::checkbox("fill", "Fill bars", true),
        Widget::checkbox("log_scale", "Log scale", false),
        Widget::checkbox("native_scale", "Native scale", false),
        Widget::color("color", "Base color", "#1f77b4"),
    ]);
    w
}

pub fn catplot() -> Vec<Widget> {
    let mut w = vec![
        Widget::column("x", "X-axis variable", 0),
        Widget::optional_column("y", "Y-axis variable"),
        Widget::choice("kind", "Plot kind", CATPLOT_KINDS, 0),
    ];
    w.extend(hue_block());
    w.extend(facet_block());
    let aggregating = Condition::OneOf("kind", &["point", "bar"]);
    w.extend(estimator_block(false).into_iter().map(|widget| {
        let visible = match widget.visible {
            Condition::Always => aggregating.clone(),
            other => Condition::All(vec![aggregating.clone(), other]),
        };
        Widget { visible, ..widget }
    }));
    w.extend(size_params());
    w.push(Widget::color("color", "Base color", "#1f77b4"));
    w
}

fn base(r: &Resolved) -> ParamRecord {
    let mut record = ParamRecord::new();
    put_axes(&mut record, r);
    put_hue(&mut record, r);
    record
}

pub fn assemble_strip(r: &Resolved) -> ParamRecord {
    let mut record = base(r);
    put(&mut record, r, &["jitter"]);
    put_dodge(&mut record, r);
    put(
        &mut record,
        r,
        &["size", "linewidth", "edgecolor", "log_scale", "color"],
    );
    record
}

pub fn assemble_swarm(r: &Resolved) -> ParamRecord {
    let mut record = base(r);
    put_dodge(&mut record, r);
    put(
        &mut record,
        r,
        &["size", "linewidth", "edgecolor", "log_scale", "color"],
    );
    record
}

pub fn assemble_box(r: &Resolved) -> ParamRecord {
    let mut record = base(r);
    put(&mut record, r, &["saturation", "fill"]);
    put_dodge(&mut record, r);
    put(
        &mut record,
        r,
        &["width", "gap", "whis", "linewidth", "fliersize", "log_scale", "color"],
    );
    record
}

pub fn assemble_violin(r: &Resolved) -> ParamRecord {
    let mut record = base(r);
    put(&mut record, r, &["saturation", "fill", "inner"]);
    record.insert("split", ParamValue::Bool(r.toggle("split")));
    put(&mut record, r, &["width"]);
    put_dodge(&mut record, r);
    put(
        &mut record,
        r,
        &[
            "gap",
            "linewidth",
            "cut",
            "gridsize",
            "bw_method",
            "bw_adjust",
            "density_norm",
            "common_norm",
            "log_scale",
            "color",
        ],
    );
    record
}

pub fn assemble_boxen(r: &Resolved) -> ParamRecord {
    let mut record = base(r);
    record.insert("order", r.non_empty_list("order"));
    put(&mut record, r, &["orient"]);
    put_dodge(&mut record, r);
    record.insert("saturation", gated(r, "use_hue", "saturation"));
    put(
        &mut record,
        r,
        &[
            "fill",
            "width",
            "gap",
            "linewidth",
            "linecolor",
            "width_method",
            "k_depth",
            "showfliers",
            "outlier_prop",
            "trust_alpha",
            "log_scale",
            "native_scale",
            "color",
        ],
    );
    record
}

pub fn assemble_point(r: &Resolved) -> ParamRecord {
    let mut record = base(r);
    put_estimator(&mut record, r);
    put_dodge(&mut record, r);
    put(&mut record, r, &["capsize", "log_scale", "color"]);
    record
}

pub fn assemble_bar(r: &Resolved) -> ParamRecord {
    let mut record = base(r);
    put_estimator(&mut record, r);
    put_dodge(&mut record, r);
    put(
        &mut record,
        r,
        &["capsize", "width", "saturation", "fill", "log_scale", "color"],
    );
    record
}

pub fn assemble_count(r: &Resolved) -> ParamRecord {
    let orient = r.text("orient").unwrap_or("v");
    let vertical = matches!(orient, "v" | "x");
    let mut record = ParamRecord::new();
    record.insert(
        "x",
        if vertical { r.get("x").clone() } else { ParamValue::Null },
    );
    record.insert(
        "y",
        if vertical { ParamValue::Null } else { r.get("y").clone() },
    );
    put_hue(&mut record, r);
    record.insert("order", r.non_empty_list("order"));
    put(&mut record, r, &["orient"]);
    put_dodge(&mut record, r);
    put(
        &mut record,
        r,
        &["stat", "width", "saturation", "fill", "log_scale", "native_scale", "color"],
    );
    record
}

pub fn assemble_catplot(r: &Resolved) -> ParamRecord {
    let mut record = base(r);
    put(&mut record, r, &["kind"]);
    put_facets(&mut record, r);
    put_estimator(&mut record, r);
    put(&mut record, r, &["height", "aspect", "color"]);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartKind;

    fn make_dataset() -> Dataset {
        Dataset::from_rows(
            vec!["day".into(), "total".into(), "smoker".into()],
            vec![
                vec!["Thu".into(), "10.5".into(), "Yes".into()],
                vec!["Fri".into(), "20.1".into(), "No".into()],
            ],
        )
    }

    #[test]
    fn test_estimator_only_for_aggregating_kinds() {
        let ds = make_dataset();
        let (resolved, record) = build_record(ChartKind::Catplot, &Inputs::new(), &ds);
        assert!(!resolved.is_visible("estimator"));
        assert!(record.get("estimator").is_null());

        let mut inputs = Inputs::new();
        inputs.insert("kind".into(), ParamValue::text("bar"));
        let (resolved, record) = build_record(ChartKind::Catplot, &inputs, &ds);
        assert!(resolved.is_visible("errorbar_level"));
        assert_eq!(record.get("estimator"), &ParamValue::text("mean"));
        assert_eq!(record.get("n_boot"), &ParamValue::Int(1000));
    }

    #[test]
    fn test_count_uses_axis_for_orientation() {
        let ds = make_dataset();
        let (_, record) = build_record(ChartKind::Count, &Inputs::new(), &ds);
        assert_eq!(record.get("x"), &ParamValue::text("day"));
        assert!(record.get("y").is_null());

        let mut inputs = Inputs::new();
        inputs.insert("orient".into(), ParamValue::text("h"));
        let (_, record) = build_record(ChartKind::Count, &inputs, &ds);
        assert!(record.get("x").is_null());
        assert_eq!(record.get("y"), &ParamValue::text("total"));
    }

    #[test]
    fn test_unset_sliders_stay_null() {
        let ds = make_dataset();
        let (_, record) = build_record(ChartKind::Box, &Inputs::new(), &ds);
        assert!(record.get("linewidth").is_null());
        assert!(record.get("fliersize").is_null());
        assert!(record.get("dodge").is_null());
        assert_eq!(record.get("whis"), &ParamValue::Float(1.5));
    }

    #[test]
    fn test_dodge_forwarded_with_hue() {
        let ds = make_dataset();
        let mut inputs = Inputs::new();
        inputs.insert("use_hue".into(), ParamValue::Bool(true));
        let (_, record) = build_record(ChartKind::Box, &inputs, &ds);
        assert_eq!(record.get("dodge"), &ParamValue::text("auto"));
        assert_eq!(record.get("hue"), &ParamValue::text("smoker"));
    }
}
