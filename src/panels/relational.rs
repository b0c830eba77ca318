use super::*;

pub fn scatter() -> Vec<Widget> {
    let mut w = axes();
    w.extend(hue_block());
    w.extend(size_block("10,100"));
    w.extend(style_block(false));
    w.push(Widget::choice("legend", "Legend type", LEGEND_OPTIONS, 0));
    w
}

pub fn line() -> Vec<Widget> {
    let mut w = axes();
    w.extend(hue_block());
    w.extend(size_block("1,5"));
    w.extend(style_block(true));
    w.push(Widget::optional_column("units", "Units variable (optional)"));
    w.extend(estimator_block(true));
    w.push(Widget::checkbox("sort", "Sort lines", true));
    w.push(Widget::radio("err_style", "Error style", &["band", "bars"], 0));
    w.push(Widget::choice("legend", "Legend type", LEGEND_OPTIONS, 0));
    w
}

pub fn relplot() -> Vec<Widget> {
    let mut w = axes();
    w.push(Widget::radio("kind", "Plot kind", &["scatter", "line"], 0));
    w.extend(hue_block());
    // The range text is left blank so the fallback can follow the plot kind.
    w.extend(size_block(""));
    w.extend(style_block(true));
    w.extend(facet_block());
    w.push(Widget::optional_column("units", "Units variable (optional)"));
    w.extend(size_params());
    w.push(Widget::choice("legend", "Legend type", LEGEND_OPTIONS, 0));
    w
}

pub fn assemble_scatter(r: &Resolved) -> ParamRecord {
    let mut record = ParamRecord::new();
    put_axes(&mut record, r);
    put_hue(&mut record, r);
    put_size(&mut record, r, (10.0, 100.0));
    put_style(&mut record, r, ParamValue::Bool(true));
    put(&mut record, r, &["legend"]);
    record
}

pub fn assemble_line(r: &Resolved) -> ParamRecord {
    let mut record = ParamRecord::new();
    put_axes(&mut record, r);
    put_hue(&mut record, r);
    put_size(&mut record, r, (1.0, 5.0));
    put_style(&mut record, r, ParamValue::Null);
    record.insert(
        "dashes",
        if r.toggle("use_style") {
            r.get("dashes").clone()
        } else {
            ParamValue::Bool(true)
        },
    );
    put(&mut record, r, &["units"]);
    put_estimator(&mut record, r);
    put(&mut record, r, &["sort", "err_style", "legend"]);
    record
}

pub fn assemble_relplot(r: &Resolved) -> ParamRecord {
    let line = r.text("kind") == Some("line");
    let mut record = ParamRecord::new();
    put_axes(&mut record, r);
    put(&mut record, r, &["kind"]);
    put_hue(&mut record, r);
    let fallback = if line { (1.0, 5.0) } else { (10.0, 100.0) };
    put_size(&mut record, r, fallback);
    put_style(&mut record, r, ParamValue::Null);
    record.insert(
        "dashes",
        if r.toggle("use_style") && line {
            r.get("dashes").clone()
        } else {
            ParamValue::Null
        },
    );
    put_facets(&mut record, r);
    put(&mut record, r, &["units", "height", "aspect", "legend"]);
    record
}
