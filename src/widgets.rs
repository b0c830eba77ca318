//! Declarative form widgets: what a panel offers, what a user may enter, and
//! when each option is visible.

use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use crate::data::Dataset;
use crate::error::SessionError;
use crate::palette;
use crate::params::ParamValue;
use crate::parser;

/// Raw values entered by the user for one chart, keyed by widget name.
pub type Inputs = HashMap<String, ParamValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetKind {
    /// Column select defaulting to the n-th column when it exists.
    Column { nth: usize },
    /// Column select with a leading "None" entry.
    OptionalColumn,
    Choice {
        options: &'static [&'static str],
        default: usize,
    },
    Radio {
        options: &'static [&'static str],
        default: usize,
    },
    /// Multiselect over the sorted levels of the column chosen by `of`.
    Levels { of: &'static str },
    /// Multiselect over column names.
    Columns,
    Checkbox { default: bool },
    Slider {
        min: f64,
        max: f64,
        default: Option<f64>,
        integer: bool,
    },
    Number {
        min: f64,
        max: f64,
        default: Option<f64>,
        integer: bool,
    },
    Text { default: &'static str },
    Color { default: &'static str },
}

/// Visibility rule, evaluated against widgets declared earlier in the panel.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Always,
    Toggle(&'static str),
    NotToggle(&'static str),
    IsSet(&'static str),
    OneOf(&'static str, &'static [&'static str]),
    All(Vec<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: WidgetKind,
    pub visible: Condition,
}

impl Widget {
    fn new(key: &'static str, label: &'static str, kind: WidgetKind) -> Self {
        Self {
            key,
            label,
            kind,
            visible: Condition::Always,
        }
    }

    pub fn column(key: &'static str, label: &'static str, nth: usize) -> Self {
        Self::new(key, label, WidgetKind::Column { nth })
    }

    pub fn optional_column(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, WidgetKind::OptionalColumn)
    }

    pub fn choice(
        key: &'static str,
        label: &'static str,
        options: &'static [&'static str],
        default: usize,
    ) -> Self {
        Self::new(key, label, WidgetKind::Choice { options, default })
    }

    pub fn radio(
        key: &'static str,
        label: &'static str,
        options: &'static [&'static str],
        default: usize,
    ) -> Self {
        Self::new(key, label, WidgetKind::Radio { options, default })
    }

    pub fn levels(key: &'static str, label: &'static str, of: &'static str) -> Self {
        Self::new(key, label, WidgetKind::Levels { of })
    }

    pub fn columns(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, WidgetKind::Columns)
    }

    pub fn checkbox(key: &'static str, label: &'static str, default: bool) -> Self {
        Self::new(key, label, WidgetKind::Checkbox { default })
    }

    pub fn slider(
        key: &'static str,
        label: &'static str,
        min: f64,
        max: f64,
        default: Option<f64>,
    ) -> Self {
        Self::new(
            key,
            label,
            WidgetKind::Slider {
                min,
                max,
                default,
                integer: false,
            },
        )
    }

    pub fn int_slider(key: &'static str, label: &'static str, min: i64, max: i64, default: i64) -> Self {
        Self::new(
            key,
            label,
            WidgetKind::Slider {
                min: min as f64,
                max: max as f64,
                default: Some(default as f64),
                integer: true,
            },
        )
    }

    pub fn number(
        key: &'static str,
        label: &'static str,
        min: f64,
        max: f64,
        default: Option<f64>,
    ) -> Self {
        Self::new(
            key,
            label,
            WidgetKind::Number {
                min,
                max,
                default,
                integer: false,
            },
        )
    }

    pub fn int_number(
        key: &'static str,
        label: &'static str,
        min: i64,
        max: i64,
        default: Option<i64>,
    ) -> Self {
        Self::new(
            key,
            label,
            WidgetKind::Number {
                min: min as f64,
                max: max as f64,
                default: default.map(|d| d as f64),
                integer: true,
            },
        )
    }

    pub fn text(key: &'static str, label: &'static str, default: &'static str) -> Self {
        Self::new(key, label, WidgetKind::Text { default })
    }

    pub fn color(key: &'static str, label: &'static str, default: &'static str) -> Self {
        Self::new(key, label, WidgetKind::Color { default })
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.visible = condition;
        self
    }

    /// Initial value before any user input.
    pub fn default_value(&self, dataset: &Dataset) -> ParamValue {
        match &self.kind {
            WidgetKind::Column { nth } => {
                let headers = dataset.headers();
                let idx = if headers.len() > *nth { *nth } else { 0 };
                headers
                    .get(idx)
                    .map(|h| ParamValue::text(*h))
                    .unwrap_or(ParamValue::Null)
            }
            WidgetKind::OptionalColumn => ParamValue::Null,
            WidgetKind::Choice { options, default } | WidgetKind::Radio { options, default } => {
                options
                    .get(*default)
                    .map(|o| option_value(o))
                    .unwrap_or(ParamValue::Null)
            }
            WidgetKind::Levels { .. } | WidgetKind::Columns => ParamValue::List(Vec::new()),
            WidgetKind::Checkbox { default } => ParamValue::Bool(*default),
            WidgetKind::Slider { default, integer, .. }
            | WidgetKind::Number { default, integer, .. } => match default {
                Some(d) if *integer => ParamValue::Int(*d as i64),
                Some(d) => ParamValue::Float(*d),
                None => ParamValue::Null,
            },
            WidgetKind::Text { default } | WidgetKind::Color { default } => {
                ParamValue::text(*default)
            }
        }
    }

    /// Check a user-supplied value against this widget's domain and return
    /// its canonical form.
    pub fn validate(
        &self,
        value: &ParamValue,
        dataset: &Dataset,
        resolved: &Resolved,
    ) -> Result<ParamValue, SessionError> {
        let reject = |reason: &str| SessionError::OutOfDomain {
            key: self.key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match &self.kind {
            WidgetKind::Column { .. } | WidgetKind::OptionalColumn => {
                if value.is_null() {
                    return match self.kind {
                        WidgetKind::OptionalColumn => Ok(ParamValue::Null),
                        _ => Err(reject("a column is required")),
                    };
                }
                let name = scalar_text(value).ok_or_else(|| reject("expected a column name"))?;
                dataset
                    .column(&name)
                    .map(|c| ParamValue::text(c.name()))
                    .ok_or_else(|| reject("no such column"))
            }
            WidgetKind::Choice { options, .. } | WidgetKind::Radio { options, .. } => {
                let wanted = normalize_choice(value);
                options
                    .iter()
                    .map(|o| option_value(o))
                    .find(|candidate| choice_matches(candidate, &wanted))
                    .ok_or_else(|| reject(&format!("expected one of {}", options.join(", "))))
            }
            WidgetKind::Levels { of } => {
                let items = list_items(value).ok_or_else(|| reject("expected a list"))?;
                let levels = resolved
                    .text(of)
                    .and_then(|col| dataset.column(col))
                    .map(|c| c.sorted_levels());
                if let Some(levels) = levels {
                    if let Some(bad) = items.iter().find(|i| !levels.contains(i)) {
                        return Err(reject(&format!("'{}' is not a level of {}", bad, of)));
                    }
                }
                Ok(ParamValue::List(items))
            }
            WidgetKind::Columns => {
                let items = list_items(value).ok_or_else(|| reject("expected a list of columns"))?;
                let mut canonical = Vec::with_capacity(items.len());
                for item in items {
                    let column = dataset
                        .column(&item)
                        .ok_or_else(|| reject(&format!("no such column '{}'", item)))?;
                    canonical.push(column.name().to_string());
                }
                Ok(ParamValue::List(canonical))
            }
            WidgetKind::Checkbox { .. } => match value {
                ParamValue::Bool(b) => Ok(ParamValue::Bool(*b)),
                ParamValue::Text(t) => match t.to_ascii_lowercase().as_str() {
                    "true" | "yes" | "on" => Ok(ParamValue::Bool(true)),
                    "false" | "no" | "off" => Ok(ParamValue::Bool(false)),
                    _ => Err(reject("expected true or false")),
                },
                _ => Err(reject("expected true or false")),
            },
            WidgetKind::Slider {
                min,
                max,
                default,
                integer,
            }
            | WidgetKind::Number {
                min,
                max,
                default,
                integer,
            } => {
                if value.is_null() && default.is_none() {
                    return Ok(ParamValue::Null);
                }
                let number = match value {
                    ParamValue::Text(t) => t.trim().parse::<f64>().ok(),
                    other => other.as_f64(),
                }
                .filter(|n| n.is_finite())
                .ok_or_else(|| reject("expected a number"))?;
                if number < *min || number > *max {
                    return Err(reject(&format!("must be between {} and {}", min, max)));
                }
                if *integer {
                    if number.fract() != 0.0 {
                        return Err(reject("expected a whole number"));
                    }
                    Ok(ParamValue::Int(number as i64))
                } else {
                    Ok(ParamValue::Float(number))
                }
            }
            WidgetKind::Text { .. } => match value {
                ParamValue::Null => Ok(ParamValue::text("")),
                ParamValue::List(items) => Ok(ParamValue::Text(items.join(","))),
                other => scalar_text(other)
                    .map(ParamValue::Text)
                    .ok_or_else(|| reject("expected text")),
            },
            WidgetKind::Color { .. } => {
                let text = scalar_text(value).ok_or_else(|| reject("expected a color"))?;
                if palette::parse_color(&text).is_some() {
                    Ok(ParamValue::Text(text))
                } else {
                    Err(reject("unrecognized color"))
                }
            }
        }
    }

    /// Human readable domain, used by the `widgets` listing.
    pub fn domain(&self) -> String {
        match &self.kind {
            WidgetKind::Column { .. } => "column".to_string(),
            WidgetKind::OptionalColumn => "column or None".to_string(),
            WidgetKind::Choice { options, .. } | WidgetKind::Radio { options, .. } => {
                format!("one of {}", options.join(" | "))
            }
            WidgetKind::Levels { of } => format!("levels of {}", of),
            WidgetKind::Columns => "list of columns".to_string(),
            WidgetKind::Checkbox { .. } => "true | false".to_string(),
            WidgetKind::Slider {
                min,
                max,
                default,
                ..
            }
            | WidgetKind::Number {
                min,
                max,
                default,
                ..
            } => {
                let optional = if default.is_none() { " or None" } else { "" };
                format!("{}..{}{}", min, max, optional)
            }
            WidgetKind::Text { .. } => "text".to_string(),
            WidgetKind::Color { .. } => "color".to_string(),
        }
    }
}

/// Value a choice option stands for: "None" is Null, "True"/"False" are
/// booleans, integers are integers.
pub fn option_value(option: &str) -> ParamValue {
    match option {
        "None" => ParamValue::Null,
        "True" => ParamValue::Bool(true),
        "False" => ParamValue::Bool(false),
        other => match other.parse::<i64>() {
            Ok(i) => ParamValue::Int(i),
            Err(_) => ParamValue::text(other),
        },
    }
}

fn normalize_choice(value: &ParamValue) -> ParamValue {
    match value {
        ParamValue::Text(t) if t.eq_ignore_ascii_case("none") => ParamValue::Null,
        ParamValue::Text(t) if t.eq_ignore_ascii_case("true") => ParamValue::Bool(true),
        ParamValue::Text(t) if t.eq_ignore_ascii_case("false") => ParamValue::Bool(false),
        ParamValue::Float(f) if f.fract() == 0.0 => ParamValue::Int(*f as i64),
        other => other.clone(),
    }
}

fn choice_matches(candidate: &ParamValue, wanted: &ParamValue) -> bool {
    match (candidate, wanted) {
        (ParamValue::Text(a), ParamValue::Text(b)) => a.eq_ignore_ascii_case(b),
        (a, b) => a == b,
    }
}

fn scalar_text(value: &ParamValue) -> Option<String> {
    match value {
        ParamValue::Text(t) => Some(t.clone()),
        ParamValue::Int(i) => Some(i.to_string()),
        ParamValue::Float(f) => Some(f.to_string()),
        ParamValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn list_items(value: &ParamValue) -> Option<Vec<String>> {
    match value {
        ParamValue::Null => Some(Vec::new()),
        ParamValue::List(items) => Some(items.clone()),
        other => scalar_text(other).map(|t| vec![t]),
    }
}

impl Condition {
    fn holds(&self, resolved: &Resolved) -> bool {
        match self {
            Condition::Always => true,
            Condition::Toggle(key) => resolved.get(key).as_bool() == Some(true),
            Condition::NotToggle(key) => resolved.get(key).as_bool() == Some(false),
            Condition::IsSet(key) => match resolved.get(key) {
                ParamValue::Null => false,
                ParamValue::Text(t) => !t.is_empty(),
                ParamValue::List(items) => !items.is_empty(),
                _ => true,
            },
            Condition::OneOf(key, values) => match resolved.get(key) {
                ParamValue::Text(t) => values.iter().any(|v| v == t),
                ParamValue::Bool(b) => values.contains(&if *b { "True" } else { "False" }),
                _ => false,
            },
            Condition::All(conditions) => conditions.iter().all(|c| c.holds(resolved)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWidget {
    pub key: &'static str,
    pub value: ParamValue,
    pub visible: bool,
}

/// A panel after applying user inputs, defaults and visibility rules.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolved {
    entries: Vec<ResolvedWidget>,
}

impl Resolved {
    pub fn get(&self, key: &str) -> &ParamValue {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.value)
            .unwrap_or(&ParamValue::Null)
    }

    pub fn is_visible(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key && e.visible)
    }

    pub fn toggle(&self, key: &str) -> bool {
        self.get(key).as_bool().unwrap_or(false)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).as_str().filter(|t| !t.is_empty())
    }

    /// Multiselect value, Null when nothing is selected.
    pub fn non_empty_list(&self, key: &str) -> ParamValue {
        match self.get(key) {
            ParamValue::List(items) if !items.is_empty() => ParamValue::List(items.clone()),
            _ => ParamValue::Null,
        }
    }

    pub fn entries(&self) -> &[ResolvedWidget] {
        &self.entries
    }
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in self.entries.iter().filter(|e| e.visible) {
            writeln!(f, "{} = {}", entry.key, entry.value)?;
        }
        Ok(())
    }
}

/// Apply inputs to a widget list in declaration order. Hidden widgets
/// resolve to Null and any input given for them is ignored.
pub fn resolve(widgets: &[Widget], inputs: &Inputs, dataset: &Dataset) -> Resolved {
    let mut resolved = Resolved::default();
    for widget in widgets {
        let visible = widget.visible.holds(&resolved);
        let value = if !visible {
            if inputs.contains_key(widget.key) {
                warn!(widget = widget.key, "ignoring value for hidden widget");
            }
            ParamValue::Null
        } else {
            inputs
                .get(widget.key)
                .cloned()
                .unwrap_or_else(|| widget.default_value(dataset))
        };
        resolved.entries.push(ResolvedWidget {
            key: widget.key,
            value,
            visible,
        });
    }
    resolved
}

/// Parse free text such as `"0,100"` into a pair of finite bounds. Anything
/// else means "no constraint".
pub fn parse_range(text: &str) -> Option<(f64, f64)> {
    parser::parse_pair(text)
}

/// Integer size range with a chart-specific fallback.
pub fn parse_size_range(text: &str, fallback: (f64, f64)) -> (f64, f64) {
    match parse_range(text) {
        Some((lo, hi)) if lo.fract() == 0.0 && hi.fract() == 0.0 => (lo, hi),
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_dataset() -> Dataset {
        Dataset::from_rows(
            vec!["a".into(), "b".into(), "group".into()],
            vec![
                vec!["1".into(), "2".into(), "x".into()],
                vec!["3".into(), "4".into(), "y".into()],
            ],
        )
    }

    fn make_widgets() -> Vec<Widget> {
        vec![
            Widget::column("x", "X-axis variable", 0),
            Widget::column("hue", "Hue variable", 5),
            Widget::checkbox("use_hue", "Use hue grouping", false),
            Widget::text("palette", "Color palette", "viridis").when(Condition::Toggle("use_hue")),
            Widget::levels("hue_order", "Hue order", "hue").when(Condition::Toggle("use_hue")),
            Widget::choice("errorbar", "Error bar", &["ci", "pi", "se", "sd", "None"], 0),
            Widget::int_slider("errorbar_level", "Level", 1, 99, 95)
                .when(Condition::OneOf("errorbar", &["ci", "pi"])),
            Widget::slider("linewidth", "Line width", 0.0, 5.0, None),
        ]
    }

    #[test]
    fn test_column_default_falls_back_to_first() {
        let ds = make_dataset();
        let resolved = resolve(&make_widgets(), &Inputs::new(), &ds);
        assert_eq!(resolved.text("x"), Some("a"));
        assert_eq!(resolved.text("hue"), Some("a"));
    }

    #[test]
    fn test_hidden_widget_is_null_and_input_ignored() {
        let ds = make_dataset();
        let mut inputs = Inputs::new();
        inputs.insert("palette".into(), ParamValue::text("rocket"));
        let resolved = resolve(&make_widgets(), &inputs, &ds);
        assert!(!resolved.is_visible("palette"));
        assert!(resolved.get("palette").is_null());

        inputs.insert("use_hue".into(), ParamValue::Bool(true));
        let resolved = resolve(&make_widgets(), &inputs, &ds);
        assert!(resolved.is_visible("palette"));
        assert_eq!(resolved.text("palette"), Some("rocket"));
    }

    #[test]
    fn test_one_of_condition() {
        let ds = make_dataset();
        let mut inputs = Inputs::new();
        let resolved = resolve(&make_widgets(), &inputs, &ds);
        assert_eq!(resolved.get("errorbar_level"), &ParamValue::Int(95));

        inputs.insert("errorbar".into(), ParamValue::text("sd"));
        let resolved = resolve(&make_widgets(), &inputs, &ds);
        assert!(resolved.get("errorbar_level").is_null());
    }

    #[test]
    fn test_validate_choice() {
        let ds = make_dataset();
        let widgets = make_widgets();
        let resolved = resolve(&widgets, &Inputs::new(), &ds);
        let errorbar = &widgets[5];
        assert_eq!(
            errorbar.validate(&ParamValue::text("SE"), &ds, &resolved).unwrap(),
            ParamValue::text("se")
        );
        assert_eq!(
            errorbar.validate(&ParamValue::Null, &ds, &resolved).unwrap(),
            ParamValue::Null
        );
        assert!(errorbar.validate(&ParamValue::text("iqr"), &ds, &resolved).is_err());
    }

    #[test]
    fn test_validate_numbers() {
        let ds = make_dataset();
        let widgets = make_widgets();
        let resolved = resolve(&widgets, &Inputs::new(), &ds);
        let level = &widgets[6];
        assert_eq!(
            level.validate(&ParamValue::Int(90), &ds, &resolved).unwrap(),
            ParamValue::Int(90)
        );
        assert!(level.validate(&ParamValue::Int(100), &ds, &resolved).is_err());
        assert!(level.validate(&ParamValue::Float(9.5), &ds, &resolved).is_err());
        let linewidth = &widgets[7];
        assert_eq!(
            linewidth.validate(&ParamValue::Null, &ds, &resolved).unwrap(),
            ParamValue::Null
        );
    }

    #[test]
    fn test_validate_columns_and_levels() {
        let ds = make_dataset();
        let widgets = make_widgets();
        let mut inputs = Inputs::new();
        inputs.insert("use_hue".into(), ParamValue::Bool(true));
        inputs.insert("hue".into(), ParamValue::text("group"));
        let resolved = resolve(&widgets, &inputs, &ds);

        assert_eq!(
            widgets[0].validate(&ParamValue::text("B"), &ds, &resolved).unwrap(),
            ParamValue::text("b")
        );
        assert!(widgets[0].validate(&ParamValue::text("zzz"), &ds, &resolved).is_err());

        let order = ParamValue::List(vec!["y".into(), "x".into()]);
        assert_eq!(widgets[4].validate(&order, &ds, &resolved).unwrap(), order);
        let bad = ParamValue::List(vec!["q".into()]);
        assert!(widgets[4].validate(&bad, &ds, &resolved).is_err());
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("0,100"), Some((0.0, 100.0)));
        assert_eq!(parse_range(" 0.5 , 2 "), Some((0.5, 2.0)));
        assert_eq!(parse_range("abc"), None);
        assert_eq!(parse_range("5"), None);
        assert_eq!(parse_range("1,2,3"), None);
        assert_eq!(parse_range(""), None);
    }

    #[test]
    fn test_parse_size_range_fallback() {
        assert_eq!(parse_size_range("2,8", (10.0, 100.0)), (2.0, 8.0));
        assert_eq!(parse_size_range("abc", (10.0, 100.0)), (10.0, 100.0));
        assert_eq!(parse_size_range("1.5,3", (1.0, 5.0)), (1.0, 5.0));
    }
}
