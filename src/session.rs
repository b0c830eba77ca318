//! Interactive session: one dataset, the menu position, the widget inputs
//! entered for each chart and the figure cache. Every input line is one
//! interaction.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{Figure, SessionCache};
use crate::chart::{self, ChartFamily, ChartKind};
use crate::data::Dataset;
use crate::error::SessionError;
use crate::params::{ParamRecord, ParamValue};
use crate::parser::{self, Command};
use crate::router::Router;
use crate::widgets::{Inputs, Resolved};
use crate::{invoker, loader, panels, RenderOptions};

const HELP: &str = "\
Commands:
  load <path> [mime]     load a CSV or XLSX file
  family <name>          select a chart family
  chart <name>           select a chart
  set <key> = <value>    set a widget of the current chart
  unset <key>            restore a widget's default
  widgets                list the current chart's widgets
  record                 show the keyword record the chart will receive
  render [path]          draw the chart and write the figure
  view [path]            write the last figure drawn for the current chart
  preview [n]            show the first rows of the dataset
  menu                   show the chart menu
  help                   show this text
  quit                   leave the session
";

/// Whether the session keeps reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Default)]
pub struct Session {
    dataset: Option<Arc<Dataset>>,
    router: Router,
    inputs: HashMap<ChartKind, Inputs>,
    cache: SessionCache,
    options: RenderOptions,
}

impl Session {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn dataset(&self) -> Result<&Dataset, SessionError> {
        self.dataset.as_deref().ok_or(SessionError::NoDataset)
    }

    /// Replace the dataset. Widget inputs are kept; stale column choices
    /// surface as plot errors on the next render.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        self.dataset = Some(Arc::new(dataset));
    }

    /// Load a file; on failure the previous dataset stays in place.
    pub fn load(&mut self, path: &Path, mime: Option<&str>) -> Result<&Dataset, SessionError> {
        let dataset = loader::load_path(path, mime)?;
        info!(
            path = %path.display(),
            rows = dataset.n_rows(),
            columns = dataset.n_cols(),
            "dataset loaded"
        );
        self.set_dataset(dataset);
        self.dataset()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn chart(&self) -> ChartKind {
        self.router.chart()
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn select_family(&mut self, name: &str) -> Result<ChartFamily, SessionError> {
        self.router.select_family_by_name(name)
    }

    pub fn select_chart(&mut self, name: &str) -> Result<ChartKind, SessionError> {
        self.router.select_chart_by_name(name)
    }

    fn resolved(&self) -> Result<Resolved, SessionError> {
        let dataset = self.dataset()?;
        let kind = self.chart();
        let empty = Inputs::new();
        let inputs = self.inputs.get(&kind).unwrap_or(&empty);
        Ok(panels::build_record(kind, inputs, dataset).0)
    }

    /// Set a widget of the current chart. Returns whether the widget is
    /// currently visible; values for hidden widgets are validated and kept
    /// but ignored until their condition holds.
    pub fn set(&mut self, key: &str, value: ParamValue) -> Result<bool, SessionError> {
        let kind = self.chart();
        let widget = panels::find_widget(kind, key).ok_or_else(|| SessionError::UnknownWidget {
            chart: kind.to_string(),
            key: key.to_string(),
        })?;
        let resolved = self.resolved()?;
        let visible = resolved.is_visible(key);
        let value = widget.validate(&value, self.dataset()?, &resolved)?;
        if !visible {
            warn!(chart = %kind, widget = key, "widget is hidden; value ignored for now");
        }
        debug!(chart = %kind, widget = key, value = %value, "widget set");
        self.inputs.entry(kind).or_default().insert(key.to_string(), value);
        Ok(visible)
    }

    pub fn unset(&mut self, key: &str) -> Result<(), SessionError> {
        let kind = self.chart();
        if panels::find_widget(kind, key).is_none() {
            return Err(SessionError::UnknownWidget {
                chart: kind.to_string(),
                key: key.to_string(),
            });
        }
        if let Some(inputs) = self.inputs.get_mut(&kind) {
            inputs.remove(key);
        }
        Ok(())
    }

    /// Keyword record the current chart would be drawn with.
    pub fn record(&self) -> Result<ParamRecord, SessionError> {
        let dataset = self.dataset()?;
        let kind = self.chart();
        let empty = Inputs::new();
        let inputs = self.inputs.get(&kind).unwrap_or(&empty);
        Ok(panels::build_record(kind, inputs, dataset).1)
    }

    /// Draw the current chart and cache it. A failure leaves the cache as
    /// it was.
    pub fn render(&mut self) -> Result<&Figure, SessionError> {
        let record = self.record()?;
        let dataset = Arc::clone(self.dataset.as_ref().ok_or(SessionError::NoDataset)?);
        let figure = invoker::invoke(self.chart(), &record, &dataset, &self.options)?;
        Ok(self.cache.store(figure))
    }

    /// Last figure drawn for the current chart.
    pub fn view(&self) -> Option<&Figure> {
        let figure = self.cache.get(self.chart());
        if figure.is_some() {
            debug!(chart = %self.chart(), "cache hit");
        }
        figure
    }

    pub fn widgets_text(&self) -> Result<String, SessionError> {
        let kind = self.chart();
        let resolved = self.resolved()?;
        let mut out = format!("{} ({})\n", kind.title(), kind.function_name());
        for (widget, entry) in panels::widgets(kind).iter().zip(resolved.entries()) {
            let state = if entry.visible {
                entry.value.to_string()
            } else {
                "(hidden)".to_string()
            };
            out.push_str(&format!(
                "  {:<20} {:<34} {:<28} {}\n",
                widget.key,
                widget.label,
                widget.domain(),
                state
            ));
        }
        Ok(out)
    }

    pub fn preview_text(&self, n: usize) -> Result<String, SessionError> {
        let dataset = self.dataset()?;
        let mut out = dataset.headers().join("\t");
        out.push('\n');
        for row in dataset.head(n) {
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        out.push_str(&format!(
            "[{} rows x {} columns]\n",
            dataset.n_rows(),
            dataset.n_cols()
        ));
        Ok(out)
    }

    pub fn menu_text(&self) -> String {
        let current = self.chart();
        chart::menu_text()
            .lines()
            .map(|line| {
                let marked = line.trim_start().split_whitespace().next() == Some(current.short_name());
                if marked {
                    format!("> {}\n", line.trim_start())
                } else {
                    format!("{}\n", line)
                }
            })
            .collect()
    }

    /// Apply one command, writing any report to `out`.
    pub fn execute(&mut self, command: Command, out: &mut dyn Write) -> Result<Flow, SessionError> {
        match command {
            Command::Load { path, mime } => {
                let dataset = self.load(Path::new(&path), mime.as_deref())?;
                writeln!(
                    out,
                    "Loaded {} rows x {} columns from {}",
                    dataset.n_rows(),
                    dataset.n_cols(),
                    path
                )?;
            }
            Command::Family(name) => {
                let family = self.select_family(&name)?;
                writeln!(out, "{} -> {}", family.title(), self.chart().title())?;
            }
            Command::Chart(name) => {
                let kind = self.select_chart(&name)?;
                writeln!(out, "{} -> {}", kind.family().title(), kind.title())?;
            }
            Command::Set { key, value } => {
                if self.set(&key, value)? {
                    writeln!(out, "{} = {}", key, self.resolved()?.get(&key))?;
                } else {
                    writeln!(out, "{} is hidden; the value applies once it is shown", key)?;
                }
            }
            Command::Unset(key) => {
                self.unset(&key)?;
                writeln!(out, "{} restored to its default", key)?;
            }
            Command::Widgets => write!(out, "{}", self.widgets_text()?)?,
            Command::Record => write!(out, "{}", self.record()?)?,
            Command::Render(path) => {
                let figure = self.render()?;
                let written = write_figure(figure, path.as_deref())?;
                writeln!(
                    out,
                    "Wrote {} ({}x{}, {} bytes)",
                    written.display(),
                    figure.width,
                    figure.height,
                    figure.bytes.len()
                )?;
            }
            Command::View(path) => match self.view() {
                Some(figure) => {
                    let written = write_figure(figure, path.as_deref())?;
                    writeln!(out, "Wrote cached figure to {}", written.display())?;
                }
                None => writeln!(
                    out,
                    "No figure for {} yet (use `render`)",
                    self.chart().title()
                )?,
            },
            Command::Preview(n) => write!(out, "{}", self.preview_text(n.unwrap_or(5))?)?,
            Command::Menu => write!(out, "{}", self.menu_text())?,
            Command::Help => write!(out, "{}", HELP)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Read commands line by line until `quit` or end of input. Errors are
    /// reported and the session carries on.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let flow = parser::parse_line(trimmed).and_then(|cmd| self.execute(cmd, out));
            match flow {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(err) => writeln!(out, "error: {}", err)?,
            }
        }
        out.flush()
    }
}

/// Write a figure to `path`, or to `<chart>.<ext>` in the working directory.
pub fn write_figure(figure: &Figure, path: Option<&str>) -> Result<PathBuf, SessionError> {
    let path = match path {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from(format!("{}.{}", figure.kind.short_name(), figure.extension())),
    };
    std::fs::write(&path, &figure.bytes)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlotError;

    fn dataset(headers: &[&str]) -> Dataset {
        let rows = (0..10)
            .map(|i| {
                headers
                    .iter()
                    .enumerate()
                    .map(|(j, h)| match *h {
                        "group" => if i % 2 == 0 { "a" } else { "b" }.to_string(),
                        _ => format!("{}", (i * (j + 3)) % 7),
                    })
                    .collect()
            })
            .collect();
        Dataset::from_rows(headers.iter().map(|h| h.to_string()).collect(), rows)
    }

    #[test]
    fn test_no_dataset() {
        let session = Session::default();
        assert!(matches!(session.record(), Err(SessionError::NoDataset)));
    }

    #[test]
    fn test_hidden_widget_ignored_until_toggle() {
        let mut session = Session::default();
        session.set_dataset(dataset(&["x", "y", "group"]));
        assert!(!session.set("hue", ParamValue::text("group")).unwrap());
        assert!(session.record().unwrap().get("hue").is_null());

        assert!(session.set("use_hue", ParamValue::Bool(true)).unwrap());
        assert_eq!(session.record().unwrap().get("hue"), &ParamValue::text("group"));
    }

    #[test]
    fn test_hidden_widget_values_are_validated() {
        let mut session = Session::default();
        session.set_dataset(dataset(&["x", "y", "group"]));
        session.select_chart("regplot").unwrap();
        session.set("fit_reg", ParamValue::Bool(false)).unwrap();
        assert!(session.record().unwrap().get("order").is_null());

        assert!(matches!(
            session.set("order", ParamValue::Int(50)),
            Err(SessionError::OutOfDomain { .. })
        ));
        assert!(matches!(
            session.set("ci", ParamValue::Int(-7)),
            Err(SessionError::OutOfDomain { .. })
        ));
        assert!(!session.set("order", ParamValue::Int(2)).unwrap());

        session.set("fit_reg", ParamValue::Bool(true)).unwrap();
        let record = session.record().unwrap();
        assert_eq!(record.get("order"), &ParamValue::Int(2));
        assert_eq!(record.get("ci"), &ParamValue::Int(95));
    }

    #[test]
    fn test_out_of_domain_rejected() {
        let mut session = Session::default();
        session.set_dataset(dataset(&["x", "y", "group"]));
        assert!(matches!(
            session.set("legend", ParamValue::text("sideways")),
            Err(SessionError::OutOfDomain { .. })
        ));
        assert!(matches!(
            session.set("bogus", ParamValue::Int(1)),
            Err(SessionError::UnknownWidget { .. })
        ));
    }

    #[test]
    fn test_inputs_are_per_chart() {
        let mut session = Session::default();
        session.set_dataset(dataset(&["x", "y", "group"]));
        session.set("x", ParamValue::text("y")).unwrap();
        session.select_chart("line").unwrap();
        assert_eq!(session.record().unwrap().get("x"), &ParamValue::text("x"));
        session.select_chart("scatter").unwrap();
        assert_eq!(session.record().unwrap().get("x"), &ParamValue::text("y"));
    }

    #[test]
    fn test_failed_render_keeps_cached_figure() {
        let mut session = Session::default();
        session.set_dataset(dataset(&["a", "b", "c"]));
        session.set("y", ParamValue::text("c")).unwrap();
        let first = session.render().unwrap().bytes.clone();
        assert!(session.cache().contains(ChartKind::Scatter));

        session.set_dataset(dataset(&["a", "b"]));
        let err = session.render().unwrap_err();
        assert!(matches!(err, SessionError::Plot(PlotError::MissingColumn(_))));
        assert_eq!(session.view().unwrap().bytes, first);
    }

    #[test]
    fn test_run_reports_errors_and_continues() {
        let mut session = Session::default();
        session.set_dataset(dataset(&["x", "y", "group"]));
        let script = "chart nonsense\nchart box\nrecord\nquit\nmenu\n";
        let mut out = Vec::new();
        session.run(script.as_bytes(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("error: Unknown chart"));
        assert!(text.contains("Categorical Plots -> Box Plot"));
        assert_eq!(session.chart(), ChartKind::Box);
        assert!(!text.contains("Relational\n"));
    }

    #[test]
    fn test_view_before_render() {
        let mut session = Session::default();
        session.set_dataset(dataset(&["x", "y", "group"]));
        let mut out = Vec::new();
        session.execute(Command::View(None), &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("No figure"));
    }
}
