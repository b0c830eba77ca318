use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use plotdeck::chart::{self, ChartKind};
use plotdeck::session::Session;
use plotdeck::{parser, RenderOptions};

#[derive(Parser, Debug)]
#[command(name = "plotdeck")]
#[command(about = "Pick a chart, fill in its options and render it from CSV or XLSX data", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the chart menu
    Menu,
    /// List a chart's widgets with their resolved values
    Widgets {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        chart: String,
        /// Widget value as key=value (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        #[arg(long)]
        mime: Option<String>,
    },
    /// Render one chart; PNG goes to stdout unless -o is given
    Render {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        chart: String,
        /// Widget value as key=value (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Render options, e.g. '{"width":800,"height":600,"type":"png"}'
        #[arg(long)]
        options: Option<String>,
        #[arg(long)]
        mime: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Read session commands from stdin
    Session {
        #[arg(long)]
        data: Option<PathBuf>,
        #[arg(long)]
        mime: Option<String>,
        #[arg(long)]
        options: Option<String>,
    },
}

fn render_options(json: Option<&str>) -> Result<RenderOptions> {
    match json {
        Some(text) => RenderOptions::from_json(text),
        None => Ok(RenderOptions::default()),
    }
}

/// Load data, select the chart and apply `--set` assignments.
fn prepare(
    data: &Path,
    mime: Option<&str>,
    chart_name: &str,
    assignments: &[String],
    options: RenderOptions,
) -> Result<Session> {
    let kind = ChartKind::parse(chart_name)
        .ok_or_else(|| anyhow!("Unknown chart '{}'", chart_name))?;
    let mut session = Session::new(options);
    session
        .load(data, mime)
        .with_context(|| format!("Failed to load {}", data.display()))?;
    session.select_chart(kind.short_name())?;
    for assignment in assignments {
        let (key, value) = parser::parse_assignment(assignment)?;
        if !session.set(&key, value)? {
            eprintln!("Warning: '{}' is hidden with the current options; value ignored", key);
        }
    }
    Ok(session)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match args.command {
        Cmd::Menu => {
            handle
                .write_all(chart::menu_text().as_bytes())
                .context("Failed to write menu")?;
        }
        Cmd::Widgets {
            data,
            chart,
            set,
            mime,
        } => {
            let session = prepare(&data, mime.as_deref(), &chart, &set, RenderOptions::default())?;
            handle
                .write_all(session.widgets_text()?.as_bytes())
                .context("Failed to write widget list")?;
        }
        Cmd::Render {
            data,
            chart,
            set,
            options,
            mime,
            output,
        } => {
            let options = render_options(options.as_deref())?;
            let mut session = prepare(&data, mime.as_deref(), &chart, &set, options)?;
            let figure = session.render().context("Failed to render plot")?;
            match output {
                Some(path) => std::fs::write(&path, &figure.bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => handle
                    .write_all(&figure.bytes)
                    .context("Failed to write figure to stdout")?,
            }
        }
        Cmd::Session {
            data,
            mime,
            options,
        } => {
            let mut session = Session::new(render_options(options.as_deref())?);
            if let Some(path) = data {
                session
                    .load(&path, mime.as_deref())
                    .with_context(|| format!("Failed to load {}", path.display()))?;
            }
            let stdin = io::stdin();
            session
                .run(stdin.lock(), &mut handle)
                .context("Session I/O failed")?;
        }
    }

    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}
