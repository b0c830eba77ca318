use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use plotdeck::cache::SessionCache;
use plotdeck::chart::ChartKind;
use plotdeck::data::ColumnKind;
use plotdeck::error::PlotError;
use plotdeck::params::ParamValue;
use plotdeck::session::Session;
use plotdeck::{invoker, loader, panels, RenderOptions};

const TIPS: &str = "test/tips.csv";

/// Helper function to run plotdeck with arguments and optional stdin
fn run_plotdeck(args: &[&str], stdin: &str) -> Result<Vec<u8>, String> {
    let mut child = Command::new(env!("CARGO_BIN_EXE_plotdeck"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to spawn process: {}", e))?;

    if let Some(mut input) = child.stdin.take() {
        input
            .write_all(stdin.as_bytes())
            .map_err(|e| format!("Failed to write to stdin: {}", e))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("Failed to wait for process: {}", e))?;

    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

/// Check if bytes are a valid PNG
fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
}

fn tips_session() -> Session {
    let mut session = Session::default();
    session
        .load(Path::new(TIPS), None)
        .expect("Failed to load tips fixture");
    session
}

#[test]
fn test_end_to_end_scatter_to_stdout() {
    let result = run_plotdeck(&["render", "--data", TIPS, "--chart", "scatter"], "");
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(is_valid_png(&result.unwrap()), "Output is not a valid PNG");
}

#[test]
fn test_end_to_end_box_plot_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("box.png");
    let out_arg = out.to_str().unwrap();
    let result = run_plotdeck(
        &[
            "render", "--data", TIPS, "--chart", "Box Plot", "--set", "x=day", "--set",
            "y=total_bill", "-o", out_arg,
        ],
        "",
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(result.unwrap().is_empty());
    assert!(is_valid_png(&fs::read(&out).unwrap()));
}

#[test]
fn test_end_to_end_svg_output() {
    let result = run_plotdeck(
        &[
            "render", "--data", TIPS, "--chart", "histplot", "--options",
            r#"{"width": 500, "height": 400, "type": "svg"}"#,
        ],
        "",
    );
    let svg = String::from_utf8(result.expect("render failed")).unwrap();
    assert!(svg.contains("<svg"));
}

#[test]
fn test_end_to_end_unknown_column_fails() {
    let result = run_plotdeck(
        &["render", "--data", TIPS, "--chart", "scatter", "--set", "x=nonexistent"],
        "",
    );
    let err = result.expect_err("render should fail");
    assert!(err.contains("nonexistent"), "stderr: {}", err);
}

#[test]
fn test_end_to_end_menu() {
    let out = String::from_utf8(run_plotdeck(&["menu"], "").unwrap()).unwrap();
    assert!(out.contains("Relational"));
    assert!(out.contains("clustermap"));
}

#[test]
fn test_end_to_end_session_script() {
    let dir = tempfile::tempdir().unwrap();
    let figure = dir.path().join("heat.png");
    let copy = dir.path().join("again.png");
    let script = format!(
        "load {}\nchart heatmap\nrender {}\nview {}\nquit\n",
        TIPS,
        figure.display(),
        copy.display()
    );
    let out = run_plotdeck(&["session"], &script).expect("session failed");
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Loaded 48 rows x 7 columns"), "{}", text);
    assert!(is_valid_png(&fs::read(&figure).unwrap()));
    assert_eq!(fs::read(&figure).unwrap(), fs::read(&copy).unwrap());
}

#[test]
fn test_loader_semicolon_delimiter() {
    let dataset = loader::load_path(Path::new("test/weather_semicolon.csv"), None).unwrap();
    assert_eq!(dataset.n_rows(), 40);
    assert_eq!(dataset.n_cols(), 4);
    assert_eq!(dataset.headers(), vec!["date", "city", "temperature", "rainfall"]);
}

#[test]
fn test_loader_xlsx_workbook() {
    let dataset = loader::load_path(Path::new("test/sales.xlsx"), None).unwrap();
    assert_eq!(dataset.n_rows(), 6);
    assert_eq!(dataset.n_cols(), 4);
    assert_eq!(dataset.headers(), vec!["date", "region", "units", "price"]);
    assert_eq!(dataset.head(1)[0], vec!["2024-03-01 00:00:00", "North", "12", "3.5"]);
    assert_eq!(dataset.column("date").unwrap().kind(), ColumnKind::Datetime);
    assert_eq!(dataset.column("region").unwrap().kind(), ColumnKind::Categorical);
    assert_eq!(dataset.column("units").unwrap().kind(), ColumnKind::Numeric);
}

#[test]
fn test_end_to_end_xlsx_render() {
    let result = run_plotdeck(
        &[
            "render", "--data", "test/sales.xlsx", "--chart", "bar", "--set", "x=region",
            "--set", "y=units",
        ],
        "",
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(is_valid_png(&result.unwrap()));
}

#[test]
fn test_loader_latin1_file() {
    let mut text = String::from("name,city,score\n");
    for i in 0..20 {
        text.push_str(&format!("José,Málaga,{}\nRenée,Besançon,{}\n", i, i + 1));
    }
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(&text);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();

    let dataset = loader::load_path(file.path(), Some("text/csv")).unwrap();
    assert_eq!(dataset.n_rows(), 40);
    assert_eq!(dataset.head(1)[0], vec!["José", "Málaga", "0"]);
}

#[test]
fn test_absent_axis_variable_is_plot_error() {
    let dataset = loader::load_path(Path::new(TIPS), None).unwrap();
    let (_, mut record) = panels::build_record(ChartKind::Violin, &Default::default(), &dataset);
    record.insert("x", "weekday");
    let err = invoker::invoke(ChartKind::Violin, &record, &dataset, &RenderOptions::default())
        .unwrap_err();
    assert!(matches!(err, PlotError::MissingColumn(name) if name == "weekday"));
}

#[test]
fn test_fixed_record_gives_equal_scenes() {
    let dataset = loader::load_path(Path::new(TIPS), None).unwrap();
    let mut inputs = plotdeck::widgets::Inputs::new();
    inputs.insert("x".into(), ParamValue::text("day"));
    inputs.insert("y".into(), ParamValue::text("total_bill"));
    let options = RenderOptions::default();
    for kind in [ChartKind::Strip, ChartKind::Swarm, ChartKind::Bar, ChartKind::Point] {
        let (_, record) = panels::build_record(kind, &inputs, &dataset);
        let a = invoker::build_scene(kind, &record, &dataset, &options).unwrap();
        let b = invoker::build_scene(kind, &record, &dataset, &options).unwrap();
        assert_eq!(a, b, "{} is not deterministic", kind);
    }
}

#[test]
fn test_cache_holds_latest_render() {
    let mut session = tips_session();
    session.select_chart("hist").unwrap();
    let first = session.render().unwrap().scene.clone();
    session.set("bins", ParamValue::Int(5)).unwrap();
    let second = session.render().unwrap().scene.clone();
    assert_ne!(first, second);
    assert_eq!(session.cache().len(), 1);
    assert_eq!(session.view().unwrap().scene, second);
}

#[test]
fn test_default_panels_render() {
    let dataset = loader::load_path(Path::new(TIPS), None).unwrap();
    let mut cache = SessionCache::new();
    for kind in [
        ChartKind::Scatter,
        ChartKind::Line,
        ChartKind::Histogram,
        ChartKind::Kde,
        ChartKind::Ecdf,
        ChartKind::Regplot,
        ChartKind::Heatmap,
    ] {
        let (_, record) = panels::build_record(kind, &Default::default(), &dataset);
        let figure = invoker::invoke(kind, &record, &dataset, &RenderOptions::default())
            .unwrap_or_else(|e| panic!("{} failed: {}", kind, e));
        assert!(is_valid_png(&figure.bytes));
        cache.store(figure);
    }
    assert_eq!(cache.len(), 7);
}
