use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::ops::Range;

use crate::data::format_number;
use crate::ir::{self, Axis, AxisKind, Dash, DrawCommand, LegendEntry, PanelScene, SceneGraph, Swatch};
use crate::OutputFormat;

type Px = (i32, i32);

const LEGEND_FONT: f64 = 12.0;
const LEGEND_ROW: i32 = 18;
const LEGEND_SWATCH: i32 = 22;
const TITLE_FONT: i32 = 16;

/// Encode a fitted scene graph in the requested format.
pub fn render(scene: &SceneGraph, format: &OutputFormat) -> Result<Vec<u8>> {
    if scene.width == 0 || scene.height == 0 {
        anyhow::bail!(
            "Cannot render a {}x{} figure",
            scene.width,
            scene.height
        );
    }
    match format {
        OutputFormat::Png => render_png(scene),
        OutputFormat::Svg => render_svg(scene),
    }
}

fn render_png(scene: &SceneGraph) -> Result<Vec<u8>> {
    let (width, height) = (scene.width, scene.height);
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw_scene(&root, scene)?;
        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }
    Ok(png_bytes)
}

fn render_svg(scene: &SceneGraph) -> Result<Vec<u8>> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (scene.width, scene.height)).into_drawing_area();
        draw_scene(&root, scene)?;
        root.present().context("Failed to present drawing")?;
    }
    Ok(svg.into_bytes())
}

fn draw_scene<DB>(root: &DrawingArea<DB, Shift>, scene: &SceneGraph) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;
    for (idx, panel) in scene.panels.iter().enumerate() {
        let b = panel.bounds;
        let (w, h) = (scene.width as f64, scene.height as f64);
        let left = (b.left * w).round().max(0.0) as u32;
        let top = (b.top * h).round().max(0.0) as u32;
        let width = (b.width * w).round().max(1.0) as u32;
        let height = (b.height * h).round().max(1.0) as u32;
        let area = root.clone().shrink((left, top), (width, height));
        draw_panel(&area, panel).with_context(|| format!("Failed to draw panel {}", idx))?;
    }
    Ok(())
}

fn axis_range(axis: &Axis) -> Range<f64> {
    let (lo, hi) = axis.range;
    if hi > lo && lo.is_finite() && hi.is_finite() {
        lo..hi
    } else {
        (lo - 1.0)..(lo + 1.0)
    }
}

/// Tick label text for a coordinate on `axis`.
fn tick_label(axis: &Axis, value: f64) -> String {
    match &axis.kind {
        AxisKind::Categorical(levels) => {
            let idx = value.round();
            if (value - idx).abs() > 1e-6 || idx < 0.0 {
                return String::new();
            }
            levels.get(idx as usize).cloned().unwrap_or_default()
        }
        AxisKind::Datetime => chrono::DateTime::from_timestamp(value.round() as i64, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        AxisKind::Continuous if axis.log => format_number(10f64.powf(value)),
        AxisKind::Continuous => format_number(value),
    }
}

fn tick_count(axis: &Axis) -> usize {
    match &axis.kind {
        AxisKind::Categorical(levels) => levels.len().clamp(1, 40),
        _ => 8,
    }
}

fn stroke(style: &ir::LineStyle) -> ShapeStyle {
    style
        .color
        .mix(style.alpha)
        .stroke_width(style.width.round().max(1.0) as u32)
}

fn fill(color: RGBColor, alpha: f64) -> ShapeStyle {
    color.mix(alpha).filled()
}

fn draw_panel<DB>(area: &DrawingArea<DB, Shift>, panel: &PanelScene) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let mut builder = ChartBuilder::on(area);
    builder
        .margin(8)
        .x_label_area_size(if panel.x.visible { 40 } else { 0 })
        .y_label_area_size(if panel.y.visible { 55 } else { 0 });
    if let Some(title) = &panel.title {
        builder.caption(title, ("sans-serif", TITLE_FONT));
    }
    let mut chart = builder
        .build_cartesian_2d(axis_range(&panel.x), axis_range(&panel.y))
        .context("Failed to build chart")?;

    let x_fmt = |v: &f64| tick_label(&panel.x, *v);
    let y_fmt = |v: &f64| tick_label(&panel.y, *v);
    {
        let mut mesh = chart.configure_mesh();
        mesh.disable_mesh()
            .x_labels(tick_count(&panel.x))
            .y_labels(tick_count(&panel.y))
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt);
        if let Some(label) = &panel.x.label {
            mesh.x_desc(label.as_str());
        }
        if let Some(label) = &panel.y.label {
            mesh.y_desc(label.as_str());
        }
        if !panel.x.visible {
            mesh.disable_x_axis();
        }
        if !panel.y.visible {
            mesh.disable_y_axis();
        }
        mesh.draw().context("Failed to draw mesh")?;
    }

    // Commands are drawn on the panel area in pixels.
    let base = area.get_base_pixel();
    let to_px = |p: (f64, f64)| -> Px {
        let (x, y) = chart.backend_coord(&p);
        (x - base.0, y - base.1)
    };
    for command in &panel.commands {
        draw_command(area, command, &to_px)?;
    }

    if !panel.legend.is_empty() {
        let (xr, yr) = chart.plotting_area().get_pixel_range();
        let corner = (xr.end - base.0, yr.start - base.1);
        draw_legend(area, corner, panel.legend_title.as_deref(), &panel.legend)?;
    }
    Ok(())
}

fn draw_command<DB>(area: &DrawingArea<DB, Shift>, command: &DrawCommand, to_px: &dyn Fn((f64, f64)) -> Px) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let finite = |p: &&(f64, f64)| p.0.is_finite() && p.1.is_finite();
    match command {
        DrawCommand::Line { points, style } => {
            let px: Vec<Px> = points.iter().filter(finite).map(|p| to_px(*p)).collect();
            draw_path(area, px, style)?;
        }
        DrawCommand::Segments { segments, style } => {
            for s in segments {
                if s.iter().all(|p| p.0.is_finite() && p.1.is_finite()) {
                    draw_path(area, vec![to_px(s[0]), to_px(s[1])], style)?;
                }
            }
        }
        DrawCommand::Points { points, style } => {
            for p in points.iter().filter(finite) {
                draw_marker(area, to_px(*p), style)?;
            }
        }
        DrawCommand::Rect { tl, br, style } => {
            let corners = [to_px(*tl), to_px(*br)];
            if let Some(color) = style.fill {
                area.draw(&Rectangle::new(corners, fill(color, style.alpha)))
                    .context("Failed to draw rectangle")?;
            }
            if let Some((color, width)) = style.edge {
                area.draw(&Rectangle::new(
                    corners,
                    color.mix(style.alpha).stroke_width(width.round().max(1.0) as u32),
                ))
                .context("Failed to draw rectangle edge")?;
            }
        }
        DrawCommand::Polygon { points, style } => {
            let px: Vec<Px> = points.iter().filter(finite).map(|p| to_px(*p)).collect();
            if px.len() < 3 {
                return Ok(());
            }
            if let Some(color) = style.fill {
                area.draw(&Polygon::new(px.clone(), fill(color, style.alpha)))
                    .context("Failed to draw polygon")?;
            }
            if let Some((color, width)) = style.edge {
                let mut closed = px;
                closed.push(closed[0]);
                area.draw(&PathElement::new(
                    closed,
                    color.stroke_width(width.round().max(1.0) as u32),
                ))
                .context("Failed to draw polygon edge")?;
            }
        }
        DrawCommand::Text { pos, text, style } => {
            let font = ("sans-serif", style.size)
                .into_font()
                .color(&style.color)
                .pos(Pos::new(HPos::Center, VPos::Center));
            area.draw(&Text::new(text.clone(), to_px(*pos), font))
                .context("Failed to draw text")?;
        }
    }
    Ok(())
}

/// On/off dash lengths in pixels for a line of the given width.
fn dash_pattern(dash: Dash, width: f64) -> Option<Vec<f64>> {
    let w = width.max(1.0);
    match dash {
        Dash::Solid => None,
        Dash::Dashed => Some(vec![3.7 * w, 1.6 * w]),
        Dash::Dotted => Some(vec![w, 1.65 * w]),
        Dash::DashDot => Some(vec![6.4 * w, 1.6 * w, w, 1.6 * w]),
    }
}

/// Split a polyline into its visible dash pieces.
fn dash_pieces(points: &[Px], pattern: &[f64]) -> Vec<Vec<Px>> {
    let mut pieces = Vec::new();
    let mut current: Vec<Px> = Vec::new();
    let (mut idx, mut left) = (0usize, pattern[0]);
    for pair in points.windows(2) {
        let (x0, y0) = (pair[0].0 as f64, pair[0].1 as f64);
        let (x1, y1) = (pair[1].0 as f64, pair[1].1 as f64);
        let len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        let mut t = 0.0;
        while t < len {
            let step = left.min(len - t);
            let at = |d: f64| {
                let f = if len > 0.0 { d / len } else { 0.0 };
                ((x0 + (x1 - x0) * f).round() as i32, (y0 + (y1 - y0) * f).round() as i32)
            };
            if idx % 2 == 0 {
                if current.is_empty() {
                    current.push(at(t));
                }
                current.push(at(t + step));
            }
            t += step;
            left -= step;
            if left <= 1e-9 {
                if idx % 2 == 0 && !current.is_empty() {
                    pieces.push(std::mem::take(&mut current));
                }
                idx = (idx + 1) % pattern.len();
                left = pattern[idx];
            }
        }
    }
    if current.len() > 1 {
        pieces.push(current);
    }
    pieces
}

fn draw_path<DB>(area: &DrawingArea<DB, Shift>, points: Vec<Px>, style: &ir::LineStyle) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if points.len() < 2 {
        return Ok(());
    }
    match dash_pattern(style.dash, style.width) {
        None => {
            area.draw(&PathElement::new(points, stroke(style)))
                .context("Failed to draw line")?;
        }
        Some(pattern) => {
            for piece in dash_pieces(&points, &pattern) {
                area.draw(&PathElement::new(piece, stroke(style)))
                    .context("Failed to draw dashed line")?;
            }
        }
    }
    Ok(())
}

fn draw_marker<DB>(area: &DrawingArea<DB, Shift>, (x, y): Px, style: &ir::PointStyle) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let r = style.size.round().max(1.0) as i32;
    let face = fill(style.color, style.alpha);
    let line = style.color.mix(style.alpha).stroke_width((r / 3).max(1) as u32);
    match style.marker {
        ir::Marker::Circle => {
            area.draw(&Circle::new((x, y), r, face))
                .context("Failed to draw marker")?;
        }
        ir::Marker::Square => {
            area.draw(&Rectangle::new([(x - r, y - r), (x + r, y + r)], face))
                .context("Failed to draw marker")?;
        }
        ir::Marker::Triangle => {
            area.draw(&Polygon::new(vec![(x, y - r), (x + r, y + r), (x - r, y + r)], face))
                .context("Failed to draw marker")?;
        }
        ir::Marker::Diamond => {
            area.draw(&Polygon::new(vec![(x, y - r), (x + r, y), (x, y + r), (x - r, y)], face))
                .context("Failed to draw marker")?;
        }
        ir::Marker::Cross => {
            area.draw(&PathElement::new(vec![(x - r, y - r), (x + r, y + r)], line))
                .context("Failed to draw marker")?;
            area.draw(&PathElement::new(vec![(x - r, y + r), (x + r, y - r)], line))
                .context("Failed to draw marker")?;
        }
        ir::Marker::Plus => {
            area.draw(&PathElement::new(vec![(x - r, y), (x + r, y)], line))
                .context("Failed to draw marker")?;
            area.draw(&PathElement::new(vec![(x, y - r), (x, y + r)], line))
                .context("Failed to draw marker")?;
        }
    }
    if let Some((edge, width)) = style.edge {
        if matches!(style.marker, ir::Marker::Circle) {
            area.draw(&Circle::new(
                (x, y),
                r,
                edge.mix(style.alpha).stroke_width(width.round().max(1.0) as u32),
            ))
            .context("Failed to draw marker edge")?;
        }
    }
    Ok(())
}

/// Legend box anchored at the top-right corner of the plotting area.
fn draw_legend<DB>(area: &DrawingArea<DB, Shift>, (right, top): Px, title: Option<&str>, entries: &[LegendEntry]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let char_w = LEGEND_FONT * 0.6;
    let longest = entries
        .iter()
        .map(|e| e.label.chars().count())
        .chain(title.map(|t| t.chars().count()))
        .max()
        .unwrap_or(0);
    let rows = entries.len() as i32 + i32::from(title.is_some());
    let width = LEGEND_SWATCH + 14 + (longest as f64 * char_w).ceil() as i32;
    let height = rows * LEGEND_ROW + 8;
    let (x0, y0) = (right - width - 8, top + 8);

    area.draw(&Rectangle::new(
        [(x0, y0), (x0 + width, y0 + height)],
        WHITE.mix(0.85).filled(),
    ))
    .context("Failed to draw legend background")?;
    area.draw(&Rectangle::new(
        [(x0, y0), (x0 + width, y0 + height)],
        RGBColor(0xcc, 0xcc, 0xcc).stroke_width(1),
    ))
    .context("Failed to draw legend border")?;

    let font = ("sans-serif", LEGEND_FONT)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));
    let mut y = y0 + 4 + LEGEND_ROW / 2;
    if let Some(title) = title {
        area.draw(&Text::new(title.to_string(), (x0 + 6, y), font.clone()))
            .context("Failed to draw legend title")?;
        y += LEGEND_ROW;
    }
    for entry in entries {
        let sx = x0 + 6 + LEGEND_SWATCH / 2;
        let text_x = match &entry.swatch {
            Swatch::Marker(style) => {
                let mut style = style.clone();
                style.size = style.size.min(LEGEND_ROW as f64 / 2.0 - 1.0);
                draw_marker(area, (sx, y), &style)?;
                x0 + 10 + LEGEND_SWATCH
            }
            Swatch::Line(style) => {
                draw_path(area, vec![(sx - 9, y), (sx + 9, y)], style)?;
                x0 + 10 + LEGEND_SWATCH
            }
            Swatch::Patch(color) => {
                area.draw(&Rectangle::new([(sx - 6, y - 6), (sx + 6, y + 6)], color.filled()))
                    .context("Failed to draw legend swatch")?;
                x0 + 10 + LEGEND_SWATCH
            }
            Swatch::Heading => x0 + 6,
        };
        area.draw(&Text::new(entry.label.clone(), (text_x, y), font.clone()))
            .context("Failed to draw legend label")?;
        y += LEGEND_ROW;
    }
    Ok(())
}
