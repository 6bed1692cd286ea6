//! Chart drawing on top of `plotters`.
//!
//! The renderer takes a [`ChartSpec`] and produces an encoded image. Both
//! backends share one generic drawing path so PNG and SVG output look the same.

use crate::chart::{ChartSpec, Encoding, Field, Interpolation, Mark, Series};
use crate::data::ColumnData;
use crate::theme::{parse_color, ResolvedText, ResolvedTheme};
use crate::{OutputFormat, RenderOptions};
use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::{FRAC_PI_2, TAU};
use std::ops::Range;

const FALLBACK_COLOR: RGBColor = RGBColor(0x66, 0xC5, 0xCC);
const LINE_WIDTH: u32 = 2;
const MARKER_SIZE: i32 = 4;
const POINT_SIZE: i32 = 5;
const SPLINE_SAMPLES: usize = 12;
const PIE_LEGEND_WIDTH: i32 = 160;

/// Draw the chart and encode it in the requested format
pub fn render_chart(spec: &ChartSpec, options: &RenderOptions) -> Result<Vec<u8>> {
    options.validate()?;
    match options.format {
        OutputFormat::Png => render_png(spec, options.width, options.height),
        OutputFormat::Svg => render_svg(spec, options.width, options.height).map(String::into_bytes),
    }
}

fn render_png(spec: &ChartSpec, width: u32, height: u32) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw(&root, spec)?;
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

fn render_svg(spec: &ChartSpec, width: u32, height: u32) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        draw(&root, spec)?;
        root.present().context("Failed to present drawing")?;
    }
    Ok(svg)
}

fn draw<DB>(root: &DrawingArea<DB, Shift>, spec: &ChartSpec) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let theme = ResolvedTheme::resolve(&spec.theme);
    root.fill(&theme.background)
        .context("Failed to fill background")?;

    match &spec.encoding {
        Encoding::Cartesian {
            x,
            y,
            y_title,
            legend_title,
        } => draw_cartesian(root, spec.mark, x, y, y_title, legend_title.as_deref(), &theme),
        Encoding::Radial {
            names,
            values,
            colors,
        } => draw_pie(root, names, values, colors, &theme),
    }
}

fn font(style: &ResolvedText) -> TextStyle<'_> {
    (style.family.as_str(), style.size)
        .into_font()
        .color(&style.color)
}

fn series_color(color: &str) -> RGBColor {
    parse_color(color).unwrap_or(FALLBACK_COLOR)
}

// === Cartesian charts ===

/// How rows are placed along the x axis
enum XAxis {
    /// One slot per row, centred at `i + 0.5`
    Categorical(Vec<String>),
    Continuous(Vec<Option<f64>>),
}

impl XAxis {
    fn for_mark(mark: Mark, x: &Field) -> Self {
        match (mark, &x.values) {
            (Mark::Bar, _) | (_, ColumnData::Text(_)) => XAxis::Categorical(x.values.labels()),
            (_, ColumnData::Number(values)) => XAxis::Continuous(values.clone()),
        }
    }

    fn positions(&self) -> Vec<Option<f64>> {
        match self {
            XAxis::Categorical(labels) => (0..labels.len()).map(|i| Some(i as f64 + 0.5)).collect(),
            XAxis::Continuous(values) => values.clone(),
        }
    }

    fn range(&self) -> Range<f64> {
        match self {
            XAxis::Categorical(labels) => 0.0..(labels.len().max(1) as f64),
            XAxis::Continuous(values) => padded_range(values.iter().flatten().copied(), false),
        }
    }
}

/// Largest magnitude an axis end may take; keeps every span finite
const MAX_EXTENT: f64 = f64::MAX / 4.0;

/// Data range with 5% padding; bar charts always include the zero baseline.
///
/// The result is always finite and non-empty, and never narrower than the
/// precision of its end points allows.
fn padded_range(values: impl Iterator<Item = f64>, include_zero: bool) -> Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        return 0.0..1.0;
    }
    let (min, max) = if include_zero {
        (min.min(0.0), max.max(0.0))
    } else {
        (min, max)
    };
    let (min, max) = (min.max(-MAX_EXTENT), max.min(MAX_EXTENT));
    let magnitude = min.abs().max(max.abs());

    if min == max {
        let padding = (magnitude * 0.05).max(1.0);
        return (min - padding)..(max + padding);
    }
    let padding = ((max - min) * 0.05).max(magnitude * 1e-6);
    let lower = if include_zero && min == 0.0 { 0.0 } else { min - padding };
    let upper = if include_zero && max == 0.0 { 0.0 } else { max + padding };
    lower..upper
}

/// Label for a categorical tick; only slot centres get text
fn category_label(labels: &[String], value: f64) -> String {
    let slot = value - 0.5;
    let index = slot.round();
    if (slot - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    labels.get(index as usize).cloned().unwrap_or_default()
}

fn series_values(series: &Series) -> &[Option<f64>] {
    series.values.as_numbers().unwrap_or(&[])
}

/// Pair x positions with y values, keeping gaps where either side is missing.
/// Coordinates are clamped to the extent an axis can cover.
fn points(x: &[Option<f64>], y: &[Option<f64>]) -> Vec<Option<(f64, f64)>> {
    let clamp = |v: f64| v.clamp(-MAX_EXTENT, MAX_EXTENT);
    x.iter()
        .zip(y)
        .map(|(x, y)| Some((clamp((*x)?), clamp((*y)?))))
        .collect()
}

/// Split a point sequence into contiguous runs at missing values
fn split_runs(points: &[Option<(f64, f64)>]) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for point in points {
        match point {
            Some(p) => current.push(*p),
            None => {
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Uniform Catmull-Rom spline through `points`.
///
/// The curve passes through every input point; end segments reuse the
/// end points as their outer control points. Samples that overflow are
/// dropped.
pub fn catmull_rom(points: &[(f64, f64)], samples: usize) -> Vec<(f64, f64)> {
    if points.len() < 3 || samples < 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut out = Vec::with_capacity(last * samples + 1);
    for i in 0..last {
        let p0 = points[i.saturating_sub(1)];
        let p1 = points[i];
        let p2 = points[i + 1];
        let p3 = points[(i + 2).min(last)];
        out.push(p1);
        for s in 1..samples {
            let t = s as f64 / samples as f64;
            let point = (
                catmull_rom_axis(p0.0, p1.0, p2.0, p3.0, t),
                catmull_rom_axis(p0.1, p1.1, p2.1, p3.1, t),
            );
            // Near f64::MAX the blend can overflow
            if point.0.is_finite() && point.1.is_finite() {
                out.push(point);
            }
        }
    }
    out.push(points[last]);
    out
}

fn catmull_rom_axis(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * (2.0 * p1
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}

fn draw_cartesian<DB>(
    root: &DrawingArea<DB, Shift>,
    mark: Mark,
    x: &Field,
    y: &[Series],
    y_title: &str,
    legend_title: Option<&str>,
    theme: &ResolvedTheme,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let x_axis = XAxis::for_mark(mark, x);
    let x_positions = x_axis.positions();
    let y_range = padded_range(
        y.iter().flat_map(|s| series_values(s).iter().flatten().copied()),
        mark == Mark::Bar,
    );

    let margin = theme.margin;
    let mut chart = ChartBuilder::on(root)
        .margin_top(margin.top as i32)
        .margin_right(margin.right as i32)
        .margin_bottom(margin.bottom as i32)
        .margin_left(margin.left as i32)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_axis.range(), y_range)
        .context("Failed to build chart")?;

    let axis_font = font(&theme.axis_text);
    let category_labels = match &x_axis {
        XAxis::Categorical(labels) => labels.clone(),
        XAxis::Continuous(_) => Vec::new(),
    };
    let category_formatter = |v: &f64| category_label(&category_labels, *v);

    {
        let mut mesh = chart.configure_mesh();
        mesh.bold_line_style(theme.grid.color.stroke_width(theme.grid.width as u32))
            .light_line_style(theme.background.stroke_width(1))
            .axis_style(theme.axis_line.color.stroke_width(theme.axis_line.width as u32))
            .label_style(axis_font.clone())
            .axis_desc_style(axis_font.clone())
            .x_desc(x.name.as_str())
            .y_desc(y_title);
        if let XAxis::Categorical(labels) = &x_axis {
            // Half-slot ticks so every slot centre lands on a tick
            mesh.x_labels(labels.len() * 2 + 1)
                .x_label_formatter(&category_formatter);
        }
        mesh.draw().context("Failed to draw mesh")?;
    }

    match mark {
        Mark::Bar => {
            let num_series = y.len().max(1) as f64;
            let bar_width = 0.8 / num_series;
            for (series_idx, series) in y.iter().enumerate() {
                let color = series_color(&series.color);
                let x_offset = (series_idx as f64 - (num_series - 1.0) / 2.0) * bar_width;
                let bars = points(&x_positions, series_values(series))
                    .into_iter()
                    .flatten()
                    .map(move |(x, y)| {
                        let x_center = x + x_offset;
                        Rectangle::new(
                            [(x_center - bar_width / 2.0, 0.0), (x_center + bar_width / 2.0, y)],
                            color.filled(),
                        )
                    });
                chart
                    .draw_series(bars)
                    .context("Failed to draw bar series")?
                    .label(series.name.clone())
                    .legend(move |(x, y)| {
                        Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                    });
            }
        }
        Mark::Line {
            interpolation,
            markers,
        } => {
            for series in y {
                let color = series_color(&series.color);
                let series_points = points(&x_positions, series_values(series));
                for (run_idx, run) in split_runs(&series_points).into_iter().enumerate() {
                    let path = match interpolation {
                        Interpolation::Linear => run.clone(),
                        Interpolation::Spline => catmull_rom(&run, SPLINE_SAMPLES),
                    };
                    let anno = chart
                        .draw_series(LineSeries::new(path, color.stroke_width(LINE_WIDTH)))
                        .context("Failed to draw line series")?;
                    if run_idx == 0 {
                        anno.label(series.name.clone()).legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(LINE_WIDTH))
                        });
                    }
                    if markers {
                        chart
                            .draw_series(
                                run.iter()
                                    .map(|&(x, y)| Circle::new((x, y), MARKER_SIZE, color.filled())),
                            )
                            .context("Failed to draw markers")?;
                    }
                }
            }
        }
        Mark::Point => {
            for series in y {
                let color = series_color(&series.color);
                let circles = points(&x_positions, series_values(series))
                    .into_iter()
                    .flatten()
                    .map(move |(x, y)| Circle::new((x, y), POINT_SIZE, color.filled()));
                chart
                    .draw_series(circles)
                    .context("Failed to draw point series")?
                    .label(series.name.clone())
                    .legend(move |(x, y)| Circle::new((x + 5, y), POINT_SIZE, color.filled()));
            }
        }
        Mark::Arc => anyhow::bail!("Arc marks need a radial encoding"),
    }

    if y.len() > 1 {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(theme.background.mix(0.9).filled())
            .border_style(theme.grid.color.stroke_width(1))
            .label_font(font(&theme.legend_text))
            .draw()
            .context("Failed to draw legend")?;

        if let Some(title) = legend_title {
            let (width, _) = root.dim_in_pixel();
            let anchor = (
                width as i32 - margin.right as i32,
                margin.top as i32 / 2,
            );
            root.draw(&Text::new(
                title.to_string(),
                anchor,
                font(&theme.legend_title).pos(Pos::new(HPos::Right, VPos::Center)),
            ))
            .context("Failed to draw legend title")?;
        }
    }

    Ok(())
}

// === Pie charts ===

struct Slice {
    label: String,
    value: f64,
    color: RGBColor,
}

/// Slices with a positive value; zero, negative and missing values take no area
fn pie_slices(names: &Field, values: &Field, colors: &[String]) -> Vec<Slice> {
    let numbers = values.values.as_numbers().unwrap_or(&[]);
    names
        .values
        .labels()
        .into_iter()
        .zip(numbers)
        .enumerate()
        .filter_map(|(i, (label, value))| {
            let value = (*value)?;
            (value > 0.0).then(|| Slice {
                label,
                value,
                color: colors
                    .get(i)
                    .map(|c| series_color(c))
                    .unwrap_or(FALLBACK_COLOR),
            })
        })
        .collect()
}

/// Share of the total for each slice, in percent
fn percentages(slices: &[Slice]) -> Vec<f64> {
    // Scale by the largest value first so the sum cannot overflow
    let largest = slices.iter().map(|s| s.value).fold(0.0, f64::max);
    let total: f64 = slices.iter().map(|s| s.value / largest).sum();
    slices
        .iter()
        .map(|s| s.value / largest / total * 100.0)
        .collect()
}

fn draw_pie<DB>(
    root: &DrawingArea<DB, Shift>,
    names: &Field,
    values: &Field,
    colors: &[String],
    theme: &ResolvedTheme,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let slices = pie_slices(names, values, colors);
    if slices.is_empty() {
        anyhow::bail!(
            "Pie chart needs at least one positive value in column '{}'",
            values.name
        );
    }

    let (width, height) = root.dim_in_pixel();
    let margin = theme.margin;
    let plot_width = (width as i32 - margin.left as i32 - margin.right as i32 - PIE_LEGEND_WIDTH).max(2);
    let plot_height = (height as i32 - margin.top as i32 - margin.bottom as i32).max(2);
    let radius = plot_width.min(plot_height) as f64 / 2.0;
    let center = (
        margin.left as i32 + plot_width / 2,
        margin.top as i32 + plot_height / 2,
    );
    let at = |angle: f64, r: f64| {
        (
            center.0 + (r * angle.cos()).round() as i32,
            center.1 + (r * angle.sin()).round() as i32,
        )
    };

    let label_font = font(&theme.axis_text).pos(Pos::new(HPos::Center, VPos::Center));

    // Clockwise from twelve o'clock
    let mut angle = -FRAC_PI_2;
    for (slice, percent) in slices.iter().zip(percentages(&slices)) {
        let sweep = percent / 100.0 * TAU;
        let steps = ((sweep / TAU) * 180.0).ceil().max(2.0) as usize;
        let mut outline = Vec::with_capacity(steps + 2);
        outline.push(center);
        outline.extend((0..=steps).map(|i| at(angle + sweep * i as f64 / steps as f64, radius)));

        root.draw(&Polygon::new(outline, slice.color.filled()))
            .context("Failed to draw pie slice")?;
        root.draw(&Text::new(
            format!("{:.1}%", percent),
            at(angle + sweep / 2.0, radius * 0.65),
            label_font.clone(),
        ))
        .context("Failed to draw slice label")?;

        angle += sweep;
    }

    // Legend
    let legend_x = width as i32 - margin.right as i32 - PIE_LEGEND_WIDTH + 20;
    let mut legend_y = margin.top as i32;
    root.draw(&Text::new(names.name.clone(), (legend_x, legend_y), font(&theme.legend_title)))
        .context("Failed to draw legend title")?;
    let entry_font = font(&theme.legend_text);
    for slice in &slices {
        legend_y += 20;
        root.draw(&Rectangle::new(
            [(legend_x, legend_y), (legend_x + 12, legend_y + 12)],
            slice.color.filled(),
        ))
        .context("Failed to draw legend swatch")?;
        root.draw(&Text::new(slice.label.clone(), (legend_x + 18, legend_y), entry_font.clone()))
            .context("Failed to draw legend entry")?;
    }

    Ok(())
}
