use std::{fs, ops::Range, path::Path};

use anyhow::{Context, Result};
use base64::Engine;
use plotters::{coord::Shift, prelude::*};

const BAND_OPACITY: f64 = 0.2;
const LINE_WIDTH: u32 = 2;
const AXIS_PADDING: f64 = 0.05;

#[derive(Clone, Debug, PartialEq)]
pub struct ChartSeries {
    pub label: Option<String>,
    pub values: Vec<f64>,
    /// Shaded region as (lower, upper), same length as `values`.
    pub band: Option<(Vec<f64>, Vec<f64>)>,
}

/// Everything drawn on one chart, kept separate from rendering so callers can
/// inspect it.
#[derive(Clone, Debug, PartialEq)]
pub struct RegretChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<ChartSeries>,
}

impl RegretChart {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: "episode".to_string(),
            y_label: "regret".to_string(),
            series: Vec::new(),
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.series.iter().filter_map(|series| series.label.as_deref())
    }

    fn x_range(&self) -> Range<f64> {
        let longest = self
            .series
            .iter()
            .map(|series| series.values.len())
            .max()
            .unwrap_or(0);
        let end = longest.saturating_sub(1) as f64;
        if end > 0.0 {
            0.0..end
        } else {
            0.0..1.0
        }
    }

    fn y_range(&self) -> Range<f64> {
        let mut low = f64::INFINITY;
        let mut high = f64::NEG_INFINITY;
        for series in &self.series {
            let bounds = series
                .band
                .iter()
                .flat_map(|(lower, upper)| lower.iter().chain(upper))
                .chain(&series.values)
                .filter(|value| value.is_finite());
            for &value in bounds {
                low = low.min(value);
                high = high.max(value);
            }
        }

        if !low.is_finite() || !high.is_finite() {
            return 0.0..1.0;
        }
        let span = high - low;
        let pad = if span > 0.0 {
            span * AXIS_PADDING
        } else {
            low.abs().max(1.0) * AXIS_PADDING
        };
        (low - pad)..(high + pad)
    }
}

/// Render a chart as an SVG document.
pub fn render_svg(chart: &RegretChart, size: (u32, u32)) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        draw_chart(&root, chart)?;
        root.present().context("failed to finish SVG chart")?;
    }
    Ok(svg)
}

/// Render a chart and write it to `path`, creating parent directories.
pub fn save_chart(path: &Path, chart: &RegretChart, size: (u32, u32)) -> Result<String> {
    let svg = render_svg(chart, size)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    fs::write(path, &svg).with_context(|| format!("failed to write chart to {}", path.display()))?;
    Ok(svg)
}

/// Encode an SVG document as a data URL for embedding in markdown.
pub fn encode_svg_data_url(svg: &str) -> String {
    let base64 = base64::engine::general_purpose::STANDARD.encode(svg.as_bytes());
    format!("data:image/svg+xml;base64,{base64}")
}

fn draw_chart<DB>(root: &DrawingArea<DB, Shift>, chart: &RegretChart) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let mut context = ChartBuilder::on(root)
        .caption(&chart.title, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(chart.x_range(), chart.y_range())?;

    context
        .configure_mesh()
        .x_desc(chart.x_label.as_str())
        .y_desc(chart.y_label.as_str())
        .draw()?;

    for (idx, series) in chart.series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();

        if let Some((lower, upper)) = &series.band {
            let outline: Vec<(f64, f64)> = upper
                .iter()
                .enumerate()
                .map(|(x, &y)| (x as f64, y))
                .chain(lower.iter().enumerate().rev().map(|(x, &y)| (x as f64, y)))
                .collect();
            context.draw_series(std::iter::once(Polygon::new(
                outline,
                color.mix(BAND_OPACITY).filled(),
            )))?;
        }

        let points = series
            .values
            .iter()
            .enumerate()
            .map(|(x, &y)| (x as f64, y));
        let drawn = context.draw_series(LineSeries::new(points, color.stroke_width(LINE_WIDTH)))?;
        if let Some(label) = &series.label {
            drawn
                .label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
    }

    if chart.labels().next().is_some() {
        context
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    Ok(())
}
