use std::fs;
use std::path::Path;

use plotters::prelude::*;
use tracing::debug;

use crate::models::{ChartSeries, History};
use crate::utils::errors::WatchError;

pub const DEFAULT_WIDTH: u32 = 1000;
pub const DEFAULT_HEIGHT: u32 = 1000;

const PALETTE: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

/// Y axis range covering every price with 10% padding, floored at zero.
pub fn price_axis_range(series: &[ChartSeries]) -> Option<(f64, f64)> {
    let prices = series
        .iter()
        .flat_map(|s| s.points.iter().map(|(_, p)| *p as f64));
    let (min, max) = prices.fold(None, |acc: Option<(f64, f64)>, p| match acc {
        Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
        None => Some((p, p)),
    })?;

    let padding = (max - min).max(1.0) * 0.1;
    Some(((min - padding).max(0.0), max + padding))
}

/// Render the price history as a PNG line chart, one line per category.
///
/// Needs at least two observations; a single point has nothing to draw.
pub fn render_chart(history: &History, title: &str, width: u32, height: u32) -> Result<Vec<u8>, WatchError> {
    if history.len() < 2 {
        return Err(WatchError::Chart(
            "not enough price data to generate chart (minimum 2 observations required)".to_string(),
        ));
    }

    let series = ChartSeries::from_history(history);
    let (y_min, y_max) = price_axis_range(&series)
        .ok_or_else(|| WatchError::Chart("history has no prices".to_string()))?;

    let (x_min, x_max) = match (history.iter().next(), history.latest()) {
        (Some(first), Some(last)) => (first.timestamp(), last.timestamp()),
        _ => return Err(WatchError::Chart("history has no prices".to_string())),
    };

    // BitMapBackend encodes PNG only when writing to a path
    let temp_file = std::env::temp_dir().join(format!("carwatch_chart_{}.png", uuid::Uuid::new_v4()));

    let drawn = draw(&temp_file, &series, title, (width, height), (x_min..x_max, y_min..y_max));
    let image_data = drawn.and_then(|_| {
        fs::read(&temp_file).map_err(|e| WatchError::Chart(format!("failed to read chart file: {}", e)))
    });

    let _ = fs::remove_file(&temp_file);
    let image_data = image_data?;

    debug!("Rendered chart with {} series ({} bytes)", series.len(), image_data.len());
    Ok(image_data)
}

type TimeRange = std::ops::Range<chrono::DateTime<chrono::Utc>>;

fn draw(
    path: &Path,
    series: &[ChartSeries],
    title: &str,
    size: (u32, u32),
    (x_range, y_range): (TimeRange, std::ops::Range<f64>),
) -> Result<(), WatchError> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| WatchError::Chart(format!("failed to fill canvas: {}", e)))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 32.0).into_font())
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)
        .map_err(|e| WatchError::Chart(format!("failed to build chart: {}", e)))?;

    chart
        .configure_mesh()
        .x_desc("Time")
        .y_desc("Price")
        .draw()
        .map_err(|e| WatchError::Chart(format!("failed to draw mesh: {}", e)))?;

    for (i, line) in series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let points: Vec<_> = line.points.iter().map(|(t, p)| (*t, *p as f64)).collect();

        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
            .map_err(|e| WatchError::Chart(format!("failed to draw line: {}", e)))?
            .label(line.category.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));

        chart
            .draw_series(points.into_iter().map(|p| Circle::new(p, 3, color.filled())))
            .map_err(|e| WatchError::Chart(format!("failed to draw points: {}", e)))?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| WatchError::Chart(format!("failed to draw legend: {}", e)))?;

    root.present()
        .map_err(|e| WatchError::Chart(format!("failed to render chart: {}", e)))?;
    Ok(())
}

/// Write rendered chart bytes next to the history file.
pub fn save_chart(path: &Path, image_data: &[u8]) -> Result<(), WatchError> {
    fs::write(path, image_data)
        .map_err(|e| WatchError::Chart(format!("failed to write {}: {}", path.display(), e)))
}
