//! Multi-series rendering on shared axes

use crate::processing::min_max;
use crate::{ChartConfig, ProcessingError, Result, XAxis, padded_y_domain};
use plotline_charts::{
    AxisTick, CatmullRomPath, Curve, LinePath, LinearScale, PathStrategy, Scale, XDomain, XScale, colors,
    create_linear_scale, linear_axis_ticks,
};
use plotline_core::{AlignmentMetadata, DEFAULT_X_KEY, DataPoint, LineData, Point2D};
use plotline_worker::OffloadScheduler;

const TICK_COUNT: usize = 5;

/// One rendered series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRender {
    pub id: String,
    pub label: String,
    pub color: String,
    pub path: String,
    pub points: Vec<Point2D>,
}

/// Every series of a multi-line chart, drawn against one pair of scales
#[derive(Debug, Clone, PartialEq)]
pub struct MultiLineRender {
    pub series: Vec<SeriesRender>,
    pub x_domain: XDomain,
    pub y_domain: (f64, f64),
    pub x_scale: XScale,
    pub y_scale: LinearScale,
    pub x_ticks: Vec<AxisTick>,
    pub y_ticks: Vec<AxisTick>,
    /// `None` when alignment was skipped
    pub metadata: Option<AlignmentMetadata>,
}

fn sample_rate(lines: &[LineData], config: &ChartConfig) -> f64 {
    let longest = lines.iter().map(LineData::len).max().unwrap_or(0);
    if longest == 0 {
        return 1.0;
    }
    let target = config.sampling_for(longest).target_points;
    (target as f64 / longest as f64).min(1.0)
}

/// Axis and domain shared by the aligned series.
///
/// Nearest-row filling keeps each series' own X values, so the domain spans
/// every row of every series. X values that are neither dates nor numbers
/// fall back to row positions.
fn shared_x_axis(lines: &[LineData], x_key: &str) -> Result<(XAxis, XDomain)> {
    let first: &DataPoint = lines
        .iter()
        .find_map(|line| line.data.first())
        .ok_or(ProcessingError::NoNumericData)?;
    let rows = || lines.iter().flat_map(|line| line.data.iter());
    let longest = lines.iter().map(LineData::len).max().unwrap_or(0);
    let by_position = XDomain::Numeric(0.0, longest.saturating_sub(1) as f64);

    let axis = XAxis::detect(first, Some(x_key));
    let domain = match &axis {
        XAxis::Time { key } => rows()
            .filter_map(|row| row.date(key))
            .fold(None, |acc, date| match acc {
                None => Some((date, date)),
                Some((min, max)) => Some((date.min(min), date.max(max))),
            })
            .map(|(min, max)| XDomain::Time(min, max)),
        XAxis::Numeric { key } => {
            min_max(rows().filter_map(|row| row.axis_value(key))).map(|(min, max)| XDomain::Numeric(min, max))
        }
        XAxis::Index => Some(by_position),
    };

    match domain {
        Some(domain) => Ok((axis, domain)),
        None => {
            tracing::debug!(%x_key, "x values are not numeric, using row positions");
            Ok((XAxis::Index, by_position))
        }
    }
}

/// Align `lines` onto one X axis, then scale and path every series.
///
/// Alignment is offloaded through `scheduler` when the combined size is
/// above its threshold. Rows whose Y value is not numeric are left out of
/// the series they belong to.
pub async fn render_lines(
    lines: &[LineData],
    config: &ChartConfig,
    scheduler: &OffloadScheduler,
) -> Result<MultiLineRender> {
    if lines.iter().all(LineData::is_empty) {
        return Err(ProcessingError::NoNumericData);
    }

    let x_key = config.x_key.as_deref().unwrap_or(DEFAULT_X_KEY);
    let y_key = config.value_key();

    let aligned = scheduler.align(lines, sample_rate(lines, config), x_key).await;
    let (x_axis, x_domain) = shared_x_axis(&aligned.lines, x_key)?;
    let y_domain = padded_y_domain(
        aligned
            .lines
            .iter()
            .flat_map(|line| line.data.iter().filter_map(|row| row.number(y_key))),
    )
    .map_err(|_| ProcessingError::NoNumericData)?;

    let dims = &config.dimensions;
    let x_scale = XScale::from_domain(x_domain, dims.x_range());
    let y_scale = create_linear_scale(y_domain, dims.y_range());

    let strategy: Box<dyn PathStrategy> = match config.curve {
        Curve::Linear => Box::new(LinePath),
        Curve::Smooth => Box::new(CatmullRomPath { tension: config.tension }),
    };

    let series: Vec<SeriesRender> = aligned
        .lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let points: Vec<Point2D> = line
                .data
                .iter()
                .enumerate()
                .filter_map(|(index, row)| {
                    let value = row.number(y_key)?;
                    let x = x_axis.position(row, index)?;
                    Some(Point2D::new(x_scale.scale_value(x), y_scale.scale(value)))
                })
                .collect();

            SeriesRender {
                id: line.id.clone(),
                label: line.label.clone(),
                color: line
                    .color
                    .clone()
                    .unwrap_or_else(|| colors::series_color(i).to_string()),
                path: strategy.generate(&points),
                points,
            }
        })
        .collect();

    tracing::debug!(
        series = series.len(),
        points = series.first().map_or(0, |s| s.points.len()),
        "rendered multi-line chart"
    );

    Ok(MultiLineRender {
        series,
        x_domain,
        y_domain,
        x_scale,
        y_scale,
        x_ticks: x_scale.axis_ticks(TICK_COUNT),
        y_ticks: linear_axis_ticks(&y_scale, TICK_COUNT),
        metadata: aligned.metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotline_core::{SamplingAlgorithm, SamplingConfig};
    use plotline_worker::WorkerConfig;

    fn line(id: &str, n: usize, offset: f64) -> LineData {
        LineData::new(id, id.to_uppercase()).with_data(
            (0..n)
                .map(|i| DataPoint::new().with("x", i).with("value", offset + (i % 5) as f64))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_render_lines_shares_axes() {
        let scheduler = OffloadScheduler::inline(WorkerConfig::default());
        let lines = vec![line("a", 50, 0.0), line("b", 50, 10.0).with_color("#000000")];

        let render = render_lines(&lines, &ChartConfig::default(), &scheduler).await.unwrap();
        assert_eq!(render.series.len(), 2);
        assert_eq!(render.x_domain, XDomain::Numeric(0.0, 49.0));
        // Values 0..=14 padded by 10%, clamped at zero
        assert_eq!(render.y_domain.0, 0.0);
        assert!((render.y_domain.1 - 15.4).abs() < 1e-9);

        assert_eq!(render.series[0].color, colors::series_color(0));
        assert_eq!(render.series[1].color, "#000000");
        assert_eq!(render.series[0].points.len(), render.series[1].points.len());
        assert_eq!(render.series[0].points[0].x, 50.0);
        assert!(render.series[0].path.starts_with("M50.00,"));
        assert!(!render.y_ticks.is_empty());
        assert_eq!(render.x_ticks.first().map(|t| t.label.as_str()), Some("0.00"));
    }

    #[tokio::test]
    async fn test_render_lines_smooth_curve() {
        let scheduler = OffloadScheduler::inline(WorkerConfig::default());
        let config = ChartConfig::default().curve(Curve::Smooth);
        let render = render_lines(&[line("a", 10, 0.0)], &config, &scheduler).await.unwrap();
        assert!(render.series[0].path.contains('C'));
    }

    #[tokio::test]
    async fn test_render_lines_reduces_long_series() {
        let scheduler = OffloadScheduler::new(WorkerConfig::default().threshold(100));
        let config = ChartConfig::default().sampling(SamplingConfig::new(SamplingAlgorithm::Lttb, 200));
        let lines = vec![line("a", 1000, 0.0), line("b", 2000, 3.0)];

        let render = render_lines(&lines, &config, &scheduler).await.unwrap();
        let metadata = render.metadata.unwrap();
        assert_eq!(metadata.target_sample_size, 200);
        assert!(render.series.iter().all(|s| s.points.len() <= 2000));
        scheduler.terminate();
    }

    #[tokio::test]
    async fn test_render_lines_text_x_uses_positions() {
        let scheduler = OffloadScheduler::inline(WorkerConfig::default());
        let lines = vec![LineData::new("a", "A").with_data(
            ["north", "south", "west"]
                .into_iter()
                .enumerate()
                .map(|(i, label)| DataPoint::new().with("x", label).with("value", i as f64))
                .collect(),
        )];

        let render = render_lines(&lines, &ChartConfig::default(), &scheduler).await.unwrap();
        assert_eq!(render.x_domain, XDomain::Numeric(0.0, 2.0));
        assert_eq!(render.series[0].points.len(), 3);
    }

    fn assert_inside_plot(render: &MultiLineRender) {
        let (left, right) = render.x_scale.range_bounds();
        for series in &render.series {
            for point in &series.points {
                assert!(
                    point.x >= left - 1e-9 && point.x <= right + 1e-9,
                    "{} x={} outside [{}, {}]",
                    series.id,
                    point.x,
                    left,
                    right
                );
            }
        }
    }

    #[tokio::test]
    async fn test_render_lines_spans_every_series_range() {
        let scheduler = OffloadScheduler::inline(WorkerConfig::default());
        let narrow = LineData::new("a", "A").with_data(
            (0..=100)
                .map(|i| DataPoint::new().with("x", i).with("value", i as f64))
                .collect(),
        );
        let wide = LineData::new("b", "B").with_data(
            (0..=100)
                .map(|i| DataPoint::new().with("x", i * 10).with("value", 50.0))
                .collect(),
        );

        let render = render_lines(&[narrow, wide], &ChartConfig::default(), &scheduler)
            .await
            .unwrap();
        assert_eq!(render.x_domain, XDomain::Numeric(0.0, 1000.0));
        assert_inside_plot(&render);
        let last = render.series[1].points.last().unwrap();
        assert!((last.x - render.x_scale.range_bounds().1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_render_lines_empty_input() {
        let scheduler = OffloadScheduler::inline(WorkerConfig::default());
        assert_eq!(
            render_lines(&[], &ChartConfig::default(), &scheduler).await,
            Err(ProcessingError::NoNumericData)
        );
        assert_eq!(
            render_lines(&[LineData::new("a", "A")], &ChartConfig::default(), &scheduler).await,
            Err(ProcessingError::NoNumericData)
        );
    }
}
