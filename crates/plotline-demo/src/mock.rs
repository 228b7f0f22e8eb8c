//! Generated series for the demo

use std::time::Duration;

use chrono::{DateTime, Utc};
use plotline_core::{DataPoint, LineData, colors};
use plotline_state::{ChartContext, ChartEvent};
use rand::Rng;
use tokio::time::interval;

const SAMPLE_SPACING_SECS: i64 = 60;

/// Random walk with occasional trend changes
pub struct MockSeries {
    value: f64,
    volatility: f64,
    trend: f64,
    next_time: DateTime<Utc>,
}

impl MockSeries {
    pub fn new(initial_value: f64, start: DateTime<Utc>) -> Self {
        Self {
            value: initial_value,
            volatility: 0.005,
            trend: 0.0,
            next_time: start,
        }
    }

    fn tick(&mut self) -> f64 {
        let mut rng = rand::thread_rng();
        let drift = self.trend * 0.001;
        let random = rng.gen_range(-1.0..1.0) * self.volatility;

        if rng.gen_bool(0.01) {
            self.trend = rng.gen_range(-1.0..1.0);
        }

        self.value *= 1.0 + drift + random;
        self.value = self.value.max(1.0);
        self.value
    }

    pub fn next_point(&mut self) -> DataPoint {
        let mut rng = rand::thread_rng();
        let value = self.tick();
        let time = self.next_time;
        self.next_time += chrono::Duration::seconds(SAMPLE_SPACING_SECS);

        DataPoint::new()
            .with("date", time)
            .with("value", value)
            .with("volume", rng.gen_range(10.0..1000.0))
    }

    pub fn generate(&mut self, points: usize) -> Vec<DataPoint> {
        (0..points).map(|_| self.next_point()).collect()
    }
}

/// `count` series sharing one time axis, each a little longer than the last
/// so the aligner has gaps to fill
pub fn generate_lines(count: usize, points: usize, start: DateTime<Utc>) -> Vec<LineData> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let len = points / 2 + points * i / count.max(1) / 2;
            let mut series = MockSeries::new(rng.gen_range(50.0..500.0), start);
            LineData::new(format!("series-{}", i), format!("Series {}", i + 1))
                .with_color(colors::series_color(i))
                .with_data(series.generate(len.max(1)))
        })
        .collect()
}

/// Append points to `ctx` on a timer, re-reading the processed data after
/// every update, until `ticks` updates were made or Ctrl-C is pressed
pub async fn run_live_feed(ctx: &ChartContext, mut series: MockSeries, base: Vec<DataPoint>, ticks: usize) {
    tracing::info!(ticks, "starting live feed");

    let mut data = base;
    let mut events = ctx.subscribe();
    let mut update_interval = interval(Duration::from_millis(50));
    let mut resize_interval = interval(Duration::from_millis(400));
    let mut updates = 0usize;

    while updates < ticks {
        tokio::select! {
            _ = update_interval.tick() => {
                data.extend(series.generate(25));
                ctx.set_data(data.clone());
                if let Some(processed) = ctx.processed_data() {
                    tracing::debug!(
                        original = processed.original_length,
                        sampled = processed.sampled_data.len(),
                        "live update processed"
                    );
                }
                updates += 1;
            }

            _ = resize_interval.tick() => {
                ctx.notify_resize();
            }

            Ok(event) = events.recv() => {
                if let ChartEvent::Failed(error) = event {
                    tracing::warn!(%error, "live update failed");
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    tracing::info!(updates, points = data.len(), "live feed finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_mock_series_spacing() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let points = MockSeries::new(100.0, start).generate(3);

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].date("date"), Some(start));
        assert_eq!(points[2].date("date"), Some(start + chrono::Duration::minutes(2)));
        assert!(points.iter().all(|p| p.number("value").is_some_and(|v| v >= 1.0)));
    }

    #[test]
    fn test_generate_lines_lengths() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let lines = generate_lines(2, 1000, start);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 500);
        assert_eq!(lines[1].len(), 750);
        assert_eq!(lines[1].color.as_deref(), Some(colors::series_color(1)));
    }
}
