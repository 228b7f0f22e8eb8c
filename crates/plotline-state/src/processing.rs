//! Turning raw rows into scaled, render-ready chart data

use crate::{ChartConfig, ProcessingError, Result};
use plotline_charts::{LinearScale, PathGenerator, Scale, XDomain, XScale, create_linear_scale};
use plotline_core::{DataPoint, Point2D};
use plotline_sampling::sample_data;

/// Fraction of the value span added above and below the Y domain
pub const Y_PADDING: f64 = 0.1;

/// Where a row sits on the X axis
#[derive(Debug, Clone, PartialEq)]
pub enum XAxis {
    Time { key: String },
    Numeric { key: String },
    /// No X field: rows are placed by position
    Index,
}

impl XAxis {
    /// A configured key wins; otherwise the first date-like field of
    /// `first`, else the row index
    pub fn detect(first: &DataPoint, x_key: Option<&str>) -> Self {
        match x_key {
            Some(key) => match first.get(key) {
                Some(value) if value.is_date_like() => Self::Time { key: key.to_string() },
                Some(_) => Self::Numeric { key: key.to_string() },
                None => Self::Index,
            },
            None => first
                .first_date_key()
                .map(|key| Self::Time { key: key.to_string() })
                .unwrap_or(Self::Index),
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Time { key } | Self::Numeric { key } => Some(key),
            Self::Index => None,
        }
    }

    /// X as a number (epoch millis for time axes)
    pub fn position(&self, row: &DataPoint, index: usize) -> Option<f64> {
        match self {
            Self::Time { key } => row.date(key).map(|d| d.timestamp_millis() as f64),
            Self::Numeric { key } => row.axis_value(key),
            Self::Index => Some(index as f64),
        }
    }

    /// Time axes span the first to the last valid date; numeric axes
    /// span min to max
    pub fn domain(&self, rows: &[DataPoint]) -> Result<XDomain> {
        match self {
            Self::Time { key } => {
                let mut dates = rows.iter().filter_map(|row| row.date(key));
                let first = dates.next().ok_or(ProcessingError::NoValidValues("x"))?;
                let last = dates.last().unwrap_or(first);
                Ok(XDomain::Time(first, last))
            }
            Self::Numeric { key } => {
                let (min, max) = min_max(rows.iter().filter_map(|row| row.axis_value(key)))
                    .ok_or(ProcessingError::NoValidValues("x"))?;
                Ok(XDomain::Numeric(min, max))
            }
            Self::Index => Ok(XDomain::Numeric(0.0, rows.len().saturating_sub(1) as f64)),
        }
    }
}

pub(crate) fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((min, max)) => Some((min.min(v), max.max(v))),
    })
}

/// Y domain over `values` with 10% padding on both sides. The lower bound
/// stops at zero when no value is negative.
pub fn padded_y_domain(values: impl Iterator<Item = f64>) -> Result<(f64, f64)> {
    let (min, max) = min_max(values).ok_or(ProcessingError::NoValidValues("y"))?;
    let padding = (max - min) * Y_PADDING;

    let lower = if min >= 0.0 { (min - padding).max(0.0) } else { min - padding };
    let upper = max + padding;
    if !lower.is_finite() || !upper.is_finite() {
        return Err(ProcessingError::InvalidDomain { min: lower, max: upper });
    }
    Ok((lower, upper))
}

/// A data point projected into pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
    /// Position of the source row in `sampled_data`
    pub index: usize,
}

impl ChartPoint {
    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

/// Path and points of one line
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineRender {
    pub path: String,
    pub points: Vec<ChartPoint>,
}

/// Sampled rows with the shared scales of a chart context
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedChartData {
    pub sampled_data: Vec<DataPoint>,
    pub original_length: usize,
    /// Numeric fields of the first row, X field excluded
    pub numeric_keys: Vec<String>,
    pub x_axis: XAxis,
    pub x_domain: XDomain,
    pub y_domain: (f64, f64),
    pub x_scale: XScale,
    pub y_scale: LinearScale,
    /// Points of the primary (first numeric) series
    pub points: Vec<ChartPoint>,
    /// Straight path through `points`
    pub path_data: String,
}

impl ProcessedChartData {
    pub fn primary_key(&self) -> Option<&str> {
        self.numeric_keys.first().map(String::as_str)
    }

    /// Points of `data_key`; rows where it is not numeric are skipped
    pub fn project(&self, data_key: &str) -> Vec<ChartPoint> {
        self.sampled_data
            .iter()
            .enumerate()
            .filter_map(|(index, row)| {
                let value = row.number(data_key)?;
                let x = self.x_axis.position(row, index)?;
                Some(ChartPoint {
                    x: self.x_scale.scale_value(x),
                    y: self.y_scale.scale(value),
                    value,
                    index,
                })
            })
            .collect()
    }
}

/// Sample, measure and scale `data` for rendering
pub fn process_chart_data(
    data: &[DataPoint],
    config: &ChartConfig,
    paths: &PathGenerator,
) -> Result<ProcessedChartData> {
    let first = data.first().ok_or(ProcessingError::NoNumericData)?;
    let x_axis = XAxis::detect(first, config.x_key.as_deref());

    let numeric_keys: Vec<String> = first
        .numeric_keys()
        .into_iter()
        .filter(|key| Some(*key) != x_axis.key())
        .map(str::to_string)
        .collect();
    let primary = numeric_keys.first().ok_or(ProcessingError::NoNumericData)?;

    let mut sampling = config.sampling_for(data.len()).with_y_key(primary.as_str());
    if let Some(key) = x_axis.key() {
        sampling = sampling.with_x_key(key);
    }
    let sampled_data = if data.len() > sampling.target_points {
        sample_data(data, &sampling)
    } else {
        data.to_vec()
    };

    let x_domain = x_axis.domain(&sampled_data)?;
    let y_domain = padded_y_domain(
        sampled_data
            .iter()
            .flat_map(|row| numeric_keys.iter().filter_map(move |key| row.number(key))),
    )?;

    let dims = &config.dimensions;
    let x_scale = XScale::from_domain(x_domain, dims.x_range());
    let y_scale = create_linear_scale(y_domain, dims.y_range());

    let mut processed = ProcessedChartData {
        sampled_data,
        original_length: data.len(),
        numeric_keys,
        x_axis,
        x_domain,
        y_domain,
        x_scale,
        y_scale,
        points: Vec::new(),
        path_data: String::new(),
    };

    let points = processed
        .primary_key()
        .map(|key| processed.project(key))
        .unwrap_or_default();
    processed.points = points;
    let positions: Vec<Point2D> = processed.points.iter().map(ChartPoint::position).collect();
    processed.path_data = paths.create_straight_path(&positions);

    tracing::debug!(
        original = processed.original_length,
        sampled = processed.sampled_data.len(),
        series = processed.numeric_keys.len(),
        time_axis = processed.x_domain.is_time(),
        "processed chart data"
    );
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use plotline_core::{SamplingAlgorithm, SamplingConfig};

    fn series(n: usize) -> Vec<DataPoint> {
        (0..n)
            .map(|i| DataPoint::new().with("x", i).with("value", (i % 10) as f64).with("other", 20.0))
            .collect()
    }

    #[test]
    fn test_x_axis_detection() {
        let row = DataPoint::new().with("date", "2024-01-01").with("value", 1.0);
        assert_eq!(XAxis::detect(&row, None), XAxis::Time { key: "date".into() });

        let row = DataPoint::new().with("x", 3).with("value", 1.0);
        assert_eq!(XAxis::detect(&row, None), XAxis::Index);
        assert_eq!(XAxis::detect(&row, Some("x")), XAxis::Numeric { key: "x".into() });
        assert_eq!(XAxis::detect(&row, Some("missing")), XAxis::Index);
    }

    #[test]
    fn test_padded_y_domain() {
        assert_eq!(padded_y_domain([10.0, 20.0].into_iter()).unwrap(), (9.0, 21.0));
        assert_eq!(padded_y_domain([1.0, 101.0].into_iter()).unwrap(), (0.0, 111.0));
        assert_eq!(padded_y_domain([-10.0, 10.0].into_iter()).unwrap(), (-12.0, 12.0));
        assert_eq!(
            padded_y_domain(std::iter::empty()),
            Err(ProcessingError::NoValidValues("y"))
        );
    }

    #[test]
    fn test_process_numeric_x() {
        let config = ChartConfig::new(400.0, 300.0).x_key("x");
        let processed = process_chart_data(&series(50), &config, &PathGenerator::new()).unwrap();

        assert_eq!(processed.numeric_keys, vec!["value".to_string(), "other".to_string()]);
        assert_eq!(processed.x_domain, XDomain::Numeric(0.0, 49.0));
        assert_eq!(processed.y_domain, (0.0, 22.0));
        assert_eq!(processed.points.len(), 50);
        assert_eq!(processed.points[0].x, 50.0);
        assert_eq!(processed.points[49].x, 370.0);
        assert!(processed.path_data.starts_with("M50.00,"));
    }

    #[test]
    fn test_process_index_axis_keeps_x_as_series() {
        let processed = process_chart_data(&series(5), &ChartConfig::default(), &PathGenerator::new()).unwrap();
        assert_eq!(processed.x_axis, XAxis::Index);
        assert_eq!(processed.primary_key(), Some("x"));
        assert_eq!(processed.x_domain, XDomain::Numeric(0.0, 4.0));
    }

    #[test]
    fn test_process_time_axis() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let data: Vec<DataPoint> = (0..10)
            .map(|i| {
                DataPoint::new()
                    .with("date", start + chrono::Duration::days(i))
                    .with("value", i as f64)
            })
            .collect();

        let processed = process_chart_data(&data, &ChartConfig::default(), &PathGenerator::new()).unwrap();
        assert_eq!(
            processed.x_domain,
            XDomain::Time(start, start + chrono::Duration::days(9))
        );
        assert_eq!(processed.points.first().map(|p| p.x), Some(50.0));
    }

    #[test]
    fn test_process_samples_large_input() {
        let config = ChartConfig::default()
            .x_key("x")
            .sampling(SamplingConfig::new(SamplingAlgorithm::Lttb, 100));
        let processed = process_chart_data(&series(5000), &config, &PathGenerator::new()).unwrap();

        assert_eq!(processed.original_length, 5000);
        assert_eq!(processed.sampled_data.len(), 100);
        assert_eq!(processed.points.len(), 100);
    }

    #[test]
    fn test_process_without_numeric_fields() {
        let data = vec![DataPoint::new().with("name", "a")];
        let err = process_chart_data(&data, &ChartConfig::default(), &PathGenerator::new()).unwrap_err();
        assert_eq!(err, ProcessingError::NoNumericData);
    }

    #[test]
    fn test_project_skips_non_numeric() {
        let mut data = series(4);
        data[2].insert("value", "n/a");
        let config = ChartConfig::default().x_key("x");
        let processed = process_chart_data(&data, &config, &PathGenerator::new()).unwrap();

        let points = processed.project("value");
        assert_eq!(points.len(), 3);
        assert_eq!(points.iter().map(|p| p.index).collect::<Vec<_>>(), vec![0, 1, 3]);
    }
}
