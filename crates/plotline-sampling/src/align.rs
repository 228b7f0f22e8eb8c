//! Resampling several series onto one shared X axis so they can be drawn
//! and hovered together.

use indexmap::IndexSet;
use plotline_core::{
    AlignedLines, AlignmentMetadata, DataPoint, LineData, nearest_index, parse_date, parse_numeric,
};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

/// Lower bound on the unified axis size
pub const MIN_ALIGNED_POINTS: usize = 100;
/// Datasets at or below this size are never thinned by [`sample_large_dataset`]
pub const LARGE_DATASET_THRESHOLD: usize = 1000;

/// Sort key for a stringified X value: dates, then numbers, then text
#[derive(Debug, Clone, PartialEq)]
enum AxisKey {
    Date(f64),
    Number(f64),
    Text(String),
}

impl AxisKey {
    fn classify(label: &str) -> Self {
        if let Some(date) = parse_date(label) {
            Self::Date(date.timestamp_millis() as f64)
        } else if let Some(n) = parse_numeric(label) {
            Self::Number(n)
        } else {
            Self::Text(label.to_string())
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Date(_) => 0,
            Self::Number(_) => 1,
            Self::Text(_) => 2,
        }
    }

    /// Position on a numeric axis; text has none and sits at zero
    fn numeric(&self) -> f64 {
        match self {
            Self::Date(v) | Self::Number(v) => *v,
            Self::Text(_) => 0.0,
        }
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Date(a), Self::Date(b)) | (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Endpoints plus evenly spaced interior indices, ascending and unique
pub fn create_sampling_indices(total: usize, target: usize) -> Vec<usize> {
    if total == 0 {
        return Vec::new();
    }

    let mut indices = vec![0];
    if total > 1 {
        indices.push(total - 1);
    }

    let remaining = target.saturating_sub(indices.len());
    if remaining > 0 && total > 2 {
        let step = (total - 1) as f64 / (remaining + 1) as f64;
        indices.extend(
            (1..=remaining)
                .map(|i| (step * i as f64).round() as usize)
                .filter(|&index| index > 0 && index < total - 1),
        );
    }

    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Thin datasets above [`LARGE_DATASET_THRESHOLD`] rows to
/// `max(100, len * sample_rate)` rows
pub fn sample_large_dataset(data: &[DataPoint], sample_rate: f64) -> Vec<DataPoint> {
    if data.len() <= LARGE_DATASET_THRESHOLD {
        return data.to_vec();
    }

    let target = MIN_ALIGNED_POINTS.max((data.len() as f64 * sample_rate).floor() as usize);
    create_sampling_indices(data.len(), target)
        .into_iter()
        .map(|i| data[i].clone())
        .collect()
}

/// Point whose X is numerically closest to `target`, among rows that have
/// `x_key`. Linear scan; ties keep the earliest row.
pub fn find_nearest_point<'a>(data: &'a [DataPoint], target: &str, x_key: &str) -> Option<&'a DataPoint> {
    let target = AxisKey::classify(target).numeric();
    data.iter()
        .filter_map(|row| row.get(x_key).map(|v| (row, v.as_axis_value().unwrap_or(0.0))))
        .fold(None, |best: Option<(&DataPoint, f64)>, (row, x)| {
            let distance = (x - target).abs();
            match best {
                Some((_, d)) if d <= distance => best,
                _ => Some((row, distance)),
            }
        })
        .map(|(row, _)| row)
}

/// One series prepared for lookups: exact X label map plus rows sorted by
/// numeric X for nearest-neighbour search
struct SeriesIndex<'a> {
    by_label: HashMap<String, &'a DataPoint>,
    by_position: Vec<(f64, &'a DataPoint)>,
}

impl<'a> SeriesIndex<'a> {
    fn build(data: &'a [DataPoint], x_key: &str) -> Self {
        let mut by_label = HashMap::with_capacity(data.len());
        let mut by_position = Vec::with_capacity(data.len());

        for row in data {
            let Some(value) = row.get(x_key) else {
                continue;
            };
            // Later rows win on duplicate X
            by_label.insert(value.to_axis_string(), row);
            by_position.push((value.as_axis_value().unwrap_or(0.0), row));
        }
        by_position.sort_by(|a, b| a.0.total_cmp(&b.0));

        Self { by_label, by_position }
    }

    fn lookup(&self, label: &str, key: &AxisKey) -> Option<&'a DataPoint> {
        if let Some(row) = self.by_label.get(label) {
            return Some(*row);
        }
        nearest_index(&self.by_position, key.numeric(), |(x, _)| *x).map(|i| self.by_position[i].1)
    }
}

fn align(lines: &[LineData], sample_rate: f64, x_key: &str) -> AlignedLines {
    // Union of X labels in first-seen order
    let mut labels: IndexSet<String> = IndexSet::new();
    for (line_index, line) in lines.iter().enumerate() {
        let mut missing = 0usize;
        for row in &line.data {
            match row.axis_label(x_key) {
                Some(label) => {
                    labels.insert(label);
                }
                None => missing += 1,
            }
        }
        if missing > 0 {
            tracing::warn!(line = line_index, missing, x_key, "points missing the x key were skipped");
        }
    }

    let mut axis: Vec<(String, AxisKey)> = labels
        .into_iter()
        .map(|label| {
            let key = AxisKey::classify(&label);
            (label, key)
        })
        .collect();
    axis.sort_by(|a, b| a.1.total_cmp(&b.1));

    let max_len = lines.iter().map(LineData::len).max().unwrap_or(0);
    let target = MIN_ALIGNED_POINTS.max((max_len as f64 * sample_rate).floor() as usize);

    let sampled_axis: Vec<&(String, AxisKey)> = if axis.len() <= target {
        axis.iter().collect()
    } else {
        create_sampling_indices(axis.len(), target)
            .into_iter()
            .map(|i| &axis[i])
            .collect()
    };

    let aligned: Vec<LineData> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let index = SeriesIndex::build(&line.data, x_key);
            let data = if index.by_position.is_empty() {
                Vec::new()
            } else {
                sampled_axis
                    .iter()
                    .filter_map(|(label, key)| index.lookup(label, key).cloned())
                    .collect()
            };

            LineData {
                id: if line.id.is_empty() { format!("line-{}", i) } else { line.id.clone() },
                label: if line.label.is_empty() { format!("Line {}", i) } else { line.label.clone() },
                color: line.color.clone(),
                data,
            }
        })
        .collect();

    let original_points: usize = lines.iter().map(LineData::len).sum();
    let sampled_points: usize = aligned.iter().map(LineData::len).sum();
    let metadata = AlignmentMetadata {
        original_points,
        sampled_points,
        compression_ratio: if sampled_points > 0 {
            original_points as f64 / sampled_points as f64
        } else {
            1.0
        },
        target_sample_size: target,
        unified_x_values: sampled_axis.len(),
        lines_processed: aligned.len(),
    };

    tracing::debug!(
        lines = metadata.lines_processed,
        unified = metadata.unified_x_values,
        original = original_points,
        sampled = sampled_points,
        "aligned series"
    );

    AlignedLines {
        lines: aligned,
        metadata: Some(metadata),
    }
}

/// Resample `lines` onto a unified, sorted X axis of at most
/// `max(100, longest * sample_rate)` values.
///
/// Every series with usable points ends up with one row per unified X
/// value (exact match, else nearest by numeric or temporal distance).
/// If alignment fails the input comes back untouched with no metadata.
pub fn sample_multiple_lines(lines: &[LineData], sample_rate: f64, x_key: &str) -> AlignedLines {
    if lines.is_empty() {
        return AlignedLines::default();
    }

    match panic::catch_unwind(AssertUnwindSafe(|| align(lines, sample_rate, x_key))) {
        Ok(aligned) => aligned,
        Err(_) => {
            tracing::error!("series alignment failed, returning input unchanged");
            AlignedLines {
                lines: lines.to_vec(),
                metadata: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_line(id: &str, len: usize, step: usize) -> LineData {
        LineData::new(id, id).with_data(
            (0..len)
                .map(|i| DataPoint::new().with("x", i * step).with("value", (i % 17) as f64))
                .collect(),
        )
    }

    #[test]
    fn test_sampling_indices() {
        assert_eq!(create_sampling_indices(0, 10), Vec::<usize>::new());
        assert_eq!(create_sampling_indices(1, 10), vec![0]);
        assert_eq!(create_sampling_indices(11, 4), vec![0, 3, 7, 10]);

        let indices = create_sampling_indices(1000, 100);
        assert!(indices.len() <= 100);
        assert_eq!(indices.first(), Some(&0));
        assert_eq!(indices.last(), Some(&999));
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_aligned_lengths_equal() {
        let lines = vec![numeric_line("a", 300, 3), numeric_line("b", 900, 1)];
        let aligned = sample_multiple_lines(&lines, 0.5, "x");

        let metadata = aligned.metadata.expect("metadata");
        assert_eq!(metadata.target_sample_size, 450);
        assert_eq!(metadata.unified_x_values, 450);
        assert_eq!(aligned.lines.len(), 2);
        assert_eq!(aligned.lines[0].len(), aligned.lines[1].len());
        assert_eq!(aligned.lines[0].len(), metadata.unified_x_values);
    }

    #[test]
    fn test_small_union_kept_whole() {
        let lines = vec![numeric_line("a", 10, 2), numeric_line("b", 10, 3)];
        let aligned = sample_multiple_lines(&lines, 0.5, "x");

        // x = 0,2,..,18 and 0,3,..,27 share 0, 6, 12, 18
        let metadata = aligned.metadata.unwrap();
        assert_eq!(metadata.unified_x_values, 16);
        assert_eq!(metadata.target_sample_size, 100);
        assert!(aligned.lines.iter().all(|l| l.len() == 16));
    }

    #[test]
    fn test_axis_sorted_numerically() {
        let line = LineData::new("a", "A").with_data(vec![
            DataPoint::new().with("x", 10).with("value", 1.0),
            DataPoint::new().with("x", 9).with("value", 2.0),
            DataPoint::new().with("x", 100).with("value", 3.0),
        ]);
        let aligned = sample_multiple_lines(&[line], 1.0, "x");
        let xs: Vec<f64> = aligned.lines[0].data.iter().filter_map(|p| p.number("x")).collect();
        assert_eq!(xs, vec![9.0, 10.0, 100.0]);
    }

    #[test]
    fn test_dates_sort_before_numbers_and_text() {
        let line = LineData::new("a", "A").with_data(vec![
            DataPoint::new().with("x", "zeta").with("value", 1.0),
            DataPoint::new().with("x", 5).with("value", 2.0),
            DataPoint::new().with("x", "2024-02-01").with("value", 3.0),
            DataPoint::new().with("x", "2024-01-01").with("value", 4.0),
        ]);
        let aligned = sample_multiple_lines(&[line], 1.0, "x");
        let values: Vec<f64> = aligned.lines[0].data.iter().filter_map(|p| p.number("value")).collect();
        assert_eq!(values, vec![4.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_nearest_fill_for_missing_x() {
        let a = LineData::new("a", "A").with_data(vec![
            DataPoint::new().with("x", 0).with("value", 1.0),
            DataPoint::new().with("x", 10).with("value", 2.0),
        ]);
        let b = LineData::new("b", "B").with_data(vec![DataPoint::new().with("x", 4).with("value", 9.0)]);
        let aligned = sample_multiple_lines(&[a, b], 1.0, "x");

        // Unified axis is 0, 4, 10; series a fills x=4 with its nearest row (x=0)
        let a_values: Vec<f64> = aligned.lines[0].data.iter().filter_map(|p| p.number("value")).collect();
        assert_eq!(a_values, vec![1.0, 1.0, 2.0]);
        let b_values: Vec<f64> = aligned.lines[1].data.iter().filter_map(|p| p.number("value")).collect();
        assert_eq!(b_values, vec![9.0, 9.0, 9.0]);
    }

    #[test]
    fn test_defaults_and_empty_series() {
        let lines = vec![LineData::default(), numeric_line("b", 5, 1)];
        let aligned = sample_multiple_lines(&lines, 1.0, "x");

        assert_eq!(aligned.lines[0].id, "line-0");
        assert_eq!(aligned.lines[0].label, "Line 0");
        assert!(aligned.lines[0].is_empty());
        assert_eq!(aligned.lines[1].id, "b");
        assert_eq!(aligned.lines[1].len(), 5);
    }

    #[test]
    fn test_points_without_x_skipped() {
        let mut line = numeric_line("a", 5, 1);
        line.data.push(DataPoint::new().with("value", 99.0));
        let aligned = sample_multiple_lines(&[line], 1.0, "x");

        assert_eq!(aligned.lines[0].len(), 5);
        assert_eq!(aligned.metadata.unwrap().original_points, 6);
    }

    #[test]
    fn test_empty_input() {
        let aligned = sample_multiple_lines(&[], 0.5, "x");
        assert!(aligned.lines.is_empty());
        assert!(aligned.metadata.is_none());
    }

    #[test]
    fn test_find_nearest_point() {
        let data = vec![
            DataPoint::new().with("x", 0).with("value", 1.0),
            DataPoint::new().with("value", 5.0),
            DataPoint::new().with("x", 10).with("value", 2.0),
        ];
        let nearest = find_nearest_point(&data, "8", "x").unwrap();
        assert_eq!(nearest.number("value"), Some(2.0));
        assert!(find_nearest_point(&[], "8", "x").is_none());
    }

    #[test]
    fn test_sample_large_dataset() {
        let small: Vec<DataPoint> = (0..1000).map(|i| DataPoint::new().with("x", i)).collect();
        assert_eq!(sample_large_dataset(&small, 0.1).len(), 1000);

        let large: Vec<DataPoint> = (0..5000).map(|i| DataPoint::new().with("x", i)).collect();
        let thinned = sample_large_dataset(&large, 0.1);
        assert!(thinned.len() <= 500);
        assert!(thinned.len() > 400);
        assert_eq!(thinned.first(), large.first());
        assert_eq!(thinned.last(), large.last());
    }
}
