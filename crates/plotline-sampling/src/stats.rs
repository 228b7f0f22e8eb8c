//! Volatility estimation, summary statistics and algorithm benchmarking

use crate::sample_with_metrics;
use plotline_core::{
    AnalysisOutcome, BenchmarkEntry, BenchmarkOutcome, DataPoint, DataStatistics, SamplingAlgorithm,
    SamplingConfig,
};

/// Below this coefficient of variation data counts as calm
pub const LOW_VOLATILITY: f64 = 0.2;
/// Above this coefficient of variation data counts as spiky
pub const HIGH_VOLATILITY: f64 = 0.8;

/// Population standard deviation over `|mean|`.
///
/// Fewer than two values give `Some(0.0)`; a zero mean or non-finite
/// result gives `None`.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return Some(0.0);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let cv = variance.sqrt() / mean.abs();

    cv.is_finite().then_some(cv)
}

fn numeric_values(data: &[DataPoint], y_key: &str) -> Vec<f64> {
    data.iter().filter_map(|p| p.number(y_key)).collect()
}

/// Coefficient of variation of a field, skipping non-numeric values
pub fn calculate_volatility(data: &[DataPoint], y_key: &str) -> Option<f64> {
    coefficient_of_variation(&numeric_values(data, y_key))
}

/// Algorithm suited to data of the given volatility
pub fn recommend_algorithm(volatility: Option<f64>) -> SamplingAlgorithm {
    match volatility {
        Some(cv) if cv < LOW_VOLATILITY => SamplingAlgorithm::Uniform,
        Some(cv) if cv > HIGH_VOLATILITY => SamplingAlgorithm::Peaks,
        _ => SamplingAlgorithm::Lttb,
    }
}

pub fn analyze(data: &[DataPoint], y_key: &str) -> AnalysisOutcome {
    let volatility = calculate_volatility(data, y_key);
    AnalysisOutcome {
        success: true,
        volatility,
        data_length: data.len(),
        recommended_algorithm: recommend_algorithm(volatility),
    }
}

/// Min, max, mean, median and population std of a field
pub fn calculate_statistics(data: &[DataPoint], y_key: &str) -> DataStatistics {
    let mut values = numeric_values(data, y_key);
    if values.is_empty() {
        return DataStatistics::default();
    }

    values.sort_by(f64::total_cmp);
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let mid = count / 2;
    let median = if count % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

    DataStatistics {
        min: values[0],
        max: values[count - 1],
        mean,
        median,
        std: variance.sqrt(),
        count,
    }
}

/// Run each algorithm over the same data with the keys and budget of `base`
pub fn benchmark_sampling(
    data: &[DataPoint],
    algorithms: &[SamplingAlgorithm],
    base: &SamplingConfig,
) -> BenchmarkOutcome {
    let results = algorithms
        .iter()
        .map(|&algorithm| {
            let config = SamplingConfig {
                algorithm,
                ..base.clone()
            };
            let outcome = sample_with_metrics(data, &config);
            tracing::debug!(
                %algorithm,
                time_ms = outcome.processing_time,
                points = outcome.sampled_length,
                "benchmark run"
            );
            BenchmarkEntry {
                algorithm,
                processing_time: outcome.processing_time,
                compression_ratio: outcome.compression_ratio,
                sampled_points: outcome.sampled_length,
                success: outcome.success,
            }
        })
        .collect();

    BenchmarkOutcome { results }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<DataPoint> {
        values.iter().map(|&v| DataPoint::new().with("value", v)).collect()
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert_eq!(coefficient_of_variation(&[]), Some(0.0));
        assert_eq!(coefficient_of_variation(&[5.0]), Some(0.0));
        assert_eq!(coefficient_of_variation(&[2.0, 2.0, 2.0]), Some(0.0));
        assert_eq!(coefficient_of_variation(&[-1.0, 1.0]), None);

        let cv = coefficient_of_variation(&[1.0, 3.0]).unwrap();
        assert!((cv - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_recommend_algorithm() {
        assert_eq!(recommend_algorithm(Some(0.1)), SamplingAlgorithm::Uniform);
        assert_eq!(recommend_algorithm(Some(0.5)), SamplingAlgorithm::Lttb);
        assert_eq!(recommend_algorithm(Some(1.5)), SamplingAlgorithm::Peaks);
        assert_eq!(recommend_algorithm(None), SamplingAlgorithm::Lttb);
    }

    #[test]
    fn test_analyze_skips_invalid_values() {
        let mut data = series(&[1.0, 3.0]);
        data.push(DataPoint::new().with("value", "n/a"));

        let outcome = analyze(&data, "value");
        assert_eq!(outcome.data_length, 3);
        assert!((outcome.volatility.unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(outcome.recommended_algorithm, SamplingAlgorithm::Lttb);
    }

    #[test]
    fn test_analyze_zero_mean_serializes_null() {
        let outcome = analyze(&series(&[-2.0, 2.0]), "value");
        assert_eq!(outcome.volatility, None);
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains(r#""volatility":null"#));
    }

    #[test]
    fn test_statistics() {
        let stats = calculate_statistics(&series(&[4.0, 1.0, 3.0, 2.0]), "value");
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.count, 4);
        assert!((stats.std - 1.25f64.sqrt()).abs() < 1e-12);

        assert_eq!(calculate_statistics(&[], "value"), DataStatistics::default());
    }

    #[test]
    fn test_benchmark_covers_each_algorithm() {
        let data: Vec<DataPoint> = (0..2000)
            .map(|i| DataPoint::new().with("x", i).with("value", (i as f64 * 0.1).sin()))
            .collect();
        let algorithms = [SamplingAlgorithm::Uniform, SamplingAlgorithm::Lttb];
        let outcome = benchmark_sampling(&data, &algorithms, &SamplingConfig::new(SamplingAlgorithm::Lttb, 100));

        assert_eq!(outcome.results.len(), 2);
        for entry in &outcome.results {
            assert!(entry.success);
            assert_eq!(entry.sampled_points, 100);
            assert_eq!(entry.compression_ratio, 20.0);
        }
    }
}
