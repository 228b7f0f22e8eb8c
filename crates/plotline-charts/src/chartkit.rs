//! # chartkit
//!
//! Core chart primitives: scales, tick generation, axis label formatters.
//! Scales are immutable after construction and safe to share across threads.

use chrono::{DateTime, Utc};

// ============================================================================
// STRATEGY PATTERN: Scale Trait
// ============================================================================

/// Strategy trait for scales (maps domain values to pixel range values)
pub trait Scale: Send + Sync {
    type Value;

    /// Scale a value from domain to range
    fn scale(&self, value: Self::Value) -> f64;

    /// Inverse scale (range to domain)
    fn invert(&self, pixel: f64) -> Self::Value;

    fn domain_bounds(&self) -> (Self::Value, Self::Value);

    fn range_bounds(&self) -> (f64, f64);

    /// Evenly spaced domain values, endpoints included
    fn ticks(&self, count: usize) -> Vec<Self::Value>;
}

/// Shared mapping: degenerate domains pin to `r0`, no clamping
fn interpolate(value: f64, (d0, d1): (f64, f64), (r0, r1): (f64, f64)) -> f64 {
    if d1 == d0 {
        return r0;
    }
    r0 + ((value - d0) / (d1 - d0)) * (r1 - r0)
}

// ============================================================================
// LINEAR SCALE
// ============================================================================

/// Linear scale (D3-style continuous scale)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    pub fn new() -> Self {
        Self {
            domain: (0.0, 1.0),
            range: (0.0, 1.0),
        }
    }

    pub fn domain(mut self, min: f64, max: f64) -> Self {
        self.domain = (min, max);
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = (min, max);
        self
    }

    /// Generate "nice" tick values (rounded to clean numbers)
    pub fn nice_ticks(&self, count: usize) -> Vec<f64> {
        let (min, max) = (self.domain.0.min(self.domain.1), self.domain.0.max(self.domain.1));
        let span = max - min;

        if span == 0.0 || count == 0 || !span.is_finite() {
            return vec![min];
        }

        let rough_step = span / count as f64;
        let magnitude = 10.0_f64.powf(rough_step.log10().floor());
        let residual = rough_step / magnitude;

        let nice_step = if residual <= 1.0 {
            magnitude
        } else if residual <= 2.0 {
            2.0 * magnitude
        } else if residual <= 5.0 {
            5.0 * magnitude
        } else {
            10.0 * magnitude
        };

        let first = (min / nice_step).ceil() as i64;
        let last = (max / nice_step).floor() as i64;
        (first..=last).map(|i| i as f64 * nice_step).collect()
    }
}

impl Default for LinearScale {
    fn default() -> Self {
        Self::new()
    }
}

impl Scale for LinearScale {
    type Value = f64;

    fn scale(&self, value: f64) -> f64 {
        interpolate(value, self.domain, self.range)
    }

    fn invert(&self, pixel: f64) -> f64 {
        let (d0, _) = self.domain;
        let (r0, r1) = self.range;
        if r1 == r0 {
            return d0;
        }
        interpolate(pixel, self.range, self.domain)
    }

    fn domain_bounds(&self) -> (f64, f64) {
        self.domain
    }

    fn range_bounds(&self) -> (f64, f64) {
        self.range
    }

    fn ticks(&self, count: usize) -> Vec<f64> {
        let (min, max) = self.domain;
        if count <= 1 {
            return vec![min];
        }

        let step = (max - min) / (count - 1) as f64;
        (0..count).map(|i| min + step * i as f64).collect()
    }
}

// ============================================================================
// TIME SCALE
// ============================================================================

/// Time scale (maps instants to pixel positions via epoch milliseconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    domain: (DateTime<Utc>, DateTime<Utc>),
    range: (f64, f64),
}

impl TimeScale {
    pub fn new() -> Self {
        Self {
            domain: (DateTime::<Utc>::UNIX_EPOCH, DateTime::<Utc>::UNIX_EPOCH),
            range: (0.0, 1.0),
        }
    }

    pub fn domain(mut self, min: DateTime<Utc>, max: DateTime<Utc>) -> Self {
        self.domain = (min, max);
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = (min, max);
        self
    }

    fn domain_millis(&self) -> (f64, f64) {
        (
            self.domain.0.timestamp_millis() as f64,
            self.domain.1.timestamp_millis() as f64,
        )
    }

    /// Scale a raw epoch-millisecond value
    pub fn scale_millis(&self, millis: f64) -> f64 {
        interpolate(millis, self.domain_millis(), self.range)
    }

    fn instant_at(&self, millis: f64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis.round() as i64).unwrap_or(self.domain.0)
    }
}

impl Default for TimeScale {
    fn default() -> Self {
        Self::new()
    }
}

impl Scale for TimeScale {
    type Value = DateTime<Utc>;

    fn scale(&self, value: DateTime<Utc>) -> f64 {
        self.scale_millis(value.timestamp_millis() as f64)
    }

    fn invert(&self, pixel: f64) -> DateTime<Utc> {
        let (r0, r1) = self.range;
        if r1 == r0 {
            return self.domain.0;
        }
        self.instant_at(interpolate(pixel, self.range, self.domain_millis()))
    }

    fn domain_bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        self.domain
    }

    fn range_bounds(&self) -> (f64, f64) {
        self.range
    }

    fn ticks(&self, count: usize) -> Vec<DateTime<Utc>> {
        let (min, max) = self.domain_millis();
        if count <= 1 {
            return vec![self.domain.0];
        }

        let step = (max - min) / (count - 1) as f64;
        (0..count).map(|i| self.instant_at(min + step * i as f64)).collect()
    }
}

/// Build a linear scale from a domain and a pixel range
pub fn create_linear_scale(domain: (f64, f64), range: (f64, f64)) -> LinearScale {
    LinearScale::new().domain(domain.0, domain.1).range(range.0, range.1)
}

/// Build a time scale from a date domain and a pixel range
pub fn create_time_scale(domain: (DateTime<Utc>, DateTime<Utc>), range: (f64, f64)) -> TimeScale {
    TimeScale::new().domain(domain.0, domain.1).range(range.0, range.1)
}

// ============================================================================
// X AXIS: numeric or temporal
// ============================================================================

/// Domain of an X axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XDomain {
    Numeric(f64, f64),
    Time(DateTime<Utc>, DateTime<Utc>),
}

impl XDomain {
    /// Domain bounds as plain numbers (epoch millis for time)
    pub fn as_f64(&self) -> (f64, f64) {
        match self {
            Self::Numeric(min, max) => (*min, *max),
            Self::Time(min, max) => (min.timestamp_millis() as f64, max.timestamp_millis() as f64),
        }
    }

    pub fn is_time(&self) -> bool {
        matches!(self, Self::Time(..))
    }
}

/// X scale of a processed chart
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XScale {
    Linear(LinearScale),
    Time(TimeScale),
}

impl XScale {
    pub fn from_domain(domain: XDomain, range: (f64, f64)) -> Self {
        match domain {
            XDomain::Numeric(min, max) => Self::Linear(create_linear_scale((min, max), range)),
            XDomain::Time(min, max) => Self::Time(create_time_scale((min, max), range)),
        }
    }

    /// Scale a numeric X (epoch millis for time scales)
    pub fn scale_value(&self, value: f64) -> f64 {
        match self {
            Self::Linear(scale) => scale.scale(value),
            Self::Time(scale) => scale.scale_millis(value),
        }
    }

    pub fn range_bounds(&self) -> (f64, f64) {
        match self {
            Self::Linear(scale) => scale.range_bounds(),
            Self::Time(scale) => scale.range_bounds(),
        }
    }

    pub fn domain(&self) -> XDomain {
        match self {
            Self::Linear(scale) => {
                let (min, max) = scale.domain_bounds();
                XDomain::Numeric(min, max)
            }
            Self::Time(scale) => {
                let (min, max) = scale.domain_bounds();
                XDomain::Time(min, max)
            }
        }
    }
}

// ============================================================================
// AXIS LABELS
// ============================================================================

/// Compact number label: K/M/B suffixes, two decimals
pub fn format_large_number(num: f64) -> String {
    let abs = num.abs();
    let sign = if num < 0.0 { "-" } else { "" };

    let (scaled, suffix) = if abs >= 1e9 {
        (abs / 1e9, "B")
    } else if abs >= 1e6 {
        (abs / 1e6, "M")
    } else if abs >= 1e3 {
        (abs / 1e3, "K")
    } else {
        (abs, "")
    };
    format!("{}{:.2}{}", sign, scaled, suffix)
}

/// Date label whose precision follows the span of the axis
pub fn format_time(instant: DateTime<Utc>, span_ms: f64) -> String {
    const DAY_MS: f64 = 86_400_000.0;

    if span_ms >= DAY_MS * 365.0 {
        instant.format("%Y-%m").to_string()
    } else if span_ms >= DAY_MS {
        instant.format("%b %d").to_string()
    } else {
        instant.format("%H:%M").to_string()
    }
}

/// A labelled tick at a pixel position
#[derive(Debug, Clone, PartialEq)]
pub struct AxisTick {
    pub position: f64,
    pub label: String,
}

/// Nice values of a linear axis with compact number labels
pub fn linear_axis_ticks(scale: &LinearScale, count: usize) -> Vec<AxisTick> {
    scale
        .nice_ticks(count)
        .into_iter()
        .map(|value| AxisTick {
            position: scale.scale(value),
            label: format_large_number(value),
        })
        .collect()
}

impl XScale {
    /// About `count` labelled ticks; time axes are split evenly
    pub fn axis_ticks(&self, count: usize) -> Vec<AxisTick> {
        match self {
            Self::Linear(scale) => linear_axis_ticks(scale, count),
            Self::Time(scale) => {
                let (start, end) = scale.domain_bounds();
                let span = (end - start).num_milliseconds().abs() as f64;
                scale
                    .ticks(count)
                    .into_iter()
                    .map(|instant| AxisTick {
                        position: scale.scale(instant),
                        label: format_time(instant, span),
                    })
                    .collect()
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_linear_scale() {
        let scale = create_linear_scale((0.0, 100.0), (0.0, 200.0));

        assert_eq!(scale.scale(0.0), 0.0);
        assert_eq!(scale.scale(50.0), 100.0);
        assert_eq!(scale.scale(100.0), 200.0);
    }

    #[test]
    fn test_linear_scale_extrapolates() {
        let scale = create_linear_scale((0.0, 10.0), (0.0, 100.0));
        assert_eq!(scale.scale(20.0), 200.0);
        assert_eq!(scale.scale(-5.0), -50.0);
    }

    #[test]
    fn test_linear_scale_degenerate_domain() {
        let scale = create_linear_scale((5.0, 5.0), (10.0, 90.0));
        assert_eq!(scale.scale(5.0), 10.0);
        assert_eq!(scale.scale(1000.0), 10.0);
    }

    #[test]
    fn test_linear_scale_invert() {
        let scale = create_linear_scale((0.0, 100.0), (0.0, 500.0));
        assert_eq!(scale.invert(250.0), 50.0);

        let flat = create_linear_scale((3.0, 9.0), (7.0, 7.0));
        assert_eq!(flat.invert(100.0), 3.0);
    }

    #[test]
    fn test_inverted_range() {
        let scale = create_linear_scale((0.0, 10.0), (260.0, 20.0));
        assert_eq!(scale.scale(0.0), 260.0);
        assert_eq!(scale.scale(10.0), 20.0);
    }

    #[test]
    fn test_time_scale() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap();
        let mid = Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap();
        let scale = create_time_scale((start, end), (0.0, 100.0));

        assert_eq!(scale.scale(mid), 50.0);
        assert_eq!(scale.invert(50.0), mid);
        assert_eq!(scale.ticks(3), vec![start, mid, end]);
    }

    #[test]
    fn test_time_scale_zero_span() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let scale = create_time_scale((t, t), (30.0, 300.0));
        let later = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(scale.scale(t), 30.0);
        assert_eq!(scale.scale(later), 30.0);
    }

    #[test]
    fn test_nice_ticks() {
        let scale = create_linear_scale((0.0, 97.0), (0.0, 1.0));
        assert_eq!(scale.nice_ticks(5), vec![0.0, 20.0, 40.0, 60.0, 80.0]);
    }

    #[test]
    fn test_x_scale_dispatch() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let scale = XScale::from_domain(XDomain::Time(t0, t1), (0.0, 10.0));
        let mid = (t0.timestamp_millis() + t1.timestamp_millis()) as f64 / 2.0;

        assert_eq!(scale.scale_value(mid), 5.0);
        assert!(scale.domain().is_time());
    }

    #[test]
    fn test_format_large_number() {
        assert_eq!(format_large_number(2_500.0), "2.50K");
        assert_eq!(format_large_number(-3_000_000.0), "-3.00M");
        assert_eq!(format_large_number(42.0), "42.00");
    }

    #[test]
    fn test_format_time_precision() {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let hour = 3_600_000.0;
        assert_eq!(format_time(t, hour), "14:05");
        assert_eq!(format_time(t, hour * 24.0 * 30.0), "Mar 09");
        assert_eq!(format_time(t, hour * 24.0 * 400.0), "2024-03");
    }

    #[test]
    fn test_linear_axis_ticks() {
        let scale = create_linear_scale((0.0, 2000.0), (200.0, 0.0));
        let ticks = linear_axis_ticks(&scale, 4);
        assert_eq!(ticks.first(), Some(&AxisTick { position: 200.0, label: "0.00".into() }));
        assert_eq!(ticks.last(), Some(&AxisTick { position: 0.0, label: "2.00K".into() }));
    }

    #[test]
    fn test_time_axis_ticks() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();
        let ticks = XScale::from_domain(XDomain::Time(t0, t1), (0.0, 100.0)).axis_ticks(3);
        let labels: Vec<&str> = ticks.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["00:00", "01:00", "02:00"]);
        assert_eq!(ticks[1].position, 50.0);
    }
}
