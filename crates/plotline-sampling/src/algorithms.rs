//! Point-selection algorithms.
//!
//! Every function here works on already-validated points and returns
//! ascending, de-duplicated indices into its input. Callers map the indices
//! back to the original rows, so output is always a subsequence.

use crate::stats::coefficient_of_variation;
use plotline_core::{Point2D, SamplingAlgorithm, perpendicular_distance, triangle_area};
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

/// Doubling rounds before Douglas-Peucker gives up on its tolerance
const MAX_EPSILON_DOUBLINGS: usize = 32;

// ============================================================================
// STRATEGY PATTERN: Sampler Trait
// ============================================================================

/// Strategy trait for point reduction
pub trait Sampler: Send + Sync {
    fn algorithm(&self) -> SamplingAlgorithm;

    /// Pick at most `target` indices of `points`, ascending
    fn select(&self, points: &[Point2D], target: usize) -> Vec<usize>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UniformSampler;

impl Sampler for UniformSampler {
    fn algorithm(&self) -> SamplingAlgorithm {
        SamplingAlgorithm::Uniform
    }

    fn select(&self, points: &[Point2D], target: usize) -> Vec<usize> {
        uniform_indices(points.len(), target)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PeakSampler;

impl Sampler for PeakSampler {
    fn algorithm(&self) -> SamplingAlgorithm {
        SamplingAlgorithm::Peaks
    }

    fn select(&self, points: &[Point2D], target: usize) -> Vec<usize> {
        peak_indices(points, target)
    }
}

/// Douglas-Peucker with a tolerance in data units
#[derive(Debug, Clone, Copy)]
pub struct DouglasPeuckerSampler {
    pub epsilon: f64,
}

impl Default for DouglasPeuckerSampler {
    fn default() -> Self {
        Self {
            epsilon: plotline_core::DEFAULT_EPSILON,
        }
    }
}

impl Sampler for DouglasPeuckerSampler {
    fn algorithm(&self) -> SamplingAlgorithm {
        SamplingAlgorithm::DouglasPeucker
    }

    /// Runs the tolerance pass even when `points` already fits the budget.
    /// If the pass keeps too many points, epsilon is doubled and the pass
    /// repeated; as a last resort the kept set is uniformly thinned.
    fn select(&self, points: &[Point2D], target: usize) -> Vec<usize> {
        if target == 0 || points.is_empty() {
            return Vec::new();
        }

        let mut epsilon = self.epsilon;
        let mut kept = douglas_peucker_indices(points, epsilon);

        for _ in 0..MAX_EPSILON_DOUBLINGS {
            if kept.len() <= target {
                return kept;
            }
            epsilon = (epsilon * 2.0).max(f64::EPSILON);
            tracing::debug!(epsilon, kept = kept.len(), target, "douglas-peucker over budget, widening tolerance");
            kept = douglas_peucker_indices(points, epsilon);
        }

        if kept.len() <= target {
            return kept;
        }
        uniform_indices(kept.len(), target)
            .into_iter()
            .map(|i| kept[i])
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VisvalingamSampler;

impl Sampler for VisvalingamSampler {
    fn algorithm(&self) -> SamplingAlgorithm {
        SamplingAlgorithm::Visvalingam
    }

    fn select(&self, points: &[Point2D], target: usize) -> Vec<usize> {
        visvalingam_indices(points, target)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LttbSampler;

impl Sampler for LttbSampler {
    fn algorithm(&self) -> SamplingAlgorithm {
        SamplingAlgorithm::Lttb
    }

    fn select(&self, points: &[Point2D], target: usize) -> Vec<usize> {
        lttb_indices(points, target)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveSampler;

impl Sampler for AdaptiveSampler {
    fn algorithm(&self) -> SamplingAlgorithm {
        SamplingAlgorithm::Adaptive
    }

    fn select(&self, points: &[Point2D], target: usize) -> Vec<usize> {
        adaptive_indices(points, target)
    }
}

/// Picks uniform, peaks or LTTB from the volatility of the data
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridSampler;

impl HybridSampler {
    /// Delegate chosen for `points`
    pub fn choose(points: &[Point2D]) -> SamplingAlgorithm {
        let values: Vec<f64> = points.iter().map(|p| p.y).collect();
        crate::stats::recommend_algorithm(coefficient_of_variation(&values))
    }
}

impl Sampler for HybridSampler {
    fn algorithm(&self) -> SamplingAlgorithm {
        SamplingAlgorithm::Hybrid
    }

    fn select(&self, points: &[Point2D], target: usize) -> Vec<usize> {
        if points.len() <= target {
            return (0..points.len()).collect();
        }

        match Self::choose(points) {
            SamplingAlgorithm::Uniform => uniform_indices(points.len(), target),
            SamplingAlgorithm::Peaks => peak_indices(points, target),
            _ => lttb_indices(points, target),
        }
    }
}

/// Sampler for an algorithm, with Douglas-Peucker using `epsilon`
pub fn sampler_for(algorithm: SamplingAlgorithm, epsilon: f64) -> Box<dyn Sampler> {
    match algorithm {
        SamplingAlgorithm::Uniform => Box::new(UniformSampler),
        SamplingAlgorithm::Peaks => Box::new(PeakSampler),
        SamplingAlgorithm::DouglasPeucker => Box::new(DouglasPeuckerSampler { epsilon }),
        SamplingAlgorithm::Visvalingam => Box::new(VisvalingamSampler),
        SamplingAlgorithm::Lttb => Box::new(LttbSampler),
        SamplingAlgorithm::Adaptive => Box::new(AdaptiveSampler),
        SamplingAlgorithm::Hybrid => Box::new(HybridSampler),
    }
}

// ============================================================================
// UNIFORM
// ============================================================================

/// Evenly spaced indices; first and last slots pinned to the endpoints
pub fn uniform_indices(len: usize, target: usize) -> Vec<usize> {
    if len == 0 || target == 0 {
        return Vec::new();
    }
    if len <= target {
        return (0..len).collect();
    }
    if target == 1 {
        return vec![0];
    }

    let step = len as f64 / target as f64;
    let mut indices: Vec<usize> = (0..target)
        .map(|i| ((i as f64 * step).round() as usize).min(len - 1))
        .collect();

    indices[0] = 0;
    indices[target - 1] = len - 1;
    indices.dedup();
    indices
}

// ============================================================================
// PEAK-PRESERVING
// ============================================================================

/// Keep the most prominent local extrema, then fill gaps uniformly
pub fn peak_indices(points: &[Point2D], target: usize) -> Vec<usize> {
    let n = points.len();
    if target == 0 {
        return Vec::new();
    }
    if n <= target {
        return (0..n).collect();
    }
    if n <= 3 || target < 3 {
        return uniform_indices(n, target);
    }

    let mut extrema: Vec<(usize, f64)> = (1..n - 1)
        .filter_map(|i| {
            let (prev, curr, next) = (points[i - 1].y, points[i].y, points[i + 1].y);
            let is_peak = curr > prev && curr > next;
            let is_valley = curr < prev && curr < next;
            (is_peak || is_valley).then(|| (i, (curr - (prev + next) / 2.0).abs()))
        })
        .collect();

    // Stable, so equal scores keep discovery order
    extrema.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut selected: BTreeSet<usize> = BTreeSet::from([0, n - 1]);
    selected.extend(extrema.iter().take(target - 2).map(|&(i, _)| i));

    if selected.len() < target {
        let remaining = target - selected.len();
        let step = n as f64 / remaining as f64;
        for i in 1..remaining {
            let index = (i as f64 * step).round() as usize;
            if index < n {
                selected.insert(index);
            }
        }
    }

    selected.into_iter().collect()
}

// ============================================================================
// DOUGLAS-PEUCKER
// ============================================================================

/// Tolerance pass of Douglas-Peucker, using an explicit stack
pub fn douglas_peucker_indices(points: &[Point2D], epsilon: f64) -> Vec<usize> {
    let n = points.len();
    if n < 3 {
        return (0..n).collect();
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0usize, n - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }

        let (mut max_distance, mut split) = (0.0f64, start);
        for i in start + 1..end {
            let d = perpendicular_distance(&points[i], &points[start], &points[end]);
            if d > max_distance {
                max_distance = d;
                split = i;
            }
        }

        if max_distance > epsilon {
            keep[split] = true;
            stack.push((split, end));
            stack.push((start, split));
        }
    }

    keep.iter()
        .enumerate()
        .filter_map(|(i, &k)| k.then_some(i))
        .collect()
}

// ============================================================================
// VISVALINGAM-WHYATT
// ============================================================================

/// Removal candidate; the heap pops the smallest area, lowest index first
#[derive(Debug, Clone, Copy)]
struct Candidate {
    area: f64,
    index: usize,
    version: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .area
            .total_cmp(&self.area)
            .then_with(|| other.index.cmp(&self.index))
            .then_with(|| other.version.cmp(&self.version))
    }
}

/// Repeatedly drop the point whose triangle with its current neighbours is
/// smallest, recomputing the neighbours' areas after each removal
pub fn visvalingam_indices(points: &[Point2D], target: usize) -> Vec<usize> {
    let n = points.len();
    if target == 0 {
        return Vec::new();
    }
    if n <= target {
        return (0..n).collect();
    }
    if target == 1 {
        return vec![0];
    }

    let mut prev: Vec<usize> = (0..n).map(|i| i.saturating_sub(1)).collect();
    let mut next: Vec<usize> = (0..n).map(|i| (i + 1).min(n - 1)).collect();
    let mut removed = vec![false; n];
    let mut version = vec![0u32; n];

    let mut heap: BinaryHeap<Candidate> = (1..n - 1)
        .map(|i| Candidate {
            area: triangle_area(&points[i - 1], &points[i], &points[i + 1]),
            index: i,
            version: 0,
        })
        .collect();

    let mut remaining = n;
    while remaining > target {
        let Some(candidate) = heap.pop() else {
            break;
        };
        let i = candidate.index;
        if removed[i] || candidate.version != version[i] {
            continue;
        }

        removed[i] = true;
        remaining -= 1;

        let (p, q) = (prev[i], next[i]);
        next[p] = q;
        prev[q] = p;

        for neighbour in [p, q] {
            if neighbour == 0 || neighbour == n - 1 {
                continue;
            }
            version[neighbour] += 1;
            heap.push(Candidate {
                area: triangle_area(
                    &points[prev[neighbour]],
                    &points[neighbour],
                    &points[next[neighbour]],
                ),
                index: neighbour,
                version: version[neighbour],
            });
        }
    }

    (0..n).filter(|&i| !removed[i]).collect()
}

// ============================================================================
// LARGEST-TRIANGLE-THREE-BUCKETS
// ============================================================================

/// LTTB: one point per bucket, maximizing the triangle formed with the
/// previous pick and the average of the next bucket
pub fn lttb_indices(points: &[Point2D], target: usize) -> Vec<usize> {
    let n = points.len();
    if target == 0 {
        return Vec::new();
    }
    if n <= target {
        return (0..n).collect();
    }
    if target == 1 {
        return vec![0];
    }
    if target == 2 {
        return vec![0, n - 1];
    }

    let bucket_size = (n - 2) as f64 / (target - 2) as f64;
    let bucket_bound = |i: usize| ((i as f64 * bucket_size).floor() as usize + 1).min(n - 1);

    let mut sampled = Vec::with_capacity(target);
    sampled.push(0);
    let mut a = 0usize;

    for bucket in 0..target - 2 {
        let start = bucket_bound(bucket);
        let end = bucket_bound(bucket + 1).max(start + 1).min(n - 1);

        // Average of the following bucket; the last bucket looks at the final point
        let avg_start = end;
        let avg_end = if bucket + 1 == target - 2 {
            n
        } else {
            bucket_bound(bucket + 2).max(avg_start + 1)
        };
        let span = &points[avg_start.min(n - 1)..avg_end.min(n)];
        let count = span.len().max(1) as f64;
        let avg_x = span.iter().map(|p| p.x).sum::<f64>() / count;
        let avg_y = span.iter().map(|p| p.y).sum::<f64>() / count;

        let anchor = points[a];
        let mut max_area = -1.0f64;
        let mut max_index = start;
        for j in start..end {
            let area = ((anchor.x - avg_x) * (points[j].y - anchor.y)
                - (anchor.x - points[j].x) * (avg_y - anchor.y))
                .abs();
            if area > max_area {
                max_area = area;
                max_index = j;
            }
        }

        sampled.push(max_index);
        a = max_index;
    }

    sampled.push(n - 1);
    sampled
}

// ============================================================================
// ADAPTIVE
// ============================================================================

/// Density follows the rate of change: emit a point each time cumulative
/// `|dy| + 0.1` crosses the next threshold
pub fn adaptive_indices(points: &[Point2D], target: usize) -> Vec<usize> {
    let n = points.len();
    if target == 0 {
        return Vec::new();
    }
    if n <= target {
        return (0..n).collect();
    }
    if target == 1 {
        return vec![0];
    }

    let weights: Vec<f64> = points.windows(2).map(|w| (w[1].y - w[0].y).abs() + 0.1).collect();
    let total: f64 = weights.iter().sum();
    let step = total / (target - 1) as f64;

    let mut sampled = Vec::with_capacity(target);
    sampled.push(0);

    let mut cumulative = 0.0;
    let mut threshold = step;
    for i in 1..n - 1 {
        if sampled.len() >= target - 1 {
            break;
        }
        cumulative += weights[i - 1];
        if cumulative >= threshold {
            sampled.push(i);
            threshold += step;
        }
    }

    sampled.push(n - 1);
    sampled
}
