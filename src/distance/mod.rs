//! # Distance Functions
//!
//! Pointwise distance metrics of the Minkowski family, evaluated over a subset
//! of columns. Missing cells (any non-finite value, `NaN` by convention) are
//! skipped instead of being treated as zero, so a row pair sharing no present
//! column has distance `0`.
//!
//! [`EuclideanDistance`] and [`ManhattanDistance`] are named specializations of
//! [`MinkowskiDistance`] and go through the same accumulation routine, so their
//! results are bit-identical to `Minkowski(2)` and `Minkowski(1)`.
//!
//! For `p > 1` the power sum is accumulated relative to the largest absolute
//! difference, like `f64::hypot`, so finite inputs never overflow to `inf`.
//! Column indices must lie inside both rows.

use crate::error::{MdsError, MdsResult};
use crate::utils::is_present;
use ndarray::ArrayView1;

pub trait DistanceFunction: Send + Sync {
    /// Distance between `a` and `b` restricted to `columns`.
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>, columns: &[usize]) -> f64;

    /// Distance between `a` and `b` over all of `a`'s columns.
    fn distance_all(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64;

    /// Squared distance, as used to fill pivot matrices.
    fn squared_distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let d = self.distance_all(a, b);
        d * d
    }
}

/// `(largest |x - y|, Σ (|x - y| / largest)^p)` over present cell pairs.
#[inline]
fn scaled_power_sum<It>(power: u32, pairs: It) -> (f64, f64)
where
    It: Iterator<Item = (f64, f64)> + Clone,
{
    let present = pairs.filter(|&(x, y)| is_present(x) && is_present(y));
    let largest = present
        .clone()
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max);
    if largest == 0.0 {
        return (0.0, 0.0);
    }
    let sum = present
        .map(|(x, y)| {
            let r = (x - y).abs() / largest;
            match power {
                2 => r * r,
                p => r.powi(p as i32),
            }
        })
        .sum();
    (largest, sum)
}

#[inline]
fn minkowski_pairs<It>(power: u32, pairs: It) -> f64
where
    It: Iterator<Item = (f64, f64)> + Clone,
{
    if power == 1 {
        return pairs
            .filter(|&(x, y)| is_present(x) && is_present(y))
            .map(|(x, y)| (x - y).abs())
            .sum();
    }
    let (largest, sum) = scaled_power_sum(power, pairs);
    if largest == 0.0 {
        return 0.0;
    }
    match power {
        2 => largest * sum.sqrt(),
        p => largest * sum.powf(1.0 / p as f64),
    }
}

fn column_pairs<'a>(
    a: ArrayView1<'a, f64>,
    b: ArrayView1<'a, f64>,
    columns: &'a [usize],
) -> impl Iterator<Item = (f64, f64)> + Clone + 'a {
    debug_assert!(
        columns.iter().all(|&c| c < a.len() && c < b.len()),
        "column index outside rows of length {} and {}",
        a.len(),
        b.len()
    );
    columns
        .iter()
        .filter_map(move |&c| Some((*a.get(c)?, *b.get(c)?)))
}

fn all_pairs<'a>(
    a: ArrayView1<'a, f64>,
    b: ArrayView1<'a, f64>,
) -> impl Iterator<Item = (f64, f64)> + Clone + 'a {
    a.into_iter().copied().zip(b.into_iter().copied())
}

fn minkowski(power: u32, a: ArrayView1<f64>, b: ArrayView1<f64>, columns: &[usize]) -> f64 {
    minkowski_pairs(power, column_pairs(a.view(), b.view(), columns))
}

/// Generalized Minkowski distance `(Σ |a_i - b_i|^p)^(1/p)`, `p ≥ 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MinkowskiDistance {
    power: u32,
}

impl MinkowskiDistance {
    pub fn new(power: u32) -> MdsResult<Self> {
        if power == 0 {
            return Err(MdsError::InvalidParameter {
                name: "power",
                reason: "Minkowski power must be a positive integer".to_string(),
            });
        }
        Ok(Self { power })
    }

    pub fn power(&self) -> u32 {
        self.power
    }
}

impl DistanceFunction for MinkowskiDistance {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>, columns: &[usize]) -> f64 {
        minkowski(self.power, a, b, columns)
    }

    fn distance_all(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        minkowski_pairs(self.power, all_pairs(a.view(), b.view()))
    }
}

/// Minkowski distance with power 2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EuclideanDistance;

impl DistanceFunction for EuclideanDistance {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>, columns: &[usize]) -> f64 {
        minkowski(2, a, b, columns)
    }

    fn distance_all(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        minkowski_pairs(2, all_pairs(a.view(), b.view()))
    }

    fn squared_distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let (largest, sum) = scaled_power_sum(2, all_pairs(a.view(), b.view()));
        largest * largest * sum
    }
}

/// Minkowski distance with power 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ManhattanDistance;

impl DistanceFunction for ManhattanDistance {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>, columns: &[usize]) -> f64 {
        minkowski(1, a, b, columns)
    }

    fn distance_all(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        minkowski_pairs(1, all_pairs(a.view(), b.view()))
    }
}

/// Configuration-level selector for the distance used on input rows.
///
/// The `Minkowski` variant carries a validated [`MinkowskiDistance`], so a
/// zero power cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
    Minkowski(MinkowskiDistance),
}

impl DistanceMetric {
    /// Minkowski metric with power `p`, rejecting `p = 0`.
    pub fn minkowski(power: u32) -> MdsResult<Self> {
        MinkowskiDistance::new(power).map(DistanceMetric::Minkowski)
    }

    pub fn power(&self) -> u32 {
        match self {
            DistanceMetric::Euclidean => 2,
            DistanceMetric::Manhattan => 1,
            DistanceMetric::Minkowski(m) => m.power(),
        }
    }
}

impl DistanceFunction for DistanceMetric {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>, columns: &[usize]) -> f64 {
        match self {
            DistanceMetric::Euclidean => EuclideanDistance.distance(a, b, columns),
            DistanceMetric::Manhattan => ManhattanDistance.distance(a, b, columns),
            DistanceMetric::Minkowski(m) => m.distance(a, b, columns),
        }
    }

    fn distance_all(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            DistanceMetric::Euclidean => EuclideanDistance.distance_all(a, b),
            DistanceMetric::Manhattan => ManhattanDistance.distance_all(a, b),
            DistanceMetric::Minkowski(m) => m.distance_all(a, b),
        }
    }

    fn squared_distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            DistanceMetric::Euclidean => EuclideanDistance.squared_distance(a, b),
            DistanceMetric::Manhattan => ManhattanDistance.squared_distance(a, b),
            DistanceMetric::Minkowski(m) => m.squared_distance(a, b),
        }
    }
}
