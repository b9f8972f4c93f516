//! # Pivot MDS
//!
//! Classical scaling on a rectangular pivot-distance matrix. Instead of the
//! full `n × n` distance matrix, `k` pivots are picked with a farthest-point
//! heuristic and only their squared distances to every point are kept. The
//! double-centred `k × n` matrix `C` is decomposed through the `k × k` Gram
//! matrix `K = C·Cᵗ` with a deflated power iteration, and the top eigenvectors
//! are projected back onto all `n` points.

use crate::distance::{DistanceFunction, DistanceMetric};
use crate::error::{MdsError, MdsResult};
use crate::monitor::ExecutionMonitor;
use crate::utils::{is_present, normalize};
use log::{debug, info, trace, warn};
use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut2, Axis, Zip};
use rayon::prelude::*;

/// Convergence threshold on `1 - |<old, new>|` for every candidate vector.
pub const DEFAULT_EPSILON: f64 = 1e-7;

/// Upper bound on power-iteration sweeps.
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

// eigenvalue estimates at or below this fraction of trace(K) are treated as
// the null space of K
const NULL_SPACE_TOLERANCE: f64 = 1e-10;

// K grows with the fourth power of the input scale; inputs whose largest
// magnitude lies outside this range are rescaled before decomposition
const SCALE_RANGE: (f64, f64) = (1e-50, 1e50);

// share of the progress range spent on pivot selection
const PIVOT_PROGRESS: f64 = 0.3;

/// Outcome of a pivot MDS run.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotReport {
    /// Column indices of the chosen pivots, in selection order
    pub pivots: Vec<usize>,
    /// Power-iteration sweeps performed
    pub iterations: usize,
    /// `false` if the sweep cap was hit before the convergence threshold
    pub converged: bool,
    /// Square roots of the Gram-matrix eigenvalue estimates, one per target dimension
    pub eigenvalues: Vec<f64>,
}

/// Unit eigenvectors over all points, before eigenvalue scaling.
#[derive(Debug, Clone)]
pub struct PivotDecomposition {
    /// `target_dim × n`, one unit-length eigenvector per row
    pub eigenvectors: Array2<f64>,
    pub report: PivotReport,
}

#[derive(Debug, Clone)]
pub struct PivotMds {
    metric: DistanceMetric,
    epsilon: f64,
    max_iterations: usize,
}

impl Default for PivotMds {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Euclidean,
            epsilon: DEFAULT_EPSILON,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl PivotMds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the metric whose square fills the pivot matrix.
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Caps the number of power-iteration sweeps. Values below one are raised to one.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Embeds the columns of `data` (`dimensions × n`) into `out` (`target_dim × n`).
    ///
    /// `out[m][j] = v_m[j] · sqrt(σ_m)` where `v_m` is the back-projected
    /// eigenvector and `σ_m` the square root of its Gram-matrix eigenvalue.
    pub fn embed(
        &self,
        data: ArrayView2<f64>,
        pivot_count: usize,
        mut out: ArrayViewMut2<f64>,
        monitor: &dyn ExecutionMonitor,
    ) -> MdsResult<PivotReport> {
        let target_dim = out.nrows();
        if out.ncols() != data.ncols() {
            return Err(MdsError::ShapeMismatch(format!(
                "output has {} columns but data has {} points",
                out.ncols(),
                data.ncols()
            )));
        }

        let (mut decomposition, scale) = self.decompose(data, pivot_count, target_dim, monitor)?;

        for (m, (mut row, vector)) in out
            .rows_mut()
            .into_iter()
            .zip(decomposition.eigenvectors.rows())
            .enumerate()
        {
            let factor = decomposition.report.eigenvalues[m].sqrt() * scale;
            Zip::from(&mut row)
                .and(&vector)
                .for_each(|o, &v| *o = v * factor);
        }

        rescale_eigenvalues(&mut decomposition.report, scale);
        monitor.set_progress(1.0);
        Ok(decomposition.report)
    }

    /// Runs pivot selection and the eigensolver without the final scaling.
    ///
    /// Eigenvalues are reported in the units of `data`; for inputs beyond
    /// about `1e150` they may saturate to `inf`, while [`PivotMds::embed`]
    /// still produces finite coordinates.
    pub fn eigen_decompose(
        &self,
        data: ArrayView2<f64>,
        pivot_count: usize,
        target_dim: usize,
        monitor: &dyn ExecutionMonitor,
    ) -> MdsResult<PivotDecomposition> {
        let (mut decomposition, scale) = self.decompose(data, pivot_count, target_dim, monitor)?;
        rescale_eigenvalues(&mut decomposition.report, scale);
        Ok(decomposition)
    }

    /// Decomposition of `data / scale`, returned with `scale`.
    fn decompose(
        &self,
        data: ArrayView2<f64>,
        pivot_count: usize,
        target_dim: usize,
        monitor: &dyn ExecutionMonitor,
    ) -> MdsResult<(PivotDecomposition, f64)> {
        let n = data.ncols();
        if target_dim == 0 {
            return Err(MdsError::InvalidDimension(target_dim));
        }
        if pivot_count == 0 || pivot_count > n {
            return Err(MdsError::ShapeMismatch(format!(
                "pivot count {} outside [1, {}]",
                pivot_count, n
            )));
        }

        info!(
            "Pivot MDS: {} points, {} input dimensions, {} pivots, target dimension {}",
            n,
            data.nrows(),
            pivot_count,
            target_dim
        );

        let scale = input_scale(data);
        let rescaled;
        let data = if scale != 1.0 {
            debug!("rescaling input by 1/{:e}", scale);
            rescaled = data.mapv(|x| x / scale);
            rescaled.view()
        } else {
            data.view()
        };

        monitor.check_cancelled()?;
        let (pivots, mut centered) = self.select_pivots(data, pivot_count, monitor)?;
        double_center(&mut centered);
        let gram = gram_matrix(&centered);

        let candidates = initial_candidates(data, &centered, target_dim);
        let (candidates, eigen, iterations, converged) =
            self.power_iteration(&gram, candidates, monitor)?;

        let mut eigenvectors = Array2::zeros((target_dim, n));
        for (mut row, candidate) in eigenvectors.rows_mut().into_iter().zip(candidates.rows()) {
            let mut back = centered.t().dot(&candidate);
            normalize(back.view_mut());
            row.assign(&back);
        }

        let eigenvalues = eigen.iter().map(|&e| e.sqrt()).collect();
        let decomposition = PivotDecomposition {
            eigenvectors,
            report: PivotReport {
                pivots,
                iterations,
                converged,
                eigenvalues,
            },
        };
        Ok((decomposition, scale))
    }

    /// Farthest-point pivot selection.
    ///
    /// Returns the pivot indices and the `k × n` matrix of squared distances
    /// from each pivot to every point.
    fn select_pivots(
        &self,
        data: ArrayView2<f64>,
        k: usize,
        monitor: &dyn ExecutionMonitor,
    ) -> MdsResult<(Vec<usize>, Array2<f64>)> {
        let n = data.ncols();
        let metric = self.metric;
        let mut min_distance = vec![f64::INFINITY; n];
        let mut pivots = Vec::with_capacity(k);
        let mut matrix = Array2::zeros((k, n));
        let mut pivot = 0;

        for (i, mut row) in matrix.rows_mut().into_iter().enumerate() {
            monitor.check_cancelled()?;
            trace!("pivot {} -> point {}", i, pivot);
            pivots.push(pivot);

            let pivot_column = data.column(pivot);
            Zip::from(&mut row)
                .and(data.columns())
                .par_for_each(|d, column| *d = metric.squared_distance(pivot_column, column));

            let mut best = 0;
            let mut best_distance = f64::NEG_INFINITY;
            for (j, (current, &d)) in min_distance.iter_mut().zip(row.iter()).enumerate() {
                if d < *current {
                    *current = d;
                }
                if *current > best_distance {
                    best_distance = *current;
                    best = j;
                }
            }
            pivot = best;

            monitor.set_progress(PIVOT_PROGRESS * (i + 1) as f64 / k as f64);
        }

        Ok((pivots, matrix))
    }

    /// Top eigenvectors of the symmetric `gram` matrix by power iteration with
    /// Gram–Schmidt deflation. `candidates` holds one start vector per row.
    ///
    /// Returns the refined candidates with their eigenvalue estimates.
    /// Candidates whose refined estimate falls in the null space of `gram` are
    /// returned as zero vectors with a zero estimate.
    fn power_iteration(
        &self,
        gram: &Array2<f64>,
        mut current: Array2<f64>,
        monitor: &dyn ExecutionMonitor,
    ) -> MdsResult<(Array2<f64>, Vec<f64>, usize, bool)> {
        let d = current.nrows();
        let cutoff = NULL_SPACE_TOLERANCE * gram.diag().sum().max(0.0);
        let mut next = Array2::zeros(current.raw_dim());
        let mut residuals = vec![0.0; d];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            monitor.check_cancelled()?;
            iterations += 1;

            deflated_step(gram, &current, &mut next, &mut residuals);

            // `all` stops at the first unconverged candidate, so a residual
            // below the cutoff only counts once every earlier candidate has
            // converged in this sweep
            let sweep_converged = (0..d).all(|m| {
                let new = next.row(m);
                residuals[m] == 0.0
                    || current.row(m).dot(&new).abs() > 1.0 - self.epsilon
                    || residuals[m] <= cutoff
            });

            std::mem::swap(&mut current, &mut next);
            monitor.set_progress(
                PIVOT_PROGRESS + (1.0 - PIVOT_PROGRESS) * 0.9 * (1.0 - 1.0 / (iterations as f64 + 1.0)),
            );

            if sweep_converged {
                converged = true;
                break;
            }
        }

        if converged {
            debug!("power iteration converged after {} sweeps", iterations);
        } else {
            warn!(
                "power iteration stopped after {} sweeps without reaching epsilon {}",
                iterations, self.epsilon
            );
        }

        // refinement sweep; its residuals are the eigenvalue estimates
        deflated_step(gram, &current, &mut next, &mut residuals);
        for (m, estimate) in residuals.iter_mut().enumerate() {
            if *estimate <= cutoff {
                trace!("candidate {} lies in the null space ({:e})", m, estimate);
                *estimate = 0.0;
                next.row_mut(m).fill(0.0);
            }
        }

        Ok((next, residuals, iterations, converged))
    }
}

/// One power-iteration sweep: `next_m = normalize(K·current_m)` after removing
/// the components along `next_0 .. next_{m-1}`. The norms before
/// normalization are written to `residuals`; a zero vector stays zero.
fn deflated_step(
    gram: &Array2<f64>,
    current: &Array2<f64>,
    next: &mut Array2<f64>,
    residuals: &mut [f64],
) {
    for m in 0..current.nrows() {
        let mut v = gram.dot(&current.row(m));
        for previous in 0..m {
            let p = next.row(previous);
            let projection = v.dot(&p);
            v.scaled_add(-projection, &p);
        }
        residuals[m] = normalize(v.view_mut());
        next.row_mut(m).assign(&v);
    }
}

/// Largest present magnitude in `data` when it lies outside [`SCALE_RANGE`],
/// otherwise `1`.
fn input_scale(data: ArrayView2<f64>) -> f64 {
    let largest = data
        .iter()
        .filter(|&&x| is_present(x))
        .fold(0.0, |acc: f64, &x| acc.max(x.abs()));
    if largest > 0.0 && (largest < SCALE_RANGE.0 || largest > SCALE_RANGE.1) {
        largest
    } else {
        1.0
    }
}

fn rescale_eigenvalues(report: &mut PivotReport, scale: f64) {
    if scale != 1.0 {
        for e in report.eigenvalues.iter_mut() {
            *e = *e * scale * scale;
        }
    }
}

/// Subtracts row means, then column means of the row-centred values, and
/// applies the classical-scaling factor `-1/2`.
fn double_center(matrix: &mut Array2<f64>) {
    if let Some(row_means) = matrix.mean_axis(Axis(1)) {
        for (mut row, &mean) in matrix.rows_mut().into_iter().zip(row_means.iter()) {
            row.mapv_inplace(|x| x - mean);
        }
    }
    if let Some(column_means) = matrix.mean_axis(Axis(0)) {
        for (mut column, &mean) in matrix.columns_mut().into_iter().zip(column_means.iter()) {
            column.mapv_inplace(|x| x - mean);
        }
    }
    matrix.mapv_inplace(|x| -0.5 * x);
}

/// `C·Cᵗ`, computing the lower triangle and mirroring it.
fn gram_matrix(c: &Array2<f64>) -> Array2<f64> {
    let k = c.nrows();
    let lower: Vec<Vec<f64>> = (0..k)
        .into_par_iter()
        .map(|i| {
            let row_i = c.row(i);
            (0..=i).map(|j| row_i.dot(&c.row(j))).collect()
        })
        .collect();

    let mut gram = Array2::zeros((k, k));
    for (i, row) in lower.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            gram[[i, j]] = value;
            gram[[j, i]] = value;
        }
    }
    gram
}

/// Start vectors `C · s_m`, one per target dimension.
///
/// `s_m` is the centred `m`-th input dimension (missing cells count as the
/// mean). Target dimensions beyond the input dimensions, and seeds that land
/// in the null space of `C`, fall back to the ramp `1 / (i + 1 + m)`.
fn initial_candidates(data: ArrayView2<f64>, centered: &Array2<f64>, target_dim: usize) -> Array2<f64> {
    let k = centered.nrows();
    let n = centered.ncols();
    let mut candidates = Array2::zeros((target_dim, k));

    for (m, mut candidate) in candidates.rows_mut().into_iter().enumerate() {
        let seed = if m < data.nrows() {
            let row = data.row(m);
            let (sum, count) = row
                .iter()
                .filter(|&&x| is_present(x))
                .fold((0.0, 0usize), |(s, c), &x| (s + x, c + 1));
            let mean = if count > 0 { sum / count as f64 } else { 0.0 };
            Array1::from_iter(row.iter().map(|&x| if is_present(x) { x - mean } else { 0.0 }))
        } else {
            Array1::from_iter((0..n).map(|j| 1.0 / (j + 1 + m) as f64))
        };

        let mut start = centered.dot(&seed);
        if normalize(start.view_mut()) == 0.0 {
            start = Array1::from_iter((0..k).map(|i| 1.0 / (i + 1 + m) as f64));
            normalize(start.view_mut());
        }
        candidate.assign(&start);
    }

    candidates
}
