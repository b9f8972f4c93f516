//! # Iterative MDS
//!
//! Metric MDS by stress relaxation. Points start at uniformly random
//! positions in `[0, 1)^d` and, for every ordered pair `(p1, p2)`, `p1` is
//! pulled towards or pushed away from `p2` so that their low-dimensional
//! distance approaches the high-dimensional disparity:
//!
//! ```text
//! p1[c] += lr · (1 − disparity / current) · (p2[c] − p1[c])
//! ```
//!
//! Updates are applied in place, so later pairs of a sweep already see the
//! positions moved by earlier pairs. The learning rate decays geometrically
//! from its initial value to a final rate over the course of training.

use crate::distance::DistanceFunction;
use crate::embedding::{Embedding, Point};
use crate::error::{MdsError, MdsResult};
use crate::monitor::ExecutionMonitor;
use crate::utils::{RowIdentifier, ZeroVec};
use ahash::AHashSet;
use log::{debug, info, log_enabled, Level};
use ndarray::{Array2, ArrayView1, ArrayView2, Zip};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Seed used when training starts without an explicit initialization.
pub const DEFAULT_SEED: u64 = 42;

/// Rate the learning-rate schedule decays to by the last epoch.
pub const DEFAULT_FINAL_LEARNING_RATE: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    Uninitialized,
    Initialized,
    Trained,
}

/// Learning rate in effect after `epoch` (1-indexed) of `epochs`.
///
/// Interpolates geometrically from `initial` to `final_rate`; a zero initial
/// rate stays zero.
pub fn learning_rate(initial: f64, final_rate: f64, epoch: usize, epochs: usize) -> f64 {
    if initial <= 0.0 || epochs == 0 {
        return initial.max(0.0);
    }
    initial * (final_rate / initial).powf(epoch as f64 / epochs as f64)
}

/// Random embedding with one point per id, coordinates uniform in `[0, 1)`.
///
/// Coordinates are drawn from a `ChaCha8Rng` seeded with `seed`, in id order
/// and then coordinate order, so equal inputs give equal embeddings.
pub fn initialize_embedding<I: RowIdentifier>(
    row_ids: &[I],
    target_dim: usize,
    seed: u64,
) -> MdsResult<Embedding<I>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    random_embedding(row_ids, target_dim, &mut rng)
}

fn random_embedding<I: RowIdentifier, R: Rng>(
    row_ids: &[I],
    target_dim: usize,
    rng: &mut R,
) -> MdsResult<Embedding<I>> {
    let mut embedding = Embedding::with_capacity(target_dim, row_ids.len())?;
    for id in row_ids {
        let coordinates = (0..target_dim).map(|_| rng.random::<f64>()).collect();
        embedding.insert(id.clone(), Point::from_vec(coordinates)?)?;
    }
    Ok(embedding)
}

/// Kruskal stress-1 between row disparities and embedded distances.
///
/// `sqrt(Σ (δ − d)² / Σ δ²)` over unordered pairs; `0` when every disparity is `0`.
pub fn stress(
    data: ArrayView2<f64>,
    columns: &[usize],
    points: &[Point],
    high_dim_distance: &dyn DistanceFunction,
    low_dim_distance: &dyn DistanceFunction,
) -> f64 {
    let n = points.len().min(data.nrows());
    let (residual, total) = (0..n)
        .into_par_iter()
        .map(|i| {
            let low_columns: Vec<usize> = (0..points[i].dimension()).collect();
            let mut residual = 0.0;
            let mut total = 0.0;
            for j in (i + 1)..n {
                let disparity = high_dim_distance.distance(data.row(i), data.row(j), columns);
                let current =
                    low_dim_distance.distance(points[i].as_view(), points[j].as_view(), &low_columns);
                residual += (disparity - current) * (disparity - current);
                total += disparity * disparity;
            }
            (residual, total)
        })
        .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));

    if total > 0.0 {
        (residual / total).sqrt()
    } else {
        0.0
    }
}

/// Moves `point` relative to `other` by one relaxation step.
///
/// No-op when the points coincide.
#[inline]
fn relax(
    point: &mut Point,
    other: ArrayView1<f64>,
    disparity: f64,
    rate: f64,
    low_dim_distance: &dyn DistanceFunction,
    low_columns: &[usize],
) {
    let current = low_dim_distance.distance(point.as_view(), other, low_columns);
    if current == 0.0 {
        return;
    }
    let factor = rate * (1.0 - disparity / current);
    Zip::from(point.as_view_mut())
        .and(&other)
        .for_each(|a, &b| *a += factor * (b - *a));
}

fn check_learning_rates(initial: f64, final_rate: f64) -> MdsResult<()> {
    if !initial.is_finite() || initial < 0.0 {
        return Err(MdsError::InvalidParameter {
            name: "learning_rate",
            reason: format!("{} is not a non-negative number", initial),
        });
    }
    if !final_rate.is_finite() || final_rate <= 0.0 {
        return Err(MdsError::InvalidParameter {
            name: "final_learning_rate",
            reason: format!("{} is not a positive number", final_rate),
        });
    }
    Ok(())
}

fn missing_embedding() -> MdsError {
    MdsError::InvalidParameter {
        name: "embedding",
        reason: "the engine has no initialized embedding".to_string(),
    }
}

/// Mutable access to `points[i]` alongside shared access to `points[j]`, `i != j`.
fn pair_mut(points: &mut [Point], i: usize, j: usize) -> (&mut Point, &Point) {
    if i < j {
        let (left, right) = points.split_at_mut(j);
        (&mut left[i], &right[0])
    } else {
        let (left, right) = points.split_at_mut(i);
        (&mut right[0], &left[j])
    }
}

/// Stress-relaxation engine over the rows of a feature matrix.
pub struct IterativeMds<I: RowIdentifier> {
    ids: Vec<I>,
    data: Array2<f64>,
    columns: Vec<usize>,
    target_dim: usize,
    final_learning_rate: f64,
    embedding: Option<Embedding<I>>,
    state: TrainingState,
    epochs_trained: usize,
}

impl<I: RowIdentifier> IterativeMds<I> {
    /// Creates an engine for `data` (`rows × columns`), one id per row.
    pub fn new(ids: Vec<I>, data: Array2<f64>, target_dim: usize) -> MdsResult<Self> {
        if target_dim == 0 {
            return Err(MdsError::InvalidDimension(target_dim));
        }
        if ids.len() != data.nrows() {
            return Err(MdsError::ShapeMismatch(format!(
                "{} identifiers for {} rows",
                ids.len(),
                data.nrows()
            )));
        }
        let mut seen = AHashSet::with_capacity(ids.len());
        for id in &ids {
            if !seen.insert(id) {
                return Err(MdsError::DuplicateIdentifier(format!("{:?}", id)));
            }
        }

        let columns = (0..data.ncols()).collect();
        Ok(Self {
            ids,
            data,
            columns,
            target_dim,
            final_learning_rate: DEFAULT_FINAL_LEARNING_RATE,
            embedding: None,
            state: TrainingState::Uninitialized,
            epochs_trained: 0,
        })
    }

    /// Restricts disparities to the given columns of the input rows.
    pub fn with_columns(mut self, columns: Vec<usize>) -> MdsResult<Self> {
        if let Some(&bad) = columns.iter().find(|&&c| c >= self.data.ncols()) {
            return Err(MdsError::ShapeMismatch(format!(
                "column {} outside data with {} columns",
                bad,
                self.data.ncols()
            )));
        }
        self.columns = columns;
        Ok(self)
    }

    /// Rate reached by the last epoch. Must be a positive finite number;
    /// `train` and `project` reject anything else.
    pub fn final_learning_rate(mut self, final_learning_rate: f64) -> Self {
        self.final_learning_rate = final_learning_rate;
        self
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn embedding(&self) -> Option<&Embedding<I>> {
        self.embedding.as_ref()
    }

    pub fn into_embedding(self) -> Option<Embedding<I>> {
        self.embedding
    }

    pub fn epochs_trained(&self) -> usize {
        self.epochs_trained
    }

    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    /// Places every row at a random position drawn from `seed`.
    pub fn initialize(&mut self, seed: u64) -> MdsResult<&Embedding<I>> {
        let embedding = initialize_embedding(&self.ids, self.target_dim, seed)?;
        debug!("initialized {} points with seed {}", embedding.len(), seed);
        self.epochs_trained = 0;
        self.state = TrainingState::Initialized;
        Ok(&*self.embedding.insert(embedding))
    }

    /// Starts from a caller-provided embedding instead of random positions.
    ///
    /// The embedding must hold exactly this engine's ids, in the same order.
    pub fn set_initial_embedding(&mut self, embedding: Embedding<I>) -> MdsResult<()> {
        if embedding.dimension() != self.target_dim {
            return Err(MdsError::ShapeMismatch(format!(
                "embedding of dimension {} for target dimension {}",
                embedding.dimension(),
                self.target_dim
            )));
        }
        if embedding.ids() != self.ids.as_slice() {
            return Err(MdsError::ShapeMismatch(
                "embedding ids do not match the input rows".to_string(),
            ));
        }
        self.embedding = Some(embedding);
        self.epochs_trained = 0;
        self.state = TrainingState::Initialized;
        Ok(())
    }

    /// Drops the embedding; the next `train` starts from [`DEFAULT_SEED`].
    pub fn reset(&mut self) {
        self.embedding = None;
        self.epochs_trained = 0;
        self.state = TrainingState::Uninitialized;
    }

    /// Runs `epochs` relaxation sweeps over all ordered pairs.
    ///
    /// `high_dim_distance` yields disparities between input rows and
    /// `low_dim_distance` measures the current embedded distance. Cancellation
    /// is checked and progress reported once per epoch; after cancellation the
    /// embedding is left partially trained.
    pub fn train(
        &mut self,
        epochs: usize,
        initial_learning_rate: f64,
        high_dim_distance: &dyn DistanceFunction,
        low_dim_distance: &dyn DistanceFunction,
        monitor: &dyn ExecutionMonitor,
    ) -> MdsResult<&Embedding<I>> {
        check_learning_rates(initial_learning_rate, self.final_learning_rate)?;
        if self.state == TrainingState::Uninitialized {
            self.initialize(DEFAULT_SEED)?;
        }

        info!(
            "Iterative MDS: {} points, {} epochs, learning rate {} -> {}",
            self.ids.len(),
            epochs,
            initial_learning_rate,
            self.final_learning_rate
        );

        let low_columns: Vec<usize> = (0..self.target_dim).collect();
        let n = self.ids.len();
        let mut disparities: Vec<f64> = Vec::new();
        disparities.zero_len(n);
        let mut rate = initial_learning_rate;

        for epoch in 1..=epochs {
            monitor.check_cancelled()?;

            let embedding = match self.embedding.as_mut() {
                Some(embedding) => embedding,
                None => break,
            };
            let points = embedding.points_mut();

            for i in 0..n {
                let row = self.data.row(i);
                let data = &self.data;
                let columns = &self.columns;
                disparities.par_iter_mut().enumerate().for_each(|(j, d)| {
                    *d = high_dim_distance.distance(row, data.row(j), columns);
                });

                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let (p1, p2) = pair_mut(points, i, j);
                    relax(p1, p2.as_view(), disparities[j], rate, low_dim_distance, &low_columns);
                }
            }

            self.epochs_trained += 1;
            self.state = TrainingState::Trained;

            if log_enabled!(Level::Debug) {
                let current_stress = stress(
                    self.data.view(),
                    &self.columns,
                    embedding.points(),
                    high_dim_distance,
                    low_dim_distance,
                );
                debug!(
                    "epoch {}/{}: learning rate {:.6}, stress {:.6}",
                    epoch, epochs, rate, current_stress
                );
            }

            rate = learning_rate(initial_learning_rate, self.final_learning_rate, epoch, epochs);
            monitor.set_progress(epoch as f64 / epochs as f64);
        }

        self.embedding.as_ref().ok_or_else(missing_embedding)
    }

    /// Stress-1 of the current embedding, `None` before initialization.
    pub fn stress(
        &self,
        high_dim_distance: &dyn DistanceFunction,
        low_dim_distance: &dyn DistanceFunction,
    ) -> Option<f64> {
        self.embedding.as_ref().map(|embedding| {
            stress(
                self.data.view(),
                &self.columns,
                embedding.points(),
                high_dim_distance,
                low_dim_distance,
            )
        })
    }

    /// Places new rows into the current embedding without moving it.
    ///
    /// New points start at random positions drawn from `seed` and are relaxed
    /// only against the existing points, using the same update rule and
    /// learning-rate schedule as [`IterativeMds::train`]. New points do not
    /// interact with each other.
    #[allow(clippy::too_many_arguments)]
    pub fn project(
        &self,
        new_ids: &[I],
        new_rows: ArrayView2<f64>,
        epochs: usize,
        initial_learning_rate: f64,
        seed: u64,
        high_dim_distance: &dyn DistanceFunction,
        low_dim_distance: &dyn DistanceFunction,
        monitor: &dyn ExecutionMonitor,
    ) -> MdsResult<Embedding<I>> {
        let reference = self.embedding.as_ref().ok_or_else(missing_embedding)?;
        if new_ids.len() != new_rows.nrows() {
            return Err(MdsError::ShapeMismatch(format!(
                "{} identifiers for {} rows",
                new_ids.len(),
                new_rows.nrows()
            )));
        }
        if new_rows.ncols() != self.data.ncols() {
            return Err(MdsError::ShapeMismatch(format!(
                "new rows have {} columns, reference rows have {}",
                new_rows.ncols(),
                self.data.ncols()
            )));
        }
        check_learning_rates(initial_learning_rate, self.final_learning_rate)?;

        info!(
            "projecting {} rows onto {} fixed points",
            new_ids.len(),
            reference.len()
        );

        let mut projected = initialize_embedding(new_ids, self.target_dim, seed)?;
        let low_columns: Vec<usize> = (0..self.target_dim).collect();
        let fixed = reference.points();
        let mut disparities: Vec<f64> = Vec::new();
        let mut rate = initial_learning_rate;

        for epoch in 1..=epochs {
            monitor.check_cancelled()?;

            for (i, point) in projected.points_mut().iter_mut().enumerate() {
                let row = new_rows.row(i);
                let data = &self.data;
                let columns = &self.columns;
                disparities.zero_len(fixed.len());
                disparities.par_iter_mut().enumerate().for_each(|(j, d)| {
                    *d = high_dim_distance.distance(row, data.row(j), columns);
                });

                for (anchor, &disparity) in fixed.iter().zip(&disparities) {
                    relax(point, anchor.as_view(), disparity, rate, low_dim_distance, &low_columns);
                }
            }

            rate = learning_rate(initial_learning_rate, self.final_learning_rate, epoch, epochs);
            monitor.set_progress(epoch as f64 / epochs as f64);
        }

        Ok(projected)
    }
}
