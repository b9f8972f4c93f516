//! # Multidimensional Scaling
//!
//! Two engines that place rows of a feature table in a low-dimensional space
//! while approximately preserving their pairwise distances:
//!
//! - [`PivotMds`]: classical scaling on a pivot-distance matrix, one shot
//! - [`IterativeMds`]: stress relaxation over a fixed number of epochs
//!
//! [`run_mds`] drives either engine from an [`MdsConfig`] and a
//! [`FeatureTable`], returning an [`Embedding`] keyed by row identifier in
//! input row order.

pub mod iterative;
pub mod pivot;

pub use iterative::{
    initialize_embedding, learning_rate, stress, IterativeMds, TrainingState,
    DEFAULT_FINAL_LEARNING_RATE, DEFAULT_SEED,
};
pub use pivot::{PivotDecomposition, PivotMds, PivotReport};

use crate::distance::{DistanceMetric, EuclideanDistance};
use crate::embedding::Embedding;
use crate::error::{MdsError, MdsResult};
use crate::monitor::ExecutionMonitor;
use crate::utils::RowIdentifier;
use anyhow::Context;
use log::{info, warn};
use ndarray::{Array2, Axis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MdsMethod {
    Pivot,
    #[default]
    Iterative,
}

/// Settings consumed by [`run_mds`].
#[derive(Debug, Clone, PartialEq)]
pub struct MdsConfig {
    pub method: MdsMethod,
    pub target_dimension: usize,
    /// Distance between input rows; the embedding space is always Euclidean
    pub distance_metric: DistanceMetric,
    /// Pivot MDS only, clamped to the number of rows
    pub pivot_count: usize,
    /// Iterative MDS only
    pub epochs: usize,
    /// Iterative MDS only, in `[0, 1]`
    pub learning_rate: f64,
    /// Iterative MDS only
    pub final_learning_rate: f64,
    /// Iterative MDS only
    pub seed: u64,
    /// Pivot MDS only, cap on power-iteration sweeps
    pub max_iterations: usize,
}

impl Default for MdsConfig {
    fn default() -> Self {
        Self {
            method: MdsMethod::default(),
            target_dimension: 2,
            distance_metric: DistanceMetric::Euclidean,
            pivot_count: 100,
            epochs: 50,
            learning_rate: 1.0,
            final_learning_rate: DEFAULT_FINAL_LEARNING_RATE,
            seed: DEFAULT_SEED,
            max_iterations: pivot::DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl MdsConfig {
    pub fn builder() -> MdsConfigBuilder {
        MdsConfigBuilder::new()
    }

    pub fn validate(&self) -> MdsResult<()> {
        if self.target_dimension == 0 {
            return Err(MdsError::InvalidDimension(self.target_dimension));
        }
        if self.pivot_count == 0 {
            return Err(invalid("pivot_count", "must be at least 1"));
        }
        if self.epochs == 0 {
            return Err(invalid("epochs", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.learning_rate) {
            return Err(invalid(
                "learning_rate",
                &format!("{} outside [0, 1]", self.learning_rate),
            ));
        }
        if !(self.final_learning_rate.is_finite() && self.final_learning_rate > 0.0) {
            return Err(invalid(
                "final_learning_rate",
                &format!("{} is not a positive number", self.final_learning_rate),
            ));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: &str) -> MdsError {
    MdsError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}

/// Builder for [`MdsConfig`].
///
/// # Example Usage
/// ```ignore
/// let config = MdsConfig::builder()
///     .method(MdsMethod::Pivot)
///     .target_dimension(3)
///     .pivot_count(50)
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct MdsConfigBuilder {
    config: MdsConfig,
}

impl MdsConfigBuilder {
    /// Creates a new builder with default parameters.
    ///
    /// Default values:
    /// - `method`: Iterative
    /// - `target_dimension`: 2
    /// - `distance_metric`: Euclidean
    /// - `pivot_count`: 100
    /// - `epochs`: 50
    /// - `learning_rate`: 1.0
    /// - `final_learning_rate`: 0.001
    /// - `seed`: 42
    /// - `max_iterations`: 10 000
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: MdsMethod) -> Self {
        self.config.method = method;
        self
    }

    pub fn target_dimension(mut self, target_dimension: usize) -> Self {
        self.config.target_dimension = target_dimension;
        self
    }

    pub fn distance_metric(mut self, distance_metric: DistanceMetric) -> Self {
        self.config.distance_metric = distance_metric;
        self
    }

    pub fn pivot_count(mut self, pivot_count: usize) -> Self {
        self.config.pivot_count = pivot_count;
        self
    }

    pub fn epochs(mut self, epochs: usize) -> Self {
        self.config.epochs = epochs;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.config.learning_rate = learning_rate;
        self
    }

    pub fn final_learning_rate(mut self, final_learning_rate: f64) -> Self {
        self.config.final_learning_rate = final_learning_rate;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn build(self) -> MdsConfig {
        self.config
    }
}

/// Rows of numeric cells keyed by identifier.
///
/// Missing cells are non-finite values (`f64::NAN` by convention). Only the
/// selected columns take part in distance computations.
#[derive(Debug, Clone)]
pub struct FeatureTable<I: RowIdentifier> {
    ids: Vec<I>,
    values: Array2<f64>,
    columns: Vec<usize>,
}

impl<I: RowIdentifier> FeatureTable<I> {
    /// Creates a table using every column of `values` (`rows × columns`).
    pub fn new(ids: Vec<I>, values: Array2<f64>) -> MdsResult<Self> {
        if ids.len() != values.nrows() {
            return Err(MdsError::ShapeMismatch(format!(
                "{} identifiers for {} rows",
                ids.len(),
                values.nrows()
            )));
        }
        let columns = (0..values.ncols()).collect();
        Ok(Self {
            ids,
            values,
            columns,
        })
    }

    /// Restricts the table to `columns`, in the given order.
    pub fn with_columns(mut self, columns: Vec<usize>) -> MdsResult<Self> {
        if let Some(&bad) = columns.iter().find(|&&c| c >= self.values.ncols()) {
            return Err(MdsError::ShapeMismatch(format!(
                "column {} outside table with {} columns",
                bad,
                self.values.ncols()
            )));
        }
        self.columns = columns;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[I] {
        &self.ids
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// `rows × selected columns` copy of the feature values.
    pub fn selected(&self) -> Array2<f64> {
        self.values.select(Axis(1), &self.columns)
    }
}

/// Computes an embedding of `table` as configured.
///
/// Typed failures are kept inside the returned error; use
/// `err.downcast_ref::<MdsError>()` to tell cancellation apart from
/// invalid input.
pub fn run_mds<I: RowIdentifier>(
    table: &FeatureTable<I>,
    config: &MdsConfig,
    monitor: &dyn ExecutionMonitor,
) -> anyhow::Result<Embedding<I>> {
    config.validate().context("invalid MDS configuration")?;

    let n = table.len();
    if n == 0 {
        info!("MDS on an empty table, nothing to embed");
        return Ok(Embedding::new(config.target_dimension)?);
    }

    info!(
        "running {:?} MDS on {} rows x {} columns into {} dimensions ({:?})",
        config.method,
        n,
        table.columns().len(),
        config.target_dimension,
        config.distance_metric
    );

    let embedding = match config.method {
        MdsMethod::Pivot => run_pivot(table, config, monitor)?,
        MdsMethod::Iterative => run_iterative(table, config, monitor)?,
    };

    monitor.set_progress(1.0);
    info!("MDS finished: {} rows embedded", embedding.len());
    Ok(embedding)
}

fn run_pivot<I: RowIdentifier>(
    table: &FeatureTable<I>,
    config: &MdsConfig,
    monitor: &dyn ExecutionMonitor,
) -> anyhow::Result<Embedding<I>> {
    let n = table.len();
    let pivot_count = if config.pivot_count > n {
        warn!(
            "pivot count {} exceeds the {} available rows, using {}",
            config.pivot_count, n, n
        );
        n
    } else {
        config.pivot_count
    };

    let data = table.selected();
    let mut out = Array2::zeros((config.target_dimension, n));
    let report = PivotMds::new()
        .metric(config.distance_metric)
        .max_iterations(config.max_iterations)
        .embed(data.t(), pivot_count, out.view_mut(), monitor)
        .context("pivot MDS failed")?;

    if !report.converged {
        warn!(
            "pivot MDS returned an unconverged embedding after {} sweeps",
            report.iterations
        );
    }

    Ok(Embedding::from_rows(table.ids(), &out.t().to_owned())?)
}

fn run_iterative<I: RowIdentifier>(
    table: &FeatureTable<I>,
    config: &MdsConfig,
    monitor: &dyn ExecutionMonitor,
) -> anyhow::Result<Embedding<I>> {
    let mut engine = IterativeMds::new(table.ids().to_vec(), table.selected(), config.target_dimension)?
        .final_learning_rate(config.final_learning_rate);
    engine.initialize(config.seed)?;
    engine
        .train(
            config.epochs,
            config.learning_rate,
            &config.distance_metric,
            &EuclideanDistance,
            monitor,
        )
        .context("iterative MDS failed")?;

    engine
        .into_embedding()
        .ok_or_else(|| anyhow::anyhow!("iterative MDS finished without an embedding"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceFunction;
    use crate::monitor::{CancellationToken, NoopMonitor};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn square_table() -> FeatureTable<String> {
        let ids = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        FeatureTable::new(ids, array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]).unwrap()
    }

    fn planar_distance(e: &Embedding<String>, a: &str, b: &str) -> f64 {
        let pa = e.get(&a.to_string()).unwrap();
        let pb = e.get(&b.to_string()).unwrap();
        EuclideanDistance.distance_all(pa.as_view(), pb.as_view())
    }

    #[test]
    fn test_pivot_run_on_square() {
        let config = MdsConfig::builder()
            .method(MdsMethod::Pivot)
            .target_dimension(2)
            .pivot_count(10)
            .build();
        let embedding = run_mds(&square_table(), &config, &NoopMonitor).unwrap();

        assert_eq!(embedding.len(), 4);
        assert_eq!(embedding.ids(), &["a", "b", "c", "d"]);
        assert_relative_eq!(planar_distance(&embedding, "a", "d"), 2f64.sqrt(), epsilon = 1e-4);
        assert_relative_eq!(planar_distance(&embedding, "a", "b"), 1.0, epsilon = 1e-4);
        assert_relative_eq!(planar_distance(&embedding, "b", "c"), 2f64.sqrt(), epsilon = 1e-4);
    }

    #[test]
    fn test_iterative_run_is_reproducible() {
        let config = MdsConfig::builder().epochs(20).seed(9).build();
        let a = run_mds(&square_table(), &config, &NoopMonitor).unwrap();
        let b = run_mds(&square_table(), &config, &NoopMonitor).unwrap();
        assert_eq!(a.to_array(), b.to_array());
        assert_eq!(a.dimension(), 2);
        assert_eq!(a.ids(), square_table().ids());
    }

    #[test]
    fn test_column_selection() {
        let values = array![[0.0, 100.0], [1.0, -50.0], [2.0, 7.0]];
        let table = FeatureTable::new(vec![0usize, 1, 2], values)
            .unwrap()
            .with_columns(vec![0])
            .unwrap();
        let config = MdsConfig::builder()
            .method(MdsMethod::Pivot)
            .target_dimension(1)
            .pivot_count(3)
            .build();
        let embedding = run_mds(&table, &config, &NoopMonitor).unwrap();
        let x: Vec<f64> = embedding.points().iter().map(|p| p.get(0).unwrap()).collect();
        assert_relative_eq!((x[0] - x[1]).abs(), 1.0, epsilon = 1e-6);
        assert_relative_eq!((x[0] - x[2]).abs(), 2.0, epsilon = 1e-6);

        assert!(FeatureTable::new(vec![0usize], array![[1.0]])
            .unwrap()
            .with_columns(vec![1])
            .is_err());
    }

    #[test]
    fn test_single_row_both_methods() {
        let table = FeatureTable::new(vec![1u32], array![[4.0, 2.0, 0.5]]).unwrap();
        for method in [MdsMethod::Pivot, MdsMethod::Iterative] {
            let config = MdsConfig::builder()
                .method(method)
                .target_dimension(3)
                .epochs(3)
                .build();
            let embedding = run_mds(&table, &config, &NoopMonitor).unwrap();
            assert_eq!(embedding.len(), 1);
            assert_eq!(embedding.get(&1).unwrap().dimension(), 3);
        }
    }

    #[test]
    fn test_empty_table() {
        let table = FeatureTable::<usize>::new(vec![], Array2::zeros((0, 3))).unwrap();
        let embedding = run_mds(&table, &MdsConfig::default(), &NoopMonitor).unwrap();
        assert!(embedding.is_empty());
        assert_eq!(embedding.dimension(), 2);
    }

    #[test]
    fn test_config_validation() {
        assert!(MdsConfig::default().validate().is_ok());
        assert_eq!(
            MdsConfig::builder().target_dimension(0).build().validate(),
            Err(MdsError::InvalidDimension(0))
        );
        for config in [
            MdsConfig::builder().epochs(0).build(),
            MdsConfig::builder().pivot_count(0).build(),
            MdsConfig::builder().learning_rate(1.5).build(),
            MdsConfig::builder().learning_rate(-0.1).build(),
            MdsConfig::builder().final_learning_rate(0.0).build(),
            MdsConfig::builder().max_iterations(0).build(),
        ] {
            assert!(matches!(
                config.validate(),
                Err(MdsError::InvalidParameter { .. })
            ));
        }

        let err = run_mds(
            &square_table(),
            &MdsConfig::builder().target_dimension(0).build(),
            &NoopMonitor,
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<MdsError>(),
            Some(&MdsError::InvalidDimension(0))
        );
    }

    #[test]
    fn test_cancellation_is_distinguishable() {
        let token = CancellationToken::new();
        token.cancel();
        for method in [MdsMethod::Pivot, MdsMethod::Iterative] {
            let config = MdsConfig::builder().method(method).build();
            let err = run_mds(&square_table(), &config, &token).unwrap_err();
            assert_eq!(err.downcast_ref::<MdsError>(), Some(&MdsError::Cancelled));
        }
    }

    #[test]
    fn test_table_shape_checked() {
        assert!(matches!(
            FeatureTable::new(vec![0usize, 1], array![[1.0, 2.0]]),
            Err(MdsError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_manhattan_disparities() {
        let config = MdsConfig::builder()
            .distance_metric(DistanceMetric::Manhattan)
            .epochs(60)
            .build();
        let embedding = run_mds(&square_table(), &config, &NoopMonitor).unwrap();
        // Manhattan diagonal of the unit square is 2, edges stay 1
        let diagonal = planar_distance(&embedding, "a", "d");
        let edge = planar_distance(&embedding, "a", "b");
        assert!(diagonal > edge);
    }
}
