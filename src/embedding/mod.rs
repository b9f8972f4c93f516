//! # Embeddings
//!
//! An [`Embedding`] maps row identifiers to low-dimensional [`Point`]s. Every
//! point shares the embedding's dimension, and iteration follows insertion
//! order so output rows line up with the input rows they came from.

mod point;

pub use point::Point;

use crate::error::{MdsError, MdsResult};
use crate::utils::RowIdentifier;
use ahash::AHashMap;
use ndarray::Array2;

#[derive(Debug, Clone)]
pub struct Embedding<I: RowIdentifier> {
    dimension: usize,
    ids: Vec<I>,
    points: Vec<Point>,
    index: AHashMap<I, usize>,
}

impl<I: RowIdentifier> Embedding<I> {
    pub fn new(dimension: usize) -> MdsResult<Self> {
        if dimension == 0 {
            return Err(MdsError::InvalidDimension(dimension));
        }
        Ok(Self {
            dimension,
            ids: Vec::new(),
            points: Vec::new(),
            index: AHashMap::new(),
        })
    }

    pub fn with_capacity(dimension: usize, capacity: usize) -> MdsResult<Self> {
        let mut embedding = Self::new(dimension)?;
        embedding.ids.reserve(capacity);
        embedding.points.reserve(capacity);
        embedding.index.reserve(capacity);
        Ok(embedding)
    }

    /// Builds an embedding from an `n × dimension` row matrix.
    pub fn from_rows(ids: &[I], rows: &Array2<f64>) -> MdsResult<Self> {
        if ids.len() != rows.nrows() {
            return Err(MdsError::ShapeMismatch(format!(
                "{} identifiers for {} rows",
                ids.len(),
                rows.nrows()
            )));
        }
        let mut embedding = Self::with_capacity(rows.ncols(), ids.len())?;
        for (id, row) in ids.iter().zip(rows.rows()) {
            embedding.insert(id.clone(), Point::from_vec(row.to_vec())?)?;
        }
        Ok(embedding)
    }

    pub fn insert(&mut self, id: I, point: Point) -> MdsResult<()> {
        if point.dimension() != self.dimension {
            return Err(MdsError::ShapeMismatch(format!(
                "point of dimension {} inserted into embedding of dimension {}",
                point.dimension(),
                self.dimension
            )));
        }
        if self.index.contains_key(&id) {
            return Err(MdsError::DuplicateIdentifier(format!("{:?}", id)));
        }
        self.index.insert(id.clone(), self.ids.len());
        self.ids.push(id);
        self.points.push(point);
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, id: &I) -> Option<&Point> {
        self.index.get(id).map(|&i| &self.points[i])
    }

    pub fn position(&self, id: &I) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn ids(&self) -> &[I] {
        &self.ids
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub(crate) fn points_mut(&mut self) -> &mut [Point] {
        &mut self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = (&I, &Point)> {
        self.ids.iter().zip(self.points.iter())
    }

    /// Copies the coordinates into an `n × dimension` matrix in row order.
    pub fn to_array(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.len(), self.dimension));
        for (mut row, point) in out.rows_mut().into_iter().zip(&self.points) {
            row.assign(&point.as_view());
        }
        out
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.points.clear();
        self.index.clear();
    }
}
