use crate::error::{MdsError, MdsResult};
use ndarray::{Array1, ArrayView1, ArrayViewMut1};

/// A fixed-size coordinate vector.
///
/// The dimension is chosen at construction and never changes; coordinates are
/// mutated in place while an embedding is trained.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    coordinates: Array1<f64>,
}

impl Point {
    /// Creates a point at the origin.
    pub fn new(dimension: usize) -> MdsResult<Self> {
        if dimension == 0 {
            return Err(MdsError::InvalidDimension(dimension));
        }
        Ok(Self {
            coordinates: Array1::zeros(dimension),
        })
    }

    pub fn from_vec(coordinates: Vec<f64>) -> MdsResult<Self> {
        if coordinates.is_empty() {
            return Err(MdsError::InvalidDimension(0));
        }
        Ok(Self {
            coordinates: Array1::from(coordinates),
        })
    }

    pub fn dimension(&self) -> usize {
        self.coordinates.len()
    }

    pub fn get(&self, index: usize) -> MdsResult<f64> {
        self.coordinates
            .get(index)
            .copied()
            .ok_or(MdsError::IndexOutOfRange {
                index,
                dimension: self.dimension(),
            })
    }

    pub fn set(&mut self, index: usize, value: f64) -> MdsResult<()> {
        let dimension = self.dimension();
        match self.coordinates.get_mut(index) {
            Some(c) => {
                *c = value;
                Ok(())
            }
            None => Err(MdsError::IndexOutOfRange { index, dimension }),
        }
    }

    pub fn as_view(&self) -> ArrayView1<'_, f64> {
        self.coordinates.view()
    }

    pub(crate) fn as_view_mut(&mut self) -> ArrayViewMut1<'_, f64> {
        self.coordinates.view_mut()
    }

    pub fn coordinates(&self) -> &[f64] {
        // a 1-d owned array is always contiguous
        self.coordinates.as_slice().unwrap_or(&[])
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.coordinates.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dimension_rejected() {
        assert_eq!(Point::new(0), Err(MdsError::InvalidDimension(0)));
        assert_eq!(Point::from_vec(vec![]), Err(MdsError::InvalidDimension(0)));
    }

    #[test]
    fn test_get_set() {
        let mut p = Point::new(3).unwrap();
        assert_eq!(p.dimension(), 3);
        p.set(1, 2.5).unwrap();
        assert_eq!(p.get(1).unwrap(), 2.5);
        assert_eq!(p.coordinates(), &[0.0, 2.5, 0.0]);
    }

    #[test]
    fn test_out_of_range() {
        let mut p = Point::from_vec(vec![1.0, 2.0]).unwrap();
        assert_eq!(
            p.get(2),
            Err(MdsError::IndexOutOfRange {
                index: 2,
                dimension: 2
            })
        );
        assert!(p.set(5, 1.0).is_err());
        assert_eq!(p.dimension(), 2);
    }
}
