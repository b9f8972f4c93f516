use std::fmt::Debug;
use std::hash::Hash;

use ndarray::{ArrayView1, ArrayViewMut1};

/// Trait for types that can be used to identify rows of a feature table
pub trait RowIdentifier: Clone + Eq + Hash + Debug {}

// Implement RowIdentifier for common types
impl RowIdentifier for String {}
impl RowIdentifier for &str {}
impl RowIdentifier for i32 {}
impl RowIdentifier for i64 {}
impl RowIdentifier for u32 {}
impl RowIdentifier for u64 {}
impl RowIdentifier for usize {}

pub trait ZeroVec {
    fn zero_len(&mut self, len: usize);
}

impl<T: Default + Clone> ZeroVec for Vec<T> {
    fn zero_len(&mut self, len: usize) {
        self.clear();
        self.reserve(len);
        self.extend(std::iter::repeat_n(T::default(), len));
    }
}

/// A cell counts as present only when it holds a finite number.
#[inline]
pub(crate) fn is_present(value: f64) -> bool {
    value.is_finite()
}

fn norm(v: ArrayView1<f64>) -> f64 {
    v.dot(&v).sqrt()
}

/// Scales `v` to unit length and returns its previous norm.
///
/// A zero vector is left untouched.
pub(crate) fn normalize(mut v: ArrayViewMut1<f64>) -> f64 {
    let n = norm(v.view());
    if n > 0.0 {
        v.mapv_inplace(|x| x / n);
    }
    n
}
