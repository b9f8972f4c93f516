//! # Dimensionality Reduction
//!
//! Embeds feature rows into a few dimensions so that distances between
//! embedded points follow the distances between the original rows. Missing
//! cells are tolerated throughout.
//!
//! ## Currently Available
//! - **Pivot MDS** ([`mds::PivotMds`]): classical scaling through a pivot-distance matrix
//! - **Iterative MDS** ([`mds::IterativeMds`]): metric MDS by stress relaxation
//!
//! ## Algorithm Selection Guide
//! - Use **Pivot MDS** for large inputs and a deterministic, closed-form layout
//! - Use **Iterative MDS** when non-Euclidean input distances should be matched more closely,
//!   or to refine and extend an existing embedding with new rows

pub mod mds;
