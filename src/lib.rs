pub mod dimred;
pub mod distance;
pub mod embedding;
pub mod monitor;
mod error;
mod utils;

pub use error::MdsError;
pub use error::MdsResult;
pub use utils::RowIdentifier;
