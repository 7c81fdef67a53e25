pub mod cancel;
pub mod sparse;

pub use cancel::CancelToken;
pub use sparse::SparseSet;
