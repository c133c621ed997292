//! Missing-value imputation for training tables.

mod statistical;

pub use statistical::StatisticalImputer;
