pub mod traversing;

pub use traversing::{Axis, TraversingCache, TraversingConfig, TraversingCriterion};
