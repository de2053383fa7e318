pub mod access;
pub mod classify;
pub mod heatmap;
pub mod normalize;
pub mod predicate;
pub mod time_serde;
pub mod token_ref;
pub mod tracking;
